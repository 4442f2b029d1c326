//! Startup sequence shared by `serve`: config checks and remote
//! provisioning of the assistant and its retrieval index.

use std::path::{Path, PathBuf};

use dg_domain::config::{Config, ConfigSeverity};
use dg_domain::error::{Error, Result};
use dg_domain::trace::TraceEvent;
use dg_providers::{AssistantSpec, Provisioner};

/// IDs produced by provisioning.  The process serves only once these exist.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Provisioned {
    pub assistant_id: String,
    pub index_id: String,
    /// Documents that made it into the index.
    pub documents: usize,
}

/// Log every config issue and fail if any is an error.
pub fn check_config(config: &Config) -> anyhow::Result<()> {
    let issues = config.validate();
    for issue in &issues {
        match issue.severity {
            ConfigSeverity::Warning => tracing::warn!("config: {issue}"),
            ConfigSeverity::Error => tracing::error!("config: {issue}"),
        }
    }
    let errors = issues
        .iter()
        .filter(|i| i.severity == ConfigSeverity::Error)
        .count();
    if errors > 0 {
        anyhow::bail!("config validation failed with {errors} error(s)");
    }
    Ok(())
}

/// Create the assistant, build the retrieval index from `files_path`, and
/// attach the index to the assistant.
///
/// A document that fails to upload or register is logged and skipped; every
/// other failure aborts startup.
pub async fn provision(provisioner: &dyn Provisioner, config: &Config) -> Result<Provisioned> {
    // ── Assistant ────────────────────────────────────────────────────
    let assistant_id = provisioner
        .create_assistant(&AssistantSpec::from_config(config))
        .await
        .map_err(|e| Error::provisioning("create assistant", e))?;
    step("assistant_created", &assistant_id);

    // ── Retrieval index ──────────────────────────────────────────────
    let index_id = provisioner
        .create_index()
        .await
        .map_err(|e| Error::provisioning("create index", e))?;
    step("index_created", &index_id);

    // ── Documents ────────────────────────────────────────────────────
    let paths = list_documents(&config.files_path)
        .map_err(|e| Error::provisioning("list documents", e))?;
    let mut documents = 0;
    for path in &paths {
        match add_document(provisioner, &index_id, path).await {
            Ok(document_id) => {
                documents += 1;
                tracing::info!(path = %path.display(), document_id = %document_id, "document indexed");
            }
            Err(e) => TraceEvent::DocumentSkipped {
                file_name: file_name(path),
                reason: e.to_string(),
            }
            .emit(),
        }
    }
    tracing::info!(documents, listed = paths.len(), "document upload finished");

    // ── Attach ───────────────────────────────────────────────────────
    provisioner
        .attach_index(&assistant_id, &index_id)
        .await
        .map_err(|e| Error::provisioning("attach index", e))?;
    step("index_attached", &assistant_id);

    Ok(Provisioned {
        assistant_id,
        index_id,
        documents,
    })
}

async fn add_document(provisioner: &dyn Provisioner, index_id: &str, path: &Path) -> Result<String> {
    let document_id = provisioner.upload_document(path).await?;
    provisioner.register_document(index_id, &document_id).await?;
    Ok(document_id)
}

/// Regular files directly inside `dir`, sorted by name.  Subdirectories are
/// not descended into.
pub fn list_documents(dir: &Path) -> Result<Vec<PathBuf>> {
    let mut paths = Vec::new();
    for entry in std::fs::read_dir(dir)? {
        let entry = entry?;
        if entry.file_type()?.is_file() {
            paths.push(entry.path());
        }
    }
    paths.sort();
    Ok(paths)
}

fn step(step: &str, id: &str) {
    TraceEvent::ProvisioningStep {
        step: step.to_owned(),
        id: id.to_owned(),
    }
    .emit();
}

fn file_name(path: &Path) -> String {
    path.file_name()
        .map(|n| n.to_string_lossy().into_owned())
        .unwrap_or_else(|| path.display().to_string())
}
