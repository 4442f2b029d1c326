use serde::{Deserialize, Serialize};

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct LoggingConfig {
    /// Default filter directive when `RUST_LOG` is unset.
    #[serde(default = "d_filter")]
    pub filter: String,
    /// Emit JSON lines (`true`) or human-readable output.
    #[serde(default = "d_true")]
    pub json: bool,
}

impl Default for LoggingConfig {
    fn default() -> Self {
        Self {
            filter: d_filter(),
            json: true,
        }
    }
}

fn d_filter() -> String {
    "info,dg_gateway=debug".into()
}
fn d_true() -> bool {
    true
}
