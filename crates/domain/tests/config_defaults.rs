use std::io::Write;

use dg_domain::config::{Config, ConfigSeverity, DEFAULT_MAX_CONTEXT_MESSAGES};

#[test]
fn missing_max_context_defaults_to_ten() {
    let config = Config::from_yaml_str("api_key: sk-test\n").unwrap();
    assert_eq!(config.context_window(), DEFAULT_MAX_CONTEXT_MESSAGES);
    assert_eq!(config.max_context_messages, 10);
}

#[test]
fn non_positive_max_context_defaults_to_ten() {
    let config = Config::from_yaml_str("max_context_messages: 0\n").unwrap();
    assert_eq!(config.context_window(), 10);

    let config = Config::from_yaml_str("max_context_messages: -3\n").unwrap();
    assert_eq!(config.context_window(), 10);
}

#[test]
fn explicit_max_context_is_kept() {
    let config = Config::from_yaml_str("max_context_messages: 4\n").unwrap();
    assert_eq!(config.context_window(), 4);
}

#[test]
fn full_file_parses() {
    let yaml = r#"
api_url: "https://api.openai.com/v1/"
api_key: "sk-test"
telegram_bot_token: "123:ABC"
files_path: "./docs"
name: "Company guide"
instructions: "Answer questions about the company."
model: "gpt-4o-mini"
tools:
  - file_search
max_context_messages: 6
"#;
    let config = Config::from_yaml_str(yaml).unwrap();
    assert_eq!(config.api_key, "sk-test");
    assert_eq!(config.telegram_bot_token, "123:ABC");
    assert_eq!(config.files_path, std::path::PathBuf::from("./docs"));
    assert_eq!(config.name, "Company guide");
    assert_eq!(config.model, "gpt-4o-mini");
    assert_eq!(config.tools, vec!["file_search".to_string()]);
    assert_eq!(config.context_window(), 6);
    assert_eq!(config.temperature, 1.0);
    assert_eq!(config.top_p, 1.0);
    assert!(config.max_in_flight.is_none());
}

#[test]
fn notices_can_be_overridden_individually() {
    let yaml = "notices:\n  empty_reply: \"Nothing to say.\"\n";
    let config = Config::from_yaml_str(yaml).unwrap();
    assert_eq!(config.notices.empty_reply, "Nothing to say.");
    assert!(!config.notices.transport_failure.is_empty());
}

#[test]
fn env_fills_empty_secrets_only() {
    let mut config = Config::from_yaml_str("api_key: from-file\n").unwrap();
    config.apply_env(|key| match key {
        "DG_API_KEY" => Some("from-env".into()),
        "DG_TELEGRAM_BOT_TOKEN" => Some("tg-env".into()),
        _ => None,
    });
    assert_eq!(config.api_key, "from-file");
    assert_eq!(config.telegram_bot_token, "tg-env");
}

#[test]
fn load_reads_file_from_disk() {
    let mut file = tempfile::NamedTempFile::new().unwrap();
    writeln!(file, "api_key: sk-disk\nmax_context_messages: 3").unwrap();
    let config = Config::load(file.path()).unwrap();
    assert_eq!(config.api_key, "sk-disk");
    assert_eq!(config.context_window(), 3);
}

#[test]
fn load_missing_file_is_config_error() {
    let err = Config::load(std::path::Path::new("/nonexistent/docguide.yaml")).unwrap_err();
    assert!(matches!(err, dg_domain::Error::Config(_)));
    assert!(err.to_string().contains("reading"));
}

#[test]
fn load_invalid_yaml_is_config_error() {
    let mut file = tempfile::NamedTempFile::new().unwrap();
    writeln!(file, "tools: [unterminated").unwrap();
    let err = Config::load(file.path()).unwrap_err();
    assert!(err.to_string().contains("parsing"));
}

#[test]
fn validate_flags_missing_secrets() {
    let config = Config::default();
    let issues = config.validate();
    let errors: Vec<_> = issues
        .iter()
        .filter(|i| i.severity == ConfigSeverity::Error)
        .map(|i| i.field.as_str())
        .collect();
    assert!(errors.contains(&"api_key"));
    assert!(errors.contains(&"telegram_bot_token"));
}

#[test]
fn validate_accepts_complete_config() {
    let dir = tempfile::tempdir().unwrap();
    let mut config = Config::default();
    config.api_key = "sk".into();
    config.telegram_bot_token = "123:ABC".into();
    config.files_path = dir.path().to_path_buf();
    assert!(config.validate().is_empty());
}

#[test]
fn validate_rejects_zero_in_flight_bound() {
    let mut config = Config::default();
    config.max_in_flight = Some(0);
    assert!(config
        .validate()
        .iter()
        .any(|i| i.field == "max_in_flight" && i.severity == ConfigSeverity::Error));
}
