use ap_domain::config::{Config, ProviderKind};

#[test]
fn default_comms_service_is_hive_comms() {
    let config = Config::default();
    assert_eq!(config.comms.service, "hive-comms");
    assert_eq!(config.comms.poll_interval_sec, 5);
    assert_eq!(config.comms.poll_timeout_sec, 30);
}

#[test]
fn empty_toml_parses_to_defaults() {
    let config: Config = toml::from_str("").unwrap();
    assert!(config.agents.is_empty());
    assert!(config.project_dir.is_none());
}

#[test]
fn agent_section_parses_with_partial_fields() {
    let toml_str = r#"
project_dir = "/work/swarm"

[agents.queen]
role = "lead"
system = "Coordinate the workers."

[agents.builder]
provider = "codex"
model = "o4-mini"
"#;
    let config: Config = toml::from_str(toml_str).unwrap();
    assert_eq!(config.agents.len(), 2);

    let queen = config.agents.get("queen").unwrap();
    assert_eq!(queen.role, "lead");
    assert_eq!(queen.provider, ProviderKind::Claude);
    assert_eq!(queen.max_history_tokens, 100_000);

    let builder = config.agents.get("builder").unwrap();
    assert_eq!(builder.provider, ProviderKind::Codex);
    assert_eq!(builder.model.as_deref(), Some("o4-mini"));
    assert_eq!(builder.role, "coder");
}

#[test]
fn backoff_overrides_parse() {
    let toml_str = r#"
[agents.builder]
system = "Build."
retry_backoff_sec = 10
retry_backoff_max_sec = 120
"#;
    let config: Config = toml::from_str(toml_str).unwrap();
    let builder = config.agents.get("builder").unwrap();
    assert_eq!(builder.retry_backoff_sec, 10);
    assert_eq!(builder.retry_backoff_max_sec, 120);
}

#[test]
fn unknown_provider_is_rejected() {
    let toml_str = r#"
[agents.builder]
provider = "cursor"
"#;
    assert!(toml::from_str::<Config>(toml_str).is_err());
}

#[test]
fn comms_section_overrides_poll_script() {
    let toml_str = r#"
[comms]
poll_script = "/opt/comms/poll.sh"
poll_interval_sec = 2
"#;
    let config: Config = toml::from_str(toml_str).unwrap();
    assert_eq!(
        config.comms.poll_script.to_str().unwrap(),
        "/opt/comms/poll.sh"
    );
    assert_eq!(config.comms.poll_interval_sec, 2);
    assert_eq!(config.comms.poll_timeout_sec, 30);
}
