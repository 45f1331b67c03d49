use std::io::Write;

use groupflow_core::config::AppConfig;

#[test]
fn test_load_full_config_from_file() {
    let toml_content = r#"
[host]
base_url = "http://192.168.1.20:8188"
client_id = "bench-rig"

[runner]
poll_interval_ms = 250
sleep_slice_ms = 50
settle_delay_ms = 0

[plans]
dir = "/tmp/groupflow-plans"

[gateway]
bind = "0.0.0.0:9000"

[log]
level = "debug"
"#;

    let mut tmp = tempfile::NamedTempFile::new().expect("create temp file");
    tmp.write_all(toml_content.as_bytes()).expect("write toml");

    let config = AppConfig::load(tmp.path()).expect("load config");

    assert_eq!(config.host.base_url, "http://192.168.1.20:8188");
    assert_eq!(config.host.client_id.as_deref(), Some("bench-rig"));
    assert_eq!(config.runner.poll_interval_ms, 250);
    assert_eq!(config.runner.sleep_slice_ms, 50);
    assert_eq!(config.runner.settle_delay_ms, 0);
    assert_eq!(config.plans.dir, "/tmp/groupflow-plans");

    let gateway = config.gateway.expect("gateway present");
    assert_eq!(gateway.bind, "0.0.0.0:9000");

    let log = config.log.expect("log present");
    assert_eq!(log.level, "debug");
}

#[test]
fn test_minimal_config_fills_defaults() {
    let mut tmp = tempfile::NamedTempFile::new().expect("create temp file");
    tmp.write_all(b"[host]\nbase_url = \"http://localhost:8188\"\n")
        .expect("write toml");

    let config = AppConfig::load(tmp.path()).expect("load config");

    assert_eq!(config.host.base_url, "http://localhost:8188");
    assert!(config.host.client_id.is_none());
    assert_eq!(config.runner.poll_interval_ms, 500);
    assert_eq!(config.runner.sleep_slice_ms, 100);
    assert_eq!(config.plans.dir, "plans");
    assert!(config.gateway.is_none());
    assert!(config.log.is_none());
}

#[test]
fn test_malformed_toml_is_config_error() {
    let mut tmp = tempfile::NamedTempFile::new().expect("create temp file");
    tmp.write_all(b"[host\nbase_url = ").expect("write toml");

    let err = AppConfig::load(tmp.path()).unwrap_err();
    assert!(matches!(
        err,
        groupflow_core::error::GroupflowError::Config(_)
    ));
}
