// Config loading and validation tests

use sirberus::config::AppConfig;
use std::time::Duration;

const VALID_CONFIG: &str = r#"
[api]
base_url = "http://localhost:9733/api"
request_timeout_ms = 5000

[polling]
service_list_interval_ms = 10000
service_detail_interval_ms = 5000
container_list_interval_ms = 10000
container_detail_interval_ms = 10000
retries = 3
retry_delay_ms = 1000

[logs]
default_lines = 100

[metrics]
max_data_points = 20

[watch]
services = ["nginx.service"]
containers = ["abc123"]
"#;

#[test]
fn test_config_loads_from_str() {
    let config = AppConfig::load_from_str(VALID_CONFIG).expect("load_from_str");
    assert_eq!(config.api.base_url, "http://localhost:9733/api");
    assert_eq!(config.api.request_timeout(), Duration::from_secs(5));
    assert_eq!(config.polling.service_detail_interval_ms, 5000);
    assert_eq!(config.logs.default_lines, 100);
    assert_eq!(config.metrics.max_data_points, 20);
    assert_eq!(config.watch.services, vec!["nginx.service"]);
    assert_eq!(config.watch.containers, vec!["abc123"]);
}

#[test]
fn test_config_defaults_when_sections_omitted() {
    let config = AppConfig::load_from_str("[api]\nbase_url = \"https://host/api\"\n")
        .expect("minimal config");
    assert_eq!(config.api.request_timeout_ms, 30_000);
    assert_eq!(config.api.services_path, "services");
    assert_eq!(config.api.containers_path, "containers");
    assert_eq!(config.polling.service_list_interval_ms, 10_000);
    assert_eq!(config.polling.service_detail_interval_ms, 5_000);
    assert_eq!(config.polling.retries, 3);
    assert!(config.polling.enabled);
    assert_eq!(config.logs.default_lines, 100);
    assert_eq!(config.metrics.max_data_points, 20);
    assert!(config.watch.services.is_empty());
}

#[test]
fn test_polling_config_builds_poller_configs() {
    let config = AppConfig::load_from_str(VALID_CONFIG).expect("valid");
    let detail = config.polling.service_detail();
    assert_eq!(detail.interval, Duration::from_secs(5));
    assert_eq!(detail.retries, 3);
    assert_eq!(detail.retry_delay, Duration::from_secs(1));
    assert!(detail.enabled);
    assert_eq!(
        config.polling.container_list().interval,
        Duration::from_secs(10)
    );
}

#[test]
fn test_config_accepts_legacy_endpoint_paths() {
    let toml = VALID_CONFIG.replace(
        "request_timeout_ms = 5000",
        "request_timeout_ms = 5000\nservices_path = \"systemd\"\ncontainers_path = \"container\"",
    );
    let config = AppConfig::load_from_str(&toml).expect("valid");
    assert_eq!(config.api.services_path, "systemd");
    assert_eq!(config.api.containers_path, "container");
}

#[test]
fn test_config_validation_rejects_non_http_base_url() {
    let bad = VALID_CONFIG.replace("http://localhost:9733/api", "localhost:9733");
    let err = AppConfig::load_from_str(&bad).unwrap_err();
    assert!(err.to_string().contains("api.base_url"));
}

#[test]
fn test_config_validation_rejects_zero_timeout() {
    let bad = VALID_CONFIG.replace("request_timeout_ms = 5000", "request_timeout_ms = 0");
    let err = AppConfig::load_from_str(&bad).unwrap_err();
    assert!(err.to_string().contains("request_timeout_ms"));
}

#[test]
fn test_config_validation_rejects_zero_interval() {
    let bad = VALID_CONFIG.replace(
        "service_detail_interval_ms = 5000",
        "service_detail_interval_ms = 0",
    );
    let err = AppConfig::load_from_str(&bad).unwrap_err();
    assert!(err.to_string().contains("service_detail_interval_ms"));
}

#[test]
fn test_config_validation_rejects_zero_lines() {
    let bad = VALID_CONFIG.replace("default_lines = 100", "default_lines = 0");
    let err = AppConfig::load_from_str(&bad).unwrap_err();
    assert!(err.to_string().contains("default_lines"));
}

#[test]
fn test_config_validation_rejects_zero_data_points() {
    let bad = VALID_CONFIG.replace("max_data_points = 20", "max_data_points = 0");
    let err = AppConfig::load_from_str(&bad).unwrap_err();
    assert!(err.to_string().contains("max_data_points"));
}

#[test]
fn test_config_validation_rejects_missing_api_section() {
    let err = AppConfig::load_from_str("[logs]\ndefault_lines = 10\n").unwrap_err();
    assert!(!err.to_string().is_empty());
}

#[test]
fn test_config_validation_rejects_invalid_toml() {
    let err = AppConfig::load_from_str("not valid toml [[[").unwrap_err();
    assert!(!err.to_string().is_empty());
}

#[test]
fn test_config_load_from_file_via_env() {
    let dir = tempfile::TempDir::new().unwrap();
    let path = dir.path().join("config.toml");
    std::fs::write(&path, VALID_CONFIG).unwrap();
    unsafe { std::env::set_var("CONFIG_FILE", path.to_str().unwrap()) };
    let result = AppConfig::load();
    unsafe { std::env::remove_var("CONFIG_FILE") };
    let config = result.expect("load from CONFIG_FILE");
    assert_eq!(config.api.base_url, "http://localhost:9733/api");
    assert_eq!(config.watch.services, vec!["nginx.service"]);
}
