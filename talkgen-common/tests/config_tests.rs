//! Unit tests for configuration loading and engine endpoint resolution
//!
//! Tests cover:
//! - Missing default config file falls back to built-in defaults
//! - Explicit config path that does not exist is an error
//! - Malformed TOML is an error
//! - Engine base URL priority: CLI → ENV → TOML
//! - Missing engine base URL fails fast
//!
//! Note: Uses serial_test crate to prevent ENV variable race conditions.
//! Tests that manipulate TALKGEN_ENGINE_URL or TALKGEN_CONFIG are marked with #[serial].

use serial_test::serial;
use std::env;
use std::io::Write;
use std::path::Path;
use talkgen_common::config::{
    load_toml_config, parse_toml_config, EngineConfig, TomlConfig, CONFIG_ENV_VAR,
    ENGINE_URL_ENV_VAR,
};
use talkgen_common::Error;

fn write_config(contents: &str) -> tempfile::NamedTempFile {
    let mut file = tempfile::NamedTempFile::new().expect("create temp config");
    file.write_all(contents.as_bytes()).expect("write temp config");
    file
}

fn toml_with_url(url: &str) -> TomlConfig {
    parse_toml_config(&format!("[engine]\nbase_url = \"{}\"\n", url)).unwrap()
}

// =============================================================================
// Config file loading
// =============================================================================

#[test]
#[serial]
fn test_explicit_config_file_is_loaded() {
    env::remove_var(CONFIG_ENV_VAR);
    let file = write_config(
        r#"
        [engine]
        base_url = "http://engine:8188"
        client_id = "fixed-client"

        [launcher]
        port = 8190
        startup_timeout_secs = 5

        [logging]
        level = "debug"
        "#,
    );

    let config = load_toml_config(Some(file.path())).unwrap();

    assert_eq!(config.engine.base_url.as_deref(), Some("http://engine:8188"));
    assert_eq!(config.engine.client_id.as_deref(), Some("fixed-client"));
    assert_eq!(config.launcher.port, 8190);
    assert_eq!(config.launcher.startup_timeout_secs, 5);
    assert_eq!(config.launcher.poll_interval_ms, 1000);
    assert_eq!(config.logging.level, "debug");
}

#[test]
#[serial]
fn test_config_env_var_names_file() {
    let file = write_config("[defaults]\nwidth = 512\n");
    env::set_var(CONFIG_ENV_VAR, file.path());

    let config = load_toml_config(None).unwrap();
    assert_eq!(config.defaults.width, 512);
    assert_eq!(config.defaults.height, 832);

    env::remove_var(CONFIG_ENV_VAR);
}

#[test]
#[serial]
fn test_missing_explicit_config_is_error() {
    env::remove_var(CONFIG_ENV_VAR);
    let result = load_toml_config(Some(Path::new("/nonexistent/talkgen/config.toml")));
    assert!(matches!(result, Err(Error::Config(_))));
}

#[test]
#[serial]
fn test_malformed_config_is_error() {
    env::remove_var(CONFIG_ENV_VAR);
    let file = write_config("[launcher\nport = ");
    let result = load_toml_config(Some(file.path()));
    assert!(matches!(result, Err(Error::Config(_))));
}

#[test]
fn test_template_section_is_kept_raw() {
    let config = parse_toml_config(
        r#"
        [template]
        audio_scale = 1.5
        "#,
    )
    .unwrap();

    assert_eq!(
        config.template.get("audio_scale").and_then(|v| v.as_float()),
        Some(1.5)
    );
}

// =============================================================================
// Engine endpoint resolution
// =============================================================================

#[test]
#[serial]
fn test_engine_url_missing_everywhere_fails_fast() {
    env::remove_var(ENGINE_URL_ENV_VAR);

    let result = EngineConfig::resolve(None, &TomlConfig::default());

    match result {
        Err(Error::Config(msg)) => assert!(msg.contains(ENGINE_URL_ENV_VAR)),
        other => panic!("expected config error, got {:?}", other),
    }
}

#[test]
#[serial]
fn test_engine_url_from_toml() {
    env::remove_var(ENGINE_URL_ENV_VAR);

    let config = EngineConfig::resolve(None, &toml_with_url("http://toml:8188/")).unwrap();
    assert_eq!(config.base_url, "http://toml:8188");
    assert!(config.request_timeout.is_none());
}

#[test]
#[serial]
fn test_engine_url_env_beats_toml() {
    env::set_var(ENGINE_URL_ENV_VAR, "http://env:8188");

    let config = EngineConfig::resolve(None, &toml_with_url("http://toml:8188")).unwrap();
    assert_eq!(config.base_url, "http://env:8188");

    env::remove_var(ENGINE_URL_ENV_VAR);
}

#[test]
#[serial]
fn test_engine_url_cli_beats_env() {
    env::set_var(ENGINE_URL_ENV_VAR, "http://env:8188");

    let config =
        EngineConfig::resolve(Some("http://cli:8188"), &toml_with_url("http://toml:8188")).unwrap();
    assert_eq!(config.base_url, "http://cli:8188");

    env::remove_var(ENGINE_URL_ENV_VAR);
}

#[test]
#[serial]
fn test_blank_engine_url_is_treated_as_missing() {
    env::set_var(ENGINE_URL_ENV_VAR, "   ");

    let result = EngineConfig::resolve(Some(""), &TomlConfig::default());
    assert!(matches!(result, Err(Error::Config(_))));

    env::remove_var(ENGINE_URL_ENV_VAR);
}

#[test]
#[serial]
fn test_client_id_generated_when_absent() {
    env::remove_var(ENGINE_URL_ENV_VAR);

    let first = EngineConfig::resolve(Some("http://cli:8188"), &TomlConfig::default()).unwrap();
    let second = EngineConfig::resolve(Some("http://cli:8188"), &TomlConfig::default()).unwrap();

    assert_eq!(first.client_id.len(), 32);
    assert_ne!(first.client_id, second.client_id);
}

#[test]
#[serial]
fn test_client_id_and_timeout_from_toml() {
    env::remove_var(ENGINE_URL_ENV_VAR);
    let toml = parse_toml_config(
        r#"
        [engine]
        base_url = "http://toml:8188"
        client_id = "9f1c4011d72e415e9cbd9be0b3a859fc"
        request_timeout_secs = 30
        "#,
    )
    .unwrap();

    let config = EngineConfig::resolve(None, &toml).unwrap();
    assert_eq!(config.client_id, "9f1c4011d72e415e9cbd9be0b3a859fc");
    assert_eq!(config.request_timeout, Some(std::time::Duration::from_secs(30)));
}
