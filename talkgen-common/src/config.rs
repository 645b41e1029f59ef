//! Configuration loading and resolution
//!
//! Settings are resolved in priority order:
//! 1. Command-line argument (highest priority)
//! 2. Environment variable
//! 3. TOML config file
//! 4. Compiled default (fallback)
//!
//! The engine base URL has no compiled default: the worker refuses to start
//! without one.

use crate::{Error, Result};
use serde::Deserialize;
use std::net::IpAddr;
use std::path::{Path, PathBuf};
use std::time::Duration;
use tracing::{info, warn};

/// Environment variable naming an explicit config file
pub const CONFIG_ENV_VAR: &str = "TALKGEN_CONFIG";

/// Environment variable carrying the engine base URL
pub const ENGINE_URL_ENV_VAR: &str = "TALKGEN_ENGINE_URL";

/// Contents of `config.toml`
///
/// Every section is optional. A missing file yields `TomlConfig::default()`.
#[derive(Debug, Clone, Default, Deserialize)]
pub struct TomlConfig {
    /// Execution engine endpoint settings
    #[serde(default)]
    pub engine: EngineSection,

    /// Engine process launch settings
    #[serde(default)]
    pub launcher: LauncherConfig,

    /// Defaults for optional request fields
    #[serde(default)]
    pub defaults: RequestDefaults,

    /// Raw `[template]` table, interpreted by the graph template
    #[serde(default)]
    pub template: toml::Table,

    /// Logging configuration
    #[serde(default)]
    pub logging: LoggingConfig,
}

/// `[engine]` section as written in TOML
#[derive(Debug, Clone, Default, Deserialize)]
pub struct EngineSection {
    pub base_url: Option<String>,
    pub client_id: Option<String>,
    pub request_timeout_secs: Option<u64>,
}

/// Resolved engine endpoint configuration
///
/// Constructed once at startup and handed to the submission client.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct EngineConfig {
    /// Base URL without trailing slash, e.g. `http://127.0.0.1:8188`
    pub base_url: String,
    /// Session identifier sent with every submitted graph
    pub client_id: String,
    /// Submission timeout; `None` keeps the HTTP client's default
    pub request_timeout: Option<Duration>,
}

impl EngineConfig {
    /// Resolve the engine endpoint from CLI → ENV → TOML
    ///
    /// Fails with `Error::Config` when no tier provides a base URL.
    pub fn resolve(cli_url: Option<&str>, toml_config: &TomlConfig) -> Result<Self> {
        let env_url = std::env::var(ENGINE_URL_ENV_VAR).ok();
        let toml_url = toml_config.engine.base_url.as_deref();

        let mut sources = Vec::new();
        if cli_url.is_some_and(is_present) {
            sources.push("command line");
        }
        if env_url.as_deref().is_some_and(is_present) {
            sources.push("environment");
        }
        if toml_url.is_some_and(is_present) {
            sources.push("TOML");
        }

        if sources.len() > 1 {
            warn!(
                "Engine base URL found in multiple sources: {}. Using {} (highest priority).",
                sources.join(", "),
                sources[0]
            );
        }

        let raw_url = cli_url
            .filter(|u| is_present(u))
            .or(env_url.as_deref().filter(|u| is_present(u)))
            .or(toml_url.filter(|u| is_present(u)))
            .ok_or_else(|| {
                Error::Config(format!(
                    "Engine base URL not configured. Set one of:\n\
                     1. Command line: --engine-url http://127.0.0.1:8188\n\
                     2. Environment: {}=http://127.0.0.1:8188\n\
                     3. TOML config: [engine] base_url = \"http://127.0.0.1:8188\"",
                    ENGINE_URL_ENV_VAR
                ))
            })?;

        let base_url = normalize_base_url(raw_url)?;
        info!(base_url = %base_url, source = sources[0], "Engine endpoint resolved");

        let client_id = toml_config
            .engine
            .client_id
            .clone()
            .filter(|id| is_present(id))
            .unwrap_or_else(|| uuid::Uuid::new_v4().simple().to_string());

        Ok(Self {
            base_url,
            client_id,
            request_timeout: toml_config.engine.request_timeout_secs.map(Duration::from_secs),
        })
    }
}

fn is_present(value: &str) -> bool {
    !value.trim().is_empty()
}

/// Trim whitespace and trailing slashes, and require an http(s) scheme
pub fn normalize_base_url(raw: &str) -> Result<String> {
    let trimmed = raw.trim().trim_end_matches('/');
    if !(trimmed.starts_with("http://") || trimmed.starts_with("https://")) {
        return Err(Error::Config(format!(
            "Engine base URL must start with http:// or https://, got {:?}",
            raw
        )));
    }
    Ok(trimmed.to_string())
}

/// `[launcher]` section: how the engine process is started and probed
#[derive(Debug, Clone, PartialEq, Eq, Deserialize)]
#[serde(default)]
pub struct LauncherConfig {
    /// Interpreter or executable that runs the engine
    pub program: PathBuf,
    /// Arguments placed before `--listen`/`--port`
    pub script_args: Vec<String>,
    /// Working directory for the engine process
    pub working_dir: Option<PathBuf>,
    /// Address the engine binds to
    pub listen: String,
    /// Port the engine listens on
    pub port: u16,
    /// Health endpoint path, polled on 127.0.0.1
    pub health_path: String,
    pub poll_interval_ms: u64,
    pub startup_timeout_secs: u64,
}

impl Default for LauncherConfig {
    fn default() -> Self {
        Self {
            program: PathBuf::from("/workspace/ComfyUI/venv/bin/python"),
            script_args: vec!["main.py".to_string()],
            working_dir: Some(PathBuf::from("/workspace/ComfyUI")),
            listen: "0.0.0.0".to_string(),
            port: 8188,
            health_path: "/server_status".to_string(),
            poll_interval_ms: 1000,
            startup_timeout_secs: 60,
        }
    }
}

impl LauncherConfig {
    /// Full argument list passed to `program`
    pub fn engine_args(&self) -> Vec<String> {
        let mut args = self.script_args.clone();
        args.extend([
            "--listen".to_string(),
            self.listen.clone(),
            "--port".to_string(),
            self.port.to_string(),
        ]);
        args
    }

    /// Health check URL on the address the engine listens on
    ///
    /// Wildcard listen addresses are probed over loopback.
    pub fn health_url(&self) -> String {
        format!("http://{}:{}{}", self.probe_host(), self.port, self.health_path)
    }

    fn probe_host(&self) -> String {
        let listen = self.listen.trim();
        match listen.parse::<IpAddr>() {
            Ok(IpAddr::V4(addr)) if addr.is_unspecified() => "127.0.0.1".to_string(),
            Ok(IpAddr::V6(addr)) if addr.is_unspecified() => "[::1]".to_string(),
            Ok(IpAddr::V6(addr)) => format!("[{}]", addr),
            Ok(IpAddr::V4(addr)) => addr.to_string(),
            Err(_) if listen.is_empty() => "127.0.0.1".to_string(),
            Err(_) => listen.to_string(),
        }
    }

    /// Reject settings the supervisor cannot run with
    pub fn validate(&self) -> Result<()> {
        if self.poll_interval_ms == 0 {
            return Err(Error::Config(
                "[launcher] poll_interval_ms must be at least 1".to_string(),
            ));
        }
        if self.startup_timeout_secs == 0 {
            return Err(Error::Config(
                "[launcher] startup_timeout_secs must be at least 1".to_string(),
            ));
        }
        if !self.health_path.starts_with('/') {
            return Err(Error::Config(format!(
                "[launcher] health_path must start with '/': {:?}",
                self.health_path
            )));
        }
        Ok(())
    }

    pub fn poll_interval(&self) -> Duration {
        Duration::from_millis(self.poll_interval_ms)
    }

    pub fn startup_timeout(&self) -> Duration {
        Duration::from_secs(self.startup_timeout_secs)
    }
}

/// `[defaults]` section: values used when a request omits an optional field
#[derive(Debug, Clone, PartialEq, Eq, Deserialize)]
#[serde(default)]
pub struct RequestDefaults {
    pub text_prompt: String,
    /// Seconds
    pub video_length: u32,
    pub frame_rate: u32,
    pub width: u32,
    pub height: u32,
}

impl Default for RequestDefaults {
    fn default() -> Self {
        Self {
            text_prompt: "A person is talking".to_string(),
            video_length: 21,
            frame_rate: 25,
            width: 640,
            height: 832,
        }
    }
}

/// Logging configuration
#[derive(Debug, Clone, Deserialize)]
pub struct LoggingConfig {
    /// Log level (trace, debug, info, warn, error)
    #[serde(default = "default_log_level")]
    pub level: String,
}

impl Default for LoggingConfig {
    fn default() -> Self {
        Self {
            level: default_log_level(),
        }
    }
}

fn default_log_level() -> String {
    "info".to_string()
}

/// Find the config file to load
///
/// An explicit path (CLI or `TALKGEN_CONFIG`) is returned as-is, even if it
/// does not exist, so the caller can report it. Otherwise the user config
/// directory is tried, then `/etc/talkgen/config.toml`.
pub fn locate_config_file(cli_path: Option<&Path>) -> Option<(PathBuf, bool)> {
    if let Some(path) = cli_path {
        return Some((path.to_path_buf(), true));
    }

    if let Ok(path) = std::env::var(CONFIG_ENV_VAR) {
        if is_present(&path) {
            return Some((PathBuf::from(path), true));
        }
    }

    let user_config = dirs::config_dir().map(|d| d.join("talkgen").join("config.toml"));
    if let Some(path) = user_config {
        if path.exists() {
            return Some((path, false));
        }
    }

    let system_config = PathBuf::from("/etc/talkgen/config.toml");
    if system_config.exists() {
        return Some((system_config, false));
    }

    None
}

/// Load `TomlConfig`, falling back to defaults when no file is found
///
/// A missing default-location file is not an error. An explicitly named file
/// that is missing, or any file that fails to parse, is.
pub fn load_toml_config(cli_path: Option<&Path>) -> Result<TomlConfig> {
    let Some((path, explicit)) = locate_config_file(cli_path) else {
        warn!("No config file found, using built-in defaults");
        return Ok(TomlConfig::default());
    };

    if !path.exists() {
        if explicit {
            return Err(Error::Config(format!("Config file not found: {}", path.display())));
        }
        warn!("Config file {} disappeared, using built-in defaults", path.display());
        return Ok(TomlConfig::default());
    }

    let content = std::fs::read_to_string(&path)?;
    let config = parse_toml_config(&content)
        .map_err(|e| Error::Config(format!("{}: {}", path.display(), e)))?;

    info!("Loaded config from {}", path.display());
    Ok(config)
}

/// Parse TOML text into `TomlConfig`
pub fn parse_toml_config(content: &str) -> Result<TomlConfig> {
    toml::from_str(content).map_err(|e| Error::Config(format!("Parse TOML failed: {}", e)))
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_normalize_base_url_strips_trailing_slash() {
        assert_eq!(
            normalize_base_url(" http://engine:8188/ ").unwrap(),
            "http://engine:8188"
        );
    }

    #[test]
    fn test_normalize_base_url_rejects_missing_scheme() {
        let err = normalize_base_url("engine:8188").unwrap_err();
        assert!(matches!(err, Error::Config(_)));
    }

    #[test]
    fn test_launcher_args_end_with_listen_and_port() {
        let launcher = LauncherConfig::default();
        assert_eq!(
            launcher.engine_args(),
            vec!["main.py", "--listen", "0.0.0.0", "--port", "8188"]
        );
        assert_eq!(launcher.health_url(), "http://127.0.0.1:8188/server_status");
    }

    #[test]
    fn test_health_url_follows_listen_address() {
        let mut launcher = LauncherConfig {
            port: 9000,
            ..LauncherConfig::default()
        };

        launcher.listen = "10.0.0.5".to_string();
        assert_eq!(launcher.health_url(), "http://10.0.0.5:9000/server_status");

        launcher.listen = "::".to_string();
        assert_eq!(launcher.health_url(), "http://[::1]:9000/server_status");

        launcher.listen = "fd00::7".to_string();
        assert_eq!(launcher.health_url(), "http://[fd00::7]:9000/server_status");

        launcher.listen = "engine.local".to_string();
        assert_eq!(launcher.health_url(), "http://engine.local:9000/server_status");
    }

    #[test]
    fn test_validate_rejects_zero_interval_and_timeout() {
        assert!(LauncherConfig::default().validate().is_ok());

        let busy = LauncherConfig {
            poll_interval_ms: 0,
            ..LauncherConfig::default()
        };
        assert!(matches!(busy.validate(), Err(Error::Config(_))));

        let instant = LauncherConfig {
            startup_timeout_secs: 0,
            ..LauncherConfig::default()
        };
        assert!(matches!(instant.validate(), Err(Error::Config(_))));
    }

    #[test]
    fn test_large_startup_timeout_is_valid() {
        let launcher = LauncherConfig {
            startup_timeout_secs: u64::MAX,
            ..LauncherConfig::default()
        };
        assert!(launcher.validate().is_ok());
        assert_eq!(launcher.startup_timeout(), Duration::from_secs(u64::MAX));
    }

    #[test]
    fn test_partial_sections_keep_defaults() {
        let config = parse_toml_config(
            r#"
            [launcher]
            port = 9000

            [defaults]
            frame_rate = 30
            "#,
        )
        .unwrap();

        assert_eq!(config.launcher.port, 9000);
        assert_eq!(config.launcher.startup_timeout_secs, 60);
        assert_eq!(config.defaults.frame_rate, 30);
        assert_eq!(config.defaults.video_length, 21);
        assert_eq!(config.logging.level, "info");
    }
}
