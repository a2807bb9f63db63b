//! Bridge configuration loading and validation.
//!
//! Settings come from three layers, highest precedence first: command-line
//! overrides, a YAML config file, and built-in defaults. The file may use
//! `${VAR}` or `${VAR:-default}` to pull values from the environment.

use std::path::{Path, PathBuf};
use std::time::Duration;

use serde::Deserialize;
use thiserror::Error;

use crate::channel::codec::DEFAULT_MAX_FRAME_BYTES;
use crate::channel::{expand_channel_name, ChannelClientOptions, DEFAULT_CHANNEL_PREFIX};

/// Environment variable naming an explicit config file.
pub const CONFIG_ENV_VAR: &str = "TOOLBRIDGE_CONFIG";

/// Config file looked for in the working directory.
pub const LOCAL_CONFIG_FILE: &str = "toolbridge.yaml";

// ─── Errors ──────────────────────────────────────────────────────────────────

/// Failures that stop the bridge from starting.
#[derive(Debug, Error)]
pub enum ConfigError {
    #[error("config file not found: {}", .path.display())]
    NotFound { path: PathBuf },

    #[error("failed to read {}: {reason}", .path.display())]
    Read { path: PathBuf, reason: String },

    #[error("failed to parse {}: {reason}", .path.display())]
    Parse { path: PathBuf, reason: String },

    #[error("invalid configuration: {reason}")]
    Invalid { reason: String },
}

// ─── Public Types ────────────────────────────────────────────────────────────

/// Fully resolved bridge settings.
#[derive(Debug, Clone, PartialEq)]
pub struct BridgeConfig {
    /// Application identifier or full channel name of the target.
    pub channel: String,
    /// Prefix prepended when expanding a bare identifier.
    pub channel_prefix: String,
    pub host: String,
    pub port: u16,
    pub discovery_timeout_ms: u64,
    pub call_timeout_ms: u64,
    pub max_connections_per_channel: Option<usize>,
    pub max_frame_bytes: usize,
    /// Where Unix-domain sockets live (ignored on Windows).
    pub socket_dir: PathBuf,
    /// Re-run discovery this often. `None` means startup only.
    pub rediscover_interval_secs: Option<u64>,
    /// When set, only these proxied tools are exposed.
    pub enabled_tools: Option<Vec<String>>,
    /// Log to this file instead of stderr.
    pub log_file: Option<PathBuf>,
    pub log_json: bool,
}

impl Default for BridgeConfig {
    fn default() -> Self {
        Self {
            channel: "Target".into(),
            channel_prefix: DEFAULT_CHANNEL_PREFIX.into(),
            host: "127.0.0.1".into(),
            port: 5010,
            discovery_timeout_ms: 3_000,
            call_timeout_ms: 30_000,
            max_connections_per_channel: None,
            max_frame_bytes: DEFAULT_MAX_FRAME_BYTES,
            socket_dir: std::env::temp_dir(),
            rediscover_interval_secs: None,
            enabled_tools: None,
            log_file: None,
            log_json: false,
        }
    }
}

/// The config file as written. Every field is optional.
#[derive(Debug, Clone, Default, Deserialize)]
#[serde(deny_unknown_fields)]
pub struct FileConfig {
    #[serde(default)]
    pub channel: Option<String>,
    #[serde(default)]
    pub channel_prefix: Option<String>,
    #[serde(default)]
    pub host: Option<String>,
    #[serde(default)]
    pub port: Option<u16>,
    #[serde(default)]
    pub discovery_timeout_ms: Option<u64>,
    #[serde(default)]
    pub call_timeout_ms: Option<u64>,
    #[serde(default)]
    pub max_connections_per_channel: Option<usize>,
    #[serde(default)]
    pub max_frame_bytes: Option<usize>,
    #[serde(default)]
    pub socket_dir: Option<PathBuf>,
    #[serde(default)]
    pub rediscover_interval_secs: Option<u64>,
    #[serde(default)]
    pub enabled_tools: Option<Vec<String>>,
    #[serde(default)]
    pub log_file: Option<PathBuf>,
    #[serde(default)]
    pub log_json: Option<bool>,
}

/// Values given on the command line.
#[derive(Debug, Clone, Default)]
pub struct CliOverrides {
    pub config: Option<PathBuf>,
    pub channel: Option<String>,
    pub host: Option<String>,
    pub port: Option<u16>,
    pub call_timeout_ms: Option<u64>,
    pub discovery_timeout_ms: Option<u64>,
    pub log_file: Option<PathBuf>,
}

// ─── Resolution ──────────────────────────────────────────────────────────────

impl BridgeConfig {
    /// Locate, read, and merge configuration for this process.
    pub fn load(overrides: &CliOverrides) -> Result<Self, ConfigError> {
        let cwd = std::env::current_dir().unwrap_or_else(|_| PathBuf::from("."));
        let path = find_config_path(
            overrides.config.as_deref(),
            std::env::var_os(CONFIG_ENV_VAR).map(PathBuf::from),
            &cwd,
            dirs::data_dir().map(|d| d.join("toolbridge")),
        )?;

        let file = match &path {
            Some(path) => load_file_config(path)?,
            None => FileConfig::default(),
        };

        Self::from_parts(file, overrides)
    }

    /// Merge a parsed file with CLI overrides over the defaults, then validate.
    pub fn from_parts(file: FileConfig, overrides: &CliOverrides) -> Result<Self, ConfigError> {
        let defaults = Self::default();

        let config = Self {
            channel: overrides
                .channel
                .clone()
                .or(file.channel)
                .unwrap_or(defaults.channel),
            channel_prefix: file.channel_prefix.unwrap_or(defaults.channel_prefix),
            host: overrides.host.clone().or(file.host).unwrap_or(defaults.host),
            port: overrides.port.or(file.port).unwrap_or(defaults.port),
            discovery_timeout_ms: overrides
                .discovery_timeout_ms
                .or(file.discovery_timeout_ms)
                .unwrap_or(defaults.discovery_timeout_ms),
            call_timeout_ms: overrides
                .call_timeout_ms
                .or(file.call_timeout_ms)
                .unwrap_or(defaults.call_timeout_ms),
            max_connections_per_channel: file.max_connections_per_channel,
            max_frame_bytes: file.max_frame_bytes.unwrap_or(defaults.max_frame_bytes),
            socket_dir: file.socket_dir.unwrap_or(defaults.socket_dir),
            rediscover_interval_secs: file.rediscover_interval_secs,
            enabled_tools: file.enabled_tools,
            log_file: overrides.log_file.clone().or(file.log_file),
            log_json: file.log_json.unwrap_or(defaults.log_json),
        };

        config.validate()?;
        Ok(config)
    }

    fn validate(&self) -> Result<(), ConfigError> {
        let invalid = |reason: &str| {
            Err(ConfigError::Invalid {
                reason: reason.to_string(),
            })
        };

        if self.channel.trim().is_empty() {
            return invalid("channel must not be empty");
        }
        if self.port == 0 {
            return invalid("port must be non-zero");
        }
        if self.discovery_timeout_ms == 0 || self.call_timeout_ms == 0 {
            return invalid("timeouts must be non-zero");
        }
        if self.max_frame_bytes == 0 {
            return invalid("max_frame_bytes must be non-zero");
        }
        if self.max_connections_per_channel == Some(0) {
            return invalid("max_connections_per_channel must be non-zero when set");
        }
        if self.rediscover_interval_secs == Some(0) {
            return invalid("rediscover_interval_secs must be non-zero when set");
        }
        Ok(())
    }

    /// Fully qualified channel name of the target.
    pub fn canonical_channel(&self) -> String {
        expand_channel_name(&self.channel, &self.channel_prefix)
    }

    pub fn discovery_timeout(&self) -> Duration {
        Duration::from_millis(self.discovery_timeout_ms)
    }

    pub fn call_timeout(&self) -> Duration {
        Duration::from_millis(self.call_timeout_ms)
    }

    pub fn rediscover_interval(&self) -> Option<Duration> {
        self.rediscover_interval_secs.map(Duration::from_secs)
    }

    /// `host:port` for the front-end listener.
    pub fn bind_addr(&self) -> String {
        format!("{}:{}", self.host, self.port)
    }

    /// Transport settings for the channel client.
    pub fn client_options(&self) -> ChannelClientOptions {
        ChannelClientOptions {
            socket_dir: self.socket_dir.clone(),
            max_frame_bytes: self.max_frame_bytes,
            max_connections_per_channel: self.max_connections_per_channel,
        }
    }
}

// ─── Loading ─────────────────────────────────────────────────────────────────

/// Pick the config file to read, if any.
///
/// Order: explicit path, then the env var, then `toolbridge.yaml` in `cwd`,
/// then `config.yaml` in the data directory. An explicit or env-var path
/// must exist; the two fallbacks are optional.
pub fn find_config_path(
    explicit: Option<&Path>,
    env_path: Option<PathBuf>,
    cwd: &Path,
    data_dir: Option<PathBuf>,
) -> Result<Option<PathBuf>, ConfigError> {
    if let Some(path) = explicit.map(Path::to_path_buf).or(env_path) {
        if path.is_file() {
            return Ok(Some(path));
        }
        return Err(ConfigError::NotFound { path });
    }

    let local = cwd.join(LOCAL_CONFIG_FILE);
    if local.is_file() {
        return Ok(Some(local));
    }

    Ok(data_dir
        .map(|dir| dir.join("config.yaml"))
        .filter(|candidate| candidate.is_file()))
}

/// Read and parse a config file, interpolating environment variables first.
pub fn load_file_config(path: &Path) -> Result<FileConfig, ConfigError> {
    let raw = std::fs::read_to_string(path).map_err(|e| ConfigError::Read {
        path: path.to_path_buf(),
        reason: e.to_string(),
    })?;

    let interpolated = interpolate_env_vars(&raw);
    if interpolated.trim().is_empty() {
        return Ok(FileConfig::default());
    }

    serde_yaml::from_str(&interpolated).map_err(|e| ConfigError::Parse {
        path: path.to_path_buf(),
        reason: e.to_string(),
    })
}

// ─── Env-var interpolation ───────────────────────────────────────────────────

/// Replace `${VAR}` and `${VAR:-default}` in a string.
fn interpolate_env_vars(input: &str) -> String {
    let mut result = String::with_capacity(input.len());
    let mut chars = input.chars().peekable();

    while let Some(ch) = chars.next() {
        if ch != '$' || chars.peek() != Some(&'{') {
            result.push(ch);
            continue;
        }
        chars.next();
        let expr: String = chars.by_ref().take_while(|c| *c != '}').collect();
        result.push_str(&resolve_var_expr(&expr));
    }

    result
}

fn resolve_var_expr(expr: &str) -> String {
    match expr.split_once(":-") {
        Some((name, default)) => std::env::var(name).unwrap_or_else(|_| expand_tilde(default)),
        None => std::env::var(expr).unwrap_or_default(),
    }
}

fn expand_tilde(path: &str) -> String {
    match (path.strip_prefix('~'), dirs::home_dir()) {
        (Some(rest), Some(home)) => format!("{}{rest}", home.display()),
        _ => path.to_string(),
    }
}

// ─── Tests ───────────────────────────────────────────────────────────────────

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_defaults() {
        let config = BridgeConfig::from_parts(FileConfig::default(), &CliOverrides::default()).unwrap();
        assert_eq!(config.channel, "Target");
        assert_eq!(config.port, 5010);
        assert_eq!(config.call_timeout(), Duration::from_secs(30));
        assert_eq!(config.discovery_timeout(), Duration::from_secs(3));
        assert_eq!(config.canonical_channel(), r"\\.\pipe\Target_MCP_Request");
        assert_eq!(config.bind_addr(), "127.0.0.1:5010");
        assert!(config.rediscover_interval().is_none());
    }

    #[test]
    fn test_cli_overrides_file() {
        let file: FileConfig = serde_yaml::from_str(
            r#"
            channel: FromFile
            port: 6000
            call_timeout_ms: 1000
            enabled_tools: [click, snap]
            "#,
        )
        .unwrap();
        let overrides = CliOverrides {
            channel: Some("FromCli".into()),
            ..CliOverrides::default()
        };

        let config = BridgeConfig::from_parts(file, &overrides).unwrap();
        assert_eq!(config.channel, "FromCli");
        assert_eq!(config.port, 6000);
        assert_eq!(config.call_timeout_ms, 1000);
        assert_eq!(
            config.enabled_tools,
            Some(vec!["click".to_string(), "snap".to_string()])
        );
    }

    #[test]
    fn test_unknown_field_rejected() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("bad.yaml");
        std::fs::write(&path, "chanel: Typo\n").unwrap();

        match load_file_config(&path) {
            Err(ConfigError::Parse { reason, .. }) => assert!(reason.contains("chanel")),
            other => panic!("expected parse error, got {other:?}"),
        }
    }

    #[test]
    fn test_validation_rejects_zero_values() {
        for yaml in ["port: 0", "call_timeout_ms: 0", "max_connections_per_channel: 0", "channel: '  '"] {
            let file: FileConfig = serde_yaml::from_str(yaml).unwrap();
            let result = BridgeConfig::from_parts(file, &CliOverrides::default());
            assert!(
                matches!(result, Err(ConfigError::Invalid { .. })),
                "{yaml} should be invalid"
            );
        }
    }

    #[test]
    fn test_load_file_with_env_interpolation() {
        std::env::set_var("__TOOLBRIDGE_TEST_CHANNEL__", "Notepad");
        std::env::remove_var("__TOOLBRIDGE_TEST_PORT__");

        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("toolbridge.yaml");
        std::fs::write(
            &path,
            "channel: ${__TOOLBRIDGE_TEST_CHANNEL__}\nport: ${__TOOLBRIDGE_TEST_PORT__:-7001}\n",
        )
        .unwrap();

        let file = load_file_config(&path).unwrap();
        assert_eq!(file.channel.as_deref(), Some("Notepad"));
        assert_eq!(file.port, Some(7001));
        std::env::remove_var("__TOOLBRIDGE_TEST_CHANNEL__");
    }

    #[test]
    fn test_empty_file_is_defaults() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("empty.yaml");
        std::fs::write(&path, "# nothing here\n").unwrap();
        assert!(load_file_config(&path).unwrap().channel.is_none());
    }

    #[test]
    fn test_find_config_path_order() {
        let cwd = tempfile::tempdir().unwrap();
        let data = tempfile::tempdir().unwrap();
        let data_config = data.path().join("config.yaml");
        std::fs::write(&data_config, "").unwrap();

        // Nothing local: falls through to the data dir.
        let found = find_config_path(None, None, cwd.path(), Some(data.path().to_path_buf())).unwrap();
        assert_eq!(found, Some(data_config.clone()));

        // A local file wins over the data dir.
        let local = cwd.path().join(LOCAL_CONFIG_FILE);
        std::fs::write(&local, "").unwrap();
        let found = find_config_path(None, None, cwd.path(), Some(data.path().to_path_buf())).unwrap();
        assert_eq!(found, Some(local));

        // An explicit path wins over everything.
        let found = find_config_path(Some(data_config.as_path()), None, cwd.path(), None).unwrap();
        assert_eq!(found, Some(data_config));
    }

    #[test]
    fn test_find_config_path_missing_explicit_is_error() {
        let cwd = tempfile::tempdir().unwrap();
        let missing = cwd.path().join("nope.yaml");

        assert!(matches!(
            find_config_path(Some(missing.as_path()), None, cwd.path(), None),
            Err(ConfigError::NotFound { .. })
        ));
        assert!(matches!(
            find_config_path(None, Some(missing), cwd.path(), None),
            Err(ConfigError::NotFound { .. })
        ));
        assert_eq!(find_config_path(None, None, cwd.path(), None).unwrap(), None);
    }

    #[test]
    fn test_interpolate_no_vars() {
        let input = "plain: text";
        assert_eq!(interpolate_env_vars(input), input);
    }

    #[test]
    fn test_expand_tilde() {
        let result = expand_tilde("~/sockets");
        assert!(!result.starts_with('~'));
        assert!(result.ends_with("/sockets"));
    }
}
