//! Configuration loader
//!
//! Loads pipeline configuration from environment variables or files.
//!
//! ## Loading Strategy
//! 1. First, attempts to load from environment variables
//! 2. If no `CACHESYNC_` variables are set, falls back to loading from file
//! 3. Probes multiple paths for config files
//! 4. Supports JSON and TOML formats
//!
//! ## Environment Variables
//! Every variable is optional; unset values keep their defaults. At
//! least one must be present for the environment to count as a source.
//! - `CACHESYNC_MODE`: `local`, `distributed`, `hybrid`, `disabled`, `auto`
//! - `CACHESYNC_PROVIDER`: `local`, `in_process`, `auto`
//! - `CACHESYNC_NODE_ID`: This node's cluster identifier
//! - `CACHESYNC_RETRY_MAX_ATTEMPTS`: Broadcast attempts before dead-lettering
//! - `CACHESYNC_RETRY_INITIAL_BACKOFF_MS`: First retry delay
//! - `CACHESYNC_RETRY_MAX_BACKOFF_MS`: Upper bound on any retry delay
//! - `CACHESYNC_RETRY_DEAD_LETTER_CAPACITY`: Dead-letter queue bound
//! - `CACHESYNC_BATCH_MAX_SIZE`: Batch window early-flush threshold
//!
//! ## File Locations
//! The loader probes `./cachesync.{json,toml}` and `./config.{json,toml}`
//! in the working directory and up to two parent directories, then the
//! same names next to the executable.

use std::path::{Path, PathBuf};

use cachesync_domain::{CacheSyncConfig, CacheSyncError, Result};
use tracing::instrument;

/// Load configuration with automatic fallback strategy
///
/// First attempts to load from environment variables. If none are set,
/// falls back to loading from a config file; if no file exists either,
/// returns the defaults.
#[instrument]
pub fn load() -> Result<CacheSyncConfig> {
    match load_from_env() {
        Ok(config) => {
            tracing::info!("Configuration loaded from environment variables");
            Ok(config)
        }
        Err(e) => {
            tracing::debug!(error = ?e, "No environment configuration, trying file");
            match load_from_file(None) {
                Ok(config) => Ok(config),
                Err(_) => {
                    tracing::info!("No configuration source found, using defaults");
                    Ok(CacheSyncConfig::default())
                }
            }
        }
    }
}

/// Load configuration from `CACHESYNC_` environment variables
///
/// All variables are optional overrides on top of the defaults, but at
/// least one must be set; otherwise this source reports itself absent
/// so the caller can fall through to a config file.
///
/// # Errors
/// Returns `CacheSyncError::Config` if no variables are set or any set
/// variable has an invalid value.
pub fn load_from_env() -> Result<CacheSyncConfig> {
    let mut config = CacheSyncConfig::default();
    let mut any_set = false;

    if let Ok(mode) = std::env::var("CACHESYNC_MODE") {
        config.mode = mode.parse()?;
        any_set = true;
    }
    if let Ok(provider) = std::env::var("CACHESYNC_PROVIDER") {
        config.provider = provider.parse()?;
        any_set = true;
    }
    if let Ok(node_id) = std::env::var("CACHESYNC_NODE_ID") {
        if node_id.is_empty() {
            return Err(CacheSyncError::Config("CACHESYNC_NODE_ID is empty".to_string()));
        }
        config.node_id = node_id;
        any_set = true;
    }
    if let Some(attempts) = env_parse::<u32>("CACHESYNC_RETRY_MAX_ATTEMPTS")? {
        config.retry.max_attempts = attempts;
        any_set = true;
    }
    if let Some(backoff) = env_parse::<u64>("CACHESYNC_RETRY_INITIAL_BACKOFF_MS")? {
        config.retry.initial_backoff_ms = backoff;
        any_set = true;
    }
    if let Some(max_backoff) = env_parse::<u64>("CACHESYNC_RETRY_MAX_BACKOFF_MS")? {
        config.retry.max_backoff_ms = max_backoff;
        any_set = true;
    }
    if let Some(capacity) = env_parse::<usize>("CACHESYNC_RETRY_DEAD_LETTER_CAPACITY")? {
        config.retry.dead_letter_capacity = capacity;
        any_set = true;
    }
    if let Some(batch) = env_parse::<usize>("CACHESYNC_BATCH_MAX_SIZE")? {
        config.batch.max_batch_size = batch;
        any_set = true;
    }

    if !any_set {
        return Err(CacheSyncError::Config(
            "No CACHESYNC_ environment variables set".to_string(),
        ));
    }
    Ok(config)
}

/// Load configuration from a file
///
/// If `path` is `None`, probes multiple locations for config files.
/// Supports both JSON and TOML formats (detected by file extension).
///
/// # Errors
/// Returns `CacheSyncError::Config` if:
/// - File not found (when path is specified)
/// - No config file found (when path is `None`)
/// - File format is invalid
#[instrument]
pub fn load_from_file(path: Option<PathBuf>) -> Result<CacheSyncConfig> {
    let config_path = match path {
        Some(p) => {
            if !p.exists() {
                return Err(CacheSyncError::Config(format!(
                    "Config file not found: {}",
                    p.display()
                )));
            }
            p
        }
        None => probe_config_paths().ok_or_else(|| {
            CacheSyncError::Config(
                "No config file found in any of the standard locations".to_string(),
            )
        })?,
    };

    tracing::info!(path = %config_path.display(), "Loading configuration from file");

    let contents = std::fs::read_to_string(&config_path)
        .map_err(|e| CacheSyncError::Config(format!("Failed to read config file: {}", e)))?;

    parse_config(&contents, &config_path)
}

/// Parse configuration from string content, format detected by extension.
fn parse_config(contents: &str, path: &Path) -> Result<CacheSyncConfig> {
    let extension = path.extension().and_then(|e| e.to_str()).unwrap_or("json");

    match extension {
        "toml" => toml::from_str(contents)
            .map_err(|e| CacheSyncError::Config(format!("Invalid TOML format: {}", e))),
        "json" => serde_json::from_str(contents)
            .map_err(|e| CacheSyncError::Config(format!("Invalid JSON format: {}", e))),
        _ => Err(CacheSyncError::Config(format!("Unsupported config format: {}", extension))),
    }
}

/// Probe multiple paths for configuration files
///
/// # Returns
/// The first config file found, or `None` if no file exists.
pub fn probe_config_paths() -> Option<PathBuf> {
    let mut candidates = Vec::new();

    if let Ok(cwd) = std::env::current_dir() {
        candidates.extend(vec![
            cwd.join("cachesync.json"),
            cwd.join("cachesync.toml"),
            cwd.join("config.json"),
            cwd.join("config.toml"),
            cwd.join("../cachesync.json"),
            cwd.join("../cachesync.toml"),
            cwd.join("../../cachesync.json"),
            cwd.join("../../cachesync.toml"),
        ]);
    }

    if let Ok(exe_path) = std::env::current_exe() {
        if let Some(exe_dir) = exe_path.parent() {
            candidates.extend(vec![
                exe_dir.join("cachesync.json"),
                exe_dir.join("cachesync.toml"),
                exe_dir.join("config.json"),
                exe_dir.join("config.toml"),
            ]);
        }
    }

    candidates.into_iter().find(|path| path.exists())
}

fn env_parse<T: std::str::FromStr>(key: &str) -> Result<Option<T>>
where
    T::Err: std::fmt::Display,
{
    match std::env::var(key) {
        Ok(value) => value
            .parse::<T>()
            .map(Some)
            .map_err(|e| CacheSyncError::Config(format!("Invalid {}: {}", key, e))),
        Err(_) => Ok(None),
    }
}

#[cfg(test)]
mod tests {
    use std::io::Write;
    use std::sync::Mutex;

    use cachesync_domain::{CacheMode, ProviderKind};
    use once_cell::sync::Lazy;
    use tempfile::NamedTempFile;

    use super::*;

    static ENV_LOCK: Lazy<Mutex<()>> = Lazy::new(|| Mutex::new(()));

    const ALL_VARS: &[&str] = &[
        "CACHESYNC_MODE",
        "CACHESYNC_PROVIDER",
        "CACHESYNC_NODE_ID",
        "CACHESYNC_RETRY_MAX_ATTEMPTS",
        "CACHESYNC_RETRY_INITIAL_BACKOFF_MS",
        "CACHESYNC_RETRY_MAX_BACKOFF_MS",
        "CACHESYNC_RETRY_DEAD_LETTER_CAPACITY",
        "CACHESYNC_BATCH_MAX_SIZE",
    ];

    fn clear_env() {
        for var in ALL_VARS {
            std::env::remove_var(var);
        }
    }

    #[test]
    fn test_load_from_env_overrides_defaults() {
        let _guard = ENV_LOCK.lock().expect("env mutex poisoned");
        clear_env();

        std::env::set_var("CACHESYNC_MODE", "distributed");
        std::env::set_var("CACHESYNC_PROVIDER", "in_process");
        std::env::set_var("CACHESYNC_NODE_ID", "node-test");
        std::env::set_var("CACHESYNC_RETRY_MAX_ATTEMPTS", "5");

        let config = load_from_env().expect("env config should load");
        assert_eq!(config.mode, CacheMode::Distributed);
        assert_eq!(config.provider, ProviderKind::InProcess);
        assert_eq!(config.node_id, "node-test");
        assert_eq!(config.retry.max_attempts, 5);
        // Untouched values keep their defaults.
        assert_eq!(config.batch.max_batch_size, 100);

        clear_env();
    }

    #[test]
    fn test_load_from_env_nothing_set_is_absent() {
        let _guard = ENV_LOCK.lock().expect("env mutex poisoned");
        clear_env();

        let result = load_from_env();
        assert!(result.is_err(), "Should report absence with no vars set");
        assert!(matches!(result.unwrap_err(), CacheSyncError::Config(_)));
    }

    #[test]
    fn test_load_from_env_invalid_value() {
        let _guard = ENV_LOCK.lock().expect("env mutex poisoned");
        clear_env();

        std::env::set_var("CACHESYNC_MODE", "sideways");
        let result = load_from_env();
        assert!(result.is_err(), "Should fail with invalid mode");

        clear_env();
        std::env::set_var("CACHESYNC_RETRY_MAX_ATTEMPTS", "not-a-number");
        let result = load_from_env();
        assert!(result.is_err(), "Should fail with invalid number");

        clear_env();
    }

    #[test]
    fn test_load_from_file_toml() {
        let toml_content = r#"
mode = "hybrid"
provider = "in_process"
node_id = "node-from-file"

[retry]
max_attempts = 4
initial_backoff_ms = 50
backoff_multiplier = 3.0
max_backoff_ms = 10000
dead_letter_capacity = 500

[batch]
max_batch_size = 25
"#;

        let mut temp_file = NamedTempFile::new().unwrap();
        temp_file.write_all(toml_content.as_bytes()).unwrap();
        let path = temp_file.path().with_extension("toml");
        std::fs::copy(temp_file.path(), &path).unwrap();

        let config = load_from_file(Some(path.clone())).expect("should load TOML config");
        assert_eq!(config.mode, CacheMode::Hybrid);
        assert_eq!(config.node_id, "node-from-file");
        assert_eq!(config.retry.max_attempts, 4);
        assert_eq!(config.batch.max_batch_size, 25);

        std::fs::remove_file(path).ok();
    }

    #[test]
    fn test_load_from_file_json_partial() {
        let json_content = r#"{ "mode": "local", "node_id": "n1" }"#;

        let mut temp_file = NamedTempFile::new().unwrap();
        temp_file.write_all(json_content.as_bytes()).unwrap();
        let path = temp_file.path().with_extension("json");
        std::fs::copy(temp_file.path(), &path).unwrap();

        let config = load_from_file(Some(path.clone())).expect("should load JSON config");
        assert_eq!(config.mode, CacheMode::Local);
        assert_eq!(config.node_id, "n1");
        assert_eq!(config.retry.max_attempts, 3);

        std::fs::remove_file(path).ok();
    }

    #[test]
    fn test_load_from_file_not_found() {
        let result = load_from_file(Some(PathBuf::from("/nonexistent/cachesync.json")));
        assert!(result.is_err(), "Should fail when file not found");
        assert!(matches!(result.unwrap_err(), CacheSyncError::Config(_)));
    }

    #[test]
    fn test_parse_config_unsupported_format() {
        let result = parse_config("mode: local", &PathBuf::from("test.yaml"));
        assert!(result.is_err(), "Should fail with unsupported format");
    }
}
