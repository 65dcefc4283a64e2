//! Configuration file management for feather.
//!
//! Provides a TOML-based config file at `~/.config/feather/config.toml` and
//! a resolution chain: CLI flag > env var > config file > default.

use std::path::PathBuf;
use std::time::Duration;

use anyhow::{Context, Result};
use serde::{Deserialize, Serialize};
use tracing::debug;

use feather_core::launcher::DEFAULT_WORKER;

pub const WORKER_ENV: &str = "FEATHER_WORKER";
pub const HANDOFF_DIR_ENV: &str = "FEATHER_HANDOFF_DIR";

// -----------------------------------------------------------------------
// Config file types
// -----------------------------------------------------------------------

#[derive(Debug, Default, Serialize, Deserialize)]
pub struct ConfigFile {
    #[serde(default)]
    pub worker: WorkerSection,
    #[serde(default)]
    pub handoff: HandoffSection,
}

#[derive(Debug, Default, Serialize, Deserialize)]
pub struct WorkerSection {
    /// Worker executable; a bare name is looked up on `$PATH`.
    pub executable: Option<PathBuf>,
    /// Tee the worker's output into the handoff directory.
    #[serde(default)]
    pub with_log: bool,
    pub timeout_secs: Option<u64>,
}

#[derive(Debug, Default, Serialize, Deserialize)]
pub struct HandoffSection {
    pub dir: Option<PathBuf>,
}

// -----------------------------------------------------------------------
// Paths
// -----------------------------------------------------------------------

/// Return the feather config directory.
///
/// Always uses XDG layout: `$XDG_CONFIG_HOME/feather` or `~/.config/feather`.
pub fn config_dir() -> PathBuf {
    if let Ok(xdg) = std::env::var("XDG_CONFIG_HOME") {
        return PathBuf::from(xdg).join("feather");
    }
    dirs::home_dir()
        .unwrap_or_else(|| PathBuf::from("."))
        .join(".config")
        .join("feather")
}

/// Return the path to the feather config file.
pub fn config_path() -> PathBuf {
    config_dir().join("config.toml")
}

// -----------------------------------------------------------------------
// Read / write
// -----------------------------------------------------------------------

/// Load and parse the config file. Returns an error if it does not exist.
pub fn load_config() -> Result<ConfigFile> {
    let path = config_path();
    let contents = std::fs::read_to_string(&path)
        .with_context(|| format!("failed to read config file at {}", path.display()))?;
    let config: ConfigFile = toml::from_str(&contents)
        .with_context(|| format!("failed to parse config file at {}", path.display()))?;
    Ok(config)
}

/// Serialize and write the config file, creating parent dirs as needed.
pub fn save_config(config: &ConfigFile) -> Result<()> {
    let path = config_path();
    let dir = config_dir();
    std::fs::create_dir_all(&dir)
        .with_context(|| format!("failed to create config directory {}", dir.display()))?;

    let contents = toml::to_string_pretty(config).context("failed to serialize config")?;
    std::fs::write(&path, &contents)
        .with_context(|| format!("failed to write config file at {}", path.display()))?;

    Ok(())
}

// -----------------------------------------------------------------------
// Resolved config
// -----------------------------------------------------------------------

/// Fully resolved configuration, ready for use.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct FeatherConfig {
    pub worker: PathBuf,
    pub handoff_dir: PathBuf,
    pub with_log: bool,
    pub timeout: Option<Duration>,
}

impl FeatherConfig {
    /// Resolve configuration using the chain: CLI flag > env var > config file > default.
    ///
    /// - Worker: `cli_worker` > `FEATHER_WORKER` env > `worker.executable` > `cotton`
    /// - Handoff dir: `cli_handoff_dir` > `FEATHER_HANDOFF_DIR` env > `handoff.dir` > system temp dir
    ///
    /// A config file that exists but does not parse is an error; a missing
    /// one is not.
    pub fn resolve(cli_worker: Option<PathBuf>, cli_handoff_dir: Option<PathBuf>) -> Result<Self> {
        let file_config = if config_path().exists() {
            load_config()?
        } else {
            ConfigFile::default()
        };

        let worker = if let Some(path) = cli_worker {
            path
        } else if let Ok(path) = std::env::var(WORKER_ENV) {
            PathBuf::from(path)
        } else if let Some(ref path) = file_config.worker.executable {
            path.clone()
        } else {
            PathBuf::from(DEFAULT_WORKER)
        };

        let handoff_dir = if let Some(dir) = cli_handoff_dir {
            dir
        } else if let Ok(dir) = std::env::var(HANDOFF_DIR_ENV) {
            PathBuf::from(dir)
        } else if let Some(ref dir) = file_config.handoff.dir {
            dir.clone()
        } else {
            std::env::temp_dir()
        };

        let resolved = Self {
            worker,
            handoff_dir,
            with_log: file_config.worker.with_log,
            timeout: file_config.worker.timeout_secs.map(Duration::from_secs),
        };
        debug!(
            worker = %resolved.worker.display(),
            handoff_dir = %resolved.handoff_dir.display(),
            "resolved configuration"
        );
        Ok(resolved)
    }
}

// -----------------------------------------------------------------------
// Tests
// -----------------------------------------------------------------------

#[cfg(test)]
mod tests {
    use super::*;

    fn lock_env() -> std::sync::MutexGuard<'static, ()> {
        crate::test_util::lock_env()
    }

    /// Point XDG_CONFIG_HOME at a fresh directory and clear feather's vars.
    fn isolated_env() -> tempfile::TempDir {
        let tmp = tempfile::TempDir::new().unwrap();
        unsafe { std::env::set_var("XDG_CONFIG_HOME", tmp.path()) };
        unsafe { std::env::remove_var(WORKER_ENV) };
        unsafe { std::env::remove_var(HANDOFF_DIR_ENV) };
        tmp
    }

    fn restore_env() {
        unsafe { std::env::remove_var("XDG_CONFIG_HOME") };
        unsafe { std::env::remove_var(WORKER_ENV) };
        unsafe { std::env::remove_var(HANDOFF_DIR_ENV) };
    }

    #[test]
    fn config_file_roundtrip() {
        let original = ConfigFile {
            worker: WorkerSection {
                executable: Some(PathBuf::from("/opt/cotton/bin/cotton")),
                with_log: true,
                timeout_secs: Some(3600),
            },
            handoff: HandoffSection {
                dir: Some(PathBuf::from("/var/tmp/feather")),
            },
        };

        let contents = toml::to_string_pretty(&original).unwrap();
        let loaded: ConfigFile = toml::from_str(&contents).unwrap();

        assert_eq!(loaded.worker.executable, original.worker.executable);
        assert!(loaded.worker.with_log);
        assert_eq!(loaded.worker.timeout_secs, Some(3600));
        assert_eq!(loaded.handoff.dir, original.handoff.dir);
    }

    #[test]
    fn sections_are_optional() {
        let loaded: ConfigFile = toml::from_str("[worker]\nexecutable = \"cotton\"\n").unwrap();
        assert_eq!(loaded.worker.executable, Some(PathBuf::from("cotton")));
        assert!(!loaded.worker.with_log);
        assert!(loaded.handoff.dir.is_none());
    }

    #[test]
    fn resolve_defaults_when_nothing_set() {
        let _lock = lock_env();
        let _tmp = isolated_env();

        let config = FeatherConfig::resolve(None, None);
        restore_env();

        let config = config.unwrap();
        assert_eq!(config.worker, PathBuf::from(DEFAULT_WORKER));
        assert_eq!(config.handoff_dir, std::env::temp_dir());
        assert!(!config.with_log);
        assert_eq!(config.timeout, None);
    }

    #[test]
    fn resolve_with_cli_flag_overrides_all() {
        let _lock = lock_env();
        let _tmp = isolated_env();
        unsafe { std::env::set_var(WORKER_ENV, "/env/cotton") };
        unsafe { std::env::set_var(HANDOFF_DIR_ENV, "/env/handoff") };

        let config = FeatherConfig::resolve(
            Some(PathBuf::from("/cli/cotton")),
            Some(PathBuf::from("/cli/handoff")),
        );
        restore_env();

        let config = config.unwrap();
        assert_eq!(config.worker, PathBuf::from("/cli/cotton"));
        assert_eq!(config.handoff_dir, PathBuf::from("/cli/handoff"));
    }

    #[test]
    fn resolve_with_env_var_overrides_config_file() {
        let _lock = lock_env();
        let _tmp = isolated_env();
        save_config(&ConfigFile {
            worker: WorkerSection {
                executable: Some(PathBuf::from("/file/cotton")),
                with_log: true,
                timeout_secs: Some(60),
            },
            handoff: HandoffSection {
                dir: Some(PathBuf::from("/file/handoff")),
            },
        })
        .unwrap();
        unsafe { std::env::set_var(WORKER_ENV, "/env/cotton") };

        let config = FeatherConfig::resolve(None, None);
        restore_env();

        let config = config.unwrap();
        assert_eq!(config.worker, PathBuf::from("/env/cotton"));
        assert_eq!(config.handoff_dir, PathBuf::from("/file/handoff"));
        assert!(config.with_log);
        assert_eq!(config.timeout, Some(Duration::from_secs(60)));
    }

    #[test]
    fn resolve_rejects_malformed_config_file() {
        let _lock = lock_env();
        let tmp = isolated_env();
        let dir = tmp.path().join("feather");
        std::fs::create_dir_all(&dir).unwrap();
        std::fs::write(dir.join("config.toml"), "[worker\nexecutable = 3").unwrap();

        let result = FeatherConfig::resolve(None, None);
        restore_env();

        let msg = format!("{:#}", result.unwrap_err());
        assert!(msg.contains("failed to parse config file"), "unexpected error: {msg}");
    }

    #[test]
    fn config_path_ends_with_expected_filename() {
        let path = config_path();
        assert!(
            path.ends_with("feather/config.toml"),
            "unexpected config path: {}",
            path.display()
        );
    }
}
