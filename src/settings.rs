//! Settings for the tool itself (not the device-side `mode.txt`).
//!
//! Settings are resolved in priority order:
//! 1. `--config <path>` on the command line
//! 2. `$XDG_CONFIG_HOME/rbench/config.json` when it exists
//! 3. built-in defaults
//!
//! `RBENCH_MODULE_DIR` and `RBENCH_SHELL` override the corresponding fields
//! after the file is loaded.
use anyhow::{anyhow, Context, Result};
use serde::{Deserialize, Serialize};
use std::env;
use std::fs;
use std::path::{Path, PathBuf};
use std::time::Duration;

pub const DEFAULT_MODULE_ID: &str = "murongchaopin";
pub const DEFAULT_TIMEOUT_MS: u64 = 15_000;
pub const DEFAULT_LABEL_CONCURRENCY: usize = 3;
pub const DEFAULT_LABEL_BATCH_SIZE: usize = 50;
pub const DEFAULT_LABEL_PAUSE_MS: u64 = 50;

const CONFIG_FILE_NAME: &str = "config.json";
const CONFIG_DIR_NAME: &str = "rbench";
const MODULE_DIR_ENV: &str = "RBENCH_MODULE_DIR";
const SHELL_ENV: &str = "RBENCH_SHELL";

#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
#[serde(default, deny_unknown_fields)]
pub struct Settings {
    /// Module identifier used to derive the default module directory.
    pub module_id: String,
    /// Module root on the device; derived from `module_id` when unset.
    pub module_dir: Option<PathBuf>,
    /// Shell that runs each command line (`sh -c <line>`).
    pub shell: String,
    /// Optional privilege wrapper placed before the shell, e.g. `su -c`.
    pub privilege_prefix: Option<String>,
    /// Per-call executor timeout.
    pub timeout_ms: u64,
    pub label_concurrency: usize,
    pub label_batch_size: usize,
    pub label_pause_ms: u64,
}

impl Default for Settings {
    fn default() -> Self {
        Self {
            module_id: DEFAULT_MODULE_ID.to_string(),
            module_dir: None,
            shell: "sh".to_string(),
            privilege_prefix: None,
            timeout_ms: DEFAULT_TIMEOUT_MS,
            label_concurrency: DEFAULT_LABEL_CONCURRENCY,
            label_batch_size: DEFAULT_LABEL_BATCH_SIZE,
            label_pause_ms: DEFAULT_LABEL_PAUSE_MS,
        }
    }
}

/// Device-side paths derived from the module root.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ModulePaths {
    root: PathBuf,
}

impl ModulePaths {
    pub fn new(root: PathBuf) -> Self {
        Self { root }
    }

    pub fn root(&self) -> &Path {
        &self.root
    }

    pub fn config_file(&self) -> PathBuf {
        self.root.join("config").join("mode.txt")
    }

    pub fn log_file(&self) -> PathBuf {
        self.root.join("daemon.log")
    }

    pub fn handler_script(&self) -> PathBuf {
        self.root.join("scripts").join("web_handler.sh")
    }
}

impl Settings {
    /// Load settings from an explicit path, the default location, or defaults.
    pub fn load(explicit: Option<&Path>) -> Result<Self> {
        let mut settings = match explicit {
            Some(path) => Self::from_file(path)?,
            None => match default_config_path().filter(|path| path.is_file()) {
                Some(path) => Self::from_file(&path)?,
                None => Self::default(),
            },
        };
        settings.apply_env_overrides();
        settings.validate()?;
        Ok(settings)
    }

    pub fn from_file(path: &Path) -> Result<Self> {
        let bytes = fs::read(path).with_context(|| format!("read settings {}", path.display()))?;
        let settings: Settings = serde_json::from_slice(&bytes)
            .with_context(|| format!("parse settings JSON {}", path.display()))?;
        Ok(settings)
    }

    fn apply_env_overrides(&mut self) {
        if let Some(dir) = env::var_os(MODULE_DIR_ENV).filter(|value| !value.is_empty()) {
            self.module_dir = Some(PathBuf::from(dir));
        }
        if let Ok(shell) = env::var(SHELL_ENV) {
            let shell = shell.trim();
            if !shell.is_empty() {
                self.shell = shell.to_string();
            }
        }
    }

    pub fn validate(&self) -> Result<()> {
        if self.module_id.trim().is_empty() && self.module_dir.is_none() {
            return Err(anyhow!("module_id must be set when module_dir is absent"));
        }
        if self.shell.trim().is_empty() {
            return Err(anyhow!("shell must not be empty"));
        }
        if self.timeout_ms == 0 {
            return Err(anyhow!("timeout_ms must be > 0"));
        }
        if self.label_concurrency == 0 {
            return Err(anyhow!("label_concurrency must be >= 1"));
        }
        if self.label_batch_size == 0 {
            return Err(anyhow!("label_batch_size must be >= 1"));
        }
        if let Some(prefix) = &self.privilege_prefix {
            shell_words::split(prefix)
                .with_context(|| format!("parse privilege_prefix: {prefix}"))?;
        }
        Ok(())
    }

    pub fn module_paths(&self) -> ModulePaths {
        let root = self
            .module_dir
            .clone()
            .unwrap_or_else(|| PathBuf::from("/data/adb/modules").join(&self.module_id));
        ModulePaths::new(root)
    }

    pub fn timeout(&self) -> Duration {
        Duration::from_millis(self.timeout_ms)
    }

    pub fn label_pause(&self) -> Duration {
        Duration::from_millis(self.label_pause_ms)
    }
}

fn default_config_path() -> Option<PathBuf> {
    dirs::config_dir().map(|dir| dir.join(CONFIG_DIR_NAME).join(CONFIG_FILE_NAME))
}
