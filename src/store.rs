//! Global mode and per-app overrides backed by the module's `mode.txt`.
//!
//! File format:
//!
//! ```text
//! 2                  <- global mode id (absent or unparseable: unset)
//! com.example.game=5 <- one override per line
//! ```
//!
//! Writes go through the handler script one value at a time
//! (`set_config`, `set_app_config`); this module never rewrites the file.
use crate::bridge::{is_error_reply, CommandBridge};
use crate::outcome::Outcome;
use crate::protocol::{self, classify_result, Action, Verdict, SUCCESS_MARKERS};
use crate::settings::ModulePaths;
use serde::Serialize;
use std::collections::BTreeMap;

/// "No mode": an unset global mode, or an override meaning "use the global mode".
pub const UNSET_MODE: i64 = -1;

#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct Configuration {
    pub global_mode: i64,
    /// Raw overrides as read. May contain `-1`; see [`Configuration::effective_override`].
    pub overrides: BTreeMap<String, i64>,
}

impl Default for Configuration {
    fn default() -> Self {
        Self {
            global_mode: UNSET_MODE,
            overrides: BTreeMap::new(),
        }
    }
}

impl Configuration {
    /// Parse `mode.txt`. Malformed lines are skipped; for duplicate keys the
    /// last occurrence wins.
    pub fn load(text: &str) -> Self {
        let mut config = Configuration::default();
        let mut lines = text
            .lines()
            .map(str::trim)
            .filter(|line| !line.is_empty() && !line.starts_with('#'));

        // The first effective line is the global slot even when it does not parse.
        if let Some(first) = lines.next() {
            match first.parse::<i64>() {
                Ok(mode) => config.global_mode = mode,
                Err(_) => tracing::debug!(line = first, "global mode line is not a mode id"),
            }
        }
        for line in lines {
            config.apply_override_line(line);
        }
        config
    }

    fn apply_override_line(&mut self, line: &str) {
        let Some((package, value)) = line.split_once('=') else {
            return;
        };
        let package = package.trim();
        if package.is_empty() {
            return;
        }
        match value.trim().parse::<i64>() {
            Ok(mode) => {
                self.overrides.insert(package.to_string(), mode);
            }
            Err(_) => tracing::debug!(line, "skipping malformed override line"),
        }
    }

    pub fn global(&self) -> Option<i64> {
        (self.global_mode != UNSET_MODE).then_some(self.global_mode)
    }

    /// Override for `package`, treating a stored `-1` as no override.
    pub fn effective_override(&self, package: &str) -> Option<i64> {
        self.overrides
            .get(package)
            .copied()
            .filter(|mode| *mode != UNSET_MODE)
    }

    /// Mode the daemon applies for `package`: its override, else the global mode.
    pub fn mode_for(&self, package: &str) -> Option<i64> {
        self.effective_override(package).or_else(|| self.global())
    }

    /// Normalized overrides: `-1` entries are dropped.
    pub fn active_overrides(&self) -> impl Iterator<Item = (&str, i64)> {
        self.overrides
            .iter()
            .filter(|(_, mode)| **mode != UNSET_MODE)
            .map(|(package, mode)| (package.as_str(), *mode))
    }

    /// `-1` removes the entry instead of storing an explicit "no override".
    pub fn set_override(&mut self, package: &str, mode_id: i64) {
        if mode_id == UNSET_MODE {
            self.overrides.remove(package);
        } else {
            self.overrides.insert(package.to_string(), mode_id);
        }
    }
}

/// In-memory configuration plus the executor commands that persist it.
pub struct ConfigStore {
    bridge: CommandBridge,
    paths: ModulePaths,
    config: Configuration,
}

impl ConfigStore {
    pub fn new(bridge: CommandBridge, paths: ModulePaths) -> Self {
        Self {
            bridge,
            paths,
            config: Configuration::default(),
        }
    }

    pub fn config(&self) -> &Configuration {
        &self.config
    }

    /// Read `mode.txt` in full. An unreadable file reads as "nothing configured".
    pub async fn reload(&mut self) -> &Configuration {
        let raw = self.read_raw().await.unwrap_or_default();
        self.config = Configuration::load(&raw);
        &self.config
    }

    async fn read_raw(&self) -> Option<String> {
        let raw = self.bridge.execute(&protocol::read_config(&self.paths)).await;
        if raw.trim().is_empty() {
            return None;
        }
        if is_error_reply(&raw) {
            tracing::warn!(reply = %raw, "reading mode config failed");
            return None;
        }
        Some(raw)
    }

    /// Re-read after a successful write. An empty read keeps the optimistic state.
    async fn reconcile(&mut self) {
        match self.read_raw().await {
            Some(raw) => {
                let persisted = Configuration::load(&raw);
                if persisted != self.config {
                    tracing::warn!("persisted mode config differs from expected; using persisted");
                }
                self.config = persisted;
            }
            None => tracing::debug!("config re-read returned nothing; keeping in-memory state"),
        }
    }

    pub async fn set_global(&mut self, mode_id: i64) -> Outcome {
        if mode_id == UNSET_MODE {
            return Outcome::rejected("select a mode first");
        }
        let reply = self
            .bridge
            .execute(&Action::SetConfig { mode_id }.command_line(&self.paths))
            .await;
        match classify_result(&reply, SUCCESS_MARKERS) {
            Verdict::Success => {
                self.config.global_mode = mode_id;
                self.reconcile().await;
                let persisted = self.config.global_mode;
                if persisted != mode_id {
                    tracing::warn!(mode_id, persisted, "global mode not persisted as written");
                    return diverged(format!("global mode is {}", describe(Some(persisted))), reply);
                }
                tracing::info!(mode_id, "global mode saved");
                Outcome::completed(format!("global mode set to {mode_id}"))
            }
            Verdict::Failure | Verdict::Unknown => {
                Outcome::failed("saving global mode failed", reply)
            }
        }
    }

    pub async fn set_override(&mut self, package: &str, mode_id: i64) -> Outcome {
        let package = package.trim();
        if package.is_empty() {
            return Outcome::rejected("package name is empty");
        }
        let action = Action::SetAppConfig {
            package: package.to_string(),
            mode_id,
        };
        let reply = self.bridge.execute(&action.command_line(&self.paths)).await;
        match classify_result(&reply, SUCCESS_MARKERS) {
            Verdict::Success => {
                self.config.set_override(package, mode_id);
                self.reconcile().await;
                let expected = (mode_id != UNSET_MODE).then_some(mode_id);
                let persisted = self.config.effective_override(package);
                if persisted != expected {
                    tracing::warn!(package, mode_id, ?persisted, "app override not persisted as written");
                    return diverged(format!("{package} override is {}", describe(persisted)), reply);
                }
                tracing::info!(package, mode_id, "app override saved");
                if mode_id == UNSET_MODE {
                    Outcome::completed(format!("{package} follows the global mode"))
                } else {
                    Outcome::completed(format!("{package} set to mode {mode_id}"))
                }
            }
            Verdict::Failure | Verdict::Unknown => {
                Outcome::failed(format!("saving {package} failed"), reply)
            }
        }
    }
}

/// The executor reported success but the re-read file holds another value.
fn diverged(persisted: String, reply: String) -> Outcome {
    Outcome::Partial {
        message: format!("executor reported success but {persisted} on disk"),
        detail: reply,
    }
}

fn describe(mode: Option<i64>) -> String {
    match mode {
        Some(UNSET_MODE) | None => "unset".to_string(),
        Some(mode) => format!("mode {mode}"),
    }
}

#[cfg(test)]
#[path = "store_tests.rs"]
mod tests;
