//! Third-party package list and search.
use crate::bridge::{is_error_reply, CommandBridge};
use crate::catalog::DisplayMode;
use crate::labels::LabelResolver;
use crate::protocol::LIST_PACKAGES;
use crate::store::Configuration;
use serde::Serialize;
use std::collections::BTreeSet;

/// One row of the app list.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct AppEntry {
    pub package_name: String,
    /// `None` while label resolution is pending.
    pub label: Option<String>,
    /// Effective override; `None` follows the global mode.
    pub mode_id: Option<i64>,
}

/// Parse `pm list packages` output. Order is kept, duplicates dropped.
pub fn parse_package_list(raw: &str) -> Vec<String> {
    if is_error_reply(raw) {
        tracing::warn!(reply = raw, "listing packages failed");
        return Vec::new();
    }
    let mut seen = BTreeSet::new();
    raw.lines()
        .map(str::trim)
        .map(|line| line.strip_prefix("package:").unwrap_or(line).trim())
        .filter(|package| !package.is_empty())
        .filter(|package| seen.insert(package.to_string()))
        .map(str::to_string)
        .collect()
}

pub async fn list_packages(bridge: &CommandBridge) -> Vec<String> {
    parse_package_list(&bridge.execute(LIST_PACKAGES).await)
}

/// Join packages with their current label and override.
pub fn build_entries(
    packages: &[String],
    labels: &LabelResolver,
    config: &Configuration,
) -> Vec<AppEntry> {
    packages
        .iter()
        .map(|package| AppEntry {
            package_name: package.clone(),
            label: labels.label(package),
            mode_id: config.effective_override(package),
        })
        .collect()
}

/// Case-insensitive match on package name, label, or the refresh rate of
/// the app's override mode.
pub fn matches_search(entry: &AppEntry, term: &str, modes: &[DisplayMode]) -> bool {
    let term = term.trim().to_lowercase();
    if term.is_empty() {
        return true;
    }
    if entry.package_name.to_lowercase().contains(&term) {
        return true;
    }
    if entry
        .label
        .as_deref()
        .is_some_and(|label| label.to_lowercase().contains(&term))
    {
        return true;
    }
    entry
        .mode_id
        .and_then(|id| modes.iter().find(|mode| mode.id == id))
        .is_some_and(|mode| mode.refresh_hz.to_string().contains(&term))
}

pub fn search<'a>(
    entries: &'a [AppEntry],
    term: &str,
    modes: &[DisplayMode],
) -> Vec<&'a AppEntry> {
    entries
        .iter()
        .filter(|entry| matches_search(entry, term, modes))
        .collect()
}
