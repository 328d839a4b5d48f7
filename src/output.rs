//! Plain-text and JSON rendering of session results for the CLI.
use crate::apps::AppEntry;
use crate::catalog::{describe_mode, mode_label, DisplayMode, ResolutionClass};
use crate::device::SystemStatus;
use crate::outcome::Outcome;
use crate::store::Configuration;
use crate::workbench::RateNode;
use anyhow::{Context, Result};
use serde::Serialize;
use std::fmt::Write as _;

const PENDING_LABEL: &str = "(loading)";
const UNKNOWN: &str = "unknown";

pub fn to_json<T: Serialize + ?Sized>(value: &T) -> Result<String> {
    serde_json::to_string_pretty(value).context("serialize JSON output")
}

pub fn render_status(status: &SystemStatus) -> String {
    let mut out = String::new();
    let field = |value: &Option<String>| value.clone().unwrap_or_else(|| UNKNOWN.to_string());
    let _ = writeln!(out, "slot:    {}", field(&status.slot));
    let _ = writeln!(out, "fps:     {}", field(&status.fps));
    let _ = writeln!(out, "model:   {}", field(&status.model));
    let _ = writeln!(out, "backup:  {}", status.backup.label());
    out
}

/// `modes` is `None` when the catalog never loaded.
pub fn render_modes(
    modes: Option<&[DisplayMode]>,
    class: Option<ResolutionClass>,
    config: &Configuration,
) -> String {
    let Some(modes) = modes else {
        return "display modes not loaded (no executor output)\n".to_string();
    };
    let mut out = String::new();
    let heading = class.map_or("all", ResolutionClass::label);
    let _ = writeln!(out, "modes ({heading}):");
    if modes.is_empty() {
        let _ = writeln!(out, "  none in this class");
    }
    for mode in modes {
        let marker = if config.global() == Some(mode.id) { "*" } else { " " };
        let _ = writeln!(
            out,
            "{marker} ID: {} | {}x{} | {}",
            mode.id,
            mode.width_px,
            mode.height_px,
            mode_label(mode)
        );
    }
    out
}

pub fn render_apps(entries: &[&AppEntry], modes: &[DisplayMode]) -> String {
    if entries.is_empty() {
        return "no matching apps\n".to_string();
    }
    let mut out = String::new();
    for entry in entries {
        let label = entry.label.as_deref().unwrap_or(PENDING_LABEL);
        let mode = entry
            .mode_id
            .map_or_else(|| "default".to_string(), |id| describe_mode(id, modes));
        let _ = writeln!(out, "{label}\n  {}  [{mode}]", entry.package_name);
    }
    out
}

pub fn render_nodes(nodes: &[RateNode], base: Option<&str>) -> String {
    if nodes.is_empty() {
        return "no refresh-rate nodes\n".to_string();
    }
    let mut out = String::new();
    for node in nodes {
        let marker = if base == Some(node.node.as_str()) { "*" } else { " " };
        let _ = writeln!(
            out,
            "{marker} {:>4} Hz  {:<12} {:<24} {}",
            node.fps, node.clock, node.file, node.node
        );
    }
    out
}

pub fn render_outcome(outcome: &Outcome) -> String {
    match outcome {
        Outcome::Partial { .. } => format!("partially completed: {outcome}\n"),
        Outcome::Failed { .. } => format!("failed: {outcome}\n"),
        Outcome::Rejected { .. } => format!("rejected: {outcome}\n"),
        Outcome::Completed { .. } | Outcome::Declined => format!("{outcome}\n"),
    }
}
