//! Device status and the module daemon's log.
use crate::bridge::{is_error_reply, CommandBridge};
use crate::protocol::{self, Action, CURRENT_FPS, SLOT_SUFFIX, VENDOR_MODEL};
use crate::settings::ModulePaths;
use anyhow::{bail, Result};
use serde::Serialize;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "snake_case")]
pub enum BackupState {
    Exists,
    Missing,
    /// Empty reply: the check itself failed or timed out.
    Unknown,
}

impl BackupState {
    pub fn from_reply(reply: &str) -> Self {
        let reply = reply.trim();
        if reply.is_empty() {
            BackupState::Unknown
        } else if reply.contains("EXIST") {
            BackupState::Exists
        } else {
            BackupState::Missing
        }
    }

    pub fn label(self) -> &'static str {
        match self {
            BackupState::Exists => "exists",
            BackupState::Missing => "not found",
            BackupState::Unknown => "unknown",
        }
    }
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct SystemStatus {
    pub slot: Option<String>,
    pub fps: Option<String>,
    pub model: Option<String>,
    pub backup: BackupState,
}

fn non_empty(reply: String) -> Option<String> {
    let reply = reply.trim();
    (!reply.is_empty() && !is_error_reply(reply)).then(|| reply.to_string())
}

/// `fps=120.0` -> `120.0`.
fn parse_fps(reply: &str) -> Option<String> {
    reply
        .split('=')
        .nth(1)
        .map(str::trim)
        .filter(|fps| !fps.is_empty())
        .map(str::to_string)
}

pub async fn load_status(bridge: &CommandBridge, paths: &ModulePaths) -> SystemStatus {
    let slot = non_empty(bridge.execute(SLOT_SUFFIX).await);
    let fps = non_empty(bridge.execute(CURRENT_FPS).await).and_then(|raw| parse_fps(&raw));
    let model = non_empty(bridge.execute(VENDOR_MODEL).await);
    let backup_reply = bridge
        .execute(&Action::CheckBackup.command_line(paths))
        .await;
    let backup = BackupState::from_reply(&backup_reply);
    tracing::debug!(?backup, reply = %backup_reply, "backup check");
    SystemStatus {
        slot,
        fps,
        model,
        backup,
    }
}

/// Last lines of the daemon log; `None` when empty or unreadable.
pub async fn read_log(bridge: &CommandBridge, paths: &ModulePaths) -> Option<String> {
    let content = bridge.execute(&protocol::tail_log(paths)).await;
    if content.trim().is_empty() || is_error_reply(&content) {
        return None;
    }
    Some(content)
}

/// Truncate the daemon log. An executor error comes back as the error text.
pub async fn clear_log(bridge: &CommandBridge, paths: &ModulePaths) -> Result<()> {
    let reply = bridge.execute(&protocol::clear_log(paths)).await;
    if is_error_reply(&reply) {
        tracing::warn!(reply = %reply, "clearing daemon log failed");
        bail!("{reply}");
    }
    Ok(())
}
