//! DTBO workspace actions: scan, add, modify, remove, apply, plus the
//! flash/restore/maintenance actions of the module.
//!
//! Each action is one executor round-trip classified by substring markers
//! ([`crate::protocol::classify_result`]). That is a heuristic over free
//! text; the executor has no status codes.
//!
//! Destructive actions wait on [`Prompter::confirm`] before any executor
//! call. Declining yields [`Outcome::Declined`] and touches nothing.
mod prompt;
mod scan;

pub use prompt::{AutoConfirm, Prompter, TerminalPrompter};
pub use scan::{default_base, parse_scan_response, RateNode, PREFERRED_BASE_FPS};

use crate::bridge::CommandBridge;
use crate::outcome::Outcome;
use crate::protocol::{
    classify_result, Action, AdfrMode, FLASH_SUCCESS_MARKERS, NODE_SUCCESS_MARKERS,
    SUCCESS_MARKERS,
};
use crate::settings::ModulePaths;
use std::sync::Arc;
use std::time::{Duration, Instant};

/// Yield after a confirmation so the prompt can close.
const AFTER_CONFIRM_PAUSE: Duration = Duration::from_millis(100);
/// Yield after a progress notice so it can render.
const AFTER_NOTICE_PAUSE: Duration = Duration::from_millis(50);

pub struct Workbench {
    bridge: CommandBridge,
    paths: ModulePaths,
    prompter: Arc<dyn Prompter>,
    nodes: Vec<RateNode>,
    base: Option<String>,
}

impl Workbench {
    pub fn new(bridge: CommandBridge, paths: ModulePaths, prompter: Arc<dyn Prompter>) -> Self {
        Self {
            bridge,
            paths,
            prompter,
            nodes: Vec::new(),
            base: None,
        }
    }

    /// Nodes from the last successful scan, sorted by fps.
    pub fn nodes(&self) -> &[RateNode] {
        &self.nodes
    }

    pub fn base_node(&self) -> Option<&str> {
        self.base.as_deref()
    }

    /// Select the base node for [`Workbench::add`]. Must be a scanned node.
    pub fn select_base(&mut self, node: &str) -> bool {
        if self.nodes.iter().any(|candidate| candidate.node == node) {
            self.base = Some(node.to_string());
            true
        } else {
            false
        }
    }

    pub fn prompter(&self) -> &Arc<dyn Prompter> {
        &self.prompter
    }

    async fn run(&self, action: Action) -> String {
        let name = action.name();
        let start = Instant::now();
        let reply = self.bridge.execute(&action.command_line(&self.paths)).await;
        tracing::info!(
            action = name,
            elapsed_ms = start.elapsed().as_millis(),
            "workbench action finished"
        );
        reply
    }

    /// Await the confirmation gate. Declines are logged, never reported as errors.
    async fn gate(&self, title: &str, message: &str) -> bool {
        if self.prompter.confirm(title, message).await {
            tokio::time::sleep(AFTER_CONFIRM_PAUSE).await;
            true
        } else {
            tracing::info!(title, "declined");
            false
        }
    }

    async fn notice(&self, message: &str) {
        self.prompter.notice(message);
        tokio::time::sleep(AFTER_NOTICE_PAUSE).await;
    }

    /// Re-read the node table. On failure the previous table is kept.
    pub async fn scan(&mut self) -> Outcome {
        let reply = self.run(Action::ScanRates).await;
        match parse_scan_response(&reply) {
            Ok(nodes) => {
                self.base = default_base(&nodes).map(|node| node.node.clone());
                self.nodes = nodes;
                if self.nodes.is_empty() {
                    Outcome::completed("no refresh-rate nodes found")
                } else {
                    Outcome::completed(format!("{} refresh-rate nodes", self.nodes.len()))
                }
            }
            Err(err) => {
                tracing::warn!(error = %err, "scan failed");
                Outcome::failed(
                    format!("scan failed: {err:#}"),
                    scan::excerpt(&reply),
                )
            }
        }
    }

    async fn rescan(&mut self) {
        let outcome = self.scan().await;
        if outcome.is_error() {
            tracing::warn!(%outcome, "re-scan after action failed");
        }
    }

    /// Add a node cloned from `base` (or the selected base) at `target_fps`.
    pub async fn add(&mut self, base: Option<&str>, target_fps: &str) -> Outcome {
        let Some(base) = base
            .map(str::to_string)
            .or_else(|| self.base.clone())
            .filter(|base| !base.trim().is_empty())
        else {
            return Outcome::rejected("select a base node first");
        };
        let Some(fps) = parse_rate(target_fps) else {
            return Outcome::rejected(format!("invalid target refresh rate: {target_fps:?}"));
        };

        self.prompter.notice(&format!("adding {fps} Hz..."));
        let reply = self
            .run(Action::AddRate {
                base: base.clone(),
                fps: fps.clone(),
            })
            .await;
        if classify_result(&reply, NODE_SUCCESS_MARKERS).is_success() {
            self.rescan().await;
            Outcome::completed(format!("added {fps} Hz from {base}"))
        } else {
            Outcome::failed("adding node failed", reply)
        }
    }

    /// Replace `node` with a copy at `new_fps`: add first, then remove.
    ///
    /// When the add succeeds but the remove does not, the result is
    /// [`Outcome::Partial`]: the new node exists and the old one is orphaned.
    pub async fn modify(&mut self, node: &str, new_fps: &str) -> Outcome {
        let Some(fps) = parse_rate(new_fps) else {
            return Outcome::rejected(format!("invalid refresh rate: {new_fps:?}"));
        };
        let current = self
            .nodes
            .iter()
            .find(|candidate| candidate.node == node)
            .map(|candidate| candidate.fps);
        if current.is_some_and(|current| same_rate(current, &fps)) {
            return Outcome::completed(format!("{node} already runs at {fps} Hz"));
        }

        self.prompter.notice(&format!("adding {fps} Hz..."));
        let added = self
            .run(Action::AddRate {
                base: node.to_string(),
                fps: fps.clone(),
            })
            .await;
        if !classify_result(&added, NODE_SUCCESS_MARKERS).is_success() {
            return Outcome::failed("modify failed: adding the new node failed", added);
        }

        self.prompter
            .notice(&format!("added; removing old node {node}..."));
        let removed = self
            .run(Action::RemoveRate {
                node: node.to_string(),
            })
            .await;
        self.rescan().await;
        if classify_result(&removed, NODE_SUCCESS_MARKERS).is_success() {
            Outcome::completed(format!("{node} changed to {fps} Hz"))
        } else {
            tracing::warn!(node, reply = %removed, "modify left the old node in place");
            Outcome::Partial {
                message: format!("new {fps} Hz node added, but removing {node} failed"),
                detail: removed,
            }
        }
    }

    pub async fn remove(&mut self, node: &str) -> Outcome {
        if !self
            .gate("Remove node", &format!("Remove node {node}?"))
            .await
        {
            return Outcome::Declined;
        }
        self.prompter.notice(&format!("removing {node}..."));
        let reply = self
            .run(Action::RemoveRate {
                node: node.to_string(),
            })
            .await;
        if classify_result(&reply, NODE_SUCCESS_MARKERS).is_success() {
            self.rescan().await;
            Outcome::completed(format!("removed {node}"))
        } else {
            Outcome::failed("removing node failed", reply)
        }
    }

    /// Repack the workspace and flash it. No follow-up steps.
    pub async fn apply(&mut self) -> Outcome {
        if !self
            .gate(
                "Apply changes",
                "Repack the DTBO with all workspace changes and flash it to the device?",
            )
            .await
        {
            return Outcome::Declined;
        }
        self.notice("applying changes and flashing...").await;
        let reply = self.run(Action::ApplyChanges).await;
        if classify_result(&reply, SUCCESS_MARKERS).is_success() {
            Outcome::completed("DTBO flashed; reboot to take effect")
        } else {
            Outcome::failed("apply failed", reply)
        }
    }

    /// Flash the overclocked DTBO, optionally at a custom rate.
    pub async fn flash(&mut self, custom_rate: Option<&str>) -> Outcome {
        let custom_rate = custom_rate
            .map(str::trim)
            .filter(|rate| !rate.is_empty())
            .map(str::to_string);
        let message = match &custom_rate {
            Some(rate) => format!(
                "WARNING: custom refresh rate {rate} Hz is experimental and may cause a black \
                 screen or an unstable system. Make sure you can recover the device.\n\nContinue?"
            ),
            None => "Flash the overclocked DTBO? The device may fail to boot; make sure a \
                     backup exists."
                .to_string(),
        };
        if !self.gate("Flash DTBO", &message).await {
            return Outcome::Declined;
        }
        self.notice("flashing DTBO, please wait...").await;
        let reply = self.run(Action::FlashDtbo { custom_rate }).await;
        if classify_result(&reply, FLASH_SUCCESS_MARKERS).is_success() {
            Outcome::completed(format!("flash succeeded\n{reply}"))
        } else {
            Outcome::failed("flash failed", reply)
        }
    }

    pub async fn restore(&mut self) -> Outcome {
        if !self
            .gate(
                "Restore DTBO",
                "Restore the stock DTBO? Make sure the backup file exists.",
            )
            .await
        {
            return Outcome::Declined;
        }
        self.notice("restoring DTBO, please wait...").await;
        let reply = self.run(Action::RestoreDtbo).await;
        if classify_result(&reply, SUCCESS_MARKERS).is_success() {
            Outcome::completed("restore succeeded; reboot the device")
        } else {
            Outcome::failed("restore failed", reply)
        }
    }

    /// Re-extract the workspace from the device, discarding local edits.
    pub async fn reextract(&mut self) -> Outcome {
        if !self
            .gate(
                "Re-extract workspace",
                "Re-extract the DTBO? This overwrites every change in the current workspace.",
            )
            .await
        {
            return Outcome::Declined;
        }
        self.notice("extracting and unpacking DTBO...").await;
        let reply = self.run(Action::InitWorkspace).await;
        if classify_result(&reply, SUCCESS_MARKERS).is_success() {
            self.rescan().await;
            Outcome::completed("workspace initialized")
        } else {
            Outcome::failed("workspace initialization failed", reply)
        }
    }

    /// Generate high-rate nodes for the detected model.
    pub async fn auto_process(&mut self) -> Outcome {
        if !self
            .gate(
                "Auto process",
                "Generate high refresh-rate nodes for this device model automatically?",
            )
            .await
        {
            return Outcome::Declined;
        }
        self.notice("running auto processing...").await;
        let reply = self.run(Action::AutoProcess).await;
        if classify_result(&reply, SUCCESS_MARKERS).is_success() {
            self.rescan().await;
            Outcome::completed("auto processing finished; review the nodes or apply changes")
        } else {
            Outcome::failed("auto processing failed", reply)
        }
    }

    pub async fn uninstall(&mut self) -> Outcome {
        if !self
            .gate(
                "Uninstall module",
                "Uninstall the module? The stock DTBO is restored when a backup exists \
                 and the module files are removed.",
            )
            .await
        {
            return Outcome::Declined;
        }
        self.prompter.notice("uninstalling module...");
        let reply = self.run(Action::UninstallModule).await;
        if classify_result(&reply, SUCCESS_MARKERS).is_success() {
            Outcome::completed("module removed; reboot the device")
        } else {
            Outcome::failed("uninstall failed", reply)
        }
    }

    pub async fn toggle_adfr(&mut self, mode: AdfrMode) -> Outcome {
        let (title, message) = match mode {
            AdfrMode::Enable => (
                "Restore ADFR",
                "Restore the previous ADFR system properties?",
            ),
            AdfrMode::Disable => (
                "Disable ADFR",
                "Disable adaptive refresh? Power draw may increase.",
            ),
        };
        if !self.gate(title, message).await {
            return Outcome::Declined;
        }
        let reply = self.run(Action::ToggleAdfr(mode)).await;
        if classify_result(&reply, SUCCESS_MARKERS).is_success() {
            Outcome::completed(match mode {
                AdfrMode::Enable => "ADFR settings restored",
                AdfrMode::Disable => "ADFR disabled",
            })
        } else {
            Outcome::failed("ADFR toggle failed", reply)
        }
    }
}

/// Positive finite number, returned trimmed as typed.
fn parse_rate(raw: &str) -> Option<String> {
    let raw = raw.trim();
    let value: f64 = raw.parse().ok()?;
    (value.is_finite() && value > 0.0).then(|| raw.to_string())
}

fn same_rate(current: i64, candidate: &str) -> bool {
    candidate
        .parse::<f64>()
        .is_ok_and(|value| value == current as f64)
}

#[cfg(test)]
mod tests;
