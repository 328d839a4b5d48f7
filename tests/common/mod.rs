//! Shared test infrastructure for integration tests.
//!
//! `FakeDevice` answers the executor commands the way the on-device handler
//! script does, keeping `mode.txt` and the DTBO workspace nodes in memory.

use anyhow::Result;
use async_trait::async_trait;
use refresh_bench::bridge::{
    Backend, CallbackHost, CallbackRegistry, CommandBridge, HostReply, PromiseHost,
};
use refresh_bench::labels::LabelSources;
use refresh_bench::workbench::AutoConfirm;
use refresh_bench::{Session, Settings};
use serde_json::json;
use std::collections::BTreeMap;
use std::sync::{Arc, Mutex};
use std::time::Duration;

pub const SURFACE_FLINGER_DUMP: &str = "\
Display 4619827259835644672 (HWC display 0):
  supported modes:
    {id=0, hwcId=0, resolution=1264x2780, vsyncRate=60.000000 Hz, dpi=510.00x510.00}
    {id=1, hwcId=1, resolution=1264x2780, vsyncRate=120.000000 Hz, dpi=510.00x510.00}
    {id=2, hwcId=2, resolution=1080x2376, vsyncRate=60.000000 Hz, dpi=510.00x510.00}
    {id=3, hwcId=3, resolution=1080x2376, vsyncRate=120.000000 Hz, dpi=510.00x510.00}
    {id=4, hwcId=4, resolution=1080x2376, vsyncRate=143.999985 Hz, dpi=510.00x510.00}
    {id=1, hwcId=1, resolution=1264x2780, vsyncRate=120.000000 Hz, dpi=510.00x510.00}
";

#[derive(Debug, Clone)]
pub struct Node {
    pub node: String,
    pub fps: i64,
    pub clock: String,
    pub file: String,
}

#[derive(Debug, Default)]
pub struct DeviceState {
    pub global_mode: Option<i64>,
    pub overrides: BTreeMap<String, i64>,
    pub labels: BTreeMap<String, String>,
    pub nodes: Vec<Node>,
    /// `remove_rate` reports this error instead of removing.
    pub remove_error: Option<String>,
    pub flashed: bool,
}

#[derive(Default)]
pub struct FakeDevice {
    pub state: Mutex<DeviceState>,
    calls: Mutex<Vec<String>>,
}

impl FakeDevice {
    /// A device with a fresh workspace of 60/90/120 Hz nodes and two apps.
    pub fn new() -> Arc<Self> {
        let device = FakeDevice::default();
        {
            let mut state = device.state.lock().expect("state lock");
            state.global_mode = Some(1);
            state.labels.insert("com.example.game".into(), "Racer".into());
            state.labels.insert("org.example.notes".into(), String::new());
            for (node, fps) in [("fps_60", 60), ("fps_120", 120), ("fps_90", 90)] {
                state.nodes.push(Node {
                    node: node.to_string(),
                    fps,
                    clock: format!("{}", fps * 1_000_000),
                    file: "dtbo_0.dts".to_string(),
                });
            }
        }
        Arc::new(device)
    }

    pub fn calls(&self) -> Vec<String> {
        self.calls.lock().expect("calls lock").clone()
    }

    pub fn count(&self, needle: &str) -> usize {
        self.calls()
            .iter()
            .filter(|call| call.contains(needle))
            .count()
    }

    pub fn fail_removals(&self, message: &str) {
        self.state.lock().expect("state lock").remove_error = Some(message.to_string());
    }

    pub fn node_names(&self) -> Vec<String> {
        let state = self.state.lock().expect("state lock");
        state.nodes.iter().map(|node| node.node.clone()).collect()
    }

    pub fn promise_bridge(self: &Arc<Self>) -> CommandBridge {
        CommandBridge::new(Backend::Promise(self.clone()), Duration::from_secs(15))
    }

    pub fn callback_bridge(self: &Arc<Self>) -> CommandBridge {
        CommandBridge::new(Backend::Callback(self.clone()), Duration::from_secs(15))
    }

    fn respond(&self, command: &str) -> HostReply {
        self.calls
            .lock()
            .expect("calls lock")
            .push(command.to_string());
        let mut state = self.state.lock().expect("state lock");

        if command == "dumpsys SurfaceFlinger" {
            return HostReply::success(SURFACE_FLINGER_DUMP);
        }
        if command.starts_with("pm list packages") {
            let packages: Vec<&str> = state.labels.keys().map(String::as_str).collect();
            return HostReply::success(packages.join("\n"));
        }
        if command.starts_with("cat ") {
            return HostReply::success(render_mode_file(&state));
        }
        if command.starts_with("getprop ro.boot.slot_suffix") {
            return HostReply::success("_b");
        }
        if command.starts_with("getprop ro.product.vendor.model") {
            return HostReply::success("PJD110");
        }
        if command.starts_with("dumpsys display") {
            return HostReply::success("fps=120.0");
        }

        let Ok(words) = shell_words::split(command) else {
            return HostReply::failure(2, "unbalanced quotes");
        };
        let action = words.get(2).map(String::as_str).unwrap_or_default();
        let arg = |index: usize| words.get(3 + index).cloned().unwrap_or_default();
        match action {
            "set_config" => match arg(0).parse() {
                Ok(mode) => {
                    state.global_mode = Some(mode);
                    HostReply::success("Success")
                }
                Err(_) => HostReply::success("Error: invalid mode"),
            },
            "set_app_config" => match arg(1).parse::<i64>() {
                Ok(-1) => {
                    state.overrides.remove(&arg(0));
                    HostReply::success("Success")
                }
                Ok(mode) => {
                    state.overrides.insert(arg(0), mode);
                    HostReply::success("Success")
                }
                Err(_) => HostReply::success("Error: invalid mode"),
            },
            "get_app_info" => {
                HostReply::success(state.labels.get(&arg(0)).cloned().unwrap_or_default())
            }
            "check_backup" => HostReply::success("EXIST"),
            "scan_rates" => {
                let nodes: Vec<_> = state
                    .nodes
                    .iter()
                    .map(|node| {
                        json!({
                            "node": node.node,
                            "fps": node.fps,
                            "clock": node.clock,
                            "file": node.file,
                        })
                    })
                    .collect();
                HostReply::success(format!(
                    "Scanning workspace...\n{}\nScan complete",
                    serde_json::Value::Array(nodes)
                ))
            }
            "add_rate" => {
                let base = arg(0);
                let Ok(fps) = arg(1).parse::<i64>() else {
                    return HostReply::success("Error: invalid fps");
                };
                let Some(template) = state.nodes.iter().find(|node| node.node == base).cloned()
                else {
                    return HostReply::success(format!("Error: base node {base} not found"));
                };
                let node = format!("fps_{fps}");
                state.nodes.push(Node {
                    node: node.clone(),
                    fps,
                    ..template
                });
                HostReply::success(format!("Success: Added {node}"))
            }
            "remove_rate" => {
                if let Some(error) = state.remove_error.clone() {
                    return HostReply::success(error);
                }
                let node = arg(0);
                let before = state.nodes.len();
                state.nodes.retain(|candidate| candidate.node != node);
                if state.nodes.len() < before {
                    HostReply::success(format!("Removed {node}"))
                } else {
                    HostReply::failure(1, format!("node {node} not found"))
                }
            }
            "apply_changes" | "flash_dtbo" => {
                state.flashed = true;
                HostReply::success("Packing dtbo...\nSuccess")
            }
            "restore_dtbo" | "init_workspace" | "auto_process" | "uninstall_module"
            | "toggle_adfr" => HostReply::success("Success"),
            other => HostReply::failure(127, format!("unknown action {other}")),
        }
    }
}

fn render_mode_file(state: &DeviceState) -> String {
    let mut lines = Vec::new();
    if let Some(global) = state.global_mode {
        lines.push(global.to_string());
    }
    for (package, mode) in &state.overrides {
        lines.push(format!("{package}={mode}"));
    }
    lines.join("\n")
}

#[async_trait]
impl PromiseHost for FakeDevice {
    async fn exec(&self, command: &str) -> Result<HostReply> {
        Ok(self.respond(command))
    }
}

impl CallbackHost for FakeDevice {
    fn exec(&self, command: &str, token: &str, registry: &CallbackRegistry) -> Result<()> {
        let reply = self.respond(command);
        let token = token.to_string();
        let registry = registry.clone();
        std::thread::spawn(move || {
            std::thread::sleep(Duration::from_millis(2));
            registry.complete(&token, reply);
        });
        Ok(())
    }
}

/// Session wired to `bridge` that auto-confirms every gate.
pub fn session(bridge: CommandBridge) -> Session {
    Session::new(
        &Settings::default(),
        bridge,
        Arc::new(AutoConfirm),
        LabelSources::none(),
    )
}
