//! Executor command lines and reply classification.
//!
//! The handler script answers in free text; there is no status code apart
//! from the JSON embedded in `scan_rates`. Success is therefore judged by
//! substring markers, and that heuristic is confined to [`classify_result`].
use crate::settings::ModulePaths;
use serde::Serialize;

/// Markers shared by the rate-node actions.
pub const NODE_SUCCESS_MARKERS: &[&str] = &["Success", "Added", "Removed"];
/// Markers for plain handler actions.
pub const SUCCESS_MARKERS: &[&str] = &["Success"];
/// `flash_dtbo` also reports completion in the handler's native wording.
pub const FLASH_SUCCESS_MARKERS: &[&str] = &["Success", "操作完成"];

pub const LIST_MODES: &str = "dumpsys SurfaceFlinger";
pub const LIST_PACKAGES: &str = "pm list packages -3 | cut -d: -f2";
pub const SLOT_SUFFIX: &str = "getprop ro.boot.slot_suffix";
pub const VENDOR_MODEL: &str = "getprop ro.product.vendor.model";
pub const CURRENT_FPS: &str = "dumpsys display | grep -oE 'fps=[0-9.]+' | head -n1";

const LOG_TAIL_LINES: usize = 1000;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "snake_case")]
pub enum Verdict {
    Success,
    Failure,
    /// Empty reply: inert backend, or the executor printed nothing.
    Unknown,
}

impl Verdict {
    pub fn is_success(self) -> bool {
        matches!(self, Verdict::Success)
    }
}

pub fn classify_result(text: &str, markers: &[&str]) -> Verdict {
    if markers.iter().any(|marker| text.contains(marker)) {
        return Verdict::Success;
    }
    if text.trim().is_empty() {
        return Verdict::Unknown;
    }
    Verdict::Failure
}

/// ADFR (adaptive refresh) toggle direction.
#[derive(Debug, Clone, Copy, PartialEq, Eq, clap::ValueEnum)]
pub enum AdfrMode {
    Enable,
    Disable,
}

impl AdfrMode {
    pub fn as_str(self) -> &'static str {
        match self {
            AdfrMode::Enable => "enable",
            AdfrMode::Disable => "disable",
        }
    }
}

/// Handler-script actions understood by the executor.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Action {
    CheckBackup,
    SetConfig { mode_id: i64 },
    FlashDtbo { custom_rate: Option<String> },
    RestoreDtbo,
    InitWorkspace,
    AutoProcess,
    ScanRates,
    AddRate { base: String, fps: String },
    RemoveRate { node: String },
    ApplyChanges,
    UninstallModule,
    ToggleAdfr(AdfrMode),
    GetAppInfo { package: String },
    SetAppConfig { package: String, mode_id: i64 },
}

impl Action {
    pub fn name(&self) -> &'static str {
        match self {
            Action::CheckBackup => "check_backup",
            Action::SetConfig { .. } => "set_config",
            Action::FlashDtbo { .. } => "flash_dtbo",
            Action::RestoreDtbo => "restore_dtbo",
            Action::InitWorkspace => "init_workspace",
            Action::AutoProcess => "auto_process",
            Action::ScanRates => "scan_rates",
            Action::AddRate { .. } => "add_rate",
            Action::RemoveRate { .. } => "remove_rate",
            Action::ApplyChanges => "apply_changes",
            Action::UninstallModule => "uninstall_module",
            Action::ToggleAdfr(_) => "toggle_adfr",
            Action::GetAppInfo { .. } => "get_app_info",
            Action::SetAppConfig { .. } => "set_app_config",
        }
    }

    fn args(&self) -> Vec<String> {
        match self {
            Action::SetConfig { mode_id } => vec![mode_id.to_string()],
            Action::FlashDtbo { custom_rate } => vec![custom_rate.clone().unwrap_or_default()],
            Action::AddRate { base, fps } => vec![base.clone(), fps.clone()],
            Action::RemoveRate { node } => vec![node.clone()],
            Action::ToggleAdfr(mode) => vec![mode.as_str().to_string()],
            Action::GetAppInfo { package } => vec![package.clone()],
            Action::SetAppConfig { package, mode_id } => {
                vec![package.clone(), mode_id.to_string()]
            }
            Action::CheckBackup
            | Action::RestoreDtbo
            | Action::InitWorkspace
            | Action::AutoProcess
            | Action::ScanRates
            | Action::ApplyChanges
            | Action::UninstallModule => Vec::new(),
        }
    }

    /// `sh '<handler>' <action> <args...>`, every argument shell-quoted.
    pub fn command_line(&self, paths: &ModulePaths) -> String {
        let script = paths.handler_script().display().to_string();
        let mut words = vec!["sh".to_string(), script, self.name().to_string()];
        words.extend(self.args());
        shell_words::join(words)
    }
}

pub fn read_config(paths: &ModulePaths) -> String {
    format!("cat {}", quote_path(&paths.config_file()))
}

pub fn tail_log(paths: &ModulePaths) -> String {
    format!("tail -n {LOG_TAIL_LINES} {}", quote_path(&paths.log_file()))
}

pub fn clear_log(paths: &ModulePaths) -> String {
    format!("echo \"\" > {}", quote_path(&paths.log_file()))
}

fn quote_path(path: &std::path::Path) -> String {
    shell_words::quote(&path.display().to_string()).into_owned()
}
