//! Display mode catalog parsed from `dumpsys SurfaceFlinger`.
//!
//! Only lines carrying all of `id=`, `resolution=` and `vsyncRate=` are
//! considered, e.g.
//!
//! ```text
//! {id=0, hwcId=0, resolution=1264x2780, vsyncRate=120.000000 Hz, ...}
//! ```
use regex::Regex;
use serde::Serialize;
use std::collections::HashSet;
use std::sync::OnceLock;

/// Widths below this are `Standard` (1080p class); the rest are `High` (2K class).
pub const HIGH_RES_MIN_WIDTH: u32 = 1200;

#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct DisplayMode {
    pub id: i64,
    pub width_px: u32,
    pub height_px: u32,
    pub refresh_hz: u32,
    pub raw_refresh_hz: f64,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, clap::ValueEnum)]
#[serde(rename_all = "snake_case")]
pub enum ResolutionClass {
    Standard,
    High,
}

impl ResolutionClass {
    pub fn label(self) -> &'static str {
        match self {
            ResolutionClass::Standard => "1080P",
            ResolutionClass::High => "2K",
        }
    }
}

/// Catalog as seen by callers: never loaded (or the load failed) vs loaded.
#[derive(Debug, Clone, Default, PartialEq)]
pub enum Catalog {
    #[default]
    NotLoaded,
    Loaded(Vec<DisplayMode>),
}

impl Catalog {
    pub fn from_raw(raw: &str) -> Self {
        if raw.trim().is_empty() {
            return Catalog::NotLoaded;
        }
        Catalog::Loaded(parse_modes(raw))
    }

    pub fn is_loaded(&self) -> bool {
        matches!(self, Catalog::Loaded(_))
    }

    pub fn modes(&self) -> &[DisplayMode] {
        match self {
            Catalog::NotLoaded => &[],
            Catalog::Loaded(modes) => modes,
        }
    }

    pub fn find(&self, id: i64) -> Option<&DisplayMode> {
        self.modes().iter().find(|mode| mode.id == id)
    }

    /// `None` while the catalog is not loaded; `Some(empty)` is a valid result.
    pub fn filtered(&self, class: ResolutionClass) -> Option<Vec<DisplayMode>> {
        match self {
            Catalog::NotLoaded => None,
            Catalog::Loaded(modes) => Some(filter(modes, class)),
        }
    }
}

fn id_pattern() -> &'static Regex {
    static PATTERN: OnceLock<Regex> = OnceLock::new();
    PATTERN.get_or_init(|| Regex::new(r"id=(\d+)").expect("regex for mode id"))
}

fn resolution_pattern() -> &'static Regex {
    static PATTERN: OnceLock<Regex> = OnceLock::new();
    PATTERN.get_or_init(|| {
        Regex::new(r"resolution=(\d+)x(\d+)").expect("regex for mode resolution")
    })
}

fn vsync_pattern() -> &'static Regex {
    static PATTERN: OnceLock<Regex> = OnceLock::new();
    PATTERN.get_or_init(|| Regex::new(r"vsyncRate=([0-9.]+)").expect("regex for vsync rate"))
}

/// Parse, dedup by id (first wins), and sort by `(refresh_hz, width_px)`.
pub fn parse_modes(raw: &str) -> Vec<DisplayMode> {
    let mut seen = HashSet::new();
    let mut modes = Vec::new();

    for line in raw.lines() {
        if !(line.contains("id=") && line.contains("resolution=") && line.contains("vsyncRate=")) {
            continue;
        }
        let Some(mode) = parse_mode_line(line) else {
            tracing::debug!(line, "skipping unparseable mode line");
            continue;
        };
        if seen.insert(mode.id) {
            modes.push(mode);
        }
    }

    modes.sort_by_key(|mode| (mode.refresh_hz, mode.width_px));
    modes
}

fn parse_mode_line(line: &str) -> Option<DisplayMode> {
    let id = id_pattern().captures(line)?.get(1)?.as_str().parse().ok()?;
    let resolution = resolution_pattern().captures(line)?;
    let width_px = resolution.get(1)?.as_str().parse().ok()?;
    let height_px = resolution.get(2)?.as_str().parse().ok()?;
    let raw_refresh_hz: f64 = vsync_pattern().captures(line)?.get(1)?.as_str().parse().ok()?;
    if !raw_refresh_hz.is_finite() || raw_refresh_hz < 0.0 {
        return None;
    }
    Some(DisplayMode {
        id,
        width_px,
        height_px,
        refresh_hz: raw_refresh_hz.round() as u32,
        raw_refresh_hz,
    })
}

pub fn classify(mode: &DisplayMode) -> ResolutionClass {
    if mode.width_px < HIGH_RES_MIN_WIDTH {
        ResolutionClass::Standard
    } else {
        ResolutionClass::High
    }
}

pub fn filter(modes: &[DisplayMode], class: ResolutionClass) -> Vec<DisplayMode> {
    modes
        .iter()
        .filter(|mode| classify(mode) == class)
        .cloned()
        .collect()
}

/// Class to show first: `High` only when the active mode is wider than the threshold.
pub fn default_class(modes: &[DisplayMode], active_mode: i64) -> ResolutionClass {
    match modes.iter().find(|mode| mode.id == active_mode) {
        Some(mode) if mode.width_px > HIGH_RES_MIN_WIDTH => ResolutionClass::High,
        _ => ResolutionClass::Standard,
    }
}

/// `120Hz (2K)`
pub fn mode_label(mode: &DisplayMode) -> String {
    format!("{}Hz ({})", mode.refresh_hz, classify(mode).label())
}

/// Label for a mode id that may no longer exist on the device.
pub fn describe_mode(id: i64, modes: &[DisplayMode]) -> String {
    modes
        .iter()
        .find(|mode| mode.id == id)
        .map(mode_label)
        .unwrap_or_else(|| "unknown".to_string())
}
