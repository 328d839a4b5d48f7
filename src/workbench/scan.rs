use anyhow::{anyhow, Context, Result};
use serde::{Deserialize, Serialize};

/// Base node preselected after a scan when present.
pub const PREFERRED_BASE_FPS: i64 = 120;

/// Refresh-rate node reported by `scan_rates`. `node` is opaque.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct RateNode {
    pub node: String,
    pub fps: i64,
    #[serde(default)]
    pub clock: String,
    #[serde(default)]
    pub file: String,
}

/// Extract the JSON array between the first `[` and the last `]` of a noisy
/// reply. Nodes come back sorted by fps (stable).
pub fn parse_scan_response(text: &str) -> Result<Vec<RateNode>> {
    let start = text
        .find('[')
        .ok_or_else(|| anyhow!("no JSON array in scan output"))?;
    let end = text
        .rfind(']')
        .filter(|end| *end > start)
        .ok_or_else(|| anyhow!("no JSON array in scan output"))?;
    let mut nodes: Vec<RateNode> =
        serde_json::from_str(&text[start..=end]).context("parse scan JSON")?;
    nodes.sort_by_key(|node| node.fps);
    Ok(nodes)
}

/// The 120 Hz node when there is one, else the first node.
pub fn default_base(nodes: &[RateNode]) -> Option<&RateNode> {
    nodes
        .iter()
        .find(|node| node.fps == PREFERRED_BASE_FPS)
        .or_else(|| nodes.first())
}

/// First 100 characters, for showing next to a parse error.
pub(crate) fn excerpt(text: &str) -> String {
    let mut excerpt: String = text.chars().take(100).collect();
    if excerpt.len() < text.len() {
        excerpt.push_str("...");
    }
    excerpt
}
