//! Optional structured package-info collaborators.
//!
//! Hosts may expose any subset of these. The resolver tries them in order
//! (single, batch, inspector) before falling back to the executor.
use anyhow::Result;
use async_trait::async_trait;
use serde::Deserialize;
use std::sync::Arc;

#[derive(Debug, Clone, PartialEq, Eq, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct PackageInfo {
    pub package_name: String,
    #[serde(default)]
    pub app_label: Option<String>,
    #[serde(default)]
    pub label: Option<String>,
}

impl PackageInfo {
    /// `appLabel`, else `label`, else the package name itself.
    pub fn display_label(&self, package: &str) -> String {
        [self.app_label.as_deref(), self.label.as_deref()]
            .into_iter()
            .flatten()
            .map(str::trim)
            .find(|label| !label.is_empty())
            .unwrap_or(package)
            .to_string()
    }
}

/// Parse a host's JSON array of package infos.
pub fn parse_package_infos(json: &str) -> Result<Vec<PackageInfo>> {
    Ok(serde_json::from_str(json)?)
}

#[async_trait]
pub trait PackageInfoLookup: Send + Sync {
    async fn package_info(&self, package: &str) -> Result<Option<PackageInfo>>;
}

#[async_trait]
pub trait BatchInfoLookup: Send + Sync {
    async fn packages_info(&self, packages: &[String]) -> Result<Vec<PackageInfo>>;
}

/// Generic application-object inspection (last structured resort).
#[async_trait]
pub trait ObjectInspector: Send + Sync {
    async fn application_label(&self, package: &str) -> Result<Option<String>>;
}

#[derive(Clone, Default)]
pub struct LabelSources {
    pub single: Option<Arc<dyn PackageInfoLookup>>,
    pub batch: Option<Arc<dyn BatchInfoLookup>>,
    pub inspector: Option<Arc<dyn ObjectInspector>>,
}

impl LabelSources {
    pub fn none() -> Self {
        Self::default()
    }

    pub fn has_batch(&self) -> bool {
        self.batch.is_some()
    }
}
