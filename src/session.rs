//! Per-session state: one owner for the bridge, catalog, configuration,
//! label cache and workbench.
use crate::apps::{self, AppEntry};
use crate::bridge::{BackendChoice, CommandBridge};
use crate::catalog::{self, Catalog, ResolutionClass};
use crate::device::{self, SystemStatus};
use crate::labels::{LabelResolver, LabelSources};
use crate::outcome::Outcome;
use crate::protocol::LIST_MODES;
use crate::settings::{ModulePaths, Settings};
use crate::store::{ConfigStore, Configuration};
use crate::workbench::{Prompter, Workbench};
use anyhow::Result;
use std::sync::Arc;
use std::time::Instant;

pub struct Session {
    bridge: CommandBridge,
    paths: ModulePaths,
    catalog: Catalog,
    class: ResolutionClass,
    store: ConfigStore,
    labels: LabelResolver,
    workbench: Workbench,
}

impl Session {
    pub fn new(
        settings: &Settings,
        bridge: CommandBridge,
        prompter: Arc<dyn Prompter>,
        sources: LabelSources,
    ) -> Self {
        let paths = settings.module_paths();
        Self {
            store: ConfigStore::new(bridge.clone(), paths.clone()),
            labels: LabelResolver::new(bridge.clone(), paths.clone(), sources, settings),
            workbench: Workbench::new(bridge.clone(), paths.clone(), prompter),
            catalog: Catalog::NotLoaded,
            class: ResolutionClass::Standard,
            bridge,
            paths,
        }
    }

    /// Build a session for the CLI, selecting the executor backend once.
    pub fn open(
        settings: &Settings,
        choice: BackendChoice,
        prompter: Arc<dyn Prompter>,
    ) -> Result<Self> {
        let bridge = CommandBridge::detect(settings, choice)?;
        tracing::debug!(backend = ?bridge.kind(), module = %settings.module_paths().root().display(), "session opened");
        Ok(Self::new(settings, bridge, prompter, LabelSources::none()))
    }

    pub fn bridge(&self) -> &CommandBridge {
        &self.bridge
    }

    pub fn paths(&self) -> &ModulePaths {
        &self.paths
    }

    pub fn catalog(&self) -> &Catalog {
        &self.catalog
    }

    /// Class shown by default, derived from the active global mode.
    pub fn default_class(&self) -> ResolutionClass {
        self.class
    }

    pub fn config(&self) -> &Configuration {
        self.store.config()
    }

    pub fn labels(&self) -> &LabelResolver {
        &self.labels
    }

    pub fn workbench(&mut self) -> &mut Workbench {
        &mut self.workbench
    }

    /// Rebuild the catalog and reload the configuration in full.
    pub async fn refresh_catalog(&mut self) -> &Catalog {
        let start = Instant::now();
        let raw = self.bridge.execute(LIST_MODES).await;
        self.catalog = if crate::bridge::is_error_reply(&raw) {
            tracing::warn!(reply = %raw, "reading display modes failed");
            Catalog::NotLoaded
        } else {
            Catalog::from_raw(&raw)
        };
        let global = self.store.reload().await.global_mode;
        self.class = catalog::default_class(self.catalog.modes(), global);
        tracing::info!(
            modes = self.catalog.modes().len(),
            global,
            elapsed_ms = start.elapsed().as_millis(),
            "catalog refreshed"
        );
        &self.catalog
    }

    pub async fn set_global(&mut self, mode_id: i64) -> Outcome {
        if self.catalog.is_loaded() && self.catalog.find(mode_id).is_none() {
            tracing::warn!(mode_id, "mode id is not in the current catalog");
        }
        self.store.set_global(mode_id).await
    }

    pub async fn set_app(&mut self, package: &str, mode_id: i64) -> Outcome {
        self.store.set_override(package, mode_id).await
    }

    pub async fn status(&self) -> SystemStatus {
        device::load_status(&self.bridge, &self.paths).await
    }

    /// Installed third-party apps. With `resolve_labels` the call waits for
    /// the label pipeline to settle; otherwise labels are whatever is cached.
    pub async fn apps(&self, resolve_labels: bool) -> Vec<AppEntry> {
        let packages = apps::list_packages(&self.bridge).await;
        if resolve_labels {
            let queued = self.labels.warm(&packages).await;
            tracing::debug!(packages = packages.len(), queued, "label resolution started");
            self.labels.wait_idle().await;
        }
        apps::build_entries(&packages, &self.labels, self.store.config())
    }

    pub async fn read_log(&self) -> Option<String> {
        device::read_log(&self.bridge, &self.paths).await
    }

    /// Clear the daemon log after confirmation.
    pub async fn clear_log(&self) -> Outcome {
        let prompter = self.workbench.prompter();
        if !prompter.confirm("Clear log", "Clear the daemon log?").await {
            tracing::info!(title = "Clear log", "declined");
            return Outcome::Declined;
        }
        match device::clear_log(&self.bridge, &self.paths).await {
            Ok(()) => Outcome::completed("log cleared"),
            Err(err) => Outcome::failed("clearing log failed", err.to_string()),
        }
    }
}
