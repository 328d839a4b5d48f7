//! Package label resolution.
//!
//! Labels are filled in behind the package list so the list can render
//! immediately. Each package goes through a strategy chain (cache, single
//! lookup, batch lookup, object inspection, executor `get_app_info`) and ends
//! with a terminal label, which is the package name itself when nothing else
//! worked. Terminal labels are never retried.
//!
//! One drain loop at a time works the FIFO queue in rounds of
//! `concurrency` packages; a round fully settles before the next starts.
mod sources;

pub use sources::{
    parse_package_infos, BatchInfoLookup, LabelSources, ObjectInspector, PackageInfo,
    PackageInfoLookup,
};

use crate::bridge::{is_error_reply, CommandBridge};
use crate::protocol::Action;
use crate::settings::{ModulePaths, Settings};
use std::collections::{HashMap, HashSet, VecDeque};
use std::sync::{Arc, Mutex, MutexGuard, PoisonError};
use std::time::Duration;
use tokio::sync::Notify;
use tokio::task::JoinSet;

#[derive(Default)]
struct LabelState {
    cache: HashMap<String, String>,
    queue: VecDeque<String>,
    queued: HashSet<String>,
    draining: bool,
    attempts: u64,
}

struct ResolverInner {
    bridge: CommandBridge,
    paths: ModulePaths,
    sources: LabelSources,
    state: Mutex<LabelState>,
    idle: Notify,
    concurrency: usize,
    batch_size: usize,
    pause: Duration,
}

/// Session-scoped label cache and resolution queue. Clones share state.
#[derive(Clone)]
pub struct LabelResolver {
    inner: Arc<ResolverInner>,
}

impl LabelResolver {
    pub fn new(
        bridge: CommandBridge,
        paths: ModulePaths,
        sources: LabelSources,
        settings: &Settings,
    ) -> Self {
        Self {
            inner: Arc::new(ResolverInner {
                bridge,
                paths,
                sources,
                state: Mutex::new(LabelState::default()),
                idle: Notify::new(),
                concurrency: settings.label_concurrency.max(1),
                batch_size: settings.label_batch_size.max(1),
                pause: settings.label_pause(),
            }),
        }
    }

    fn state(&self) -> MutexGuard<'_, LabelState> {
        self.inner
            .state
            .lock()
            .unwrap_or_else(PoisonError::into_inner)
    }

    /// `None` while pending or never requested.
    pub fn label(&self, package: &str) -> Option<String> {
        self.state().cache.get(package).cloned()
    }

    pub fn snapshot(&self) -> HashMap<String, String> {
        self.state().cache.clone()
    }

    pub fn is_queued(&self, package: &str) -> bool {
        self.state().queued.contains(package)
    }

    /// Number of strategy-chain runs that went past the cache.
    pub fn attempts(&self) -> u64 {
        self.state().attempts
    }

    /// Queue `package` unless it is already resolved or queued. Starts the
    /// drain loop when none is running. Returns whether it was queued.
    pub fn enqueue(&self, package: &str) -> bool {
        let start_drain = {
            let mut state = self.state();
            if state.cache.contains_key(package) || state.queued.contains(package) {
                return false;
            }
            state.queued.insert(package.to_string());
            state.queue.push_back(package.to_string());
            if state.draining {
                false
            } else {
                state.draining = true;
                true
            }
        };
        if start_drain {
            let resolver = self.clone();
            tokio::spawn(async move { resolver.drain().await });
        }
        true
    }

    /// Resolve a full package list: batch prefetch first, then queue the rest.
    pub async fn warm(&self, packages: &[String]) -> usize {
        self.prefetch(packages).await;
        packages
            .iter()
            .filter(|package| self.enqueue(package))
            .count()
    }

    /// Bulk pass through the batch collaborator, `batch_size` packages per call.
    pub async fn prefetch(&self, packages: &[String]) -> usize {
        let Some(batch) = self.inner.sources.batch.clone() else {
            return 0;
        };
        let mut resolved = 0;
        for chunk in packages.chunks(self.inner.batch_size) {
            let infos = match batch.packages_info(chunk).await {
                Ok(infos) => infos,
                Err(err) => {
                    tracing::warn!(error = %err, "bulk label lookup failed");
                    break;
                }
            };
            let mut state = self.state();
            for info in infos {
                if info.package_name.is_empty() {
                    continue;
                }
                let label = info.display_label(&info.package_name);
                state.queued.remove(&info.package_name);
                state.cache.insert(info.package_name, label);
                resolved += 1;
            }
        }
        tracing::debug!(resolved, total = packages.len(), "bulk label prefetch");
        resolved
    }

    /// Resolves once the queue is empty and no drain loop is running.
    pub async fn wait_idle(&self) {
        loop {
            let notified = self.inner.idle.notified();
            tokio::pin!(notified);
            notified.as_mut().enable();
            {
                let state = self.state();
                if state.queue.is_empty() && !state.draining {
                    return;
                }
            }
            notified.await;
        }
    }

    async fn drain(&self) {
        loop {
            let round: Vec<String> = {
                let mut state = self.state();
                if state.queue.is_empty() {
                    state.draining = false;
                    drop(state);
                    self.inner.idle.notify_waiters();
                    return;
                }
                let take = self.inner.concurrency.min(state.queue.len());
                state.queue.drain(..take).collect()
            };

            let mut tasks = JoinSet::new();
            for package in round.iter().cloned() {
                let resolver = self.clone();
                tasks.spawn(async move {
                    resolver.resolve(&package).await;
                });
            }
            while let Some(joined) = tasks.join_next().await {
                if let Err(err) = joined {
                    tracing::warn!(error = %err, "label task failed");
                }
            }
            // A task that died without a label still gets a terminal one.
            for package in &round {
                if self.label(package).is_none() {
                    self.finish(package, package.clone());
                }
            }
            tracing::debug!(round = round.len(), "label round settled");
            tokio::time::sleep(self.inner.pause).await;
        }
    }

    /// Run the strategy chain for one package and cache the terminal label.
    pub async fn resolve(&self, package: &str) -> String {
        if let Some(label) = self.label(package) {
            self.finish(package, label.clone());
            return label;
        }
        self.state().attempts += 1;

        let label = match self.structured_label(package).await {
            Some(label) => label,
            None => self
                .executor_label(package)
                .await
                .unwrap_or_else(|| package.to_string()),
        };
        self.finish(package, label.clone());
        label
    }

    fn finish(&self, package: &str, label: String) {
        let mut state = self.state();
        state.queued.remove(package);
        state.cache.insert(package.to_string(), label);
    }

    async fn structured_label(&self, package: &str) -> Option<String> {
        let sources = &self.inner.sources;
        if let Some(single) = &sources.single {
            match single.package_info(package).await {
                Ok(Some(info)) => return Some(info.display_label(package)),
                Ok(None) => {}
                Err(err) => tracing::debug!(package, error = %err, "single lookup failed"),
            }
        }
        if let Some(batch) = &sources.batch {
            match batch.packages_info(&[package.to_string()]).await {
                Ok(infos) => {
                    if let Some(info) = infos
                        .iter()
                        .find(|info| info.package_name == package)
                        .or_else(|| infos.first())
                    {
                        return Some(info.display_label(package));
                    }
                }
                Err(err) => tracing::debug!(package, error = %err, "batch lookup failed"),
            }
        }
        if let Some(inspector) = &sources.inspector {
            match inspector.application_label(package).await {
                Ok(Some(label)) => {
                    let label = label.trim();
                    return Some(if label.is_empty() { package } else { label }.to_string());
                }
                Ok(None) => {}
                Err(err) => tracing::debug!(package, error = %err, "inspection failed"),
            }
        }
        None
    }

    async fn executor_label(&self, package: &str) -> Option<String> {
        let action = Action::GetAppInfo {
            package: package.to_string(),
        };
        let reply = self
            .inner
            .bridge
            .execute(&action.command_line(&self.inner.paths))
            .await;
        let label = reply.trim();
        if label.is_empty() || is_error_reply(label) {
            return None;
        }
        Some(label.to_string())
    }
}
