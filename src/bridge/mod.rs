//! Command bridge to the privileged executor.
//!
//! Every call resolves to a string: trimmed stdout on success, or an
//! `"Error: "`-prefixed description on failure. Nothing here returns `Err`,
//! so callers have one inspection path (see [`crate::protocol::classify_result`]).
//!
//! The calling convention is chosen once, when the bridge is built:
//!
//! - [`Backend::Promise`]: the host call is awaited directly.
//! - [`Backend::Callback`]: the host gets a correlation token and replies
//!   through [`CallbackRegistry::complete`]; the bridge stops waiting after
//!   the configured timeout.
//! - [`Backend::Null`]: no executor is present; every call yields `""`.
mod callback;
mod host;
mod process;

pub use callback::{correlation_token, CallbackRegistry};
pub use host::{
    error_reply, is_error_reply, reply_text, CallbackHost, HostReply, PromiseHost, ERROR_PREFIX,
    TIMEOUT_REPLY, UNKNOWN_FAILURE_REPLY,
};
pub use process::{ShellHost, ShellLauncher, ThreadedShellHost};

use crate::settings::Settings;
use anyhow::Result;
use serde::Serialize;
use std::sync::Arc;
use std::time::{Duration, Instant};

pub enum Backend {
    Promise(Arc<dyn PromiseHost>),
    Callback(Arc<dyn CallbackHost>),
    Null,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "snake_case")]
pub enum BackendKind {
    Promise,
    Callback,
    Null,
}

/// Backend requested on the command line.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, clap::ValueEnum)]
pub enum BackendChoice {
    /// Shell host when the launcher is on PATH, otherwise inert
    #[default]
    Auto,
    /// Awaitable shell host
    Process,
    /// Thread-per-call shell host replying through correlation tokens
    Callback,
    /// Inert backend; every command yields an empty result
    None,
}

struct BridgeInner {
    backend: Backend,
    registry: CallbackRegistry,
    timeout: Duration,
}

/// Cheap to clone; clones share the backend and the callback registry.
#[derive(Clone)]
pub struct CommandBridge {
    inner: Arc<BridgeInner>,
}

impl CommandBridge {
    pub fn new(backend: Backend, timeout: Duration) -> Self {
        Self {
            inner: Arc::new(BridgeInner {
                backend,
                registry: CallbackRegistry::new(),
                timeout,
            }),
        }
    }

    pub fn null() -> Self {
        Self::new(Backend::Null, Duration::from_millis(crate::settings::DEFAULT_TIMEOUT_MS))
    }

    /// Build the bridge for a CLI session.
    pub fn detect(settings: &Settings, choice: BackendChoice) -> Result<Self> {
        let launcher = ShellLauncher::from_settings(settings)?;
        let timeout = settings.timeout();
        let backend = match choice {
            BackendChoice::None => Backend::Null,
            BackendChoice::Process => Backend::Promise(Arc::new(ShellHost::new(launcher, timeout))),
            BackendChoice::Callback => Backend::Callback(Arc::new(ThreadedShellHost::new(launcher))),
            BackendChoice::Auto => match launcher.locate() {
                Some(path) => {
                    tracing::debug!(launcher = %path.display(), "executor host found");
                    Backend::Promise(Arc::new(ShellHost::new(launcher, timeout)))
                }
                None => {
                    tracing::warn!(
                        launcher = launcher.program(),
                        "no executor host on PATH; running with inert backend"
                    );
                    Backend::Null
                }
            },
        };
        Ok(Self::new(backend, timeout))
    }

    pub fn kind(&self) -> BackendKind {
        match self.inner.backend {
            Backend::Promise(_) => BackendKind::Promise,
            Backend::Callback(_) => BackendKind::Callback,
            Backend::Null => BackendKind::Null,
        }
    }

    pub fn registry(&self) -> &CallbackRegistry {
        &self.inner.registry
    }

    pub fn timeout(&self) -> Duration {
        self.inner.timeout
    }

    /// Run `command` on the executor and return its textual result.
    pub async fn execute(&self, command: &str) -> String {
        tracing::debug!(command, "exec");
        let start = Instant::now();
        let result = match &self.inner.backend {
            Backend::Null => {
                tracing::debug!(command, "inert backend; empty result");
                return String::new();
            }
            Backend::Promise(host) => match host.exec(command).await {
                Ok(reply) => reply_text(reply),
                Err(err) => {
                    tracing::warn!(command, error = %err, "executor call failed");
                    error_reply(&err)
                }
            },
            Backend::Callback(host) => self.execute_with_callback(host.as_ref(), command).await,
        };
        tracing::debug!(
            elapsed_ms = start.elapsed().as_millis() as u64,
            result_bytes = result.len(),
            "exec result"
        );
        result
    }

    async fn execute_with_callback(&self, host: &dyn CallbackHost, command: &str) -> String {
        let registry = &self.inner.registry;
        let (token, reply_rx) = registry.register();
        if let Err(err) = host.exec(command, &token, registry) {
            registry.unregister(&token);
            tracing::warn!(command, error = %err, "executor dispatch failed");
            return error_reply(&err);
        }
        match tokio::time::timeout(self.inner.timeout, reply_rx).await {
            Ok(Ok(reply)) => reply_text(reply),
            Ok(Err(_)) => UNKNOWN_FAILURE_REPLY.to_string(),
            Err(_) => {
                registry.unregister(&token);
                tracing::warn!(
                    command,
                    timeout_ms = self.inner.timeout.as_millis() as u64,
                    "executor callback timed out"
                );
                TIMEOUT_REPLY.to_string()
            }
        }
    }
}

#[cfg(test)]
#[path = "bridge_tests.rs"]
mod tests;
