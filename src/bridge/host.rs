//! Executor host contracts.
//!
//! A host is whatever can actually run a command line with privileges. Two
//! calling conventions exist in the wild: hosts that return the reply
//! directly (awaitable), and older hosts that accept a correlation token and
//! deliver the reply later through a [`CallbackRegistry`].
use super::callback::CallbackRegistry;
use anyhow::Result;
use async_trait::async_trait;

pub const ERROR_PREFIX: &str = "Error: ";
pub const TIMEOUT_REPLY: &str = "Error: Command timed out";
pub const UNKNOWN_FAILURE_REPLY: &str = "Error: Unknown failure";

/// Raw executor reply as delivered by either convention.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct HostReply {
    pub exit_code: i32,
    pub stdout: String,
    pub stderr: String,
}

impl HostReply {
    pub fn success(stdout: impl Into<String>) -> Self {
        Self {
            exit_code: 0,
            stdout: stdout.into(),
            stderr: String::new(),
        }
    }

    pub fn failure(exit_code: i32, stderr: impl Into<String>) -> Self {
        Self {
            exit_code,
            stdout: String::new(),
            stderr: stderr.into(),
        }
    }
}

/// Host that returns the reply from the call itself.
#[async_trait]
pub trait PromiseHost: Send + Sync {
    async fn exec(&self, command: &str) -> Result<HostReply>;
}

/// Host that replies later via `registry.complete(token, reply)`.
///
/// `exec` only dispatches; returning `Ok` means the command was handed off,
/// not that it finished.
pub trait CallbackHost: Send + Sync {
    fn exec(&self, command: &str, token: &str, registry: &CallbackRegistry) -> Result<()>;
}

/// Collapse a reply into the single string the bridge hands to callers.
///
/// A failing command still yields its stdout when it printed any, since the
/// handler script reports most errors on stdout.
pub fn reply_text(reply: HostReply) -> String {
    let stdout = reply.stdout.trim();
    if reply.exit_code == 0 || !stdout.is_empty() {
        return stdout.to_string();
    }
    let stderr = reply.stderr.trim();
    if stderr.is_empty() {
        UNKNOWN_FAILURE_REPLY.to_string()
    } else {
        format!("{ERROR_PREFIX}{stderr}")
    }
}

pub fn error_reply(err: &anyhow::Error) -> String {
    format!("{ERROR_PREFIX}{err:#}")
}

pub fn is_error_reply(text: &str) -> bool {
    text.starts_with(ERROR_PREFIX)
}
