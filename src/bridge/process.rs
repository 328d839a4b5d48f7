//! Local shell hosts that run command lines as child processes.
//!
//! `ShellHost` is the awaitable convention; `ThreadedShellHost` emulates the
//! legacy callback convention by running each command on its own thread and
//! delivering the reply through the registry.
use super::callback::CallbackRegistry;
use super::host::{CallbackHost, HostReply, PromiseHost};
use crate::settings::Settings;
use anyhow::{anyhow, Context, Result};
use async_trait::async_trait;
use std::path::PathBuf;
use std::process::{Output, Stdio};
use std::time::{Duration, Instant};

/// Argument vector that precedes every command line.
///
/// Without a privilege prefix the line runs as `<shell> -c <line>`; with one
/// (e.g. `su -c`) the prefix receives the line directly.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ShellLauncher {
    argv: Vec<String>,
}

impl ShellLauncher {
    pub fn from_settings(settings: &Settings) -> Result<Self> {
        let argv = match settings.privilege_prefix.as_deref() {
            Some(prefix) => shell_words::split(prefix)
                .with_context(|| format!("parse privilege_prefix: {prefix}"))?,
            None => vec![settings.shell.clone(), "-c".to_string()],
        };
        if argv.is_empty() {
            return Err(anyhow!("shell launcher is empty"));
        }
        Ok(Self { argv })
    }

    /// Resolve the launcher program on `PATH`; `None` means no host is present.
    pub fn locate(&self) -> Option<PathBuf> {
        which::which(&self.argv[0]).ok()
    }

    pub fn program(&self) -> &str {
        &self.argv[0]
    }

    fn std_command(&self, line: &str) -> std::process::Command {
        let mut cmd = std::process::Command::new(&self.argv[0]);
        cmd.args(&self.argv[1..])
            .arg(line)
            .stdin(Stdio::null())
            .stdout(Stdio::piped())
            .stderr(Stdio::piped());
        cmd
    }

    fn tokio_command(&self, line: &str) -> tokio::process::Command {
        let mut cmd = tokio::process::Command::new(&self.argv[0]);
        cmd.args(&self.argv[1..])
            .arg(line)
            .stdin(Stdio::null())
            .stdout(Stdio::piped())
            .stderr(Stdio::piped())
            .kill_on_drop(true);
        cmd
    }
}

fn reply_from_output(output: Output) -> HostReply {
    HostReply {
        exit_code: output.status.code().unwrap_or(-1),
        stdout: String::from_utf8_lossy(&output.stdout).into_owned(),
        stderr: String::from_utf8_lossy(&output.stderr).into_owned(),
    }
}

/// Awaitable shell host. The child is killed if it outlives `timeout`.
pub struct ShellHost {
    launcher: ShellLauncher,
    timeout: Duration,
}

impl ShellHost {
    pub fn new(launcher: ShellLauncher, timeout: Duration) -> Self {
        Self { launcher, timeout }
    }
}

#[async_trait]
impl PromiseHost for ShellHost {
    async fn exec(&self, command: &str) -> Result<HostReply> {
        let start = Instant::now();
        let output = tokio::time::timeout(self.timeout, self.launcher.tokio_command(command).output())
            .await
            .map_err(|_| anyhow!("Command timed out after {} ms", self.timeout.as_millis()))?
            .with_context(|| format!("spawn {}", self.launcher.program()))?;
        let reply = reply_from_output(output);
        tracing::debug!(
            elapsed_ms = start.elapsed().as_millis() as u64,
            exit_code = reply.exit_code,
            stdout_bytes = reply.stdout.len(),
            stderr_bytes = reply.stderr.len(),
            "shell exec complete"
        );
        Ok(reply)
    }
}

/// Callback-convention shell host: one detached thread per command.
pub struct ThreadedShellHost {
    launcher: ShellLauncher,
}

impl ThreadedShellHost {
    pub fn new(launcher: ShellLauncher) -> Self {
        Self { launcher }
    }
}

impl CallbackHost for ThreadedShellHost {
    fn exec(&self, command: &str, token: &str, registry: &CallbackRegistry) -> Result<()> {
        let mut cmd = self.launcher.std_command(command);
        let program = self.launcher.program().to_string();
        let token = token.to_string();
        let registry = registry.clone();
        std::thread::Builder::new()
            .name(format!("exec-{token}"))
            .spawn(move || {
                let reply = match cmd.output() {
                    Ok(output) => reply_from_output(output),
                    Err(err) => HostReply::failure(-1, format!("spawn {program}: {err}")),
                };
                registry.complete(&token, reply);
            })
            .context("spawn executor thread")?;
        Ok(())
    }
}
