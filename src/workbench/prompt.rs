//! Confirmation gates and progress notices.
use anyhow::Result;
use async_trait::async_trait;
use std::io::{self, BufRead, IsTerminal, Write};

#[async_trait]
pub trait Prompter: Send + Sync {
    /// Ask before a destructive action. `false` means declined.
    async fn confirm(&self, title: &str, message: &str) -> bool;

    /// Progress notice shown while an action runs.
    fn notice(&self, message: &str) {
        tracing::info!(message, "notice");
    }
}

/// Accepts every gate (`--yes`).
pub struct AutoConfirm;

#[async_trait]
impl Prompter for AutoConfirm {
    async fn confirm(&self, title: &str, _message: &str) -> bool {
        tracing::debug!(title, "auto-confirmed");
        true
    }
}

/// Asks on the terminal. Without a terminal on stdin every gate is declined.
pub struct TerminalPrompter;

impl TerminalPrompter {
    fn ask(title: &str, message: &str) -> Result<bool> {
        let stdin = io::stdin();
        if !stdin.is_terminal() {
            return Ok(false);
        }
        let mut stderr = io::stderr().lock();
        writeln!(stderr, "{title}")?;
        writeln!(stderr, "{message}")?;
        write!(stderr, "Proceed? [y/N] ")?;
        stderr.flush()?;

        let mut answer = String::new();
        stdin.lock().read_line(&mut answer)?;
        Ok(matches!(
            answer.trim().to_ascii_lowercase().as_str(),
            "y" | "yes"
        ))
    }
}

#[async_trait]
impl Prompter for TerminalPrompter {
    async fn confirm(&self, title: &str, message: &str) -> bool {
        let title_owned = title.to_string();
        let message = message.to_string();
        let answer = tokio::task::spawn_blocking(move || Self::ask(&title_owned, &message)).await;
        match answer {
            Ok(Ok(answer)) => answer,
            Ok(Err(err)) => {
                tracing::warn!(title, error = %err, "confirmation prompt failed");
                false
            }
            Err(err) => {
                tracing::warn!(title, error = %err, "confirmation prompt aborted");
                false
            }
        }
    }

    fn notice(&self, message: &str) {
        eprintln!("{message}");
    }
}
