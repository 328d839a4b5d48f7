//! Scripted executor host for unit tests.
use crate::bridge::{Backend, CommandBridge, HostReply, PromiseHost};
use anyhow::Result;
use std::collections::VecDeque;
use std::sync::{Arc, Mutex};
use std::time::Duration;

struct Rule {
    needle: String,
    replies: VecDeque<HostReply>,
}

/// Replies to commands containing a registered needle. Replies queue up in
/// order; the last one repeats. Unmatched commands get an empty success.
#[derive(Default)]
pub(crate) struct ScriptedHost {
    rules: Mutex<Vec<Rule>>,
    calls: Mutex<Vec<String>>,
    delay: Option<Duration>,
}

impl ScriptedHost {
    pub(crate) fn new() -> Arc<Self> {
        Arc::new(Self::default())
    }

    pub(crate) fn with_delay(delay: Duration) -> Arc<Self> {
        Arc::new(Self {
            delay: Some(delay),
            ..Self::default()
        })
    }

    pub(crate) fn on(&self, needle: &str, stdout: &str) -> &Self {
        self.push(needle, HostReply::success(stdout))
    }

    pub(crate) fn push(&self, needle: &str, reply: HostReply) -> &Self {
        let mut rules = self.rules.lock().expect("rules lock");
        match rules.iter_mut().find(|rule| rule.needle == needle) {
            Some(rule) => rule.replies.push_back(reply),
            None => rules.push(Rule {
                needle: needle.to_string(),
                replies: VecDeque::from([reply]),
            }),
        }
        self
    }

    pub(crate) fn calls(&self) -> Vec<String> {
        self.calls.lock().expect("calls lock").clone()
    }

    pub(crate) fn count(&self, needle: &str) -> usize {
        self.calls()
            .iter()
            .filter(|command| command.contains(needle))
            .count()
    }

    pub(crate) fn bridge(self: &Arc<Self>) -> CommandBridge {
        CommandBridge::new(Backend::Promise(self.clone()), Duration::from_secs(15))
    }

    fn reply_for(&self, command: &str) -> HostReply {
        let mut rules = self.rules.lock().expect("rules lock");
        let Some(rule) = rules.iter_mut().find(|rule| command.contains(&rule.needle)) else {
            return HostReply::default();
        };
        if rule.replies.len() > 1 {
            rule.replies.pop_front().unwrap_or_default()
        } else {
            rule.replies.front().cloned().unwrap_or_default()
        }
    }
}

#[async_trait::async_trait]
impl PromiseHost for ScriptedHost {
    async fn exec(&self, command: &str) -> Result<HostReply> {
        self.calls
            .lock()
            .expect("calls lock")
            .push(command.to_string());
        if let Some(delay) = self.delay {
            tokio::time::sleep(delay).await;
        }
        Ok(self.reply_for(command))
    }
}
