//! Correlation-token registry for callback-style hosts.
use super::host::HostReply;
use std::collections::HashMap;
use std::sync::atomic::{AtomicU64, Ordering};
use std::sync::{Arc, Mutex, MutexGuard, PoisonError};
use std::time::{SystemTime, UNIX_EPOCH};
use tokio::sync::oneshot;

type Pending = HashMap<String, oneshot::Sender<HostReply>>;

/// One-shot handlers keyed by correlation token.
///
/// Every handler is removed exactly once, either by [`complete`] or by the
/// bridge when it stops waiting. Whichever side loses the race sees `false`.
///
/// [`complete`]: CallbackRegistry::complete
#[derive(Clone, Default)]
pub struct CallbackRegistry {
    pending: Arc<Mutex<Pending>>,
}

impl CallbackRegistry {
    pub fn new() -> Self {
        Self::default()
    }

    pub(crate) fn register(&self) -> (String, oneshot::Receiver<HostReply>) {
        let (tx, rx) = oneshot::channel();
        let mut pending = self.lock();
        let token = loop {
            let candidate = correlation_token();
            if !pending.contains_key(&candidate) {
                break candidate;
            }
        };
        pending.insert(token.clone(), tx);
        (token, rx)
    }

    pub(crate) fn unregister(&self, token: &str) -> bool {
        self.lock().remove(token).is_some()
    }

    /// Deliver a reply for `token`. Returns `false` for unknown or expired tokens.
    pub fn complete(&self, token: &str, reply: HostReply) -> bool {
        let Some(handler) = self.lock().remove(token) else {
            tracing::debug!(token, "discarding reply for unknown or expired token");
            return false;
        };
        handler.send(reply).is_ok()
    }

    pub fn pending(&self) -> usize {
        self.lock().len()
    }

    fn lock(&self) -> MutexGuard<'_, Pending> {
        self.pending.lock().unwrap_or_else(PoisonError::into_inner)
    }
}

/// `cb_<epoch millis>_<random base36>`.
pub fn correlation_token() -> String {
    let millis = SystemTime::now()
        .duration_since(UNIX_EPOCH)
        .map(|elapsed| elapsed.as_millis())
        .unwrap_or_default();
    format!("cb_{millis}_{}", to_base36(random_u64()))
}

fn random_u64() -> u64 {
    static FALLBACK: AtomicU64 = AtomicU64::new(0x9e37_79b9_7f4a_7c15);
    let mut buf = [0u8; 8];
    if getrandom::getrandom(&mut buf).is_ok() {
        return u64::from_le_bytes(buf);
    }
    let nanos = SystemTime::now()
        .duration_since(UNIX_EPOCH)
        .map(|elapsed| elapsed.subsec_nanos() as u64)
        .unwrap_or_default();
    FALLBACK.fetch_add(0x9e37_79b9_7f4a_7c15, Ordering::Relaxed) ^ nanos
}

fn to_base36(mut value: u64) -> String {
    const DIGITS: &[u8; 36] = b"0123456789abcdefghijklmnopqrstuvwxyz";
    if value == 0 {
        return "0".to_string();
    }
    let mut out = Vec::new();
    while value > 0 {
        out.push(DIGITS[(value % 36) as usize]);
        value /= 36;
    }
    out.reverse();
    String::from_utf8_lossy(&out).into_owned()
}
