//! User-facing result of one orchestrated action.
use serde::Serialize;
use std::fmt;

#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
#[serde(tag = "status", rename_all = "snake_case")]
pub enum Outcome {
    Completed {
        message: String,
    },
    /// A multi-step action stopped halfway; manual follow-up may be needed.
    Partial {
        message: String,
        detail: String,
    },
    Failed {
        message: String,
        detail: String,
    },
    /// Local precondition failed; no executor call was made.
    Rejected {
        reason: String,
    },
    /// Confirmation declined; nothing happened.
    Declined,
}

impl Outcome {
    pub fn completed(message: impl Into<String>) -> Self {
        Outcome::Completed {
            message: message.into(),
        }
    }

    pub fn failed(message: impl Into<String>, detail: impl Into<String>) -> Self {
        Outcome::Failed {
            message: message.into(),
            detail: detail.into(),
        }
    }

    pub fn rejected(reason: impl Into<String>) -> Self {
        Outcome::Rejected {
            reason: reason.into(),
        }
    }

    pub fn is_completed(&self) -> bool {
        matches!(self, Outcome::Completed { .. })
    }

    /// Exit status for the CLI: declining is not an error.
    pub fn is_error(&self) -> bool {
        matches!(
            self,
            Outcome::Failed { .. } | Outcome::Partial { .. } | Outcome::Rejected { .. }
        )
    }
}

impl fmt::Display for Outcome {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Outcome::Completed { message } => write!(f, "{message}"),
            Outcome::Partial { message, detail } | Outcome::Failed { message, detail } => {
                if detail.is_empty() {
                    write!(f, "{message}")
                } else {
                    write!(f, "{message}:\n{detail}")
                }
            }
            Outcome::Rejected { reason } => write!(f, "{reason}"),
            Outcome::Declined => write!(f, "cancelled"),
        }
    }
}
