// src/error.rs
use std::any::Any;
use std::sync::Arc;

use thiserror::Error;

/// A failure raised from inside a task body.
///
/// Faults are captured in the task's completion slot and surfaced to whoever
/// observes the result (`Task::value`, the registry sweep, or a combinator).
/// Cancellation is *not* a fault; it is signalled through the cancel callback.
#[derive(Debug, Clone, Error)]
#[error("{message}")]
pub struct Fault {
    message: Arc<str>,
    panicked: bool,
}

impl Fault {
    pub fn new(message: impl Into<String>) -> Self {
        Self {
            message: message.into().into(),
            panicked: false,
        }
    }

    /// Builds a fault from a `catch_unwind` payload.
    pub fn panicked(payload: Box<dyn Any + Send>) -> Self {
        let message = if let Some(s) = payload.downcast_ref::<&str>() {
            (*s).to_string()
        } else if let Some(s) = payload.downcast_ref::<String>() {
            s.clone()
        } else {
            "task panicked".to_string()
        };
        Self {
            message: message.into(),
            panicked: true,
        }
    }

    pub fn message(&self) -> &str {
        &self.message
    }

    /// True if this fault was produced by a captured panic rather than an
    /// explicit `Step::Fault`.
    pub fn is_panic(&self) -> bool {
        self.panicked
    }
}

impl From<&str> for Fault {
    fn from(s: &str) -> Self {
        Fault::new(s)
    }
}

impl From<String> for Fault {
    fn from(s: String) -> Self {
        Fault::new(s)
    }
}

/// API misuse. Never produced by a correctly written caller; never recovered
/// internally.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Error)]
pub enum ProgrammingError {
    /// The result was requested before the task reached a terminal state.
    #[error("task is not completed; result is not available yet")]
    NotDone,

    /// The result was already taken (results are read-once).
    #[error("task result can be taken only once")]
    AlreadyTaken,

    /// `TaskFinishSource::result` called while no result is set.
    #[error("finish source holds no result; check has_result() first")]
    NoResult,
}

/// Everything `Task::value` can report.
#[derive(Debug, Error)]
pub enum TaskError {
    #[error(transparent)]
    Misuse(#[from] ProgrammingError),

    #[error(transparent)]
    Fault(#[from] Fault),
}

impl TaskError {
    pub fn into_fault(self) -> Option<Fault> {
        match self {
            TaskError::Fault(f) => Some(f),
            TaskError::Misuse(_) => None,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn panic_payload_message_is_extracted() {
        let fault = Fault::panicked(Box::new("boom"));
        assert_eq!(fault.message(), "boom");
        assert!(fault.is_panic());

        let fault = Fault::panicked(Box::new(String::from("kaboom")));
        assert_eq!(fault.message(), "kaboom");
    }

    #[test]
    fn explicit_fault_is_not_a_panic() {
        let fault = Fault::new("bad input");
        assert!(!fault.is_panic());
    }
}
