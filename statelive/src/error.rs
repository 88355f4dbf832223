use std::any::Any;
use std::sync::Arc;
use thiserror::Error;

/// The failure carried by an [`Error`](crate::Stateful::Error) envelope.
///
/// Envelopes are shared between observers, so the error is cheap to clone:
/// foreign errors are kept behind an `Arc`.
#[derive(Error, Debug, Clone)]
pub enum StateError {
    /// A failure described only by a message.
    #[error("{0}")]
    Message(String),

    /// A failure produced by some other error type.
    #[error(transparent)]
    Source(Arc<dyn std::error::Error + Send + Sync + 'static>),

    /// The work producing the value was cancelled.
    #[error("Task was cancelled!")]
    Cancelled,

    /// A payload did not have the type its consumer expected.
    #[error("expected a value of type `{expected}` but found `{actual}`")]
    TypeMismatch { expected: String, actual: String },

    /// The computation panicked.
    #[error("computation panicked: {0}")]
    Panicked(String),

    /// A remote call answered with a non-successful status.
    #[error("HTTP {status}: {message}")]
    Http { status: u16, message: String },

    /// A remote call never produced a response.
    #[error("transport failure: {0}")]
    Transport(String),
}

impl StateError {
    pub fn message(message: impl Into<String>) -> Self {
        StateError::Message(message.into())
    }

    /// Wraps any error type, keeping it reachable through `source()`.
    pub fn from_error<E>(error: E) -> Self
    where
        E: std::error::Error + Send + Sync + 'static,
    {
        StateError::Source(Arc::new(error))
    }

    pub fn type_mismatch(expected: impl Into<String>, actual: impl Into<String>) -> Self {
        StateError::TypeMismatch {
            expected: expected.into(),
            actual: actual.into(),
        }
    }

    pub(crate) fn from_panic(payload: Box<dyn Any + Send>) -> Self {
        StateError::Panicked(panic_message(payload.as_ref()))
    }

    pub fn is_cancelled(&self) -> bool {
        matches!(self, StateError::Cancelled)
    }

    pub fn is_type_mismatch(&self) -> bool {
        matches!(self, StateError::TypeMismatch { .. })
    }

    pub fn is_panicked(&self) -> bool {
        matches!(self, StateError::Panicked(_))
    }

    pub fn is_http(&self) -> bool {
        matches!(self, StateError::Http { .. })
    }
}

impl PartialEq for StateError {
    fn eq(&self, other: &Self) -> bool {
        match (self, other) {
            (StateError::Message(a), StateError::Message(b)) => a == b,
            (StateError::Source(a), StateError::Source(b)) => {
                Arc::ptr_eq(a, b) || a.to_string() == b.to_string()
            }
            (StateError::Cancelled, StateError::Cancelled) => true,
            (
                StateError::TypeMismatch { expected, actual },
                StateError::TypeMismatch {
                    expected: other_expected,
                    actual: other_actual,
                },
            ) => expected == other_expected && actual == other_actual,
            (StateError::Panicked(a), StateError::Panicked(b)) => a == b,
            (
                StateError::Http { status, message },
                StateError::Http {
                    status: other_status,
                    message: other_message,
                },
            ) => status == other_status && message == other_message,
            (StateError::Transport(a), StateError::Transport(b)) => a == b,
            _ => false,
        }
    }
}

impl From<&str> for StateError {
    fn from(value: &str) -> Self {
        StateError::Message(value.to_string())
    }
}

impl From<String> for StateError {
    fn from(value: String) -> Self {
        StateError::Message(value)
    }
}

impl From<std::io::Error> for StateError {
    fn from(value: std::io::Error) -> Self {
        StateError::from_error(value)
    }
}

impl From<Box<dyn std::error::Error + Send + Sync + 'static>> for StateError {
    fn from(value: Box<dyn std::error::Error + Send + Sync + 'static>) -> Self {
        StateError::Source(Arc::from(value))
    }
}

impl From<tokio::task::JoinError> for StateError {
    fn from(value: tokio::task::JoinError) -> Self {
        if value.is_cancelled() {
            StateError::Cancelled
        } else {
            match value.try_into_panic() {
                Ok(payload) => StateError::from_panic(payload),
                Err(other) => StateError::Message(other.to_string()),
            }
        }
    }
}

/// Raised at the call site when an observation is built on something that
/// no longer exists.
#[derive(Error, Debug, Clone, Copy, Eq, PartialEq)]
pub enum ObserveError {
    #[error("the observed container has already been released")]
    ContainerReleased,

    #[error("the lifecycle scope has already been released")]
    ScopeReleased,
}

#[derive(Error, Debug, Clone, Copy, Eq, PartialEq)]
pub enum DispatchError {
    /// The dispatcher thread is gone and no longer accepts jobs.
    #[error("dispatcher `{0}` is closed")]
    Closed(u64),

    /// The job was dropped before it produced a result, usually because it panicked.
    #[error("dispatched job did not complete")]
    Dropped,
}

pub(crate) fn panic_message(payload: &(dyn Any + Send)) -> String {
    if let Some(message) = payload.downcast_ref::<&'static str>() {
        (*message).to_string()
    } else if let Some(message) = payload.downcast_ref::<String>() {
        message.clone()
    } else {
        "unknown panic payload".to_string()
    }
}
