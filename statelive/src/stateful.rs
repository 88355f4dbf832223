use crate::StateError;
use std::any::Any;
use std::fmt;
use std::sync::Arc;

/// Type-erased, shareable payload that remembers the name of its type.
///
/// Used for loading hints (progress, partial data) and for dynamically
/// typed payloads narrowed by [`map_to_typed`](crate::map_to_typed).
#[derive(Clone)]
pub struct AnyValue {
    value: Arc<dyn Any + Send + Sync>,
    type_name: &'static str,
}

impl AnyValue {
    pub fn new<V: Any + Send + Sync>(value: V) -> Self {
        AnyValue {
            value: Arc::new(value),
            type_name: std::any::type_name::<V>(),
        }
    }

    pub fn type_name(&self) -> &'static str {
        self.type_name
    }

    pub fn is<V: Any>(&self) -> bool {
        self.value.is::<V>()
    }

    pub fn downcast_ref<V: Any>(&self) -> Option<&V> {
        self.value.downcast_ref::<V>()
    }
}

impl fmt::Debug for AnyValue {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "AnyValue({})", self.type_name)
    }
}

impl PartialEq for AnyValue {
    fn eq(&self, other: &Self) -> bool {
        Arc::ptr_eq(&self.value, &other.value)
    }
}

/// The tri-state envelope published by a [`StateLiveData`](crate::StateLiveData).
///
/// An envelope is never mutated; a state change publishes a new one.
#[derive(Debug, Clone, PartialEq)]
pub enum Stateful<T> {
    /// Work is in flight, optionally with a progress hint or partial data.
    Loading(Option<AnyValue>),
    /// Work completed with `value`. `T` may itself be an `Option`.
    Success { value: T },
    /// Work failed.
    Error { error: StateError },
}

impl<T> Stateful<T> {
    pub fn loading(hint: Option<AnyValue>) -> Self {
        Stateful::Loading(hint)
    }

    pub fn loading_with<H: Any + Send + Sync>(hint: H) -> Self {
        Stateful::Loading(Some(AnyValue::new(hint)))
    }

    pub fn success(value: T) -> Self {
        Stateful::Success { value }
    }

    pub fn error(error: impl Into<StateError>) -> Self {
        Stateful::Error {
            error: error.into(),
        }
    }

    pub fn error_with_message(message: impl Into<String>) -> Self {
        Stateful::Error {
            error: StateError::Message(message.into()),
        }
    }

    pub fn cancelled() -> Self {
        Stateful::Error {
            error: StateError::Cancelled,
        }
    }

    pub fn is_loading(&self) -> bool {
        matches!(self, Stateful::Loading(_))
    }

    pub fn is_success(&self) -> bool {
        matches!(self, Stateful::Success { .. })
    }

    pub fn is_error(&self) -> bool {
        matches!(self, Stateful::Error { .. })
    }

    /// Success or Error.
    pub fn is_complete(&self) -> bool {
        matches!(self, Stateful::Success { .. } | Stateful::Error { .. })
    }

    pub fn is_error_with_cancelled(&self) -> bool {
        if let Stateful::Error { error } = self {
            error.is_cancelled()
        } else {
            false
        }
    }

    pub fn value_ref(&self) -> Option<&T> {
        match self {
            Stateful::Success { value } => Some(value),
            _ => None,
        }
    }

    pub fn value(self) -> Option<T> {
        match self {
            Stateful::Success { value } => Some(value),
            _ => None,
        }
    }

    pub fn error_ref(&self) -> Option<&StateError> {
        match self {
            Stateful::Error { error } => Some(error),
            _ => None,
        }
    }

    pub fn loading_hint(&self) -> Option<&AnyValue> {
        match self {
            Stateful::Loading(hint) => hint.as_ref(),
            _ => None,
        }
    }

    /// Applies `f` to a Success value and relays Loading and Error as they are.
    pub fn map<Y, F>(self, f: F) -> Stateful<Y>
    where
        F: FnOnce(T) -> Y,
    {
        match self {
            Stateful::Loading(hint) => Stateful::Loading(hint),
            Stateful::Success { value } => Stateful::Success { value: f(value) },
            Stateful::Error { error } => Stateful::Error { error },
        }
    }

    /// Re-types a Loading or Error envelope. Returns the Success value as `Err`.
    pub fn retype<Y>(&self) -> Result<Stateful<Y>, &T> {
        match self {
            Stateful::Loading(hint) => Ok(Stateful::Loading(hint.clone())),
            Stateful::Success { value } => Err(value),
            Stateful::Error { error } => Ok(Stateful::Error {
                error: error.clone(),
            }),
        }
    }
}

impl<T> Default for Stateful<T> {
    fn default() -> Self {
        Stateful::Loading(None)
    }
}

impl<T, E> From<Result<T, E>> for Stateful<T>
where
    E: Into<StateError>,
{
    fn from(value: Result<T, E>) -> Self {
        match value {
            Ok(value) => Stateful::success(value),
            Err(error) => Stateful::error(error),
        }
    }
}
