use crate::{StateError, Stateful};

/// Output of a background computation that can be turned into an envelope.
///
/// Plain values become Success; `Result`s become Success or Error.
pub trait ExecutionResult<T> {
    fn into_stateful(self) -> Stateful<T>;
}

impl<T> ExecutionResult<T> for T {
    fn into_stateful(self) -> Stateful<T> {
        Stateful::success(self)
    }
}

impl<T, E> ExecutionResult<T> for Result<T, E>
where
    E: Into<StateError>,
{
    fn into_stateful(self) -> Stateful<T> {
        match self {
            Ok(value) => Stateful::success(value),
            Err(error) => Stateful::error(error),
        }
    }
}
