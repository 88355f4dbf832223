use crate::{ExecutionResult, ExecutionScope, StateError, StateLiveData, Stateful};
use std::panic::{catch_unwind, AssertUnwindSafe};
use tokio::task::JoinHandle;

/// A container that starts Loading and settles with the outcome of `task`.
pub fn from_task<T, E>(task: JoinHandle<Result<T, E>>, scope: &ExecutionScope) -> StateLiveData<T>
where
    T: Clone + Send + Sync + 'static,
    E: Into<StateError> + Send + 'static,
{
    from_task_with(task, scope, |value| value)
}

/// Like [`from_task`], with `transform` applied to the task's value.
///
/// A transform that fails or panics yields an Error envelope. An aborted
/// task, or a cancelled `scope`, yields Error(Cancelled).
pub fn from_task_with<T, E, Y, R, F>(
    mut task: JoinHandle<Result<T, E>>,
    scope: &ExecutionScope,
    transform: F,
) -> StateLiveData<Y>
where
    T: Send + 'static,
    E: Into<StateError> + Send + 'static,
    Y: Clone + Send + Sync + 'static,
    R: ExecutionResult<Y>,
    F: FnOnce(T) -> R + Send + 'static,
{
    let live = StateLiveData::with_value_on(scope.dispatcher().clone(), Stateful::loading(None));
    let target = live.downgrade();
    let token = scope.token().clone();
    scope.runtime().spawn(async move {
        let joined = tokio::select! {
            biased;
            _ = token.cancelled() => {
                task.abort();
                None
            }
            joined = &mut task => Some(joined),
        };
        let outcome = match joined {
            None => Stateful::cancelled(),
            Some(Ok(Ok(value))) => match catch_unwind(AssertUnwindSafe(|| transform(value))) {
                Ok(result) => result.into_stateful(),
                Err(payload) => Stateful::error(StateError::from_panic(payload)),
            },
            Some(Ok(Err(error))) => Stateful::error(error),
            Some(Err(join_error)) => Stateful::error(StateError::from(join_error)),
        };
        if let Some(target) = target.upgrade() {
            target.post_value(outcome);
        }
    });
    live
}
