use crate::{ExecutionScope, StateError, StateLiveData, Stateful};
use futures::future::BoxFuture;
use parking_lot::Mutex;
use serde::Deserialize;
use std::any::{Any, TypeId};
use std::future::Future;
use std::sync::atomic::{AtomicBool, Ordering};
use thiserror::Error;
use tracing::debug;

/// What a remote call answered.
#[derive(Debug, Clone, PartialEq)]
pub struct CallResponse<T> {
    pub status: u16,
    pub message: String,
    pub body: Option<T>,
    /// Raw body of a non-successful response.
    pub error_body: Option<String>,
}

impl<T> CallResponse<T> {
    pub fn ok(body: T) -> Self {
        CallResponse {
            status: 200,
            message: "OK".to_string(),
            body: Some(body),
            error_body: None,
        }
    }

    pub fn no_content() -> Self {
        CallResponse {
            status: 204,
            message: "No Content".to_string(),
            body: None,
            error_body: None,
        }
    }

    pub fn failure(status: u16, message: impl Into<String>, error_body: Option<String>) -> Self {
        CallResponse {
            status,
            message: message.into(),
            body: None,
            error_body,
        }
    }

    pub fn is_successful(&self) -> bool {
        (200..300).contains(&self.status)
    }
}

/// A call that never produced a response.
#[derive(Error, Debug, Clone, Eq, PartialEq)]
pub enum CallError {
    #[error("call was cancelled")]
    Cancelled,

    #[error("{0}")]
    Transport(String),
}

/// A declarative remote call, issued at most once.
pub trait Call<T>: Send + 'static {
    fn execute(self) -> BoxFuture<'static, Result<CallResponse<T>, CallError>>;
}

impl<T, F, Fut> Call<T> for F
where
    F: FnOnce() -> Fut + Send + 'static,
    Fut: Future<Output = Result<CallResponse<T>, CallError>> + Send + 'static,
{
    fn execute(self) -> BoxFuture<'static, Result<CallResponse<T>, CallError>> {
        Box::pin(self())
    }
}

#[derive(Deserialize)]
struct ErrorBody {
    message: Option<String>,
    error: Option<String>,
}

/// A container that issues `call` when it gets its first observer.
///
/// The call starts at most once, however often the container becomes
/// active. It publishes Loading when it starts and the mapped response
/// when it finishes.
pub fn call_live_data<T, C>(call: C, scope: &ExecutionScope) -> StateLiveData<T>
where
    T: Clone + Send + Sync + 'static,
    C: Call<T>,
{
    let live = StateLiveData::new_on(scope.dispatcher().clone());
    let started = AtomicBool::new(false);
    let pending = Mutex::new(Some(call));
    let target = live.downgrade();
    let runtime = scope.runtime().clone();
    let token = scope.token().clone();

    live.set_on_active(move || {
        if started.swap(true, Ordering::AcqRel) {
            return;
        }
        let (Some(call), Some(live)) = (pending.lock().take(), target.upgrade()) else {
            return;
        };
        debug!(body = std::any::type_name::<T>(), "issuing call on first observation");
        live.set_loading(None);

        let target = target.clone();
        let token = token.clone();
        runtime.spawn(async move {
            let outcome = tokio::select! {
                biased;
                _ = token.cancelled() => Stateful::cancelled(),
                result = call.execute() => response_to_state(result),
            };
            if let Some(target) = target.upgrade() {
                target.post_value(outcome);
            }
        });
    });
    live
}

fn response_to_state<T>(result: Result<CallResponse<T>, CallError>) -> Stateful<T>
where
    T: 'static,
{
    let response = match result {
        Ok(response) => response,
        Err(CallError::Cancelled) => return Stateful::cancelled(),
        Err(CallError::Transport(message)) => {
            return Stateful::error(StateError::Transport(message))
        }
    };

    if !response.is_successful() {
        return Stateful::error(StateError::Http {
            status: response.status,
            message: describe_failure(&response),
        });
    }

    let expects_unit = TypeId::of::<T>() == TypeId::of::<()>();
    if matches!(response.status, 204 | 205) && !expects_unit {
        return Stateful::error(StateError::type_mismatch(
            std::any::type_name::<T>(),
            format!("no content (HTTP {})", response.status),
        ));
    }
    match response.body {
        Some(body) => Stateful::success(body),
        None => match unit_value::<T>() {
            Some(unit) => Stateful::success(unit),
            None => Stateful::error(StateError::type_mismatch(std::any::type_name::<T>(), "null")),
        },
    }
}

fn unit_value<T: 'static>() -> Option<T> {
    let unit: Box<dyn Any> = Box::new(());
    unit.downcast::<T>().ok().map(|unit| *unit)
}

fn describe_failure<T>(response: &CallResponse<T>) -> String {
    let structured = response
        .error_body
        .as_deref()
        .and_then(|body| serde_json::from_str::<ErrorBody>(body).ok())
        .and_then(|body| body.message.or(body.error))
        .filter(|message| !message.trim().is_empty());
    if let Some(message) = structured {
        return message;
    }
    if !response.message.trim().is_empty() {
        return response.message.clone();
    }
    "unknown error".to_string()
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_describe_failure_prefers_structured_body() {
        let response: CallResponse<u32> = CallResponse::failure(
            400,
            "Bad Request",
            Some(r#"{"message":"name is required"}"#.to_string()),
        );
        assert_eq!(describe_failure(&response), "name is required");

        let response: CallResponse<u32> =
            CallResponse::failure(500, "", Some(r#"{"error":"boom"}"#.to_string()));
        assert_eq!(describe_failure(&response), "boom");
    }

    #[test]
    fn test_describe_failure_falls_back() {
        let response: CallResponse<u32> =
            CallResponse::failure(502, "Bad Gateway", Some("<html>oops</html>".to_string()));
        assert_eq!(describe_failure(&response), "Bad Gateway");

        let response: CallResponse<u32> = CallResponse::failure(503, " ", None);
        assert_eq!(describe_failure(&response), "unknown error");
    }

    #[test]
    fn test_unit_body() {
        assert_eq!(response_to_state::<()>(Ok(CallResponse::no_content())), Stateful::success(()));
        assert_eq!(
            response_to_state::<()>(Ok(CallResponse {
                status: 200,
                message: "OK".to_string(),
                body: None,
                error_body: None,
            })),
            Stateful::success(())
        );
    }

    #[test]
    fn test_missing_body_is_type_mismatch() {
        let state = response_to_state::<String>(Ok(CallResponse {
            status: 200,
            message: "OK".to_string(),
            body: None,
            error_body: None,
        }));
        assert_eq!(
            state,
            Stateful::error(StateError::type_mismatch(std::any::type_name::<String>(), "null"))
        );

        let state = response_to_state::<String>(Ok(CallResponse::no_content()));
        assert!(state.error_ref().is_some_and(StateError::is_type_mismatch));
    }

    #[test]
    fn test_call_errors() {
        assert!(response_to_state::<u8>(Err(CallError::Cancelled)).is_error_with_cancelled());
        assert_eq!(
            response_to_state::<u8>(Err(CallError::Transport("connection reset".to_string()))),
            Stateful::error(StateError::Transport("connection reset".to_string()))
        );
        assert_eq!(
            response_to_state::<u8>(Ok(CallResponse::failure(404, "Not Found", None))),
            Stateful::error(StateError::Http {
                status: 404,
                message: "Not Found".to_string()
            })
        );
    }
}
