use crate::adapters::{call_live_data, CallError, CallResponse};
use crate::unit_tests::{await_complete, test_dispatcher, Recorder};
use crate::{ExecutionScope, StateError, StateLiveData, Stateful};
use std::sync::atomic::{AtomicUsize, Ordering};
use std::sync::Arc;
use std::time::Duration;

fn scope() -> ExecutionScope {
    ExecutionScope::current()
        .unwrap()
        .with_dispatcher(test_dispatcher())
}

#[derive(Debug, Clone, PartialEq)]
struct User {
    id: u32,
    name: String,
}

#[tokio::test(flavor = "multi_thread", worker_threads = 2)]
async fn test_call_starts_on_first_observer_only() {
    let scope = scope();
    let calls = Arc::new(AtomicUsize::new(0));

    let counter = calls.clone();
    let live: StateLiveData<User> = call_live_data(
        move || async move {
            counter.fetch_add(1, Ordering::SeqCst);
            tokio::time::sleep(Duration::from_millis(50)).await;
            Ok::<_, CallError>(CallResponse::ok(User {
                id: 7,
                name: "ada".to_string(),
            }))
        },
        &scope,
    );
    tokio::time::sleep(Duration::from_millis(30)).await;
    assert_eq!(calls.load(Ordering::SeqCst), 0);
    assert_eq!(live.value(), None);

    let recorder = Recorder::new();
    let subscription = live.observe_forever(recorder.callback());
    let state = await_complete(&live).await;
    assert_eq!(
        state,
        Stateful::success(User {
            id: 7,
            name: "ada".to_string()
        })
    );
    assert_eq!(calls.load(Ordering::SeqCst), 1);

    drop(subscription);
    let again = live.observe_forever(|_| {});
    tokio::time::sleep(Duration::from_millis(30)).await;
    assert_eq!(calls.load(Ordering::SeqCst), 1);
    drop(again);

    scope.dispatcher().flush().await.unwrap();
    assert_eq!(recorder.seen().first(), Some(&Stateful::loading(None)));
}

#[tokio::test(flavor = "multi_thread", worker_threads = 2)]
async fn test_call_http_failure() {
    let scope = scope();
    let live: StateLiveData<User> = call_live_data(
        || async {
            Ok::<_, CallError>(CallResponse::failure(
                422,
                "Unprocessable Entity",
                Some(r#"{"message":"name is taken"}"#.to_string()),
            ))
        },
        &scope,
    );
    let _subscription = live.observe_forever(|_| {});

    assert_eq!(
        await_complete(&live).await,
        Stateful::error(StateError::Http {
            status: 422,
            message: "name is taken".to_string()
        })
    );
}

#[tokio::test(flavor = "multi_thread", worker_threads = 2)]
async fn test_call_transport_failure() {
    let scope = scope();
    let live: StateLiveData<()> = call_live_data(
        || async { Err::<CallResponse<()>, _>(CallError::Transport("timed out".to_string())) },
        &scope,
    );
    let _subscription = live.observe_forever(|_| {});

    assert_eq!(
        await_complete(&live).await,
        Stateful::error(StateError::Transport("timed out".to_string()))
    );
}

#[tokio::test(flavor = "multi_thread", worker_threads = 2)]
async fn test_call_cancelled_with_scope() {
    let scope = scope();
    let live: StateLiveData<u32> = call_live_data(
        || async {
            tokio::time::sleep(Duration::from_secs(10)).await;
            Ok::<_, CallError>(CallResponse::ok(1))
        },
        &scope,
    );
    let _subscription = live.observe_forever(|_| {});
    scope.cancel();

    assert!(await_complete(&live).await.is_error_with_cancelled());
}
