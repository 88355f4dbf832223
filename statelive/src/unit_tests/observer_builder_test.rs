use crate::unit_tests::{test_dispatcher, Recorder};
use crate::{ObserveError, Scope, StateLiveData, Stateful};
use std::sync::atomic::{AtomicUsize, Ordering};
use std::sync::Arc;

#[tokio::test]
async fn test_each_state_reaches_its_callback() {
    let dispatcher = test_dispatcher();
    let live: StateLiveData<i32> = StateLiveData::new_on(dispatcher.clone());
    let scope = Scope::new();
    let successes = Recorder::new();
    let errors = Recorder::new();
    let loadings = Arc::new(AtomicUsize::new(0));

    let loading_count = loadings.clone();
    live.observe_states(&scope)
        .on_success(successes.callback())
        .on_error(errors.callback())
        .on_loading(move |_| {
            loading_count.fetch_add(1, Ordering::SeqCst);
        })
        .observe()
        .unwrap();

    for state in [
        Stateful::loading(None),
        Stateful::success(1),
        Stateful::error("failed"),
        Stateful::success(2),
    ] {
        live.set_value(state);
        dispatcher.flush().await.unwrap();
    }

    assert_eq!(successes.seen(), vec![1, 2]);
    assert_eq!(errors.seen(), vec![crate::StateError::message("failed")]);
    assert_eq!(loadings.load(Ordering::SeqCst), 1);
}

#[tokio::test]
async fn test_missing_callbacks_are_ignored() {
    let dispatcher = test_dispatcher();
    let live: StateLiveData<i32> = StateLiveData::new_on(dispatcher.clone());
    let scope = Scope::new();
    let successes = Recorder::new();

    live.observe_states(&scope)
        .on_success(successes.callback())
        .observe()
        .unwrap();
    live.set_loading(None);
    dispatcher.flush().await.unwrap();
    live.set_error("ignored");
    dispatcher.flush().await.unwrap();
    live.set_success(3);
    dispatcher.flush().await.unwrap();

    assert_eq!(successes.seen(), vec![3]);
}

#[test]
fn test_observe_on_released_container_fails() {
    let dispatcher = test_dispatcher();
    let live: StateLiveData<i32> = StateLiveData::new_on(dispatcher);
    let scope = Scope::new();

    let builder = live.observe_states(&scope).on_success(|_| {});
    drop(live);
    assert_eq!(builder.observe(), Err(ObserveError::ContainerReleased));
}

#[test]
fn test_observe_on_released_scope_fails() {
    let dispatcher = test_dispatcher();
    let live: StateLiveData<i32> = StateLiveData::new_on(dispatcher);
    let scope = Scope::new();

    let builder = live.observe_states(&scope).on_success(|_| {});
    drop(scope);
    assert_eq!(builder.observe(), Err(ObserveError::ScopeReleased));
    assert_eq!(live.observer_count(), 0);
}

#[tokio::test]
async fn test_loading_then_background_success() {
    let dispatcher = test_dispatcher();
    let live = StateLiveData::with_value_on(dispatcher.clone(), Stateful::loading(None));
    let scope = Scope::new();
    let successes = Recorder::new();
    let errors = Recorder::new();
    let loadings = Arc::new(AtomicUsize::new(0));

    let loadings_after_observe = dispatcher
        .invoke_async({
            let live = live.clone();
            let scope = scope.clone();
            let successes = successes.clone();
            let errors = errors.clone();
            let loadings = loadings.clone();
            move || {
                let loading_count = loadings.clone();
                live.observe_states(&scope)
                    .on_loading(move |_| {
                        loading_count.fetch_add(1, Ordering::SeqCst);
                    })
                    .on_success(successes.callback())
                    .on_error(errors.callback())
                    .observe()
                    .unwrap();
                loadings.load(Ordering::SeqCst)
            }
        })
        .await
        .unwrap();
    assert_eq!(loadings_after_observe, 1);
    assert_eq!(successes.len(), 0);

    let producer = live.clone();
    std::thread::spawn(move || producer.set_success(42))
        .join()
        .unwrap();
    dispatcher.flush().await.unwrap();

    assert_eq!(successes.seen(), vec![42]);
    assert_eq!(loadings.load(Ordering::SeqCst), 1);
    assert_eq!(errors.len(), 0);
}
