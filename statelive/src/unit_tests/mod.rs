use crate::{Dispatcher, StateLiveData, Stateful};
use futures::StreamExt;
use parking_lot::Mutex;
use std::sync::Arc;
use std::time::Duration;

mod observer_builder_test;
mod stateful_test;
mod stream_ext_test;
mod call_adapter_test;

pub fn test_dispatcher() -> Dispatcher {
    Dispatcher::spawn("statelive-test").expect("failed to spawn test dispatcher")
}

/// Collects everything an observer is handed.
#[derive(Clone)]
pub struct Recorder<V> {
    seen: Arc<Mutex<Vec<V>>>,
}

impl<V: Clone + Send + 'static> Recorder<V> {
    pub fn new() -> Self {
        Recorder {
            seen: Arc::new(Mutex::new(Vec::new())),
        }
    }

    pub fn callback(&self) -> impl Fn(&V) + Send + Sync + 'static {
        let seen = self.seen.clone();
        move |value: &V| seen.lock().push(value.clone())
    }

    pub fn seen(&self) -> Vec<V> {
        self.seen.lock().clone()
    }

    pub fn len(&self) -> usize {
        self.seen.lock().len()
    }
}

/// Waits for the first Success or Error the container holds.
pub async fn await_complete<T>(live: &StateLiveData<T>) -> Stateful<T>
where
    T: Clone + Send + Sync + 'static,
{
    let mut stream = live.to_stream();
    let wait = async {
        while let Some(state) = stream.next().await {
            if let Some(state) = state {
                if state.is_complete() {
                    return state;
                }
            }
        }
        panic!("container stream ended without a complete state");
    };
    tokio::time::timeout(Duration::from_secs(5), wait)
        .await
        .expect("timed out waiting for a complete state")
}

/// Polls `condition` until it holds.
pub async fn wait_until<F: Fn() -> bool>(condition: F) {
    let wait = async {
        while !condition() {
            tokio::time::sleep(Duration::from_millis(5)).await;
        }
    };
    tokio::time::timeout(Duration::from_secs(5), wait)
        .await
        .expect("timed out waiting for condition");
}
