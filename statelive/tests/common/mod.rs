use statelive::{Dispatcher, ExecutionScope, StateError, StateLiveData, Stateful, StatefulStreamExt};
use futures::StreamExt;
use std::time::Duration;

#[derive(Clone, Debug, PartialEq)]
pub struct Profile {
    pub id: u64,
    pub name: String,
}

/// A slow in-memory backend.
#[derive(Clone)]
pub struct ProfileRepository {
    pub delay: Duration,
}

impl ProfileRepository {
    pub async fn load(&self, id: u64) -> Result<Profile, StateError> {
        tokio::time::sleep(self.delay).await;
        if id == 0 {
            return Err(StateError::message("no profile with id 0"));
        }
        Ok(Profile {
            id,
            name: format!("user-{id}"),
        })
    }
}

pub fn test_scope(name: &str) -> ExecutionScope {
    let dispatcher = Dispatcher::spawn(name).expect("failed to spawn dispatcher");
    ExecutionScope::current()
        .expect("tests run inside a tokio runtime")
        .with_dispatcher(dispatcher)
}

pub async fn settle<T>(live: &StateLiveData<T>) -> Stateful<T>
where
    T: Clone + Send + Sync + 'static,
{
    let states = live.to_stream().until_complete().collect::<Vec<_>>();
    let states = tokio::time::timeout(Duration::from_secs(5), states)
        .await
        .expect("timed out waiting for the container to settle");
    states
        .into_iter()
        .flatten()
        .last()
        .filter(Stateful::is_complete)
        .expect("container never settled")
}

/// Waits until the container holds a state matching `accept`.
pub async fn settle_where<T, F>(live: &StateLiveData<T>, accept: F) -> Stateful<T>
where
    T: Clone + Send + Sync + 'static,
    F: Fn(&Stateful<T>) -> bool,
{
    let mut states = live.to_stream();
    let wait = async {
        while let Some(state) = states.next().await {
            if let Some(state) = state.filter(|state| accept(state)) {
                return state;
            }
        }
        panic!("container stream ended");
    };
    tokio::time::timeout(Duration::from_secs(5), wait)
        .await
        .expect("timed out waiting for the expected state")
}
