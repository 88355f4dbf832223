use crate::tracing_setup::tracing_init;
use futures::StreamExt;
use statelive::adapters::{call_live_data, from_task, CallError, CallResponse};
use statelive::{async_map, ExecutionScope, StateError, StateLiveData, StatefulStreamExt};
use std::time::Duration;
use tokio::time::sleep;
use tracing::{debug, info, warn};

mod tracing_setup;

async fn heavy_computation(input: u64) -> Result<u64, StateError> {
    sleep(Duration::from_millis(200)).await;
    if input == 0 {
        return Err(StateError::message("input must not be zero"));
    }
    Ok((1..=input).sum())
}

async fn print_until_complete<T>(label: &str, live: &StateLiveData<T>)
where
    T: Clone + Send + Sync + std::fmt::Debug + 'static,
{
    live.to_stream()
        .until_complete()
        .for_each(|state| async move {
            info!("  Main | {} : {:?}", label, state);
        })
        .await;
}

#[tokio::main]
async fn main() -> Result<(), Box<dyn std::error::Error>> {
    tracing_init();

    let scope = ExecutionScope::current()?
        .with_exception_handler(|error| warn!("Worker | failure: {}", error))
        .with_cancellation_handler(|_| warn!("Worker | cancelled"));

    info!("==========================================");
    warn!("A. async_stateful starts Loading and settles with the result");

    let sum: StateLiveData<u64> = scope.async_stateful(heavy_computation(10_000));
    print_until_complete("sum", &sum).await;

    info!("==========================================");
    warn!("B. async_map runs a future per Success of the source");

    let input: StateLiveData<u64> = StateLiveData::new();
    let summed: StateLiveData<u64> = async_map(&input, &scope, heavy_computation);
    let log = summed.observe_forever(|state| debug!("Dispatcher | summed: {:?}", state));
    input.set_success(0);
    sleep(Duration::from_millis(300)).await;
    input.set_success(100);
    sleep(Duration::from_millis(300)).await;
    drop(log);

    info!("==========================================");
    warn!("C. Cancelling the scope settles pending work as Cancelled");

    let child = scope.child();
    let never: StateLiveData<u8> = child.async_stateful(async {
        sleep(Duration::from_secs(60)).await;
        1u8
    });
    let task = from_task(
        tokio::spawn(async {
            sleep(Duration::from_secs(60)).await;
            Ok::<_, StateError>("late")
        }),
        &child,
    );
    child.cancel();
    print_until_complete("async_stateful", &never).await;
    print_until_complete("task", &task).await;

    info!("==========================================");
    warn!("D. A call starts when its container is first observed");

    let profile: StateLiveData<String> = call_live_data(
        || async {
            debug!("Worker | calling backend");
            sleep(Duration::from_millis(100)).await;
            Ok::<_, CallError>(CallResponse::ok("ada".to_string()))
        },
        &scope,
    );
    sleep(Duration::from_millis(100)).await;
    info!("  Main | before observing: {:?}", profile.value());
    let log = profile.observe_forever(|state| debug!("Dispatcher | profile: {:?}", state));
    print_until_complete("profile", &profile).await;
    drop(log);

    info!("  Main | Finish");
    Ok(())
}
