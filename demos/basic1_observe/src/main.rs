use crate::tracing_setup::tracing_init;
use futures::StreamExt;
use statelive::{Dispatcher, Scope, StateLiveData, Stateful, StatefulStreamExt};
use std::time::Duration;
use tokio::time::sleep;
use tracing::{debug, info, warn};

mod tracing_setup;

#[tokio::main]
async fn main() -> Result<(), Box<dyn std::error::Error>> {
    tracing_init();

    let dispatcher = Dispatcher::main();
    let live: StateLiveData<u32> = StateLiveData::with_value(Stateful::loading(None));
    let screen = Scope::new();

    info!("==========================================");
    warn!("Observers run on the dispatcher thread, whoever publishes.");

    live.observe_states(&screen)
        .on_loading(|_| debug!("Dispatcher | loading"))
        .on_success(|value| debug!("Dispatcher | success: {}", value))
        .on_error(|error| debug!("Dispatcher | error: {}", error))
        .observe()?;

    let producer = live.clone();
    std::thread::spawn(move || {
        std::thread::sleep(Duration::from_millis(50));
        info!("  Producer | set_success(42)");
        producer.set_success(42);
    })
    .join()
    .map_err(|_| "producer thread panicked")?;
    dispatcher.flush().await?;

    info!("==========================================");
    warn!("Background posts coalesce, observers may only see the latest.");

    let producer = live.clone();
    tokio::task::spawn_blocking(move || {
        for i in 0..100 {
            producer.post_success(i);
        }
    })
    .await?;
    dispatcher.flush().await?;

    info!("==========================================");
    warn!("Once the scope ends, its observers stop receiving.");

    screen.end();
    info!("  Main | observers left: {}", live.observer_count());
    live.set_error("nobody is listening");
    dispatcher.flush().await?;

    info!("==========================================");
    let live: StateLiveData<String> = StateLiveData::with_value(Stateful::loading(None));
    let producer = live.clone();
    tokio::spawn(async move {
        sleep(Duration::from_millis(100)).await;
        producer.set_success("ready".to_string());
    });
    live.to_stream()
        .until_complete()
        .for_each(|state| async move {
            info!("  Main | current state: {:?}", state);
        })
        .await;

    info!("  Main | Finish");
    Ok(())
}
