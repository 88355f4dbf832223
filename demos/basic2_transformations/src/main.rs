use crate::tracing_setup::tracing_init;
use statelive::{
    combine, map, map_to_plain, map_to_typed, switch_map, AnyValue, Dispatcher, PlainMapping,
    StateLiveData, Stateful,
};
use tracing::{info, warn};

mod tracing_setup;

#[derive(Debug, Clone)]
struct Temperature {
    celsius: f64,
}

#[tokio::main]
async fn main() -> Result<(), Box<dyn std::error::Error>> {
    tracing_init();

    let dispatcher = Dispatcher::main();

    // Operators map the current value synchronously on the dispatcher.
    dispatcher
        .invoke_async(|| {
            info!("==========================================");
            warn!("map only touches Success, Loading and Error pass through.");

            let reading: StateLiveData<Temperature> = StateLiveData::new();
            let fahrenheit = map(&reading, |t: &Temperature| t.celsius * 9.0 / 5.0 + 32.0);
            let log = fahrenheit.observe_forever(|state| info!("  fahrenheit | {:?}", state));
            reading.set_loading(None);
            reading.set_success(Temperature { celsius: 21.5 });
            reading.set_error("sensor unplugged");
            drop(log);

            info!("==========================================");
            warn!("switch_map follows whichever container the last Success picked.");

            let city: StateLiveData<&'static str> = StateLiveData::new();
            let oslo = StateLiveData::with_value(Stateful::success(Temperature { celsius: -3.0 }));
            let lima = StateLiveData::with_value(Stateful::success(Temperature { celsius: 19.0 }));
            let (to_oslo, to_lima) = (oslo.clone(), lima.clone());
            let current = switch_map(&city, move |name: &&'static str| {
                if *name == "oslo" {
                    to_oslo.clone()
                } else {
                    to_lima.clone()
                }
            });
            let log = current.observe_forever(|state| info!("  current | {:?}", state));
            city.set_success("oslo");
            city.set_success("lima");
            oslo.set_success(Temperature { celsius: -10.0 });
            lima.set_success(Temperature { celsius: 20.0 });
            info!("  oslo observers: {}, lima observers: {}", oslo.observer_count(), lima.observer_count());
            drop(log);

            info!("==========================================");
            warn!("combine settles once both sides succeeded.");

            let width: StateLiveData<u32> = StateLiveData::new();
            let height: StateLiveData<u32> = StateLiveData::new();
            let area = combine(&width, &height, |w: &u32, h: &u32| w * h);
            let log = area.observe_forever(|state| info!("  area | {:?}", state));
            width.set_success(4);
            height.set_success(5);
            drop(log);

            info!("==========================================");
            warn!("map_to_typed narrows an untyped payload, map_to_plain drops the envelope.");

            let payload: StateLiveData<Option<AnyValue>> = StateLiveData::new();
            let number = map_to_typed::<i64>(&payload);
            let plain = map_to_plain(&number, PlainMapping::new().on_error(|_| Some(-1)));
            let log = plain.observe_forever(|value| info!("  plain | {:?}", value));
            payload.set_success(Some(AnyValue::new(7i64)));
            payload.set_success(Some(AnyValue::new("seven")));
            payload.set_loading(None);
            drop(log);
        })
        .await?;

    info!("  Main | Finish");
    Ok(())
}
