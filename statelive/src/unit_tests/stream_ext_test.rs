use crate::{StateError, Stateful, StatefulStreamExt};
use futures::stream::{self, StreamExt};

#[tokio::test]
async fn test_until_complete_stops_after_first_success() {
    let states = stream::iter(vec![
        Stateful::loading(None),
        Stateful::loading(None),
        Stateful::success(1),
        Stateful::success(2),
    ]);

    let seen: Vec<Stateful<i32>> = states.until_complete().collect().await;
    assert_eq!(
        seen,
        vec![
            Stateful::loading(None),
            Stateful::loading(None),
            Stateful::success(1)
        ]
    );
}

#[tokio::test]
async fn test_until_complete_stops_after_error() {
    let states = stream::iter(vec![
        None,
        Some(Stateful::loading(None)),
        Some(Stateful::error(StateError::Cancelled)),
        Some(Stateful::success(3)),
    ]);

    let seen: Vec<Option<Stateful<i32>>> = states.until_complete().collect().await;
    assert_eq!(seen.len(), 3);
    assert_eq!(seen[2], Some(Stateful::cancelled()));
}

#[tokio::test]
async fn test_until_complete_passes_through_unfinished_stream() {
    let states = stream::iter(vec![Stateful::<u8>::loading(None)]);

    let mut stream = states.until_complete();
    assert_eq!(stream.next().await, Some(Stateful::loading(None)));
    assert_eq!(stream.next().await, None);
    assert_eq!(stream.next().await, None);
}
