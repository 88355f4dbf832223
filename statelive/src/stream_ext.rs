use crate::Stateful;
use futures_core::stream::Stream;
use pin_project::pin_project;
use std::pin::Pin;
use std::task::{Context, Poll};

/// Items that can mark the end of a state stream.
pub trait Completion {
    fn is_complete(&self) -> bool;
}

impl<T> Completion for Stateful<T> {
    fn is_complete(&self) -> bool {
        Stateful::is_complete(self)
    }
}

impl<C: Completion> Completion for Option<C> {
    fn is_complete(&self) -> bool {
        self.as_ref().is_some_and(Completion::is_complete)
    }
}

/// Stream adaptors for consuming containers asynchronously.
pub trait StatefulStreamExt: Stream {
    /// Yields items up to and including the first Success or Error, then ends.
    ///
    /// ```
    /// use futures::StreamExt;
    /// use statelive::{Dispatcher, StateLiveData, Stateful, StatefulStreamExt};
    ///
    /// # async fn example() -> std::io::Result<()> {
    /// let live = StateLiveData::with_value_on(Dispatcher::spawn("docs")?, Stateful::success(3));
    /// let seen: Vec<_> = live.to_stream().until_complete().collect().await;
    /// assert_eq!(seen, vec![Some(Stateful::success(3))]);
    /// # Ok(())
    /// # }
    /// ```
    fn until_complete(self) -> UntilComplete<Self>
    where
        Self: Sized,
        Self::Item: Completion,
    {
        UntilComplete {
            stream: self,
            finished: false,
        }
    }
}

impl<S: ?Sized> StatefulStreamExt for S where S: Stream {}

/// Created by [`StatefulStreamExt::until_complete`].
#[pin_project(project = UntilCompleteProj)]
#[derive(Debug)]
#[must_use = "Streams do nothing unless polled"]
pub struct UntilComplete<S> {
    #[pin]
    stream: S,
    finished: bool,
}

impl<S> Stream for UntilComplete<S>
where
    S: Stream,
    S::Item: Completion,
{
    type Item = S::Item;

    fn poll_next(self: Pin<&mut Self>, cx: &mut Context<'_>) -> Poll<Option<Self::Item>> {
        let UntilCompleteProj { stream, finished } = self.project();

        if *finished {
            return Poll::Ready(None);
        }
        match stream.poll_next(cx) {
            Poll::Ready(Some(item)) => {
                if item.is_complete() {
                    *finished = true;
                }
                Poll::Ready(Some(item))
            }
            Poll::Ready(None) => {
                *finished = true;
                Poll::Ready(None)
            }
            Poll::Pending => Poll::Pending,
        }
    }
}
