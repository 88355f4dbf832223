use crate::{Dispatcher, ExecutionResult, StateError, StateLiveData, Stateful, WeakLiveData};
use futures::FutureExt;
use std::future::Future;
use std::panic::AssertUnwindSafe;
use std::sync::Arc;
use tokio::runtime::{Handle, TryCurrentError};
use tokio::task::JoinHandle;
use tokio_util::sync::CancellationToken;
use tracing::{debug, error};

pub type FailureHandler = Arc<dyn Fn(&StateError) + Send + Sync + 'static>;

/// Background context for computations whose results land in containers.
///
/// Work runs on a tokio runtime and is cancelled with the scope's token.
/// Results are handed back to the target container's dispatcher.
#[derive(Clone)]
pub struct ExecutionScope {
    runtime: Handle,
    token: CancellationToken,
    dispatcher: Dispatcher,
    exception_handler: Option<FailureHandler>,
    cancellation_handler: Option<FailureHandler>,
}

impl ExecutionScope {
    pub fn new(runtime: Handle) -> Self {
        ExecutionScope {
            runtime,
            token: CancellationToken::new(),
            dispatcher: Dispatcher::main(),
            exception_handler: None,
            cancellation_handler: None,
        }
    }

    /// A scope on the runtime the caller is running in.
    pub fn current() -> Result<Self, TryCurrentError> {
        Handle::try_current().map(ExecutionScope::new)
    }

    /// Dispatcher for the containers this scope creates.
    pub fn with_dispatcher(mut self, dispatcher: Dispatcher) -> Self {
        self.dispatcher = dispatcher;
        self
    }

    pub fn with_token(mut self, token: CancellationToken) -> Self {
        self.token = token;
        self
    }

    /// Receives every failure that is not routed to the cancellation handler.
    pub fn with_exception_handler<F>(mut self, handler: F) -> Self
    where
        F: Fn(&StateError) + Send + Sync + 'static,
    {
        self.exception_handler = Some(Arc::new(handler));
        self
    }

    pub fn with_cancellation_handler<F>(mut self, handler: F) -> Self
    where
        F: Fn(&StateError) + Send + Sync + 'static,
    {
        self.cancellation_handler = Some(Arc::new(handler));
        self
    }

    /// A scope sharing this one's configuration, cancelled together with it.
    pub fn child(&self) -> Self {
        ExecutionScope {
            token: self.token.child_token(),
            ..self.clone()
        }
    }

    pub fn runtime(&self) -> &Handle {
        &self.runtime
    }

    pub fn dispatcher(&self) -> &Dispatcher {
        &self.dispatcher
    }

    pub fn token(&self) -> &CancellationToken {
        &self.token
    }

    pub fn cancel(&self) {
        self.token.cancel();
    }

    pub fn is_cancelled(&self) -> bool {
        self.token.is_cancelled()
    }

    async fn run<Y, R, Fut>(token: CancellationToken, computation: Fut) -> Stateful<Y>
    where
        R: ExecutionResult<Y>,
        Fut: Future<Output = R>,
    {
        let guarded = AssertUnwindSafe(computation).catch_unwind();
        tokio::select! {
            biased;
            _ = token.cancelled() => Stateful::cancelled(),
            result = guarded => match result {
                Ok(result) => result.into_stateful(),
                Err(payload) => Stateful::error(StateError::from_panic(payload)),
            },
        }
    }

    fn settlement<Y>(&self, target: &StateLiveData<Y>, publish_cancellation: bool) -> Settlement<Y>
    where
        Y: Clone + Send + Sync + 'static,
    {
        Settlement {
            target: target.downgrade(),
            exception_handler: self.exception_handler.clone(),
            cancellation_handler: self.cancellation_handler.clone(),
            publish_cancellation,
            settled: false,
        }
    }

    /// Fire-and-forget: runs `computation` and publishes its outcome on `target`.
    ///
    /// A cancellation goes only to the cancellation handler when one is set.
    /// Every other failure, and a cancellation without that handler, goes to
    /// the exception handler and is also published as an Error envelope.
    /// A task dropped before it finishes, through an abort or a runtime
    /// shutdown, settles as a cancellation.
    pub fn launch_stateful<Y, R, Fut>(
        &self,
        target: &StateLiveData<Y>,
        computation: Fut,
    ) -> JoinHandle<()>
    where
        Y: Clone + Send + Sync + 'static,
        R: ExecutionResult<Y> + Send + 'static,
        Fut: Future<Output = R> + Send + 'static,
    {
        let mut settlement = self.settlement(target, false);
        let token = self.token.clone();
        self.runtime.spawn(async move {
            let outcome = Self::run::<Y, R, Fut>(token, computation).await;
            settlement.settle(outcome);
        })
    }

    /// Value-returning: a new container that starts Loading and receives
    /// the outcome of `computation`.
    ///
    /// A cancellation reaches the cancellation handler, if any, and is
    /// published as an Error envelope as well.
    pub fn async_stateful<Y, R, Fut>(&self, computation: Fut) -> StateLiveData<Y>
    where
        Y: Clone + Send + Sync + 'static,
        R: ExecutionResult<Y> + Send + 'static,
        Fut: Future<Output = R> + Send + 'static,
    {
        let live = StateLiveData::with_value_on(self.dispatcher.clone(), Stateful::loading(None));
        let mut settlement = self.settlement(&live, true);
        let token = self.token.clone();
        self.runtime.spawn(async move {
            let outcome = Self::run::<Y, R, Fut>(token, computation).await;
            settlement.settle(outcome);
        });
        live
    }
}

/// Routes the outcome of one background computation exactly once.
///
/// Dropped unsettled, it settles as a cancellation.
struct Settlement<Y>
where
    Y: Clone + Send + Sync + 'static,
{
    target: WeakLiveData<Stateful<Y>>,
    exception_handler: Option<FailureHandler>,
    cancellation_handler: Option<FailureHandler>,
    publish_cancellation: bool,
    settled: bool,
}

impl<Y> Settlement<Y>
where
    Y: Clone + Send + Sync + 'static,
{
    fn settle(&mut self, outcome: Stateful<Y>) {
        self.settled = true;
        if let Stateful::Error { error } = &outcome {
            match (&self.cancellation_handler, error.is_cancelled()) {
                (Some(handler), true) => {
                    handler(error);
                    if !self.publish_cancellation {
                        return;
                    }
                }
                _ => match &self.exception_handler {
                    Some(handler) => handler(error),
                    None => error!(error = %error, "unhandled background failure"),
                },
            }
        }
        match self.target.upgrade() {
            Some(target) => target.post_value(outcome),
            None => debug!("launch target released before completion"),
        }
    }
}

impl<Y> Drop for Settlement<Y>
where
    Y: Clone + Send + Sync + 'static,
{
    fn drop(&mut self) {
        if !self.settled {
            debug!("background task dropped before completion");
            self.settle(Stateful::cancelled());
        }
    }
}

impl std::fmt::Debug for ExecutionScope {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("ExecutionScope")
            .field("dispatcher", &self.dispatcher)
            .field("cancelled", &self.token.is_cancelled())
            .finish_non_exhaustive()
    }
}
