use crate::{AnyValue, ObserveError, Scope, StateError, StateLiveData, Stateful, WeakLiveData, WeakScope};
use std::sync::Arc;

type SuccessCallback<T> = Arc<dyn Fn(&T) + Send + Sync + 'static>;
type LoadingCallback = Arc<dyn Fn(Option<&AnyValue>) + Send + Sync + 'static>;
type ErrorCallback = Arc<dyn Fn(&StateError) + Send + Sync + 'static>;

/// Registers up to three per-state callbacks in one scoped subscription.
///
/// The builder holds neither the container nor the scope alive; both are
/// checked again by [`observe`](Self::observe).
///
/// ```no_run
/// # use statelive::{Scope, StateLiveData};
/// # fn demo(live: StateLiveData<u32>, scope: Scope) -> Result<(), statelive::ObserveError> {
/// live.observe_states(&scope)
///     .on_loading(|_| println!("loading"))
///     .on_success(|value| println!("got {value}"))
///     .on_error(|error| println!("failed: {error}"))
///     .observe()
/// # }
/// ```
#[must_use = "nothing is observed until `observe` is called"]
pub struct StateObserverBuilder<T> {
    live: WeakLiveData<Stateful<T>>,
    scope: WeakScope,
    on_success: Option<SuccessCallback<T>>,
    on_loading: Option<LoadingCallback>,
    on_error: Option<ErrorCallback>,
}

impl<T> StateObserverBuilder<T>
where
    T: Clone + Send + Sync + 'static,
{
    pub fn new(live: &StateLiveData<T>, scope: &Scope) -> Self {
        StateObserverBuilder {
            live: live.downgrade(),
            scope: scope.downgrade(),
            on_success: None,
            on_loading: None,
            on_error: None,
        }
    }

    pub fn on_success<F>(mut self, callback: F) -> Self
    where
        F: Fn(&T) + Send + Sync + 'static,
    {
        self.on_success = Some(Arc::new(callback));
        self
    }

    pub fn on_loading<F>(mut self, callback: F) -> Self
    where
        F: Fn(Option<&AnyValue>) + Send + Sync + 'static,
    {
        self.on_loading = Some(Arc::new(callback));
        self
    }

    pub fn on_error<F>(mut self, callback: F) -> Self
    where
        F: Fn(&StateError) + Send + Sync + 'static,
    {
        self.on_error = Some(Arc::new(callback));
        self
    }

    /// Subscribes. Each delivered envelope reaches exactly the callback for
    /// its state; states without a callback are ignored.
    pub fn observe(self) -> Result<(), ObserveError> {
        let live = self.live.upgrade().ok_or(ObserveError::ContainerReleased)?;
        let scope = self.scope.upgrade().ok_or(ObserveError::ScopeReleased)?;

        let StateObserverBuilder {
            on_success,
            on_loading,
            on_error,
            ..
        } = self;
        live.observe(&scope, move |state| match state {
            Stateful::Loading(hint) => {
                if let Some(callback) = &on_loading {
                    callback(hint.as_ref());
                }
            }
            Stateful::Success { value } => {
                if let Some(callback) = &on_success {
                    callback(value);
                }
            }
            Stateful::Error { error } => {
                if let Some(callback) = &on_error {
                    callback(error);
                }
            }
        });
        Ok(())
    }
}
