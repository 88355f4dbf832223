//! Operators deriving new containers from existing ones.
//!
//! Every operator relays Loading and Error envelopes untouched and only
//! transforms Success values. The derived container owns its upstream
//! subscriptions: dropping it deregisters them from the sources.
//!
//! Operators are meant to be called on the sources' dispatcher, where the
//! current source value is mapped before the operator returns. Called from
//! anywhere else, that first delivery is posted to the dispatcher instead.

use crate::{
    AnyValue, ExecutionResult, ExecutionScope, LiveData, StateError, StateLiveData, Stateful,
    WeakLiveData,
};
use parking_lot::Mutex;
use std::any::Any;
use std::future::Future;
use std::sync::atomic::{AtomicU64, Ordering};
use std::sync::Arc;
use tracing::debug;

/// Derives a container holding `f(value)` for every Success of `source`.
///
/// `f` runs on the dispatcher; a panic in `f` unwinds through whoever
/// published the source value.
pub fn map<T, Y, F>(source: &StateLiveData<T>, f: F) -> StateLiveData<Y>
where
    T: Clone + Send + Sync + 'static,
    Y: Clone + Send + Sync + 'static,
    F: Fn(&T) -> Y + Send + Sync + 'static,
{
    let derived = StateLiveData::new_on(source.dispatcher().clone());
    let target = derived.downgrade();
    let subscription = source.observe_forever(move |state| {
        let Some(target) = target.upgrade() else {
            return;
        };
        let next = match state.retype() {
            Ok(relayed) => relayed,
            Err(value) => Stateful::success(f(value)),
        };
        target.set_value(next);
    });
    derived.hold(subscription);
    derived
}

/// Like [`map`], but each Success is mapped by a future on `scope`.
///
/// Overlapping computations are not cancelled by newer source values, so
/// their results may land out of order. Failures follow
/// [`ExecutionScope::launch_stateful`].
pub fn async_map<T, Y, R, F, Fut>(
    source: &StateLiveData<T>,
    scope: &ExecutionScope,
    f: F,
) -> StateLiveData<Y>
where
    T: Clone + Send + Sync + 'static,
    Y: Clone + Send + Sync + 'static,
    R: ExecutionResult<Y> + Send + 'static,
    F: Fn(T) -> Fut + Send + Sync + 'static,
    Fut: Future<Output = R> + Send + 'static,
{
    let derived = StateLiveData::new_on(source.dispatcher().clone());
    let target = derived.downgrade();
    let scope = scope.clone();
    let subscription = source.observe_forever(move |state| {
        let Some(target) = target.upgrade() else {
            return;
        };
        match state.retype() {
            Ok(relayed) => target.set_value(relayed),
            Err(value) => {
                scope.launch_stateful(&target, f(value.clone()));
            }
        }
    });
    derived.hold(subscription);
    derived
}

/// Derives a container that mirrors whichever container `f` produced for
/// the latest Success of `source`.
///
/// Loading and Error envelopes are mirrored directly without calling `f`.
/// The previous upstream is always detached before the next one attaches.
pub fn switch_map<T, Y, F>(source: &StateLiveData<T>, f: F) -> StateLiveData<Y>
where
    T: Clone + Send + Sync + 'static,
    Y: Clone + Send + Sync + 'static,
    F: Fn(&T) -> StateLiveData<Y> + Send + Sync + 'static,
{
    let derived = StateLiveData::new_on(source.dispatcher().clone());
    let target = derived.downgrade();
    let dispatcher = source.dispatcher().clone();
    let live_upstream = Mutex::new(None);
    let generation = Arc::new(AtomicU64::new(0));
    let subscription = source.observe_forever(move |state| {
        if target.upgrade().is_none() {
            return;
        }
        let next = match state.retype() {
            Ok(relayed) => StateLiveData::with_value_on(dispatcher.clone(), relayed),
            Err(value) => f(value),
        };

        let current = generation.fetch_add(1, Ordering::AcqRel) + 1;
        let previous = live_upstream.lock().take();
        if previous.is_some() {
            debug!("switch_map detaching previous upstream");
        }
        drop(previous);

        // The first delivery below may re-enter this closure and switch again.
        let forward = target.clone();
        let forward_generation = generation.clone();
        let attached = next.observe_forever(move |state: &Stateful<Y>| {
            if forward_generation.load(Ordering::Acquire) != current {
                return;
            }
            if let Some(target) = forward.upgrade() {
                target.set_value(state.clone());
            }
        });
        let stale = if generation.load(Ordering::Acquire) == current {
            live_upstream.lock().replace(attached)
        } else {
            debug!("switch_map superseded while attaching, dropping upstream");
            Some(attached)
        };
        drop(stale);
    });
    derived.hold(subscription);
    derived
}

/// Derives a container combining the latest envelopes of `left` and `right`.
///
/// Error wins (left before right), then Loading, and Success carries
/// `f(left, right)`. Nothing is published until both sources hold a value.
pub fn combine<A, B, Y, F>(
    left: &StateLiveData<A>,
    right: &StateLiveData<B>,
    f: F,
) -> StateLiveData<Y>
where
    A: Clone + Send + Sync + 'static,
    B: Clone + Send + Sync + 'static,
    Y: Clone + Send + Sync + 'static,
    F: Fn(&A, &B) -> Y + Send + Sync + 'static,
{
    let derived = StateLiveData::new_on(left.dispatcher().clone());
    let recompute = Arc::new({
        let target = derived.downgrade();
        let left = left.downgrade();
        let right = right.downgrade();
        move || {
            let (Some(target), Some(left), Some(right)) =
                (target.upgrade(), left.upgrade(), right.upgrade())
            else {
                return;
            };
            let (Some(left), Some(right)) = (left.value(), right.value()) else {
                return;
            };
            target.set_value(combine_states(&left, &right, &f));
        }
    });

    let on_left = recompute.clone();
    derived.hold(left.observe_forever(move |_| on_left()));
    let on_right = recompute;
    derived.hold(right.observe_forever(move |_| on_right()));
    derived
}

fn combine_states<A, B, Y, F>(left: &Stateful<A>, right: &Stateful<B>, f: &F) -> Stateful<Y>
where
    F: Fn(&A, &B) -> Y,
{
    match (left, right) {
        (Stateful::Error { error }, _) | (_, Stateful::Error { error }) => Stateful::Error {
            error: error.clone(),
        },
        (Stateful::Loading(hint), _) | (_, Stateful::Loading(hint)) => {
            Stateful::Loading(hint.clone())
        }
        (Stateful::Success { value: left }, Stateful::Success { value: right }) => {
            Stateful::success(f(left, right))
        }
    }
}

/// Narrows Success payloads with `check`.
///
/// `check` returns the narrowed value, or a description of the payload's
/// actual type, which is published as a type-mismatch Error. Loading hints
/// are re-read on every emission.
pub fn map_to_typed_with<S, Y, F>(source: &StateLiveData<S>, check: F) -> StateLiveData<Y>
where
    S: Clone + Send + Sync + 'static,
    Y: Clone + Send + Sync + 'static,
    F: Fn(&S) -> Result<Y, String> + Send + Sync + 'static,
{
    let derived = StateLiveData::new_on(source.dispatcher().clone());
    let target = derived.downgrade();
    let subscription = source.observe_forever(move |state| {
        let Some(target) = target.upgrade() else {
            return;
        };
        let next = match state {
            Stateful::Loading(_) => Stateful::Loading(state.loading_hint().cloned()),
            Stateful::Success { value } => match check(value) {
                Ok(narrowed) => Stateful::success(narrowed),
                Err(actual) => {
                    Stateful::error(StateError::type_mismatch(std::any::type_name::<Y>(), actual))
                }
            },
            Stateful::Error { error } => Stateful::Error {
                error: error.clone(),
            },
        };
        target.set_value(next);
    });
    derived.hold(subscription);
    derived
}

/// Narrows dynamically typed payloads to `Y`; an absent payload reports `null`.
pub fn map_to_typed<Y>(source: &StateLiveData<Option<AnyValue>>) -> StateLiveData<Y>
where
    Y: Any + Clone + Send + Sync + 'static,
{
    map_to_typed_with(source, |payload: &Option<AnyValue>| match payload {
        None => Err("null".to_string()),
        Some(value) => value
            .downcast_ref::<Y>()
            .cloned()
            .ok_or_else(|| value.type_name().to_string()),
    })
}

type ErrorMapper<T> = Box<dyn Fn(&StateError) -> Option<T> + Send + Sync + 'static>;
type LoadingMapper<T> = Box<dyn Fn(Option<&AnyValue>) -> Option<T> + Send + Sync + 'static>;

/// How [`map_to_plain`] turns Loading and Error envelopes into plain values.
///
/// A state without a mapper collapses to `None`.
pub struct PlainMapping<T> {
    on_error: Option<ErrorMapper<T>>,
    on_loading: Option<LoadingMapper<T>>,
}

impl<T> PlainMapping<T> {
    pub fn new() -> Self {
        PlainMapping {
            on_error: None,
            on_loading: None,
        }
    }

    pub fn on_error<F>(mut self, f: F) -> Self
    where
        F: Fn(&StateError) -> Option<T> + Send + Sync + 'static,
    {
        self.on_error = Some(Box::new(f));
        self
    }

    pub fn on_loading<F>(mut self, f: F) -> Self
    where
        F: Fn(Option<&AnyValue>) -> Option<T> + Send + Sync + 'static,
    {
        self.on_loading = Some(Box::new(f));
        self
    }

    fn apply(&self, state: &Stateful<T>) -> Option<T>
    where
        T: Clone,
    {
        match state {
            Stateful::Success { value } => Some(value.clone()),
            Stateful::Error { error } => self.on_error.as_ref().and_then(|on_error| on_error(error)),
            Stateful::Loading(hint) => self
                .on_loading
                .as_ref()
                .and_then(|on_loading| on_loading(hint.as_ref())),
        }
    }
}

impl<T> Default for PlainMapping<T> {
    fn default() -> Self {
        PlainMapping::new()
    }
}

/// Collapses envelopes into a plain optional value.
pub fn map_to_plain<T>(source: &StateLiveData<T>, mapping: PlainMapping<T>) -> LiveData<Option<T>>
where
    T: Clone + Send + Sync + 'static,
{
    let derived = LiveData::new_on(source.dispatcher().clone());
    let target: WeakLiveData<Option<T>> = derived.downgrade();
    let subscription = source.observe_forever(move |state| {
        if let Some(target) = target.upgrade() {
            target.set_value(mapping.apply(state));
        }
    });
    derived.hold(subscription);
    derived
}
