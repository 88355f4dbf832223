use crate::scope::EndKey;
use crate::{Dispatcher, Scope, StateError, StateObserverBuilder, Stateful, WeakScope, AnyValue};
use futures_signals::signal::{Mutable, MutableSignalCloned, SignalExt, SignalStream};
use parking_lot::Mutex;
use std::sync::atomic::{AtomicBool, AtomicU64, Ordering};
use std::sync::{Arc, Weak};
use tracing::trace;

type Callback<V> = Arc<dyn Fn(&V) + Send + Sync + 'static>;
type ActiveHook = Arc<dyn Fn() + Send + Sync + 'static>;

/// An observable slot holding the latest value, bound to one [`Dispatcher`].
///
/// Values set on the dispatcher are delivered before `set_value` returns.
/// Values set anywhere else go through a single-slot mailbox: rapid posts
/// may be coalesced, but the latest one is always delivered. Observer
/// callbacks only ever run on the dispatcher.
pub struct LiveData<V> {
    inner: Arc<Inner<V>>,
}

/// Non-owning handle to a [`LiveData`].
pub struct WeakLiveData<V> {
    inner: Weak<Inner<V>>,
}

/// The observable state container: a [`LiveData`] of [`Stateful`] envelopes.
pub type StateLiveData<T> = LiveData<Stateful<T>>;

struct Inner<V> {
    dispatcher: Dispatcher,
    current: Mutable<Option<V>>,
    version: AtomicU64,
    observers: Mutex<Vec<Arc<Observer<V>>>>,
    next_observer_id: AtomicU64,
    pending: Mutex<Option<V>>,
    drain_scheduled: AtomicBool,
    on_active: Mutex<Option<ActiveHook>>,
    upstream: Mutex<Vec<Subscription>>,
}

struct Observer<V> {
    id: u64,
    callback: Callback<V>,
    last_version: AtomicU64,
    removed: AtomicBool,
    scope: Option<ScopeBinding>,
}

struct ScopeBinding {
    scope: WeakScope,
    end_key: Mutex<Option<EndKey>>,
}

/// Keeps an observer registered; dropping it deregisters the observer.
#[must_use = "dropping a Subscription removes its observer"]
pub struct Subscription {
    release: Option<Box<dyn FnOnce() + Send + 'static>>,
}

impl Subscription {
    fn new<F>(release: F) -> Self
    where
        F: FnOnce() + Send + 'static,
    {
        Subscription {
            release: Some(Box::new(release)),
        }
    }

    /// Leaves the observer registered for the container's whole lifetime.
    pub fn detach(mut self) {
        self.release = None;
    }

    pub fn unsubscribe(self) {}
}

impl Drop for Subscription {
    fn drop(&mut self) {
        if let Some(release) = self.release.take() {
            release();
        }
    }
}

impl<V> Inner<V>
where
    V: Clone + Send + Sync + 'static,
{
    fn new(dispatcher: Dispatcher, value: Option<V>) -> Self {
        let version = u64::from(value.is_some());
        Inner {
            dispatcher,
            current: Mutable::new(value),
            version: AtomicU64::new(version),
            observers: Mutex::new(Vec::new()),
            next_observer_id: AtomicU64::new(0),
            pending: Mutex::new(None),
            drain_scheduled: AtomicBool::new(false),
            on_active: Mutex::new(None),
            upstream: Mutex::new(Vec::new()),
        }
    }

    fn next_id(&self) -> u64 {
        self.next_observer_id.fetch_add(1, Ordering::Relaxed)
    }

    /// Must run on the dispatcher.
    fn apply(&self, value: V) {
        let version = {
            let mut current = self.current.lock_mut();
            *current = Some(value);
            self.version.fetch_add(1, Ordering::AcqRel) + 1
        };
        trace!(dispatcher = %self.dispatcher.name(), version, "value published");

        let observers = self.observers.lock().clone();
        for observer in &observers {
            self.deliver(observer);
        }
    }

    fn deliver(&self, observer: &Observer<V>) {
        if observer.removed.load(Ordering::Acquire) {
            return;
        }
        if let Some(binding) = &observer.scope {
            if !binding.scope.is_active() {
                return;
            }
        }
        let (version, value) = {
            let current = self.current.lock_ref();
            (self.version.load(Ordering::Acquire), current.clone())
        };
        let Some(value) = value else {
            return;
        };
        if observer.last_version.fetch_max(version, Ordering::AcqRel) >= version {
            return;
        }
        (observer.callback)(&value);
    }

    fn drain(&self) {
        let value = {
            let mut pending = self.pending.lock();
            self.drain_scheduled.store(false, Ordering::Release);
            pending.take()
        };
        if let Some(value) = value {
            self.apply(value);
        }
    }

    fn remove_observer(&self, id: u64) {
        let removed = {
            let mut observers = self.observers.lock();
            observers
                .iter()
                .position(|observer| observer.id == id)
                .map(|index| observers.remove(index))
        };
        let Some(observer) = removed else {
            return;
        };
        observer.removed.store(true, Ordering::Release);
        if let Some(binding) = &observer.scope {
            let key = binding.end_key.lock().take();
            if let (Some(scope), Some(key)) = (binding.scope.upgrade(), key) {
                scope.remove_end_hook(key);
            }
        }
    }
}

impl<V> LiveData<V>
where
    V: Clone + Send + Sync + 'static,
{
    /// An empty container on the process-wide [`Dispatcher::main`].
    pub fn new() -> Self {
        Self::new_on(Dispatcher::main())
    }

    pub fn new_on(dispatcher: Dispatcher) -> Self {
        LiveData {
            inner: Arc::new(Inner::new(dispatcher, None)),
        }
    }

    pub fn with_value(value: V) -> Self {
        Self::with_value_on(Dispatcher::main(), value)
    }

    pub fn with_value_on(dispatcher: Dispatcher, value: V) -> Self {
        LiveData {
            inner: Arc::new(Inner::new(dispatcher, Some(value))),
        }
    }

    pub fn dispatcher(&self) -> &Dispatcher {
        &self.inner.dispatcher
    }

    /// The latest applied value. Values still waiting in the mailbox are not visible.
    pub fn value(&self) -> Option<V> {
        self.inner.current.get_cloned()
    }

    /// Publishes `value`: synchronously when called on the dispatcher,
    /// through the mailbox otherwise.
    pub fn set_value(&self, value: V) {
        if self.inner.dispatcher.is_current() {
            self.inner.apply(value);
        } else {
            self.post_value(value);
        }
    }

    /// Hands `value` to the dispatcher, replacing any value still pending.
    pub fn post_value(&self, value: V) {
        let schedule = {
            let mut pending = self.inner.pending.lock();
            *pending = Some(value);
            !self.inner.drain_scheduled.swap(true, Ordering::AcqRel)
        };
        if !schedule {
            return;
        }
        let weak = Arc::downgrade(&self.inner);
        let posted = self.inner.dispatcher.post(move || {
            if let Some(inner) = weak.upgrade() {
                inner.drain();
            }
        });
        if posted.is_err() {
            self.inner.drain_scheduled.store(false, Ordering::Release);
        }
    }

    /// Observes while `scope` is active; the observer is removed when it ends.
    ///
    /// The current value, if any, is delivered right away. Does nothing when
    /// the scope has already ended.
    pub fn observe<F>(&self, scope: &Scope, callback: F)
    where
        F: Fn(&V) + Send + Sync + 'static,
    {
        if !scope.is_active() {
            return;
        }
        let id = self.inner.next_id();
        self.register(id, Arc::new(callback), Some(scope));
    }

    /// Observes until the returned [`Subscription`] is dropped.
    pub fn observe_forever<F>(&self, callback: F) -> Subscription
    where
        F: Fn(&V) + Send + Sync + 'static,
    {
        let id = self.inner.next_id();
        self.register(id, Arc::new(callback), None);
        let live = self.clone();
        Subscription::new(move || live.inner.remove_observer(id))
    }

    /// Observes until a delivered value fails `keep`; that value is the last
    /// one the callback sees.
    pub fn observe_once_where<F, K>(&self, callback: F, keep: K)
    where
        F: Fn(&V) + Send + Sync + 'static,
        K: Fn(&V) -> bool + Send + Sync + 'static,
    {
        let id = self.inner.next_id();
        let weak = Arc::downgrade(&self.inner);
        let once: Callback<V> = Arc::new(move |value: &V| {
            if !keep(value) {
                if let Some(inner) = weak.upgrade() {
                    inner.remove_observer(id);
                }
            }
            callback(value);
        });
        self.register(id, once, None);
    }

    fn register(&self, id: u64, callback: Callback<V>, scope: Option<&Scope>) {
        let observer = Arc::new(Observer {
            id,
            callback,
            last_version: AtomicU64::new(0),
            removed: AtomicBool::new(false),
            scope: scope.map(|scope| ScopeBinding {
                scope: scope.downgrade(),
                end_key: Mutex::new(None),
            }),
        });
        let became_active = {
            let mut observers = self.inner.observers.lock();
            observers.push(observer.clone());
            observers.len() == 1
        };

        if let (Some(scope), Some(binding)) = (scope, &observer.scope) {
            let weak = Arc::downgrade(&self.inner);
            let key = scope.on_end(move || {
                if let Some(inner) = weak.upgrade() {
                    inner.remove_observer(id);
                }
            });
            match key {
                Some(key) => *binding.end_key.lock() = Some(key),
                None => {
                    self.inner.remove_observer(id);
                    return;
                }
            }
        }

        if became_active {
            let hook = self.inner.on_active.lock().clone();
            if let Some(hook) = hook {
                hook();
            }
        }

        if self.inner.dispatcher.is_current() {
            self.inner.deliver(&observer);
        } else {
            let weak = Arc::downgrade(&self.inner);
            let _ = self.inner.dispatcher.post(move || {
                if let Some(inner) = weak.upgrade() {
                    inner.deliver(&observer);
                }
            });
        }
    }

    pub fn observer_count(&self) -> usize {
        self.inner.observers.lock().len()
    }

    pub fn has_observers(&self) -> bool {
        self.observer_count() > 0
    }

    /// Latest-value signal, for async consumers.
    pub fn signal(&self) -> MutableSignalCloned<Option<V>> {
        self.inner.current.signal_cloned()
    }

    pub fn to_stream(&self) -> SignalStream<MutableSignalCloned<Option<V>>> {
        self.signal().to_stream()
    }

    pub fn downgrade(&self) -> WeakLiveData<V> {
        WeakLiveData {
            inner: Arc::downgrade(&self.inner),
        }
    }

    /// Runs `hook` each time the observer count goes from zero to one.
    pub(crate) fn set_on_active<F>(&self, hook: F)
    where
        F: Fn() + Send + Sync + 'static,
    {
        *self.inner.on_active.lock() = Some(Arc::new(hook));
    }

    /// Ties an upstream subscription to this container's lifetime.
    pub(crate) fn hold(&self, subscription: Subscription) {
        self.inner.upstream.lock().push(subscription);
    }
}

impl<T> LiveData<Stateful<T>>
where
    T: Clone + Send + Sync + 'static,
{
    pub fn set_success(&self, value: T) {
        self.set_value(Stateful::success(value));
    }

    pub fn set_error(&self, error: impl Into<StateError>) {
        self.set_value(Stateful::error(error));
    }

    pub fn set_loading(&self, hint: Option<AnyValue>) {
        self.set_value(Stateful::loading(hint));
    }

    pub fn post_success(&self, value: T) {
        self.post_value(Stateful::success(value));
    }

    pub fn post_error(&self, error: impl Into<StateError>) {
        self.post_value(Stateful::error(error));
    }

    pub fn post_loading(&self, hint: Option<AnyValue>) {
        self.post_value(Stateful::loading(hint));
    }

    /// Observes a single envelope.
    ///
    /// With `retain_for_loading` the observer stays registered through
    /// Loading envelopes and leaves after the first Success or Error.
    pub fn observe_once<F>(&self, callback: F, retain_for_loading: bool)
    where
        F: Fn(&Stateful<T>) + Send + Sync + 'static,
    {
        self.observe_once_where(callback, move |state| {
            retain_for_loading && state.is_loading()
        });
    }

    /// Starts a per-state observer registration bound to `scope`.
    pub fn observe_states(&self, scope: &Scope) -> StateObserverBuilder<T> {
        StateObserverBuilder::new(self, scope)
    }
}

impl<V> WeakLiveData<V>
where
    V: Clone + Send + Sync + 'static,
{
    pub fn upgrade(&self) -> Option<LiveData<V>> {
        self.inner.upgrade().map(|inner| LiveData { inner })
    }
}

impl<V> Clone for LiveData<V> {
    fn clone(&self) -> Self {
        LiveData {
            inner: self.inner.clone(),
        }
    }
}

impl<V> Clone for WeakLiveData<V> {
    fn clone(&self) -> Self {
        WeakLiveData {
            inner: self.inner.clone(),
        }
    }
}

impl<V> Default for LiveData<V>
where
    V: Clone + Send + Sync + 'static,
{
    fn default() -> Self {
        LiveData::new()
    }
}

impl<V> std::fmt::Debug for LiveData<V>
where
    V: std::fmt::Debug,
{
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("LiveData")
            .field("dispatcher", &self.inner.dispatcher)
            .field("value", &*self.inner.current.lock_ref())
            .field("observers", &self.inner.observers.lock().len())
            .finish()
    }
}
