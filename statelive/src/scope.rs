use parking_lot::Mutex;
use std::sync::atomic::{AtomicU64, Ordering};
use std::sync::{Arc, Weak};
use tokio_util::sync::CancellationToken;

type EndHook = Box<dyn FnOnce() + Send + 'static>;

/// Key returned by [`Scope::on_end`], used to withdraw the hook again.
#[derive(Debug, Clone, Copy, Eq, PartialEq, Hash)]
pub struct EndKey(u64);

/// A bounded lifetime that gates observation.
///
/// Observers registered with [`LiveData::observe`](crate::LiveData::observe)
/// only receive values while their scope is active and are removed when it
/// ends. Dropping the last handle ends the scope.
#[derive(Clone)]
pub struct Scope {
    inner: Arc<ScopeInner>,
}

/// Non-owning handle to a [`Scope`].
#[derive(Clone)]
pub struct WeakScope {
    inner: Weak<ScopeInner>,
}

struct ScopeInner {
    token: CancellationToken,
    next_key: AtomicU64,
    end_hooks: Mutex<Vec<(u64, EndHook)>>,
}

impl Scope {
    pub fn new() -> Self {
        Scope {
            inner: Arc::new(ScopeInner {
                token: CancellationToken::new(),
                next_key: AtomicU64::new(0),
                end_hooks: Mutex::new(Vec::new()),
            }),
        }
    }

    pub fn is_active(&self) -> bool {
        !self.inner.token.is_cancelled()
    }

    /// Ends the scope and runs every registered end hook once.
    pub fn end(&self) {
        self.inner.end();
    }

    /// Registers `hook` to run when the scope ends.
    ///
    /// Returns `None` and drops the hook when the scope has already ended.
    pub fn on_end<F>(&self, hook: F) -> Option<EndKey>
    where
        F: FnOnce() + Send + 'static,
    {
        let mut hooks = self.inner.end_hooks.lock();
        if self.inner.token.is_cancelled() {
            return None;
        }
        let key = self.inner.next_key.fetch_add(1, Ordering::Relaxed);
        hooks.push((key, Box::new(hook)));
        Some(EndKey(key))
    }

    pub fn remove_end_hook(&self, key: EndKey) {
        self.inner.end_hooks.lock().retain(|(k, _)| *k != key.0);
    }

    /// A token cancelled when this scope ends, for async work tied to it.
    pub fn token(&self) -> CancellationToken {
        self.inner.token.child_token()
    }

    pub fn downgrade(&self) -> WeakScope {
        WeakScope {
            inner: Arc::downgrade(&self.inner),
        }
    }
}

impl Default for Scope {
    fn default() -> Self {
        Scope::new()
    }
}

impl std::fmt::Debug for Scope {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("Scope")
            .field("active", &self.is_active())
            .finish()
    }
}

impl WeakScope {
    pub fn upgrade(&self) -> Option<Scope> {
        self.inner.upgrade().map(|inner| Scope { inner })
    }

    /// A released scope counts as ended.
    pub fn is_active(&self) -> bool {
        self.upgrade().is_some_and(|scope| scope.is_active())
    }
}

impl ScopeInner {
    fn end(&self) {
        let hooks = {
            let mut hooks = self.end_hooks.lock();
            self.token.cancel();
            std::mem::take(&mut *hooks)
        };
        for (_, hook) in hooks {
            hook();
        }
    }
}

impl Drop for ScopeInner {
    fn drop(&mut self) {
        self.end();
    }
}
