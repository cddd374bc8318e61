//! Listener registry with fulfill-in-series and settle-in-series delivery.

use futures_util::future::BoxFuture;
use orrery_core::OrreryResult;
use std::collections::HashMap;
use std::fmt;
use std::future::Future;
use std::hash::Hash;
use std::sync::atomic::{AtomicU64, Ordering};
use std::sync::{Arc, Mutex, MutexGuard, PoisonError};

/// Future returned by a listener.
pub type ListenerFuture<R> = BoxFuture<'static, OrreryResult<R>>;

/// A registered event handler. It receives its own clone of the payload.
pub type Listener<P, R> = Arc<dyn Fn(P) -> ListenerFuture<R> + Send + Sync>;

/// Handle returned by registration, used to unregister.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub struct ListenerId(u64);

struct Registration<P, R> {
    id: ListenerId,
    once: bool,
    listener: Listener<P, R>,
}

impl<P, R> Clone for Registration<P, R> {
    fn clone(&self) -> Self {
        Self {
            id: self.id,
            once: self.once,
            listener: Arc::clone(&self.listener),
        }
    }
}

/// Ordered listeners per event.
///
/// # Type Parameters
///
/// - `E`: event key (e.g. an enum of event names)
/// - `P`: payload handed to every listener
/// - `R`: value a listener resolves to
pub struct EventRegistry<E, P, R> {
    listeners: Mutex<HashMap<E, Vec<Registration<P, R>>>>,
    next_id: AtomicU64,
}

impl<E, P, R> Default for EventRegistry<E, P, R> {
    fn default() -> Self {
        Self {
            listeners: Mutex::new(HashMap::new()),
            next_id: AtomicU64::new(1),
        }
    }
}

impl<E, P, R> fmt::Debug for EventRegistry<E, P, R> {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("EventRegistry")
            .field("next_id", &self.next_id.load(Ordering::Relaxed))
            .finish_non_exhaustive()
    }
}

impl<E, P, R> EventRegistry<E, P, R>
where
    E: Eq + Hash + Clone + fmt::Display,
    P: Clone + Send + 'static,
    R: Send + 'static,
{
    pub fn new() -> Self {
        Self::default()
    }

    // Registration never panics while holding the lock, so a poisoned
    // map is still consistent.
    fn lock(&self) -> MutexGuard<'_, HashMap<E, Vec<Registration<P, R>>>> {
        self.listeners.lock().unwrap_or_else(PoisonError::into_inner)
    }

    fn register<F, Fut>(&self, event: E, once: bool, f: F) -> ListenerId
    where
        F: Fn(P) -> Fut + Send + Sync + 'static,
        Fut: Future<Output = OrreryResult<R>> + Send + 'static,
    {
        let id = ListenerId(self.next_id.fetch_add(1, Ordering::Relaxed));
        let listener: Listener<P, R> = Arc::new(move |payload| Box::pin(f(payload)));
        self.lock().entry(event).or_default().push(Registration {
            id,
            once,
            listener,
        });
        id
    }

    /// Register a listener for `event`.
    pub fn on<F, Fut>(&self, event: E, f: F) -> ListenerId
    where
        F: Fn(P) -> Fut + Send + Sync + 'static,
        Fut: Future<Output = OrreryResult<R>> + Send + 'static,
    {
        self.register(event, false, f)
    }

    /// Register a listener that unregisters itself before its first call.
    pub fn one<F, Fut>(&self, event: E, f: F) -> ListenerId
    where
        F: Fn(P) -> Fut + Send + Sync + 'static,
        Fut: Future<Output = OrreryResult<R>> + Send + 'static,
    {
        self.register(event, true, f)
    }

    /// Unregister a listener. Returns whether it was registered.
    pub fn off(&self, id: ListenerId) -> bool {
        let mut listeners = self.lock();
        let mut removed = false;
        for registrations in listeners.values_mut() {
            let before = registrations.len();
            registrations.retain(|registration| registration.id != id);
            removed |= registrations.len() != before;
        }
        listeners.retain(|_, registrations| !registrations.is_empty());
        removed
    }

    pub fn listener_count(&self, event: &E) -> usize {
        self.lock().get(event).map_or(0, Vec::len)
    }

    /// Current listeners in order; one-shot listeners are removed here.
    fn take_snapshot(&self, event: &E) -> Vec<Listener<P, R>> {
        let mut listeners = self.lock();
        let Some(registrations) = listeners.get_mut(event) else {
            return Vec::new();
        };
        let snapshot = registrations
            .iter()
            .map(|registration| Arc::clone(&registration.listener))
            .collect();
        registrations.retain(|registration| !registration.once);
        if registrations.is_empty() {
            listeners.remove(event);
        }
        snapshot
    }

    /// Run listeners in order, awaiting each; fail on the first error and
    /// skip the rest.
    pub async fn fulfill_in_series(&self, event: &E, payload: P) -> OrreryResult<Vec<R>> {
        let listeners = self.take_snapshot(event);
        let mut results = Vec::with_capacity(listeners.len());
        for listener in listeners {
            results.push(listener(payload.clone()).await?);
        }
        Ok(results)
    }

    /// Run every listener in order, awaiting each. Failures are logged and
    /// never stop later listeners.
    pub async fn settle_in_series(&self, event: &E, payload: P) -> Vec<OrreryResult<R>> {
        let listeners = self.take_snapshot(event);
        let mut outcomes = Vec::with_capacity(listeners.len());
        for listener in listeners {
            let outcome = listener(payload.clone()).await;
            if let Err(e) = &outcome {
                tracing::warn!(event = %event, error = %e, "Listener failed while settling");
            }
            outcomes.push(outcome);
        }
        outcomes
    }
}
