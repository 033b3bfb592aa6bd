//! Reactive value container owned by domain code.
//!
//! [`Reactive<T>`] holds a current value and notifies subscribers of every
//! replacement. A new subscriber first receives the value current at
//! subscription time, then every later value in order. Nothing is
//! coalesced: two quick `set` calls produce two emissions.
//!
//! ```
//! use ctxsync::Reactive;
//!
//! let count = Reactive::new(0);
//! let mut sub = count.subscribe();
//! count.set(5);
//! assert_eq!(sub.try_next(), Some(0));
//! assert_eq!(sub.try_next(), Some(5));
//! ```

use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::{Arc, Mutex, MutexGuard, PoisonError};

use tokio::sync::mpsc;

/// Shared, observable value. Clones refer to the same container.
#[derive(Debug, Clone)]
pub struct Reactive<T> {
    inner: Arc<Inner<T>>,
}

#[derive(Debug)]
struct Inner<T> {
    state: Mutex<State<T>>,
    /// Set while a sync binding is attached.
    bound: AtomicBool,
}

#[derive(Debug)]
struct State<T> {
    value: T,
    subscribers: Vec<mpsc::UnboundedSender<T>>,
}

impl<T: Clone + Send + 'static> Reactive<T> {
    /// Create a container holding `value`.
    pub fn new(value: T) -> Self {
        Self {
            inner: Arc::new(Inner {
                state: Mutex::new(State {
                    value,
                    subscribers: Vec::new(),
                }),
                bound: AtomicBool::new(false),
            }),
        }
    }

    fn state(&self) -> MutexGuard<'_, State<T>> {
        self.inner
            .state
            .lock()
            .unwrap_or_else(PoisonError::into_inner)
    }

    /// Clone of the current value.
    pub fn get(&self) -> T {
        self.state().value.clone()
    }

    /// Replace the current value and notify every subscriber.
    pub fn set(&self, value: T) {
        let mut state = self.state();
        state.value = value;
        let State { value, subscribers } = &mut *state;
        subscribers.retain(|tx| tx.send(value.clone()).is_ok());
    }

    /// Mutate the current value in place, then notify.
    pub fn update(&self, f: impl FnOnce(&mut T)) {
        let mut next = self.get();
        f(&mut next);
        self.set(next);
    }

    /// Subscribe to the current value and every later one.
    pub fn subscribe(&self) -> Subscription<T> {
        let (tx, rx) = mpsc::unbounded_channel();
        let mut state = self.state();
        // Cannot fail: the receiver is alive.
        let _ = tx.send(state.value.clone());
        state.subscribers.push(tx);
        Subscription { rx }
    }

    /// Number of live subscribers.
    pub fn subscriber_count(&self) -> usize {
        let mut state = self.state();
        state.subscribers.retain(|tx| !tx.is_closed());
        state.subscribers.len()
    }
}

impl<T> Reactive<T> {
    /// Whether a sync binding is currently attached to this container.
    pub fn is_bound(&self) -> bool {
        self.inner.bound.load(Ordering::SeqCst)
    }

    /// Latch the container as bound. Returns `false` if it already was.
    pub(crate) fn try_bind(&self) -> bool {
        self.inner
            .bound
            .compare_exchange(false, true, Ordering::SeqCst, Ordering::SeqCst)
            .is_ok()
    }

    /// Release the latch taken by [`Reactive::try_bind`].
    pub(crate) fn release_bind(&self) {
        self.inner.bound.store(false, Ordering::SeqCst);
    }
}

/// Ordered stream of values from one [`Reactive`].
#[derive(Debug)]
pub struct Subscription<T> {
    rx: mpsc::UnboundedReceiver<T>,
}

impl<T> Subscription<T> {
    /// Wait for the next emission. `None` once the container is dropped.
    pub async fn next(&mut self) -> Option<T> {
        self.rx.recv().await
    }

    /// Take an already-queued emission without waiting.
    pub fn try_next(&mut self) -> Option<T> {
        self.rx.try_recv().ok()
    }
}
