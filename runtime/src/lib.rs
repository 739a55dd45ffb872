//! # Eventdesk Runtime
//!
//! Runtime implementation for eventdesk reducers.
//!
//! This crate provides the Store runtime that coordinates reducer execution
//! and effect handling.
//!
//! ## Core Components
//!
//! - **Store**: The runtime that manages state and executes effects
//! - **Effect Executor**: Executes effect descriptions and feeds actions back to reducers
//! - **Cancellation Registry**: Tracks cancellable effects by [`EffectId`]
//!
//! ## Example
//!
//! ```ignore
//! use eventdesk_runtime::Store;
//!
//! let store = Store::new(CheckoutState::default(), CheckoutReducer, environment);
//!
//! // Send an action
//! store.send(CheckoutAction::ProceedToPayment).await?;
//!
//! // Read state
//! let step = store.state(|s| s.step).await;
//!
//! // Tear down: stops payment polling and any other cancellable effect
//! store.shutdown();
//! ```

use eventdesk_core::effect::{Effect, EffectId};
use eventdesk_core::reducer::Reducer;
use std::collections::HashMap;
use std::sync::atomic::{AtomicBool, AtomicUsize, Ordering};
use std::sync::{Arc, Mutex, PoisonError};
use std::time::Duration;
use tokio::sync::{RwLock, watch};
use tokio_util::sync::CancellationToken;

/// Error types for the Store runtime
pub mod error {
    use thiserror::Error;

    /// Errors that can occur during Store operations
    #[derive(Error, Debug)]
    pub enum StoreError {
        /// Store is shutting down and not accepting new actions
        ///
        /// This error is returned when `send()` is called after `shutdown()`.
        #[error("Store is shutting down")]
        ShutdownInProgress,

        /// Timeout waiting for a matching action
        ///
        /// Returned by `send_and_wait_for` when the timeout expires before
        /// a matching action is received.
        #[error("Timeout waiting for action")]
        Timeout,

        /// Action broadcast channel closed
        #[error("Action broadcast channel closed")]
        ChannelClosed,
    }
}

pub use error::StoreError;
pub use store::Store;

/// Handle returned by [`Store::send`] for awaiting the effects it started
///
/// Only effects started directly by the sent action are tracked; actions
/// fed back by those effects start their own effects, which are not.
///
/// # Example
///
/// ```ignore
/// let mut handle = store.send(CheckoutAction::RemoveDiscount).await?;
/// handle.wait_with_timeout(Duration::from_secs(5)).await?;
/// ```
#[derive(Clone)]
pub struct EffectHandle {
    effects: Arc<AtomicUsize>,
    completion: watch::Receiver<()>,
}

impl EffectHandle {
    /// Create a handle and the tracking context effects report to
    fn new() -> (Self, EffectTracking) {
        let counter = Arc::new(AtomicUsize::new(0));
        let (tx, rx) = watch::channel(());

        let handle = Self {
            effects: Arc::clone(&counter),
            completion: rx,
        };

        let tracking = EffectTracking {
            counter,
            notifier: Arc::new(tx),
        };

        (handle, tracking)
    }

    /// Create a handle that's already complete
    #[must_use]
    pub fn completed() -> Self {
        let (tx, rx) = watch::channel(());
        let _ = tx.send(());

        Self {
            effects: Arc::new(AtomicUsize::new(0)),
            completion: rx,
        }
    }

    /// Number of tracked effects still running
    #[must_use]
    pub fn pending(&self) -> usize {
        self.effects.load(Ordering::SeqCst)
    }

    /// Wait for all tracked effects to complete
    pub async fn wait(&mut self) {
        while self.effects.load(Ordering::SeqCst) > 0 {
            if self.completion.changed().await.is_err() {
                break;
            }
        }
    }

    /// Wait for all tracked effects to complete with a timeout
    ///
    /// # Errors
    ///
    /// Returns [`StoreError::Timeout`] if the timeout expires before all effects complete.
    pub async fn wait_with_timeout(&mut self, timeout: Duration) -> Result<(), StoreError> {
        tokio::time::timeout(timeout, self.wait())
            .await
            .map_err(|_| StoreError::Timeout)
    }
}

impl std::fmt::Debug for EffectHandle {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("EffectHandle")
            .field("pending_effects", &self.effects.load(Ordering::SeqCst))
            .finish_non_exhaustive()
    }
}

/// Internal: effect counter shared between a handle and running effects
#[derive(Clone)]
struct EffectTracking {
    counter: Arc<AtomicUsize>,
    notifier: Arc<watch::Sender<()>>,
}

impl EffectTracking {
    fn increment(&self) {
        self.counter.fetch_add(1, Ordering::SeqCst);
    }

    fn decrement(&self) {
        if self.counter.fetch_sub(1, Ordering::SeqCst) == 1 {
            // Counter reached zero, notify waiters
            let _ = self.notifier.send(());
        }
    }

    /// Count one effect as started; the returned guard ends it on drop
    fn start(&self) -> DecrementGuard {
        self.increment();
        DecrementGuard(self.clone())
    }
}

/// Internal: RAII guard that decrements the effect counter on drop
///
/// The counter is decremented even if the effect panics or is cancelled.
struct DecrementGuard(EffectTracking);

impl Drop for DecrementGuard {
    fn drop(&mut self) {
        self.0.decrement();
    }
}

/// Internal: live cancellable effects, keyed by id
#[derive(Default)]
struct CancellationRegistry {
    next_generation: u64,
    live: HashMap<EffectId, (u64, CancellationToken)>,
}

impl CancellationRegistry {
    /// Register a fresh token for `id`, cancelling any previous holder
    fn register(&mut self, id: EffectId) -> (u64, CancellationToken) {
        self.next_generation += 1;
        let generation = self.next_generation;
        let token = CancellationToken::new();

        if let Some((_, previous)) = self.live.insert(id, (generation, token.clone())) {
            tracing::debug!(effect_id = %id, "Replacing running cancellable effect");
            previous.cancel();
        }

        (generation, token)
    }

    fn cancel(&mut self, id: EffectId) -> bool {
        match self.live.remove(&id) {
            Some((_, token)) => {
                token.cancel();
                true
            },
            None => false,
        }
    }

    /// Drop the registration for `id` if it still belongs to `generation`
    fn release(&mut self, id: EffectId, generation: u64) {
        if self.live.get(&id).is_some_and(|(current, _)| *current == generation) {
            self.live.remove(&id);
        }
    }

    fn cancel_all(&mut self) {
        for (_, (_, token)) in self.live.drain() {
            token.cancel();
        }
    }

    fn contains(&self, id: EffectId) -> bool {
        self.live.contains_key(&id)
    }
}

/// Store module - The runtime for reducers
pub mod store {
    use super::{
        Arc, AtomicBool, CancellationRegistry, CancellationToken, Duration, Effect,
        EffectHandle, EffectId, EffectTracking, Mutex, Ordering, PoisonError, Reducer, RwLock,
        StoreError,
    };
    use tokio::sync::broadcast;

    /// The Store - runtime coordinator for a reducer
    ///
    /// The Store manages:
    /// 1. State (behind `RwLock` for concurrent access)
    /// 2. Reducer (workflow logic)
    /// 3. Environment (injected dependencies)
    /// 4. Effect execution (with feedback loop and cancellation)
    ///
    /// Cloning a store yields another handle to the same state.
    pub struct Store<S, A, E, R>
    where
        R: Reducer<State = S, Action = A, Environment = E>,
    {
        state: Arc<RwLock<S>>,
        reducer: Arc<R>,
        environment: Arc<E>,
        cancellations: Arc<Mutex<CancellationRegistry>>,
        shutdown: Arc<AtomicBool>,
        /// Actions produced by effects are broadcast to observers
        action_broadcast: broadcast::Sender<A>,
    }

    impl<S, A, E, R> Store<S, A, E, R>
    where
        R: Reducer<State = S, Action = A, Environment = E> + Send + Sync + 'static,
        A: Send + Clone + 'static,
        S: Send + Sync + 'static,
        E: Send + Sync + 'static,
    {
        /// Create a new store with initial state, reducer, and environment
        ///
        /// The action broadcast buffers 16 actions; use
        /// [`Store::with_broadcast_capacity`] for more.
        #[must_use]
        pub fn new(initial_state: S, reducer: R, environment: E) -> Self {
            Self::with_broadcast_capacity(initial_state, reducer, environment, 16)
        }

        /// Create a new Store with custom action broadcast capacity
        #[must_use]
        pub fn with_broadcast_capacity(
            initial_state: S,
            reducer: R,
            environment: E,
            capacity: usize,
        ) -> Self {
            let (action_broadcast, _) = broadcast::channel(capacity.max(1));

            Self {
                state: Arc::new(RwLock::new(initial_state)),
                reducer: Arc::new(reducer),
                environment: Arc::new(environment),
                cancellations: Arc::new(Mutex::new(CancellationRegistry::default())),
                shutdown: Arc::new(AtomicBool::new(false)),
                action_broadcast,
            }
        }

        /// Send an action to the store
        ///
        /// Runs the reducer under the state write lock, then starts every
        /// returned effect. Returns once effects are started, not finished.
        ///
        /// # Errors
        ///
        /// Returns [`StoreError::ShutdownInProgress`] if the store is shutting down.
        #[tracing::instrument(skip(self, action), name = "store_send")]
        pub async fn send(&self, action: A) -> Result<EffectHandle, StoreError> {
            if self.shutdown.load(Ordering::SeqCst) {
                return Err(StoreError::ShutdownInProgress);
            }

            let effects = {
                let mut state = self.state.write().await;
                self.reducer.reduce(&mut state, action, &self.environment)
            };

            let (handle, tracking) = EffectHandle::new();
            for effect in effects {
                self.execute_effect(effect, &tracking, None);
            }

            Ok(handle)
        }

        /// Send an action and wait for a matching result action
        ///
        /// Subscribes to the action broadcast before sending, so a fast
        /// effect cannot slip past. Only actions produced by effects are
        /// observed, not the initial action. The matching action has been
        /// reduced by the time it is returned.
        ///
        /// # Errors
        ///
        /// - [`StoreError::Timeout`]: Timeout expired before a matching action
        /// - [`StoreError::ChannelClosed`]: Action broadcast channel closed
        /// - [`StoreError::ShutdownInProgress`]: Store is shutting down
        pub async fn send_and_wait_for<F>(
            &self,
            action: A,
            predicate: F,
            timeout: Duration,
        ) -> Result<A, StoreError>
        where
            F: Fn(&A) -> bool,
        {
            let mut rx = self.action_broadcast.subscribe();
            self.send(action).await?;

            tokio::time::timeout(timeout, async {
                loop {
                    match rx.recv().await {
                        Ok(action) if predicate(&action) => return Ok(action),
                        Ok(_) => {},
                        Err(broadcast::error::RecvError::Lagged(skipped)) => {
                            tracing::warn!(skipped, "Action observer lagged behind");
                        },
                        Err(broadcast::error::RecvError::Closed) => {
                            return Err(StoreError::ChannelClosed);
                        },
                    }
                }
            })
            .await
            .map_err(|_| StoreError::Timeout)?
        }

        /// Subscribe to actions produced by effects
        #[must_use]
        pub fn subscribe_actions(&self) -> broadcast::Receiver<A> {
            self.action_broadcast.subscribe()
        }

        /// Read from the current state
        pub async fn state<F, T>(&self, f: F) -> T
        where
            F: FnOnce(&S) -> T,
        {
            let state = self.state.read().await;
            f(&state)
        }

        /// Whether a cancellable effect is currently registered under `id`
        #[must_use]
        pub fn is_running(&self, id: EffectId) -> bool {
            self.registry().contains(id)
        }

        /// Cancel the effect registered under `id`
        ///
        /// Returns `true` if an effect was running.
        pub fn cancel(&self, id: EffectId) -> bool {
            let cancelled = self.registry().cancel(id);
            if cancelled {
                tracing::debug!(effect_id = %id, "Cancelled effect");
            }
            cancelled
        }

        /// Stop accepting actions and cancel every cancellable effect
        ///
        /// Owners call this from their teardown path so no timer outlives
        /// the session that started it.
        pub fn shutdown(&self) {
            if !self.shutdown.swap(true, Ordering::SeqCst) {
                tracing::info!("Store shutting down");
            }
            self.registry().cancel_all();
        }

        fn registry(&self) -> std::sync::MutexGuard<'_, CancellationRegistry> {
            self.cancellations
                .lock()
                .unwrap_or_else(PoisonError::into_inner)
        }

        /// Feed an action produced by an effect back, then broadcast it
        ///
        /// Observers only see an action once its state change is visible.
        async fn feed_back(&self, action: A) {
            if let Err(error) = self.send(action.clone()).await {
                tracing::debug!(%error, "Dropped action produced by effect");
                return;
            }

            let _ = self.action_broadcast.send(action);
        }

        /// Execute an effect with tracking
        ///
        /// `token` is set when the effect runs inside [`Effect::Cancellable`];
        /// a cancelled effect produces no action.
        #[allow(clippy::too_many_lines)]
        fn execute_effect(
            &self,
            effect: Effect<A>,
            tracking: &EffectTracking,
            token: Option<CancellationToken>,
        ) {
            match effect {
                Effect::None => {
                    tracing::trace!("Executing Effect::None (no-op)");
                },
                Effect::Future(fut) => {
                    tracing::trace!("Executing Effect::Future");
                    metrics::counter!("store.effects.executed", "type" => "future").increment(1);
                    let guard = tracking.start();
                    let store = self.clone();

                    tokio::spawn(async move {
                        let _guard = guard;

                        let produced = match &token {
                            Some(token) => tokio::select! {
                                () = token.cancelled() => None,
                                action = fut => action,
                            },
                            None => fut.await,
                        };

                        if token.as_ref().is_some_and(CancellationToken::is_cancelled) {
                            tracing::trace!("Effect::Future cancelled");
                            return;
                        }

                        if let Some(action) = produced {
                            store.feed_back(action).await;
                        }
                    });
                },
                Effect::Delay { duration, action } => {
                    tracing::trace!("Executing Effect::Delay (duration: {:?})", duration);
                    metrics::counter!("store.effects.executed", "type" => "delay").increment(1);
                    let guard = tracking.start();
                    let store = self.clone();

                    tokio::spawn(async move {
                        let _guard = guard;

                        match &token {
                            Some(token) => tokio::select! {
                                () = token.cancelled() => return,
                                () = tokio::time::sleep(duration) => {},
                            },
                            None => tokio::time::sleep(duration).await,
                        }

                        store.feed_back(*action).await;
                    });
                },
                Effect::Parallel(effects) => {
                    tracing::trace!("Executing Effect::Parallel with {} effects", effects.len());
                    for effect in effects {
                        self.execute_effect(effect, tracking, token.clone());
                    }
                },
                Effect::Sequential(effects) => {
                    tracing::trace!("Executing Effect::Sequential with {} effects", effects.len());
                    let guard = tracking.start();
                    let store = self.clone();

                    tokio::spawn(async move {
                        let _guard = guard;

                        for effect in effects {
                            if token.as_ref().is_some_and(CancellationToken::is_cancelled) {
                                break;
                            }
                            let (mut step, step_tracking) = EffectHandle::new();
                            store.execute_effect(effect, &step_tracking, token.clone());
                            drop(step_tracking);
                            step.wait().await;
                        }
                    });
                },
                Effect::Cancellable { id, effect } => {
                    tracing::debug!(effect_id = %id, "Starting cancellable effect");
                    metrics::counter!("store.effects.executed", "type" => "cancellable")
                        .increment(1);
                    let (generation, scope) = self.registry().register(id);

                    // Cancelling the outer scope also cancels this one
                    if let Some(outer) = token {
                        let inner = scope.clone();
                        tokio::spawn(async move {
                            tokio::select! {
                                () = outer.cancelled() => inner.cancel(),
                                () = inner.cancelled() => {},
                            }
                        });
                    }

                    let (mut inner_handle, inner_tracking) = EffectHandle::new();
                    self.execute_effect(*effect, &inner_tracking, Some(scope));
                    drop(inner_tracking);

                    let guard = tracking.start();
                    let store = self.clone();
                    tokio::spawn(async move {
                        let _guard = guard;
                        inner_handle.wait().await;
                        store.registry().release(id, generation);
                    });
                },
                Effect::Cancel(id) => {
                    self.cancel(id);
                },
            }
        }
    }

    impl<S, A, E, R> Clone for Store<S, A, E, R>
    where
        R: Reducer<State = S, Action = A, Environment = E>,
    {
        fn clone(&self) -> Self {
            Self {
                state: Arc::clone(&self.state),
                reducer: Arc::clone(&self.reducer),
                environment: Arc::clone(&self.environment),
                cancellations: Arc::clone(&self.cancellations),
                shutdown: Arc::clone(&self.shutdown),
                action_broadcast: self.action_broadcast.clone(),
            }
        }
    }
}
