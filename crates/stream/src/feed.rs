//! Shared machinery behind document and query subscriptions
//!
//! A `Feed` owns exactly one push registration and the list of observers.
//! Pushes from the store are queued on a channel and drained by a single
//! pump task, which maps each one and emits it before taking the next, so
//! observers see updates in arrival order, once each.
//!
//! ## States
//!
//! `Active -> Closed`, nothing else. Closing severs the push registration
//! first, then stops the pump and drops the observers (their streams end).

use crate::event::{SubscriptionEvent, SubscriptionStream};
use doclink_core::{Error, ListenerRegistration, Result};
use parking_lot::Mutex;
use std::future::Future;
use std::sync::Arc;
use tokio::sync::mpsc;
use tokio::task::JoinHandle;
use tracing::{debug, warn};

/// Teardown seam used by `StreamScope`
pub(crate) trait Closeable: Send + Sync {
    /// Close; `Error::SubscriptionClosed` if already closed
    fn close(&self) -> Result<()>;

    /// Human-readable target (path or query)
    fn label(&self) -> &str;
}

enum FeedState<T> {
    Active {
        registration: ListenerRegistration,
        observers: Vec<mpsc::UnboundedSender<SubscriptionEvent<T>>>,
        pump: Option<JoinHandle<()>>,
    },
    Closed,
}

pub(crate) struct Feed<T> {
    label: String,
    state: Mutex<FeedState<T>>,
}

impl<T: Clone + Send + 'static> Feed<T> {
    /// Register a push listener through `listen` and start pumping.
    ///
    /// `listen` receives the callback to hand to the store; every push it
    /// gets is mapped with `map` on the pump task.
    pub(crate) fn start<S, L, F, Fut>(label: String, listen: L, map: F) -> Result<Arc<Self>>
    where
        S: Send + 'static,
        L: FnOnce(Box<dyn Fn(Result<S>) + Send + Sync>) -> Result<ListenerRegistration>,
        F: Fn(S) -> Fut + Send + Sync + 'static,
        Fut: Future<Output = Result<T>> + Send + 'static,
    {
        let runtime = tokio::runtime::Handle::try_current()
            .map_err(|_| Error::Listen("live subscriptions need a tokio runtime".to_string()))?;

        let (push_tx, mut push_rx) = mpsc::unbounded_channel::<Result<S>>();
        let registration = listen(Box::new(move |push| {
            let _ = push_tx.send(push);
        }))?;

        let feed = Arc::new(Feed {
            label,
            state: Mutex::new(FeedState::Active {
                registration,
                observers: Vec::new(),
                pump: None,
            }),
        });

        let weak = Arc::downgrade(&feed);
        let pump = runtime.spawn(async move {
            while let Some(push) = push_rx.recv().await {
                let outcome = match push {
                    Ok(raw) => map(raw).await,
                    Err(e) => Err(e),
                };
                let Some(feed) = weak.upgrade() else {
                    break;
                };
                if !feed.deliver(outcome) {
                    break;
                }
            }
        });
        feed.attach_pump(pump);

        debug!(target: "doclink::stream", subscription = %feed.label, "Subscription opened");
        Ok(feed)
    }

    fn attach_pump(&self, pump: JoinHandle<()>) {
        match &mut *self.state.lock() {
            FeedState::Active { pump: slot, .. } => *slot = Some(pump),
            FeedState::Closed => pump.abort(),
        }
    }

    /// Add an observer; on a closed feed the stream ends immediately
    pub(crate) fn observe(&self) -> SubscriptionStream<T> {
        let (tx, rx) = mpsc::unbounded_channel();
        if let FeedState::Active { observers, .. } = &mut *self.state.lock() {
            observers.push(tx);
        }
        SubscriptionStream::new(rx)
    }

    /// Emit to every live observer; false if the feed is closed
    fn emit(&self, event: SubscriptionEvent<T>) -> bool {
        let mut state = self.state.lock();
        let FeedState::Active { observers, .. } = &mut *state else {
            return false;
        };
        observers.retain(|tx| tx.send(event.clone()).is_ok());
        true
    }

    /// Emit a mapped push; a failure is emitted as the terminal event and
    /// closes the feed. Returns whether the pump should keep going.
    fn deliver(&self, outcome: Result<T>) -> bool {
        match outcome {
            Ok(value) => self.emit(SubscriptionEvent::Next(value)),
            Err(e) => {
                warn!(target: "doclink::stream", subscription = %self.label, error = %e, "Push failed, closing subscription");
                self.emit(SubscriptionEvent::Error(e));
                if let Err(err) = self.close_inner() {
                    if !err.is_already_closed() {
                        warn!(target: "doclink::stream", subscription = %self.label, error = %err, "Teardown after push failure failed");
                    }
                }
                false
            }
        }
    }

    pub(crate) fn is_closed(&self) -> bool {
        matches!(*self.state.lock(), FeedState::Closed)
    }

    pub(crate) fn observer_count(&self) -> usize {
        match &*self.state.lock() {
            FeedState::Active { observers, .. } => observers.len(),
            FeedState::Closed => 0,
        }
    }
}

impl<T> Feed<T> {
    fn close_inner(&self) -> Result<()> {
        let previous = std::mem::replace(&mut *self.state.lock(), FeedState::Closed);
        let FeedState::Active {
            registration,
            observers,
            pump,
        } = previous
        else {
            return Err(Error::SubscriptionClosed);
        };

        let result = registration.remove();
        if let Some(pump) = pump {
            pump.abort();
        }
        drop(observers);

        match &result {
            Ok(()) => debug!(target: "doclink::stream", subscription = %self.label, "Subscription closed"),
            Err(e) => warn!(target: "doclink::stream", subscription = %self.label, error = %e, "Listener teardown failed"),
        }
        result
    }
}

impl<T: Send> Closeable for Feed<T> {
    fn close(&self) -> Result<()> {
        self.close_inner()
    }

    fn label(&self) -> &str {
        &self.label
    }
}

impl<T> Drop for Feed<T> {
    fn drop(&mut self) {
        if matches!(*self.state.get_mut(), FeedState::Active { .. }) {
            if let Err(e) = self.close_inner() {
                warn!(target: "doclink::stream", subscription = %self.label, error = %e, "Teardown on drop failed");
            }
        }
    }
}
