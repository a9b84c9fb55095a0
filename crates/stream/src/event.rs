//! Events delivered to subscription observers

use doclink_core::Error;
use futures_util::Stream;
use std::pin::Pin;
use std::task::{Context, Poll};
use tokio::sync::mpsc;

/// One delivery on a live feed
///
/// `Error` is terminal: the subscription closes right after emitting it and
/// the stream ends.
#[derive(Debug, Clone, PartialEq)]
pub enum SubscriptionEvent<T> {
    /// A mapped update
    Next(T),
    /// Push delivery or mapping failed; no further events follow
    Error(Error),
}

impl<T> SubscriptionEvent<T> {
    /// The update, if this is one
    pub fn into_next(self) -> Option<T> {
        match self {
            SubscriptionEvent::Next(value) => Some(value),
            SubscriptionEvent::Error(_) => None,
        }
    }

    /// Whether this is the terminal error event
    pub fn is_error(&self) -> bool {
        matches!(self, SubscriptionEvent::Error(_))
    }
}

/// Receiving side of one observer
///
/// Ends (`None`) once the subscription is closed.
#[derive(Debug)]
pub struct SubscriptionStream<T> {
    rx: mpsc::UnboundedReceiver<SubscriptionEvent<T>>,
}

impl<T> SubscriptionStream<T> {
    pub(crate) fn new(rx: mpsc::UnboundedReceiver<SubscriptionEvent<T>>) -> Self {
        Self { rx }
    }

    /// Wait for the next event
    pub async fn recv(&mut self) -> Option<SubscriptionEvent<T>> {
        self.rx.recv().await
    }

    /// Take the next event if one is already queued
    pub fn try_recv(&mut self) -> Option<SubscriptionEvent<T>> {
        self.rx.try_recv().ok()
    }
}

impl<T> Stream for SubscriptionStream<T> {
    type Item = SubscriptionEvent<T>;

    fn poll_next(mut self: Pin<&mut Self>, cx: &mut Context<'_>) -> Poll<Option<Self::Item>> {
        self.rx.poll_recv(cx)
    }
}
