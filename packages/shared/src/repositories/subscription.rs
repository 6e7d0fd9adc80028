use std::fmt::Display;
use std::future::Future;
use std::time::Duration;

use tokio::sync::watch;
use tokio::task::JoinHandle;
use tokio::time::MissedTickBehavior;
use tracing::{debug, warn};

/// Handle on a stream of snapshots of one stored record.
///
/// The first call to [`Subscription::next`] yields the current snapshot if
/// the store already has one; afterwards each call waits for the next change.
/// Dropping the handle detaches it from the store.
pub struct Subscription<T> {
    receiver: watch::Receiver<Option<T>>,
    primed: bool,
    poller: Option<JoinHandle<()>>,
}

impl<T: Clone> Subscription<T> {
    pub fn from_receiver(receiver: watch::Receiver<Option<T>>) -> Self {
        Subscription {
            receiver,
            primed: false,
            poller: None,
        }
    }

    /// Next snapshot, or `None` once the store side has gone away.
    pub async fn next(&mut self) -> Option<T> {
        if !self.primed {
            self.primed = true;
            let current = self.receiver.borrow_and_update().clone();
            if current.is_some() {
                return current;
            }
        }
        loop {
            if self.receiver.changed().await.is_err() {
                return None;
            }
            let snapshot = self.receiver.borrow_and_update().clone();
            if snapshot.is_some() {
                return snapshot;
            }
        }
    }

    /// Latest snapshot without waiting.
    pub fn current(&self) -> Option<T> {
        self.receiver.borrow().clone()
    }

    pub fn unsubscribe(self) {}
}

impl<T> Drop for Subscription<T> {
    fn drop(&mut self) {
        if let Some(poller) = self.poller.take() {
            poller.abort();
        }
    }
}

/// Builds a subscription for backends without push notifications by
/// re-reading the record every `interval` and publishing it when it differs
/// from the last snapshot. The poller stops once the subscription is dropped.
pub fn poll_for_changes<T, E, F, Fut>(interval: Duration, label: String, fetch: F) -> Subscription<T>
where
    T: Clone + PartialEq + Send + Sync + 'static,
    E: Display + Send + 'static,
    F: Fn() -> Fut + Send + 'static,
    Fut: Future<Output = Result<Option<T>, E>> + Send + 'static,
{
    let (tx, rx) = watch::channel(None);

    let poller = tokio::spawn(async move {
        let mut ticker = tokio::time::interval(interval);
        ticker.set_missed_tick_behavior(MissedTickBehavior::Delay);
        loop {
            ticker.tick().await;
            if tx.is_closed() {
                debug!("Stopped watching {}", label);
                break;
            }
            match fetch().await {
                Ok(latest) => {
                    tx.send_if_modified(|current| {
                        if *current == latest {
                            false
                        } else {
                            *current = latest;
                            true
                        }
                    });
                }
                Err(e) => warn!("Failed to refresh {}: {}", label, e),
            }
        }
    });

    Subscription {
        receiver: rx,
        primed: false,
        poller: Some(poller),
    }
}
