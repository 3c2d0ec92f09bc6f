//! Delivery endpoints for sensor change events.
//!
//! An endpoint is the sending half of a bounded tokio channel. Identity is
//! channel identity: two endpoints are equal when they feed the same
//! receiver, so subscribing a clone of an endpoint is a no-op.

use std::fmt;
use std::time::Duration;
use tokio::sync::mpsc;
use tokio::sync::mpsc::error::SendTimeoutError;

/// Outcome of delivering one value to one endpoint.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Delivery {
    Delivered,
    /// The endpoint's queue stayed full for the whole delivery timeout.
    TimedOut,
    /// The receiving side was dropped.
    Closed,
}

/// A subscriber to a sensor's change events.
pub struct Endpoint<T> {
    tx: mpsc::Sender<T>,
}

impl<T> Endpoint<T> {
    /// Wrap an existing channel sender.
    pub fn new(tx: mpsc::Sender<T>) -> Self {
        Self { tx }
    }

    /// Create an endpoint together with the receiver its events arrive on.
    pub fn channel(capacity: usize) -> (Self, mpsc::Receiver<T>) {
        let (tx, rx) = mpsc::channel(capacity);
        (Self { tx }, rx)
    }

    /// Send one value, waiting at most `timeout` for queue space.
    pub async fn deliver(&self, value: T, timeout: Duration) -> Delivery {
        match self.tx.send_timeout(value, timeout).await {
            Ok(()) => Delivery::Delivered,
            Err(SendTimeoutError::Timeout(_)) => Delivery::TimedOut,
            Err(SendTimeoutError::Closed(_)) => Delivery::Closed,
        }
    }

    /// True once the receiving side is gone.
    pub fn is_closed(&self) -> bool {
        self.tx.is_closed()
    }
}

impl<T: Send + 'static> Endpoint<T> {
    /// Create an endpoint that calls `f` for every event, in order.
    ///
    /// `f` runs on a dedicated task that ends once every clone of the
    /// endpoint has been dropped (including the one held by the sensor, so
    /// unsubscribe it first). Must be called inside a tokio runtime.
    pub fn from_fn<F>(capacity: usize, mut f: F) -> Self
    where
        F: FnMut(T) + Send + 'static,
    {
        let (tx, mut rx) = mpsc::channel(capacity);
        tokio::spawn(async move {
            while let Some(value) = rx.recv().await {
                f(value);
            }
        });
        Self { tx }
    }
}

impl<T> Clone for Endpoint<T> {
    fn clone(&self) -> Self {
        Self {
            tx: self.tx.clone(),
        }
    }
}

impl<T> PartialEq for Endpoint<T> {
    fn eq(&self, other: &Self) -> bool {
        self.tx.same_channel(&other.tx)
    }
}

impl<T> Eq for Endpoint<T> {}

impl<T> fmt::Debug for Endpoint<T> {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("Endpoint")
            .field("closed", &self.tx.is_closed())
            .finish()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::sync::Arc;
    use std::sync::atomic::{AtomicU32, Ordering};

    #[test]
    fn test_identity_is_channel_identity() {
        let (a, _rx_a) = Endpoint::<u8>::channel(1);
        let (b, _rx_b) = Endpoint::<u8>::channel(1);

        assert_eq!(a, a.clone());
        assert_ne!(a, b);
    }

    #[tokio::test]
    async fn test_deliver_outcomes() {
        let (ep, mut rx) = Endpoint::<u8>::channel(1);
        let timeout = Duration::from_millis(10);

        assert_eq!(ep.deliver(1, timeout).await, Delivery::Delivered);
        // Queue of one is now full
        assert_eq!(ep.deliver(2, timeout).await, Delivery::TimedOut);
        assert_eq!(rx.recv().await, Some(1));

        drop(rx);
        assert_eq!(ep.deliver(3, timeout).await, Delivery::Closed);
        assert!(ep.is_closed());
    }

    #[tokio::test]
    async fn test_from_fn_sees_values_in_order() {
        let seen = Arc::new(parking_lot::Mutex::new(Vec::new()));
        let calls = Arc::new(AtomicU32::new(0));
        let ep = {
            let seen = seen.clone();
            let calls = calls.clone();
            Endpoint::from_fn(4, move |v: u8| {
                seen.lock().push(v);
                calls.fetch_add(1, Ordering::SeqCst);
            })
        };

        for v in [3, 1, 2] {
            assert_eq!(
                ep.deliver(v, Duration::from_millis(50)).await,
                Delivery::Delivered
            );
        }

        tokio::time::timeout(Duration::from_secs(1), async {
            while calls.load(Ordering::SeqCst) < 3 {
                tokio::task::yield_now().await;
            }
        })
        .await
        .unwrap();
        assert_eq!(*seen.lock(), vec![3, 1, 2]);
    }
}
