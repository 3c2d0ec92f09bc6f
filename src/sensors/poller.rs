//! Background change detection for one sensor.

use super::endpoint::Delivery;
use super::registry::SubscriberRegistry;
use crate::config::PollConfig;
use crate::error::{Ev3Error, Result};
use crate::sysfs::{AttributeStore, AttributeStoreExt, DeviceHandle};
use futures_util::future::join_all;
use log::{debug, warn};
use std::fmt::Debug;
use std::str::FromStr;
use std::sync::Arc;
use std::time::Duration;
use tokio_util::sync::CancellationToken;

/// Values a sensor listener can track.
pub trait SensorValue: FromStr + PartialEq + Clone + Debug + Send + Sync + 'static {}

impl<T: FromStr + PartialEq + Clone + Debug + Send + Sync + 'static> SensorValue for T {}

/// State private to one running poller.
pub(crate) struct PollState<T> {
    pub last_observed: T,
    pub cadence: Duration,
}

/// Polls one attribute and fans every transition out to the registry.
pub(crate) struct ChangePoller<T> {
    store: Arc<dyn AttributeStore>,
    device: DeviceHandle,
    attribute: String,
    registry: Arc<SubscriberRegistry<T>>,
    state: PollState<T>,
    delivery_timeout: Duration,
    read_retries: u32,
}

impl<T: SensorValue> ChangePoller<T> {
    pub(crate) fn new(
        store: Arc<dyn AttributeStore>,
        device: DeviceHandle,
        attribute: &str,
        registry: Arc<SubscriberRegistry<T>>,
        baseline: T,
        poll: &PollConfig,
    ) -> Self {
        Self {
            store,
            device,
            attribute: attribute.to_string(),
            registry,
            state: PollState {
                last_observed: baseline,
                cadence: poll.cadence(),
            },
            delivery_timeout: poll.delivery_timeout(),
            read_retries: poll.read_retries,
        }
    }

    /// Read the attribute once on the blocking pool.
    pub(crate) async fn read(
        store: &Arc<dyn AttributeStore>,
        device: &DeviceHandle,
        attribute: &str,
    ) -> Result<T> {
        let store = store.clone();
        let device = device.clone();
        let attribute = attribute.to_string();
        tokio::task::spawn_blocking(move || store.read_value::<T>(&device, &attribute))
            .await
            .map_err(|e| Ev3Error::Io(std::io::Error::other(e)))?
    }

    /// Poll until cancelled. Returns the read error that ended polling, if any.
    pub(crate) async fn run(mut self, cancel: CancellationToken) -> Result<()> {
        let mut failures = 0u32;

        loop {
            tokio::select! {
                biased;
                _ = cancel.cancelled() => return Ok(()),
                _ = tokio::time::sleep(self.state.cadence) => {}
            }

            match self.poll_once(&cancel).await {
                Ok(_) => failures = 0,
                Err(e) if failures < self.read_retries => {
                    failures += 1;
                    warn!(
                        "[Sensor] Read of {} failed ({}/{}): {}",
                        self.device, failures, self.read_retries, e
                    );
                }
                Err(e) => return Err(e),
            }
        }
    }

    /// One tick: read, compare, deliver on change. Returns whether the value changed.
    async fn poll_once(&mut self, cancel: &CancellationToken) -> Result<bool> {
        let value = Self::read(&self.store, &self.device, &self.attribute).await?;

        // Stop may have been requested while the read was in flight
        if cancel.is_cancelled() || value == self.state.last_observed {
            return Ok(false);
        }

        debug!(
            "[Sensor] {} changed: {:?} -> {:?}",
            self.device, self.state.last_observed, value
        );
        self.fan_out(&value).await;
        self.state.last_observed = value;
        Ok(true)
    }

    async fn fan_out(&self, value: &T) {
        let subscribers = self.registry.snapshot();
        if subscribers.is_empty() {
            return;
        }

        let outcomes = join_all(
            subscribers
                .iter()
                .map(|ep| ep.deliver(value.clone(), self.delivery_timeout)),
        )
        .await;

        let mut closed = 0;
        for outcome in outcomes {
            match outcome {
                Delivery::Delivered => {}
                Delivery::TimedOut => warn!(
                    "[Sensor] Subscriber of {} did not take {:?} within {:?}, dropped",
                    self.device, value, self.delivery_timeout
                ),
                Delivery::Closed => closed += 1,
            }
        }

        if closed > 0 {
            let pruned = self.registry.prune_closed();
            debug!(
                "[Sensor] Removed {} closed subscriber(s) of {}",
                pruned, self.device
            );
        }
    }
}
