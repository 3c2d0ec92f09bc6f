//! Sensor handle with a start/stop-able change listener.

use super::endpoint::Endpoint;
use super::poller::{ChangePoller, SensorValue};
use super::registry::SubscriberRegistry;
use super::{InPort, SensorType};
use crate::config::PollConfig;
use crate::error::{Ev3Error, Result};
use crate::sysfs::{AttributeStore, DeviceClass, DeviceHandle, DeviceLocator};
use log::{debug, error, info};
use std::sync::Arc;
use tokio::sync::{Mutex as AsyncMutex, watch};
use tokio::task::JoinHandle;
use tokio_util::sync::CancellationToken;

/// Whether a sensor's background listener is running.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum LifecycleState {
    Idle,
    Listening,
}

struct Listener {
    cancel: CancellationToken,
    task: JoinHandle<()>,
}

/// One sensor attribute, observable through subscribed endpoints.
///
/// The listener is controlled with [`start`](Self::start) and
/// [`stop`](Self::stop); both are idempotent and serialized against each
/// other, so at most one poller runs per handle. [`stop`](Self::stop) returns
/// only once the poller task has exited.
///
/// If a read fails while listening, the listener ends on its own: the state
/// goes back to [`LifecycleState::Idle`], the error is kept in
/// [`last_error`](Self::last_error) and the handle can be started again.
pub struct SensorHandle<T> {
    port: InPort,
    sensor_type: SensorType,
    attribute: String,
    store: Arc<dyn AttributeStore>,
    locator: Arc<dyn DeviceLocator>,
    poll: PollConfig,
    device: parking_lot::Mutex<DeviceHandle>,
    registry: Arc<SubscriberRegistry<T>>,
    listener: AsyncMutex<Option<Listener>>,
    state: Arc<watch::Sender<LifecycleState>>,
    last_error: Arc<parking_lot::Mutex<Option<Arc<Ev3Error>>>>,
}

impl<T: SensorValue> SensorHandle<T> {
    /// Open the sensor of `sensor_type` on `port`, watching `attribute`.
    ///
    /// Fails with [`Ev3Error::DeviceNotFound`] if no such sensor is attached.
    /// Resolution reads the attribute tree on the calling thread.
    pub fn new(
        port: InPort,
        sensor_type: SensorType,
        attribute: &str,
        store: Arc<dyn AttributeStore>,
        locator: Arc<dyn DeviceLocator>,
        poll: PollConfig,
    ) -> Result<Self> {
        let device = locator.resolve(
            DeviceClass::Sensor,
            port.as_ref(),
            Some(sensor_type.driver_name()),
        )?;
        debug!("[Sensor] {} on {} found at {}", sensor_type, port, device);

        let (state, _) = watch::channel(LifecycleState::Idle);
        Ok(Self {
            port,
            sensor_type,
            attribute: attribute.to_string(),
            store,
            locator,
            poll,
            device: parking_lot::Mutex::new(device),
            registry: Arc::new(SubscriberRegistry::new()),
            listener: AsyncMutex::new(None),
            state: Arc::new(state),
            last_error: Arc::new(parking_lot::Mutex::new(None)),
        })
    }

    /// Start listening for changes. No-op while already listening.
    ///
    /// The device is resolved again (it may have been re-plugged since the
    /// handle was opened) and read once to seed the change detection; errors
    /// from both are returned here.
    pub async fn start(&self) -> Result<()> {
        let mut slot = self.listener.lock().await;
        if let Some(listener) = slot.as_ref()
            && !listener.cancel.is_cancelled()
            && self.state() == LifecycleState::Listening
        {
            debug!("[Sensor] {} already listening", self.label());
            return Ok(());
        }

        // Reap a listener that ended on a read error or whose stop was abandoned
        self.finish(&mut slot).await;

        let device = self.resolve().await?;
        let baseline = ChangePoller::<T>::read(&self.store, &device, &self.attribute).await?;
        *self.device.lock() = device.clone();
        *self.last_error.lock() = None;

        let poller = ChangePoller::new(
            self.store.clone(),
            device,
            &self.attribute,
            self.registry.clone(),
            baseline,
            &self.poll,
        );
        let cancel = CancellationToken::new();

        // Listening before spawn: a poller failing right away must win
        self.state.send_replace(LifecycleState::Listening);

        let task = tokio::spawn({
            let cancel = cancel.clone();
            let state = self.state.clone();
            let last_error = self.last_error.clone();
            let label = self.label();
            async move {
                if let Err(e) = poller.run(cancel).await {
                    error!("[Sensor] {} listener stopped: {}", label, e);
                    *last_error.lock() = Some(Arc::new(e));
                    state.send_replace(LifecycleState::Idle);
                }
            }
        });

        *slot = Some(Listener { cancel, task });
        info!(
            "[Sensor] {} listening every {}ms",
            self.label(),
            self.poll.cadence_ms
        );
        Ok(())
    }

    /// Stop listening and wait for the poller task to exit. No-op while idle.
    pub async fn stop(&self) {
        let mut slot = self.listener.lock().await;
        if self.finish(&mut slot).await {
            info!("[Sensor] {} stopped listening", self.label());
        }
    }

    /// Read the current value once, independently of the listener.
    pub async fn value(&self) -> Result<T> {
        let device = self.device();
        ChangePoller::<T>::read(&self.store, &device, &self.attribute).await
    }

    /// Cancel and join the listener in `slot`, then go Idle. Returns false if
    /// there was none.
    ///
    /// The listener stays in the slot until the join completes, so a caller
    /// that drops this future midway leaves it for the next stop or start.
    async fn finish(&self, slot: &mut Option<Listener>) -> bool {
        let Some(listener) = slot.as_mut() else {
            return false;
        };

        listener.cancel.cancel();
        if let Err(e) = (&mut listener.task).await {
            error!("[Sensor] {} listener task panicked: {}", self.label(), e);
        }
        *slot = None;
        self.state.send_replace(LifecycleState::Idle);
        true
    }

    async fn resolve(&self) -> Result<DeviceHandle> {
        let locator = self.locator.clone();
        let port = self.port.to_string();
        let driver = self.sensor_type.driver_name();
        tokio::task::spawn_blocking(move || {
            locator.resolve(DeviceClass::Sensor, &port, Some(driver))
        })
        .await
        .map_err(|e| Ev3Error::Io(std::io::Error::other(e)))?
    }
}

impl<T> SensorHandle<T> {
    /// Subscribe an endpoint. Returns false if it was already subscribed.
    pub fn subscribe(&self, endpoint: Endpoint<T>) -> bool {
        let added = self.registry.add(endpoint);
        if added {
            debug!(
                "[Sensor] {} subscriber added ({} total)",
                self.label(),
                self.registry.len()
            );
        }
        added
    }

    /// Unsubscribe an endpoint. Returns false if it was not subscribed.
    pub fn unsubscribe(&self, endpoint: &Endpoint<T>) -> bool {
        self.registry.remove(endpoint)
    }

    pub fn port(&self) -> InPort {
        self.port
    }

    pub fn sensor_type(&self) -> SensorType {
        self.sensor_type
    }

    pub fn attribute(&self) -> &str {
        &self.attribute
    }

    /// Device directory found by the most recent resolution.
    pub fn device(&self) -> DeviceHandle {
        self.device.lock().clone()
    }

    pub fn state(&self) -> LifecycleState {
        *self.state.borrow()
    }

    pub fn is_listening(&self) -> bool {
        self.state() == LifecycleState::Listening
    }

    /// Receiver that observes every lifecycle transition.
    pub fn watch_state(&self) -> watch::Receiver<LifecycleState> {
        self.state.subscribe()
    }

    /// Read error that ended the last listener, cleared by the next start.
    pub fn last_error(&self) -> Option<Arc<Ev3Error>> {
        self.last_error.lock().clone()
    }

    pub fn subscriber_count(&self) -> usize {
        self.registry.len()
    }

    fn label(&self) -> String {
        format!("{} on {}", self.sensor_type, self.port)
    }
}

impl<T> Drop for SensorHandle<T> {
    fn drop(&mut self) {
        // Can't join here; the poller notices within one cadence
        if let Some(listener) = self.listener.get_mut().as_ref() {
            listener.cancel.cancel();
        }
    }
}
