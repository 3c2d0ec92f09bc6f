//! Entry point bundling hardware access and configuration.

use crate::config::Config;
use crate::error::Result;
use crate::motors::{Motor, OutPort};
use crate::sensors::{InPort, SensorHandle, SensorType, SensorValue, TouchSensor};
use crate::sysfs::{AttributeStore, DeviceLocator, PortLocator, SysfsStore};
use std::sync::Arc;

/// The EV3 brick: hands out motors and sensors sharing one attribute store.
///
/// # Example
/// ```ignore
/// let brick = Brick::from_config(Config::from_env());
/// brick.motor(OutPort::A).run_forever(50)?;
///
/// let touch = brick.touch_sensor(InPort::In1)?;
/// touch.start().await?;
/// ```
pub struct Brick {
    store: Arc<dyn AttributeStore>,
    locator: Arc<dyn DeviceLocator>,
    config: Config,
}

impl Brick {
    /// Brick backed by the sysfs tree described in `config`.
    pub fn from_config(config: Config) -> Self {
        let store: Arc<dyn AttributeStore> = Arc::new(SysfsStore::new(config.sysfs.clone()));
        let locator = Arc::new(PortLocator::new(store.clone()));
        Self::with_backend(store, locator, config)
    }

    /// Brick over any store and locator (e.g. a [`SimulatedStore`]).
    ///
    /// [`SimulatedStore`]: crate::sysfs::SimulatedStore
    pub fn with_backend(
        store: Arc<dyn AttributeStore>,
        locator: Arc<dyn DeviceLocator>,
        config: Config,
    ) -> Self {
        Self {
            store,
            locator,
            config,
        }
    }

    pub fn config(&self) -> &Config {
        &self.config
    }

    pub fn motor(&self, port: OutPort) -> Motor {
        Motor::new(port, self.store.clone(), self.locator.clone())
    }

    pub fn touch_sensor(&self, port: InPort) -> Result<TouchSensor> {
        TouchSensor::find(
            port,
            self.store.clone(),
            self.locator.clone(),
            self.config.poll.clone(),
        )
    }

    /// Open any sensor, watching `attribute` as values of type `T`.
    pub fn sensor<T: SensorValue>(
        &self,
        port: InPort,
        sensor_type: SensorType,
        attribute: &str,
    ) -> Result<SensorHandle<T>> {
        SensorHandle::new(
            port,
            sensor_type,
            attribute,
            self.store.clone(),
            self.locator.clone(),
            self.config.poll.clone(),
        )
    }
}
