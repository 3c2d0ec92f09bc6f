//! EV3 touch sensor.
//!
//! Reports `1` in `value0` while the button is pressed and `0` otherwise.

use super::handle::SensorHandle;
use super::{InPort, SensorType};
use crate::config::PollConfig;
use crate::error::Result;
use crate::sysfs::{AttributeStore, DeviceLocator};
use std::sync::Arc;

/// Attribute holding the touch state.
pub const TOUCH_VALUE: &str = "value0";

/// Touch sensor handle. Change events carry the raw `value0` reading.
pub type TouchSensor = SensorHandle<u8>;

impl TouchSensor {
    /// Open the touch sensor on `port`.
    pub fn find(
        port: InPort,
        store: Arc<dyn AttributeStore>,
        locator: Arc<dyn DeviceLocator>,
        poll: PollConfig,
    ) -> Result<Self> {
        SensorHandle::new(port, SensorType::Touch, TOUCH_VALUE, store, locator, poll)
    }

    /// Whether the button is currently held down.
    pub async fn is_pressed(&self) -> Result<bool> {
        Ok(self.value().await? != 0)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::sysfs::{DeviceClass, PortLocator, SimulatedStore};

    #[tokio::test]
    async fn test_is_pressed_reads_value0() {
        let store = Arc::new(SimulatedStore::new());
        store.add_device(DeviceClass::Sensor, "sensor1", "in2", "lego-ev3-touch");
        store.set_attribute("sensor1", TOUCH_VALUE, 0);
        let locator = Arc::new(PortLocator::new(store.clone()));

        let touch = TouchSensor::find(InPort::In2, store.clone(), locator, PollConfig::default())
            .unwrap();
        assert_eq!(touch.sensor_type(), SensorType::Touch);
        assert!(!touch.is_pressed().await.unwrap());

        store.set_attribute("sensor1", TOUCH_VALUE, 1);
        assert!(touch.is_pressed().await.unwrap());
    }

    #[test]
    fn test_wrong_port_is_not_found() {
        let store = Arc::new(SimulatedStore::new());
        store.add_device(DeviceClass::Sensor, "sensor1", "in2", "lego-ev3-touch");
        let locator = Arc::new(PortLocator::new(store.clone()));

        let err = TouchSensor::find(InPort::In3, store, locator, PollConfig::default())
            .err()
            .unwrap();
        assert!(err.is_not_found());
    }
}
