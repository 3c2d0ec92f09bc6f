//! In-memory attribute tree for development and testing.
//!
//! Reads of an attribute can be scripted: each read consumes the next entry
//! of the attribute's script (a value or an I/O failure) and once the script
//! is exhausted the last value keeps being returned, the way a sensor that
//! stopped changing behaves.

use super::{AttributeStore, DRIVER_NAME, DeviceClass, DeviceHandle, PORT_NAME};
use crate::error::{Ev3Error, Result};
use parking_lot::Mutex;
use std::collections::{HashMap, VecDeque};
use std::io;
use std::path::PathBuf;
use std::time::Duration;

/// One scripted outcome of an attribute read.
#[derive(Debug, Clone, PartialEq)]
pub enum ScriptedRead {
    Value(String),
    Fail(io::ErrorKind),
}

impl ScriptedRead {
    pub fn value(value: impl ToString) -> Self {
        ScriptedRead::Value(value.to_string())
    }
}

#[derive(Debug, Default)]
struct SimAttribute {
    value: String,
    script: VecDeque<ScriptedRead>,
    reads: usize,
}

#[derive(Debug)]
struct SimDevice {
    handle: DeviceHandle,
    attributes: HashMap<String, SimAttribute>,
}

/// Simulated ev3dev attribute tree.
#[derive(Debug, Default)]
pub struct SimulatedStore {
    devices: Mutex<Vec<SimDevice>>,
    writes: Mutex<Vec<(String, String, String)>>,
    read_delay: Mutex<Duration>,
}

impl SimulatedStore {
    pub fn new() -> Self {
        Self::default()
    }

    /// Plug a device in. Its `port_name` and `driver_name` attributes are set.
    pub fn add_device(
        &self,
        class: DeviceClass,
        name: &str,
        port: &str,
        driver: &str,
    ) -> DeviceHandle {
        let handle = DeviceHandle {
            class,
            name: name.to_string(),
            path: PathBuf::from(format!("sim/{}/{}", class, name)),
        };

        let mut attributes = HashMap::new();
        for (attr, value) in [(PORT_NAME, port), (DRIVER_NAME, driver)] {
            attributes.insert(
                attr.to_string(),
                SimAttribute {
                    value: value.to_string(),
                    ..SimAttribute::default()
                },
            );
        }

        let mut devices = self.devices.lock();
        devices.retain(|d| !(d.handle.class == class && d.handle.name == name));
        devices.push(SimDevice {
            handle: handle.clone(),
            attributes,
        });
        handle
    }

    /// Unplug a device. Later reads of its attributes fail.
    pub fn remove_device(&self, class: DeviceClass, name: &str) {
        self.devices
            .lock()
            .retain(|d| !(d.handle.class == class && d.handle.name == name));
    }

    /// Set the current value of an attribute, creating it if needed.
    pub fn set_attribute(&self, device: &str, attribute: &str, value: impl ToString) {
        self.with_attribute(device, attribute, |attr| attr.value = value.to_string());
    }

    /// Append outcomes to the read script of an attribute.
    pub fn script_reads(
        &self,
        device: &str,
        attribute: &str,
        reads: impl IntoIterator<Item = ScriptedRead>,
    ) {
        self.with_attribute(device, attribute, |attr| attr.script.extend(reads));
    }

    /// Current value of an attribute, if the device and attribute exist.
    pub fn attribute(&self, device: &str, attribute: &str) -> Option<String> {
        let devices = self.devices.lock();
        devices
            .iter()
            .find(|d| d.handle.name == device)
            .and_then(|d| d.attributes.get(attribute))
            .map(|a| a.value.clone())
    }

    /// Number of reads served for an attribute.
    pub fn read_count(&self, device: &str, attribute: &str) -> usize {
        let devices = self.devices.lock();
        devices
            .iter()
            .find(|d| d.handle.name == device)
            .and_then(|d| d.attributes.get(attribute))
            .map_or(0, |a| a.reads)
    }

    /// Every write so far as `(device, attribute, value)`, oldest first.
    pub fn writes(&self) -> Vec<(String, String, String)> {
        self.writes.lock().clone()
    }

    /// Make every read block for `delay`, like a slow bus.
    pub fn set_read_delay(&self, delay: Duration) {
        *self.read_delay.lock() = delay;
    }

    fn with_attribute(&self, device: &str, attribute: &str, f: impl FnOnce(&mut SimAttribute)) {
        let mut devices = self.devices.lock();
        if let Some(d) = devices.iter_mut().find(|d| d.handle.name == device) {
            f(d.attributes.entry(attribute.to_string()).or_default());
        }
    }

    fn missing(device: &DeviceHandle, attribute: &str) -> Ev3Error {
        Ev3Error::Attribute {
            device: device.to_string(),
            attribute: attribute.to_string(),
            source: io::Error::from(io::ErrorKind::NotFound),
        }
    }
}

impl AttributeStore for SimulatedStore {
    fn devices(&self, class: DeviceClass) -> Result<Vec<DeviceHandle>> {
        Ok(self
            .devices
            .lock()
            .iter()
            .filter(|d| d.handle.class == class)
            .map(|d| d.handle.clone())
            .collect())
    }

    fn read_string(&self, device: &DeviceHandle, attribute: &str) -> Result<String> {
        let delay = *self.read_delay.lock();
        if !delay.is_zero() {
            std::thread::sleep(delay);
        }

        let mut devices = self.devices.lock();
        let attr = devices
            .iter_mut()
            .find(|d| d.handle == *device)
            .and_then(|d| d.attributes.get_mut(attribute))
            .ok_or_else(|| Self::missing(device, attribute))?;

        attr.reads += 1;
        match attr.script.pop_front() {
            Some(ScriptedRead::Value(v)) => {
                attr.value = v;
                Ok(attr.value.clone())
            }
            Some(ScriptedRead::Fail(kind)) => Err(Ev3Error::Attribute {
                device: device.to_string(),
                attribute: attribute.to_string(),
                source: io::Error::from(kind),
            }),
            None => Ok(attr.value.clone()),
        }
    }

    fn write_string(&self, device: &DeviceHandle, attribute: &str, value: &str) -> Result<()> {
        {
            let mut devices = self.devices.lock();
            let d = devices
                .iter_mut()
                .find(|d| d.handle == *device)
                .ok_or_else(|| Self::missing(device, attribute))?;
            d.attributes.entry(attribute.to_string()).or_default().value = value.to_string();
        }
        self.writes.lock().push((
            device.name.clone(),
            attribute.to_string(),
            value.to_string(),
        ));
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::sysfs::AttributeStoreExt;

    #[test]
    fn test_script_then_last_value_sticks() {
        let store = SimulatedStore::new();
        let dev = store.add_device(DeviceClass::Sensor, "sensor0", "in1", "lego-ev3-touch");
        store.script_reads(
            "sensor0",
            "value0",
            [ScriptedRead::value(0), ScriptedRead::value(1)],
        );

        assert_eq!(store.read_value::<u8>(&dev, "value0").unwrap(), 0);
        assert_eq!(store.read_value::<u8>(&dev, "value0").unwrap(), 1);
        assert_eq!(store.read_value::<u8>(&dev, "value0").unwrap(), 1);
        assert_eq!(store.read_count("sensor0", "value0"), 3);
    }

    #[test]
    fn test_scripted_failure() {
        let store = SimulatedStore::new();
        let dev = store.add_device(DeviceClass::Sensor, "sensor0", "in1", "lego-ev3-touch");
        store.script_reads(
            "sensor0",
            "value0",
            [ScriptedRead::Fail(io::ErrorKind::NotFound)],
        );

        assert!(matches!(
            store.read_string(&dev, "value0"),
            Err(Ev3Error::Attribute { .. })
        ));
    }

    #[test]
    fn test_removed_device_fails_reads() {
        let store = SimulatedStore::new();
        let dev = store.add_device(DeviceClass::Motor, "motor0", "outA", "lego-ev3-l-motor");
        store.remove_device(DeviceClass::Motor, "motor0");

        assert!(store.read_string(&dev, PORT_NAME).is_err());
        assert!(store.devices(DeviceClass::Motor).unwrap().is_empty());
    }

    #[test]
    fn test_writes_are_recorded() {
        let store = SimulatedStore::new();
        let dev = store.add_device(DeviceClass::Motor, "motor0", "outA", "lego-ev3-l-motor");
        store.write_value(&dev, "command", "stop").unwrap();

        assert_eq!(
            store.attribute("motor0", "command").as_deref(),
            Some("stop")
        );
        assert_eq!(
            store.writes(),
            vec![("motor0".to_string(), "command".to_string(), "stop".to_string())]
        );
    }
}
