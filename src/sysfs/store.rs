//! [`AttributeStore`] over the real sysfs tree.

use super::{AttributeStore, DeviceClass, DeviceHandle};
use crate::config::SysfsConfig;
use crate::error::{Ev3Error, Result};
use std::fs;
use std::io;
use std::path::PathBuf;

/// Reads and writes attribute files below `<root>/<class>/<device>/`.
#[derive(Debug, Clone)]
pub struct SysfsStore {
    config: SysfsConfig,
}

impl SysfsStore {
    pub fn new(config: SysfsConfig) -> Self {
        Self { config }
    }

    /// Directory holding all devices of a class.
    pub fn class_dir(&self, class: DeviceClass) -> PathBuf {
        let name = match class {
            DeviceClass::Sensor => &self.config.sensor_class,
            DeviceClass::Motor => &self.config.motor_class,
        };
        self.config.root.join(name)
    }

    fn attribute_error(device: &DeviceHandle, attribute: &str, source: io::Error) -> Ev3Error {
        Ev3Error::Attribute {
            device: device.to_string(),
            attribute: attribute.to_string(),
            source,
        }
    }
}

impl AttributeStore for SysfsStore {
    fn devices(&self, class: DeviceClass) -> Result<Vec<DeviceHandle>> {
        let dir = self.class_dir(class);
        let entries = match fs::read_dir(&dir) {
            Ok(entries) => entries,
            // The class directory only exists once a driver registered it
            Err(e) if e.kind() == io::ErrorKind::NotFound => return Ok(Vec::new()),
            Err(e) => return Err(e.into()),
        };

        let mut devices = Vec::new();
        for entry in entries {
            let entry = entry?;
            let name = entry.file_name().to_string_lossy().into_owned();
            devices.push(DeviceHandle {
                class,
                name,
                path: entry.path(),
            });
        }
        devices.sort_by(|a, b| a.name.cmp(&b.name));
        Ok(devices)
    }

    fn read_string(&self, device: &DeviceHandle, attribute: &str) -> Result<String> {
        let raw = fs::read_to_string(device.path.join(attribute))
            .map_err(|e| Self::attribute_error(device, attribute, e))?;
        Ok(raw.trim_end_matches('\n').to_string())
    }

    fn write_string(&self, device: &DeviceHandle, attribute: &str, value: &str) -> Result<()> {
        fs::write(device.path.join(attribute), value)
            .map_err(|e| Self::attribute_error(device, attribute, e))
    }
}
