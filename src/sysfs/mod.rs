//! Attribute-file access to ev3dev devices.
//!
//! Every motor and sensor driver exposes a directory under its device class
//! (`/sys/class/tacho-motor/motor0`, `/sys/class/lego-sensor/sensor1`, ...)
//! holding one file per attribute. The [`AttributeStore`] trait is the
//! blocking key/value view of that tree and [`DeviceLocator`] maps a logical
//! port to one of its device directories.
//!
//! Two stores are provided: [`SysfsStore`] for the real file tree and
//! [`SimulatedStore`] for development and tests.

pub mod locator;
pub mod simulated;
pub mod store;

pub use locator::PortLocator;
pub use simulated::SimulatedStore;
pub use store::SysfsStore;

use crate::error::{Ev3Error, Result};
use std::fmt;
use std::fmt::Display;
use std::path::PathBuf;
use std::str::FromStr;

/// Attribute naming the port a device is plugged into.
pub const PORT_NAME: &str = "port_name";
/// Attribute naming the kernel driver bound to a device.
pub const DRIVER_NAME: &str = "driver_name";

/// Device class directory a device lives in.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum DeviceClass {
    Sensor,
    Motor,
}

impl fmt::Display for DeviceClass {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            DeviceClass::Sensor => f.write_str("sensor"),
            DeviceClass::Motor => f.write_str("motor"),
        }
    }
}

/// A concrete device directory, as found by enumeration.
#[derive(Debug, Clone, PartialEq, Eq, Hash)]
pub struct DeviceHandle {
    pub class: DeviceClass,
    /// Directory name inside the class directory (e.g. `sensor0`).
    pub name: String,
    pub path: PathBuf,
}

impl fmt::Display for DeviceHandle {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.path.display())
    }
}

/// Blocking accessor for device attribute files.
pub trait AttributeStore: Send + Sync {
    /// List the devices currently present in a class.
    ///
    /// A class with no devices (or no class directory at all) yields an
    /// empty list.
    fn devices(&self, class: DeviceClass) -> Result<Vec<DeviceHandle>>;

    /// Read an attribute, without the trailing newline.
    fn read_string(&self, device: &DeviceHandle, attribute: &str) -> Result<String>;

    /// Replace the content of an attribute.
    fn write_string(&self, device: &DeviceHandle, attribute: &str, value: &str) -> Result<()>;
}

/// Typed reads and writes on top of any [`AttributeStore`].
pub trait AttributeStoreExt: AttributeStore {
    fn read_value<T: FromStr>(&self, device: &DeviceHandle, attribute: &str) -> Result<T> {
        let raw = self.read_string(device, attribute)?;
        raw.trim().parse().map_err(|_| Ev3Error::Parse {
            device: device.to_string(),
            attribute: attribute.to_string(),
            value: raw,
        })
    }

    fn write_value<T: Display>(
        &self,
        device: &DeviceHandle,
        attribute: &str,
        value: T,
    ) -> Result<()> {
        self.write_string(device, attribute, &value.to_string())
    }
}

impl<S: AttributeStore + ?Sized> AttributeStoreExt for S {}

/// Resolves a logical port to the device plugged into it.
pub trait DeviceLocator: Send + Sync {
    /// Find the device of `class` attached to `port`.
    ///
    /// When `driver` is given, the device must also be bound to that driver.
    fn resolve(&self, class: DeviceClass, port: &str, driver: Option<&str>) -> Result<DeviceHandle>;
}
