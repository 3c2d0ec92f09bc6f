//! Port-based device discovery.

use super::{AttributeStore, DRIVER_NAME, DeviceClass, DeviceHandle, DeviceLocator, PORT_NAME};
use crate::error::{Ev3Error, Result};
use log::{debug, warn};
use std::sync::Arc;

/// Finds devices by reading the `port_name` attribute of every device in a
/// class.
///
/// Nothing is cached: every call enumerates the class again, so devices that
/// were unplugged and re-plugged (and got a new directory) are still found.
pub struct PortLocator {
    store: Arc<dyn AttributeStore>,
}

impl PortLocator {
    pub fn new(store: Arc<dyn AttributeStore>) -> Self {
        Self { store }
    }
}

/// ev3dev reports ports either bare (`in1`) or qualified (`ev3-ports:in1`).
fn port_matches(reported: &str, wanted: &str) -> bool {
    let reported = reported.trim();
    reported == wanted
        || reported
            .rsplit_once(':')
            .is_some_and(|(_, suffix)| suffix == wanted)
}

impl DeviceLocator for PortLocator {
    fn resolve(
        &self,
        class: DeviceClass,
        port: &str,
        driver: Option<&str>,
    ) -> Result<DeviceHandle> {
        let not_found = || Ev3Error::DeviceNotFound {
            class,
            port: port.to_string(),
        };

        let devices = self.store.devices(class)?;
        if devices.is_empty() {
            warn!("[Locator] No {} devices connected", class);
            return Err(not_found());
        }

        for device in devices {
            let reported = match self.store.read_string(&device, PORT_NAME) {
                Ok(p) => p,
                Err(e) => {
                    // Devices can disappear between enumeration and read
                    debug!("[Locator] Skipping {}: {}", device, e);
                    continue;
                }
            };
            if !port_matches(&reported, port) {
                continue;
            }

            if let Some(expected) = driver {
                let actual = self.store.read_string(&device, DRIVER_NAME)?;
                if actual.trim() != expected {
                    warn!(
                        "[Locator] Port {} has a {} ({}), expected {}",
                        port, class, actual, expected
                    );
                    return Err(not_found());
                }
            }

            debug!("[Locator] {} on port {} is {}", class, port, device);
            return Ok(device);
        }

        warn!("[Locator] No {} is connected to port {}", class, port);
        Err(not_found())
    }
}
