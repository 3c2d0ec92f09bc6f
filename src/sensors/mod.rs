//! Sensors and their change notification.
//!
//! A [`SensorHandle`] watches one sensor attribute. After [`start`] a
//! background task reads the attribute every poll cadence and delivers each
//! new value to all subscribed [`Endpoint`]s. Subscriptions can be added and
//! removed at any time and survive stop/start cycles.
//!
//! ```ignore
//! let sensor = brick.touch_sensor(InPort::In1)?;
//! let (endpoint, mut events) = Endpoint::channel(16);
//! sensor.subscribe(endpoint);
//! sensor.start().await?;
//!
//! while let Some(value) = events.recv().await {
//!     println!("touch: {}", value);
//! }
//! ```
//!
//! [`start`]: SensorHandle::start

pub mod endpoint;
pub mod handle;
pub mod poller;
pub mod registry;
pub mod touch_sensor;

pub use endpoint::{Delivery, Endpoint};
pub use handle::{LifecycleState, SensorHandle};
pub use poller::SensorValue;
pub use registry::SubscriberRegistry;
pub use touch_sensor::TouchSensor;

use serde::{Deserialize, Serialize};
use strum::{AsRefStr, Display, EnumIter, EnumString, IntoStaticStr};

/// Sensor input port of the brick.
#[derive(
    Debug,
    Clone,
    Copy,
    PartialEq,
    Eq,
    Hash,
    Display,
    EnumString,
    AsRefStr,
    EnumIter,
    Serialize,
    Deserialize,
)]
#[strum(ascii_case_insensitive)]
pub enum InPort {
    #[strum(to_string = "in1", serialize = "1")]
    #[serde(rename = "in1")]
    In1,
    #[strum(to_string = "in2", serialize = "2")]
    #[serde(rename = "in2")]
    In2,
    #[strum(to_string = "in3", serialize = "3")]
    #[serde(rename = "in3")]
    In3,
    #[strum(to_string = "in4", serialize = "4")]
    #[serde(rename = "in4")]
    In4,
}

/// Kind of sensor expected on a port, identified by its ev3dev driver.
#[derive(
    Debug,
    Clone,
    Copy,
    PartialEq,
    Eq,
    Hash,
    Display,
    EnumString,
    AsRefStr,
    IntoStaticStr,
    EnumIter,
    Serialize,
)]
pub enum SensorType {
    #[strum(serialize = "lego-ev3-touch")]
    Touch,
    #[strum(serialize = "lego-nxt-touch")]
    NxtTouch,
    #[strum(serialize = "lego-ev3-color")]
    Color,
    #[strum(serialize = "lego-ev3-us")]
    Ultrasonic,
    #[strum(serialize = "lego-ev3-gyro")]
    Gyro,
    #[strum(serialize = "lego-ev3-ir")]
    Infrared,
}

impl SensorType {
    /// Name reported in the sensor's `driver_name` attribute.
    pub fn driver_name(&self) -> &'static str {
        (*self).into()
    }
}
