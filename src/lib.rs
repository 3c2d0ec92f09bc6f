//! ev3dev device library.
//!
//! Typed access to the motors and sensors of an EV3 brick running ev3dev,
//! on top of the sysfs attribute files the kernel drivers expose. Sensors
//! can be watched in the background and report every change to any number
//! of subscribers.

pub mod brick;
pub mod config;
pub mod error;
pub mod motors;
pub mod sensors;
pub mod sysfs;

pub use brick::Brick;
pub use config::Config;
pub use error::{Ev3Error, Result};
