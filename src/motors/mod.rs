//! Tacho motor commands.
//!
//! Motors have no background state: every call finds the motor directory for
//! its port again and reads or writes the relevant attribute files.
//!
//! The meaning of `speed` depends on speed regulation. With regulation off
//! (the default) it is a duty cycle in percent, `-100..=100`. With regulation
//! on the driver holds the speed at `speed` tacho counts per second, roughly
//! `-1000..=1000` depending on the motor. Negative values run in reverse in
//! both modes.

use crate::error::{Ev3Error, Result};
use crate::sysfs::{AttributeStore, AttributeStoreExt, DeviceClass, DeviceHandle, DeviceLocator};
use log::{debug, info};
use serde::{Deserialize, Serialize};
use std::sync::Arc;
use std::time::Duration;
use strum::{AsRefStr, Display, EnumIter, EnumString};

const SPEED_REGULATION: &str = "speed_regulation";
const SPEED: &str = "speed";
const SPEED_SP: &str = "speed_sp";
const DUTY_CYCLE: &str = "duty_cycle";
const DUTY_CYCLE_SP: &str = "duty_cycle_sp";
const COMMAND: &str = "command";
const STOP_COMMAND: &str = "stop_command";
const POSITION: &str = "position";
const POSITION_SP: &str = "position_sp";
const TIME_SP: &str = "time_sp";
const COUNT_PER_ROT: &str = "count_per_rot";

/// Largest duty cycle magnitude accepted without speed regulation.
pub const MAX_DUTY_CYCLE: i16 = 100;

/// Motor output port of the brick.
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
pub enum OutPort {
    #[strum(to_string = "outA", serialize = "A")]
    #[serde(rename = "outA")]
    A,
    #[strum(to_string = "outB", serialize = "B")]
    #[serde(rename = "outB")]
    B,
    #[strum(to_string = "outC", serialize = "C")]
    #[serde(rename = "outC")]
    C,
    #[strum(to_string = "outD", serialize = "D")]
    #[serde(rename = "outD")]
    D,
}

/// Value written to `command` to start the motor.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Display, EnumString, AsRefStr)]
#[strum(serialize_all = "kebab-case")]
pub enum RunCommand {
    RunForever,
    RunToAbsPos,
    RunToRelPos,
    RunTimed,
    RunDirect,
}

/// How the motor behaves once stopped.
#[derive(
    Debug, Clone, Copy, PartialEq, Eq, Display, EnumString, AsRefStr, Serialize, Deserialize,
)]
#[strum(serialize_all = "lowercase", ascii_case_insensitive)]
#[serde(rename_all = "lowercase")]
pub enum StopMode {
    /// Cut power and let the motor spin down.
    Coast,
    /// Short the windings for a quicker stop.
    Brake,
    /// Actively hold the stop position.
    Hold,
}

#[derive(
    Debug, Clone, Copy, PartialEq, Eq, Display, EnumString, AsRefStr, Serialize, Deserialize,
)]
#[strum(serialize_all = "lowercase")]
#[serde(rename_all = "lowercase")]
pub enum RegulationMode {
    On,
    Off,
}

/// Snapshot of a motor's readings.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct MotorStatus {
    pub port: OutPort,
    pub device: String,
    pub speed: i16,
    pub power: i16,
    pub position: i32,
    pub count_per_rot: i32,
    pub regulation: RegulationMode,
}

/// The motor on one output port.
pub struct Motor {
    port: OutPort,
    store: Arc<dyn AttributeStore>,
    locator: Arc<dyn DeviceLocator>,
}

impl Motor {
    pub fn new(
        port: OutPort,
        store: Arc<dyn AttributeStore>,
        locator: Arc<dyn DeviceLocator>,
    ) -> Self {
        Self {
            port,
            store,
            locator,
        }
    }

    pub fn port(&self) -> OutPort {
        self.port
    }

    /// Motor directory currently attached to the port.
    pub fn device(&self) -> Result<DeviceHandle> {
        self.locator.resolve(DeviceClass::Motor, self.port.as_ref(), None)
    }

    /// Run until told otherwise.
    pub fn run_forever(&self, speed: i16) -> Result<()> {
        let device = self.device()?;
        self.run(&device, speed, RunCommand::RunForever)
    }

    /// Turn by `angle` degrees relative to the current position.
    pub fn rotate(&self, angle: i32, speed: i16) -> Result<()> {
        let device = self.device()?;
        self.store.write_value(&device, POSITION_SP, angle)?;
        self.run(&device, speed, RunCommand::RunToRelPos)
    }

    /// Turn to the absolute position `angle`.
    pub fn rotate_to(&self, angle: i32, speed: i16) -> Result<()> {
        let device = self.device()?;
        self.store.write_value(&device, POSITION_SP, angle)?;
        self.run(&device, speed, RunCommand::RunToAbsPos)
    }

    /// Run for `duration`, then stop using the configured stop mode.
    pub fn run_for(&self, duration: Duration, speed: i16) -> Result<()> {
        let device = self.device()?;
        self.store.write_value(&device, TIME_SP, duration.as_millis())?;
        self.run(&device, speed, RunCommand::RunTimed)
    }

    pub fn stop(&self) -> Result<()> {
        let device = self.device()?;
        self.store.write_value(&device, COMMAND, "stop")?;
        info!("[Motor] {} stopped", self.port);
        Ok(())
    }

    /// Current speed in tacho counts per second.
    pub fn current_speed(&self) -> Result<i16> {
        self.store.read_value(&self.device()?, SPEED)
    }

    /// Current duty cycle in percent.
    pub fn current_power(&self) -> Result<i16> {
        self.store.read_value(&self.device()?, DUTY_CYCLE)
    }

    /// Current position in tacho counts.
    pub fn current_position(&self) -> Result<i32> {
        self.store.read_value(&self.device()?, POSITION)
    }

    /// Overwrite the position counter.
    pub fn initialize_position(&self, position: i32) -> Result<()> {
        self.store.write_value(&self.device()?, POSITION, position)
    }

    pub fn regulation(&self) -> Result<RegulationMode> {
        self.store.read_value(&self.device()?, SPEED_REGULATION)
    }

    /// Let the driver compensate for load to hold the target speed.
    pub fn enable_regulation(&self) -> Result<()> {
        self.store
            .write_value(&self.device()?, SPEED_REGULATION, RegulationMode::On)
    }

    pub fn disable_regulation(&self) -> Result<()> {
        self.store
            .write_value(&self.device()?, SPEED_REGULATION, RegulationMode::Off)
    }

    pub fn set_stop_mode(&self, mode: StopMode) -> Result<()> {
        self.store.write_value(&self.device()?, STOP_COMMAND, mode)
    }

    pub fn status(&self) -> Result<MotorStatus> {
        let device = self.device()?;
        Ok(MotorStatus {
            port: self.port,
            device: device.name.clone(),
            speed: self.store.read_value(&device, SPEED)?,
            power: self.store.read_value(&device, DUTY_CYCLE)?,
            position: self.store.read_value(&device, POSITION)?,
            count_per_rot: self.store.read_value(&device, COUNT_PER_ROT)?,
            regulation: self.store.read_value(&device, SPEED_REGULATION)?,
        })
    }

    fn set_speed(&self, device: &DeviceHandle, speed: i16) -> Result<()> {
        match self.store.read_value::<RegulationMode>(device, SPEED_REGULATION)? {
            RegulationMode::On => self.store.write_value(device, SPEED_SP, speed),
            RegulationMode::Off => {
                if !(-MAX_DUTY_CYCLE..=MAX_DUTY_CYCLE).contains(&speed) {
                    return Err(Ev3Error::InvalidArgument(format!(
                        "speed {} outside [-{}, {}] without speed regulation",
                        speed, MAX_DUTY_CYCLE, MAX_DUTY_CYCLE
                    )));
                }
                self.store.write_value(device, DUTY_CYCLE_SP, speed)
            }
        }
    }

    fn run(&self, device: &DeviceHandle, speed: i16, command: RunCommand) -> Result<()> {
        self.set_speed(device, speed)?;
        self.store.write_value(device, COMMAND, command)?;
        debug!("[Motor] {} {} at speed {}", self.port, command, speed);
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::sysfs::{PortLocator, SimulatedStore};
    use std::str::FromStr;

    fn motor_on_a(regulation: &str) -> (Arc<SimulatedStore>, Motor) {
        let store = Arc::new(SimulatedStore::new());
        store.add_device(
            DeviceClass::Motor,
            "motor0",
            "ev3-ports:outA",
            "lego-ev3-l-motor",
        );
        store.set_attribute("motor0", SPEED_REGULATION, regulation);
        let locator = Arc::new(PortLocator::new(store.clone()));
        let motor = Motor::new(OutPort::A, store.clone(), locator);
        (store, motor)
    }

    fn written(store: &SimulatedStore) -> Vec<(String, String)> {
        store
            .writes()
            .into_iter()
            .map(|(_, attr, value)| (attr, value))
            .collect()
    }

    fn pair(attr: &str, value: &str) -> (String, String) {
        (attr.to_string(), value.to_string())
    }

    #[test]
    fn test_port_and_command_names() {
        assert_eq!(OutPort::A.to_string(), "outA");
        assert_eq!(OutPort::from_str("c").unwrap(), OutPort::C);
        assert_eq!(OutPort::from_str("outD").unwrap(), OutPort::D);
        assert_eq!(RunCommand::RunToAbsPos.as_ref(), "run-to-abs-pos");
        assert_eq!(RunCommand::RunForever.to_string(), "run-forever");
        assert_eq!(StopMode::from_str("Hold").unwrap(), StopMode::Hold);
    }

    #[test]
    fn test_run_forever_unregulated_writes_duty_cycle() {
        let (store, motor) = motor_on_a("off");
        motor.run_forever(-75).unwrap();

        assert_eq!(
            written(&store),
            vec![pair(DUTY_CYCLE_SP, "-75"), pair(COMMAND, "run-forever")]
        );
    }

    #[test]
    fn test_run_forever_regulated_writes_speed_setpoint() {
        let (store, motor) = motor_on_a("on");
        motor.run_forever(600).unwrap();

        assert_eq!(
            written(&store),
            vec![pair(SPEED_SP, "600"), pair(COMMAND, "run-forever")]
        );
    }

    #[test]
    fn test_unregulated_speed_out_of_range() {
        let (store, motor) = motor_on_a("off");
        let err = motor.run_forever(101).unwrap_err();

        assert!(matches!(err, Ev3Error::InvalidArgument(_)));
        assert!(store.writes().is_empty());
        assert!(motor.run_forever(-100).is_ok());
    }

    #[test]
    fn test_rotate_and_rotate_to() {
        let (store, motor) = motor_on_a("off");
        motor.rotate(90, 50).unwrap();
        motor.rotate_to(-180, 30).unwrap();

        assert_eq!(
            written(&store),
            vec![
                pair(POSITION_SP, "90"),
                pair(DUTY_CYCLE_SP, "50"),
                pair(COMMAND, "run-to-rel-pos"),
                pair(POSITION_SP, "-180"),
                pair(DUTY_CYCLE_SP, "30"),
                pair(COMMAND, "run-to-abs-pos"),
            ]
        );
    }

    #[test]
    fn test_run_for_writes_milliseconds() {
        let (store, motor) = motor_on_a("off");
        motor.run_for(Duration::from_millis(1500), 40).unwrap();

        assert_eq!(store.attribute("motor0", TIME_SP).as_deref(), Some("1500"));
        assert_eq!(
            store.attribute("motor0", COMMAND).as_deref(),
            Some("run-timed")
        );
    }

    #[test]
    fn test_stop_and_settings() {
        let (store, motor) = motor_on_a("off");
        motor.set_stop_mode(StopMode::Brake).unwrap();
        motor.enable_regulation().unwrap();
        motor.stop().unwrap();

        assert_eq!(
            store.attribute("motor0", STOP_COMMAND).as_deref(),
            Some("brake")
        );
        assert_eq!(motor.regulation().unwrap(), RegulationMode::On);
        assert_eq!(store.attribute("motor0", COMMAND).as_deref(), Some("stop"));

        motor.disable_regulation().unwrap();
        assert_eq!(motor.regulation().unwrap(), RegulationMode::Off);
    }

    #[test]
    fn test_readings_and_status() {
        let (store, motor) = motor_on_a("on");
        store.set_attribute("motor0", SPEED, -300);
        store.set_attribute("motor0", DUTY_CYCLE, -42);
        store.set_attribute("motor0", POSITION, 720);
        store.set_attribute("motor0", COUNT_PER_ROT, 360);

        assert_eq!(motor.current_speed().unwrap(), -300);
        assert_eq!(motor.current_power().unwrap(), -42);
        assert_eq!(motor.current_position().unwrap(), 720);

        motor.initialize_position(0).unwrap();
        let status = motor.status().unwrap();
        assert_eq!(status.position, 0);
        assert_eq!(status.device, "motor0");
        assert_eq!(status.regulation, RegulationMode::On);

        let json = serde_json::to_value(&status).unwrap();
        assert_eq!(json["port"], "outA");
        assert_eq!(json["regulation"], "on");
    }

    #[test]
    fn test_unknown_regulation_is_parse_error() {
        let (_store, motor) = motor_on_a("maybe");
        assert!(matches!(
            motor.run_forever(10).unwrap_err(),
            Ev3Error::Parse { .. }
        ));
    }

    #[test]
    fn test_no_motor_is_not_found() {
        let store = Arc::new(SimulatedStore::new());
        let locator = Arc::new(PortLocator::new(store.clone()));
        let motor = Motor::new(OutPort::B, store, locator);

        assert!(motor.stop().unwrap_err().is_not_found());
        assert!(motor.current_speed().unwrap_err().is_not_found());
    }
}
