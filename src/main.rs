//! Command line access to the motors and sensors of an ev3dev brick.
//!
//! Usage:
//!   ev3ctl touch --port in1
//!   ev3ctl motor --port A run --speed 50
//!   ev3ctl motor --port A status
//!   ev3ctl config

use clap::{Parser, Subcommand};
use ev3_devices::config::{self, Config};
use ev3_devices::motors::{OutPort, RegulationMode, StopMode};
use ev3_devices::sensors::{Endpoint, InPort, LifecycleState};
use ev3_devices::{Brick, Result};
use log::{error, info};
use std::io;
use std::path::PathBuf;
use std::process::ExitCode;
use std::time::Duration;

#[derive(Parser)]
#[command(name = "ev3ctl")]
#[command(about = "Drive motors and watch sensors on an ev3dev brick")]
struct Cli {
    /// Root of the sysfs class tree
    #[arg(long, env = "EV3_SYSFS_ROOT")]
    root: Option<PathBuf>,

    /// Sensor poll cadence in milliseconds
    #[arg(long, env = "EV3_POLL_CADENCE_MS")]
    cadence_ms: Option<u64>,

    #[command(subcommand)]
    command: Commands,
}

#[derive(Subcommand)]
enum Commands {
    /// Print touch sensor events until Ctrl+C
    Touch {
        #[arg(long, default_value = "in1")]
        port: InPort,
    },
    /// Control a tacho motor
    Motor {
        #[arg(long)]
        port: OutPort,

        #[command(subcommand)]
        action: MotorAction,
    },
    /// Print the effective configuration as JSON
    Config,
}

#[derive(Subcommand)]
enum MotorAction {
    /// Run until stopped
    Run {
        #[arg(long, allow_negative_numbers = true)]
        speed: i16,
    },
    /// Rotate by a relative angle in tacho counts
    Rotate {
        #[arg(allow_negative_numbers = true)]
        angle: i32,
        #[arg(long, allow_negative_numbers = true)]
        speed: i16,
    },
    /// Rotate to an absolute position in tacho counts
    RotateTo {
        #[arg(allow_negative_numbers = true)]
        position: i32,
        #[arg(long, allow_negative_numbers = true)]
        speed: i16,
    },
    /// Run for a fixed time
    RunFor {
        /// Duration in milliseconds
        ms: u64,
        #[arg(long, allow_negative_numbers = true)]
        speed: i16,
    },
    Stop,
    /// Print speed, power and position as JSON
    Status,
    /// Turn speed regulation on or off
    Regulation { mode: RegulationMode },
    /// Set what the motor does when stopped
    StopMode { mode: StopMode },
    /// Redefine the current position
    ResetPosition {
        #[arg(default_value_t = 0, allow_negative_numbers = true)]
        position: i32,
    },
}

fn init_logger() {
    env_logger::Builder::from_env(env_logger::Env::default().default_filter_or("info"))
        .format_timestamp_millis()
        .init();
}

fn main() -> ExitCode {
    // Before the runtime exists, so no other thread reads the environment.
    config::load_dotenv();
    init_logger();

    let cli = Cli::parse();
    let mut config = Config::from_env();
    if let Some(root) = cli.root {
        config.sysfs.root = root;
    }
    if let Some(cadence_ms) = cli.cadence_ms {
        config.poll.cadence_ms = cadence_ms;
    }

    let runtime = match tokio::runtime::Runtime::new() {
        Ok(rt) => rt,
        Err(e) => {
            error!("Failed to start runtime: {}", e);
            return ExitCode::FAILURE;
        }
    };

    match runtime.block_on(run(cli.command, config)) {
        Ok(code) => code,
        Err(e) => {
            error!("{}", e);
            ExitCode::FAILURE
        }
    }
}

async fn run(command: Commands, config: Config) -> Result<ExitCode> {
    match command {
        Commands::Config => {
            let json = serde_json::to_string_pretty(&config).map_err(io::Error::from)?;
            println!("{}", json);
            Ok(ExitCode::SUCCESS)
        }
        Commands::Touch { port } => watch_touch(&Brick::from_config(config), port).await,
        Commands::Motor { port, action } => {
            drive_motor(&Brick::from_config(config), port, action)?;
            Ok(ExitCode::SUCCESS)
        }
    }
}

async fn watch_touch(brick: &Brick, port: InPort) -> Result<ExitCode> {
    let touch = brick.touch_sensor(port)?;
    let (endpoint, mut events) = Endpoint::channel(16);
    touch.subscribe(endpoint);
    let mut state = touch.watch_state();

    touch.start().await?;
    info!(
        "[Sensor] Watching {} at {} (press Ctrl+C to exit)",
        port,
        touch.device()
    );
    info!(
        "[Sensor] Initial state: pressed={}",
        touch.is_pressed().await?
    );

    let code = loop {
        tokio::select! {
            _ = tokio::signal::ctrl_c() => {
                info!("Received shutdown signal");
                break ExitCode::SUCCESS;
            }
            Some(value) = events.recv() => {
                let action = if value != 0 { "pressed" } else { "released" };
                info!("[Sensor] {} -> {}", port, action);
            }
            Ok(()) = state.changed() => {
                if *state.borrow_and_update() == LifecycleState::Idle {
                    if let Some(e) = touch.last_error() {
                        error!("[Sensor] Listener stopped: {}", e);
                    }
                    break ExitCode::FAILURE;
                }
            }
        }
    };

    touch.stop().await;
    Ok(code)
}

fn drive_motor(brick: &Brick, port: OutPort, action: MotorAction) -> Result<()> {
    let motor = brick.motor(port);
    match action {
        MotorAction::Run { speed } => motor.run_forever(speed)?,
        MotorAction::Rotate { angle, speed } => motor.rotate(angle, speed)?,
        MotorAction::RotateTo { position, speed } => motor.rotate_to(position, speed)?,
        MotorAction::RunFor { ms, speed } => motor.run_for(Duration::from_millis(ms), speed)?,
        MotorAction::Stop => motor.stop()?,
        MotorAction::Status => {
            let status = motor.status()?;
            let json = serde_json::to_string_pretty(&status).map_err(io::Error::from)?;
            println!("{}", json);
            return Ok(());
        }
        MotorAction::Regulation { mode } => match mode {
            RegulationMode::On => motor.enable_regulation()?,
            RegulationMode::Off => motor.disable_regulation()?,
        },
        MotorAction::StopMode { mode } => motor.set_stop_mode(mode)?,
        MotorAction::ResetPosition { position } => motor.initialize_position(position)?,
    }
    info!("[Motor] {} done", port);
    Ok(())
}
