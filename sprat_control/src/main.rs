use std::path::PathBuf;

use anyhow::{Context as _, bail};
use clap::{Parser, Subcommand, ValueEnum};
use sprat_ccd::{DetectorClient, ExposureType, FitsValue, Window, validate_keyword};
use sprat_mechanism::{
    CancellationToken, DegradedSensorPositioner, Lamp, Mechanism, MechanismClient,
    MechanismPositioner, MoveReport, Positioner, RotationPositioner,
};
use sprat_protocol::decoder::{InOutPosition, OnOffState, RotationPosition};
use sprat_protocol::{CommandSpec, DecoderKind, Engine, Framing};
use tracing::{error, info};

use crate::config::{Config, ConfigOptions, create_default_config, init_config_with_options};

pub mod config;
pub mod logging;

/// Command-line control of the Sprat detector and mechanisms
#[derive(Parser, Debug)]
#[command(name = "sprat_control", version)]
struct Args {
    /// Configuration file, defaults to $CONFIG_PATH or default_config.toml
    #[arg(long, global = true)]
    config: Option<PathBuf>,

    #[command(subcommand)]
    command: Command,
}

#[derive(Subcommand, Debug)]
enum Command {
    /// Detector commands
    #[command(subcommand)]
    Ccd(CcdCommand),

    /// Move a mechanism in or out and wait until it gets there
    Move {
        mechanism: Mechanism,
        #[arg(value_enum)]
        target: Direction,
    },

    /// Turn the rotation stage to one of its positions
    Rotate { position: i32 },

    /// Switch a lamp, or report its state when no state is given
    Lamp {
        lamp: Lamp,
        #[arg(value_enum)]
        state: Option<Switch>,
    },

    /// Report the position of every mechanism
    Positions,

    /// Read the gyro and the environment sensors
    Sensors {
        #[arg(long, default_value = "0")]
        humidity: u32,
        #[arg(long, default_value = "0")]
        temperature: u32,
    },

    /// Send a raw command line and decode the reply
    Raw {
        #[arg(value_enum)]
        backend: Backend,
        #[arg(value_enum)]
        reply: ReplyKind,
        #[arg(required = true, trailing_var_arg = true)]
        line: Vec<String>,
    },
}

#[derive(Subcommand, Debug)]
enum CcdCommand {
    Abort,
    Bias,
    Dark { exposure_ms: u32 },
    Expose { exposure_ms: u32 },
    Multbias { count: u32 },
    Multdark { exposure_ms: u32, count: u32 },
    Multrun {
        exposure_ms: u32,
        count: u32,
        exposure_type: ExposureType,
    },
    /// Set binning and optionally a readout window
    Config {
        x_bin: u32,
        y_bin: u32,
        #[arg(long, num_args = 4, value_names = ["START_X", "END_X", "START_Y", "END_Y"])]
        window: Option<Vec<u32>>,
    },
    Shutdown,
    /// Manage FITS header keywords
    #[command(subcommand)]
    Fits(FitsCommand),
    /// Set the CCD temperature target in degrees Celsius
    Temperature { celsius: f64 },
    Cooler {
        #[arg(value_enum)]
        state: Switch,
    },
    /// Report exposure, multrun and temperature status
    Status,
}

#[derive(Subcommand, Debug)]
enum FitsCommand {
    Add {
        keyword: String,
        #[arg(value_enum)]
        kind: FitsKind,
        value: String,
    },
    Delete { keyword: String },
    Clear,
}

#[derive(ValueEnum, Clone, Copy, Debug)]
enum Direction {
    In,
    Out,
}

#[derive(ValueEnum, Clone, Copy, Debug)]
enum Switch {
    On,
    Off,
}

#[derive(ValueEnum, Clone, Copy, Debug)]
enum Backend {
    Ccd,
    Mechanism,
}

#[derive(ValueEnum, Clone, Copy, Debug)]
enum FitsKind {
    Boolean,
    Float,
    Integer,
    String,
    Commentstring,
    Units,
}

#[derive(ValueEnum, Clone, Copy, Debug)]
enum ReplyKind {
    Ack,
    Integer,
    Double,
    InOut,
    OnOff,
    Rotation,
    ExposureStatus,
    IndexFilename,
    TimestampTemperature,
    TimestampStatus,
    Timestamp,
    Gyro,
}

impl From<Direction> for InOutPosition {
    fn from(direction: Direction) -> Self {
        match direction {
            Direction::In => InOutPosition::In,
            Direction::Out => InOutPosition::Out,
        }
    }
}

impl From<Switch> for OnOffState {
    fn from(switch: Switch) -> Self {
        match switch {
            Switch::On => OnOffState::On,
            Switch::Off => OnOffState::Off,
        }
    }
}

impl From<ReplyKind> for DecoderKind {
    fn from(kind: ReplyKind) -> Self {
        match kind {
            ReplyKind::Ack => DecoderKind::Acknowledge,
            ReplyKind::Integer => DecoderKind::Integer,
            ReplyKind::Double => DecoderKind::Double,
            ReplyKind::InOut => DecoderKind::InOut,
            ReplyKind::OnOff => DecoderKind::OnOff,
            ReplyKind::Rotation => DecoderKind::Rotation,
            ReplyKind::ExposureStatus => DecoderKind::ExposureStatus,
            ReplyKind::IndexFilename => DecoderKind::IndexFilename,
            ReplyKind::TimestampTemperature => DecoderKind::TimestampTemperature,
            ReplyKind::TimestampStatus => DecoderKind::TimestampStatus,
            ReplyKind::Timestamp => DecoderKind::Timestamp,
            ReplyKind::Gyro => DecoderKind::Gyro,
        }
    }
}

fn fits_value(kind: FitsKind, value: String) -> anyhow::Result<FitsValue> {
    Ok(match kind {
        FitsKind::Boolean => FitsValue::Boolean(value.parse().context("Expected true or false")?),
        FitsKind::Float => FitsValue::Float(value.parse().context("Expected a float")?),
        FitsKind::Integer => FitsValue::Integer(value.parse().context("Expected an integer")?),
        FitsKind::String => FitsValue::String(value),
        FitsKind::Commentstring => FitsValue::CommentString(value),
        FitsKind::Units => FitsValue::Units(value),
    })
}

fn should_create_config() -> bool {
    std::env::var("CREATE_CONFIG")
        .map(|val| val == "1" || val.to_lowercase() == "true")
        .unwrap_or(false)
}

/// A token that fires on Ctrl-C, so an interrupted move stops polling.
fn ctrl_c_token() -> CancellationToken {
    let cancel = CancellationToken::new();
    let trigger = cancel.clone();
    tokio::spawn(async move {
        if tokio::signal::ctrl_c().await.is_ok() {
            info!("Interrupted, cancelling move");
            trigger.cancel();
        }
    });
    cancel
}

fn print_report<P: std::fmt::Display>(name: &str, report: &MoveReport<P>) {
    let confirmation = if report.sensor_confirmed {
        "confirmed by sensor"
    } else {
        "assumed after grace delay"
    };
    println!(
        "{} at {} after {:?} ({} polls, {})",
        name, report.target, report.elapsed, report.polls, confirmation
    );
}

async fn run_ccd(config: &Config, command: CcdCommand) -> anyhow::Result<()> {
    let ccd = DetectorClient::connect(
        config.detector.host.clone(),
        config.detector.port,
        config.transport.settings(),
    );

    let frame = match command {
        CcdCommand::Abort => {
            ccd.abort().await?;
            None
        }
        CcdCommand::Bias => Some(ccd.bias().await?),
        CcdCommand::Dark { exposure_ms } => Some(ccd.dark(exposure_ms).await?),
        CcdCommand::Expose { exposure_ms } => Some(ccd.expose(exposure_ms).await?),
        CcdCommand::Multbias { count } => Some(ccd.mult_bias(count).await?),
        CcdCommand::Multdark { exposure_ms, count } => {
            Some(ccd.mult_dark(exposure_ms, count).await?)
        }
        CcdCommand::Multrun {
            exposure_ms,
            count,
            exposure_type,
        } => Some(ccd.multrun(exposure_ms, count, exposure_type).await?),
        CcdCommand::Config {
            x_bin,
            y_bin,
            window,
        } => {
            let window = match window.as_deref() {
                None => None,
                Some(&[start_x, end_x, start_y, end_y]) => Some(Window {
                    start_x,
                    end_x,
                    start_y,
                    end_y,
                }),
                Some(other) => bail!("A window needs four values, got {}", other.len()),
            };
            ccd.config(x_bin, y_bin, window).await?;
            None
        }
        CcdCommand::Shutdown => {
            ccd.shutdown().await?;
            None
        }
        CcdCommand::Fits(FitsCommand::Add {
            keyword,
            kind,
            value,
        }) => {
            validate_keyword(&keyword)?;
            ccd.fits_header_add(keyword, fits_value(kind, value)?).await?;
            None
        }
        CcdCommand::Fits(FitsCommand::Delete { keyword }) => {
            validate_keyword(&keyword)?;
            ccd.fits_header_delete(keyword).await?;
            None
        }
        CcdCommand::Fits(FitsCommand::Clear) => {
            ccd.fits_header_clear().await?;
            None
        }
        CcdCommand::Temperature { celsius } => {
            ccd.set_temperature(celsius).await?;
            None
        }
        CcdCommand::Cooler { state } => {
            ccd.set_cooler(matches!(state, Switch::On)).await?;
            None
        }
        CcdCommand::Status => {
            let status = ccd.exposure_status().await?;
            println!("exposure status: {}", status);
            println!("exposure length: {} ms", ccd.exposure_length().await?);
            match ccd.exposure_start_time().await {
                Ok(start) => println!("exposure start: {}", start),
                Err(e) => println!("exposure start: unavailable ({})", e),
            }
            println!(
                "multrun {} run {}",
                ccd.exposure_multrun().await?,
                ccd.exposure_run().await?
            );
            let (x_bin, y_bin) = ccd.multrun_binning().await?;
            println!(
                "frame {} of {}, binning {}x{}",
                ccd.multrun_index().await?,
                ccd.multrun_count().await?,
                x_bin,
                y_bin
            );
            let temperature = ccd.temperature().await?;
            let cooler = ccd.temperature_status().await?;
            println!(
                "temperature {:.2} C at {}, cooler {}",
                temperature.temperature, temperature.timestamp, cooler.status
            );
            None
        }
    };

    match frame {
        Some(frame) => println!("{} (frame {})", frame.filename, frame.index),
        None => println!("ok"),
    }
    Ok(())
}

async fn move_mechanism(
    config: &Config,
    client: MechanismClient,
    mechanism: Mechanism,
    target: InOutPosition,
) -> anyhow::Result<()> {
    let params = config.moves.for_mechanism(mechanism).params();
    let positioner = MechanismPositioner::new(client, mechanism).with_params(params);
    let cancel = ctrl_c_token();

    let report = match (mechanism, config.slit.workaround()) {
        (Mechanism::Slit, Some(workaround)) => {
            DegradedSensorPositioner::new(positioner, workaround)
                .move_to(target, &cancel)
                .await?
        }
        _ => positioner.move_to(target, &cancel).await?,
    };

    print_report(mechanism.token(), &report);
    Ok(())
}

async fn run(config: Config, command: Command) -> anyhow::Result<()> {
    let mechanism = MechanismClient::connect(
        config.mechanism.host.clone(),
        config.mechanism.port,
        config.transport.settings(),
    );

    match command {
        Command::Ccd(command) => run_ccd(&config, command).await?,
        Command::Move {
            mechanism: target_mechanism,
            target,
        } => move_mechanism(&config, mechanism, target_mechanism, target.into()).await?,
        Command::Rotate { position } => {
            let rotation =
                RotationPositioner::new(mechanism).with_params(config.moves.rotation.params());
            let report = rotation
                .move_to(RotationPosition::At(position), &ctrl_c_token())
                .await?;
            print_report("rotation", &report);
        }
        Command::Lamp { lamp, state } => {
            let reported = mechanism.lamp(lamp, state.map(OnOffState::from)).await?;
            println!("{}", reported);
        }
        Command::Positions => {
            for target in Mechanism::ALL {
                println!("{}: {}", target, mechanism.position(target).await?);
            }
            println!("rotation: {}", mechanism.rotation(None).await?);
        }
        Command::Sensors {
            humidity,
            temperature,
        } => {
            let gyro = mechanism.gyro().await?;
            println!("gyro: {} {} {}", gyro.x, gyro.y, gyro.z);
            println!("humidity {}: {:.1} %", humidity, mechanism.humidity(humidity).await?);
            println!(
                "temperature {}: {:.2} C",
                temperature,
                mechanism.temperature(temperature).await?
            );
        }
        Command::Raw {
            backend,
            reply,
            line,
        } => {
            let (endpoint, framing) = match backend {
                Backend::Ccd => (&config.detector, Framing::ReturnCode),
                Backend::Mechanism => (&config.mechanism, Framing::Bare),
            };
            let engine = Engine::new(
                endpoint.host.clone(),
                endpoint.port,
                config.transport.settings(),
            );
            let spec = CommandSpec::new(line.join(" "), framing, reply.into());
            println!("{}", spec.execute(&engine).await?);
        }
    }

    Ok(())
}

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    let args = Args::parse();

    if should_create_config() {
        let path = create_default_config(args.config.as_ref())?;
        eprintln!("Wrote default configuration to {}", path.display());
    }

    let options = match &args.config {
        Some(path) => ConfigOptions::with_path(path),
        None => ConfigOptions::default(),
    };
    let (_config_manager, config) = init_config_with_options(options).map_err(|e| {
        eprintln!("Failed to load configuration: {}", e);
        eprintln!("Run with CREATE_CONFIG=1 to create a default configuration file.");
        e
    })?;

    let _log_guard = logging::init(&config.logging);

    run(config, args.command).await.inspect_err(|e| {
        error!("{:#}", e);
    })
}
