use std::{
    fs,
    path::{Path, PathBuf},
    time::Duration,
};

use anyhow::Context as _;
use serde::{Deserialize, Serialize};
use sprat_mechanism::{Mechanism, MoveParams, SensorWorkaround};
use sprat_protocol::TelnetSettings;

#[derive(Debug, thiserror::Error)]
pub enum ConfigError {
    #[error("Configuration file not found at {path}")]
    FileNotFound { path: PathBuf },

    #[error("Failed to read configuration file: {source}")]
    ReadError { source: std::io::Error },

    #[error("Failed to parse configuration: {source}")]
    ParseError { source: toml::de::Error },

    #[error("Failed to serialize configuration: {source}")]
    SerializeError { source: toml::ser::Error },

    #[error("Failed to write configuration file: {source}")]
    WriteError { source: std::io::Error },

    #[error("Configuration validation failed: {message}")]
    ValidationError { message: String },
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Endpoint {
    pub host: String,
    pub port: u16,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct TransportConfig {
    pub connect_timeout_ms: u64,
    pub read_timeout_ms: u64,
    pub write_timeout_ms: u64,
}

impl Default for TransportConfig {
    fn default() -> Self {
        let settings = TelnetSettings::default();
        Self {
            connect_timeout_ms: settings.connect_timeout.as_millis() as u64,
            read_timeout_ms: settings.read_timeout.as_millis() as u64,
            write_timeout_ms: settings.write_timeout.as_millis() as u64,
        }
    }
}

impl TransportConfig {
    pub fn settings(&self) -> TelnetSettings {
        TelnetSettings {
            connect_timeout: Duration::from_millis(self.connect_timeout_ms),
            read_timeout: Duration::from_millis(self.read_timeout_ms),
            write_timeout: Duration::from_millis(self.write_timeout_ms),
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct MoveConfig {
    pub sleep_interval_ms: u64,
    pub timeout_interval_ms: u64,
}

impl Default for MoveConfig {
    fn default() -> Self {
        let params = MoveParams::default();
        Self {
            sleep_interval_ms: params.sleep_interval.as_millis() as u64,
            timeout_interval_ms: params.timeout_interval.as_millis() as u64,
        }
    }
}

impl MoveConfig {
    pub fn params(&self) -> MoveParams {
        MoveParams {
            sleep_interval: Duration::from_millis(self.sleep_interval_ms),
            timeout_interval: Duration::from_millis(self.timeout_interval_ms),
        }
    }
}

#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct MovesConfig {
    pub grism: MoveConfig,
    pub mirror: MoveConfig,
    pub slit: MoveConfig,
    pub rotation: MoveConfig,
}

impl MovesConfig {
    pub fn for_mechanism(&self, mechanism: Mechanism) -> MoveConfig {
        match mechanism {
            Mechanism::Grism => self.grism,
            Mechanism::Mirror => self.mirror,
            Mechanism::Slit => self.slit,
        }
    }

    fn all(&self) -> [(&'static str, &MoveConfig); 4] {
        [
            ("grism", &self.grism),
            ("mirror", &self.mirror),
            ("slit", &self.slit),
            ("rotation", &self.rotation),
        ]
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct SlitConfig {
    /// The slit "in" sensor does not fire; moves to "in" finish on a grace
    /// delay instead.
    pub degraded_in_sensor: bool,
    pub grace_delay_ms: u64,
}

impl Default for SlitConfig {
    fn default() -> Self {
        Self {
            degraded_in_sensor: true,
            grace_delay_ms: sprat_mechanism::positioner::GRACE_DELAY.as_millis() as u64,
        }
    }
}

impl SlitConfig {
    pub fn workaround(&self) -> Option<SensorWorkaround> {
        self.degraded_in_sensor
            .then(|| SensorWorkaround::broken_in_sensor(Duration::from_millis(self.grace_delay_ms)))
    }
}

#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct LoggingConfig {
    pub json: bool,
    /// Daily rolling log files are written here when set.
    #[serde(skip_serializing_if = "Option::is_none")]
    pub directory: Option<PathBuf>,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct Config {
    pub detector: Endpoint,
    pub mechanism: Endpoint,
    pub transport: TransportConfig,
    pub moves: MovesConfig,
    pub slit: SlitConfig,
    pub logging: LoggingConfig,
}

impl Default for Config {
    fn default() -> Self {
        Self {
            detector: Endpoint {
                host: "localhost".to_string(),
                port: 8367,
            },
            mechanism: Endpoint {
                host: "localhost".to_string(),
                port: 23,
            },
            transport: TransportConfig::default(),
            moves: MovesConfig::default(),
            slit: SlitConfig::default(),
            logging: LoggingConfig::default(),
        }
    }
}

impl Config {
    pub fn validate(&self) -> Result<(), ConfigError> {
        let invalid = |message: String| Err(ConfigError::ValidationError { message });

        for (name, endpoint) in [("detector", &self.detector), ("mechanism", &self.mechanism)] {
            if endpoint.host.trim().is_empty() {
                return invalid(format!("{name} host is empty"));
            }
            if endpoint.port == 0 {
                return invalid(format!("{name} port must not be 0"));
            }
        }

        for (name, moves) in self.moves.all() {
            if moves.sleep_interval_ms == 0 {
                return invalid(format!("moves.{name}.sleep_interval_ms must not be 0"));
            }
            if moves.timeout_interval_ms == 0 {
                return invalid(format!("moves.{name}.timeout_interval_ms must not be 0"));
            }
        }

        if self.transport.connect_timeout_ms == 0 || self.transport.read_timeout_ms == 0 {
            return invalid("transport timeouts must not be 0".to_string());
        }

        Ok(())
    }
}

#[derive(Debug)]
pub struct ConfigOptions {
    pub config_path: PathBuf,
    pub create_if_missing: bool,
}

impl Default for ConfigOptions {
    fn default() -> Self {
        Self {
            config_path: Self::default_config_path(),
            create_if_missing: true,
        }
    }
}

impl ConfigOptions {
    pub fn default_config_path() -> PathBuf {
        std::env::var("CONFIG_PATH")
            .map(PathBuf::from)
            .unwrap_or_else(|_| PathBuf::from("default_config.toml"))
    }

    pub fn with_path<P: AsRef<Path>>(path: P) -> Self {
        Self {
            config_path: path.as_ref().to_path_buf(),
            ..Default::default()
        }
    }
}

#[derive(Debug)]
pub struct ConfigManager {
    options: ConfigOptions,
}

impl ConfigManager {
    pub fn new() -> Self {
        Self::with_options(ConfigOptions::default())
    }

    pub fn with_options(options: ConfigOptions) -> Self {
        Self { options }
    }

    pub fn path(&self) -> &Path {
        &self.options.config_path
    }

    pub fn load(&self) -> anyhow::Result<Config> {
        let config_path = &self.options.config_path;

        if !config_path.exists() {
            if !self.options.create_if_missing {
                return Err(ConfigError::FileNotFound {
                    path: config_path.clone(),
                }
                .into());
            }
            let default_config = Config::default();
            self.save(&default_config)
                .context("Failed to save default config")?;
            return Ok(default_config);
        }

        let content =
            fs::read_to_string(config_path).map_err(|source| ConfigError::ReadError { source })?;
        let config: Config =
            toml::from_str(&content).map_err(|source| ConfigError::ParseError { source })?;
        config.validate()?;

        Ok(config)
    }

    pub fn save(&self, config: &Config) -> anyhow::Result<()> {
        let config_path = &self.options.config_path;

        if let Some(parent) = config_path.parent() {
            fs::create_dir_all(parent).map_err(|source| ConfigError::WriteError { source })?;
        }

        let content = toml::to_string_pretty(config)
            .map_err(|source| ConfigError::SerializeError { source })?;
        fs::write(config_path, content).map_err(|source| ConfigError::WriteError { source })?;

        Ok(())
    }
}

impl Default for ConfigManager {
    fn default() -> Self {
        Self::new()
    }
}

pub fn init_config_with_options(options: ConfigOptions) -> anyhow::Result<(ConfigManager, Config)> {
    let manager = ConfigManager::with_options(options);
    let config = manager.load()?;
    Ok((manager, config))
}

pub fn create_default_config<P: AsRef<Path>>(path: Option<P>) -> anyhow::Result<PathBuf> {
    let config_path = path
        .map(|p| p.as_ref().to_path_buf())
        .unwrap_or_else(ConfigOptions::default_config_path);

    let manager = ConfigManager::with_options(ConfigOptions {
        config_path: config_path.clone(),
        create_if_missing: true,
    });
    manager.save(&Config::default())?;

    Ok(config_path)
}
