use crate::error::ConfigError;
use crate::model::RawConfig;
use clap::Parser;
use std::path::{Path, PathBuf};

/// Shared CLI surface for the device and worker binaries: `--config
/// <path>`, defaulting to `config.toml`.
#[derive(Debug, Parser)]
pub struct CliArgs {
    #[arg(long, env = "IOT_CONFIG", default_value = "config.toml")]
    pub config: PathBuf,
}

/// The multi-device runner additionally accepts `--num-devices`.
#[derive(Debug, Parser)]
pub struct MultiDeviceCliArgs {
    #[command(flatten)]
    pub base: CliArgs,

    #[arg(long, env = "IOT_NUM_DEVICES", default_value_t = 10)]
    pub num_devices: usize,
}

pub struct Config {
    pub raw: RawConfig,
}

impl Config {
    pub fn load_from_path(path: &Path) -> Result<Self, ConfigError> {
        let text = std::fs::read_to_string(path)?;
        let raw: RawConfig = toml::from_str(&text)?;
        raw.validate()?;
        Ok(Self { raw })
    }

    /// Parses CLI args (with env-var fallback) and loads/validates the
    /// referenced config file.
    pub fn from_args<I, T>(args: I) -> Result<Self, ConfigError>
    where
        I: IntoIterator<Item = T>,
        T: Into<std::ffi::OsString> + Clone,
    {
        let cli = CliArgs::parse_from(args);
        Self::load_from_path(&cli.config)
    }
}
