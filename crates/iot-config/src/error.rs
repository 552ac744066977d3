use thiserror::Error;

#[derive(Error, Debug)]
pub enum ConfigError {
    #[error("file error: {0}")]
    File(#[from] std::io::Error),
    #[error("parse error: {0}")]
    Parse(#[from] toml::de::Error),
    #[error("invalid configuration: {0}")]
    Invalid(String),
}
