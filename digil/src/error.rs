//! High-level error types

pub type Result<T> = std::result::Result<T, Error>;

#[derive(Debug, thiserror::Error)]
pub enum Error {
    #[error("Core error: {0}")]
    Core(#[from] digil_core::Error),

    #[error("Transport error: {0}")]
    Transport(#[from] digil_transport::Error),

    #[error("Type error: {0}")]
    Types(#[from] digil_types::Error),

    #[error("CSV error: {0}")]
    Csv(#[from] csv::Error),

    #[error("I/O error: {0}")]
    Io(#[from] std::io::Error),

    #[error("Invalid configuration file: {0}")]
    Toml(#[from] toml::de::Error),

    #[error("Configuration error: {0}")]
    Config(String),

    /// Required input column not found
    #[error("Missing column '{0}' in input file")]
    MissingColumn(String),
}
