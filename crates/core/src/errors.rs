use std::path::PathBuf;

use thiserror::Error;

/// Rejected configuration. Raised before any controller is created.
#[derive(Debug, Error)]
#[non_exhaustive]
pub enum ConfigError {
    #[error("{field} = {value} is outside [{min}, {max}]")]
    OutOfRange {
        field: &'static str,
        value: u64,
        min: u64,
        max: u64,
    },
    #[error("{field} must be non-zero")]
    ZeroDivisor { field: &'static str },
    #[error("plasticity must satisfy floor <= base <= ceiling (got {floor} / {base} / {ceiling})")]
    PlasticityOrder { floor: u16, base: u16, ceiling: u16 },
    #[error("unknown congestion control algorithm: {0}")]
    UnknownAlgorithm(String),
    #[error("unknown precision profile: {0}")]
    UnknownPrecision(String),
    #[error("failed to read config file {path}")]
    Read {
        path: PathBuf,
        #[source]
        source: std::io::Error,
    },
    #[error("failed to parse config file {path}")]
    Parse {
        path: PathBuf,
        #[source]
        source: Box<toml::de::Error>,
    },
}

/// Malformed or unreadable event trace.
#[derive(Debug, Error)]
pub enum TraceError {
    #[error(transparent)]
    Io(#[from] std::io::Error),
    #[error("line {line}: {source}")]
    Malformed {
        line: usize,
        #[source]
        source: serde_json::Error,
    },
}
