use std::io;
use thiserror::Error;

#[derive(Error, Debug)]
pub enum FmePerfError {
    #[error("Event not found: {0}")]
    NotFound(String),

    #[error("Invalid argument: {0}")]
    InvalidArgument(String),

    #[error("Device busy: {0}")]
    Busy(String),

    #[error("Device attach failed: {0}")]
    AttachError(String),

    #[error("PCI operation failed: {0}")]
    PciError(String),

    #[error("MMIO operation failed: {0}")]
    MmioError(#[from] fmeperf_raw::MmioError),

    #[error("Affinity operation failed: {0}")]
    AffinityError(String),

    #[error("Configuration error: {0}")]
    ConfigError(String),

    #[error("IO error: {0}")]
    IoError(#[from] io::Error),

    #[error("Nix error: {0}")]
    NixError(#[from] nix::Error),

    #[error("Prometheus error: {0}")]
    PrometheusError(#[from] prometheus::Error),

    #[error("Serialization error: {0}")]
    SerializationError(#[from] serde_json::Error),
}

pub type Result<T> = std::result::Result<T, FmePerfError>;
