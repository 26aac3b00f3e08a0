use std::io;
use std::time::Duration;
use thiserror::Error;

use switchtec_raw::{GasError, Region};

#[derive(Error, Debug)]
pub enum SwitchtecError {
    #[error("Register access failed: {0}")]
    GasError(#[from] GasError),

    #[error("MRPC command failed: {0}")]
    MrpcError(#[from] MrpcError),

    #[error("{region:?} {index} is not owned by this partition")]
    NotLocal { region: Region, index: usize },

    #[error("PCI operation failed: {0}")]
    PciError(String),

    #[error("MMIO mapping failed: {0}")]
    MmioError(String),

    #[error("Configuration error: {0}")]
    ConfigError(String),

    #[error("IO error: {0}")]
    IoError(#[from] io::Error),

    #[error("Nix error: {0}")]
    NixError(#[from] nix::Error),

    #[error("Prometheus error: {0}")]
    PrometheusError(#[from] prometheus::Error),

    #[error("Parse error: {0}")]
    ParseError(String),
}

pub type Result<T> = std::result::Result<T, SwitchtecError>;

/// Outcome of an MRPC request that did not complete successfully
#[derive(Error, Debug, Clone, PartialEq, Eq)]
pub enum MrpcError {
    #[error("payload of {len} bytes exceeds the {max}-byte mailbox")]
    PayloadTooLarge { len: usize, max: usize },

    #[error("command 0x{cmd:X} failed: status 0x{status:X}, return code 0x{code:X}")]
    Hardware { cmd: u32, status: u32, code: u32 },

    #[error("command 0x{cmd:X} timed out after {timeout:?}")]
    Timeout { cmd: u32, timeout: Duration },

    #[error("request interrupted, device is not alive")]
    Interrupted,
}
