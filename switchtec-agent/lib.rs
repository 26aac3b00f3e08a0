// Macros (must be first for visibility)
#[macro_use]
pub mod macros;

pub mod common;
pub mod config;
pub mod device;
pub mod error;
pub mod events;
pub mod mrpc;
pub mod orchestrator;
pub mod prom;

#[cfg(test)]
pub(crate) mod testing;

pub use config::{DeviceConfig, ServeConfig};
pub use device::{AttachInfo, DeathReason, Device, PffSet, Topology};
pub use error::{MrpcError, Result, SwitchtecError};
pub use events::{EventDirectory, EventIndex, EventSource, SummaryScope};
pub use mrpc::{MrpcChannel, RequestHandle};
pub use orchestrator::EventPoller;
pub use prom::DeviceMetricExporter;
