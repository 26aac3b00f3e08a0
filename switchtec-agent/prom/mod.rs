pub mod device;

pub use device::{DeviceMetricExporter, MrpcOutcome};
