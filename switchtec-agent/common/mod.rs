pub mod mmio;
pub mod pci;

pub use mmio::MappedWindow;
pub use pci::{EndpointKind, PciAddress, SwitchEndpoint};
