//! # switchtec-raw
//!
//! Register definitions for Microsemi Switchtec PCIe fabric switches.
//!
//! Every management structure of the chip lives in one contiguous memory-mapped
//! window, the global address space (GAS). This crate describes that window:
//! where each block sits, the byte layout of the blocks, the MRPC mailbox
//! status codes and the event header bits. It performs no OS I/O of its own;
//! register traffic goes through the [`GasWindow`] trait, which the agent crate
//! implements over a mapped BAR and which [`MemWindow`] implements in memory.
//!
//! ## Usage
//!
//! ```
//! use switchtec_raw::gas::{self, Region};
//! use switchtec_raw::layout::mrpc;
//!
//! let span = gas::locate(Region::Mrpc)?;
//! assert_eq!(span.at(mrpc::CMD), 0x800);
//!
//! let pff = gas::locate_indexed(Region::PffCsr, 5)?;
//! assert_eq!(pff.offset, 0x139000);
//! # Ok::<(), switchtec_raw::GasError>(())
//! ```

pub mod event;
pub mod gas;
pub mod layout;
pub mod register;
pub mod window;

pub use event::{EventFlags, EventHeader, EventKind, EventScope, EventSummary};
pub use gas::{Region, RegionSpan};
pub use register::{Register, RegisterLayout};
pub use window::{GasError, GasWindow, MemWindow, Result};

/// PCI vendor id of Microsemi (Switchtec) devices
pub const MICROSEMI_VENDOR_ID: u16 = 0x11f8;

/// PCI class code of the NTB endpoint
pub const MICROSEMI_NTB_CLASSCODE: u32 = 0x068000;

/// PCI class code of the management endpoint
pub const MICROSEMI_MGMT_CLASSCODE: u32 = 0x058000;
