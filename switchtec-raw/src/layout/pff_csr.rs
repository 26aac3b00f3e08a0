//! Per-port-function CSR block

pub const VENDOR_ID: usize = 0x000;
pub const DEVICE_ID: usize = 0x002;
pub const PCI_CFG_HEADER: usize = 0x004;
pub const PCI_CAP_REGION: usize = 0x040;
pub const PCIE_CAP_REGION: usize = 0x100;
pub const INDIRECT_GAS_WINDOW: usize = 0x800;
pub const INDIRECT_GAS_WINDOW_OFF: usize = 0xA00;
pub const PFF_EVENT_SUMMARY: usize = 0xC00;

pub const AER_IN_P2P_HDR: usize = 0xC10;
pub const AER_IN_VEP_HDR: usize = 0xC28;
pub const DPC_HDR: usize = 0xC40;
pub const CTS_HDR: usize = 0xC58;
// 0xC70: reserved slot
pub const HOTPLUG_HDR: usize = 0xC88;
pub const IER_HDR: usize = 0xCA0;
pub const THRESHOLD_HDR: usize = 0xCB8;
pub const POWER_MGMT_HDR: usize = 0xCD0;
pub const TLP_THROTTLING_HDR: usize = 0xCE8;
pub const FORCE_SPEED_HDR: usize = 0xD00;
pub const CREDIT_TIMEOUT_HDR: usize = 0xD18;
pub const LINK_STATE_HDR: usize = 0xD30;

pub const SIZE: usize = 0x1000;
