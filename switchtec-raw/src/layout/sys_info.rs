//! System information block

pub const DEVICE_ID: usize = 0x000;
pub const DEVICE_VERSION: usize = 0x004;
pub const FIRMWARE_VERSION: usize = 0x008;
pub const VENDOR_TABLE_REVISION: usize = 0x010;
pub const TABLE_FORMAT_VERSION: usize = 0x014;
pub const PARTITION_ID: usize = 0x018;
pub const CFG_FILE_FMT_VERSION: usize = 0x01C;
pub const VENDOR_ID: usize = 0x108;
pub const PRODUCT_ID: usize = 0x110;
pub const PRODUCT_REVISION: usize = 0x120;
pub const COMPONENT_VENDOR: usize = 0x124;
pub const COMPONENT_ID: usize = 0x12C;
pub const COMPONENT_REVISION: usize = 0x12E;

pub const VENDOR_ID_LEN: usize = 8;
pub const PRODUCT_ID_LEN: usize = 16;
pub const PRODUCT_REVISION_LEN: usize = 4;
pub const COMPONENT_VENDOR_LEN: usize = 8;

pub const SIZE: usize = 0x12F;
