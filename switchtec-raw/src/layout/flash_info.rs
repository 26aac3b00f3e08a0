//! Flash information block
//!
//! Image descriptors are `{address, build_version, build_string}`, partition
//! descriptors are `{address, length}`; all fields are 32-bit.

pub const FLASH_PART_MAP_UPD_IDX: usize = 0x00;
pub const ACTIVE_IMG: usize = 0x04;
pub const ACTIVE_CFG: usize = 0x10;
pub const INACTIVE_IMG: usize = 0x1C;
pub const INACTIVE_CFG: usize = 0x28;
pub const FLASH_LENGTH: usize = 0x34;
pub const CFG0: usize = 0x38;
pub const CFG1: usize = 0x40;
pub const IMG0: usize = 0x48;
pub const IMG1: usize = 0x50;
pub const NVLOG: usize = 0x58;
pub const VENDOR: usize = 0x60;

pub const IMAGE_DESC_SIZE: usize = 12;
pub const PARTITION_DESC_SIZE: usize = 8;
pub const VENDOR_PARTITION_COUNT: usize = 8;

pub const SIZE: usize = 0xA0;
