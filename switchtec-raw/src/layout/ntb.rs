//! NTB information registers at the start of the NTB block
//!
//! Only the partition identity fields are interpreted; the rest of the NTB
//! block is left to NTB-specific code.

pub const PARTITION_COUNT: usize = 0x00;
pub const PARTITION_ID: usize = 0x01;
pub const EP_MAP: usize = 0x04;
pub const REQUESTER_ID: usize = 0x0C;

pub const INFO_SIZE: usize = 0x0E;
