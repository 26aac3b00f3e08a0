//! Byte layouts of the GAS blocks
//!
//! Field offsets are relative to the start of their block (see [`crate::gas`]
//! for block placement). All blocks are packed: offsets follow the chip's
//! register map byte for byte.

pub mod flash_info;
pub mod mrpc;
pub mod ntb;
pub mod part_cfg;
pub mod pff_csr;
pub mod sw_event;
pub mod sys_info;

/// Every event header is followed by its data words; slots are this many
/// bytes apart in the partition and PFF blocks
pub const EVENT_SLOT_SIZE: usize = 0x18;
