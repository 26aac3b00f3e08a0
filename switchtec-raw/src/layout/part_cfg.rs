//! Per-partition configuration block

pub const STATUS: usize = 0x000;
pub const STATE: usize = 0x004;
pub const PORT_CNT: usize = 0x008;
pub const USP_PORT_MODE: usize = 0x00C;
pub const USP_PFF_INST_ID: usize = 0x010;
pub const VEP_PFF_INST_ID: usize = 0x014;
pub const DSP_PFF_INST_ID: usize = 0x018;
pub const VEP_VECTOR_NUMBER: usize = 0x100;
pub const USP_VECTOR_NUMBER: usize = 0x102;
pub const PORT_EVENT_BITMAP: usize = 0x104;
pub const PART_EVENT_SUMMARY: usize = 0x114;

pub const PART_RESET_HDR: usize = 0x124;
pub const MRPC_COMP_HDR: usize = 0x13C;
pub const MRPC_COMP_ASYNC_HDR: usize = 0x154;
pub const DYN_BINDING_HDR: usize = 0x16C;

/// Number of downstream PFF instance id slots
pub const DSP_PFF_INST_COUNT: usize = 47;

pub const SIZE: usize = 0x400;

/// Bits of the partition event summary register
pub mod summary {
    pub const RESET: u32 = 1 << 0;
    pub const MRPC_CMP: u32 = 1 << 1;
    pub const MRPC_ASYNC_CMP: u32 = 1 << 2;
    pub const DYN_PART_CMP: u32 = 1 << 3;
}

/// Offset of downstream PFF instance id slot `slot`
pub fn dsp_pff_inst_id(slot: usize) -> usize {
    debug_assert!(slot < DSP_PFF_INST_COUNT);
    DSP_PFF_INST_ID + slot * 4
}
