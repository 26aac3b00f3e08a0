//! Switch-wide (global) event block

pub const EVENT_REPORT_CTRL: usize = 0x00;
/// 64-bit bitmap, one bit per partition with pending events
pub const PART_EVENT_BITMAP: usize = 0x10;
pub const GLOBAL_SUMMARY: usize = 0x20;

pub const STACK_ERROR_HDR: usize = 0x30;
pub const PPU_ERROR_HDR: usize = 0x48;
pub const ISP_ERROR_HDR: usize = 0x60;
pub const SYS_RESET_HDR: usize = 0x78;
pub const FW_EXCEPTION_HDR: usize = 0x90;
pub const FW_NMI_HDR: usize = 0xA8;
pub const FW_NON_FATAL_HDR: usize = 0xC0;
pub const FW_FATAL_HDR: usize = 0xD8;
pub const TWI_MRPC_COMP_HDR: usize = 0xF0;
pub const TWI_MRPC_COMP_ASYNC_HDR: usize = 0x108;
pub const CLI_MRPC_COMP_HDR: usize = 0x120;
pub const CLI_MRPC_COMP_ASYNC_HDR: usize = 0x138;
pub const GPIO_INTERRUPT_HDR: usize = 0x150;

pub const SIZE: usize = 0x168;
