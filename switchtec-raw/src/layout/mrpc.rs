//! MRPC mailbox block
//!
//! ```text
//! 0x000  input_data[1024]
//! 0x400  output_data[1024]
//! 0x800  cmd        (write starts execution)
//! 0x804  status
//! 0x808  ret_value
//! ```

/// Maximum MRPC input or output payload in bytes
pub const PAYLOAD_SIZE: usize = 1024;

pub const INPUT_DATA: usize = 0x000;
pub const OUTPUT_DATA: usize = 0x400;
pub const CMD: usize = 0x800;
pub const STATUS: usize = 0x804;
pub const RET_VALUE: usize = 0x808;

pub const SIZE: usize = 0x80C;

/// Mailbox status register values
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum MrpcStatus {
    InProgress,
    Done,
    Error,
    /// Driver-side fault code; hardware-reported values are at most 0xFF
    Interrupted,
    Other(u32),
}

impl MrpcStatus {
    pub const IN_PROGRESS: u32 = 1;
    pub const DONE: u32 = 2;
    pub const ERROR: u32 = 0xFF;
    pub const INTERRUPTED: u32 = 0x100;

    pub fn from_raw(value: u32) -> Self {
        match value {
            Self::IN_PROGRESS => MrpcStatus::InProgress,
            Self::DONE => MrpcStatus::Done,
            Self::ERROR => MrpcStatus::Error,
            Self::INTERRUPTED => MrpcStatus::Interrupted,
            other => MrpcStatus::Other(other),
        }
    }

    pub fn raw(&self) -> u32 {
        match self {
            MrpcStatus::InProgress => Self::IN_PROGRESS,
            MrpcStatus::Done => Self::DONE,
            MrpcStatus::Error => Self::ERROR,
            MrpcStatus::Interrupted => Self::INTERRUPTED,
            MrpcStatus::Other(value) => *value,
        }
    }

    pub fn is_in_progress(&self) -> bool {
        matches!(self, MrpcStatus::InProgress)
    }
}
