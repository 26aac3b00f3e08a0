//! Register window access primitives
//!
//! A [`GasWindow`] is a byte-addressed view of the GAS. Every access is bounds
//! checked against the window size; multi-byte values are little-endian, as
//! the chip stores them.

use parking_lot::RwLock;

use crate::gas::Region;

pub type Result<T> = std::result::Result<T, GasError>;

/// Errors raised by GAS addressing and register access
#[derive(Debug, Clone, PartialEq, Eq, thiserror::Error)]
pub enum GasError {
    #[error("{region:?} index {index} out of range (count {count})")]
    OutOfRange {
        region: Region,
        index: usize,
        count: usize,
    },

    #[error("{region:?} is not an indexed region")]
    NotIndexed { region: Region },

    #[error("Access of {len} bytes at offset 0x{offset:X} exceeds window size 0x{size:X}")]
    OutOfBounds {
        offset: usize,
        len: usize,
        size: usize,
    },
}

/// Byte-addressed access to the switch register window
///
/// Implementors provide the raw byte and 32-bit accessors; the narrower and
/// wider accessors are derived from [`read_bytes`](GasWindow::read_bytes) and
/// [`write_bytes`](GasWindow::write_bytes).
pub trait GasWindow: Send + Sync {
    /// Window length in bytes
    fn size(&self) -> usize;

    fn read32(&self, offset: usize) -> Result<u32>;

    fn write32(&self, offset: usize, value: u32) -> Result<()>;

    fn read_bytes(&self, offset: usize, buf: &mut [u8]) -> Result<()>;

    fn write_bytes(&self, offset: usize, data: &[u8]) -> Result<()>;

    fn read8(&self, offset: usize) -> Result<u8> {
        let mut buf = [0u8; 1];
        self.read_bytes(offset, &mut buf)?;
        Ok(buf[0])
    }

    fn read16(&self, offset: usize) -> Result<u16> {
        let mut buf = [0u8; 2];
        self.read_bytes(offset, &mut buf)?;
        Ok(u16::from_le_bytes(buf))
    }

    /// 64-bit registers are read as two 32-bit halves, low word first
    fn read64(&self, offset: usize) -> Result<u64> {
        let lo = self.read32(offset)? as u64;
        let hi = self.read32(offset + 4)? as u64;
        Ok(lo | (hi << 32))
    }

    fn write64(&self, offset: usize, value: u64) -> Result<()> {
        self.write32(offset, value as u32)?;
        self.write32(offset + 4, (value >> 32) as u32)
    }
}

/// Check that `len` bytes at `offset` fit in a window of `size` bytes
pub fn check_bounds(offset: usize, len: usize, size: usize) -> Result<()> {
    match offset.checked_add(len) {
        Some(end) if end <= size => Ok(()),
        _ => Err(GasError::OutOfBounds { offset, len, size }),
    }
}

/// In-memory register window
///
/// Plain memory semantics: every write lands as written. Used as the backing
/// store of simulated switches.
pub struct MemWindow {
    bytes: RwLock<Vec<u8>>,
}

impl MemWindow {
    /// Create a zero-filled window of `size` bytes
    pub fn new(size: usize) -> Self {
        Self {
            bytes: RwLock::new(vec![0u8; size]),
        }
    }
}

impl std::fmt::Debug for MemWindow {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("MemWindow")
            .field("size", &self.size())
            .finish()
    }
}

impl GasWindow for MemWindow {
    fn size(&self) -> usize {
        self.bytes.read().len()
    }

    fn read32(&self, offset: usize) -> Result<u32> {
        let mut buf = [0u8; 4];
        self.read_bytes(offset, &mut buf)?;
        Ok(u32::from_le_bytes(buf))
    }

    fn write32(&self, offset: usize, value: u32) -> Result<()> {
        self.write_bytes(offset, &value.to_le_bytes())
    }

    fn read_bytes(&self, offset: usize, buf: &mut [u8]) -> Result<()> {
        let bytes = self.bytes.read();
        check_bounds(offset, buf.len(), bytes.len())?;
        buf.copy_from_slice(&bytes[offset..offset + buf.len()]);
        Ok(())
    }

    fn write_bytes(&self, offset: usize, data: &[u8]) -> Result<()> {
        let mut bytes = self.bytes.write();
        check_bounds(offset, data.len(), bytes.len())?;
        bytes[offset..offset + data.len()].copy_from_slice(data);
        Ok(())
    }
}
