use nix::sys::mman::{mmap, munmap, MapFlags, ProtFlags};
use std::fs::OpenOptions;
use std::num::NonZeroUsize;
use std::os::unix::fs::OpenOptionsExt;
use std::path::Path;
use std::ptr::NonNull;

use switchtec_raw::gas::GAS_SIZE;
use switchtec_raw::window::check_bounds;
use switchtec_raw::GasWindow;

use crate::error::{Result, SwitchtecError};

/// GAS mapped from a PCI BAR resource file
pub struct MappedWindow {
    base: NonNull<u8>,
    len: usize,
}

// The mapping is plain device memory; all access goes through volatile reads
// and writes and the MRPC lock orders mailbox traffic.
unsafe impl Send for MappedWindow {}
unsafe impl Sync for MappedWindow {}

impl MappedWindow {
    pub fn open(path: &Path) -> Result<Self> {
        let file = OpenOptions::new()
            .read(true)
            .write(true)
            .custom_flags(libc::O_SYNC)
            .open(path)
            .map_err(|e| {
                SwitchtecError::MmioError(format!("Failed to open {}: {}", path.display(), e))
            })?;

        let len = file.metadata()?.len() as usize;
        if len < GAS_SIZE {
            return Err(SwitchtecError::MmioError(format!(
                "{} is 0x{:X} bytes, the GAS needs 0x{:X}",
                path.display(),
                len,
                GAS_SIZE
            )));
        }
        let length = NonZeroUsize::new(len)
            .ok_or_else(|| SwitchtecError::MmioError(format!("{} is empty", path.display())))?;

        let ptr = unsafe {
            mmap(
                None,
                length,
                ProtFlags::PROT_READ | ProtFlags::PROT_WRITE,
                MapFlags::MAP_SHARED,
                Some(&file),
                0,
            )?
        };
        let base = NonNull::new(ptr as *mut u8)
            .ok_or_else(|| SwitchtecError::MmioError("mmap returned null".to_string()))?;

        tracing::info!("Mapped {} (0x{:X} bytes)", path.display(), len);
        Ok(Self { base, len })
    }

    fn ptr(&self, offset: usize) -> *mut u8 {
        // Offsets are bounds-checked by every caller
        unsafe { self.base.as_ptr().add(offset) }
    }
}

impl GasWindow for MappedWindow {
    fn size(&self) -> usize {
        self.len
    }

    fn read32(&self, offset: usize) -> switchtec_raw::Result<u32> {
        check_bounds(offset, 4, self.len)?;
        if offset % 4 != 0 {
            let mut buf = [0u8; 4];
            self.read_bytes(offset, &mut buf)?;
            return Ok(u32::from_le_bytes(buf));
        }
        let value = unsafe { std::ptr::read_volatile(self.ptr(offset) as *const u32) };
        Ok(u32::from_le(value))
    }

    fn write32(&self, offset: usize, value: u32) -> switchtec_raw::Result<()> {
        check_bounds(offset, 4, self.len)?;
        if offset % 4 != 0 {
            return self.write_bytes(offset, &value.to_le_bytes());
        }
        unsafe { std::ptr::write_volatile(self.ptr(offset) as *mut u32, value.to_le()) };
        Ok(())
    }

    fn read_bytes(&self, offset: usize, buf: &mut [u8]) -> switchtec_raw::Result<()> {
        check_bounds(offset, buf.len(), self.len)?;
        for (i, byte) in buf.iter_mut().enumerate() {
            *byte = unsafe { std::ptr::read_volatile(self.ptr(offset + i)) };
        }
        Ok(())
    }

    fn write_bytes(&self, offset: usize, data: &[u8]) -> switchtec_raw::Result<()> {
        check_bounds(offset, data.len(), self.len)?;
        for (i, byte) in data.iter().enumerate() {
            unsafe { std::ptr::write_volatile(self.ptr(offset + i), *byte) };
        }
        Ok(())
    }
}

impl Drop for MappedWindow {
    fn drop(&mut self) {
        let result = unsafe { munmap(self.base.as_ptr() as *mut libc::c_void, self.len) };
        if let Err(e) = result {
            tracing::error!("munmap failed: {}", e);
        }
    }
}
