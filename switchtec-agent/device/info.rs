use serde::Serialize;

use switchtec_raw::gas::{self, Region};
use switchtec_raw::layout::{flash_info, sys_info};
use switchtec_raw::GasWindow;

use crate::error::Result;

/// Decoded system info block
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct SysInfo {
    pub device_id: u32,
    pub device_version: u32,
    pub firmware_version: u32,
    pub vendor_table_revision: u32,
    pub table_format_version: u32,
    pub partition_id: u32,
    pub cfg_file_fmt_version: u32,
    pub vendor_id: String,
    pub product_id: String,
    pub product_revision: String,
    pub component_vendor: String,
    pub component_id: u16,
    pub component_revision: u8,
}

impl SysInfo {
    pub fn read(window: &dyn GasWindow) -> Result<Self> {
        let base = gas::locate(Region::SysInfo)?.offset;
        let text = |offset: usize, len: usize| -> Result<String> {
            let mut buf = vec![0u8; len];
            window.read_bytes(base + offset, &mut buf)?;
            Ok(ascii_field(&buf))
        };

        Ok(Self {
            device_id: window.read32(base + sys_info::DEVICE_ID)?,
            device_version: window.read32(base + sys_info::DEVICE_VERSION)?,
            firmware_version: window.read32(base + sys_info::FIRMWARE_VERSION)?,
            vendor_table_revision: window.read32(base + sys_info::VENDOR_TABLE_REVISION)?,
            table_format_version: window.read32(base + sys_info::TABLE_FORMAT_VERSION)?,
            partition_id: window.read32(base + sys_info::PARTITION_ID)?,
            cfg_file_fmt_version: window.read32(base + sys_info::CFG_FILE_FMT_VERSION)?,
            vendor_id: text(sys_info::VENDOR_ID, sys_info::VENDOR_ID_LEN)?,
            product_id: text(sys_info::PRODUCT_ID, sys_info::PRODUCT_ID_LEN)?,
            product_revision: text(sys_info::PRODUCT_REVISION, sys_info::PRODUCT_REVISION_LEN)?,
            component_vendor: text(sys_info::COMPONENT_VENDOR, sys_info::COMPONENT_VENDOR_LEN)?,
            component_id: window.read16(base + sys_info::COMPONENT_ID)?,
            component_revision: window.read8(base + sys_info::COMPONENT_REVISION)?,
        })
    }

    /// Firmware version as `major.minor build`, the encoding the switch uses
    pub fn firmware_version_string(&self) -> String {
        let v = self.firmware_version;
        format!("{:X}.{:02X} B{:03X}", v >> 24, (v >> 16) & 0xFF, v & 0xFFFF)
    }
}

/// Fixed-width space/NUL padded ASCII field
fn ascii_field(raw: &[u8]) -> String {
    let end = raw.iter().position(|&b| b == 0).unwrap_or(raw.len());
    String::from_utf8_lossy(&raw[..end]).trim_end().to_string()
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
pub struct ImageDescriptor {
    pub address: u32,
    pub build_version: u32,
    pub build_string: u32,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
pub struct FlashPartition {
    pub address: u32,
    pub length: u32,
}

/// Decoded flash info block
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct FlashInfo {
    pub partition_map_update_index: u32,
    pub active_img: ImageDescriptor,
    pub active_cfg: ImageDescriptor,
    pub inactive_img: ImageDescriptor,
    pub inactive_cfg: ImageDescriptor,
    pub flash_length: u32,
    pub cfg0: FlashPartition,
    pub cfg1: FlashPartition,
    pub img0: FlashPartition,
    pub img1: FlashPartition,
    pub nvlog: FlashPartition,
    pub vendor: Vec<FlashPartition>,
}

impl FlashInfo {
    pub fn read(window: &dyn GasWindow) -> Result<Self> {
        let base = gas::locate(Region::FlashInfo)?.offset;
        let image = |offset: usize| -> Result<ImageDescriptor> {
            let at = base + offset;
            Ok(ImageDescriptor {
                address: window.read32(at)?,
                build_version: window.read32(at + 4)?,
                build_string: window.read32(at + 8)?,
            })
        };
        let partition = |offset: usize| -> Result<FlashPartition> {
            Ok(FlashPartition {
                address: window.read32(base + offset)?,
                length: window.read32(base + offset + 4)?,
            })
        };

        let vendor = (0..flash_info::VENDOR_PARTITION_COUNT)
            .map(|i| partition(flash_info::VENDOR + i * flash_info::PARTITION_DESC_SIZE))
            .collect::<Result<Vec<_>>>()?;

        Ok(Self {
            partition_map_update_index: window.read32(base + flash_info::FLASH_PART_MAP_UPD_IDX)?,
            active_img: image(flash_info::ACTIVE_IMG)?,
            active_cfg: image(flash_info::ACTIVE_CFG)?,
            inactive_img: image(flash_info::INACTIVE_IMG)?,
            inactive_cfg: image(flash_info::INACTIVE_CFG)?,
            flash_length: window.read32(base + flash_info::FLASH_LENGTH)?,
            cfg0: partition(flash_info::CFG0)?,
            cfg1: partition(flash_info::CFG1)?,
            img0: partition(flash_info::IMG0)?,
            img1: partition(flash_info::IMG1)?,
            nvlog: partition(flash_info::NVLOG)?,
            vendor,
        })
    }
}
