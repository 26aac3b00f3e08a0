//! Global address space (GAS) region map
//!
//! The GAS is laid out as a fixed sequence of blocks. Two of them are arrays:
//! the per-partition configuration blocks and the per-port-function (PFF) CSR
//! blocks, each indexed by an integer id.
//!
//! | Offset     | Region      | Size / stride           |
//! |------------|-------------|-------------------------|
//! | `0x000000` | MRPC        | `0x80C`                 |
//! | `0x001000` | Top config  | `0x800`                 |
//! | `0x001800` | SW events   | `0x168`                 |
//! | `0x002000` | System info | `0x12F`                 |
//! | `0x002200` | Flash info  | `0xA0`                  |
//! | `0x004000` | Part config | 48 x `0x400`            |
//! | `0x010000` | NTB         | `0x124000`              |
//! | `0x134000` | PFF CSR     | 48 x `0x1000`           |

use crate::layout::{flash_info, mrpc, part_cfg, pff_csr, sw_event, sys_info};
use crate::window::{GasError, Result};

pub const MRPC_OFFSET: usize = 0x0000;
pub const TOP_CFG_OFFSET: usize = 0x1000;
pub const SW_EVENT_OFFSET: usize = 0x1800;
pub const SYS_INFO_OFFSET: usize = 0x2000;
pub const FLASH_INFO_OFFSET: usize = 0x2200;
pub const PART_CFG_OFFSET: usize = 0x4000;
pub const NTB_OFFSET: usize = 0x10000;
pub const PFF_CSR_OFFSET: usize = 0x134000;

/// Size of the top configuration block (up to the event block)
pub const TOP_CFG_SIZE: usize = SW_EVENT_OFFSET - TOP_CFG_OFFSET;

/// Size of the NTB block (up to the PFF CSR array)
pub const NTB_SIZE: usize = PFF_CSR_OFFSET - NTB_OFFSET;

/// Maximum number of partitions (the partition config array fills the space
/// up to the NTB block)
pub const MAX_PARTITIONS: usize = (NTB_OFFSET - PART_CFG_OFFSET) / part_cfg::SIZE;

/// Maximum number of PFF CSR blocks
pub const MAX_PFF_CSR: usize = 48;

/// Total GAS length covered by the map
pub const GAS_SIZE: usize = PFF_CSR_OFFSET + MAX_PFF_CSR * pff_csr::SIZE;

/// Named GAS regions
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum Region {
    Mrpc,
    TopCfg,
    SwEvent,
    SysInfo,
    FlashInfo,
    PartCfg,
    Ntb,
    PffCsr,
}

impl Region {
    pub const ALL: [Region; 8] = [
        Region::Mrpc,
        Region::TopCfg,
        Region::SwEvent,
        Region::SysInfo,
        Region::FlashInfo,
        Region::PartCfg,
        Region::Ntb,
        Region::PffCsr,
    ];

    pub fn name(&self) -> &'static str {
        match self {
            Region::Mrpc => "mrpc",
            Region::TopCfg => "top_cfg",
            Region::SwEvent => "sw_event",
            Region::SysInfo => "sys_info",
            Region::FlashInfo => "flash_info",
            Region::PartCfg => "part_cfg",
            Region::Ntb => "ntb",
            Region::PffCsr => "pff_csr",
        }
    }

    pub fn is_indexed(&self) -> bool {
        self.entry().count > 1
    }

    /// Number of elements (1 for plain regions)
    pub fn count(&self) -> usize {
        self.entry().count
    }

    fn entry(&self) -> &'static RegionEntry {
        &REGION_TABLE[*self as usize]
    }
}

/// A byte range within the GAS
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct RegionSpan {
    pub offset: usize,
    pub size: usize,
}

impl RegionSpan {
    pub fn end(&self) -> usize {
        self.offset + self.size
    }

    /// Absolute offset of a field at `field` bytes into the span
    pub fn at(&self, field: usize) -> usize {
        debug_assert!(field < self.size, "field 0x{field:X} beyond span");
        self.offset + field
    }

    pub fn overlaps(&self, other: &RegionSpan) -> bool {
        self.offset < other.end() && other.offset < self.end()
    }
}

struct RegionEntry {
    offset: usize,
    stride: usize,
    count: usize,
}

// Indexed by `Region as usize`
static REGION_TABLE: [RegionEntry; 8] = [
    RegionEntry {
        offset: MRPC_OFFSET,
        stride: mrpc::SIZE,
        count: 1,
    },
    RegionEntry {
        offset: TOP_CFG_OFFSET,
        stride: TOP_CFG_SIZE,
        count: 1,
    },
    RegionEntry {
        offset: SW_EVENT_OFFSET,
        stride: sw_event::SIZE,
        count: 1,
    },
    RegionEntry {
        offset: SYS_INFO_OFFSET,
        stride: sys_info::SIZE,
        count: 1,
    },
    RegionEntry {
        offset: FLASH_INFO_OFFSET,
        stride: flash_info::SIZE,
        count: 1,
    },
    RegionEntry {
        offset: PART_CFG_OFFSET,
        stride: part_cfg::SIZE,
        count: MAX_PARTITIONS,
    },
    RegionEntry {
        offset: NTB_OFFSET,
        stride: NTB_SIZE,
        count: 1,
    },
    RegionEntry {
        offset: PFF_CSR_OFFSET,
        stride: pff_csr::SIZE,
        count: MAX_PFF_CSR,
    },
];

/// Locate a region; indexed regions yield the span of the whole array
pub fn locate(region: Region) -> Result<RegionSpan> {
    let entry = region.entry();
    Ok(RegionSpan {
        offset: entry.offset,
        size: entry.stride * entry.count,
    })
}

/// Locate element `index` of an indexed region
pub fn locate_indexed(region: Region, index: usize) -> Result<RegionSpan> {
    let entry = region.entry();
    if entry.count <= 1 {
        return Err(GasError::NotIndexed { region });
    }
    if index >= entry.count {
        return Err(GasError::OutOfRange {
            region,
            index,
            count: entry.count,
        });
    }
    Ok(RegionSpan {
        offset: entry.offset + index * entry.stride,
        size: entry.stride,
    })
}

/// Span of partition config block `partition`
pub fn part_cfg(partition: usize) -> Result<RegionSpan> {
    locate_indexed(Region::PartCfg, partition)
}

/// Span of PFF CSR block `pff`
pub fn pff_csr(pff: usize) -> Result<RegionSpan> {
    locate_indexed(Region::PffCsr, pff)
}
