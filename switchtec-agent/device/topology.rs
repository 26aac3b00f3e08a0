// Partition / port-function ownership
//
// Each partition config block lists the PFF instances bound to it (upstream,
// virtual endpoint, downstream ports). Ownership moves on dynamic partition
// binding, so the whole view is re-read and replaced rather than patched.

use switchtec_raw::gas::{self, MAX_PARTITIONS, MAX_PFF_CSR};
use switchtec_raw::layout::{ntb, part_cfg, pff_csr};
use switchtec_raw::{GasError, GasWindow, Region, MICROSEMI_VENDOR_ID};

use crate::error::{Result, SwitchtecError};

/// Set of PFF indices (`< MAX_PFF_CSR`)
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Default)]
pub struct PffSet(u64);

impl PffSet {
    pub const fn empty() -> Self {
        Self(0)
    }

    pub fn bits(&self) -> u64 {
        self.0
    }

    pub fn contains(&self, pff: usize) -> bool {
        pff < MAX_PFF_CSR && self.0 & (1u64 << pff) != 0
    }

    pub fn insert(&mut self, pff: usize) -> bool {
        if pff >= MAX_PFF_CSR {
            return false;
        }
        let fresh = !self.contains(pff);
        self.0 |= 1u64 << pff;
        fresh
    }

    pub fn len(&self) -> usize {
        self.0.count_ones() as usize
    }

    pub fn is_empty(&self) -> bool {
        self.0 == 0
    }

    pub fn iter(&self) -> impl Iterator<Item = usize> + '_ {
        (0..MAX_PFF_CSR).filter(|&pff| self.contains(pff))
    }
}

impl FromIterator<usize> for PffSet {
    fn from_iter<I: IntoIterator<Item = usize>>(iter: I) -> Self {
        let mut set = Self::empty();
        for pff in iter {
            set.insert(pff);
        }
        set
    }
}

/// Identity of the partition this driver instance manages
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct AttachInfo {
    pub partition: usize,
    pub partition_count: usize,
    pub pff_count: usize,
}

impl AttachInfo {
    pub fn validate(&self) -> Result<()> {
        if self.partition_count == 0 || self.partition_count > MAX_PARTITIONS {
            return Err(SwitchtecError::ConfigError(format!(
                "Partition count {} outside 1..={}",
                self.partition_count, MAX_PARTITIONS
            )));
        }
        if self.partition >= self.partition_count {
            return Err(GasError::OutOfRange {
                region: Region::PartCfg,
                index: self.partition,
                count: self.partition_count,
            }
            .into());
        }
        if self.pff_count > MAX_PFF_CSR {
            return Err(SwitchtecError::ConfigError(format!(
                "PFF count {} exceeds {}",
                self.pff_count, MAX_PFF_CSR
            )));
        }
        Ok(())
    }

    /// Read partition identity from the NTB info block and count PFF CSR
    /// blocks carrying the Microsemi vendor id
    pub fn probe(window: &dyn GasWindow) -> Result<Self> {
        let ntb_base = gas::locate(Region::Ntb)?.offset;
        let partition_count = window.read8(ntb_base + ntb::PARTITION_COUNT)? as usize;
        let partition = window.read8(ntb_base + ntb::PARTITION_ID)? as usize;

        let mut pff_count = 0;
        while pff_count < MAX_PFF_CSR {
            let base = gas::pff_csr(pff_count)?.offset;
            if window.read16(base + pff_csr::VENDOR_ID)? != MICROSEMI_VENDOR_ID {
                break;
            }
            pff_count += 1;
        }

        let info = Self {
            partition,
            partition_count,
            pff_count,
        };
        tracing::info!(
            "Probed partition {} of {}, {} PFF CSR blocks",
            partition,
            partition_count,
            pff_count
        );
        info.validate()?;
        Ok(info)
    }
}

/// Ownership of PFFs by partitions, as read from the partition config blocks
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Topology {
    info: AttachInfo,
    claims: Vec<PffSet>,
}

impl Topology {
    /// Build a topology from explicit per-partition claims
    pub fn from_claims(info: AttachInfo, claims: Vec<PffSet>) -> Result<Self> {
        info.validate()?;
        if claims.len() != info.partition_count {
            return Err(SwitchtecError::ConfigError(format!(
                "Expected claims for {} partitions, got {}",
                info.partition_count,
                claims.len()
            )));
        }
        Ok(Self { info, claims })
    }

    /// Read every partition's PFF instance ids
    pub fn read(window: &dyn GasWindow, info: AttachInfo) -> Result<Self> {
        info.validate()?;

        let mut claims = Vec::with_capacity(info.partition_count);
        for partition in 0..info.partition_count {
            let base = gas::part_cfg(partition)?.offset;
            let mut set = PffSet::empty();

            let mut claim = |reg: u32| {
                let pff = reg as usize;
                if pff < info.pff_count {
                    set.insert(pff);
                }
            };

            claim(window.read32(base + part_cfg::USP_PFF_INST_ID)?);
            claim(window.read32(base + part_cfg::VEP_PFF_INST_ID)?);
            for slot in 0..part_cfg::DSP_PFF_INST_COUNT {
                claim(window.read32(base + part_cfg::dsp_pff_inst_id(slot))?);
            }

            tracing::debug!("Partition {} owns PFFs {:?}", partition, set.iter().collect::<Vec<_>>());
            claims.push(set);
        }

        Ok(Self { info, claims })
    }

    pub fn info(&self) -> AttachInfo {
        self.info
    }

    pub fn partition(&self) -> usize {
        self.info.partition
    }

    pub fn partition_count(&self) -> usize {
        self.info.partition_count
    }

    pub fn pff_count(&self) -> usize {
        self.info.pff_count
    }

    /// PFFs local to this driver's partition
    pub fn local(&self) -> PffSet {
        self.claims[self.info.partition]
    }

    /// PFFs bound to `partition` (empty when out of range)
    pub fn claims(&self, partition: usize) -> PffSet {
        self.claims.get(partition).copied().unwrap_or_default()
    }

    /// First partition claiming `pff`
    pub fn owner_of(&self, pff: usize) -> Option<usize> {
        self.claims.iter().position(|set| set.contains(pff))
    }

    pub fn check_partition(&self, partition: usize) -> Result<()> {
        if partition >= self.info.partition_count {
            return Err(GasError::OutOfRange {
                region: Region::PartCfg,
                index: partition,
                count: self.info.partition_count,
            }
            .into());
        }
        Ok(())
    }

    pub fn check_pff(&self, pff: usize) -> Result<()> {
        if pff >= self.info.pff_count {
            return Err(GasError::OutOfRange {
                region: Region::PffCsr,
                index: pff,
                count: self.info.pff_count,
            }
            .into());
        }
        Ok(())
    }
}
