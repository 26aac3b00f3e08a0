use once_cell::sync::Lazy;
use std::fmt;
use std::fs;
use std::path::{Path, PathBuf};
use std::str::FromStr;

use switchtec_raw::{MICROSEMI_MGMT_CLASSCODE, MICROSEMI_NTB_CLASSCODE, MICROSEMI_VENDOR_ID};

use crate::error::{Result, SwitchtecError};

static SYSFS_PCI_DEVICES: Lazy<PathBuf> = Lazy::new(|| {
    if let Ok(root) = std::env::var("SWITCHTEC_SYSFS_ROOT") {
        PathBuf::from(root)
    } else if std::env::var("DOCKER_RUNNING").is_ok() {
        PathBuf::from("/host/sys/bus/pci/devices")
    } else {
        PathBuf::from("/sys/bus/pci/devices")
    }
});

/// PCI function address, `dddd:bb:dd.f`
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub struct PciAddress {
    pub domain: u32,
    pub bus: u8,
    pub device: u8,
    pub function: u8,
}

impl fmt::Display for PciAddress {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(
            f,
            "{:04x}:{:02x}:{:02x}.{}",
            self.domain, self.bus, self.device, self.function
        )
    }
}

impl FromStr for PciAddress {
    type Err = SwitchtecError;

    /// Accepts `dddd:bb:dd.f` and the short `bb:dd.f` form
    fn from_str(s: &str) -> Result<Self> {
        let bad = || SwitchtecError::ParseError(format!("Invalid PCI address: {s}"));

        let (rest, function) = s.rsplit_once('.').ok_or_else(bad)?;
        let parts: Vec<&str> = rest.split(':').collect();
        let (domain, bus, device) = match parts.as_slice() {
            [domain, bus, device] => (*domain, *bus, *device),
            [bus, device] => ("0", *bus, *device),
            _ => return Err(bad()),
        };

        let address = Self {
            domain: u32::from_str_radix(domain, 16).map_err(|_| bad())?,
            bus: u8::from_str_radix(bus, 16).map_err(|_| bad())?,
            device: u8::from_str_radix(device, 16).map_err(|_| bad())?,
            function: function.parse().map_err(|_| bad())?,
        };
        if address.device > 0x1F || address.function > 7 {
            return Err(bad());
        }
        Ok(address)
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum EndpointKind {
    Management,
    Ntb,
}

impl EndpointKind {
    fn from_class(class: u32) -> Option<Self> {
        match class {
            MICROSEMI_MGMT_CLASSCODE => Some(EndpointKind::Management),
            MICROSEMI_NTB_CLASSCODE => Some(EndpointKind::Ntb),
            _ => None,
        }
    }

    pub fn name(&self) -> &'static str {
        match self {
            EndpointKind::Management => "management",
            EndpointKind::Ntb => "ntb",
        }
    }
}

/// A switch endpoint found under sysfs
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct SwitchEndpoint {
    pub address: PciAddress,
    pub device_id: u16,
    pub kind: EndpointKind,
    pub path: PathBuf,
}

impl SwitchEndpoint {
    /// BAR0, which holds the GAS
    pub fn resource0(&self) -> PathBuf {
        self.path.join("resource0")
    }
}

fn read_hex(path: &Path) -> Result<u32> {
    let text = fs::read_to_string(path)?;
    let text = text.trim();
    u32::from_str_radix(text.trim_start_matches("0x"), 16)
        .map_err(|_| SwitchtecError::ParseError(format!("{}: {:?}", path.display(), text)))
}

fn probe_entry(path: &Path) -> Result<Option<SwitchEndpoint>> {
    let Some(name) = path.file_name().and_then(|n| n.to_str()) else {
        return Ok(None);
    };
    let Ok(address) = name.parse::<PciAddress>() else {
        return Ok(None);
    };

    if read_hex(&path.join("vendor"))? != MICROSEMI_VENDOR_ID as u32 {
        return Ok(None);
    }
    let class = read_hex(&path.join("class"))? & 0xFF_FFFF;
    let Some(kind) = EndpointKind::from_class(class) else {
        return Ok(None);
    };

    Ok(Some(SwitchEndpoint {
        address,
        device_id: read_hex(&path.join("device"))? as u16,
        kind,
        path: path.to_path_buf(),
    }))
}

/// Switch endpoints under a sysfs `devices` directory, sorted by address
pub fn discover_in(root: &Path) -> Result<Vec<SwitchEndpoint>> {
    let entries = fs::read_dir(root).map_err(|e| {
        SwitchtecError::PciError(format!("Failed to list {}: {}", root.display(), e))
    })?;

    let mut found = Vec::new();
    for entry in entries {
        let path = entry?.path();
        match probe_entry(&path) {
            Ok(Some(endpoint)) => {
                tracing::debug!(
                    "Found {} endpoint {} (device 0x{:04x})",
                    endpoint.kind.name(),
                    endpoint.address,
                    endpoint.device_id
                );
                found.push(endpoint);
            }
            Ok(None) => {}
            Err(e) => tracing::debug!("Skipping {}: {}", path.display(), e),
        }
    }

    found.sort_by_key(|endpoint| endpoint.address);
    Ok(found)
}

pub fn discover() -> Result<Vec<SwitchEndpoint>> {
    discover_in(&SYSFS_PCI_DEVICES)
}

/// Management endpoint at `address`, or the first one found
pub fn find_management(address: Option<PciAddress>) -> Result<SwitchEndpoint> {
    discover()?
        .into_iter()
        .filter(|endpoint| endpoint.kind == EndpointKind::Management)
        .find(|endpoint| address.map_or(true, |a| a == endpoint.address))
        .ok_or_else(|| match address {
            Some(a) => SwitchtecError::PciError(format!("No switch management endpoint at {a}")),
            None => SwitchtecError::PciError("No switch management endpoint found".to_string()),
        })
}
