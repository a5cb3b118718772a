// FPGA PCI function discovery through sysfs

use serde::{Deserialize, Serialize};
use std::fmt;
use std::fs;
use std::path::{Path, PathBuf};
use std::str::FromStr;

use crate::error::{FmePerfError, Result};

pub const INTEL_VENDOR_ID: u16 = 0x8086;

/// Physical functions that expose an FME at BAR 0
pub const FPGA_PF_DEVICE_IDS: &[u16] = &[
    0xBCBD, // Integrated 5.x
    0xBCC0, // Integrated RCP
    0xBCC1, // Integrated 6.x
    0x09C4, // Discrete 1.x
    0x0B2B, // D5005
    0x0B30, // N3000
];

/// BAR holding the FME register space
pub const FME_BAR: u8 = 0;

fn sysfs_devices_root() -> PathBuf {
    if std::env::var("DOCKER_RUNNING").is_ok() {
        PathBuf::from("/pcm/sys/bus/pci/devices")
    } else {
        PathBuf::from("/sys/bus/pci/devices")
    }
}

/// A PCI function address (`DDDD:BB:DD.F`)
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
pub struct PciAddress {
    pub domain: u16,
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
    type Err = FmePerfError;

    /// Accepts `DDDD:BB:DD.F` or the short `BB:DD.F` form
    fn from_str(s: &str) -> Result<Self> {
        let invalid = || FmePerfError::PciError(format!("Invalid PCI address: {s}"));

        let (rest, function) = s.trim().rsplit_once('.').ok_or_else(invalid)?;
        let parts: Vec<&str> = rest.split(':').collect();
        let (domain, bus, device) = match parts.as_slice() {
            [domain, bus, device] => (*domain, *bus, *device),
            [bus, device] => ("0", *bus, *device),
            _ => return Err(invalid()),
        };

        let address = Self {
            domain: u16::from_str_radix(domain, 16).map_err(|_| invalid())?,
            bus: u8::from_str_radix(bus, 16).map_err(|_| invalid())?,
            device: u8::from_str_radix(device, 16).map_err(|_| invalid())?,
            function: function.parse().map_err(|_| invalid())?,
        };

        if address.device > 0x1F || address.function > 7 {
            return Err(invalid());
        }
        Ok(address)
    }
}

/// Parse a sysfs id file such as `vendor` (`0x8086\n`)
fn read_hex_id(path: &Path) -> Result<u16> {
    let text = fs::read_to_string(path).map_err(|e| {
        FmePerfError::PciError(format!("Failed to read {}: {e}", path.display()))
    })?;
    let text = text.trim();
    u16::from_str_radix(text.trim_start_matches("0x"), 16)
        .map_err(|_| FmePerfError::PciError(format!("Bad id '{text}' in {}", path.display())))
}

/// A PCI function as seen in sysfs
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct PciDevice {
    pub address: PciAddress,
    pub vendor_id: u16,
    pub device_id: u16,
    path: PathBuf,
}

impl PciDevice {
    pub fn open(address: PciAddress) -> Result<Self> {
        Self::open_in(&sysfs_devices_root(), address)
    }

    fn open_in(root: &Path, address: PciAddress) -> Result<Self> {
        let path = root.join(address.to_string());
        if !path.is_dir() {
            return Err(FmePerfError::PciError(format!(
                "PCI device {address} not found under {}",
                root.display()
            )));
        }

        Ok(Self {
            address,
            vendor_id: read_hex_id(&path.join("vendor"))?,
            device_id: read_hex_id(&path.join("device"))?,
            path,
        })
    }

    /// Whether this function is a known FPGA PF carrying an FME
    pub fn is_fpga_pf(&self) -> bool {
        self.vendor_id == INTEL_VENDOR_ID && FPGA_PF_DEVICE_IDS.contains(&self.device_id)
    }

    /// sysfs file that maps BAR `bar`
    pub fn resource_path(&self, bar: u8) -> PathBuf {
        self.path.join(format!("resource{bar}"))
    }
}

/// All FPGA PFs present on the system, ordered by address
pub fn scan_fpga_devices() -> Result<Vec<PciDevice>> {
    scan_fpga_devices_in(&sysfs_devices_root())
}

fn scan_fpga_devices_in(root: &Path) -> Result<Vec<PciDevice>> {
    let entries = fs::read_dir(root).map_err(|e| {
        FmePerfError::PciError(format!("Failed to list {}: {e}", root.display()))
    })?;

    let mut devices = Vec::new();
    for entry in entries.flatten() {
        let name = entry.file_name();
        let Some(address) = name.to_str().and_then(|n| n.parse::<PciAddress>().ok()) else {
            continue;
        };

        match PciDevice::open_in(root, address) {
            Ok(device) if device.is_fpga_pf() => {
                tracing::debug!(
                    "Found FPGA PF {} ({:04x}:{:04x})",
                    address,
                    device.vendor_id,
                    device.device_id
                );
                devices.push(device);
            }
            Ok(_) => {}
            Err(e) => tracing::debug!("Skipping {}: {}", address, e),
        }
    }

    devices.sort_by_key(|d| d.address);
    Ok(devices)
}

#[cfg(test)]
mod tests {
    use super::*;

    fn scratch_dir(name: &str) -> PathBuf {
        let dir = std::env::temp_dir().join(format!("fmeperf-{name}-{}", std::process::id()));
        let _ = fs::remove_dir_all(&dir);
        fs::create_dir_all(&dir).unwrap();
        dir
    }

    fn fake_device(root: &Path, address: &str, vendor: &str, device: &str) {
        let dir = root.join(address);
        fs::create_dir_all(&dir).unwrap();
        fs::write(dir.join("vendor"), format!("{vendor}\n")).unwrap();
        fs::write(dir.join("device"), format!("{device}\n")).unwrap();
    }

    #[test]
    fn test_parse_address() {
        let addr: PciAddress = "0000:5e:00.0".parse().unwrap();
        assert_eq!(
            addr,
            PciAddress {
                domain: 0,
                bus: 0x5e,
                device: 0,
                function: 0
            }
        );
        assert_eq!(addr.to_string(), "0000:5e:00.0");

        let short: PciAddress = "af:1f.7".parse().unwrap();
        assert_eq!(short.to_string(), "0000:af:1f.7");
    }

    #[test]
    fn test_parse_invalid_address() {
        for s in ["", "5e:00", "zz:00.0", "00:20.0", "00:00.8", "1:2:3:4.0"] {
            assert!(s.parse::<PciAddress>().is_err(), "accepted {s:?}");
        }
    }

    #[test]
    fn test_scan_finds_fpga_functions() {
        let root = scratch_dir("scan");
        fake_device(&root, "0000:5e:00.0", "0x8086", "0x0b30");
        fake_device(&root, "0000:3b:00.0", "0x8086", "0xbcc0");
        fake_device(&root, "0000:00:1f.0", "0x8086", "0xa1c8");
        fake_device(&root, "0000:17:00.0", "0x15b3", "0x0b30");
        fs::create_dir_all(root.join("not-a-device")).unwrap();

        let devices = scan_fpga_devices_in(&root).unwrap();
        let addresses: Vec<String> = devices.iter().map(|d| d.address.to_string()).collect();
        assert_eq!(addresses, ["0000:3b:00.0", "0000:5e:00.0"]);
        assert!(devices[0]
            .resource_path(FME_BAR)
            .ends_with("0000:3b:00.0/resource0"));

        fs::remove_dir_all(&root).unwrap();
    }

    #[test]
    fn test_open_missing_device() {
        let root = scratch_dir("missing");
        let addr: PciAddress = "0000:01:00.0".parse().unwrap();
        assert!(matches!(
            PciDevice::open_in(&root, addr),
            Err(FmePerfError::PciError(_))
        ));
        fs::remove_dir_all(&root).unwrap();
    }
}
