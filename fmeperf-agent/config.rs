use serde::{Deserialize, Serialize};
use std::net::SocketAddr;
use std::path::Path;
use std::str::FromStr;
use std::time::Duration;

use crate::catalog::{EventCatalog, Scope};
use crate::common::PciAddress;
use crate::counters::DEFAULT_POLL_TIMEOUT;
use crate::error::{FmePerfError, Result};
use crate::pmu::EventConfig;
use fmeperf_raw::fme::MAX_PORTS;

/// An event requested by name, with a port for per-port events
///
/// Written as `NAME` or `NAME@PORT`, e.g. `fab_port_pcie0_read@0`.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct EventSelector {
    pub name: String,
    pub port: Option<u8>,
}

impl FromStr for EventSelector {
    type Err = FmePerfError;

    fn from_str(s: &str) -> Result<Self> {
        let s = s.trim();
        let (name, port) = match s.split_once('@') {
            Some((name, port)) => {
                let port = port.parse::<u8>().map_err(|_| {
                    FmePerfError::ConfigError(format!("Invalid port in event '{s}'"))
                })?;
                (name, Some(port))
            }
            None => (s, None),
        };

        if name.is_empty() {
            return Err(FmePerfError::ConfigError(format!("Empty event name in '{s}'")));
        }

        Ok(Self {
            name: name.to_string(),
            port,
        })
    }
}

impl std::fmt::Display for EventSelector {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self.port {
            Some(port) => write!(f, "{}@{}", self.name, port),
            None => write!(f, "{}", self.name),
        }
    }
}

impl EventSelector {
    /// Config word for this selector on a device's catalog
    pub fn to_config(&self, catalog: &EventCatalog) -> Result<EventConfig> {
        let event = catalog
            .find_by_name(&self.name)
            .ok_or_else(|| FmePerfError::NotFound(self.name.clone()))?;
        let descriptor = catalog
            .get(event)
            .ok_or_else(|| FmePerfError::NotFound(self.name.clone()))?;

        match (descriptor.scope, self.port) {
            (Scope::Global, Some(_)) => Err(FmePerfError::ConfigError(format!(
                "{} is a global event and takes no port",
                self.name
            ))),
            (Scope::PerPort, None) => Err(FmePerfError::ConfigError(format!(
                "{} is a per-port event, use {}@<0-{}>",
                self.name,
                self.name,
                MAX_PORTS - 1
            ))),
            (Scope::PerPort, Some(port)) if port >= MAX_PORTS => {
                Err(FmePerfError::ConfigError(format!(
                    "port {} of {} out of range, use {}@<0-{}>",
                    port,
                    self.name,
                    self.name,
                    MAX_PORTS - 1
                )))
            }
            (_, port) => Ok(EventConfig::for_event(descriptor, port)),
        }
    }
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ExportConfig {
    /// FPGA PF to monitor; the first one found when unset
    pub device: Option<PciAddress>,
    /// CPU the counters are read from
    pub cpu: u32,
    /// Events to export; every global event when empty
    pub events: Vec<EventSelector>,
    pub interval: Duration,
    pub listen: SocketAddr,
    pub poll_timeout: Duration,
}

impl Default for ExportConfig {
    fn default() -> Self {
        Self {
            device: None,
            cpu: 0,
            events: Vec::new(),
            interval: Duration::from_secs(1),
            listen: SocketAddr::from(([0, 0, 0, 0], 8080)),
            poll_timeout: DEFAULT_POLL_TIMEOUT,
        }
    }
}

impl ExportConfig {
    /// Defaults, reading counters on the first online CPU
    pub fn auto_detect() -> Self {
        let cpus = Self::detect_online_cpus();
        let cpu = cpus.first().copied().unwrap_or(0);

        tracing::info!("Auto-detected {} online CPUs, reading on cpu {}", cpus.len(), cpu);

        Self {
            cpu,
            ..Self::default()
        }
    }

    /// Load a configuration dumped as JSON
    pub fn load(path: impl AsRef<Path>) -> Result<Self> {
        let text = std::fs::read_to_string(path)?;
        Ok(serde_json::from_str(&text)?)
    }

    pub fn to_json(&self) -> Result<String> {
        Ok(serde_json::to_string_pretty(self)?)
    }

    /// Detect online CPUs from /sys/devices/system/cpu/online
    pub fn detect_online_cpus() -> Vec<u32> {
        std::fs::read_to_string("/sys/devices/system/cpu/online")
            .ok()
            .and_then(|s| Self::parse_cpu_list(&s))
            .unwrap_or_else(|| {
                tracing::warn!("Failed to detect online CPUs, using default: 0");
                vec![0]
            })
    }

    /// Parse CPU list like "0-3,8-11" into Vec<u32>
    fn parse_cpu_list(s: &str) -> Option<Vec<u32>> {
        let mut cpus = Vec::new();
        for part in s.trim().split(',') {
            if let Some((start, end)) = part.split_once('-') {
                let start: u32 = start.parse().ok()?;
                let end: u32 = end.parse().ok()?;
                cpus.extend(start..=end);
            } else {
                cpus.push(part.parse().ok()?);
            }
        }
        Some(cpus)
    }

    /// Selectors to open on a device: the configured ones, or all global events
    pub fn selectors(&self, catalog: &EventCatalog) -> Vec<EventSelector> {
        if !self.events.is_empty() {
            return self.events.clone();
        }

        catalog
            .iter()
            .filter(|(_, d)| d.scope == Scope::Global)
            .map(|(_, d)| EventSelector {
                name: d.full_name(),
                port: None,
            })
            .collect()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::catalog::PerfFlavor;

    #[test]
    fn test_parse_cpu_list() {
        assert_eq!(
            ExportConfig::parse_cpu_list("0-3,8-9\n"),
            Some(vec![0, 1, 2, 3, 8, 9])
        );
        assert_eq!(ExportConfig::parse_cpu_list("5"), Some(vec![5]));
        assert_eq!(ExportConfig::parse_cpu_list("a-b"), None);
    }

    #[test]
    fn test_parse_selector() {
        let plain: EventSelector = "cache_read_hit".parse().unwrap();
        assert_eq!(plain.port, None);

        let ported: EventSelector = "fab_port_mmio_read@0".parse().unwrap();
        assert_eq!(ported.name, "fab_port_mmio_read");
        assert_eq!(ported.port, Some(0));
        assert_eq!(ported.to_string(), "fab_port_mmio_read@0");

        assert!("fab_port_mmio_read@x".parse::<EventSelector>().is_err());
        assert!("@1".parse::<EventSelector>().is_err());
    }

    #[test]
    fn test_selector_config() {
        let catalog = EventCatalog::new(PerfFlavor::Integrated).unwrap();

        let config = EventSelector::from_str("iommu_port_devtlb_4k_fill@0")
            .unwrap()
            .to_config(&catalog)
            .unwrap();
        assert_eq!(config.port, 0);
        assert_eq!(config.event_type, 3);

        let global = EventSelector::from_str("clock")
            .unwrap()
            .to_config(&catalog)
            .unwrap();
        assert_eq!(global.port, fmeperf_raw::fme::PORTID_ROOT);

        for bad in [
            "clock@0",
            "fab_port_upi_read",
            "no_such_event",
            "iommu_port_read_transaction@1",
            "fab_port_mmio_write@3",
        ] {
            let selector = EventSelector::from_str(bad).unwrap();
            assert!(selector.to_config(&catalog).is_err(), "accepted {bad}");
        }
    }

    #[test]
    fn test_default_selectors_are_global() {
        let catalog = EventCatalog::new(PerfFlavor::Discrete).unwrap();
        let selectors = ExportConfig::default().selectors(&catalog);

        // clock plus the eight aggregate fabric events
        assert_eq!(selectors.len(), 9);
        assert!(selectors.iter().all(|s| s.port.is_none()));
    }

    #[test]
    fn test_json_round_trip() {
        let config = ExportConfig {
            device: Some("0000:5e:00.0".parse().unwrap()),
            events: vec!["fab_port_pcie1_write@0".parse().unwrap()],
            ..ExportConfig::default()
        };
        let json = config.to_json().unwrap();
        let back: ExportConfig = serde_json::from_str(&json).unwrap();

        assert_eq!(back.device, config.device);
        assert_eq!(back.events, config.events);
        assert_eq!(back.listen, config.listen);
    }
}
