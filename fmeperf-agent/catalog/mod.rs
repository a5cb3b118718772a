// FME event catalog
//
// Built once per device instance and never mutated afterwards. Descriptors
// are referenced by (type, index) so sessions never hold borrows into it.

pub mod events;
pub mod resolver;

pub use events::{CacheEvent, ClockEvent, FabricEvent, IommuEvent, IommuSipEvent};

use serde::Serialize;

use crate::error::{FmePerfError, Result};
use fmeperf_raw::fme::{cache, clock, dfh, fabric, iommu, PORTID_ROOT};

/// Counter type of an event, as encoded in the config word
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize)]
pub enum EventType {
    Basic = 0,
    Cache = 1,
    Fabric = 2,
    IommuFirstLevel = 3,
    IommuSecondLevel = 4,
}

impl EventType {
    pub const COUNT: usize = 5;

    pub fn from_code(code: u8) -> Option<Self> {
        match code {
            0 => Some(EventType::Basic),
            1 => Some(EventType::Cache),
            2 => Some(EventType::Fabric),
            3 => Some(EventType::IommuFirstLevel),
            4 => Some(EventType::IommuSecondLevel),
            _ => None,
        }
    }

    pub fn code(&self) -> u8 {
        *self as u8
    }

    pub fn name(&self) -> &'static str {
        match self {
            EventType::Basic => "basic",
            EventType::Cache => "cache",
            EventType::Fabric => "fab",
            EventType::IommuFirstLevel => "iommu",
            EventType::IommuSecondLevel => "iommu",
        }
    }

    /// Width of the hardware counter backing this type
    pub fn counter_width(&self) -> u32 {
        match self {
            EventType::Basic => clock::COUNTER_WIDTH_BITS,
            EventType::Cache => cache::COUNTER_WIDTH_BITS,
            EventType::Fabric => fabric::COUNTER_WIDTH_BITS,
            EventType::IommuFirstLevel | EventType::IommuSecondLevel => {
                iommu::COUNTER_WIDTH_BITS
            }
        }
    }

    pub fn all() -> [EventType; Self::COUNT] {
        [
            EventType::Basic,
            EventType::Cache,
            EventType::Fabric,
            EventType::IommuFirstLevel,
            EventType::IommuSecondLevel,
        ]
    }
}

/// Whether an event observes the whole device or a single port
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize)]
pub enum Scope {
    Global,
    PerPort,
}

impl Scope {
    /// Scope class implied by a requested port id
    pub fn of_port(port: u8) -> Self {
        if port == PORTID_ROOT {
            Scope::Global
        } else {
            Scope::PerPort
        }
    }
}

/// Which global performance feature the FME implements
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
pub enum PerfFlavor {
    /// Cache, fabric, IOMMU and clock counters
    Integrated,
    /// Fabric and clock counters only
    Discrete,
}

impl PerfFlavor {
    pub fn from_feature_id(id: u16) -> Option<Self> {
        match id {
            dfh::feature_id::GLOBAL_IPERF => Some(PerfFlavor::Integrated),
            dfh::feature_id::GLOBAL_DPERF => Some(PerfFlavor::Discrete),
            _ => None,
        }
    }

    pub fn supports(&self, event_type: EventType) -> bool {
        match self {
            PerfFlavor::Integrated => true,
            PerfFlavor::Discrete => matches!(event_type, EventType::Basic | EventType::Fabric),
        }
    }
}

/// Immutable description of one monitorable counter
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
pub struct EventDescriptor {
    pub name: &'static str,
    pub id: u16,
    pub event_type: EventType,
    pub scope: Scope,
    pub aux_data: u64,
}

impl EventDescriptor {
    fn new(name: &'static str, id: u8, event_type: EventType, scope: Scope) -> Self {
        Self {
            name,
            id: id as u16,
            event_type,
            scope,
            aux_data: 0,
        }
    }

    fn with_aux(mut self, aux_data: u64) -> Self {
        self.aux_data = aux_data;
        self
    }

    /// Name exported to the host, e.g. `fab_port_mmio_read`
    pub fn full_name(&self) -> String {
        match (self.event_type, self.scope) {
            (EventType::Basic, _) => self.name.to_string(),
            (_, Scope::Global) => format!("{}_{}", self.event_type.name(), self.name),
            (_, Scope::PerPort) => format!("{}_port_{}", self.event_type.name(), self.name),
        }
    }
}

/// Stable reference to a catalog entry
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub struct EventRef {
    pub event_type: EventType,
    pub index: usize,
}

/// The per-device table of monitorable events, grouped by type
#[derive(Debug, Clone)]
pub struct EventCatalog {
    flavor: PerfFlavor,
    groups: [Vec<EventDescriptor>; EventType::COUNT],
}

impl EventCatalog {
    /// Build the catalog for a feature flavor
    ///
    /// Types the flavor does not implement get empty groups.
    pub fn new(flavor: PerfFlavor) -> Result<Self> {
        let mut groups: [Vec<EventDescriptor>; EventType::COUNT] = Default::default();

        for event_type in EventType::all() {
            if flavor.supports(event_type) {
                groups[event_type as usize] = Self::build_group(event_type);
            }
        }

        let catalog = Self { flavor, groups };
        catalog.check_unique()?;

        tracing::debug!(
            "Built {:?} event catalog with {} events",
            flavor,
            catalog.len()
        );
        Ok(catalog)
    }

    fn build_group(event_type: EventType) -> Vec<EventDescriptor> {
        match event_type {
            EventType::Basic => ClockEvent::all()
                .into_iter()
                .map(|e| EventDescriptor::new(e.name(), e.code(), event_type, Scope::Global))
                .collect(),
            EventType::Cache => CacheEvent::all()
                .into_iter()
                .map(|e| {
                    let (code, channel) = e.code_and_channel();
                    EventDescriptor::new(e.name(), code, event_type, Scope::Global)
                        .with_aux(channel as u64)
                })
                .collect(),
            EventType::Fabric => {
                let all = FabricEvent::all();
                let global = all
                    .iter()
                    .map(|e| EventDescriptor::new(e.name(), e.code(), event_type, Scope::Global));
                let per_port = all
                    .iter()
                    .map(|e| EventDescriptor::new(e.name(), e.code(), event_type, Scope::PerPort));
                global.chain(per_port).collect()
            }
            EventType::IommuFirstLevel => IommuEvent::all()
                .into_iter()
                .map(|e| EventDescriptor::new(e.name(), e.code(), event_type, Scope::PerPort))
                .collect(),
            EventType::IommuSecondLevel => IommuSipEvent::all()
                .into_iter()
                .map(|e| EventDescriptor::new(e.name(), e.code(), event_type, Scope::Global))
                .collect(),
        }
    }

    fn check_unique(&self) -> Result<()> {
        for group in &self.groups {
            for (i, a) in group.iter().enumerate() {
                if group[i + 1..]
                    .iter()
                    .any(|b| a.id == b.id && a.scope == b.scope)
                {
                    return Err(FmePerfError::AttachError(format!(
                        "duplicate {:?} event 0x{:x} in {:?} group",
                        a.scope, a.id, a.event_type
                    )));
                }
            }
        }
        Ok(())
    }

    pub fn flavor(&self) -> PerfFlavor {
        self.flavor
    }

    /// All descriptors of one type
    pub fn group(&self, event_type: EventType) -> &[EventDescriptor] {
        &self.groups[event_type as usize]
    }

    pub fn get(&self, event: EventRef) -> Option<&EventDescriptor> {
        self.groups[event.event_type as usize].get(event.index)
    }

    /// Look up an event by its exported name
    pub fn find_by_name(&self, full_name: &str) -> Option<EventRef> {
        self.iter()
            .find(|(_, d)| d.full_name() == full_name)
            .map(|(r, _)| r)
    }

    pub fn iter(&self) -> impl Iterator<Item = (EventRef, &EventDescriptor)> {
        EventType::all().into_iter().flat_map(move |event_type| {
            self.group(event_type)
                .iter()
                .enumerate()
                .map(move |(index, d)| (EventRef { event_type, index }, d))
        })
    }

    pub fn len(&self) -> usize {
        self.groups.iter().map(Vec::len).sum()
    }

    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }
}
