// Attribute groups exported to the host monitoring framework

use serde::Serialize;

use super::config::{CONFIG_EVENT, CONFIG_EVTYPE, CONFIG_PORTID};
use crate::catalog::{EventCatalog, EventDescriptor, Scope};
use crate::error::{FmePerfError, Result};
use fmeperf_raw::BitField;

/// Features the counters do not support, advertised so the host rejects them
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
pub struct PmuCapabilities {
    /// Counters never raise interrupts; they must be read explicitly
    pub no_interrupt: bool,
    /// User/kernel/hypervisor exclusion is not available
    pub no_exclude: bool,
}

pub const CAPABILITIES: PmuCapabilities = PmuCapabilities {
    no_interrupt: true,
    no_exclude: true,
};

#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct Attribute {
    pub name: String,
    pub value: String,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct AttributeGroup {
    pub name: &'static str,
    pub attributes: Vec<Attribute>,
}

impl AttributeGroup {
    pub fn get(&self, name: &str) -> Option<&str> {
        self.attributes
            .iter()
            .find(|a| a.name == name)
            .map(|a| a.value.as_str())
    }
}

/// Listing string of one event; per-port events leave the port to the caller
pub fn event_string(descriptor: &EventDescriptor) -> String {
    match descriptor.scope {
        Scope::Global => format!(
            "event=0x{:x},evtype=0x{:x}",
            descriptor.id,
            descriptor.event_type.code()
        ),
        Scope::PerPort => format!(
            "event=0x{:x},evtype=0x{:x},portid=?",
            descriptor.id,
            descriptor.event_type.code()
        ),
    }
}

fn format_field(field: BitField) -> String {
    format!("config:{}-{}", field.low, field.high)
}

pub fn format_group() -> AttributeGroup {
    let attributes = [
        ("event", CONFIG_EVENT),
        ("evtype", CONFIG_EVTYPE),
        ("portid", CONFIG_PORTID),
    ]
    .into_iter()
    .map(|(name, field)| Attribute {
        name: name.to_string(),
        value: format_field(field),
    })
    .collect();

    AttributeGroup {
        name: "format",
        attributes,
    }
}

pub fn events_group(catalog: &EventCatalog) -> AttributeGroup {
    AttributeGroup {
        name: "events",
        attributes: catalog
            .iter()
            .map(|(_, d)| Attribute {
                name: d.full_name(),
                value: event_string(d),
            })
            .collect(),
    }
}

pub fn cpumask_group(cpu: u32) -> AttributeGroup {
    AttributeGroup {
        name: "cpumask",
        attributes: vec![Attribute {
            name: "cpumask".to_string(),
            value: cpu.to_string(),
        }],
    }
}

/// All attribute groups of a PMU bound to `cpu`
pub fn attribute_groups(catalog: &EventCatalog, cpu: u32) -> Result<Vec<AttributeGroup>> {
    let events = events_group(catalog);
    if events.attributes.is_empty() {
        return Err(FmePerfError::AttachError(
            "no events to export for this device".to_string(),
        ));
    }

    Ok(vec![format_group(), events, cpumask_group(cpu)])
}
