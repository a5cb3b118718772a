// Event configuration word
//
// | Bits  | Field   |
// |-------|---------|
// | 0-11  | event   |
// | 12-15 | evtype  |
// | 16-23 | portid  |

use fmeperf_raw::fme::PORTID_ROOT;
use fmeperf_raw::BitField;

use crate::catalog::{EventDescriptor, Scope};

pub const CONFIG_EVENT: BitField = BitField::new(0, 11);
pub const CONFIG_EVTYPE: BitField = BitField::new(12, 15);
pub const CONFIG_PORTID: BitField = BitField::new(16, 23);

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct EventConfig {
    pub event_id: u16,
    pub event_type: u8,
    pub port: u8,
}

impl EventConfig {
    pub fn decode(config: u64) -> Self {
        Self {
            event_id: CONFIG_EVENT.get(config) as u16,
            event_type: CONFIG_EVTYPE.get(config) as u8,
            port: CONFIG_PORTID.get(config) as u8,
        }
    }

    pub fn encode(&self) -> u64 {
        CONFIG_EVENT.set(0, self.event_id as u64)
            | CONFIG_EVTYPE.set(0, self.event_type as u64)
            | CONFIG_PORTID.set(0, self.port as u64)
    }

    /// Config word for a catalog event; `port` is ignored for global events
    pub fn for_event(descriptor: &EventDescriptor, port: Option<u8>) -> Self {
        let port = match descriptor.scope {
            Scope::Global => PORTID_ROOT,
            Scope::PerPort => port.unwrap_or(0),
        };
        Self {
            event_id: descriptor.id,
            event_type: descriptor.event_type.code(),
            port,
        }
    }
}
