// Event resolution: (id, type, port) -> catalog entry

use super::{EventCatalog, EventRef, EventType, Scope};
use crate::error::{FmePerfError, Result};
use fmeperf_raw::fme::{MAX_PORTS, PORTID_ROOT};

impl EventCatalog {
    /// Resolve a requested event to its catalog entry
    ///
    /// A port other than [`PORTID_ROOT`] selects the per-port variant of an
    /// event, the root port selects the global one. An id that exists only in
    /// the other scope, or a per-port request beyond [`MAX_PORTS`], is an
    /// invalid argument rather than an unknown event.
    pub fn resolve(&self, id: u16, event_type: u8, port: u8) -> Result<EventRef> {
        let event_type = EventType::from_code(event_type).ok_or_else(|| {
            FmePerfError::NotFound(format!("unknown event type 0x{event_type:x}"))
        })?;

        let scope = Scope::of_port(port);
        let group = self.group(event_type);

        let index = match group.iter().position(|d| d.id == id && d.scope == scope) {
            Some(index) => index,
            None if group.iter().any(|d| d.id == id) => {
                return Err(FmePerfError::InvalidArgument(format!(
                    "{:?} event 0x{:x} has no {:?} variant (port 0x{:x})",
                    event_type, id, scope, port
                )));
            }
            None => {
                return Err(FmePerfError::NotFound(format!(
                    "no {:?} event with id 0x{:x}",
                    event_type, id
                )));
            }
        };

        let descriptor = &group[index];
        match descriptor.scope {
            Scope::PerPort if port >= MAX_PORTS => Err(FmePerfError::InvalidArgument(format!(
                "port {port} out of range for {} (max {MAX_PORTS})",
                descriptor.full_name()
            ))),
            Scope::Global if port != PORTID_ROOT => Err(FmePerfError::InvalidArgument(format!(
                "global event {} requires port 0x{PORTID_ROOT:x}",
                descriptor.full_name()
            ))),
            _ => Ok(EventRef { event_type, index }),
        }
    }
}
