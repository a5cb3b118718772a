//! FME global performance feature register definitions
//!
//! The global performance feature is a DFL private feature of the FPGA
//! Management Engine. Its register window holds one control/counter pair per
//! counter type plus a free-running clock counter:
//!
//! | Offset | Register              |
//! |--------|-----------------------|
//! | 0x08   | Cache control         |
//! | 0x10   | Cache counter bank 0  |
//! | 0x18   | Cache counter bank 1  |
//! | 0x20   | Fabric control        |
//! | 0x28   | Fabric counter        |
//! | 0x30   | Clock counter         |
//! | 0x38   | IOMMU control         |
//! | 0x40   | IOMMU counter         |
//! | 0x48   | IOMMU SIP control     |
//! | 0x50   | IOMMU SIP counter     |
//!
//! Programmable counters echo the selected event code in bits 60-63 once
//! the hardware has switched over, so software selects a code, polls for the
//! echo and only then reads the value.
//!
//! ## References
//!
//! - Intel FPGA Programmable Acceleration Card, Device Feature List Specification
//! - Intel Acceleration Stack, FME Global Performance Register Map

use crate::register::{BitField, RegisterLayout};

pub mod cache;
pub mod clock;
pub mod dfh;
pub mod fabric;
pub mod iommu;

/// Port id that selects the aggregate (all ports) view
pub const PORTID_ROOT: u8 = 0xFF;

/// Number of ports a per-port event may address
///
/// The FME exposes a single port. IOMMU first-level codes are `event + port`,
/// so a larger bound would alias one port's event onto another's.
pub const MAX_PORTS: u8 = 1;

/// Upper bound for an event-code echo poll, in microseconds
pub const PERF_TIMEOUT_US: u64 = 30;

/// Size of the global performance feature register window
pub const PERF_WINDOW_LEN: u64 = 0x58;

/// Event code echoed by a programmable counter (bits 60-63)
pub const COUNTER_EVENT: BitField = BitField::new(60, 63);

/// Event select field shared by all programmable control registers (bits 16-19)
pub const CTRL_EVENT: BitField = BitField::new(16, 19);

/// Counter reset bit shared by all programmable control registers
pub const CTRL_RESET_CNTR: BitField = BitField::bit(0);

/// Counter freeze bit shared by all programmable control registers
pub const CTRL_FREEZE_CNTR: BitField = BitField::bit(8);

/// Programmable counter register layout
///
/// ## Register Format
///
/// | Bits        | Field | Description                     |
/// |-------------|-------|---------------------------------|
/// | 0-(WIDTH-1) | count | Event count                     |
/// | 60-63       | event | Event code currently counted    |
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct EventCounter<const WIDTH: u32> {
    pub count: u64,
    pub event: u8,
}

impl<const WIDTH: u32> EventCounter<WIDTH> {
    pub const COUNT: BitField = BitField::new(0, WIDTH - 1);
}

impl<const WIDTH: u32> RegisterLayout for EventCounter<WIDTH> {
    const FIELDS: u64 = Self::COUNT.mask() | COUNTER_EVENT.mask();

    fn to_reg_value(&self) -> u64 {
        Self::COUNT.set(0, self.count) | COUNTER_EVENT.set(0, self.event as u64)
    }

    fn from_reg_value(value: u64) -> Self {
        Self {
            count: Self::COUNT.get(value),
            event: COUNTER_EVENT.get(value) as u8,
        }
    }

    fn validate(&self) -> Result<(), &'static str> {
        if self.count > Self::COUNT.mask() {
            return Err("Count exceeds counter width");
        }
        if self.event > 0xF {
            return Err("Event code must be <= 15 (4 bits)");
        }
        Ok(())
    }
}
