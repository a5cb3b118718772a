//! Fabric counter register definitions
//!
//! The fabric counters observe traffic between the FPGA and the host (PCIe
//! links, UPI, MMIO). The counter bank either aggregates all ports or, with
//! the port filter enabled, observes exactly one port.

use super::{EventCounter, CTRL_EVENT, CTRL_FREEZE_CNTR, CTRL_RESET_CNTR};
use crate::register::{BitField, RegisterLayout};

/// Fabric control register
pub const FAB_CTRL: u64 = 0x20;

/// Fabric counter register
pub const FAB_CNTR: u64 = 0x28;

/// Bit width of the fabric counter
pub const COUNTER_WIDTH_BITS: u32 = 60;

/// Port id for the port filter (bits 20-21)
pub const CTRL_PORT_ID: BitField = BitField::new(20, 21);

/// Port filter enable (bit 23)
pub const CTRL_PORT_FILTER: BitField = BitField::bit(23);

/// Fabric counter layout
pub type FabricCounter = EventCounter<COUNTER_WIDTH_BITS>;

/// Fabric event codes
pub mod events {
    pub const PCIE0_READ: u8 = 0x0;
    pub const PCIE0_WRITE: u8 = 0x1;
    pub const PCIE1_READ: u8 = 0x2;
    pub const PCIE1_WRITE: u8 = 0x3;
    pub const UPI_READ: u8 = 0x4;
    pub const UPI_WRITE: u8 = 0x5;
    pub const MMIO_READ: u8 = 0x6;
    pub const MMIO_WRITE: u8 = 0x7;
}

/// Fabric control register layout
///
/// ## Register Format
///
/// | Bits  | Field          | Description                         |
/// |-------|----------------|-------------------------------------|
/// | 0     | reset_counter  | Reset the counter                   |
/// | 8     | freeze_counter | Freeze the counter                  |
/// | 16-19 | event          | Event code to count                 |
/// | 20-21 | port_id        | Port observed when filter is on     |
/// | 23    | port_filter    | 0 = aggregate, 1 = single port      |
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct FabricControl {
    pub reset_counter: bool,
    pub freeze_counter: bool,
    pub event: u8,
    pub port_id: u8,
    pub port_filter: bool,
}

impl RegisterLayout for FabricControl {
    const FIELDS: u64 = CTRL_RESET_CNTR.mask()
        | CTRL_FREEZE_CNTR.mask()
        | CTRL_EVENT.mask()
        | CTRL_PORT_ID.mask()
        | CTRL_PORT_FILTER.mask();

    fn to_reg_value(&self) -> u64 {
        (if self.reset_counter { CTRL_RESET_CNTR.mask() } else { 0 })
            | (if self.freeze_counter { CTRL_FREEZE_CNTR.mask() } else { 0 })
            | CTRL_EVENT.set(0, self.event as u64)
            | CTRL_PORT_ID.set(0, self.port_id as u64)
            | (if self.port_filter { CTRL_PORT_FILTER.mask() } else { 0 })
    }

    fn from_reg_value(value: u64) -> Self {
        Self {
            reset_counter: CTRL_RESET_CNTR.is_set(value),
            freeze_counter: CTRL_FREEZE_CNTR.is_set(value),
            event: CTRL_EVENT.get(value) as u8,
            port_id: CTRL_PORT_ID.get(value) as u8,
            port_filter: CTRL_PORT_FILTER.is_set(value),
        }
    }

    fn validate(&self) -> Result<(), &'static str> {
        if self.event > 0xF {
            return Err("Event code must be <= 15 (4 bits)");
        }
        if self.port_id > 0x3 {
            return Err("Port id must be <= 3 (2 bits)");
        }
        Ok(())
    }
}
