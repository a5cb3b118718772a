//! Cache counter register definitions
//!
//! The cache counters observe the FPGA cache on either its read or its write
//! channel. The hardware splits each count across two banks, so the total is
//! the sum of both counter registers.

use super::{EventCounter, CTRL_EVENT, CTRL_FREEZE_CNTR, CTRL_RESET_CNTR};
use crate::register::{BitField, RegisterLayout};

/// Cache control register
pub const CACHE_CTRL: u64 = 0x08;

/// Cache counter bank 0
pub const CACHE_CNTR0: u64 = 0x10;

/// Cache counter bank 1
pub const CACHE_CNTR1: u64 = 0x18;

/// Bit width of each cache counter bank
pub const COUNTER_WIDTH_BITS: u32 = 48;

/// Channel select (bit 20)
pub const CTRL_CHANNEL_SEL: BitField = BitField::bit(20);

/// Cache counter bank layout
pub type CacheCounter = EventCounter<COUNTER_WIDTH_BITS>;

/// Channel selector values for [`CacheControl::channel`]
pub mod channel {
    pub const READ: u8 = 0;
    pub const WRITE: u8 = 1;
}

/// Cache event codes
pub mod events {
    pub const READ_HIT: u8 = 0x0;
    pub const WRITE_HIT: u8 = 0x1;
    pub const READ_MISS: u8 = 0x2;
    pub const WRITE_MISS: u8 = 0x3;
    pub const HOLD_REQUEST: u8 = 0x5;
    pub const DATA_WRITE_PORT_CONTENTION: u8 = 0x6;
    pub const TAG_WRITE_PORT_CONTENTION: u8 = 0x7;
    pub const TX_REQ_STALL: u8 = 0x8;
    pub const RX_REQ_STALL: u8 = 0x9;
    pub const EVICTION: u8 = 0xA;
}

/// Cache control register layout
///
/// ## Register Format
///
/// | Bits  | Field          | Description                    |
/// |-------|----------------|--------------------------------|
/// | 0     | reset_counter  | Reset both counter banks       |
/// | 8     | freeze_counter | Freeze both counter banks      |
/// | 16-19 | event          | Event code to count            |
/// | 20    | channel        | 0 = read channel, 1 = write    |
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct CacheControl {
    pub reset_counter: bool,
    pub freeze_counter: bool,
    pub event: u8,
    pub channel: u8,
}

impl RegisterLayout for CacheControl {
    const FIELDS: u64 = CTRL_RESET_CNTR.mask()
        | CTRL_FREEZE_CNTR.mask()
        | CTRL_EVENT.mask()
        | CTRL_CHANNEL_SEL.mask();

    fn to_reg_value(&self) -> u64 {
        (if self.reset_counter { CTRL_RESET_CNTR.mask() } else { 0 })
            | (if self.freeze_counter { CTRL_FREEZE_CNTR.mask() } else { 0 })
            | CTRL_EVENT.set(0, self.event as u64)
            | CTRL_CHANNEL_SEL.set(0, self.channel as u64)
    }

    fn from_reg_value(value: u64) -> Self {
        Self {
            reset_counter: CTRL_RESET_CNTR.is_set(value),
            freeze_counter: CTRL_FREEZE_CNTR.is_set(value),
            event: CTRL_EVENT.get(value) as u8,
            channel: CTRL_CHANNEL_SEL.get(value) as u8,
        }
    }

    fn validate(&self) -> Result<(), &'static str> {
        if self.event > 0xF {
            return Err("Event code must be <= 15 (4 bits)");
        }
        if self.channel > channel::WRITE {
            return Err("Channel must be 0 (read) or 1 (write)");
        }
        Ok(())
    }
}
