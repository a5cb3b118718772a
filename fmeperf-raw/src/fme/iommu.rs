//! IOMMU (VT-d) counter register definitions
//!
//! Two counter pairs observe address translation: the first level counts
//! per-port device TLB activity, the second level (SIP) counts IOTLB,
//! paging-structure cache and root/context cache activity. Both share the
//! same control and counter layouts.

use super::{EventCounter, CTRL_EVENT, CTRL_FREEZE_CNTR, CTRL_RESET_CNTR};
use crate::register::RegisterLayout;

/// First-level IOMMU control register
pub const VTD_CTRL: u64 = 0x38;

/// First-level IOMMU counter register
pub const VTD_CNTR: u64 = 0x40;

/// Second-level IOMMU control register
pub const VTD_SIP_CTRL: u64 = 0x48;

/// Second-level IOMMU counter register
pub const VTD_SIP_CNTR: u64 = 0x50;

/// Bit width of both IOMMU counters
pub const COUNTER_WIDTH_BITS: u32 = 48;

/// IOMMU counter layout
pub type IommuCounter = EventCounter<COUNTER_WIDTH_BITS>;

/// First-level event codes
///
/// Each event is exposed once per port: the hardware code is the base code
/// below plus the port number.
pub mod events {
    pub const READ_TRANSACTION: u8 = 0x0;
    pub const WRITE_TRANSACTION: u8 = 0x1;
    pub const DEVTLB_READ_HIT: u8 = 0x2;
    pub const DEVTLB_WRITE_HIT: u8 = 0x3;
    pub const DEVTLB_4K_FILL: u8 = 0x4;
    pub const DEVTLB_2M_FILL: u8 = 0x5;
    pub const DEVTLB_1G_FILL: u8 = 0x6;
}

/// Second-level (SIP) event codes
pub mod sip_events {
    pub const IOTLB_4K_HIT: u8 = 0x0;
    pub const IOTLB_2M_HIT: u8 = 0x1;
    pub const IOTLB_1G_HIT: u8 = 0x2;
    pub const SLPWC_L3_HIT: u8 = 0x3;
    pub const SLPWC_L4_HIT: u8 = 0x4;
    pub const RCC_HIT: u8 = 0x5;
    pub const IOTLB_4K_MISS: u8 = 0x6;
    pub const IOTLB_2M_MISS: u8 = 0x7;
    pub const IOTLB_1G_MISS: u8 = 0x8;
    pub const SLPWC_L3_MISS: u8 = 0x9;
    pub const SLPWC_L4_MISS: u8 = 0xA;
    pub const RCC_MISS: u8 = 0xB;
}

/// IOMMU control register layout (both levels)
///
/// ## Register Format
///
/// | Bits  | Field          | Description          |
/// |-------|----------------|----------------------|
/// | 0     | reset_counter  | Reset the counter    |
/// | 8     | freeze_counter | Freeze the counter   |
/// | 16-19 | event          | Event code to count  |
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct IommuControl {
    pub reset_counter: bool,
    pub freeze_counter: bool,
    pub event: u8,
}

impl RegisterLayout for IommuControl {
    const FIELDS: u64 = CTRL_RESET_CNTR.mask() | CTRL_FREEZE_CNTR.mask() | CTRL_EVENT.mask();

    fn to_reg_value(&self) -> u64 {
        (if self.reset_counter { CTRL_RESET_CNTR.mask() } else { 0 })
            | (if self.freeze_counter { CTRL_FREEZE_CNTR.mask() } else { 0 })
            | CTRL_EVENT.set(0, self.event as u64)
    }

    fn from_reg_value(value: u64) -> Self {
        Self {
            reset_counter: CTRL_RESET_CNTR.is_set(value),
            freeze_counter: CTRL_FREEZE_CNTR.is_set(value),
            event: CTRL_EVENT.get(value) as u8,
        }
    }

    fn validate(&self) -> Result<(), &'static str> {
        if self.event > 0xF {
            return Err("Event code must be <= 15 (4 bits)");
        }
        Ok(())
    }
}
