//! Device Feature Header (DFH) definitions
//!
//! Every DFL feature starts with a 64-bit header. Headers form a singly
//! linked list through the `next_offset` field, which is relative to the
//! current header. The FME header itself is a FIU-type header at offset 0
//! of the FME BAR; its private features follow it in the list.

use crate::register::{BitField, RegisterLayout};

/// Feature id (bits 0-11)
pub const DFH_ID: BitField = BitField::new(0, 11);

/// Feature revision (bits 12-15)
pub const DFH_REVISION: BitField = BitField::new(12, 15);

/// Offset of the next header, relative to this one (bits 16-39)
pub const DFH_NEXT_OFFSET: BitField = BitField::new(16, 39);

/// End of list marker (bit 40)
pub const DFH_EOL: BitField = BitField::bit(40);

/// Header type (bits 60-63)
pub const DFH_TYPE: BitField = BitField::new(60, 63);

/// Header type values
pub mod types {
    pub const AFU: u8 = 1;
    pub const PRIVATE: u8 = 3;
    pub const FIU: u8 = 4;
}

/// FME private feature ids
pub mod feature_id {
    pub const FME_HEADER: u16 = 0x0;
    pub const THERMAL_MGMT: u16 = 0x1;
    pub const POWER_MGMT: u16 = 0x2;
    /// Integrated global performance counters (cache, fabric, IOMMU, clock)
    pub const GLOBAL_IPERF: u16 = 0x3;
    pub const GLOBAL_ERROR: u16 = 0x4;
    pub const PR_MGMT: u16 = 0x5;
    /// Discrete global performance counters (fabric, clock)
    pub const GLOBAL_DPERF: u16 = 0x7;
}

/// Device Feature Header layout
///
/// ## Register Format
///
/// | Bits  | Field        | Description                          |
/// |-------|--------------|--------------------------------------|
/// | 0-11  | id           | Feature id                           |
/// | 12-15 | revision     | Feature revision                     |
/// | 16-39 | next_offset  | Byte offset of the next header       |
/// | 40    | end_of_list  | Last header in the list              |
/// | 60-63 | feature_type | AFU, private feature or FIU          |
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct DeviceFeatureHeader {
    pub id: u16,
    pub revision: u8,
    pub next_offset: u32,
    pub end_of_list: bool,
    pub feature_type: u8,
}

impl RegisterLayout for DeviceFeatureHeader {
    const FIELDS: u64 = DFH_ID.mask()
        | DFH_REVISION.mask()
        | DFH_NEXT_OFFSET.mask()
        | DFH_EOL.mask()
        | DFH_TYPE.mask();

    fn to_reg_value(&self) -> u64 {
        DFH_ID.set(0, self.id as u64)
            | DFH_REVISION.set(0, self.revision as u64)
            | DFH_NEXT_OFFSET.set(0, self.next_offset as u64)
            | (if self.end_of_list { DFH_EOL.mask() } else { 0 })
            | DFH_TYPE.set(0, self.feature_type as u64)
    }

    fn from_reg_value(value: u64) -> Self {
        Self {
            id: DFH_ID.get(value) as u16,
            revision: DFH_REVISION.get(value) as u8,
            next_offset: DFH_NEXT_OFFSET.get(value) as u32,
            end_of_list: DFH_EOL.is_set(value),
            feature_type: DFH_TYPE.get(value) as u8,
        }
    }

    fn validate(&self) -> Result<(), &'static str> {
        if self.id > 0xFFF {
            return Err("Feature id must be <= 0xFFF (12 bits)");
        }
        if self.next_offset > 0xFF_FFFF {
            return Err("Next offset must fit in 24 bits");
        }
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_dfh_decode() {
        // Private feature 0x3, revision 1, next header 0x1000 away
        let raw = (3u64 << 60) | (0x1000u64 << 16) | (1 << 12) | 0x3;
        let dfh = DeviceFeatureHeader::from_reg_value(raw);

        assert_eq!(dfh.id, feature_id::GLOBAL_IPERF);
        assert_eq!(dfh.revision, 1);
        assert_eq!(dfh.next_offset, 0x1000);
        assert!(!dfh.end_of_list);
        assert_eq!(dfh.feature_type, types::PRIVATE);
        assert_eq!(dfh.to_reg_value(), raw);
    }
}
