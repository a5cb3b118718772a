// Device Feature List walking
//
// The FME BAR starts with the FME header; private features are chained
// behind it through relative next offsets.

use fmeperf_raw::fme::dfh::{self, DeviceFeatureHeader};
use fmeperf_raw::{RegisterIo, RegisterLayout};

use crate::catalog::PerfFlavor;
use crate::error::{FmePerfError, Result};

/// Upper bound on the headers visited, guards against corrupt chains
const MAX_FEATURES: usize = 64;

/// A feature header and where it lives in the BAR
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct Feature {
    pub offset: u64,
    pub header: DeviceFeatureHeader,
}

impl Feature {
    pub fn is_private(&self) -> bool {
        self.header.feature_type == dfh::types::PRIVATE
    }
}

/// Collect every header of the list starting at offset 0
pub fn walk(io: &dyn RegisterIo, region_len: u64) -> Result<Vec<Feature>> {
    let mut features = Vec::new();
    let mut offset = 0u64;

    loop {
        let raw = io.read64(offset);
        if raw == u64::MAX {
            return Err(FmePerfError::AttachError(format!(
                "no device feature header at 0x{offset:x}"
            )));
        }

        let header = DeviceFeatureHeader::from_reg_value(raw);
        tracing::debug!(
            "DFH at 0x{:x}: type {} id 0x{:x} rev {} next 0x{:x}{}",
            offset,
            header.feature_type,
            header.id,
            header.revision,
            header.next_offset,
            if header.end_of_list { " (eol)" } else { "" }
        );
        features.push(Feature { offset, header });

        if header.end_of_list || header.next_offset == 0 {
            break;
        }
        if features.len() >= MAX_FEATURES {
            return Err(FmePerfError::AttachError(format!(
                "feature list longer than {MAX_FEATURES} entries"
            )));
        }

        offset += header.next_offset as u64;
        if offset.saturating_add(8) > region_len {
            return Err(FmePerfError::AttachError(format!(
                "feature header offset 0x{offset:x} beyond region of 0x{region_len:x} bytes"
            )));
        }
    }

    Ok(features)
}

/// Locate the global performance feature and tell which flavor it is
pub fn find_perf_feature(io: &dyn RegisterIo, region_len: u64) -> Result<(u64, PerfFlavor)> {
    walk(io, region_len)?
        .into_iter()
        .filter(Feature::is_private)
        .find_map(|f| PerfFlavor::from_feature_id(f.header.id).map(|flavor| (f.offset, flavor)))
        .ok_or_else(|| {
            FmePerfError::NotFound("FME has no global performance feature".to_string())
        })
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::testing::FlatRegisters;
    use dfh::{feature_id, types};

    fn header(id: u16, feature_type: u8, next_offset: u32, end_of_list: bool) -> u64 {
        DeviceFeatureHeader {
            id,
            revision: 1,
            next_offset,
            end_of_list,
            feature_type,
        }
        .to_reg_value()
    }

    #[test]
    fn test_find_integrated_perf() {
        let regs = FlatRegisters::new(0x4000);
        regs.write64(0x0, header(feature_id::FME_HEADER, types::FIU, 0x1000, false));
        regs.write64(0x1000, header(feature_id::THERMAL_MGMT, types::PRIVATE, 0x1000, false));
        regs.write64(0x2000, header(feature_id::GLOBAL_IPERF, types::PRIVATE, 0x1000, false));
        regs.write64(0x3000, header(feature_id::GLOBAL_ERROR, types::PRIVATE, 0, true));

        assert_eq!(walk(&*regs, 0x4000).unwrap().len(), 4);
        assert_eq!(
            find_perf_feature(&*regs, 0x4000).unwrap(),
            (0x2000, PerfFlavor::Integrated)
        );
    }

    #[test]
    fn test_find_discrete_perf() {
        let regs = FlatRegisters::new(0x2000);
        regs.write64(0x0, header(feature_id::FME_HEADER, types::FIU, 0x1000, false));
        regs.write64(0x1000, header(feature_id::GLOBAL_DPERF, types::PRIVATE, 0, true));

        assert_eq!(
            find_perf_feature(&*regs, 0x2000).unwrap(),
            (0x1000, PerfFlavor::Discrete)
        );
    }

    #[test]
    fn test_fiu_header_id_is_not_a_feature() {
        // The FME header's id space differs from private feature ids
        let regs = FlatRegisters::new(0x2000);
        regs.write64(0x0, header(feature_id::GLOBAL_IPERF, types::FIU, 0x1000, false));
        regs.write64(0x1000, header(feature_id::PR_MGMT, types::PRIVATE, 0, true));

        assert!(matches!(
            find_perf_feature(&*regs, 0x2000),
            Err(FmePerfError::NotFound(_))
        ));
    }

    #[test]
    fn test_chain_beyond_region() {
        let regs = FlatRegisters::new(0x2000);
        regs.write64(0x0, header(feature_id::FME_HEADER, types::FIU, 0x4000, false));

        assert!(matches!(
            walk(&*regs, 0x2000),
            Err(FmePerfError::AttachError(_))
        ));
    }

    #[test]
    fn test_endless_chain_is_bounded() {
        let regs = FlatRegisters::new(0x2000);
        regs.write64(0x0, header(feature_id::FME_HEADER, types::FIU, 0x8, false));
        for i in 1..0x400 {
            regs.write64(i * 8, header(feature_id::THERMAL_MGMT, types::PRIVATE, 0x8, false));
        }

        assert!(matches!(
            walk(&*regs, 0x2000),
            Err(FmePerfError::AttachError(_))
        ));
    }

    #[test]
    fn test_unbacked_header() {
        let regs = FlatRegisters::new(0x10);
        regs.write64(0x0, u64::MAX);
        assert!(walk(&*regs, 0x10).is_err());
    }
}
