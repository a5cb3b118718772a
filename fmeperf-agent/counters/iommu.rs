// IOMMU counters, first level (per port) and second level (SIP)

use std::time::Duration;

use super::{poll, CounterOps, SharedIo};
use fmeperf_raw::fme::iommu::{
    IommuControl, IommuCounter, VTD_CNTR, VTD_CTRL, VTD_SIP_CNTR, VTD_SIP_CTRL,
};
use fmeperf_raw::RegisterLayout;

fn read_iommu(
    io: &SharedIo,
    unit: &'static str,
    ctrl: u64,
    cntr: u64,
    code: u8,
    timeout: Duration,
) -> u64 {
    poll::select_and_wait(io.as_ref(), unit, ctrl, cntr, code, timeout, |raw| {
        let mut control = IommuControl::from_reg_value(raw);
        control.event = code;
        control.update(raw)
    })
    .map(|v| IommuCounter::from_reg_value(v).count)
    .unwrap_or(0)
}

pub struct IommuDriver {
    io: SharedIo,
    timeout: Duration,
}

impl IommuDriver {
    pub fn new(io: SharedIo, timeout: Duration) -> Self {
        Self { io, timeout }
    }
}

impl CounterOps for IommuDriver {
    // Per-port events occupy consecutive codes starting at the base event code
    fn read_counter(&self, event_id: u16, port: u8, _aux_data: u64) -> u64 {
        let code = (event_id as u8).wrapping_add(port);
        read_iommu(&self.io, "iommu", VTD_CTRL, VTD_CNTR, code, self.timeout)
    }
}

pub struct IommuSipDriver {
    io: SharedIo,
    timeout: Duration,
}

impl IommuSipDriver {
    pub fn new(io: SharedIo, timeout: Duration) -> Self {
        Self { io, timeout }
    }
}

impl CounterOps for IommuSipDriver {
    fn read_counter(&self, event_id: u16, _port: u8, _aux_data: u64) -> u64 {
        read_iommu(
            &self.io,
            "iommu sip",
            VTD_SIP_CTRL,
            VTD_SIP_CNTR,
            event_id as u8,
            self.timeout,
        )
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::testing::{SimulatedFme, Source};
    use fmeperf_raw::fme::iommu::{events, sip_events};

    #[test]
    fn test_first_level_offsets_code_by_port() {
        let fme = SimulatedFme::new();
        fme.set_count(Source::Iommu(events::DEVTLB_READ_HIT + 2), 42, 0);

        let driver = IommuDriver::new(fme.clone(), Duration::from_millis(1));
        assert_eq!(driver.read_counter(events::DEVTLB_READ_HIT as u16, 2, 0), 42);
        assert_eq!(
            IommuControl::from_reg_value(fme.raw(VTD_CTRL)).event,
            events::DEVTLB_READ_HIT + 2
        );
    }

    #[test]
    fn test_second_level_ignores_port() {
        let fme = SimulatedFme::new();
        fme.set_count(Source::IommuSip(sip_events::RCC_MISS), 7, 0);

        let driver = IommuSipDriver::new(fme.clone(), Duration::from_millis(1));
        assert_eq!(driver.read_counter(sip_events::RCC_MISS as u16, 0xFF, 0), 7);
        assert_eq!(fme.raw(VTD_CTRL), 0);
    }

    #[test]
    fn test_counter_masked_to_width() {
        let fme = SimulatedFme::new();
        fme.set_count(Source::IommuSip(sip_events::IOTLB_4K_HIT), (0xABu64 << 48) | 5, 0);

        let driver = IommuSipDriver::new(fme.clone(), Duration::from_millis(1));
        assert_eq!(driver.read_counter(sip_events::IOTLB_4K_HIT as u16, 0xFF, 0), 5);
    }
}
