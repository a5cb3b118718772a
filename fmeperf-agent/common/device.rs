// FME device access: maps BAR 0 and narrows it to the global perf feature

use std::sync::Arc;
use std::time::Duration;

use fmeperf_raw::fme::PERF_WINDOW_LEN;
use fmeperf_raw::{Mmio, RegisterIo, Window};

use super::dfl;
use super::pci::{self, PciAddress, PciDevice, FME_BAR};
use crate::catalog::PerfFlavor;
use crate::counters::SharedIo;
use crate::error::{FmePerfError, Result};
use crate::pmu::FmePmu;

pub struct FmeDevice {
    address: PciAddress,
    flavor: PerfFlavor,
    feature_offset: u64,
    io: SharedIo,
}

impl FmeDevice {
    /// Map the FME of the FPGA PF at `address`
    pub fn open(address: PciAddress) -> Result<Self> {
        let device = PciDevice::open(address)?;
        if !device.is_fpga_pf() {
            tracing::warn!(
                "{} ({:04x}:{:04x}) is not a known FPGA PF, trying anyway",
                address,
                device.vendor_id,
                device.device_id
            );
        }

        let bar = Mmio::open(device.resource_path(FME_BAR))?;
        let region_len = bar.len();
        Self::from_bar(address, Arc::new(bar), region_len)
    }

    /// Open the first FPGA PF found in sysfs
    pub fn discover() -> Result<Self> {
        let devices = pci::scan_fpga_devices()?;
        let device = devices
            .first()
            .ok_or_else(|| FmePerfError::PciError("no FPGA device found".to_string()))?;

        if devices.len() > 1 {
            tracing::info!(
                "Found {} FPGA devices, using {} (select another with --device)",
                devices.len(),
                device.address
            );
        }
        Self::open(device.address)
    }

    /// Build a device from an already mapped FME BAR of `region_len` bytes
    pub fn from_bar<T>(address: PciAddress, bar: Arc<T>, region_len: u64) -> Result<Self>
    where
        T: RegisterIo + 'static,
    {
        let (feature_offset, flavor) = dfl::find_perf_feature(&*bar, region_len)?;
        let window = Window::new(bar, feature_offset, PERF_WINDOW_LEN, region_len)?;

        tracing::info!(
            "FME {}: {:?} performance feature at 0x{:x}",
            address,
            flavor,
            feature_offset
        );

        Ok(Self {
            address,
            flavor,
            feature_offset,
            io: Arc::new(window),
        })
    }

    /// PMU name derived from the PCI address, e.g. `dfl_fme_5e_00_0`
    pub fn pmu_name(&self) -> String {
        format!(
            "dfl_fme_{:02x}_{:02x}_{}",
            self.address.bus, self.address.device, self.address.function
        )
    }

    /// Register a PMU for this device, reading counters on `cpu`
    pub fn attach(&self, cpu: u32, poll_timeout: Duration) -> Result<FmePmu> {
        FmePmu::attach(
            self.pmu_name(),
            Arc::clone(&self.io),
            self.flavor,
            cpu,
            poll_timeout,
        )
    }

    pub fn address(&self) -> PciAddress {
        self.address
    }

    pub fn flavor(&self) -> PerfFlavor {
        self.flavor
    }

    pub fn feature_offset(&self) -> u64 {
        self.feature_offset
    }

    pub fn io(&self) -> &SharedIo {
        &self.io
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::counters::DEFAULT_POLL_TIMEOUT;
    use crate::pmu::{EventConfig, EventRequest, PERF_EF_START};
    use crate::testing::FlatRegisters;
    use fmeperf_raw::fme::dfh::{feature_id, types, DeviceFeatureHeader};
    use fmeperf_raw::fme::{clock, PORTID_ROOT};
    use fmeperf_raw::RegisterLayout;

    const BAR_LEN: u64 = 0x3000;
    const PERF_OFFSET: u64 = 0x2000;

    fn address() -> PciAddress {
        "0000:5e:00.0".parse().unwrap()
    }

    fn fme_bar(perf_id: u16) -> Arc<FlatRegisters> {
        let header = |id: u16, feature_type: u8, next_offset: u32, end_of_list: bool| {
            DeviceFeatureHeader {
                id,
                revision: 0,
                next_offset,
                end_of_list,
                feature_type,
            }
            .to_reg_value()
        };

        let bar = FlatRegisters::new(BAR_LEN);
        bar.write64(0x0, header(feature_id::FME_HEADER, types::FIU, 0x1000, false));
        bar.write64(0x1000, header(feature_id::POWER_MGMT, types::PRIVATE, 0x1000, false));
        bar.write64(PERF_OFFSET, header(perf_id, types::PRIVATE, 0, true));
        bar
    }

    #[test]
    fn test_from_bar_locates_perf_window() {
        let bar = fme_bar(feature_id::GLOBAL_IPERF);
        let device = FmeDevice::from_bar(address(), Arc::clone(&bar), BAR_LEN).unwrap();

        assert_eq!(device.flavor(), PerfFlavor::Integrated);
        assert_eq!(device.feature_offset(), PERF_OFFSET);
        assert_eq!(device.pmu_name(), "dfl_fme_5e_00_0");

        bar.write64(PERF_OFFSET + clock::CLK_CNTR, 42);
        assert_eq!(device.io().read64(clock::CLK_CNTR), 42);
    }

    #[test]
    fn test_attach_and_count_clock() {
        let bar = fme_bar(feature_id::GLOBAL_DPERF);
        let device = FmeDevice::from_bar(address(), Arc::clone(&bar), BAR_LEN).unwrap();
        let pmu = device.attach(0, DEFAULT_POLL_TIMEOUT).unwrap();
        assert_eq!(pmu.catalog().flavor(), PerfFlavor::Discrete);

        let config = EventConfig {
            event_id: 0,
            event_type: 0,
            port: PORTID_ROOT,
        };
        let handle = pmu
            .event_init(&EventRequest::counting(config.encode(), 0))
            .unwrap();

        bar.write64(PERF_OFFSET + clock::CLK_CNTR, 1_000);
        pmu.add(handle, PERF_EF_START).unwrap();
        bar.write64(PERF_OFFSET + clock::CLK_CNTR, 4_000);
        assert_eq!(pmu.read(handle).unwrap(), 3_000);
    }

    #[test]
    fn test_window_must_fit_in_bar() {
        let bar = FlatRegisters::new(0x1000);
        let header = DeviceFeatureHeader {
            id: feature_id::GLOBAL_IPERF,
            revision: 0,
            next_offset: 0,
            end_of_list: true,
            feature_type: types::PRIVATE,
        };
        let fme_header = DeviceFeatureHeader {
            id: feature_id::FME_HEADER,
            next_offset: 0xFF8,
            end_of_list: false,
            feature_type: types::FIU,
            ..header
        };
        bar.write64(0x0, fme_header.to_reg_value());
        bar.write64(0xFF8, header.to_reg_value());

        assert!(matches!(
            FmeDevice::from_bar(address(), bar, 0x1000),
            Err(FmePerfError::MmioError(_))
        ));
    }
}
