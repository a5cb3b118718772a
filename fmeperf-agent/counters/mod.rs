// Register access drivers, one per counter type
//
// Dispatch is a match over the closed set of event types; each driver
// implements the same capability set through `CounterOps`.

pub mod arbiter;
pub mod basic;
pub mod cache;
pub mod fabric;
pub mod iommu;
mod poll;

pub use arbiter::{FabricArbiter, FabricMode};
pub use basic::BasicDriver;
pub use cache::CacheDriver;
pub use fabric::FabricDriver;
pub use iommu::{IommuDriver, IommuSipDriver};

use std::sync::Arc;
use std::time::Duration;

use crate::catalog::EventType;
use crate::error::Result;
use fmeperf_raw::fme::PERF_TIMEOUT_US;
use fmeperf_raw::RegisterIo;

/// Register window of the global performance feature, shared by all drivers
pub type SharedIo = Arc<dyn RegisterIo>;

/// Default bound for the event-code echo poll
pub const DEFAULT_POLL_TIMEOUT: Duration = Duration::from_micros(PERF_TIMEOUT_US);

/// Capability set of a counter type
pub trait CounterOps {
    /// Prepare the hardware for a session on `port`
    fn init(&self, _port: u8) -> Result<()> {
        Ok(())
    }

    /// Release whatever `init` acquired
    fn destroy(&self, _port: u8) {}

    /// Current raw counter value for an event
    ///
    /// Never fails: a counter that does not switch to the requested event in
    /// time reads as 0.
    fn read_counter(&self, event_id: u16, port: u8, aux_data: u64) -> u64;
}

/// The drivers of one device instance
pub struct CounterDrivers {
    basic: BasicDriver,
    cache: CacheDriver,
    fabric: FabricDriver,
    iommu: IommuDriver,
    iommu_sip: IommuSipDriver,
}

impl CounterDrivers {
    pub fn new(io: SharedIo, poll_timeout: Duration) -> Self {
        Self {
            basic: BasicDriver::new(Arc::clone(&io)),
            cache: CacheDriver::new(Arc::clone(&io), poll_timeout),
            fabric: FabricDriver::new(Arc::clone(&io), poll_timeout),
            iommu: IommuDriver::new(Arc::clone(&io), poll_timeout),
            iommu_sip: IommuSipDriver::new(io, poll_timeout),
        }
    }

    pub fn init(&self, event_type: EventType, port: u8) -> Result<()> {
        match event_type {
            EventType::Basic => self.basic.init(port),
            EventType::Cache => self.cache.init(port),
            EventType::Fabric => self.fabric.init(port),
            EventType::IommuFirstLevel => self.iommu.init(port),
            EventType::IommuSecondLevel => self.iommu_sip.init(port),
        }
    }

    pub fn destroy(&self, event_type: EventType, port: u8) {
        match event_type {
            EventType::Basic => self.basic.destroy(port),
            EventType::Cache => self.cache.destroy(port),
            EventType::Fabric => self.fabric.destroy(port),
            EventType::IommuFirstLevel => self.iommu.destroy(port),
            EventType::IommuSecondLevel => self.iommu_sip.destroy(port),
        }
    }

    pub fn read_counter(&self, event_type: EventType, event_id: u16, port: u8, aux: u64) -> u64 {
        match event_type {
            EventType::Basic => self.basic.read_counter(event_id, port, aux),
            EventType::Cache => self.cache.read_counter(event_id, port, aux),
            EventType::Fabric => self.fabric.read_counter(event_id, port, aux),
            EventType::IommuFirstLevel => self.iommu.read_counter(event_id, port, aux),
            EventType::IommuSecondLevel => self.iommu_sip.read_counter(event_id, port, aux),
        }
    }

    pub fn fabric_arbiter(&self) -> &FabricArbiter {
        self.fabric.arbiter()
    }
}
