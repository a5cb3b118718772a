// Macros (must be first for visibility)
#[macro_use]
pub mod macros;

pub mod catalog;
pub mod common;
pub mod config;
pub mod counters;
pub mod error;
pub mod orchestrator;
pub mod pmu;
pub mod prom;
pub mod session;

#[cfg(test)]
pub(crate) mod testing;

pub use catalog::{EventCatalog, EventDescriptor, EventType, PerfFlavor, Scope};
pub use common::FmeDevice;
pub use config::{EventSelector, ExportConfig};
pub use error::{FmePerfError, Result};
pub use orchestrator::{CollectorConfig, MetricCollector};
pub use pmu::{EventHandle, EventRequest, FmePmu};
pub use prom::FmeMetricExporter;
