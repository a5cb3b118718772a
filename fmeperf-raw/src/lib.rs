//! # fmeperf-raw
//!
//! Register definitions for the performance counters of an FPGA Management
//! Engine (FME), as found in Device Feature List (DFL) based FPGA cards.
//!
//! This crate provides type-safe layouts for the global performance feature's
//! control and counter registers, the Device Feature Header used to locate the
//! feature, and a small memory-mapped I/O abstraction to access them.
//!
//! ## Usage
//!
//! ```ignore
//! use fmeperf_raw::fme::cache::{self, CacheControl};
//! use fmeperf_raw::{Mmio, RegisterIo, RegisterLayout};
//!
//! let bar = Mmio::open("/sys/bus/pci/devices/0000:5e:00.0/resource0")?;
//! let raw = bar.read64(cache::CACHE_CTRL);
//!
//! let mut ctrl = CacheControl::from_reg_value(raw);
//! ctrl.event = cache::events::READ_HIT;
//! bar.write64(cache::CACHE_CTRL, ctrl.update(raw));
//! ```

pub mod fme;
pub mod mmio;
pub mod register;

// Re-export for convenience
pub use mmio::{Mmio, MmioError, RegisterIo, Result, Window};
pub use register::{BitField, RegisterLayout};
