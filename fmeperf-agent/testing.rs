// In-memory FME register window used by unit tests
//
// Programmable counters echo the event code selected in their control
// register, the way the hardware does once it has switched over, unless
// echoing is disabled to exercise poll timeouts.

use parking_lot::Mutex;
use std::collections::HashMap;
use std::sync::atomic::{AtomicBool, AtomicU64, Ordering};
use std::sync::Arc;

use fmeperf_raw::fme::cache::{self, CacheControl};
use fmeperf_raw::fme::fabric::{self, FabricControl};
use fmeperf_raw::fme::iommu::{self, IommuControl};
use fmeperf_raw::fme::{clock, PERF_WINDOW_LEN};
use fmeperf_raw::{RegisterIo, RegisterLayout};

/// Counter source selected by a control register
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum Source {
    /// (event code, channel)
    Cache(u8, u8),
    Fabric(u8),
    Iommu(u8),
    IommuSip(u8),
}

pub struct SimulatedFme {
    regs: Vec<AtomicU64>,
    counts: Mutex<HashMap<Source, (u64, u64)>>,
    echo: AtomicBool,
    ctrl_writes: Mutex<HashMap<u64, usize>>,
}

impl SimulatedFme {
    pub fn new() -> Arc<Self> {
        Arc::new(Self {
            regs: (0..PERF_WINDOW_LEN / 8).map(|_| AtomicU64::new(0)).collect(),
            counts: Mutex::new(HashMap::new()),
            echo: AtomicBool::new(true),
            ctrl_writes: Mutex::new(HashMap::new()),
        })
    }

    /// Set the raw count of a counter source; cache sources take both banks
    pub fn set_count(&self, source: Source, bank0: u64, bank1: u64) {
        self.counts.lock().insert(source, (bank0, bank1));
    }

    pub fn set_clock(&self, value: u64) {
        self.regs[(clock::CLK_CNTR / 8) as usize].store(value, Ordering::SeqCst);
    }

    /// Stop echoing selected event codes into counter registers
    pub fn stall(&self) {
        self.echo.store(false, Ordering::SeqCst);
    }

    pub fn raw(&self, offset: u64) -> u64 {
        self.regs[(offset / 8) as usize].load(Ordering::SeqCst)
    }

    pub fn set_raw(&self, offset: u64, value: u64) {
        self.regs[(offset / 8) as usize].store(value, Ordering::SeqCst);
    }

    /// Number of writes seen by the register at `offset`
    pub fn writes(&self, offset: u64) -> usize {
        self.ctrl_writes.lock().get(&offset).copied().unwrap_or(0)
    }

    pub fn fabric_control(&self) -> FabricControl {
        FabricControl::from_reg_value(self.raw(fabric::FAB_CTRL))
    }

    fn tagged(&self, code: u8, source: Source, second_bank: bool) -> u64 {
        let (bank0, bank1) = self.counts.lock().get(&source).copied().unwrap_or((0, 0));
        let count = if second_bank { bank1 } else { bank0 };
        // Without an echo the counter keeps reporting a stale code
        let tag = if self.echo.load(Ordering::SeqCst) {
            code
        } else {
            code ^ 0xF
        };
        ((tag as u64) << 60) | (count & ((1u64 << 60) - 1))
    }
}

impl RegisterIo for SimulatedFme {
    fn read64(&self, offset: u64) -> u64 {
        match offset {
            cache::CACHE_CNTR0 | cache::CACHE_CNTR1 => {
                let ctrl = CacheControl::from_reg_value(self.raw(cache::CACHE_CTRL));
                let source = Source::Cache(ctrl.event, ctrl.channel);
                self.tagged(ctrl.event, source, offset == cache::CACHE_CNTR1)
            }
            fabric::FAB_CNTR => {
                let ctrl = FabricControl::from_reg_value(self.raw(fabric::FAB_CTRL));
                self.tagged(ctrl.event, Source::Fabric(ctrl.event), false)
            }
            iommu::VTD_CNTR => {
                let ctrl = IommuControl::from_reg_value(self.raw(iommu::VTD_CTRL));
                self.tagged(ctrl.event, Source::Iommu(ctrl.event), false)
            }
            iommu::VTD_SIP_CNTR => {
                let ctrl = IommuControl::from_reg_value(self.raw(iommu::VTD_SIP_CTRL));
                self.tagged(ctrl.event, Source::IommuSip(ctrl.event), false)
            }
            _ if offset < PERF_WINDOW_LEN => self.raw(offset),
            _ => u64::MAX,
        }
    }

    fn write64(&self, offset: u64, value: u64) {
        if offset >= PERF_WINDOW_LEN || offset == clock::CLK_CNTR {
            return;
        }
        *self.ctrl_writes.lock().entry(offset).or_insert(0) += 1;
        self.set_raw(offset, value);
    }
}

/// Flat register file for DFH walking tests
pub struct FlatRegisters {
    regs: Vec<AtomicU64>,
}

impl FlatRegisters {
    pub fn new(len: u64) -> Arc<Self> {
        Arc::new(Self {
            regs: (0..len / 8).map(|_| AtomicU64::new(0)).collect(),
        })
    }
}

impl RegisterIo for FlatRegisters {
    fn read64(&self, offset: u64) -> u64 {
        self.regs
            .get((offset / 8) as usize)
            .map(|r| r.load(Ordering::SeqCst))
            .unwrap_or(u64::MAX)
    }

    fn write64(&self, offset: u64, value: u64) {
        if let Some(r) = self.regs.get((offset / 8) as usize) {
            r.store(value, Ordering::SeqCst);
        }
    }
}
