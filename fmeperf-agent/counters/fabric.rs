// Fabric counters
//
// Port filtering is fixed when a session opens (see `FabricArbiter`), so a
// read only selects the event code.

use std::sync::Arc;
use std::time::Duration;

use super::{poll, CounterOps, FabricArbiter, SharedIo};
use crate::error::Result;
use fmeperf_raw::fme::fabric::{FabricControl, FabricCounter, FAB_CNTR, FAB_CTRL};
use fmeperf_raw::RegisterLayout;

pub struct FabricDriver {
    io: SharedIo,
    arbiter: FabricArbiter,
    timeout: Duration,
}

impl FabricDriver {
    pub fn new(io: SharedIo, timeout: Duration) -> Self {
        Self {
            arbiter: FabricArbiter::new(Arc::clone(&io)),
            io,
            timeout,
        }
    }

    pub fn arbiter(&self) -> &FabricArbiter {
        &self.arbiter
    }
}

impl CounterOps for FabricDriver {
    fn init(&self, port: u8) -> Result<()> {
        self.arbiter.open(port)
    }

    fn destroy(&self, _port: u8) {
        self.arbiter.close()
    }

    fn read_counter(&self, event_id: u16, _port: u8, _aux_data: u64) -> u64 {
        let code = event_id as u8;
        poll::select_and_wait(
            self.io.as_ref(),
            "fabric",
            FAB_CTRL,
            FAB_CNTR,
            code,
            self.timeout,
            |raw| {
                let mut ctrl = FabricControl::from_reg_value(raw);
                ctrl.event = code;
                ctrl.update(raw)
            },
        )
        .map(|v| FabricCounter::from_reg_value(v).count)
        .unwrap_or(0)
    }
}
