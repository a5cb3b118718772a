// Cache counters
//
// The count of one event is split across two banks; the driver selects
// event code and channel, waits for bank 0 to echo the code and returns the
// sum of both banks.

use std::time::Duration;

use super::{poll, CounterOps, SharedIo};
use fmeperf_raw::fme::cache::{CacheControl, CacheCounter, CACHE_CNTR0, CACHE_CNTR1, CACHE_CTRL};
use fmeperf_raw::RegisterLayout;

pub struct CacheDriver {
    io: SharedIo,
    timeout: Duration,
}

impl CacheDriver {
    pub fn new(io: SharedIo, timeout: Duration) -> Self {
        Self { io, timeout }
    }
}

impl CounterOps for CacheDriver {
    fn read_counter(&self, event_id: u16, _port: u8, aux_data: u64) -> u64 {
        let code = event_id as u8;
        let channel = aux_data as u8;

        let bank0 = poll::select_and_wait(
            self.io.as_ref(),
            "cache",
            CACHE_CTRL,
            CACHE_CNTR0,
            code,
            self.timeout,
            |raw| {
                let mut ctrl = CacheControl::from_reg_value(raw);
                ctrl.event = code;
                ctrl.channel = channel;
                ctrl.update(raw)
            },
        );

        match bank0 {
            Some(bank0) => {
                let bank1 = self.io.read64(CACHE_CNTR1);
                CacheCounter::from_reg_value(bank0).count + CacheCounter::from_reg_value(bank1).count
            }
            None => 0,
        }
    }
}
