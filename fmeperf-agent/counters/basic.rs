// Basic counters: the free-running clock

use super::{CounterOps, SharedIo};
use fmeperf_raw::fme::clock::CLK_CNTR;

pub struct BasicDriver {
    io: SharedIo,
}

impl BasicDriver {
    pub fn new(io: SharedIo) -> Self {
        Self { io }
    }
}

impl CounterOps for BasicDriver {
    fn read_counter(&self, _event_id: u16, _port: u8, _aux_data: u64) -> u64 {
        self.io.read64(CLK_CNTR)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::testing::SimulatedFme;

    #[test]
    fn test_clock_reads_full_register() {
        let fme = SimulatedFme::new();
        fme.set_clock(u64::MAX - 5);

        let driver = BasicDriver::new(fme.clone());
        assert_eq!(driver.read_counter(0, 0xFF, 0), u64::MAX - 5);
    }
}
