// Select/poll/read handshake shared by the programmable counters

use std::time::{Duration, Instant};

use fmeperf_raw::fme::COUNTER_EVENT;
use fmeperf_raw::RegisterIo;

/// Program an event selector and wait for the counter to echo it
///
/// `select` receives the current control register value and returns the
/// value to write back, so unrelated bits survive. Returns the first counter
/// value carrying `code` in its tag, or `None` once `timeout` has elapsed.
/// Busy-polls; never sleeps.
pub(crate) fn select_and_wait(
    io: &dyn RegisterIo,
    unit: &'static str,
    ctrl: u64,
    cntr: u64,
    code: u8,
    timeout: Duration,
    select: impl FnOnce(u64) -> u64,
) -> Option<u64> {
    let current = io.read64(ctrl);
    let value = select(current);
    io.write64(ctrl, value);
    tracing::debug!(
        "{} select: ctrl 0x{:02x} 0x{:016x} -> 0x{:016x}",
        unit,
        ctrl,
        current,
        value
    );

    let deadline = Instant::now() + timeout;
    loop {
        let v = io.read64(cntr);
        if COUNTER_EVENT.get(v) == code as u64 {
            return Some(v);
        }
        if Instant::now() >= deadline {
            tracing::warn!(
                "{} timeout: unmatched event code 0x{:x} in counter register 0x{:02x} (got 0x{:x})",
                unit,
                code,
                cntr,
                COUNTER_EVENT.get(v)
            );
            return None;
        }
        std::hint::spin_loop();
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::testing::{SimulatedFme, Source};
    use fmeperf_raw::fme::fabric::{self, FabricControl};
    use fmeperf_raw::RegisterLayout;

    fn select_fabric(code: u8) -> impl FnOnce(u64) -> u64 {
        move |raw| {
            let mut ctrl = FabricControl::from_reg_value(raw);
            ctrl.event = code;
            ctrl.update(raw)
        }
    }

    #[test]
    fn test_select_preserves_unrelated_bits() {
        let fme = SimulatedFme::new();
        fme.set_raw(fabric::FAB_CTRL, (1 << 23) | (2 << 20) | (1 << 40));
        fme.set_count(Source::Fabric(0x6), 77, 0);

        let v = select_and_wait(
            &*fme,
            "fabric",
            fabric::FAB_CTRL,
            fabric::FAB_CNTR,
            0x6,
            Duration::from_millis(1),
            select_fabric(0x6),
        )
        .unwrap();

        assert_eq!(v & 0xFFFF, 77);
        assert_eq!(fme.raw(fabric::FAB_CTRL), (1 << 23) | (2 << 20) | (1 << 40) | (0x6 << 16));
    }

    #[test]
    fn test_poll_times_out() {
        let fme = SimulatedFme::new();
        fme.stall();

        let timeout = Duration::from_micros(30);
        let start = Instant::now();
        let result = select_and_wait(
            &*fme,
            "fabric",
            fabric::FAB_CTRL,
            fabric::FAB_CNTR,
            0x1,
            timeout,
            select_fabric(0x1),
        );

        assert!(result.is_none());
        assert!(start.elapsed() < Duration::from_secs(1));
    }
}
