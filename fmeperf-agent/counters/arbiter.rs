// Fabric counter mode arbitration
//
// The fabric counter bank observes either the aggregate of all ports or a
// single port. Sessions opened while the bank is in use must agree with the
// current mode; a new mode is only programmed when nobody depends on the old
// one.

use parking_lot::Mutex;

use super::SharedIo;
use crate::error::{FmePerfError, Result};
use fmeperf_raw::fme::fabric::{FabricControl, FAB_CTRL};
use fmeperf_raw::fme::PORTID_ROOT;
use fmeperf_raw::RegisterLayout;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum FabricMode {
    Aggregate,
    Port(u8),
}

impl FabricMode {
    pub fn classify(port: u8) -> Self {
        if port == PORTID_ROOT {
            FabricMode::Aggregate
        } else {
            FabricMode::Port(port)
        }
    }

    fn from_control(ctrl: &FabricControl) -> Self {
        if ctrl.port_filter {
            FabricMode::Port(ctrl.port_id)
        } else {
            FabricMode::Aggregate
        }
    }
}

#[derive(Debug)]
struct ArbiterState {
    current_mode: FabricMode,
    active_users: u32,
}

pub struct FabricArbiter {
    io: SharedIo,
    state: Mutex<ArbiterState>,
}

impl FabricArbiter {
    /// Create the arbiter, adopting the mode the hardware is currently in
    pub fn new(io: SharedIo) -> Self {
        let ctrl = FabricControl::from_reg_value(io.read64(FAB_CTRL));
        let current_mode = FabricMode::from_control(&ctrl);
        tracing::debug!("Fabric counters start in {:?} mode", current_mode);

        Self {
            io,
            state: Mutex::new(ArbiterState {
                current_mode,
                active_users: 0,
            }),
        }
    }

    /// Take a slot for a session observing `port`
    ///
    /// Fails with `Busy` if other sessions hold the bank in a different mode.
    pub fn open(&self, port: u8) -> Result<()> {
        let requested = FabricMode::classify(port);
        let mut state = self.state.lock();

        if state.active_users > 0 && state.current_mode != requested {
            tracing::warn!(
                "Fabric counters busy: {} session(s) in {:?} mode, requested {:?}",
                state.active_users,
                state.current_mode,
                requested
            );
            return Err(FmePerfError::Busy(format!(
                "fabric counters in use in {:?} mode",
                state.current_mode
            )));
        }

        state.active_users += 1;
        if state.current_mode == requested {
            return Ok(());
        }

        state.current_mode = requested;
        self.program_filter(requested);
        Ok(())
    }

    /// Release a slot taken by `open`; the hardware mode is left as is
    pub fn close(&self) {
        let mut state = self.state.lock();
        match state.active_users.checked_sub(1) {
            Some(users) => state.active_users = users,
            None => tracing::warn!("Unbalanced fabric arbiter close"),
        }
    }

    pub fn mode(&self) -> FabricMode {
        self.state.lock().current_mode
    }

    pub fn active_users(&self) -> u32 {
        self.state.lock().active_users
    }

    fn program_filter(&self, mode: FabricMode) {
        let raw = self.io.read64(FAB_CTRL);
        let mut ctrl = FabricControl::from_reg_value(raw);
        match mode {
            FabricMode::Aggregate => ctrl.port_filter = false,
            FabricMode::Port(port) => {
                ctrl.port_filter = true;
                ctrl.port_id = port;
            }
        }
        self.io.write64(FAB_CTRL, ctrl.update(raw));
        tracing::info!("Fabric counters switched to {:?} mode", mode);
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::testing::SimulatedFme;
    use std::sync::Arc;

    #[test]
    fn test_conflicting_port_is_busy() {
        let fme = SimulatedFme::new();
        let arbiter = FabricArbiter::new(fme.clone());

        arbiter.open(0).unwrap();
        assert!(matches!(arbiter.open(1), Err(FmePerfError::Busy(_))));
        assert_eq!(arbiter.active_users(), 1);
        assert_eq!(arbiter.mode(), FabricMode::Port(0));
    }

    #[test]
    fn test_same_port_shares_the_bank() {
        let fme = SimulatedFme::new();
        let arbiter = FabricArbiter::new(fme.clone());

        arbiter.open(2).unwrap();
        arbiter.open(2).unwrap();
        assert_eq!(arbiter.active_users(), 2);
        // One reprogramming for the first open only
        assert_eq!(fme.writes(FAB_CTRL), 1);
    }

    #[test]
    fn test_mode_switch_after_last_close() {
        let fme = SimulatedFme::new();
        let arbiter = FabricArbiter::new(fme.clone());

        arbiter.open(1).unwrap();
        arbiter.open(1).unwrap();
        arbiter.close();
        assert!(arbiter.open(3).is_err());
        arbiter.close();
        assert_eq!(arbiter.active_users(), 0);
        // Closing leaves the hardware alone
        assert_eq!(arbiter.mode(), FabricMode::Port(1));

        arbiter.open(3).unwrap();
        let ctrl = fme.fabric_control();
        assert!(ctrl.port_filter);
        assert_eq!(ctrl.port_id, 3);
    }

    #[test]
    fn test_aggregate_disables_filter() {
        let fme = SimulatedFme::new();
        fme.set_raw(FAB_CTRL, (1 << 23) | (1 << 20) | (0x4 << 16));
        let arbiter = FabricArbiter::new(fme.clone());
        assert_eq!(arbiter.mode(), FabricMode::Port(1));

        arbiter.open(PORTID_ROOT).unwrap();
        let ctrl = fme.fabric_control();
        assert!(!ctrl.port_filter);
        assert_eq!(ctrl.event, 0x4);
        assert_eq!(arbiter.mode(), FabricMode::Aggregate);
    }

    #[test]
    fn test_initial_mode_needs_no_reprogramming() {
        let fme = SimulatedFme::new();
        let arbiter = FabricArbiter::new(fme.clone());
        assert_eq!(arbiter.mode(), FabricMode::Aggregate);

        arbiter.open(PORTID_ROOT).unwrap();
        assert_eq!(fme.writes(FAB_CTRL), 0);
    }

    #[test]
    fn test_unbalanced_close_saturates() {
        let fme = SimulatedFme::new();
        let arbiter = FabricArbiter::new(fme);
        arbiter.close();
        assert_eq!(arbiter.active_users(), 0);
    }

    #[test]
    fn test_concurrent_opens_agree_on_one_mode() {
        let fme = SimulatedFme::new();
        let arbiter = Arc::new(FabricArbiter::new(fme.clone()));

        let handles: Vec<_> = (0..8u8)
            .map(|i| {
                let arbiter = Arc::clone(&arbiter);
                std::thread::spawn(move || arbiter.open(i % 2).is_ok())
            })
            .collect();

        let opened = handles
            .into_iter()
            .map(|h| h.join().unwrap())
            .filter(|ok| *ok)
            .count();

        assert_eq!(opened as u32, arbiter.active_users());
        assert_eq!(opened, 4);
        let FabricMode::Port(port) = arbiter.mode() else {
            panic!("fabric left in aggregate mode");
        };
        assert_eq!(fme.fabric_control().port_id, port);
    }
}
