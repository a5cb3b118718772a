// Per-open-event counter state
//
// A session folds hardware counter snapshots into a 64-bit total. Counters
// are narrower than 64 bits, so deltas are computed modulo the counter width.

use crate::catalog::{EventDescriptor, EventRef, EventType};
use crate::counters::CounterDrivers;

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum SessionState {
    Stopped,
    Running,
}

/// Difference between two snapshots of a `width`-bit counter
pub fn counter_delta(prev: u64, now: u64, width: u32) -> u64 {
    let mask = if width >= 64 {
        u64::MAX
    } else {
        (1u64 << width) - 1
    };
    (now & mask).wrapping_sub(prev & mask) & mask
}

#[derive(Debug, Clone)]
pub struct CounterSession {
    event: EventRef,
    event_type: EventType,
    event_id: u16,
    port: u8,
    aux_data: u64,
    width: u32,
    previous_snapshot: u64,
    accumulated: u64,
    state: SessionState,
}

impl CounterSession {
    pub fn new(event: EventRef, descriptor: &EventDescriptor, port: u8) -> Self {
        Self {
            event,
            event_type: descriptor.event_type,
            event_id: descriptor.id,
            port,
            aux_data: descriptor.aux_data,
            width: descriptor.event_type.counter_width(),
            previous_snapshot: 0,
            accumulated: 0,
            state: SessionState::Stopped,
        }
    }

    /// Take a fresh snapshot; the accumulated total is kept
    pub fn start(&mut self, drivers: &CounterDrivers) {
        self.previous_snapshot = self.read_hardware(drivers);
        self.state = SessionState::Running;
    }

    /// Fold the counter progress since the last snapshot into the total
    pub fn update(&mut self, drivers: &CounterDrivers) -> u64 {
        let now = self.read_hardware(drivers);
        self.fold(now)
    }

    /// Current total; a stopped session is not sampled again
    pub fn read(&mut self, drivers: &CounterDrivers) -> u64 {
        if self.state == SessionState::Running {
            self.update(drivers);
        }
        self.accumulated
    }

    /// Stop counting, folding the final progress first when `update` is set
    pub fn stop(&mut self, drivers: &CounterDrivers, update: bool) {
        if self.state == SessionState::Stopped {
            return;
        }
        if update {
            self.update(drivers);
        }
        self.state = SessionState::Stopped;
    }

    /// Apply a new raw counter value and return the delta it contributed
    pub fn fold(&mut self, now: u64) -> u64 {
        let delta = counter_delta(self.previous_snapshot, now, self.width);
        self.accumulated = self.accumulated.wrapping_add(delta);
        self.previous_snapshot = now;
        delta
    }

    fn read_hardware(&self, drivers: &CounterDrivers) -> u64 {
        drivers.read_counter(self.event_type, self.event_id, self.port, self.aux_data)
    }

    pub fn event(&self) -> EventRef {
        self.event
    }

    pub fn event_type(&self) -> EventType {
        self.event_type
    }

    pub fn port(&self) -> u8 {
        self.port
    }

    pub fn aux_data(&self) -> u64 {
        self.aux_data
    }

    pub fn state(&self) -> SessionState {
        self.state
    }

    pub fn previous_snapshot(&self) -> u64 {
        self.previous_snapshot
    }

    pub fn accumulated(&self) -> u64 {
        self.accumulated
    }
}
