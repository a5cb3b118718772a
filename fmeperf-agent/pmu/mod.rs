// Monitoring facade
//
// Translates the host framework's generic event lifecycle (init, add, start,
// stop, del, read, destroy) into catalog lookups and counter sessions.

pub mod attributes;
pub mod config;

pub use attributes::{AttributeGroup, PmuCapabilities, CAPABILITIES};
pub use config::EventConfig;

use parking_lot::{Mutex, RwLock};
use serde::Serialize;
use std::collections::HashMap;
use std::fmt;
use std::sync::atomic::{AtomicU32, AtomicU64, Ordering};
use std::time::Duration;

use crate::catalog::{EventCatalog, PerfFlavor};
use crate::counters::{CounterDrivers, FabricArbiter, SharedIo};
use crate::error::{FmePerfError, Result};
use crate::session::{CounterSession, SessionState};

/// Start counting right away (`add`)
pub const PERF_EF_START: u32 = 0x01;
/// Fold the final counter value before stopping (`stop`)
pub const PERF_EF_UPDATE: u32 = 0x04;

/// An event open request as issued by the host framework
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct EventRequest {
    pub config: u64,
    /// Non-zero requests sampling mode
    pub sample_period: u64,
    /// The event follows a task instead of a CPU
    pub per_task: bool,
    /// CPU the event is bound to; `None` means any CPU
    pub cpu: Option<u32>,
}

impl EventRequest {
    /// A plain counting request on `cpu`
    pub fn counting(config: u64, cpu: u32) -> Self {
        Self {
            config,
            sample_period: 0,
            per_task: false,
            cpu: Some(cpu),
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub struct EventHandle(u64);

impl fmt::Display for EventHandle {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "#{}", self.0)
    }
}

/// What the host needs to register the PMU
#[derive(Debug, Clone, Serialize)]
pub struct PmuInfo {
    pub name: String,
    pub capabilities: PmuCapabilities,
    pub attribute_groups: Vec<AttributeGroup>,
}

pub struct FmePmu {
    name: String,
    catalog: EventCatalog,
    drivers: CounterDrivers,
    cpu: AtomicU32,
    attribute_groups: RwLock<Vec<AttributeGroup>>,
    sessions: RwLock<HashMap<EventHandle, Mutex<CounterSession>>>,
    next_handle: AtomicU64,
}

impl FmePmu {
    /// Bind a PMU to the register window of a global performance feature
    ///
    /// Either everything the host needs is built or nothing is returned.
    pub fn attach(
        name: impl Into<String>,
        io: SharedIo,
        flavor: PerfFlavor,
        cpu: u32,
        poll_timeout: Duration,
    ) -> Result<Self> {
        let name = name.into();
        let catalog = EventCatalog::new(flavor)?;
        let attribute_groups = attributes::attribute_groups(&catalog, cpu)?;
        let drivers = CounterDrivers::new(io, poll_timeout);

        tracing::info!(
            "Attached PMU {} ({:?}, {} events, cpu {})",
            name,
            flavor,
            catalog.len(),
            cpu
        );

        Ok(Self {
            name,
            catalog,
            drivers,
            cpu: AtomicU32::new(cpu),
            attribute_groups: RwLock::new(attribute_groups),
            sessions: RwLock::new(HashMap::new()),
            next_handle: AtomicU64::new(0),
        })
    }

    pub fn info(&self) -> PmuInfo {
        PmuInfo {
            name: self.name.clone(),
            capabilities: CAPABILITIES,
            attribute_groups: self.attribute_groups.read().clone(),
        }
    }

    /// Validate a request and open a session for it
    ///
    /// Nothing touches the hardware unless the request is valid; a failing
    /// driver `init` leaves no session behind.
    pub fn event_init(&self, request: &EventRequest) -> Result<EventHandle> {
        if request.sample_period != 0 {
            return Err(FmePerfError::InvalidArgument(
                "sampling is not supported".to_string(),
            ));
        }
        if request.per_task {
            return Err(FmePerfError::InvalidArgument(
                "per-task counting is not supported".to_string(),
            ));
        }

        let cpu = self.cpu();
        match request.cpu {
            None => {
                return Err(FmePerfError::InvalidArgument(
                    "an explicit cpu is required".to_string(),
                ))
            }
            Some(requested) if requested != cpu => {
                return Err(FmePerfError::InvalidArgument(format!(
                    "events of {} are read on cpu {cpu}, not {requested}",
                    self.name
                )))
            }
            Some(_) => {}
        }

        let config = EventConfig::decode(request.config);
        let event = self
            .catalog
            .resolve(config.event_id, config.event_type, config.port)?;
        let descriptor = self
            .catalog
            .get(event)
            .ok_or_else(|| FmePerfError::NotFound(format!("{event:?}")))?;

        self.drivers.init(descriptor.event_type, config.port)?;

        let session = CounterSession::new(event, descriptor, config.port);
        let handle = EventHandle(self.next_handle.fetch_add(1, Ordering::Relaxed));
        self.sessions.write().insert(handle, Mutex::new(session));

        tracing::info!(
            "Opened {} event {} (port 0x{:x}) as {}",
            self.name,
            descriptor.full_name(),
            config.port,
            handle
        );
        Ok(handle)
    }

    fn with_session<T>(
        &self,
        handle: EventHandle,
        f: impl FnOnce(&mut CounterSession) -> T,
    ) -> Result<T> {
        let sessions = self.sessions.read();
        let session = sessions
            .get(&handle)
            .ok_or_else(|| FmePerfError::NotFound(format!("no open event {handle}")))?;
        let mut session = session.lock();
        Ok(f(&mut session))
    }

    pub fn add(&self, handle: EventHandle, flags: u32) -> Result<()> {
        if flags & PERF_EF_START != 0 {
            self.start(handle, flags)?;
        }
        Ok(())
    }

    pub fn del(&self, handle: EventHandle, _flags: u32) -> Result<()> {
        self.stop(handle, PERF_EF_UPDATE)
    }

    pub fn start(&self, handle: EventHandle, _flags: u32) -> Result<()> {
        self.with_session(handle, |s| s.start(&self.drivers))
    }

    pub fn stop(&self, handle: EventHandle, flags: u32) -> Result<()> {
        self.with_session(handle, |s| s.stop(&self.drivers, flags & PERF_EF_UPDATE != 0))
    }

    /// Accumulated count of an event
    pub fn read(&self, handle: EventHandle) -> Result<u64> {
        self.with_session(handle, |s| s.read(&self.drivers))
    }

    /// Tear down a session, releasing what its driver acquired at open
    pub fn close(&self, handle: EventHandle) -> Result<()> {
        let session = self
            .sessions
            .write()
            .remove(&handle)
            .ok_or_else(|| FmePerfError::NotFound(format!("no open event {handle}")))?;

        let mut session = session.into_inner();
        if session.state() == SessionState::Running {
            session.stop(&self.drivers, true);
        }
        self.drivers.destroy(session.event_type(), session.port());

        tracing::debug!(
            "Closed {} event {} after {} counts",
            self.name,
            handle,
            session.accumulated()
        );
        Ok(())
    }

    /// Move event reading to another CPU, e.g. when the bound one goes offline
    pub fn migrate(&self, cpu: u32) {
        let old = self.cpu.swap(cpu, Ordering::SeqCst);
        if old == cpu {
            return;
        }

        let mut groups = self.attribute_groups.write();
        for group in groups.iter_mut().filter(|g| g.name == "cpumask") {
            *group = attributes::cpumask_group(cpu);
        }
        tracing::info!("Migrated PMU {} from cpu {} to cpu {}", self.name, old, cpu);
    }

    pub fn name(&self) -> &str {
        &self.name
    }

    pub fn cpu(&self) -> u32 {
        self.cpu.load(Ordering::SeqCst)
    }

    pub fn catalog(&self) -> &EventCatalog {
        &self.catalog
    }

    pub fn fabric_arbiter(&self) -> &FabricArbiter {
        self.drivers.fabric_arbiter()
    }

    /// Snapshot of a session's state
    pub fn session(&self, handle: EventHandle) -> Result<CounterSession> {
        self.with_session(handle, |s| s.clone())
    }

    pub fn open_sessions(&self) -> usize {
        self.sessions.read().len()
    }
}
