// FME counter exporter

use parking_lot::Mutex;
use prometheus::{Gauge, Opts, Registry};
use std::sync::Arc;
use std::time::Instant;

use crate::common::AffinityGuard;
use crate::config::EventSelector;
use crate::error::Result;
use crate::pmu::{EventHandle, EventRequest, FmePmu, PERF_EF_START};

struct ExportedEvent {
    handle: EventHandle,
    label: String,
    count: Gauge,
    rate: Gauge,
    last_count: u64,
}

pub struct FmeMetricExporter {
    pmu: Arc<FmePmu>,
    registry: Arc<Registry>,
    events: Mutex<Vec<ExportedEvent>>,
    last_collect: Mutex<Option<Instant>>,
}

impl FmeMetricExporter {
    /// Open and start every selected event
    ///
    /// If any event fails to open, the ones already opened are closed again.
    pub fn new(pmu: Arc<FmePmu>, selectors: &[EventSelector]) -> Result<Self> {
        let exporter = Self {
            pmu,
            registry: Arc::new(Registry::new()),
            events: Mutex::new(Vec::new()),
            last_collect: Mutex::new(None),
        };

        for selector in selectors {
            if let Err(e) = exporter.open_event(selector) {
                tracing::error!("Failed to open FME event {}: {}", selector, e);
                exporter.close_all();
                return Err(e);
            }
        }

        tracing::info!(
            "Exporting {} FME events from {}",
            exporter.events.lock().len(),
            exporter.pmu.name()
        );
        Ok(exporter)
    }

    fn open_event(&self, selector: &EventSelector) -> Result<()> {
        let config = selector.to_config(self.pmu.catalog())?;
        let request = EventRequest::counting(config.encode(), self.pmu.cpu());

        let handle = self.pmu.event_init(&request)?;
        let port = selector
            .port
            .map(|p| p.to_string())
            .unwrap_or_else(|| "all".to_string());

        let gauges = self.register_gauges(&selector.name, &port);
        let (count, rate) = match gauges {
            Ok(gauges) => gauges,
            Err(e) => {
                self.pmu.close(handle)?;
                return Err(e);
            }
        };

        self.pmu.add(handle, PERF_EF_START)?;
        self.events.lock().push(ExportedEvent {
            handle,
            label: selector.to_string(),
            count,
            rate,
            last_count: 0,
        });
        Ok(())
    }

    fn register_gauges(&self, event: &str, port: &str) -> Result<(Gauge, Gauge)> {
        let labels = |opts: Opts| {
            opts.const_label("pmu", self.pmu.name())
                .const_label("event", event)
                .const_label("port", port)
        };

        let count = Gauge::with_opts(labels(Opts::new(
            "fme_event_count",
            "Accumulated FME event count since the exporter started",
        )))?;
        let rate = Gauge::with_opts(labels(Opts::new(
            "fme_event_rate",
            "FME events per second over the last collection interval",
        )))?;

        self.registry.register(Box::new(count.clone()))?;
        self.registry.register(Box::new(rate.clone()))?;
        Ok((count, rate))
    }

    /// Read all events once (called by orchestrator)
    pub fn collect(&self) {
        // Counters are read from the CPU the PMU is bound to
        let _guard = match AffinityGuard::new(self.pmu.cpu()) {
            Ok(guard) => Some(guard),
            Err(e) => {
                tracing::debug!("Reading FME counters without pinning: {}", e);
                None
            }
        };

        let now = Instant::now();
        let elapsed = self
            .last_collect
            .lock()
            .replace(now)
            .map(|last| now.duration_since(last).as_secs_f64());

        for event in self.events.lock().iter_mut() {
            match self.pmu.read(event.handle) {
                Ok(count) => {
                    let delta = count.wrapping_sub(event.last_count);
                    event.last_count = count;
                    event.count.set(count as f64);
                    if let Some(secs) = elapsed.filter(|s| *s > 0.0) {
                        event.rate.set(delta as f64 / secs);
                    }
                }
                Err(e) => {
                    tracing::error!("Failed to read FME event {}: {}", event.label, e);
                }
            }
        }
    }

    /// Stop and release every open event
    pub fn close_all(&self) {
        for event in self.events.lock().drain(..) {
            if let Err(e) = self.pmu.close(event.handle) {
                tracing::warn!("Failed to close FME event {}: {}", event.label, e);
            }
        }
    }

    pub fn pmu(&self) -> &Arc<FmePmu> {
        &self.pmu
    }

    pub fn registry(&self) -> &Registry {
        &self.registry
    }
}

impl Drop for FmeMetricExporter {
    fn drop(&mut self) {
        self.close_all();
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::catalog::PerfFlavor;
    use crate::counters::DEFAULT_POLL_TIMEOUT;
    use crate::error::FmePerfError;
    use crate::testing::{SimulatedFme, Source};
    use fmeperf_raw::fme::fabric::events as fabric_events;

    fn pmu(fme: &Arc<SimulatedFme>) -> Arc<FmePmu> {
        Arc::new(
            FmePmu::attach(
                "fme0",
                fme.clone(),
                PerfFlavor::Integrated,
                0,
                DEFAULT_POLL_TIMEOUT,
            )
            .unwrap(),
        )
    }

    fn selectors(list: &[&str]) -> Vec<EventSelector> {
        list.iter().map(|s| s.parse().unwrap()).collect()
    }

    fn gauge_value(exporter: &FmeMetricExporter, metric: &str, event: &str) -> Option<f64> {
        exporter
            .registry()
            .gather()
            .iter()
            .filter(|family| family.get_name() == metric)
            .flat_map(|family| family.get_metric())
            .find(|m| m.get_label().iter().any(|l| l.get_value() == event))
            .map(|m| m.get_gauge().get_value())
    }

    #[test]
    fn test_collect_sets_counts() {
        let fme = SimulatedFme::new();
        let pmu = pmu(&fme);
        fme.set_clock(100);

        let exporter =
            FmeMetricExporter::new(Arc::clone(&pmu), &selectors(&["clock", "fab_port_mmio_read@0"]))
                .unwrap();
        assert_eq!(pmu.open_sessions(), 2);

        fme.set_clock(600);
        fme.set_count(Source::Fabric(fabric_events::MMIO_READ), 77, 0);
        exporter.collect();

        assert_eq!(gauge_value(&exporter, "fme_event_count", "clock"), Some(500.0));
        assert_eq!(
            gauge_value(&exporter, "fme_event_count", "fab_port_mmio_read"),
            Some(77.0)
        );
    }

    #[test]
    fn test_failed_open_closes_previous_events() {
        let fme = SimulatedFme::new();
        let pmu = pmu(&fme);

        // The aggregate and the single-port view cannot be counted at once
        let result = FmeMetricExporter::new(
            Arc::clone(&pmu),
            &selectors(&["fab_pcie0_read", "fab_port_pcie0_read@0"]),
        );

        assert!(matches!(result, Err(FmePerfError::Busy(_))));
        assert_eq!(pmu.open_sessions(), 0);
        assert_eq!(pmu.fabric_arbiter().active_users(), 0);
    }

    #[test]
    fn test_drop_releases_sessions() {
        let fme = SimulatedFme::new();
        let pmu = pmu(&fme);

        let exporter =
            FmeMetricExporter::new(Arc::clone(&pmu), &selectors(&["fab_upi_read", "fab_upi_write"]))
                .unwrap();
        assert_eq!(pmu.fabric_arbiter().active_users(), 2);

        drop(exporter);
        assert_eq!(pmu.open_sessions(), 0);
        assert_eq!(pmu.fabric_arbiter().active_users(), 0);
    }
}
