// Periodic metric collection loop

use std::sync::Arc;
use std::time::Duration;
use tokio::task::JoinHandle;
use tokio_util::sync::CancellationToken;

use crate::prom::FmeMetricExporter;

/// Configuration for the collection loop
#[derive(Debug, Clone)]
pub struct CollectorConfig {
    pub interval: Duration,
}

impl Default for CollectorConfig {
    fn default() -> Self {
        Self {
            interval: Duration::from_secs(1),
        }
    }
}

/// Drives the exporters on a fixed interval until cancelled
pub struct MetricCollector {
    collector_config: CollectorConfig,
    fme_exporter: Arc<FmeMetricExporter>,
}

impl MetricCollector {
    pub fn new(fme_exporter: Arc<FmeMetricExporter>, collector_config: CollectorConfig) -> Self {
        Self {
            collector_config,
            fme_exporter,
        }
    }

    /// Start the collection loop; it closes all events once cancelled
    pub fn start(self, cancel_token: CancellationToken) -> JoinHandle<()> {
        tracing::info!(
            "Starting FME metric collection every {:?}",
            self.collector_config.interval
        );

        tokio::spawn(async move {
            self.collection_loop(cancel_token).await;
        })
    }

    async fn collection_loop(self, cancel_token: CancellationToken) {
        let mut interval = tokio::time::interval(self.collector_config.interval);

        loop {
            tokio::select! {
                _ = cancel_token.cancelled() => {
                    tracing::info!("Collection loop cancelled");
                    break;
                }
                _ = interval.tick() => {
                    // Counter reads busy-poll, keep them off the async workers
                    let exporter = Arc::clone(&self.fme_exporter);
                    if let Err(e) = tokio::task::spawn_blocking(move || exporter.collect()).await {
                        tracing::error!("Collection task failed: {}", e);
                    }
                }
            }
        }

        self.fme_exporter.close_all();
    }

    pub fn fme_exporter(&self) -> Arc<FmeMetricExporter> {
        Arc::clone(&self.fme_exporter)
    }
}
