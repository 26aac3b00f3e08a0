// Event poll loop
// Drives event dispatch and metric refresh from a single interval timer

use std::sync::Arc;
use std::time::Duration;
use tokio::task::JoinHandle;
use tokio_util::sync::CancellationToken;

use crate::device::Device;
use crate::prom::DeviceMetricExporter;

pub struct EventPoller {
    device: Arc<Device>,
    exporter: Option<Arc<DeviceMetricExporter>>,
    interval: Duration,
}

impl EventPoller {
    pub fn new(device: Arc<Device>, exporter: Option<Arc<DeviceMetricExporter>>) -> Self {
        let interval = device.config().event_poll_interval;
        Self {
            device,
            exporter,
            interval,
        }
    }

    pub fn start(self, cancel_token: CancellationToken) -> JoinHandle<()> {
        tracing::info!("Starting event poller ({:?} interval)", self.interval);

        tokio::spawn(async move {
            self.poll_loop(cancel_token).await;
        })
    }

    async fn poll_loop(self, cancel_token: CancellationToken) {
        let mut interval = tokio::time::interval(self.interval);
        let mut reported_dead = false;

        loop {
            tokio::select! {
                _ = cancel_token.cancelled() => {
                    tracing::info!("Event poller received shutdown signal");
                    break;
                }
                _ = interval.tick() => {}
            }

            if self.device.is_alive() {
                self.tick().await;
            } else if !reported_dead {
                tracing::warn!(
                    "Device is dead ({}), event dispatch stopped",
                    self.device.death_reason().map_or("unknown", |r| r.name())
                );
                reported_dead = true;
            }

            if let Some(exporter) = &self.exporter {
                exporter.collect();
            }
        }

        tracing::info!("Event poller stopped");
    }

    /// One dispatch pass over the global sources and the local partition
    pub async fn tick(&self) -> usize {
        let device = Arc::clone(&self.device);
        let result = tokio::task::spawn_blocking(move || -> crate::error::Result<usize> {
            if !device.events().any_pending()? {
                return Ok(0);
            }
            device.events().dispatch_all()
        })
        .await;

        match result {
            Ok(Ok(serviced)) => {
                if serviced > 0 {
                    tracing::debug!("Serviced {} event(s)", serviced);
                }
                serviced
            }
            Ok(Err(e)) => {
                tracing::error!("Event dispatch failed: {}", e);
                0
            }
            Err(e) => {
                tracing::error!("Event dispatch task failed: {}", e);
                0
            }
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::testing::SimSwitch;
    use switchtec_raw::event::EVENT_OCCURRED;
    use switchtec_raw::EventKind;

    #[tokio::test]
    async fn test_tick_services_pending_events() {
        let sim = SimSwitch::builder().partitions(2).pffs(4).bind(0, &[2, 3]).build();
        let device = Arc::new(sim.attach(0));
        let poller = EventPoller::new(Arc::clone(&device), None);

        assert_eq!(poller.tick().await, 0);

        sim.raise(EventKind::Hotplug, 3, &[1, 2, 3, 4, 5]);
        sim.raise(EventKind::SysReset, 0, &[]);
        assert_eq!(poller.tick().await, 2);
        assert_eq!(device.events().event_count(), 2);
        assert_eq!(poller.tick().await, 0);
    }

    #[tokio::test]
    async fn test_tick_skips_other_partitions() {
        let sim = SimSwitch::builder().partitions(2).pffs(4).bind(0, &[0]).bind(1, &[2]).build();
        let device = Arc::new(sim.attach(0));
        let poller = EventPoller::new(Arc::clone(&device), None);

        sim.raise(EventKind::Hotplug, 2, &[0; 5]);
        sim.raise(EventKind::MrpcComp, 1, &[]);
        sim.raise(EventKind::Hotplug, 0, &[0; 5]);
        assert_eq!(poller.tick().await, 1);
        assert_eq!(poller.tick().await, 0);

        assert_eq!(sim.header(EventKind::Hotplug, 0) & EVENT_OCCURRED, 0);
        assert_ne!(sim.header(EventKind::Hotplug, 2) & EVENT_OCCURRED, 0);
        assert_ne!(sim.header(EventKind::MrpcComp, 1) & EVENT_OCCURRED, 0);
    }

    #[tokio::test]
    async fn test_poll_loop_stops_on_cancel() {
        let sim = SimSwitch::builder().build();
        let device = Arc::new(sim.attach(0));
        let cancel = CancellationToken::new();
        let handle = EventPoller::new(device, None).start(cancel.clone());

        cancel.cancel();
        tokio::time::timeout(Duration::from_secs(5), handle)
            .await
            .unwrap()
            .unwrap();
    }
}
