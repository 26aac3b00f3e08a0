use prometheus::{Gauge, Opts, Registry};
use std::collections::HashMap;
use std::sync::atomic::Ordering;
use std::sync::Arc;

use switchtec_raw::EventKind;

use crate::device::Device;
use crate::error::Result;

crate::metric_enum! {
    pub enum MrpcOutcome {
        Submitted => "submitted",
        Done => "done",
        Error => "error",
        Timeout => "timeout",
        Interrupted => "interrupted",
        Rejected => "rejected",
    }
}

pub struct DeviceMetricExporter {
    device: Arc<Device>,
    registry: Arc<Registry>,
    alive: Gauge,
    event_count: Gauge,
    mrpc_gauges: HashMap<MrpcOutcome, Gauge>,
    event_gauges: HashMap<EventKind, Gauge>,
}

impl DeviceMetricExporter {
    pub fn new(device: Arc<Device>) -> Result<Self> {
        let registry = Arc::new(Registry::new());
        let partition = device.partition().to_string();

        let alive = Gauge::with_opts(
            Opts::new("switchtec_alive", "1 while the device accepts MRPC commands")
                .const_label("partition", partition.clone()),
        )?;
        registry.register(Box::new(alive.clone()))?;

        let event_count = Gauge::with_opts(
            Opts::new("switchtec_event_count", "Event occurrences serviced since attach")
                .const_label("partition", partition.clone()),
        )?;
        registry.register(Box::new(event_count.clone()))?;

        let mut mrpc_gauges = HashMap::new();
        for outcome in MrpcOutcome::all() {
            let opts = Opts::new("switchtec_mrpc_requests_total", "MRPC requests by outcome")
                .const_label("partition", partition.clone())
                .const_label("outcome", outcome.name());
            let gauge = Gauge::with_opts(opts)?;
            registry.register(Box::new(gauge.clone()))?;
            mrpc_gauges.insert(outcome, gauge);
        }

        let mut event_gauges = HashMap::new();
        for kind in EventKind::ALL {
            let opts = Opts::new("switchtec_events_total", "Event occurrences by kind")
                .const_label("partition", partition.clone())
                .const_label("kind", kind.name());
            let gauge = Gauge::with_opts(opts)?;
            registry.register(Box::new(gauge.clone()))?;
            event_gauges.insert(*kind, gauge);
        }

        Ok(Self {
            device,
            registry,
            alive,
            event_count,
            mrpc_gauges,
            event_gauges,
        })
    }

    /// Refresh every gauge from the device counters
    pub fn collect(&self) {
        self.alive.set(if self.device.is_alive() { 1.0 } else { 0.0 });
        self.event_count.set(self.device.events().event_count() as f64);

        let stats = self.device.mrpc_stats();
        for (outcome, gauge) in &self.mrpc_gauges {
            let counter = match outcome {
                MrpcOutcome::Submitted => &stats.submitted,
                MrpcOutcome::Done => &stats.done,
                MrpcOutcome::Error => &stats.error,
                MrpcOutcome::Timeout => &stats.timeout,
                MrpcOutcome::Interrupted => &stats.interrupted,
                MrpcOutcome::Rejected => &stats.rejected,
            };
            gauge.set(counter.load(Ordering::Relaxed) as f64);
        }

        for (kind, count) in self.device.events().kind_counts() {
            if let Some(gauge) = self.event_gauges.get(&kind) {
                gauge.set(count as f64);
            }
        }
    }

    pub fn device(&self) -> &Arc<Device> {
        &self.device
    }

    pub fn registry(&self) -> Arc<Registry> {
        Arc::clone(&self.registry)
    }
}
