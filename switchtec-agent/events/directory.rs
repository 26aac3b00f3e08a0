// Event directory: summary aggregation and top-down dispatch
//
// Summary tree:
//   global summary register ──┬─ global sources
//                             └─ part_event_bitmap ── partition p
//   partition summary ────────┬─ partition sources
//                             └─ PFFs claimed by p ── PFF summary ── PFF sources
//
// Dispatch walks the tree top-down, services every occurred header, and
// clears it with a single write that also carries the retained enables.

use parking_lot::{Condvar, Mutex, RwLock};
use std::sync::atomic::{AtomicU64, Ordering};
use std::sync::Arc;
use std::time::{Duration, Instant};

use switchtec_raw::gas::{self, Region};
use switchtec_raw::layout::{part_cfg, pff_csr, sw_event};
use switchtec_raw::{
    EventFlags, EventHeader, EventKind, EventScope, EventSummary, GasError, Register,
    RegisterLayout,
};

use crate::device::shared::{DeathReason, Shared};
use crate::device::topology::Topology;
use crate::error::{Result, SwitchtecError};
use crate::events::types::{
    EventIndex, EventOccurrence, EventSource, EventSummarySnapshot, SummaryScope,
};
use crate::mrpc::channel;

type Handler = Arc<dyn Fn(&EventOccurrence) + Send + Sync>;

struct Registration {
    kind: Option<EventKind>,
    handler: Handler,
}

pub struct EventDirectory {
    shared: Arc<Shared>,
    handlers: RwLock<Vec<Registration>>,
    /// Held for a whole dispatch pass so each occurrence is serviced once
    dispatching: Mutex<()>,
    count: Mutex<u64>,
    count_cond: Condvar,
    per_kind: Vec<AtomicU64>,
}

impl EventDirectory {
    pub(crate) fn new(shared: Arc<Shared>) -> Self {
        Self {
            shared,
            handlers: RwLock::new(Vec::new()),
            dispatching: Mutex::new(()),
            count: Mutex::new(0),
            count_cond: Condvar::new(),
            per_kind: EventKind::ALL.iter().map(|_| AtomicU64::new(0)).collect(),
        }
    }

    /// Register a handler for one kind, or for every kind with `None`
    ///
    /// Handlers run on the dispatching thread, before the event is cleared.
    /// They must not dispatch themselves.
    pub fn on_event<F>(&self, kind: Option<EventKind>, handler: F)
    where
        F: Fn(&EventOccurrence) + Send + Sync + 'static,
    {
        self.handlers.write().push(Registration {
            kind,
            handler: Arc::new(handler),
        });
    }

    /// Unified summary of `scope`, children included
    pub fn read_summary(&self, scope: SummaryScope) -> Result<EventSummary> {
        let topology = self.shared.topology();
        self.summary_of(&topology, scope)
    }

    fn summary_of(&self, topology: &Topology, scope: SummaryScope) -> Result<EventSummary> {
        let window = self.shared.window.as_ref();
        match scope {
            SummaryScope::Global => {
                let raw = window.read32(gas::SW_EVENT_OFFSET + sw_event::GLOBAL_SUMMARY)?;
                let mut summary = EventSummary::from_register(EventScope::Global, raw);
                for partition in 0..topology.partition_count() {
                    summary |= self.summary_of(topology, SummaryScope::Partition(partition))?;
                }
                Ok(summary)
            }
            SummaryScope::Partition(partition) => {
                topology.check_partition(partition)?;
                let base = gas::part_cfg(partition)?.offset;
                let raw = window.read32(base + part_cfg::PART_EVENT_SUMMARY)?;
                let mut summary = EventSummary::from_register(EventScope::Partition, raw);
                for pff in topology.claims(partition).iter() {
                    summary |= self.summary_of(topology, SummaryScope::PortFunction(pff))?;
                }
                Ok(summary)
            }
            SummaryScope::PortFunction(pff) => {
                topology.check_pff(pff)?;
                let base = gas::pff_csr(pff)?.offset;
                let raw = window.read32(base + pff_csr::PFF_EVENT_SUMMARY)?;
                Ok(EventSummary::from_register(EventScope::PortFunction, raw))
            }
        }
    }

    /// Cheap top-level check of the global summary and the local partition's
    /// bit in the partition bitmap
    pub fn any_pending(&self) -> Result<bool> {
        let window = self.shared.window.as_ref();
        let local = self.shared.topology().partition();
        let global = window.read32(gas::SW_EVENT_OFFSET + sw_event::GLOBAL_SUMMARY)?;
        let bitmap = window.read64(gas::SW_EVENT_OFFSET + sw_event::PART_EVENT_BITMAP)?;
        Ok(global != 0 || bitmap & (1u64 << local) != 0)
    }

    /// Service every occurred event under `scope` that this partition owns
    ///
    /// The global scope covers the global sources plus the local partition
    /// and its PFFs; sources of other partitions are left to their own
    /// driver. Explicit scopes outside local ownership are refused with
    /// [`SwitchtecError::NotLocal`]. Returns the number of occurrences
    /// serviced.
    pub fn dispatch(&self, scope: SummaryScope) -> Result<usize> {
        let _dispatching = self.dispatching.lock();
        let topology = self.shared.topology();
        let mut serviced = 0;

        match scope {
            SummaryScope::Global => {
                let window = self.shared.window.as_ref();
                let raw = window.read32(gas::SW_EVENT_OFFSET + sw_event::GLOBAL_SUMMARY)?;
                let summary = EventSummary::from_register(EventScope::Global, raw);
                for kind in summary.iter() {
                    serviced += self.service(&topology, kind, 0)? as usize;
                }
                serviced += self.dispatch_partition(topology.partition())?;
            }
            SummaryScope::Partition(partition) => {
                topology.check_partition(partition)?;
                if partition != topology.partition() {
                    return Err(SwitchtecError::NotLocal {
                        region: Region::PartCfg,
                        index: partition,
                    });
                }
                serviced += self.dispatch_partition(partition)?;
            }
            SummaryScope::PortFunction(pff) => {
                topology.check_pff(pff)?;
                if !topology.local().contains(pff) {
                    return Err(SwitchtecError::NotLocal {
                        region: Region::PffCsr,
                        index: pff,
                    });
                }
                serviced += self.dispatch_pff(&topology, pff)?;
            }
        }

        Ok(serviced)
    }

    /// Poll-tick entry point
    pub fn dispatch_all(&self) -> Result<usize> {
        self.dispatch(SummaryScope::Global)
    }

    /// Dispatch only this driver's partition and its PFFs
    pub fn dispatch_local(&self) -> Result<usize> {
        let partition = self.shared.topology().partition();
        self.dispatch(SummaryScope::Partition(partition))
    }

    fn dispatch_partition(&self, partition: usize) -> Result<usize> {
        let topology = self.shared.topology();
        let base = gas::part_cfg(partition)?.offset;
        let raw = self.shared.window.read32(base + part_cfg::PART_EVENT_SUMMARY)?;
        let mut serviced = 0;
        for kind in EventSummary::from_register(EventScope::Partition, raw).iter() {
            serviced += self.service(&topology, kind, partition)? as usize;
        }

        // A binding completion serviced above may have moved PFFs
        let topology = self.shared.topology();
        for pff in topology.claims(partition).iter() {
            serviced += self.dispatch_pff(&topology, pff)?;
        }
        Ok(serviced)
    }

    fn dispatch_pff(&self, topology: &Topology, pff: usize) -> Result<usize> {
        let base = gas::pff_csr(pff)?.offset;
        let raw = self.shared.window.read32(base + pff_csr::PFF_EVENT_SUMMARY)?;
        let mut serviced = 0;
        for kind in EventSummary::from_register(EventScope::PortFunction, raw).iter() {
            serviced += self.service(topology, kind, pff)? as usize;
        }
        Ok(serviced)
    }

    /// Handle one source; false if its occurred bit was not set
    fn service(&self, topology: &Topology, kind: EventKind, index: usize) -> Result<bool> {
        let window = self.shared.window.as_ref();
        let register = header_register(topology, kind, index)?;
        let addr = register.offset;
        let header = register.read(window)?;
        if !header.occurred {
            return Ok(false);
        }

        let mut data = Vec::with_capacity(kind.data_words());
        for word in 0..kind.data_words() {
            data.push(window.read32(addr + 4 + word * 4)?);
        }

        let occurrence = EventOccurrence {
            kind,
            index,
            fatal: EventOccurrence::is_fatal(kind, &header),
            header,
            data,
        };
        tracing::debug!(
            "Event {} [{}]: header 0x{:08X}, data {:X?}",
            kind.name(),
            index,
            header.to_reg_value(),
            occurrence.data
        );

        *self.count.lock() += 1;
        self.per_kind[kind.id() as usize].fetch_add(1, Ordering::Relaxed);

        let handlers: Vec<Handler> = self
            .handlers
            .read()
            .iter()
            .filter(|r| r.kind.map_or(true, |k| k == kind))
            .map(|r| Arc::clone(&r.handler))
            .collect();
        for handler in handlers {
            handler(&occurrence);
        }

        if occurrence.fatal {
            tracing::error!("Fatal event {} on index {}", kind.name(), index);
            self.shared.mark_dead(DeathReason::FatalEvent);
        }

        window.write32(addr, header.acknowledge())?;
        self.count_cond.notify_all();

        match kind {
            EventKind::MrpcComp => {
                channel::complete(&self.shared);
            }
            EventKind::DynPartBindComp => self.refresh_topology()?,
            _ => {}
        }

        Ok(true)
    }

    /// Re-read the partition config blocks and swap the ownership view
    pub fn refresh_topology(&self) -> Result<()> {
        let info = self.shared.topology().info();
        let topology = Topology::read(self.shared.window.as_ref(), info)?;
        if self.shared.replace_topology(topology) {
            tracing::info!("Partition binding changed, ownership view replaced");
        }
        Ok(())
    }

    /// Current header of one source
    pub fn read_header(&self, kind: EventKind, index: usize) -> Result<EventHeader> {
        let topology = self.shared.topology();
        let register = header_register(&topology, kind, index)?;
        Ok(register.read(self.shared.window.as_ref())?)
    }

    /// Set `flags` on the source; returns the number of headers written
    pub fn enable(&self, source: EventSource, flags: EventFlags) -> Result<usize> {
        self.control(source, |header| header.flags.insert(flags))
    }

    /// Clear `flags` on the source; returns the number of headers written
    pub fn disable(&self, source: EventSource, flags: EventFlags) -> Result<usize> {
        self.control(source, |header| header.flags.remove(flags))
    }

    fn control<F>(&self, source: EventSource, update: F) -> Result<usize>
    where
        F: Fn(&mut EventHeader),
    {
        let topology = self.shared.topology();
        let window = self.shared.window.as_ref();
        let indices = source_indices(&topology, source)?;

        for &index in &indices {
            let register = header_register(&topology, source.kind, index)?;
            let mut header = register.read(window)?;
            update(&mut header);
            window.write32(register.offset, header.control_value())?;
        }

        tracing::debug!(
            "Event {} control written on {} header(s)",
            source.kind.name(),
            indices.len()
        );
        Ok(indices.len())
    }

    /// Occurrences serviced since attach
    pub fn event_count(&self) -> u64 {
        *self.count.lock()
    }

    /// Block until the event count moves past `last_seen`
    ///
    /// Returns the new count, or `None` if `timeout` elapsed first.
    pub fn wait_for_event(&self, last_seen: u64, timeout: Duration) -> Option<u64> {
        let deadline = Instant::now() + timeout;
        let mut count = self.count.lock();
        while *count <= last_seen {
            if self.count_cond.wait_until(&mut count, deadline).timed_out() {
                return (*count > last_seen).then_some(*count);
            }
        }
        Some(*count)
    }

    /// Occurrences serviced per kind
    pub fn kind_counts(&self) -> Vec<(EventKind, u64)> {
        EventKind::ALL
            .iter()
            .map(|kind| (*kind, self.per_kind[kind.id() as usize].load(Ordering::Relaxed)))
            .collect()
    }

    /// Every summary register, raw, plus the unified pending set
    pub fn snapshot(&self) -> Result<EventSummarySnapshot> {
        let topology = self.shared.topology();
        let window = self.shared.window.as_ref();

        let mut part = Vec::with_capacity(topology.partition_count());
        for partition in 0..topology.partition_count() {
            let base = gas::part_cfg(partition)?.offset;
            part.push(window.read32(base + part_cfg::PART_EVENT_SUMMARY)?);
        }
        let mut pff = Vec::with_capacity(topology.pff_count());
        for index in 0..topology.pff_count() {
            let base = gas::pff_csr(index)?.offset;
            pff.push(window.read32(base + pff_csr::PFF_EVENT_SUMMARY)?);
        }

        let pending = self.summary_of(&topology, SummaryScope::Global)?;
        Ok(EventSummarySnapshot {
            global: window.read32(gas::SW_EVENT_OFFSET + sw_event::GLOBAL_SUMMARY)?,
            part_bitmap: window.read64(gas::SW_EVENT_OFFSET + sw_event::PART_EVENT_BITMAP)?,
            local_part: part[topology.partition()],
            part,
            pff,
            pending: pending.iter().map(|kind| kind.name()).collect(),
            event_count: self.event_count(),
        })
    }
}

/// Header register of `kind` at `index`
fn header_register(
    topology: &Topology,
    kind: EventKind,
    index: usize,
) -> Result<Register<EventHeader>> {
    let base = match kind.scope() {
        EventScope::Global => {
            if index != 0 {
                return Err(GasError::OutOfRange {
                    region: Region::SwEvent,
                    index,
                    count: 1,
                }
                .into());
            }
            gas::SW_EVENT_OFFSET
        }
        EventScope::Partition => {
            topology.check_partition(index)?;
            gas::part_cfg(index)?.offset
        }
        EventScope::PortFunction => {
            topology.check_pff(index)?;
            gas::pff_csr(index)?.offset
        }
    };
    Ok(Register::at(base + kind.header_offset()))
}

fn source_indices(topology: &Topology, source: EventSource) -> Result<Vec<usize>> {
    let count = match source.kind.scope() {
        EventScope::Global => 1,
        EventScope::Partition => topology.partition_count(),
        EventScope::PortFunction => topology.pff_count(),
    };
    match source.index {
        EventIndex::All => Ok((0..count).collect()),
        EventIndex::One(index) => {
            header_register(topology, source.kind, index)?;
            Ok(vec![index])
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::device::DeathReason;
    use crate::error::{MrpcError, SwitchtecError};
    use crate::testing::SimSwitch;
    use switchtec_raw::event::EVENT_OCCURRED;

    fn kinds(summary: EventSummary) -> Vec<EventKind> {
        summary.iter().collect()
    }

    #[test]
    fn test_pff_event_counts_toward_owning_partition() {
        let sim = SimSwitch::builder().partitions(3).pffs(8).bind(2, &[5]).build();
        let device = sim.attach(2);
        assert_eq!(device.local_port_functions().iter().collect::<Vec<_>>(), vec![5]);

        sim.raise(EventKind::Hotplug, 5, &[0; 5]);
        let events = device.events();
        assert!(events.read_summary(SummaryScope::PortFunction(5)).unwrap().contains(EventKind::Hotplug));
        assert!(events.read_summary(SummaryScope::Partition(2)).unwrap().contains(EventKind::Hotplug));
        assert!(events.read_summary(SummaryScope::Partition(0)).unwrap().is_empty());
        assert!(events.read_summary(SummaryScope::Global).unwrap().contains(EventKind::Hotplug));
    }

    #[test]
    fn test_global_summary_is_or_of_children() {
        let sim = SimSwitch::builder().partitions(2).pffs(6).bind(1, &[4, 5]).build();
        let device = sim.attach(0);
        let events = device.events();

        sim.raise(EventKind::SysReset, 0, &[]);
        sim.raise(EventKind::PartReset, 1, &[0; 5]);
        sim.raise(EventKind::LinkState, 5, &[0; 5]);

        let global = events.read_summary(SummaryScope::Global).unwrap();
        let mut children = EventSummary::from_iter([EventKind::SysReset]);
        for partition in 0..2 {
            children |= events.read_summary(SummaryScope::Partition(partition)).unwrap();
        }
        assert_eq!(global, children);
        assert_eq!(
            kinds(global),
            vec![EventKind::SysReset, EventKind::PartReset, EventKind::LinkState]
        );
        assert!(events.any_pending().unwrap());

        assert_eq!(events.dispatch_all().unwrap(), 1);
        assert_eq!(
            kinds(events.read_summary(SummaryScope::Global).unwrap()),
            vec![EventKind::PartReset, EventKind::LinkState]
        );
        assert!(!events.any_pending().unwrap());
        assert_eq!(events.event_count(), 1);

        let owner = sim.attach(1);
        assert!(owner.events().any_pending().unwrap());
        assert_eq!(owner.events().dispatch_all().unwrap(), 2);
        assert!(events.read_summary(SummaryScope::Global).unwrap().is_empty());
        assert_eq!(events.event_count(), 1);
    }

    #[test]
    fn test_dispatch_leaves_other_partitions_alone() {
        let sim = SimSwitch::builder().partitions(2).pffs(4).bind(0, &[1]).bind(1, &[2]).build();
        let device = sim.attach(0);
        let events = device.events();

        sim.raise(EventKind::Hotplug, 2, &[0; 5]);
        sim.raise(EventKind::MrpcComp, 1, &[]);
        assert!(!events.any_pending().unwrap());
        assert_eq!(events.dispatch_all().unwrap(), 0);
        assert_eq!(events.dispatch_local().unwrap(), 0);
        assert_eq!(events.event_count(), 0);
        assert_ne!(sim.header(EventKind::Hotplug, 2) & EVENT_OCCURRED, 0);
        assert_ne!(sim.header(EventKind::MrpcComp, 1) & EVENT_OCCURRED, 0);

        assert!(matches!(
            events.dispatch(SummaryScope::Partition(1)),
            Err(SwitchtecError::NotLocal { region: Region::PartCfg, index: 1 })
        ));
        assert!(matches!(
            events.dispatch(SummaryScope::PortFunction(2)),
            Err(SwitchtecError::NotLocal { region: Region::PffCsr, index: 2 })
        ));
        assert_ne!(sim.header(EventKind::Hotplug, 2) & EVENT_OCCURRED, 0);
    }

    #[test]
    fn test_concurrent_dispatch_services_once() {
        let sim = SimSwitch::builder().build();
        let device = Arc::new(sim.attach(0));
        let calls = Arc::new(AtomicU64::new(0));

        let counter = Arc::clone(&calls);
        device.events().on_event(Some(EventKind::GpioInterrupt), move |_| {
            counter.fetch_add(1, Ordering::Relaxed);
            std::thread::sleep(Duration::from_millis(20));
        });
        sim.raise(EventKind::GpioInterrupt, 0, &[0x1]);

        let dispatchers: Vec<_> = (0..4)
            .map(|_| {
                let device = Arc::clone(&device);
                std::thread::spawn(move || device.events().dispatch_all().unwrap())
            })
            .collect();
        let serviced: usize = dispatchers.into_iter().map(|t| t.join().unwrap()).sum();

        assert_eq!(serviced, 1);
        assert_eq!(calls.load(Ordering::Relaxed), 1);
        assert_eq!(device.events().event_count(), 1);
    }

    #[test]
    fn test_dispatch_clears_and_keeps_enables() {
        let sim = SimSwitch::builder().pffs(2).bind(0, &[0, 1]).build();
        let device = sim.attach(0);

        let enables = (EventFlags::LOG | EventFlags::IRQ).bits();
        sim.set_header(EventKind::Hotplug, 1, enables);
        sim.raise(EventKind::Hotplug, 1, &[0; 5]);
        assert_eq!(sim.header(EventKind::Hotplug, 1), enables | EVENT_OCCURRED);

        assert_eq!(device.events().dispatch(SummaryScope::PortFunction(1)).unwrap(), 1);
        assert_eq!(sim.header(EventKind::Hotplug, 1), enables);
        assert_eq!(device.events().dispatch(SummaryScope::PortFunction(1)).unwrap(), 0);
    }

    #[test]
    fn test_enable_disable_round_trip() {
        let sim = SimSwitch::builder().pffs(2).build();
        let device = sim.attach(0);
        let events = device.events();
        let source = EventSource::new(EventKind::Dpc, 1);

        sim.set_header(EventKind::Dpc, 1, EventFlags::LOG.bits());
        sim.raise(EventKind::Dpc, 1, &[0; 5]);
        let before = sim.header(EventKind::Dpc, 1);

        assert_eq!(events.enable(source, EventFlags::IRQ | EventFlags::CLI).unwrap(), 1);
        let header = events.read_header(EventKind::Dpc, 1).unwrap();
        assert!(header.flags.contains(EventFlags::IRQ | EventFlags::CLI | EventFlags::LOG));
        assert!(header.occurred);

        events.disable(source, EventFlags::IRQ | EventFlags::CLI).unwrap();
        assert_eq!(sim.header(EventKind::Dpc, 1), before);
    }

    #[test]
    fn test_enable_every_index() {
        let sim = SimSwitch::builder().partitions(2).pffs(4).build();
        let device = sim.attach(0);

        let written = device
            .events()
            .enable(EventSource::all(EventKind::LinkState), EventFlags::IRQ)
            .unwrap();
        assert_eq!(written, 4);
        for pff in 0..4 {
            assert_eq!(sim.header(EventKind::LinkState, pff), EventFlags::IRQ.bits());
        }

        let written = device
            .events()
            .enable(EventSource::all(EventKind::GpioInterrupt), EventFlags::LOG)
            .unwrap();
        assert_eq!(written, 1);
    }

    #[test]
    fn test_out_of_range_sources() {
        let sim = SimSwitch::builder().partitions(3).pffs(4).build();
        let device = sim.attach(0);
        let events = device.events();

        let err = events
            .enable(EventSource::new(EventKind::PartReset, 3), EventFlags::IRQ)
            .unwrap_err();
        assert!(matches!(
            err,
            SwitchtecError::GasError(GasError::OutOfRange { index: 3, count: 3, .. })
        ));
        assert!(events.read_summary(SummaryScope::PortFunction(4)).is_err());
        assert!(events.read_header(EventKind::SysReset, 1).is_err());
    }

    #[test]
    fn test_fatal_event_kills_device() {
        let sim = SimSwitch::builder().build();
        let device = sim.attach(0);
        let pending = device.mrpc().submit(0x01, &[]).unwrap();

        sim.raise(EventKind::FwFatal, 0, &[]);
        assert_eq!(device.events().dispatch_all().unwrap(), 1);

        assert!(!device.is_alive());
        assert_eq!(device.death_reason(), Some(DeathReason::FatalEvent));
        assert_eq!(pending.wait(), Err(MrpcError::Interrupted));
        assert_eq!(sim.header(EventKind::FwFatal, 0) & EVENT_OCCURRED, 0);
    }

    #[test]
    fn test_fatal_header_bit_kills_device() {
        let sim = SimSwitch::builder().pffs(1).bind(0, &[0]).build();
        let device = sim.attach(0);

        sim.raise(EventKind::Hotplug, 0, &[0; 5]);
        device.events().dispatch_all().unwrap();
        assert!(device.is_alive());

        sim.set_header(EventKind::Hotplug, 0, EventFlags::FATAL.bits());
        sim.raise(EventKind::Hotplug, 0, &[0; 5]);
        device.events().dispatch_all().unwrap();
        assert!(!device.is_alive());
    }

    #[test]
    fn test_handlers_see_occurrence_data() {
        let sim = SimSwitch::builder().partitions(2).pffs(4).bind(0, &[3]).build();
        let device = sim.attach(0);
        let seen = Arc::new(Mutex::new(Vec::new()));

        let sink = Arc::clone(&seen);
        device.events().on_event(Some(EventKind::Cts), move |occurrence| {
            sink.lock().push(occurrence.clone());
        });
        let all = Arc::new(AtomicU64::new(0));
        let counter = Arc::clone(&all);
        device.events().on_event(None, move |_| {
            counter.fetch_add(1, Ordering::Relaxed);
        });

        sim.raise(EventKind::Cts, 3, &[1, 2, 3, 4, 5]);
        sim.raise(EventKind::SysReset, 0, &[]);
        assert_eq!(device.events().dispatch_all().unwrap(), 2);

        let seen = seen.lock();
        assert_eq!(seen.len(), 1);
        assert_eq!(seen[0].index, 3);
        assert_eq!(seen[0].data, vec![1, 2, 3, 4, 5]);
        assert!(!seen[0].fatal);
        assert_eq!(all.load(Ordering::Relaxed), 2);

        let counts = device.events().kind_counts();
        assert!(counts.contains(&(EventKind::Cts, 1)));
        assert!(counts.contains(&(EventKind::SysReset, 1)));
    }

    #[test]
    fn test_mrpc_completion_event_finishes_request() {
        let sim = SimSwitch::builder()
            .echo_firmware()
            .completion_event()
            .response_delay(Duration::from_millis(20))
            .build();
        let config = SimSwitch::test_config()
            .with_timeout(Duration::from_secs(120))
            .with_completion_poll_interval(Duration::from_secs(60));
        let device = sim.attach_with(0, config);

        let mut handle = device.mrpc().submit_with_output_len(0x01, &[1, 2, 3, 4], 2).unwrap();
        assert!(sim.wait_responses(1, Duration::from_secs(5)));

        assert!(device.events().dispatch_all().unwrap() >= 1);
        assert_eq!(handle.wait_for(Duration::from_secs(5)), Some(Ok(vec![9, 9])));
    }

    #[test]
    fn test_dynamic_binding_replaces_topology() {
        let sim = SimSwitch::builder().partitions(2).pffs(4).bind(0, &[1]).bind(1, &[2]).build();
        let device = sim.attach(0);
        let before = device.topology();
        assert_eq!(before.local().iter().collect::<Vec<_>>(), vec![1]);

        sim.rebind(0, &[1, 3]);
        sim.raise(EventKind::DynPartBindComp, 0, &[0; 5]);
        device.events().dispatch_all().unwrap();

        assert_eq!(device.local_port_functions().iter().collect::<Vec<_>>(), vec![1, 3]);
        assert_eq!(device.topology().owner_of(2), Some(1));
        assert_eq!(before.local().iter().collect::<Vec<_>>(), vec![1]);
    }

    #[test]
    fn test_rebinding_moves_pff_out_of_partition_summary() {
        let sim = SimSwitch::builder().partitions(2).pffs(4).bind(0, &[1, 2]).build();
        let device = sim.attach(0);
        let events = device.events();

        sim.rebind(0, &[1]);
        sim.rebind(1, &[2]);
        sim.raise(EventKind::DynPartBindComp, 0, &[0; 5]);
        assert_eq!(events.dispatch_all().unwrap(), 1);
        assert_eq!(device.local_port_functions().iter().collect::<Vec<_>>(), vec![1]);

        sim.raise(EventKind::Hotplug, 2, &[0; 5]);
        assert!(events.read_summary(SummaryScope::Partition(0)).unwrap().is_empty());
        assert!(events
            .read_summary(SummaryScope::Partition(1))
            .unwrap()
            .contains(EventKind::Hotplug));
        assert_eq!(events.dispatch_all().unwrap(), 0);
        assert_ne!(sim.header(EventKind::Hotplug, 2) & EVENT_OCCURRED, 0);
    }

    #[test]
    fn test_wait_for_event() {
        let sim = SimSwitch::builder().build();
        let device = Arc::new(sim.attach(0));

        assert_eq!(device.events().wait_for_event(0, Duration::from_millis(10)), None);

        let dispatcher = {
            let device = Arc::clone(&device);
            let sim = sim.clone();
            std::thread::spawn(move || {
                std::thread::sleep(Duration::from_millis(20));
                sim.raise(EventKind::GpioInterrupt, 0, &[0x55]);
                device.events().dispatch_all().unwrap()
            })
        };

        assert_eq!(device.events().wait_for_event(0, Duration::from_secs(5)), Some(1));
        assert_eq!(dispatcher.join().unwrap(), 1);
        assert_eq!(device.events().wait_for_event(1, Duration::from_millis(10)), None);
    }

    #[test]
    fn test_snapshot() {
        let sim = SimSwitch::builder().partitions(2).pffs(2).bind(0, &[1]).build();
        let device = sim.attach(0);

        sim.raise(EventKind::Hotplug, 1, &[0; 5]);
        let snapshot = device.events().snapshot().unwrap();
        assert_eq!(snapshot.part_bitmap, 1);
        assert_eq!(snapshot.global, 0);
        assert_eq!(snapshot.local_part, 0);
        assert_eq!(snapshot.part.len(), 2);
        assert_ne!(snapshot.pff[1], 0);
        assert_eq!(snapshot.pending, vec!["hotplug"]);
    }
}
