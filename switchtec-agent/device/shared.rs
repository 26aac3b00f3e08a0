// State shared by the MRPC channel, the event directory and the device
//
// The mailbox queue, the alive flag and the ownership view change together,
// so they sit behind a single lock. Every mailbox register access happens
// with that lock held.

use parking_lot::{Condvar, Mutex, MutexGuard};
use std::sync::atomic::{AtomicU64, Ordering};
use std::sync::Arc;

use switchtec_raw::GasWindow;

use crate::config::DeviceConfig;
use crate::device::topology::Topology;
use crate::error::MrpcError;
use crate::mrpc::request::MrpcQueue;

/// Why the device stopped being usable
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum DeathReason {
    MrpcTimeout,
    FatalEvent,
    RegisterFault,
    Detached,
}

impl DeathReason {
    pub fn name(&self) -> &'static str {
        match self {
            DeathReason::MrpcTimeout => "mrpc timeout",
            DeathReason::FatalEvent => "fatal event",
            DeathReason::RegisterFault => "register access fault",
            DeathReason::Detached => "detached",
        }
    }
}

pub(crate) struct DeviceState {
    pub alive: bool,
    pub death: Option<DeathReason>,
    pub topology: Arc<Topology>,
    pub mrpc: MrpcQueue,
    /// Set when the channel is dropped; stops the watchdog thread
    pub shutdown: bool,
}

/// Cumulative MRPC outcome counters
#[derive(Debug, Default)]
pub struct MrpcStats {
    pub submitted: AtomicU64,
    pub done: AtomicU64,
    pub error: AtomicU64,
    pub timeout: AtomicU64,
    pub interrupted: AtomicU64,
    pub rejected: AtomicU64,
}

impl MrpcStats {
    pub(crate) fn record(&self, result: &std::result::Result<Vec<u8>, MrpcError>) {
        let counter = match result {
            Ok(_) => &self.done,
            Err(MrpcError::Hardware { .. }) => &self.error,
            Err(MrpcError::Timeout { .. }) => &self.timeout,
            Err(MrpcError::Interrupted) => &self.interrupted,
            Err(MrpcError::PayloadTooLarge { .. }) => &self.rejected,
        };
        counter.fetch_add(1, Ordering::Relaxed);
    }
}

pub(crate) struct Shared {
    pub window: Arc<dyn GasWindow>,
    pub config: DeviceConfig,
    pub state: Mutex<DeviceState>,
    /// Wakes MRPC waiters and the watchdog
    pub cond: Condvar,
    pub stats: MrpcStats,
}

impl Shared {
    pub fn new(window: Arc<dyn GasWindow>, config: DeviceConfig, topology: Topology) -> Self {
        Self {
            window,
            config,
            state: Mutex::new(DeviceState {
                alive: true,
                death: None,
                topology: Arc::new(topology),
                mrpc: MrpcQueue::default(),
                shutdown: false,
            }),
            cond: Condvar::new(),
            stats: MrpcStats::default(),
        }
    }

    pub fn lock(&self) -> MutexGuard<'_, DeviceState> {
        self.state.lock()
    }

    pub fn is_alive(&self) -> bool {
        self.lock().alive
    }

    pub fn topology(&self) -> Arc<Topology> {
        Arc::clone(&self.lock().topology)
    }

    pub fn mark_dead(&self, reason: DeathReason) -> bool {
        let mut state = self.lock();
        self.mark_dead_locked(&mut state, reason)
    }

    /// The single alive → dead transition
    ///
    /// Fails every request still queued or active with `Interrupted` and wakes
    /// all waiters. Returns false when the device was already dead.
    pub fn mark_dead_locked(&self, state: &mut DeviceState, reason: DeathReason) -> bool {
        if !state.alive {
            return false;
        }
        state.alive = false;
        state.death = Some(reason);

        let failed = state.mrpc.fail_all(MrpcError::Interrupted);
        for _ in 0..failed {
            self.stats.record(&Err(MrpcError::Interrupted));
        }

        match reason {
            DeathReason::Detached => {
                tracing::info!("Device detached, {} pending MRPC requests interrupted", failed)
            }
            _ => tracing::error!(
                "Device marked dead ({}), {} pending MRPC requests interrupted",
                reason.name(),
                failed
            ),
        }

        self.cond.notify_all();
        true
    }

    /// Swap in a freshly read ownership view
    pub fn replace_topology(&self, topology: Topology) -> bool {
        let mut state = self.lock();
        if *state.topology == topology {
            return false;
        }
        if state.topology.local() != topology.local() {
            tracing::info!(
                "Local PFFs changed: {:?} -> {:?}",
                state.topology.local().iter().collect::<Vec<_>>(),
                topology.local().iter().collect::<Vec<_>>()
            );
        }
        state.topology = Arc::new(topology);
        true
    }
}
