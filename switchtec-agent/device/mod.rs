//! Device context
//!
//! A [`Device`] binds one register window to the MRPC channel and the event
//! directory, and carries the identity of the partition this instance
//! manages. The alive flag, the MRPC queue and the ownership view share one
//! lock; once the device is marked dead it stays dead.

pub mod info;
pub(crate) mod shared;
pub mod topology;

use std::sync::Arc;

use switchtec_raw::GasWindow;

use crate::config::DeviceConfig;
use crate::error::Result;
use crate::events::EventDirectory;
use crate::mrpc::request::MrpcResult;
use crate::mrpc::MrpcChannel;

pub use info::{FlashInfo, FlashPartition, ImageDescriptor, SysInfo};
pub use shared::{DeathReason, MrpcStats};
pub use topology::{AttachInfo, PffSet, Topology};

use shared::Shared;

pub struct Device {
    shared: Arc<Shared>,
    mrpc: MrpcChannel,
    events: EventDirectory,
}

impl Device {
    /// Attach to a window whose partition identity is already known
    pub fn attach(window: Arc<dyn GasWindow>, info: AttachInfo, config: DeviceConfig) -> Result<Self> {
        info.validate()?;
        let topology = Topology::read(window.as_ref(), info)?;
        tracing::info!(
            "Attached to partition {} of {} ({} PFFs, local {:?})",
            info.partition,
            info.partition_count,
            info.pff_count,
            topology.local().iter().collect::<Vec<_>>()
        );

        let shared = Arc::new(Shared::new(window, config, topology));
        let mrpc = MrpcChannel::start(Arc::clone(&shared))?;
        let events = EventDirectory::new(Arc::clone(&shared));

        Ok(Self {
            shared,
            mrpc,
            events,
        })
    }

    /// Attach after reading partition identity from the chip
    pub fn probe(window: Arc<dyn GasWindow>, config: DeviceConfig) -> Result<Self> {
        let info = AttachInfo::probe(window.as_ref())?;
        Self::attach(window, info, config)
    }

    pub fn mrpc(&self) -> &MrpcChannel {
        &self.mrpc
    }

    pub fn events(&self) -> &EventDirectory {
        &self.events
    }

    /// Submit a command and wait for it
    pub fn execute(&self, cmd: u32, input: &[u8], output_len: usize) -> MrpcResult {
        self.mrpc.execute(cmd, input, output_len)
    }

    pub fn config(&self) -> &DeviceConfig {
        &self.shared.config
    }

    pub fn window(&self) -> &Arc<dyn GasWindow> {
        &self.shared.window
    }

    pub fn is_alive(&self) -> bool {
        self.shared.is_alive()
    }

    pub fn death_reason(&self) -> Option<DeathReason> {
        self.shared.lock().death
    }

    /// The single alive to dead transition; false if already dead
    pub fn mark_dead(&self, reason: DeathReason) -> bool {
        self.shared.mark_dead(reason)
    }

    /// Stop using the device; pending requests are interrupted
    pub fn detach(&self) {
        self.shared.mark_dead(DeathReason::Detached);
    }

    pub fn topology(&self) -> Arc<Topology> {
        self.shared.topology()
    }

    pub fn local_port_functions(&self) -> PffSet {
        self.shared.topology().local()
    }

    pub fn partition(&self) -> usize {
        self.shared.topology().partition()
    }

    pub fn refresh_topology(&self) -> Result<()> {
        self.events.refresh_topology()
    }

    pub fn mrpc_stats(&self) -> &MrpcStats {
        &self.shared.stats
    }

    pub fn sys_info(&self) -> Result<SysInfo> {
        SysInfo::read(self.shared.window.as_ref())
    }

    pub fn flash_info(&self) -> Result<FlashInfo> {
        FlashInfo::read(self.shared.window.as_ref())
    }
}

impl Drop for Device {
    fn drop(&mut self) {
        self.detach();
    }
}
