// Simulated switch for unit tests
//
// Behaves like the chip where the driver can tell the difference:
//   * event headers: bit 0 is write-one-to-clear, enable bits are plain
//   * summary registers and the partition bitmap track the occurred bits
//   * writing the MRPC command register sets the status to in-progress and
//     hands the command to a firmware thread

use parking_lot::{Condvar, Mutex};
use std::collections::HashMap;
use std::sync::mpsc::{self, Sender};
use std::sync::{Arc, Weak};
use std::time::Duration;

use switchtec_raw::gas::{self, MAX_PFF_CSR};
use switchtec_raw::layout::mrpc::{self, MrpcStatus, PAYLOAD_SIZE};
use switchtec_raw::layout::{ntb, part_cfg, pff_csr, sw_event};
use switchtec_raw::event::EVENT_OCCURRED;
use switchtec_raw::{EventKind, EventScope, GasWindow, MemWindow, Result, MICROSEMI_VENDOR_ID};

use crate::config::DeviceConfig;
use crate::device::{AttachInfo, Device};

/// What the simulated firmware does with a command
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Reply {
    Done(Vec<u8>),
    Error(u32),
    /// Never complete; status stays in-progress
    Hang,
}

type Firmware = Arc<dyn Fn(u32, &[u8]) -> Reply + Send + Sync>;

/// 0x01 answers `[9, 9]`, 0x02 hangs, 0x03 fails with code 7, the rest echo
pub fn standard_firmware(cmd: u32, input: &[u8]) -> Reply {
    match cmd {
        0x01 => Reply::Done(vec![9, 9]),
        0x02 => Reply::Hang,
        0x03 => Reply::Error(7),
        _ => Reply::Done(input.to_vec()),
    }
}

fn header_address(kind: EventKind, index: usize) -> usize {
    let base = match kind.scope() {
        EventScope::Global => gas::SW_EVENT_OFFSET,
        EventScope::Partition => gas::part_cfg(index).unwrap().offset,
        EventScope::PortFunction => gas::pff_csr(index).unwrap().offset,
    };
    base + kind.header_offset()
}

fn is_mailbox(offset: usize) -> bool {
    (gas::MRPC_OFFSET..gas::MRPC_OFFSET + mrpc::SIZE).contains(&offset)
}

#[derive(Debug, Default)]
struct Counters {
    cmd_writes: usize,
    /// Command writes that landed while a command was still in progress
    overlapping_cmd_writes: usize,
    mailbox_writes: usize,
    commands: Vec<u32>,
    responses: usize,
}

struct SimInner {
    mem: MemWindow,
    partition_count: usize,
    pff_count: usize,
    headers: HashMap<usize, (EventKind, usize)>,
    hw: Mutex<Counters>,
    responded: Condvar,
    firmware_tx: Mutex<Option<Sender<u32>>>,
    completion_event: Option<usize>,
    response_delay: Duration,
}

#[derive(Clone)]
pub struct SimSwitch {
    inner: Arc<SimInner>,
}

pub struct SimBuilder {
    partitions: usize,
    pffs: usize,
    local: usize,
    bindings: Vec<(usize, Vec<usize>)>,
    firmware: Option<Firmware>,
    completion_event: bool,
    response_delay: Duration,
}

impl SimBuilder {
    pub fn partitions(mut self, count: usize) -> Self {
        self.partitions = count;
        self
    }

    pub fn pffs(mut self, count: usize) -> Self {
        self.pffs = count;
        self
    }

    /// Partition reported by the NTB info block
    pub fn local(mut self, partition: usize) -> Self {
        self.local = partition;
        self
    }

    /// Bind PFFs to a partition: the first is the USP, the rest DSPs
    pub fn bind(mut self, partition: usize, pffs: &[usize]) -> Self {
        self.bindings.push((partition, pffs.to_vec()));
        self
    }

    pub fn echo_firmware(self) -> Self {
        self.firmware(standard_firmware)
    }

    pub fn firmware<F>(mut self, firmware: F) -> Self
    where
        F: Fn(u32, &[u8]) -> Reply + Send + Sync + 'static,
    {
        self.firmware = Some(Arc::new(firmware));
        self
    }

    /// Raise the local partition's MRPC completion event on every response
    pub fn completion_event(mut self) -> Self {
        self.completion_event = true;
        self
    }

    pub fn response_delay(mut self, delay: Duration) -> Self {
        self.response_delay = delay;
        self
    }

    pub fn build(self) -> SimSwitch {
        let mem = MemWindow::new(gas::GAS_SIZE);
        let ntb_base = gas::NTB_OFFSET;
        mem.write_bytes(ntb_base + ntb::PARTITION_COUNT, &[self.partitions as u8, self.local as u8])
            .unwrap();

        for pff in 0..self.pffs {
            let base = gas::pff_csr(pff).unwrap().offset;
            mem.write_bytes(base + pff_csr::VENDOR_ID, &MICROSEMI_VENDOR_ID.to_le_bytes())
                .unwrap();
        }

        for partition in 0..self.partitions {
            let base = gas::part_cfg(partition).unwrap().offset;
            mem.write32(base + part_cfg::USP_PFF_INST_ID, u32::MAX).unwrap();
            mem.write32(base + part_cfg::VEP_PFF_INST_ID, u32::MAX).unwrap();
            for slot in 0..part_cfg::DSP_PFF_INST_COUNT {
                mem.write32(base + part_cfg::dsp_pff_inst_id(slot), u32::MAX).unwrap();
            }
        }

        let mut headers = HashMap::new();
        for kind in EventKind::ALL {
            let count = match kind.scope() {
                EventScope::Global => 1,
                EventScope::Partition => self.partitions,
                EventScope::PortFunction => self.pffs,
            };
            for index in 0..count {
                headers.insert(header_address(*kind, index), (*kind, index));
            }
        }

        let inner = Arc::new(SimInner {
            mem,
            partition_count: self.partitions,
            pff_count: self.pffs,
            headers,
            hw: Mutex::new(Counters::default()),
            responded: Condvar::new(),
            firmware_tx: Mutex::new(None),
            completion_event: self.completion_event.then_some(self.local),
            response_delay: self.response_delay,
        });

        let sim = SimSwitch { inner };
        for (partition, pffs) in &self.bindings {
            sim.rebind(*partition, pffs);
        }
        if let Some(firmware) = self.firmware {
            sim.start_firmware(firmware);
        }
        sim
    }
}

impl SimSwitch {
    pub fn builder() -> SimBuilder {
        SimBuilder {
            partitions: 1,
            pffs: 0,
            local: 0,
            bindings: Vec::new(),
            firmware: None,
            completion_event: false,
            response_delay: Duration::from_millis(1),
        }
    }

    /// Config with a fast watchdog poll, for tests
    pub fn test_config() -> DeviceConfig {
        DeviceConfig::default()
            .with_timeout(Duration::from_secs(5))
            .with_completion_poll_interval(Duration::from_millis(1))
    }

    pub fn attach(&self, partition: usize) -> Device {
        self.attach_with(partition, Self::test_config())
    }

    pub fn attach_with(&self, partition: usize, config: DeviceConfig) -> Device {
        let info = AttachInfo {
            partition,
            partition_count: self.inner.partition_count,
            pff_count: self.inner.pff_count,
        };
        Device::attach(Arc::new(self.clone()), info, config).unwrap()
    }

    fn start_firmware(&self, firmware: Firmware) {
        let (tx, rx) = mpsc::channel::<u32>();
        *self.inner.firmware_tx.lock() = Some(tx);
        let weak: Weak<SimInner> = Arc::downgrade(&self.inner);

        std::thread::spawn(move || {
            while let Ok(cmd) = rx.recv() {
                let Some(inner) = weak.upgrade() else {
                    return;
                };
                std::thread::sleep(inner.response_delay);

                let mut input = vec![0u8; PAYLOAD_SIZE];
                inner.mem.read_bytes(gas::MRPC_OFFSET + mrpc::INPUT_DATA, &mut input).unwrap();
                match firmware(cmd, &input) {
                    Reply::Done(output) => SimSwitch { inner }.respond(MrpcStatus::DONE, 0, &output),
                    Reply::Error(code) => SimSwitch { inner }.respond(MrpcStatus::ERROR, code, &[]),
                    Reply::Hang => {}
                }
            }
        });
    }

    /// Complete the in-progress command
    pub fn respond(&self, status: u32, ret_value: u32, output: &[u8]) {
        let mem = &self.inner.mem;
        mem.write_bytes(gas::MRPC_OFFSET + mrpc::OUTPUT_DATA, output).unwrap();
        mem.write32(gas::MRPC_OFFSET + mrpc::RET_VALUE, ret_value).unwrap();
        mem.write32(gas::MRPC_OFFSET + mrpc::STATUS, status).unwrap();

        if let Some(partition) = self.inner.completion_event {
            self.raise(EventKind::MrpcComp, partition, &[]);
        }

        let mut hw = self.inner.hw.lock();
        hw.responses += 1;
        self.inner.responded.notify_all();
    }

    /// Block until `count` responses have been written
    pub fn wait_responses(&self, count: usize, limit: Duration) -> bool {
        let deadline = std::time::Instant::now() + limit;
        let mut hw = self.inner.hw.lock();
        while hw.responses < count {
            if self.inner.responded.wait_until(&mut hw, deadline).timed_out() {
                return hw.responses >= count;
            }
        }
        true
    }

    /// Signal an event as the hardware would
    pub fn raise(&self, kind: EventKind, index: usize, data: &[u32]) {
        let _hw = self.inner.hw.lock();
        let addr = header_address(kind, index);
        let mem = &self.inner.mem;
        for (i, word) in data.iter().enumerate().take(kind.data_words()) {
            mem.write32(addr + 4 + i * 4, *word).unwrap();
        }
        let header = mem.read32(addr).unwrap();
        mem.write32(addr, header | EVENT_OCCURRED).unwrap();
        self.refresh_summaries();
    }

    pub fn header(&self, kind: EventKind, index: usize) -> u32 {
        self.inner.mem.read32(header_address(kind, index)).unwrap()
    }

    pub fn set_header(&self, kind: EventKind, index: usize, value: u32) {
        let _hw = self.inner.hw.lock();
        self.inner.mem.write32(header_address(kind, index), value).unwrap();
        self.refresh_summaries();
    }

    /// Rewrite a partition's PFF instance ids
    pub fn rebind(&self, partition: usize, pffs: &[usize]) {
        let base = gas::part_cfg(partition).unwrap().offset;
        let mem = &self.inner.mem;
        let mut ids = pffs.iter().map(|&pff| pff as u32);
        mem.write32(base + part_cfg::USP_PFF_INST_ID, ids.next().unwrap_or(u32::MAX))
            .unwrap();
        for slot in 0..part_cfg::DSP_PFF_INST_COUNT {
            mem.write32(base + part_cfg::dsp_pff_inst_id(slot), ids.next().unwrap_or(u32::MAX))
                .unwrap();
        }
        let _hw = self.inner.hw.lock();
        self.refresh_summaries();
    }

    pub fn cmd_writes(&self) -> usize {
        self.inner.hw.lock().cmd_writes
    }

    pub fn overlapping_cmd_writes(&self) -> usize {
        self.inner.hw.lock().overlapping_cmd_writes
    }

    pub fn mailbox_writes(&self) -> usize {
        self.inner.hw.lock().mailbox_writes
    }

    /// Commands in the order the firmware saw them
    pub fn commands(&self) -> Vec<u32> {
        self.inner.hw.lock().commands.clone()
    }

    fn summary_bits(&self, scope: EventScope, index: usize) -> u32 {
        let mem = &self.inner.mem;
        EventKind::in_scope(scope)
            .filter(|kind| mem.read32(header_address(*kind, index)).unwrap() & EVENT_OCCURRED != 0)
            .fold(0, |acc, kind| acc | (1 << kind.summary_bit()))
    }

    fn claimed_pffs(&self, partition: usize) -> Vec<usize> {
        let base = gas::part_cfg(partition).unwrap().offset;
        let mem = &self.inner.mem;
        let mut regs = vec![
            mem.read32(base + part_cfg::USP_PFF_INST_ID).unwrap(),
            mem.read32(base + part_cfg::VEP_PFF_INST_ID).unwrap(),
        ];
        for slot in 0..part_cfg::DSP_PFF_INST_COUNT {
            regs.push(mem.read32(base + part_cfg::dsp_pff_inst_id(slot)).unwrap());
        }
        regs.into_iter()
            .map(|reg| reg as usize)
            .filter(|&pff| pff < self.inner.pff_count.min(MAX_PFF_CSR))
            .collect()
    }

    /// Recompute every summary register; callers hold `hw`
    fn refresh_summaries(&self) {
        let mem = &self.inner.mem;

        let mut pff_summary = vec![0u32; self.inner.pff_count];
        for (pff, summary) in pff_summary.iter_mut().enumerate() {
            *summary = self.summary_bits(EventScope::PortFunction, pff);
            let base = gas::pff_csr(pff).unwrap().offset;
            mem.write32(base + pff_csr::PFF_EVENT_SUMMARY, *summary).unwrap();
        }

        let mut bitmap = 0u64;
        for partition in 0..self.inner.partition_count {
            let own = self.summary_bits(EventScope::Partition, partition);
            let base = gas::part_cfg(partition).unwrap().offset;
            mem.write32(base + part_cfg::PART_EVENT_SUMMARY, own).unwrap();

            let ports_pending = self
                .claimed_pffs(partition)
                .iter()
                .any(|&pff| pff_summary[pff] != 0);
            if own != 0 || ports_pending {
                bitmap |= 1 << partition;
            }
        }

        let global = self.summary_bits(EventScope::Global, 0);
        mem.write32(gas::SW_EVENT_OFFSET + sw_event::GLOBAL_SUMMARY, global).unwrap();
        mem.write64(gas::SW_EVENT_OFFSET + sw_event::PART_EVENT_BITMAP, bitmap).unwrap();
    }
}

impl GasWindow for SimSwitch {
    fn size(&self) -> usize {
        self.inner.mem.size()
    }

    fn read32(&self, offset: usize) -> Result<u32> {
        self.inner.mem.read32(offset)
    }

    fn write32(&self, offset: usize, value: u32) -> Result<()> {
        let mem = &self.inner.mem;

        if self.inner.headers.contains_key(&offset) {
            let _hw = self.inner.hw.lock();
            let old = mem.read32(offset)?;
            let occurred = old & EVENT_OCCURRED != 0 && value & EVENT_OCCURRED == 0;
            let stored = (value & !EVENT_OCCURRED) | if occurred { EVENT_OCCURRED } else { 0 };
            mem.write32(offset, stored)?;
            self.refresh_summaries();
            return Ok(());
        }

        let cmd = gas::MRPC_OFFSET + mrpc::CMD;
        let status = gas::MRPC_OFFSET + mrpc::STATUS;
        if is_mailbox(offset) {
            let mut hw = self.inner.hw.lock();
            hw.mailbox_writes += 1;
            if offset == cmd {
                hw.cmd_writes += 1;
                hw.commands.push(value);
                if MrpcStatus::from_raw(mem.read32(status)?).is_in_progress() {
                    hw.overlapping_cmd_writes += 1;
                }
                mem.write32(cmd, value)?;
                mem.write32(status, MrpcStatus::IN_PROGRESS)?;
                drop(hw);

                if let Some(tx) = self.inner.firmware_tx.lock().as_ref() {
                    let _ = tx.send(value);
                }
                return Ok(());
            }
        }

        mem.write32(offset, value)
    }

    fn read_bytes(&self, offset: usize, buf: &mut [u8]) -> Result<()> {
        self.inner.mem.read_bytes(offset, buf)
    }

    fn write_bytes(&self, offset: usize, data: &[u8]) -> Result<()> {
        if is_mailbox(offset) {
            self.inner.hw.lock().mailbox_writes += 1;
        }
        self.inner.mem.write_bytes(offset, data)
    }
}
