// MRPC channel: one mailbox, one active request, FIFO for everyone else
//
// Request flow:
//   submit -> pending FIFO -> (idle) write input, write cmd -> active
//   active -> status != in-progress -> finished, promote next
//   active -> deadline passed, still in-progress -> Timeout, device dead

use std::sync::Arc;
use std::thread::JoinHandle;
use std::time::Instant;

use switchtec_raw::gas;
use switchtec_raw::layout::mrpc::{self, MrpcStatus, PAYLOAD_SIZE};
use switchtec_raw::GasWindow;

use crate::device::shared::{DeathReason, DeviceState, Shared};
use crate::error::{MrpcError, Result};
use crate::mrpc::request::{ActiveRequest, MrpcRequest, MrpcResult, RequestHandle};

pub struct MrpcChannel {
    shared: Arc<Shared>,
    watchdog: Option<JoinHandle<()>>,
}

impl MrpcChannel {
    pub(crate) fn start(shared: Arc<Shared>) -> Result<Self> {
        let watchdog_shared = Arc::clone(&shared);
        let watchdog = std::thread::Builder::new()
            .name("mrpc-watchdog".to_string())
            .spawn(move || watchdog_loop(&watchdog_shared))?;

        Ok(Self {
            shared,
            watchdog: Some(watchdog),
        })
    }

    /// Submit a command expecting a full-size output payload
    pub fn submit(&self, cmd: u32, input: &[u8]) -> std::result::Result<RequestHandle, MrpcError> {
        self.submit_with_output_len(cmd, input, PAYLOAD_SIZE)
    }

    /// Submit a command; `output_len` bytes of the output payload are
    /// returned on success
    pub fn submit_with_output_len(
        &self,
        cmd: u32,
        input: &[u8],
        output_len: usize,
    ) -> std::result::Result<RequestHandle, MrpcError> {
        for len in [input.len(), output_len] {
            if len > PAYLOAD_SIZE {
                let err = MrpcError::PayloadTooLarge {
                    len,
                    max: PAYLOAD_SIZE,
                };
                self.shared.stats.record(&Err(err.clone()));
                return Err(err);
            }
        }

        let mut state = self.shared.lock();
        if !state.alive {
            return Err(MrpcError::Interrupted);
        }

        let id = state.mrpc.enqueue(cmd, input.to_vec(), output_len);
        self.shared
            .stats
            .submitted
            .fetch_add(1, std::sync::atomic::Ordering::Relaxed);
        tracing::debug!(
            "MRPC submit {:?}: cmd 0x{:X}, {} input bytes, {} queued",
            id,
            cmd,
            input.len(),
            state.mrpc.pending.len()
        );

        start_next_locked(&self.shared, &mut state);
        Ok(RequestHandle::new(id, cmd, Arc::clone(&self.shared)))
    }

    /// Wait for a request's terminal result
    pub fn poll_or_wait(&self, handle: RequestHandle) -> MrpcResult {
        handle.wait()
    }

    /// Non-blocking result check
    pub fn try_poll(&self, handle: &mut RequestHandle) -> Option<MrpcResult> {
        handle.try_take()
    }

    /// Submit and wait
    pub fn execute(&self, cmd: u32, input: &[u8], output_len: usize) -> MrpcResult {
        self.submit_with_output_len(cmd, input, output_len)?.wait()
    }

    /// Check the mailbox for completion of the active request
    ///
    /// Called from the MRPC completion event and the poll tick. Returns true
    /// if a request finished.
    pub fn complete(&self) -> bool {
        complete(&self.shared)
    }

    pub fn is_busy(&self) -> bool {
        self.shared.lock().mrpc.is_busy()
    }

    pub fn queued(&self) -> usize {
        self.shared.lock().mrpc.pending.len()
    }
}

impl Drop for MrpcChannel {
    fn drop(&mut self) {
        {
            let mut state = self.shared.lock();
            state.shutdown = true;
            self.shared.cond.notify_all();
        }
        if let Some(watchdog) = self.watchdog.take() {
            if watchdog.join().is_err() {
                tracing::error!("MRPC watchdog thread panicked");
            }
        }
    }
}

pub(crate) fn complete(shared: &Shared) -> bool {
    let mut state = shared.lock();
    complete_locked(shared, &mut state)
}

fn write_request(window: &dyn GasWindow, request: &MrpcRequest) -> switchtec_raw::Result<()> {
    let base = gas::MRPC_OFFSET;
    window.write_bytes(base + mrpc::INPUT_DATA, &request.input)?;
    // Writing the command register starts execution
    window.write32(base + mrpc::CMD, request.cmd)
}

/// Promote the head of the FIFO if the mailbox is idle
fn start_next_locked(shared: &Shared, state: &mut DeviceState) {
    while state.alive && state.mrpc.active.is_none() {
        let Some(request) = state.mrpc.pending.pop_front() else {
            return;
        };

        if let Err(e) = write_request(shared.window.as_ref(), &request) {
            tracing::error!("MRPC write of {:?} failed: {}", request.id, e);
            state.mrpc.finish(request.id, Err(MrpcError::Interrupted));
            shared.stats.record(&Err(MrpcError::Interrupted));
            shared.mark_dead_locked(state, DeathReason::RegisterFault);
            return;
        }

        let now = Instant::now();
        tracing::debug!("MRPC {:?} active: cmd 0x{:X}", request.id, request.cmd);
        state.mrpc.active = Some(ActiveRequest {
            request,
            started: now,
            deadline: now + shared.config.timeout_duration,
        });
        // Re-arm the watchdog for the new deadline
        shared.cond.notify_all();
    }
}

fn read_completion(
    window: &dyn GasWindow,
    request: &MrpcRequest,
    status: MrpcStatus,
) -> switchtec_raw::Result<MrpcResult> {
    let base = gas::MRPC_OFFSET;
    let code = window.read32(base + mrpc::RET_VALUE)?;

    if status != MrpcStatus::Done || code != 0 {
        return Ok(Err(MrpcError::Hardware {
            cmd: request.cmd,
            status: status.raw(),
            code,
        }));
    }

    let mut output = vec![0u8; request.output_len];
    window.read_bytes(base + mrpc::OUTPUT_DATA, &mut output)?;
    Ok(Ok(output))
}

/// Finish the active request if the hardware is done with it
fn complete_locked(shared: &Shared, state: &mut DeviceState) -> bool {
    let Some(active) = state.mrpc.active.as_ref() else {
        return false;
    };

    let window = shared.window.as_ref();
    let status = match window.read32(gas::MRPC_OFFSET + mrpc::STATUS) {
        Ok(raw) => MrpcStatus::from_raw(raw),
        Err(e) => {
            tracing::error!("MRPC status read failed: {}", e);
            shared.mark_dead_locked(state, DeathReason::RegisterFault);
            return true;
        }
    };
    if status.is_in_progress() {
        return false;
    }

    let result = match read_completion(window, &active.request, status) {
        Ok(result) => result,
        Err(e) => {
            tracing::error!("MRPC completion read failed: {}", e);
            shared.mark_dead_locked(state, DeathReason::RegisterFault);
            return true;
        }
    };

    let Some(active) = state.mrpc.active.take() else {
        return false;
    };
    match &result {
        Ok(output) => tracing::debug!(
            "MRPC {:?} done in {:?}, {} output bytes",
            active.request.id,
            active.started.elapsed(),
            output.len()
        ),
        Err(e) => tracing::warn!("MRPC {:?}: {}", active.request.id, e),
    }

    shared.stats.record(&result);
    state.mrpc.finish(active.request.id, result);
    start_next_locked(shared, state);
    shared.cond.notify_all();
    true
}

/// Deadline handling: one last status check, then the fatal transition
fn expire_locked(shared: &Shared, state: &mut DeviceState) {
    if complete_locked(shared, state) {
        return;
    }
    let Some(active) = state.mrpc.active.take() else {
        return;
    };

    let timeout = shared.config.timeout_duration;
    tracing::error!(
        "MRPC {:?} (cmd 0x{:X}) still in progress after {:?}; mailbox considered wedged",
        active.request.id,
        active.request.cmd,
        timeout
    );
    let result = Err(MrpcError::Timeout {
        cmd: active.request.cmd,
        timeout,
    });
    shared.stats.record(&result);
    state.mrpc.finish(active.request.id, result);
    shared.mark_dead_locked(state, DeathReason::MrpcTimeout);
}

fn watchdog_loop(shared: &Shared) {
    let poll = shared.config.completion_poll_interval;
    let mut state = shared.lock();

    loop {
        if state.shutdown {
            break;
        }

        let Some(deadline) = state.mrpc.active.as_ref().map(|a| a.deadline) else {
            shared.cond.wait(&mut state);
            continue;
        };

        if complete_locked(shared, &mut state) {
            continue;
        }

        let now = Instant::now();
        if now >= deadline {
            expire_locked(shared, &mut state);
            continue;
        }

        let wake = deadline.min(now + poll);
        shared.cond.wait_until(&mut state, wake);
    }

    tracing::debug!("MRPC watchdog stopped");
}
