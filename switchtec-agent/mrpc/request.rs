// MRPC request bookkeeping: the FIFO, the active slot and finished results

use std::collections::{HashMap, HashSet, VecDeque};
use std::sync::Arc;
use std::time::{Duration, Instant};

use crate::device::shared::Shared;
use crate::error::MrpcError;

pub type MrpcResult = std::result::Result<Vec<u8>, MrpcError>;

/// Submission-ordered request id
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub struct RequestId(pub u64);

/// Lifecycle position of a request
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum RequestState {
    Queued,
    Active,
    Done,
    Error,
    TimedOut,
    Interrupted,
}

impl RequestState {
    pub fn is_terminal(&self) -> bool {
        !matches!(self, RequestState::Queued | RequestState::Active)
    }

    fn of(result: &MrpcResult) -> Self {
        match result {
            Ok(_) => RequestState::Done,
            Err(MrpcError::Timeout { .. }) => RequestState::TimedOut,
            Err(MrpcError::Interrupted) => RequestState::Interrupted,
            Err(_) => RequestState::Error,
        }
    }
}

#[derive(Debug)]
pub(crate) struct MrpcRequest {
    pub id: RequestId,
    pub cmd: u32,
    pub input: Vec<u8>,
    pub output_len: usize,
}

#[derive(Debug)]
pub(crate) struct ActiveRequest {
    pub request: MrpcRequest,
    pub started: Instant,
    pub deadline: Instant,
}

#[derive(Debug, Default)]
pub(crate) struct MrpcQueue {
    next_id: u64,
    pub pending: VecDeque<MrpcRequest>,
    pub active: Option<ActiveRequest>,
    finished: HashMap<RequestId, MrpcResult>,
    abandoned: HashSet<RequestId>,
}

impl MrpcQueue {
    pub fn enqueue(&mut self, cmd: u32, input: Vec<u8>, output_len: usize) -> RequestId {
        let id = RequestId(self.next_id);
        self.next_id += 1;
        self.pending.push_back(MrpcRequest {
            id,
            cmd,
            input,
            output_len,
        });
        id
    }

    pub fn is_busy(&self) -> bool {
        self.active.is_some()
    }

    /// Record a terminal result; results of abandoned handles are dropped
    pub fn finish(&mut self, id: RequestId, result: MrpcResult) {
        if self.abandoned.remove(&id) {
            tracing::debug!("Discarding result of abandoned MRPC request {:?}", id);
            return;
        }
        self.finished.insert(id, result);
    }

    pub fn take_result(&mut self, id: RequestId) -> Option<MrpcResult> {
        self.finished.remove(&id)
    }

    /// Fail the active request and every queued request with `error`
    pub fn fail_all(&mut self, error: MrpcError) -> usize {
        let mut failed = 0;
        if let Some(active) = self.active.take() {
            self.finish(active.request.id, Err(error.clone()));
            failed += 1;
        }
        while let Some(request) = self.pending.pop_front() {
            self.finish(request.id, Err(error.clone()));
            failed += 1;
        }
        failed
    }

    pub fn state_of(&self, id: RequestId) -> Option<RequestState> {
        if let Some(result) = self.finished.get(&id) {
            return Some(RequestState::of(result));
        }
        if self.active.as_ref().is_some_and(|a| a.request.id == id) {
            return Some(RequestState::Active);
        }
        if self.pending.iter().any(|r| r.id == id) {
            return Some(RequestState::Queued);
        }
        None
    }

    /// Handle dropped before its result was taken
    pub fn abandon(&mut self, id: RequestId) {
        if self.finished.remove(&id).is_none() && self.state_of(id).is_some() {
            self.abandoned.insert(id);
        }
    }
}

/// Caller's claim on one submitted request
///
/// The result is taken exactly once, by [`RequestHandle::wait`] or a
/// successful [`RequestHandle::wait_for`]. Dropping an unfinished handle
/// discards the result when it arrives; the request itself still runs.
pub struct RequestHandle {
    id: RequestId,
    cmd: u32,
    shared: Arc<Shared>,
    /// Terminal state of a result already handed to the caller
    taken: Option<RequestState>,
}

impl RequestHandle {
    pub(crate) fn new(id: RequestId, cmd: u32, shared: Arc<Shared>) -> Self {
        Self {
            id,
            cmd,
            shared,
            taken: None,
        }
    }

    pub fn id(&self) -> RequestId {
        self.id
    }

    pub fn cmd(&self) -> u32 {
        self.cmd
    }

    pub fn state(&self) -> RequestState {
        if let Some(state) = self.taken {
            return state;
        }
        self.shared
            .lock()
            .mrpc
            .state_of(self.id)
            .unwrap_or(RequestState::Interrupted)
    }

    /// Take the result if the request is terminal
    pub fn try_take(&mut self) -> Option<MrpcResult> {
        if self.taken.is_some() {
            return None;
        }
        let result = self.shared.lock().mrpc.take_result(self.id);
        self.record(result)
    }

    fn record(&mut self, result: Option<MrpcResult>) -> Option<MrpcResult> {
        self.taken = result.as_ref().map(RequestState::of);
        result
    }

    /// Block until the request reaches a terminal state
    ///
    /// The watchdog bounds how long any active request can run, so this
    /// returns once every request ahead of this one has finished or the
    /// device has died.
    pub fn wait(mut self) -> MrpcResult {
        let mut state = self.shared.state.lock();
        loop {
            if let Some(result) = state.mrpc.take_result(self.id) {
                self.taken = Some(RequestState::of(&result));
                return result;
            }
            if state.mrpc.state_of(self.id).is_none() {
                self.taken = Some(RequestState::Interrupted);
                return Err(MrpcError::Interrupted);
            }
            self.shared.cond.wait(&mut state);
        }
    }

    /// Wait at most `limit`; `None` leaves the request pending
    pub fn wait_for(&mut self, limit: Duration) -> Option<MrpcResult> {
        if self.taken.is_some() {
            return None;
        }
        let deadline = Instant::now() + limit;
        let mut state = self.shared.state.lock();
        loop {
            if let Some(result) = state.mrpc.take_result(self.id) {
                self.taken = Some(RequestState::of(&result));
                return Some(result);
            }
            if self.shared.cond.wait_until(&mut state, deadline).timed_out() {
                let result = state.mrpc.take_result(self.id);
                drop(state);
                return self.record(result);
            }
        }
    }
}

impl std::fmt::Debug for RequestHandle {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("RequestHandle")
            .field("id", &self.id)
            .field("cmd", &format_args!("0x{:X}", self.cmd))
            .finish()
    }
}

impl Drop for RequestHandle {
    fn drop(&mut self) {
        if self.taken.is_none() {
            self.shared.lock().mrpc.abandon(self.id);
        }
    }
}
