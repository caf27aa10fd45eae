//! Request/response correlation by message ID.
//!
//! Every request registers a pending entry before it is written. The
//! inbound loop resolves entries as responses arrive; callers block on
//! their own channel until the response, a timeout, or connection loss.

use std::collections::{HashMap, VecDeque};
use std::sync::mpsc::{self, Receiver, RecvTimeoutError, SyncSender};
use std::sync::Mutex;
use std::time::{Duration, Instant};

use llrpc_frame::{Message, MessageType};
use tracing::{debug, trace};

use crate::error::{ClientError, Result};
use crate::rospec::RoSpecOp;

/// How many timed-out IDs are remembered for late-response detection.
const EXPIRED_HISTORY: usize = 256;

struct Pending {
    expected: MessageType,
    op: Option<RoSpecOp>,
    sent_at: Instant,
    tx: SyncSender<Result<Message>>,
}

struct State {
    next_id: u32,
    pending: HashMap<u32, Pending>,
    expired: VecDeque<u32>,
    closed: Option<String>,
}

/// A registered request awaiting its response.
#[derive(Debug)]
pub struct PendingRequest {
    id: u32,
    expected: MessageType,
    rx: Receiver<Result<Message>>,
}

impl PendingRequest {
    pub fn id(&self) -> u32 {
        self.id
    }

    pub fn expected(&self) -> MessageType {
        self.expected
    }
}

/// A matched response, handed back to the inbound loop so it can update
/// shadow state before the waiter observes the result.
#[derive(Debug)]
pub struct Completion {
    pub message: Message,
    pub op: Option<RoSpecOp>,
    pub elapsed: Duration,
    tx: SyncSender<Result<Message>>,
}

impl Completion {
    pub fn deliver(self) {
        // The waiter may already have given up; nothing to do then.
        let _ = self.tx.try_send(Ok(self.message));
    }
}

#[derive(Debug)]
pub enum Resolution {
    Matched(Completion),
    /// Not a reply. Route it to the notification dispatcher.
    Unsolicited(Message),
    /// A reply whose waiter already timed out.
    Late(Message),
    /// A reply nobody asked for, or of the wrong type. Dropped.
    Violation(String),
}

pub struct Correlator {
    state: Mutex<State>,
}

impl Default for Correlator {
    fn default() -> Self {
        Self::new()
    }
}

impl Correlator {
    pub fn new() -> Self {
        Self {
            state: Mutex::new(State {
                next_id: 1,
                pending: HashMap::new(),
                expired: VecDeque::new(),
                closed: None,
            }),
        }
    }

    fn lock(&self) -> std::sync::MutexGuard<'_, State> {
        self.state.lock().unwrap_or_else(|e| e.into_inner())
    }

    /// Register a request expecting `expected`, and assign its message ID.
    pub fn register(&self, expected: MessageType, op: Option<RoSpecOp>) -> Result<PendingRequest> {
        let mut state = self.lock();
        if let Some(reason) = &state.closed {
            return Err(ClientError::ConnectionLost(reason.clone()));
        }
        let id = allocate(&mut state);
        let (tx, rx) = mpsc::sync_channel(1);
        state.pending.insert(
            id,
            Pending {
                expected,
                op,
                sent_at: Instant::now(),
                tx,
            },
        );
        trace!(id, expected = %expected, "registered request");
        Ok(PendingRequest { id, expected, rx })
    }

    /// An ID for a message that expects no reply.
    pub fn next_id(&self) -> u32 {
        allocate(&mut self.lock())
    }

    /// Forget a request that could not be written.
    pub fn cancel(&self, id: u32) {
        self.lock().pending.remove(&id);
    }

    /// Block until the response for `request` arrives or `timeout` passes.
    pub fn wait(&self, request: PendingRequest, timeout: Duration) -> Result<Message> {
        match request.rx.recv_timeout(timeout) {
            Ok(result) => result,
            Err(RecvTimeoutError::Timeout) => {
                let mut state = self.lock();
                if state.pending.remove(&request.id).is_some() {
                    remember_expired(&mut state, request.id);
                    debug!(
                        id = request.id,
                        expected = %request.expected,
                        ?timeout,
                        "request timed out"
                    );
                    return Err(ClientError::Timeout(timeout));
                }
                drop(state);
                // Claimed by the inbound loop, which delivers or drops it.
                request
                    .rx
                    .recv()
                    .unwrap_or(Err(ClientError::Timeout(timeout)))
            }
            Err(RecvTimeoutError::Disconnected) => Err(ClientError::ConnectionLost(
                self.closed_reason()
                    .unwrap_or_else(|| "request abandoned".to_string()),
            )),
        }
    }

    /// Match an inbound message against pending requests.
    pub fn resolve(&self, message: Message) -> Resolution {
        let ty = message.message_type;
        if ty.is_unsolicited() {
            return Resolution::Unsolicited(message);
        }

        let mut state = self.lock();
        let id = message.message_id;
        match state.pending.get(&id).map(|pending| pending.expected) {
            Some(expected) if expected == ty || ty == MessageType::ErrorMessage => {
                match state.pending.remove(&id) {
                    Some(pending) => Resolution::Matched(Completion {
                        message,
                        op: pending.op,
                        elapsed: pending.sent_at.elapsed(),
                        tx: pending.tx,
                    }),
                    None => Resolution::Violation(format!("pending entry {id} vanished")),
                }
            }
            Some(expected) => Resolution::Violation(format!(
                "{ty} (id {id}) answers a request expecting {expected}"
            )),
            None if state.expired.contains(&id) => Resolution::Late(message),
            None if ty.is_response() => {
                Resolution::Violation(format!("{ty} (id {id}) matches no request"))
            }
            None => Resolution::Unsolicited(message),
        }
    }

    /// Fail every pending request and refuse new ones.
    pub fn fail_all(&self, reason: &str) {
        let drained: Vec<(u32, Pending)> = {
            let mut state = self.lock();
            if state.closed.is_none() {
                state.closed = Some(reason.to_string());
            }
            state.pending.drain().collect()
        };
        for (id, pending) in drained {
            debug!(id, expected = %pending.expected, reason, "failing pending request");
            let _ = pending
                .tx
                .try_send(Err(ClientError::ConnectionLost(reason.to_string())));
        }
    }

    pub fn pending_count(&self) -> usize {
        self.lock().pending.len()
    }

    pub fn closed_reason(&self) -> Option<String> {
        self.lock().closed.clone()
    }
}

/// Next free nonzero ID, wrapping at 2^32 and skipping IDs still pending.
fn allocate(state: &mut State) -> u32 {
    loop {
        let id = state.next_id;
        state.next_id = state.next_id.wrapping_add(1);
        if id != 0 && !state.pending.contains_key(&id) {
            return id;
        }
    }
}

fn remember_expired(state: &mut State, id: u32) {
    if state.expired.len() == EXPIRED_HISTORY {
        state.expired.pop_front();
    }
    state.expired.push_back(id);
}
