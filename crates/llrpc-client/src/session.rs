//! One live reader connection: write half, inbound loop, shared state.

use std::io::ErrorKind;
use std::sync::atomic::{AtomicU64, Ordering};
use std::sync::{Arc, Mutex, MutexGuard};
use std::thread::{self, JoinHandle};
use std::time::Duration;

use llrpc_frame::{
    FrameConfig, FrameError, FrameReader, FrameWriter, Message, MessageType, LLRP_VERSION_1,
};
use llrpc_transport::LlrpStream;
use serde::Serialize;
use tracing::{debug, info, trace, warn};

use crate::config::ClientConfig;
use crate::correlator::{Completion, Correlator, Resolution};
use crate::dispatcher::{CategoryStats, Dispatcher, Notification, ReportBufferStats};
use crate::error::{ClientError, ConnectError, Result};
use crate::handshake;
use crate::report::{ReaderCapabilities, ReaderConfig, ReaderEvent, ReaderEventKind, RoAccessReport};
use crate::rospec::{RoSpecOp, RoSpecTable};
use crate::status::LlrpStatus;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "snake_case")]
pub enum ConnectionState {
    Connected,
    /// CLOSE_CONNECTION sent, waiting out the grace period.
    Closing,
    Closed,
}

impl std::fmt::Display for ConnectionState {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        let name = match self {
            ConnectionState::Connected => "connected",
            ConnectionState::Closing => "closing",
            ConnectionState::Closed => "closed",
        };
        f.write_str(name)
    }
}

/// Point-in-time counters for one connection.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct Diagnostics {
    pub connection_state: ConnectionState,
    pub pending_requests: usize,
    pub frames_received: u64,
    pub keepalives: u64,
    pub access_reports: u64,
    pub reader_events: u64,
    pub protocol_violations: u64,
    pub late_responses: u64,
    pub categories: Vec<CategoryStats>,
    pub report_buffer: ReportBufferStats,
}

#[derive(Default)]
struct Counters {
    frames_received: AtomicU64,
    keepalives: AtomicU64,
    access_reports: AtomicU64,
    reader_events: AtomicU64,
    protocol_violations: AtomicU64,
    late_responses: AtomicU64,
}

fn bump(counter: &AtomicU64) -> u64 {
    counter.fetch_add(1, Ordering::Relaxed) + 1
}

pub(crate) struct Session {
    peer: String,
    protocol_version: u8,
    response_timeout: Duration,
    close_grace: Duration,
    auto_ack_keepalive: bool,
    writer: Mutex<FrameWriter<LlrpStream>>,
    /// Clone of the stream used only to shut it down.
    control: LlrpStream,
    correlator: Correlator,
    dispatcher: Dispatcher,
    rospecs: Mutex<RoSpecTable>,
    state: Mutex<ConnectionState>,
    last_error: Mutex<Option<String>>,
    counters: Counters,
    inbound: Mutex<Option<JoinHandle<()>>>,
}

fn lock<T>(mutex: &Mutex<T>) -> MutexGuard<'_, T> {
    mutex.lock().unwrap_or_else(|e| e.into_inner())
}

impl Session {
    /// Run the connection handshake on `stream` and start the inbound loop.
    pub(crate) fn establish(stream: LlrpStream, config: &ClientConfig) -> Result<Arc<Self>> {
        let peer = stream.peer_label();
        debug!(%peer, "establishing session");

        let frame_config = FrameConfig {
            max_frame_size: config.max_frame_size,
            read_timeout: Some(config.connect_timeout()),
            write_timeout: Some(config.response_timeout()),
        };
        let read_half = stream.try_clone().map_err(ConnectError::from)?;
        let control = stream.try_clone().map_err(ConnectError::from)?;
        let mut reader = FrameReader::with_config_llrp(read_half, frame_config.clone())
            .map_err(|err| ConnectError::Handshake(err.to_string()))?;
        let writer = FrameWriter::with_config_llrp(stream, frame_config)
            .map_err(|err| ConnectError::Handshake(err.to_string()))?;

        let (protocol_version, accepted) = if config.await_connection_event {
            let result = handshake::await_connection_event(&mut reader, config.connect_timeout())?;
            (result.protocol_version, Some(result.event))
        } else {
            (LLRP_VERSION_1, None)
        };
        reader
            .get_ref()
            .set_read_timeout(None)
            .map_err(ConnectError::from)?;

        let dispatcher = Dispatcher::new(config.notification_queue_capacity)?;
        let session = Arc::new(Self {
            peer,
            protocol_version,
            response_timeout: config.response_timeout(),
            close_grace: config.close_grace(),
            auto_ack_keepalive: config.auto_ack_keepalive,
            writer: Mutex::new(writer),
            control,
            correlator: Correlator::new(),
            dispatcher,
            rospecs: Mutex::new(RoSpecTable::new()),
            state: Mutex::new(ConnectionState::Connected),
            last_error: Mutex::new(None),
            counters: Counters::default(),
            inbound: Mutex::new(None),
        });

        if let Some(event) = accepted {
            bump(&session.counters.reader_events);
            session.dispatcher.publish(Notification::ReaderEvent(event));
        }

        let inbound = Arc::clone(&session);
        let handle = thread::Builder::new()
            .name("llrpc-inbound".to_string())
            .spawn(move || inbound.run_inbound(reader))
            .map_err(|err| ConnectError::Handshake(format!("spawn inbound loop: {err}")))?;
        *lock(&session.inbound) = Some(handle);

        info!(peer = %session.peer, version = protocol_version, "connected to reader");
        Ok(session)
    }

    pub(crate) fn peer(&self) -> &str {
        &self.peer
    }

    pub(crate) fn protocol_version(&self) -> u8 {
        self.protocol_version
    }

    pub(crate) fn state(&self) -> ConnectionState {
        *lock(&self.state)
    }

    pub(crate) fn last_error(&self) -> Option<String> {
        lock(&self.last_error).clone()
    }

    pub(crate) fn rospecs(&self) -> MutexGuard<'_, RoSpecTable> {
        lock(&self.rospecs)
    }

    pub(crate) fn dispatcher(&self) -> &Dispatcher {
        &self.dispatcher
    }

    pub(crate) fn diagnostics(&self) -> Diagnostics {
        let c = &self.counters;
        Diagnostics {
            connection_state: self.state(),
            pending_requests: self.correlator.pending_count(),
            frames_received: c.frames_received.load(Ordering::Relaxed),
            keepalives: c.keepalives.load(Ordering::Relaxed),
            access_reports: c.access_reports.load(Ordering::Relaxed),
            reader_events: c.reader_events.load(Ordering::Relaxed),
            protocol_violations: c.protocol_violations.load(Ordering::Relaxed),
            late_responses: c.late_responses.load(Ordering::Relaxed),
            categories: self.dispatcher.stats(),
            report_buffer: self.dispatcher.report_buffer_stats(),
        }
    }

    fn ensure_connected(&self) -> Result<()> {
        match self.state() {
            ConnectionState::Connected => Ok(()),
            _ => match self.last_error() {
                Some(reason) => Err(ClientError::ConnectionLost(reason)),
                None => Err(ClientError::NotConnected),
            },
        }
    }

    /// Send a request and wait for its response. The response status is
    /// not interpreted here.
    pub(crate) fn request(&self, message: Message, op: Option<RoSpecOp>) -> Result<Message> {
        self.ensure_connected()?;
        self.round_trip(message, op, self.response_timeout)
    }

    fn round_trip(
        &self,
        message: Message,
        op: Option<RoSpecOp>,
        timeout: Duration,
    ) -> Result<Message> {
        let expected = message.message_type.response_type().ok_or_else(|| {
            ClientError::ProtocolViolation(format!("{} has no response", message.message_type))
        })?;
        let pending = self.correlator.register(expected, op)?;
        let message = message.with_id(pending.id());
        if let Err(err) = self.write(&message) {
            self.correlator.cancel(pending.id());
            return Err(err);
        }
        self.correlator.wait(pending, timeout)
    }

    /// Write a message that has no response.
    pub(crate) fn send(&self, message: Message) -> Result<()> {
        self.ensure_connected()?;
        let message = message.with_id(self.correlator.next_id());
        self.write(&message)
    }

    fn write(&self, message: &Message) -> Result<()> {
        let result = lock(&self.writer).write_message(message);
        match result {
            Ok(()) => {
                trace!(
                    id = message.message_id,
                    message_type = %message.message_type,
                    "message sent"
                );
                Ok(())
            }
            Err(err) => match stream_failure(&err) {
                Some(reason) => {
                    self.teardown(&reason);
                    Err(ClientError::ConnectionLost(reason))
                }
                None => Err(ClientError::from(err)),
            },
        }
    }

    /// Graceful close: CLOSE_CONNECTION, bounded wait, then teardown.
    pub(crate) fn close(&self) -> Result<()> {
        {
            let mut state = lock(&self.state);
            match *state {
                ConnectionState::Closed | ConnectionState::Closing => return Ok(()),
                _ => *state = ConnectionState::Closing,
            }
        }
        info!(peer = %self.peer, "closing connection");

        let result = self.close_handshake();
        self.teardown("connection closed by client");
        self.stop_threads();
        result
    }

    fn close_handshake(&self) -> Result<()> {
        let pending = self
            .correlator
            .register(MessageType::CloseConnectionResponse, None)?;
        let message = Message::close_connection().with_id(pending.id());
        let written = lock(&self.writer).write_message(&message);
        if let Err(err) = written {
            self.correlator.cancel(pending.id());
            return Err(ClientError::Frame(err));
        }

        match self.correlator.wait(pending, self.close_grace) {
            Ok(response) => {
                if let Err(err) = response_status(&response).and_then(LlrpStatus::into_result) {
                    warn!(error = %err, "reader rejected CLOSE_CONNECTION, forcing teardown");
                }
                Ok(())
            }
            Err(ClientError::Timeout(grace)) => {
                warn!(?grace, "no CLOSE_CONNECTION_RESPONSE within grace period, forcing teardown");
                Ok(())
            }
            Err(ClientError::ConnectionLost(reason)) => {
                debug!(%reason, "reader dropped connection during close");
                Ok(())
            }
            Err(err) => Err(err),
        }
    }

    /// Teardown without the CLOSE_CONNECTION exchange.
    pub(crate) fn abort(&self) {
        if self.state() != ConnectionState::Closed {
            *lock(&self.state) = ConnectionState::Closing;
            self.teardown("client dropped");
        }
        self.stop_threads();
    }

    /// Mark the connection closed and fail everything waiting on it.
    ///
    /// A teardown while Closing is expected and does not set `last_error`.
    fn teardown(&self, reason: &str) {
        let previous = {
            let mut state = lock(&self.state);
            std::mem::replace(&mut *state, ConnectionState::Closed)
        };
        if previous == ConnectionState::Closed {
            return;
        }
        if previous == ConnectionState::Closing {
            info!(peer = %self.peer, reason, "connection closed");
        } else {
            warn!(peer = %self.peer, reason, "connection lost");
            let mut last_error = lock(&self.last_error);
            if last_error.is_none() {
                *last_error = Some(reason.to_string());
            }
        }

        if let Err(err) = self.control.shutdown() {
            debug!(error = %err, "stream shutdown failed");
        }
        self.correlator.fail_all(reason);
        self.dispatcher.connection_closed(reason);
    }

    fn stop_threads(&self) {
        let inbound = lock(&self.inbound).take();
        if let Some(handle) = inbound {
            if handle.thread().id() != thread::current().id() && handle.join().is_err() {
                warn!("inbound loop panicked");
            }
        }
        self.dispatcher.shutdown();
    }

    fn run_inbound(&self, mut reader: FrameReader<LlrpStream>) {
        debug!(peer = %self.peer, "inbound loop started");
        let reason = loop {
            match reader.read_message() {
                Ok(message) => {
                    bump(&self.counters.frames_received);
                    self.handle_inbound(message);
                }
                Err(FrameError::Io(err))
                    if err.kind() == ErrorKind::WouldBlock || err.kind() == ErrorKind::TimedOut =>
                {
                    continue;
                }
                Err(FrameError::ConnectionClosed) => {
                    break "connection closed by reader".to_string();
                }
                Err(err) => break err.to_string(),
            }
        };
        self.teardown(&reason);
        debug!(peer = %self.peer, "inbound loop stopped");
    }

    fn handle_inbound(&self, message: Message) {
        trace!(
            id = message.message_id,
            message_type = %message.message_type,
            "message received"
        );
        match self.correlator.resolve(message) {
            Resolution::Matched(completion) => self.complete(completion),
            Resolution::Unsolicited(message) => self.route(message),
            Resolution::Late(message) => {
                let late = bump(&self.counters.late_responses);
                warn!(
                    id = message.message_id,
                    message_type = %message.message_type,
                    late,
                    "response arrived after its request timed out, discarded"
                );
            }
            Resolution::Violation(reason) => self.violation(&reason),
        }
    }

    fn violation(&self, reason: &str) {
        let total = bump(&self.counters.protocol_violations);
        warn!(reason, total, "protocol violation, frame dropped");
    }

    fn complete(&self, completion: Completion) {
        let message = &completion.message;
        debug!(
            id = message.message_id,
            message_type = %message.message_type,
            elapsed_ms = completion.elapsed.as_millis() as u64,
            "response received"
        );

        let succeeded = message.message_type != MessageType::ErrorMessage
            && LlrpStatus::from_message(message).is_ok_and(|status| status.is_success());
        if succeeded {
            if let Some(op) = &completion.op {
                self.rospecs().apply(op, message);
            }
            self.publish_response(message);
        }
        completion.deliver();
    }

    fn publish_response(&self, message: &Message) {
        let notification = match message.message_type {
            MessageType::GetReaderCapabilitiesResponse => {
                ReaderCapabilities::from_message(message).map(Notification::ReaderCapabilities)
            }
            MessageType::GetReaderConfigResponse => {
                ReaderConfig::from_message(message).map(Notification::ReaderConfig)
            }
            _ => return,
        };
        match notification {
            Ok(notification) => self.dispatcher.publish(notification),
            Err(err) => self.violation(&err.to_string()),
        }
    }

    fn route(&self, message: Message) {
        match message.message_type {
            MessageType::KeepAlive => {
                let seen = bump(&self.counters.keepalives);
                debug!(id = message.message_id, seen, "keepalive");
                if self.auto_ack_keepalive {
                    if let Err(err) = self.send(Message::keepalive_ack()) {
                        warn!(error = %err, "failed to acknowledge keepalive");
                    }
                }
            }
            MessageType::RoAccessReport => match RoAccessReport::from_message(&message) {
                Ok(report) => {
                    bump(&self.counters.access_reports);
                    trace!(tags = report.tags.len(), "access report");
                    self.dispatcher.publish(Notification::RoAccessReport(report));
                }
                Err(err) => self.violation(&err.to_string()),
            },
            MessageType::ReaderEventNotification => match ReaderEvent::from_message(&message) {
                Ok(event) => {
                    bump(&self.counters.reader_events);
                    self.track_reader_event(&event);
                    self.dispatcher.publish(Notification::ReaderEvent(event));
                }
                Err(err) => self.violation(&err.to_string()),
            },
            other => self.violation(&format!(
                "unexpected {other} (id {}) from reader",
                message.message_id
            )),
        }
    }

    fn track_reader_event(&self, event: &ReaderEvent) {
        for kind in &event.events {
            match kind {
                ReaderEventKind::RoSpec {
                    event_type,
                    rospec_id,
                    ..
                } => {
                    debug!(rospec_id, event_type, "rospec event");
                    self.rospecs().apply_reader_event(*event_type, *rospec_id);
                }
                ReaderEventKind::ConnectionClose => {
                    info!(peer = %self.peer, "reader announced connection close");
                }
                ReaderEventKind::ReaderException { message } => {
                    warn!(detail = %message, "reader exception");
                }
                ReaderEventKind::ReportBufferOverflow => warn!("reader report buffer overflow"),
                _ => {}
            }
        }
    }
}

/// The LLRPStatus of a response, including ERROR_MESSAGE.
pub(crate) fn response_status(response: &Message) -> Result<LlrpStatus> {
    let status = LlrpStatus::from_message(response)?;
    if response.message_type == MessageType::ErrorMessage && status.is_success() {
        return Err(ClientError::ProtocolViolation(
            "ERROR_MESSAGE with a success status".to_string(),
        ));
    }
    Ok(status)
}

/// Teardown reason for a write error that leaves the stream unusable.
///
/// Encoding errors are caught before any byte is written and return `None`.
fn stream_failure(err: &FrameError) -> Option<String> {
    match err {
        FrameError::Io(_) | FrameError::ConnectionClosed | FrameError::ConnectionLost { .. } => {
            Some(format!("write failed: {err}"))
        }
        FrameError::FrameTooLarge { .. }
        | FrameError::ParameterTooLarge { .. }
        | FrameError::Decode(_) => None,
    }
}
