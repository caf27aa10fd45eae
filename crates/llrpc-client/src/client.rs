//! The caller-facing client.

use std::sync::Arc;
use std::time::Duration;

use llrpc_frame::Message;
use llrpc_transport::{LlrpStream, TcpTransport};
use tracing::{debug, info};

use crate::config::{ClientConfig, ReaderSettings, RoSpecConfig};
use crate::dispatcher::{Category, Notification};
use crate::error::{ClientError, ConnectError, Result};
use crate::report::{ReaderCapabilities, ReaderConfig, ReaderEvent, RoAccessReport};
use crate::request::{set_reader_config_message, ALL_CAPABILITIES, ALL_CONFIGURATION};
use crate::rospec::{self, Precheck, RoSpecEntry, RoSpecOp, RoSpecState, RoSpecSummary};
use crate::session::{response_status, ConnectionState, Diagnostics, Session};
use crate::status::LlrpStatus;

/// A connection to one LLRP reader.
///
/// Operations block the calling thread until the reader answers or the
/// response timeout passes. Notifications are delivered on per-category
/// threads to handlers installed with [`Client::register_callback`].
///
/// Dropping the client tears the connection down without the
/// CLOSE_CONNECTION exchange; call [`Client::close`] for a graceful close.
pub struct Client {
    session: Arc<Session>,
    config: ClientConfig,
}

impl Client {
    /// Connect over TCP and wait for the reader to accept.
    pub fn connect(config: ClientConfig) -> Result<Self> {
        config.validate()?;
        let transport = TcpTransport::new(config.host.clone(), config.port)
            .with_connect_timeout(config.connect_timeout())
            .with_keepalive(config.tcp_keepalive);
        info!(addr = %transport.addr(), "connecting to reader");
        let stream = transport.connect().map_err(ConnectError::from)?;
        Self::from_stream(stream, config)
    }

    /// Run a client over an already connected stream.
    pub fn from_stream(stream: LlrpStream, config: ClientConfig) -> Result<Self> {
        config.validate()?;
        let session = Session::establish(stream, &config)?;
        Ok(Self { session, config })
    }

    pub fn config(&self) -> &ClientConfig {
        &self.config
    }

    // -------------------------------------------------------------------------
    // Notifications
    // -------------------------------------------------------------------------

    /// Install the handler for `category`, replacing any previous one.
    ///
    /// Handlers run on a delivery thread owned by the category and must not
    /// block for long: notifications of the same category queue behind them.
    pub fn register_callback<F>(&self, category: Category, handler: F)
    where
        F: FnMut(Notification) + Send + 'static,
    {
        self.session.dispatcher().register(category, Box::new(handler));
    }

    pub fn on_access_report<F>(&self, mut handler: F)
    where
        F: FnMut(RoAccessReport) + Send + 'static,
    {
        self.register_callback(Category::RoAccessReport, move |n| {
            if let Notification::RoAccessReport(report) = n {
                handler(report);
            }
        });
    }

    pub fn on_reader_capabilities<F>(&self, mut handler: F)
    where
        F: FnMut(ReaderCapabilities) + Send + 'static,
    {
        self.register_callback(Category::ReaderCapabilities, move |n| {
            if let Notification::ReaderCapabilities(caps) = n {
                handler(caps);
            }
        });
    }

    pub fn on_reader_config<F>(&self, mut handler: F)
    where
        F: FnMut(ReaderConfig) + Send + 'static,
    {
        self.register_callback(Category::ReaderConfig, move |n| {
            if let Notification::ReaderConfig(config) = n {
                handler(config);
            }
        });
    }

    pub fn on_reader_event<F>(&self, mut handler: F)
    where
        F: FnMut(ReaderEvent) + Send + 'static,
    {
        self.register_callback(Category::ReaderEvent, move |n| {
            if let Notification::ReaderEvent(event) = n {
                handler(event);
            }
        });
    }

    /// Wait for the next RO_ACCESS_REPORT.
    ///
    /// Reports are buffered independently of the access-report handler, so
    /// both see every report.
    pub fn await_ro_access_report(&self, timeout: Duration) -> Result<RoAccessReport> {
        self.session.dispatcher().await_report(timeout)
    }

    // -------------------------------------------------------------------------
    // Reader queries and configuration
    // -------------------------------------------------------------------------

    pub fn get_reader_capabilities(&self) -> Result<ReaderCapabilities> {
        let response = self.call(Message::get_reader_capabilities(ALL_CAPABILITIES), None)?;
        ReaderCapabilities::from_message(&response)
    }

    pub fn get_reader_config(&self) -> Result<ReaderConfig> {
        let response = self.call(Message::get_reader_config(0, ALL_CONFIGURATION, 0, 0), None)?;
        ReaderConfig::from_message(&response)
    }

    /// Apply the configured reader settings.
    pub fn set_reader_config(&self) -> Result<()> {
        let settings = self.config.reader_config.clone();
        self.set_reader_config_with(&settings)
    }

    pub fn set_reader_config_with(&self, settings: &ReaderSettings) -> Result<()> {
        self.call(set_reader_config_message(settings), None)?;
        Ok(())
    }

    /// Release reports and events held since the connection opened.
    /// LLRP defines no response; this completes once written.
    pub fn enable_events_and_reports(&self) -> Result<()> {
        self.session.send(Message::enable_events_and_reports())
    }

    /// Acknowledge a reader KEEPALIVE. Completes once written.
    pub fn send_keep_alive(&self) -> Result<()> {
        self.session.send(Message::keepalive_ack())
    }

    /// Ask the reader to send buffered reports now.
    pub fn get_report(&self) -> Result<()> {
        self.session.send(Message::get_report())
    }

    // -------------------------------------------------------------------------
    // ROSpec lifecycle
    // -------------------------------------------------------------------------

    pub fn add_rospec(&self, spec: &RoSpecConfig) -> Result<()> {
        spec.validate()?;
        self.rospec_op(RoSpecOp::Add(spec.clone()))
    }

    /// Add the ROSpec from the startup configuration and return its ID.
    pub fn add_configured_rospec(&self) -> Result<u32> {
        let spec = self.config.rospec.clone();
        self.add_rospec(&spec)?;
        Ok(spec.id)
    }

    pub fn enable_rospec(&self, id: u32) -> Result<()> {
        self.rospec_op(RoSpecOp::Enable(id))
    }

    pub fn start_rospec(&self, id: u32) -> Result<()> {
        self.rospec_op(RoSpecOp::Start(id))
    }

    pub fn stop_rospec(&self, id: u32) -> Result<()> {
        self.rospec_op(RoSpecOp::Stop(id))
    }

    pub fn disable_rospec(&self, id: u32) -> Result<()> {
        self.rospec_op(RoSpecOp::Disable(id))
    }

    /// Delete one ROSpec, or all of them with [`rospec::ALL_ROSPECS`].
    pub fn delete_rospec(&self, id: u32) -> Result<()> {
        self.rospec_op(RoSpecOp::Delete(id))
    }

    /// List the reader's ROSpecs and adopt the listing as shadow state.
    pub fn get_rospecs(&self) -> Result<Vec<RoSpecSummary>> {
        let response = self.call(Message::get_rospecs(), Some(RoSpecOp::Reconcile))?;
        Ok(rospec::rospec_summaries(&response))
    }

    fn rospec_op(&self, op: RoSpecOp) -> Result<()> {
        let precheck = {
            let table = self.session.rospecs();
            match &op {
                RoSpecOp::Add(spec) => table.check_add(spec.id),
                RoSpecOp::Enable(id) => table.check_enable(*id),
                RoSpecOp::Start(id) => table.check_start(*id),
                RoSpecOp::Stop(id) => table.check_stop(*id),
                RoSpecOp::Disable(id) => table.check_disable(*id),
                RoSpecOp::Delete(id) => table.check_delete(*id),
                RoSpecOp::Reconcile => Ok(Precheck::Forward),
            }
        }?;
        if precheck == Precheck::AlreadyDone {
            debug!(?op, "rospec already in target state");
            return Ok(());
        }

        let message = rospec::command_message(&op);
        let response = self.session.request(message, Some(op.clone()))?;
        let status = response_status(&response)?;
        if let RoSpecOp::Add(spec) = &op {
            if !status.is_success() && status.names_rospec_id() {
                return Err(ClientError::DuplicateId(spec.id));
            }
        }
        status.into_result()?;
        Ok(())
    }

    /// Request with a response whose status must be success.
    fn call(&self, message: Message, op: Option<RoSpecOp>) -> Result<Message> {
        let response = self.session.request(message, op)?;
        response_status(&response).and_then(LlrpStatus::into_result)?;
        Ok(response)
    }

    // -------------------------------------------------------------------------
    // Snapshots
    // -------------------------------------------------------------------------

    pub fn rospec_state(&self, id: u32) -> RoSpecState {
        self.session.rospecs().state(id)
    }

    pub fn rospecs(&self) -> Vec<RoSpecEntry> {
        self.session.rospecs().entries()
    }

    pub fn connection_state(&self) -> ConnectionState {
        self.session.state()
    }

    pub fn protocol_version(&self) -> u8 {
        self.session.protocol_version()
    }

    /// Why the connection failed, if it did. Not set by `close()`.
    pub fn last_error(&self) -> Option<String> {
        self.session.last_error()
    }

    pub fn peer(&self) -> &str {
        self.session.peer()
    }

    pub fn diagnostics(&self) -> Diagnostics {
        self.session.diagnostics()
    }

    // -------------------------------------------------------------------------
    // Shutdown
    // -------------------------------------------------------------------------

    /// Send CLOSE_CONNECTION, wait up to the close grace period, then tear
    /// the connection down. Calling it again is a no-op.
    pub fn close(&self) -> Result<()> {
        self.session.close()
    }
}

impl Drop for Client {
    fn drop(&mut self) {
        self.session.abort();
    }
}

impl std::fmt::Debug for Client {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("Client")
            .field("peer", &self.session.peer())
            .field("state", &self.session.state())
            .field("protocol_version", &self.session.protocol_version())
            .finish()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::mock::{
        access_report, connected, duplicate_rospec_status, rospec_event, test_config, MockReader,
    };
    use crate::report::ReaderEventKind;
    use crate::status::{status_name, status_response, STATUS_FIELD_ERROR};
    use llrpc_frame::param::tlv;
    use llrpc_frame::{MessageType, Parameter};
    use std::sync::mpsc;
    use std::thread;

    const EPC_A: [u8; 12] = [0xE2, 0, 0, 0, 0, 0, 0, 0, 0, 0, 0x12, 0x34];
    const EPC_B: [u8; 12] = [0x30, 0, 0, 0, 0, 0, 0, 0, 0, 0, 0, 0x01];

    fn script<F>(reader: MockReader, f: F) -> thread::JoinHandle<()>
    where
        F: FnOnce(MockReader) + Send + 'static,
    {
        thread::spawn(move || f(reader))
    }

    #[test]
    fn connect_and_close() {
        let (client, reader) = connected(test_config());
        assert_eq!(client.connection_state(), ConnectionState::Connected);
        assert_eq!(client.protocol_version(), 1);

        let handle = script(reader, MockReader::accept_close);
        client.close().unwrap();
        handle.join().unwrap();

        assert_eq!(client.connection_state(), ConnectionState::Closed);
        assert_eq!(client.last_error(), None);
        client.close().unwrap();
        assert!(matches!(
            client.get_reader_config(),
            Err(ClientError::NotConnected)
        ));
    }

    #[test]
    fn refused_connection() {
        let (client_end, reader_end) = std::os::unix::net::UnixStream::pair().unwrap();
        let mut reader = MockReader::new(reader_end);
        reader.send(&crate::mock::connection_event(1));
        let err =
            Client::from_stream(LlrpStream::from_unix(client_end), test_config()).unwrap_err();
        assert!(matches!(
            err,
            ClientError::Connect(ConnectError::Refused { status_code: 1, .. })
        ));
    }

    #[test]
    fn rospec_lifecycle_round_trips() {
        let (client, reader) = connected(test_config());
        let handle = script(reader, |mut reader| {
            for expected in [
                MessageType::AddRoSpec,
                MessageType::EnableRoSpec,
                MessageType::StartRoSpec,
                MessageType::StopRoSpec,
                MessageType::DeleteRoSpec,
            ] {
                let request = reader.expect(expected);
                reader.reply_ok(&request);
            }
            reader.accept_close();
        });

        let spec = RoSpecConfig {
            id: 7,
            ..RoSpecConfig::default()
        };
        client.add_rospec(&spec).unwrap();
        assert_eq!(client.rospec_state(7), RoSpecState::Disabled);
        client.enable_rospec(7).unwrap();
        assert_eq!(client.rospec_state(7), RoSpecState::Inactive);
        client.start_rospec(7).unwrap();
        assert_eq!(client.rospec_state(7), RoSpecState::Active);
        client.stop_rospec(7).unwrap();
        assert_eq!(client.rospec_state(7), RoSpecState::Inactive);

        // Already inactive: no round trip.
        client.stop_rospec(7).unwrap();

        client.delete_rospec(7).unwrap();
        assert_eq!(client.rospec_state(7), RoSpecState::Deleted);

        client.close().unwrap();
        handle.join().unwrap();
    }

    #[test]
    fn local_lifecycle_errors_send_nothing() {
        let (client, reader) = connected(test_config());
        assert!(matches!(client.start_rospec(3), Err(ClientError::UnknownId(3))));
        assert!(matches!(client.enable_rospec(0), Err(ClientError::InvalidRoSpecId)));

        let handle = script(reader, |mut reader| {
            // The first frame after the local failures must be the ADD.
            let request = reader.expect(MessageType::AddRoSpec);
            reader.reply_ok(&request);
            reader.accept_close();
        });
        client.add_rospec(&RoSpecConfig::default()).unwrap();
        assert!(matches!(client.start_rospec(1), Err(ClientError::NotEnabled(1))));
        assert!(matches!(
            client.add_rospec(&RoSpecConfig::default()),
            Err(ClientError::DuplicateId(1))
        ));
        assert_eq!(client.rospec_state(1), RoSpecState::Disabled);

        client.close().unwrap();
        handle.join().unwrap();
    }

    #[test]
    fn reader_rejections() {
        let (client, reader) = connected(test_config());
        let handle = script(reader, |mut reader| {
            let add = reader.expect(MessageType::AddRoSpec);
            reader.reply(&add, &duplicate_rospec_status());

            let config = reader.expect(MessageType::SetReaderConfig);
            let mut status = LlrpStatus::success();
            status.code = STATUS_FIELD_ERROR;
            status.name = status_name(STATUS_FIELD_ERROR);
            status.description = "bad keepalive".to_string();
            reader.reply(&config, &status);

            reader.accept_close();
        });

        assert!(matches!(
            client.add_rospec(&RoSpecConfig::default()),
            Err(ClientError::DuplicateId(1))
        ));
        assert_eq!(client.rospec_state(1), RoSpecState::Unknown);

        match client.set_reader_config() {
            Err(ClientError::ReaderRejected {
                status_code,
                description,
            }) => {
                assert_eq!(status_code, STATUS_FIELD_ERROR);
                assert_eq!(description, "M_FieldError: bad keepalive");
            }
            other => panic!("unexpected result: {other:?}"),
        }
        assert_eq!(client.connection_state(), ConnectionState::Connected);

        client.close().unwrap();
        handle.join().unwrap();
    }

    #[test]
    fn reports_reach_handler_and_awaiter() {
        let (client, reader) = connected(test_config());
        let (tx, rx) = mpsc::channel();
        client.on_access_report(move |report| {
            tx.send(report.tags.len()).unwrap();
        });

        let handle = script(reader, |mut reader| {
            reader.send(&access_report(&[EPC_A, EPC_B]).with_id(900));
            reader.send(&access_report(&[EPC_A]).with_id(901));
            reader.accept_close();
        });

        let first = client.await_ro_access_report(Duration::from_secs(2)).unwrap();
        assert_eq!(first.tags.len(), 2);
        assert_eq!(first.tags[0].epc, "e20000000000000000001234");
        let second = client.await_ro_access_report(Duration::from_secs(2)).unwrap();
        assert_eq!(second.message_id, 901);

        assert_eq!(rx.recv_timeout(Duration::from_secs(2)).unwrap(), 2);
        assert_eq!(rx.recv_timeout(Duration::from_secs(2)).unwrap(), 1);

        client.close().unwrap();
        handle.join().unwrap();
        assert_eq!(client.diagnostics().access_reports, 2);
    }

    #[test]
    fn notifications_queue_until_registration() {
        let (client, reader) = connected(test_config());
        let handle = script(reader, |mut reader| {
            reader.send(&rospec_event(0, 5).with_id(77));
            reader.accept_close();
        });

        // Let the event arrive before anyone listens.
        let deadline = std::time::Instant::now() + Duration::from_secs(2);
        while client.diagnostics().reader_events < 2 && std::time::Instant::now() < deadline {
            thread::sleep(Duration::from_millis(5));
        }

        let (tx, rx) = mpsc::channel();
        client.on_reader_event(move |event| tx.send(event.events).unwrap());

        let handshake = rx.recv_timeout(Duration::from_secs(2)).unwrap();
        assert_eq!(handshake, vec![ReaderEventKind::ConnectionAttempt { status: 0 }]);
        let rospec = rx.recv_timeout(Duration::from_secs(2)).unwrap();
        assert!(matches!(
            rospec[0],
            ReaderEventKind::RoSpec { rospec_id: 5, .. }
        ));

        client.close().unwrap();
        handle.join().unwrap();
    }

    #[test]
    fn capabilities_are_returned_and_published() {
        let (client, reader) = connected(test_config());
        let (tx, rx) = mpsc::channel();
        client.on_reader_capabilities(move |caps| tx.send(caps.general.is_some()).unwrap());

        let handle = script(reader, |mut reader| {
            let request = reader.expect(MessageType::GetReaderCapabilities);
            assert_eq!(&request.fields[..], &[0]);
            let mut general = vec![0u8; 12];
            general[1] = 4; // max antennas
            general.extend_from_slice(&[0, 3]);
            general.extend_from_slice(b"1.0");
            reader.reply_with(
                &request,
                vec![Parameter::leaf(tlv::GENERAL_DEVICE_CAPABILITIES, general)],
            );
            reader.accept_close();
        });

        let caps = client.get_reader_capabilities().unwrap();
        assert_eq!(caps.general.as_ref().map(|g| g.max_antennas), Some(4));
        assert!(rx.recv_timeout(Duration::from_secs(2)).unwrap());

        client.close().unwrap();
        handle.join().unwrap();
    }

    #[test]
    fn timeout_leaves_connection_usable() {
        let config = ClientConfig {
            response_timeout_ms: 100,
            ..test_config()
        };
        let (client, reader) = connected(config);
        let handle = script(reader, |mut reader| {
            let slow = reader.expect(MessageType::GetReaderConfig);
            thread::sleep(Duration::from_millis(300));
            reader.reply_ok(&slow);

            let fast = reader.expect(MessageType::GetRoSpecs);
            reader.reply_ok(&fast);
            reader.accept_close();
        });

        assert!(matches!(
            client.get_reader_config(),
            Err(ClientError::Timeout(_))
        ));
        assert_eq!(client.get_rospecs().unwrap(), Vec::new());
        assert_eq!(client.diagnostics().late_responses, 1);

        client.close().unwrap();
        handle.join().unwrap();
    }

    #[test]
    fn reader_hangup_fails_pending_request() {
        let (client, reader) = connected(test_config());
        let handle = script(reader, |mut reader| {
            reader.expect(MessageType::StartRoSpec);
            drop(reader);
        });

        // Seed the shadow table so START is forwarded.
        client
            .session
            .rospecs()
            .reconcile(&[RoSpecSummary {
                id: 2,
                priority: 0,
                state: RoSpecState::Inactive,
            }]);

        let err = client.start_rospec(2).unwrap_err();
        handle.join().unwrap();
        assert!(matches!(err, ClientError::ConnectionLost(_)));
        assert_eq!(client.connection_state(), ConnectionState::Closed);
        assert!(client.last_error().is_some());
        assert!(matches!(
            client.enable_rospec(2),
            Err(ClientError::ConnectionLost(_))
        ));
        assert!(matches!(
            client.await_ro_access_report(Duration::from_millis(50)),
            Err(ClientError::ConnectionLost(_))
        ));
    }

    #[test]
    fn garbage_frame_is_connection_fatal() {
        use std::io::Write;

        let (client_end, reader_end) = std::os::unix::net::UnixStream::pair().unwrap();
        let mut raw = reader_end.try_clone().unwrap();
        let mut reader = MockReader::new(reader_end);
        reader.send(&crate::mock::connection_event(0));
        let client = Client::from_stream(LlrpStream::from_unix(client_end), test_config()).unwrap();

        // Reserved bits set.
        raw.write_all(&[0xE4, 0x3E, 0, 0, 0, 10, 0, 0, 0, 1]).unwrap();

        let deadline = std::time::Instant::now() + Duration::from_secs(2);
        while client.connection_state() != ConnectionState::Closed
            && std::time::Instant::now() < deadline
        {
            thread::sleep(Duration::from_millis(5));
        }
        assert_eq!(client.connection_state(), ConnectionState::Closed);
        assert!(client.last_error().unwrap().contains("reserved"));
    }

    #[test]
    fn malformed_response_fails_the_request_in_flight() {
        let (client, reader) = connected(test_config());
        let baseline = client.diagnostics().frames_received;

        let handle = script(reader, |mut reader| {
            let request = reader.expect(MessageType::GetReaderConfig);
            let id = request.message_id.to_be_bytes();

            // LLRPStatus declares 12 bytes but only 8 follow.
            let mut wire = vec![0x04, 0x0C, 0, 0, 0, 18, id[0], id[1], id[2], id[3]];
            wire.extend_from_slice(&[0x01, 0x1F, 0x00, 0x0C, 0, 0, 0, 0]);
            let valid = status_response(
                MessageType::GetReaderConfigResponse,
                request.message_id,
                &LlrpStatus::success(),
            );
            wire.extend_from_slice(&valid.to_bytes().unwrap());
            reader.send_raw(&wire);
        });

        let err = client.get_reader_config().unwrap_err();
        handle.join().unwrap();

        assert!(matches!(err, ClientError::ConnectionLost(_)), "got {err:?}");
        assert_eq!(client.connection_state(), ConnectionState::Closed);
        assert!(client.last_error().unwrap().contains("truncated"));
        assert_eq!(client.diagnostics().frames_received, baseline);
    }

    #[test]
    fn keepalives_are_counted_and_acked_when_configured() {
        let config = ClientConfig {
            auto_ack_keepalive: true,
            ..test_config()
        };
        let (client, reader) = connected(config);
        let handle = script(reader, |mut reader| {
            reader.send(
                &Message::new(MessageType::KeepAlive, bytes::Bytes::new(), Vec::new()).with_id(55),
            );
            reader.expect(MessageType::KeepAliveAck);
            reader.accept_close();
        });

        let deadline = std::time::Instant::now() + Duration::from_secs(2);
        while client.diagnostics().keepalives == 0 && std::time::Instant::now() < deadline {
            thread::sleep(Duration::from_millis(5));
        }
        assert_eq!(client.diagnostics().keepalives, 1);

        client.close().unwrap();
        handle.join().unwrap();
    }

    #[test]
    fn write_only_requests_and_disable() {
        let (client, reader) = connected(test_config());
        let handle = script(reader, |mut reader| {
            reader.expect(MessageType::EnableEventsAndReports);
            reader.expect(MessageType::KeepAliveAck);
            reader.expect(MessageType::GetReport);
            for expected in [
                MessageType::AddRoSpec,
                MessageType::EnableRoSpec,
                MessageType::DisableRoSpec,
            ] {
                let request = reader.expect(expected);
                reader.reply_ok(&request);
            }
            reader.accept_close();
        });

        client.enable_events_and_reports().unwrap();
        client.send_keep_alive().unwrap();
        client.get_report().unwrap();
        assert_eq!(client.diagnostics().pending_requests, 0);

        let id = client.add_configured_rospec().unwrap();
        client.enable_rospec(id).unwrap();
        client.disable_rospec(id).unwrap();
        assert_eq!(client.rospec_state(id), RoSpecState::Disabled);

        // Already disabled: no round trip.
        client.disable_rospec(id).unwrap();

        client.close().unwrap();
        handle.join().unwrap();
    }

    #[test]
    fn close_without_response_forces_teardown() {
        let (client, reader) = connected(test_config());
        let handle = script(reader, |mut reader| {
            reader.expect(MessageType::CloseConnection);
            thread::sleep(Duration::from_millis(700));
        });

        let started = std::time::Instant::now();
        client.close().unwrap();
        assert!(started.elapsed() >= Duration::from_millis(400));
        assert_eq!(client.connection_state(), ConnectionState::Closed);
        handle.join().unwrap();
    }

    #[test]
    fn drop_without_close_tears_down() {
        let (client, mut reader) = connected(test_config());
        drop(client);
        assert!(matches!(
            reader.reader.read_message(),
            Err(llrpc_frame::FrameError::ConnectionClosed)
        ));
    }
}
