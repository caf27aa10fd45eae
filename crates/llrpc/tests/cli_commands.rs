#![cfg(all(unix, feature = "cli"))]

use std::net::{TcpListener, TcpStream};
use std::path::PathBuf;
use std::process::{Command, Output};
use std::thread::{self, JoinHandle};
use std::time::Duration;

use llrpc::client::status::{status_response, LlrpStatus};
use llrpc::frame::param::{tlv, tv};
use llrpc::frame::{FrameReader, FrameWriter, Message, MessageType, Parameter};

fn unique_config(tag: &str, json: &str) -> PathBuf {
    let path = std::env::temp_dir().join(format!(
        "llrpc-cli-{tag}-{}-{}.json",
        std::process::id(),
        std::time::SystemTime::now()
            .duration_since(std::time::UNIX_EPOCH)
            .expect("time should be after epoch")
            .as_nanos()
    ));
    std::fs::write(&path, json).expect("config should be writable");
    path
}

fn reader_config(port: u16) -> String {
    format!(
        r#"{{
            "host": "127.0.0.1",
            "port": {port},
            "connect_timeout_ms": 2000,
            "response_timeout_ms": 2000,
            "close_grace_ms": 500,
            "rospec": {{ "id": 5, "antennas": [1] }}
        }}"#
    )
}

fn connection_event(status: u16) -> Message {
    Message::new(
        MessageType::ReaderEventNotification,
        Vec::<u8>::new(),
        vec![Parameter::tlv(
            tlv::READER_EVENT_NOTIFICATION_DATA,
            Vec::<u8>::new(),
            vec![
                Parameter::leaf(
                    tlv::UTC_TIMESTAMP,
                    1_700_000_000_000_000u64.to_be_bytes().to_vec(),
                ),
                Parameter::leaf(tlv::CONNECTION_ATTEMPT_EVENT, status.to_be_bytes().to_vec()),
            ],
        )],
    )
}

fn general_capabilities() -> Parameter {
    let mut fields = Vec::new();
    fields.extend_from_slice(&4u16.to_be_bytes());
    fields.extend_from_slice(&0x4000u16.to_be_bytes());
    fields.extend_from_slice(&25882u32.to_be_bytes());
    fields.extend_from_slice(&2001002u32.to_be_bytes());
    fields.extend_from_slice(&5u16.to_be_bytes());
    fields.extend_from_slice(b"1.2.3");
    Parameter::leaf(tlv::GENERAL_DEVICE_CAPABILITIES, fields)
}

fn access_report() -> Message {
    let tag = |last: u8| {
        let mut epc = [0x30u8; 12];
        epc[11] = last;
        Parameter::tlv(
            tlv::TAG_REPORT_DATA,
            Vec::<u8>::new(),
            vec![
                Parameter::tv(tv::EPC_96, epc.to_vec()),
                Parameter::tv(tv::ANTENNA_ID, 1u16.to_be_bytes().to_vec()),
            ],
        )
    };
    Message::new(MessageType::RoAccessReport, Vec::<u8>::new(), vec![tag(1), tag(2)])
}

/// Scripted reader: accepts once, answers every request with success and
/// returns the request types it saw.
fn spawn_reader(connection_status: u16) -> (u16, JoinHandle<Vec<MessageType>>) {
    let listener = TcpListener::bind("127.0.0.1:0").expect("listener should bind");
    let port = listener.local_addr().expect("local addr").port();

    let handle = thread::spawn(move || {
        let (stream, _) = listener.accept().expect("client should connect");
        serve(stream, connection_status)
    });
    (port, handle)
}

fn serve(stream: TcpStream, connection_status: u16) -> Vec<MessageType> {
    stream
        .set_read_timeout(Some(Duration::from_secs(10)))
        .expect("read timeout");
    let mut reader = FrameReader::new(stream.try_clone().expect("clone"));
    let mut writer = FrameWriter::new(stream);
    let mut seen = Vec::new();

    writer
        .write_message(&connection_event(connection_status))
        .expect("connection event");
    if connection_status != 0 {
        return seen;
    }

    while let Ok(request) = reader.read_message() {
        seen.push(request.message_type);
        let Some(response_type) = request.message_type.response_type() else {
            continue;
        };
        let mut response =
            status_response(response_type, request.message_id, &LlrpStatus::success());

        match request.message_type {
            MessageType::GetReaderCapabilities => response.parameters.push(general_capabilities()),
            MessageType::CloseConnection => {
                let _ = writer.write_message(&response);
                break;
            }
            _ => {}
        }
        if writer.write_message(&response).is_err() {
            break;
        }
        if request.message_type == MessageType::StartRoSpec {
            let _ = writer.write_message(&access_report());
        }
    }
    seen
}

fn run_cli(args: &[&str]) -> Output {
    Command::new(env!("CARGO_BIN_EXE_llrpc"))
        .args(["--log-level", "error"])
        .args(args)
        .output()
        .expect("llrpc should run")
}

#[test]
fn info_reports_connection_metadata() {
    let (port, reader) = spawn_reader(0);
    let config = unique_config("info", &reader_config(port));

    let output = run_cli(&["--format", "json", "info", config.to_str().unwrap()]);

    assert!(output.status.success(), "stderr: {}", String::from_utf8_lossy(&output.stderr));
    let payload: serde_json::Value =
        serde_json::from_slice(&output.stdout).expect("info should emit json");
    assert_eq!(payload["schema_id"], "llrpc/cli/v1/connection-info");
    assert_eq!(payload["connected"], true);
    assert_eq!(payload["protocol_version"], 1);

    assert_eq!(reader.join().unwrap(), vec![MessageType::CloseConnection]);
    let _ = std::fs::remove_file(&config);
}

#[test]
fn capabilities_prints_general_device_fields() {
    let (port, reader) = spawn_reader(0);
    let config = unique_config("caps", &reader_config(port));

    let output = run_cli(&["--format", "json", "capabilities", config.to_str().unwrap()]);

    assert!(output.status.success(), "stderr: {}", String::from_utf8_lossy(&output.stderr));
    let payload: serde_json::Value =
        serde_json::from_slice(&output.stdout).expect("capabilities should emit json");
    assert_eq!(payload["general"]["firmware_version"], "1.2.3");
    assert_eq!(payload["general"]["max_antennas"], 4);
    assert_eq!(payload["general"]["has_utc_clock"], true);

    assert_eq!(
        reader.join().unwrap(),
        vec![MessageType::GetReaderCapabilities, MessageType::CloseConnection]
    );
    let _ = std::fs::remove_file(&config);
}

#[test]
fn inventory_runs_rospec_lifecycle_and_prints_tags() {
    let (port, reader) = spawn_reader(0);
    let config = unique_config("inventory", &reader_config(port));

    let output = run_cli(&[
        "--format",
        "json",
        "inventory",
        config.to_str().unwrap(),
        "--reports",
        "1",
        "--report-timeout",
        "5s",
    ]);

    assert!(output.status.success(), "stderr: {}", String::from_utf8_lossy(&output.stderr));
    let stdout = String::from_utf8_lossy(&output.stdout);
    let lines: Vec<serde_json::Value> = stdout
        .lines()
        .map(|line| serde_json::from_str(line).expect("each line should be json"))
        .collect();
    assert_eq!(lines.len(), 3, "two tags and a summary: {stdout}");
    assert_eq!(lines[0]["epc"], "303030303030303030303001");
    assert_eq!(lines[1]["antenna_id"], 1);
    assert_eq!(lines[2]["stopped_by"], "count");
    assert_eq!(lines[2]["rospec_id"], 5);
    assert_eq!(lines[2]["tags"], 2);

    assert_eq!(
        reader.join().unwrap(),
        vec![
            MessageType::DeleteRoSpec,
            MessageType::SetReaderConfig,
            MessageType::EnableEventsAndReports,
            MessageType::AddRoSpec,
            MessageType::EnableRoSpec,
            MessageType::StartRoSpec,
            MessageType::StopRoSpec,
            MessageType::DeleteRoSpec,
            MessageType::CloseConnection,
        ]
    );
    let _ = std::fs::remove_file(&config);
}

#[test]
fn refused_connection_exits_1() {
    let (port, reader) = spawn_reader(1);
    let config = unique_config("refused", &reader_config(port));

    let output = run_cli(&["info", config.to_str().unwrap()]);

    assert_eq!(output.status.code(), Some(1));
    assert!(String::from_utf8_lossy(&output.stderr).contains("refused"));
    let _ = reader.join();
    let _ = std::fs::remove_file(&config);
}

#[test]
fn silent_reader_times_out_with_124() {
    let listener = TcpListener::bind("127.0.0.1:0").expect("listener should bind");
    let port = listener.local_addr().expect("local addr").port();
    let config = unique_config(
        "silent",
        &format!(r#"{{ "host": "127.0.0.1", "port": {port}, "connect_timeout_ms": 300 }}"#),
    );

    let output = run_cli(&["info", config.to_str().unwrap()]);

    assert_eq!(output.status.code(), Some(124));
    drop(listener);
    let _ = std::fs::remove_file(&config);
}

#[test]
fn config_without_host_exits_60() {
    let config = unique_config("nohost", r#"{ "port": 5084 }"#);

    let output = run_cli(&["info", config.to_str().unwrap()]);

    assert_eq!(output.status.code(), Some(60));
    assert!(String::from_utf8_lossy(&output.stderr).contains("host is required"));
    let _ = std::fs::remove_file(&config);
}

#[test]
fn version_prints_package_version() {
    let output = run_cli(&["version"]);

    assert!(output.status.success());
    let stdout = String::from_utf8_lossy(&output.stdout);
    assert_eq!(stdout.trim(), format!("llrpc {}", env!("CARGO_PKG_VERSION")));
}
