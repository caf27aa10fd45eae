use std::time::Instant;

use llrpc_client::ConnectionState;
use serde::Serialize;

use crate::cmd::{close_quietly, connect, ConnectArgs};
use crate::exit::{CliResult, SUCCESS};
use crate::output::{print_fields, print_json, OutputFormat};

#[derive(Serialize)]
struct InfoOutput {
    schema_id: &'static str,
    peer: String,
    protocol_version: u8,
    connection_state: ConnectionState,
    connect_latency_ms: f64,
    frames_received: u64,
    keepalives: u64,
    connected: bool,
}

pub fn run(args: ConnectArgs, format: OutputFormat) -> CliResult<i32> {
    let start = Instant::now();
    let client = connect(&args)?;
    let connect_latency_ms = (start.elapsed().as_secs_f64() * 1000.0 * 100.0).round() / 100.0;

    let diagnostics = client.diagnostics();
    let out = InfoOutput {
        schema_id: "llrpc/cli/v1/connection-info",
        peer: client.peer().to_string(),
        protocol_version: client.protocol_version(),
        connection_state: diagnostics.connection_state,
        connect_latency_ms,
        frames_received: diagnostics.frames_received,
        keepalives: diagnostics.keepalives,
        connected: diagnostics.connection_state == ConnectionState::Connected,
    };

    close_quietly(&client);
    print_info(&out, format);
    Ok(SUCCESS)
}

fn print_info(out: &InfoOutput, format: OutputFormat) {
    match format {
        OutputFormat::Json => print_json(out),
        OutputFormat::Table | OutputFormat::Pretty => {
            let version = match out.protocol_version {
                1 => "LLRP 1.0.1 (v1)".to_string(),
                2 => "LLRP 1.1 (v2)".to_string(),
                other => format!("v{other}"),
            };
            print_fields(
                "Connection Info",
                &[
                    ("Peer", out.peer.clone()),
                    ("Protocol", version),
                    ("State", out.connection_state.to_string()),
                    ("Connect", format!("{:.2}ms", out.connect_latency_ms)),
                    ("Frames received", out.frames_received.to_string()),
                    ("Keepalives", out.keepalives.to_string()),
                ],
                format,
            );
        }
    }
}
