use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::Arc;
use std::time::{Duration, Instant};

use llrpc_client::{Client, ClientError, StartTrigger, ALL_ROSPECS};
use serde::Serialize;
use tracing::{info, warn};

use crate::cmd::{close_quietly, connect, parse_duration, InventoryArgs};
use crate::exit::{client_error, CliError, CliResult, INTERNAL, SUCCESS, TIMEOUT};
use crate::output::{print_json, print_report, OutputFormat};

/// Longest single wait for a report, so Ctrl-C is noticed promptly.
const POLL_INTERVAL: Duration = Duration::from_millis(250);

#[derive(Serialize)]
struct InventorySummary {
    schema_id: &'static str,
    rospec_id: u32,
    reports: usize,
    tags: usize,
    elapsed_ms: u64,
    stopped_by: &'static str,
}

pub fn run(args: InventoryArgs, format: OutputFormat) -> CliResult<i32> {
    let timeout = parse_duration(&args.report_timeout)?;
    let running = Arc::new(AtomicBool::new(true));
    install_ctrlc_handler(running.clone())?;

    let client = connect(&args.connect)?;
    let mut spec = client.config().rospec.clone();
    if let Some(id) = args.rospec_id {
        spec.id = id;
    }

    if let Err(err) = prepare(&client, &spec) {
        close_quietly(&client);
        return Err(err);
    }
    info!(rospec_id = spec.id, "inventory running");

    let start = Instant::now();
    let mut reports = 0usize;
    let mut tags = 0usize;
    let mut failure = None;
    let stopped_by = loop {
        if !running.load(Ordering::SeqCst) {
            break "interrupt";
        }
        if args.reports.is_some_and(|limit| reports >= limit) {
            break "count";
        }
        let remaining = timeout.saturating_sub(start.elapsed());
        if remaining.is_zero() {
            break "timeout";
        }

        match client.await_ro_access_report(remaining.min(POLL_INTERVAL)) {
            Ok(report) => {
                reports += 1;
                tags += report.tags.len();
                print_report(&report, format);
            }
            Err(ClientError::Timeout(_)) => {}
            Err(err) => {
                failure = Some(client_error("inventory aborted", err));
                break "error";
            }
        }
    };

    if failure.is_none() {
        finish(&client, spec.id);
    }
    close_quietly(&client);

    if let Some(err) = failure {
        return Err(err);
    }

    let summary = InventorySummary {
        schema_id: "llrpc/cli/v1/inventory-summary",
        rospec_id: spec.id,
        reports,
        tags,
        elapsed_ms: start.elapsed().as_millis() as u64,
        stopped_by,
    };
    match format {
        OutputFormat::Json => print_json(&summary),
        OutputFormat::Table | OutputFormat::Pretty => println!(
            "{} reports, {} tags in {}ms ({})",
            summary.reports, summary.tags, summary.elapsed_ms, summary.stopped_by
        ),
    }

    if stopped_by == "timeout" && args.reports.is_some() {
        return Ok(TIMEOUT);
    }
    Ok(SUCCESS)
}

/// Clear the reader, push the configuration and get the ROSpec running.
fn prepare(client: &Client, spec: &llrpc_client::RoSpecConfig) -> CliResult<()> {
    client
        .delete_rospec(ALL_ROSPECS)
        .map_err(|err| client_error("DELETE_ROSPEC failed", err))?;
    client
        .set_reader_config()
        .map_err(|err| client_error("SET_READER_CONFIG failed", err))?;
    client
        .enable_events_and_reports()
        .map_err(|err| client_error("ENABLE_EVENTS_AND_REPORTS failed", err))?;
    client
        .add_rospec(spec)
        .map_err(|err| client_error("ADD_ROSPEC failed", err))?;
    client
        .enable_rospec(spec.id)
        .map_err(|err| client_error("ENABLE_ROSPEC failed", err))?;
    if spec.start_trigger == StartTrigger::Null {
        client
            .start_rospec(spec.id)
            .map_err(|err| client_error("START_ROSPEC failed", err))?;
    }
    Ok(())
}

fn finish(client: &Client, id: u32) {
    if let Err(err) = client.stop_rospec(id) {
        warn!(rospec_id = id, error = %err, "stop failed");
    }
    if let Err(err) = client.delete_rospec(id) {
        warn!(rospec_id = id, error = %err, "delete failed");
    }
}

fn install_ctrlc_handler(running: Arc<AtomicBool>) -> CliResult<()> {
    ctrlc::set_handler(move || {
        running.store(false, Ordering::SeqCst);
    })
    .map_err(|err| CliError::new(INTERNAL, format!("signal handler setup failed: {err}")))
}
