use llrpc_client::ReaderConfig;

use crate::cmd::{close_quietly, connect, ConnectArgs};
use crate::exit::{client_error, CliResult, SUCCESS};
use crate::output::{opt, print_fields, print_json, yes_no, OutputFormat};

pub fn run(args: ConnectArgs, format: OutputFormat) -> CliResult<i32> {
    let client = connect(&args)?;
    let result = client.get_reader_config();
    close_quietly(&client);

    let config = result.map_err(|err| client_error("GET_READER_CONFIG failed", err))?;
    print_reader_config(&config, format);
    Ok(SUCCESS)
}

fn print_reader_config(config: &ReaderConfig, format: OutputFormat) {
    if let OutputFormat::Json = format {
        print_json(config);
        return;
    }

    let mut rows = Vec::new();
    if let Some(identification) = &config.identification {
        rows.push(("Reader ID", identification.reader_id.clone()));
    }
    for antenna in &config.antenna_properties {
        rows.push((
            "Antenna",
            format!(
                "{} connected={} gain={}",
                antenna.antenna_id,
                yes_no(antenna.connected),
                antenna.gain
            ),
        ));
    }
    rows.push((
        "Keepalive",
        match &config.keepalive {
            Some(spec) if spec.trigger_type == 0 => "off".to_string(),
            Some(spec) => format!("every {}ms", spec.interval_ms),
            None => "-".to_string(),
        },
    ));
    rows.push(("Hold reports", opt(config.hold_events_and_reports.map(yes_no))));
    rows.push(("ROReportSpec", yes_no(config.ro_report_spec_present)));
    print_fields("Reader Configuration", &rows, format);
}
