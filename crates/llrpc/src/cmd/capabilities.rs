use llrpc_client::ReaderCapabilities;

use crate::cmd::{close_quietly, connect, ConnectArgs};
use crate::exit::{client_error, CliResult, SUCCESS};
use crate::output::{opt, print_fields, print_json, yes_no, OutputFormat};

pub fn run(args: ConnectArgs, format: OutputFormat) -> CliResult<i32> {
    let client = connect(&args)?;
    let result = client.get_reader_capabilities();
    close_quietly(&client);

    let capabilities =
        result.map_err(|err| client_error("GET_READER_CAPABILITIES failed", err))?;
    print_capabilities(&capabilities, format);
    Ok(SUCCESS)
}

fn print_capabilities(caps: &ReaderCapabilities, format: OutputFormat) {
    if let OutputFormat::Json = format {
        print_json(caps);
        return;
    }

    let mut rows = Vec::new();
    if let Some(general) = &caps.general {
        rows.push(("Manufacturer", general.manufacturer.to_string()));
        rows.push(("Model", general.model.to_string()));
        rows.push(("Firmware", general.firmware_version.clone()));
        rows.push(("Max antennas", general.max_antennas.to_string()));
        rows.push(("UTC clock", yes_no(general.has_utc_clock)));
        rows.push(("GPI/GPO", format!("{}/{}", opt(general.gpi_count), opt(general.gpo_count))));
    }
    if let Some(llrp) = &caps.llrp {
        rows.push(("Max ROSpecs", llrp.max_rospecs.to_string()));
        rows.push(("Priority levels", llrp.max_priority_levels.to_string()));
        rows.push(("Max AccessSpecs", llrp.max_access_specs.to_string()));
        rows.push(("Report holding", yes_no(llrp.supports_event_and_report_holding)));
    }
    if let Some(regulatory) = &caps.regulatory {
        rows.push(("Country code", regulatory.country_code.to_string()));
        rows.push(("Comm standard", regulatory.communications_standard.to_string()));
    }
    if rows.is_empty() {
        rows.push(("Parameters", format!("{:?}", caps.parameter_types)));
    }
    print_fields("Reader Capabilities", &rows, format);
}
