use std::io::IsTerminal;

use clap::ValueEnum;
use comfy_table::{presets::UTF8_FULL, ContentArrangement, Table};
use llrpc_client::{RoAccessReport, TagReport};
use serde::Serialize;

#[derive(Clone, Debug, Copy, ValueEnum)]
pub enum OutputFormat {
    Json,
    Table,
    Pretty,
}

impl OutputFormat {
    pub fn default_for_stdout() -> Self {
        if std::io::stdout().is_terminal() {
            Self::Table
        } else {
            Self::Json
        }
    }
}

/// One JSON document per line.
pub fn print_json<T: Serialize>(value: &T) {
    println!(
        "{}",
        serde_json::to_string(value).unwrap_or_else(|_| "{}".to_string())
    );
}

/// Two-column FIELD/VALUE table.
pub fn print_fields(title: &str, rows: &[(&str, String)], format: OutputFormat) {
    match format {
        OutputFormat::Table => {
            let mut table = Table::new();
            table
                .load_preset(UTF8_FULL)
                .set_content_arrangement(ContentArrangement::Dynamic)
                .set_header(vec!["FIELD", "VALUE"]);
            for (name, value) in rows {
                table.add_row(vec![name.to_string(), value.clone()]);
            }
            println!("{title}");
            println!("{table}");
        }
        OutputFormat::Pretty | OutputFormat::Json => {
            println!("{title}:");
            let width = rows.iter().map(|(name, _)| name.len()).max().unwrap_or(0);
            for (name, value) in rows {
                println!("  {name:<width$}  {value}");
            }
        }
    }
}

#[derive(Serialize)]
struct TagOutput<'a> {
    schema_id: &'static str,
    report_id: u32,
    #[serde(flatten)]
    tag: &'a TagReport,
}

pub fn print_report(report: &RoAccessReport, format: OutputFormat) {
    match format {
        OutputFormat::Json => {
            for tag in &report.tags {
                print_json(&TagOutput {
                    schema_id: "llrpc/cli/v1/tag-report",
                    report_id: report.message_id,
                    tag,
                });
            }
        }
        OutputFormat::Table => {
            if report.tags.is_empty() {
                return;
            }
            let mut table = Table::new();
            table
                .load_preset(UTF8_FULL)
                .set_content_arrangement(ContentArrangement::Dynamic)
                .set_header(vec![
                    "EPC",
                    "ANTENNA",
                    "RSSI",
                    "SEEN",
                    "ROSPEC",
                    "FIRST SEEN (UTC us)",
                ]);
            for tag in &report.tags {
                table.add_row(vec![
                    tag.epc.clone(),
                    opt(tag.antenna_id),
                    opt(tag.peak_rssi),
                    opt(tag.tag_seen_count),
                    opt(tag.rospec_id),
                    opt(tag.first_seen_utc),
                ]);
            }
            println!("{table}");
        }
        OutputFormat::Pretty => {
            for tag in &report.tags {
                println!(
                    "epc={} antenna={} rssi={} seen={}",
                    tag.epc,
                    opt(tag.antenna_id),
                    opt(tag.peak_rssi),
                    opt(tag.tag_seen_count)
                );
            }
        }
    }
}

/// `-` for absent optional fields.
pub fn opt<T: ToString>(value: Option<T>) -> String {
    value.map(|v| v.to_string()).unwrap_or_else(|| "-".to_string())
}

pub fn yes_no(value: bool) -> String {
    if value { "yes" } else { "no" }.to_string()
}
