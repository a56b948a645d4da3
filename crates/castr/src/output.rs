use std::io::IsTerminal;

use clap::ValueEnum;
use comfy_table::{presets::UTF8_FULL, ContentArrangement, Table};
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

/// One stream of an inspected container.
#[derive(Debug, Serialize)]
pub struct StreamOutput {
    pub serial: u32,
    /// Sub-track streams carry the high bit.
    pub sub_track: bool,
    pub pages: u64,
    pub packets: u64,
    pub bytes: u64,
    pub first_sequence: u32,
    pub last_sequence: u32,
    pub sequence_gaps: u64,
    pub begins: bool,
    pub last_granule: u64,
    pub truncated: bool,
}

#[derive(Debug, Serialize)]
pub struct InspectOutput {
    pub files: Vec<String>,
    pub streams: Vec<StreamOutput>,
    pub contiguous: bool,
}

pub fn print_inspect(out: &InspectOutput, format: OutputFormat) {
    match format {
        OutputFormat::Json => {
            println!(
                "{}",
                serde_json::to_string(out).unwrap_or_else(|_| "{}".to_string())
            );
        }
        OutputFormat::Table => {
            let mut table = Table::new();
            table
                .load_preset(UTF8_FULL)
                .set_content_arrangement(ContentArrangement::Dynamic)
                .set_header(vec![
                    "SERIAL", "PAGES", "PACKETS", "BYTES", "SEQUENCE", "GAPS", "LAST GRANULE",
                ]);
            for stream in &out.streams {
                table.add_row(vec![
                    serial_label(stream),
                    stream.pages.to_string(),
                    stream.packets.to_string(),
                    stream.bytes.to_string(),
                    format!("{}..={}", stream.first_sequence, stream.last_sequence),
                    stream.sequence_gaps.to_string(),
                    stream.last_granule.to_string(),
                ]);
            }
            println!("{table}");
        }
        OutputFormat::Pretty => {
            for stream in &out.streams {
                println!(
                    "stream={} pages={} packets={} bytes={} seq={}..={} gaps={} granule={}",
                    serial_label(stream),
                    stream.pages,
                    stream.packets,
                    stream.bytes,
                    stream.first_sequence,
                    stream.last_sequence,
                    stream.sequence_gaps,
                    stream.last_granule
                );
            }
        }
    }
}

/// `version --extended` report.
#[derive(Debug, Serialize)]
pub struct VersionOutput {
    pub name: &'static str,
    pub version: &'static str,
    pub target: &'static str,
    pub git_hash: &'static str,
    /// Data formats a recording can be started with.
    pub formats: Vec<&'static str>,
    pub port_range: String,
    pub max_tracks: u32,
}

pub fn print_version(out: &VersionOutput, format: OutputFormat) {
    let rows = [
        ("name", out.name.to_string()),
        ("version", out.version.to_string()),
        ("target", out.target.to_string()),
        ("git_hash", out.git_hash.to_string()),
        ("formats", out.formats.join(",")),
        ("port_range", out.port_range.clone()),
        ("max_tracks", out.max_tracks.to_string()),
    ];
    match format {
        OutputFormat::Json => {
            println!(
                "{}",
                serde_json::to_string(out).unwrap_or_else(|_| "{}".to_string())
            );
        }
        OutputFormat::Table => {
            let mut table = Table::new();
            table.load_preset(UTF8_FULL).set_header(vec!["KEY", "VALUE"]);
            for (key, value) in rows {
                table.add_row(vec![key.to_string(), value]);
            }
            println!("{table}");
        }
        OutputFormat::Pretty => {
            for (key, value) in rows {
                println!("{key}: {value}");
            }
        }
    }
}

fn serial_label(stream: &StreamOutput) -> String {
    match (stream.serial, stream.sub_track) {
        (0, _) => "0 (meta)".to_string(),
        (serial, true) => format!("{serial:#010x} (sub)"),
        (serial, false) => serial.to_string(),
    }
}
