use std::io::IsTerminal;
use std::time::{SystemTime, UNIX_EPOCH};

use clap::ValueEnum;
use comfy_table::{presets::UTF8_FULL, ContentArrangement, Table};
use rtlink_frame::CommandSelector;
use rtlink_peer::{DecodedArray, Dispatch};
use serde::Serialize;

/// Samples shown per array in summaries.
const PREVIEW_SAMPLES: usize = 8;

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

#[derive(Serialize)]
struct ArrayOutput<'a> {
    signal: &'a str,
    sequence: u64,
    min_volts: f64,
    max_volts: f64,
    first_volts: &'a [f64],
    first_scaled: &'a [i32],
    timestamp: String,
}

pub fn print_array(array: &DecodedArray, format: OutputFormat) {
    let voltage = &array.voltage[..PREVIEW_SAMPLES];
    let scaled = &array.scaled[..PREVIEW_SAMPLES];
    match format {
        OutputFormat::Json => {
            let out = ArrayOutput {
                signal: array.kind.as_str(),
                sequence: array.sequence,
                min_volts: array.range.min,
                max_volts: array.range.max,
                first_volts: voltage,
                first_scaled: scaled,
                timestamp: now_unix_seconds(),
            };
            println!(
                "{}",
                serde_json::to_string(&out).unwrap_or_else(|_| "{}".to_string())
            );
        }
        OutputFormat::Table => {
            let mut table = Table::new();
            table
                .load_preset(UTF8_FULL)
                .set_content_arrangement(ContentArrangement::Dynamic)
                .set_header(vec!["SIGNAL", "SEQ", "MIN (V)", "MAX (V)", "FIRST SAMPLES"])
                .add_row(vec![
                    array.kind.to_string(),
                    array.sequence.to_string(),
                    format!("{:.4}", array.range.min),
                    format!("{:.4}", array.range.max),
                    join_scaled(scaled),
                ]);
            println!("{table}");
        }
        OutputFormat::Pretty => {
            println!(
                "signal={} seq={} min={:.4}V max={:.4}V scaled=[{}]",
                array.kind,
                array.sequence,
                array.range.min,
                array.range.max,
                join_scaled(scaled)
            );
        }
    }
}

#[derive(Serialize)]
struct SentOutput<'a> {
    command: &'a str,
    selector: u16,
    bytes: Option<usize>,
    terminated: bool,
}

pub fn print_dispatch(selector: CommandSelector, dispatch: Dispatch, format: OutputFormat) {
    let (bytes, terminated) = match dispatch {
        Dispatch::Sent(n) => (Some(n), false),
        Dispatch::Terminated => (None, true),
    };
    match format {
        OutputFormat::Json => {
            let out = SentOutput {
                command: selector.name(),
                selector: selector as u16,
                bytes,
                terminated,
            };
            println!(
                "{}",
                serde_json::to_string(&out).unwrap_or_else(|_| "{}".to_string())
            );
        }
        OutputFormat::Table => {
            let mut table = Table::new();
            table
                .load_preset(UTF8_FULL)
                .set_content_arrangement(ContentArrangement::Dynamic)
                .set_header(vec!["COMMAND", "SELECTOR", "RESULT"])
                .add_row(vec![
                    selector.name().to_string(),
                    (selector as u16).to_string(),
                    describe(bytes),
                ]);
            println!("{table}");
        }
        OutputFormat::Pretty => {
            println!("command={selector} selector={} {}", selector as u16, describe(bytes));
        }
    }
}

fn describe(bytes: Option<usize>) -> String {
    match bytes {
        Some(n) => format!("sent {n} bytes"),
        None => "link closed".to_string(),
    }
}

fn join_scaled(samples: &[i32]) -> String {
    samples
        .iter()
        .map(i32::to_string)
        .collect::<Vec<_>>()
        .join(" ")
}

fn now_unix_seconds() -> String {
    SystemTime::now()
        .duration_since(UNIX_EPOCH)
        .map(|d| d.as_secs().to_string())
        .unwrap_or_else(|_| "0".to_string())
}
