//! Colour-coded console rendering of access log records.

use owo_colors::{AnsiColors, DynColors, OwoColorize, Style};
use tracing::{Level, error, info, warn};

use crate::record::RequestRecord;
use crate::sink::LogSink;

/// Palette request IDs are spread over; bright variants keep it readable on
/// dark terminals.
const ID_PALETTE: [AnsiColors; 12] = [
    AnsiColors::Cyan,
    AnsiColors::Magenta,
    AnsiColors::Blue,
    AnsiColors::Green,
    AnsiColors::Yellow,
    AnsiColors::Red,
    AnsiColors::BrightCyan,
    AnsiColors::BrightMagenta,
    AnsiColors::BrightBlue,
    AnsiColors::BrightGreen,
    AnsiColors::BrightYellow,
    AnsiColors::BrightRed,
];

/// Stable palette slot for a request ID (FNV-1a over its bytes)
pub fn id_color(id: &str) -> AnsiColors {
    let hash = id.bytes().fold(0x811c_9dc5u32, |acc, byte| {
        (acc ^ u32::from(byte)).wrapping_mul(0x0100_0193)
    });
    ID_PALETTE[hash as usize % ID_PALETTE.len()]
}

/// Formats a request ID as `[id]` in its stable color
pub fn colored_id(id: &str) -> String {
    let color = id_color(id);
    let style = Style::new().color(DynColors::Ansi(color));
    format!("[{}]", id).style(style).to_string()
}

/// Color for a status code, matching the severity it is logged at
fn status_color(level: Level) -> AnsiColors {
    match level {
        Level::ERROR => AnsiColors::Red,
        Level::WARN => AnsiColors::Yellow,
        _ => AnsiColors::Green,
    }
}

/// Renders one record as a compact line:
/// `[id] ← GET /path 200 12B (1.2ms) from 10.0.0.1`, followed by the error if any.
pub fn render_line(level: Level, record: &RequestRecord) -> String {
    let id = match record.request_id.as_deref() {
        Some(id) if !id.is_empty() => colored_id(id),
        _ => "[-]".to_string(),
    };
    let status = record.status.color(status_color(level)).to_string();
    let mut line = format!(
        "{} ← {} {} {}B ({}) from {}",
        id,
        record.request,
        status,
        record.size,
        record.time(),
        record.remote_ip
    );
    if let Some(err) = &record.error {
        line.push_str(&format!(" {}", err.red()));
    }
    line
}

/// Human-oriented sink for local development.
///
/// Still routes through `tracing` at the classified level, so the installed
/// subscriber decides where lines end up.
#[derive(Debug, Clone, Copy, Default)]
pub struct ConsoleSink;

impl LogSink for ConsoleSink {
    fn emit(&self, level: Level, message: &'static str, record: &RequestRecord) {
        let line = render_line(level, record);
        match level {
            Level::ERROR => error!(target: "access_log", "{} {}", message, line),
            Level::WARN => warn!(target: "access_log", "{} {}", message, line),
            _ => info!(target: "access_log", "{} {}", message, line),
        }
    }
}
