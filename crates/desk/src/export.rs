use std::io::{self, Write};

use ledger::{utc_datetime, Fill};
use time::macros::format_description;

use crate::logging::DeskLogEvent;

pub const FILLS_CSV_HEADER: &str = "ts_iso,symbol,side,price,amount,fee_usdt,realized_usdt\n";
pub const EVENTS_CSV_HEADER: &str = "ts_iso,event\n";

pub struct CsvExporter<W: Write> {
    writer: W,
}

impl<W: Write> CsvExporter<W> {
    pub fn new(writer: W) -> Self {
        Self { writer }
    }

    pub fn write_fills<'a>(&mut self, fills: impl IntoIterator<Item = &'a Fill>) -> io::Result<()> {
        self.writer.write_all(FILLS_CSV_HEADER.as_bytes())?;
        for fill in fills {
            writeln!(
                self.writer,
                "{},{},{},{},{},{:.6},{:.6}",
                iso_timestamp(fill.ts)?,
                escape_csv_field(&fill.symbol),
                fill.side.as_str(),
                fill.price,
                fill.amount,
                fill.fee,
                fill.realized_pnl
            )?;
        }
        self.writer.flush()
    }

    /// Writes one row per event. Commas in messages become `;` so the message
    /// stays a single unquoted column.
    pub fn write_events<'a>(
        &mut self,
        events: impl IntoIterator<Item = &'a DeskLogEvent>,
    ) -> io::Result<()> {
        self.writer.write_all(EVENTS_CSV_HEADER.as_bytes())?;
        for event in events {
            let message = escape_csv_field(&event.message.replace(',', ";"));
            writeln!(self.writer, "{},{message}", iso_timestamp(event.ts)?)?;
        }
        self.writer.flush()
    }

    pub fn into_inner(self) -> W {
        self.writer
    }
}

pub fn fills_csv<'a>(fills: impl IntoIterator<Item = &'a Fill>) -> io::Result<String> {
    let mut exporter = CsvExporter::new(Vec::new());
    exporter.write_fills(fills)?;
    String::from_utf8(exporter.into_inner()).map_err(io::Error::other)
}

pub fn events_csv<'a>(events: impl IntoIterator<Item = &'a DeskLogEvent>) -> io::Result<String> {
    let mut exporter = CsvExporter::new(Vec::new());
    exporter.write_events(events)?;
    String::from_utf8(exporter.into_inner()).map_err(io::Error::other)
}

pub fn iso_timestamp(ts_ms: u64) -> io::Result<String> {
    let format =
        format_description!("[year]-[month]-[day]T[hour]:[minute]:[second].[subsecond digits:3]Z");
    utc_datetime(ts_ms).format(format).map_err(io::Error::other)
}

fn escape_csv_field(value: &str) -> String {
    let needs_quotes = value
        .chars()
        .any(|ch| matches!(ch, ',' | '"' | '\n' | '\r'));
    if !needs_quotes {
        return value.to_string();
    }

    let escaped = value.replace('"', "\"\"");
    format!("\"{escaped}\"")
}
