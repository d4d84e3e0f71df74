//! CSV trade source adapter.
//!
//! Header names are matched case-insensitively and surrounding whitespace is
//! ignored. Columns beyond the trade contract are skipped.

use crate::domain::error::LoadError;
use crate::domain::loader::{RawTradeRow, REQUIRED_COLUMNS};
use crate::ports::trade_source_port::TradeSourcePort;
use csv::{ReaderBuilder, StringRecord, Trim};
use std::fs::File;
use std::io::Read;
use std::path::{Path, PathBuf};

pub struct CsvTradeSource {
    path: PathBuf,
}

impl CsvTradeSource {
    pub fn new<P: AsRef<Path>>(path: P) -> Self {
        Self {
            path: path.as_ref().to_path_buf(),
        }
    }

    fn unreadable(&self, reason: impl ToString) -> LoadError {
        LoadError::SourceUnreadable {
            path: self.path.display().to_string(),
            reason: reason.to_string(),
        }
    }

    fn rows_from_reader<R: Read>(&self, reader: R) -> Result<Vec<RawTradeRow>, LoadError> {
        let mut rdr = ReaderBuilder::new().trim(Trim::All).from_reader(reader);

        let headers: StringRecord = rdr
            .headers()
            .map_err(|e| self.unreadable(e))?
            .iter()
            .map(|h| h.trim().to_lowercase())
            .collect();
        // A zero-byte source has no header line at all.
        if headers.is_empty() {
            return Ok(Vec::new());
        }
        for column in REQUIRED_COLUMNS {
            if !headers.iter().any(|h| h == column) {
                return Err(LoadError::MissingColumn {
                    column: column.to_string(),
                });
            }
        }
        rdr.set_headers(headers);

        let rows = rdr
            .deserialize::<RawTradeRow>()
            .map(|result| result.unwrap_or_else(|e| RawTradeRow::malformed(record_error(&e))))
            .collect();
        Ok(rows)
    }
}

/// Error text without the record position; the loader reports row indices itself.
fn record_error(err: &csv::Error) -> String {
    match err.kind() {
        csv::ErrorKind::UnequalLengths {
            expected_len, len, ..
        } => format!("found {len} fields, expected {expected_len}"),
        csv::ErrorKind::Utf8 { .. } => "invalid UTF-8".to_string(),
        _ => err.to_string(),
    }
}

impl TradeSourcePort for CsvTradeSource {
    fn read_rows(&self) -> Result<Vec<RawTradeRow>, LoadError> {
        let file = File::open(&self.path).map_err(|e| self.unreadable(e))?;
        self.rows_from_reader(file)
    }

    fn describe(&self) -> String {
        self.path.display().to_string()
    }
}
