//! Import documents and the row sources behind them.
//!
//! Vendor sheets arrive as CSV or XLSX. Either way the first row is the
//! header row and every cell is handed on as text; typing happens in the
//! row mapper.

use std::borrow::Cow;
use std::io::{Cursor, Read};
use std::ops::Range;
use std::path::Path;

use calamine::{Data, Reader, Xlsx, XlsxError};
use sha2::{Digest, Sha256};

use crate::error::ImportError;
use crate::mapper::RawRow;

/// Random access to the data rows of one document.
///
/// Row indexes are 0-based and exclude the header row.
pub trait RowSource: Send + Sync {
    fn headers(&self) -> &[String];

    fn len(&self) -> usize;

    fn is_empty(&self) -> bool {
        self.len() == 0
    }

    /// Rows in `range`, clamped to the document end.
    fn rows(&self, range: Range<usize>) -> Vec<RawRow>;
}

/// Spreadsheet formats the inbox picks up, by file extension.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum DocumentFormat {
    Csv,
    Xlsx,
}

impl DocumentFormat {
    #[must_use]
    pub fn from_name(name: &str) -> Option<Self> {
        let ext = Path::new(name).extension()?.to_str()?;
        if ext.eq_ignore_ascii_case("csv") {
            Some(Self::Csv)
        } else if ext.eq_ignore_ascii_case("xlsx") {
            Some(Self::Xlsx)
        } else {
            None
        }
    }
}

fn is_blank(row: &[String]) -> bool {
    row.iter().all(|cell| cell.trim().is_empty())
}

fn slice_rows(rows: &[RawRow], range: Range<usize>) -> Vec<RawRow> {
    let end = range.end.min(rows.len());
    let start = range.start.min(end);
    rows[start..end].to_vec()
}

// ---------------------------------------------------------------------------
// CSV
// ---------------------------------------------------------------------------

/// A CSV document parsed fully into memory.
#[derive(Debug, Clone, Default)]
pub struct CsvDocument {
    headers: Vec<String>,
    rows: Vec<RawRow>,
}

impl CsvDocument {
    /// Parse CSV with a header row. Ragged rows are accepted and fully blank
    /// rows are dropped. Cells that are not valid UTF-8 (legacy Windows
    /// exports) are decoded with replacement characters.
    ///
    /// # Errors
    ///
    /// Returns [`csv::Error`] if the input cannot be read.
    pub fn from_reader<R: Read>(reader: R) -> Result<Self, csv::Error> {
        let mut reader = csv::ReaderBuilder::new()
            .flexible(true)
            .has_headers(true)
            .from_reader(reader);
        let mut replaced = 0_usize;

        let headers = reader
            .byte_headers()?
            .iter()
            .enumerate()
            .map(|(i, h)| {
                let header = decode_cell(h, &mut replaced);
                if i == 0 {
                    header.trim_start_matches('\u{feff}').to_string()
                } else {
                    header
                }
            })
            .collect();

        let mut rows = Vec::new();
        for record in reader.byte_records() {
            let row: RawRow = record?
                .iter()
                .map(|cell| decode_cell(cell, &mut replaced))
                .collect();
            if !is_blank(&row) {
                rows.push(row);
            }
        }

        if replaced > 0 {
            tracing::warn!(cells = replaced, "invalid UTF-8 replaced in CSV cells");
        }
        Ok(Self { headers, rows })
    }

    /// # Errors
    ///
    /// See [`CsvDocument::from_reader`].
    pub fn from_bytes(bytes: &[u8]) -> Result<Self, csv::Error> {
        Self::from_reader(bytes)
    }
}

fn decode_cell(cell: &[u8], replaced: &mut usize) -> String {
    match String::from_utf8_lossy(cell) {
        Cow::Borrowed(text) => text.to_string(),
        Cow::Owned(text) => {
            *replaced += 1;
            text
        }
    }
}

impl RowSource for CsvDocument {
    fn headers(&self) -> &[String] {
        &self.headers
    }

    fn len(&self) -> usize {
        self.rows.len()
    }

    fn rows(&self, range: Range<usize>) -> Vec<RawRow> {
        slice_rows(&self.rows, range)
    }
}

// ---------------------------------------------------------------------------
// XLSX
// ---------------------------------------------------------------------------

/// The first worksheet of an XLSX workbook, read fully into memory.
#[derive(Debug, Clone, Default)]
pub struct XlsxDocument {
    headers: Vec<String>,
    rows: Vec<RawRow>,
}

impl XlsxDocument {
    /// Read the first worksheet. A workbook without sheets is an empty
    /// document. Numeric cells are rendered the way they print, so `12.0`
    /// reads as `"12"`.
    ///
    /// # Errors
    ///
    /// Returns [`XlsxError`] if the bytes are not a readable workbook.
    pub fn from_bytes(bytes: &[u8]) -> Result<Self, XlsxError> {
        let mut workbook: Xlsx<_> = Xlsx::new(Cursor::new(bytes))?;
        let Some(range) = workbook.worksheet_range_at(0) else {
            return Ok(Self::default());
        };
        let range = range?;

        let mut rows = range
            .rows()
            .map(|row| row.iter().map(cell_text).collect::<RawRow>());
        let headers = rows.next().unwrap_or_default();
        let rows = rows.filter(|row| !is_blank(row)).collect();
        Ok(Self { headers, rows })
    }
}

fn cell_text(cell: &Data) -> String {
    match cell {
        Data::Empty => String::new(),
        Data::String(text) => text.clone(),
        other => other.to_string(),
    }
}

impl RowSource for XlsxDocument {
    fn headers(&self) -> &[String] {
        &self.headers
    }

    fn len(&self) -> usize {
        self.rows.len()
    }

    fn rows(&self, range: Range<usize>) -> Vec<RawRow> {
        slice_rows(&self.rows, range)
    }
}

// ---------------------------------------------------------------------------
// Documents
// ---------------------------------------------------------------------------

/// One named document queued for import.
pub struct ImportDocument {
    pub name: String,
    /// Hex SHA-256 of the raw bytes; with `name` it identifies the attachment.
    pub checksum: String,
    pub source: Box<dyn RowSource>,
    /// Why the document could not be read. Such a document has no rows and
    /// is recorded as failed when imported.
    pub load_error: Option<String>,
}

impl ImportDocument {
    #[must_use]
    pub fn new(
        name: impl Into<String>,
        checksum: impl Into<String>,
        source: Box<dyn RowSource>,
    ) -> Self {
        Self {
            name: name.into(),
            checksum: checksum.into(),
            source,
            load_error: None,
        }
    }

    /// A document that was found but could not be read.
    #[must_use]
    pub fn unreadable(
        name: impl Into<String>,
        checksum: impl Into<String>,
        error: &impl std::fmt::Display,
    ) -> Self {
        Self {
            load_error: Some(error.to_string()),
            ..Self::new(name, checksum, Box::new(CsvDocument::default()))
        }
    }

    /// # Errors
    ///
    /// Returns [`csv::Error`] if the bytes are not a readable CSV document.
    pub fn from_csv_bytes(name: impl Into<String>, bytes: &[u8]) -> Result<Self, csv::Error> {
        let document = CsvDocument::from_bytes(bytes)?;
        Ok(Self::new(name, checksum(bytes), Box::new(document)))
    }

    /// # Errors
    ///
    /// Returns [`XlsxError`] if the bytes are not a readable workbook.
    pub fn from_xlsx_bytes(name: impl Into<String>, bytes: &[u8]) -> Result<Self, XlsxError> {
        let document = XlsxDocument::from_bytes(bytes)?;
        Ok(Self::new(name, checksum(bytes), Box::new(document)))
    }

    /// Parse `bytes` as `format`. A document that cannot be parsed comes back
    /// [unreadable](Self::unreadable) so the run still accounts for it.
    #[must_use]
    pub fn load(name: &str, format: DocumentFormat, bytes: &[u8]) -> Self {
        let parsed = match format {
            DocumentFormat::Csv => {
                Self::from_csv_bytes(name, bytes).map_err(|source| ImportError::Csv {
                    document: name.to_string(),
                    source,
                })
            }
            DocumentFormat::Xlsx => {
                Self::from_xlsx_bytes(name, bytes).map_err(|source| ImportError::Xlsx {
                    document: name.to_string(),
                    source,
                })
            }
        };
        parsed.unwrap_or_else(|e| {
            tracing::warn!(document = name, error = %e, "malformed document");
            Self::unreadable(name, checksum(bytes), &e)
        })
    }
}

impl std::fmt::Debug for ImportDocument {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("ImportDocument")
            .field("name", &self.name)
            .field("checksum", &self.checksum)
            .field("rows", &self.source.len())
            .field("load_error", &self.load_error)
            .finish_non_exhaustive()
    }
}

#[must_use]
pub fn checksum(bytes: &[u8]) -> String {
    hex::encode(Sha256::digest(bytes))
}
