// ==========================================
// NEXO work-planning - spreadsheet parser
// ==========================================
// Turns a downloaded byte buffer into ordered raw records. Supports
// Excel (.xlsx, sniffed by the ZIP magic) and CSV. Header keys are
// lower-cased on read; expected-header lists are compared the same
// way, so spreadsheet authors' casing never matters.
// ==========================================

use crate::importer::error::{ImportError, ImportResult};
use calamine::{Reader, Xlsx};
use csv::ReaderBuilder;
use std::collections::HashMap;
use std::io::Cursor;

/// One data row. `line_number` is 1-based and excludes the header;
/// blank rows consume a number but are dropped from `records`.
#[derive(Debug, Clone)]
pub struct RawRecord {
    pub line_number: u32,
    values: HashMap<String, String>,
}

impl RawRecord {
    /// Cell value under a lower-cased header key. Empty cells and the
    /// literal string "null" are absent.
    pub fn value(&self, header: &str) -> Option<&str> {
        self.values.get(header).map(String::as_str)
    }
}

/// Parsed sheet: header set plus data records, both case-normalized.
#[derive(Debug, Clone)]
pub struct ParsedSheet {
    pub headers: Vec<String>,
    pub records: Vec<RawRecord>,
}

/// Parses a spreadsheet byte buffer. Fails on unreadable content,
/// never panics; no I/O beyond the supplied buffer.
pub fn parse_sheet(data: &[u8]) -> ImportResult<ParsedSheet> {
    if data.starts_with(b"PK") {
        parse_xlsx(data)
    } else {
        parse_csv(data)
    }
}

fn normalize_header(raw: &str) -> String {
    raw.trim().to_lowercase()
}

fn is_absent(value: &str) -> bool {
    value.is_empty() || value.eq_ignore_ascii_case("null")
}

fn build_record(
    line_number: u32,
    headers: &[String],
    cells: impl Iterator<Item = String>,
) -> Option<RawRecord> {
    let mut values = HashMap::new();
    for (col_idx, cell) in cells.enumerate() {
        if let Some(header) = headers.get(col_idx) {
            let trimmed = cell.trim().to_string();
            if !is_absent(&trimmed) {
                values.insert(header.clone(), trimmed);
            }
        }
    }
    if values.is_empty() {
        None
    } else {
        Some(RawRecord {
            line_number,
            values,
        })
    }
}

fn parse_csv(data: &[u8]) -> ImportResult<ParsedSheet> {
    let mut reader = ReaderBuilder::new()
        .has_headers(true)
        .flexible(true)
        .from_reader(data);

    let headers: Vec<String> = reader
        .headers()?
        .iter()
        .map(normalize_header)
        .collect();

    let mut records = Vec::new();
    for (row_idx, result) in reader.records().enumerate() {
        let record = result?;
        let line_number = row_idx as u32 + 1;
        if let Some(raw) = build_record(
            line_number,
            &headers,
            record.iter().map(|cell| cell.to_string()),
        ) {
            records.push(raw);
        }
    }
    Ok(ParsedSheet { headers, records })
}

fn parse_xlsx(data: &[u8]) -> ImportResult<ParsedSheet> {
    let cursor = Cursor::new(data.to_vec());
    let mut workbook: Xlsx<_> =
        Xlsx::new(cursor).map_err(|e| ImportError::UnreadableFile(e.to_string()))?;

    let sheet_name = workbook
        .sheet_names()
        .first()
        .cloned()
        .ok_or_else(|| ImportError::Excel("workbook has no sheet".to_string()))?;
    let range = workbook
        .worksheet_range(&sheet_name)
        .map_err(|e| ImportError::Excel(e.to_string()))?;

    let mut rows = range.rows();
    let headers: Vec<String> = match rows.next() {
        Some(header_row) => header_row
            .iter()
            .map(|cell| normalize_header(&cell.to_string()))
            .collect(),
        None => Vec::new(),
    };

    let mut records = Vec::new();
    for (row_idx, data_row) in rows.enumerate() {
        let line_number = row_idx as u32 + 1;
        if let Some(raw) = build_record(
            line_number,
            &headers,
            data_row.iter().map(|cell| cell.to_string()),
        ) {
            records.push(raw);
        }
    }
    Ok(ParsedSheet { headers, records })
}
