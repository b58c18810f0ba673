// ==========================================
// NEXO work-planning - row field guards
// ==========================================
// Field-level validation for raw spreadsheet cells. Guards never
// throw: each failure is collected and later converted to one
// FileError tagged with the row's line number. A guarded accessor
// returns a default on failure so the row survives with partial
// data for logging.
// ==========================================

use crate::domain::geometry::Geometry;
use crate::domain::import_log::FileError;
use crate::domain::types::{ErrorCode, ErrorTarget};
use crate::importer::file_parser::RawRecord;
use chrono::{NaiveDate, NaiveDateTime};

const YEAR_MIN: i32 = 1900;
const YEAR_MAX: i32 = 2100;

const DATE_TIME_FORMATS: [&str; 3] = ["%Y-%m-%d %H:%M:%S", "%Y-%m-%dT%H:%M:%S", "%Y-%m-%dT%H:%M:%S%.f"];

/// One failed field guard, not yet tied to a line number.
#[derive(Debug, Clone, PartialEq)]
pub struct GuardFailure {
    pub code: ErrorCode,
    pub target: ErrorTarget,
    pub value: Option<String>,
}

impl GuardFailure {
    pub fn missing(target: ErrorTarget) -> Self {
        GuardFailure {
            code: ErrorCode::Missing,
            target,
            value: None,
        }
    }

    pub fn invalid(target: ErrorTarget, value: &str) -> Self {
        GuardFailure {
            code: ErrorCode::Invalid,
            target,
            value: Some(value.to_string()),
        }
    }

    pub fn into_file_error(self, line: u32) -> FileError {
        let mut error = FileError::new(self.code, self.target, line)
            .with_value("value1", self.target.column_label());
        if let Some(value) = self.value {
            error = error.with_value("value2", value);
        }
        error
    }
}

// ==========================================
// Guards
// ==========================================

pub fn required_text(
    record: &RawRecord,
    header: &str,
    target: ErrorTarget,
    failures: &mut Vec<GuardFailure>,
) -> String {
    match record.value(header) {
        Some(value) => value.to_string(),
        None => {
            failures.push(GuardFailure::missing(target));
            String::new()
        }
    }
}

pub fn optional_text(record: &RawRecord, header: &str) -> Option<String> {
    record.value(header).map(str::to_string)
}

/// Year inside the plausible planning window.
pub fn required_year(
    record: &RawRecord,
    header: &str,
    target: ErrorTarget,
    failures: &mut Vec<GuardFailure>,
) -> i32 {
    match record.value(header) {
        None => {
            failures.push(GuardFailure::missing(target));
            0
        }
        Some(raw) => match raw.parse::<i32>() {
            Ok(year) if (YEAR_MIN..=YEAR_MAX).contains(&year) => year,
            _ => {
                failures.push(GuardFailure::invalid(target, raw));
                0
            }
        },
    }
}

/// Zero-or-positive decimal amount (budget, length).
pub fn required_amount(
    record: &RawRecord,
    header: &str,
    target: ErrorTarget,
    failures: &mut Vec<GuardFailure>,
) -> f64 {
    match record.value(header) {
        None => {
            failures.push(GuardFailure::missing(target));
            0.0
        }
        Some(raw) => match raw.replace(',', ".").parse::<f64>() {
            Ok(amount) if amount >= 0.0 => amount,
            _ => {
                failures.push(GuardFailure::invalid(target, raw));
                0.0
            }
        },
    }
}

pub fn parse_date(raw: &str) -> Option<NaiveDateTime> {
    for format in DATE_TIME_FORMATS {
        if let Ok(parsed) = NaiveDateTime::parse_from_str(raw, format) {
            return Some(parsed);
        }
    }
    NaiveDate::parse_from_str(raw, "%Y-%m-%d")
        .ok()
        .and_then(|d| d.and_hms_opt(0, 0, 0))
}

pub fn required_date(
    record: &RawRecord,
    header: &str,
    target: ErrorTarget,
    failures: &mut Vec<GuardFailure>,
) -> Option<NaiveDateTime> {
    match record.value(header) {
        None => {
            failures.push(GuardFailure::missing(target));
            None
        }
        Some(raw) => match parse_date(raw) {
            Some(date) => Some(date),
            None => {
                failures.push(GuardFailure::invalid(target, raw));
                None
            }
        },
    }
}

/// Embedded GeoJSON string; absent is fine, malformed is not.
pub fn optional_geometry(
    record: &RawRecord,
    header: &str,
    target: ErrorTarget,
    failures: &mut Vec<GuardFailure>,
) -> Option<Geometry> {
    let raw = record.value(header)?;
    match Geometry::from_json_str(raw) {
        Some(geometry) => Some(geometry),
        None => {
            failures.push(GuardFailure::invalid(target, raw));
            None
        }
    }
}
