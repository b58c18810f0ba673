// ==========================================
// NEXO work-planning - file content validation
// ==========================================
// File-level checks run after download, before row parsing: the
// sheet must be readable, carry at least one data row, and expose
// every required column. Violations are independent; an empty sheet
// with missing columns reports both.
// ==========================================

use crate::domain::import_log::FileError;
use crate::domain::types::{ErrorCode, ErrorTarget, NexoFileType};
use crate::importer::file_parser::{self, ParsedSheet};
use crate::importer::rows;
use std::collections::HashSet;

pub fn validate_content(file_type: NexoFileType, data: &[u8]) -> Vec<FileError> {
    let sheet = match file_parser::parse_sheet(data) {
        Ok(sheet) => sheet,
        Err(e) => {
            return vec![FileError::new(ErrorCode::Invalid, ErrorTarget::File, 0)
                .with_value("value1", ErrorTarget::File.column_label())
                .with_value("value2", e.to_string())];
        }
    };

    let mut errors = Vec::new();
    if sheet.records.is_empty() {
        errors.push(FileError::new(ErrorCode::EmptyFile, ErrorTarget::File, 0));
    }
    if let Some(error) = missing_columns_error(file_type, &sheet) {
        errors.push(error);
    }
    errors
}

fn missing_columns_error(file_type: NexoFileType, sheet: &ParsedSheet) -> Option<FileError> {
    let present: HashSet<&str> = sheet.headers.iter().map(String::as_str).collect();
    let missing: Vec<&str> = rows::minimal_headers(file_type)
        .into_iter()
        .filter(|header| !present.contains(header.to_lowercase().as_str()))
        .collect();
    if missing.is_empty() {
        None
    } else {
        Some(
            FileError::new(ErrorCode::Missing, ErrorTarget::Columns, 0)
                .with_value("value1", missing.join(", ")),
        )
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_valid_sheet_passes() {
        let csv = "NoDossierSE,AnneePrevTravaux,PrevTravaux\nD-1,2025,1000\n";
        let errors = validate_content(NexoFileType::InterventionsBudgetSe, csv.as_bytes());
        assert!(errors.is_empty());
    }

    #[test]
    fn test_empty_sheet_with_missing_columns_reports_both() {
        let csv = "NoDossierSE\n";
        let errors = validate_content(NexoFileType::InterventionsBudgetSe, csv.as_bytes());
        assert_eq!(errors.len(), 2);
        assert!(errors
            .iter()
            .any(|e| e.code == ErrorCode::EmptyFile && e.target == ErrorTarget::File));
        let missing = errors
            .iter()
            .find(|e| e.code == ErrorCode::Missing && e.target == ErrorTarget::Columns)
            .unwrap();
        let named = missing.values.get("value1").unwrap();
        assert!(named.contains("AnneePrevTravaux"));
        assert!(named.contains("PrevTravaux"));
        assert!(!named.contains("NoDossierSE"));
    }

    #[test]
    fn test_case_insensitive_header_match() {
        let csv = "NODOSSIERSE,anneeprevtravaux,PrevTravaux\nD-1,2025,1000\n";
        let errors = validate_content(NexoFileType::InterventionsBudgetSe, csv.as_bytes());
        assert!(errors.is_empty());
    }

    #[test]
    fn test_unreadable_content_is_one_error() {
        let errors = validate_content(
            NexoFileType::InterventionsSe,
            b"PK\x03\x04not-a-workbook",
        );
        assert_eq!(errors.len(), 1);
        assert_eq!(errors[0].code, ErrorCode::Invalid);
        assert_eq!(errors[0].target, ErrorTarget::File);
    }
}
