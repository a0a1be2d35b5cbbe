use chrono::NaiveDate;
use serde::Serialize;
use thiserror::Error;

use crate::model::{AttendanceStatus, PastAttendance};

pub const TEMPLATE: &str = "SubjectCode,Date,Status
CS201,2024-01-15,PRESENT
CS202,2024-01-15,ABSENT
CS201,2024-01-16,PRESENT
";

#[derive(Debug, Error)]
pub enum CsvImportError {
    #[error("CSV processing error: {0}")]
    Csv(#[from] csv::Error),

    #[error("cannot read attendance file: {0}")]
    Io(#[from] std::io::Error),
}

#[derive(Debug, Clone, PartialEq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct RejectedRow {
    pub line: u64,
    pub reason: String,
}

#[derive(Debug, Clone, Default, PartialEq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct AttendanceImport {
    pub records: Vec<PastAttendance>,
    pub rejected: Vec<RejectedRow>,
}

/// Parses `SubjectCode,Date,Status` rows. Incomplete rows are skipped the way
/// the upload form always skipped them; rows that are complete but malformed
/// come back in `rejected` with their line number.
pub fn parse_attendance_csv(text: &str) -> Result<AttendanceImport, CsvImportError> {
    let mut reader = csv::ReaderBuilder::new()
        .has_headers(true)
        .flexible(true)
        .trim(csv::Trim::All)
        .from_reader(text.as_bytes());

    let mut out = AttendanceImport::default();
    for result in reader.records() {
        let record = result?;
        let line = record.position().map(|p| p.line()).unwrap_or(0);
        let field = |i: usize| record.get(i).unwrap_or("");
        let (code, date_raw, status_raw) = (field(0), field(1), field(2));
        if code.is_empty() || date_raw.is_empty() || status_raw.is_empty() {
            continue;
        }

        let date = match NaiveDate::parse_from_str(date_raw, "%Y-%m-%d") {
            Ok(d) => d,
            Err(_) => {
                out.rejected.push(RejectedRow {
                    line,
                    reason: format!("invalid date {:?}", date_raw),
                });
                continue;
            }
        };
        let status = match status_raw.parse::<AttendanceStatus>() {
            Ok(s) => s,
            Err(e) => {
                out.rejected.push(RejectedRow {
                    line,
                    reason: e.to_string(),
                });
                continue;
            }
        };
        out.records.push(PastAttendance {
            subject_code: code.to_string(),
            date,
            status,
        });
    }
    Ok(out)
}

pub fn read_attendance_csv(path: &std::path::Path) -> Result<AttendanceImport, CsvImportError> {
    let text = std::fs::read_to_string(path)?;
    parse_attendance_csv(&text)
}
