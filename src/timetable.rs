use chrono::{NaiveDate, NaiveTime, Weekday};
use serde::{Deserialize, Serialize};
use std::collections::HashMap;
use std::path::{Path, PathBuf};
use thiserror::Error;

use crate::model::{weekday_name, AttendanceStatus, NewClass, PastAttendance};

pub const MAX_UPLOAD_BYTES: u64 = 10 * 1024 * 1024;
/// Longest range `generate_classes` will expand: four years of days.
pub const MAX_SPAN_DAYS: i64 = 4 * 366;
const ALLOWED_EXTENSIONS: [&str; 4] = ["png", "jpg", "jpeg", "pdf"];

#[derive(Debug, Error)]
pub enum TimetableError {
    #[error("unsupported file type; upload a PNG, JPG, or PDF file")]
    UnsupportedType,

    #[error("file size must be less than 10MB (got {size} bytes)")]
    TooLarge { size: u64 },

    #[error("cannot read {path}: {source}")]
    Io {
        path: PathBuf,
        #[source]
        source: std::io::Error,
    },

    #[error("invalid time range {0:?}; expected HH:MM-HH:MM")]
    BadTimeRange(String),

    #[error("date range spans {days} days; classes are generated for at most four years")]
    SpanTooLong { days: i64 },
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct SubjectDraft {
    pub name: String,
    pub code: String,
    #[serde(default)]
    pub teacher: String,
    #[serde(default)]
    pub required_percentage: Option<f64>,
}

/// One weekly slot: every `day` from `start_time` to `end_time`.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct ScheduleSlot {
    pub day: Weekday,
    pub start_time: String,
    pub end_time: String,
    pub subject_code: String,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct ParsedTimetable {
    pub subjects: Vec<SubjectDraft>,
    pub schedule: Vec<ScheduleSlot>,
}

/// A validated upload on disk.
#[derive(Debug, Clone)]
pub struct TimetableUpload {
    pub path: PathBuf,
    pub size: u64,
}

/// Turns a timetable image into subjects and weekly slots.
pub trait TimetableSource {
    fn parse(&self, upload: &TimetableUpload) -> Result<ParsedTimetable, TimetableError>;
}

pub fn validate_upload(path: &Path) -> Result<TimetableUpload, TimetableError> {
    let ext = path
        .extension()
        .and_then(|e| e.to_str())
        .map(|e| e.to_ascii_lowercase())
        .unwrap_or_default();
    if !ALLOWED_EXTENSIONS.contains(&ext.as_str()) {
        return Err(TimetableError::UnsupportedType);
    }
    let meta = std::fs::metadata(path).map_err(|source| TimetableError::Io {
        path: path.to_path_buf(),
        source,
    })?;
    if meta.len() > MAX_UPLOAD_BYTES {
        return Err(TimetableError::TooLarge { size: meta.len() });
    }
    Ok(TimetableUpload {
        path: path.to_path_buf(),
        size: meta.len(),
    })
}

/// Splits `"09:00-10:00"` into its two ends.
pub fn split_time_range(range: &str) -> Result<(String, String), TimetableError> {
    let bad = || TimetableError::BadTimeRange(range.to_string());
    let (start, end) = range.split_once('-').ok_or_else(bad)?;
    let start = NaiveTime::parse_from_str(start.trim(), "%H:%M").map_err(|_| bad())?;
    let end = NaiveTime::parse_from_str(end.trim(), "%H:%M").map_err(|_| bad())?;
    if end <= start {
        return Err(bad());
    }
    Ok((
        start.format("%H:%M").to_string(),
        end.format("%H:%M").to_string(),
    ))
}

/// Recognises nothing: always answers with the same five-subject week.
#[derive(Debug, Default, Clone, Copy)]
pub struct SampleTimetable;

impl TimetableSource for SampleTimetable {
    fn parse(&self, _upload: &TimetableUpload) -> Result<ParsedTimetable, TimetableError> {
        let subjects = [
            ("Data Structures", "CS201", "Dr. Sarah Johnson"),
            ("Database Management", "CS202", "Prof. Michael Chen"),
            ("Operating Systems", "CS203", "Dr. Emily Brown"),
            ("Computer Networks", "CS204", "Prof. David Lee"),
            ("Software Engineering", "CS205", "Dr. Anna Wilson"),
        ]
        .into_iter()
        .map(|(name, code, teacher)| SubjectDraft {
            name: name.to_string(),
            code: code.to_string(),
            teacher: teacher.to_string(),
            required_percentage: Some(75.0),
        })
        .collect();

        let slots = [
            (Weekday::Mon, "09:00-10:00", "CS201"),
            (Weekday::Mon, "10:00-11:00", "CS202"),
            (Weekday::Tue, "09:00-10:00", "CS203"),
            (Weekday::Tue, "11:00-12:00", "CS204"),
            (Weekday::Wed, "10:00-11:00", "CS201"),
            (Weekday::Wed, "14:00-15:00", "CS205"),
            (Weekday::Thu, "09:00-10:00", "CS202"),
            (Weekday::Thu, "11:00-12:00", "CS203"),
            (Weekday::Fri, "10:00-11:00", "CS204"),
            (Weekday::Fri, "14:00-15:00", "CS205"),
        ];
        let mut schedule = Vec::with_capacity(slots.len());
        for (day, range, code) in slots {
            let (start_time, end_time) = split_time_range(range)?;
            schedule.push(ScheduleSlot {
                day,
                start_time,
                end_time,
                subject_code: code.to_string(),
            });
        }

        Ok(ParsedTimetable { subjects, schedule })
    }
}

/// Expands weekly slots into dated classes for every day in `[start, end]`.
/// Slots for unknown subject codes are dropped. A past attendance record for
/// the same code and date supplies the status; otherwise the class is
/// `SCHEDULED`. Ranges longer than `MAX_SPAN_DAYS` are refused.
pub fn generate_classes(
    start: NaiveDate,
    end: NaiveDate,
    schedule: &[ScheduleSlot],
    subject_ids: &HashMap<String, String>,
    past: &[PastAttendance],
) -> Result<Vec<NewClass>, TimetableError> {
    use chrono::Datelike;

    let days = (end - start).num_days() + 1;
    if days > MAX_SPAN_DAYS {
        return Err(TimetableError::SpanTooLong { days });
    }

    let past_by_key: HashMap<(&str, NaiveDate), AttendanceStatus> = past
        .iter()
        .map(|r| ((r.subject_code.as_str(), r.date), r.status))
        .collect();

    let mut out = Vec::new();
    for date in start.iter_days().take_while(|d| *d <= end) {
        let weekday = date.weekday();
        for slot in schedule.iter().filter(|s| s.day == weekday) {
            let Some(subject_id) = subject_ids.get(&slot.subject_code) else {
                continue;
            };
            let status = past_by_key
                .get(&(slot.subject_code.as_str(), date))
                .copied()
                .unwrap_or(AttendanceStatus::Scheduled);
            out.push(NewClass {
                subject_id: subject_id.clone(),
                date,
                day_of_week: weekday_name(date).to_string(),
                start_time: slot.start_time.clone(),
                end_time: slot.end_time.clone(),
                status,
                notes: None,
            });
        }
    }
    Ok(out)
}
