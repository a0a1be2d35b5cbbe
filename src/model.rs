use chrono::NaiveDate;
use serde::{Deserialize, Serialize};
use std::fmt;
use std::str::FromStr;
use thiserror::Error;

pub const DEFAULT_REQUIRED_PERCENTAGE: f64 = 75.0;
pub const DEFAULT_OWNER_ID: &str = "default-user";

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "SCREAMING_SNAKE_CASE")]
pub enum AttendanceStatus {
    Scheduled,
    Present,
    Absent,
    DutyLeave,
    MedicalLeave,
}

impl AttendanceStatus {
    pub const ALL: [AttendanceStatus; 5] = [
        AttendanceStatus::Scheduled,
        AttendanceStatus::Present,
        AttendanceStatus::Absent,
        AttendanceStatus::DutyLeave,
        AttendanceStatus::MedicalLeave,
    ];

    pub fn as_str(self) -> &'static str {
        match self {
            AttendanceStatus::Scheduled => "SCHEDULED",
            AttendanceStatus::Present => "PRESENT",
            AttendanceStatus::Absent => "ABSENT",
            AttendanceStatus::DutyLeave => "DUTY_LEAVE",
            AttendanceStatus::MedicalLeave => "MEDICAL_LEAVE",
        }
    }

    /// Leave of either kind counts the same as being present.
    pub fn is_attended(self) -> bool {
        matches!(
            self,
            AttendanceStatus::Present | AttendanceStatus::DutyLeave | AttendanceStatus::MedicalLeave
        )
    }
}

impl fmt::Display for AttendanceStatus {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

#[derive(Debug, Clone, PartialEq, Eq, Error)]
#[error("unknown value: {0}")]
pub struct UnknownVariant(pub String);

impl FromStr for AttendanceStatus {
    type Err = UnknownVariant;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        let t = s.trim();
        AttendanceStatus::ALL
            .into_iter()
            .find(|v| v.as_str().eq_ignore_ascii_case(t))
            .ok_or_else(|| UnknownVariant(t.to_string()))
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "SCREAMING_SNAKE_CASE")]
pub enum HolidayKind {
    Holiday,
    Exam,
    Event,
    Leave,
}

impl HolidayKind {
    pub fn as_str(self) -> &'static str {
        match self {
            HolidayKind::Holiday => "HOLIDAY",
            HolidayKind::Exam => "EXAM",
            HolidayKind::Event => "EVENT",
            HolidayKind::Leave => "LEAVE",
        }
    }
}

impl FromStr for HolidayKind {
    type Err = UnknownVariant;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.trim().to_ascii_uppercase().as_str() {
            "HOLIDAY" => Ok(HolidayKind::Holiday),
            "EXAM" => Ok(HolidayKind::Exam),
            "EVENT" => Ok(HolidayKind::Event),
            "LEAVE" => Ok(HolidayKind::Leave),
            other => Err(UnknownVariant(other.to_string())),
        }
    }
}

#[derive(Debug, Clone, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct Semester {
    pub id: String,
    pub name: String,
    pub start_date: NaiveDate,
    pub end_date: NaiveDate,
    pub required_percentage: f64,
    pub owner_id: String,
}

#[derive(Debug, Clone, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct Subject {
    pub id: String,
    pub name: String,
    pub code: String,
    pub teacher: String,
    pub required_percentage: f64,
    pub semester_id: String,
}

#[derive(Debug, Clone, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct ClassRecord {
    pub id: String,
    pub subject_id: String,
    pub date: NaiveDate,
    pub day_of_week: String,
    pub start_time: String,
    pub end_time: String,
    pub status: AttendanceStatus,
    pub notes: Option<String>,
}

#[derive(Debug, Clone, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct Holiday {
    pub id: String,
    pub date: NaiveDate,
    pub name: String,
    #[serde(rename = "type")]
    pub kind: HolidayKind,
    pub semester_id: String,
}

/// A class that has not been stored yet.
#[derive(Debug, Clone, PartialEq)]
pub struct NewClass {
    pub subject_id: String,
    pub date: NaiveDate,
    pub day_of_week: String,
    pub start_time: String,
    pub end_time: String,
    pub status: AttendanceStatus,
    pub notes: Option<String>,
}

/// Attendance recorded before the tracker was set up, keyed by subject code.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct PastAttendance {
    pub subject_code: String,
    pub date: NaiveDate,
    pub status: AttendanceStatus,
}

pub fn weekday_name(date: NaiveDate) -> &'static str {
    use chrono::{Datelike, Weekday};
    match date.weekday() {
        Weekday::Mon => "Monday",
        Weekday::Tue => "Tuesday",
        Weekday::Wed => "Wednesday",
        Weekday::Thu => "Thursday",
        Weekday::Fri => "Friday",
        Weekday::Sat => "Saturday",
        Weekday::Sun => "Sunday",
    }
}
