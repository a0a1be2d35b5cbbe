use chrono::NaiveDate;
use serde::Serialize;

use crate::model::{AttendanceStatus, ClassRecord};

const SAFE_THRESHOLD: f64 = 80.0;
const HIGH_RISK_BAND: f64 = 5.0;

/// Percentages are reported with two decimals: `round(100*x) / 100`.
pub fn round_2dp(x: f64) -> f64 {
    (x * 100.0).round() / 100.0
}

fn percentage(attended: usize, total: usize) -> f64 {
    if total == 0 {
        return 0.0;
    }
    (attended as f64 / total as f64) * 100.0
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Serialize)]
#[serde(rename_all = "lowercase")]
pub enum RiskTier {
    Safe,
    Warning,
    High,
    Critical,
}

impl RiskTier {
    pub fn is_at_risk(self) -> bool {
        matches!(self, RiskTier::High | RiskTier::Critical)
    }
}

/// First matching band wins; every comparison is inclusive.
pub fn risk_tier(attendance_pct: f64, required_percentage: f64) -> RiskTier {
    if attendance_pct >= SAFE_THRESHOLD {
        RiskTier::Safe
    } else if attendance_pct >= required_percentage {
        RiskTier::Warning
    } else if attendance_pct >= required_percentage - HIGH_RISK_BAND {
        RiskTier::High
    } else {
        RiskTier::Critical
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct SubjectStats {
    pub total_classes: usize,
    pub attended_classes: usize,
    pub absent_classes: usize,
    pub attendance_pct: f64,
    pub can_bunk: u32,
    pub must_attend: u32,
    pub risk_tier: RiskTier,
}

#[derive(Debug, Clone, Copy, PartialEq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct SemesterAggregate {
    pub total_subjects: usize,
    pub total_classes: usize,
    pub total_attended: usize,
    pub total_absent: usize,
    pub average_attendance: f64,
    pub subjects_at_risk: usize,
}

/// Look-ahead counts for a subject. The closed forms hold the current total
/// fixed; they are the numbers the dashboard has always shown, not an exact
/// per-class simulation.
fn projections(attended: usize, total: usize, raw_pct: f64, required: f64) -> (u32, u32) {
    if required <= 0.0 {
        return (0, 0);
    }
    let ratio = required / 100.0;
    let attended = attended as f64;
    let total = total as f64;
    if raw_pct >= required {
        let can_bunk = ((attended - ratio * total) / ratio).floor();
        (can_bunk.max(0.0) as u32, 0)
    } else {
        let required_attended = (ratio * total).ceil();
        let must_attend = required_attended - attended;
        (0, must_attend.max(0.0) as u32)
    }
}

pub fn compute_subject_stats(classes: &[ClassRecord], required_percentage: f64) -> SubjectStats {
    compute_stats_from_statuses(classes.iter().map(|c| c.status), required_percentage)
}

pub fn compute_stats_from_statuses<I>(statuses: I, required_percentage: f64) -> SubjectStats
where
    I: IntoIterator<Item = AttendanceStatus>,
{
    let mut total: usize = 0;
    let mut attended: usize = 0;
    let mut absent: usize = 0;
    for status in statuses {
        total += 1;
        if status.is_attended() {
            attended += 1;
        } else if status == AttendanceStatus::Absent {
            absent += 1;
        }
    }

    let raw_pct = percentage(attended, total);
    let (can_bunk, must_attend) = projections(attended, total, raw_pct, required_percentage);

    SubjectStats {
        total_classes: total,
        attended_classes: attended,
        absent_classes: absent,
        attendance_pct: round_2dp(raw_pct),
        can_bunk,
        must_attend,
        risk_tier: risk_tier(raw_pct, required_percentage),
    }
}

/// Averages the already-rounded per-subject percentages rather than pooling
/// the counts, so a subject with few classes weighs as much as a busy one.
pub fn compute_semester_aggregate(per_subject: &[SubjectStats]) -> SemesterAggregate {
    let total_subjects = per_subject.len();
    let average_attendance = if total_subjects > 0 {
        let sum: f64 = per_subject.iter().map(|s| s.attendance_pct).sum();
        round_2dp(sum / total_subjects as f64)
    } else {
        0.0
    };

    SemesterAggregate {
        total_subjects,
        total_classes: per_subject.iter().map(|s| s.total_classes).sum(),
        total_attended: per_subject.iter().map(|s| s.attended_classes).sum(),
        total_absent: per_subject.iter().map(|s| s.absent_classes).sum(),
        average_attendance,
        subjects_at_risk: per_subject
            .iter()
            .filter(|s| s.risk_tier.is_at_risk())
            .count(),
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct TrendPoint {
    pub date: NaiveDate,
    pub attendance_pct: f64,
    pub status: AttendanceStatus,
}

/// Running attendance after each class, computed on demand. A clone resumes
/// from the same position; call `compute_trend` again to replay from the start.
#[derive(Debug, Clone)]
pub struct Trend<'a> {
    classes: std::slice::Iter<'a, ClassRecord>,
    attended: usize,
    total: usize,
}

impl Iterator for Trend<'_> {
    type Item = TrendPoint;

    fn next(&mut self) -> Option<TrendPoint> {
        let class = self.classes.next()?;
        self.total += 1;
        if class.status.is_attended() {
            self.attended += 1;
        }
        Some(TrendPoint {
            date: class.date,
            attendance_pct: round_2dp(percentage(self.attended, self.total)),
            status: class.status,
        })
    }

    fn size_hint(&self) -> (usize, Option<usize>) {
        self.classes.size_hint()
    }
}

impl ExactSizeIterator for Trend<'_> {}

/// Expects `classes` sorted by date ascending.
pub fn compute_trend(classes: &[ClassRecord]) -> Trend<'_> {
    Trend {
        classes: classes.iter(),
        attended: 0,
        total: 0,
    }
}
