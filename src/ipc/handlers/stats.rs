use crate::db;
use crate::ipc::error::HandlerErr;
use crate::ipc::handlers::semesters::load_semester;
use crate::ipc::handlers::subjects::load_subject;
use crate::ipc::helpers::{get_required_str, with_conn};
use crate::ipc::types::{AppState, Request};
use crate::stats::{compute_semester_aggregate, compute_subject_stats, compute_trend, SubjectStats};
use rusqlite::Connection;
use serde::Serialize;
use serde_json::json;

#[derive(Debug, Serialize)]
#[serde(rename_all = "camelCase")]
struct SubjectStatsRow {
    subject_id: String,
    subject_name: String,
    subject_code: String,
    required: f64,
    #[serde(flatten)]
    stats: SubjectStats,
}

fn stats_semester(
    conn: &Connection,
    params: &serde_json::Value,
) -> Result<serde_json::Value, HandlerErr> {
    let semester_id = get_required_str(params, "semesterId")?;
    load_semester(conn, &semester_id)?;
    let subjects = db::semester_subjects(conn, &semester_id)
        .map_err(|e| HandlerErr::db("db_query_failed", e, Some("subjects")))?;

    let mut rows = Vec::with_capacity(subjects.len());
    for subject in subjects {
        let classes = db::subject_classes(conn, &subject.id)
            .map_err(|e| HandlerErr::db("db_query_failed", e, Some("classes")))?;
        rows.push(SubjectStatsRow {
            stats: compute_subject_stats(&classes, subject.required_percentage),
            required: subject.required_percentage,
            subject_id: subject.id,
            subject_name: subject.name,
            subject_code: subject.code,
        });
    }
    let per_subject: Vec<SubjectStats> = rows.iter().map(|r| r.stats).collect();
    let overall = compute_semester_aggregate(&per_subject);

    Ok(json!({
        "overall": overall,
        "subjects": rows,
    }))
}

fn stats_subject_trend(
    conn: &Connection,
    params: &serde_json::Value,
) -> Result<serde_json::Value, HandlerErr> {
    let subject_id = get_required_str(params, "subjectId")?;
    let subject = load_subject(conn, &subject_id)?;
    let classes = db::subject_classes(conn, &subject.id)
        .map_err(|e| HandlerErr::db("db_query_failed", e, Some("classes")))?;
    let trend: Vec<_> = compute_trend(&classes).collect();
    Ok(json!({ "subjectId": subject.id, "trend": trend }))
}

pub fn try_handle(state: &mut AppState, req: &Request) -> Option<serde_json::Value> {
    match req.method.as_str() {
        "stats.semester" => Some(with_conn(state, req, stats_semester)),
        "stats.subjectTrend" => Some(with_conn(state, req, stats_subject_trend)),
        _ => None,
    }
}
