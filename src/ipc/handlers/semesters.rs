use crate::db::{self, semester_from_row, SEMESTER_COLUMNS};
use crate::ipc::error::HandlerErr;
use crate::ipc::helpers::{
    get_optional_date, get_optional_percentage, get_optional_str, get_required_date,
    get_required_name, get_required_str, new_id, require_row, with_conn, with_fields,
};
use crate::ipc::types::{AppState, Request};
use crate::model::{Semester, DEFAULT_OWNER_ID, DEFAULT_REQUIRED_PERCENTAGE};
use chrono::NaiveDate;
use rusqlite::{Connection, OptionalExtension};
use serde_json::json;
use tracing::debug;

fn check_range(start: NaiveDate, end: NaiveDate) -> Result<(), HandlerErr> {
    if end < start {
        return Err(HandlerErr::bad_params("endDate must not be before startDate"));
    }
    Ok(())
}

/// Reads a semester definition (`name`, `startDate`, `endDate`, optional
/// `requiredPercentage` and `ownerId`) and stores it.
pub(crate) fn insert_semester(
    conn: &Connection,
    params: &serde_json::Value,
) -> Result<Semester, HandlerErr> {
    let name = get_required_name(params, "name")?;
    let start_date = get_required_date(params, "startDate")?;
    let end_date = get_required_date(params, "endDate")?;
    check_range(start_date, end_date)?;
    let required_percentage =
        get_optional_percentage(params, "requiredPercentage")?.unwrap_or(DEFAULT_REQUIRED_PERCENTAGE);
    let owner_id = get_optional_str(params, "ownerId")?
        .filter(|s| !s.is_empty())
        .unwrap_or_else(|| DEFAULT_OWNER_ID.to_string());

    let semester = Semester {
        id: new_id(),
        name,
        start_date,
        end_date,
        required_percentage,
        owner_id,
    };
    conn.execute(
        "INSERT INTO semesters(id, name, start_date, end_date, required_percentage, owner_id)
         VALUES(?, ?, ?, ?, ?, ?)",
        (
            &semester.id,
            &semester.name,
            semester.start_date.to_string(),
            semester.end_date.to_string(),
            semester.required_percentage,
            &semester.owner_id,
        ),
    )
    .map_err(|e| HandlerErr::db("db_insert_failed", e, Some("semesters")))?;
    debug!(semester_id = %semester.id, "semester created");
    Ok(semester)
}

pub(crate) fn load_semester(conn: &Connection, semester_id: &str) -> Result<Semester, HandlerErr> {
    let sql = format!("SELECT {SEMESTER_COLUMNS} FROM semesters WHERE id = ?");
    conn.query_row(&sql, [semester_id], semester_from_row)
        .optional()
        .map_err(|e| HandlerErr::db("db_query_failed", e, Some("semesters")))?
        .ok_or_else(|| HandlerErr::not_found("semester"))
}

fn owner_param(params: &serde_json::Value) -> Result<String, HandlerErr> {
    Ok(get_optional_str(params, "ownerId")?
        .filter(|s| !s.is_empty())
        .unwrap_or_else(|| DEFAULT_OWNER_ID.to_string()))
}

fn semesters_list(
    conn: &Connection,
    params: &serde_json::Value,
) -> Result<serde_json::Value, HandlerErr> {
    let owner_id = owner_param(params)?;
    let sql = format!(
        "SELECT {SEMESTER_COLUMNS} FROM semesters WHERE owner_id = ? ORDER BY start_date DESC"
    );
    let mut stmt = conn
        .prepare(&sql)
        .map_err(|e| HandlerErr::db("db_query_failed", e, Some("semesters")))?;
    let semesters = stmt
        .query_map([&owner_id], semester_from_row)
        .and_then(|it| it.collect::<Result<Vec<_>, _>>())
        .map_err(|e| HandlerErr::db("db_query_failed", e, Some("semesters")))?;

    let mut out = Vec::with_capacity(semesters.len());
    for semester in &semesters {
        let subjects = db::semester_subjects(conn, &semester.id)
            .map_err(|e| HandlerErr::db("db_query_failed", e, Some("subjects")))?;
        let holidays = db::semester_holidays(conn, &semester.id)
            .map_err(|e| HandlerErr::db("db_query_failed", e, Some("holidays")))?;
        out.push(with_fields(
            semester,
            vec![("subjects", json!(subjects)), ("holidays", json!(holidays))],
        ));
    }
    Ok(json!({ "semesters": out }))
}

fn semesters_current(
    conn: &Connection,
    params: &serde_json::Value,
) -> Result<serde_json::Value, HandlerErr> {
    let owner_id = owner_param(params)?;
    let today = get_optional_date(params, "today")?
        .unwrap_or_else(|| chrono::Local::now().date_naive());
    let sql = format!(
        "SELECT {SEMESTER_COLUMNS} FROM semesters
         WHERE owner_id = ? AND start_date <= ? AND end_date >= ?
         ORDER BY start_date DESC
         LIMIT 1"
    );
    let day = today.to_string();
    let semester = conn
        .query_row(&sql, (&owner_id, &day, &day), semester_from_row)
        .optional()
        .map_err(|e| HandlerErr::db("db_query_failed", e, Some("semesters")))?;
    let Some(semester) = semester else {
        return Ok(json!({ "semester": null }));
    };

    let subjects = db::semester_subjects(conn, &semester.id)
        .map_err(|e| HandlerErr::db("db_query_failed", e, Some("subjects")))?;
    let mut subjects_json = Vec::with_capacity(subjects.len());
    for subject in &subjects {
        let classes = db::subject_classes(conn, &subject.id)
            .map_err(|e| HandlerErr::db("db_query_failed", e, Some("classes")))?;
        subjects_json.push(with_fields(subject, vec![("classes", json!(classes))]));
    }
    let holidays = db::semester_holidays(conn, &semester.id)
        .map_err(|e| HandlerErr::db("db_query_failed", e, Some("holidays")))?;

    Ok(json!({
        "semester": with_fields(
            &semester,
            vec![("subjects", json!(subjects_json)), ("holidays", json!(holidays))],
        )
    }))
}

fn semesters_create(
    conn: &Connection,
    params: &serde_json::Value,
) -> Result<serde_json::Value, HandlerErr> {
    let semester = insert_semester(conn, params)?;
    Ok(json!({ "semester": semester }))
}

fn semesters_update(
    conn: &Connection,
    params: &serde_json::Value,
) -> Result<serde_json::Value, HandlerErr> {
    let semester_id = get_required_str(params, "semesterId")?;
    let mut semester = load_semester(conn, &semester_id)?;

    if let Some(name) = get_optional_str(params, "name")? {
        if name.is_empty() {
            return Err(HandlerErr::bad_params("name must not be empty"));
        }
        semester.name = name;
    }
    if let Some(d) = get_optional_date(params, "startDate")? {
        semester.start_date = d;
    }
    if let Some(d) = get_optional_date(params, "endDate")? {
        semester.end_date = d;
    }
    check_range(semester.start_date, semester.end_date)?;
    if let Some(p) = get_optional_percentage(params, "requiredPercentage")? {
        semester.required_percentage = p;
    }

    conn.execute(
        "UPDATE semesters
         SET name = ?, start_date = ?, end_date = ?, required_percentage = ?
         WHERE id = ?",
        (
            &semester.name,
            semester.start_date.to_string(),
            semester.end_date.to_string(),
            semester.required_percentage,
            &semester.id,
        ),
    )
    .map_err(|e| HandlerErr::db("db_update_failed", e, Some("semesters")))?;
    Ok(json!({ "semester": semester }))
}

fn semesters_delete(
    conn: &Connection,
    params: &serde_json::Value,
) -> Result<serde_json::Value, HandlerErr> {
    let semester_id = get_required_str(params, "semesterId")?;
    require_row(conn, "semesters", &semester_id, "semester")?;

    let tx = conn
        .unchecked_transaction()
        .map_err(|e| HandlerErr::db("db_tx_failed", e, None))?;

    // Explicit dependency order; the schema has no ON DELETE CASCADE.
    let steps = [
        (
            "classes",
            "DELETE FROM classes
             WHERE subject_id IN (SELECT id FROM subjects WHERE semester_id = ?)",
        ),
        ("subjects", "DELETE FROM subjects WHERE semester_id = ?"),
        ("holidays", "DELETE FROM holidays WHERE semester_id = ?"),
        ("semesters", "DELETE FROM semesters WHERE id = ?"),
    ];
    for (table, sql) in steps {
        tx.execute(sql, [&semester_id])
            .map_err(|e| HandlerErr::db("db_delete_failed", e, Some(table)))?;
    }

    tx.commit()
        .map_err(|e| HandlerErr::db("db_commit_failed", e, None))?;
    debug!(semester_id = %semester_id, "semester deleted");
    Ok(json!({ "ok": true }))
}

pub fn try_handle(state: &mut AppState, req: &Request) -> Option<serde_json::Value> {
    match req.method.as_str() {
        "semesters.list" => Some(with_conn(state, req, semesters_list)),
        "semesters.current" => Some(with_conn(state, req, semesters_current)),
        "semesters.create" => Some(with_conn(state, req, semesters_create)),
        "semesters.update" => Some(with_conn(state, req, semesters_update)),
        "semesters.delete" => Some(with_conn(state, req, semesters_delete)),
        _ => None,
    }
}
