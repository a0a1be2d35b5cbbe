use crate::db::{self, subject_from_row, SUBJECT_COLUMNS};
use crate::ipc::error::HandlerErr;
use crate::ipc::handlers::semesters::load_semester;
use crate::ipc::helpers::{
    get_array, get_optional_percentage, get_optional_str, get_required_name, get_required_str,
    new_id, require_row, with_conn, with_fields,
};
use crate::ipc::types::{AppState, Request};
use crate::model::{Subject, DEFAULT_REQUIRED_PERCENTAGE};
use crate::stats::compute_subject_stats;
use rusqlite::{Connection, OptionalExtension};
use serde_json::json;
use tracing::debug;

fn code_taken(
    conn: &Connection,
    semester_id: &str,
    code: &str,
    except_id: Option<&str>,
) -> Result<bool, HandlerErr> {
    conn.query_row(
        "SELECT id FROM subjects WHERE semester_id = ? AND code = ?",
        (semester_id, code),
        |r| r.get::<_, String>(0),
    )
    .optional()
    .map(|found| match (found, except_id) {
        (Some(id), Some(except)) => id != except,
        (Some(_), None) => true,
        (None, _) => false,
    })
    .map_err(|e| HandlerErr::db("db_query_failed", e, Some("subjects")))
}

fn conflict(code: &str) -> HandlerErr {
    HandlerErr::new("conflict", "subject code already exists in this semester")
        .with_details(json!({ "code": code }))
}

/// Stores one subject read from `draft` (`name`, `code`, optional `teacher`
/// and `requiredPercentage`). The caller has checked the semester exists.
pub(crate) fn insert_subject(
    conn: &Connection,
    semester_id: &str,
    draft: &serde_json::Value,
) -> Result<Subject, HandlerErr> {
    let name = get_required_name(draft, "name")?;
    let code = get_required_name(draft, "code")?;
    let teacher = get_optional_str(draft, "teacher")?.unwrap_or_default();
    let required_percentage = get_optional_percentage(draft, "requiredPercentage")?
        .unwrap_or(DEFAULT_REQUIRED_PERCENTAGE);

    if code_taken(conn, semester_id, &code, None)? {
        return Err(conflict(&code));
    }

    let subject = Subject {
        id: new_id(),
        name,
        code,
        teacher,
        required_percentage,
        semester_id: semester_id.to_string(),
    };
    conn.execute(
        "INSERT INTO subjects(id, semester_id, name, code, teacher, required_percentage)
         VALUES(?, ?, ?, ?, ?, ?)",
        (
            &subject.id,
            &subject.semester_id,
            &subject.name,
            &subject.code,
            &subject.teacher,
            subject.required_percentage,
        ),
    )
    .map_err(|e| HandlerErr::db("db_insert_failed", e, Some("subjects")))?;
    Ok(subject)
}

pub(crate) fn load_subject(conn: &Connection, subject_id: &str) -> Result<Subject, HandlerErr> {
    let sql = format!("SELECT {SUBJECT_COLUMNS} FROM subjects WHERE id = ?");
    conn.query_row(&sql, [subject_id], subject_from_row)
        .optional()
        .map_err(|e| HandlerErr::db("db_query_failed", e, Some("subjects")))?
        .ok_or_else(|| HandlerErr::not_found("subject"))
}

fn subjects_list(
    conn: &Connection,
    params: &serde_json::Value,
) -> Result<serde_json::Value, HandlerErr> {
    let semester_id = get_required_str(params, "semesterId")?;
    let subjects = db::semester_subjects(conn, &semester_id)
        .map_err(|e| HandlerErr::db("db_query_failed", e, Some("subjects")))?;
    let mut out = Vec::with_capacity(subjects.len());
    for subject in &subjects {
        let classes = db::subject_classes(conn, &subject.id)
            .map_err(|e| HandlerErr::db("db_query_failed", e, Some("classes")))?;
        out.push(with_fields(subject, vec![("classes", json!(classes))]));
    }
    Ok(json!({ "subjects": out }))
}

fn subjects_get(
    conn: &Connection,
    params: &serde_json::Value,
) -> Result<serde_json::Value, HandlerErr> {
    let subject_id = get_required_str(params, "subjectId")?;
    let subject = load_subject(conn, &subject_id)?;
    let semester = load_semester(conn, &subject.semester_id)?;
    let classes = db::subject_classes(conn, &subject.id)
        .map_err(|e| HandlerErr::db("db_query_failed", e, Some("classes")))?;
    let stats = compute_subject_stats(&classes, subject.required_percentage);

    Ok(json!({
        "subject": with_fields(
            &subject,
            vec![
                ("classes", json!(classes)),
                ("semester", json!(semester)),
                ("stats", json!(stats)),
            ],
        )
    }))
}

fn subjects_create(
    conn: &Connection,
    params: &serde_json::Value,
) -> Result<serde_json::Value, HandlerErr> {
    let semester_id = get_required_str(params, "semesterId")?;
    require_row(conn, "semesters", &semester_id, "semester")?;
    let subject = insert_subject(conn, &semester_id, params)?;
    debug!(subject_id = %subject.id, code = %subject.code, "subject created");
    Ok(json!({ "subject": subject }))
}

fn subjects_bulk_create(
    conn: &Connection,
    params: &serde_json::Value,
) -> Result<serde_json::Value, HandlerErr> {
    let semester_id = get_required_str(params, "semesterId")?;
    let drafts = get_array(params, "subjects")?;
    require_row(conn, "semesters", &semester_id, "semester")?;

    let tx = conn
        .unchecked_transaction()
        .map_err(|e| HandlerErr::db("db_tx_failed", e, None))?;
    let mut created = Vec::with_capacity(drafts.len());
    for (i, draft) in drafts.iter().enumerate() {
        let subject = insert_subject(&tx, &semester_id, draft)
            .map_err(|e| e.with_details(json!({ "index": i })))?;
        created.push(subject);
    }
    tx.commit()
        .map_err(|e| HandlerErr::db("db_commit_failed", e, None))?;
    debug!(count = created.len(), "subjects bulk created");
    Ok(json!({ "subjects": created }))
}

fn subjects_update(
    conn: &Connection,
    params: &serde_json::Value,
) -> Result<serde_json::Value, HandlerErr> {
    let subject_id = get_required_str(params, "subjectId")?;
    let mut subject = load_subject(conn, &subject_id)?;

    if let Some(name) = get_optional_str(params, "name")? {
        if name.is_empty() {
            return Err(HandlerErr::bad_params("name must not be empty"));
        }
        subject.name = name;
    }
    if let Some(code) = get_optional_str(params, "code")? {
        if code.is_empty() {
            return Err(HandlerErr::bad_params("code must not be empty"));
        }
        if code_taken(conn, &subject.semester_id, &code, Some(&subject.id))? {
            return Err(conflict(&code));
        }
        subject.code = code;
    }
    if let Some(teacher) = get_optional_str(params, "teacher")? {
        subject.teacher = teacher;
    }
    if let Some(p) = get_optional_percentage(params, "requiredPercentage")? {
        subject.required_percentage = p;
    }

    conn.execute(
        "UPDATE subjects
         SET name = ?, code = ?, teacher = ?, required_percentage = ?
         WHERE id = ?",
        (
            &subject.name,
            &subject.code,
            &subject.teacher,
            subject.required_percentage,
            &subject.id,
        ),
    )
    .map_err(|e| HandlerErr::db("db_update_failed", e, Some("subjects")))?;
    Ok(json!({ "subject": subject }))
}

fn subjects_delete(
    conn: &Connection,
    params: &serde_json::Value,
) -> Result<serde_json::Value, HandlerErr> {
    let subject_id = get_required_str(params, "subjectId")?;
    require_row(conn, "subjects", &subject_id, "subject")?;

    let tx = conn
        .unchecked_transaction()
        .map_err(|e| HandlerErr::db("db_tx_failed", e, None))?;
    tx.execute("DELETE FROM classes WHERE subject_id = ?", [&subject_id])
        .map_err(|e| HandlerErr::db("db_delete_failed", e, Some("classes")))?;
    tx.execute("DELETE FROM subjects WHERE id = ?", [&subject_id])
        .map_err(|e| HandlerErr::db("db_delete_failed", e, Some("subjects")))?;
    tx.commit()
        .map_err(|e| HandlerErr::db("db_commit_failed", e, None))?;
    Ok(json!({ "ok": true }))
}

pub fn try_handle(state: &mut AppState, req: &Request) -> Option<serde_json::Value> {
    match req.method.as_str() {
        "subjects.list" => Some(with_conn(state, req, subjects_list)),
        "subjects.get" => Some(with_conn(state, req, subjects_get)),
        "subjects.create" => Some(with_conn(state, req, subjects_create)),
        "subjects.bulkCreate" => Some(with_conn(state, req, subjects_bulk_create)),
        "subjects.update" => Some(with_conn(state, req, subjects_update)),
        "subjects.delete" => Some(with_conn(state, req, subjects_delete)),
        _ => None,
    }
}
