use crate::db::{class_from_row, subject_from_row_at, CLASS_COLUMNS};
use crate::ipc::error::HandlerErr;
use crate::ipc::helpers::{
    get_array, get_optional_date, get_optional_status, get_optional_str, get_required_date,
    get_required_str, new_id, parse_status, parse_time, require_row, with_conn, with_fields,
};
use crate::ipc::types::{AppState, Request};
use crate::model::{weekday_name, AttendanceStatus, ClassRecord, NewClass};
use rusqlite::types::Value;
use rusqlite::{params_from_iter, Connection, OptionalExtension};
use serde_json::json;
use tracing::debug;

pub(crate) fn store_class(conn: &Connection, class: &NewClass) -> Result<ClassRecord, HandlerErr> {
    let record = ClassRecord {
        id: new_id(),
        subject_id: class.subject_id.clone(),
        date: class.date,
        day_of_week: class.day_of_week.clone(),
        start_time: class.start_time.clone(),
        end_time: class.end_time.clone(),
        status: class.status,
        notes: class.notes.clone(),
    };
    conn.execute(
        "INSERT INTO classes(id, subject_id, date, day_of_week, start_time, end_time, status, notes)
         VALUES(?, ?, ?, ?, ?, ?, ?, ?)",
        (
            &record.id,
            &record.subject_id,
            record.date.to_string(),
            &record.day_of_week,
            &record.start_time,
            &record.end_time,
            record.status.as_str(),
            &record.notes,
        ),
    )
    .map_err(|e| HandlerErr::db("db_insert_failed", e, Some("classes")))?;
    Ok(record)
}

/// Reads `subjectId`, `date`, `startTime`, `endTime` and optional
/// `dayOfWeek` (derived from the date when absent), `status`, `notes`.
fn parse_new_class(conn: &Connection, params: &serde_json::Value) -> Result<NewClass, HandlerErr> {
    let subject_id = get_required_str(params, "subjectId")?;
    require_row(conn, "subjects", &subject_id, "subject")?;
    let date = get_required_date(params, "date")?;
    let start_time = parse_time(&get_required_str(params, "startTime")?, "startTime")?;
    let end_time = parse_time(&get_required_str(params, "endTime")?, "endTime")?;
    let day_of_week = get_optional_str(params, "dayOfWeek")?
        .filter(|s| !s.is_empty())
        .unwrap_or_else(|| weekday_name(date).to_string());
    let status = get_optional_status(params, "status")?.unwrap_or(AttendanceStatus::Scheduled);
    let notes = get_optional_str(params, "notes")?;
    Ok(NewClass {
        subject_id,
        date,
        day_of_week,
        start_time,
        end_time,
        status,
        notes,
    })
}

pub(crate) fn load_class(conn: &Connection, class_id: &str) -> Result<ClassRecord, HandlerErr> {
    let sql = format!("SELECT {CLASS_COLUMNS} FROM classes WHERE id = ?");
    conn.query_row(&sql, [class_id], class_from_row)
        .optional()
        .map_err(|e| HandlerErr::db("db_query_failed", e, Some("classes")))?
        .ok_or_else(|| HandlerErr::not_found("class"))
}

/// Sets the status of one class; blank or missing notes leave the old ones.
fn set_attendance(
    conn: &Connection,
    class_id: &str,
    status: AttendanceStatus,
    notes: Option<String>,
) -> Result<ClassRecord, HandlerErr> {
    let mut class = load_class(conn, class_id)?;
    class.status = status;
    if let Some(n) = notes.filter(|n| !n.is_empty()) {
        class.notes = Some(n);
    }
    conn.execute(
        "UPDATE classes SET status = ?, notes = ? WHERE id = ?",
        (class.status.as_str(), &class.notes, &class.id),
    )
    .map_err(|e| HandlerErr::db("db_update_failed", e, Some("classes")))?;
    Ok(class)
}

fn classes_list(
    conn: &Connection,
    params: &serde_json::Value,
) -> Result<serde_json::Value, HandlerErr> {
    let subject_id = get_required_str(params, "subjectId")?;
    let start_date = get_optional_date(params, "startDate")?;
    let end_date = get_optional_date(params, "endDate")?;

    let mut sql = format!("SELECT {CLASS_COLUMNS} FROM classes WHERE subject_id = ?");
    let mut bind: Vec<Value> = vec![Value::Text(subject_id)];
    if let Some(d) = start_date {
        sql.push_str(" AND date >= ?");
        bind.push(Value::Text(d.to_string()));
    }
    if let Some(d) = end_date {
        sql.push_str(" AND date <= ?");
        bind.push(Value::Text(d.to_string()));
    }
    sql.push_str(" ORDER BY date, start_time");

    let mut stmt = conn
        .prepare(&sql)
        .map_err(|e| HandlerErr::db("db_query_failed", e, Some("classes")))?;
    let classes = stmt
        .query_map(params_from_iter(bind), class_from_row)
        .and_then(|it| it.collect::<Result<Vec<_>, _>>())
        .map_err(|e| HandlerErr::db("db_query_failed", e, Some("classes")))?;
    Ok(json!({ "classes": classes }))
}

fn classes_for_date(
    conn: &Connection,
    params: &serde_json::Value,
) -> Result<serde_json::Value, HandlerErr> {
    let date = get_required_date(params, "date")?;
    let semester_id = get_required_str(params, "semesterId")?;

    let mut stmt = conn
        .prepare(
            "SELECT c.id, c.subject_id, c.date, c.day_of_week, c.start_time, c.end_time, c.status, c.notes,
                    s.id, s.name, s.code, s.teacher, s.required_percentage, s.semester_id
             FROM classes c
             JOIN subjects s ON s.id = c.subject_id
             WHERE c.date = ? AND s.semester_id = ?
             ORDER BY c.start_time",
        )
        .map_err(|e| HandlerErr::db("db_query_failed", e, Some("classes")))?;
    let rows = stmt
        .query_map((date.to_string(), &semester_id), |r| {
            let class = class_from_row(r)?;
            let subject = subject_from_row_at(r, 8)?;
            Ok(with_fields(&class, vec![("subject", json!(subject))]))
        })
        .and_then(|it| it.collect::<Result<Vec<_>, _>>())
        .map_err(|e| HandlerErr::db("db_query_failed", e, Some("classes")))?;
    Ok(json!({ "classes": rows }))
}

fn classes_mark_attendance(
    conn: &Connection,
    params: &serde_json::Value,
) -> Result<serde_json::Value, HandlerErr> {
    let class_id = get_required_str(params, "classId")?;
    let status = parse_status(&get_required_str(params, "status")?)?;
    let notes = get_optional_str(params, "notes")?;
    let class = set_attendance(conn, &class_id, status, notes)?;
    debug!(class_id = %class.id, status = %class.status, "attendance marked");
    Ok(json!({ "class": class }))
}

fn classes_bulk_attendance(
    conn: &Connection,
    params: &serde_json::Value,
) -> Result<serde_json::Value, HandlerErr> {
    let updates = get_array(params, "updates")?;

    let tx = conn
        .unchecked_transaction()
        .map_err(|e| HandlerErr::db("db_tx_failed", e, None))?;
    let mut updated = Vec::with_capacity(updates.len());
    for (i, update) in updates.iter().enumerate() {
        let result = get_required_str(update, "id").and_then(|id| {
            let status = parse_status(&get_required_str(update, "status")?)?;
            let notes = get_optional_str(update, "notes")?;
            set_attendance(&tx, &id, status, notes)
        });
        let class = result.map_err(|e| e.with_details(json!({ "index": i })))?;
        updated.push(class);
    }
    tx.commit()
        .map_err(|e| HandlerErr::db("db_commit_failed", e, None))?;
    debug!(count = updated.len(), "bulk attendance applied");
    Ok(json!({ "updated": updated.len(), "classes": updated }))
}

fn classes_create(
    conn: &Connection,
    params: &serde_json::Value,
) -> Result<serde_json::Value, HandlerErr> {
    let new_class = parse_new_class(conn, params)?;
    let class = store_class(conn, &new_class)?;
    Ok(json!({ "class": class }))
}

fn classes_bulk_create(
    conn: &Connection,
    params: &serde_json::Value,
) -> Result<serde_json::Value, HandlerErr> {
    let entries = get_array(params, "classes")?;

    let tx = conn
        .unchecked_transaction()
        .map_err(|e| HandlerErr::db("db_tx_failed", e, None))?;
    let mut created = Vec::with_capacity(entries.len());
    for (i, entry) in entries.iter().enumerate() {
        let class = parse_new_class(&tx, entry)
            .and_then(|c| store_class(&tx, &c))
            .map_err(|e| e.with_details(json!({ "index": i })))?;
        created.push(class);
    }
    tx.commit()
        .map_err(|e| HandlerErr::db("db_commit_failed", e, None))?;
    debug!(count = created.len(), "classes bulk created");
    Ok(json!({ "classes": created }))
}

fn classes_update(
    conn: &Connection,
    params: &serde_json::Value,
) -> Result<serde_json::Value, HandlerErr> {
    let class_id = get_required_str(params, "classId")?;
    let mut class = load_class(conn, &class_id)?;

    if let Some(d) = get_optional_date(params, "date")? {
        class.date = d;
    }
    if let Some(day) = get_optional_str(params, "dayOfWeek")?.filter(|s| !s.is_empty()) {
        class.day_of_week = day;
    }
    if let Some(t) = get_optional_str(params, "startTime")? {
        class.start_time = parse_time(&t, "startTime")?;
    }
    if let Some(t) = get_optional_str(params, "endTime")? {
        class.end_time = parse_time(&t, "endTime")?;
    }
    if let Some(status) = get_optional_status(params, "status")? {
        class.status = status;
    }
    // Present-but-null notes clear them; absent notes keep them.
    if params.get("notes").is_some() {
        class.notes = get_optional_str(params, "notes")?;
    }

    conn.execute(
        "UPDATE classes
         SET date = ?, day_of_week = ?, start_time = ?, end_time = ?, status = ?, notes = ?
         WHERE id = ?",
        (
            class.date.to_string(),
            &class.day_of_week,
            &class.start_time,
            &class.end_time,
            class.status.as_str(),
            &class.notes,
            &class.id,
        ),
    )
    .map_err(|e| HandlerErr::db("db_update_failed", e, Some("classes")))?;
    Ok(json!({ "class": class }))
}

fn classes_delete(
    conn: &Connection,
    params: &serde_json::Value,
) -> Result<serde_json::Value, HandlerErr> {
    let class_id = get_required_str(params, "classId")?;
    require_row(conn, "classes", &class_id, "class")?;
    conn.execute("DELETE FROM classes WHERE id = ?", [&class_id])
        .map_err(|e| HandlerErr::db("db_delete_failed", e, Some("classes")))?;
    Ok(json!({ "ok": true }))
}

pub fn try_handle(state: &mut AppState, req: &Request) -> Option<serde_json::Value> {
    match req.method.as_str() {
        "classes.list" => Some(with_conn(state, req, classes_list)),
        "classes.forDate" => Some(with_conn(state, req, classes_for_date)),
        "classes.markAttendance" => Some(with_conn(state, req, classes_mark_attendance)),
        "classes.bulkAttendance" => Some(with_conn(state, req, classes_bulk_attendance)),
        "classes.create" => Some(with_conn(state, req, classes_create)),
        "classes.bulkCreate" => Some(with_conn(state, req, classes_bulk_create)),
        "classes.update" => Some(with_conn(state, req, classes_update)),
        "classes.delete" => Some(with_conn(state, req, classes_delete)),
        _ => None,
    }
}
