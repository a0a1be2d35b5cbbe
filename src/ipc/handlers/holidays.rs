use crate::db;
use crate::ipc::error::HandlerErr;
use crate::ipc::helpers::{
    get_array, get_optional_str, get_required_date, get_required_name, get_required_str, new_id,
    require_row, with_conn,
};
use crate::ipc::types::{AppState, Request};
use crate::model::{Holiday, HolidayKind};
use rusqlite::Connection;
use serde_json::json;

fn insert_holiday(conn: &Connection, params: &serde_json::Value) -> Result<Holiday, HandlerErr> {
    let semester_id = get_required_str(params, "semesterId")?;
    require_row(conn, "semesters", &semester_id, "semester")?;
    let date = get_required_date(params, "date")?;
    let name = get_required_name(params, "name")?;
    let kind = match get_optional_str(params, "type")? {
        Some(raw) if !raw.is_empty() => raw
            .parse::<HolidayKind>()
            .map_err(|e| HandlerErr::bad_params(format!("type: {}", e)))?,
        _ => HolidayKind::Holiday,
    };

    let holiday = Holiday {
        id: new_id(),
        date,
        name,
        kind,
        semester_id,
    };
    conn.execute(
        "INSERT INTO holidays(id, semester_id, date, name, type) VALUES(?, ?, ?, ?, ?)",
        (
            &holiday.id,
            &holiday.semester_id,
            holiday.date.to_string(),
            &holiday.name,
            holiday.kind.as_str(),
        ),
    )
    .map_err(|e| HandlerErr::db("db_insert_failed", e, Some("holidays")))?;
    Ok(holiday)
}

fn holidays_list(
    conn: &Connection,
    params: &serde_json::Value,
) -> Result<serde_json::Value, HandlerErr> {
    let semester_id = get_required_str(params, "semesterId")?;
    let holidays = db::semester_holidays(conn, &semester_id)
        .map_err(|e| HandlerErr::db("db_query_failed", e, Some("holidays")))?;
    Ok(json!({ "holidays": holidays }))
}

fn holidays_create(
    conn: &Connection,
    params: &serde_json::Value,
) -> Result<serde_json::Value, HandlerErr> {
    let holiday = insert_holiday(conn, params)?;
    Ok(json!({ "holiday": holiday }))
}

fn holidays_bulk_create(
    conn: &Connection,
    params: &serde_json::Value,
) -> Result<serde_json::Value, HandlerErr> {
    let entries = get_array(params, "holidays")?;
    let tx = conn
        .unchecked_transaction()
        .map_err(|e| HandlerErr::db("db_tx_failed", e, None))?;
    let mut created = Vec::with_capacity(entries.len());
    for (i, entry) in entries.iter().enumerate() {
        let holiday =
            insert_holiday(&tx, entry).map_err(|e| e.with_details(json!({ "index": i })))?;
        created.push(holiday);
    }
    tx.commit()
        .map_err(|e| HandlerErr::db("db_commit_failed", e, None))?;
    Ok(json!({ "holidays": created }))
}

fn holidays_delete(
    conn: &Connection,
    params: &serde_json::Value,
) -> Result<serde_json::Value, HandlerErr> {
    let holiday_id = get_required_str(params, "holidayId")?;
    require_row(conn, "holidays", &holiday_id, "holiday")?;
    conn.execute("DELETE FROM holidays WHERE id = ?", [&holiday_id])
        .map_err(|e| HandlerErr::db("db_delete_failed", e, Some("holidays")))?;
    Ok(json!({ "ok": true }))
}

pub fn try_handle(state: &mut AppState, req: &Request) -> Option<serde_json::Value> {
    match req.method.as_str() {
        "holidays.list" => Some(with_conn(state, req, holidays_list)),
        "holidays.create" => Some(with_conn(state, req, holidays_create)),
        "holidays.bulkCreate" => Some(with_conn(state, req, holidays_bulk_create)),
        "holidays.delete" => Some(with_conn(state, req, holidays_delete)),
        _ => None,
    }
}
