use chrono::{NaiveDate, NaiveTime};
use rusqlite::{Connection, OptionalExtension};
use serde::de::DeserializeOwned;
use tracing::warn;

use crate::ipc::error::{ok, HandlerErr};
use crate::ipc::types::{AppState, Request};
use crate::model::AttendanceStatus;

pub fn new_id() -> String {
    uuid::Uuid::new_v4().to_string()
}

/// Runs `f` against the open workspace and wraps the outcome in a reply.
pub fn with_conn<F>(state: &mut AppState, req: &Request, f: F) -> serde_json::Value
where
    F: FnOnce(&Connection, &serde_json::Value) -> Result<serde_json::Value, HandlerErr>,
{
    let Some(conn) = state.db.as_ref() else {
        return HandlerErr::new("no_workspace", "select a workspace first").response(&req.id);
    };
    reply(req, f(conn, &req.params))
}

pub fn reply(req: &Request, outcome: Result<serde_json::Value, HandlerErr>) -> serde_json::Value {
    match outcome {
        Ok(result) => ok(&req.id, result),
        Err(error) => {
            warn!(method = %req.method, code = error.code, message = %error.message, "request failed");
            error.response(&req.id)
        }
    }
}

pub fn get_required_str(params: &serde_json::Value, key: &str) -> Result<String, HandlerErr> {
    let value = get_optional_str(params, key)?
        .ok_or_else(|| HandlerErr::bad_params(format!("missing {}", key)))?;
    Ok(value)
}

/// Absent and `null` are both "not given"; anything else must be a string.
pub fn get_optional_str(
    params: &serde_json::Value,
    key: &str,
) -> Result<Option<String>, HandlerErr> {
    match params.get(key) {
        None => Ok(None),
        Some(v) if v.is_null() => Ok(None),
        Some(v) => v
            .as_str()
            .map(|s| Some(s.trim().to_string()))
            .ok_or_else(|| HandlerErr::bad_params(format!("{} must be a string", key))),
    }
}

pub fn get_required_name(params: &serde_json::Value, key: &str) -> Result<String, HandlerErr> {
    let value = get_required_str(params, key)?;
    if value.is_empty() {
        return Err(HandlerErr::bad_params(format!("{} must not be empty", key)));
    }
    Ok(value)
}

pub fn parse_date(raw: &str, key: &str) -> Result<NaiveDate, HandlerErr> {
    // Accept full timestamps from shells that serialize Date objects.
    let day = match raw.as_bytes().get(10) {
        Some(b'T' | b' ') => &raw[..10],
        _ => raw,
    };
    NaiveDate::parse_from_str(day, "%Y-%m-%d")
        .map_err(|_| HandlerErr::bad_params(format!("{} must be YYYY-MM-DD", key)))
}

pub fn get_required_date(params: &serde_json::Value, key: &str) -> Result<NaiveDate, HandlerErr> {
    parse_date(&get_required_str(params, key)?, key)
}

pub fn get_optional_date(
    params: &serde_json::Value,
    key: &str,
) -> Result<Option<NaiveDate>, HandlerErr> {
    get_optional_str(params, key)?
        .map(|raw| parse_date(&raw, key))
        .transpose()
}

pub fn parse_time(raw: &str, key: &str) -> Result<String, HandlerErr> {
    NaiveTime::parse_from_str(raw.trim(), "%H:%M")
        .map(|t| t.format("%H:%M").to_string())
        .map_err(|_| HandlerErr::bad_params(format!("{} must be HH:MM", key)))
}

pub fn parse_status(raw: &str) -> Result<AttendanceStatus, HandlerErr> {
    raw.parse::<AttendanceStatus>()
        .map_err(|e| HandlerErr::bad_params(format!("status: {}", e)))
}

pub fn get_optional_status(
    params: &serde_json::Value,
    key: &str,
) -> Result<Option<AttendanceStatus>, HandlerErr> {
    get_optional_str(params, key)?
        .map(|raw| parse_status(&raw))
        .transpose()
}

/// Percentages live in `[0, 100]`.
pub fn get_optional_percentage(
    params: &serde_json::Value,
    key: &str,
) -> Result<Option<f64>, HandlerErr> {
    let Some(v) = params.get(key) else {
        return Ok(None);
    };
    if v.is_null() {
        return Ok(None);
    }
    let Some(n) = v.as_f64() else {
        return Err(HandlerErr::bad_params(format!("{} must be a number", key)));
    };
    if !(0.0..=100.0).contains(&n) {
        return Err(HandlerErr::bad_params(format!(
            "{} must be between 0 and 100",
            key
        )));
    }
    Ok(Some(n))
}

pub fn get_array<'a>(
    params: &'a serde_json::Value,
    key: &str,
) -> Result<&'a Vec<serde_json::Value>, HandlerErr> {
    params
        .get(key)
        .and_then(|v| v.as_array())
        .ok_or_else(|| HandlerErr::bad_params(format!("missing {}", key)))
}

pub fn get_typed<T: DeserializeOwned>(
    params: &serde_json::Value,
    key: &str,
) -> Result<Option<T>, HandlerErr> {
    match params.get(key) {
        None => Ok(None),
        Some(v) if v.is_null() => Ok(None),
        Some(v) => serde_json::from_value(v.clone())
            .map(Some)
            .map_err(|e| HandlerErr::bad_params(format!("{}: {}", key, e))),
    }
}

pub fn row_exists(conn: &Connection, table: &str, id: &str) -> Result<bool, HandlerErr> {
    let sql = format!("SELECT 1 FROM {} WHERE id = ?", table);
    conn.query_row(&sql, [id], |r| r.get::<_, i64>(0))
        .optional()
        .map(|v| v.is_some())
        .map_err(|e| HandlerErr::db("db_query_failed", e, Some(table)))
}

pub fn require_row(conn: &Connection, table: &str, id: &str, what: &str) -> Result<(), HandlerErr> {
    if row_exists(conn, table, id)? {
        Ok(())
    } else {
        Err(HandlerErr::not_found(what))
    }
}

/// Serializes `record` and adds the extra keys alongside its own fields.
pub fn with_fields<T: serde::Serialize>(
    record: &T,
    extra: Vec<(&str, serde_json::Value)>,
) -> serde_json::Value {
    let mut value = serde_json::to_value(record).unwrap_or(serde_json::Value::Null);
    if let Some(obj) = value.as_object_mut() {
        for (k, v) in extra {
            obj.insert(k.to_string(), v);
        }
    }
    value
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    #[test]
    fn optional_str_treats_null_as_missing() {
        let params = json!({ "a": null, "b": " x ", "c": 3 });
        assert_eq!(get_optional_str(&params, "a").expect("a"), None);
        assert_eq!(get_optional_str(&params, "b").expect("b"), Some("x".to_string()));
        assert_eq!(get_optional_str(&params, "c").expect_err("c").code, "bad_params");
        assert_eq!(get_required_str(&params, "zz").expect_err("zz").code, "bad_params");
    }

    #[test]
    fn dates_accept_timestamps() {
        let d = parse_date("2024-01-15T00:00:00.000Z", "date").expect("date");
        assert_eq!(d, NaiveDate::from_ymd_opt(2024, 1, 15).expect("d"));
        assert!(parse_date("15/01/2024", "date").is_err());
        assert!(parse_date("", "date").is_err());
        let spaced = parse_date("2024-01-15 08:30:00", "date").expect("spaced");
        assert_eq!(spaced, d);
        assert!(parse_date("2024-01-15garbage", "date").is_err());
        assert!(parse_date("2024-01-15Z", "date").is_err());
    }

    #[test]
    fn percentage_bounds_are_inclusive() {
        let params = json!({ "lo": 0, "hi": 100, "over": 100.5, "neg": -1, "s": "75" });
        assert_eq!(get_optional_percentage(&params, "lo").expect("lo"), Some(0.0));
        assert_eq!(get_optional_percentage(&params, "hi").expect("hi"), Some(100.0));
        assert!(get_optional_percentage(&params, "over").is_err());
        assert!(get_optional_percentage(&params, "neg").is_err());
        assert!(get_optional_percentage(&params, "s").is_err());
        assert_eq!(get_optional_percentage(&params, "none").expect("none"), None);
    }

    #[test]
    fn times_normalise_to_two_digit_hours() {
        assert_eq!(parse_time("9:00", "startTime").expect("time"), "09:00");
        assert!(parse_time("25:00", "startTime").is_err());
    }
}
