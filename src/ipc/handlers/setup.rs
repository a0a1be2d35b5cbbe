use std::collections::HashMap;
use std::path::PathBuf;

use crate::bulk_csv::{self, AttendanceImport, TEMPLATE};
use crate::cache::CachedSubject;
use crate::ipc::error::HandlerErr;
use crate::ipc::handlers::classes::store_class;
use crate::ipc::handlers::semesters::insert_semester;
use crate::ipc::handlers::subjects::insert_subject;
use crate::ipc::helpers::{get_array, get_optional_str, get_typed, parse_time, reply};
use crate::ipc::types::{AppState, Request};
use crate::model::{AttendanceStatus, PastAttendance};
use crate::stats::compute_stats_from_statuses;
use crate::timetable::{generate_classes, validate_upload, ScheduleSlot};
use serde_json::json;
use tracing::{debug, info, warn};

const TEMPLATE_FILENAME: &str = "attendance_template.csv";

fn setup_parse_timetable(
    state: &AppState,
    params: &serde_json::Value,
) -> Result<serde_json::Value, HandlerErr> {
    let path = get_optional_str(params, "path")?
        .filter(|s| !s.is_empty())
        .ok_or_else(|| HandlerErr::bad_params("missing path"))?;
    let rejected = |e: crate::timetable::TimetableError| {
        HandlerErr::new("timetable_rejected", e.to_string())
    };
    let upload = validate_upload(&PathBuf::from(&path)).map_err(rejected)?;
    debug!(path = %upload.path.display(), size = upload.size, "parsing timetable");
    let parsed = state.timetable.parse(&upload).map_err(rejected)?;
    Ok(json!({
        "subjects": parsed.subjects,
        "schedule": parsed.schedule,
    }))
}

fn setup_import_attendance_csv(params: &serde_json::Value) -> Result<serde_json::Value, HandlerErr> {
    let parsed = match params.get("text").and_then(|v| v.as_str()) {
        Some(text) => bulk_csv::parse_attendance_csv(text),
        None => {
            let path = get_optional_str(params, "path")?
                .filter(|s| !s.is_empty())
                .ok_or_else(|| HandlerErr::bad_params("missing path or text"))?;
            bulk_csv::read_attendance_csv(&PathBuf::from(path))
        }
    };
    let imported: AttendanceImport = parsed.map_err(|e| match e {
        bulk_csv::CsvImportError::Io(_) => HandlerErr::new("io_failed", e.to_string()),
        bulk_csv::CsvImportError::Csv(_) => HandlerErr::bad_params(e.to_string()),
    })?;
    Ok(json!({
        "records": imported.records,
        "rejected": imported.rejected,
    }))
}

/// Creates the semester, its subjects and every generated class in one
/// transaction, then marks the workspace as onboarded.
fn setup_complete(
    state: &AppState,
    params: &serde_json::Value,
) -> Result<serde_json::Value, HandlerErr> {
    let (Some(conn), Some(cache_store)) = (state.db.as_ref(), state.cache.as_ref()) else {
        return Err(HandlerErr::new("no_workspace", "select a workspace first"));
    };

    let semester_params = params
        .get("semester")
        .filter(|v| v.is_object())
        .ok_or_else(|| HandlerErr::bad_params("missing semester"))?;
    let subject_drafts = get_array(params, "subjects")?;
    let schedule: Vec<ScheduleSlot> = get_typed(params, "schedule")?.unwrap_or_default();
    let past: Vec<PastAttendance> = get_typed(params, "pastAttendance")?.unwrap_or_default();

    let mut slots = Vec::with_capacity(schedule.len());
    for (i, slot) in schedule.into_iter().enumerate() {
        let at = |e: HandlerErr| e.with_details(json!({ "slot": i }));
        let start_time = parse_time(&slot.start_time, "startTime").map_err(at)?;
        let end_time = parse_time(&slot.end_time, "endTime").map_err(at)?;
        if end_time <= start_time {
            return Err(at(HandlerErr::bad_params("endTime must be after startTime")));
        }
        slots.push(ScheduleSlot {
            start_time,
            end_time,
            ..slot
        });
    }

    let tx = conn
        .unchecked_transaction()
        .map_err(|e| HandlerErr::db("db_tx_failed", e, None))?;
    let semester = insert_semester(&tx, semester_params)?;

    let mut subjects = Vec::with_capacity(subject_drafts.len());
    for (i, draft) in subject_drafts.iter().enumerate() {
        let subject = insert_subject(&tx, &semester.id, draft)
            .map_err(|e| e.with_details(json!({ "index": i })))?;
        subjects.push(subject);
    }
    let subject_ids: HashMap<String, String> = subjects
        .iter()
        .map(|s| (s.code.clone(), s.id.clone()))
        .collect();

    let classes = generate_classes(
        semester.start_date,
        semester.end_date,
        &slots,
        &subject_ids,
        &past,
    )
    .map_err(|e| HandlerErr::bad_params(e.to_string()))?;
    for class in &classes {
        store_class(&tx, class)?;
    }
    tx.commit()
        .map_err(|e| HandlerErr::db("db_commit_failed", e, None))?;

    // The database is committed at this point; the cache is only a snapshot.
    // Cached counts only cover classes that have already been held.
    let mut cache = cache_store.load();
    cache.current_semester_id = Some(semester.id.clone());
    cache.onboarded = true;
    cache.subjects = subjects
        .iter()
        .map(|s| {
            let held = classes
                .iter()
                .filter(|c| c.subject_id == s.id && c.status != AttendanceStatus::Scheduled)
                .map(|c| c.status);
            let stats = compute_stats_from_statuses(held, s.required_percentage);
            CachedSubject {
                id: s.id.clone(),
                name: s.name.clone(),
                code: s.code.clone(),
                teacher: s.teacher.clone(),
                total_classes: stats.total_classes as u32,
                attended_classes: stats.attended_classes as u32,
                required_percentage: s.required_percentage,
            }
        })
        .collect();
    let cache_saved = match cache_store.save(&cache) {
        Ok(()) => true,
        Err(e) => {
            warn!(semester_id = %semester.id, error = %e, "client cache not saved after setup");
            false
        }
    };

    info!(
        semester_id = %semester.id,
        subjects = subjects.len(),
        classes = classes.len(),
        "setup complete"
    );
    Ok(json!({
        "semesterId": semester.id,
        "subjectCount": subjects.len(),
        "classCount": classes.len(),
        "cacheSaved": cache_saved,
    }))
}

pub fn try_handle(state: &mut AppState, req: &Request) -> Option<serde_json::Value> {
    match req.method.as_str() {
        "setup.parseTimetable" => Some(reply(req, setup_parse_timetable(state, &req.params))),
        "setup.attendanceTemplate" => Some(reply(
            req,
            Ok(json!({ "filename": TEMPLATE_FILENAME, "csv": TEMPLATE })),
        )),
        "setup.importAttendanceCsv" => Some(reply(req, setup_import_attendance_csv(&req.params))),
        "setup.complete" => Some(reply(req, setup_complete(state, &req.params))),
        _ => None,
    }
}
