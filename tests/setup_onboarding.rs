
use serde_json::json;
use test_support::{request, request_err, request_ok, select_workspace, spawn_sidecar, str_field, temp_dir};

#[test]
fn timetable_upload_is_checked_before_parsing() {
    let (_child, mut stdin, mut reader) = spawn_sidecar();
    let dir = temp_dir("attendd-timetable-upload");

    let text = dir.join("timetable.txt");
    std::fs::write(&text, "Mon 9-10 CS201").expect("write txt");
    assert_eq!(
        request_err(
            &mut stdin,
            &mut reader,
            "1",
            "setup.parseTimetable",
            json!({ "path": text.to_string_lossy() }),
        ),
        "timetable_rejected"
    );
    assert_eq!(
        request_err(
            &mut stdin,
            &mut reader,
            "2",
            "setup.parseTimetable",
            json!({ "path": dir.join("missing.png").to_string_lossy() }),
        ),
        "timetable_rejected"
    );

    let image = dir.join("Timetable.PNG");
    std::fs::write(&image, [0x89, b'P', b'N', b'G']).expect("write png");
    let parsed = request_ok(
        &mut stdin,
        &mut reader,
        "3",
        "setup.parseTimetable",
        json!({ "path": image.to_string_lossy() }),
    );
    assert_eq!(parsed.get("subjects").and_then(|v| v.as_array()).map(|a| a.len()), Some(5));
    assert_eq!(parsed.get("schedule").and_then(|v| v.as_array()).map(|a| a.len()), Some(10));
    assert_eq!(str_field(&parsed, "/subjects/0/code"), "CS201");
}

#[test]
fn attendance_template_and_csv_import() {
    let (_child, mut stdin, mut reader) = spawn_sidecar();

    let template = request_ok(&mut stdin, &mut reader, "1", "setup.attendanceTemplate", json!({}));
    assert_eq!(str_field(&template, "/filename"), "attendance_template.csv");
    let csv = str_field(&template, "/csv");
    assert!(csv.starts_with("SubjectCode,Date,Status"));

    let imported = request_ok(
        &mut stdin,
        &mut reader,
        "2",
        "setup.importAttendanceCsv",
        json!({ "text": csv }),
    );
    assert_eq!(imported.get("records").and_then(|v| v.as_array()).map(|a| a.len()), Some(3));

    let dir = temp_dir("attendd-csv-import");
    let file = dir.join("past.csv");
    std::fs::write(
        &file,
        "SubjectCode,Date,Status\nCS201,2024-01-15,present\nCS201,,ABSENT\nCS202,15/01/2024,ABSENT\nCS203,2024-01-16,LATE\n",
    )
    .expect("write csv");
    let from_file = request_ok(
        &mut stdin,
        &mut reader,
        "3",
        "setup.importAttendanceCsv",
        json!({ "path": file.to_string_lossy() }),
    );
    let records = from_file.get("records").and_then(|v| v.as_array()).expect("records");
    assert_eq!(records.len(), 1);
    assert_eq!(str_field(&records[0], "/status"), "PRESENT");
    let rejected = from_file.get("rejected").and_then(|v| v.as_array()).expect("rejected");
    let lines: Vec<u64> = rejected
        .iter()
        .map(|r| r.get("line").and_then(|v| v.as_u64()).expect("line"))
        .collect();
    assert_eq!(lines, vec![4, 5]);

    assert_eq!(
        request_err(
            &mut stdin,
            &mut reader,
            "4",
            "setup.importAttendanceCsv",
            json!({ "path": dir.join("nope.csv").to_string_lossy() }),
        ),
        "io_failed"
    );
    assert_eq!(
        request_err(&mut stdin, &mut reader, "5", "setup.importAttendanceCsv", json!({})),
        "bad_params"
    );
}

#[test]
fn complete_creates_semester_subjects_and_generated_classes() {
    let (_child, mut stdin, mut reader) = spawn_sidecar();
    assert_eq!(
        request_err(&mut stdin, &mut reader, "0", "setup.complete", json!({})),
        "no_workspace"
    );
    let workspace = select_workspace(&mut stdin, &mut reader, "attendd-setup-complete");

    let image = workspace.join("timetable.jpg");
    std::fs::write(&image, [0xff, 0xd8]).expect("write jpg");
    let parsed = request_ok(
        &mut stdin,
        &mut reader,
        "1",
        "setup.parseTimetable",
        json!({ "path": image.to_string_lossy() }),
    );

    // Monday 2024-01-15 through Sunday 2024-01-21: one week of slots.
    let done = request_ok(
        &mut stdin,
        &mut reader,
        "2",
        "setup.complete",
        json!({
            "semester": { "name": "Spring 2024", "startDate": "2024-01-15", "endDate": "2024-01-21" },
            "subjects": parsed.get("subjects").cloned().expect("subjects"),
            "schedule": parsed.get("schedule").cloned().expect("schedule"),
            "pastAttendance": [
                { "subjectCode": "CS201", "date": "2024-01-15", "status": "PRESENT" },
                { "subjectCode": "CS202", "date": "2024-01-15", "status": "ABSENT" },
                { "subjectCode": "CS999", "date": "2024-01-15", "status": "PRESENT" }
            ]
        }),
    );
    assert_eq!(done.get("subjectCount").and_then(|v| v.as_u64()), Some(5));
    assert_eq!(done.get("classCount").and_then(|v| v.as_u64()), Some(10));
    assert_eq!(done.get("cacheSaved").and_then(|v| v.as_bool()), Some(true));
    let semester_id = str_field(&done, "/semesterId");

    let monday = request_ok(
        &mut stdin,
        &mut reader,
        "3",
        "classes.forDate",
        json!({ "date": "2024-01-15", "semesterId": semester_id }),
    );
    let classes = monday.get("classes").and_then(|v| v.as_array()).expect("classes");
    assert_eq!(classes.len(), 2);
    assert_eq!(str_field(&classes[0], "/status"), "PRESENT");
    assert_eq!(str_field(&classes[1], "/status"), "ABSENT");
    assert_eq!(str_field(&classes[0], "/dayOfWeek"), "Monday");

    let cache = request_ok(&mut stdin, &mut reader, "4", "cache.get", json!({}));
    assert_eq!(str_field(&cache, "/cache/currentSemesterId"), semester_id);
    assert_eq!(cache.pointer("/cache/onboarded").and_then(|v| v.as_bool()), Some(true));
    let cached = cache.pointer("/cache/subjects").and_then(|v| v.as_array()).expect("subjects");
    assert_eq!(cached.len(), 5);
    assert_eq!(cached[0].get("totalClasses").and_then(|v| v.as_u64()), Some(1));
    assert_eq!(cached[0].get("attendedClasses").and_then(|v| v.as_u64()), Some(1));
    assert_eq!(cached[1].get("attendedClasses").and_then(|v| v.as_u64()), Some(0));
    assert_eq!(cached[2].get("totalClasses").and_then(|v| v.as_u64()), Some(0));
}

#[test]
fn complete_rolls_back_when_any_part_is_invalid() {
    let (_child, mut stdin, mut reader) = spawn_sidecar();
    let _ = select_workspace(&mut stdin, &mut reader, "attendd-setup-rollback");

    let failed = request(
        &mut stdin,
        &mut reader,
        "1",
        "setup.complete",
        json!({
            "semester": { "name": "Spring 2024", "startDate": "2024-01-15", "endDate": "2024-01-21" },
            "subjects": [
                { "name": "Data Structures", "code": "CS201" },
                { "name": "Data Structures again", "code": "CS201" }
            ],
            "schedule": [
                { "day": "Mon", "startTime": "09:00", "endTime": "10:00", "subjectCode": "CS201" }
            ]
        }),
    );
    assert_eq!(failed.pointer("/error/code").and_then(|v| v.as_str()), Some("conflict"));

    let semesters = request_ok(&mut stdin, &mut reader, "2", "semesters.list", json!({}));
    assert_eq!(
        semesters.get("semesters").and_then(|v| v.as_array()).map(|a| a.len()),
        Some(0)
    );

    assert_eq!(
        request_err(
            &mut stdin,
            &mut reader,
            "3",
            "setup.complete",
            json!({
                "semester": { "name": "S", "startDate": "2024-01-15", "endDate": "2024-01-21" },
                "subjects": [],
                "schedule": [
                    { "day": "Mon", "startTime": "10:00", "endTime": "09:00", "subjectCode": "CS201" }
                ]
            }),
        ),
        "bad_params"
    );
    let cache = request_ok(&mut stdin, &mut reader, "4", "cache.get", json!({}));
    assert_eq!(cache.pointer("/cache/onboarded").and_then(|v| v.as_bool()), Some(false));
}

#[test]
fn complete_still_succeeds_when_the_cache_cannot_be_written() {
    let (_child, mut stdin, mut reader) = spawn_sidecar();
    let workspace = select_workspace(&mut stdin, &mut reader, "attendd-setup-cache-blocked");
    // A directory where the temp file goes makes every cache save fail.
    std::fs::create_dir_all(workspace.join("client-cache.json.tmp")).expect("block cache");

    let done = request_ok(
        &mut stdin,
        &mut reader,
        "1",
        "setup.complete",
        json!({
            "semester": { "name": "Spring 2024", "startDate": "2024-01-15", "endDate": "2024-01-21" },
            "subjects": [{ "name": "Data Structures", "code": "CS201" }],
            "schedule": [
                { "day": "Mon", "startTime": "09:00", "endTime": "10:00", "subjectCode": "CS201" }
            ]
        }),
    );
    assert_eq!(done.get("cacheSaved").and_then(|v| v.as_bool()), Some(false));
    assert_eq!(done.get("classCount").and_then(|v| v.as_u64()), Some(1));

    let semesters = request_ok(&mut stdin, &mut reader, "2", "semesters.list", json!({}));
    assert_eq!(
        semesters.get("semesters").and_then(|v| v.as_array()).map(|a| a.len()),
        Some(1)
    );
}

#[test]
fn complete_refuses_semesters_too_long_to_schedule() {
    let (_child, mut stdin, mut reader) = spawn_sidecar();
    let _ = select_workspace(&mut stdin, &mut reader, "attendd-setup-span");

    assert_eq!(
        request_err(
            &mut stdin,
            &mut reader,
            "1",
            "setup.complete",
            json!({
                "semester": { "name": "Forever", "startDate": "0001-01-01", "endDate": "9999-12-31" },
                "subjects": [{ "name": "Data Structures", "code": "CS201" }],
                "schedule": [
                    { "day": "Mon", "startTime": "09:00", "endTime": "10:00", "subjectCode": "CS201" }
                ]
            }),
        ),
        "bad_params"
    );
    let semesters = request_ok(&mut stdin, &mut reader, "2", "semesters.list", json!({}));
    assert_eq!(
        semesters.get("semesters").and_then(|v| v.as_array()).map(|a| a.len()),
        Some(0)
    );
}
