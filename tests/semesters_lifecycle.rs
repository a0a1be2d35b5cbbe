
use serde_json::json;
use test_support::{
    add_classes, create_semester, create_subject, request_err, request_ok, select_workspace,
    spawn_sidecar, str_field,
};

#[test]
fn semester_create_applies_defaults_and_validates() {
    let (_child, mut stdin, mut reader) = spawn_sidecar();
    let _ = select_workspace(&mut stdin, &mut reader, "attendd-semester-create");

    let created = request_ok(
        &mut stdin,
        &mut reader,
        "1",
        "semesters.create",
        json!({ "name": "Fall 2024", "startDate": "2024-08-01", "endDate": "2024-12-15" }),
    );
    let semester = created.get("semester").expect("semester");
    assert_eq!(semester.get("requiredPercentage").and_then(|v| v.as_f64()), Some(75.0));
    assert_eq!(semester.get("ownerId").and_then(|v| v.as_str()), Some("default-user"));
    assert_eq!(semester.get("startDate").and_then(|v| v.as_str()), Some("2024-08-01"));

    // Timestamps are cut to the day.
    let stamped = request_ok(
        &mut stdin,
        &mut reader,
        "2",
        "semesters.create",
        json!({
            "name": "Strict",
            "startDate": "2025-01-06T00:00:00.000Z",
            "endDate": "2025-05-30",
            "requiredPercentage": 0
        }),
    );
    assert_eq!(
        stamped.pointer("/semester/startDate").and_then(|v| v.as_str()),
        Some("2025-01-06")
    );
    assert_eq!(
        stamped.pointer("/semester/requiredPercentage").and_then(|v| v.as_f64()),
        Some(0.0)
    );

    let bad = [
        json!({ "startDate": "2024-01-01", "endDate": "2024-05-01" }),
        json!({ "name": "X", "startDate": "2024-13-01", "endDate": "2024-05-01" }),
        json!({ "name": "X", "startDate": "2024-06-01", "endDate": "2024-05-01" }),
        json!({ "name": "X", "startDate": "2024-01-01", "endDate": "2024-05-01", "requiredPercentage": 120 }),
    ];
    for (i, params) in bad.into_iter().enumerate() {
        assert_eq!(
            request_err(&mut stdin, &mut reader, &format!("bad{i}"), "semesters.create", params),
            "bad_params"
        );
    }
}

#[test]
fn list_current_update_and_cascade_delete() {
    let (_child, mut stdin, mut reader) = spawn_sidecar();
    let _ = select_workspace(&mut stdin, &mut reader, "attendd-semester-lifecycle");

    let older = create_semester(&mut stdin, &mut reader, "2023-08-01", "2023-12-15");
    let current = create_semester(&mut stdin, &mut reader, "2024-01-08", "2024-05-31");
    let subject_id = create_subject(&mut stdin, &mut reader, &current, "CS201");
    let _ = add_classes(&mut stdin, &mut reader, &subject_id, &["PRESENT", "ABSENT"]);
    let _ = request_ok(
        &mut stdin,
        &mut reader,
        "h",
        "holidays.create",
        json!({ "semesterId": current, "date": "2024-03-29", "name": "Spring break" }),
    );

    let list = request_ok(&mut stdin, &mut reader, "1", "semesters.list", json!({}));
    let semesters = list.get("semesters").and_then(|v| v.as_array()).expect("semesters");
    assert_eq!(semesters.len(), 2);
    assert_eq!(str_field(&semesters[0], "/id"), current);
    assert_eq!(str_field(&semesters[1], "/id"), older);
    assert_eq!(
        semesters[0].get("subjects").and_then(|v| v.as_array()).map(|a| a.len()),
        Some(1)
    );
    assert_eq!(
        semesters[0].get("holidays").and_then(|v| v.as_array()).map(|a| a.len()),
        Some(1)
    );

    let other_owner = request_ok(
        &mut stdin,
        &mut reader,
        "2",
        "semesters.list",
        json!({ "ownerId": "someone-else" }),
    );
    assert_eq!(
        other_owner.get("semesters").and_then(|v| v.as_array()).map(|a| a.len()),
        Some(0)
    );

    let found = request_ok(
        &mut stdin,
        &mut reader,
        "3",
        "semesters.current",
        json!({ "today": "2024-02-01" }),
    );
    assert_eq!(str_field(&found, "/semester/id"), current);
    assert_eq!(
        found
            .pointer("/semester/subjects/0/classes")
            .and_then(|v| v.as_array())
            .map(|a| a.len()),
        Some(2)
    );
    let none = request_ok(
        &mut stdin,
        &mut reader,
        "4",
        "semesters.current",
        json!({ "today": "2026-01-01" }),
    );
    assert!(none.get("semester").map(|v| v.is_null()).unwrap_or(false));

    let updated = request_ok(
        &mut stdin,
        &mut reader,
        "5",
        "semesters.update",
        json!({ "semesterId": current, "name": "Spring 2024 (revised)", "requiredPercentage": 80 }),
    );
    assert_eq!(
        updated.pointer("/semester/name").and_then(|v| v.as_str()),
        Some("Spring 2024 (revised)")
    );
    assert_eq!(
        updated.pointer("/semester/endDate").and_then(|v| v.as_str()),
        Some("2024-05-31")
    );
    assert_eq!(
        request_err(
            &mut stdin,
            &mut reader,
            "6",
            "semesters.update",
            json!({ "semesterId": current, "endDate": "2023-01-01" }),
        ),
        "bad_params"
    );

    let _ = request_ok(
        &mut stdin,
        &mut reader,
        "7",
        "semesters.delete",
        json!({ "semesterId": current }),
    );
    assert_eq!(
        request_err(
            &mut stdin,
            &mut reader,
            "8",
            "subjects.get",
            json!({ "subjectId": subject_id }),
        ),
        "not_found"
    );
    let holidays = request_ok(
        &mut stdin,
        &mut reader,
        "9",
        "holidays.list",
        json!({ "semesterId": current }),
    );
    assert_eq!(
        holidays.get("holidays").and_then(|v| v.as_array()).map(|a| a.len()),
        Some(0)
    );
    assert_eq!(
        request_err(
            &mut stdin,
            &mut reader,
            "10",
            "semesters.delete",
            json!({ "semesterId": current }),
        ),
        "not_found"
    );
}
