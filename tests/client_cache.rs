
use serde_json::json;
use test_support::{request_err, request_ok, select_workspace, spawn_sidecar, str_field};

#[test]
fn cache_put_record_and_reset() {
    let (_child, mut stdin, mut reader) = spawn_sidecar();
    let workspace = select_workspace(&mut stdin, &mut reader, "attendd-client-cache");

    let empty = request_ok(&mut stdin, &mut reader, "1", "cache.get", json!({}));
    assert_eq!(empty.pointer("/cache/onboarded").and_then(|v| v.as_bool()), Some(false));
    assert!(empty.pointer("/cache/currentSemesterId").map(|v| v.is_null()).unwrap_or(false));

    let _ = request_ok(
        &mut stdin,
        &mut reader,
        "2",
        "cache.put",
        json!({ "cache": {
            "currentSemesterId": "sem-1",
            "onboarded": true,
            "subjects": [{
                "id": "sub-1",
                "name": "Data Structures",
                "code": "CS201",
                "totalClasses": 10,
                "attendedClasses": 8,
                "requiredPercentage": 75
            }]
        } }),
    );
    assert!(workspace.join("client-cache.json").is_file());

    let marked = request_ok(
        &mut stdin,
        &mut reader,
        "3",
        "cache.recordClass",
        json!({ "subjectId": "sub-1", "status": "DUTY_LEAVE" }),
    );
    assert_eq!(
        marked.pointer("/cache/subjects/0/totalClasses").and_then(|v| v.as_u64()),
        Some(11)
    );
    assert_eq!(
        marked.pointer("/cache/subjects/0/attendedClasses").and_then(|v| v.as_u64()),
        Some(9)
    );
    let _ = request_ok(
        &mut stdin,
        &mut reader,
        "4",
        "cache.recordClass",
        json!({ "subjectId": "sub-1", "status": "ABSENT" }),
    );
    let stored = request_ok(&mut stdin, &mut reader, "5", "cache.get", json!({}));
    assert_eq!(
        stored.pointer("/cache/subjects/0/totalClasses").and_then(|v| v.as_u64()),
        Some(12)
    );
    assert_eq!(
        stored.pointer("/cache/subjects/0/attendedClasses").and_then(|v| v.as_u64()),
        Some(9)
    );
    assert_eq!(str_field(&stored, "/cache/subjects/0/teacher"), "");

    assert_eq!(
        request_err(
            &mut stdin,
            &mut reader,
            "6",
            "cache.recordClass",
            json!({ "subjectId": "sub-2", "status": "PRESENT" }),
        ),
        "not_found"
    );
    assert_eq!(
        request_err(&mut stdin, &mut reader, "7", "cache.put", json!({ "cache": "oops" })),
        "bad_params"
    );

    let _ = request_ok(&mut stdin, &mut reader, "8", "cache.reset", json!({}));
    assert!(!workspace.join("client-cache.json").exists());
    let after = request_ok(&mut stdin, &mut reader, "9", "cache.get", json!({}));
    assert_eq!(
        after.pointer("/cache/subjects").and_then(|v| v.as_array()).map(|a| a.len()),
        Some(0)
    );
}

#[test]
fn corrupt_cache_file_reads_as_empty() {
    let (_child, mut stdin, mut reader) = spawn_sidecar();
    let workspace = select_workspace(&mut stdin, &mut reader, "attendd-client-cache-corrupt");
    std::fs::write(workspace.join("client-cache.json"), "{ not json").expect("write");

    let got = request_ok(&mut stdin, &mut reader, "1", "cache.get", json!({}));
    assert_eq!(got.pointer("/cache/onboarded").and_then(|v| v.as_bool()), Some(false));
}

#[test]
fn record_class_at_the_counter_ceiling_keeps_the_daemon_alive() {
    let (_child, mut stdin, mut reader) = spawn_sidecar();
    let _ = select_workspace(&mut stdin, &mut reader, "attendd-client-cache-ceiling");

    let _ = request_ok(
        &mut stdin,
        &mut reader,
        "1",
        "cache.put",
        json!({ "cache": {
            "subjects": [{
                "id": "sub-1",
                "name": "Data Structures",
                "code": "CS201",
                "totalClasses": 4294967295u64,
                "attendedClasses": 4294967295u64,
                "requiredPercentage": 75
            }]
        } }),
    );
    let marked = request_ok(
        &mut stdin,
        &mut reader,
        "2",
        "cache.recordClass",
        json!({ "subjectId": "sub-1", "status": "PRESENT" }),
    );
    assert_eq!(
        marked.pointer("/cache/subjects/0/totalClasses").and_then(|v| v.as_u64()),
        Some(u64::from(u32::MAX))
    );
    let _ = request_ok(&mut stdin, &mut reader, "3", "health", json!({}));
}
