use serde_json::json;
use std::io::{BufRead, BufReader, Write};
use std::path::PathBuf;
use std::process::{Child, ChildStdin, ChildStdout, Command, Stdio};
use std::time::{SystemTime, UNIX_EPOCH};

fn temp_dir(prefix: &str) -> PathBuf {
    let p = std::env::temp_dir().join(format!(
        "{}-{}",
        prefix,
        SystemTime::now()
            .duration_since(UNIX_EPOCH)
            .expect("clock")
            .as_nanos()
    ));
    std::fs::create_dir_all(&p).expect("create temp dir");
    p
}

fn spawn_sidecar() -> (Child, ChildStdin, BufReader<ChildStdout>) {
    let exe = env!("CARGO_BIN_EXE_campusd");
    let mut child = Command::new(exe)
        .stdin(Stdio::piped())
        .stdout(Stdio::piped())
        .stderr(Stdio::null())
        .spawn()
        .expect("spawn campusd");
    let stdin = child.stdin.take().expect("child stdin");
    let stdout = child.stdout.take().expect("child stdout");
    (child, stdin, BufReader::new(stdout))
}

fn request(
    stdin: &mut ChildStdin,
    reader: &mut BufReader<ChildStdout>,
    id: &str,
    method: &str,
    params: serde_json::Value,
) -> serde_json::Value {
    let payload = json!({
        "id": id,
        "method": method,
        "params": params,
    });
    writeln!(stdin, "{}", payload).expect("write request");
    stdin.flush().expect("flush request");

    let mut line = String::new();
    reader.read_line(&mut line).expect("read response line");
    assert!(!line.trim().is_empty(), "empty response for {}", method);
    let value: serde_json::Value = serde_json::from_str(line.trim()).expect("parse response json");
    assert_eq!(value.get("id").and_then(|v| v.as_str()), Some(id));
    value
}

fn request_ok(
    stdin: &mut ChildStdin,
    reader: &mut BufReader<ChildStdout>,
    id: &str,
    method: &str,
    params: serde_json::Value,
) -> serde_json::Value {
    let value = request(stdin, reader, id, method, params);
    assert!(
        value.get("ok").and_then(|v| v.as_bool()).unwrap_or(false),
        "{} failed: {}",
        method,
        value
    );
    value.get("result").cloned().unwrap_or_else(|| json!({}))
}

fn error_code(value: &serde_json::Value) -> &str {
    assert_eq!(value.get("ok").and_then(|v| v.as_bool()), Some(false));
    value
        .get("error")
        .and_then(|e| e.get("code"))
        .and_then(|v| v.as_str())
        .unwrap_or("")
}

const ROSTER: &str = "Student ID,Student Name,Class,Parent Name,Parent Phone\n\
4000001,Test Student 1,8B,Parent 1,9876543210\n\
4000002,\"Kumar, Asha\",10A,\"Kumar, Ravi\",9876543211\n\
4000003,Test Student 3,8B,,\n";

#[test]
fn parse_preview_confirm_creates_all_records() {
    let workspace = temp_dir("campusd-roster-flow");
    let (_child, mut stdin, mut reader) = spawn_sidecar();

    let _ = request_ok(
        &mut stdin,
        &mut reader,
        "1",
        "workspace.select",
        json!({ "path": workspace.to_string_lossy() }),
    );

    let preview = request_ok(
        &mut stdin,
        &mut reader,
        "2",
        "roster.parse",
        json!({ "text": ROSTER }),
    );
    assert_eq!(preview.get("count").and_then(|v| v.as_u64()), Some(3));
    let rows = preview.get("rows").and_then(|v| v.as_array()).expect("rows");
    assert_eq!(rows[1].get("name").and_then(|v| v.as_str()), Some("Kumar, Asha"));
    assert_eq!(
        rows[1].get("parentName").and_then(|v| v.as_str()),
        Some("Kumar, Ravi")
    );
    assert_eq!(rows[2].get("parentName").and_then(|v| v.as_str()), Some(""));

    let report = request_ok(&mut stdin, &mut reader, "3", "roster.confirm", json!({}));
    assert_eq!(report.get("successCount").and_then(|v| v.as_u64()), Some(3));
    assert_eq!(report.get("failureCount").and_then(|v| v.as_u64()), Some(0));

    let outcomes = report.get("rows").and_then(|v| v.as_array()).expect("rows");
    assert!(outcomes[0].get("credentialCreated").and_then(|v| v.as_bool()).unwrap_or(false));
    // No parent name on the third row, so student only.
    assert!(outcomes[2].get("studentCreated").and_then(|v| v.as_bool()).unwrap_or(false));
    assert!(!outcomes[2].get("parentCreated").and_then(|v| v.as_bool()).unwrap_or(true));

    let result = request_ok(
        &mut stdin,
        &mut reader,
        "4",
        "records.query",
        json!({ "table": "students", "order": { "column": "id", "ascending": true } }),
    );
    let students = result.get("rows").and_then(|v| v.as_array()).expect("rows");
    assert_eq!(students.len(), 3);
    assert_eq!(
        students[0].get("parent_id").and_then(|v| v.as_str()),
        Some("P4000001A")
    );
    assert_eq!(students[0].get("status").and_then(|v| v.as_str()), Some("active"));

    let result = request_ok(
        &mut stdin,
        &mut reader,
        "5",
        "records.query",
        json!({ "table": "parents", "filters": { "id": "P4000002A" } }),
    );
    let parents = result.get("rows").and_then(|v| v.as_array()).expect("rows");
    assert_eq!(parents.len(), 1);
    assert_eq!(
        parents[0].get("student_id").and_then(|v| v.as_i64()),
        Some(4000002)
    );

    // Imported parents can sign in with the default password.
    let login = request_ok(
        &mut stdin,
        &mut reader,
        "6",
        "auth.login",
        json!({ "username": "P4000001A", "password": "parent123" }),
    );
    assert_eq!(
        login
            .get("user")
            .and_then(|u| u.get("role"))
            .and_then(|v| v.as_str()),
        Some("parent")
    );

    // Pending rows were consumed by the confirm.
    let resp = request(&mut stdin, &mut reader, "7", "roster.confirm", json!({}));
    assert_eq!(error_code(&resp), "no_pending_rows");
}

#[test]
fn cancel_discards_parsed_rows() {
    let workspace = temp_dir("campusd-roster-cancel");
    let (_child, mut stdin, mut reader) = spawn_sidecar();

    let _ = request_ok(
        &mut stdin,
        &mut reader,
        "1",
        "workspace.select",
        json!({ "path": workspace.to_string_lossy() }),
    );
    let _ = request_ok(
        &mut stdin,
        &mut reader,
        "2",
        "roster.parse",
        json!({ "text": ROSTER }),
    );
    let _ = request_ok(&mut stdin, &mut reader, "3", "roster.cancel", json!({}));

    let resp = request(&mut stdin, &mut reader, "4", "roster.confirm", json!({}));
    assert_eq!(error_code(&resp), "no_pending_rows");

    let result = request_ok(
        &mut stdin,
        &mut reader,
        "5",
        "records.query",
        json!({ "table": "students" }),
    );
    assert_eq!(
        result.get("rows").and_then(|v| v.as_array()).map(|r| r.len()),
        Some(0)
    );
}

#[test]
fn header_only_payload_is_parse_empty() {
    let workspace = temp_dir("campusd-roster-empty");
    let (_child, mut stdin, mut reader) = spawn_sidecar();

    let _ = request_ok(
        &mut stdin,
        &mut reader,
        "1",
        "workspace.select",
        json!({ "path": workspace.to_string_lossy() }),
    );

    let resp = request(
        &mut stdin,
        &mut reader,
        "2",
        "roster.parse",
        json!({ "text": "Student ID,Student Name,Class,Parent Name,Parent Phone\n" }),
    );
    assert_eq!(error_code(&resp), "parse_empty");
    assert_eq!(
        resp.get("error")
            .and_then(|e| e.get("message"))
            .and_then(|v| v.as_str()),
        Some("No valid data found in file")
    );
}
