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

#[test]
fn login_requires_workspace() {
    let (_child, mut stdin, mut reader) = spawn_sidecar();
    let resp = request(
        &mut stdin,
        &mut reader,
        "1",
        "auth.login",
        json!({ "username": "vp1", "password": "secret" }),
    );
    assert_eq!(error_code(&resp), "no_workspace");
}

#[test]
fn full_session_lifecycle() {
    let workspace = temp_dir("campusd-auth-lifecycle");
    let (_child, mut stdin, mut reader) = spawn_sidecar();

    let _ = request_ok(
        &mut stdin,
        &mut reader,
        "1",
        "workspace.select",
        json!({ "path": workspace.to_string_lossy() }),
    );

    // Nobody is signed in yet.
    let gate = request_ok(&mut stdin, &mut reader, "2", "auth.require", json!({}));
    assert_eq!(gate.get("authenticated").and_then(|v| v.as_bool()), Some(false));
    assert_eq!(gate.get("redirect").and_then(|v| v.as_str()), Some("login"));

    let _ = request_ok(
        &mut stdin,
        &mut reader,
        "3",
        "auth.register",
        json!({
            "username": "vp1",
            "password": "secret",
            "name": "VP One",
            "role": "vice_principal"
        }),
    );

    let resp = request(
        &mut stdin,
        &mut reader,
        "4",
        "auth.login",
        json!({ "username": "vp1", "password": "wrong" }),
    );
    assert_eq!(error_code(&resp), "invalid_credentials");

    let resp = request(
        &mut stdin,
        &mut reader,
        "5",
        "auth.login",
        json!({ "username": "ghost", "password": "secret" }),
    );
    assert_eq!(error_code(&resp), "invalid_credentials");

    let result = request_ok(
        &mut stdin,
        &mut reader,
        "6",
        "auth.login",
        json!({ "username": "vp1", "password": "secret" }),
    );
    let user = result.get("user").expect("user");
    assert_eq!(user.get("username").and_then(|v| v.as_str()), Some("vp1"));
    assert_eq!(user.get("name").and_then(|v| v.as_str()), Some("VP One"));
    assert_eq!(
        user.get("role").and_then(|v| v.as_str()),
        Some("vice_principal")
    );

    let result = request_ok(&mut stdin, &mut reader, "7", "auth.currentUser", json!({}));
    assert_eq!(
        result
            .get("user")
            .and_then(|u| u.get("username"))
            .and_then(|v| v.as_str()),
        Some("vp1")
    );

    let gate = request_ok(&mut stdin, &mut reader, "8", "auth.require", json!({}));
    assert_eq!(gate.get("authenticated").and_then(|v| v.as_bool()), Some(true));
    assert!(gate.get("redirect").map(|v| v.is_null()).unwrap_or(false));

    // Wrong old password leaves the credential untouched.
    let resp = request(
        &mut stdin,
        &mut reader,
        "9",
        "auth.changePassword",
        json!({ "oldPassword": "nope", "newPassword": "next" }),
    );
    assert_eq!(error_code(&resp), "incorrect_password");

    let _ = request_ok(
        &mut stdin,
        &mut reader,
        "10",
        "auth.changePassword",
        json!({ "oldPassword": "secret", "newPassword": "next" }),
    );

    let result = request_ok(&mut stdin, &mut reader, "11", "auth.logout", json!({}));
    assert_eq!(result.get("redirect").and_then(|v| v.as_str()), Some("login"));

    let result = request_ok(&mut stdin, &mut reader, "12", "auth.currentUser", json!({}));
    assert!(result.get("user").map(|v| v.is_null()).unwrap_or(false));

    let resp = request(
        &mut stdin,
        &mut reader,
        "13",
        "auth.login",
        json!({ "username": "vp1", "password": "secret" }),
    );
    assert_eq!(error_code(&resp), "invalid_credentials");

    let _ = request_ok(
        &mut stdin,
        &mut reader,
        "14",
        "auth.login",
        json!({ "username": "vp1", "password": "next" }),
    );
}

#[test]
fn change_password_needs_session() {
    let workspace = temp_dir("campusd-auth-nosession");
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
        "auth.changePassword",
        json!({ "oldPassword": "a", "newPassword": "b" }),
    );
    assert_eq!(error_code(&resp), "not_authenticated");
}

#[test]
fn session_survives_daemon_restart() {
    let workspace = temp_dir("campusd-auth-rehydrate");

    {
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
            "auth.register",
            json!({
                "username": "t1",
                "password": "pw",
                "name": "Teacher One",
                "role": "teacher"
            }),
        );
        let _ = request_ok(
            &mut stdin,
            &mut reader,
            "3",
            "auth.login",
            json!({ "username": "t1", "password": "pw" }),
        );
    }

    let (_child, mut stdin, mut reader) = spawn_sidecar();
    let _ = request_ok(
        &mut stdin,
        &mut reader,
        "1",
        "workspace.select",
        json!({ "path": workspace.to_string_lossy() }),
    );
    let result = request_ok(&mut stdin, &mut reader, "2", "auth.currentUser", json!({}));
    assert_eq!(
        result
            .get("user")
            .and_then(|u| u.get("username"))
            .and_then(|v| v.as_str()),
        Some("t1")
    );
}

#[test]
fn missing_credentials_are_bad_params() {
    let workspace = temp_dir("campusd-auth-badparams");
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
        "auth.login",
        json!({ "username": "vp1" }),
    );
    assert_eq!(error_code(&resp), "bad_params");

    let resp = request(
        &mut stdin,
        &mut reader,
        "3",
        "auth.register",
        json!({ "username": "vp1", "password": "pw" }),
    );
    assert_eq!(error_code(&resp), "bad_params");
}
