use crate::auth::AuthError;
use crate::store::StoreError;
use serde_json::json;

pub fn ok(id: &str, result: serde_json::Value) -> serde_json::Value {
    json!({
        "id": id,
        "ok": true,
        "result": result
    })
}

pub fn err(
    id: &str,
    code: &str,
    message: impl Into<String>,
    details: Option<serde_json::Value>,
) -> serde_json::Value {
    let mut error = json!({
        "code": code,
        "message": message.into(),
    });
    if let Some(d) = details {
        error["details"] = d;
    }
    json!({
        "id": id,
        "ok": false,
        "error": error,
    })
}

pub fn store_err(id: &str, e: &StoreError) -> serde_json::Value {
    err(
        id,
        "store_error",
        e.to_string(),
        Some(json!({ "kind": e.kind_str() })),
    )
}

pub fn auth_err(id: &str, e: &AuthError) -> serde_json::Value {
    match e {
        AuthError::Store(se) => store_err(id, se),
        other => err(id, other.code(), other.to_string(), None),
    }
}
