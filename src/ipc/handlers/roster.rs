use crate::ipc::error::{err, ok};
use crate::ipc::helpers::str_param;
use crate::ipc::types::{AppState, Request};
use serde_json::json;

fn handle_parse(state: &mut AppState, req: &Request) -> serde_json::Value {
    let Some(text) = str_param(req, "text") else {
        return err(&req.id, "bad_params", "missing text", None);
    };

    match state.importer.parse(&text) {
        Ok(rows) => ok(
            &req.id,
            json!({
                "count": rows.len(),
                "rows": rows,
            }),
        ),
        Err(e) => err(&req.id, e.code(), e.to_string(), None),
    }
}

fn handle_confirm(state: &mut AppState, req: &Request) -> serde_json::Value {
    let AppState {
        store, importer, ..
    } = state;
    let Some(store) = store.as_ref() else {
        return err(&req.id, "no_workspace", "select a workspace first", None);
    };

    match importer.confirm(store) {
        Some(report) => ok(
            &req.id,
            serde_json::to_value(&report).unwrap_or(json!(null)),
        ),
        None => err(&req.id, "no_pending_rows", "no parsed roster to import", None),
    }
}

fn handle_cancel(state: &mut AppState, req: &Request) -> serde_json::Value {
    state.importer.cancel();
    ok(&req.id, json!({ "cancelled": true }))
}

pub fn try_handle(state: &mut AppState, req: &Request) -> Option<serde_json::Value> {
    match req.method.as_str() {
        "roster.parse" => Some(handle_parse(state, req)),
        "roster.confirm" => Some(handle_confirm(state, req)),
        "roster.cancel" => Some(handle_cancel(state, req)),
        _ => None,
    }
}
