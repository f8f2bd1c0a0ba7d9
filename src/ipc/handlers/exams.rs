use crate::ipc::error::{err, ok, store_err};
use crate::ipc::helpers::str_param;
use crate::ipc::types::{AppState, Request};
use crate::store::{Filter, OrderBy, Query, Record, RecordStore};
use serde_json::json;

fn handle_schedule(state: &mut AppState, req: &Request) -> serde_json::Value {
    let Some(store) = state.store.as_ref() else {
        return err(&req.id, "no_workspace", "select a workspace first", None);
    };

    let (Some(class), Some(subject), Some(exam_name), Some(date)) = (
        str_param(req, "class"),
        str_param(req, "subject"),
        str_param(req, "examName"),
        str_param(req, "date"),
    ) else {
        return err(
            &req.id,
            "bad_params",
            "missing class, subject, examName or date",
            None,
        );
    };

    let mut rec = Record::new();
    rec.insert("class".into(), json!(class));
    rec.insert("subject".into(), json!(subject));
    rec.insert("exam_name".into(), json!(exam_name));
    rec.insert("date".into(), json!(date));
    rec.insert("time".into(), json!(str_param(req, "time")));
    rec.insert("duration".into(), json!(str_param(req, "duration")));

    match store.insert("exam_schedules", &[rec]) {
        Ok(rows) => ok(&req.id, json!({ "exam": rows.first() })),
        Err(e) => store_err(&req.id, &e),
    }
}

fn handle_list(state: &mut AppState, req: &Request) -> serde_json::Value {
    let Some(store) = state.store.as_ref() else {
        return err(&req.id, "no_workspace", "select a workspace first", None);
    };

    let mut filters = Vec::new();
    if let Some(class) = str_param(req, "class") {
        filters.push(Filter::eq("class", json!(class)));
    }
    let query = Query {
        filters,
        order: Some(OrderBy {
            column: "date".into(),
            ascending: false,
        }),
        limit: Some(20),
    };
    match store.query("exam_schedules", &query) {
        Ok(rows) => ok(&req.id, json!({ "exams": rows })),
        Err(e) => store_err(&req.id, &e),
    }
}

fn handle_delete(state: &mut AppState, req: &Request) -> serde_json::Value {
    let Some(store) = state.store.as_ref() else {
        return err(&req.id, "no_workspace", "select a workspace first", None);
    };
    let Some(id) = str_param(req, "id") else {
        return err(&req.id, "bad_params", "missing id", None);
    };

    match store.delete("exam_schedules", &[Filter::eq("id", json!(id))]) {
        Ok(0) => err(&req.id, "not_found", "exam not found", None),
        Ok(_) => ok(&req.id, json!({ "deleted": true })),
        Err(e) => store_err(&req.id, &e),
    }
}

pub fn try_handle(state: &mut AppState, req: &Request) -> Option<serde_json::Value> {
    match req.method.as_str() {
        "exams.schedule" => Some(handle_schedule(state, req)),
        "exams.list" => Some(handle_list(state, req)),
        "exams.delete" => Some(handle_delete(state, req)),
        _ => None,
    }
}
