use crate::ipc::error::{err, ok, store_err};
use crate::ipc::helpers::str_param;
use crate::ipc::types::{AppState, Request};
use crate::store::{Filter, OrderBy, Query, Record, RecordStore};
use serde_json::{json, Value};

/// Periods are stored as serialized JSON; hand the caller the decoded
/// array, or null when it does not parse.
fn decode_periods(row: &Record) -> Value {
    row.get("periods")
        .and_then(Value::as_str)
        .and_then(|s| serde_json::from_str(s).ok())
        .unwrap_or(Value::Null)
}

fn handle_class_timetable(state: &mut AppState, req: &Request) -> serde_json::Value {
    let Some(store) = state.store.as_ref() else {
        return err(&req.id, "no_workspace", "select a workspace first", None);
    };
    let Some(class) = str_param(req, "class") else {
        return err(&req.id, "bad_params", "missing class", None);
    };

    let query = Query {
        filters: vec![Filter::eq("class", json!(class))],
        limit: Some(1),
        ..Query::default()
    };
    match store.query("timetables", &query) {
        Ok(rows) => match rows.first() {
            Some(row) => ok(
                &req.id,
                json!({ "timetable": { "class": class, "periods": decode_periods(row) } }),
            ),
            None => ok(&req.id, json!({ "timetable": null })),
        },
        Err(e) => store_err(&req.id, &e),
    }
}

fn handle_teacher_timetable(state: &mut AppState, req: &Request) -> serde_json::Value {
    let Some(store) = state.store.as_ref() else {
        return err(&req.id, "no_workspace", "select a workspace first", None);
    };
    let Some(teacher_id) = str_param(req, "teacherId") else {
        return err(&req.id, "bad_params", "missing teacherId", None);
    };

    let query = Query {
        filters: vec![Filter::eq("teacher_id", json!(teacher_id))],
        limit: Some(1),
        ..Query::default()
    };
    match store.query("teacher_timetables", &query) {
        Ok(rows) => match rows.first() {
            Some(row) => ok(
                &req.id,
                json!({
                    "timetable": { "teacherId": teacher_id, "periods": decode_periods(row) }
                }),
            ),
            None => ok(&req.id, json!({ "timetable": null })),
        },
        Err(e) => store_err(&req.id, &e),
    }
}

fn handle_duty_assign(state: &mut AppState, req: &Request) -> serde_json::Value {
    let Some(store) = state.store.as_ref() else {
        return err(&req.id, "no_workspace", "select a workspace first", None);
    };

    let (Some(teacher_id), Some(duty_name), Some(duty_date)) = (
        str_param(req, "teacherId"),
        str_param(req, "dutyName"),
        str_param(req, "dutyDate"),
    ) else {
        return err(
            &req.id,
            "bad_params",
            "missing teacherId, dutyName or dutyDate",
            None,
        );
    };

    let mut rec = Record::new();
    rec.insert("teacher_id".into(), json!(teacher_id));
    rec.insert("duty_name".into(), json!(duty_name));
    rec.insert("duty_date".into(), json!(duty_date));
    rec.insert("duty_time".into(), json!(str_param(req, "dutyTime")));
    rec.insert("location".into(), json!(str_param(req, "location")));

    match store.insert("teacher_duties", &[rec]) {
        Ok(rows) => ok(&req.id, json!({ "duty": rows.first() })),
        Err(e) => store_err(&req.id, &e),
    }
}

fn handle_duty_list(state: &mut AppState, req: &Request) -> serde_json::Value {
    let Some(store) = state.store.as_ref() else {
        return err(&req.id, "no_workspace", "select a workspace first", None);
    };

    let mut filters = Vec::new();
    if let Some(teacher_id) = str_param(req, "teacherId") {
        filters.push(Filter::eq("teacher_id", json!(teacher_id)));
    }
    let query = Query {
        filters,
        order: Some(OrderBy {
            column: "duty_date".into(),
            ascending: false,
        }),
        limit: Some(10),
    };
    match store.query("teacher_duties", &query) {
        Ok(rows) => ok(&req.id, json!({ "duties": rows })),
        Err(e) => store_err(&req.id, &e),
    }
}

pub fn try_handle(state: &mut AppState, req: &Request) -> Option<serde_json::Value> {
    match req.method.as_str() {
        "timetables.class" => Some(handle_class_timetable(state, req)),
        "timetables.teacher" => Some(handle_teacher_timetable(state, req)),
        "duties.assign" => Some(handle_duty_assign(state, req)),
        "duties.list" => Some(handle_duty_list(state, req)),
        _ => None,
    }
}
