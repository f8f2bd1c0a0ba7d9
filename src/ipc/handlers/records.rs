use crate::ipc::error::{err, ok, store_err};
use crate::ipc::helpers::str_param;
use crate::ipc::types::{AppState, Request};
use crate::store::{Filter, OrderBy, Query, Record, RecordStore};
use serde_json::{json, Value};

fn filters_from_params(req: &Request) -> Vec<Filter> {
    req.params
        .get("filters")
        .and_then(Value::as_object)
        .map(|m| {
            m.iter()
                .map(|(k, v)| Filter::eq(k.clone(), v.clone()))
                .collect()
        })
        .unwrap_or_default()
}

fn order_from_params(req: &Request) -> Option<OrderBy> {
    let order = req.params.get("order")?.as_object()?;
    let column = order.get("column")?.as_str()?.to_string();
    let ascending = order
        .get("ascending")
        .and_then(Value::as_bool)
        .unwrap_or(true);
    Some(OrderBy { column, ascending })
}

fn handle_query(state: &mut AppState, req: &Request) -> serde_json::Value {
    let Some(store) = state.store.as_ref() else {
        return err(&req.id, "no_workspace", "select a workspace first", None);
    };
    let Some(table) = str_param(req, "table") else {
        return err(&req.id, "bad_params", "missing table", None);
    };

    let query = Query {
        filters: filters_from_params(req),
        order: order_from_params(req),
        limit: req.params.get("limit").and_then(Value::as_i64),
    };
    match store.query(&table, &query) {
        Ok(rows) => ok(&req.id, json!({ "rows": rows })),
        Err(e) => store_err(&req.id, &e),
    }
}

fn handle_insert(state: &mut AppState, req: &Request) -> serde_json::Value {
    let Some(store) = state.store.as_ref() else {
        return err(&req.id, "no_workspace", "select a workspace first", None);
    };
    let Some(table) = str_param(req, "table") else {
        return err(&req.id, "bad_params", "missing table", None);
    };

    // Accept a single row object or an array of rows, like the backend
    // client does.
    let rows: Vec<Record> = if let Some(arr) = req.params.get("rows").and_then(Value::as_array) {
        let mut out = Vec::with_capacity(arr.len());
        for v in arr {
            match v.as_object() {
                Some(m) => out.push(m.clone()),
                None => return err(&req.id, "bad_params", "rows must be objects", None),
            }
        }
        out
    } else if let Some(m) = req.params.get("row").and_then(Value::as_object) {
        vec![m.clone()]
    } else {
        return err(&req.id, "bad_params", "missing row or rows", None);
    };

    if rows.is_empty() {
        return err(&req.id, "bad_params", "rows must not be empty", None);
    }

    match store.insert(&table, &rows) {
        Ok(stored) => ok(&req.id, json!({ "rows": stored })),
        Err(e) => store_err(&req.id, &e),
    }
}

fn handle_update(state: &mut AppState, req: &Request) -> serde_json::Value {
    let Some(store) = state.store.as_ref() else {
        return err(&req.id, "no_workspace", "select a workspace first", None);
    };
    let Some(table) = str_param(req, "table") else {
        return err(&req.id, "bad_params", "missing table", None);
    };
    let Some(id) = req.params.get("id").filter(|v| !v.is_null()).cloned() else {
        return err(&req.id, "bad_params", "missing id", None);
    };
    let Some(changes) = req.params.get("changes").and_then(Value::as_object) else {
        return err(&req.id, "bad_params", "missing changes", None);
    };

    match store.update(&table, &[Filter::eq("id", id)], changes) {
        Ok(rows) => ok(&req.id, json!({ "rows": rows })),
        Err(e) => store_err(&req.id, &e),
    }
}

fn handle_delete(state: &mut AppState, req: &Request) -> serde_json::Value {
    let Some(store) = state.store.as_ref() else {
        return err(&req.id, "no_workspace", "select a workspace first", None);
    };
    let Some(table) = str_param(req, "table") else {
        return err(&req.id, "bad_params", "missing table", None);
    };
    let Some(id) = req.params.get("id").filter(|v| !v.is_null()).cloned() else {
        return err(&req.id, "bad_params", "missing id", None);
    };

    match store.delete(&table, &[Filter::eq("id", id)]) {
        Ok(n) => ok(&req.id, json!({ "deleted": n })),
        Err(e) => store_err(&req.id, &e),
    }
}

pub fn try_handle(state: &mut AppState, req: &Request) -> Option<serde_json::Value> {
    match req.method.as_str() {
        "records.query" => Some(handle_query(state, req)),
        "records.insert" => Some(handle_insert(state, req)),
        "records.update" => Some(handle_update(state, req)),
        "records.delete" => Some(handle_delete(state, req)),
        _ => None,
    }
}
