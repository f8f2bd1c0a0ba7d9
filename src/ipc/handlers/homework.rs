use crate::ipc::error::{err, ok, store_err};
use crate::ipc::helpers::str_param;
use crate::ipc::types::{AppState, Request};
use crate::store::{Filter, OrderBy, Query, Record, RecordStore};
use serde_json::json;

fn handle_create(state: &mut AppState, req: &Request) -> serde_json::Value {
    let AppState { store, auth, .. } = state;
    let Some(store) = store.as_ref() else {
        return err(&req.id, "no_workspace", "select a workspace first", None);
    };
    let Some(user) = auth.current_user() else {
        return err(&req.id, "not_authenticated", "Not authenticated", None);
    };

    let (Some(class), Some(subject), Some(title), Some(due_date)) = (
        str_param(req, "class"),
        str_param(req, "subject"),
        str_param(req, "title"),
        str_param(req, "dueDate"),
    ) else {
        return err(
            &req.id,
            "bad_params",
            "missing class, subject, title or dueDate",
            None,
        );
    };
    let description = str_param(req, "description");

    let mut rec = Record::new();
    rec.insert("class".into(), json!(class));
    rec.insert("subject".into(), json!(subject));
    rec.insert("title".into(), json!(title));
    rec.insert("description".into(), json!(description));
    rec.insert(
        "date".into(),
        json!(chrono::Utc::now().format("%Y-%m-%d").to_string()),
    );
    rec.insert("due_date".into(), json!(due_date));
    rec.insert("assigned_by".into(), json!(user.username));

    match store.insert("homework", &[rec]) {
        Ok(rows) => ok(&req.id, json!({ "homework": rows.first() })),
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
    match store.query("homework", &query) {
        Ok(rows) => ok(&req.id, json!({ "homework": rows })),
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

    match store.delete("homework", &[Filter::eq("id", json!(id))]) {
        Ok(0) => err(&req.id, "not_found", "homework not found", None),
        Ok(_) => ok(&req.id, json!({ "deleted": true })),
        Err(e) => store_err(&req.id, &e),
    }
}

pub fn try_handle(state: &mut AppState, req: &Request) -> Option<serde_json::Value> {
    match req.method.as_str() {
        "homework.create" => Some(handle_create(state, req)),
        "homework.list" => Some(handle_list(state, req)),
        "homework.delete" => Some(handle_delete(state, req)),
        _ => None,
    }
}
