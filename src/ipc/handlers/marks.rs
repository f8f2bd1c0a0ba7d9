use crate::grades;
use crate::ipc::error::{err, ok, store_err};
use crate::ipc::helpers::{f64_param, i64_param, str_param};
use crate::ipc::types::{AppState, Request};
use crate::store::{Filter, OrderBy, Query, Record, RecordStore};
use serde_json::{json, Value};

fn handle_submit(state: &mut AppState, req: &Request) -> serde_json::Value {
    let AppState { store, auth, .. } = state;
    let Some(store) = store.as_ref() else {
        return err(&req.id, "no_workspace", "select a workspace first", None);
    };
    let Some(user) = auth.current_user() else {
        return err(&req.id, "not_authenticated", "Not authenticated", None);
    };

    let (Some(student_id), Some(exam_name), Some(subject), Some(marks), Some(total_marks)) = (
        i64_param(req, "studentId"),
        str_param(req, "examName"),
        str_param(req, "subject"),
        f64_param(req, "marks"),
        f64_param(req, "totalMarks"),
    ) else {
        return err(
            &req.id,
            "bad_params",
            "missing studentId, examName, subject, marks or totalMarks",
            None,
        );
    };
    if marks < 0.0 {
        return err(
            &req.id,
            "bad_params",
            "marks must not be negative",
            Some(json!({ "marks": marks })),
        );
    }
    if total_marks <= 0.0 {
        return err(
            &req.id,
            "bad_params",
            "totalMarks must be positive",
            Some(json!({ "totalMarks": total_marks })),
        );
    }

    let percent = grades::percentage(marks, total_marks);
    let grade = grades::letter_grade(percent);

    let mut rec = Record::new();
    rec.insert("student_id".into(), json!(student_id));
    rec.insert("exam_name".into(), json!(exam_name));
    rec.insert("subject".into(), json!(subject));
    rec.insert("marks".into(), json!(marks));
    rec.insert("total_marks".into(), json!(total_marks));
    rec.insert("remarks".into(), json!(str_param(req, "remarks")));
    rec.insert("submitted_by".into(), json!(user.username));
    rec.insert("created_at".into(), json!(chrono::Utc::now().to_rfc3339()));

    match store.insert("marks_submissions", &[rec]) {
        Ok(rows) => ok(
            &req.id,
            json!({
                "submission": rows.first(),
                "percentage": grades::round_percent(percent),
                "grade": grade,
            }),
        ),
        Err(e) => store_err(&req.id, &e),
    }
}

fn annotate(mut row: Record) -> Record {
    let marks = row.get("marks").and_then(Value::as_f64).unwrap_or(0.0);
    let total = row.get("total_marks").and_then(Value::as_f64).unwrap_or(0.0);
    let percent = grades::percentage(marks, total);
    row.insert("percentage".into(), json!(grades::round_percent(percent)));
    row.insert("grade".into(), json!(grades::letter_grade(percent)));
    row
}

fn handle_list(state: &mut AppState, req: &Request) -> serde_json::Value {
    let Some(store) = state.store.as_ref() else {
        return err(&req.id, "no_workspace", "select a workspace first", None);
    };

    let mut filters = Vec::new();
    if let Some(student_id) = i64_param(req, "studentId") {
        filters.push(Filter::eq("student_id", json!(student_id)));
    }
    let query = Query {
        filters,
        order: Some(OrderBy {
            column: "created_at".into(),
            ascending: false,
        }),
        limit: Some(50),
    };
    match store.query("marks_submissions", &query) {
        Ok(rows) => {
            let rows: Vec<Record> = rows.into_iter().map(annotate).collect();
            ok(&req.id, json!({ "submissions": rows }))
        }
        Err(e) => store_err(&req.id, &e),
    }
}

fn handle_approve(state: &mut AppState, req: &Request) -> serde_json::Value {
    let AppState { store, auth, .. } = state;
    let Some(store) = store.as_ref() else {
        return err(&req.id, "no_workspace", "select a workspace first", None);
    };
    let Some(user) = auth.current_user() else {
        return err(&req.id, "not_authenticated", "Not authenticated", None);
    };
    let Some(id) = str_param(req, "id") else {
        return err(&req.id, "bad_params", "missing id", None);
    };

    let mut changes = Record::new();
    changes.insert("approved_at".into(), json!(chrono::Utc::now().to_rfc3339()));
    changes.insert("approved_by".into(), json!(user.username));

    match store.update(
        "marks_submissions",
        &[Filter::eq("id", json!(id))],
        &changes,
    ) {
        Ok(rows) if rows.is_empty() => err(&req.id, "not_found", "submission not found", None),
        Ok(rows) => ok(&req.id, json!({ "submission": rows.first() })),
        Err(e) => store_err(&req.id, &e),
    }
}

pub fn try_handle(state: &mut AppState, req: &Request) -> Option<serde_json::Value> {
    match req.method.as_str() {
        "marks.submit" => Some(handle_submit(state, req)),
        "marks.list" => Some(handle_list(state, req)),
        "marks.approve" => Some(handle_approve(state, req)),
        _ => None,
    }
}
