use crate::auth::DEFAULT_PARENT_PASSWORD;
use crate::store::{Record, RecordStore};
use serde::Serialize;
use serde_json::json;
use std::fmt;

/// One parsed, not-yet-committed roster line.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct ImportRow {
    pub id: String,
    pub name: String,
    #[serde(rename = "class")]
    pub class_label: String,
    pub parent_name: String,
    pub parent_phone: String,
}

#[derive(Debug)]
pub enum ImportError {
    Empty,
}

impl ImportError {
    pub fn code(&self) -> &'static str {
        match self {
            ImportError::Empty => "parse_empty",
        }
    }
}

impl fmt::Display for ImportError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            ImportError::Empty => write!(f, "No valid data found in file"),
        }
    }
}

impl std::error::Error for ImportError {}

/// What happened to one roster row during confirm. Sub-records are inserted
/// in order (student, parent, credential) with no rollback, so a failed row
/// can leave earlier sub-records behind; the flags say which.
#[derive(Debug, Clone, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct RowOutcome {
    pub id: String,
    pub student_created: bool,
    pub parent_created: bool,
    pub credential_created: bool,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub error: Option<String>,
}

impl RowOutcome {
    fn new(id: &str) -> Self {
        Self {
            id: id.to_string(),
            student_created: false,
            parent_created: false,
            credential_created: false,
            error: None,
        }
    }
}

#[derive(Debug, Clone, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct ImportReport {
    pub success_count: usize,
    pub failure_count: usize,
    pub rows: Vec<RowOutcome>,
}

/// Parse a delimited roster payload. The first record is a header and is
/// discarded; blank records are skipped; a record needs at least id, name
/// and class to be accepted, and the two parent fields default to "".
/// Quoted fields may contain commas, doubled quotes and newlines.
pub fn parse_roster(text: &str) -> Result<Vec<ImportRow>, ImportError> {
    let records = parse_delimited(text);
    let mut rows = Vec::new();
    for fields in records.into_iter().skip(1) {
        if fields.iter().all(|f| f.is_empty()) {
            continue;
        }
        if fields.len() < 3 {
            continue;
        }
        rows.push(ImportRow {
            id: fields[0].clone(),
            name: fields[1].clone(),
            class_label: fields[2].clone(),
            parent_name: fields.get(3).cloned().unwrap_or_default(),
            parent_phone: fields.get(4).cloned().unwrap_or_default(),
        });
    }
    if rows.is_empty() {
        return Err(ImportError::Empty);
    }
    Ok(rows)
}

/// Comma-separated records with RFC-style quoting: a field wrapped in
/// double quotes keeps commas and newlines, and `""` escapes a quote.
/// Unquoted fields are whitespace-trimmed; quoted fields are verbatim.
fn parse_delimited(text: &str) -> Vec<Vec<String>> {
    let mut records: Vec<Vec<String>> = Vec::new();
    let mut fields: Vec<String> = Vec::new();
    let mut field = String::new();
    let mut quoted = false;
    let mut in_quotes = false;

    let push_field = |fields: &mut Vec<String>, field: &mut String, quoted: &mut bool| {
        let value = if *quoted {
            std::mem::take(field)
        } else {
            field.trim().to_string()
        };
        field.clear();
        *quoted = false;
        fields.push(value);
    };

    let mut chars = text.chars().peekable();
    while let Some(c) = chars.next() {
        if in_quotes {
            if c == '"' {
                if chars.peek() == Some(&'"') {
                    chars.next();
                    field.push('"');
                } else {
                    in_quotes = false;
                }
            } else {
                field.push(c);
            }
            continue;
        }

        match c {
            '"' if field.trim().is_empty() => {
                field.clear();
                quoted = true;
                in_quotes = true;
            }
            ',' => push_field(&mut fields, &mut field, &mut quoted),
            '\r' => {}
            '\n' => {
                push_field(&mut fields, &mut field, &mut quoted);
                records.push(std::mem::take(&mut fields));
            }
            _ => field.push(c),
        }
    }
    if !field.is_empty() || quoted || !fields.is_empty() {
        push_field(&mut fields, &mut field, &mut quoted);
        records.push(fields);
    }

    records
}

/// Replays parsed rows as sequential inserts: student, then (when a parent
/// name is present) parent record and a default-password parent login. One
/// row's failure never stops the run.
pub fn import_rows(store: &dyn RecordStore, rows: &[ImportRow]) -> ImportReport {
    let mut report = ImportReport {
        success_count: 0,
        failure_count: 0,
        rows: Vec::with_capacity(rows.len()),
    };

    for row in rows {
        let mut outcome = RowOutcome::new(&row.id);
        let parent_id = format!("P{}A", row.id);

        match insert_student(store, row, &parent_id) {
            Ok(()) => outcome.student_created = true,
            Err(e) => {
                outcome.error = Some(e);
                report.failure_count += 1;
                report.rows.push(outcome);
                continue;
            }
        }

        if !row.parent_name.is_empty() {
            match insert_parent(store, row, &parent_id) {
                Ok(()) => outcome.parent_created = true,
                Err(e) => {
                    outcome.error = Some(e);
                    report.failure_count += 1;
                    report.rows.push(outcome);
                    continue;
                }
            }
            match insert_parent_credential(store, row, &parent_id) {
                Ok(()) => outcome.credential_created = true,
                Err(e) => {
                    outcome.error = Some(e);
                    report.failure_count += 1;
                    report.rows.push(outcome);
                    continue;
                }
            }
        }

        report.success_count += 1;
        report.rows.push(outcome);
    }

    report
}

fn student_id(row: &ImportRow) -> Result<i64, String> {
    row.id
        .trim()
        .parse::<i64>()
        .map_err(|_| format!("invalid student id: {}", row.id))
}

fn insert_student(store: &dyn RecordStore, row: &ImportRow, parent_id: &str) -> Result<(), String> {
    let id = student_id(row)?;
    let mut rec = Record::new();
    rec.insert("id".into(), json!(id));
    rec.insert("name".into(), json!(row.name));
    rec.insert("class".into(), json!(row.class_label));
    rec.insert("parent_id".into(), json!(parent_id));
    rec.insert("status".into(), json!("active"));
    store
        .insert("students", &[rec])
        .map(|_| ())
        .map_err(|e| e.to_string())
}

fn insert_parent(store: &dyn RecordStore, row: &ImportRow, parent_id: &str) -> Result<(), String> {
    let id = student_id(row)?;
    let mut rec = Record::new();
    rec.insert("id".into(), json!(parent_id));
    rec.insert("name".into(), json!(row.parent_name));
    rec.insert("student_id".into(), json!(id));
    let phone = if row.parent_phone.is_empty() {
        serde_json::Value::Null
    } else {
        json!(row.parent_phone)
    };
    rec.insert("phone".into(), phone);
    store
        .insert("parents", &[rec])
        .map(|_| ())
        .map_err(|e| e.to_string())
}

fn insert_parent_credential(
    store: &dyn RecordStore,
    row: &ImportRow,
    parent_id: &str,
) -> Result<(), String> {
    let mut rec = Record::new();
    rec.insert("username".into(), json!(parent_id));
    rec.insert("password".into(), json!(DEFAULT_PARENT_PASSWORD));
    rec.insert("name".into(), json!(row.parent_name));
    rec.insert("role".into(), json!("parent"));
    store
        .insert("users", &[rec])
        .map(|_| ())
        .map_err(|e| e.to_string())
}

/// Idle -> Parsed -> (Confirmed | Cancelled). Parsed rows wait here for
/// operator confirmation; confirming or cancelling returns to Idle.
#[derive(Debug, Default)]
pub struct RosterImporter {
    pending: Option<Vec<ImportRow>>,
}

impl RosterImporter {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn parse(&mut self, text: &str) -> Result<Vec<ImportRow>, ImportError> {
        let rows = parse_roster(text)?;
        self.pending = Some(rows.clone());
        Ok(rows)
    }

    pub fn confirm(&mut self, store: &dyn RecordStore) -> Option<ImportReport> {
        let rows = self.pending.take()?;
        Some(import_rows(store, &rows))
    }

    pub fn cancel(&mut self) {
        self.pending = None;
    }
}
