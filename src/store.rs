use crate::db;
use rusqlite::types::{Value as SqlValue, ValueRef};
use rusqlite::{params_from_iter, Connection};
use serde_json::{Map, Value};
use std::fmt;
use uuid::Uuid;

/// One stored row, keyed by column name.
pub type Record = Map<String, Value>;

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum StoreErrorKind {
    /// Uniqueness or other constraint violation.
    Conflict,
    /// Unknown table or column.
    Schema,
    /// Any other backend failure.
    Backend,
}

#[derive(Debug, Clone)]
pub struct StoreError {
    pub kind: StoreErrorKind,
    pub message: String,
}

impl StoreError {
    pub fn schema(message: impl Into<String>) -> Self {
        Self {
            kind: StoreErrorKind::Schema,
            message: message.into(),
        }
    }

    pub fn kind_str(&self) -> &'static str {
        match self.kind {
            StoreErrorKind::Conflict => "conflict",
            StoreErrorKind::Schema => "schema",
            StoreErrorKind::Backend => "backend",
        }
    }
}

impl fmt::Display for StoreError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.message)
    }
}

impl std::error::Error for StoreError {}

/// Column-equality predicate. Filters on a query are conjunctive.
#[derive(Debug, Clone)]
pub struct Filter {
    pub column: String,
    pub value: Value,
}

impl Filter {
    pub fn eq(column: impl Into<String>, value: Value) -> Self {
        Self {
            column: column.into(),
            value,
        }
    }
}

#[derive(Debug, Clone)]
pub struct OrderBy {
    pub column: String,
    pub ascending: bool,
}

#[derive(Debug, Clone, Default)]
pub struct Query {
    pub filters: Vec<Filter>,
    pub order: Option<OrderBy>,
    pub limit: Option<i64>,
}

/// The hosted record store: equality-filtered reads plus row-level writes
/// over named tables. Every call is a single operation; a failure is an
/// error of that operation only.
pub trait RecordStore {
    fn query(&self, table: &str, query: &Query) -> Result<Vec<Record>, StoreError>;
    fn insert(&self, table: &str, rows: &[Record]) -> Result<Vec<Record>, StoreError>;
    fn update(
        &self,
        table: &str,
        filters: &[Filter],
        changes: &Record,
    ) -> Result<Vec<Record>, StoreError>;
    fn delete(&self, table: &str, filters: &[Filter]) -> Result<usize, StoreError>;
}

pub struct SqliteStore {
    conn: Connection,
}

impl SqliteStore {
    pub fn new(conn: Connection) -> Self {
        Self { conn }
    }

    fn columns(&self, table: &str) -> Result<Vec<String>, StoreError> {
        if !db::TABLES.contains(&table) {
            return Err(StoreError::schema(format!("unknown table: {}", table)));
        }
        let sql = format!("PRAGMA table_info({})", table);
        let mut stmt = self.conn.prepare(&sql).map_err(map_sqlite)?;
        let names = stmt
            .query_map([], |row| row.get::<_, String>(1))
            .and_then(|it| it.collect::<Result<Vec<_>, _>>())
            .map_err(map_sqlite)?;
        Ok(names)
    }

    fn fetch(&self, sql: &str, params: Vec<SqlValue>) -> Result<Vec<Record>, StoreError> {
        let mut stmt = self.conn.prepare(sql).map_err(map_sqlite)?;
        let cols: Vec<String> = stmt.column_names().iter().map(|s| s.to_string()).collect();
        stmt.query_map(params_from_iter(params), |row| {
            let mut rec = Record::new();
            for (i, name) in cols.iter().enumerate() {
                rec.insert(name.clone(), value_ref_to_json(row.get_ref(i)?));
            }
            Ok(rec)
        })
        .and_then(|it| it.collect::<Result<Vec<_>, _>>())
        .map_err(map_sqlite)
    }

    fn select(
        &self,
        table: &str,
        filters: &[Filter],
        order: Option<&OrderBy>,
        limit: Option<i64>,
    ) -> Result<Vec<Record>, StoreError> {
        let cols = self.columns(table)?;
        let mut sql = format!("SELECT * FROM {}", table);
        let mut params: Vec<SqlValue> = Vec::new();
        append_where(&mut sql, &mut params, &cols, filters)?;
        if let Some(o) = order {
            check_column(&cols, table, &o.column)?;
            sql.push_str(&format!(
                " ORDER BY {} {}",
                o.column,
                if o.ascending { "ASC" } else { "DESC" }
            ));
        }
        if let Some(n) = limit {
            sql.push_str(" LIMIT ?");
            params.push(SqlValue::Integer(n));
        }
        self.fetch(&sql, params)
    }
}

impl RecordStore for SqliteStore {
    fn query(&self, table: &str, query: &Query) -> Result<Vec<Record>, StoreError> {
        self.select(table, &query.filters, query.order.as_ref(), query.limit)
    }

    fn insert(&self, table: &str, rows: &[Record]) -> Result<Vec<Record>, StoreError> {
        let cols = self.columns(table)?;
        let tx = self.conn.unchecked_transaction().map_err(map_sqlite)?;

        let mut stored = Vec::with_capacity(rows.len());
        for row in rows {
            let mut row = row.clone();
            // The hosted backend assigns missing row ids; do the same.
            if cols.iter().any(|c| c == "id") && !row.contains_key("id") {
                row.insert("id".to_string(), Value::String(Uuid::new_v4().to_string()));
            }
            if row.is_empty() {
                return Err(StoreError::schema("empty record"));
            }

            let mut names = Vec::with_capacity(row.len());
            let mut params: Vec<SqlValue> = Vec::with_capacity(row.len());
            for (name, value) in &row {
                check_column(&cols, table, name)?;
                names.push(name.as_str());
                params.push(json_to_sql(value));
            }
            let placeholders = vec!["?"; names.len()].join(", ");
            let sql = format!(
                "INSERT INTO {}({}) VALUES({})",
                table,
                names.join(", "),
                placeholders
            );
            tx.execute(&sql, params_from_iter(params)).map_err(map_sqlite)?;

            let rowid = tx.last_insert_rowid();
            let sql = format!("SELECT * FROM {} WHERE rowid = ?", table);
            let mut stmt = tx.prepare(&sql).map_err(map_sqlite)?;
            let names: Vec<String> = stmt.column_names().iter().map(|s| s.to_string()).collect();
            let rec = stmt
                .query_row([rowid], |r| {
                    let mut rec = Record::new();
                    for (i, name) in names.iter().enumerate() {
                        rec.insert(name.clone(), value_ref_to_json(r.get_ref(i)?));
                    }
                    Ok(rec)
                })
                .map_err(map_sqlite)?;
            stored.push(rec);
        }

        tx.commit().map_err(map_sqlite)?;
        Ok(stored)
    }

    fn update(
        &self,
        table: &str,
        filters: &[Filter],
        changes: &Record,
    ) -> Result<Vec<Record>, StoreError> {
        let cols = self.columns(table)?;
        if changes.is_empty() {
            return Err(StoreError::schema("empty update"));
        }

        let mut sets = Vec::with_capacity(changes.len());
        let mut params: Vec<SqlValue> = Vec::new();
        for (name, value) in changes {
            check_column(&cols, table, name)?;
            sets.push(format!("{} = ?", name));
            params.push(json_to_sql(value));
        }
        let mut sql = format!("UPDATE {} SET {}", table, sets.join(", "));
        append_where(&mut sql, &mut params, &cols, filters)?;
        self.conn
            .execute(&sql, params_from_iter(params))
            .map_err(map_sqlite)?;

        self.select(table, filters, None, None)
    }

    fn delete(&self, table: &str, filters: &[Filter]) -> Result<usize, StoreError> {
        let cols = self.columns(table)?;
        let mut sql = format!("DELETE FROM {}", table);
        let mut params: Vec<SqlValue> = Vec::new();
        append_where(&mut sql, &mut params, &cols, filters)?;
        self.conn
            .execute(&sql, params_from_iter(params))
            .map_err(map_sqlite)
    }
}

fn append_where(
    sql: &mut String,
    params: &mut Vec<SqlValue>,
    cols: &[String],
    filters: &[Filter],
) -> Result<(), StoreError> {
    let mut clauses = Vec::with_capacity(filters.len());
    for f in filters {
        if !cols.iter().any(|c| c == &f.column) {
            return Err(StoreError::schema(format!("unknown column: {}", f.column)));
        }
        clauses.push(format!("{} = ?", f.column));
        params.push(json_to_sql(&f.value));
    }
    if !clauses.is_empty() {
        sql.push_str(" WHERE ");
        sql.push_str(&clauses.join(" AND "));
    }
    Ok(())
}

fn check_column(cols: &[String], table: &str, name: &str) -> Result<(), StoreError> {
    if cols.iter().any(|c| c == name) {
        Ok(())
    } else {
        Err(StoreError::schema(format!(
            "unknown column {} on {}",
            name, table
        )))
    }
}

fn json_to_sql(value: &Value) -> SqlValue {
    match value {
        Value::Null => SqlValue::Null,
        Value::Bool(b) => SqlValue::Integer(i64::from(*b)),
        Value::Number(n) => {
            if let Some(i) = n.as_i64() {
                SqlValue::Integer(i)
            } else {
                SqlValue::Real(n.as_f64().unwrap_or(0.0))
            }
        }
        Value::String(s) => SqlValue::Text(s.clone()),
        // JSON-valued columns (e.g. timetable periods) are stored serialized.
        other => SqlValue::Text(other.to_string()),
    }
}

fn value_ref_to_json(value: ValueRef<'_>) -> Value {
    match value {
        ValueRef::Null => Value::Null,
        ValueRef::Integer(i) => Value::from(i),
        ValueRef::Real(f) => serde_json::Number::from_f64(f)
            .map(Value::Number)
            .unwrap_or(Value::Null),
        ValueRef::Text(t) => Value::String(String::from_utf8_lossy(t).into_owned()),
        ValueRef::Blob(_) => Value::Null,
    }
}

fn map_sqlite(e: rusqlite::Error) -> StoreError {
    let kind = match &e {
        rusqlite::Error::SqliteFailure(f, _)
            if f.code == rusqlite::ErrorCode::ConstraintViolation =>
        {
            StoreErrorKind::Conflict
        }
        _ => StoreErrorKind::Backend,
    };
    StoreError {
        kind,
        message: e.to_string(),
    }
}
