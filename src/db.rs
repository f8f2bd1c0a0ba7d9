use rusqlite::Connection;
use std::path::Path;

/// Tables the record store is allowed to touch. Anything else is a schema
/// error, never raw SQL.
pub const TABLES: &[&str] = &[
    "users",
    "classes",
    "students",
    "parents",
    "teachers",
    "homework",
    "exam_schedules",
    "exam_results",
    "marks_submissions",
    "timetables",
    "teacher_timetables",
    "teacher_duties",
    "attendance",
    "issues",
    "holidays",
];

pub fn open_db(workspace: &Path) -> anyhow::Result<Connection> {
    std::fs::create_dir_all(workspace)?;
    let db_path = workspace.join("campus.sqlite3");
    let conn = Connection::open(db_path)?;
    conn.execute("PRAGMA foreign_keys = ON", [])?;
    init_schema(&conn)?;
    Ok(conn)
}

pub fn init_schema(conn: &Connection) -> anyhow::Result<()> {
    conn.execute(
        "CREATE TABLE IF NOT EXISTS users(
            username TEXT PRIMARY KEY,
            password TEXT NOT NULL,
            name TEXT NOT NULL,
            role TEXT NOT NULL
        )",
        [],
    )?;

    conn.execute(
        "CREATE TABLE IF NOT EXISTS classes(
            id TEXT PRIMARY KEY,
            name TEXT NOT NULL UNIQUE
        )",
        [],
    )?;

    conn.execute(
        "CREATE TABLE IF NOT EXISTS students(
            id INTEGER PRIMARY KEY,
            name TEXT NOT NULL,
            class TEXT NOT NULL,
            parent_id TEXT,
            status TEXT NOT NULL DEFAULT 'active'
        )",
        [],
    )?;
    conn.execute(
        "CREATE INDEX IF NOT EXISTS idx_students_class ON students(class)",
        [],
    )?;

    conn.execute(
        "CREATE TABLE IF NOT EXISTS parents(
            id TEXT PRIMARY KEY,
            name TEXT NOT NULL,
            student_id INTEGER NOT NULL,
            phone TEXT,
            FOREIGN KEY(student_id) REFERENCES students(id)
        )",
        [],
    )?;
    conn.execute(
        "CREATE INDEX IF NOT EXISTS idx_parents_student ON parents(student_id)",
        [],
    )?;

    conn.execute(
        "CREATE TABLE IF NOT EXISTS teachers(
            id TEXT PRIMARY KEY,
            name TEXT NOT NULL,
            status TEXT NOT NULL DEFAULT 'active'
        )",
        [],
    )?;

    conn.execute(
        "CREATE TABLE IF NOT EXISTS homework(
            id TEXT PRIMARY KEY,
            class TEXT NOT NULL,
            subject TEXT NOT NULL,
            title TEXT NOT NULL,
            description TEXT,
            date TEXT NOT NULL,
            due_date TEXT,
            assigned_by TEXT
        )",
        [],
    )?;
    conn.execute(
        "CREATE INDEX IF NOT EXISTS idx_homework_class ON homework(class)",
        [],
    )?;

    conn.execute(
        "CREATE TABLE IF NOT EXISTS exam_schedules(
            id TEXT PRIMARY KEY,
            class TEXT NOT NULL,
            subject TEXT NOT NULL,
            exam_name TEXT NOT NULL,
            date TEXT NOT NULL,
            time TEXT,
            duration TEXT
        )",
        [],
    )?;
    conn.execute(
        "CREATE INDEX IF NOT EXISTS idx_exam_schedules_class ON exam_schedules(class)",
        [],
    )?;

    conn.execute(
        "CREATE TABLE IF NOT EXISTS exam_results(
            id TEXT PRIMARY KEY,
            student_id INTEGER NOT NULL,
            exam_name TEXT NOT NULL,
            subject TEXT NOT NULL,
            marks REAL NOT NULL,
            total_marks REAL NOT NULL
        )",
        [],
    )?;
    conn.execute(
        "CREATE INDEX IF NOT EXISTS idx_exam_results_student ON exam_results(student_id)",
        [],
    )?;

    conn.execute(
        "CREATE TABLE IF NOT EXISTS marks_submissions(
            id TEXT PRIMARY KEY,
            student_id INTEGER NOT NULL,
            exam_name TEXT NOT NULL,
            subject TEXT NOT NULL,
            marks REAL NOT NULL,
            total_marks REAL NOT NULL,
            remarks TEXT,
            submitted_by TEXT,
            created_at TEXT
        )",
        [],
    )?;
    // Approval workflow columns landed after the base schema. Older
    // workspaces get them on open.
    ensure_marks_submissions_approval(conn)?;
    conn.execute(
        "CREATE INDEX IF NOT EXISTS idx_marks_submissions_student ON marks_submissions(student_id)",
        [],
    )?;

    conn.execute(
        "CREATE TABLE IF NOT EXISTS timetables(
            class TEXT PRIMARY KEY,
            periods TEXT
        )",
        [],
    )?;
    conn.execute(
        "CREATE TABLE IF NOT EXISTS teacher_timetables(
            teacher_id TEXT PRIMARY KEY,
            periods TEXT
        )",
        [],
    )?;

    conn.execute(
        "CREATE TABLE IF NOT EXISTS teacher_duties(
            id TEXT PRIMARY KEY,
            teacher_id TEXT NOT NULL,
            duty_name TEXT NOT NULL,
            duty_date TEXT NOT NULL,
            duty_time TEXT,
            location TEXT
        )",
        [],
    )?;
    conn.execute(
        "CREATE INDEX IF NOT EXISTS idx_teacher_duties_teacher ON teacher_duties(teacher_id)",
        [],
    )?;

    conn.execute(
        "CREATE TABLE IF NOT EXISTS attendance(
            id TEXT PRIMARY KEY,
            student_id INTEGER NOT NULL,
            date TEXT NOT NULL,
            status TEXT NOT NULL
        )",
        [],
    )?;
    conn.execute(
        "CREATE INDEX IF NOT EXISTS idx_attendance_student ON attendance(student_id)",
        [],
    )?;

    conn.execute(
        "CREATE TABLE IF NOT EXISTS issues(
            id TEXT PRIMARY KEY,
            title TEXT NOT NULL,
            description TEXT,
            raised_by TEXT,
            status TEXT NOT NULL DEFAULT 'open',
            created_at TEXT
        )",
        [],
    )?;

    conn.execute(
        "CREATE TABLE IF NOT EXISTS holidays(
            id TEXT PRIMARY KEY,
            name TEXT NOT NULL,
            date TEXT NOT NULL
        )",
        [],
    )?;

    Ok(())
}

fn ensure_marks_submissions_approval(conn: &Connection) -> anyhow::Result<()> {
    if !table_has_column(conn, "marks_submissions", "approved_at")? {
        conn.execute("ALTER TABLE marks_submissions ADD COLUMN approved_at TEXT", [])?;
    }
    if !table_has_column(conn, "marks_submissions", "approved_by")? {
        conn.execute("ALTER TABLE marks_submissions ADD COLUMN approved_by TEXT", [])?;
    }
    Ok(())
}

fn table_has_column(conn: &Connection, table: &str, column: &str) -> anyhow::Result<bool> {
    let sql = format!("PRAGMA table_info({})", table);
    let mut stmt = conn.prepare(&sql)?;
    let mut rows = stmt.query([])?;
    while let Some(row) = rows.next()? {
        let name: String = row.get(1)?;
        if name == column {
            return Ok(true);
        }
    }
    Ok(false)
}
