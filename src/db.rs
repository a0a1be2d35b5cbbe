use anyhow::Context;
use chrono::NaiveDate;
use rusqlite::{Connection, Row};
use std::path::Path;
use tracing::{debug, info};

use crate::model::{AttendanceStatus, ClassRecord, Holiday, HolidayKind, Semester, Subject};

pub const DB_FILE: &str = "attendance.sqlite3";

pub fn open_db(workspace: &Path) -> anyhow::Result<Connection> {
    std::fs::create_dir_all(workspace).with_context(|| {
        format!(
            "failed to create workspace {}",
            workspace.to_string_lossy()
        )
    })?;
    let db_path = workspace.join(DB_FILE);
    let conn = Connection::open(&db_path)?;
    conn.execute("PRAGMA foreign_keys = ON", [])?;

    conn.execute(
        "CREATE TABLE IF NOT EXISTS semesters(
            id TEXT PRIMARY KEY,
            name TEXT NOT NULL,
            start_date TEXT NOT NULL,
            end_date TEXT NOT NULL,
            required_percentage REAL NOT NULL DEFAULT 75,
            owner_id TEXT NOT NULL DEFAULT 'default-user'
        )",
        [],
    )?;
    conn.execute(
        "CREATE INDEX IF NOT EXISTS idx_semesters_owner ON semesters(owner_id)",
        [],
    )?;

    conn.execute(
        "CREATE TABLE IF NOT EXISTS subjects(
            id TEXT PRIMARY KEY,
            semester_id TEXT NOT NULL,
            name TEXT NOT NULL,
            code TEXT NOT NULL,
            teacher TEXT NOT NULL DEFAULT '',
            required_percentage REAL NOT NULL DEFAULT 75,
            FOREIGN KEY(semester_id) REFERENCES semesters(id),
            UNIQUE(semester_id, code)
        )",
        [],
    )?;
    conn.execute(
        "CREATE INDEX IF NOT EXISTS idx_subjects_semester ON subjects(semester_id)",
        [],
    )?;

    conn.execute(
        "CREATE TABLE IF NOT EXISTS classes(
            id TEXT PRIMARY KEY,
            subject_id TEXT NOT NULL,
            date TEXT NOT NULL,
            day_of_week TEXT NOT NULL,
            start_time TEXT NOT NULL,
            end_time TEXT NOT NULL,
            status TEXT NOT NULL DEFAULT 'SCHEDULED',
            FOREIGN KEY(subject_id) REFERENCES subjects(id)
        )",
        [],
    )?;
    // Early workspaces stored classes without free-text notes.
    ensure_classes_notes(&conn)?;
    conn.execute(
        "CREATE INDEX IF NOT EXISTS idx_classes_subject_date ON classes(subject_id, date)",
        [],
    )?;
    conn.execute(
        "CREATE INDEX IF NOT EXISTS idx_classes_date ON classes(date)",
        [],
    )?;

    conn.execute(
        "CREATE TABLE IF NOT EXISTS holidays(
            id TEXT PRIMARY KEY,
            semester_id TEXT NOT NULL,
            date TEXT NOT NULL,
            name TEXT NOT NULL,
            type TEXT NOT NULL DEFAULT 'HOLIDAY',
            FOREIGN KEY(semester_id) REFERENCES semesters(id)
        )",
        [],
    )?;
    conn.execute(
        "CREATE INDEX IF NOT EXISTS idx_holidays_semester ON holidays(semester_id)",
        [],
    )?;

    info!(path = %db_path.display(), "workspace database ready");
    Ok(conn)
}

fn ensure_classes_notes(conn: &Connection) -> anyhow::Result<()> {
    if table_has_column(conn, "classes", "notes")? {
        return Ok(());
    }
    debug!("adding classes.notes column");
    conn.execute("ALTER TABLE classes ADD COLUMN notes TEXT", [])?;
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

fn conversion_err<E>(idx: usize, e: E) -> rusqlite::Error
where
    E: std::error::Error + Send + Sync + 'static,
{
    rusqlite::Error::FromSqlConversionFailure(idx, rusqlite::types::Type::Text, Box::new(e))
}

fn date_at(row: &Row<'_>, idx: usize) -> rusqlite::Result<NaiveDate> {
    let raw: String = row.get(idx)?;
    NaiveDate::parse_from_str(&raw, "%Y-%m-%d").map_err(|e| conversion_err(idx, e))
}

pub const SEMESTER_COLUMNS: &str =
    "id, name, start_date, end_date, required_percentage, owner_id";

pub fn semester_from_row(row: &Row<'_>) -> rusqlite::Result<Semester> {
    Ok(Semester {
        id: row.get(0)?,
        name: row.get(1)?,
        start_date: date_at(row, 2)?,
        end_date: date_at(row, 3)?,
        required_percentage: row.get(4)?,
        owner_id: row.get(5)?,
    })
}

pub const SUBJECT_COLUMNS: &str = "id, name, code, teacher, required_percentage, semester_id";

pub fn subject_from_row(row: &Row<'_>) -> rusqlite::Result<Subject> {
    subject_from_row_at(row, 0)
}

/// Reads the subject columns starting at `offset`, for joined selects.
pub fn subject_from_row_at(row: &Row<'_>, offset: usize) -> rusqlite::Result<Subject> {
    Ok(Subject {
        id: row.get(offset)?,
        name: row.get(offset + 1)?,
        code: row.get(offset + 2)?,
        teacher: row.get(offset + 3)?,
        required_percentage: row.get(offset + 4)?,
        semester_id: row.get(offset + 5)?,
    })
}

pub const CLASS_COLUMNS: &str =
    "id, subject_id, date, day_of_week, start_time, end_time, status, notes";

pub fn class_from_row(row: &Row<'_>) -> rusqlite::Result<ClassRecord> {
    let status_raw: String = row.get(6)?;
    let status = status_raw
        .parse::<AttendanceStatus>()
        .map_err(|e| conversion_err(6, e))?;
    Ok(ClassRecord {
        id: row.get(0)?,
        subject_id: row.get(1)?,
        date: date_at(row, 2)?,
        day_of_week: row.get(3)?,
        start_time: row.get(4)?,
        end_time: row.get(5)?,
        status,
        notes: row.get(7)?,
    })
}

pub const HOLIDAY_COLUMNS: &str = "id, date, name, type, semester_id";

pub fn holiday_from_row(row: &Row<'_>) -> rusqlite::Result<Holiday> {
    let kind_raw: String = row.get(3)?;
    let kind = kind_raw
        .parse::<HolidayKind>()
        .map_err(|e| conversion_err(3, e))?;
    Ok(Holiday {
        id: row.get(0)?,
        date: date_at(row, 1)?,
        name: row.get(2)?,
        kind,
        semester_id: row.get(4)?,
    })
}

pub fn subject_classes(conn: &Connection, subject_id: &str) -> rusqlite::Result<Vec<ClassRecord>> {
    let sql = format!(
        "SELECT {CLASS_COLUMNS} FROM classes WHERE subject_id = ? ORDER BY date, start_time"
    );
    let mut stmt = conn.prepare(&sql)?;
    let rows = stmt
        .query_map([subject_id], class_from_row)?
        .collect::<Result<Vec<_>, _>>();
    rows
}

pub fn semester_subjects(conn: &Connection, semester_id: &str) -> rusqlite::Result<Vec<Subject>> {
    let sql = format!("SELECT {SUBJECT_COLUMNS} FROM subjects WHERE semester_id = ? ORDER BY code");
    let mut stmt = conn.prepare(&sql)?;
    let rows = stmt
        .query_map([semester_id], subject_from_row)?
        .collect::<Result<Vec<_>, _>>();
    rows
}

pub fn semester_holidays(conn: &Connection, semester_id: &str) -> rusqlite::Result<Vec<Holiday>> {
    let sql = format!("SELECT {HOLIDAY_COLUMNS} FROM holidays WHERE semester_id = ? ORDER BY date");
    let mut stmt = conn.prepare(&sql)?;
    let rows = stmt
        .query_map([semester_id], holiday_from_row)?
        .collect::<Result<Vec<_>, _>>();
    rows
}
