use rusqlite::Connection;
use std::path::Path;

pub const DB_FILE_NAME: &str = "timetable.sqlite3";

/// Weekday keys in the order the admin panel renders them. Stored days and
/// `schedules.find` responses both follow this order.
pub const DAY_NAMES: [&str; 7] = [
    "Monday",
    "Tuesday",
    "Wednesday",
    "Thursday",
    "Friday",
    "Saturday",
    "Sunday",
];

pub fn is_day_name(name: &str) -> bool {
    DAY_NAMES.contains(&name)
}

pub fn open_db(workspace: &Path) -> anyhow::Result<Connection> {
    std::fs::create_dir_all(workspace)?;
    let db_path = workspace.join(DB_FILE_NAME);
    let conn = Connection::open(db_path)?;
    conn.execute("PRAGMA foreign_keys = ON", [])?;

    conn.execute(
        "CREATE TABLE IF NOT EXISTS schedules(
            id TEXT PRIMARY KEY,
            university TEXT NOT NULL,
            program TEXT NOT NULL,
            semester TEXT NOT NULL,
            section TEXT NOT NULL,
            created_at TEXT,
            updated_at TEXT
        )",
        [],
    )?;

    // One row per non-empty day; the entry array is stored in the panel's
    // wire format so find can hand it back unchanged.
    conn.execute(
        "CREATE TABLE IF NOT EXISTS schedule_days(
            schedule_id TEXT NOT NULL,
            day TEXT NOT NULL,
            entries_json TEXT NOT NULL,
            PRIMARY KEY(schedule_id, day),
            FOREIGN KEY(schedule_id) REFERENCES schedules(id)
        )",
        [],
    )?;
    conn.execute(
        "CREATE INDEX IF NOT EXISTS idx_schedule_days_schedule ON schedule_days(schedule_id)",
        [],
    )?;

    Ok(conn)
}
