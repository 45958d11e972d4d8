use crate::db;
use crate::ipc::error::{err, ok};
use crate::ipc::types::{AppState, Request};
use crate::slots::{self, ClassEntry};
use rusqlite::{params, Connection, OptionalExtension};
use serde_json::{json, Map, Value as JsonValue};
use std::time::{SystemTime, UNIX_EPOCH};

fn db_conn<'a>(state: &'a AppState, req: &Request) -> Result<&'a Connection, serde_json::Value> {
    state
        .db
        .as_ref()
        .ok_or_else(|| err(&req.id, "no_workspace", "select a workspace first", None))
}

fn required_str(req: &Request, key: &str) -> Result<String, serde_json::Value> {
    req.params
        .get(key)
        .and_then(|v| v.as_str())
        .map(|v| v.trim().to_string())
        .filter(|s| !s.is_empty())
        .ok_or_else(|| err(&req.id, "bad_params", format!("missing {}", key), None))
}

fn now_ts() -> String {
    SystemTime::now()
        .duration_since(UNIX_EPOCH)
        .map(|d| d.as_secs().to_string())
        .unwrap_or_else(|_| "0".to_string())
}

// The panel upper-cases university/program/section/semester as the user
// types; do the same here so ids stay stable however the client behaves.
fn identity_field(req: &Request, key: &str) -> Result<String, serde_json::Value> {
    Ok(required_str(req, key)?.to_uppercase())
}

fn composite_id(university: &str, program: &str, semester: &str, section: &str) -> String {
    format!("{}-{}-{}-{}", university, program, semester, section)
}

fn parse_schedule_days(
    req: &Request,
) -> Result<Vec<(String, Vec<ClassEntry>)>, serde_json::Value> {
    let Some(raw) = req.params.get("schedule").and_then(|v| v.as_object()) else {
        return Err(err(&req.id, "bad_params", "missing schedule", None));
    };
    let mut days: Vec<(String, Vec<ClassEntry>)> = Vec::new();
    for (day, value) in raw {
        if !db::is_day_name(day) {
            return Err(err(
                &req.id,
                "bad_params",
                format!("unknown day: {}", day),
                None,
            ));
        }
        let Some(arr) = value.as_array() else {
            return Err(err(
                &req.id,
                "bad_params",
                format!("schedule.{} must be an array", day),
                None,
            ));
        };
        if arr.is_empty() {
            // Empty days are omitted before submission.
            continue;
        }
        let entries: Vec<ClassEntry> = match serde_json::from_value(value.clone()) {
            Ok(v) => v,
            Err(e) => {
                return Err(err(
                    &req.id,
                    "bad_params",
                    format!("schedule.{}: {}", day, e),
                    None,
                ))
            }
        };
        if let Err(e) = slots::validate_for_submit(&entries) {
            let details = match &e {
                slots::ScheduleError::MissingRequiredField { index, field } => {
                    Some(json!({ "day": day, "index": index, "field": field }))
                }
                _ => Some(json!({ "day": day })),
            };
            return Err(err(&req.id, e.code(), format!("{}: {}", day, e), details));
        }
        days.push((day.clone(), entries));
    }
    // Store in the panel's rendering order regardless of the map order the
    // client happened to send.
    days.sort_by_key(|(day, _)| db::DAY_NAMES.iter().position(|d| *d == day.as_str()));
    Ok(days)
}

fn handle_schedules_ids(state: &mut AppState, req: &Request) -> serde_json::Value {
    let conn = match db_conn(state, req) {
        Ok(c) => c,
        Err(e) => return e,
    };
    let mut stmt = match conn.prepare("SELECT id FROM schedules ORDER BY id") {
        Ok(s) => s,
        Err(e) => return err(&req.id, "db_query_failed", e.to_string(), None),
    };
    let ids = match stmt.query_map([], |r| r.get::<_, String>(0)) {
        Ok(rows) => match rows.collect::<Result<Vec<_>, _>>() {
            Ok(v) => v,
            Err(e) => return err(&req.id, "db_query_failed", e.to_string(), None),
        },
        Err(e) => return err(&req.id, "db_query_failed", e.to_string(), None),
    };
    ok(&req.id, json!({ "ids": ids }))
}

fn handle_schedules_find(state: &mut AppState, req: &Request) -> serde_json::Value {
    let conn = match db_conn(state, req) {
        Ok(c) => c,
        Err(e) => return e,
    };
    let id = match required_str(req, "id") {
        Ok(v) => v,
        Err(e) => return e,
    };

    let record = match conn
        .query_row(
            "SELECT university, program, semester, section FROM schedules WHERE id = ?",
            [&id],
            |r| {
                Ok((
                    r.get::<_, String>(0)?,
                    r.get::<_, String>(1)?,
                    r.get::<_, String>(2)?,
                    r.get::<_, String>(3)?,
                ))
            },
        )
        .optional()
    {
        Ok(Some(row)) => row,
        Ok(None) => return err(&req.id, "not_found", "schedule not found", None),
        Err(e) => return err(&req.id, "db_query_failed", e.to_string(), None),
    };

    let mut stmt = match conn.prepare("SELECT day, entries_json FROM schedule_days WHERE schedule_id = ?")
    {
        Ok(s) => s,
        Err(e) => return err(&req.id, "db_query_failed", e.to_string(), None),
    };
    let stored = match stmt.query_map([&id], |r| {
        Ok((r.get::<_, String>(0)?, r.get::<_, String>(1)?))
    }) {
        Ok(rows) => match rows.collect::<Result<Vec<_>, _>>() {
            Ok(v) => v,
            Err(e) => return err(&req.id, "db_query_failed", e.to_string(), None),
        },
        Err(e) => return err(&req.id, "db_query_failed", e.to_string(), None),
    };

    // Every weekday appears in the response; days with no row come back
    // as empty arrays, matching the shape the panel binds its form to.
    let mut schedule = Map::new();
    for day in db::DAY_NAMES {
        schedule.insert(day.to_string(), json!([]));
    }
    for (day, entries_json) in stored {
        let entries: JsonValue = match serde_json::from_str(&entries_json) {
            Ok(v) => v,
            Err(e) => return err(&req.id, "db_query_failed", e.to_string(), None),
        };
        schedule.insert(day, entries);
    }

    ok(
        &req.id,
        json!({
            "id": id,
            "university": record.0,
            "program": record.1,
            "semester": record.2,
            "section": record.3,
            "schedule": JsonValue::Object(schedule),
        }),
    )
}

fn handle_schedules_save(state: &mut AppState, req: &Request) -> serde_json::Value {
    let conn = match db_conn(state, req) {
        Ok(c) => c,
        Err(e) => return e,
    };
    let university = match identity_field(req, "university") {
        Ok(v) => v,
        Err(e) => return e,
    };
    let program = match identity_field(req, "program") {
        Ok(v) => v,
        Err(e) => return e,
    };
    let semester = match identity_field(req, "semester") {
        Ok(v) => v,
        Err(e) => return e,
    };
    let section = match identity_field(req, "section") {
        Ok(v) => v,
        Err(e) => return e,
    };
    let days = match parse_schedule_days(req) {
        Ok(v) => v,
        Err(e) => return e,
    };

    let id = composite_id(&university, &program, &semester, &section);
    let ts = now_ts();

    let tx = match conn.unchecked_transaction() {
        Ok(t) => t,
        Err(e) => return err(&req.id, "db_tx_failed", e.to_string(), None),
    };

    // Create-or-replace keyed by the composite id.
    if let Err(e) = tx.execute(
        "INSERT INTO schedules(id, university, program, semester, section, created_at, updated_at)
         VALUES(?, ?, ?, ?, ?, ?, ?)
         ON CONFLICT(id) DO UPDATE SET
           university = excluded.university,
           program = excluded.program,
           semester = excluded.semester,
           section = excluded.section,
           updated_at = excluded.updated_at",
        params![id, university, program, semester, section, ts, ts],
    ) {
        let _ = tx.rollback();
        return err(&req.id, "db_insert_failed", e.to_string(), None);
    }
    if let Err(e) = tx.execute("DELETE FROM schedule_days WHERE schedule_id = ?", [&id]) {
        let _ = tx.rollback();
        return err(&req.id, "db_update_failed", e.to_string(), None);
    }
    for (day, entries) in &days {
        let entries_json = match serde_json::to_string(entries) {
            Ok(v) => v,
            Err(e) => {
                let _ = tx.rollback();
                return err(&req.id, "internal", e.to_string(), None);
            }
        };
        if let Err(e) = tx.execute(
            "INSERT INTO schedule_days(schedule_id, day, entries_json) VALUES(?, ?, ?)",
            params![id, day, entries_json],
        ) {
            let _ = tx.rollback();
            return err(&req.id, "db_insert_failed", e.to_string(), None);
        }
    }
    if let Err(e) = tx.commit() {
        return err(&req.id, "db_commit_failed", e.to_string(), None);
    }

    ok(&req.id, json!({ "id": id, "dayCount": days.len() }))
}

fn handle_schedules_delete(state: &mut AppState, req: &Request) -> serde_json::Value {
    let conn = match db_conn(state, req) {
        Ok(c) => c,
        Err(e) => return e,
    };
    let id = match required_str(req, "id") {
        Ok(v) => v,
        Err(e) => return e,
    };

    let tx = match conn.unchecked_transaction() {
        Ok(t) => t,
        Err(e) => return err(&req.id, "db_tx_failed", e.to_string(), None),
    };
    if let Err(e) = tx.execute("DELETE FROM schedule_days WHERE schedule_id = ?", [&id]) {
        let _ = tx.rollback();
        return err(&req.id, "db_update_failed", e.to_string(), None);
    }
    let deleted = match tx.execute("DELETE FROM schedules WHERE id = ?", [&id]) {
        Ok(n) => n,
        Err(e) => {
            let _ = tx.rollback();
            return err(&req.id, "db_update_failed", e.to_string(), None);
        }
    };
    if deleted == 0 {
        let _ = tx.rollback();
        return err(&req.id, "not_found", "schedule not found", None);
    }
    if let Err(e) = tx.commit() {
        return err(&req.id, "db_commit_failed", e.to_string(), None);
    }
    ok(&req.id, json!({ "ok": true }))
}

pub fn try_handle(state: &mut AppState, req: &Request) -> Option<serde_json::Value> {
    match req.method.as_str() {
        "schedules.ids" => Some(handle_schedules_ids(state, req)),
        "schedules.find" => Some(handle_schedules_find(state, req)),
        "schedules.save" => Some(handle_schedules_save(state, req)),
        "schedules.delete" => Some(handle_schedules_delete(state, req)),
        _ => None,
    }
}
