use crate::ipc::error::{err, ok};
use crate::ipc::types::{AppState, Request};
use crate::slots::{self, ClassKind, DaySchedule, EditField, ScheduleError};
use serde_json::json;

// The editor methods are stateless: the UI sends the day it is editing and
// replaces its copy wholesale with the repaired day we send back.

fn slot_err(req: &Request, e: ScheduleError) -> serde_json::Value {
    let details = match &e {
        ScheduleError::MissingRequiredField { index, field } => {
            Some(json!({ "index": index, "field": field }))
        }
        ScheduleError::IndexOutOfRange { index, len } => {
            Some(json!({ "index": index, "len": len }))
        }
        ScheduleError::InvalidSlotReference { .. } => None,
    };
    err(&req.id, e.code(), e.to_string(), details)
}

fn parse_day(req: &Request) -> Result<DaySchedule, serde_json::Value> {
    let Some(raw) = req.params.get("day") else {
        return Err(err(&req.id, "bad_params", "missing day", None));
    };
    if !raw.is_array() {
        return Err(err(&req.id, "bad_params", "day must be an array", None));
    }
    serde_json::from_value(raw.clone())
        .map_err(|e| err(&req.id, "bad_params", format!("day: {}", e), None))
}

fn required_index(req: &Request) -> Result<usize, serde_json::Value> {
    req.params
        .get("index")
        .and_then(|v| v.as_u64())
        .map(|v| v as usize)
        .ok_or_else(|| err(&req.id, "bad_params", "missing index", None))
}

fn parse_edit(req: &Request) -> Result<EditField, serde_json::Value> {
    let Some(field) = req.params.get("field").and_then(|v| v.as_str()) else {
        return Err(err(&req.id, "bad_params", "missing field", None));
    };
    let value = req.params.get("value");

    let as_str = |key: &str| -> Result<String, serde_json::Value> {
        value
            .and_then(|v| v.as_str())
            .map(|s| s.to_string())
            .ok_or_else(|| err(&req.id, "bad_params", format!("{} must be string", key), None))
    };

    match field {
        "period" => {
            let Some(n) = value.and_then(|v| v.as_i64()) else {
                return Err(err(&req.id, "bad_params", "period must be integer", None));
            };
            Ok(EditField::Period(n))
        }
        "startTime" => {
            let raw = as_str("startTime")?;
            slots::parse_slot_time(&raw)
                .map(EditField::StartTime)
                .map_err(|e| slot_err(req, e))
        }
        "duration" => {
            let Some(n) = value.and_then(|v| v.as_i64()) else {
                return Err(err(&req.id, "bad_params", "duration must be integer", None));
            };
            if n < 1 {
                return Err(err(&req.id, "bad_params", "duration must be >= 1", None));
            }
            Ok(EditField::Duration(n))
        }
        "courseName" => Ok(EditField::CourseName(as_str("courseName")?)),
        "instructor" => Ok(EditField::Instructor(as_str("instructor")?)),
        "room" => Ok(EditField::Room(as_str("room")?)),
        "group" => Ok(EditField::Group(as_str("group")?)),
        "classType" => {
            let raw = as_str("classType")?;
            let kind = match raw.as_str() {
                "Theory" => ClassKind::Theory,
                "Lab" => ClassKind::Lab,
                "Free" => ClassKind::Free,
                _ => {
                    return Err(err(
                        &req.id,
                        "bad_params",
                        "classType must be one of: Theory, Lab, Free",
                        None,
                    ))
                }
            };
            Ok(EditField::Kind(kind))
        }
        other => Err(err(
            &req.id,
            "bad_params",
            format!("unknown field: {}", other),
            None,
        )),
    }
}

fn day_result(req: &Request, day: &DaySchedule) -> serde_json::Value {
    match serde_json::to_value(day) {
        Ok(v) => ok(&req.id, json!({ "day": v })),
        Err(e) => err(&req.id, "internal", e.to_string(), None),
    }
}

fn handle_slots_list(req: &Request) -> serde_json::Value {
    match serde_json::to_value(slots::period_slots()) {
        Ok(v) => ok(&req.id, json!({ "slots": v })),
        Err(e) => err(&req.id, "internal", e.to_string(), None),
    }
}

fn handle_apply_edit(req: &Request) -> serde_json::Value {
    let day = match parse_day(req) {
        Ok(v) => v,
        Err(e) => return e,
    };
    let index = match required_index(req) {
        Ok(v) => v,
        Err(e) => return e,
    };
    let edit = match parse_edit(req) {
        Ok(v) => v,
        Err(e) => return e,
    };
    match slots::apply_field_edit(day, index, edit) {
        Ok(day) => day_result(req, &day),
        Err(e) => slot_err(req, e),
    }
}

fn handle_append_class(req: &Request) -> serde_json::Value {
    let day = match parse_day(req) {
        Ok(v) => v,
        Err(e) => return e,
    };
    match slots::append_class(day) {
        Ok(day) => day_result(req, &day),
        Err(e) => slot_err(req, e),
    }
}

fn handle_remove_class(req: &Request) -> serde_json::Value {
    let day = match parse_day(req) {
        Ok(v) => v,
        Err(e) => return e,
    };
    let index = match required_index(req) {
        Ok(v) => v,
        Err(e) => return e,
    };
    match slots::remove_class(day, index) {
        Ok(day) => day_result(req, &day),
        Err(e) => slot_err(req, e),
    }
}

fn handle_validate(req: &Request) -> serde_json::Value {
    let day = match parse_day(req) {
        Ok(v) => v,
        Err(e) => return e,
    };
    match slots::validate_for_submit(&day) {
        Ok(()) => ok(&req.id, json!({ "valid": true })),
        Err(e) => slot_err(req, e),
    }
}

pub fn try_handle(_state: &mut AppState, req: &Request) -> Option<serde_json::Value> {
    match req.method.as_str() {
        "slots.list" => Some(handle_slots_list(req)),
        "schedule.applyEdit" => Some(handle_apply_edit(req)),
        "schedule.appendClass" => Some(handle_append_class(req)),
        "schedule.removeClass" => Some(handle_remove_class(req)),
        "schedule.validate" => Some(handle_validate(req)),
        _ => None,
    }
}
