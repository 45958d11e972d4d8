use chrono::NaiveTime;
use serde::{Deserialize, Serialize};
use std::sync::OnceLock;
use thiserror::Error;

/// `"%H:%M"` (de)serialization for slot-boundary times, the format the
/// admin panel has always sent over the wire.
pub mod slot_time {
    use chrono::NaiveTime;
    use serde::{Deserialize, Deserializer, Serializer};

    pub const FORMAT: &str = "%H:%M";

    pub fn serialize<S: Serializer>(t: &NaiveTime, s: S) -> Result<S::Ok, S::Error> {
        s.serialize_str(&t.format(FORMAT).to_string())
    }

    pub fn deserialize<'de, D: Deserializer<'de>>(d: D) -> Result<NaiveTime, D::Error> {
        let raw = String::deserialize(d)?;
        NaiveTime::parse_from_str(raw.trim(), FORMAT).map_err(serde::de::Error::custom)
    }
}

const FIRST_PERIOD_HOUR: u32 = 8;
const PERIOD_COUNT: u32 = 10;

#[derive(Debug, Clone, Copy, PartialEq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct PeriodSlot {
    pub period: i64,
    #[serde(with = "slot_time")]
    pub start: NaiveTime,
    #[serde(with = "slot_time")]
    pub end: NaiveTime,
}

/// The institutional timetable: ten hourly periods, 08:00 through 18:00.
/// Contiguous: slot[i].end == slot[i+1].start.
pub fn period_slots() -> &'static [PeriodSlot] {
    static SLOTS: OnceLock<Vec<PeriodSlot>> = OnceLock::new();
    SLOTS.get_or_init(|| {
        (0..PERIOD_COUNT)
            .map(|i| PeriodSlot {
                period: i as i64 + 1,
                start: on_the_hour(FIRST_PERIOD_HOUR + i),
                end: on_the_hour(FIRST_PERIOD_HOUR + i + 1),
            })
            .collect()
    })
}

fn on_the_hour(hour: u32) -> NaiveTime {
    NaiveTime::from_hms_opt(hour, 0, 0).expect("slot hour within day")
}

#[derive(Debug, Clone, PartialEq, Error)]
pub enum ScheduleError {
    #[error("no period slot matches {value}")]
    InvalidSlotReference { value: String },
    #[error("no class at index {index} (day has {len})")]
    IndexOutOfRange { index: usize, len: usize },
    #[error("class at index {index} requires {field}")]
    MissingRequiredField { index: usize, field: &'static str },
}

impl ScheduleError {
    pub fn code(&self) -> &'static str {
        match self {
            Self::InvalidSlotReference { .. } => "invalid_slot_reference",
            Self::IndexOutOfRange { .. } => "index_out_of_range",
            Self::MissingRequiredField { .. } => "missing_required_field",
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub enum ClassKind {
    Theory,
    Lab,
    Free,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ClassEntry {
    #[serde(rename = "Period")]
    pub period: i64,
    #[serde(rename = "Start_Time", with = "slot_time")]
    pub start_time: NaiveTime,
    #[serde(rename = "End_Time", with = "slot_time")]
    pub end_time: NaiveTime,
    #[serde(rename = "Course_Name", default)]
    pub course_name: String,
    #[serde(rename = "Instructor", default)]
    pub instructor: String,
    #[serde(rename = "Room", default)]
    pub room: String,
    #[serde(rename = "Group", default = "default_group")]
    pub group: String,
    #[serde(rename = "Class_Duration", default = "default_duration")]
    pub duration: i64,
    #[serde(rename = "Class_type", default = "default_kind")]
    pub kind: ClassKind,
}

fn default_group() -> String {
    "All".to_string()
}

fn default_duration() -> i64 {
    1
}

fn default_kind() -> ClassKind {
    ClassKind::Theory
}

/// One day's classes in chronological order. Owned by the caller; every
/// operation below takes the day by value and returns the repaired day.
pub type DaySchedule = Vec<ClassEntry>;

#[derive(Debug, Clone, PartialEq)]
pub enum EditField {
    Period(i64),
    StartTime(NaiveTime),
    Duration(i64),
    CourseName(String),
    Instructor(String),
    Room(String),
    Group(String),
    Kind(ClassKind),
}

pub fn parse_slot_time(raw: &str) -> Result<NaiveTime, ScheduleError> {
    NaiveTime::parse_from_str(raw.trim(), slot_time::FORMAT).map_err(|_| {
        ScheduleError::InvalidSlotReference {
            value: raw.trim().to_string(),
        }
    })
}

fn format_slot_time(t: NaiveTime) -> String {
    t.format(slot_time::FORMAT).to_string()
}

fn slot_index_for_start(start: NaiveTime) -> Result<usize, ScheduleError> {
    period_slots()
        .iter()
        .position(|s| s.start == start)
        .ok_or_else(|| ScheduleError::InvalidSlotReference {
            value: format_slot_time(start),
        })
}

pub fn slot_for_period(period: i64) -> Result<&'static PeriodSlot, ScheduleError> {
    period_slots()
        .iter()
        .find(|s| s.period == period)
        .ok_or_else(|| ScheduleError::InvalidSlotReference {
            value: format!("period {}", period),
        })
}

/// End boundary for a class starting at `start` and spanning
/// `duration_periods` consecutive slots. The span is clamped at the last
/// slot, so the result is always a defined boundary.
pub fn resolve_end_time(start: NaiveTime, duration_periods: i64) -> Result<NaiveTime, ScheduleError> {
    let slots = period_slots();
    let i = slot_index_for_start(start)?;
    // The admin form never offers a duration below one; treat it as one.
    let span = duration_periods.max(1) as usize;
    let j = (i + span - 1).min(slots.len() - 1);
    Ok(slots[j].end)
}

/// Period number for an exact slot start. Callers must pass canonical
/// boundary times; arbitrary times are rejected.
pub fn resolve_period_for_start(start: NaiveTime) -> Result<i64, ScheduleError> {
    Ok(period_slots()[slot_index_for_start(start)?].period)
}

/// Applies one field edit to the entry at `index` and, when the edit moved
/// the entry's time slot, repairs every later entry so the day stays
/// contiguous. Descriptive fields assign without a cascade.
pub fn apply_field_edit(
    mut day: DaySchedule,
    index: usize,
    edit: EditField,
) -> Result<DaySchedule, ScheduleError> {
    if index >= day.len() {
        return Err(ScheduleError::IndexOutOfRange {
            index,
            len: day.len(),
        });
    }

    let entry = &mut day[index];
    let cascade = match edit {
        EditField::Period(period) => {
            let slot = slot_for_period(period)?;
            entry.period = slot.period;
            entry.start_time = slot.start;
            entry.end_time = resolve_end_time(slot.start, entry.duration)?;
            true
        }
        EditField::StartTime(start) => {
            entry.period = resolve_period_for_start(start)?;
            entry.start_time = start;
            entry.end_time = resolve_end_time(start, entry.duration)?;
            true
        }
        EditField::Duration(duration) => {
            entry.duration = duration.max(1);
            entry.end_time = resolve_end_time(entry.start_time, entry.duration)?;
            true
        }
        EditField::CourseName(v) => {
            entry.course_name = v;
            false
        }
        EditField::Instructor(v) => {
            entry.instructor = v;
            false
        }
        EditField::Room(v) => {
            entry.room = v;
            false
        }
        EditField::Group(v) => {
            entry.group = v;
            false
        }
        EditField::Kind(v) => {
            entry.kind = v;
            false
        }
    };

    if cascade {
        cascade_from(&mut day, index + 1)?;
    }
    Ok(day)
}

// Strictly left-to-right: each step inherits the already-repaired
// predecessor's end time and re-derives period and end from it.
fn cascade_from(day: &mut [ClassEntry], from: usize) -> Result<(), ScheduleError> {
    for k in from.max(1)..day.len() {
        let start = day[k - 1].end_time;
        day[k].start_time = start;
        day[k].period = resolve_period_for_start(start)?;
        day[k].end_time = resolve_end_time(start, day[k].duration)?;
    }
    Ok(())
}

/// Appends a one-period entry starting where the day currently ends, or at
/// the first slot on an empty day. Appending after the last valid entry
/// needs no cascade.
pub fn append_class(mut day: DaySchedule) -> Result<DaySchedule, ScheduleError> {
    let start = match day.last() {
        Some(prev) => prev.end_time,
        None => period_slots()[0].start,
    };
    day.push(ClassEntry {
        period: resolve_period_for_start(start)?,
        start_time: start,
        end_time: resolve_end_time(start, 1)?,
        course_name: String::new(),
        instructor: String::new(),
        room: String::new(),
        group: default_group(),
        duration: 1,
        kind: default_kind(),
    });
    Ok(day)
}

/// Removes the entry at `index`. Later entries keep their times, so a
/// removal from the middle of the day leaves a gap; the admin panel has
/// never re-cascaded here and callers rely on that (see DESIGN.md).
pub fn remove_class(mut day: DaySchedule, index: usize) -> Result<DaySchedule, ScheduleError> {
    if index >= day.len() {
        return Err(ScheduleError::IndexOutOfRange {
            index,
            len: day.len(),
        });
    }
    day.remove(index);
    Ok(day)
}

/// Submit-time check: every non-Free entry needs course, instructor and
/// room. Fails on the first violation found.
pub fn validate_for_submit(day: &[ClassEntry]) -> Result<(), ScheduleError> {
    for (index, entry) in day.iter().enumerate() {
        if entry.kind == ClassKind::Free {
            continue;
        }
        for (field, value) in [
            ("Course_Name", &entry.course_name),
            ("Instructor", &entry.instructor),
            ("Room", &entry.room),
        ] {
            if value.trim().is_empty() {
                return Err(ScheduleError::MissingRequiredField { index, field });
            }
        }
    }
    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;

    fn t(hour: u32, minute: u32) -> NaiveTime {
        NaiveTime::from_hms_opt(hour, minute, 0).expect("test time")
    }

    fn entry(period: i64, duration: i64) -> ClassEntry {
        let slot = slot_for_period(period).expect("test period");
        ClassEntry {
            period,
            start_time: slot.start,
            end_time: resolve_end_time(slot.start, duration).expect("test end"),
            course_name: "Algorithms".to_string(),
            instructor: "Dr. Rao".to_string(),
            room: "201".to_string(),
            group: "All".to_string(),
            duration,
            kind: ClassKind::Theory,
        }
    }

    #[test]
    fn slot_table_is_contiguous() {
        let slots = period_slots();
        assert_eq!(slots.len(), 10);
        assert_eq!(slots[0].start, t(8, 0));
        assert_eq!(slots[9].end, t(18, 0));
        for pair in slots.windows(2) {
            assert_eq!(pair[0].end, pair[1].start);
        }
    }

    #[test]
    fn resolve_end_time_spans_and_clamps() {
        assert_eq!(resolve_end_time(t(8, 0), 1).unwrap(), t(9, 0));
        assert_eq!(resolve_end_time(t(8, 0), 3).unwrap(), t(11, 0));
        // Clamped at the final boundary rather than running past the table.
        assert_eq!(resolve_end_time(t(17, 0), 4).unwrap(), t(18, 0));
        assert_eq!(resolve_end_time(t(8, 0), 99).unwrap(), t(18, 0));
    }

    #[test]
    fn resolve_end_time_never_exceeds_final_boundary() {
        for slot in period_slots() {
            for duration in 1..=12 {
                let end = resolve_end_time(slot.start, duration).unwrap();
                assert!(end <= t(18, 0));
            }
        }
    }

    #[test]
    fn resolve_requires_exact_slot_boundary() {
        let e = resolve_end_time(t(8, 30), 1).unwrap_err();
        assert_eq!(e.code(), "invalid_slot_reference");
        let e = resolve_period_for_start(t(18, 0)).unwrap_err();
        assert_eq!(e, ScheduleError::InvalidSlotReference { value: "18:00".to_string() });
    }

    #[test]
    fn duration_edit_cascades_and_clamps_successor() {
        let day = vec![entry(1, 1), entry(2, 1)];
        let day = apply_field_edit(day, 0, EditField::Duration(2)).unwrap();
        assert_eq!(day[0].end_time, t(10, 0));
        assert_eq!(day[0].period, 1);
        assert_eq!(day[1].start_time, t(10, 0));
        assert_eq!(day[1].period, 3);
        assert_eq!(day[1].end_time, t(11, 0));
    }

    #[test]
    fn period_edit_rewrites_times_and_cascades() {
        let day = vec![entry(1, 1), entry(2, 2), entry(4, 1)];
        let day = apply_field_edit(day, 0, EditField::Period(3)).unwrap();
        assert_eq!(day[0].start_time, t(10, 0));
        assert_eq!(day[0].end_time, t(11, 0));
        assert_eq!(day[1].start_time, t(11, 0));
        assert_eq!(day[1].period, 4);
        assert_eq!(day[1].end_time, t(13, 0));
        assert_eq!(day[2].start_time, t(13, 0));
        assert_eq!(day[2].period, 6);
    }

    #[test]
    fn start_time_edit_resolves_period() {
        let day = vec![entry(1, 1)];
        let day = apply_field_edit(day, 0, EditField::StartTime(t(12, 0))).unwrap();
        assert_eq!(day[0].period, 5);
        assert_eq!(day[0].end_time, t(13, 0));
    }

    #[test]
    fn contiguity_holds_after_any_slot_edit() {
        let day = vec![entry(1, 1), entry(2, 1), entry(3, 1), entry(4, 1)];
        let day = apply_field_edit(day, 1, EditField::Duration(3)).unwrap();
        for pair in day.windows(2) {
            assert_eq!(pair[0].end_time, pair[1].start_time);
        }
    }

    #[test]
    fn re_editing_same_value_is_idempotent() {
        let day = vec![entry(1, 2), entry(3, 1)];
        let once = apply_field_edit(day.clone(), 0, EditField::Duration(2)).unwrap();
        assert_eq!(once, day);
        let twice = apply_field_edit(once.clone(), 0, EditField::Duration(2)).unwrap();
        assert_eq!(twice, once);
    }

    #[test]
    fn descriptive_edits_do_not_touch_times() {
        let day = vec![entry(1, 1), entry(2, 1)];
        let before = day.clone();
        let day = apply_field_edit(day, 0, EditField::Room("Lab 4".to_string())).unwrap();
        assert_eq!(day[0].room, "Lab 4");
        assert_eq!(day[0].start_time, before[0].start_time);
        assert_eq!(day[1], before[1]);
        let day = apply_field_edit(day, 1, EditField::Kind(ClassKind::Free)).unwrap();
        assert_eq!(day[1].start_time, before[1].start_time);
    }

    #[test]
    fn cascade_past_table_end_fails_whole_edit() {
        // Pushing the second entry's start to 18:00 leaves it with no slot.
        let day = vec![entry(9, 1), entry(10, 1)];
        let e = apply_field_edit(day, 0, EditField::Duration(2)).unwrap_err();
        assert_eq!(e.code(), "invalid_slot_reference");
    }

    #[test]
    fn edit_index_out_of_range() {
        let day = vec![entry(1, 1)];
        let e = apply_field_edit(day, 3, EditField::Duration(1)).unwrap_err();
        assert_eq!(e, ScheduleError::IndexOutOfRange { index: 3, len: 1 });
    }

    #[test]
    fn append_to_empty_day_takes_first_slot() {
        let day = append_class(Vec::new()).unwrap();
        assert_eq!(day.len(), 1);
        assert_eq!(day[0].period, 1);
        assert_eq!(day[0].start_time, t(8, 0));
        assert_eq!(day[0].end_time, t(9, 0));
        assert_eq!(day[0].duration, 1);
        assert_eq!(day[0].kind, ClassKind::Theory);
        assert_eq!(day[0].group, "All");
    }

    #[test]
    fn append_inherits_previous_end() {
        let day = append_class(vec![entry(1, 2)]).unwrap();
        assert_eq!(day[1].start_time, t(10, 0));
        assert_eq!(day[1].period, 3);
        assert_eq!(day[1].end_time, t(11, 0));
    }

    #[test]
    fn append_to_full_day_has_no_slot_left() {
        let day = vec![entry(10, 1)];
        let e = append_class(day).unwrap_err();
        assert_eq!(e.code(), "invalid_slot_reference");
    }

    #[test]
    fn remove_keeps_later_times_untouched() {
        let day = vec![entry(1, 1), entry(2, 1), entry(3, 1)];
        let day = remove_class(day, 0).unwrap();
        assert_eq!(day.len(), 2);
        // The gap stays open: the day now starts at 09:00, not 08:00.
        assert_eq!(day[0].start_time, t(9, 0));
        assert_eq!(day[0].period, 2);
        assert_eq!(day[1].start_time, t(10, 0));
    }

    #[test]
    fn remove_index_out_of_range() {
        let e = remove_class(vec![entry(1, 1)], 1).unwrap_err();
        assert_eq!(e, ScheduleError::IndexOutOfRange { index: 1, len: 1 });
    }

    #[test]
    fn validate_flags_first_missing_field() {
        let mut day = vec![entry(1, 1), entry(2, 1)];
        day[0].instructor = String::new();
        day[1].course_name = String::new();
        let e = validate_for_submit(&day).unwrap_err();
        assert_eq!(
            e,
            ScheduleError::MissingRequiredField {
                index: 0,
                field: "Instructor"
            }
        );
    }

    #[test]
    fn validate_exempts_free_periods() {
        let mut day = vec![entry(1, 1)];
        day[0].kind = ClassKind::Free;
        day[0].course_name = String::new();
        day[0].instructor = String::new();
        day[0].room = String::new();
        assert!(validate_for_submit(&day).is_ok());
    }

    #[test]
    fn validate_treats_whitespace_as_missing() {
        let mut day = vec![entry(1, 1)];
        day[0].room = "   ".to_string();
        let e = validate_for_submit(&day).unwrap_err();
        assert_eq!(
            e,
            ScheduleError::MissingRequiredField {
                index: 0,
                field: "Room"
            }
        );
    }

    #[test]
    fn class_entry_wire_format_roundtrip() {
        let raw = serde_json::json!({
            "Period": 2,
            "Start_Time": "09:00",
            "End_Time": "11:00",
            "Course_Name": "Operating Systems",
            "Instructor": "Prof. Sen",
            "Room": "Lab 2",
            "Group": "Group 1",
            "Class_Duration": 2,
            "Class_type": "Lab"
        });
        let parsed: ClassEntry = serde_json::from_value(raw.clone()).expect("parse entry");
        assert_eq!(parsed.period, 2);
        assert_eq!(parsed.start_time, t(9, 0));
        assert_eq!(parsed.kind, ClassKind::Lab);
        let back = serde_json::to_value(&parsed).expect("serialize entry");
        assert_eq!(back, raw);
    }

    #[test]
    fn class_entry_defaults_for_optional_fields() {
        let raw = serde_json::json!({
            "Period": 1,
            "Start_Time": "08:00",
            "End_Time": "09:00"
        });
        let parsed: ClassEntry = serde_json::from_value(raw).expect("parse entry");
        assert_eq!(parsed.group, "All");
        assert_eq!(parsed.duration, 1);
        assert_eq!(parsed.kind, ClassKind::Theory);
        assert_eq!(parsed.course_name, "");
    }
}
