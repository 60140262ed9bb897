//! Cross-source conflict detection and resolution policies.

use std::cmp::{max, min};

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use serde_json::Value;
use utoipa::ToSchema;
use uuid::Uuid;

use crate::domain::{AirlineFlightData, FlightField, FlightIdentity, FlightRecord};

/// Policy for settling disagreements between two sources.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Hash, Serialize, Deserialize, ToSchema)]
#[serde(rename_all = "SCREAMING_SNAKE_CASE")]
pub enum ConflictResolutionMode {
    /// The lower-priority-number source wins.
    #[default]
    Priority,
    /// Field-specific heuristics pick a value.
    Automatic,
    /// Keep the stored value and wait for an operator.
    Manual,
}

impl std::str::FromStr for ConflictResolutionMode {
    type Err = String;

    fn from_str(value: &str) -> Result<Self, Self::Err> {
        match value.trim().to_ascii_uppercase().as_str() {
            "PRIORITY" => Ok(Self::Priority),
            "AUTOMATIC" => Ok(Self::Automatic),
            "MANUAL" => Ok(Self::Manual),
            other => Err(format!("unknown conflict resolution mode: {other}")),
        }
    }
}

/// Outcome recorded on a resolved conflict.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize, ToSchema)]
#[serde(rename_all = "camelCase")]
pub struct ConflictResolution {
    pub mode: ConflictResolutionMode,
    pub resolved_value: Value,
    /// Source whose value won, when the value came from one.
    pub resolved_source: Option<String>,
    pub resolved_at: DateTime<Utc>,
}

/// One field on which two sources disagree.
///
/// `current_value` came from `source1` (the row's last writer) and
/// `new_value` from `source2` (the incoming snapshot).
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize, ToSchema)]
#[serde(rename_all = "camelCase")]
pub struct FlightDataConflict {
    pub id: Uuid,
    pub flight: FlightIdentity,
    pub field: FlightField,
    pub current_value: Value,
    pub new_value: Value,
    pub source1: String,
    pub source2: String,
    pub detected_at: DateTime<Utc>,
    pub resolution: Option<ConflictResolution>,
}

/// Monitored fields on which `incoming` disagrees with a row last written by
/// a different source. Same-source updates are never conflicts.
pub fn detect_conflicts(
    record: &FlightRecord,
    incoming: &AirlineFlightData,
    now: DateTime<Utc>,
) -> Vec<FlightDataConflict> {
    if record.data_source == incoming.source {
        return Vec::new();
    }

    FlightField::MONITORED
        .into_iter()
        .filter_map(|field| {
            let current_value = field.read_record(record);
            let new_value = field.read_data(incoming);
            (current_value != new_value).then(|| FlightDataConflict {
                id: Uuid::new_v4(),
                flight: record.identity(),
                field,
                current_value,
                new_value,
                source1: record.data_source.clone(),
                source2: incoming.source.clone(),
                detected_at: now,
                resolution: None,
            })
        })
        .collect()
}

/// Value chosen in PRIORITY mode and the source it came from.
///
/// The source with the numerically lower priority wins; ties keep the
/// current value.
pub fn resolve_by_priority(
    conflict: &FlightDataConflict,
    priority_of: impl Fn(&str) -> u32,
) -> (Value, String) {
    if priority_of(&conflict.source2) < priority_of(&conflict.source1) {
        (conflict.new_value.clone(), conflict.source2.clone())
    } else {
        (conflict.current_value.clone(), conflict.source1.clone())
    }
}

/// Value chosen in AUTOMATIC mode.
///
/// `delayMinutes` takes the larger delay, `seatsAvailable` the smaller count,
/// and `gate` the new value unless it is empty. Every other field keeps the
/// current value.
pub fn resolve_automatically(conflict: &FlightDataConflict) -> Value {
    let current = &conflict.current_value;
    let incoming = &conflict.new_value;
    match conflict.field {
        FlightField::DelayMinutes => pick_number(current, incoming, max),
        FlightField::SeatsAvailable => pick_number(current, incoming, min),
        FlightField::Gate => {
            if incoming.as_str().is_some_and(|gate| !gate.trim().is_empty()) {
                incoming.clone()
            } else {
                current.clone()
            }
        }
        FlightField::Status | FlightField::Terminal | FlightField::PriceCents => current.clone(),
    }
}

fn pick_number(current: &Value, incoming: &Value, choose: fn(u64, u64) -> u64) -> Value {
    match (current.as_u64(), incoming.as_u64()) {
        (Some(left), Some(right)) => Value::from(choose(left, right)),
        (Some(_), None) => current.clone(),
        (None, Some(_)) => incoming.clone(),
        (None, None) => current.clone(),
    }
}

#[cfg(test)]
mod tests {
    //! Resolution policy coverage.

    use super::*;
    use chrono::TimeZone;
    use rstest::{fixture, rstest};
    use serde_json::json;

    #[fixture]
    fn now() -> DateTime<Utc> {
        Utc.with_ymd_and_hms(2026, 2, 25, 8, 0, 0)
            .single()
            .expect("valid now")
    }

    fn conflict(
        field: FlightField,
        current: Value,
        new: Value,
        now: DateTime<Utc>,
    ) -> FlightDataConflict {
        FlightDataConflict {
            id: Uuid::new_v4(),
            flight: FlightIdentity::new("LH001", "LH", now),
            field,
            current_value: current,
            new_value: new,
            source1: "Lufthansa".to_owned(),
            source2: "Aggregator".to_owned(),
            detected_at: now,
            resolution: None,
        }
    }

    fn priorities(source: &str) -> u32 {
        match source {
            "Lufthansa" => 1,
            "Aggregator" => 2,
            _ => 999,
        }
    }

    #[rstest]
    #[case::current_from_priority_one(false)]
    #[case::new_from_priority_one(true)]
    fn priority_one_value_always_wins(now: DateTime<Utc>, #[case] swap: bool) {
        let mut subject = conflict(FlightField::Gate, json!("A1"), json!("B7"), now);
        if swap {
            std::mem::swap(&mut subject.source1, &mut subject.source2);
        }
        let expected = if swap { json!("B7") } else { json!("A1") };

        let (value, source) = resolve_by_priority(&subject, priorities);
        assert_eq!(value, expected);
        assert_eq!(source, "Lufthansa");
    }

    #[rstest]
    fn priority_ties_keep_current_value(now: DateTime<Utc>) {
        let subject = conflict(FlightField::Gate, json!("A1"), json!("B7"), now);
        let (value, _) = resolve_by_priority(&subject, |_| 3);
        assert_eq!(value, json!("A1"));
    }

    #[rstest]
    #[case(FlightField::DelayMinutes, json!(10), json!(25), json!(25))]
    #[case(FlightField::DelayMinutes, json!(25), json!(10), json!(25))]
    #[case(FlightField::SeatsAvailable, json!(40), json!(12), json!(12))]
    #[case(FlightField::SeatsAvailable, Value::Null, json!(12), json!(12))]
    #[case(FlightField::Gate, json!(""), json!("B7"), json!("B7"))]
    #[case(FlightField::Gate, json!("A1"), json!(""), json!("A1"))]
    #[case(FlightField::Gate, json!("A1"), Value::Null, json!("A1"))]
    #[case(FlightField::Status, json!("SCHEDULED"), json!("DELAYED"), json!("SCHEDULED"))]
    #[case(FlightField::Terminal, json!("1"), json!("2"), json!("1"))]
    fn automatic_heuristics(
        now: DateTime<Utc>,
        #[case] field: FlightField,
        #[case] current: Value,
        #[case] new: Value,
        #[case] expected: Value,
    ) {
        let subject = conflict(field, current, new, now);
        assert_eq!(resolve_automatically(&subject), expected);
    }

    #[rstest]
    #[case("priority", ConflictResolutionMode::Priority)]
    #[case("MANUAL", ConflictResolutionMode::Manual)]
    fn modes_parse_case_insensitively(
        #[case] input: &str,
        #[case] expected: ConflictResolutionMode,
    ) {
        assert_eq!(input.parse::<ConflictResolutionMode>(), Ok(expected));
    }
}
