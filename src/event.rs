//! # Pitch Events
//!
//! Decoding of the JSON messages sent by the pitch-detection service.
//!
//! ## Accepted shapes
//! ```text
//! {"kind": "onset",   "pitchId": 60, "label": "C4", "timestamp": 12.5}
//! {"type": "note_on", "midi": 60, "note": "C4"}
//! {"type": "note_off", "midi": 60}
//! {"type": "silence_reset"}
//! {"events": [ ...any of the above... ]}
//! [ ...any of the above... ]
//! ```
//!
//! `kind` and `type` are interchangeable, as are `onset`/`note_on`,
//! `release`/`note_off` and `reset`/`silence_reset`. Events without a
//! timestamp are stamped with the time the payload was received.
//! Informational messages (`volume`, `re_trigger`, ...) carry no pitch state
//! and are skipped.

use serde::Deserialize;
use serde_json::Value;
use tracing::{debug, warn};

use crate::error::ScribeError;

/// Largest accepted timestamp magnitude, in seconds. Covers epoch time in
/// milliseconds with room to spare.
pub const MAX_TIMESTAMP: f64 = 1e15;

/// A decoded pitch event
#[derive(Debug, Clone, PartialEq)]
pub enum PitchEvent {
    Onset {
        pitch_id: i32,
        label: String,
        timestamp: f64,
    },
    Release {
        pitch_id: i32,
        timestamp: f64,
    },
    /// Detector lost the signal: every held pitch is abandoned
    Reset { timestamp: f64 },
}

impl PitchEvent {
    pub fn timestamp(&self) -> f64 {
        match self {
            PitchEvent::Onset { timestamp, .. }
            | PitchEvent::Release { timestamp, .. }
            | PitchEvent::Reset { timestamp } => *timestamp,
        }
    }

    pub fn set_timestamp(&mut self, at: f64) {
        match self {
            PitchEvent::Onset { timestamp, .. }
            | PitchEvent::Release { timestamp, .. }
            | PitchEvent::Reset { timestamp } => *timestamp = at,
        }
    }
}

#[derive(Deserialize, Debug)]
#[serde(tag = "type", rename_all = "snake_case")]
enum WireEvent {
    #[serde(alias = "note_on")]
    Onset {
        #[serde(alias = "pitchId", alias = "midi")]
        pitch_id: i32,
        #[serde(alias = "note")]
        label: String,
        timestamp: Option<f64>,
    },
    #[serde(alias = "note_off")]
    Release {
        #[serde(alias = "pitchId", alias = "midi")]
        pitch_id: i32,
        timestamp: Option<f64>,
    },
    #[serde(alias = "silence_reset")]
    Reset { timestamp: Option<f64> },
    #[serde(other)]
    Informational,
}

/// Decode one payload into zero or more events.
///
/// Fails only when the payload as a whole is unusable. Inside a batch, a
/// malformed entry is dropped and logged while the rest are kept.
pub fn decode_payload(payload: &str, received_at: f64) -> Result<Vec<PitchEvent>, ScribeError> {
    let value: Value =
        serde_json::from_str(payload).map_err(|e| ScribeError::MalformedEvent(e.to_string()))?;

    match value {
        Value::Array(items) => Ok(decode_batch(items, received_at)),
        Value::Object(mut map) => match map.remove("events") {
            Some(Value::Array(items)) => Ok(decode_batch(items, received_at)),
            Some(_) => Err(ScribeError::MalformedEvent(
                "\"events\" must be an array".to_string(),
            )),
            None => Ok(decode_event(Value::Object(map), received_at)?
                .into_iter()
                .collect()),
        },
        other => Err(ScribeError::MalformedEvent(format!(
            "expected an event object or array, got {}",
            json_kind(&other)
        ))),
    }
}

fn decode_batch(items: Vec<Value>, received_at: f64) -> Vec<PitchEvent> {
    let mut events = Vec::with_capacity(items.len());
    for item in items {
        match decode_event(item, received_at) {
            Ok(Some(event)) => events.push(event),
            Ok(None) => {}
            Err(e) => warn!(error = %e, "dropping malformed event in batch"),
        }
    }
    events
}

/// Decode a single event object. `Ok(None)` for informational messages.
fn decode_event(mut value: Value, received_at: f64) -> Result<Option<PitchEvent>, ScribeError> {
    if let Value::Object(map) = &mut value {
        if !map.contains_key("type") {
            if let Some(kind) = map.remove("kind") {
                map.insert("type".to_string(), kind);
            }
        }
    }

    let wire: WireEvent =
        serde_json::from_value(value).map_err(|e| ScribeError::MalformedEvent(e.to_string()))?;

    let stamp = |timestamp: Option<f64>| -> Result<f64, ScribeError> {
        match timestamp {
            Some(t) if !t.is_finite() => Err(ScribeError::MalformedEvent(format!(
                "timestamp must be finite, got {}",
                t
            ))),
            Some(t) if t.abs() > MAX_TIMESTAMP => Err(ScribeError::MalformedEvent(format!(
                "timestamp {} is out of range",
                t
            ))),
            Some(t) => Ok(t),
            None => Ok(received_at),
        }
    };

    let event = match wire {
        WireEvent::Onset {
            pitch_id,
            label,
            timestamp,
        } => {
            if label.trim().is_empty() {
                return Err(ScribeError::MalformedEvent(format!(
                    "onset for pitch {} has an empty label",
                    pitch_id
                )));
            }
            PitchEvent::Onset {
                pitch_id,
                label,
                timestamp: stamp(timestamp)?,
            }
        }
        WireEvent::Release {
            pitch_id,
            timestamp,
        } => PitchEvent::Release {
            pitch_id,
            timestamp: stamp(timestamp)?,
        },
        WireEvent::Reset { timestamp } => PitchEvent::Reset {
            timestamp: stamp(timestamp)?,
        },
        WireEvent::Informational => {
            debug!("informational message skipped");
            return Ok(None);
        }
    };
    Ok(Some(event))
}

fn json_kind(value: &Value) -> &'static str {
    match value {
        Value::Null => "null",
        Value::Bool(_) => "a boolean",
        Value::Number(_) => "a number",
        Value::String(_) => "a string",
        Value::Array(_) => "an array",
        Value::Object(_) => "an object",
    }
}
