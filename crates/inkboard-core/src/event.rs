//! Wire events exchanged between clients and the relay.
//!
//! ## Protocol
//!
//! One transport message carries one event, encoded as JSON:
//! ```json
//! [{ "x": 0, "y": 0 }, { "x": 5, "y": 5 }]
//! { "type": "cursor", "x": 10, "y": 20, "userId": "..." }
//! { "type": "welcome", "userId": "..." }
//! { "type": "leave", "userId": "..." }
//! ```
//! A bare array is a finished stroke. Cursor events are sent by clients without
//! `userId`; the relay fills it in. `welcome` and `leave` are only ever sent by
//! the relay.

use std::fmt;

use serde::{Deserialize, Serialize};
use thiserror::Error;
use uuid::Uuid;

use crate::stroke::Stroke;

/// Errors raised while decoding or encoding an event.
#[derive(Debug, Error)]
pub enum EventError {
    #[error("malformed message: {0}")]
    Json(#[from] serde_json::Error),
    #[error("stroke has no points")]
    EmptyStroke,
    #[error("coordinate is not a finite number")]
    NonFiniteCoordinate,
}

/// Identity of one live connection to the relay.
#[derive(Debug, Clone, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
#[serde(transparent)]
pub struct ParticipantId(String);

impl ParticipantId {
    /// Generate a fresh random identity.
    pub fn random() -> Self {
        Self(Uuid::new_v4().to_string())
    }

    pub fn new(id: impl Into<String>) -> Self {
        Self(id.into())
    }

    pub fn as_str(&self) -> &str {
        &self.0
    }
}

impl fmt::Display for ParticipantId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.0)
    }
}

/// Live pointer position of a participant.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct CursorEvent {
    pub x: f64,
    pub y: f64,
    /// Set by the relay before forwarding.
    #[serde(rename = "userId", default, skip_serializing_if = "Option::is_none")]
    pub user_id: Option<ParticipantId>,
}

impl CursorEvent {
    pub fn new(x: f64, y: f64) -> Self {
        Self { x, y, user_id: None }
    }

    /// Attach a participant identity, replacing any existing one.
    pub fn tagged(mut self, user_id: ParticipantId) -> Self {
        self.user_id = Some(user_id);
        self
    }
}

/// A decoded wire event.
#[derive(Debug, Clone, PartialEq)]
pub enum Event {
    /// A finished stroke.
    Stroke(Stroke),
    /// A pointer move.
    Cursor(CursorEvent),
    /// Session identity assigned by the relay to the receiving connection.
    Welcome(ParticipantId),
    /// A participant disconnected from the relay.
    Leave(ParticipantId),
}

/// Object-shaped messages, discriminated by `"type"`.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(tag = "type", rename_all = "snake_case")]
enum Tagged {
    Cursor(CursorEvent),
    Welcome {
        #[serde(rename = "userId")]
        user_id: ParticipantId,
    },
    Leave {
        #[serde(rename = "userId")]
        user_id: ParticipantId,
    },
}

impl From<Tagged> for Event {
    fn from(tagged: Tagged) -> Self {
        match tagged {
            Tagged::Cursor(cursor) => Event::Cursor(cursor),
            Tagged::Welcome { user_id } => Event::Welcome(user_id),
            Tagged::Leave { user_id } => Event::Leave(user_id),
        }
    }
}

impl Event {
    /// Decode one transport message.
    pub fn parse(raw: &str) -> Result<Self, EventError> {
        Self::from_value(serde_json::from_str(raw)?)
    }

    /// Decode a message received from a client.
    ///
    /// Identity is assigned by the relay, so any `userId` on an inbound cursor
    /// is discarded whatever its JSON type.
    pub fn parse_from_client(raw: &str) -> Result<Self, EventError> {
        let mut value: serde_json::Value = serde_json::from_str(raw)?;
        if let Some(object) = value.as_object_mut() {
            if object.get("type").and_then(serde_json::Value::as_str) == Some("cursor") {
                object.remove("userId");
            }
        }
        Self::from_value(value)
    }

    fn from_value(value: serde_json::Value) -> Result<Self, EventError> {
        let event = if value.is_array() {
            Event::Stroke(serde_json::from_value(value)?)
        } else {
            serde_json::from_value::<Tagged>(value)?.into()
        };
        event.validate()?;
        Ok(event)
    }

    /// Encode for the wire.
    pub fn to_json(&self) -> Result<String, EventError> {
        self.validate()?;
        let json = match self {
            Event::Stroke(stroke) => serde_json::to_string(stroke)?,
            Event::Cursor(cursor) => serde_json::to_string(&Tagged::Cursor(cursor.clone()))?,
            Event::Welcome(id) => serde_json::to_string(&Tagged::Welcome {
                user_id: id.clone(),
            })?,
            Event::Leave(id) => serde_json::to_string(&Tagged::Leave {
                user_id: id.clone(),
            })?,
        };
        Ok(json)
    }

    /// Check the invariants JSON decoding alone cannot express.
    pub fn validate(&self) -> Result<(), EventError> {
        match self {
            Event::Stroke(stroke) if stroke.is_empty() => Err(EventError::EmptyStroke),
            Event::Stroke(stroke) if !stroke.is_finite() => Err(EventError::NonFiniteCoordinate),
            Event::Cursor(cursor) if !(cursor.x.is_finite() && cursor.y.is_finite()) => {
                Err(EventError::NonFiniteCoordinate)
            }
            _ => Ok(()),
        }
    }

    /// Short name for log lines.
    pub fn kind(&self) -> &'static str {
        match self {
            Event::Stroke(_) => "stroke",
            Event::Cursor(_) => "cursor",
            Event::Welcome(_) => "welcome",
            Event::Leave(_) => "leave",
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use kurbo::Point;

    #[test]
    fn test_parse_untagged_cursor() {
        let event = Event::parse(r#"{"type":"cursor","x":10,"y":20}"#).unwrap();
        assert_eq!(event, Event::Cursor(CursorEvent::new(10.0, 20.0)));
    }

    #[test]
    fn test_parse_tagged_cursor() {
        let event = Event::parse(r#"{"type":"cursor","x":1.5,"y":2,"userId":"abc"}"#).unwrap();
        match event {
            Event::Cursor(cursor) => {
                assert_eq!(cursor.user_id, Some(ParticipantId::new("abc")));
                assert_eq!((cursor.x, cursor.y), (1.5, 2.0));
            }
            other => panic!("Wrong event: {other:?}"),
        }
    }

    #[test]
    fn test_client_cursor_drops_user_id_of_any_type() {
        for raw in [
            r#"{"type":"cursor","x":1,"y":2,"userId":42}"#,
            r#"{"type":"cursor","x":1,"y":2,"userId":null}"#,
            r#"{"type":"cursor","x":1,"y":2,"userId":{"spoof":true}}"#,
            r#"{"type":"cursor","x":1,"y":2,"userId":"someone-else"}"#,
        ] {
            assert_eq!(
                Event::parse_from_client(raw).unwrap(),
                Event::Cursor(CursorEvent::new(1.0, 2.0)),
                "for {raw:?}"
            );
        }
        // Only client cursors are relaxed; everything else decodes as usual.
        assert!(Event::parse(r#"{"type":"cursor","x":1,"y":2,"userId":42}"#).is_err());
        assert_eq!(
            Event::parse_from_client(r#"{"type":"leave","userId":"gone"}"#).unwrap(),
            Event::Leave(ParticipantId::new("gone"))
        );
        assert!(Event::parse_from_client(r#"{"type":"cursor","x":"1","y":2}"#).is_err());
    }

    #[test]
    fn test_parse_stroke() {
        let event = Event::parse(r#"[{"x":0,"y":0},{"x":5,"y":5},{"x":10,"y":0}]"#).unwrap();
        let expected = Stroke::from_points(vec![
            Point::new(0.0, 0.0),
            Point::new(5.0, 5.0),
            Point::new(10.0, 0.0),
        ]);
        assert_eq!(event, Event::Stroke(expected));
    }

    #[test]
    fn test_parse_welcome_and_leave() {
        assert_eq!(
            Event::parse(r#"{"type":"welcome","userId":"me"}"#).unwrap(),
            Event::Welcome(ParticipantId::new("me"))
        );
        assert_eq!(
            Event::parse(r#"{"type":"leave","userId":"gone"}"#).unwrap(),
            Event::Leave(ParticipantId::new("gone"))
        );
    }

    #[test]
    fn test_parse_rejects_malformed() {
        for raw in [
            "",
            "not json",
            "42",
            r#""cursor""#,
            r#"{"x":1,"y":2}"#,
            r#"{"type":"erase"}"#,
            r#"{"type":"cursor","x":"1","y":2}"#,
            r#"[{"x":1}]"#,
            r#"[1,2,3]"#,
        ] {
            assert!(Event::parse(raw).is_err(), "accepted {raw:?}");
        }
    }

    #[test]
    fn test_parse_rejects_empty_stroke() {
        assert!(matches!(Event::parse("[]"), Err(EventError::EmptyStroke)));
    }

    #[test]
    fn test_cursor_without_user_omits_field() {
        let json = Event::Cursor(CursorEvent::new(10.0, 20.0)).to_json().unwrap();
        let value: serde_json::Value = serde_json::from_str(&json).unwrap();
        assert_eq!(value, serde_json::json!({ "type": "cursor", "x": 10.0, "y": 20.0 }));
    }

    #[test]
    fn test_tagged_cursor_encoding() {
        let cursor = CursorEvent::new(10.0, 20.0).tagged(ParticipantId::new("x-id"));
        let json = Event::Cursor(cursor).to_json().unwrap();
        let value: serde_json::Value = serde_json::from_str(&json).unwrap();
        assert_eq!(
            value,
            serde_json::json!({ "type": "cursor", "x": 10.0, "y": 20.0, "userId": "x-id" })
        );
    }

    #[test]
    fn test_to_json_rejects_non_finite() {
        let event = Event::Cursor(CursorEvent::new(f64::INFINITY, 0.0));
        assert!(matches!(event.to_json(), Err(EventError::NonFiniteCoordinate)));

        let stroke = Stroke::from_points(vec![Point::new(0.0, f64::NAN)]);
        assert!(matches!(
            Event::Stroke(stroke).to_json(),
            Err(EventError::NonFiniteCoordinate)
        ));
    }

    #[test]
    fn test_random_ids_differ() {
        assert_ne!(ParticipantId::random(), ParticipantId::random());
    }
}
