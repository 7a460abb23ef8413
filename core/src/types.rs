//! Domain DTOs for the trip journal API.
//!
//! # Design
//! Field names are snake_case on the wire and in Rust, so serde's default
//! naming already matches the server. Dates are `DateTime<Utc>` and travel as
//! RFC 3339 strings. `*Create` / `*Update` shapes are only ever sent by the
//! client; they also derive `Deserialize` so test vectors can describe them
//! as JSON. The mock-server crate defines its own copies; integration tests
//! catch drift between the two.

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

pub type TripId = i64;
pub type EventId = i64;
pub type MediaId = i64;

/// Credential pair issued by `/register` and `/token`.
#[derive(Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Token {
    pub access_token: String,
    pub token_type: String,
}

impl Token {
    pub fn new(access_token: impl Into<String>, token_type: impl Into<String>) -> Self {
        Self {
            access_token: access_token.into(),
            token_type: token_type.into(),
        }
    }

    /// Value for the `Authorization` header, or `None` when it would be blank.
    pub fn authorization_value(&self) -> Option<String> {
        let value = format!("{} {}", self.token_type, self.access_token);
        let value = value.trim();
        if value.is_empty() {
            None
        } else {
            Some(value.to_string())
        }
    }
}

// Keeps credentials out of logs and panic messages.
impl std::fmt::Debug for Token {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("Token")
            .field("access_token", &"<redacted>")
            .field("token_type", &self.token_type)
            .finish()
    }
}

#[derive(Debug, Clone, PartialEq, Deserialize)]
pub struct Trip {
    pub id: TripId,
    pub name: String,
    pub start_date: DateTime<Utc>,
    pub end_date: DateTime<Utc>,
    #[serde(default)]
    pub events: Vec<Event>,
}

#[derive(Debug, Clone, PartialEq, Deserialize)]
pub struct Event {
    pub id: EventId,
    pub name: String,
    #[serde(default)]
    pub note: Option<String>,
    pub date: DateTime<Utc>,
    #[serde(default)]
    pub location: Option<Location>,
    #[serde(default)]
    pub transition_from_previous: Option<String>,
    #[serde(default)]
    pub medias: Vec<Media>,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Location {
    pub latitude: f64,
    pub longitude: f64,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub address: Option<String>,
}

#[derive(Debug, Clone, PartialEq, Eq, Deserialize)]
pub struct Media {
    pub id: MediaId,
    #[serde(default)]
    pub url: Option<String>,
}

/// Request payload for `POST /trips`.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct TripCreate {
    pub name: String,
    pub start_date: DateTime<Utc>,
    pub end_date: DateTime<Utc>,
}

/// Request payload for `PUT /trips/{id}`. The server replaces all fields.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct TripUpdate {
    pub name: String,
    pub start_date: DateTime<Utc>,
    pub end_date: DateTime<Utc>,
}

/// Request payload for `POST /events`.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct EventCreate {
    pub trip_id: TripId,
    pub name: String,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub note: Option<String>,
    pub date: DateTime<Utc>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub location: Option<Location>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub transition_from_previous: Option<String>,
}

/// Request payload for `PUT /events/{id}`.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct EventUpdate {
    pub name: String,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub note: Option<String>,
    pub date: DateTime<Utc>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub location: Option<Location>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub transition_from_previous: Option<String>,
}

/// Request payload for `POST /media`. `base64_data` is the encoded image.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct MediaCreate {
    pub event_id: EventId,
    pub base64_data: String,
}
