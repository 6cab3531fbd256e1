//! JSON shapes exchanged with the board API.
//!
//! Every response is wrapped in `{ success, data?, error? }`. Records use the
//! backend's numeric ids and snake_case keys; `storage::mapping` turns them
//! into domain entities.

use crate::error::{MartrelloError, Result};
use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

/// Response envelope used by every endpoint
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(bound(deserialize = "T: Deserialize<'de>"))]
pub struct ApiResponse<T> {
    pub success: bool,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub data: Option<T>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub error: Option<serde_json::Value>,
}

impl<T> ApiResponse<T> {
    pub fn ok(data: T) -> Self {
        Self {
            success: true,
            data: Some(data),
            error: None,
        }
    }

    pub fn failure(message: impl Into<String>) -> Self {
        Self {
            success: false,
            data: None,
            error: Some(serde_json::Value::String(message.into())),
        }
    }

    /// Unwraps the payload; `success:false` or a missing payload is a
    /// persistence failure
    pub fn into_result(self, operation: &str) -> Result<T> {
        if !self.success {
            let reason = match self.error {
                Some(serde_json::Value::String(message)) => message,
                Some(other) => other.to_string(),
                None => "API request failed".to_string(),
            };
            return Err(MartrelloError::persistence(operation, reason));
        }
        self.data
            .ok_or_else(|| MartrelloError::persistence(operation, "response carried no data"))
    }
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct CardRecord {
    pub id: i64,
    pub list_id: i64,
    pub title: String,
    #[serde(default)]
    pub description: String,
    pub position: usize,
    #[serde(default, with = "timestamp")]
    pub created_at: Option<DateTime<Utc>>,
    #[serde(default, with = "timestamp")]
    pub updated_at: Option<DateTime<Utc>>,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ListRecord {
    pub id: i64,
    pub board_id: i64,
    pub title: String,
    pub position: usize,
    #[serde(default, with = "timestamp")]
    pub created_at: Option<DateTime<Utc>>,
    #[serde(default)]
    pub cards: Vec<CardRecord>,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct BoardRecord {
    pub id: i64,
    pub title: String,
    #[serde(default)]
    pub description: String,
    #[serde(default)]
    pub background: String,
    #[serde(default, with = "timestamp")]
    pub created_at: Option<DateTime<Utc>>,
    #[serde(default, with = "timestamp")]
    pub updated_at: Option<DateTime<Utc>>,
    #[serde(default)]
    pub lists: Vec<ListRecord>,
}

/// Body of `PUT /api/lists/:id`
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct ListPatch {
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub title: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub position: Option<usize>,
}

/// Body of `PUT /api/cards/:id`
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct CardPatch {
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub title: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub description: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub position: Option<usize>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub list_id: Option<i64>,
}

/// Body of `PUT /api/boards/:id`
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct BoardPatch {
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub title: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub description: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub background: Option<String>,
}

/// Timestamps arrive either as RFC 3339 or as SQLite's
/// `YYYY-MM-DD HH:MM:SS` (UTC); both are accepted, RFC 3339 is written.
mod timestamp {
    use chrono::{DateTime, NaiveDateTime, Utc};
    use serde::{de::Error, Deserialize, Deserializer, Serializer};

    const SQLITE_FORMAT: &str = "%Y-%m-%d %H:%M:%S";

    pub fn serialize<S>(value: &Option<DateTime<Utc>>, serializer: S) -> Result<S::Ok, S::Error>
    where
        S: Serializer,
    {
        match value {
            Some(ts) => serializer.serialize_str(&ts.to_rfc3339()),
            None => serializer.serialize_none(),
        }
    }

    pub fn deserialize<'de, D>(deserializer: D) -> Result<Option<DateTime<Utc>>, D::Error>
    where
        D: Deserializer<'de>,
    {
        let raw: Option<String> = Option::deserialize(deserializer)?;
        match raw {
            None => Ok(None),
            Some(text) => {
                if let Ok(ts) = DateTime::parse_from_rfc3339(&text) {
                    return Ok(Some(ts.with_timezone(&Utc)));
                }
                NaiveDateTime::parse_from_str(&text, SQLITE_FORMAT)
                    .map(|naive| Some(naive.and_utc()))
                    .map_err(|_| D::Error::custom(format!("invalid timestamp: {}", text)))
            }
        }
    }
}
