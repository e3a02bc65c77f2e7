//! Data-change events.
//!
//! Upstream writers announce changes to the crime data as JSON documents.
//! Events are validated once, here; anything that fails is dropped by the
//! caller with [`CacheError::MalformedEvent`].

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use serde_json::Value;

use crate::error::{CacheError, Result};

/// Kind of write that happened upstream.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum Operation {
    Insert,
    Update,
    Delete,
}

/// A month given either as `"YYYY-MM"` or as a month number.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(untagged)]
pub enum Month {
    Number(u32),
    Text(String),
}

impl Month {
    /// The month number, also for numeric text such as `"3"`.
    pub fn number(&self) -> Option<u32> {
        match self {
            Month::Number(number) => Some(*number),
            Month::Text(text) => text.trim().parse().ok(),
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct Location {
    pub lat: f64,
    pub lng: f64,
}

impl Location {
    /// Latitude within ±90 and longitude within ±180. NaN is never valid.
    pub fn is_valid(&self) -> bool {
        (-90.0..=90.0).contains(&self.lat) && (-180.0..=180.0).contains(&self.lng)
    }
}

/// When the change happened: Unix epoch milliseconds, or an RFC 3339 string.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(untagged)]
pub enum EventTimestamp {
    Millis(i64),
    Rfc3339(DateTime<Utc>),
}

impl EventTimestamp {
    pub fn now() -> Self {
        EventTimestamp::Millis(Utc::now().timestamp_millis())
    }

    pub fn to_datetime(self) -> Option<DateTime<Utc>> {
        match self {
            EventTimestamp::Millis(millis) => DateTime::from_timestamp_millis(millis),
            EventTimestamp::Rfc3339(at) => Some(at),
        }
    }
}

/// What the change touched, as far as the writer knows.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct ChangeMetadata {
    #[serde(default)]
    pub month: Option<Month>,
    #[serde(default)]
    pub year: Option<i32>,
    #[serde(default)]
    pub crime_type: Option<String>,
    #[serde(default)]
    pub location: Option<Location>,
}

/// A change notification from the data source.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct DataChangeEvent {
    pub collection: String,
    pub operation: Operation,
    #[serde(default)]
    pub document_id: Option<String>,
    #[serde(default)]
    pub affected_fields: Option<Vec<String>>,
    #[serde(default)]
    pub metadata: Option<ChangeMetadata>,
    #[serde(default)]
    pub timestamp: Option<EventTimestamp>,
    #[serde(default)]
    pub source: Option<String>,
}

impl DataChangeEvent {
    pub fn new(collection: impl Into<String>, operation: Operation) -> Self {
        Self {
            collection: collection.into(),
            operation,
            document_id: None,
            affected_fields: None,
            metadata: None,
            timestamp: Some(EventTimestamp::now()),
            source: None,
        }
    }

    pub fn with_metadata(mut self, metadata: ChangeMetadata) -> Self {
        self.metadata = Some(metadata);
        self
    }

    pub fn with_document_id(mut self, document_id: impl Into<String>) -> Self {
        self.document_id = Some(document_id.into());
        self
    }

    /// Parses and validates an event received as raw JSON.
    pub fn from_value(value: Value) -> Result<Self> {
        let event: DataChangeEvent =
            serde_json::from_value(value).map_err(|err| CacheError::MalformedEvent(err.to_string()))?;
        event.validate()?;
        Ok(event)
    }

    pub fn validate(&self) -> Result<()> {
        if self.collection.trim().is_empty() {
            return Err(CacheError::MalformedEvent(
                "collection must not be empty".to_string(),
            ));
        }
        if let Some(location) = self.metadata.as_ref().and_then(|m| m.location) {
            if !location.is_valid() {
                return Err(CacheError::MalformedEvent(format!(
                    "location out of range: lat {}, lng {}",
                    location.lat, location.lng
                )));
            }
        }
        Ok(())
    }
}
