//! Catalog data model: records, version tokens, sync state and deltas.

use chrono::{DateTime, Utc};
use serde::{Deserialize, Deserializer, Serialize};
use std::fmt;

/// Delta statuses that mark a record for removal from the local mirror.
///
/// `DISCONTINUED` is what the medicine master feed emits for soft-deleted rows.
pub const RETIRED_STATUSES: &[&str] = &["RETIRED", "DISCONTINUED"];

/// Wire scalars that identify something: feeds send both `"42"` and `42`.
#[derive(Deserialize)]
#[serde(untagged)]
enum StringOrNumber {
    Str(String),
    Num(serde_json::Number),
}

impl StringOrNumber {
    fn into_string(self) -> String {
        match self {
            StringOrNumber::Str(s) => s,
            StringOrNumber::Num(n) => n.to_string(),
        }
    }
}

/// Stable identifier of a catalog record.
#[derive(Debug, Clone, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize)]
#[serde(transparent)]
pub struct RecordId(String);

impl RecordId {
    pub fn new(id: impl Into<String>) -> Self {
        Self(id.into())
    }

    pub fn as_str(&self) -> &str {
        &self.0
    }
}

impl<'de> Deserialize<'de> for RecordId {
    fn deserialize<D: Deserializer<'de>>(deserializer: D) -> Result<Self, D::Error> {
        let raw = StringOrNumber::deserialize(deserializer)?.into_string();
        if raw.trim().is_empty() {
            return Err(serde::de::Error::custom("record id must not be empty"));
        }
        Ok(Self(raw))
    }
}

impl fmt::Display for RecordId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.0)
    }
}

impl From<&str> for RecordId {
    fn from(s: &str) -> Self {
        Self(s.to_string())
    }
}

impl From<String> for RecordId {
    fn from(s: String) -> Self {
        Self(s)
    }
}

/// Opaque marker for a state of the remote catalog.
///
/// Tokens are compared for equality only. They are deliberately not `Ord`:
/// a different token means "changed", never "newer".
#[derive(Debug, Clone, PartialEq, Eq, Hash, Serialize)]
#[serde(transparent)]
pub struct VersionToken(String);

impl VersionToken {
    pub fn new(token: impl Into<String>) -> Self {
        Self(token.into())
    }

    pub fn as_str(&self) -> &str {
        &self.0
    }
}

impl<'de> Deserialize<'de> for VersionToken {
    fn deserialize<D: Deserializer<'de>>(deserializer: D) -> Result<Self, D::Error> {
        Ok(Self(StringOrNumber::deserialize(deserializer)?.into_string()))
    }
}

impl fmt::Display for VersionToken {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.0)
    }
}

impl From<&str> for VersionToken {
    fn from(s: &str) -> Self {
        Self(s.to_string())
    }
}

fn de_popularity<'de, D: Deserializer<'de>>(deserializer: D) -> Result<u64, D::Error> {
    Ok(Option::<u64>::deserialize(deserializer)?.unwrap_or(0))
}

/// A record in the local catalog mirror.
///
/// Field aliases accept the original medicine feed's naming so either payload
/// shape deserializes into the same record.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct CatalogRecord {
    pub id: RecordId,
    #[serde(alias = "name")]
    pub primary_name: String,
    #[serde(default, alias = "genericName", skip_serializing_if = "Option::is_none")]
    pub secondary_name: Option<String>,
    #[serde(default, alias = "compositionText", skip_serializing_if = "Option::is_none")]
    pub descriptive_text: Option<String>,
    #[serde(default, alias = "manufacturerName", skip_serializing_if = "Option::is_none")]
    pub grouping_name: Option<String>,
    #[serde(default, alias = "packSize", skip_serializing_if = "Option::is_none")]
    pub pack_info: Option<String>,
    #[serde(default, alias = "schedule", skip_serializing_if = "Option::is_none")]
    pub classification_code: Option<String>,
    #[serde(default, alias = "requiresPrescription", skip_serializing_if = "Option::is_none")]
    pub restricted_flag: Option<bool>,
    #[serde(default, alias = "usageCount", deserialize_with = "de_popularity")]
    pub popularity_count: u64,
}

impl CatalogRecord {
    /// Create a record with only the required fields set.
    pub fn new(id: impl Into<RecordId>, primary_name: impl Into<String>) -> Self {
        Self {
            id: id.into(),
            primary_name: primary_name.into(),
            secondary_name: None,
            descriptive_text: None,
            grouping_name: None,
            pack_info: None,
            classification_code: None,
            restricted_flag: None,
            popularity_count: 0,
        }
    }

    pub fn with_secondary_name(mut self, name: impl Into<String>) -> Self {
        self.secondary_name = Some(name.into());
        self
    }

    pub fn with_descriptive_text(mut self, text: impl Into<String>) -> Self {
        self.descriptive_text = Some(text.into());
        self
    }

    pub fn with_grouping_name(mut self, name: impl Into<String>) -> Self {
        self.grouping_name = Some(name.into());
        self
    }

    pub fn with_popularity(mut self, count: u64) -> Self {
        self.popularity_count = count;
        self
    }
}

/// Last committed sync marker.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct SyncState {
    pub version: VersionToken,
    pub last_sync_at: DateTime<Utc>,
}

/// A single change delivered by an incremental sync response.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum DeltaRecord {
    /// Insert or replace the record.
    Upsert(CatalogRecord),
    /// Remove the record from the mirror.
    Retire { id: RecordId },
}

impl DeltaRecord {
    pub fn id(&self) -> &RecordId {
        match self {
            DeltaRecord::Upsert(record) => &record.id,
            DeltaRecord::Retire { id } => id,
        }
    }

    pub fn is_retire(&self) -> bool {
        matches!(self, DeltaRecord::Retire { .. })
    }

    /// Parse one entry of an `updates` array.
    ///
    /// An entry whose `status` is a retire marker only needs an `id`; any other
    /// entry must be a complete record.
    pub fn from_value(value: serde_json::Value) -> Result<Self, String> {
        let obj = value
            .as_object()
            .ok_or_else(|| format!("expected object, got {}", json_type_name(&value)))?;

        let retired = obj
            .get("status")
            .and_then(|s| s.as_str())
            .is_some_and(|s| RETIRED_STATUSES.iter().any(|r| r.eq_ignore_ascii_case(s)));

        if retired {
            let raw_id = obj.get("id").cloned().ok_or("retire marker without `id`")?;
            let id = serde_json::from_value::<RecordId>(raw_id).map_err(|e| e.to_string())?;
            return Ok(DeltaRecord::Retire { id });
        }

        serde_json::from_value::<CatalogRecord>(value)
            .map(DeltaRecord::Upsert)
            .map_err(|e| e.to_string())
    }
}

pub(crate) fn json_type_name(value: &serde_json::Value) -> &'static str {
    match value {
        serde_json::Value::Null => "null",
        serde_json::Value::Bool(_) => "boolean",
        serde_json::Value::Number(_) => "number",
        serde_json::Value::String(_) => "string",
        serde_json::Value::Array(_) => "array",
        serde_json::Value::Object(_) => "object",
    }
}
