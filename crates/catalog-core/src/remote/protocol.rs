//! Wire payloads of the catalog API and their strict validation.
//!
//! Remote clients hand back raw JSON bodies; everything here turns a body into
//! a typed value or rejects it whole. Nothing partially parsed ever reaches
//! the store.
//!
//! ```text
//! GET version              -> { version, count }   (or { data: { version, count } })
//! GET export?page=&limit=  -> { data: [record], pagination: { total, hasMore } }
//! GET updates?since=       -> { data: { version, updates: [delta] } }
//! ```

use crate::error::{CatalogError, Result};
use crate::models::{json_type_name, CatalogRecord, DeltaRecord, VersionToken};
use serde_json::{Map, Value};

/// Error labels for each payload kind. Routes are configurable, so errors
/// name what was being parsed rather than a path.
pub const VERSION_PAYLOAD: &str = "version check";
pub const EXPORT_PAYLOAD: &str = "export page";
pub const UPDATES_PAYLOAD: &str = "updates feed";

/// Remote catalog's current version.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct RemoteVersion {
    pub version: VersionToken,
    pub count: u64,
}

/// One page of a full export.
#[derive(Debug, Clone, PartialEq)]
pub struct CatalogPage {
    pub records: Vec<CatalogRecord>,
    pub total: u64,
    pub has_more: bool,
}

/// Validated incremental update batch.
#[derive(Debug, Clone, PartialEq)]
pub struct DeltaBatch {
    pub version: VersionToken,
    pub deltas: Vec<DeltaRecord>,
}

fn expect_object<'a>(payload: &str, what: &str, value: &'a Value) -> Result<&'a Map<String, Value>> {
    value.as_object().ok_or_else(|| {
        CatalogError::invalid_response(
            payload,
            format!("`{}` must be an object, got {}", what, json_type_name(value)),
        )
    })
}

fn required<'a>(payload: &str, obj: &'a Map<String, Value>, key: &str) -> Result<&'a Value> {
    match obj.get(key) {
        Some(Value::Null) | None => Err(CatalogError::invalid_response(
            payload,
            format!("missing `{}`", key),
        )),
        Some(v) => Ok(v),
    }
}

fn parse_token(payload: &str, value: &Value) -> Result<VersionToken> {
    let token: VersionToken = serde_json::from_value(value.clone()).map_err(|_| {
        CatalogError::invalid_response(
            payload,
            format!("`version` must be a string or number, got {}", json_type_name(value)),
        )
    })?;
    if token.as_str().is_empty() {
        return Err(CatalogError::invalid_response(payload, "`version` is empty"));
    }
    Ok(token)
}

/// Validate a version body.
pub fn parse_version(body: &Value) -> Result<RemoteVersion> {
    let mut obj = expect_object(VERSION_PAYLOAD, "body", body)?;
    if !obj.contains_key("version") {
        if let Some(data) = obj.get("data") {
            obj = expect_object(VERSION_PAYLOAD, "data", data)?;
        }
    }

    let version = parse_token(VERSION_PAYLOAD, required(VERSION_PAYLOAD, obj, "version")?)?;
    let count = match obj.get("count") {
        None | Some(Value::Null) => 0,
        Some(v) => v.as_u64().ok_or_else(|| {
            CatalogError::invalid_response(VERSION_PAYLOAD, "`count` must be a non-negative integer")
        })?,
    };

    Ok(RemoteVersion { version, count })
}

/// Validate an export page body.
pub fn parse_page(body: &Value) -> Result<CatalogPage> {
    let obj = expect_object(EXPORT_PAYLOAD, "body", body)?;

    let data = required(EXPORT_PAYLOAD, obj, "data")?;
    let items = data.as_array().ok_or_else(|| {
        CatalogError::invalid_response(
            EXPORT_PAYLOAD,
            format!("`data` must be an array, got {}", json_type_name(data)),
        )
    })?;

    let pagination = expect_object(
        EXPORT_PAYLOAD,
        "pagination",
        required(EXPORT_PAYLOAD, obj, "pagination")?,
    )?;
    let total = required(EXPORT_PAYLOAD, pagination, "total")?
        .as_u64()
        .ok_or_else(|| {
            CatalogError::invalid_response(
                EXPORT_PAYLOAD,
                "`pagination.total` must be a non-negative integer",
            )
        })?;
    let has_more = required(EXPORT_PAYLOAD, pagination, "hasMore")?
        .as_bool()
        .ok_or_else(|| {
            CatalogError::invalid_response(EXPORT_PAYLOAD, "`pagination.hasMore` must be a boolean")
        })?;

    let records = items
        .iter()
        .enumerate()
        .map(|(i, item)| {
            serde_json::from_value::<CatalogRecord>(item.clone()).map_err(|e| {
                CatalogError::invalid_response(EXPORT_PAYLOAD, format!("data[{}]: {}", i, e))
            })
        })
        .collect::<Result<Vec<_>>>()?;

    Ok(CatalogPage {
        records,
        total,
        has_more,
    })
}

/// Validate an updates body.
pub fn parse_updates(body: &Value) -> Result<DeltaBatch> {
    let obj = expect_object(UPDATES_PAYLOAD, "body", body)?;
    let data = expect_object(UPDATES_PAYLOAD, "data", required(UPDATES_PAYLOAD, obj, "data")?)?;

    let version = parse_token(UPDATES_PAYLOAD, required(UPDATES_PAYLOAD, data, "version")?)?;

    let updates = required(UPDATES_PAYLOAD, data, "updates")?;
    let items = updates.as_array().ok_or_else(|| {
        CatalogError::invalid_response(
            UPDATES_PAYLOAD,
            format!("`updates` must be an array, got {}", json_type_name(updates)),
        )
    })?;

    let deltas = items
        .iter()
        .enumerate()
        .map(|(i, item)| {
            DeltaRecord::from_value(item.clone()).map_err(|e| {
                CatalogError::invalid_response(UPDATES_PAYLOAD, format!("updates[{}]: {}", i, e))
            })
        })
        .collect::<Result<Vec<_>>>()?;

    Ok(DeltaBatch { version, deltas })
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    #[test]
    fn test_parse_version_plain_and_wrapped() {
        let plain = parse_version(&json!({"version": "abc", "count": 12})).unwrap();
        assert_eq!(plain.version, VersionToken::new("abc"));
        assert_eq!(plain.count, 12);

        let wrapped = parse_version(&json!({"success": true, "data": {"version": 99}})).unwrap();
        assert_eq!(wrapped.version, VersionToken::new("99"));
        assert_eq!(wrapped.count, 0);
    }

    #[test]
    fn test_parse_version_rejects_missing_token() {
        let err = parse_version(&json!({"count": 3})).unwrap_err();
        assert!(matches!(err, CatalogError::InvalidResponse { .. }));
        assert!(parse_version(&json!({"version": ""})).is_err());
        assert!(parse_version(&json!({"version": {"nested": 1}})).is_err());
    }

    #[test]
    fn test_parse_page() {
        let page = parse_page(&json!({
            "data": [{"id": "1", "primaryName": "A"}, {"id": 2, "name": "B"}],
            "pagination": {"total": 5, "hasMore": true}
        }))
        .unwrap();
        assert_eq!(page.records.len(), 2);
        assert_eq!(page.total, 5);
        assert!(page.has_more);
    }

    #[test]
    fn test_parse_page_rejects_bad_shapes() {
        let cases = [
            json!({"pagination": {"total": 1, "hasMore": false}}),
            json!({"data": {"id": "1"}, "pagination": {"total": 1, "hasMore": false}}),
            json!({"data": []}),
            json!({"data": [], "pagination": {"total": -1, "hasMore": false}}),
            json!({"data": [], "pagination": {"total": 1}}),
            json!({"data": [{"id": "1"}], "pagination": {"total": 1, "hasMore": false}}),
            json!([]),
        ];
        for body in cases {
            assert!(
                matches!(parse_page(&body), Err(CatalogError::InvalidResponse { .. })),
                "accepted {body}"
            );
        }
    }

    #[test]
    fn test_parse_updates() {
        let batch = parse_updates(&json!({
            "data": {
                "version": "v2",
                "updates": [
                    {"id": "1", "primaryName": "A", "status": "ACTIVE"},
                    {"id": "2", "status": "RETIRED"}
                ]
            }
        }))
        .unwrap();
        assert_eq!(batch.version, VersionToken::new("v2"));
        assert_eq!(batch.deltas.len(), 2);
        assert!(batch.deltas[1].is_retire());
    }

    #[test]
    fn test_parse_updates_rejects_whole_batch_on_one_bad_entry() {
        let err = parse_updates(&json!({
            "data": {
                "version": "v2",
                "updates": [
                    {"id": "1", "primaryName": "A"},
                    {"id": "2", "status": "ACTIVE"}
                ]
            }
        }))
        .unwrap_err();
        assert!(err
            .to_string()
            .starts_with("Invalid response from updates feed: updates[1]"));

        assert!(parse_updates(&json!({"data": {"version": "v2"}})).is_err());
        assert!(parse_updates(&json!({"data": {"updates": []}})).is_err());
        assert!(parse_updates(&json!({"data": {"version": "v2", "updates": "nope"}})).is_err());
        assert!(parse_updates(&json!({"version": "v2", "updates": []})).is_err());
    }
}
