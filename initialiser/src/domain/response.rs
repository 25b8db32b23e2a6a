//! Helpers for decoding OS2mo read responses.
//!
//! OS2mo wraps every listed object as `{collection: {objects: [{current: …}]}}`
//! where `current` is `null` for objects without a currently valid version.

use serde::Deserialize;
use serde::de::DeserializeOwned;
use serde_json::Value;

use crate::domain::ReconcileError;

#[derive(Debug, Deserialize)]
struct PagedDto<T> {
    objects: Vec<VersionedDto<T>>,
}

#[derive(Debug, Deserialize)]
struct VersionedDto<T> {
    current: Option<T>,
}

/// Decode the current versions listed under `collection`.
///
/// Objects without a current version are skipped.
pub(crate) fn current_objects<T: DeserializeOwned>(
    operation: &'static str,
    mut data: Value,
    collection: &str,
) -> Result<Vec<T>, ReconcileError> {
    let listing = data
        .get_mut(collection)
        .map(Value::take)
        .ok_or_else(|| ReconcileError::unexpected_response(operation, missing(collection)))?;
    let paged: PagedDto<T> = serde_json::from_value(listing)
        .map_err(|error| ReconcileError::unexpected_response(operation, error.to_string()))?;
    Ok(paged
        .objects
        .into_iter()
        .filter_map(|object| object.current)
        .collect())
}

/// Decode the single object stored under `field`.
pub(crate) fn single_object<T: DeserializeOwned>(
    operation: &'static str,
    mut data: Value,
    field: &str,
) -> Result<T, ReconcileError> {
    let object = data
        .get_mut(field)
        .map(Value::take)
        .ok_or_else(|| ReconcileError::unexpected_response(operation, missing(field)))?;
    serde_json::from_value(object)
        .map_err(|error| ReconcileError::unexpected_response(operation, error.to_string()))
}

fn missing(field: &str) -> String {
    format!("response data has no `{field}` member")
}
