//! Payload rows, passed through to the payload table untouched.

use serde::{Deserialize, Serialize};
use serde_json::{Map, Value};

use crate::error::{Error, Result};

/// One row of the payload dataset.
///
/// The playback engine does not interpret payloads. The six columns must be
/// present; their values, and any extra fields, are kept as given.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct PayloadRecord {
    pub payload_id: Value,
    pub src: Value,
    pub destination: Value,
    pub status: Value,
    pub location: Value,
    pub delivered: Value,
    #[serde(flatten)]
    pub extra: Map<String, Value>,
}

/// Parse a JSON array of payload rows.
pub fn parse_payloads(json: &str) -> Result<Vec<PayloadRecord>> {
    let values: Vec<Value> = serde_json::from_str(json)?;
    values
        .into_iter()
        .enumerate()
        .map(|(index, value)| {
            serde_json::from_value::<PayloadRecord>(value).map_err(|e| Error::malformed(index, e))
        })
        .collect()
}
