//! Inbound request payloads.
//!
//! Requests arrive as JSON mappings (body or query parameters, flattened by
//! the serving layer). [`RequestData`] wraps the mapping and turns missing
//! or mistyped fields into `BadRequest` errors that name the field and the
//! endpoint, so a rejected call is diagnosable from the message alone.

use crate::error::{Error, Result};
use serde_json::{Map, Value};
use tracing::debug;

/// Base fields every consume-style request must carry.
pub const CONSUME_REQUIRED_FIELDS: [&str; 5] = [
    "documentId",
    "serviceId",
    "serviceType",
    "dataToken",
    "consumerAddress",
];

/// A validated JSON request mapping, tagged with the endpoint it hit.
#[derive(Debug, Clone)]
pub struct RequestData {
    endpoint: String,
    fields: Map<String, Value>,
}

impl RequestData {
    /// Wrap a request payload for the named endpoint.
    ///
    /// # Errors
    ///
    /// Returns [`Error::BadRequest`] when the payload is not a JSON object
    /// or is empty.
    pub fn new(payload: Value, endpoint: impl Into<String>) -> Result<Self> {
        let endpoint = endpoint.into();
        let Value::Object(fields) = payload else {
            return Err(Error::BadRequest(format!(
                "payload for {endpoint} is not a JSON object"
            )));
        };
        if fields.is_empty() {
            return Err(Error::BadRequest(format!(
                "payload for {endpoint} seems empty"
            )));
        }

        debug!(%endpoint, fields = fields.len(), "got request");
        Ok(Self { endpoint, fields })
    }

    /// The endpoint this request was made against.
    #[must_use]
    pub fn endpoint(&self) -> &str {
        &self.endpoint
    }

    /// Fetch a required string field.
    ///
    /// # Errors
    ///
    /// Returns [`Error::BadRequest`] naming the field when it is absent,
    /// not a string, or empty.
    pub fn require(&self, field: &str) -> Result<&str> {
        match self.fields.get(field).and_then(Value::as_str) {
            Some(s) if !s.is_empty() => Ok(s),
            _ => Err(Error::missing_field(field, &self.endpoint)),
        }
    }

    /// Check that every listed field is present, without extracting them.
    ///
    /// # Errors
    ///
    /// Returns [`Error::BadRequest`] for the first absent field.
    pub fn require_all(&self, fields: &[&str]) -> Result<()> {
        for field in fields {
            self.require(field)?;
        }
        Ok(())
    }

    /// Fetch an optional string field. Empty strings count as absent.
    #[must_use]
    pub fn optional(&self, field: &str) -> Option<&str> {
        self.fields
            .get(field)
            .and_then(Value::as_str)
            .filter(|s| !s.is_empty())
    }

    /// Fetch an optional structured field (object or list).
    #[must_use]
    pub fn optional_value(&self, field: &str) -> Option<&Value> {
        self.fields.get(field).filter(|v| !v.is_null())
    }

    /// Parse a required field as a service index.
    ///
    /// # Errors
    ///
    /// Returns [`Error::BadRequest`] when absent or not a decimal index.
    pub fn require_index(&self, field: &str) -> Result<u32> {
        let raw = self.require(field)?;
        raw.parse().map_err(|_| {
            Error::BadRequest(format!(
                "\"{field}\" value {raw:?} is not a valid index in the call to {}",
                self.endpoint
            ))
        })
    }
}
