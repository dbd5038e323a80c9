//! Serialization boundary: the only way data crosses into or out of a job.
//!
//! Design:
//! - `Payload` wraps a `serde_json::Value`, which is exactly the closed
//!   serializable set: maps, ordered sequences, strings, numbers, booleans,
//!   null. No live callables or host objects can be represented.
//! - Encoding goes through serde, so anything outside the set fails
//!   deterministically at the boundary instead of leaking references.
//! - Crossing the boundary always copies. A decoded value is disconnected
//!   from the original; mutations on either side never show up on the other.

use serde::de::DeserializeOwned;
use serde::{Deserialize, Serialize};
use serde_json::{Map, Value};
use std::fmt;

use crate::error::StrandError;

/// An inert, shareable value in the closed serializable set.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(transparent)]
pub struct Payload(Value);

impl Payload {
    /// The empty structure `{}`.
    ///
    /// Unset inputs and jobs that export nothing both materialize as this,
    /// never as null or absence.
    pub fn empty() -> Self {
        Payload(Value::Object(Map::new()))
    }

    /// Encode a value into the boundary representation.
    ///
    /// Fails with [`StrandError::NotSerializable`] when the value cannot be
    /// represented in the closed set (non-string map keys, etc.).
    pub fn encode<T: Serialize + ?Sized>(value: &T) -> Result<Self, StrandError> {
        Ok(Payload(serde_json::to_value(value)?))
    }

    /// Wrap a value that is already in the closed set.
    pub fn from_value(value: Value) -> Self {
        Payload(value)
    }

    /// Decode into a typed value. The result is a disconnected copy.
    pub fn decode<T: DeserializeOwned>(&self) -> Result<T, serde_json::Error> {
        serde_json::from_value(self.0.clone())
    }

    pub fn as_value(&self) -> &Value {
        &self.0
    }

    pub fn into_value(self) -> Value {
        self.0
    }

    /// True for the empty structure `{}`.
    pub fn is_empty(&self) -> bool {
        matches!(&self.0, Value::Object(map) if map.is_empty())
    }
}

impl Default for Payload {
    fn default() -> Self {
        Payload::empty()
    }
}

impl From<Value> for Payload {
    fn from(value: Value) -> Self {
        Payload::from_value(value)
    }
}

impl fmt::Display for Payload {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.0)
    }
}
