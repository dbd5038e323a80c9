//! Execution context: the isolated environment a job body runs inside.
//!
//! A fresh context is built for every run and dropped right after. Nothing
//! from the submitter, other queues, or other jobs is reachable through it;
//! the imports copy and the exports builder are the only data channels.

use serde::Serialize;
use serde::de::DeserializeOwned;
use serde_json::{Map, Value};

use crate::boundary::Payload;
use crate::error::JobError;

/// Per-run environment handed to a job body.
pub struct ExecutionContext {
    imports: Value,
    exports: Map<String, Value>,
}

impl ExecutionContext {
    /// Build a fresh context around a disconnected copy of the input.
    pub(crate) fn new(input: &Payload) -> Self {
        Self {
            imports: input.as_value().clone(),
            exports: Map::new(),
        }
    }

    /// The input payload, as set via `with` (or `{}` if never set).
    pub fn imports(&self) -> &Value {
        &self.imports
    }

    /// Mutable access to the job-local input copy.
    ///
    /// Mutations stay inside this run; the submitter's value is unaffected.
    pub fn imports_mut(&mut self) -> &mut Value {
        &mut self.imports
    }

    /// Typed read of one entry of the imports map.
    pub fn import<T: DeserializeOwned>(&self, key: &str) -> Result<T, JobError> {
        let value = self
            .imports
            .get(key)
            .ok_or_else(|| JobError::failed(format!("missing import: {key}")))?;
        serde_json::from_value(value.clone())
            .map_err(|e| JobError::failed(format!("import {key}: {e}")))
    }

    /// Serializing write into the exports builder.
    ///
    /// The boundary is enforced here, at the point of write: a value outside
    /// the closed set is rejected instead of silently dropped.
    pub fn export<T: Serialize + ?Sized>(
        &mut self,
        key: impl Into<String>,
        value: &T,
    ) -> Result<(), JobError> {
        let encoded = serde_json::to_value(value)
            .map_err(|e| JobError::NotSerializable(e.to_string()))?;
        self.exports.insert(key.into(), encoded);
        Ok(())
    }

    /// What the job has exported so far.
    pub fn exports(&self) -> &Map<String, Value> {
        &self.exports
    }

    /// Materialize the exports as the outcome payload.
    pub(crate) fn into_exports(self) -> Payload {
        Payload::from_value(Value::Object(self.exports))
    }
}
