//! Core domain types and error definitions.
//!
//! This crate defines the types shared across the engine: errors, invocation
//! requests and results, schema descriptors, the result envelope, template
//! substitution, and the opaque state-persistence boundary.

use serde::{Deserialize, Serialize};
use thiserror::Error;

pub mod envelope;
pub mod state;
pub mod template;

pub use envelope::{OutputFormat, ResultEnvelope};
pub use state::{FsStateStore, StateStore};

/// Machine-readable failure classification carried inside an
/// [`InvocationResult`] and derivable from every [`WeaveError`].
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum ErrorKind {
    InvocationExhausted,
    InvalidJson,
    MissingFields,
    NoArrayFound,
    RouteNotMatched,
    WorkerFailure,
}

/// Errors that can occur while running a workflow.
#[derive(Error, Debug)]
pub enum WeaveError {
    #[error("model request failed: {0}")]
    Model(String),

    #[error("all retries exhausted: {0}")]
    InvocationExhausted(String),

    #[error("response is not valid JSON: {0}")]
    InvalidJson(String),

    #[error("structured response missing required fields: {}", .0.join(", "))]
    MissingFields(Vec<String>),

    #[error("no array found under any known envelope shape; body: {0}")]
    NoArrayFound(String),

    #[error("no handler registered for route: {0}")]
    RouteNotMatched(String),

    #[error("subtask failed: {0}")]
    WorkerFailure(String),
}

impl WeaveError {
    /// Classifies this error for embedding in an [`InvocationResult`].
    pub fn kind(&self) -> ErrorKind {
        match self {
            WeaveError::Model(_) | WeaveError::InvocationExhausted(_) => {
                ErrorKind::InvocationExhausted
            }
            WeaveError::InvalidJson(_) => ErrorKind::InvalidJson,
            WeaveError::MissingFields(_) => ErrorKind::MissingFields,
            WeaveError::NoArrayFound(_) => ErrorKind::NoArrayFound,
            WeaveError::RouteNotMatched(_) => ErrorKind::RouteNotMatched,
            WeaveError::WorkerFailure(_) => ErrorKind::WorkerFailure,
        }
    }
}

impl From<serde_json::Error> for WeaveError {
    fn from(err: serde_json::Error) -> Self {
        WeaveError::InvalidJson(err.to_string())
    }
}

/// Whether a schema call expects a single JSON object or an array of objects.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum SchemaKind {
    Object,
    /// An array of objects, addressed by the named top-level field.
    Array {
        field: String,
    },
}

/// A single field the model is asked to produce.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct FieldSpec {
    pub name: String,
    pub ty: String,
    #[serde(default)]
    pub hint: Option<String>,
}

impl FieldSpec {
    pub fn new(name: &str, ty: &str) -> Self {
        Self { name: name.to_string(), ty: ty.to_string(), hint: None }
    }

    pub fn with_hint(name: &str, ty: &str, hint: &str) -> Self {
        Self {
            name: name.to_string(),
            ty: ty.to_string(),
            hint: Some(hint.to_string()),
        }
    }
}

/// Opaque descriptor for a schema-constrained call. The engine only ever
/// inspects `kind`; the field list is rendered verbatim for the model service.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct SchemaSpec {
    pub kind: SchemaKind,
    pub fields: Vec<FieldSpec>,
}

impl SchemaSpec {
    pub fn object(fields: Vec<FieldSpec>) -> Self {
        Self { kind: SchemaKind::Object, fields }
    }

    pub fn array(field: &str, fields: Vec<FieldSpec>) -> Self {
        Self { kind: SchemaKind::Array { field: field.to_string() }, fields }
    }
}

/// An immutable request for one model invocation.
#[derive(Debug, Clone)]
pub struct InvocationRequest {
    pub prompt: String,
    pub schema: Option<SchemaSpec>,
    pub model: String,
    pub system_prompt: Option<String>,
}

impl InvocationRequest {
    /// A free-text invocation.
    pub fn text(prompt: impl Into<String>, model: &str) -> Self {
        Self {
            prompt: prompt.into(),
            schema: None,
            model: model.to_string(),
            system_prompt: None,
        }
    }

    /// A schema-constrained invocation.
    pub fn schema(prompt: impl Into<String>, model: &str, schema: SchemaSpec) -> Self {
        Self {
            prompt: prompt.into(),
            schema: Some(schema),
            model: model.to_string(),
            system_prompt: None,
        }
    }

    pub fn with_system_prompt(mut self, system_prompt: impl Into<String>) -> Self {
        self.system_prompt = Some(system_prompt.into());
        self
    }
}

/// Outcome of one invocation after the retry layer has had its say.
/// Either a full response body or a recorded failure, never both.
#[derive(Debug, Clone)]
pub struct InvocationResult {
    pub ok: bool,
    pub raw_text: String,
    pub error_kind: Option<ErrorKind>,
}

impl InvocationResult {
    /// Creates a successful result with the given response body.
    pub fn ok(raw_text: String) -> Self {
        Self { ok: true, raw_text, error_kind: None }
    }

    /// Creates a failed result; `raw_text` carries the last error text.
    pub fn err(kind: ErrorKind, raw_text: String) -> Self {
        Self { ok: false, raw_text, error_kind: Some(kind) }
    }

    /// Converts into a `Result`, for callers that treat failure as fatal.
    pub fn into_result(self) -> Result<String, WeaveError> {
        if self.ok {
            Ok(self.raw_text)
        } else {
            Err(match self.error_kind {
                Some(ErrorKind::InvalidJson) => WeaveError::InvalidJson(self.raw_text),
                Some(ErrorKind::WorkerFailure) => WeaveError::WorkerFailure(self.raw_text),
                _ => WeaveError::InvocationExhausted(self.raw_text),
            })
        }
    }
}

/// Why an iterative workflow stopped looping.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ExitReason {
    TaskCompleted,
    MaxIterationsReached,
    MaxStepsReached,
}

impl ExitReason {
    pub fn as_str(&self) -> &'static str {
        match self {
            ExitReason::TaskCompleted => "task_completed",
            ExitReason::MaxIterationsReached => "max_iterations_reached",
            ExitReason::MaxStepsReached => "max_steps_reached",
        }
    }
}

/// An ordered field map extracted from one structured response. Preserves the
/// field order of the response body; lookup is by logical name.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct FieldMap {
    entries: Vec<(String, String)>,
}

impl FieldMap {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn insert(&mut self, key: impl Into<String>, value: impl Into<String>) {
        self.entries.push((key.into(), value.into()));
    }

    pub fn get(&self, key: &str) -> Option<&str> {
        self.entries
            .iter()
            .find(|(k, _)| k == key)
            .map(|(_, v)| v.as_str())
    }

    pub fn is_empty(&self) -> bool {
        self.entries.is_empty()
    }

    pub fn len(&self) -> usize {
        self.entries.len()
    }

    pub fn iter(&self) -> impl Iterator<Item = (&str, &str)> {
        self.entries.iter().map(|(k, v)| (k.as_str(), v.as_str()))
    }
}

impl FromIterator<(String, String)> for FieldMap {
    fn from_iter<T: IntoIterator<Item = (String, String)>>(iter: T) -> Self {
        Self { entries: iter.into_iter().collect() }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn error_kind_classification() {
        assert_eq!(
            WeaveError::MissingFields(vec!["a".into()]).kind(),
            ErrorKind::MissingFields
        );
        assert_eq!(
            WeaveError::Model("boom".into()).kind(),
            ErrorKind::InvocationExhausted
        );
    }

    #[test]
    fn missing_fields_display_lists_all_names() {
        let err = WeaveError::MissingFields(vec!["thought".into(), "action".into()]);
        let msg = err.to_string();
        assert!(msg.contains("thought"));
        assert!(msg.contains("action"));
    }

    #[test]
    fn field_map_preserves_insertion_order() {
        let mut map = FieldMap::new();
        map.insert("zeta", "1");
        map.insert("alpha", "2");
        let keys: Vec<&str> = map.iter().map(|(k, _)| k).collect();
        assert_eq!(keys, vec!["zeta", "alpha"]);
        assert_eq!(map.get("alpha"), Some("2"));
        assert_eq!(map.get("missing"), None);
    }

    #[test]
    fn invocation_result_round_trips_failure() {
        let result = InvocationResult::err(ErrorKind::InvalidJson, "not json".into());
        assert!(!result.ok);
        assert!(matches!(
            result.into_result(),
            Err(WeaveError::InvalidJson(_))
        ));
    }

    #[test]
    fn worker_failure_kind_round_trips_to_its_error() {
        let result = InvocationResult::err(ErrorKind::WorkerFailure, "subtask died".into());
        let err = result.into_result().unwrap_err();
        assert!(matches!(err, WeaveError::WorkerFailure(_)));
        assert_eq!(err.kind(), ErrorKind::WorkerFailure);
    }
}
