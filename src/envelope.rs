//! Result envelope normalization.
//!
//! Whatever the extraction payload left in the result slot — object, array,
//! scalar, or nothing — is reshaped here into the uniform envelope callers
//! depend on. This is the only branching logic of consequence in the system
//! and the shapes are load-bearing: object payloads pass through with ids
//! added, arrays land under the search type's result key, bare scalars are
//! wrapped, and anything empty becomes a `success: false` envelope.

use serde::Serialize;
use serde_json::{Map, Value};

use crate::request::SearchType;

/// Per-query identity threaded into every envelope.
#[derive(Debug, Clone)]
pub struct EnvelopeContext<'a> {
    pub batch_id: Option<&'a Value>,
    pub query_id: Option<&'a Value>,
    pub query: &'a str,
    pub search_type: SearchType,
}

impl<'a> EnvelopeContext<'a> {
    fn batch_id(&self) -> Value {
        self.batch_id.cloned().unwrap_or(Value::Null)
    }

    fn query_id(&self) -> Value {
        self.query_id.cloned().unwrap_or(Value::Null)
    }

    fn title(&self) -> String {
        format!("{} - Search {}", self.query, self.search_type.as_str())
    }
}

/// True for slot values that count as "no results": null, `false`, zero,
/// empty strings, empty arrays and empty objects.
fn is_empty_value(value: &Value) -> bool {
    match value {
        Value::Null => true,
        Value::Bool(b) => !b,
        Value::Number(n) => n.as_f64() == Some(0.0),
        Value::String(s) => s.is_empty(),
        Value::Array(a) => a.is_empty(),
        Value::Object(o) => o.is_empty(),
    }
}

fn base_envelope(ctx: &EnvelopeContext, success: bool, results: Vec<Value>) -> Value {
    let mut map = Map::new();
    map.insert("batch_id".to_string(), ctx.batch_id());
    map.insert("query_id".to_string(), ctx.query_id());
    map.insert("success".to_string(), Value::Bool(success));
    map.insert("title".to_string(), Value::String(ctx.title()));
    map.insert("query".to_string(), Value::String(ctx.query.to_string()));
    map.insert(ctx.search_type.result_key().to_string(), Value::Array(results));
    Value::Object(map)
}

/// Normalizes a result-slot value into an envelope.
///
/// `None` covers both the poll timeout and a slot the payload never set.
pub fn from_slot(slot: Option<Value>, ctx: &EnvelopeContext) -> Value {
    match slot {
        Some(value) if !is_empty_value(&value) => match value {
            // Object payloads already carry their own shape; only the
            // batch/query identity is stamped on (overwriting).
            Value::Object(mut map) => {
                map.insert("batch_id".to_string(), ctx.batch_id());
                map.insert("query_id".to_string(), ctx.query_id());
                Value::Object(map)
            }
            Value::Array(items) => base_envelope(ctx, true, items),
            scalar => base_envelope(ctx, true, vec![scalar]),
        },
        _ => base_envelope(ctx, false, Vec::new()),
    }
}

/// A failed envelope with an error description, used for configuration
/// errors surfaced in-band (e.g. a missing payload file).
pub fn config_failure(batch_id: Option<&Value>, search_type: SearchType, error: &str) -> Value {
    let mut map = Map::new();
    map.insert(
        "batch_id".to_string(),
        batch_id.cloned().unwrap_or(Value::Null),
    );
    map.insert("success".to_string(), Value::Bool(false));
    map.insert("error".to_string(), Value::String(error.to_string()));
    map.insert(search_type.result_key().to_string(), Value::Array(Vec::new()));
    Value::Object(map)
}

/// The assembled response: a single envelope when exactly one query was
/// processed, otherwise the ordered list.
#[derive(Debug, Clone, Serialize)]
#[serde(untagged)]
pub enum SearchOutcome {
    Single(Value),
    Batch(Vec<Value>),
}

impl From<Vec<Value>> for SearchOutcome {
    fn from(mut envelopes: Vec<Value>) -> Self {
        if envelopes.len() == 1 {
            Self::Single(envelopes.remove(0))
        } else {
            Self::Batch(envelopes)
        }
    }
}
