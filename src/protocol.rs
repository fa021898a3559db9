use serde::{Deserialize, Serialize};
use serde_json::Value;
use thiserror::Error;

/// Why a single input line produced the failure sentinel instead of vectors.
#[derive(Debug, Error)]
pub enum LineError {
    #[error("input line is not valid UTF-8: {0}")]
    InvalidUtf8(#[from] std::str::Utf8Error),
    #[error("{0}")]
    Json(#[from] serde_json::Error),
    #[error("batch element {index} is {kind}, expected a string")]
    NonString { index: usize, kind: &'static str },
    #[error("{0}")]
    Embed(anyhow::Error),
    #[error("model returned {got} embeddings for {expected} texts")]
    CountMismatch { expected: usize, got: usize },
    #[error("embedding {index} has {got} dimensions, expected {expected}")]
    DimensionMismatch {
        index: usize,
        expected: usize,
        got: usize,
    },
}

/// Written to stderr, one per failed line.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ErrorRecord {
    pub error: String,
}

impl From<&LineError> for ErrorRecord {
    fn from(err: &LineError) -> Self {
        Self {
            error: err.to_string(),
        }
    }
}

pub type InputBatch = Vec<String>;
pub type OutputBatch = Vec<Vec<f32>>;

/// Decodes a non-blank line. Arrays are taken as-is; any other JSON value
/// becomes a one-element batch. Unicode whitespace around the value is
/// stripped first, not just the four characters JSON itself allows.
pub fn decode_batch(line: &str) -> Result<InputBatch, LineError> {
    let items = match serde_json::from_str::<Value>(line.trim())? {
        Value::Array(items) => items,
        other => vec![other],
    };
    items
        .into_iter()
        .enumerate()
        .map(|(index, item)| match item {
            Value::String(text) => Ok(text),
            other => Err(LineError::NonString {
                index,
                kind: json_kind(&other),
            }),
        })
        .collect()
}

/// Serializes a value as exactly one line, newline included.
pub fn encode_line<T: Serialize + ?Sized>(value: &T) -> serde_json::Result<String> {
    let mut line = serde_json::to_string(value)?;
    line.push('\n');
    Ok(line)
}

pub fn is_blank(line: &str) -> bool {
    line.trim().is_empty()
}

fn json_kind(value: &Value) -> &'static str {
    match value {
        Value::Null => "null",
        Value::Bool(_) => "a boolean",
        Value::Number(_) => "a number",
        Value::String(_) => "a string",
        Value::Array(_) => "an array",
        Value::Object(_) => "an object",
    }
}
