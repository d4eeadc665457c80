use crate::error::ShimError;
use serde::de::DeserializeOwned;
use serde::{Deserialize, Serialize};
use serde_json::Value as JsonValue;

/// One result row, keys in the order the backend returned them.
pub type Row = serde_json::Map<String, JsonValue>;

/// Error slot of an [`Envelope`].
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct EnvelopeError {
    pub code: String,
    pub message: String,
}

impl EnvelopeError {
    pub fn new(code: impl Into<String>, message: impl Into<String>) -> Self {
        Self {
            code: code.into(),
            message: message.into(),
        }
    }
}

impl From<&ShimError> for EnvelopeError {
    fn from(err: &ShimError) -> Self {
        Self::new(err.code_str(), err.to_string())
    }
}

impl From<ShimError> for EnvelopeError {
    fn from(err: ShimError) -> Self {
        Self::from(&err)
    }
}

impl std::fmt::Display for EnvelopeError {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "{} ({})", self.message, self.code)
    }
}

/// The `{ data, error }` pair every facade call resolves to. At most one side
/// is populated; both are empty for "success, nothing to return".
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Envelope<T> {
    pub data: Option<T>,
    pub error: Option<EnvelopeError>,
}

impl<T> Envelope<T> {
    pub fn ok(data: T) -> Self {
        Self {
            data: Some(data),
            error: None,
        }
    }

    pub fn empty() -> Self {
        Self {
            data: None,
            error: None,
        }
    }

    pub fn err(error: impl Into<EnvelopeError>) -> Self {
        Self {
            data: None,
            error: Some(error.into()),
        }
    }

    pub fn from_result(result: Result<Option<T>, ShimError>) -> Self {
        match result {
            Ok(data) => Self { data, error: None },
            Err(err) => Self::err(err),
        }
    }

    pub fn is_ok(&self) -> bool {
        self.error.is_none()
    }

    pub fn map<U>(self, f: impl FnOnce(T) -> U) -> Envelope<U> {
        Envelope {
            data: self.data.map(f),
            error: self.error,
        }
    }

    pub fn into_result(self) -> Result<Option<T>, EnvelopeError> {
        match self.error {
            Some(err) => Err(err),
            None => Ok(self.data),
        }
    }
}

/// Error-only envelope returned by calls like `sign_out`.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct ErrorEnvelope {
    pub error: Option<EnvelopeError>,
}

/// Shaped chain result: a row array, or one row in single-row mode and for
/// inserts.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(untagged)]
pub enum QueryData {
    Rows(Vec<Row>),
    Row(Row),
}

impl QueryData {
    pub fn rows(&self) -> &[Row] {
        match self {
            QueryData::Rows(rows) => rows,
            QueryData::Row(row) => std::slice::from_ref(row),
        }
    }

    pub fn as_row(&self) -> Option<&Row> {
        match self {
            QueryData::Row(row) => Some(row),
            QueryData::Rows(_) => None,
        }
    }

    pub fn into_rows(self) -> Vec<Row> {
        match self {
            QueryData::Rows(rows) => rows,
            QueryData::Row(row) => vec![row],
        }
    }

    pub fn decode_rows<T: DeserializeOwned>(&self) -> Result<Vec<T>, ShimError> {
        self.rows().iter().map(decode_row).collect()
    }

    pub fn decode_one<T: DeserializeOwned>(&self) -> Result<Option<T>, ShimError> {
        self.rows().first().map(decode_row).transpose()
    }
}

pub fn decode_row<T: DeserializeOwned>(row: &Row) -> Result<T, ShimError> {
    serde_json::from_value(JsonValue::Object(row.clone()))
        .map_err(|e| ShimError::Decode(format!("row decode failed: {e}")))
}
