use serde::{Deserialize, Serialize};
use serde_json::Value as JsonValue;

/// A typed value bound into a compiled statement.
///
/// Every value reaches the backend as a positional parameter. The literal
/// rendering in [`Value::to_sql_literal`] only exists for display.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub enum Value {
    Null,
    Boolean(bool),
    Integer(i64),
    Float(f64),
    Text(String),
    Array(Vec<Value>),
    Json(JsonValue),
}

impl Value {
    pub fn kind(&self) -> &'static str {
        match self {
            Value::Null => "Null",
            Value::Boolean(_) => "Boolean",
            Value::Integer(_) => "Integer",
            Value::Float(_) => "Float",
            Value::Text(_) => "Text",
            Value::Array(_) => "Array",
            Value::Json(_) => "Json",
        }
    }

    pub fn is_null(&self) -> bool {
        matches!(self, Value::Null)
    }

    /// Renders the value as a SQL literal. Text is single-quoted with embedded
    /// quotes doubled.
    pub fn to_sql_literal(&self) -> String {
        match self {
            Value::Null => "NULL".to_string(),
            Value::Boolean(true) => "TRUE".to_string(),
            Value::Boolean(false) => "FALSE".to_string(),
            Value::Integer(v) => v.to_string(),
            Value::Float(v) if v.is_nan() => "'NaN'".to_string(),
            Value::Float(v) if v.is_infinite() && v.is_sign_positive() => {
                "'Infinity'".to_string()
            }
            Value::Float(v) if v.is_infinite() => "'-Infinity'".to_string(),
            Value::Float(v) => v.to_string(),
            Value::Text(s) => quote_text(s),
            Value::Array(items) => {
                let inner = items
                    .iter()
                    .map(Value::to_sql_literal)
                    .collect::<Vec<_>>()
                    .join(", ");
                format!("ARRAY[{inner}]")
            }
            Value::Json(v) => format!("{}::jsonb", quote_text(&v.to_string())),
        }
    }

    /// Wire form of the value inside the request `params` array.
    pub fn to_json(&self) -> JsonValue {
        match self {
            Value::Null => JsonValue::Null,
            Value::Boolean(v) => JsonValue::Bool(*v),
            Value::Integer(v) => JsonValue::from(*v),
            // serde_json maps non-finite floats to null; send the textual
            // form postgres accepts for float columns instead.
            Value::Float(v) if !v.is_finite() => JsonValue::String(non_finite_text(*v)),
            Value::Float(v) => JsonValue::from(*v),
            Value::Text(s) => JsonValue::String(s.clone()),
            Value::Array(items) => JsonValue::Array(items.iter().map(Value::to_json).collect()),
            Value::Json(v) => v.clone(),
        }
    }
}

fn quote_text(s: &str) -> String {
    format!("'{}'", s.replace('\'', "''"))
}

fn non_finite_text(v: f64) -> String {
    if v.is_nan() {
        "NaN".to_string()
    } else if v.is_sign_positive() {
        "Infinity".to_string()
    } else {
        "-Infinity".to_string()
    }
}

pub trait IntoValue {
    fn into_value(self) -> Value;
}

impl IntoValue for Value {
    fn into_value(self) -> Value {
        self
    }
}

impl IntoValue for bool {
    fn into_value(self) -> Value {
        Value::Boolean(self)
    }
}

impl IntoValue for i64 {
    fn into_value(self) -> Value {
        Value::Integer(self)
    }
}

impl IntoValue for i32 {
    fn into_value(self) -> Value {
        Value::Integer(self as i64)
    }
}

impl IntoValue for u32 {
    fn into_value(self) -> Value {
        Value::Integer(self as i64)
    }
}

/// Values above `i64::MAX` bind as their decimal text, so the backend sees a
/// text parameter and casts it against the column type (`numeric` accepts
/// it, `bigint` rejects it).
impl IntoValue for u64 {
    fn into_value(self) -> Value {
        match i64::try_from(self) {
            Ok(v) => Value::Integer(v),
            Err(_) => Value::Text(self.to_string()),
        }
    }
}

impl IntoValue for usize {
    fn into_value(self) -> Value {
        (self as u64).into_value()
    }
}

impl IntoValue for f32 {
    fn into_value(self) -> Value {
        Value::Float(self as f64)
    }
}

impl IntoValue for f64 {
    fn into_value(self) -> Value {
        Value::Float(self)
    }
}

impl IntoValue for String {
    fn into_value(self) -> Value {
        Value::Text(self)
    }
}

impl IntoValue for &str {
    fn into_value(self) -> Value {
        Value::Text(self.to_string())
    }
}

impl IntoValue for &String {
    fn into_value(self) -> Value {
        Value::Text(self.clone())
    }
}

impl<T: IntoValue> IntoValue for Option<T> {
    fn into_value(self) -> Value {
        match self {
            Some(v) => v.into_value(),
            None => Value::Null,
        }
    }
}

impl<T: IntoValue> IntoValue for Vec<T> {
    fn into_value(self) -> Value {
        Value::Array(self.into_iter().map(IntoValue::into_value).collect())
    }
}

impl IntoValue for JsonValue {
    fn into_value(self) -> Value {
        match self {
            JsonValue::Null => Value::Null,
            JsonValue::Bool(v) => Value::Boolean(v),
            JsonValue::Number(n) => match n.as_i64() {
                Some(v) => Value::Integer(v),
                None => n
                    .as_f64()
                    .map(Value::Float)
                    .unwrap_or_else(|| Value::Text(n.to_string())),
            },
            JsonValue::String(s) => Value::Text(s),
            other @ (JsonValue::Array(_) | JsonValue::Object(_)) => Value::Json(other),
        }
    }
}

pub fn lit<T: IntoValue>(value: T) -> Value {
    value.into_value()
}
