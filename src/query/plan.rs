use crate::query::error::QueryError;
use crate::value::{IntoValue, Value};
use serde::{Deserialize, Serialize};
use serde_json::Value as JsonValue;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub enum Order {
    Asc,
    Desc,
}

impl Order {
    pub fn from_ascending(ascending: bool) -> Self {
        if ascending { Order::Asc } else { Order::Desc }
    }

    pub fn as_sql(self) -> &'static str {
        match self {
            Order::Asc => "ASC",
            Order::Desc => "DESC",
        }
    }
}

/// Options bag accepted by `TableQuery::order`, ascending unless told otherwise.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct OrderOptions {
    pub ascending: bool,
}

impl Default for OrderOptions {
    fn default() -> Self {
        Self { ascending: true }
    }
}

impl OrderOptions {
    pub fn ascending() -> Self {
        Self { ascending: true }
    }

    pub fn descending() -> Self {
        Self { ascending: false }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub enum CompareOp {
    Eq,
    Ne,
    Like,
}

impl CompareOp {
    pub fn as_sql(self) -> &'static str {
        match self {
            CompareOp::Eq => "=",
            CompareOp::Ne => "!=",
            CompareOp::Like => "LIKE",
        }
    }
}

/// One WHERE fragment. Values are owned copies taken when the filter was added.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub enum Predicate {
    Compare {
        column: String,
        op: CompareOp,
        value: Value,
    },
    In {
        column: String,
        values: Vec<Value>,
    },
}

impl Predicate {
    pub fn column(&self) -> &str {
        match self {
            Predicate::Compare { column, .. } | Predicate::In { column, .. } => column,
        }
    }
}

/// Last-write-wins pagination state.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct Pagination {
    pub limit: Option<u64>,
    pub offset: Option<u64>,
}

/// Accumulated state of one chain.
///
/// Every mutation bumps `revision`, which keys the memoized compile output
/// held by the owning table handle.
#[derive(Debug, Clone, PartialEq)]
pub struct QuerySpec {
    table: String,
    projection: String,
    predicates: Vec<Predicate>,
    order: Option<(String, Order)>,
    pagination: Pagination,
    single_row: bool,
    deferred_error: Option<QueryError>,
    revision: u64,
}

impl QuerySpec {
    pub fn new(table: impl Into<String>) -> Self {
        Self {
            table: table.into(),
            projection: "*".to_string(),
            predicates: Vec::new(),
            order: None,
            pagination: Pagination::default(),
            single_row: false,
            deferred_error: None,
            revision: 0,
        }
    }

    pub fn table(&self) -> &str {
        &self.table
    }

    pub fn projection(&self) -> &str {
        &self.projection
    }

    pub fn predicates(&self) -> &[Predicate] {
        &self.predicates
    }

    pub fn order(&self) -> Option<(&str, Order)> {
        self.order.as_ref().map(|(col, dir)| (col.as_str(), *dir))
    }

    pub fn pagination(&self) -> Pagination {
        self.pagination
    }

    pub fn is_single_row(&self) -> bool {
        self.single_row
    }

    pub fn revision(&self) -> u64 {
        self.revision
    }

    pub fn deferred_error(&self) -> Option<&QueryError> {
        self.deferred_error.as_ref()
    }

    /// Limit actually emitted: single-row mode always wins with 1.
    pub fn effective_limit(&self) -> Option<u64> {
        if self.single_row {
            Some(1)
        } else {
            self.pagination.limit
        }
    }

    pub fn effective_offset(&self) -> Option<u64> {
        self.pagination.offset.filter(|offset| *offset > 0)
    }

    pub fn set_projection(&mut self, projection: impl Into<String>) {
        let projection = projection.into();
        let trimmed = projection.trim();
        self.projection = if trimmed.is_empty() {
            "*".to_string()
        } else {
            trimmed.to_string()
        };
        self.touch();
    }

    pub fn push_predicate(&mut self, predicate: Predicate) {
        self.predicates.push(predicate);
        self.touch();
    }

    pub fn set_order(&mut self, column: impl Into<String>, order: Order) {
        self.order = Some((column.into(), order));
        self.touch();
    }

    pub fn set_limit(&mut self, limit: u64) {
        self.pagination = Pagination {
            limit: Some(limit),
            offset: None,
        };
        self.touch();
    }

    /// Inclusive row range, `from` and `to` both zero-based.
    pub fn set_range(&mut self, from: u64, to: u64) {
        if to < from {
            self.defer_error(QueryError::InvalidRange { from, to });
            return;
        }
        let Some(limit) = (to - from).checked_add(1) else {
            self.defer_error(QueryError::InvalidRange { from, to });
            return;
        };
        self.pagination = Pagination {
            limit: Some(limit),
            offset: Some(from),
        };
        self.touch();
    }

    pub fn set_single_row(&mut self) {
        self.single_row = true;
        self.touch();
    }

    /// Keeps the first error; later ones are usually consequences of it.
    pub fn defer_error(&mut self, err: QueryError) {
        if self.deferred_error.is_none() {
            self.deferred_error = Some(err);
        }
        self.touch();
    }

    fn touch(&mut self) {
        self.revision = self.revision.wrapping_add(1);
    }
}

/// Ordered column/value pairs used by insert and update.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct Record {
    fields: Vec<(String, Value)>,
}

impl Record {
    pub fn new() -> Self {
        Self::default()
    }

    /// Sets a column, replacing an earlier value in place so key order stays
    /// the order of first insertion.
    pub fn set<V: IntoValue>(mut self, column: impl Into<String>, value: V) -> Self {
        self.insert(column, value);
        self
    }

    pub fn insert<V: IntoValue>(&mut self, column: impl Into<String>, value: V) {
        let column = column.into();
        let value = value.into_value();
        match self.fields.iter_mut().find(|(name, _)| *name == column) {
            Some(slot) => slot.1 = value,
            None => self.fields.push((column, value)),
        }
    }

    pub fn get(&self, column: &str) -> Option<&Value> {
        self.fields
            .iter()
            .find(|(name, _)| name == column)
            .map(|(_, value)| value)
    }

    pub fn len(&self) -> usize {
        self.fields.len()
    }

    pub fn is_empty(&self) -> bool {
        self.fields.is_empty()
    }

    pub fn columns(&self) -> impl Iterator<Item = &str> {
        self.fields.iter().map(|(name, _)| name.as_str())
    }

    pub fn iter(&self) -> impl Iterator<Item = (&str, &Value)> {
        self.fields.iter().map(|(name, value)| (name.as_str(), value))
    }
}

impl<K: Into<String>, V: IntoValue> FromIterator<(K, V)> for Record {
    fn from_iter<I: IntoIterator<Item = (K, V)>>(iter: I) -> Self {
        let mut record = Record::new();
        for (column, value) in iter {
            record.insert(column, value);
        }
        record
    }
}

impl From<serde_json::Map<String, JsonValue>> for Record {
    fn from(map: serde_json::Map<String, JsonValue>) -> Self {
        map.into_iter().collect()
    }
}

impl TryFrom<JsonValue> for Record {
    type Error = QueryError;

    fn try_from(value: JsonValue) -> Result<Self, Self::Error> {
        match value {
            JsonValue::Object(map) => Ok(map.into()),
            other => Err(QueryError::InvalidQuery {
                reason: format!("record must be a JSON object, got {}", json_kind(&other)),
            }),
        }
    }
}

fn json_kind(value: &JsonValue) -> &'static str {
    match value {
        JsonValue::Null => "null",
        JsonValue::Bool(_) => "boolean",
        JsonValue::Number(_) => "number",
        JsonValue::String(_) => "string",
        JsonValue::Array(_) => "array",
        JsonValue::Object(_) => "object",
    }
}
