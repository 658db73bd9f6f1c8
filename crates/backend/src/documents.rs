//! Document store interface.

use std::cmp::Ordering;
use std::future::Future;

use serde::de::DeserializeOwned;
use serde::Serialize;
use serde_json::{Map, Value};

use crate::error::{BackendError, BackendResult};

/// Top-level fields of a document.
pub type Fields = Map<String, Value>;

/// A stored document and its id within its collection.
#[derive(Debug, Clone, PartialEq)]
pub struct Document {
    pub id: String,
    pub fields: Fields,
}

impl Document {
    pub fn new(id: impl Into<String>, fields: Fields) -> Self {
        Self {
            id: id.into(),
            fields,
        }
    }

    /// Deserialize the fields into a typed record.
    pub fn decode<T: DeserializeOwned>(&self) -> BackendResult<T> {
        serde_json::from_value(Value::Object(self.fields.clone()))
            .map_err(|error| BackendError::Decode(format!("document {}: {error}", self.id)))
    }
}

/// Serialize a typed record into document fields.
pub fn to_fields<T: Serialize>(value: &T) -> BackendResult<Fields> {
    match serde_json::to_value(value) {
        Ok(Value::Object(fields)) => Ok(fields),
        Ok(other) => Err(BackendError::Decode(format!(
            "expected an object, got {other}"
        ))),
        Err(error) => Err(BackendError::Decode(error.to_string())),
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum WriteMode {
    /// Replace the whole document.
    Replace,
    /// Only overwrite the given top-level fields.
    Merge,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum FilterOp {
    Equal,
    LessThan,
    LessThanOrEqual,
    GreaterThan,
    GreaterThanOrEqual,
    ArrayContains,
}

#[derive(Debug, Clone, PartialEq)]
pub struct Filter {
    pub field: String,
    pub op: FilterOp,
    pub value: Value,
}

impl Filter {
    pub fn eq(field: impl Into<String>, value: impl Into<Value>) -> Self {
        Self {
            field: field.into(),
            op: FilterOp::Equal,
            value: value.into(),
        }
    }

    pub fn new(field: impl Into<String>, op: FilterOp, value: impl Into<Value>) -> Self {
        Self {
            field: field.into(),
            op,
            value: value.into(),
        }
    }

    /// Evaluate the filter against a document's fields.
    pub fn matches(&self, fields: &Fields) -> bool {
        let Some(actual) = fields.get(&self.field) else {
            return false;
        };

        match self.op {
            FilterOp::Equal => actual == &self.value,
            FilterOp::ArrayContains => actual
                .as_array()
                .is_some_and(|values| values.contains(&self.value)),
            FilterOp::LessThan => compare_values(actual, &self.value) == Some(Ordering::Less),
            FilterOp::LessThanOrEqual => matches!(
                compare_values(actual, &self.value),
                Some(Ordering::Less | Ordering::Equal)
            ),
            FilterOp::GreaterThan => {
                compare_values(actual, &self.value) == Some(Ordering::Greater)
            }
            FilterOp::GreaterThanOrEqual => matches!(
                compare_values(actual, &self.value),
                Some(Ordering::Greater | Ordering::Equal)
            ),
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Direction {
    Ascending,
    Descending,
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Order {
    pub field: String,
    pub direction: Direction,
}

impl Order {
    pub fn descending(field: impl Into<String>) -> Self {
        Self {
            field: field.into(),
            direction: Direction::Descending,
        }
    }

    pub fn ascending(field: impl Into<String>) -> Self {
        Self {
            field: field.into(),
            direction: Direction::Ascending,
        }
    }
}

/// Conjunctive filters with an optional ordering and limit.
#[derive(Debug, Clone, Default, PartialEq)]
pub struct Query {
    pub filters: Vec<Filter>,
    pub order: Option<Order>,
    pub limit: Option<usize>,
}

impl Query {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn filter(mut self, filter: Filter) -> Self {
        self.filters.push(filter);
        self
    }

    pub fn order_by(mut self, order: Order) -> Self {
        self.order = Some(order);
        self
    }

    pub fn limit(mut self, limit: usize) -> Self {
        self.limit = Some(limit);
        self
    }
}

/// Numbers compare numerically, strings lexically (RFC 3339 timestamps sort
/// correctly this way), booleans false-before-true. Mixed kinds are unordered.
pub fn compare_values(left: &Value, right: &Value) -> Option<Ordering> {
    match (left, right) {
        (Value::Number(a), Value::Number(b)) => a.as_f64()?.partial_cmp(&b.as_f64()?),
        (Value::String(a), Value::String(b)) => Some(a.cmp(b)),
        (Value::Bool(a), Value::Bool(b)) => Some(a.cmp(b)),
        (Value::Null, Value::Null) => Some(Ordering::Equal),
        _ => None,
    }
}

/// Key-value document database holding profiles and listings.
pub trait DocumentStore: Send + Sync + 'static {
    fn put_document(
        &self,
        collection: &str,
        id: &str,
        fields: Fields,
        mode: WriteMode,
    ) -> impl Future<Output = BackendResult<()>> + Send;

    fn get_document(
        &self,
        collection: &str,
        id: &str,
    ) -> impl Future<Output = BackendResult<Option<Document>>> + Send;

    /// Store a document under a generated id and return that id.
    fn add_document(
        &self,
        collection: &str,
        fields: Fields,
    ) -> impl Future<Output = BackendResult<String>> + Send;

    fn delete_document(
        &self,
        collection: &str,
        id: &str,
    ) -> impl Future<Output = BackendResult<()>> + Send;

    fn query_documents(
        &self,
        collection: &str,
        query: &Query,
    ) -> impl Future<Output = BackendResult<Vec<Document>>> + Send;
}
