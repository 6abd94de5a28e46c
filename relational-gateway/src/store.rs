//! Abstract interface to a relational storage engine.
//!
//! The gateway interacts with storage exclusively through the [`Store`] and [`Transaction`]
//! traits defined here. A [`Store`] hands out plain reads and opens transaction scopes; a
//! [`Transaction`] groups reads and writes into an atomic unit which commits on success and
//! rolls back on failure. The traits are deliberately narrow: one row shape ([`Record`]), one
//! filter shape ([`Filter`]) and integer primary keys, which is exactly what the gateway's
//! resolvers need.

use async_trait::async_trait;
use derive_more::{Display, From};
use std::fmt::Display as FmtDisplay;

pub mod mock;

/// Errors returned by the storage engine.
pub trait Error: Sized + Send + std::error::Error {
    /// Wrap a custom message into this error type.
    fn custom(msg: impl FmtDisplay) -> Self;

    /// An error indicating that a write violated a uniqueness constraint on `column`.
    fn constraint(column: &str) -> Self;

    /// Whether this error was caused by a constraint violation.
    ///
    /// The gateway uses this to report constraint violations distinctly from other storage
    /// failures, rather than leaking the engine's error structure.
    fn is_constraint(&self) -> bool;

    /// An error indicating that a projection named a column the table does not have.
    fn no_such_column(table: &str, column: &str) -> Self {
        Self::custom(format!("table {table} has no column {column}"))
    }
}

/// A primitive value stored in a column.
#[derive(Clone, Debug, Display, PartialEq, Eq, From)]
pub enum Value {
    /// A text string.
    #[display(fmt = "{}", _0)]
    Text(String),
    /// A 4-byte signed integer.
    #[display(fmt = "{}", _0)]
    Int4(i32),
    /// A 4-byte unsigned integer.
    #[display(fmt = "{}", _0)]
    UInt4(u32),
    /// An opaque binary payload.
    #[display(fmt = "<blob {} bytes>", "_0.len()")]
    Blob(Vec<u8>),
}

impl From<&str> for Value {
    fn from(s: &str) -> Self {
        Self::Text(s.into())
    }
}

impl TryFrom<Value> for String {
    type Error = String;

    fn try_from(v: Value) -> Result<Self, Self::Error> {
        match v {
            Value::Text(s) => Ok(s),
            v => Err(format!("type mismatch (expected text, got {v:?})")),
        }
    }
}

impl TryFrom<Value> for u32 {
    type Error = String;

    fn try_from(v: Value) -> Result<Self, Self::Error> {
        match v {
            Value::UInt4(x) => Ok(x),
            Value::Int4(x) => x
                .try_into()
                .map_err(|err| format!("out of range for type u32: {err}")),
            v => Err(format!("type mismatch (expected u32, got {v:?})")),
        }
    }
}

impl TryFrom<Value> for i32 {
    type Error = String;

    fn try_from(v: Value) -> Result<Self, Self::Error> {
        match v {
            Value::Int4(x) => Ok(x),
            Value::UInt4(x) => x
                .try_into()
                .map_err(|err| format!("out of range for type i32: {err}")),
            v => Err(format!("type mismatch (expected i32, got {v:?})")),
        }
    }
}

impl TryFrom<Value> for Vec<u8> {
    type Error = String;

    fn try_from(v: Value) -> Result<Self, Self::Error> {
        match v {
            Value::Blob(bytes) => Ok(bytes),
            v => Err(format!("type mismatch (expected blob, got {v:?})")),
        }
    }
}

/// A row, or a partial row, as named column values.
///
/// Column order is preserved, so a record projected from a row reflects the projection's order.
#[derive(Clone, Debug, Default, PartialEq, Eq)]
pub struct Record {
    fields: Vec<(String, Value)>,
}

impl Record {
    /// An empty record.
    pub fn new() -> Self {
        Self::default()
    }

    /// Add a field to this record, builder style.
    pub fn with(mut self, name: impl Into<String>, value: impl Into<Value>) -> Self {
        self.insert(name, value);
        self
    }

    /// Add a field to this record.
    ///
    /// If a field with the same name is already present, its value is replaced in place.
    pub fn insert(&mut self, name: impl Into<String>, value: impl Into<Value>) {
        let name = name.into();
        let value = value.into();
        match self.fields.iter_mut().find(|(n, _)| *n == name) {
            Some((_, v)) => *v = value,
            None => self.fields.push((name, value)),
        }
    }

    /// The value of the named field, if present.
    pub fn get(&self, name: &str) -> Option<&Value> {
        self.fields
            .iter()
            .find(|(n, _)| n == name)
            .map(|(_, v)| v)
    }

    /// The value of a field which must be present.
    ///
    /// # Errors
    ///
    /// Fails if the field is missing or has the wrong type. Callers that computed their
    /// projection correctly will never see the missing case.
    pub fn require<T>(&self, name: &str) -> Result<T, String>
    where
        T: TryFrom<Value, Error = String>,
    {
        self.get(name)
            .cloned()
            .ok_or_else(|| format!("missing column {name}"))?
            .try_into()
    }

    /// The value of a field which may have been left out of the projection.
    pub fn opt<T>(&self, name: &str) -> Result<Option<T>, String>
    where
        T: TryFrom<Value, Error = String>,
    {
        self.get(name).cloned().map(T::try_from).transpose()
    }

    /// Iterate over the field names in this record, in order.
    pub fn names(&self) -> impl Iterator<Item = &str> {
        self.fields.iter().map(|(n, _)| n.as_str())
    }

    /// Iterate over the fields in this record, in order.
    pub fn iter(&self) -> impl Iterator<Item = (&str, &Value)> {
        self.fields.iter().map(|(n, v)| (n.as_str(), v))
    }

    /// Whether this record has no fields.
    pub fn is_empty(&self) -> bool {
        self.fields.is_empty()
    }
}

impl<K: Into<String>, V: Into<Value>> FromIterator<(K, V)> for Record {
    fn from_iter<I: IntoIterator<Item = (K, V)>>(iter: I) -> Self {
        let mut record = Self::new();
        for (name, value) in iter {
            record.insert(name, value);
        }
        record
    }
}

/// An equality filter on a single column.
#[derive(Clone, Debug, Display, PartialEq, Eq)]
#[display(fmt = "{column} = {value}")]
pub struct Filter {
    column: String,
    value: Value,
}

impl Filter {
    /// A filter matching rows where `column` equals `value`.
    pub fn eq(column: impl Into<String>, value: impl Into<Value>) -> Self {
        Self {
            column: column.into(),
            value: value.into(),
        }
    }

    /// The filtered column.
    pub fn column(&self) -> &str {
        &self.column
    }

    /// The value the column must equal.
    pub fn value(&self) -> &Value {
        &self.value
    }
}

/// A handle to a relational storage engine.
///
/// Plain reads run outside any transaction scope. All writes go through a [`Transaction`]
/// opened with [`begin`](Self::begin).
///
/// Every read takes a `projection`: the columns to fetch, in order. An empty projection fetches
/// every column. Projecting a column the table does not have is an error; the gateway's
/// projection engine guarantees relation names never reach this layer.
#[async_trait]
pub trait Store: Send + Sync {
    /// Errors returned by the engine.
    type Error: Error;

    /// An atomic scope of reads and writes against this store.
    type Transaction<'a>: Transaction<Error = Self::Error>
    where
        Self: 'a;

    /// Open a transaction scope.
    async fn begin(&self) -> Result<Self::Transaction<'_>, Self::Error>;

    /// Look up a row by primary key.
    async fn find_by_key(
        &self,
        table: &str,
        key: u32,
        projection: &[String],
    ) -> Result<Option<Record>, Self::Error>;

    /// Fetch rows matching `filter`, in primary key order.
    async fn find_all(
        &self,
        table: &str,
        filter: Option<Filter>,
        limit: usize,
        offset: usize,
        projection: &[String],
    ) -> Result<Vec<Record>, Self::Error>;
}

/// An atomic scope of reads and writes.
///
/// Steps within one scope run strictly sequentially. Nothing a scope writes is visible to other
/// readers until [`commit`](Self::commit) returns successfully; a scope that is rolled back (or
/// dropped) has no durable effect.
#[async_trait]
pub trait Transaction: Send {
    /// Errors returned by the engine.
    type Error: Error;

    /// Look up a row by primary key, seeing this scope's own pending writes.
    async fn find_by_key(
        &mut self,
        table: &str,
        key: u32,
        projection: &[String],
    ) -> Result<Option<Record>, Self::Error>;

    /// Insert a row, returning it with its assigned primary key.
    async fn create(&mut self, table: &str, fields: Record) -> Result<Record, Self::Error>;

    /// Update the given fields of the row with primary key `key`, returning the full updated
    /// row.
    async fn update(&mut self, table: &str, key: u32, fields: Record)
        -> Result<Record, Self::Error>;

    /// Delete the row with primary key `key`.
    async fn remove(&mut self, table: &str, key: u32) -> Result<(), Self::Error>;

    /// Make every write in this scope durable.
    ///
    /// # Errors
    ///
    /// Fails if any buffered write conflicts with the committed state, such as a uniqueness
    /// violation. On failure nothing is applied.
    async fn commit(self) -> Result<(), Self::Error>;

    /// Discard every write in this scope.
    async fn rollback(self) -> Result<(), Self::Error>;
}

#[cfg(test)]
mod test {
    use super::*;

    #[test]
    fn test_record_insert_replaces_in_place() {
        let mut record = Record::new().with("id", 1u32).with("name", "Peter");
        record.insert("name", "Maria");
        assert_eq!(record.get("name"), Some(&Value::Text("Maria".into())));
        assert_eq!(record.names().collect::<Vec<_>>(), ["id", "name"]);
    }

    #[test]
    fn test_record_typed_access() {
        let record = Record::new().with("id", 7u32).with("name", "Peter");
        assert_eq!(record.require::<u32>("id").unwrap(), 7);
        assert_eq!(record.require::<String>("name").unwrap(), "Peter");
        assert!(record.require::<u32>("name").is_err());
        assert!(record.require::<String>("missing").is_err());
        assert_eq!(record.opt::<String>("missing").unwrap(), None);
    }

    #[test]
    fn test_value_conversions() {
        assert_eq!(u32::try_from(Value::Int4(7)).unwrap(), 7);
        assert!(u32::try_from(Value::Int4(-1)).is_err());
        assert!(String::try_from(Value::UInt4(1)).is_err());
        assert_eq!(
            Vec::<u8>::try_from(Value::Blob(vec![1, 2, 3])).unwrap(),
            vec![1, 2, 3]
        );
    }
}
