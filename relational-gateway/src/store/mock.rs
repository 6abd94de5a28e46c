//! Mock instantiation of the abstract [`store`](super) interface.
//!
//! This instantiation is built on a simple in-memory database. It is useful for testing the
//! gateway in isolation from an actual storage engine. Transactions buffer their writes and
//! apply them atomically under a write lock at commit time, which is also where uniqueness
//! constraints are enforced, so two scopes racing on the same unique value resolve to exactly
//! one winner.
#![cfg(any(test, feature = "mocks"))]

use super::{Error as _, Filter, Record, Value};
use async_std::sync::{Arc, RwLock};
use async_trait::async_trait;
use itertools::Itertools;
use snafu::Snafu;
use std::collections::{BTreeMap, HashMap};
use std::fmt::Display;

/// Errors returned by the in-memory store.
#[derive(Debug, Snafu)]
#[snafu(display("mock store error: {}", message))]
pub struct Error {
    message: String,
    constraint: bool,
}

impl From<String> for Error {
    fn from(message: String) -> Self {
        Self {
            message,
            constraint: false,
        }
    }
}

impl From<&str> for Error {
    fn from(s: &str) -> Self {
        s.to_string().into()
    }
}

impl super::Error for Error {
    fn custom(msg: impl Display) -> Self {
        msg.to_string().into()
    }

    fn constraint(column: &str) -> Self {
        Self {
            message: format!("duplicate value for unique column {column}"),
            constraint: true,
        }
    }

    fn is_constraint(&self) -> bool {
        self.constraint
    }
}

/// The in-memory database.
#[derive(Clone, Debug, Default)]
struct Db {
    tables: HashMap<String, Table>,
}

impl Db {
    fn table(&self, name: &str) -> Result<&Table, Error> {
        self.tables
            .get(name)
            .ok_or_else(|| Error::from(format!("no such table {name}")))
    }

    fn table_mut(&mut self, name: &str) -> Result<&mut Table, Error> {
        self.tables
            .get_mut(name)
            .ok_or_else(|| Error::from(format!("no such table {name}")))
    }
}

/// An in-memory table.
///
/// Every table has an implicit auto-incrementing `id` primary key in addition to its declared
/// columns.
#[derive(Clone, Debug)]
struct Table {
    name: String,
    columns: Vec<String>,
    unique: Vec<String>,
    next_key: u32,
    rows: BTreeMap<u32, Record>,
}

impl Table {
    fn new(name: String, columns: &[&str], unique: &[&str]) -> Self {
        let columns = ["id"]
            .into_iter()
            .chain(columns.iter().copied())
            .map(String::from)
            .collect();
        Self {
            name,
            columns,
            unique: unique.iter().map(|&c| c.into()).collect(),
            next_key: 1,
            rows: BTreeMap::new(),
        }
    }

    fn check_columns(&self, fields: &Record) -> Result<(), Error> {
        for name in fields.names() {
            if !self.columns.iter().any(|c| c == name) {
                return Err(Error::no_such_column(&self.name, name));
            }
        }
        Ok(())
    }

    fn check_unique(&self, key: u32, fields: &Record) -> Result<(), Error> {
        for column in &self.unique {
            let Some(value) = fields.get(column) else { continue };
            let taken = self
                .rows
                .iter()
                .any(|(&other, row)| other != key && row.get(column) == Some(value));
            if taken {
                return Err(Error::constraint(column));
            }
        }
        Ok(())
    }

    /// Insert a committed row, assigning it the next primary key.
    fn insert(&mut self, fields: Record) -> Result<Record, Error> {
        self.check_columns(&fields)?;
        let key = self.next_key;
        self.check_unique(key, &fields)?;
        self.next_key += 1;

        let mut row = Record::new().with("id", key);
        for (name, value) in fields.iter() {
            row.insert(name, value.clone());
        }
        self.rows.insert(key, row.clone());
        Ok(row)
    }

    /// Create a new row with just the specified columns, in the specified order.
    fn project(&self, row: &Record, projection: &[String]) -> Result<Record, Error> {
        if projection.is_empty() {
            return Ok(row.clone());
        }
        let mut selected = Record::new();
        for column in projection {
            if !self.columns.iter().any(|c| c == column) {
                return Err(Error::no_such_column(&self.name, column));
            }
            // A declared column can be absent from a row when it was never set; it projects to
            // nothing, like a NULL.
            if let Some(value) = row.get(column) {
                selected.insert(column.clone(), value.clone());
            }
        }
        Ok(selected)
    }

    /// The rows matching `filter`, in primary key order.
    fn matching<'a>(&'a self, filter: Option<&'a Filter>) -> Result<Vec<&'a Record>, Error> {
        if let Some(filter) = filter {
            if !self.columns.iter().any(|c| c == filter.column()) {
                return Err(Error::no_such_column(&self.name, filter.column()));
            }
        }
        Ok(self
            .rows
            .values()
            .filter(|row| match filter {
                Some(filter) => row.get(filter.column()) == Some(filter.value()),
                None => true,
            })
            .collect_vec())
    }
}

/// A connection to the in-memory store.
#[derive(Clone, Debug, Default)]
pub struct Store(Arc<RwLock<Db>>);

impl Store {
    /// Create a new, empty in-memory store.
    ///
    /// Once created, this handle can be [cloned](Clone) in order to create multiple
    /// simultaneous connections to the same store.
    pub fn create() -> Self {
        Self::default()
    }

    /// Create a table with the given column names.
    ///
    /// An auto-incrementing `id` primary key is added implicitly. Columns named in `unique`
    /// must hold distinct values across rows.
    pub async fn create_table(&self, table: impl Into<String>, columns: &[&str], unique: &[&str]) {
        let mut db = self.0.write().await;
        let table = table.into();
        db.tables
            .entry(table.clone())
            .or_insert_with(|| Table::new(table, columns, unique));
    }

    /// Create a table and populate it with the given rows.
    ///
    /// Returns the inserted rows with their assigned primary keys.
    pub async fn create_table_with_rows(
        &self,
        table: impl Into<String>,
        columns: &[&str],
        unique: &[&str],
        rows: impl IntoIterator<Item = Record>,
    ) -> Result<Vec<Record>, Error> {
        let table = table.into();
        self.create_table(&*table, columns, unique).await;

        let mut db = self.0.write().await;
        let table = db.table_mut(&table)?;
        rows.into_iter().map(|row| table.insert(row)).collect()
    }
}

#[async_trait]
impl super::Store for Store {
    type Error = Error;
    type Transaction<'a> = Transaction;

    async fn begin(&self) -> Result<Transaction, Error> {
        Ok(Transaction {
            db: self.0.clone(),
            pending: vec![],
        })
    }

    async fn find_by_key(
        &self,
        table: &str,
        key: u32,
        projection: &[String],
    ) -> Result<Option<Record>, Error> {
        tracing::info!("SELECT {projection:?} FROM {table} WHERE id = {key}");
        let db = self.0.read().await;
        let table = db.table(table)?;
        table
            .rows
            .get(&key)
            .map(|row| table.project(row, projection))
            .transpose()
    }

    async fn find_all(
        &self,
        table: &str,
        filter: Option<Filter>,
        limit: usize,
        offset: usize,
        projection: &[String],
    ) -> Result<Vec<Record>, Error> {
        tracing::info!("SELECT {projection:?} FROM {table} WHERE {filter:?}");
        let db = self.0.read().await;
        let table = db.table(table)?;
        table
            .matching(filter.as_ref())?
            .into_iter()
            .skip(offset)
            .take(limit)
            .map(|row| table.project(row, projection))
            .collect()
    }
}

/// A buffered write.
#[derive(Clone, Debug)]
enum Op {
    Create {
        table: String,
        key: u32,
        row: Record,
    },
    Update {
        table: String,
        key: u32,
        fields: Record,
    },
    Remove {
        table: String,
        key: u32,
    },
}

/// A transaction scope against the in-memory store.
///
/// Writes are buffered and applied atomically at [`commit`](super::Transaction::commit); a
/// scope that is rolled back or dropped leaves the store untouched. Reads within the scope see
/// the committed state overlaid with the scope's own pending writes.
pub struct Transaction {
    db: Arc<RwLock<Db>>,
    pending: Vec<Op>,
}

impl Transaction {
    /// The scope's view of the row with primary key `key`: committed state plus pending writes.
    fn overlay(&self, base: Option<Record>, table: &str, key: u32) -> Option<Record> {
        let mut row = base;
        for op in &self.pending {
            match op {
                Op::Create {
                    table: t,
                    key: k,
                    row: created,
                } if t == table && *k == key => row = Some(created.clone()),
                Op::Update {
                    table: t,
                    key: k,
                    fields,
                } if t == table && *k == key => {
                    if let Some(row) = &mut row {
                        for (name, value) in fields.iter() {
                            row.insert(name, value.clone());
                        }
                    }
                }
                Op::Remove { table: t, key: k } if t == table && *k == key => row = None,
                _ => {}
            }
        }
        row
    }
}

#[async_trait]
impl super::Transaction for Transaction {
    type Error = Error;

    async fn find_by_key(
        &mut self,
        table: &str,
        key: u32,
        projection: &[String],
    ) -> Result<Option<Record>, Error> {
        let db = self.db.read().await;
        let base = db.table(table)?.rows.get(&key).cloned();
        let row = self.overlay(base, table, key);
        row.map(|row| db.table(table)?.project(&row, projection))
            .transpose()
    }

    async fn create(&mut self, table: &str, fields: Record) -> Result<Record, Error> {
        // Reserve the key eagerly so concurrent scopes never collide; a rolled back scope
        // simply burns its key, the way a real sequence would.
        let mut db = self.db.write().await;
        let t = db.table_mut(table)?;
        t.check_columns(&fields)?;
        let key = t.next_key;
        t.next_key += 1;
        drop(db);

        tracing::info!("INSERT INTO {table} ({:?})", fields.names().collect_vec());
        let mut row = Record::new().with("id", key);
        for (name, value) in fields.iter() {
            row.insert(name, value.clone());
        }
        self.pending.push(Op::Create {
            table: table.into(),
            key,
            row: row.clone(),
        });
        Ok(row)
    }

    async fn update(&mut self, table: &str, key: u32, fields: Record) -> Result<Record, Error> {
        let db = self.db.read().await;
        db.table(table)?.check_columns(&fields)?;
        let base = db.table(table)?.rows.get(&key).cloned();
        drop(db);

        tracing::info!("UPDATE {table} SET {:?} WHERE id = {key}", fields);
        let mut row = self
            .overlay(base, table, key)
            .ok_or_else(|| Error::from(format!("no row with id {key} in table {table}")))?;
        for (name, value) in fields.iter() {
            row.insert(name, value.clone());
        }
        self.pending.push(Op::Update {
            table: table.into(),
            key,
            fields,
        });
        Ok(row)
    }

    async fn remove(&mut self, table: &str, key: u32) -> Result<(), Error> {
        let db = self.db.read().await;
        let base = db.table(table)?.rows.get(&key).cloned();
        drop(db);

        tracing::info!("DELETE FROM {table} WHERE id = {key}");
        if self.overlay(base, table, key).is_none() {
            return Err(format!("no row with id {key} in table {table}").into());
        }
        self.pending.push(Op::Remove {
            table: table.into(),
            key,
        });
        Ok(())
    }

    async fn commit(self) -> Result<(), Error> {
        let mut db = self.db.write().await;

        // Stage the whole commit against a copy so a failing op leaves nothing applied.
        let mut staged = db.tables.clone();
        for op in &self.pending {
            match op {
                Op::Create { table, key, row } => {
                    let table = staged
                        .get_mut(table)
                        .ok_or_else(|| Error::from(format!("no such table {table}")))?;
                    table.check_unique(*key, row)?;
                    table.rows.insert(*key, row.clone());
                }
                Op::Update { table, key, fields } => {
                    let table = staged
                        .get_mut(table)
                        .ok_or_else(|| Error::from(format!("no such table {table}")))?;
                    table.check_unique(*key, fields)?;
                    let row = table.rows.get_mut(key).ok_or_else(|| {
                        Error::from(format!("no row with id {key} in table {}", table.name))
                    })?;
                    for (name, value) in fields.iter() {
                        row.insert(name, value.clone());
                    }
                }
                Op::Remove { table, key } => {
                    staged
                        .get_mut(table)
                        .ok_or_else(|| Error::from(format!("no such table {table}")))?
                        .rows
                        .remove(key);
                }
            }
        }

        db.tables = staged;
        Ok(())
    }

    async fn rollback(self) -> Result<(), Error> {
        Ok(())
    }
}
