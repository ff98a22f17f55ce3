//! Storage seam used by the anonymizer.
//!
//! The engine reads rows page by page through [`Storage::fetch_page`] and
//! writes changed columns back keyed by the record's identifier columns.
//! [`MemoryStore`] is the in-process backend; it evaluates filters and
//! equality joins itself and counts the write statements it receives.

use std::collections::BTreeMap;

use log::debug;

use crate::{data::Row, error::StorageError, pattern::RowFilter};

/// Position in a table scan; opaque to callers.
pub type Cursor = usize;

/// Identifier columns and their values.
pub type RowKey = Row;

/// Left join of a related table, flattened into `relation.column` keys.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Join {
    pub relation: String,
    pub table: String,
    pub local_column: String,
    pub foreign_column: String,
}

#[derive(Debug, Clone)]
pub struct ReadQuery {
    pub table: String,
    /// Optional push-down filter; backends may ignore it.
    pub filter: Option<RowFilter>,
    pub joins: Vec<Join>,
}

impl ReadQuery {
    pub fn table(table: &str) -> Self {
        Self {
            table: table.to_string(),
            filter: None,
            joins: Vec::new(),
        }
    }

    pub fn with_filter(mut self, filter: RowFilter) -> Self {
        self.filter = (!filter.is_empty()).then_some(filter);
        self
    }

    pub fn with_joins(mut self, joins: Vec<Join>) -> Self {
        self.joins = joins;
        self
    }

    /// True when `row` passes the push-down filter, or there is none.
    pub fn admits(&self, row: &Row) -> bool {
        match &self.filter {
            Some(filter) => filter.matches(row),
            None => true,
        }
    }
}

#[derive(Debug, Clone, Default)]
pub struct Page {
    pub rows: Vec<Row>,
    /// Cursor for the next page; `None` once the scan is exhausted.
    pub next: Option<Cursor>,
}

#[derive(Debug, Clone, PartialEq)]
pub struct RowUpdate {
    pub key: RowKey,
    pub changes: Row,
}

pub trait Storage {
    fn count(&self, query: &ReadQuery) -> Result<usize, StorageError>;

    fn fetch_page(
        &self,
        query: &ReadQuery,
        cursor: Option<Cursor>,
        limit: usize,
    ) -> Result<Page, StorageError>;

    /// Applies `changes` to every row matching `key`; returns the number of
    /// rows affected.
    fn update(&mut self, table: &str, key: &RowKey, changes: &Row) -> Result<usize, StorageError>;

    fn update_batch(&mut self, table: &str, updates: &[RowUpdate]) -> Result<usize, StorageError> {
        let mut affected = 0;
        for update in updates {
            affected += self.update(table, &update.key, &update.changes)?;
        }
        Ok(affected)
    }

    fn column_exists(&self, table: &str, column: &str) -> Result<bool, StorageError>;
}

#[derive(Debug, Clone, Default)]
pub struct MemoryTable {
    columns: Vec<String>,
    rows: Vec<Row>,
}

impl MemoryTable {
    pub fn columns(&self) -> &[String] {
        &self.columns
    }

    pub fn rows(&self) -> &[Row] {
        &self.rows
    }
}

#[derive(Debug, Clone, Default)]
pub struct MemoryStore {
    tables: BTreeMap<String, MemoryTable>,
    writes: usize,
}

impl MemoryStore {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn create_table<S: AsRef<str>>(&mut self, name: &str, columns: &[S]) -> &mut Self {
        self.tables.insert(
            name.to_string(),
            MemoryTable {
                columns: columns.iter().map(|c| c.as_ref().to_string()).collect(),
                rows: Vec::new(),
            },
        );
        self
    }

    /// Appends a row; values for undeclared columns are rejected and missing
    /// columns read as absent.
    pub fn insert(&mut self, table: &str, row: Row) -> Result<(), StorageError> {
        let entry = self.table_mut(table)?;
        if let Some(column) = row.keys().find(|key| !entry.columns.contains(key)) {
            return Err(StorageError::UnknownColumn {
                table: table.to_string(),
                column: column.clone(),
            });
        }
        entry.rows.push(row);
        Ok(())
    }

    pub fn table(&self, name: &str) -> Option<&MemoryTable> {
        self.tables.get(name)
    }

    pub fn rows(&self, table: &str) -> Option<&[Row]> {
        self.tables.get(table).map(|t| t.rows.as_slice())
    }

    pub fn table_names(&self) -> impl Iterator<Item = &str> {
        self.tables.keys().map(String::as_str)
    }

    /// Number of update statements issued so far.
    pub fn writes(&self) -> usize {
        self.writes
    }

    fn table_ref(&self, name: &str) -> Result<&MemoryTable, StorageError> {
        self.tables
            .get(name)
            .ok_or_else(|| StorageError::UnknownTable(name.to_string()))
    }

    fn table_mut(&mut self, name: &str) -> Result<&mut MemoryTable, StorageError> {
        self.tables
            .get_mut(name)
            .ok_or_else(|| StorageError::UnknownTable(name.to_string()))
    }

    fn joined(&self, row: &Row, joins: &[Join]) -> Result<Row, StorageError> {
        let mut flat = row.clone();
        for join in joins {
            let related = self.table_ref(&join.table)?;
            let Some(local) = row.get(&join.local_column).filter(|v| !v.is_null()) else {
                continue;
            };
            let local = local.as_display();
            let matched = related.rows.iter().find(|candidate| {
                candidate
                    .get(&join.foreign_column)
                    .is_some_and(|value| value.as_display() == local)
            });
            if let Some(matched) = matched {
                for (column, value) in matched {
                    flat.insert(format!("{}.{column}", join.relation), value.clone());
                }
            }
        }
        Ok(flat)
    }
}

fn key_matches(row: &Row, key: &RowKey) -> bool {
    key.iter()
        .all(|(column, value)| row.get(column) == Some(value))
}

impl Storage for MemoryStore {
    fn count(&self, query: &ReadQuery) -> Result<usize, StorageError> {
        let table = self.table_ref(&query.table)?;
        let mut total = 0;
        for row in &table.rows {
            let flat = self.joined(row, &query.joins)?;
            if query.admits(&flat) {
                total += 1;
            }
        }
        Ok(total)
    }

    fn fetch_page(
        &self,
        query: &ReadQuery,
        cursor: Option<Cursor>,
        limit: usize,
    ) -> Result<Page, StorageError> {
        let table = self.table_ref(&query.table)?;
        let start = cursor.unwrap_or(0);
        let limit = limit.max(1);
        let mut rows = Vec::with_capacity(limit);
        // The cursor tracks physical positions, so rows rewritten by earlier
        // pages never shift later ones.
        let mut position = start;
        while position < table.rows.len() && rows.len() < limit {
            let flat = self.joined(&table.rows[position], &query.joins)?;
            position += 1;
            if query.admits(&flat) {
                rows.push(flat);
            }
        }
        let next = (position < table.rows.len()).then_some(position);
        debug!(
            "Fetched {} row(s) from '{}' starting at {start}",
            rows.len(),
            query.table
        );
        Ok(Page { rows, next })
    }

    fn update(&mut self, table: &str, key: &RowKey, changes: &Row) -> Result<usize, StorageError> {
        let entry = self.table_mut(table)?;
        if let Some(column) = changes.keys().find(|c| !entry.columns.contains(c)) {
            return Err(StorageError::UnknownColumn {
                table: table.to_string(),
                column: column.clone(),
            });
        }
        let mut affected = 0;
        for row in entry.rows.iter_mut().filter(|row| key_matches(row, key)) {
            for (column, value) in changes {
                row.insert(column.clone(), value.clone());
            }
            affected += 1;
        }
        self.writes += 1;
        Ok(affected)
    }

    fn column_exists(&self, table: &str, column: &str) -> Result<bool, StorageError> {
        Ok(self
            .table_ref(table)?
            .columns
            .iter()
            .any(|c| c == column))
    }
}
