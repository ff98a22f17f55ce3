#![allow(dead_code)]

use std::fs::File;
use std::io::Write;
use std::path::{Path, PathBuf};

use table_anonymizer::{
    data::{Row, Value},
    error::StorageError,
    schema::{ColumnMeta, ColumnType, MappedRecordType, Relation},
    store::{Cursor, MemoryStore, Page, ReadQuery, RowKey, Storage},
};
use tempfile::{TempDir, tempdir};

/// Scratch directory helper that cleans up files automatically on drop.
pub struct TestWorkspace {
    temp_dir: TempDir,
}

impl TestWorkspace {
    pub fn new() -> Self {
        Self {
            temp_dir: tempdir().expect("temp dir"),
        }
    }

    pub fn path(&self) -> &Path {
        self.temp_dir.path()
    }

    /// Writes `contents` into a file under the workspace and returns the path.
    pub fn write(&self, name: &str, contents: &str) -> PathBuf {
        let path = self.temp_dir.path().join(name);
        let mut file = File::create(&path).expect("create temp file");
        file.write_all(contents.as_bytes())
            .expect("write temp file contents");
        path
    }
}

pub fn row(pairs: &[(&str, Value)]) -> Row {
    pairs
        .iter()
        .map(|(k, v)| (k.to_string(), v.clone()))
        .collect()
}

/// `users(id, email, username, role, org_id, anonymized)` with an `org`
/// relation to `orgs(id, kind)`.
pub fn users_record_type() -> MappedRecordType {
    MappedRecordType::new(
        "users",
        "users",
        vec![
            ColumnMeta::new("id", ColumnType::Integer),
            ColumnMeta::new("email", ColumnType::String),
            ColumnMeta::new("username", ColumnType::String),
            ColumnMeta::new("role", ColumnType::String),
            ColumnMeta::new("org_id", ColumnType::Integer),
            ColumnMeta::new("anonymized", ColumnType::Boolean),
        ],
    )
    .with_relation(Relation {
        name: "org".into(),
        table: "orgs".into(),
        local_column: "org_id".into(),
        foreign_column: "id".into(),
    })
}

pub fn orgs_record_type() -> MappedRecordType {
    MappedRecordType::new(
        "orgs",
        "orgs",
        vec![
            ColumnMeta::new("id", ColumnType::Integer),
            ColumnMeta::new("kind", ColumnType::String),
        ],
    )
}

/// `count` users; every third one is an admin, even ids belong to the
/// `staff` org and odd ids to `customer`.
pub fn users_store(count: i64) -> MemoryStore {
    let mut store = MemoryStore::new();
    store
        .create_table(
            "users",
            &["id", "email", "username", "role", "org_id", "anonymized"],
        )
        .create_table("orgs", &["id", "kind"]);
    for (id, kind) in [(1, "staff"), (2, "customer")] {
        let org = row(&[("id", Value::Integer(id)), ("kind", Value::from(kind))]);
        store.insert("orgs", org).expect("insert org");
    }
    for id in 1..=count {
        let role = if id % 3 == 0 { "admin" } else { "member" };
        store
            .insert(
                "users",
                row(&[
                    ("id", Value::Integer(id)),
                    ("email", Value::from(format!("user{id}@corp.example"))),
                    ("username", Value::from(format!("user{id}"))),
                    ("role", Value::from(role)),
                    ("org_id", Value::Integer(if id % 2 == 0 { 1 } else { 2 })),
                    ("anonymized", Value::Boolean(false)),
                ]),
            )
            .expect("insert user");
    }
    store
}

/// Wraps a [`MemoryStore`] and fails once a configured number of write
/// batches (or page reads) has succeeded.
pub struct FlakyStore {
    pub inner: MemoryStore,
    pub fail_after_batches: Option<usize>,
    pub fail_after_pages: Option<usize>,
    pub batches: usize,
    pub pages: std::cell::Cell<usize>,
}

impl FlakyStore {
    pub fn new(inner: MemoryStore) -> Self {
        Self {
            inner,
            fail_after_batches: None,
            fail_after_pages: None,
            batches: 0,
            pages: std::cell::Cell::new(0),
        }
    }
}

impl Storage for FlakyStore {
    fn count(&self, query: &ReadQuery) -> Result<usize, StorageError> {
        self.inner.count(query)
    }

    fn fetch_page(
        &self,
        query: &ReadQuery,
        cursor: Option<Cursor>,
        limit: usize,
    ) -> Result<Page, StorageError> {
        if self
            .fail_after_pages
            .is_some_and(|limit| self.pages.get() >= limit)
        {
            return Err(StorageError::Backend("connection lost".into()));
        }
        self.pages.set(self.pages.get() + 1);
        self.inner.fetch_page(query, cursor, limit)
    }

    fn update(&mut self, table: &str, key: &RowKey, changes: &Row) -> Result<usize, StorageError> {
        self.inner.update(table, key, changes)
    }

    fn update_batch(
        &mut self,
        table: &str,
        updates: &[table_anonymizer::store::RowUpdate],
    ) -> Result<usize, StorageError> {
        if self
            .fail_after_batches
            .is_some_and(|limit| self.batches >= limit)
        {
            return Err(StorageError::Backend("write rejected".into()));
        }
        self.batches += 1;
        self.inner.update_batch(table, updates)
    }

    fn column_exists(&self, table: &str, column: &str) -> Result<bool, StorageError> {
        self.inner.column_exists(table, column)
    }
}

/// Wraps a [`MemoryStore`] but drops the row filter from every read, like a
/// backend that cannot evaluate patterns server side.
pub struct FilterlessStore {
    pub inner: MemoryStore,
}

impl FilterlessStore {
    pub fn new(inner: MemoryStore) -> Self {
        Self { inner }
    }

    fn unfiltered(query: &ReadQuery) -> ReadQuery {
        ReadQuery {
            filter: None,
            ..query.clone()
        }
    }
}

impl Storage for FilterlessStore {
    fn count(&self, query: &ReadQuery) -> Result<usize, StorageError> {
        self.inner.count(&Self::unfiltered(query))
    }

    fn fetch_page(
        &self,
        query: &ReadQuery,
        cursor: Option<Cursor>,
        limit: usize,
    ) -> Result<Page, StorageError> {
        self.inner
            .fetch_page(&Self::unfiltered(query), cursor, limit)
    }

    fn update(&mut self, table: &str, key: &RowKey, changes: &Row) -> Result<usize, StorageError> {
        self.inner.update(table, key, changes)
    }

    fn column_exists(&self, table: &str, column: &str) -> Result<bool, StorageError> {
        self.inner.column_exists(table, column)
    }
}
