//! CSV directory backend: each table is `<dir>/<table>.csv` with a header
//! row. Tables are loaded into a [`MemoryStore`], anonymized there and
//! written back in place.

use std::{
    collections::HashSet,
    fs::File,
    io::{BufReader, BufWriter, Read, Write},
    path::{Path, PathBuf},
};

use anyhow::{Context, Result, anyhow};
use csv::QuoteStyle;
use log::{debug, info};

use crate::{
    data::{Row, parse_typed_value},
    schema::{ColumnType, MappedRecordType},
    store::MemoryStore,
};

pub const DEFAULT_CSV_DELIMITER: u8 = b',';
pub const DEFAULT_TSV_DELIMITER: u8 = b'\t';

#[derive(Debug, Clone)]
pub struct CsvDirectory {
    root: PathBuf,
    delimiter: u8,
}

impl CsvDirectory {
    pub fn new(root: impl Into<PathBuf>) -> Self {
        Self {
            root: root.into(),
            delimiter: DEFAULT_CSV_DELIMITER,
        }
    }

    pub fn with_delimiter(mut self, delimiter: u8) -> Self {
        self.delimiter = delimiter;
        self
    }

    pub fn root(&self) -> &Path {
        &self.root
    }

    fn extension(&self) -> &'static str {
        if self.delimiter == DEFAULT_TSV_DELIMITER {
            "tsv"
        } else {
            "csv"
        }
    }

    pub fn path_for(&self, table: &str) -> PathBuf {
        self.root.join(format!("{table}.{}", self.extension()))
    }

    /// Loads the table of every record type, parsing declared columns with
    /// their storage type. Undeclared columns are kept as strings.
    pub fn load<'a, I>(&self, record_types: I) -> Result<MemoryStore>
    where
        I: IntoIterator<Item = &'a MappedRecordType>,
    {
        let mut store = MemoryStore::new();
        let mut seen = HashSet::new();
        for record_type in record_types {
            let table = record_type.table();
            if !seen.insert(table.to_string()) {
                continue;
            }
            let path = self.path_for(table);
            let file =
                File::open(&path).with_context(|| format!("Opening table file {path:?}"))?;
            let rows = self
                .read_table(BufReader::new(file), record_type, &mut store)
                .with_context(|| format!("Reading table '{table}' from {path:?}"))?;
            info!("Loaded {rows} row(s) into '{table}' from {path:?}");
        }
        Ok(store)
    }

    fn read_table<R: Read>(
        &self,
        reader: R,
        record_type: &MappedRecordType,
        store: &mut MemoryStore,
    ) -> Result<usize> {
        let table = record_type.table();
        let mut reader = csv::ReaderBuilder::new()
            .has_headers(true)
            .delimiter(self.delimiter)
            .double_quote(true)
            .flexible(false)
            .from_reader(reader);
        let headers = reader
            .headers()?
            .iter()
            .map(|h| h.trim().to_string())
            .collect::<Vec<_>>();
        let types = headers
            .iter()
            .map(|h| {
                record_type
                    .column(h)
                    .map(|c| c.datatype)
                    .unwrap_or(ColumnType::String)
            })
            .collect::<Vec<_>>();
        store.create_table(table, headers.as_slice());

        let mut count = 0;
        for (idx, record) in reader.records().enumerate() {
            let record = record?;
            let mut row = Row::new();
            for ((header, ty), raw) in headers.iter().zip(&types).zip(record.iter()) {
                let value = parse_typed_value(raw, ty).with_context(|| {
                    format!("Row {}: column '{header}' expects {ty}", idx + 2)
                })?;
                row.insert(header.clone(), value);
            }
            store
                .insert(table, row)
                .map_err(|err| anyhow!("Row {}: {err}", idx + 2))?;
            count += 1;
        }
        Ok(count)
    }

    /// Writes every table of `store` back to the directory.
    pub fn save(&self, store: &MemoryStore) -> Result<()> {
        for name in store.table_names() {
            let path = self.path_for(name);
            self.write_table(store, name, &path)
                .with_context(|| format!("Writing table '{name}' to {path:?}"))?;
            debug!("Wrote table '{name}' to {path:?}");
        }
        Ok(())
    }

    fn write_table(&self, store: &MemoryStore, name: &str, path: &Path) -> Result<()> {
        let table = store
            .table(name)
            .ok_or_else(|| anyhow!("Unknown table '{name}'"))?;
        let file =
            File::create(path).with_context(|| format!("Creating table file {path:?}"))?;
        let mut writer = csv::WriterBuilder::new()
            .delimiter(self.delimiter)
            .quote_style(QuoteStyle::Necessary)
            .double_quote(true)
            .from_writer(BufWriter::new(file));
        writer.write_record(table.columns())?;
        for row in table.rows() {
            writer.write_record(
                table
                    .columns()
                    .iter()
                    .map(|c| row.get(c).map(|v| v.as_display()).unwrap_or_default()),
            )?;
        }
        let mut inner = writer
            .into_inner()
            .map_err(|err| anyhow!("Flushing {path:?}: {}", err.error()))?;
        inner.flush()?;
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::{
        data::Value,
        schema::ColumnMeta,
        store::{ReadQuery, Storage},
    };

    #[test]
    fn load_parses_declared_types() {
        let dir = tempfile::tempdir().unwrap();
        std::fs::write(
            dir.path().join("people.csv"),
            "id,name,age\n1,Ann,34\n2,Bo,\n",
        )
        .unwrap();
        let record_type = MappedRecordType::new(
            "people",
            "people",
            vec![
                ColumnMeta::new("id", ColumnType::Integer),
                ColumnMeta::new("name", ColumnType::String),
                ColumnMeta::new("age", ColumnType::Integer),
            ],
        );
        let store = CsvDirectory::new(dir.path()).load([&record_type]).unwrap();
        let rows = store.rows("people").unwrap();
        assert_eq!(rows[0]["age"], Value::Integer(34));
        assert!(rows[1]["age"].is_null());
        assert_eq!(store.count(&ReadQuery::table("people")).unwrap(), 2);
    }

    #[test]
    fn load_reports_bad_values_with_row_number() {
        let dir = tempfile::tempdir().unwrap();
        std::fs::write(dir.path().join("t.csv"), "id\n1\nabc\n").unwrap();
        let record_type =
            MappedRecordType::new("t", "t", vec![ColumnMeta::new("id", ColumnType::Integer)]);
        let err = CsvDirectory::new(dir.path())
            .load([&record_type])
            .unwrap_err();
        assert!(format!("{err:#}").contains("Row 3"));
    }
}
