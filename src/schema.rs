//! Mapped record types: the storage layout of one table.
//!
//! A [`MappedRecordType`] names a table, its ordered [`ColumnMeta`]
//! descriptors, its identifier column(s) and the [`Relation`]s through which
//! patterns may reach columns of other tables. How record types are discovered
//! is left to a [`SchemaProvider`]; the YAML catalog in [`crate::config`] is
//! one such provider.

use std::{fmt, str::FromStr};

use anyhow::{Result, anyhow};
use serde::{Deserialize, Deserializer, Serialize, Serializer, de};

pub const DEFAULT_ID_COLUMN: &str = "id";

#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum ColumnType {
    #[default]
    String,
    Integer,
    Float,
    Decimal,
    Boolean,
    Date,
    DateTime,
    Guid,
}

impl ColumnType {
    pub fn as_str(&self) -> &'static str {
        match self {
            ColumnType::String => "string",
            ColumnType::Integer => "integer",
            ColumnType::Float => "float",
            ColumnType::Decimal => "decimal",
            ColumnType::Boolean => "boolean",
            ColumnType::Date => "date",
            ColumnType::DateTime => "datetime",
            ColumnType::Guid => "guid",
        }
    }

    pub fn variants() -> &'static [&'static str] {
        &[
            "string", "integer", "float", "decimal", "boolean", "date", "datetime", "guid",
        ]
    }

    pub fn is_numeric(&self) -> bool {
        matches!(
            self,
            ColumnType::Integer | ColumnType::Float | ColumnType::Decimal
        )
    }
}

impl fmt::Display for ColumnType {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

impl FromStr for ColumnType {
    type Err = anyhow::Error;

    fn from_str(value: &str) -> Result<Self> {
        let normalized = value.trim().to_ascii_lowercase();
        let base = normalized
            .split_once('(')
            .map(|(head, _)| head.trim())
            .unwrap_or(normalized.as_str());
        match base {
            "string" | "str" | "text" | "varchar" | "char" | "json" => Ok(ColumnType::String),
            "integer" | "int" | "smallint" | "bigint" | "tinyint" => Ok(ColumnType::Integer),
            "float" | "double" | "real" => Ok(ColumnType::Float),
            "decimal" | "numeric" | "money" => Ok(ColumnType::Decimal),
            "boolean" | "bool" => Ok(ColumnType::Boolean),
            "date" => Ok(ColumnType::Date),
            "datetime" | "timestamp" | "datetime_immutable" => Ok(ColumnType::DateTime),
            "guid" | "uuid" => Ok(ColumnType::Guid),
            _ => Err(anyhow!(
                "Unknown column type '{value}'. Supported types: {}",
                ColumnType::variants().join(", ")
            )),
        }
    }
}

impl Serialize for ColumnType {
    fn serialize<S>(&self, serializer: S) -> std::result::Result<S::Ok, S::Error>
    where
        S: Serializer,
    {
        serializer.serialize_str(self.as_str())
    }
}

impl<'de> Deserialize<'de> for ColumnType {
    fn deserialize<D>(deserializer: D) -> std::result::Result<Self, D::Error>
    where
        D: Deserializer<'de>,
    {
        let raw = String::deserialize(deserializer)?;
        ColumnType::from_str(&raw).map_err(de::Error::custom)
    }
}

#[derive(Debug, Clone, Serialize, Deserialize, PartialEq, Eq)]
pub struct ColumnMeta {
    pub name: String,
    #[serde(default, rename = "type", alias = "datatype")]
    pub datatype: ColumnType,
}

impl ColumnMeta {
    pub fn new(name: &str, datatype: ColumnType) -> Self {
        Self {
            name: name.to_string(),
            datatype,
        }
    }
}

/// Equality join path from the owning table to a related table.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq, Eq)]
pub struct Relation {
    pub name: String,
    pub table: String,
    #[serde(rename = "local")]
    pub local_column: String,
    #[serde(rename = "foreign", default = "default_id_column")]
    pub foreign_column: String,
}

#[derive(Debug, Clone, Serialize, Deserialize, PartialEq, Eq)]
pub struct MappedRecordType {
    pub name: String,
    #[serde(default)]
    table: Option<String>,
    #[serde(default = "default_id_columns", deserialize_with = "one_or_many")]
    pub id: Vec<String>,
    pub columns: Vec<ColumnMeta>,
    #[serde(default, skip_serializing_if = "Vec::is_empty")]
    pub relations: Vec<Relation>,
}

impl MappedRecordType {
    pub fn new(name: &str, table: &str, columns: Vec<ColumnMeta>) -> Self {
        Self {
            name: name.to_string(),
            table: Some(table.to_string()),
            id: default_id_columns(),
            columns,
            relations: Vec::new(),
        }
    }

    pub fn with_id(mut self, id: &[&str]) -> Self {
        self.id = id.iter().map(|c| c.to_string()).collect();
        self
    }

    pub fn with_relation(mut self, relation: Relation) -> Self {
        self.relations.push(relation);
        self
    }

    /// Storage table name; defaults to the record type name.
    pub fn table(&self) -> &str {
        self.table.as_deref().unwrap_or(&self.name)
    }

    pub fn column(&self, name: &str) -> Option<&ColumnMeta> {
        self.columns.iter().find(|c| c.name == name)
    }

    pub fn column_index(&self, name: &str) -> Option<usize> {
        self.columns.iter().position(|c| c.name == name)
    }

    pub fn has_column(&self, name: &str) -> bool {
        self.column(name).is_some()
    }

    pub fn relation(&self, name: &str) -> Option<&Relation> {
        self.relations.iter().find(|r| r.name == name)
    }

    pub fn column_type(&self, name: &str) -> ColumnType {
        self.column(name)
            .map(|c| c.datatype)
            .unwrap_or(ColumnType::String)
    }
}

/// Resolves mapped record types by name.
pub trait SchemaProvider {
    fn record_type(&self, name: &str) -> Option<&MappedRecordType>;

    fn record_type_names(&self) -> Vec<String>;
}

fn default_id_column() -> String {
    DEFAULT_ID_COLUMN.to_string()
}

fn default_id_columns() -> Vec<String> {
    vec![default_id_column()]
}

fn one_or_many<'de, D>(deserializer: D) -> std::result::Result<Vec<String>, D::Error>
where
    D: Deserializer<'de>,
{
    #[derive(Deserialize)]
    #[serde(untagged)]
    enum OneOrMany {
        One(String),
        Many(Vec<String>),
    }

    match OneOrMany::deserialize(deserializer)? {
        OneOrMany::One(single) => Ok(vec![single]),
        OneOrMany::Many(many) => Ok(many),
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn column_type_accepts_sql_aliases() {
        assert_eq!(
            "VARCHAR(255)".parse::<ColumnType>().unwrap(),
            ColumnType::String
        );
        assert_eq!("bigint".parse::<ColumnType>().unwrap(), ColumnType::Integer);
        assert_eq!(
            "numeric(10,2)".parse::<ColumnType>().unwrap(),
            ColumnType::Decimal
        );
        assert_eq!(
            "timestamp".parse::<ColumnType>().unwrap(),
            ColumnType::DateTime
        );
        assert!("blob".parse::<ColumnType>().is_err());
    }

    #[test]
    fn record_type_defaults_table_and_identifier() {
        let yaml = r#"
name: users
columns:
  - name: id
    type: integer
  - name: email
"#;
        let record: MappedRecordType = serde_yaml::from_str(yaml).expect("parse record type");
        assert_eq!(record.table(), "users");
        assert_eq!(record.id, vec!["id".to_string()]);
        assert_eq!(record.column_type("email"), ColumnType::String);
        assert_eq!(record.column_type("id"), ColumnType::Integer);
    }

    #[test]
    fn record_type_accepts_single_or_composite_identifier() {
        let yaml = r#"
name: memberships
table: user_groups
id: [user_id, group_id]
columns:
  - { name: user_id, type: int }
  - { name: group_id, type: int }
relations:
  - { name: user, table: users, local: user_id }
"#;
        let record: MappedRecordType = serde_yaml::from_str(yaml).expect("parse record type");
        assert_eq!(record.table(), "user_groups");
        assert_eq!(record.id.len(), 2);
        let relation = record.relation("user").expect("relation");
        assert_eq!(relation.foreign_column, "id");
    }
}
