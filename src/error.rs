//! Typed errors raised by the anonymization engine.
//!
//! The engine distinguishes configuration problems (detected while planning a
//! run, before any row is read) from storage failures (which abort the run of
//! one entity) and from per-field generator or coercion failures (which are
//! recorded and skipped). Collaborators such as the CLI wrap these in
//! `anyhow` errors.

use thiserror::Error;

use crate::anonymizer::AnonymizationResult;

#[derive(Debug, Error)]
pub enum PatternError {
    #[error("empty condition for field '{field}'")]
    EmptyCondition { field: String },
    #[error("condition '{condition}' on field '{field}' expects a numeric operand")]
    InvalidNumber { field: String, condition: String },
    #[error("wildcard '{condition}' on field '{field}' could not be compiled: {message}")]
    InvalidWildcard {
        field: String,
        condition: String,
        message: String,
    },
}

#[derive(Debug, Error)]
pub enum FakerError {
    #[error("unknown faker '{0}'")]
    UnknownFaker(String),
    #[error("service '{0}' is not registered")]
    UnknownService(String),
    #[error("missing required option '{0}'")]
    MissingOption(String),
    #[error("invalid option '{name}': {message}")]
    InvalidOption { name: String, message: String },
    #[error("{0}")]
    Failed(String),
}

impl FakerError {
    pub fn invalid(name: &str, message: impl Into<String>) -> Self {
        FakerError::InvalidOption {
            name: name.to_string(),
            message: message.into(),
        }
    }
}

#[derive(Debug, Error)]
pub enum ValueError {
    #[error("cannot coerce '{value}' to {target}")]
    Coercion { value: String, target: String },
}

#[derive(Debug, Error)]
pub enum ConfigError {
    #[error("unknown entity '{0}'")]
    UnknownEntity(String),
    #[error("entity '{entity}' has no anonymization rules")]
    NoRules { entity: String },
    #[error("entity '{entity}' declares no identifier column")]
    MissingIdentifier { entity: String },
    #[error("entity '{entity}': column '{column}' is not declared on table '{table}'")]
    UnknownColumn {
        entity: String,
        table: String,
        column: String,
    },
    #[error("entity '{entity}': relation '{relation}' used by field '{field}' is undeclared")]
    UnknownRelation {
        entity: String,
        field: String,
        relation: String,
    },
    #[error("entity '{entity}', field '{field}': {source}")]
    Faker {
        entity: String,
        field: String,
        #[source]
        source: FakerError,
    },
    #[error("entity '{entity}', rule '{rule}': {source}")]
    Pattern {
        entity: String,
        rule: String,
        #[source]
        source: PatternError,
    },
}

#[derive(Debug, Error)]
pub enum StorageError {
    #[error("table '{0}' not found")]
    UnknownTable(String),
    #[error("column '{column}' not found in table '{table}'")]
    UnknownColumn { table: String, column: String },
    #[error("I/O error: {0}")]
    Io(#[from] std::io::Error),
    #[error("CSV error: {0}")]
    Csv(#[from] csv::Error),
    #[error("{0}")]
    Backend(String),
}

#[derive(Debug, Error)]
pub enum RunError {
    #[error(transparent)]
    Config(#[from] ConfigError),
    #[error("entity '{entity}': storage failure after {written} written row(s): {source}")]
    Storage {
        entity: String,
        written: usize,
        partial: Box<AnonymizationResult>,
        #[source]
        source: StorageError,
    },
}

impl RunError {
    /// Progress accumulated before a storage failure, if any.
    pub fn partial(&self) -> Option<&AnonymizationResult> {
        match self {
            RunError::Config(_) => None,
            RunError::Storage { partial, .. } => Some(partial),
        }
    }
}
