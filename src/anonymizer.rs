//! Rule-driven anonymization of one mapped record type at a time.
//!
//! A run is planned up front ([`Anonymizer::plan`]): rules are ordered,
//! generators resolved and validated, patterns compiled and the joins needed
//! by relation patterns derived. Any problem found here is a configuration
//! error and no row is read. The run then streams pages from the store,
//! rewrites each qualifying row in memory and stages at most one update per
//! row, flushing staged updates once per page.

use std::{
    collections::BTreeMap,
    sync::{
        Arc,
        atomic::{AtomicBool, Ordering},
    },
};

use itertools::Itertools;
use log::{debug, info, warn};
use rand::{SeedableRng, rngs::StdRng};
use serde::Serialize;

use crate::{
    data::{Row, Value, coerce_value},
    error::{ConfigError, RunError, StorageError},
    faker::{Faker, FakerContext, FakerRegistry},
    ordering::order_rules,
    pattern::RowFilter,
    rules::{EntityRules, FieldRule, RuleSource},
    schema::{ColumnType, MappedRecordType, SchemaProvider},
    stats::{FieldOutcome, RowOutcome, StatsRecorder},
    store::{Join, ReadQuery, RowKey, RowUpdate, Storage},
};

pub const DEFAULT_BATCH_SIZE: usize = 500;
pub const DEFAULT_PROGRESS_INTERVAL: usize = 1000;
pub const DEFAULT_MARKER_COLUMN: &str = "anonymized";
/// Failure details kept per result; further failures are only counted.
pub const MAX_RECORDED_FAILURES: usize = 100;

const ENTITY_RULE: &str = "<entity>";

#[derive(Debug, Clone)]
pub struct RunOptions {
    /// Rows per fetched page and per flushed write batch.
    pub batch_size: usize,
    pub dry_run: bool,
    /// Processed rows between progress ticks; zero only reports completion.
    pub progress_interval: usize,
    pub seed: Option<u64>,
    pub marker_column: String,
}

impl Default for RunOptions {
    fn default() -> Self {
        Self {
            batch_size: DEFAULT_BATCH_SIZE,
            dry_run: false,
            progress_interval: DEFAULT_PROGRESS_INTERVAL,
            seed: None,
            marker_column: DEFAULT_MARKER_COLUMN.to_string(),
        }
    }
}

/// Candidate replacement offered to a [`PreWriteHook`].
#[derive(Debug, Clone, Copy)]
pub struct FieldEvent<'a> {
    pub entity: &'a str,
    pub column: &'a str,
    pub key: &'a RowKey,
    pub original: &'a Value,
    pub generated: &'a Value,
    pub record: &'a Row,
}

#[derive(Debug, Clone, PartialEq)]
pub enum HookDecision {
    Keep,
    Skip,
    Replace(Value),
}

pub trait PreWriteHook {
    fn before_write(&self, event: &FieldEvent<'_>) -> HookDecision;
}

impl<F> PreWriteHook for F
where
    F: Fn(&FieldEvent<'_>) -> HookDecision,
{
    fn before_write(&self, event: &FieldEvent<'_>) -> HookDecision {
        self(event)
    }
}

pub trait ProgressSink {
    fn progress(&mut self, processed: usize, total: usize, message: &str);
}

impl<F> ProgressSink for F
where
    F: FnMut(usize, usize, &str),
{
    fn progress(&mut self, processed: usize, total: usize, message: &str) {
        self(processed, total, message)
    }
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct FieldFailure {
    pub row_id: String,
    pub field: String,
    pub message: String,
}

#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize)]
pub struct AnonymizationResult {
    pub entity: String,
    pub processed: usize,
    /// Rows with at least one changed field (including dry runs).
    pub updated: usize,
    /// Rows rejected by the entity gate.
    pub skipped: usize,
    /// Rows actually sent to storage.
    pub written: usize,
    /// Values replaced per field.
    pub fields: BTreeMap<String, usize>,
    pub failed_fields: usize,
    pub failures: Vec<FieldFailure>,
    pub dry_run: bool,
    pub cancelled: bool,
}

impl AnonymizationResult {
    fn new(entity: &str, dry_run: bool) -> Self {
        Self {
            entity: entity.to_string(),
            dry_run,
            ..Self::default()
        }
    }

    fn record_failure(&mut self, row_id: &str, field: &str, message: String) {
        self.failed_fields += 1;
        if self.failures.len() < MAX_RECORDED_FAILURES {
            self.failures.push(FieldFailure {
                row_id: row_id.to_string(),
                field: field.to_string(),
                message,
            });
        }
    }
}

enum FieldChange {
    Filtered,
    Unchanged,
    Changed(Value),
}

struct PlannedField<'r> {
    rule: &'r FieldRule,
    faker: Arc<dyn Faker>,
    filter: RowFilter,
    column_type: ColumnType,
}

/// Everything resolved before the first row is read.
pub struct RunPlan<'r> {
    entity: String,
    table: String,
    id_columns: Vec<String>,
    gate: RowFilter,
    fields: Vec<PlannedField<'r>>,
    joins: Vec<Join>,
    marker: Option<(String, ColumnType)>,
}

impl RunPlan<'_> {
    pub fn entity(&self) -> &str {
        &self.entity
    }

    pub fn table(&self) -> &str {
        &self.table
    }

    /// Columns in the order their rules run.
    pub fn field_order(&self) -> Vec<&str> {
        self.fields
            .iter()
            .map(|field| field.rule.column.as_str())
            .collect()
    }

    pub fn joins(&self) -> &[Join] {
        &self.joins
    }

    pub fn marker_column(&self) -> Option<&str> {
        self.marker.as_ref().map(|(column, _)| column.as_str())
    }

    fn query(&self) -> ReadQuery {
        ReadQuery::table(&self.table)
            .with_filter(self.gate.clone())
            .with_joins(self.joins.clone())
    }

    fn row_key(&self, row: &Row) -> Option<RowKey> {
        self.id_columns
            .iter()
            .map(|column| {
                row.get(column)
                    .filter(|value| !value.is_null())
                    .map(|value| (column.clone(), value.clone()))
            })
            .collect()
    }
}

fn describe_key(key: &RowKey) -> String {
    key.values().map(Value::as_display).join(",")
}

pub struct Anonymizer<'a> {
    registry: &'a FakerRegistry,
    options: RunOptions,
    hook: Option<&'a dyn PreWriteHook>,
    cancel: Option<&'a AtomicBool>,
}

impl<'a> Anonymizer<'a> {
    pub fn new(registry: &'a FakerRegistry, options: RunOptions) -> Self {
        Self {
            registry,
            options,
            hook: None,
            cancel: None,
        }
    }

    pub fn with_hook(mut self, hook: &'a dyn PreWriteHook) -> Self {
        self.hook = Some(hook);
        self
    }

    /// Checked between pages; once set no further writes are issued.
    pub fn with_cancellation(mut self, flag: &'a AtomicBool) -> Self {
        self.cancel = Some(flag);
        self
    }

    pub fn options(&self) -> &RunOptions {
        &self.options
    }

    fn is_cancelled(&self) -> bool {
        self.cancel.is_some_and(|flag| flag.load(Ordering::SeqCst))
    }

    pub fn plan<'r, S>(
        &self,
        record_type: &MappedRecordType,
        rules: &'r EntityRules,
        store: &S,
    ) -> Result<RunPlan<'r>, RunError>
    where
        S: Storage + ?Sized,
    {
        let entity = record_type.name.clone();
        let table = record_type.table().to_string();

        if rules.fields.is_empty() {
            return Err(ConfigError::NoRules { entity }.into());
        }
        if record_type.id.is_empty() {
            return Err(ConfigError::MissingIdentifier { entity }.into());
        }
        if let Some(column) = record_type.id.iter().find(|c| !record_type.has_column(c)) {
            return Err(ConfigError::UnknownColumn {
                entity,
                table,
                column: column.clone(),
            }
            .into());
        }

        let gate = RowFilter::compile(rules.entity.include.as_ref(), rules.entity.exclude.as_ref())
            .map_err(|source| ConfigError::Pattern {
                entity: entity.clone(),
                rule: ENTITY_RULE.to_string(),
                source,
            })?;
        // relation name -> first rule referencing it
        let mut relations: BTreeMap<String, String> = gate
            .relations()
            .into_iter()
            .map(|relation| (relation, ENTITY_RULE.to_string()))
            .collect();

        let mut fields = Vec::with_capacity(rules.fields.len());
        for rule in order_rules(&rules.fields) {
            if !record_type.has_column(&rule.column) {
                return Err(ConfigError::UnknownColumn {
                    entity,
                    table,
                    column: rule.column.clone(),
                }
                .into());
            }
            let faker_error = |source| ConfigError::Faker {
                entity: entity.clone(),
                field: rule.column.clone(),
                source,
            };
            let faker = self.registry.resolve(&rule.faker).map_err(faker_error)?;
            faker
                .validate(&rule.options, self.registry)
                .map_err(faker_error)?;
            let filter = RowFilter::compile(rule.include.as_ref(), rule.exclude.as_ref())
                .map_err(|source| ConfigError::Pattern {
                    entity: entity.clone(),
                    rule: rule.column.clone(),
                    source,
                })?;
            for relation in filter.relations() {
                relations
                    .entry(relation)
                    .or_insert_with(|| rule.column.clone());
            }
            fields.push(PlannedField {
                rule,
                faker,
                filter,
                column_type: record_type.column_type(&rule.column),
            });
        }

        let mut joins = Vec::with_capacity(relations.len());
        for (name, field) in relations {
            let Some(relation) = record_type.relation(&name) else {
                return Err(ConfigError::UnknownRelation {
                    entity,
                    field,
                    relation: name,
                }
                .into());
            };
            joins.push(Join {
                relation: relation.name.clone(),
                table: relation.table.clone(),
                local_column: relation.local_column.clone(),
                foreign_column: relation.foreign_column.clone(),
            });
        }

        let marker = if rules.entity.mark_anonymized {
            let column = &self.options.marker_column;
            let exists = store
                .column_exists(&table, column)
                .map_err(|source| RunError::Storage {
                    entity: entity.clone(),
                    written: 0,
                    partial: Box::new(AnonymizationResult::new(&entity, self.options.dry_run)),
                    source,
                })?;
            if exists {
                Some((column.clone(), record_type.column_type(column)))
            } else {
                debug!("Marker column '{column}' not present in '{table}'; it will not be written");
                None
            }
        } else {
            None
        };

        debug!(
            "Planned '{entity}': fields [{}], joins [{}], gate {}",
            fields.iter().map(|f| f.rule.column.as_str()).join(", "),
            joins.iter().map(|j| j.relation.as_str()).join(", "),
            if gate.is_empty() { "none" } else { "present" }
        );

        Ok(RunPlan {
            entity,
            table,
            id_columns: record_type.id.clone(),
            gate,
            fields,
            joins,
            marker,
        })
    }

    pub fn run<S>(
        &self,
        record_type: &MappedRecordType,
        rules: &EntityRules,
        store: &mut S,
        mut stats: Option<&mut StatsRecorder>,
        mut progress: Option<&mut dyn ProgressSink>,
    ) -> Result<AnonymizationResult, RunError>
    where
        S: Storage + ?Sized,
    {
        let plan = self.plan(record_type, rules, &*store)?;
        let mut result = AnonymizationResult::new(&plan.entity, self.options.dry_run);
        if let Some(stats) = stats.as_deref_mut() {
            stats.begin_entity(&plan.entity);
        }

        let query = plan.query();
        let total = match progress {
            Some(_) => match store.count(&query) {
                Ok(total) => total,
                Err(source) => return Err(self.storage_failure(result, source, stats)),
            },
            None => 0,
        };
        let mode = self.options.dry_run.then_some(" [dry run]").unwrap_or("");
        info!("Anonymizing '{}' (table '{}'){mode}", plan.entity, plan.table);

        let mut rng = match self.options.seed {
            Some(seed) => StdRng::seed_from_u64(seed),
            None => StdRng::from_os_rng(),
        };
        let batch_size = self.options.batch_size.max(1);
        let mut cursor = None;
        loop {
            if self.is_cancelled() {
                result.cancelled = true;
                info!(
                    "Cancellation observed for '{}' after {} row(s)",
                    plan.entity, result.processed
                );
                break;
            }
            let page = match store.fetch_page(&query, cursor, batch_size) {
                Ok(page) => page,
                Err(source) => return Err(self.storage_failure(result, source, stats)),
            };

            let mut staged = Vec::new();
            for row in &page.rows {
                if let Some(update) =
                    self.process_row(&plan, row, &mut rng, &mut result, stats.as_deref_mut())
                {
                    staged.push(update);
                }
                if self.options.progress_interval > 0
                    && result.processed % self.options.progress_interval == 0
                    && let Some(sink) = progress.as_deref_mut()
                {
                    sink.progress(
                        result.processed,
                        total,
                        &format!("{}: {} row(s) processed", plan.entity, result.processed),
                    );
                }
            }

            if !staged.is_empty() {
                match store.update_batch(&plan.table, &staged) {
                    Ok(_) => result.written += staged.len(),
                    Err(source) => return Err(self.storage_failure(result, source, stats)),
                }
                debug!("Flushed {} update(s) to '{}'", staged.len(), plan.table);
            }

            match page.next {
                Some(next) => cursor = Some(next),
                None => break,
            }
        }

        if let Some(sink) = progress.as_deref_mut() {
            sink.progress(
                result.processed,
                total,
                &format!("{}: finished", plan.entity),
            );
        }
        if let Some(stats) = stats.as_deref_mut() {
            stats.finish_entity(&plan.entity, result.written, result.cancelled);
        }
        info!(
            "Anonymized '{}': processed {}, updated {}, skipped {}, written {}, failed fields {}",
            result.entity,
            result.processed,
            result.updated,
            result.skipped,
            result.written,
            result.failed_fields
        );
        Ok(result)
    }

    fn storage_failure(
        &self,
        result: AnonymizationResult,
        source: StorageError,
        stats: Option<&mut StatsRecorder>,
    ) -> RunError {
        warn!(
            "Storage failure while anonymizing '{}' after {} written row(s): {source}",
            result.entity, result.written
        );
        if let Some(stats) = stats {
            stats.finish_entity(&result.entity, result.written, result.cancelled);
        }
        RunError::Storage {
            entity: result.entity.clone(),
            written: result.written,
            partial: Box::new(result),
            source,
        }
    }

    /// Rewrites one fetched row; returns the staged update if anything
    /// changed and the run writes.
    fn process_row(
        &self,
        plan: &RunPlan<'_>,
        fetched: &Row,
        rng: &mut StdRng,
        result: &mut AnonymizationResult,
        mut stats: Option<&mut StatsRecorder>,
    ) -> Option<RowUpdate> {
        result.processed += 1;
        if !plan.gate.matches(fetched) {
            result.skipped += 1;
            if let Some(stats) = stats.as_deref_mut() {
                stats.record_row(&plan.entity, RowOutcome::Skipped);
            }
            return None;
        }

        let Some(key) = plan.row_key(fetched) else {
            warn!(
                "Row in '{}' has no value for identifier column(s) {:?}; skipped",
                plan.table, plan.id_columns
            );
            let id_columns = plan.id_columns.join(",");
            result.record_failure("", &id_columns, "missing identifier value".to_string());
            if let Some(stats) = stats.as_deref_mut() {
                stats.record_field(&plan.entity, &id_columns, FieldOutcome::Failed);
                stats.record_row(&plan.entity, RowOutcome::Unchanged);
            }
            return None;
        };
        let row_id = describe_key(&key);

        let mut working = fetched.clone();
        let mut changes = Row::new();
        for field in &plan.fields {
            let column = field.rule.column.as_str();
            let outcome = match self.apply_field(plan, field, fetched, &mut working, &key, rng) {
                Ok(FieldChange::Changed(value)) => {
                    changes.insert(column.to_string(), value);
                    *result.fields.entry(column.to_string()).or_default() += 1;
                    FieldOutcome::Changed
                }
                Ok(FieldChange::Filtered) => FieldOutcome::Filtered,
                Ok(FieldChange::Unchanged) => FieldOutcome::Unchanged,
                Err(message) => {
                    debug!(
                        "Field '{column}' of '{}' row {row_id} failed: {message}",
                        plan.entity
                    );
                    result.record_failure(&row_id, column, message);
                    FieldOutcome::Failed
                }
            };
            if let Some(stats) = stats.as_deref_mut() {
                stats.record_field(&plan.entity, column, outcome);
            }
        }

        if changes.is_empty() {
            if let Some(stats) = stats.as_deref_mut() {
                stats.record_row(&plan.entity, RowOutcome::Unchanged);
            }
            return None;
        }
        result.updated += 1;
        if let Some(stats) = stats.as_deref_mut() {
            stats.record_row(&plan.entity, RowOutcome::Updated);
        }
        if self.options.dry_run {
            return None;
        }
        if let Some((marker, ty)) = &plan.marker {
            match coerce_value(Value::Boolean(true), ty) {
                Ok(value) => {
                    changes.insert(marker.clone(), value);
                }
                Err(err) => debug!("Marker column '{marker}' not written: {err}"),
            }
        }
        Some(RowUpdate { key, changes })
    }

    /// Runs one field rule against the working row; a changed value is
    /// already applied to `working` when returned.
    fn apply_field(
        &self,
        plan: &RunPlan<'_>,
        field: &PlannedField<'_>,
        fetched: &Row,
        working: &mut Row,
        key: &RowKey,
        rng: &mut StdRng,
    ) -> Result<FieldChange, String> {
        if !field.filter.matches(fetched) {
            return Ok(FieldChange::Filtered);
        }
        let column = field.rule.column.as_str();
        let original = working.get(column).cloned().unwrap_or_default();
        let ctx = FakerContext::new(
            &original,
            working,
            column,
            &field.rule.options,
            self.registry,
        );
        let mut generated = field
            .faker
            .generate(&ctx, rng)
            .map_err(|err| err.to_string())?;

        if let Some(hook) = self.hook {
            let event = FieldEvent {
                entity: &plan.entity,
                column,
                key,
                original: &original,
                generated: &generated,
                record: working,
            };
            match hook.before_write(&event) {
                HookDecision::Keep => {}
                HookDecision::Skip => return Ok(FieldChange::Unchanged),
                HookDecision::Replace(value) => generated = value,
            }
        }

        let coerced = coerce_value(generated, &field.column_type).map_err(|err| err.to_string())?;
        if coerced == original {
            return Ok(FieldChange::Unchanged);
        }
        working.insert(column.to_string(), coerced.clone());
        Ok(FieldChange::Changed(coerced))
    }

    /// Runs several entities one after another. A failure in one entity is
    /// reported in its slot and does not stop the others.
    pub fn run_many<S>(
        &self,
        schema: &dyn SchemaProvider,
        rules: &dyn RuleSource,
        store: &mut S,
        names: &[String],
        mut stats: Option<&mut StatsRecorder>,
    ) -> Vec<(String, Result<AnonymizationResult, RunError>)>
    where
        S: Storage + ?Sized,
    {
        let mut outcomes = Vec::with_capacity(names.len());
        for name in names {
            let outcome = match schema.record_type(name) {
                None => Err(ConfigError::UnknownEntity(name.clone()).into()),
                Some(record_type) => match rules.rules_for(record_type) {
                    None => Err(ConfigError::NoRules {
                        entity: name.clone(),
                    }
                    .into()),
                    Some(entity_rules) => self.run(
                        record_type,
                        &entity_rules,
                        &mut *store,
                        stats.as_deref_mut(),
                        None,
                    ),
                },
            };
            if let Err(err) = &outcome {
                warn!("Entity '{name}' failed: {err}");
            }
            outcomes.push((name.clone(), outcome));
        }
        outcomes
    }
}
