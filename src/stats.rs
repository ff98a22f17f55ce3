//! Per-entity and per-field run statistics.

use std::{
    borrow::Cow,
    collections::BTreeMap,
    fmt::Write as _,
    time::{Duration, Instant},
};

use serde::Serialize;
use serde_json::Value as JsonValue;

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum RowOutcome {
    /// Rejected by the entity gate.
    Skipped,
    Unchanged,
    Updated,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum FieldOutcome {
    Changed,
    Unchanged,
    /// The field's include/exclude patterns did not select the row.
    Filtered,
    Failed,
}

#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize)]
pub struct FieldStats {
    pub changed: usize,
    pub unchanged: usize,
    pub filtered: usize,
    pub failed: usize,
}

#[derive(Debug, Clone, Default, Serialize)]
pub struct EntityStats {
    pub processed: usize,
    pub updated: usize,
    pub skipped: usize,
    pub failed: usize,
    pub written: usize,
    pub cancelled: bool,
    pub duration_ms: u64,
    pub fields: BTreeMap<String, FieldStats>,
    #[serde(skip)]
    started: Option<Instant>,
}

impl EntityStats {
    pub fn duration(&self) -> Duration {
        Duration::from_millis(self.duration_ms)
    }
}

/// Collects statistics as rows flow through the engine.
#[derive(Debug, Clone, Default)]
pub struct StatsRecorder {
    entities: BTreeMap<String, EntityStats>,
}

impl StatsRecorder {
    pub fn new() -> Self {
        Self::default()
    }

    fn entry(&mut self, entity: &str) -> &mut EntityStats {
        self.entities.entry(entity.to_string()).or_default()
    }

    /// Resets the entity's counters and starts its clock.
    pub fn begin_entity(&mut self, entity: &str) {
        self.entities.insert(
            entity.to_string(),
            EntityStats {
                started: Some(Instant::now()),
                ..EntityStats::default()
            },
        );
    }

    pub fn record_row(&mut self, entity: &str, outcome: RowOutcome) {
        let stats = self.entry(entity);
        stats.processed += 1;
        match outcome {
            RowOutcome::Skipped => stats.skipped += 1,
            RowOutcome::Updated => stats.updated += 1,
            RowOutcome::Unchanged => {}
        }
    }

    pub fn record_field(&mut self, entity: &str, field: &str, outcome: FieldOutcome) {
        let stats = self.entry(entity);
        if outcome == FieldOutcome::Failed {
            stats.failed += 1;
        }
        let field = stats.fields.entry(field.to_string()).or_default();
        match outcome {
            FieldOutcome::Changed => field.changed += 1,
            FieldOutcome::Unchanged => field.unchanged += 1,
            FieldOutcome::Filtered => field.filtered += 1,
            FieldOutcome::Failed => field.failed += 1,
        }
    }

    pub fn finish_entity(&mut self, entity: &str, written: usize, cancelled: bool) {
        let stats = self.entry(entity);
        stats.written = written;
        stats.cancelled = cancelled;
        if let Some(started) = stats.started.take() {
            stats.duration_ms = started.elapsed().as_millis() as u64;
        }
    }

    pub fn entity(&self, entity: &str) -> Option<&EntityStats> {
        self.entities.get(entity)
    }

    pub fn entities(&self) -> impl Iterator<Item = (&str, &EntityStats)> {
        self.entities
            .iter()
            .map(|(name, stats)| (name.as_str(), stats))
    }

    pub fn is_empty(&self) -> bool {
        self.entities.is_empty()
    }

    pub fn to_json(&self) -> JsonValue {
        let totals = self.entities.values().fold(
            (0usize, 0usize, 0usize, 0usize, 0usize),
            |acc, s| {
                (
                    acc.0 + s.processed,
                    acc.1 + s.updated,
                    acc.2 + s.skipped,
                    acc.3 + s.failed,
                    acc.4 + s.written,
                )
            },
        );
        serde_json::json!({
            "entities": self.entities,
            "totals": {
                "processed": totals.0,
                "updated": totals.1,
                "skipped": totals.2,
                "failed": totals.3,
                "written": totals.4,
            }
        })
    }

    /// Aligned text table, one line per entity.
    pub fn render_table(&self) -> String {
        let headers = ["entity", "processed", "updated", "skipped", "failed", "written", "ms"]
            .map(String::from);
        let rows = self
            .entities
            .iter()
            .map(|(name, s)| {
                let mut label = name.clone();
                if s.cancelled {
                    label.push_str(" (cancelled)");
                }
                vec![
                    label,
                    s.processed.to_string(),
                    s.updated.to_string(),
                    s.skipped.to_string(),
                    s.failed.to_string(),
                    s.written.to_string(),
                    s.duration_ms.to_string(),
                ]
            })
            .collect::<Vec<_>>();
        render_table(&headers, &rows)
    }
}

/// First column left-aligned, the rest right-aligned.
pub fn render_table(headers: &[String], rows: &[Vec<String>]) -> String {
    let mut widths = headers.iter().map(|h| h.chars().count()).collect::<Vec<_>>();
    for row in rows {
        for (idx, cell) in row.iter().enumerate().take(widths.len()) {
            widths[idx] = widths[idx].max(sanitize_cell(cell).chars().count());
        }
    }

    let mut output = String::new();
    let _ = writeln!(output, "{}", format_row(headers, &widths));
    let separator = widths.iter().map(|w| "-".repeat(*w)).collect::<Vec<_>>();
    let _ = writeln!(output, "{}", format_row(&separator, &widths));
    for row in rows {
        let _ = writeln!(output, "{}", format_row(row, &widths));
    }
    output
}

fn format_row(values: &[String], widths: &[usize]) -> String {
    let line = values
        .iter()
        .zip(widths)
        .enumerate()
        .map(|(idx, (value, &width))| {
            let cell = sanitize_cell(value);
            if idx == 0 {
                format!("{cell:<width$}")
            } else {
                format!("{cell:>width$}")
            }
        })
        .collect::<Vec<_>>()
        .join("  ");
    line.trim_end().to_string()
}

fn sanitize_cell(value: &str) -> Cow<'_, str> {
    if value.contains(['\n', '\r', '\t']) {
        Cow::Owned(value.replace(['\n', '\r', '\t'], " "))
    } else {
        Cow::Borrowed(value)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn counters_accumulate_per_entity() {
        let mut stats = StatsRecorder::new();
        stats.begin_entity("users");
        stats.record_row("users", RowOutcome::Updated);
        stats.record_row("users", RowOutcome::Skipped);
        stats.record_field("users", "email", FieldOutcome::Changed);
        stats.record_field("users", "email", FieldOutcome::Failed);
        stats.finish_entity("users", 1, false);

        let users = stats.entity("users").unwrap();
        assert_eq!(users.processed, 2);
        assert_eq!(users.updated, 1);
        assert_eq!(users.skipped, 1);
        assert_eq!(users.failed, 1);
        assert_eq!(users.written, 1);
        assert_eq!(users.fields["email"].changed, 1);
        assert_eq!(users.fields["email"].failed, 1);
    }

    #[test]
    fn table_aligns_columns() {
        let headers = vec!["name".to_string(), "n".to_string()];
        let rows = vec![
            vec!["a".to_string(), "10".to_string()],
            vec!["long\tname".to_string(), "2".to_string()],
        ];
        let rendered = render_table(&headers, &rows);
        let lines = rendered.lines().collect::<Vec<_>>();
        assert_eq!(lines[0], format!("name{}n", " ".repeat(8)));
        assert_eq!(lines[1], "---------  --");
        assert_eq!(lines[2], format!("a{}10", " ".repeat(10)));
        assert_eq!(lines[3], "long name   2");
    }

    #[test]
    fn json_report_includes_totals() {
        let mut stats = StatsRecorder::new();
        stats.record_row("a", RowOutcome::Updated);
        stats.record_row("b", RowOutcome::Unchanged);
        let report = stats.to_json();
        assert_eq!(report["totals"]["processed"], 2);
        assert_eq!(report["entities"]["a"]["updated"], 1);
    }
}
