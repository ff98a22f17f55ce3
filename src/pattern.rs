//! Include/exclude pattern evaluation over flat rows.
//!
//! Condition grammar (one string per condition):
//!
//! - `>N`, `>=N`, `<N`, `<=N`: numeric comparison; the field value must be
//!   numeric or a numeric string
//! - `=V`, `!=V`: equality on the string form of both sides
//! - anything containing `%`: anchored SQL `LIKE` wildcard
//! - any other string: exact match on the string form
//!
//! Patterns are compiled once (see [`RowFilter::compile`]) so malformed
//! conditions surface as configuration errors before any row is read.

use std::collections::BTreeSet;

use regex::Regex;

use crate::{
    data::{Row, Value},
    error::PatternError,
    rules::{PatternGroup, PatternSet},
};

#[derive(Debug, Clone)]
pub enum Condition {
    Gt(f64),
    Ge(f64),
    Lt(f64),
    Le(f64),
    Eq(String),
    NotEq(String),
    Like(Regex),
    Exact(String),
}

impl Condition {
    pub fn parse(field: &str, raw: &str) -> Result<Self, PatternError> {
        if raw.is_empty() {
            return Err(PatternError::EmptyCondition {
                field: field.to_string(),
            });
        }

        for prefix in [">=", "<=", ">", "<"] {
            if let Some(operand) = raw.strip_prefix(prefix) {
                let number = operand.trim().parse::<f64>().map_err(|_| {
                    PatternError::InvalidNumber {
                        field: field.to_string(),
                        condition: raw.to_string(),
                    }
                })?;
                return Ok(match prefix {
                    ">=" => Condition::Ge(number),
                    "<=" => Condition::Le(number),
                    ">" => Condition::Gt(number),
                    _ => Condition::Lt(number),
                });
            }
        }

        if let Some(operand) = raw.strip_prefix("!=") {
            return Ok(Condition::NotEq(operand.to_string()));
        }
        if let Some(operand) = raw.strip_prefix('=') {
            return Ok(Condition::Eq(operand.to_string()));
        }
        if raw.contains('%') {
            return like_regex(raw)
                .map(Condition::Like)
                .map_err(|err| PatternError::InvalidWildcard {
                    field: field.to_string(),
                    condition: raw.to_string(),
                    message: err.to_string(),
                });
        }
        Ok(Condition::Exact(raw.to_string()))
    }

    pub fn test(&self, value: &Value) -> bool {
        match self {
            Condition::Gt(n) => value.as_f64().is_some_and(|v| v > *n),
            Condition::Ge(n) => value.as_f64().is_some_and(|v| v >= *n),
            Condition::Lt(n) => value.as_f64().is_some_and(|v| v < *n),
            Condition::Le(n) => value.as_f64().is_some_and(|v| v <= *n),
            Condition::Eq(expected) | Condition::Exact(expected) => value.as_display() == *expected,
            Condition::NotEq(expected) => value.as_display() != *expected,
            Condition::Like(regex) => regex.is_match(&value.as_display()),
        }
    }
}

fn like_regex(pattern: &str) -> Result<Regex, regex::Error> {
    let body = pattern
        .split('%')
        .map(regex::escape)
        .collect::<Vec<_>>()
        .join(".*");
    Regex::new(&format!("(?s)^{body}$"))
}

#[derive(Debug, Clone)]
struct FieldConditions {
    field: String,
    any_of: Vec<Condition>,
}

impl FieldConditions {
    fn matches(&self, row: &Row) -> bool {
        match row.get(&self.field) {
            Some(value) => self.any_of.iter().any(|condition| condition.test(value)),
            None => false,
        }
    }
}

/// Compiled form of a [`PatternSet`]: OR over groups, AND within a group.
#[derive(Debug, Clone, Default)]
pub struct CompiledPatterns {
    groups: Vec<Vec<FieldConditions>>,
}

impl CompiledPatterns {
    pub fn compile(patterns: &PatternSet) -> Result<Self, PatternError> {
        let groups = patterns
            .groups()
            .into_iter()
            .filter(|group| !group.is_empty())
            .map(compile_group)
            .collect::<Result<Vec<_>, _>>()?;
        Ok(Self { groups })
    }

    pub fn is_empty(&self) -> bool {
        self.groups.is_empty()
    }

    pub fn matches_any(&self, row: &Row) -> bool {
        self.groups
            .iter()
            .any(|group| group.iter().all(|field| field.matches(row)))
    }

    pub fn fields(&self) -> impl Iterator<Item = &str> {
        self.groups
            .iter()
            .flat_map(|group| group.iter().map(|f| f.field.as_str()))
    }
}

fn compile_group(group: &PatternGroup) -> Result<Vec<FieldConditions>, PatternError> {
    group
        .iter()
        .map(|(field, conditions)| {
            let any_of = conditions
                .conditions()
                .iter()
                .map(|condition| Condition::parse(field, condition))
                .collect::<Result<Vec<_>, _>>()?;
            Ok(FieldConditions {
                field: field.clone(),
                any_of,
            })
        })
        .collect()
}

/// Include/exclude pair evaluated against one row.
#[derive(Debug, Clone, Default)]
pub struct RowFilter {
    include: Option<CompiledPatterns>,
    exclude: Option<CompiledPatterns>,
}

impl RowFilter {
    pub fn compile(
        include: Option<&PatternSet>,
        exclude: Option<&PatternSet>,
    ) -> Result<Self, PatternError> {
        let compile = |set: Option<&PatternSet>| -> Result<Option<CompiledPatterns>, PatternError> {
            match set {
                Some(set) => {
                    let compiled = CompiledPatterns::compile(set)?;
                    Ok((!compiled.is_empty()).then_some(compiled))
                }
                None => Ok(None),
            }
        };
        Ok(Self {
            include: compile(include)?,
            exclude: compile(exclude)?,
        })
    }

    pub fn is_empty(&self) -> bool {
        self.include.is_none() && self.exclude.is_none()
    }

    /// Exclusions win over inclusions; an empty filter matches everything.
    pub fn matches(&self, row: &Row) -> bool {
        if let Some(exclude) = &self.exclude
            && exclude.matches_any(row)
        {
            return false;
        }
        match &self.include {
            Some(include) => include.matches_any(row),
            None => true,
        }
    }

    /// Relation names referenced through `relation.column` fields.
    pub fn relations(&self) -> BTreeSet<String> {
        self.include
            .iter()
            .chain(self.exclude.iter())
            .flat_map(CompiledPatterns::fields)
            .filter_map(|field| field.split_once('.').map(|(rel, _)| rel.to_string()))
            .collect()
    }
}

/// One-shot evaluation of include/exclude patterns against a record.
pub fn matches(
    record: &Row,
    include: Option<&PatternSet>,
    exclude: Option<&PatternSet>,
) -> Result<bool, PatternError> {
    Ok(RowFilter::compile(include, exclude)?.matches(record))
}

#[cfg(test)]
mod tests {
    use super::*;

    fn row(pairs: &[(&str, Value)]) -> Row {
        pairs
            .iter()
            .map(|(k, v)| (k.to_string(), v.clone()))
            .collect()
    }

    #[test]
    fn operators_are_parsed_longest_first() {
        assert!(matches!(Condition::parse("id", ">=5").unwrap(), Condition::Ge(n) if n == 5.0));
        assert!(matches!(Condition::parse("id", "<=5").unwrap(), Condition::Le(n) if n == 5.0));
        assert!(matches!(Condition::parse("s", "!=x").unwrap(), Condition::NotEq(v) if v == "x"));
        assert!(matches!(Condition::parse("s", "=x").unwrap(), Condition::Eq(v) if v == "x"));
        assert!(matches!(Condition::parse("s", "a%").unwrap(), Condition::Like(_)));
        assert!(matches!(Condition::parse("s", "plain").unwrap(), Condition::Exact(_)));
    }

    #[test]
    fn malformed_numeric_operand_is_rejected() {
        assert!(matches!(
            Condition::parse("id", ">abc"),
            Err(PatternError::InvalidNumber { .. })
        ));
        assert!(matches!(
            Condition::parse("id", ""),
            Err(PatternError::EmptyCondition { .. })
        ));
    }

    #[test]
    fn numeric_conditions_fail_on_non_numeric_values() {
        let condition = Condition::parse("age", ">10").unwrap();
        assert!(condition.test(&Value::Integer(11)));
        assert!(condition.test(&Value::from("11")));
        assert!(!condition.test(&Value::from("eleven")));
        assert!(!condition.test(&Value::Null));
    }

    #[test]
    fn like_escapes_regex_metacharacters() {
        let condition = Condition::parse("email", "%.doe@%").unwrap();
        assert!(condition.test(&Value::from("john.doe@example.com")));
        assert!(!condition.test(&Value::from("johnxdoe@example.com")));
    }

    #[test]
    fn missing_relation_column_fails_group() {
        let set = PatternSet::group([("company.country", "ES")]);
        let filter = RowFilter::compile(Some(&set), None).unwrap();
        assert!(!filter.matches(&row(&[("id", Value::Integer(1))])));
        assert!(
            filter.matches(&row(&[("company.country", Value::from("ES"))]))
        );
        assert_eq!(
            filter.relations().into_iter().collect::<Vec<_>>(),
            vec!["company".to_string()]
        );
    }

    #[test]
    fn null_values_compare_as_empty_strings() {
        let filter = RowFilter::compile(Some(&PatternSet::group([("note", "!=x")])), None).unwrap();
        assert!(filter.matches(&row(&[("note", Value::Null)])));
    }
}
