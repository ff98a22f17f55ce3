//! Declarative anonymization rules.
//!
//! Rules are plain data: a list of [`FieldRule`]s plus an optional
//! [`EntityRule`] per mapped record type. They are usually deserialized from
//! YAML and handed to the engine through a [`RuleSource`].

use std::collections::{BTreeMap, BTreeSet};

use serde::{Deserialize, Serialize};

use crate::{faker::FakerOptions, schema::MappedRecordType};

/// A scalar condition as written in a rule file.
///
/// Non-string scalars are exact literals of their string form, so
/// `status: 1` and `status: "1"` behave identically.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(untagged)]
pub enum ConditionLiteral {
    Text(String),
    Integer(i64),
    Float(f64),
    Boolean(bool),
}

impl ConditionLiteral {
    pub fn as_condition(&self) -> String {
        match self {
            ConditionLiteral::Text(s) => s.clone(),
            ConditionLiteral::Integer(i) => i.to_string(),
            ConditionLiteral::Float(f) => f.to_string(),
            ConditionLiteral::Boolean(b) => b.to_string(),
        }
    }
}

impl From<&str> for ConditionLiteral {
    fn from(value: &str) -> Self {
        ConditionLiteral::Text(value.to_string())
    }
}

/// Conditions for one field; a list matches when any entry matches.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(untagged)]
pub enum ConditionSpec {
    Single(ConditionLiteral),
    AnyOf(Vec<ConditionLiteral>),
}

impl ConditionSpec {
    pub fn conditions(&self) -> Vec<String> {
        match self {
            ConditionSpec::Single(literal) => vec![literal.as_condition()],
            ConditionSpec::AnyOf(literals) => literals
                .iter()
                .map(ConditionLiteral::as_condition)
                .collect(),
        }
    }
}

impl From<&str> for ConditionSpec {
    fn from(value: &str) -> Self {
        ConditionSpec::Single(value.into())
    }
}

impl From<Vec<&str>> for ConditionSpec {
    fn from(values: Vec<&str>) -> Self {
        ConditionSpec::AnyOf(values.into_iter().map(ConditionLiteral::from).collect())
    }
}

/// Field name to condition; every field of a group must match.
pub type PatternGroup = BTreeMap<String, ConditionSpec>;

/// One AND-group, or a list of AND-groups of which any may match.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(untagged)]
pub enum PatternSet {
    Group(PatternGroup),
    AnyOf(Vec<PatternGroup>),
}

impl PatternSet {
    /// Builds a single group from `(field, condition)` pairs.
    pub fn group<I, K, C>(entries: I) -> Self
    where
        I: IntoIterator<Item = (K, C)>,
        K: Into<String>,
        C: Into<ConditionSpec>,
    {
        PatternSet::Group(
            entries
                .into_iter()
                .map(|(k, c)| (k.into(), c.into()))
                .collect(),
        )
    }

    pub fn groups(&self) -> Vec<&PatternGroup> {
        match self {
            PatternSet::Group(group) => vec![group],
            PatternSet::AnyOf(groups) => groups.iter().collect(),
        }
    }

    pub fn is_empty(&self) -> bool {
        self.groups().iter().all(|group| group.is_empty())
    }

    pub fn fields(&self) -> BTreeSet<&str> {
        self.groups()
            .into_iter()
            .flat_map(|group| group.keys().map(String::as_str))
            .collect()
    }
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct FieldRule {
    pub column: String,
    #[serde(alias = "type")]
    pub faker: String,
    #[serde(default, skip_serializing_if = "BTreeMap::is_empty")]
    pub options: FakerOptions,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub weight: Option<i64>,
    #[serde(default, alias = "include_patterns", skip_serializing_if = "Option::is_none")]
    pub include: Option<PatternSet>,
    #[serde(default, alias = "exclude_patterns", skip_serializing_if = "Option::is_none")]
    pub exclude: Option<PatternSet>,
}

impl FieldRule {
    pub fn new(column: &str, faker: &str) -> Self {
        Self {
            column: column.to_string(),
            faker: faker.to_string(),
            options: FakerOptions::new(),
            weight: None,
            include: None,
            exclude: None,
        }
    }

    pub fn weight(mut self, weight: i64) -> Self {
        self.weight = Some(weight);
        self
    }

    pub fn option(mut self, name: &str, value: impl Into<serde_json::Value>) -> Self {
        self.options.insert(name.to_string(), value.into());
        self
    }

    pub fn include(mut self, patterns: PatternSet) -> Self {
        self.include = Some(patterns);
        self
    }

    pub fn exclude(mut self, patterns: PatternSet) -> Self {
        self.exclude = Some(patterns);
        self
    }
}

#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct EntityRule {
    #[serde(default, alias = "include_patterns", skip_serializing_if = "Option::is_none")]
    pub include: Option<PatternSet>,
    #[serde(default, alias = "exclude_patterns", skip_serializing_if = "Option::is_none")]
    pub exclude: Option<PatternSet>,
    #[serde(default)]
    pub mark_anonymized: bool,
}

/// Everything the engine needs to anonymize one mapped record type.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct EntityRules {
    #[serde(flatten)]
    pub entity: EntityRule,
    #[serde(default)]
    pub fields: Vec<FieldRule>,
}

impl EntityRules {
    pub fn new(fields: Vec<FieldRule>) -> Self {
        Self {
            entity: EntityRule::default(),
            fields,
        }
    }

    pub fn with_entity_rule(mut self, entity: EntityRule) -> Self {
        self.entity = entity;
        self
    }
}

/// Supplies the rules declared for a mapped record type.
pub trait RuleSource {
    fn rules_for(&self, record_type: &MappedRecordType) -> Option<EntityRules>;
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn pattern_set_accepts_all_three_shapes() {
        let single: PatternSet = serde_yaml::from_str("{ id: '>50', status: active }").unwrap();
        assert_eq!(single.groups().len(), 1);
        assert_eq!(single.fields().len(), 2);

        let any_group: PatternSet =
            serde_yaml::from_str("[ { status: active }, { role: admin } ]").unwrap();
        assert_eq!(any_group.groups().len(), 2);

        let any_field: PatternSet =
            serde_yaml::from_str("{ status: [active, pending] }").unwrap();
        let group = any_field.groups()[0];
        assert_eq!(
            group["status"].conditions(),
            vec!["active".to_string(), "pending".to_string()]
        );
    }

    #[test]
    fn numeric_scalars_become_literals() {
        let set: PatternSet = serde_yaml::from_str("{ tier: 3, active: true }").unwrap();
        let group = set.groups()[0];
        assert_eq!(group["tier"].conditions(), vec!["3".to_string()]);
        assert_eq!(group["active"].conditions(), vec!["true".to_string()]);
    }

    #[test]
    fn field_rule_accepts_type_alias_and_options() {
        let yaml = r#"
column: email
type: email
weight: 2
options:
  domain: example.org
exclude:
  role: admin
"#;
        let rule: FieldRule = serde_yaml::from_str(yaml).unwrap();
        assert_eq!(rule.faker, "email");
        assert_eq!(rule.weight, Some(2));
        assert_eq!(rule.options["domain"], serde_json::json!("example.org"));
        assert!(rule.exclude.is_some());
    }
}
