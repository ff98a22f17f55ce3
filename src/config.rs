//! YAML catalog describing mapped record types and their anonymization
//! rules.
//!
//! ```yaml
//! entities:
//!   - name: users
//!     table: users
//!     id: id
//!     columns:
//!       - { name: id, type: integer }
//!       - { name: email, type: string }
//!     anonymize:
//!       exclude: { role: admin }
//!       fields:
//!         - { column: email, faker: email, weight: 1 }
//! ```

use std::{collections::HashSet, fs::File, io::BufReader, path::Path};

use anyhow::{Context, Result, bail};
use serde::{Deserialize, Serialize};

use crate::{
    rules::{EntityRules, RuleSource},
    schema::{MappedRecordType, SchemaProvider},
};

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct EntityConfig {
    #[serde(flatten)]
    pub record_type: MappedRecordType,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub anonymize: Option<EntityRules>,
}

#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct Catalog {
    #[serde(default)]
    pub entities: Vec<EntityConfig>,
}

impl Catalog {
    pub fn load(path: &Path) -> Result<Self> {
        let file = File::open(path).with_context(|| format!("Opening catalog file {path:?}"))?;
        let catalog: Catalog = serde_yaml::from_reader(BufReader::new(file))
            .with_context(|| format!("Parsing catalog YAML {path:?}"))?;
        catalog.validate()?;
        Ok(catalog)
    }

    pub fn from_yaml_str(raw: &str) -> Result<Self> {
        let catalog: Catalog = serde_yaml::from_str(raw).context("Parsing catalog YAML")?;
        catalog.validate()?;
        Ok(catalog)
    }

    pub fn validate(&self) -> Result<()> {
        let mut names = HashSet::new();
        for entity in &self.entities {
            let record_type = &entity.record_type;
            if !names.insert(record_type.name.as_str()) {
                bail!("Duplicate entity '{}' in catalog", record_type.name);
            }
            let mut columns = HashSet::new();
            for column in &record_type.columns {
                if !columns.insert(column.name.as_str()) {
                    bail!(
                        "Entity '{}' declares column '{}' more than once",
                        record_type.name,
                        column.name
                    );
                }
            }
            let mut relations = HashSet::new();
            for relation in &record_type.relations {
                if !relations.insert(relation.name.as_str()) {
                    bail!(
                        "Entity '{}' declares relation '{}' more than once",
                        record_type.name,
                        relation.name
                    );
                }
            }
        }
        Ok(())
    }

    pub fn entity(&self, name: &str) -> Option<&EntityConfig> {
        self.entities.iter().find(|e| e.record_type.name == name)
    }

    pub fn record_types(&self) -> impl Iterator<Item = &MappedRecordType> {
        self.entities.iter().map(|e| &e.record_type)
    }

    /// Entities carrying an `anonymize` block, in declaration order.
    pub fn anonymized_entities(&self) -> Vec<String> {
        self.entities
            .iter()
            .filter(|e| e.anonymize.is_some())
            .map(|e| e.record_type.name.clone())
            .collect()
    }
}

impl SchemaProvider for Catalog {
    fn record_type(&self, name: &str) -> Option<&MappedRecordType> {
        self.entity(name).map(|e| &e.record_type)
    }

    fn record_type_names(&self) -> Vec<String> {
        self.record_types().map(|r| r.name.clone()).collect()
    }
}

impl RuleSource for Catalog {
    fn rules_for(&self, record_type: &MappedRecordType) -> Option<EntityRules> {
        self.entity(&record_type.name)
            .and_then(|e| e.anonymize.clone())
    }
}
