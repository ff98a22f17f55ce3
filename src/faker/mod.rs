//! Value generators ("fakers") and the registry that resolves them by name.
//!
//! A generator receives a [`FakerContext`] describing the field being
//! replaced (its original value, the row as rewritten so far, the rule's
//! options) and an injected random source. Generators never mutate the row
//! and draw randomness only from the `rng` they are handed, so a seeded run
//! is reproducible.
//!
//! Composite generators ([`composite`]) delegate to other generators through
//! the registry carried by the context; the [`service`] generator forwards
//! to capabilities registered by the host application.

pub mod composite;
pub mod finance;
pub mod identity;
pub mod internet;
pub mod primitive;
pub mod service;
mod words;

use std::{collections::BTreeMap, fmt, sync::Arc};

use rand::RngCore;
use serde_json::Value as JsonValue;

use crate::{
    data::{Row, Value},
    error::FakerError,
};

pub use service::{ServiceCapability, ValueService};

pub type FakerOptions = BTreeMap<String, JsonValue>;

#[derive(Clone, Copy)]
pub struct FakerContext<'a> {
    /// Value of the column before this rule ran.
    pub original: &'a Value,
    /// Row as rewritten by the rules that ran before this one.
    pub record: &'a Row,
    pub column: &'a str,
    pub options: &'a FakerOptions,
    pub registry: &'a FakerRegistry,
}

impl<'a> FakerContext<'a> {
    pub fn new(
        original: &'a Value,
        record: &'a Row,
        column: &'a str,
        options: &'a FakerOptions,
        registry: &'a FakerRegistry,
    ) -> Self {
        Self {
            original,
            record,
            column,
            options,
            registry,
        }
    }

    /// Same field and row, different options; used when delegating.
    pub fn with_options<'b>(&self, options: &'b FakerOptions) -> FakerContext<'b>
    where
        'a: 'b,
    {
        FakerContext {
            original: self.original,
            record: self.record,
            column: self.column,
            options,
            registry: self.registry,
        }
    }

    pub fn field(&self, name: &str) -> Option<&'a Value> {
        self.record.get(name)
    }
}

pub trait Faker: Send + Sync {
    /// Checks the rule's options before any row is read.
    fn validate(
        &self,
        _options: &FakerOptions,
        _registry: &FakerRegistry,
    ) -> Result<(), FakerError> {
        Ok(())
    }

    fn generate(&self, ctx: &FakerContext<'_>, rng: &mut dyn RngCore) -> Result<Value, FakerError>;
}

#[derive(Default)]
pub struct FakerRegistry {
    fakers: BTreeMap<String, Arc<dyn Faker>>,
    services: BTreeMap<String, ServiceCapability>,
}

impl FakerRegistry {
    pub fn empty() -> Self {
        Self::default()
    }

    /// Registry holding every built-in generator.
    pub fn with_defaults() -> Self {
        let mut registry = Self::empty();
        identity::register(&mut registry);
        internet::register(&mut registry);
        finance::register(&mut registry);
        primitive::register(&mut registry);
        composite::register(&mut registry);
        service::register(&mut registry);
        registry
    }

    pub fn register<F>(&mut self, name: &str, faker: F) -> &mut Self
    where
        F: Faker + 'static,
    {
        self.fakers.insert(name.to_string(), Arc::new(faker));
        self
    }

    pub fn register_shared(&mut self, name: &str, faker: Arc<dyn Faker>) -> &mut Self {
        self.fakers.insert(name.to_string(), faker);
        self
    }

    pub fn register_service(&mut self, name: &str, capability: ServiceCapability) -> &mut Self {
        self.services.insert(name.to_string(), capability);
        self
    }

    pub fn resolve(&self, name: &str) -> Result<Arc<dyn Faker>, FakerError> {
        self.fakers
            .get(name)
            .cloned()
            .ok_or_else(|| FakerError::UnknownFaker(name.to_string()))
    }

    pub fn contains(&self, name: &str) -> bool {
        self.fakers.contains_key(name)
    }

    pub fn names(&self) -> impl Iterator<Item = &str> {
        self.fakers.keys().map(String::as_str)
    }

    pub fn service(&self, name: &str) -> Option<&ServiceCapability> {
        self.services.get(name)
    }

    pub fn service_names(&self) -> impl Iterator<Item = &str> {
        self.services.keys().map(String::as_str)
    }
}

impl fmt::Debug for FakerRegistry {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("FakerRegistry")
            .field("fakers", &self.fakers.keys().collect::<Vec<_>>())
            .field("services", &self.services.keys().collect::<Vec<_>>())
            .finish()
    }
}

pub fn option_str<'a>(options: &'a FakerOptions, name: &str) -> Option<&'a str> {
    options.get(name).and_then(JsonValue::as_str)
}

pub fn require_str<'a>(options: &'a FakerOptions, name: &str) -> Result<&'a str, FakerError> {
    match options.get(name) {
        None | Some(JsonValue::Null) => Err(FakerError::MissingOption(name.to_string())),
        Some(JsonValue::String(s)) if !s.is_empty() => Ok(s),
        Some(_) => Err(FakerError::invalid(name, "expected a non-empty string")),
    }
}

pub fn option_i64(options: &FakerOptions, name: &str) -> Result<Option<i64>, FakerError> {
    match options.get(name) {
        None | Some(JsonValue::Null) => Ok(None),
        Some(JsonValue::Number(n)) => n
            .as_i64()
            .map(Some)
            .ok_or_else(|| FakerError::invalid(name, "expected an integer")),
        Some(JsonValue::String(s)) => s
            .trim()
            .parse::<i64>()
            .map(Some)
            .map_err(|_| FakerError::invalid(name, "expected an integer")),
        Some(_) => Err(FakerError::invalid(name, "expected an integer")),
    }
}

pub fn option_f64(options: &FakerOptions, name: &str) -> Result<Option<f64>, FakerError> {
    match options.get(name) {
        None | Some(JsonValue::Null) => Ok(None),
        Some(JsonValue::Number(n)) => Ok(n.as_f64()),
        Some(JsonValue::String(s)) => s
            .trim()
            .parse::<f64>()
            .map(Some)
            .map_err(|_| FakerError::invalid(name, "expected a number")),
        Some(_) => Err(FakerError::invalid(name, "expected a number")),
    }
}

pub fn option_bool(options: &FakerOptions, name: &str, default: bool) -> Result<bool, FakerError> {
    match options.get(name) {
        None | Some(JsonValue::Null) => Ok(default),
        Some(JsonValue::Bool(b)) => Ok(*b),
        Some(_) => Err(FakerError::invalid(name, "expected true or false")),
    }
}

pub fn option_list<'a>(
    options: &'a FakerOptions,
    name: &str,
) -> Result<Option<&'a Vec<JsonValue>>, FakerError> {
    match options.get(name) {
        None | Some(JsonValue::Null) => Ok(None),
        Some(JsonValue::Array(items)) => Ok(Some(items)),
        Some(_) => Err(FakerError::invalid(name, "expected a list")),
    }
}

/// Nested options object, e.g. `fallback_options`.
pub fn option_object(options: &FakerOptions, name: &str) -> Result<FakerOptions, FakerError> {
    match options.get(name) {
        None | Some(JsonValue::Null) => Ok(FakerOptions::new()),
        Some(JsonValue::Object(map)) => Ok(map
            .iter()
            .map(|(k, v)| (k.clone(), v.clone()))
            .collect()),
        Some(_) => Err(FakerError::invalid(name, "expected a mapping")),
    }
}
