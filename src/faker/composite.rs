//! Generators built from the row, from fixed option values or from other
//! generators.

use rand::{Rng, RngCore};
use regex::Regex;
use serde_json::Value as JsonValue;
use sha2::{Digest, Sha256, Sha512};

use super::{
    Faker, FakerContext, FakerOptions, FakerRegistry, option_bool, option_i64, option_list,
    option_object, option_str, require_str,
};
use crate::{data::Value, error::FakerError};

pub(super) fn register(registry: &mut FakerRegistry) {
    registry
        .register("copy", CopyFaker)
        .register("pattern_based", PatternBasedFaker)
        .register("hash_preserve", HashPreserveFaker)
        .register("constant", ConstantFaker)
        .register("null", NullFaker)
        .register("map", MapFaker)
        .register("shuffle", ShuffleFaker)
        .register("enum", EnumFaker);
}

fn validate_fallback(options: &FakerOptions, registry: &FakerRegistry) -> Result<(), FakerError> {
    if let Some(name) = option_str(options, "fallback_faker") {
        let fallback = registry.resolve(name)?;
        fallback.validate(&option_object(options, "fallback_options")?, registry)?;
    }
    Ok(())
}

/// Runs `fallback_faker` for the current field, or returns `None` when no
/// fallback is configured.
fn run_fallback(
    ctx: &FakerContext<'_>,
    rng: &mut dyn RngCore,
) -> Result<Option<Value>, FakerError> {
    let Some(name) = option_str(ctx.options, "fallback_faker") else {
        return Ok(None);
    };
    let fallback = ctx.registry.resolve(name)?;
    let options = option_object(ctx.options, "fallback_options")?;
    fallback
        .generate(&ctx.with_options(&options), rng)
        .map(Some)
}

/// Value of `source_field` in the row as rewritten so far.
fn source_value<'a>(ctx: &FakerContext<'a>) -> Option<&'a Value> {
    option_str(ctx.options, "source_field")
        .and_then(|field| ctx.field(field))
        .filter(|value| !value.is_empty())
}

pub struct CopyFaker;

impl Faker for CopyFaker {
    fn validate(&self, options: &FakerOptions, registry: &FakerRegistry) -> Result<(), FakerError> {
        require_str(options, "source_field")?;
        validate_fallback(options, registry)
    }

    fn generate(&self, ctx: &FakerContext<'_>, rng: &mut dyn RngCore) -> Result<Value, FakerError> {
        if let Some(value) = source_value(ctx) {
            return Ok(value.clone());
        }
        Ok(run_fallback(ctx, rng)?.unwrap_or(Value::Null))
    }
}

/// Joins the (already anonymized) `source_field` with a fragment extracted
/// from this field's original value by `pattern`.
pub struct PatternBasedFaker;

impl PatternBasedFaker {
    fn compile(options: &FakerOptions) -> Result<Option<Regex>, FakerError> {
        option_str(options, "pattern")
            .map(|pattern| {
                Regex::new(pattern).map_err(|err| FakerError::invalid("pattern", err.to_string()))
            })
            .transpose()
    }

    fn extract(regex: &Regex, original: &str) -> String {
        regex
            .captures(original)
            .and_then(|caps| caps.get(1).or_else(|| caps.get(0)))
            .map(|m| m.as_str().to_string())
            .unwrap_or_default()
    }
}

impl Faker for PatternBasedFaker {
    fn validate(&self, options: &FakerOptions, registry: &FakerRegistry) -> Result<(), FakerError> {
        if option_str(options, "source_field").is_none()
            && option_str(options, "fallback_faker").is_none()
        {
            return Err(FakerError::MissingOption(
                "source_field or fallback_faker".to_string(),
            ));
        }
        Self::compile(options)?;
        validate_fallback(options, registry)
    }

    fn generate(&self, ctx: &FakerContext<'_>, rng: &mut dyn RngCore) -> Result<Value, FakerError> {
        let Some(source) = source_value(ctx) else {
            return run_fallback(ctx, rng)?.ok_or_else(|| {
                FakerError::Failed(format!(
                    "source field for '{}' is empty and no fallback_faker is configured",
                    ctx.column
                ))
            });
        };
        let fragment = match Self::compile(ctx.options)? {
            Some(regex) => Self::extract(&regex, &ctx.original.as_display()),
            None => String::new(),
        };
        let base = source.as_display();
        if fragment.is_empty() {
            return Ok(Value::String(base));
        }
        let separator = option_str(ctx.options, "separator").unwrap_or("");
        Ok(Value::String(format!("{base}{separator}{fragment}")))
    }
}

/// Hex digest of `salt` + original value. The same input always produces
/// the same output, which keeps joins on hashed keys intact.
pub struct HashPreserveFaker;

impl HashPreserveFaker {
    fn digest(algorithm: &str, input: &[u8]) -> Result<String, FakerError> {
        match algorithm {
            "sha256" => Ok(format!("{:x}", Sha256::digest(input))),
            "sha512" => Ok(format!("{:x}", Sha512::digest(input))),
            other => Err(FakerError::invalid(
                "algorithm",
                format!("expected sha256 or sha512, got '{other}'"),
            )),
        }
    }
}

impl Faker for HashPreserveFaker {
    fn validate(
        &self,
        options: &FakerOptions,
        _registry: &FakerRegistry,
    ) -> Result<(), FakerError> {
        Self::digest(option_str(options, "algorithm").unwrap_or("sha256"), b"")?;
        if let Some(length) = option_i64(options, "length")?
            && length < 1
        {
            return Err(FakerError::invalid("length", "must be at least 1"));
        }
        Ok(())
    }

    fn generate(
        &self,
        ctx: &FakerContext<'_>,
        _rng: &mut dyn RngCore,
    ) -> Result<Value, FakerError> {
        if ctx.original.is_null() {
            return Ok(Value::Null);
        }
        let algorithm = option_str(ctx.options, "algorithm").unwrap_or("sha256");
        let salt = option_str(ctx.options, "salt").unwrap_or("");
        let input = format!("{salt}{}", ctx.original.as_display());
        let mut hex = Self::digest(algorithm, input.as_bytes())?;
        if let Some(length) = option_i64(ctx.options, "length")? {
            hex.truncate(length.max(1) as usize);
        }
        Ok(Value::String(hex))
    }
}

pub struct ConstantFaker;

impl Faker for ConstantFaker {
    fn validate(
        &self,
        options: &FakerOptions,
        _registry: &FakerRegistry,
    ) -> Result<(), FakerError> {
        if options.contains_key("value") {
            Ok(())
        } else {
            Err(FakerError::MissingOption("value".to_string()))
        }
    }

    fn generate(
        &self,
        ctx: &FakerContext<'_>,
        _rng: &mut dyn RngCore,
    ) -> Result<Value, FakerError> {
        ctx.options
            .get("value")
            .map(Value::from_json)
            .ok_or_else(|| FakerError::MissingOption("value".to_string()))
    }
}

pub struct NullFaker;

impl Faker for NullFaker {
    fn generate(
        &self,
        _ctx: &FakerContext<'_>,
        _rng: &mut dyn RngCore,
    ) -> Result<Value, FakerError> {
        Ok(Value::Null)
    }
}

/// Lookup table keyed by the original's text form. Unmapped values use
/// `default` when given and are otherwise kept.
pub struct MapFaker;

impl MapFaker {
    fn table(options: &FakerOptions) -> Result<&serde_json::Map<String, JsonValue>, FakerError> {
        match options.get("map") {
            Some(JsonValue::Object(map)) => Ok(map),
            None | Some(JsonValue::Null) => Err(FakerError::MissingOption("map".to_string())),
            Some(_) => Err(FakerError::invalid("map", "expected a mapping")),
        }
    }
}

impl Faker for MapFaker {
    fn validate(
        &self,
        options: &FakerOptions,
        _registry: &FakerRegistry,
    ) -> Result<(), FakerError> {
        Self::table(options).map(|_| ())
    }

    fn generate(
        &self,
        ctx: &FakerContext<'_>,
        _rng: &mut dyn RngCore,
    ) -> Result<Value, FakerError> {
        let table = Self::table(ctx.options)?;
        let key = ctx.original.as_display();
        if let Some(mapped) = table.get(&key) {
            return Ok(Value::from_json(mapped));
        }
        match ctx.options.get("default") {
            Some(default) => Ok(Value::from_json(default)),
            None => Ok(ctx.original.clone()),
        }
    }
}

fn required_values<'a>(options: &'a FakerOptions) -> Result<&'a Vec<JsonValue>, FakerError> {
    match option_list(options, "values")? {
        Some(values) if !values.is_empty() => Ok(values),
        Some(_) => Err(FakerError::invalid("values", "must not be empty")),
        None => Err(FakerError::MissingOption("values".to_string())),
    }
}

/// Picks one of `values`; with `exclude_original` the original is never
/// picked unless it is the only candidate.
pub struct ShuffleFaker;

impl Faker for ShuffleFaker {
    fn validate(
        &self,
        options: &FakerOptions,
        _registry: &FakerRegistry,
    ) -> Result<(), FakerError> {
        required_values(options)?;
        option_bool(options, "exclude_original", false)?;
        Ok(())
    }

    fn generate(&self, ctx: &FakerContext<'_>, rng: &mut dyn RngCore) -> Result<Value, FakerError> {
        let values = required_values(ctx.options)?;
        let mut candidates: Vec<Value> = values.iter().map(Value::from_json).collect();
        if option_bool(ctx.options, "exclude_original", false)? {
            let original = ctx.original.as_display();
            let remaining: Vec<Value> = candidates
                .iter()
                .filter(|value| value.as_display() != original)
                .cloned()
                .collect();
            if !remaining.is_empty() {
                candidates = remaining;
            }
        }
        let idx = rng.random_range(0..candidates.len());
        Ok(candidates.swap_remove(idx))
    }
}

/// Picks one of `values`, weighted by the parallel `weights` list if given.
pub struct EnumFaker;

impl EnumFaker {
    fn weights(options: &FakerOptions, expected: usize) -> Result<Option<Vec<f64>>, FakerError> {
        let Some(raw) = option_list(options, "weights")? else {
            return Ok(None);
        };
        if raw.len() != expected {
            return Err(FakerError::invalid(
                "weights",
                format!("expected {expected} weights, got {}", raw.len()),
            ));
        }
        let weights = raw
            .iter()
            .map(|w| match w.as_f64() {
                Some(w) if w >= 0.0 && w.is_finite() => Ok(w),
                _ => Err(FakerError::invalid("weights", "must be finite and not negative")),
            })
            .collect::<Result<Vec<_>, _>>()?;
        let total = weights.iter().sum::<f64>();
        if !(total > 0.0 && total.is_finite()) {
            return Err(FakerError::invalid("weights", "need a finite positive total"));
        }
        Ok(Some(weights))
    }
}

impl Faker for EnumFaker {
    fn validate(
        &self,
        options: &FakerOptions,
        _registry: &FakerRegistry,
    ) -> Result<(), FakerError> {
        let values = required_values(options)?;
        Self::weights(options, values.len()).map(|_| ())
    }

    fn generate(&self, ctx: &FakerContext<'_>, rng: &mut dyn RngCore) -> Result<Value, FakerError> {
        let values = required_values(ctx.options)?;
        let idx = match Self::weights(ctx.options, values.len())? {
            None => rng.random_range(0..values.len()),
            Some(weights) => {
                let total: f64 = weights.iter().sum();
                let mut target = rng.random_range(0.0..total);
                weights
                    .iter()
                    .position(|w| {
                        if target < *w {
                            true
                        } else {
                            target -= w;
                            false
                        }
                    })
                    .unwrap_or(values.len() - 1)
            }
        };
        Ok(Value::from_json(&values[idx]))
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::data::Row;
    use rand::{SeedableRng, rngs::StdRng};
    use serde_json::json;

    fn options(pairs: &[(&str, JsonValue)]) -> FakerOptions {
        pairs
            .iter()
            .map(|(k, v)| (k.to_string(), v.clone()))
            .collect()
    }

    #[test]
    fn hash_is_deterministic_and_truncated() {
        let registry = FakerRegistry::empty();
        let record = Row::new();
        let original = Value::from("12345678Z");
        let opts = options(&[("salt", json!("pepper")), ("length", json!(16))]);
        let ctx = FakerContext::new(&original, &record, "dni", &opts, &registry);
        let mut rng = StdRng::seed_from_u64(1);
        let first = HashPreserveFaker.generate(&ctx, &mut rng).unwrap();
        let mut other_rng = StdRng::seed_from_u64(99);
        let second = HashPreserveFaker.generate(&ctx, &mut other_rng).unwrap();
        assert_eq!(first, second);
        assert_eq!(first.as_display().len(), 16);
    }

    #[test]
    fn sha256_of_known_input() {
        let hex = HashPreserveFaker::digest("sha256", b"abc").unwrap();
        assert_eq!(
            hex,
            "ba7816bf8f01cfea414140de5dae2223b00361a396177a9cb410ff61f20015ad"
        );
    }

    #[test]
    fn pattern_based_appends_capture_group() {
        let registry = FakerRegistry::with_defaults();
        let mut record = Row::new();
        record.insert("login".into(), Value::from("anon42"));
        let original = Value::from("jdoe@corp.example");
        let opts = options(&[
            ("source_field", json!("login")),
            ("pattern", json!("@(.+)$")),
            ("separator", json!("@")),
        ]);
        let ctx = FakerContext::new(&original, &record, "email", &opts, &registry);
        let mut rng = StdRng::seed_from_u64(1);
        let value = PatternBasedFaker.generate(&ctx, &mut rng).unwrap();
        assert_eq!(value, Value::from("anon42@corp.example"));
    }

    #[test]
    fn pattern_based_without_source_or_fallback_errors() {
        let registry = FakerRegistry::empty();
        let record = Row::new();
        let original = Value::from("x");
        let opts = options(&[("source_field", json!("missing"))]);
        let ctx = FakerContext::new(&original, &record, "email", &opts, &registry);
        let mut rng = StdRng::seed_from_u64(1);
        assert!(PatternBasedFaker.generate(&ctx, &mut rng).is_err());
    }

    #[test]
    fn enum_respects_zero_weights() {
        let registry = FakerRegistry::empty();
        let record = Row::new();
        let original = Value::Null;
        let opts = options(&[
            ("values", json!(["a", "b", "c"])),
            ("weights", json!([0, 1, 0])),
        ]);
        let ctx = FakerContext::new(&original, &record, "tier", &opts, &registry);
        let mut rng = StdRng::seed_from_u64(3);
        for _ in 0..50 {
            assert_eq!(
                EnumFaker.generate(&ctx, &mut rng).unwrap(),
                Value::from("b")
            );
        }
    }

    #[test]
    fn enum_rejects_mismatched_weights() {
        let opts = options(&[("values", json!(["a", "b"])), ("weights", json!([1]))]);
        assert!(EnumFaker.validate(&opts, &FakerRegistry::empty()).is_err());
    }

    #[test]
    fn enum_rejects_weights_summing_past_f64() {
        let opts = options(&[
            ("values", json!(["a", "b"])),
            ("weights", json!([1.7e308, 1.7e308])),
        ]);
        assert!(EnumFaker.validate(&opts, &FakerRegistry::empty()).is_err());
    }

    #[test]
    fn shuffle_excludes_original() {
        let registry = FakerRegistry::empty();
        let record = Row::new();
        let original = Value::from("red");
        let opts = options(&[
            ("values", json!(["red", "green"])),
            ("exclude_original", json!(true)),
        ]);
        let ctx = FakerContext::new(&original, &record, "colour", &opts, &registry);
        let mut rng = StdRng::seed_from_u64(8);
        for _ in 0..20 {
            assert_eq!(
                ShuffleFaker.generate(&ctx, &mut rng).unwrap(),
                Value::from("green")
            );
        }
    }
}
