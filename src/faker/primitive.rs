//! Scalar generators: masks, dates, numbers, booleans and filler text.

use std::fmt::Write;

use chrono::{
    Duration, NaiveDate,
    format::{Item, StrftimeItems},
};
use rand::{Rng, RngCore, distr::Uniform};

use super::{
    Faker, FakerContext, FakerOptions, FakerRegistry, option_f64, option_i64, option_str,
    words::{LOREM, pick},
};
use crate::{
    data::{Value, parse_naive_date},
    error::FakerError,
};

const DEFAULT_MIN_DATE: (i32, u32, u32) = (1970, 1, 1);
const DEFAULT_MAX_DATE: (i32, u32, u32) = (2024, 12, 31);
const MAX_TEXT_WORDS: i64 = 10_000;

pub(super) fn register(registry: &mut FakerRegistry) {
    registry
        .register("masking", MaskingFaker)
        .register("date", DateFaker)
        .register("number", NumberFaker)
        .register("age", AgeFaker)
        .register("boolean", BooleanFaker)
        .register("text", TextFaker);
}

/// Replaces all but the last `visible` characters of the original with
/// `char`.
pub struct MaskingFaker;

impl MaskingFaker {
    fn mask_char(options: &FakerOptions) -> Result<char, FakerError> {
        match option_str(options, "char") {
            None => Ok('*'),
            Some(raw) => {
                let mut chars = raw.chars();
                match (chars.next(), chars.next()) {
                    (Some(ch), None) => Ok(ch),
                    _ => Err(FakerError::invalid("char", "expected a single character")),
                }
            }
        }
    }
}

impl Faker for MaskingFaker {
    fn validate(
        &self,
        options: &FakerOptions,
        _registry: &FakerRegistry,
    ) -> Result<(), FakerError> {
        Self::mask_char(options)?;
        if let Some(visible) = option_i64(options, "visible")?
            && visible < 0
        {
            return Err(FakerError::invalid("visible", "must not be negative"));
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
        let mask = Self::mask_char(ctx.options)?;
        let visible = option_i64(ctx.options, "visible")?.unwrap_or(4).max(0) as usize;
        let text = ctx.original.as_display();
        let total = text.chars().count();
        let hidden = total.saturating_sub(visible);
        let masked = text
            .chars()
            .enumerate()
            .map(|(idx, ch)| if idx < hidden { mask } else { ch })
            .collect();
        Ok(Value::String(masked))
    }
}

/// Uniform date between `min` and `max` (inclusive). With `format` the date
/// is rendered as text through chrono's strftime syntax.
pub struct DateFaker;

impl DateFaker {
    fn bound(
        options: &FakerOptions,
        name: &str,
        (year, month, day): (i32, u32, u32),
    ) -> Result<NaiveDate, FakerError> {
        match option_str(options, name) {
            Some(raw) => {
                parse_naive_date(raw).map_err(|err| FakerError::invalid(name, err.to_string()))
            }
            None => NaiveDate::from_ymd_opt(year, month, day)
                .ok_or_else(|| FakerError::invalid(name, "invalid default date")),
        }
    }

    fn range(options: &FakerOptions) -> Result<(NaiveDate, NaiveDate), FakerError> {
        let min = Self::bound(options, "min", DEFAULT_MIN_DATE)?;
        let max = Self::bound(options, "max", DEFAULT_MAX_DATE)?;
        if min > max {
            return Err(FakerError::invalid("min", "must not be after max"));
        }
        Ok((min, max))
    }

    fn render(date: NaiveDate, format: &str) -> Result<String, FakerError> {
        let invalid = || FakerError::invalid("format", format!("invalid date format '{format}'"));
        if StrftimeItems::new(format).any(|item| matches!(item, Item::Error)) {
            return Err(invalid());
        }
        let mut rendered = String::new();
        write!(rendered, "{}", date.format(format)).map_err(|_| invalid())?;
        Ok(rendered)
    }
}

impl Faker for DateFaker {
    fn validate(
        &self,
        options: &FakerOptions,
        _registry: &FakerRegistry,
    ) -> Result<(), FakerError> {
        let (min, _) = Self::range(options)?;
        if let Some(format) = option_str(options, "format") {
            Self::render(min, format)?;
        }
        Ok(())
    }

    fn generate(&self, ctx: &FakerContext<'_>, rng: &mut dyn RngCore) -> Result<Value, FakerError> {
        let (min, max) = Self::range(ctx.options)?;
        let span = (max - min).num_days();
        let date = min + Duration::days(rng.random_range(0..=span));
        match option_str(ctx.options, "format") {
            Some(format) => Self::render(date, format).map(Value::String),
            None => Ok(Value::Date(date)),
        }
    }
}

/// Uniform number in `[min, max]`; integers unless `decimals` is positive.
pub struct NumberFaker;

impl NumberFaker {
    fn range(options: &FakerOptions) -> Result<(f64, f64), FakerError> {
        let min = option_f64(options, "min")?.unwrap_or(0.0);
        let max = option_f64(options, "max")?.unwrap_or(1000.0);
        if !min.is_finite() {
            return Err(FakerError::invalid("min", "must be a finite number"));
        }
        if !max.is_finite() {
            return Err(FakerError::invalid("max", "must be a finite number"));
        }
        if min > max {
            return Err(FakerError::invalid("min", "must not exceed max"));
        }
        if !(max - min).is_finite() {
            return Err(FakerError::invalid("max", "span from min is too wide"));
        }
        Ok((min, max))
    }
}

impl Faker for NumberFaker {
    fn validate(
        &self,
        options: &FakerOptions,
        _registry: &FakerRegistry,
    ) -> Result<(), FakerError> {
        Self::range(options)?;
        if let Some(decimals) = option_i64(options, "decimals")?
            && !(0..=10).contains(&decimals)
        {
            return Err(FakerError::invalid("decimals", "must be between 0 and 10"));
        }
        Ok(())
    }

    fn generate(&self, ctx: &FakerContext<'_>, rng: &mut dyn RngCore) -> Result<Value, FakerError> {
        let (min, max) = Self::range(ctx.options)?;
        let decimals = option_i64(ctx.options, "decimals")?
            .unwrap_or(0)
            .clamp(0, 10);
        if decimals == 0 {
            let low = min.ceil() as i64;
            let high = max.floor() as i64;
            if low > high {
                return Err(FakerError::Failed(format!(
                    "no integer between {min} and {max}"
                )));
            }
            let dist = Uniform::new_inclusive(low, high)
                .map_err(|err| FakerError::Failed(err.to_string()))?;
            return Ok(Value::Integer(rng.sample(dist)));
        }
        let factor = 10f64.powi(decimals as i32);
        let dist =
            Uniform::new_inclusive(min, max).map_err(|err| FakerError::Failed(err.to_string()))?;
        let raw = rng.sample(dist);
        Ok(Value::Float((raw * factor).round() / factor))
    }
}

pub struct AgeFaker;

impl Faker for AgeFaker {
    fn validate(
        &self,
        options: &FakerOptions,
        _registry: &FakerRegistry,
    ) -> Result<(), FakerError> {
        let min = option_i64(options, "min")?.unwrap_or(18);
        let max = option_i64(options, "max")?.unwrap_or(90);
        if min < 0 || min > max {
            return Err(FakerError::invalid("min", "expected 0 <= min <= max"));
        }
        Ok(())
    }

    fn generate(&self, ctx: &FakerContext<'_>, rng: &mut dyn RngCore) -> Result<Value, FakerError> {
        let min = option_i64(ctx.options, "min")?.unwrap_or(18);
        let max = option_i64(ctx.options, "max")?.unwrap_or(90).max(min);
        Ok(Value::Integer(rng.random_range(min..=max)))
    }
}

pub struct BooleanFaker;

impl Faker for BooleanFaker {
    fn validate(
        &self,
        options: &FakerOptions,
        _registry: &FakerRegistry,
    ) -> Result<(), FakerError> {
        if let Some(p) = option_f64(options, "true_probability")?
            && !(0.0..=1.0).contains(&p)
        {
            return Err(FakerError::invalid(
                "true_probability",
                "must be between 0 and 1",
            ));
        }
        Ok(())
    }

    fn generate(&self, ctx: &FakerContext<'_>, rng: &mut dyn RngCore) -> Result<Value, FakerError> {
        let p = option_f64(ctx.options, "true_probability")?
            .unwrap_or(0.5)
            .clamp(0.0, 1.0);
        Ok(Value::Boolean(rng.random_bool(p)))
    }
}

/// Lorem ipsum of `words` words (default 8), cut to `max_length` characters.
pub struct TextFaker;

impl Faker for TextFaker {
    fn validate(
        &self,
        options: &FakerOptions,
        _registry: &FakerRegistry,
    ) -> Result<(), FakerError> {
        if let Some(words) = option_i64(options, "words")?
            && !(1..=MAX_TEXT_WORDS).contains(&words)
        {
            return Err(FakerError::invalid(
                "words",
                format!("must be between 1 and {MAX_TEXT_WORDS}"),
            ));
        }
        if let Some(max_length) = option_i64(options, "max_length")?
            && max_length < 1
        {
            return Err(FakerError::invalid("max_length", "must be at least 1"));
        }
        Ok(())
    }

    fn generate(&self, ctx: &FakerContext<'_>, rng: &mut dyn RngCore) -> Result<Value, FakerError> {
        let count = option_i64(ctx.options, "words")?
            .unwrap_or(8)
            .clamp(1, MAX_TEXT_WORDS) as usize;
        let mut text = (0..count)
            .map(|_| pick(rng, LOREM))
            .collect::<Vec<_>>()
            .join(" ");
        if let Some(first) = text.get(..1) {
            text = format!("{}{}", first.to_uppercase(), &text[1..]);
        }
        if let Some(max) = option_i64(ctx.options, "max_length")? {
            text = text.chars().take(max.max(0) as usize).collect();
            text.truncate(text.trim_end().len());
        }
        Ok(Value::String(text))
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::data::Row;
    use rand::{SeedableRng, rngs::StdRng};
    use serde_json::json;

    fn run(faker: &dyn Faker, original: Value, options: FakerOptions) -> Result<Value, FakerError> {
        let registry = FakerRegistry::empty();
        let record = Row::new();
        let ctx = FakerContext::new(&original, &record, "field", &options, &registry);
        let mut rng = StdRng::seed_from_u64(5);
        faker.generate(&ctx, &mut rng)
    }

    fn check(faker: &dyn Faker, options: &FakerOptions) -> Result<(), FakerError> {
        faker.validate(options, &FakerRegistry::empty())
    }

    #[test]
    fn masking_keeps_trailing_characters() {
        let mut options = FakerOptions::new();
        options.insert("visible".into(), json!(2));
        options.insert("char".into(), json!("#"));
        let masked = run(&MaskingFaker, Value::from("secret"), options).unwrap();
        assert_eq!(masked, Value::from("####et"));
    }

    #[test]
    fn masking_leaves_null_alone() {
        let masked = run(&MaskingFaker, Value::Null, FakerOptions::new()).unwrap();
        assert!(masked.is_null());
    }

    #[test]
    fn date_stays_within_bounds() {
        let mut options = FakerOptions::new();
        options.insert("min".into(), json!("2020-01-01"));
        options.insert("max".into(), json!("2020-01-31"));
        match run(&DateFaker, Value::Null, options).unwrap() {
            Value::Date(date) => {
                assert!(date >= NaiveDate::from_ymd_opt(2020, 1, 1).unwrap());
                assert!(date <= NaiveDate::from_ymd_opt(2020, 1, 31).unwrap());
            }
            other => panic!("Expected date, got {other:?}"),
        }
    }

    #[test]
    fn date_rejects_inverted_range() {
        let mut options = FakerOptions::new();
        options.insert("min".into(), json!("2021-01-01"));
        options.insert("max".into(), json!("2020-01-01"));
        assert!(check(&DateFaker, &options).is_err());
    }

    #[test]
    fn date_rejects_invalid_format_at_setup() {
        for format in ["%Q", "%Y-%m-%d %H:%M"] {
            let mut options = FakerOptions::new();
            options.insert("format".into(), json!(format));
            let err = check(&DateFaker, &options).unwrap_err();
            assert!(
                matches!(&err, FakerError::InvalidOption { name, .. } if name == "format"),
                "{format}: {err:?}"
            );
            assert!(run(&DateFaker, Value::Null, options).is_err());
        }
    }

    #[test]
    fn date_renders_valid_format_as_text() {
        let mut options = FakerOptions::new();
        options.insert("min".into(), json!("2020-02-03"));
        options.insert("max".into(), json!("2020-02-03"));
        options.insert("format".into(), json!("%d/%m/%Y"));
        assert!(check(&DateFaker, &options).is_ok());
        assert_eq!(
            run(&DateFaker, Value::Null, options).unwrap(),
            Value::from("03/02/2020")
        );
    }

    #[test]
    fn number_rejects_non_finite_bounds() {
        let cases = [
            (json!(-1.7e308), json!(1.7e308)),
            (json!(0), json!("inf")),
            (json!("-inf"), json!(0)),
            (json!("NaN"), json!(1)),
        ];
        for (min, max) in cases {
            let mut options = FakerOptions::new();
            options.insert("min".into(), min.clone());
            options.insert("max".into(), max.clone());
            options.insert("decimals".into(), json!(2));
            assert!(check(&NumberFaker, &options).is_err(), "{min}..{max}");
            assert!(run(&NumberFaker, Value::Null, options).is_err());
        }
    }

    #[test]
    fn number_with_equal_bounds_is_that_bound() {
        let mut options = FakerOptions::new();
        options.insert("min".into(), json!(2.5));
        options.insert("max".into(), json!(2.5));
        options.insert("decimals".into(), json!(1));
        assert_eq!(
            run(&NumberFaker, Value::Null, options).unwrap(),
            Value::Float(2.5)
        );
    }

    #[test]
    fn number_honours_decimals() {
        let mut options = FakerOptions::new();
        options.insert("min".into(), json!(1));
        options.insert("max".into(), json!(2));
        options.insert("decimals".into(), json!(2));
        match run(&NumberFaker, Value::Null, options).unwrap() {
            Value::Float(f) => {
                assert!((1.0..=2.0).contains(&f));
                assert!(((f * 100.0).round() - f * 100.0).abs() < 1e-9);
            }
            other => panic!("Expected float, got {other:?}"),
        }
    }

    #[test]
    fn boolean_with_certain_probability() {
        let mut options = FakerOptions::new();
        options.insert("true_probability".into(), json!(1.0));
        assert_eq!(
            run(&BooleanFaker, Value::Null, options).unwrap(),
            Value::Boolean(true)
        );
    }

    #[test]
    fn text_is_truncated() {
        let mut options = FakerOptions::new();
        options.insert("words".into(), json!(30));
        options.insert("max_length".into(), json!(20));
        let text = run(&TextFaker, Value::Null, options).unwrap().as_display();
        assert!(text.chars().count() <= 20);
        assert!(!text.ends_with(' '));
    }

    #[test]
    fn text_rejects_unbounded_word_counts() {
        for words in [json!(0), json!(1_000_000), json!(1e12)] {
            let mut options = FakerOptions::new();
            options.insert("words".into(), words.clone());
            assert!(check(&TextFaker, &options).is_err(), "{words}");
        }
        let mut options = FakerOptions::new();
        options.insert("max_length".into(), json!(0));
        assert!(check(&TextFaker, &options).is_err());

        let mut options = FakerOptions::new();
        options.insert("words".into(), json!(MAX_TEXT_WORDS));
        assert!(check(&TextFaker, &options).is_ok());
    }
}
