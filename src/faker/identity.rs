//! Person and organisation generators.

use rand::{Rng, RngCore};

use super::{
    Faker, FakerContext, FakerOptions, FakerRegistry, option_bool, option_i64, option_str,
    words::{
        CITIES, COMPANY_SUFFIXES, EMAIL_DOMAINS, FIRST_NAMES, LAST_NAMES, STREET_SUFFIXES, STREETS,
        numerify, pick,
    },
};
use crate::{data::Value, error::FakerError};

pub(super) fn register(registry: &mut FakerRegistry) {
    registry
        .register("email", EmailFaker)
        .register("name", NameFaker)
        .register("first_name", FirstNameFaker)
        .register("last_name", LastNameFaker)
        .register("surname", LastNameFaker)
        .register("username", UsernameFaker)
        .register("phone", PhoneFaker)
        .register("address", AddressFaker)
        .register("company", CompanyFaker);
}

/// `first.last42@domain`; `domain` fixes the domain, `preserve_domain` keeps
/// the original's.
pub struct EmailFaker;

impl Faker for EmailFaker {
    fn validate(
        &self,
        options: &FakerOptions,
        _registry: &FakerRegistry,
    ) -> Result<(), FakerError> {
        option_bool(options, "preserve_domain", false)?;
        Ok(())
    }

    fn generate(&self, ctx: &FakerContext<'_>, rng: &mut dyn RngCore) -> Result<Value, FakerError> {
        let local = format!(
            "{}.{}{}",
            pick(rng, FIRST_NAMES),
            pick(rng, LAST_NAMES),
            rng.random_range(1..100u32)
        )
        .to_lowercase();
        let original_domain = if option_bool(ctx.options, "preserve_domain", false)? {
            ctx.original
                .as_str()
                .and_then(|email| email.rsplit_once('@'))
                .map(|(_, domain)| domain.to_string())
        } else {
            None
        };
        let domain = match (option_str(ctx.options, "domain"), original_domain) {
            (Some(domain), _) => domain.to_string(),
            (None, Some(domain)) => domain,
            (None, None) => pick(rng, EMAIL_DOMAINS).to_string(),
        };
        Ok(Value::String(format!("{local}@{domain}")))
    }
}

pub struct NameFaker;

impl Faker for NameFaker {
    fn generate(
        &self,
        _ctx: &FakerContext<'_>,
        rng: &mut dyn RngCore,
    ) -> Result<Value, FakerError> {
        Ok(Value::String(format!(
            "{} {}",
            pick(rng, FIRST_NAMES),
            pick(rng, LAST_NAMES)
        )))
    }
}

pub struct FirstNameFaker;

impl Faker for FirstNameFaker {
    fn generate(
        &self,
        _ctx: &FakerContext<'_>,
        rng: &mut dyn RngCore,
    ) -> Result<Value, FakerError> {
        Ok(Value::from(pick(rng, FIRST_NAMES)))
    }
}

pub struct LastNameFaker;

impl Faker for LastNameFaker {
    fn generate(
        &self,
        _ctx: &FakerContext<'_>,
        rng: &mut dyn RngCore,
    ) -> Result<Value, FakerError> {
        Ok(Value::from(pick(rng, LAST_NAMES)))
    }
}

pub struct UsernameFaker;

impl Faker for UsernameFaker {
    fn validate(
        &self,
        options: &FakerOptions,
        _registry: &FakerRegistry,
    ) -> Result<(), FakerError> {
        if let Some(max) = option_i64(options, "max_length")?
            && max < 1
        {
            return Err(FakerError::invalid("max_length", "must be at least 1"));
        }
        Ok(())
    }

    fn generate(&self, ctx: &FakerContext<'_>, rng: &mut dyn RngCore) -> Result<Value, FakerError> {
        let prefix = option_str(ctx.options, "prefix").unwrap_or("");
        let mut username = format!(
            "{prefix}{}{}{}",
            pick(rng, FIRST_NAMES),
            pick(rng, LAST_NAMES),
            rng.random_range(1..1000u32)
        )
        .to_lowercase();
        if let Some(max) = option_i64(ctx.options, "max_length")? {
            username = username.chars().take(max.max(1) as usize).collect();
        }
        Ok(Value::String(username))
    }
}

/// Digits substituted into `format` (default `+1 ###-###-####`).
pub struct PhoneFaker;

impl Faker for PhoneFaker {
    fn generate(&self, ctx: &FakerContext<'_>, rng: &mut dyn RngCore) -> Result<Value, FakerError> {
        let template = option_str(ctx.options, "format").unwrap_or("+1 ###-###-####");
        Ok(Value::String(numerify(rng, template)))
    }
}

pub struct AddressFaker;

impl Faker for AddressFaker {
    fn generate(&self, ctx: &FakerContext<'_>, rng: &mut dyn RngCore) -> Result<Value, FakerError> {
        let street = format!(
            "{} {} {}",
            rng.random_range(1..2000u32),
            pick(rng, STREETS),
            pick(rng, STREET_SUFFIXES)
        );
        if option_bool(ctx.options, "street_only", false)? {
            return Ok(Value::String(street));
        }
        Ok(Value::String(format!("{street}, {}", pick(rng, CITIES))))
    }
}

pub struct CompanyFaker;

impl Faker for CompanyFaker {
    fn generate(
        &self,
        _ctx: &FakerContext<'_>,
        rng: &mut dyn RngCore,
    ) -> Result<Value, FakerError> {
        Ok(Value::String(format!(
            "{} {}",
            pick(rng, LAST_NAMES),
            pick(rng, COMPANY_SUFFIXES)
        )))
    }
}
