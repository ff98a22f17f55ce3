//! Delegation to generators supplied by the host application.
//!
//! Applications register a [`ServiceCapability`] under a name; rules then
//! reference it with `faker: service` and `options: { service: <name> }`.

use std::{fmt, sync::Arc};

use rand::RngCore;

use super::{Faker, FakerContext, FakerOptions, FakerRegistry, require_str};
use crate::{data::Value, error::FakerError};

/// Single-method adapter for services that only need the original value.
pub trait ValueService: Send + Sync {
    fn generate_value(&self, original: &Value, options: &FakerOptions)
    -> Result<Value, FakerError>;
}

pub type ServiceFn = dyn Fn(&FakerContext<'_>) -> Result<Value, FakerError> + Send + Sync;

#[derive(Clone)]
pub enum ServiceCapability {
    Faker(Arc<dyn Faker>),
    Generator(Arc<dyn ValueService>),
    Callable(Arc<ServiceFn>),
}

impl ServiceCapability {
    pub fn faker<F: Faker + 'static>(faker: F) -> Self {
        ServiceCapability::Faker(Arc::new(faker))
    }

    pub fn generator<S: ValueService + 'static>(service: S) -> Self {
        ServiceCapability::Generator(Arc::new(service))
    }

    pub fn callable<F>(f: F) -> Self
    where
        F: Fn(&FakerContext<'_>) -> Result<Value, FakerError> + Send + Sync + 'static,
    {
        ServiceCapability::Callable(Arc::new(f))
    }

    fn invoke(&self, ctx: &FakerContext<'_>, rng: &mut dyn RngCore) -> Result<Value, FakerError> {
        match self {
            ServiceCapability::Faker(faker) => faker.generate(ctx, rng),
            ServiceCapability::Generator(service) => {
                service.generate_value(ctx.original, ctx.options)
            }
            ServiceCapability::Callable(f) => f(ctx),
        }
    }
}

impl fmt::Debug for ServiceCapability {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let kind = match self {
            ServiceCapability::Faker(_) => "Faker",
            ServiceCapability::Generator(_) => "Generator",
            ServiceCapability::Callable(_) => "Callable",
        };
        f.debug_tuple(kind).finish()
    }
}

pub(super) fn register(registry: &mut FakerRegistry) {
    registry.register("service", ServiceFaker);
}

pub struct ServiceFaker;

impl Faker for ServiceFaker {
    fn validate(&self, options: &FakerOptions, registry: &FakerRegistry) -> Result<(), FakerError> {
        let name = require_str(options, "service")?;
        match registry.service(name) {
            Some(ServiceCapability::Faker(faker)) => faker.validate(options, registry),
            Some(_) => Ok(()),
            None => Err(FakerError::UnknownService(name.to_string())),
        }
    }

    fn generate(&self, ctx: &FakerContext<'_>, rng: &mut dyn RngCore) -> Result<Value, FakerError> {
        let name = require_str(ctx.options, "service")?;
        let capability = ctx
            .registry
            .service(name)
            .ok_or_else(|| FakerError::UnknownService(name.to_string()))?;
        capability.invoke(ctx, rng)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::data::Row;
    use rand::{SeedableRng, rngs::StdRng};
    use serde_json::json;

    struct Upper;

    impl ValueService for Upper {
        fn generate_value(
            &self,
            original: &Value,
            _options: &FakerOptions,
        ) -> Result<Value, FakerError> {
            Ok(Value::String(original.as_display().to_uppercase()))
        }
    }

    fn options(service: &str) -> FakerOptions {
        let mut options = FakerOptions::new();
        options.insert("service".into(), json!(service));
        options
    }

    #[test]
    fn unregistered_service_fails_validation() {
        let registry = FakerRegistry::empty();
        let err = ServiceFaker
            .validate(&options("crm"), &registry)
            .unwrap_err();
        assert!(matches!(err, FakerError::UnknownService(name) if name == "crm"));
    }

    #[test]
    fn missing_service_option_fails_validation() {
        let registry = FakerRegistry::empty();
        let err = ServiceFaker
            .validate(&FakerOptions::new(), &registry)
            .unwrap_err();
        assert!(matches!(err, FakerError::MissingOption(_)));
    }

    #[test]
    fn generator_and_callable_capabilities_are_invoked() {
        let mut registry = FakerRegistry::empty();
        registry
            .register_service("upper", ServiceCapability::generator(Upper))
            .register_service(
                "column",
                ServiceCapability::callable(|ctx| Ok(Value::from(ctx.column))),
            );
        let record = Row::new();
        let original = Value::from("abc");
        let mut rng = StdRng::seed_from_u64(0);

        let upper = options("upper");
        let ctx = FakerContext::new(&original, &record, "code", &upper, &registry);
        assert_eq!(
            ServiceFaker.generate(&ctx, &mut rng).unwrap(),
            Value::from("ABC")
        );

        let column = options("column");
        let ctx = FakerContext::new(&original, &record, "code", &column, &registry);
        assert_eq!(
            ServiceFaker.generate(&ctx, &mut rng).unwrap(),
            Value::from("code")
        );
    }

    #[test]
    fn capability_errors_surface_at_runtime() {
        let mut registry = FakerRegistry::empty();
        registry.register_service(
            "broken",
            ServiceCapability::callable(|_| Err(FakerError::Failed("backend down".into()))),
        );
        let record = Row::new();
        let original = Value::Null;
        let opts = options("broken");
        let ctx = FakerContext::new(&original, &record, "x", &opts, &registry);
        let mut rng = StdRng::seed_from_u64(0);
        let err = ServiceFaker.generate(&ctx, &mut rng).unwrap_err();
        assert_eq!(err.to_string(), "backend down");
    }
}
