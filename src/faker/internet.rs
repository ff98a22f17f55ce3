//! Network and credential generators.

use rand::{Rng, RngCore};

use super::{
    Faker, FakerContext, FakerOptions, FakerRegistry, option_bool, option_i64,
    words::{LOREM, TLDS, pick},
};
use crate::{data::Value, error::FakerError};

const PASSWORD_ALPHABET: &[u8] =
    b"abcdefghijkmnopqrstuvwxyzABCDEFGHJKLMNPQRSTUVWXYZ23456789";
const PASSWORD_SYMBOLS: &[u8] = b"!@#$%^&*-_+=?";

pub(super) fn register(registry: &mut FakerRegistry) {
    registry
        .register("url", UrlFaker)
        .register("ip_address", IpAddressFaker)
        .register("mac_address", MacAddressFaker)
        .register("uuid", UuidFaker)
        .register("password", PasswordFaker);
}

pub struct UrlFaker;

impl Faker for UrlFaker {
    fn generate(
        &self,
        _ctx: &FakerContext<'_>,
        rng: &mut dyn RngCore,
    ) -> Result<Value, FakerError> {
        Ok(Value::String(format!(
            "https://www.{}{}.{}/{}",
            pick(rng, LOREM),
            pick(rng, LOREM),
            pick(rng, TLDS),
            pick(rng, LOREM)
        )))
    }
}

/// IPv4 by default; `version: 6` for IPv6.
pub struct IpAddressFaker;

impl Faker for IpAddressFaker {
    fn validate(
        &self,
        options: &FakerOptions,
        _registry: &FakerRegistry,
    ) -> Result<(), FakerError> {
        match option_i64(options, "version")? {
            None | Some(4) | Some(6) => Ok(()),
            Some(_) => Err(FakerError::invalid("version", "expected 4 or 6")),
        }
    }

    fn generate(&self, ctx: &FakerContext<'_>, rng: &mut dyn RngCore) -> Result<Value, FakerError> {
        let address = if option_i64(ctx.options, "version")? == Some(6) {
            (0..8)
                .map(|_| format!("{:x}", rng.random::<u16>()))
                .collect::<Vec<_>>()
                .join(":")
        } else {
            format!(
                "{}.{}.{}.{}",
                rng.random_range(1..224u8),
                rng.random::<u8>(),
                rng.random::<u8>(),
                rng.random_range(1..255u8)
            )
        };
        Ok(Value::String(address))
    }
}

pub struct MacAddressFaker;

impl Faker for MacAddressFaker {
    fn generate(
        &self,
        _ctx: &FakerContext<'_>,
        rng: &mut dyn RngCore,
    ) -> Result<Value, FakerError> {
        let mut octets = [0u8; 6];
        rng.fill_bytes(&mut octets);
        // locally administered, unicast
        octets[0] = (octets[0] | 0x02) & 0xfe;
        Ok(Value::String(
            octets
                .iter()
                .map(|b| format!("{b:02x}"))
                .collect::<Vec<_>>()
                .join(":"),
        ))
    }
}

pub struct UuidFaker;

impl Faker for UuidFaker {
    fn generate(
        &self,
        _ctx: &FakerContext<'_>,
        rng: &mut dyn RngCore,
    ) -> Result<Value, FakerError> {
        let mut bytes = [0u8; 16];
        rng.fill_bytes(&mut bytes);
        let uuid = uuid::Builder::from_random_bytes(bytes).into_uuid();
        Ok(Value::Guid(uuid))
    }
}

/// Random password of `length` (default 12) characters.
pub struct PasswordFaker;

impl Faker for PasswordFaker {
    fn validate(
        &self,
        options: &FakerOptions,
        _registry: &FakerRegistry,
    ) -> Result<(), FakerError> {
        if let Some(length) = option_i64(options, "length")?
            && !(4..=256).contains(&length)
        {
            return Err(FakerError::invalid("length", "must be between 4 and 256"));
        }
        option_bool(options, "symbols", true)?;
        Ok(())
    }

    fn generate(&self, ctx: &FakerContext<'_>, rng: &mut dyn RngCore) -> Result<Value, FakerError> {
        let length = option_i64(ctx.options, "length")?
            .unwrap_or(12)
            .clamp(4, 256) as usize;
        let symbols = option_bool(ctx.options, "symbols", true)?;
        let password = (0..length)
            .map(|_| {
                if symbols && rng.random_bool(0.15) {
                    PASSWORD_SYMBOLS[rng.random_range(0..PASSWORD_SYMBOLS.len())] as char
                } else {
                    PASSWORD_ALPHABET[rng.random_range(0..PASSWORD_ALPHABET.len())] as char
                }
            })
            .collect::<String>();
        Ok(Value::String(password))
    }
}
