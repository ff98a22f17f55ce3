//! Banking and national identifier generators.
//!
//! All generated identifiers carry valid check digits so they pass the
//! format validation an application may run against them.

use rand::{Rng, RngCore};

use super::{
    Faker, FakerContext, FakerOptions, FakerRegistry, option_str,
    words::digits,
};
use crate::{data::Value, error::FakerError};

const DNI_LETTERS: &[u8] = b"TRWAGMYFPDXBNJZSQVHLCKE";
const NIE_PREFIXES: &[char] = &['X', 'Y', 'Z'];
const CIF_ORGANISATIONS: &str = "ABCDEFGHJNPQRSUVW";
const CIF_CONTROL_LETTERS: &[u8] = b"JABCDEFGHI";

/// Country code and BBAN length.
const IBAN_COUNTRIES: &[(&str, usize)] = &[
    ("ES", 20),
    ("DE", 18),
    ("FR", 23),
    ("IT", 23),
    ("NL", 14),
    ("PT", 21),
    ("BE", 12),
];

pub(super) fn register(registry: &mut FakerRegistry) {
    registry
        .register("iban", IbanFaker)
        .register("credit_card", CreditCardFaker)
        .register("dni_cif", TaxIdFaker)
        .register("tax_id", TaxIdFaker);
}

pub struct IbanFaker;

impl IbanFaker {
    fn bban_length(country: &str) -> Option<usize> {
        IBAN_COUNTRIES
            .iter()
            .find(|(code, _)| code.eq_ignore_ascii_case(country))
            .map(|(_, len)| *len)
    }
}

impl Faker for IbanFaker {
    fn validate(
        &self,
        options: &FakerOptions,
        _registry: &FakerRegistry,
    ) -> Result<(), FakerError> {
        if let Some(country) = option_str(options, "country")
            && Self::bban_length(country).is_none()
        {
            return Err(FakerError::invalid(
                "country",
                format!("unsupported IBAN country '{country}'"),
            ));
        }
        Ok(())
    }

    fn generate(&self, ctx: &FakerContext<'_>, rng: &mut dyn RngCore) -> Result<Value, FakerError> {
        let country = option_str(ctx.options, "country")
            .unwrap_or("ES")
            .to_ascii_uppercase();
        let length = Self::bban_length(&country)
            .ok_or_else(|| FakerError::invalid("country", format!("unsupported '{country}'")))?;
        let bban = digits(rng, length);
        Ok(Value::String(iban_from_bban(&country, &bban)))
    }
}

pub fn iban_from_bban(country: &str, bban: &str) -> String {
    let rearranged = format!("{bban}{country}00");
    let check = 98 - mod97(&rearranged);
    format!("{country}{check:02}{bban}")
}

/// ISO 7064 mod 97 over an alphanumeric string (letters count as 10..35).
pub fn mod97(value: &str) -> u32 {
    value.chars().fold(0u32, |acc, ch| {
        let n = ch.to_digit(36).unwrap_or(0);
        if n >= 10 {
            (acc * 100 + n) % 97
        } else {
            (acc * 10 + n) % 97
        }
    })
}

/// Card numbers with a valid Luhn check digit; `brand` is visa (default),
/// mastercard or amex.
pub struct CreditCardFaker;

impl Faker for CreditCardFaker {
    fn validate(
        &self,
        options: &FakerOptions,
        _registry: &FakerRegistry,
    ) -> Result<(), FakerError> {
        match option_str(options, "brand") {
            None | Some("visa") | Some("mastercard") | Some("amex") => Ok(()),
            Some(other) => Err(FakerError::invalid(
                "brand",
                format!("unknown card brand '{other}'"),
            )),
        }
    }

    fn generate(&self, ctx: &FakerContext<'_>, rng: &mut dyn RngCore) -> Result<Value, FakerError> {
        let (prefix, length) = match option_str(ctx.options, "brand").unwrap_or("visa") {
            "mastercard" => (format!("5{}", rng.random_range(1..=5u8)), 16),
            "amex" => (if rng.random_bool(0.5) { "34" } else { "37" }.to_string(), 15),
            _ => ("4".to_string(), 16),
        };
        let payload = format!("{prefix}{}", digits(rng, length - prefix.len() - 1));
        let check = luhn_check_digit(&payload);
        Ok(Value::String(format!("{payload}{check}")))
    }
}

pub fn luhn_check_digit(payload: &str) -> u32 {
    let sum: u32 = payload
        .chars()
        .rev()
        .filter_map(|ch| ch.to_digit(10))
        .enumerate()
        .map(|(idx, digit)| {
            if idx % 2 == 0 {
                let doubled = digit * 2;
                if doubled > 9 { doubled - 9 } else { doubled }
            } else {
                digit
            }
        })
        .sum();
    (10 - sum % 10) % 10
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum TaxIdKind {
    Dni,
    Nie,
    Cif,
}

impl TaxIdKind {
    fn parse(raw: &str) -> Option<Option<Self>> {
        match raw.to_ascii_lowercase().as_str() {
            "auto" => Some(None),
            "dni" => Some(Some(TaxIdKind::Dni)),
            "nie" => Some(Some(TaxIdKind::Nie)),
            "cif" => Some(Some(TaxIdKind::Cif)),
            _ => None,
        }
    }

    /// Best-effort guess from the shape of an existing identifier. Anything
    /// unrecognised, including empty input, is treated as a DNI.
    pub fn detect(original: &Value) -> Self {
        let text = original.as_display();
        let first = text.trim().chars().next().map(|c| c.to_ascii_uppercase());
        match first {
            Some(c) if NIE_PREFIXES.contains(&c) => TaxIdKind::Nie,
            Some(c) if CIF_ORGANISATIONS.contains(c) => TaxIdKind::Cif,
            _ => TaxIdKind::Dni,
        }
    }
}

/// Spanish DNI, NIE or CIF. `type` selects the variant; `auto` (default)
/// follows the shape of the original value.
pub struct TaxIdFaker;

impl Faker for TaxIdFaker {
    fn validate(
        &self,
        options: &FakerOptions,
        _registry: &FakerRegistry,
    ) -> Result<(), FakerError> {
        match option_str(options, "type") {
            Some(raw) if TaxIdKind::parse(raw).is_none() => Err(FakerError::invalid(
                "type",
                format!("expected auto, dni, nie or cif, got '{raw}'"),
            )),
            _ => Ok(()),
        }
    }

    fn generate(&self, ctx: &FakerContext<'_>, rng: &mut dyn RngCore) -> Result<Value, FakerError> {
        let requested = option_str(ctx.options, "type")
            .and_then(TaxIdKind::parse)
            .flatten();
        let kind = requested.unwrap_or_else(|| TaxIdKind::detect(ctx.original));
        let id = match kind {
            TaxIdKind::Dni => {
                let number = rng.random_range(0..100_000_000u32);
                format!("{number:08}{}", dni_letter(number))
            }
            TaxIdKind::Nie => {
                let prefix = rng.random_range(0..NIE_PREFIXES.len());
                let number = rng.random_range(0..10_000_000u32);
                let letter = dni_letter(prefix as u32 * 10_000_000 + number);
                format!("{}{number:07}{letter}", NIE_PREFIXES[prefix])
            }
            TaxIdKind::Cif => {
                let organisation = CIF_ORGANISATIONS
                    .chars()
                    .nth(rng.random_range(0..CIF_ORGANISATIONS.len()))
                    .unwrap_or('B');
                let body = digits(rng, 7);
                format!("{organisation}{body}{}", cif_control(organisation, &body))
            }
        };
        Ok(Value::String(id))
    }
}

pub fn dni_letter(number: u32) -> char {
    DNI_LETTERS[(number % 23) as usize] as char
}

pub fn cif_control(organisation: char, body: &str) -> char {
    let total: u32 = body
        .chars()
        .filter_map(|ch| ch.to_digit(10))
        .enumerate()
        .map(|(idx, digit)| {
            if idx % 2 == 0 {
                let doubled = digit * 2;
                doubled / 10 + doubled % 10
            } else {
                digit
            }
        })
        .sum();
    let control = (10 - total % 10) % 10;
    if "KPQSNW".contains(organisation) {
        CIF_CONTROL_LETTERS[control as usize] as char
    } else {
        char::from_digit(control, 10).unwrap_or('0')
    }
}
