// Copyright (c) 2018-2025  Brendan Molloy <brendan@bbqsrc.net>,
//                          Ilya Solovyiov <ilya.solovyiov@gmail.com>,
//                          Kai Ren <tyranron@gmail.com>
//
// Licensed under the Apache License, Version 2.0 <LICENSE-APACHE or
// http://www.apache.org/licenses/LICENSE-2.0> or the MIT license
// <LICENSE-MIT or http://opensource.org/licenses/MIT>, at your
// option. This file may not be copied, modified, or distributed
// except according to those terms.

//! Primitive coercions and the free-parse cascade of the built-in
//! `primitive` parameter type.

use std::time::SystemTime;

use derive_more::Display;
use lazy_regex::{regex, regex_captures, regex_is_match};
use once_cell::sync::Lazy;
use regex::Regex;

use super::Value;

/// Primitive coercion applied to raw captures before construction and
/// transformation.
#[derive(Clone, Copy, Debug, Display, Eq, PartialEq)]
pub enum Primitive {
    /// Keeps the capture as a [`Value::Str`].
    #[display("string")]
    String,

    /// Parses the capture as an integer or float, tolerating `1,000.50`
    /// style comma grouping.
    #[display("number")]
    Number,

    /// Parses the capture as a boolean, accepting the domain synonyms
    /// `yes`/`no`, `enabled`/`disabled`, `active`/`inactive` and `on`/`off`.
    #[display("boolean")]
    Boolean,

    /// Parses the capture as an [`i128`].
    #[display("bigint")]
    BigInt,

    /// Parses the capture as an ISO date or datetime.
    #[display("date")]
    Date,
}

/// Error of a failed [`Primitive`] coercion.
#[derive(Debug, Display)]
#[display("cannot coerce `{raw}` into a {primitive}")]
pub struct CoercionError {
    /// Coercion that failed.
    pub primitive: Primitive,

    /// Raw token that did not parse.
    pub raw: String,
}

impl std::error::Error for CoercionError {}

impl Primitive {
    /// Coerces a single raw token into a typed [`Value`].
    ///
    /// # Errors
    ///
    /// If the token does not parse as this [`Primitive`].
    pub fn coerce(self, raw: &str) -> Result<Value, CoercionError> {
        let fail = || CoercionError { primitive: self, raw: raw.to_owned() };
        match self {
            Self::String => Ok(Value::Str(raw.to_owned())),
            Self::Number => parse_number(raw).ok_or_else(fail),
            Self::Boolean => parse_bool(raw).map(Value::Bool).ok_or_else(fail),
            Self::BigInt => raw
                .trim()
                .replace(',', "")
                .parse::<i128>()
                .map(Value::BigInt)
                .map_err(|_| fail()),
            Self::Date => parse_iso(raw).map(Value::Timestamp).ok_or_else(fail),
        }
    }
}

/// Collaborator resolving natural-language date phrases.
///
/// Phrase parsing itself lives outside this engine; embedders plug their
/// implementation into [`ParameterTypes::set_date_phrases()`].
///
/// [`ParameterTypes::set_date_phrases()`]: super::ParameterTypes::set_date_phrases
pub trait DatePhrases {
    /// Parses a phrase like "next Tuesday" into a point in time, if the
    /// phrase is recognized.
    fn parse(&self, phrase: &str) -> Option<SystemTime>;
}

/// Default [`DatePhrases`] implementation recognizing nothing.
#[derive(Clone, Copy, Debug, Default)]
pub struct NoDatePhrases;

impl DatePhrases for NoDatePhrases {
    fn parse(&self, _: &str) -> Option<SystemTime> {
        None
    }
}

/// Free-parses a token through the ordered cascade of the built-in
/// `primitive` parameter type.
///
/// The cascade is: absence keywords, boolean keywords (including domain
/// synonyms), `NaN`/`Infinity`, ISO dates, comma-grouped numerics, quoted
/// strings, natural-language date phrases, and finally the literal string.
#[must_use]
pub fn free_parse(token: &str, dates: &dyn DatePhrases) -> Value {
    let trimmed = token.trim();

    if regex_is_match!(r"(?i)^(null|undefined|missing)$", trimmed) {
        return Value::Null;
    }
    if let Some(b) = parse_bool(trimmed) {
        return Value::Bool(b);
    }
    if regex_is_match!(r"^NaN$", trimmed) {
        return Value::Float(f64::NAN);
    }
    if let Some((_, sign)) = regex_captures!(r"^([+-]?)Infinity$", trimmed) {
        return Value::Float(if sign == "-" {
            f64::NEG_INFINITY
        } else {
            f64::INFINITY
        });
    }
    if let Some(t) = parse_iso(trimmed) {
        return Value::Timestamp(t);
    }
    if let Some(n) = parse_number(trimmed) {
        return n;
    }
    if let Some((_, single, double)) =
        regex_captures!(r#"^'([^']*)'$|^"([^"]*)"$"#, trimmed)
    {
        // Quoting forces the token to stay a string.
        let inner = if single.is_empty() && !double.is_empty() {
            double
        } else {
            single
        };
        return Value::Str(inner.to_owned());
    }
    if let Some(t) = dates.parse(trimmed) {
        return Value::Timestamp(t);
    }
    Value::Str(token.to_owned())
}

/// Parses boolean keywords, including the domain synonyms.
fn parse_bool(token: &str) -> Option<bool> {
    if regex_is_match!(r"(?i)^(true|yes|enabled|active|on)$", token) {
        Some(true)
    } else if regex_is_match!(r"(?i)^(false|no|disabled|inactive|off)$", token)
    {
        Some(false)
    } else {
        None
    }
}

/// Parses plain or comma-grouped numeric tokens into [`Value::Int`],
/// [`Value::BigInt`] or [`Value::Float`].
fn parse_number(token: &str) -> Option<Value> {
    /// Matches `1000`, `1,000.50`, `-3.5`, `.5` and scientific notation.
    static NUMERIC: &Lazy<Regex> = regex!(
        r"^[+-]?(?:\d{1,3}(?:,\d{3})+|\d+)?(?:\.\d+)?(?:[eE][+-]?\d+)?$"
    );

    let trimmed = token.trim();
    if trimmed.is_empty() || !NUMERIC.is_match(trimmed) {
        return None;
    }
    let plain = trimmed.replace(',', "");
    if let Ok(i) = plain.parse::<i64>() {
        return Some(Value::Int(i));
    }
    if let Ok(i) = plain.parse::<i128>() {
        return Some(Value::BigInt(i));
    }
    plain.parse::<f64>().ok().map(Value::Float)
}

/// Parses ISO `YYYY-MM-DD` dates and RFC 3339-ish datetimes.
fn parse_iso(token: &str) -> Option<SystemTime> {
    if regex_is_match!(r"^\d{4}-\d{2}-\d{2}$", token) {
        return humantime::parse_rfc3339_weak(&format!("{token} 00:00:00"))
            .ok();
    }
    if regex_is_match!(r"^\d{4}-\d{2}-\d{2}[T ]\d{2}:\d{2}(:\d{2})?", token) {
        let normalized = token.replace('T', " ");
        return humantime::parse_rfc3339_weak(&normalized)
            .or_else(|_| {
                humantime::parse_rfc3339_weak(&format!("{normalized}:00"))
            })
            .ok();
    }
    None
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn number_coercion_handles_comma_grouping() {
        assert_eq!(
            Primitive::Number.coerce("1,000.50").unwrap(),
            Value::Float(1000.5),
        );
        assert_eq!(Primitive::Number.coerce("42").unwrap(), Value::Int(42));
        assert!(Primitive::Number.coerce("banana").is_err());
    }

    #[test]
    fn boolean_coercion_accepts_domain_synonyms() {
        for token in ["active", "enabled", "on", "yes", "TRUE"] {
            assert_eq!(
                Primitive::Boolean.coerce(token).unwrap(),
                Value::Bool(true),
                "{token}",
            );
        }
        for token in ["inactive", "disabled", "off", "no", "False"] {
            assert_eq!(
                Primitive::Boolean.coerce(token).unwrap(),
                Value::Bool(false),
                "{token}",
            );
        }
        assert!(Primitive::Boolean.coerce("maybe").is_err());
    }

    #[test]
    fn cascade_prefers_earlier_rules() {
        let dates = NoDatePhrases;
        assert_eq!(free_parse("null", &dates), Value::Null);
        assert_eq!(free_parse("undefined", &dates), Value::Null);
        assert_eq!(free_parse("off", &dates), Value::Bool(false));
        assert_eq!(free_parse("1,234", &dates), Value::Int(1234));
        assert_eq!(free_parse("-2.5", &dates), Value::Float(-2.5));
        assert_eq!(free_parse("'42'", &dates), Value::Str("42".into()));
        assert_eq!(free_parse("\"on\"", &dates), Value::Str("on".into()));
        assert_eq!(free_parse("banana", &dates), Value::Str("banana".into()));
    }

    #[test]
    fn cascade_parses_specials_and_dates() {
        let dates = NoDatePhrases;
        assert!(matches!(
            free_parse("NaN", &dates),
            Value::Float(f) if f.is_nan(),
        ));
        assert_eq!(free_parse("Infinity", &dates), Value::Float(f64::INFINITY));
        assert_eq!(
            free_parse("-Infinity", &dates),
            Value::Float(f64::NEG_INFINITY),
        );
        assert!(matches!(
            free_parse("2024-02-29", &dates),
            Value::Timestamp(_),
        ));
        assert!(matches!(
            free_parse("2024-02-29T12:30:00", &dates),
            Value::Timestamp(_),
        ));
    }

    #[test]
    fn big_integers_widen_instead_of_failing() {
        let huge = "170141183460469231731687303715884105";
        assert!(matches!(
            free_parse(huge, &NoDatePhrases),
            Value::BigInt(_),
        ));
    }

    #[test]
    fn date_phrase_collaborator_is_consulted_last() {
        struct Tomorrow;
        impl DatePhrases for Tomorrow {
            fn parse(&self, phrase: &str) -> Option<SystemTime> {
                (phrase == "tomorrow").then(SystemTime::now)
            }
        }

        assert!(matches!(
            free_parse("tomorrow", &Tomorrow),
            Value::Timestamp(_),
        ));
        // Quoted phrases stay strings, the hook never sees them.
        assert_eq!(
            free_parse("'tomorrow'", &Tomorrow),
            Value::Str("tomorrow".into()),
        );
    }
}
