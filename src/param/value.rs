// Copyright (c) 2018-2025  Brendan Molloy <brendan@bbqsrc.net>,
//                          Ilya Solovyiov <ilya.solovyiov@gmail.com>,
//                          Kai Ren <tyranron@gmail.com>
//
// Licensed under the Apache License, Version 2.0 <LICENSE-APACHE or
// http://www.apache.org/licenses/LICENSE-2.0> or the MIT license
// <LICENSE-MIT or http://opensource.org/licenses/MIT>, at your
// option. This file may not be copied, modified, or distributed
// except according to those terms.

//! Dynamically typed step argument values.

use std::time::SystemTime;

use derive_more::{Display, From};
use itertools::Itertools as _;

/// Typed value produced by the parameter-type pipeline.
///
/// Captured substrings start out as [`Value::Str`] (or a [`Value::List`]
/// when a placeholder owns multiple capture groups) and are narrowed by
/// [`Primitive`] coercions, constructors and transforms.
///
/// [`Primitive`]: crate::param::Primitive
#[derive(Clone, Debug, Display, From, PartialEq)]
pub enum Value {
    /// Absent value (`null`, `undefined`, `missing`).
    #[display("null")]
    Null,

    /// Boolean value.
    Bool(bool),

    /// Signed 64-bit integer.
    Int(i64),

    /// Arbitrary-precision-ish integer for tokens exceeding [`i64`].
    BigInt(i128),

    /// Floating point number.
    Float(f64),

    /// Plain string.
    Str(String),

    /// Point in time parsed from an ISO date/datetime or a date phrase.
    #[display("{_0:?}")]
    #[from(ignore)]
    Timestamp(SystemTime),

    /// Multiple captures of a single placeholder.
    #[display("[{}]", _0.iter().join(", "))]
    #[from(ignore)]
    List(Vec<Value>),
}

impl From<&str> for Value {
    fn from(s: &str) -> Self {
        Self::Str(s.to_owned())
    }
}

impl Value {
    /// Returns the underlying string, if this is a [`Value::Str`].
    #[must_use]
    pub fn as_str(&self) -> Option<&str> {
        match self {
            Self::Str(s) => Some(s),
            _ => None,
        }
    }

    /// Returns the underlying integer, if this is a [`Value::Int`].
    #[must_use]
    pub fn as_int(&self) -> Option<i64> {
        match self {
            Self::Int(i) => Some(*i),
            _ => None,
        }
    }

    /// Returns this value as an [`f64`], widening integers.
    #[must_use]
    pub fn as_float(&self) -> Option<f64> {
        match self {
            Self::Float(f) => Some(*f),
            #[allow(clippy::cast_precision_loss)]
            Self::Int(i) => Some(*i as f64),
            _ => None,
        }
    }

    /// Returns the underlying boolean, if this is a [`Value::Bool`].
    #[must_use]
    pub fn as_bool(&self) -> Option<bool> {
        match self {
            Self::Bool(b) => Some(*b),
            _ => None,
        }
    }

    /// Returns the underlying timestamp, if this is a [`Value::Timestamp`].
    #[must_use]
    pub fn as_timestamp(&self) -> Option<SystemTime> {
        match self {
            Self::Timestamp(t) => Some(*t),
            _ => None,
        }
    }

    /// Indicates whether this value is [`Value::Null`].
    #[must_use]
    pub fn is_null(&self) -> bool {
        matches!(self, Self::Null)
    }
}
