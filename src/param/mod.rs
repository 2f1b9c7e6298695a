// Copyright (c) 2018-2025  Brendan Molloy <brendan@bbqsrc.net>,
//                          Ilya Solovyiov <ilya.solovyiov@gmail.com>,
//                          Kai Ren <tyranron@gmail.com>
//
// Licensed under the Apache License, Version 2.0 <LICENSE-APACHE or
// http://www.apache.org/licenses/LICENSE-2.0> or the MIT license
// <LICENSE-MIT or http://opensource.org/licenses/MIT>, at your
// option. This file may not be copied, modified, or distributed
// except according to those terms.

//! Parameter type registry and the typed-argument pipeline.
//!
//! A [`ParameterType`] is a named, pattern-based value transformer usable
//! inside step expressions as `{name}`. At match time raw captures are
//! coerced via an optional [`Primitive`], wrapped via an optional
//! constructor, and finally passed through an optional transform that may
//! consult the current per-scenario state. The registry is an explicit,
//! constructor-injected instance per test run, never an ambient singleton.

pub mod primitive;
pub mod value;

use std::{cell::RefCell, collections::HashMap, rc::Rc};

pub use self::{
    primitive::{CoercionError, DatePhrases, NoDatePhrases, Primitive},
    value::Value,
};
use crate::{
    error::{DynError, Error},
    expression::{Extraction, PatternLookup},
};

/// Context handed to a [`ParameterType`] transform.
pub struct TransformContext<'a, S> {
    /// Raw captured substring the value originated from.
    pub raw: &'a str,

    /// Current per-scenario state, when a scenario scope is live.
    ///
    /// This is what lets a parameter type resolve against already-stored
    /// test state, e.g. mapping a display name to an id captured earlier
    /// in the scenario.
    pub world: Option<&'a Rc<RefCell<S>>>,
}

/// Alias for a boxed value constructor of a [`ParameterType`].
pub type ConstructFn = Box<dyn Fn(Value) -> Result<Value, DynError>>;

/// Alias for a boxed transform of a [`ParameterType`].
pub type TransformFn<S> =
    Box<dyn Fn(Value, &TransformContext<'_, S>) -> Result<Value, DynError>>;

/// Named, pattern-based value transformer referenced inside expressions as
/// `{name}`.
///
/// Registered once and immutable thereafter.
pub struct ParameterType<S> {
    /// Name the type is referenced by.
    name: String,

    /// Regex pattern alternatives a placeholder of this type matches.
    patterns: Vec<String>,

    /// Optional primitive coercion, applied element-wise to captures.
    primitive: Option<Primitive>,

    /// Optional wrapping constructor.
    construct: Option<ConstructFn>,

    /// Optional state-aware transform.
    transform: Option<TransformFn<S>>,
}

impl<S> ParameterType<S> {
    /// Creates a new [`ParameterType`] with the given `name` and regex
    /// `patterns`, passing captures through unchanged.
    #[must_use]
    pub fn new(
        name: impl Into<String>,
        patterns: impl IntoIterator<Item = impl Into<String>>,
    ) -> Self {
        Self {
            name: name.into(),
            patterns: patterns.into_iter().map(Into::into).collect(),
            primitive: None,
            construct: None,
            transform: None,
        }
    }

    /// Attaches a [`Primitive`] coercion.
    #[must_use]
    pub fn with_primitive(mut self, primitive: Primitive) -> Self {
        self.primitive = Some(primitive);
        self
    }

    /// Attaches a wrapping constructor.
    #[must_use]
    pub fn with_construct(
        mut self,
        construct: impl Fn(Value) -> Result<Value, DynError> + 'static,
    ) -> Self {
        self.construct = Some(Box::new(construct));
        self
    }

    /// Attaches a state-aware transform.
    #[must_use]
    pub fn with_transform(
        mut self,
        transform: impl Fn(Value, &TransformContext<'_, S>) -> Result<Value, DynError>
            + 'static,
    ) -> Self {
        self.transform = Some(Box::new(transform));
        self
    }

    /// Name this type is referenced by.
    #[must_use]
    pub fn name(&self) -> &str {
        &self.name
    }

    /// Regex pattern alternatives of this type.
    #[must_use]
    pub fn patterns(&self) -> &[String] {
        &self.patterns
    }

    /// Runs the full pipeline over an already-captured value.
    fn apply(
        &self,
        mut value: Value,
        cx: &TransformContext<'_, S>,
    ) -> Result<Value, Error> {
        let wrap = |source: DynError| Error::Transform {
            param: self.name.clone(),
            raw: cx.raw.to_owned(),
            source,
        };

        if let Some(primitive) = self.primitive {
            value = match value {
                Value::List(items) => items
                    .into_iter()
                    .map(|item| match item {
                        Value::Str(s) => primitive.coerce(&s),
                        other => Ok(other),
                    })
                    .collect::<Result<Vec<_>, _>>()
                    .map(Value::List)
                    .map_err(|e| wrap(Box::new(e)))?,
                Value::Str(s) => {
                    primitive.coerce(&s).map_err(|e| wrap(Box::new(e)))?
                }
                other => other,
            };
        }
        if let Some(construct) = &self.construct {
            value = construct(value).map_err(wrap)?;
        }
        if let Some(transform) = &self.transform {
            value = transform(value, cx).map_err(wrap)?;
        }
        Ok(value)
    }
}

/// Registry of [`ParameterType`]s for one test run.
///
/// Comes pre-populated with the `int`, `float`, `word`, `string`,
/// anonymous (`{}`) and `primitive` built-ins.
pub struct ParameterTypes<S> {
    /// Registered types, keyed by name.
    types: HashMap<String, ParameterType<S>>,

    /// Date-phrase collaborator consulted by the `primitive` built-in.
    dates: Rc<dyn DatePhrases>,
}

impl<S: 'static> Default for ParameterTypes<S> {
    fn default() -> Self {
        Self::new()
    }
}

impl<S: 'static> ParameterTypes<S> {
    /// Creates a registry holding the built-in types.
    #[must_use]
    pub fn new() -> Self {
        let mut this = Self {
            types: HashMap::new(),
            dates: Rc::new(NoDatePhrases),
        };
        this.install_builtins();
        this
    }

    /// Replaces the date-phrase collaborator consulted by the `primitive`
    /// built-in type.
    pub fn set_date_phrases(&mut self, dates: impl DatePhrases + 'static) {
        self.dates = Rc::new(dates);
        self.install_primitive();
    }

    /// Defines a new [`ParameterType`].
    ///
    /// # Errors
    ///
    /// If a type with the same name is already defined.
    pub fn define(&mut self, ty: ParameterType<S>) -> Result<(), Error> {
        if self.types.contains_key(ty.name()) {
            return Err(Error::DuplicateParameter { name: ty.name.clone() });
        }
        tracing::debug!(name = %ty.name, "defining parameter type");
        drop(self.types.insert(ty.name.clone(), ty));
        Ok(())
    }

    /// Looks up a [`ParameterType`] by name.
    #[must_use]
    pub fn get(&self, name: &str) -> Option<&ParameterType<S>> {
        self.types.get(name)
    }

    /// Materializes a typed [`Value`] out of one placeholder's captures.
    ///
    /// Extractions without a defined parameter type pass through as the raw
    /// capture (single string, or list for multiple capture groups).
    ///
    /// # Errors
    ///
    /// If the pipeline of the referenced parameter type fails.
    pub fn resolve(
        &self,
        extraction: &Extraction,
        world: Option<&Rc<RefCell<S>>>,
    ) -> Result<Value, Error> {
        let raw_value = if extraction.values.len() == 1 {
            Value::Str(extraction.values[0].clone())
        } else {
            Value::List(
                extraction
                    .values
                    .iter()
                    .cloned()
                    .map(Value::Str)
                    .collect(),
            )
        };

        let Some(ty) =
            extraction.param.as_deref().and_then(|name| self.get(name))
        else {
            return Ok(raw_value);
        };

        let cx = TransformContext { raw: &extraction.raw, world };
        ty.apply(raw_value, &cx)
    }

    /// Registers the built-in types.
    fn install_builtins(&mut self) {
        let mut add = |ty: ParameterType<S>| {
            drop(self.types.insert(ty.name.clone(), ty));
        };

        add(ParameterType::new("int", [r"[+-]?\d+"])
            .with_primitive(Primitive::Number));
        add(
            ParameterType::new(
                "float",
                [r"[+-]?\d*\.?\d+(?:[eE][+-]?\d+)?"],
            )
            .with_primitive(Primitive::Number),
        );
        add(ParameterType::new("word", [r"[^\s]+"]));
        add(
            ParameterType::new("string", [r#""[^"]*"|'[^']*'"#])
                .with_construct(|value| match value {
                    Value::Str(s) => Ok(Value::Str(
                        s.trim_matches(|c| c == '\'' || c == '"').to_owned(),
                    )),
                    other => Ok(other),
                }),
        );
        add(ParameterType::new("", [r".*"]));
        self.install_primitive();
    }

    /// (Re-)registers the `primitive` built-in against the current
    /// date-phrase collaborator.
    fn install_primitive(&mut self) {
        let dates = Rc::clone(&self.dates);
        let ty = ParameterType::new(
            "primitive",
            [r#""[^"]*"|'[^']*'|[^\s]+"#],
        )
        .with_transform(move |_, cx: &TransformContext<'_, S>| {
            Ok(primitive::free_parse(cx.raw, &*dates))
        });
        drop(self.types.insert(ty.name.clone(), ty));
    }
}

impl<S> PatternLookup for ParameterTypes<S> {
    fn patterns(&self, name: &str) -> Option<&[String]> {
        self.types.get(name).map(|ty| ty.patterns())
    }
}
