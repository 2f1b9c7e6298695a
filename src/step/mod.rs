// Copyright (c) 2018-2025  Brendan Molloy <brendan@bbqsrc.net>,
//                          Ilya Solovyiov <ilya.solovyiov@gmail.com>,
//                          Kai Ren <tyranron@gmail.com>
//
// Licensed under the Apache License, Version 2.0 <LICENSE-APACHE or
// http://www.apache.org/licenses/LICENSE-2.0> or the MIT license
// <LICENSE-MIT or http://opensource.org/licenses/MIT>, at your
// option. This file may not be copied, modified, or distributed
// except according to those terms.

//! Step definitions, their arguments and the lookup [`Cache`].

pub mod cache;
pub mod table;

use std::{fmt, rc::Rc, str::FromStr};

use derive_more::Display;
use futures::future::LocalBoxFuture;

pub use self::{
    cache::Cache,
    table::{DataTable, TableShape},
};
use crate::{
    error::DynError,
    expression::MatchExtractor,
    param::Value,
    scope::{ScopePayload, Worlds},
};

/// Category a step definition is registered under.
///
/// `And`/`But` steps inherit the category of the step preceding them, so
/// only these three exist at lookup time.
pub type Category = gherkin::StepType;

/// Lowercase display name of a [`Category`].
#[must_use]
pub fn category_name(ty: Category) -> &'static str {
    match ty {
        Category::Given => "given",
        Category::When => "when",
        Category::Then => "then",
    }
}

/// Literal keyword of a step line.
#[derive(Clone, Copy, Debug, Display, Eq, Hash, PartialEq)]
pub enum Keyword {
    /// `Given` keyword.
    #[display("Given")]
    Given,

    /// `When` keyword.
    #[display("When")]
    When,

    /// `Then` keyword.
    #[display("Then")]
    Then,

    /// `And` keyword, inheriting the preceding step's [`Category`].
    #[display("And")]
    And,

    /// `But` keyword, inheriting the preceding step's [`Category`].
    #[display("But")]
    But,
}

impl Keyword {
    /// Resolves this [`Keyword`] into a lookup [`Category`], carrying the
    /// preceding step's category for `And`/`But`.
    ///
    /// Returns [`None`] for a leading `And`/`But` with no step before it.
    #[must_use]
    pub fn category(self, previous: Option<Category>) -> Option<Category> {
        match self {
            Self::Given => Some(Category::Given),
            Self::When => Some(Category::When),
            Self::Then => Some(Category::Then),
            Self::And | Self::But => previous,
        }
    }
}

impl From<Category> for Keyword {
    fn from(ty: Category) -> Self {
        match ty {
            Category::Given => Self::Given,
            Category::When => Self::When,
            Category::Then => Self::Then,
        }
    }
}

/// Error of parsing a [`Keyword`] from a step line.
#[derive(Clone, Debug, Display)]
#[display("unknown step keyword `{_0}`")]
pub struct UnknownKeyword(pub String);

impl std::error::Error for UnknownKeyword {}

impl FromStr for Keyword {
    type Err = UnknownKeyword;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.trim() {
            "Given" => Ok(Self::Given),
            "When" => Ok(Self::When),
            "Then" => Ok(Self::Then),
            "And" => Ok(Self::And),
            "But" => Ok(Self::But),
            other => Err(UnknownKeyword(other.to_owned())),
        }
    }
}

/// Arguments materialized for one bound step invocation.
#[derive(Clone, Debug, Default)]
pub struct StepArgs {
    /// Typed values of the expression's placeholders, in match order.
    pub values: Vec<Value>,

    /// Attached data table, if the step carries one.
    pub table: Option<DataTable>,

    /// Attached docstring, if the step carries one.
    pub docstring: Option<String>,
}

/// Alias for a step handler callback.
pub type StepFn<W> = Rc<
    dyn Fn(
        ScopePayload<W>,
        StepArgs,
    ) -> LocalBoxFuture<'static, Result<(), DynError>>,
>;

/// A registered step definition: matching strategy, declared table shape
/// and handler.
pub struct StepDef<W: Worlds> {
    /// Category this definition is looked up under.
    ty: Category,

    /// Keyword this definition was registered with.
    ///
    /// Diagnostics metadata only: `And`/`But` registrations still match
    /// under the [`Category`] they resolve to.
    keyword: Keyword,

    /// Matching strategy over literal step text.
    matcher: Box<dyn MatchExtractor>,

    /// Declared shape of the attached table, if the step requires one.
    shape: Option<TableShape>,

    /// Handler invoked once the step is bound.
    handler: StepFn<W>,
}

impl<W: Worlds> fmt::Debug for StepDef<W> {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("StepDef")
            .field("ty", &self.ty)
            .field("expression", &self.matcher.source())
            .field("shape", &self.shape)
            .finish_non_exhaustive()
    }
}

impl<W: Worlds> StepDef<W> {
    /// Creates a [`StepDef`] for the given [`Category`].
    pub fn new(
        ty: Category,
        matcher: impl MatchExtractor + 'static,
        handler: impl Fn(
                ScopePayload<W>,
                StepArgs,
            ) -> LocalBoxFuture<'static, Result<(), DynError>>
            + 'static,
    ) -> Self {
        Self {
            ty,
            keyword: ty.into(),
            matcher: Box::new(matcher),
            shape: None,
            handler: Rc::new(handler),
        }
    }

    /// Creates a `Given` [`StepDef`].
    pub fn given(
        matcher: impl MatchExtractor + 'static,
        handler: impl Fn(
                ScopePayload<W>,
                StepArgs,
            ) -> LocalBoxFuture<'static, Result<(), DynError>>
            + 'static,
    ) -> Self {
        Self::new(Category::Given, matcher, handler)
    }

    /// Creates a `When` [`StepDef`].
    pub fn when(
        matcher: impl MatchExtractor + 'static,
        handler: impl Fn(
                ScopePayload<W>,
                StepArgs,
            ) -> LocalBoxFuture<'static, Result<(), DynError>>
            + 'static,
    ) -> Self {
        Self::new(Category::When, matcher, handler)
    }

    /// Creates a `Then` [`StepDef`].
    pub fn then(
        matcher: impl MatchExtractor + 'static,
        handler: impl Fn(
                ScopePayload<W>,
                StepArgs,
            ) -> LocalBoxFuture<'static, Result<(), DynError>>
            + 'static,
    ) -> Self {
        Self::new(Category::Then, matcher, handler)
    }

    /// Declares the [`TableShape`] this step's attached table must satisfy.
    #[must_use]
    pub fn with_table(mut self, shape: TableShape) -> Self {
        self.shape = Some(shape);
        self
    }

    /// Records the literal [`Keyword`] this definition was registered
    /// with, e.g. `And` continuing a previous `Given`.
    #[must_use]
    pub fn with_keyword(mut self, keyword: Keyword) -> Self {
        self.keyword = keyword;
        self
    }

    /// Category this definition is looked up under.
    #[must_use]
    pub fn ty(&self) -> Category {
        self.ty
    }

    /// Keyword this definition was registered with.
    #[must_use]
    pub fn keyword(&self) -> Keyword {
        self.keyword
    }

    /// Original expression (or regex) text of the matcher.
    #[must_use]
    pub fn expression(&self) -> &str {
        self.matcher.source()
    }

    /// Matching strategy of this definition.
    #[must_use]
    pub fn matcher(&self) -> &dyn MatchExtractor {
        &*self.matcher
    }

    /// Declared table shape, if any.
    #[must_use]
    pub fn shape(&self) -> Option<TableShape> {
        self.shape
    }

    /// Handler of this definition.
    #[must_use]
    pub fn handler(&self) -> StepFn<W> {
        Rc::clone(&self.handler)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn keywords_parse_and_resolve() {
        let kw: Keyword = " And ".parse().unwrap();
        assert_eq!(kw, Keyword::And);
        assert_eq!(kw.category(Some(Category::Given)), Some(Category::Given));
        assert_eq!(kw.category(None), None);
        assert_eq!(
            Keyword::Then.category(Some(Category::Given)),
            Some(Category::Then),
        );

        assert!(matches!(
            "Whenever".parse::<Keyword>(),
            Err(UnknownKeyword(s)) if s == "Whenever",
        ));
    }

    #[test]
    fn category_names_are_lowercase() {
        assert_eq!(category_name(Category::Given), "given");
        assert_eq!(category_name(Category::Then), "then");
        assert_eq!(Keyword::from(Category::When), Keyword::When);
    }
}
