// Copyright (c) 2018-2025  Brendan Molloy <brendan@bbqsrc.net>,
//                          Ilya Solovyiov <ilya.solovyiov@gmail.com>,
//                          Kai Ren <tyranron@gmail.com>
//
// Licensed under the Apache License, Version 2.0 <LICENSE-APACHE or
// http://www.apache.org/licenses/LICENSE-2.0> or the MIT license
// <LICENSE-MIT or http://opensource.org/licenses/MIT>, at your
// option. This file may not be copied, modified, or distributed
// except according to those terms.

//! Step definition lookup cache.

use std::{collections::HashMap, fmt};

use lazy_regex::regex;

use super::{Category, StepDef};
use crate::{expression::Extraction, scope::Worlds};

/// In-memory [`StepDef`] lookup cache, bucketed by [`Category`].
///
/// Definitions are kept in registration order within their bucket; when
/// several match the same step text, the first registered one wins.
pub struct Cache<W: Worlds> {
    /// `Given` definitions, in registration order.
    given: Vec<StepDef<W>>,

    /// `When` definitions, in registration order.
    when: Vec<StepDef<W>>,

    /// `Then` definitions, in registration order.
    then: Vec<StepDef<W>>,
}

impl<W: Worlds> fmt::Debug for Cache<W> {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("Cache")
            .field("given", &self.given.len())
            .field("when", &self.when.len())
            .field("then", &self.then.len())
            .finish()
    }
}

impl<W: Worlds> Default for Cache<W> {
    fn default() -> Self {
        Self { given: Vec::new(), when: Vec::new(), then: Vec::new() }
    }
}

impl<W: Worlds> Cache<W> {
    /// Creates an empty [`Cache`].
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    /// Registers a [`StepDef`] under its category.
    pub fn register(&mut self, def: StepDef<W>) {
        tracing::debug!(
            category = super::category_name(def.ty()),
            expression = def.expression(),
            "registering step definition",
        );
        self.bucket_mut(def.ty()).push(def);
    }

    /// Definitions of the given [`Category`], in registration order.
    #[must_use]
    pub fn defs(&self, ty: Category) -> &[StepDef<W>] {
        match ty {
            Category::Given => &self.given,
            Category::When => &self.when,
            Category::Then => &self.then,
        }
    }

    /// All definitions, `Given` bucket first, registration order within
    /// each.
    pub fn iter(&self) -> impl Iterator<Item = &StepDef<W>> {
        self.given.iter().chain(&self.when).chain(&self.then)
    }

    /// Total number of registered definitions.
    #[must_use]
    pub fn len(&self) -> usize {
        self.given.len() + self.when.len() + self.then.len()
    }

    /// Indicates whether no definitions are registered.
    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }

    /// Finds the first registered definition of the given [`Category`]
    /// structurally matching `text`, along with its captures.
    #[must_use]
    pub fn find(
        &self,
        ty: Category,
        text: &str,
    ) -> Option<(&StepDef<W>, Vec<Extraction>)> {
        self.defs(ty)
            .iter()
            .find_map(|def| def.matcher().extract(text).map(|e| (def, e)))
    }

    /// [`find()`] over step text still carrying `<column>` templates,
    /// substituted from the given examples row first.
    ///
    /// Templates naming a column absent from `row` are left untouched.
    ///
    /// [`find()`]: Self::find
    #[must_use]
    pub fn find_by_example(
        &self,
        ty: Category,
        text: &str,
        row: &HashMap<String, String>,
    ) -> Option<(&StepDef<W>, Vec<Extraction>)> {
        let substituted = regex!(r"<([^>\s]+)>").replace_all(text, |c: &regex::Captures<'_>| {
            row.get(&c[1]).cloned().unwrap_or_else(|| c[0].to_owned())
        });
        self.find(ty, &substituted)
    }

    fn bucket_mut(&mut self, ty: Category) -> &mut Vec<StepDef<W>> {
        match ty {
            Category::Given => &mut self.given,
            Category::When => &mut self.when,
            Category::Then => &mut self.then,
        }
    }
}

#[cfg(test)]
mod tests {
    use futures::FutureExt as _;

    use super::*;
    use crate::{expression::CompiledExpression, param::ParameterTypes};

    type Defs = StepDef<()>;

    fn def(ty: Category, expr: &str) -> Defs {
        let types = ParameterTypes::<()>::new();
        StepDef::new(
            ty,
            CompiledExpression::compile(expr, &types).unwrap(),
            |_, _| async { Ok(()) }.boxed_local(),
        )
    }

    #[test]
    fn finds_within_category_only() {
        let mut cache = Cache::new();
        cache.register(def(Category::Given, "a ripe banana"));

        assert!(cache.find(Category::Given, "a ripe banana").is_some());
        assert!(cache.find(Category::When, "a ripe banana").is_none());
        assert_eq!(cache.len(), 1);
    }

    #[test]
    fn first_registered_definition_wins() {
        let mut cache = Cache::new();
        cache.register(def(Category::When, "I eat {int} apples"));
        cache.register(def(Category::When, "I eat {} apples"));

        let (found, extractions) =
            cache.find(Category::When, "I eat 3 apples").unwrap();
        assert_eq!(found.expression(), "I eat {int} apples");
        assert_eq!(extractions[0].values, ["3"]);
    }

    #[test]
    fn example_templates_are_substituted_before_lookup() {
        let mut cache = Cache::new();
        cache.register(def(Category::When, "I eat {int} apples"));

        let row = HashMap::from([("count".to_owned(), "3".to_owned())]);
        let (_, extractions) = cache
            .find_by_example(Category::When, "I eat <count> apples", &row)
            .unwrap();
        assert_eq!(extractions[0].values, ["3"]);

        // A template naming an absent column is left as-is and fails to
        // match the numeric placeholder.
        let empty = HashMap::new();
        assert!(cache
            .find_by_example(Category::When, "I eat <count> apples", &empty)
            .is_none());
    }
}
