// Copyright (c) 2018-2025  Brendan Molloy <brendan@bbqsrc.net>,
//                          Ilya Solovyiov <ilya.solovyiov@gmail.com>,
//                          Kai Ren <tyranron@gmail.com>
//
// Licensed under the Apache License, Version 2.0 <LICENSE-APACHE or
// http://www.apache.org/licenses/LICENSE-2.0> or the MIT license
// <LICENSE-MIT or http://opensource.org/licenses/MIT>, at your
// option. This file may not be copied, modified, or distributed
// except according to those terms.

//! Renderable near-miss suggestion reports.

use std::fmt;

use console::Style;

use crate::step::{category_name, Category};

/// One ranked suggestion of a [`Report`].
#[derive(Clone, Debug, Eq, PartialEq)]
pub struct Suggestion {
    /// Category the suggested expression is registered under.
    pub category: Category,

    /// The suggested expression text, as registered.
    pub expression: String,

    /// Edit distance to the unresolved step.
    pub distance: usize,
}

/// Ranked near-miss suggestions for one unresolved step.
#[derive(Clone, Debug)]
pub struct Report {
    /// Literal text of the unresolved step.
    pub step: String,

    /// Category the step was looked up under.
    pub category: Category,

    /// Suggestions registered under the step's own category, closest first.
    pub same: Vec<Suggestion>,

    /// Admitted suggestions from the other categories, closest first.
    pub other: Vec<Suggestion>,
}

impl Report {
    /// Indicates whether this [`Report`] carries no suggestions at all.
    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.same.is_empty() && self.other.is_empty()
    }

    /// All suggestions, same-category bucket first.
    pub fn suggestions(&self) -> impl Iterator<Item = &Suggestion> {
        self.same.iter().chain(&self.other)
    }

    /// Renders this [`Report`] with the given [`Styles`].
    #[must_use]
    pub fn render(&self, styles: &Styles) -> String {
        if self.is_empty() {
            return styles
                .heading("no registered step definitions to suggest from");
        }

        let mut out = styles.heading("did you mean:");
        for s in self.suggestions() {
            out.push_str("\n  ");
            out.push_str(
                &styles.category(&format!("{}:", category_name(s.category))),
            );
            out.push(' ');
            out.push_str(&styles.expression(&s.expression));
            if s.category != self.category {
                out.push_str(&styles.category(" (different category)"));
            }
        }
        out
    }
}

impl fmt::Display for Report {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.render(&Styles::none()))
    }
}

/// Terminal [`Style`]s of a rendered [`Report`].
#[derive(Clone, Debug)]
pub struct Styles {
    /// [`Style`] of the report heading.
    pub heading: Style,

    /// [`Style`] of category labels.
    pub category: Style,

    /// [`Style`] of suggested expressions.
    pub expression: Style,

    /// Indicates whether the styles are actually applied.
    pub is_present: bool,
}

impl Default for Styles {
    fn default() -> Self {
        Self {
            heading: Style::new().bold(),
            category: Style::new().green(),
            expression: Style::new().cyan(),
            is_present: console::colors_enabled(),
        }
    }
}

impl Styles {
    /// Creates [`Styles`] honoring the terminal's color support.
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    /// Creates no-op [`Styles`] passing text through unchanged.
    #[must_use]
    pub fn none() -> Self {
        Self { is_present: false, ..Self::default() }
    }

    /// Styles the report heading.
    #[must_use]
    pub fn heading(&self, text: &str) -> String {
        self.apply(&self.heading, text)
    }

    /// Styles a category label.
    #[must_use]
    pub fn category(&self, text: &str) -> String {
        self.apply(&self.category, text)
    }

    /// Styles a suggested expression.
    #[must_use]
    pub fn expression(&self, text: &str) -> String {
        self.apply(&self.expression, text)
    }

    fn apply(&self, style: &Style, text: &str) -> String {
        if self.is_present {
            style.apply_to(text).to_string()
        } else {
            text.to_owned()
        }
    }
}
