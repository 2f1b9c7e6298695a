// Copyright (c) 2018-2025  Brendan Molloy <brendan@bbqsrc.net>,
//                          Ilya Solovyiov <ilya.solovyiov@gmail.com>,
//                          Kai Ren <tyranron@gmail.com>
//
// Licensed under the Apache License, Version 2.0 <LICENSE-APACHE or
// http://www.apache.org/licenses/LICENSE-2.0> or the MIT license
// <LICENSE-MIT or http://opensource.org/licenses/MIT>, at your
// option. This file may not be copied, modified, or distributed
// except according to those terms.

//! Compiled step expressions and capture extraction strategies.
//!
//! A step definition matches literal step text through a [`MatchExtractor`]
//! strategy selected by its shape: [`CompiledExpression`] for
//! `{placeholder}`-style expressions, [`RegexMatcher`] for raw regexes.
//! No shared library internals are patched to make extraction work.

use regex::Regex;

use crate::error::Error;

/// Source of placeholder patterns for expression compilation.
///
/// Implemented by [`ParameterTypes`], which the compiler only needs for
/// `{name}` pattern lookup, never for transforms.
///
/// [`ParameterTypes`]: crate::param::ParameterTypes
pub trait PatternLookup {
    /// Returns the regex pattern alternatives of the parameter type `name`.
    fn patterns(&self, name: &str) -> Option<&[String]>;
}

/// One placeholder's (or capture group's) raw match.
#[derive(Clone, Debug, Eq, PartialEq)]
pub struct Extraction {
    /// Parameter type name the capture belongs to, if any.
    pub param: Option<String>,

    /// Whole raw substring consumed by the placeholder.
    pub raw: String,

    /// Captured values: one for a plain placeholder, several when the
    /// placeholder's pattern has capture groups of its own.
    pub values: Vec<String>,
}

/// Strategy turning literal step text into captured arguments.
pub trait MatchExtractor {
    /// Original expression text, used by the fuzzy matcher and diagnostics.
    fn source(&self) -> &str;

    /// Tests whether the given literal text matches structurally.
    fn is_match(&self, text: &str) -> bool;

    /// Extracts captures from the given literal text, or [`None`] if it
    /// does not match.
    fn extract(&self, text: &str) -> Option<Vec<Extraction>>;
}

/// One `{name}` placeholder of a [`CompiledExpression`].
#[derive(Clone, Debug)]
struct Slot {
    /// Parameter type name, [`None`] for the anonymous `{}` placeholder.
    param: Option<String>,

    /// Index of the regex group wrapping the whole placeholder.
    group: usize,

    /// Number of capture groups the placeholder's own patterns contribute.
    inner: usize,
}

/// Step expression compiled against a parameter type registry.
///
/// `I eat {int} {word}s` compiles into an anchored [`Regex`] whose capture
/// groups are wired back to the referenced parameter types.
#[derive(Clone, Debug)]
pub struct CompiledExpression {
    /// Original expression text.
    source: String,

    /// Compiled anchored regex.
    regex: Regex,

    /// Placeholders in match order.
    slots: Vec<Slot>,
}

impl CompiledExpression {
    /// Compiles an expression, resolving each `{name}` placeholder through
    /// the given registry. `\{` and `\}` escape literal braces.
    ///
    /// # Errors
    ///
    /// If the expression references an undefined parameter type, or the
    /// resulting regex fails to compile.
    pub fn compile(
        source: &str,
        types: &dyn PatternLookup,
    ) -> Result<Self, Error> {
        let mut pattern = String::from('^');
        let mut literal = String::new();
        let mut slots = Vec::new();
        let mut groups = 0;

        let mut chars = source.chars().peekable();
        while let Some(c) = chars.next() {
            match c {
                '\\' if matches!(chars.peek(), Some('{' | '}')) => {
                    // PANIC: Peeked right above.
                    #[allow(clippy::unwrap_used)]
                    literal.push(chars.next().unwrap());
                }
                '{' => {
                    let mut name = String::new();
                    let mut closed = false;
                    for c in chars.by_ref() {
                        if c == '}' {
                            closed = true;
                            break;
                        }
                        name.push(c);
                    }
                    if !closed {
                        // Unterminated brace: treat as literal.
                        literal.push('{');
                        literal.push_str(&name);
                        continue;
                    }

                    pattern.push_str(&regex::escape(&literal));
                    literal.clear();

                    let alternatives = types
                        .patterns(&name)
                        .ok_or_else(|| Error::UnknownParameter {
                            name: name.clone(),
                        })?
                        .join("|");
                    let inner = count_capture_groups(&alternatives);

                    pattern.push('(');
                    pattern.push_str(&alternatives);
                    pattern.push(')');

                    groups += 1;
                    slots.push(Slot {
                        param: (!name.is_empty()).then_some(name),
                        group: groups,
                        inner,
                    });
                    groups += inner;
                }
                c => literal.push(c),
            }
        }
        pattern.push_str(&regex::escape(&literal));
        pattern.push('$');

        let regex =
            Regex::new(&pattern).map_err(|e| Error::InvalidExpression {
                expression: source.to_owned(),
                source: Box::new(e),
            })?;

        Ok(Self { source: source.to_owned(), regex, slots })
    }
}

impl MatchExtractor for CompiledExpression {
    fn source(&self) -> &str {
        &self.source
    }

    fn is_match(&self, text: &str) -> bool {
        self.regex.is_match(text)
    }

    fn extract(&self, text: &str) -> Option<Vec<Extraction>> {
        let caps = self.regex.captures(text)?;
        Some(
            self.slots
                .iter()
                .map(|slot| {
                    let raw = caps
                        .get(slot.group)
                        .map_or("", |m| m.as_str())
                        .to_owned();
                    let inner: Vec<_> = (slot.group + 1
                        ..=slot.group + slot.inner)
                        .filter_map(|i| caps.get(i))
                        .map(|m| m.as_str().to_owned())
                        .collect();
                    let values =
                        if inner.is_empty() { vec![raw.clone()] } else { inner };
                    Extraction { param: slot.param.clone(), raw, values }
                })
                .collect(),
        )
    }
}

/// Raw-regex matching strategy for step definitions registered with a
/// hand-written [`Regex`].
#[derive(Clone, Debug)]
pub struct RegexMatcher {
    /// The regex as registered.
    regex: Regex,

    /// Group names, indexed by group number (entry 0 is the whole match).
    names: Vec<Option<String>>,
}

impl RegexMatcher {
    /// Wraps a [`Regex`] into a [`MatchExtractor`].
    #[must_use]
    pub fn new(regex: Regex) -> Self {
        let names = regex
            .capture_names()
            .map(|n| n.map(ToOwned::to_owned))
            .collect();
        Self { regex, names }
    }
}

impl MatchExtractor for RegexMatcher {
    fn source(&self) -> &str {
        self.regex.as_str()
    }

    fn is_match(&self, text: &str) -> bool {
        self.regex.is_match(text)
    }

    fn extract(&self, text: &str) -> Option<Vec<Extraction>> {
        let caps = self.regex.captures(text)?;
        Some(
            (1..caps.len())
                .map(|i| {
                    let raw =
                        caps.get(i).map_or("", |m| m.as_str()).to_owned();
                    Extraction {
                        param: self.names.get(i).cloned().flatten(),
                        values: vec![raw.clone()],
                        raw,
                    }
                })
                .collect(),
        )
    }
}

/// Counts capturing groups of a regex pattern, skipping non-capturing and
/// look-around groups, escaped parens and character classes.
fn count_capture_groups(pattern: &str) -> usize {
    let mut count = 0;
    let mut in_class = false;
    let mut chars = pattern.chars().peekable();
    while let Some(c) = chars.next() {
        match c {
            '\\' => {
                drop(chars.next());
            }
            '[' if !in_class => in_class = true,
            ']' if in_class => in_class = false,
            '(' if !in_class => match chars.peek() {
                Some('?') => {
                    drop(chars.next());
                    // `(?P<name>` and `(?<name>` still capture.
                    if matches!(chars.peek(), Some('P' | '<')) {
                        count += 1;
                    }
                }
                _ => count += 1,
            },
            _ => {}
        }
    }
    count
}
