// Copyright (c) 2018-2025  Brendan Molloy <brendan@bbqsrc.net>,
//                          Ilya Solovyiov <ilya.solovyiov@gmail.com>,
//                          Kai Ren <tyranron@gmail.com>
//
// Licensed under the Apache License, Version 2.0 <LICENSE-APACHE or
// http://www.apache.org/licenses/LICENSE-2.0> or the MIT license
// <LICENSE-MIT or http://opensource.org/licenses/MIT>, at your
// option. This file may not be copied, modified, or distributed
// except according to those terms.

//! Fuzzy near-miss suggestions for unresolved steps.
//!
//! When no registered expression matches a step line, every registered
//! expression is scored against it: a word-level diff first folds
//! `{placeholder}` tokens over the step's literal words (so a placeholder
//! never counts as a mismatch against the words it would have captured),
//! then the char-level edit distance of the folded expression ranks the
//! candidates. Ranking is fully deterministic: stable sorts keep
//! registration order among equal distances.

pub mod report;

use lazy_regex::regex_is_match;

pub use self::report::{Report, Styles, Suggestion};
use crate::{
    scope::Worlds,
    step::{Cache, Category},
};

/// Default number of suggestions reported for one unresolved step.
pub const DEFAULT_LIMIT: usize = 5;

/// One word-level diff operation.
#[derive(Clone, Copy, Debug, Eq, PartialEq)]
enum DiffOp<'a> {
    /// Word present in both texts.
    Same(&'a str),

    /// Word only the step has.
    Del(&'a str),

    /// Word only the expression has.
    Add(&'a str),
}

/// Diffs two word sequences via their longest common subsequence.
///
/// Deletions are emitted before additions at every divergence point.
fn word_diff<'a>(from: &[&'a str], to: &[&'a str]) -> Vec<DiffOp<'a>> {
    let (n, m) = (from.len(), to.len());
    let mut lcs = vec![vec![0_usize; m + 1]; n + 1];
    for i in (0..n).rev() {
        for j in (0..m).rev() {
            lcs[i][j] = if from[i] == to[j] {
                lcs[i + 1][j + 1] + 1
            } else {
                lcs[i + 1][j].max(lcs[i][j + 1])
            };
        }
    }

    let mut ops = Vec::with_capacity(n.max(m));
    let (mut i, mut j) = (0, 0);
    while i < n && j < m {
        if from[i] == to[j] {
            ops.push(DiffOp::Same(from[i]));
            i += 1;
            j += 1;
        } else if lcs[i + 1][j] >= lcs[i][j + 1] {
            ops.push(DiffOp::Del(from[i]));
            i += 1;
        } else {
            ops.push(DiffOp::Add(to[j]));
            j += 1;
        }
    }
    ops.extend(from[i..].iter().map(|w| DiffOp::Del(w)));
    ops.extend(to[j..].iter().map(|w| DiffOp::Add(w)));
    ops
}

/// Rewrites `expression` with every `{placeholder}` word that displaced a
/// run of the step's literal words replaced by those literals.
///
/// This is what makes `I eat {int} apples` score as an exact match for
/// `I eat 5 apples`.
fn fold_placeholders(step: &str, expression: &str) -> String {
    let step_words: Vec<_> = step.split_whitespace().collect();
    let expr_words: Vec<_> = expression.split_whitespace().collect();

    let mut out: Vec<&str> = Vec::with_capacity(expr_words.len());
    let mut deleted: Vec<&str> = Vec::new();
    for op in word_diff(&step_words, &expr_words) {
        match op {
            DiffOp::Same(w) => {
                deleted.clear();
                out.push(w);
            }
            DiffOp::Del(w) => deleted.push(w),
            DiffOp::Add(w) => {
                if !deleted.is_empty()
                    && regex_is_match!(r"^\{[^{}]*\}$", w)
                {
                    out.append(&mut deleted);
                } else {
                    out.push(w);
                }
            }
        }
    }
    out.join(" ")
}

/// Char-level Levenshtein edit distance.
#[must_use]
pub fn levenshtein(a: &str, b: &str) -> usize {
    let a: Vec<char> = a.chars().collect();
    let b: Vec<char> = b.chars().collect();

    let mut prev: Vec<usize> = (0..=b.len()).collect();
    for (i, ca) in a.iter().enumerate() {
        let mut cur = Vec::with_capacity(b.len() + 1);
        cur.push(i + 1);
        for (j, cb) in b.iter().enumerate() {
            let substitute = prev[j] + usize::from(ca != cb);
            cur.push(substitute.min(prev[j + 1] + 1).min(cur[j] + 1));
        }
        prev = cur;
    }
    prev[b.len()]
}

/// Edit distance of `step` against `expression` with placeholders folded.
#[must_use]
pub fn distance(step: &str, expression: &str) -> usize {
    levenshtein(step, &fold_placeholders(step, expression))
}

/// Ranks every registered expression against the unresolved `step` and
/// assembles a [`Report`] of at most `limit` suggestions.
#[must_use]
pub fn rank<W: Worlds>(
    cache: &Cache<W>,
    category: Category,
    step: &str,
    limit: usize,
) -> Report {
    let mut same = Vec::new();
    let mut other = Vec::new();
    for ty in [Category::Given, Category::When, Category::Then] {
        for def in cache.defs(ty) {
            let suggestion = Suggestion {
                category: ty,
                expression: def.expression().to_owned(),
                distance: distance(step, def.expression()),
            };
            if ty == category {
                same.push(suggestion);
            } else {
                other.push(suggestion);
            }
        }
    }
    // Stable sorts, so equally distant candidates keep registration order.
    same.sort_by_key(|s| s.distance);
    other.sort_by_key(|s| s.distance);

    let (same, other) = limit_buckets(same, other, limit);
    Report { step: step.to_owned(), category, same, other }
}

/// Applies the suggestion budget to the two ranked buckets.
///
/// Same-category candidates fill the budget first. Other-category ones are
/// admitted only when the same-category bucket leaves room to spare and its
/// own best candidate beats the worst admitted same-category one (or no
/// same-category candidate exists at all).
fn limit_buckets(
    mut same: Vec<Suggestion>,
    mut other: Vec<Suggestion>,
    limit: usize,
) -> (Vec<Suggestion>, Vec<Suggestion>) {
    if same.len() >= limit {
        same.truncate(limit);
        return (same, Vec::new());
    }
    if same.is_empty() {
        other.truncate(limit);
        return (same, other);
    }

    let admit = match (other.first(), same.last()) {
        (Some(o), Some(s)) => o.distance < s.distance,
        _ => false,
    };
    if admit {
        other.truncate(limit - same.len());
    } else {
        other.clear();
    }
    (same, other)
}
