// Copyright (c) 2018-2025  Brendan Molloy <brendan@bbqsrc.net>,
//                          Ilya Solovyiov <ilya.solovyiov@gmail.com>,
//                          Kai Ren <tyranron@gmail.com>
//
// Licensed under the Apache License, Version 2.0 <LICENSE-APACHE or
// http://www.apache.org/licenses/LICENSE-2.0> or the MIT license
// <LICENSE-MIT or http://opensource.org/licenses/MIT>, at your
// option. This file may not be copied, modified, or distributed
// except according to those terms.

//! Scope-aware step resolution engine for BDD test runtimes.
//!
//! Binds parsed [Gherkin] documents to registered step implementations,
//! carrying typed per-feature/rule/outline/scenario state through lifecycle
//! hooks along the way:
//! - a [`ScopeStack`] manages the nested lifecycle scopes, reusing parent
//!   state across sibling scenarios and always starting scenarios fresh;
//! - a [`Cache`] of [`StepDef`]s resolves step lines through
//!   [`CompiledExpression`]s or raw regexes, with captures typed via a
//!   [`ParameterTypes`] registry;
//! - a [`Walker`] traverses a feature (expanding scenario outlines) into a
//!   [`BridgeNode`] tree of bound, executable steps;
//! - unresolved steps come back with ranked fuzzy [`suggest`]ions instead
//!   of a bare failure.
//!
//! ```rust
//! use futures::FutureExt as _;
//! use gherkin::GherkinEnv;
//! use gherkin_bridge::{
//!     Cache, CompiledExpression, ParameterTypes, ScopeStack, StepDef,
//!     Walker,
//! };
//!
//! let feature = gherkin::Feature::parse(
//!     "Feature: Eating\n  Scenario: apples\n    When I eat 3 apples\n",
//!     GherkinEnv::default(),
//! )?;
//!
//! let types = ParameterTypes::new();
//! let mut steps = Cache::<()>::new();
//! steps.register(StepDef::when(
//!     CompiledExpression::compile("I eat {int} apples", &types)?,
//!     |_, args| {
//!         async move {
//!             assert_eq!(args.values[0].as_int(), Some(3));
//!             Ok(())
//!         }
//!         .boxed_local()
//!     },
//! ));
//!
//! let mut scopes = ScopeStack::new();
//! let tree = futures::executor::block_on(
//!     Walker::new(&steps, &types, &mut scopes).walk(&feature),
//! )?;
//! assert!(tree.errors().is_empty());
//! # Ok::<_, Box<dyn std::error::Error>>(())
//! ```
//!
//! [Gherkin]: https://cucumber.io/docs/gherkin/reference

#![cfg_attr(docsrs, feature(doc_auto_cfg))]
#![deny(
    nonstandard_style,
    rust_2018_idioms,
    trivial_casts,
    trivial_numeric_casts
)]
#![forbid(non_ascii_idents, unsafe_code)]

pub mod bridge;
pub mod cli;
pub mod error;
pub mod expression;
pub mod param;
pub mod scope;
pub mod step;
pub mod suggest;

// Re-exported to guarantee parser version alignment for embedders.
pub use gherkin;

pub use self::{
    bridge::{BridgeNode, Walker},
    error::{DynError, Error},
    expression::{
        CompiledExpression, Extraction, MatchExtractor, PatternLookup,
        RegexMatcher,
    },
    param::{
        DatePhrases, ParameterType, ParameterTypes, Primitive,
        TransformContext, Value,
    },
    scope::{
        Container, HookPhase, RunContext, ScopeKeys, ScopeKind,
        ScopePayload, ScopeStack, Worlds,
    },
    step::{
        Cache, Category, DataTable, Keyword, StepArgs, StepDef, StepFn,
        TableShape,
    },
    suggest::{Report, Styles, Suggestion},
};
