// Copyright (c) 2018-2025  Brendan Molloy <brendan@bbqsrc.net>,
//                          Ilya Solovyiov <ilya.solovyiov@gmail.com>,
//                          Kai Ren <tyranron@gmail.com>
//
// Licensed under the Apache License, Version 2.0 <LICENSE-APACHE or
// http://www.apache.org/licenses/LICENSE-2.0> or the MIT license
// <LICENSE-MIT or http://opensource.org/licenses/MIT>, at your
// option. This file may not be copied, modified, or distributed
// except according to those terms.

//! Unified error taxonomy of the engine.
//!
//! Every failure surfaced by this crate is an [`Error`] carrying an optional
//! cause chain, with the deepest original error reachable through
//! [`std::error::Error::source()`]. Failures are never downgraded to skips.

use derive_more::Display;

use crate::{
    scope::{HookPhase, ScopeKind},
    step::TableShape,
    suggest::Report,
};

/// Alias for a boxed user-supplied error.
///
/// Handlers, hooks, teardowns and parameter transforms run user code, so
/// their failures arrive as opaque boxed errors and are preserved as causes.
pub type DynError = Box<dyn std::error::Error>;

/// Top-level error of all engine operations.
#[derive(Debug, Display)]
pub enum Error {
    /// No registered step implementation matched a step line.
    ///
    /// Always carries the ranked near-miss [`Report`]. Fatal for the
    /// affected scenario, but never aborts sibling scenarios.
    #[display("no step definition matched `{step}`\n{report}")]
    UnresolvedStep {
        /// Literal text of the unmatched step.
        step: String,

        /// Ranked fuzzy-match suggestions.
        report: Report,
    },

    /// Scope hierarchy was requested before any scenario was started.
    ///
    /// Recoverable for the caller by starting a scenario first.
    #[display("scope hierarchy accessed before any scenario was started")]
    UninitializedScope,

    /// A hook payload was fired for a scope level whose state instance is
    /// absent. This is a programming-contract violation, not a normal
    /// runtime condition.
    #[display("{kind} scope is not initialized")]
    ScopeNotInitialized {
        /// Level the payload was fired for.
        kind: ScopeKind,
    },

    /// An enter/exit hook failed.
    #[display("{phase} hook of {kind} scope failed: {source}")]
    Hook {
        /// Level the hook was registered for.
        kind: ScopeKind,

        /// Whether the failing hook was an enter or an exit one.
        phase: HookPhase,

        /// Original hook error.
        source: DynError,
    },

    /// A teardown callback of a scope container failed.
    #[display("teardown `{hook}` of container `{path}` failed: {source}")]
    Teardown {
        /// Lineage path of the container being disposed.
        path: String,

        /// Name of the failing teardown callback.
        hook: String,

        /// Original teardown error.
        source: DynError,
    },

    /// A parameter type failed to transform a captured value.
    #[display("parameter type `{param}` failed to transform `{raw}`: {source}")]
    Transform {
        /// Name of the offending parameter type.
        param: String,

        /// Raw captured substring the transform choked on.
        raw: String,

        /// Original transform error.
        source: DynError,
    },

    /// A step expression referenced a `{name}` that is not defined in the
    /// parameter type registry.
    #[display("expression references undefined parameter type `{{{name}}}`")]
    UnknownParameter {
        /// Referenced parameter type name.
        name: String,
    },

    /// A step expression did not compile into a matcher.
    #[display("expression `{expression}` failed to compile: {source}")]
    InvalidExpression {
        /// Offending expression text.
        expression: String,

        /// Original compilation error.
        source: DynError,
    },

    /// A parameter type with the same name was already defined.
    #[display("parameter type `{name}` is already defined")]
    DuplicateParameter {
        /// Conflicting parameter type name.
        name: String,
    },

    /// A step declared a table shape which the attached table (or its
    /// absence) does not satisfy.
    #[display("step `{step}` expects a {expected} table")]
    TableShape {
        /// Declared table shape.
        expected: TableShape,

        /// Literal text of the offending step.
        step: String,
    },

    /// A scenario outline step referenced an `<name>` column missing from
    /// its examples table.
    #[display("failed to resolve <{name}> at {line}:{col}")]
    ExampleExpansion {
        /// Name of the unknown template.
        name: String,

        /// Line of the unresolved template.
        line: usize,

        /// Column of the unresolved template.
        col: usize,
    },
}

// Implemented manually, as `derive_more::Error` cannot see through the
// `Box<dyn Error>` causes.
impl std::error::Error for Error {
    fn source(&self) -> Option<&(dyn std::error::Error + 'static)> {
        match self {
            Self::Hook { source, .. }
            | Self::Teardown { source, .. }
            | Self::Transform { source, .. }
            | Self::InvalidExpression { source, .. } => Some(&**source),
            Self::UnresolvedStep { .. }
            | Self::UninitializedScope
            | Self::ScopeNotInitialized { .. }
            | Self::UnknownParameter { .. }
            | Self::DuplicateParameter { .. }
            | Self::TableShape { .. }
            | Self::ExampleExpansion { .. } => None,
        }
    }
}

impl Error {
    /// Returns the deepest original error of this [`Error`]'s cause chain,
    /// or the [`Error`] itself if it has no cause.
    #[must_use]
    pub fn root_cause(&self) -> &(dyn std::error::Error + 'static) {
        let mut deepest: &(dyn std::error::Error + 'static) = self;
        while let Some(src) = deepest.source() {
            deepest = src;
        }
        deepest
    }
}
