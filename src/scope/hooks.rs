// Copyright (c) 2018-2025  Brendan Molloy <brendan@bbqsrc.net>,
//                          Ilya Solovyiov <ilya.solovyiov@gmail.com>,
//                          Kai Ren <tyranron@gmail.com>
//
// Licensed under the Apache License, Version 2.0 <LICENSE-APACHE or
// http://www.apache.org/licenses/LICENSE-2.0> or the MIT license
// <LICENSE-MIT or http://opensource.org/licenses/MIT>, at your
// option. This file may not be copied, modified, or distributed
// except according to those terms.

//! Enter/exit hook registry of the scope lifecycle.

use std::rc::Rc;

use derive_more::Display;
use futures::future::LocalBoxFuture;

use super::{ScopeKind, ScopePayload, Worlds};
use crate::error::{DynError, Error};

/// Phase a lifecycle hook fires in.
#[derive(Clone, Copy, Debug, Display, Eq, Hash, PartialEq)]
pub enum HookPhase {
    /// Fired right after a scope's state instance is created.
    #[display("enter")]
    Enter,

    /// Fired right before a scope is discarded.
    #[display("exit")]
    Exit,
}

/// Alias for a registered lifecycle hook callback.
pub type HookFn<W> =
    Rc<dyn Fn(ScopePayload<W>) -> LocalBoxFuture<'static, Result<(), DynError>>>;

/// Ordered registry of lifecycle hooks.
///
/// Hooks fire strictly sequentially in registration order; each one is
/// awaited to completion before the next starts and before the scope
/// transition advances.
pub struct Hooks<W: Worlds> {
    /// All registrations, in order.
    registrations: Vec<(ScopeKind, HookPhase, HookFn<W>)>,
}

impl<W: Worlds> Default for Hooks<W> {
    fn default() -> Self {
        Self { registrations: Vec::new() }
    }
}

impl<W: Worlds> Hooks<W> {
    /// Creates an empty [`Hooks`] registry.
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    /// Registers a hook for the given scope `kind` and `phase`.
    pub fn register(
        &mut self,
        kind: ScopeKind,
        phase: HookPhase,
        hook: impl Fn(ScopePayload<W>) -> LocalBoxFuture<'static, Result<(), DynError>>
            + 'static,
    ) {
        self.registrations.push((kind, phase, Rc::new(hook)));
    }

    /// Fires all hooks registered for `kind`/`phase` with the given
    /// payload, sequentially.
    ///
    /// # Errors
    ///
    /// [`Error::ScopeNotInitialized`] if the payload lacks a state
    /// instance for `kind` (a programming-contract violation), or
    /// [`Error::Hook`] wrapping the first failing hook.
    pub(crate) async fn fire(
        &self,
        kind: ScopeKind,
        phase: HookPhase,
        payload: &ScopePayload<W>,
    ) -> Result<(), Error> {
        if !payload.has(kind) {
            return Err(Error::ScopeNotInitialized { kind });
        }

        for (_, _, hook) in self
            .registrations
            .iter()
            .filter(|(k, p, _)| (*k, *p) == (kind, phase))
        {
            hook(payload.clone())
                .await
                .map_err(|source| Error::Hook { kind, phase, source })?;
        }
        Ok(())
    }
}
