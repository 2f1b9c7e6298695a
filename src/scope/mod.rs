// Copyright (c) 2018-2025  Brendan Molloy <brendan@bbqsrc.net>,
//                          Ilya Solovyiov <ilya.solovyiov@gmail.com>,
//                          Kai Ren <tyranron@gmail.com>
//
// Licensed under the Apache License, Version 2.0 <LICENSE-APACHE or
// http://www.apache.org/licenses/LICENSE-2.0> or the MIT license
// <LICENSE-MIT or http://opensource.org/licenses/MIT>, at your
// option. This file may not be copied, modified, or distributed
// except according to those terms.

//! Nested lifecycle scopes and their state instances.
//!
//! A [`ScopeStack`] owns up to four live levels (feature → rule → outline →
//! scenario), each an arena entry exclusively owning its state instance and
//! teardown [`Container`]. Parent state is attached to children as
//! non-owning [`Rc`] handles on the [`ScopePayload`], never through
//! back-pointers inside state objects.
//!
//! Feature/rule/outline levels are reused across sibling scenarios while
//! their resolved key stays identical, which is what lets feature-level
//! state persist across scenarios. Scenario levels are never reused: every
//! scenario execution starts from clean state.

pub mod container;
pub mod hooks;

use std::{cell::RefCell, fmt, rc::Rc};

use derive_more::Display;
use futures::future::LocalBoxFuture;

pub use self::{
    container::{Container, TeardownFn},
    hooks::{HookFn, HookPhase, Hooks},
};
use crate::error::{DynError, Error};

/// Lifecycle level of a scope.
#[derive(Clone, Copy, Debug, Display, Eq, Hash, PartialEq)]
pub enum ScopeKind {
    /// Feature-level scope.
    #[display("feature")]
    Feature,

    /// Rule-level scope.
    #[display("rule")]
    Rule,

    /// Scenario-outline-level scope.
    #[display("outline")]
    Outline,

    /// Scenario-level scope.
    #[display("scenario")]
    Scenario,
}

/// Per-level state types carried through a test run.
///
/// Each associated type is instantiated via [`Default`] when its scope is
/// entered and dropped when the scope is discarded.
pub trait Worlds: 'static {
    /// Per-feature state.
    type Feature: Default + 'static;

    /// Per-rule state.
    type Rule: Default + 'static;

    /// Per-outline state.
    type Outline: Default + 'static;

    /// Per-scenario state.
    type Scenario: Default + 'static;
}

impl Worlds for () {
    type Feature = ();
    type Rule = ();
    type Outline = ();
    type Scenario = ();
}

/// Execution context the identity of active scopes is derived from.
#[derive(Clone, Copy, Debug, Default)]
pub struct RunContext<'a> {
    /// Feature currently being walked.
    pub feature: Option<&'a gherkin::Feature>,

    /// Rule currently being walked, if the scenario lives under one.
    pub rule: Option<&'a gherkin::Rule>,

    /// Scenario about to execute. For outline rows this is the original
    /// (un-expanded) scenario, so the outline key stays stable across rows.
    pub scenario: Option<&'a gherkin::Scenario>,

    /// Zero-based examples row, when executing a scenario outline.
    pub example_row: Option<usize>,
}

/// Identity strings of the active scope levels.
#[derive(Clone, Debug, Default, Eq, PartialEq)]
pub struct ScopeKeys {
    /// Feature identity, if a feature scope is required.
    pub feature: Option<String>,

    /// Rule identity, if a rule scope is required.
    pub rule: Option<String>,

    /// Outline identity, if an outline scope is required.
    pub outline: Option<String>,

    /// Scenario identity. Absence makes the [`ScopeStack`] fall back to a
    /// synthetic counter.
    pub scenario: Option<String>,
}

/// Alias for the resolver deriving [`ScopeKeys`] from a [`RunContext`].
pub type KeyResolver = Box<dyn Fn(&RunContext<'_>) -> ScopeKeys>;

/// Default [`KeyResolver`]: node names, with outline rows suffixed onto
/// the scenario key.
#[must_use]
pub fn default_keys(cx: &RunContext<'_>) -> ScopeKeys {
    ScopeKeys {
        feature: cx.feature.map(|f| f.name.clone()),
        rule: cx.rule.map(|r| r.name.clone()),
        outline: cx
            .scenario
            .filter(|s| !s.examples.is_empty())
            .map(|s| s.name.clone()),
        scenario: cx.scenario.map(|s| match cx.example_row {
            Some(row) => format!("{} [{row}]", s.name),
            None => s.name.clone(),
        }),
    }
}

/// Non-owning view over the live scope hierarchy.
///
/// Handed to hooks and step handlers. Cloning clones [`Rc`] handles only,
/// never the state itself.
pub struct ScopePayload<W: Worlds> {
    /// Feature state, when a feature scope is live.
    pub feature: Option<Rc<RefCell<W::Feature>>>,

    /// Rule state, when a rule scope is live.
    pub rule: Option<Rc<RefCell<W::Rule>>>,

    /// Outline state, when an outline scope is live.
    pub outline: Option<Rc<RefCell<W::Outline>>>,

    /// Scenario state, when a scenario scope is live.
    pub scenario: Option<Rc<RefCell<W::Scenario>>>,
}

// Implemented manually to omit redundant `W: Clone` trait bound, imposed by
// `#[derive(Clone)]`.
impl<W: Worlds> Clone for ScopePayload<W> {
    fn clone(&self) -> Self {
        Self {
            feature: self.feature.clone(),
            rule: self.rule.clone(),
            outline: self.outline.clone(),
            scenario: self.scenario.clone(),
        }
    }
}

impl<W: Worlds> fmt::Debug for ScopePayload<W> {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("ScopePayload")
            .field("feature", &self.feature.is_some())
            .field("rule", &self.rule.is_some())
            .field("outline", &self.outline.is_some())
            .field("scenario", &self.scenario.is_some())
            .finish()
    }
}

impl<W: Worlds> ScopePayload<W> {
    /// Indicates whether a state instance for the given level is present.
    #[must_use]
    pub fn has(&self, kind: ScopeKind) -> bool {
        match kind {
            ScopeKind::Feature => self.feature.is_some(),
            ScopeKind::Rule => self.rule.is_some(),
            ScopeKind::Outline => self.outline.is_some(),
            ScopeKind::Scenario => self.scenario.is_some(),
        }
    }

    /// Returns the feature state handle.
    ///
    /// # Errors
    ///
    /// If no feature scope is live.
    pub fn feature(&self) -> Result<Rc<RefCell<W::Feature>>, Error> {
        self.feature
            .clone()
            .ok_or(Error::ScopeNotInitialized { kind: ScopeKind::Feature })
    }

    /// Returns the rule state handle.
    ///
    /// # Errors
    ///
    /// If no rule scope is live.
    pub fn rule(&self) -> Result<Rc<RefCell<W::Rule>>, Error> {
        self.rule
            .clone()
            .ok_or(Error::ScopeNotInitialized { kind: ScopeKind::Rule })
    }

    /// Returns the outline state handle.
    ///
    /// # Errors
    ///
    /// If no outline scope is live.
    pub fn outline(&self) -> Result<Rc<RefCell<W::Outline>>, Error> {
        self.outline
            .clone()
            .ok_or(Error::ScopeNotInitialized { kind: ScopeKind::Outline })
    }

    /// Returns the scenario state handle.
    ///
    /// # Errors
    ///
    /// If no scenario scope is live.
    pub fn scenario(&self) -> Result<Rc<RefCell<W::Scenario>>, Error> {
        self.scenario
            .clone()
            .ok_or(Error::ScopeNotInitialized { kind: ScopeKind::Scenario })
    }
}

/// One live scope level: memoized key, exclusively owned state instance
/// and teardown container.
struct Level<T> {
    /// Identity within the parent, memoized for reuse comparisons.
    key: String,

    /// The per-scope state object.
    state: Rc<RefCell<T>>,

    /// Teardown container, disposed iff this level is discarded.
    container: Container,
}

impl<T: Default> Level<T> {
    /// Creates a fresh [`Level`] with [`Default`] state.
    fn new(key: String, container: Container) -> Self {
        Self { key, state: Rc::new(RefCell::new(T::default())), container }
    }
}

/// Stack of nested lifecycle scopes for one cooperatively executing walk.
///
/// Not shared across concurrently executing scenarios: each independent
/// walk owns its own instance.
pub struct ScopeStack<W: Worlds> {
    /// Live feature level.
    feature: Option<Level<W::Feature>>,

    /// Live rule level.
    rule: Option<Level<W::Rule>>,

    /// Live outline level.
    outline: Option<Level<W::Outline>>,

    /// Live scenario level.
    scenario: Option<Level<W::Scenario>>,

    /// Registered enter/exit hooks.
    hooks: Hooks<W>,

    /// Resolver deriving scope identity from the execution context.
    resolver: KeyResolver,

    /// Synthetic scenario key counter.
    sequence: usize,
}

impl<W: Worlds> fmt::Debug for ScopeStack<W> {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("ScopeStack")
            .field("feature", &self.feature.as_ref().map(|l| &l.key))
            .field("rule", &self.rule.as_ref().map(|l| &l.key))
            .field("outline", &self.outline.as_ref().map(|l| &l.key))
            .field("scenario", &self.scenario.as_ref().map(|l| &l.key))
            .finish_non_exhaustive()
    }
}

impl<W: Worlds> Default for ScopeStack<W> {
    fn default() -> Self {
        Self::new()
    }
}

impl<W: Worlds> ScopeStack<W> {
    /// Creates an empty [`ScopeStack`] using the [`default_keys`] resolver.
    #[must_use]
    pub fn new() -> Self {
        Self::with_resolver(Box::new(default_keys))
    }

    /// Creates an empty [`ScopeStack`] with a custom [`KeyResolver`].
    #[must_use]
    pub fn with_resolver(resolver: KeyResolver) -> Self {
        Self {
            feature: None,
            rule: None,
            outline: None,
            scenario: None,
            hooks: Hooks::new(),
            resolver,
            sequence: 0,
        }
    }

    /// Registers an enter hook for the given scope level.
    pub fn on_enter(
        &mut self,
        kind: ScopeKind,
        hook: impl Fn(ScopePayload<W>) -> LocalBoxFuture<'static, Result<(), DynError>>
            + 'static,
    ) {
        self.hooks.register(kind, HookPhase::Enter, hook);
    }

    /// Registers an exit hook for the given scope level.
    pub fn on_exit(
        &mut self,
        kind: ScopeKind,
        hook: impl Fn(ScopePayload<W>) -> LocalBoxFuture<'static, Result<(), DynError>>
            + 'static,
    ) {
        self.hooks.register(kind, HookPhase::Exit, hook);
    }

    /// Derives [`ScopeKeys`] for the given context, substituting a
    /// synthetic counter when the environment supplies no scenario key.
    pub fn resolve_keys(&mut self, cx: &RunContext<'_>) -> ScopeKeys {
        let mut keys = (self.resolver)(cx);
        if keys.scenario.is_none() {
            self.sequence += 1;
            keys.scenario = Some(format!("scenario-{}", self.sequence));
        }
        keys
    }

    /// Memoized keys of the currently live levels.
    #[must_use]
    pub fn keys(&self) -> ScopeKeys {
        ScopeKeys {
            feature: self.feature.as_ref().map(|l| l.key.clone()),
            rule: self.rule.as_ref().map(|l| l.key.clone()),
            outline: self.outline.as_ref().map(|l| l.key.clone()),
            scenario: self.scenario.as_ref().map(|l| l.key.clone()),
        }
    }

    /// Current state handles of all live levels, without any
    /// initialization check.
    #[must_use]
    pub fn snapshot(&self) -> ScopePayload<W> {
        ScopePayload {
            feature: self.feature.as_ref().map(|l| Rc::clone(&l.state)),
            rule: self.rule.as_ref().map(|l| Rc::clone(&l.state)),
            outline: self.outline.as_ref().map(|l| Rc::clone(&l.state)),
            scenario: self.scenario.as_ref().map(|l| Rc::clone(&l.state)),
        }
    }

    /// Current scope hierarchy.
    ///
    /// # Errors
    ///
    /// [`Error::UninitializedScope`] when no scenario scope is live;
    /// recoverable by starting a scenario first.
    pub fn hierarchy(&self) -> Result<ScopePayload<W>, Error> {
        if self.scenario.is_none() {
            return Err(Error::UninitializedScope);
        }
        Ok(self.snapshot())
    }

    /// Mutable access to the live container of the given level, e.g. for
    /// registering disposables.
    pub fn container_mut(
        &mut self,
        kind: ScopeKind,
    ) -> Option<&mut Container> {
        match kind {
            ScopeKind::Feature => {
                self.feature.as_mut().map(|l| &mut l.container)
            }
            ScopeKind::Rule => self.rule.as_mut().map(|l| &mut l.container),
            ScopeKind::Outline => {
                self.outline.as_mut().map(|l| &mut l.container)
            }
            ScopeKind::Scenario => {
                self.scenario.as_mut().map(|l| &mut l.container)
            }
        }
    }

    /// Ensures feature/rule/outline scopes match the keys resolved from
    /// `cx`, then starts a fresh scenario scope.
    ///
    /// # Errors
    ///
    /// If an enter/exit hook or a container teardown fails along the way.
    pub async fn start_scenario(
        &mut self,
        cx: &RunContext<'_>,
    ) -> Result<ScopePayload<W>, Error> {
        let keys = self.resolve_keys(cx);
        self.start_scenario_with(keys).await
    }

    /// [`start_scenario()`] with pre-resolved keys.
    ///
    /// Identical parent keys short-circuit (state and container kept);
    /// differing ones exit-dispose the stale level bottom-up before the
    /// new one is entered. The scenario scope is always fresh.
    ///
    /// # Errors
    ///
    /// If an enter/exit hook or a container teardown fails along the way.
    ///
    /// [`start_scenario()`]: Self::start_scenario
    pub async fn start_scenario_with(
        &mut self,
        keys: ScopeKeys,
    ) -> Result<ScopePayload<W>, Error> {
        let feature_changed =
            key_changed(self.feature.as_ref(), keys.feature.as_ref());
        let rule_changed = feature_changed
            || key_changed(self.rule.as_ref(), keys.rule.as_ref());
        let outline_changed = rule_changed
            || key_changed(self.outline.as_ref(), keys.outline.as_ref());

        // A still-live scenario here means the caller skipped
        // `finish_scenario()`; it is torn down like any stale level.
        self.teardown_scenario().await?;
        if outline_changed {
            self.teardown_outline().await?;
        }
        if rule_changed {
            self.teardown_rule().await?;
        }
        if feature_changed {
            self.teardown_feature().await?;
        }

        if let Some(key) = keys.feature {
            if self.feature.is_none() {
                self.enter_feature(key).await?;
            }
        }
        if let Some(key) = keys.rule {
            if self.rule.is_none() {
                self.enter_rule(key).await?;
            }
        }
        if let Some(key) = keys.outline {
            if self.outline.is_none() {
                self.enter_outline(key).await?;
            }
        }

        let scenario_key = match keys.scenario {
            Some(key) => key,
            None => {
                self.sequence += 1;
                format!("scenario-{}", self.sequence)
            }
        };
        self.enter_scenario(scenario_key).await?;

        Ok(self.snapshot())
    }

    /// Exits and disposes the scenario scope, firing exit hooks with the
    /// full current hierarchy payload.
    ///
    /// # Errors
    ///
    /// [`Error::ScopeNotInitialized`] if no scenario scope is live, or a
    /// wrapped hook/teardown failure.
    pub async fn finish_scenario(&mut self) -> Result<(), Error> {
        let payload = self.snapshot();
        self.hooks
            .fire(ScopeKind::Scenario, HookPhase::Exit, &payload)
            .await?;
        if let Some(level) = self.scenario.take() {
            tracing::debug!(key = %level.key, "exiting scenario scope");
            level.container.dispose().await?;
        }
        Ok(())
    }

    /// Tears down every level from the bottom up (scenario → outline →
    /// rule → feature), regardless of whether corresponding starts
    /// occurred.
    ///
    /// All levels are attempted even when one fails; the first failure is
    /// reported, later ones are only logged.
    ///
    /// # Errors
    ///
    /// With the first wrapped hook/teardown failure.
    pub async fn reset_all(&mut self) -> Result<(), Error> {
        let mut first_failure = None;
        let mut keep = |res: Result<(), Error>| {
            if let Err(e) = res {
                if first_failure.is_none() {
                    first_failure = Some(e);
                } else {
                    tracing::warn!(error = %e, "suppressing reset failure");
                }
            }
        };

        let res = self.teardown_scenario().await;
        keep(res);
        let res = self.teardown_outline().await;
        keep(res);
        let res = self.teardown_rule().await;
        keep(res);
        let res = self.teardown_feature().await;
        keep(res);

        first_failure.map_or(Ok(()), Err)
    }

    async fn enter_feature(&mut self, key: String) -> Result<(), Error> {
        tracing::debug!(key = %key, "entering feature scope");
        let container = Container::root(format!("feature:{key}"));
        self.feature = Some(Level::new(key, container));
        let payload = self.snapshot();
        self.hooks
            .fire(ScopeKind::Feature, HookPhase::Enter, &payload)
            .await
    }

    async fn enter_rule(&mut self, key: String) -> Result<(), Error> {
        tracing::debug!(key = %key, "entering rule scope");
        let label = format!("rule:{key}");
        let container = self
            .feature
            .as_ref()
            .map_or_else(|| Container::root(&label), |f| f.container.child(&label));
        self.rule = Some(Level::new(key, container));
        let payload = self.snapshot();
        self.hooks.fire(ScopeKind::Rule, HookPhase::Enter, &payload).await
    }

    async fn enter_outline(&mut self, key: String) -> Result<(), Error> {
        tracing::debug!(key = %key, "entering outline scope");
        let label = format!("outline:{key}");
        let container = self
            .rule
            .as_ref()
            .map(|l| &l.container)
            .or(self.feature.as_ref().map(|l| &l.container))
            .map_or_else(|| Container::root(&label), |p| p.child(&label));
        self.outline = Some(Level::new(key, container));
        let payload = self.snapshot();
        self.hooks
            .fire(ScopeKind::Outline, HookPhase::Enter, &payload)
            .await
    }

    async fn enter_scenario(&mut self, key: String) -> Result<(), Error> {
        tracing::debug!(key = %key, "entering scenario scope");
        let label = format!("scenario:{key}");
        let container = self
            .outline
            .as_ref()
            .map(|l| &l.container)
            .or(self.rule.as_ref().map(|l| &l.container))
            .or(self.feature.as_ref().map(|l| &l.container))
            .map_or_else(|| Container::root(&label), |p| p.child(&label));
        self.scenario = Some(Level::new(key, container));
        let payload = self.snapshot();
        self.hooks
            .fire(ScopeKind::Scenario, HookPhase::Enter, &payload)
            .await
    }

    async fn teardown_scenario(&mut self) -> Result<(), Error> {
        if self.scenario.is_none() {
            return Ok(());
        }
        let payload = self.snapshot();
        self.hooks
            .fire(ScopeKind::Scenario, HookPhase::Exit, &payload)
            .await?;
        if let Some(level) = self.scenario.take() {
            tracing::debug!(key = %level.key, "exiting scenario scope");
            level.container.dispose().await?;
        }
        Ok(())
    }

    async fn teardown_outline(&mut self) -> Result<(), Error> {
        if self.outline.is_none() {
            return Ok(());
        }
        let payload = self.snapshot();
        self.hooks
            .fire(ScopeKind::Outline, HookPhase::Exit, &payload)
            .await?;
        if let Some(level) = self.outline.take() {
            tracing::debug!(key = %level.key, "exiting outline scope");
            level.container.dispose().await?;
        }
        Ok(())
    }

    async fn teardown_rule(&mut self) -> Result<(), Error> {
        if self.rule.is_none() {
            return Ok(());
        }
        let payload = self.snapshot();
        self.hooks
            .fire(ScopeKind::Rule, HookPhase::Exit, &payload)
            .await?;
        if let Some(level) = self.rule.take() {
            tracing::debug!(key = %level.key, "exiting rule scope");
            level.container.dispose().await?;
        }
        Ok(())
    }

    async fn teardown_feature(&mut self) -> Result<(), Error> {
        if self.feature.is_none() {
            return Ok(());
        }
        let payload = self.snapshot();
        self.hooks
            .fire(ScopeKind::Feature, HookPhase::Exit, &payload)
            .await?;
        if let Some(level) = self.feature.take() {
            tracing::debug!(key = %level.key, "exiting feature scope");
            level.container.dispose().await?;
        }
        Ok(())
    }
}

/// Compares a live level's memoized key with a newly resolved one.
fn key_changed<T>(level: Option<&Level<T>>, key: Option<&String>) -> bool {
    match (level, key) {
        (None, None) => false,
        (Some(level), Some(key)) => level.key != *key,
        _ => true,
    }
}

#[cfg(test)]
mod tests {
    use futures::FutureExt as _;

    use super::*;

    #[derive(Default)]
    struct FeatureState {
        counter: usize,
    }

    struct TestWorlds;

    impl Worlds for TestWorlds {
        type Feature = FeatureState;
        type Rule = ();
        type Outline = ();
        type Scenario = Vec<String>;
    }

    fn keys(feature: &str, scenario: &str) -> ScopeKeys {
        ScopeKeys {
            feature: Some(feature.to_owned()),
            rule: None,
            outline: None,
            scenario: Some(scenario.to_owned()),
        }
    }

    #[tokio::test]
    async fn parent_scope_is_reused_across_sibling_scenarios() {
        let mut scopes = ScopeStack::<TestWorlds>::new();

        let first = scopes.start_scenario_with(keys("f", "a")).await.unwrap();
        let feature_a = first.feature().unwrap();
        let scenario_a = first.scenario().unwrap();
        scopes.finish_scenario().await.unwrap();

        let second = scopes.start_scenario_with(keys("f", "b")).await.unwrap();
        let feature_b = second.feature().unwrap();
        let scenario_b = second.scenario().unwrap();

        assert!(Rc::ptr_eq(&feature_a, &feature_b));
        assert!(!Rc::ptr_eq(&scenario_a, &scenario_b));
    }

    #[tokio::test]
    async fn scenario_scope_is_fresh_even_for_identical_keys() {
        let mut scopes = ScopeStack::<TestWorlds>::new();

        let first = scopes.start_scenario_with(keys("f", "same")).await.unwrap();
        let scenario_a = first.scenario().unwrap();
        scenario_a.borrow_mut().push("dirty".into());
        scopes.finish_scenario().await.unwrap();

        let second =
            scopes.start_scenario_with(keys("f", "same")).await.unwrap();
        let scenario_b = second.scenario().unwrap();

        assert!(!Rc::ptr_eq(&scenario_a, &scenario_b));
        assert!(scenario_b.borrow().is_empty());
    }

    #[tokio::test]
    async fn feature_enter_fires_once_scenario_enter_per_scenario() {
        let mut scopes = ScopeStack::<TestWorlds>::new();
        scopes.on_enter(ScopeKind::Feature, |payload| {
            async move {
                payload.feature()?.borrow_mut().counter += 1;
                Ok(())
            }
            .boxed_local()
        });
        let scenario_enters = Rc::new(RefCell::new(0));
        {
            let scenario_enters = Rc::clone(&scenario_enters);
            scopes.on_enter(ScopeKind::Scenario, move |_| {
                let scenario_enters = Rc::clone(&scenario_enters);
                async move {
                    *scenario_enters.borrow_mut() += 1;
                    Ok(())
                }
                .boxed_local()
            });
        }

        let payload = scopes.start_scenario_with(keys("f", "a")).await.unwrap();
        scopes.finish_scenario().await.unwrap();
        scopes.start_scenario_with(keys("f", "b")).await.unwrap();
        scopes.finish_scenario().await.unwrap();

        assert_eq!(payload.feature().unwrap().borrow().counter, 1);
        assert_eq!(*scenario_enters.borrow(), 2);
    }

    #[tokio::test]
    async fn changed_feature_key_disposes_stale_scope() {
        let mut scopes = ScopeStack::<TestWorlds>::new();
        let exits = Rc::new(RefCell::new(Vec::new()));
        {
            let exits = Rc::clone(&exits);
            scopes.on_exit(ScopeKind::Feature, move |_| {
                let exits = Rc::clone(&exits);
                async move {
                    exits.borrow_mut().push("feature");
                    Ok(())
                }
                .boxed_local()
            });
        }

        let first = scopes.start_scenario_with(keys("f1", "a")).await.unwrap();
        let feature_one = first.feature().unwrap();
        scopes.finish_scenario().await.unwrap();

        let second = scopes.start_scenario_with(keys("f2", "a")).await.unwrap();
        let feature_two = second.feature().unwrap();

        assert!(!Rc::ptr_eq(&feature_one, &feature_two));
        assert_eq!(*exits.borrow(), ["feature"]);
        assert_eq!(scopes.keys().feature.as_deref(), Some("f2"));
    }

    #[tokio::test]
    async fn hierarchy_before_first_scenario_is_uninitialized() {
        let scopes = ScopeStack::<TestWorlds>::new();
        assert!(matches!(
            scopes.hierarchy().unwrap_err(),
            Error::UninitializedScope,
        ));
    }

    #[tokio::test]
    async fn finish_without_start_violates_contract() {
        let mut scopes = ScopeStack::<TestWorlds>::new();
        assert!(matches!(
            scopes.finish_scenario().await.unwrap_err(),
            Error::ScopeNotInitialized { kind: ScopeKind::Scenario },
        ));
    }

    #[tokio::test]
    async fn synthetic_scenario_keys_are_unique() {
        let mut scopes = ScopeStack::<TestWorlds>::new();
        let cx = RunContext::default();
        let first = scopes.resolve_keys(&cx).scenario;
        let second = scopes.resolve_keys(&cx).scenario;
        assert_ne!(first, second);
        assert!(first.unwrap().starts_with("scenario-"));
    }

    #[tokio::test]
    async fn reset_all_tears_down_bottom_up() {
        let mut scopes = ScopeStack::<TestWorlds>::new();
        let order = Rc::new(RefCell::new(Vec::new()));
        for kind in [ScopeKind::Scenario, ScopeKind::Feature] {
            let order = Rc::clone(&order);
            scopes.on_exit(kind, move |_| {
                let order = Rc::clone(&order);
                async move {
                    order.borrow_mut().push(kind);
                    Ok(())
                }
                .boxed_local()
            });
        }

        scopes.start_scenario_with(keys("f", "a")).await.unwrap();
        scopes.reset_all().await.unwrap();

        assert_eq!(*order.borrow(), [ScopeKind::Scenario, ScopeKind::Feature]);
        assert!(scopes.keys().feature.is_none());
    }

    #[tokio::test]
    async fn scenario_disposables_run_on_finish() {
        let mut scopes = ScopeStack::<TestWorlds>::new();
        scopes.start_scenario_with(keys("f", "a")).await.unwrap();

        let disposed = Rc::new(RefCell::new(false));
        {
            let disposed = Rc::clone(&disposed);
            scopes
                .container_mut(ScopeKind::Scenario)
                .unwrap()
                .on_dispose("connection", move || {
                    let disposed = Rc::clone(&disposed);
                    async move {
                        *disposed.borrow_mut() = true;
                        Ok(())
                    }
                    .boxed_local()
                });
        }
        assert_eq!(
            scopes.container_mut(ScopeKind::Scenario).unwrap().path(),
            "feature:f/scenario:a",
        );

        scopes.finish_scenario().await.unwrap();
        assert!(*disposed.borrow());
    }

    #[tokio::test]
    async fn hook_failure_is_wrapped_with_scope_and_phase() {
        let mut scopes = ScopeStack::<TestWorlds>::new();
        scopes.on_enter(ScopeKind::Scenario, |_| {
            async { Err::<(), _>("fixture exploded".into()) }.boxed_local()
        });

        let err =
            scopes.start_scenario_with(keys("f", "a")).await.unwrap_err();
        assert!(matches!(
            &err,
            Error::Hook {
                kind: ScopeKind::Scenario,
                phase: HookPhase::Enter,
                ..
            },
        ));
        assert!(err.root_cause().to_string().contains("fixture exploded"));
    }
}
