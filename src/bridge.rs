// Copyright (c) 2018-2025  Brendan Molloy <brendan@bbqsrc.net>,
//                          Ilya Solovyiov <ilya.solovyiov@gmail.com>,
//                          Kai Ren <tyranron@gmail.com>
//
// Licensed under the Apache License, Version 2.0 <LICENSE-APACHE or
// http://www.apache.org/licenses/LICENSE-2.0> or the MIT license
// <LICENSE-MIT or http://opensource.org/licenses/MIT>, at your
// option. This file may not be copied, modified, or distributed
// except according to those terms.

//! Document walker binding parsed features to registered step definitions.
//!
//! A [`Walker`] traverses a [`gherkin::Feature`], drives the scope
//! lifecycle along the way, and produces a [`BridgeNode`] tree mirroring
//! the document's structure. Every step node carries its resolved handler,
//! materialized arguments and the scope hierarchy it was bound under, so an
//! embedder can execute or inspect the tree afterwards.
//!
//! Step binding failures are collected per scenario and never abort
//! sibling scenarios; only lifecycle failures (hooks, teardowns) abort the
//! walk itself.

use std::{fmt, iter};

use lazy_regex::regex;
use once_cell::sync::Lazy;
use regex::Regex;

use crate::{
    error::Error,
    param::ParameterTypes,
    scope::{RunContext, ScopePayload, ScopeStack, Worlds},
    step::{Cache, DataTable, StepArgs, StepFn},
    suggest,
};

/// One node of the bound document tree.
pub enum BridgeNode<W: Worlds> {
    /// A feature and its scenarios, outlines and rules.
    Feature {
        /// Feature name.
        name: String,

        /// Child nodes, document order.
        children: Vec<BridgeNode<W>>,
    },

    /// A rule grouping its scenarios.
    Rule {
        /// Rule name.
        name: String,

        /// Child nodes, document order.
        children: Vec<BridgeNode<W>>,
    },

    /// A scenario outline grouping one scenario node per examples row.
    Outline {
        /// Outline name, un-expanded.
        name: String,

        /// One scenario node per examples row.
        children: Vec<BridgeNode<W>>,
    },

    /// A single scenario execution.
    Scenario {
        /// Scenario name, with outline templates expanded.
        name: String,

        /// Scope hierarchy this scenario ran under.
        scopes: ScopePayload<W>,

        /// First binding failure of this scenario, if any.
        error: Option<Error>,

        /// Bound step nodes, background steps first.
        steps: Vec<BridgeNode<W>>,
    },

    /// A step bound to its resolved handler.
    Step {
        /// Bound source step, with outline templates expanded.
        source: gherkin::Step,

        /// Resolved handler.
        handler: StepFn<W>,

        /// Materialized arguments.
        args: StepArgs,

        /// Scope hierarchy the step was bound under.
        scopes: ScopePayload<W>,
    },
}

impl<W: Worlds> fmt::Debug for BridgeNode<W> {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::Feature { name, children } => f
                .debug_struct("Feature")
                .field("name", name)
                .field("children", children)
                .finish(),
            Self::Rule { name, children } => f
                .debug_struct("Rule")
                .field("name", name)
                .field("children", children)
                .finish(),
            Self::Outline { name, children } => f
                .debug_struct("Outline")
                .field("name", name)
                .field("children", children)
                .finish(),
            Self::Scenario { name, error, steps, .. } => f
                .debug_struct("Scenario")
                .field("name", name)
                .field("error", error)
                .field("steps", steps)
                .finish_non_exhaustive(),
            Self::Step { source, args, .. } => f
                .debug_struct("Step")
                .field("keyword", &source.keyword)
                .field("text", &source.value)
                .field("args", args)
                .finish_non_exhaustive(),
        }
    }
}

impl<W: Worlds> BridgeNode<W> {
    /// Name of this node; step nodes report their literal text.
    #[must_use]
    pub fn name(&self) -> &str {
        match self {
            Self::Feature { name, .. }
            | Self::Rule { name, .. }
            | Self::Outline { name, .. }
            | Self::Scenario { name, .. } => name,
            Self::Step { source, .. } => &source.value,
        }
    }

    /// All binding failures of this subtree, document order.
    #[must_use]
    pub fn errors(&self) -> Vec<&Error> {
        let mut out = Vec::new();
        self.collect_errors(&mut out);
        out
    }

    fn collect_errors<'a>(&'a self, out: &mut Vec<&'a Error>) {
        match self {
            Self::Feature { children, .. }
            | Self::Rule { children, .. }
            | Self::Outline { children, .. } => {
                for child in children {
                    child.collect_errors(out);
                }
            }
            Self::Scenario { error, steps, .. } => {
                out.extend(error.as_ref());
                for step in steps {
                    step.collect_errors(out);
                }
            }
            Self::Step { .. } => {}
        }
    }
}

/// Walker binding one [`gherkin::Feature`] at a time against a step
/// [`Cache`] and a [`ParameterTypes`] registry, driving the given
/// [`ScopeStack`] through the traversal.
pub struct Walker<'a, W: Worlds> {
    /// Registered step definitions.
    steps: &'a Cache<W>,

    /// Parameter type registry resolving placeholder captures.
    params: &'a ParameterTypes<W::Scenario>,

    /// Scope lifecycle driven along the walk.
    scopes: &'a mut ScopeStack<W>,

    /// Suggestion budget of unresolved-step reports.
    suggestions: usize,
}

impl<'a, W: Worlds> Walker<'a, W> {
    /// Creates a [`Walker`] over the given collaborators.
    pub fn new(
        steps: &'a Cache<W>,
        params: &'a ParameterTypes<W::Scenario>,
        scopes: &'a mut ScopeStack<W>,
    ) -> Self {
        Self { steps, params, scopes, suggestions: suggest::DEFAULT_LIMIT }
    }

    /// Overrides the suggestion budget of unresolved-step reports.
    #[must_use]
    pub fn with_suggestions(mut self, limit: usize) -> Self {
        self.suggestions = limit;
        self
    }

    /// Walks the whole `feature`, producing its bound [`BridgeNode`] tree.
    ///
    /// Every remaining scope is torn down before returning, whether the
    /// walk succeeded or not.
    ///
    /// # Errors
    ///
    /// If a lifecycle hook or a container teardown fails. Step binding
    /// failures never abort the walk; they surface on the scenario nodes.
    pub async fn walk(
        &mut self,
        feature: &gherkin::Feature,
    ) -> Result<BridgeNode<W>, Error> {
        tracing::debug!(feature = %feature.name, "walking feature");
        let walked = self.walk_feature(feature).await;
        let reset = self.scopes.reset_all().await;
        let tree = walked?;
        reset?;
        Ok(tree)
    }

    async fn walk_feature(
        &mut self,
        feature: &gherkin::Feature,
    ) -> Result<BridgeNode<W>, Error> {
        let mut children = Vec::new();
        for scenario in &feature.scenarios {
            children.push(self.walk_scenario(feature, None, scenario).await?);
        }
        for rule in &feature.rules {
            let mut nodes = Vec::new();
            for scenario in &rule.scenarios {
                nodes.push(
                    self.walk_scenario(feature, Some(rule), scenario).await?,
                );
            }
            children.push(BridgeNode::Rule {
                name: rule.name.clone(),
                children: nodes,
            });
        }
        Ok(BridgeNode::Feature { name: feature.name.clone(), children })
    }

    /// Walks one scenario, expanding it per examples row first if it is an
    /// outline.
    async fn walk_scenario(
        &mut self,
        feature: &gherkin::Feature,
        rule: Option<&gherkin::Rule>,
        scenario: &gherkin::Scenario,
    ) -> Result<BridgeNode<W>, Error> {
        if scenario.examples.is_empty() {
            return self
                .walk_one(feature, rule, scenario, scenario, None)
                .await;
        }

        let mut rows = Vec::new();
        for (row, expanded) in expand_rows(scenario) {
            let node = match expanded {
                Ok(expanded) => {
                    self.walk_one(feature, rule, scenario, &expanded, Some(row))
                        .await?
                }
                Err(e) => BridgeNode::Scenario {
                    name: format!("{} [{row}]", scenario.name),
                    scopes: self.scopes.snapshot(),
                    error: Some(e),
                    steps: Vec::new(),
                },
            };
            rows.push(node);
        }
        Ok(BridgeNode::Outline {
            name: scenario.name.clone(),
            children: rows,
        })
    }

    /// Walks one concrete scenario execution.
    ///
    /// `original` carries the pre-expansion scenario so outline rows derive
    /// identical outline keys; `effective` is what actually gets bound.
    async fn walk_one(
        &mut self,
        feature: &gherkin::Feature,
        rule: Option<&gherkin::Rule>,
        original: &gherkin::Scenario,
        effective: &gherkin::Scenario,
        example_row: Option<usize>,
    ) -> Result<BridgeNode<W>, Error> {
        let cx = RunContext {
            feature: Some(feature),
            rule,
            scenario: Some(original),
            example_row,
        };
        let payload = self.scopes.start_scenario(&cx).await?;

        let background = feature
            .background
            .iter()
            .flat_map(|b| &b.steps)
            .chain(
                rule.into_iter()
                    .flat_map(|r| r.background.iter().flat_map(|b| &b.steps)),
            );

        let mut steps = Vec::new();
        let mut error = None;
        for step in background.chain(&effective.steps) {
            match self.bind_step(step, &payload) {
                Ok(node) => steps.push(node),
                Err(e) => {
                    tracing::debug!(
                        scenario = %effective.name,
                        error = %e,
                        "scenario failed to bind",
                    );
                    error = Some(e);
                    break;
                }
            }
        }

        self.scopes.finish_scenario().await?;
        Ok(BridgeNode::Scenario {
            name: effective.name.clone(),
            scopes: payload,
            error,
            steps,
        })
    }

    /// Resolves one step against the cache and materializes its arguments.
    fn bind_step(
        &self,
        step: &gherkin::Step,
        payload: &ScopePayload<W>,
    ) -> Result<BridgeNode<W>, Error> {
        let Some((def, extractions)) = self.steps.find(step.ty, &step.value)
        else {
            return Err(Error::UnresolvedStep {
                step: step.value.clone(),
                report: suggest::rank(
                    self.steps,
                    step.ty,
                    &step.value,
                    self.suggestions,
                ),
            });
        };

        let table = step.table.as_ref().map(DataTable::from_gherkin);
        if let Some(shape) = def.shape() {
            let satisfied =
                table.as_ref().is_some_and(|t| shape.is_satisfied_by(t));
            if !satisfied {
                return Err(Error::TableShape {
                    expected: shape,
                    step: step.value.clone(),
                });
            }
        }

        let values = extractions
            .iter()
            .map(|e| self.params.resolve(e, payload.scenario.as_ref()))
            .collect::<Result<Vec<_>, _>>()?;

        Ok(BridgeNode::Step {
            handler: def.handler(),
            args: StepArgs {
                values,
                table,
                docstring: step.docstring.clone(),
            },
            scopes: payload.clone(),
            source: step.clone(),
        })
    }
}

/// Expands a scenario outline into one concrete scenario per examples row,
/// substituting `<column>` templates in names, step values, docstrings and
/// table cells.
fn expand_rows(
    scenario: &gherkin::Scenario,
) -> Vec<(usize, Result<gherkin::Scenario, Error>)> {
    /// [`Regex`] matching `<column>` templates of an outline.
    static TEMPLATE_REGEX: &Lazy<Regex> = regex!(r"<([^>\s]+)>");

    scenario
        .examples
        .iter()
        .filter_map(|ex| {
            ex.table
                .as_ref()?
                .rows
                .split_first()
                .map(|(header, rows)| (header, rows, ex.position))
        })
        .flat_map(|(header, rows, position)| {
            rows.iter().map(move |row| (header, row, position))
        })
        .enumerate()
        .map(|(id, (header, row, position))| {
            let replace = |text: &str,
                           pos: gherkin::LineCol|
             -> Result<String, Error> {
                let mut err = None;
                let replaced = TEMPLATE_REGEX
                    .replace_all(text, |cap: &regex::Captures<'_>| {
                        let name = &cap[1];
                        header
                            .iter()
                            .position(|h| h == name)
                            .and_then(|i| row.get(i))
                            .map_or_else(
                                || {
                                    err = Some(Error::ExampleExpansion {
                                        name: name.to_owned(),
                                        line: pos.line,
                                        col: pos.col,
                                    });
                                    String::new()
                                },
                                Clone::clone,
                            )
                    })
                    .into_owned();
                err.map_or(Ok(replaced), Err)
            };

            let expanded = (|| {
                let mut expanded = scenario.clone();
                // Differentiates positions of rows expanded from the same
                // outline.
                expanded.position = position;
                expanded.position.line += id + 2;

                expanded.name = replace(&expanded.name, expanded.position)?;
                for s in &mut expanded.steps {
                    for value in iter::once(&mut s.value)
                        .chain(s.docstring.iter_mut())
                        .chain(s.table.iter_mut().flat_map(|t| {
                            t.rows.iter_mut().flat_map(|r| r.iter_mut())
                        }))
                    {
                        *value = replace(value, s.position)?;
                    }
                }
                Ok(expanded)
            })();
            (id, expanded)
        })
        .collect()
}

#[cfg(test)]
mod tests {
    use std::{cell::RefCell, rc::Rc};

    use futures::FutureExt as _;
    use gherkin::GherkinEnv;

    use super::*;
    use crate::{
        expression::CompiledExpression,
        param::{ParameterType, Value},
        scope::ScopeKind,
        step::{Category, StepDef, TableShape},
    };

    #[derive(Default)]
    struct Log {
        lines: Vec<String>,
    }

    struct TestWorlds;

    impl Worlds for TestWorlds {
        type Feature = Log;
        type Rule = ();
        type Outline = ();
        type Scenario = Log;
    }

    fn parse(src: &str) -> gherkin::Feature {
        gherkin::Feature::parse(src, GherkinEnv::default()).unwrap()
    }

    fn recording_def(ty: Category, expr: &str) -> StepDef<TestWorlds> {
        let types = ParameterTypes::<Log>::new();
        StepDef::<TestWorlds>::new(
            ty,
            CompiledExpression::compile(expr, &types).unwrap(),
            |payload, args| {
                async move {
                    let line = args
                        .values
                        .iter()
                        .map(ToString::to_string)
                        .collect::<Vec<_>>()
                        .join(",");
                    payload.scenario()?.borrow_mut().lines.push(line);
                    Ok(())
                }
                .boxed_local()
            },
        )
    }

    #[tokio::test]
    async fn binds_scenarios_with_background_steps_first() {
        let feature = parse(
            "Feature: Eating\n\
             \x20 Background:\n\
             \x20   Given a hungry tester\n\
             \x20 Scenario: lunch\n\
             \x20   When I eat 3 apples\n",
        );

        let mut cache = Cache::new();
        cache.register(recording_def(Category::Given, "a hungry tester"));
        cache.register(recording_def(Category::When, "I eat {int} apples"));
        let params = ParameterTypes::new();
        let mut scopes = ScopeStack::new();

        let tree = Walker::new(&cache, &params, &mut scopes)
            .walk(&feature)
            .await
            .unwrap();

        assert!(tree.errors().is_empty());
        let BridgeNode::Feature { children, .. } = &tree else {
            panic!("expected feature node");
        };
        let BridgeNode::Scenario { name, steps, error, .. } = &children[0]
        else {
            panic!("expected scenario node");
        };
        assert_eq!(name, "lunch");
        assert!(error.is_none());
        assert_eq!(steps.len(), 2);
        assert_eq!(steps[0].name(), "a hungry tester");

        let BridgeNode::Step { args, .. } = &steps[1] else {
            panic!("expected step node");
        };
        assert_eq!(args.values, [Value::Int(3)]);
    }

    #[tokio::test]
    async fn outline_rows_expand_and_bind_independently() {
        let feature = parse(
            "Feature: Hungry\n\
             \x20 Scenario Outline: eating\n\
             \x20   Given there are <start> cucumbers\n\
             \n\
             \x20   Examples:\n\
             \x20     | start |\n\
             \x20     | 12    |\n\
             \x20     | 20    |\n",
        );

        let mut cache = Cache::new();
        cache.register(recording_def(
            Category::Given,
            "there are {int} cucumbers",
        ));
        let params = ParameterTypes::new();
        let mut scopes = ScopeStack::new();

        let tree = Walker::new(&cache, &params, &mut scopes)
            .walk(&feature)
            .await
            .unwrap();

        let BridgeNode::Feature { children, .. } = &tree else {
            panic!("expected feature node");
        };
        let BridgeNode::Outline { name, children: rows } = &children[0]
        else {
            panic!("expected outline node");
        };
        assert_eq!(name, "eating");
        assert_eq!(rows.len(), 2);

        let values: Vec<_> = rows
            .iter()
            .map(|row| {
                let BridgeNode::Scenario { steps, .. } = row else {
                    panic!("expected scenario node");
                };
                let BridgeNode::Step { args, .. } = &steps[0] else {
                    panic!("expected step node");
                };
                args.values[0].clone()
            })
            .collect();
        assert_eq!(values, [Value::Int(12), Value::Int(20)]);
    }

    #[tokio::test]
    async fn unresolved_step_does_not_abort_siblings() {
        let feature = parse(
            "Feature: Partial\n\
             \x20 Scenario: broken\n\
             \x20   Given a ripe banan\n\
             \x20 Scenario: fine\n\
             \x20   Given a ripe banana\n",
        );

        let mut cache = Cache::new();
        cache.register(recording_def(Category::Given, "a ripe banana"));
        let params = ParameterTypes::new();
        let mut scopes = ScopeStack::new();

        let tree = Walker::new(&cache, &params, &mut scopes)
            .walk(&feature)
            .await
            .unwrap();

        let errors = tree.errors();
        assert_eq!(errors.len(), 1);
        let Error::UnresolvedStep { step, report } = errors[0] else {
            panic!("expected unresolved step");
        };
        assert_eq!(step, "a ripe banan");
        assert_eq!(report.same[0].expression, "a ripe banana");

        let BridgeNode::Feature { children, .. } = &tree else {
            panic!("expected feature node");
        };
        let BridgeNode::Scenario { name, error, .. } = &children[1] else {
            panic!("expected scenario node");
        };
        assert_eq!(name, "fine");
        assert!(error.is_none());
    }

    #[tokio::test]
    async fn missing_examples_column_fails_only_that_row() {
        let feature = parse(
            "Feature: Hungry\n\
             \x20 Scenario Outline: eating\n\
             \x20   Given there are <begin> cucumbers\n\
             \n\
             \x20   Examples:\n\
             \x20     | start |\n\
             \x20     | 12    |\n",
        );

        let cache = Cache::<TestWorlds>::new();
        let params = ParameterTypes::new();
        let mut scopes = ScopeStack::new();

        let tree = Walker::new(&cache, &params, &mut scopes)
            .walk(&feature)
            .await
            .unwrap();

        let errors = tree.errors();
        assert_eq!(errors.len(), 1);
        assert!(matches!(
            errors[0],
            Error::ExampleExpansion { name, .. } if name == "begin",
        ));
    }

    #[tokio::test]
    async fn declared_table_shape_is_validated() {
        let feature = parse(
            "Feature: Tables\n\
             \x20 Scenario: missing table\n\
             \x20   Given the following users\n",
        );

        let mut cache = Cache::new();
        cache.register(
            recording_def(Category::Given, "the following users")
                .with_table(TableShape::Headed),
        );
        let params = ParameterTypes::new();
        let mut scopes = ScopeStack::new();

        let tree = Walker::new(&cache, &params, &mut scopes)
            .walk(&feature)
            .await
            .unwrap();

        assert!(matches!(
            tree.errors()[0],
            Error::TableShape { expected: TableShape::Headed, .. },
        ));
    }

    #[tokio::test]
    async fn bound_handlers_execute_against_scenario_state() {
        let feature = parse(
            "Feature: Run\n\
             \x20 Scenario: s\n\
             \x20   When I eat 7 apples\n",
        );

        let mut cache = Cache::new();
        cache.register(recording_def(Category::When, "I eat {int} apples"));
        let params = ParameterTypes::new();
        let mut scopes = ScopeStack::new();

        let tree = Walker::new(&cache, &params, &mut scopes)
            .walk(&feature)
            .await
            .unwrap();

        let BridgeNode::Feature { mut children, .. } = tree else {
            panic!("expected feature node");
        };
        let BridgeNode::Scenario { mut steps, .. } = children.remove(0)
        else {
            panic!("expected scenario node");
        };
        let BridgeNode::Step { handler, args, scopes: payload, .. } =
            steps.remove(0)
        else {
            panic!("expected step node");
        };

        handler(payload.clone(), args).await.unwrap();
        assert_eq!(payload.scenario().unwrap().borrow().lines, ["7"]);
    }

    #[tokio::test]
    async fn feature_scope_persists_across_scenarios_of_one_walk() {
        let feature = parse(
            "Feature: Counting\n\
             \x20 Scenario: a\n\
             \x20   Given noted\n\
             \x20 Scenario: b\n\
             \x20   Given noted\n",
        );

        let types = ParameterTypes::<Log>::new();
        let mut cache = Cache::new();
        cache.register(StepDef::<TestWorlds>::given(
            CompiledExpression::compile("noted", &types).unwrap(),
            |payload, _| {
                async move {
                    payload.feature()?.borrow_mut().lines.push("x".into());
                    Ok(())
                }
                .boxed_local()
            },
        ));
        let params = ParameterTypes::new();
        let mut scopes = ScopeStack::<TestWorlds>::new();
        let feature_log = Rc::new(RefCell::new(Vec::new()));
        {
            let feature_log = Rc::clone(&feature_log);
            scopes.on_exit(ScopeKind::Feature, move |payload| {
                let feature_log = Rc::clone(&feature_log);
                async move {
                    let count = payload.feature()?.borrow().lines.len();
                    feature_log.borrow_mut().push(count);
                    Ok(())
                }
                .boxed_local()
            });
        }

        let tree = Walker::new(&cache, &params, &mut scopes)
            .walk(&feature)
            .await
            .unwrap();
        assert!(tree.errors().is_empty());

        // Execute both bound steps against the shared feature state.
        let BridgeNode::Feature { children, .. } = &tree else {
            panic!("expected feature node");
        };
        for child in children {
            let BridgeNode::Scenario { steps, .. } = child else {
                panic!("expected scenario node");
            };
            let BridgeNode::Step { handler, scopes: payload, .. } = &steps[0]
            else {
                panic!("expected step node");
            };
            handler(payload.clone(), StepArgs::default()).await.unwrap();
        }

        let BridgeNode::Scenario { steps, .. } = &children[0] else {
            panic!("expected scenario node");
        };
        let BridgeNode::Step { scopes: payload, .. } = &steps[0] else {
            panic!("expected step node");
        };
        assert_eq!(payload.feature().unwrap().borrow().lines.len(), 2);

        // The single feature scope was exited exactly once, at reset.
        assert_eq!(feature_log.borrow().len(), 1);
    }
}
