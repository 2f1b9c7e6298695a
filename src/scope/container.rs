// Copyright (c) 2018-2025  Brendan Molloy <brendan@bbqsrc.net>,
//                          Ilya Solovyiov <ilya.solovyiov@gmail.com>,
//                          Kai Ren <tyranron@gmail.com>
//
// Licensed under the Apache License, Version 2.0 <LICENSE-APACHE or
// http://www.apache.org/licenses/LICENSE-2.0> or the MIT license
// <LICENSE-MIT or http://opensource.org/licenses/MIT>, at your
// option. This file may not be copied, modified, or distributed
// except according to those terms.

//! Per-scope teardown containers.

use std::fmt;

use futures::future::LocalBoxFuture;

use crate::error::{DynError, Error};

/// Alias for a boxed teardown callback of a [`Container`].
pub type TeardownFn =
    Box<dyn FnOnce() -> LocalBoxFuture<'static, Result<(), DynError>>>;

/// Scoped teardown container owned by exactly one scope level.
///
/// Created as a child of the nearest still-live ancestor container and
/// disposed if and only if its level is discarded. Teardowns run arbitrary
/// user logic, sequentially, best-effort and without retries.
pub struct Container {
    /// Lineage path from the root container, for diagnostics.
    path: String,

    /// Registered teardown callbacks, run in registration order.
    teardowns: Vec<(String, TeardownFn)>,
}

impl fmt::Debug for Container {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("Container")
            .field("path", &self.path)
            .field("teardowns", &self.teardowns.len())
            .finish()
    }
}

impl Container {
    /// Creates a root [`Container`].
    #[must_use]
    pub fn root(label: impl Into<String>) -> Self {
        Self { path: label.into(), teardowns: Vec::new() }
    }

    /// Creates a child [`Container`] under this one.
    #[must_use]
    pub fn child(&self, label: impl AsRef<str>) -> Self {
        Self {
            path: format!("{}/{}", self.path, label.as_ref()),
            teardowns: Vec::new(),
        }
    }

    /// Lineage path of this [`Container`].
    #[must_use]
    pub fn path(&self) -> &str {
        &self.path
    }

    /// Registers a named teardown callback, run on disposal.
    pub fn on_dispose(
        &mut self,
        name: impl Into<String>,
        teardown: impl FnOnce() -> LocalBoxFuture<'static, Result<(), DynError>>
            + 'static,
    ) {
        self.teardowns.push((name.into(), Box::new(teardown)));
    }

    /// Disposes this [`Container`], running every teardown sequentially.
    ///
    /// All teardowns are attempted even when an earlier one fails; the
    /// first failure is reported, later ones are only logged.
    ///
    /// # Errors
    ///
    /// With the first teardown failure, wrapped with this [`Container`]'s
    /// path and the failing callback's name.
    pub async fn dispose(self) -> Result<(), Error> {
        tracing::debug!(path = %self.path, "disposing container");

        let mut first_failure = None;
        for (name, teardown) in self.teardowns {
            if let Err(source) = teardown().await {
                if first_failure.is_none() {
                    first_failure = Some(Error::Teardown {
                        path: self.path.clone(),
                        hook: name,
                        source,
                    });
                } else {
                    tracing::warn!(
                        path = %self.path,
                        hook = %name,
                        error = %source,
                        "suppressing subsequent teardown failure",
                    );
                }
            }
        }
        first_failure.map_or(Ok(()), Err)
    }
}

#[cfg(test)]
mod tests {
    use std::{cell::RefCell, rc::Rc};

    use futures::FutureExt as _;

    use super::*;

    #[tokio::test]
    async fn runs_teardowns_in_registration_order() {
        let order = Rc::new(RefCell::new(Vec::new()));
        let mut container = Container::root("feature:demo");

        for i in 0..3 {
            let order = Rc::clone(&order);
            container.on_dispose(format!("td-{i}"), move || {
                async move {
                    order.borrow_mut().push(i);
                    Ok(())
                }
                .boxed_local()
            });
        }

        container.dispose().await.unwrap();
        assert_eq!(*order.borrow(), [0, 1, 2]);
    }

    #[tokio::test]
    async fn first_failure_wins_but_all_teardowns_run() {
        let ran = Rc::new(RefCell::new(0));
        let mut container = Container::root("feature:demo").child("scenario:a");

        container.on_dispose("broken", || {
            async { Err::<(), _>("db gone".into()) }.boxed_local()
        });
        {
            let ran = Rc::clone(&ran);
            container.on_dispose("fine", move || {
                async move {
                    *ran.borrow_mut() += 1;
                    Ok(())
                }
                .boxed_local()
            });
        }

        let err = container.dispose().await.unwrap_err();
        assert!(matches!(
            &err,
            Error::Teardown { path, hook, .. }
                if path == "feature:demo/scenario:a" && hook == "broken"
        ));
        assert_eq!(*ran.borrow(), 1);
    }
}
