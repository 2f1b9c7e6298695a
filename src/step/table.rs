// Copyright (c) 2018-2025  Brendan Molloy <brendan@bbqsrc.net>,
//                          Ilya Solovyiov <ilya.solovyiov@gmail.com>,
//                          Kai Ren <tyranron@gmail.com>
//
// Licensed under the Apache License, Version 2.0 <LICENSE-APACHE or
// http://www.apache.org/licenses/LICENSE-2.0> or the MIT license
// <LICENSE-MIT or http://opensource.org/licenses/MIT>, at your
// option. This file may not be copied, modified, or distributed
// except according to those terms.

//! Tabular step data and declared table shapes.

use std::collections::HashMap;

use derive_more::Display;

/// Data table attached to a step, with convenience accessors over the raw
/// rows.
#[derive(Clone, Debug, Default, Eq, PartialEq)]
pub struct DataTable {
    /// All rows, including a header row if the step uses one.
    rows: Vec<Vec<String>>,
}

impl DataTable {
    /// Creates a [`DataTable`] from raw rows.
    #[must_use]
    pub fn new(rows: Vec<Vec<String>>) -> Self {
        Self { rows }
    }

    /// Creates a [`DataTable`] from a parsed [`gherkin::Table`].
    #[must_use]
    pub fn from_gherkin(table: &gherkin::Table) -> Self {
        Self { rows: table.rows.clone() }
    }

    /// Returns all rows, header included.
    #[must_use]
    pub fn raw(&self) -> &[Vec<String>] {
        &self.rows
    }

    /// Returns the rows without the header row.
    #[must_use]
    pub fn rows(&self) -> &[Vec<String>] {
        self.rows.split_first().map_or(&[], |(_, rest)| rest)
    }

    /// Returns every non-header row as a header-keyed map.
    #[must_use]
    pub fn hashes(&self) -> Vec<HashMap<String, String>> {
        let Some((header, rows)) = self.rows.split_first() else {
            return Vec::new();
        };
        rows.iter()
            .map(|row| {
                header.iter().cloned().zip(row.iter().cloned()).collect()
            })
            .collect()
    }

    /// Interprets a two-column table as a key-value map.
    #[must_use]
    pub fn rows_hash(&self) -> HashMap<String, String> {
        self.rows
            .iter()
            .filter_map(|row| match row.as_slice() {
                [k, v] => Some((k.clone(), v.clone())),
                _ => None,
            })
            .collect()
    }
}

/// Expected shape of a step's attached table, declared at registration
/// time and validated when the step is bound.
#[derive(Clone, Copy, Debug, Display, Eq, PartialEq)]
pub enum TableShape {
    /// Any table, rows accessed raw.
    #[display("raw")]
    Raw,

    /// Header row followed by at least one record row.
    #[display("headed")]
    Headed,

    /// Two-column key-value rows.
    #[display("key-value")]
    KeyValue,
}

impl TableShape {
    /// Checks whether the given table satisfies this shape.
    #[must_use]
    pub fn is_satisfied_by(self, table: &DataTable) -> bool {
        match self {
            Self::Raw => !table.raw().is_empty(),
            Self::Headed => table.raw().len() >= 2,
            Self::KeyValue => {
                !table.raw().is_empty()
                    && table.raw().iter().all(|row| row.len() == 2)
            }
        }
    }
}
