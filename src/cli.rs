// Copyright (c) 2018-2025  Brendan Molloy <brendan@bbqsrc.net>,
//                          Ilya Solovyiov <ilya.solovyiov@gmail.com>,
//                          Kai Ren <tyranron@gmail.com>
//
// Licensed under the Apache License, Version 2.0 <LICENSE-APACHE or
// http://www.apache.org/licenses/LICENSE-2.0> or the MIT license
// <LICENSE-MIT or http://opensource.org/licenses/MIT>, at your
// option. This file may not be copied, modified, or distributed
// except according to those terms.

//! CLI options of the engine, for composing into an embedder's own
//! [`clap`] interface.

use std::str::FromStr;

use smart_default::SmartDefault;

use crate::suggest::{self, Styles};

/// Engine CLI options.
#[derive(Clone, Copy, Debug, SmartDefault, clap::Args)]
#[group(skip)]
pub struct Cli {
    /// Number of near-miss suggestions reported for an unresolved step.
    #[arg(
        long,
        value_name = "int",
        default_value_t = suggest::DEFAULT_LIMIT,
        global = true
    )]
    #[default(suggest::DEFAULT_LIMIT)]
    pub suggestions: usize,

    /// Coloring policy for a console output.
    #[arg(
        long,
        value_name = "auto|always|never",
        default_value = "auto",
        global = true
    )]
    #[default(Coloring::Auto)]
    pub color: Coloring,
}

/// Possible policies of a [`console`] output coloring.
#[derive(Clone, Copy, Debug, Default, Eq, PartialEq)]
pub enum Coloring {
    /// Letting [`console::colors_enabled()`] to decide, whether output
    /// should be colored.
    #[default]
    Auto,

    /// Forcing of a colored output.
    Always,

    /// Forcing of a non-colored output.
    Never,
}

impl FromStr for Coloring {
    type Err = &'static str;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.to_ascii_lowercase().as_str() {
            "auto" => Ok(Self::Auto),
            "always" => Ok(Self::Always),
            "never" => Ok(Self::Never),
            _ => Err("possible options: auto, always, never"),
        }
    }
}

impl Coloring {
    /// Resolves this policy into suggestion-report [`Styles`].
    #[must_use]
    pub fn styles(self) -> Styles {
        match self {
            Self::Auto => Styles::new(),
            Self::Always => Styles { is_present: true, ..Styles::default() },
            Self::Never => Styles::none(),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn coloring_parses_case_insensitively() {
        assert_eq!("Always".parse::<Coloring>(), Ok(Coloring::Always));
        assert_eq!("auto".parse::<Coloring>(), Ok(Coloring::Auto));
        assert!("rainbow".parse::<Coloring>().is_err());
    }

    #[test]
    fn never_coloring_disables_styles() {
        assert!(!Coloring::Never.styles().is_present);
        assert!(Coloring::Always.styles().is_present);
    }

    #[test]
    fn defaults_match_cli_defaults() {
        let cli = Cli::default();
        assert_eq!(cli.suggestions, suggest::DEFAULT_LIMIT);
        assert_eq!(cli.color, Coloring::Auto);
    }
}
