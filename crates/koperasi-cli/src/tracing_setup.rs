// Copyright 2026 Phillip Cloud
// Licensed under the Apache License, Version 2.0

//! Stderr log output for the `koperasi` binary.
//!
//! Filter priority: `KOPERASI_LOG`, then `RUST_LOG`, then `-v`/`-q`, then
//! `warn`.

use tracing::Level;
use tracing_subscriber::EnvFilter;
use tracing_subscriber::fmt;
use tracing_subscriber::prelude::*;

const LOG_ENV: &str = "KOPERASI_LOG";
const TARGET_PREFIX: &str = "koperasi";

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Verbosity {
    Quiet,
    Normal,
    Verbose,
}

impl Verbosity {
    /// `-v` wins when both flags are given.
    pub const fn from_flags(verbose: bool, quiet: bool) -> Self {
        if verbose {
            Self::Verbose
        } else if quiet {
            Self::Quiet
        } else {
            Self::Normal
        }
    }

    pub const fn default_level(self) -> Level {
        match self {
            Self::Quiet => Level::ERROR,
            Self::Normal => Level::WARN,
            Self::Verbose => Level::DEBUG,
        }
    }
}

/// Installs the global subscriber. A second call is a no-op.
pub fn init_subscriber(verbosity: Verbosity) {
    let use_ansi = std::io::IsTerminal::is_terminal(&std::io::stderr());
    let fmt_layer = fmt::layer()
        .with_writer(std::io::stderr)
        .with_ansi(use_ansi)
        .with_target(true)
        .without_time()
        .compact();

    let _ = tracing_subscriber::registry()
        .with(build_env_filter(verbosity, std::env::var(LOG_ENV).ok()))
        .with(fmt_layer)
        .try_init();
}

fn build_env_filter(verbosity: Verbosity, project_directives: Option<String>) -> EnvFilter {
    if let Some(directives) = project_directives
        && let Ok(filter) = EnvFilter::try_new(&directives)
    {
        return filter;
    }

    if let Ok(filter) = EnvFilter::try_from_default_env() {
        return filter;
    }

    EnvFilter::new(default_directive(verbosity))
}

fn default_directive(verbosity: Verbosity) -> String {
    let level = verbosity.default_level();
    if verbosity == Verbosity::Verbose {
        format!("{level},{TARGET_PREFIX}=debug")
    } else {
        level.to_string()
    }
}

#[cfg(test)]
mod tests {
    use super::{Verbosity, build_env_filter, default_directive};
    use tracing::Level;

    #[test]
    fn verbose_wins_over_quiet() {
        assert_eq!(Verbosity::from_flags(true, true), Verbosity::Verbose);
        assert_eq!(Verbosity::from_flags(false, true), Verbosity::Quiet);
        assert_eq!(Verbosity::from_flags(false, false), Verbosity::Normal);
    }

    #[test]
    fn default_levels_follow_flags() {
        assert_eq!(Verbosity::Quiet.default_level(), Level::ERROR);
        assert_eq!(Verbosity::Normal.default_level(), Level::WARN);
        assert_eq!(Verbosity::Verbose.default_level(), Level::DEBUG);
    }

    #[test]
    fn verbose_directive_raises_koperasi_targets() {
        let directive = default_directive(Verbosity::Verbose);
        assert!(directive.contains("koperasi=debug"), "{directive}");
        assert_eq!(default_directive(Verbosity::Normal).to_lowercase(), "warn");
    }

    #[test]
    fn project_directives_take_priority() {
        let filter = build_env_filter(
            Verbosity::Quiet,
            Some("koperasi::list=trace".to_owned()),
        );
        assert!(filter.to_string().contains("koperasi::list=trace"));
    }
}
