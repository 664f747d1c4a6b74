// Copyright (c) The Fimo Contributors
// SPDX-License-Identifier: MIT OR Apache-2.0

use std::fmt;

/// Severity of a span or event.
///
/// Totally ordered `Off < Error < Warn < Info < Debug < Trace` (declaration order, relied on by
/// the derived `Ord`). `Off` is only ever used as a context-wide cap; spans and events are never
/// created at that level.
#[derive(Clone, Copy, Debug, Eq, Hash, Ord, PartialEq, PartialOrd)]
pub enum Level {
    /// Tracing disabled entirely.
    Off,
    /// Unrecoverable or user-facing failures.
    Error,
    /// Recoverable anomalies worth a human's attention.
    Warn,
    /// Coarse-grained lifecycle information.
    Info,
    /// Diagnostic detail useful when investigating a specific module.
    Debug,
    /// Highest-volume, lowest-severity detail.
    Trace,
}

impl fmt::Display for Level {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let s = match self {
            Level::Off => "off",
            Level::Error => "error",
            Level::Warn => "warn",
            Level::Info => "info",
            Level::Debug => "debug",
            Level::Trace => "trace",
        };
        f.write_str(s)
    }
}

#[cfg(test)]
mod tests {
    use super::Level::*;

    #[test]
    fn totally_ordered_as_documented() {
        assert!(Off < Error);
        assert!(Error < Warn);
        assert!(Warn < Info);
        assert!(Info < Debug);
        assert!(Debug < Trace);
    }
}
