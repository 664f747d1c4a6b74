// Copyright (c) The Fimo Contributors
// SPDX-License-Identifier: MIT OR Apache-2.0

//! A structured, already-parsed version type and its compatibility rule.
//!
//! Parsing a version out of a string is explicitly out of scope here (see the crate's top-level
//! docs) — callers that need that are expected to supply already-structured `{major, minor,
//! patch, build}` tuples, e.g. from a manifest format they control.

use std::cmp::Ordering;
use std::fmt;

/// A four-component version, as exported by a module or required by a dependent.
///
/// `Ord`/`PartialOrd` implement the "long" comparison (full lexicographic order including
/// `build`); this is distinct from [`Version::is_compatible_with`], the "short" comparison used
/// to decide whether a got-version satisfies a required version.
#[derive(Clone, Copy, Debug, Default, Eq, Hash, Ord, PartialEq, PartialOrd, serde::Serialize, serde::Deserialize)]
#[cfg_attr(feature = "proptest1", derive(proptest_derive::Arbitrary))]
pub struct Version {
    /// Major version; a difference here always means incompatible.
    pub major: u64,
    /// Minor version.
    pub minor: u64,
    /// Patch version.
    pub patch: u64,
    /// Build number. Only ever compared in the long (`Ord`) comparison.
    pub build: u64,
}

impl Version {
    /// Creates a new version from its four components.
    pub const fn new(major: u64, minor: u64, patch: u64, build: u64) -> Self {
        Self { major, minor, patch, build }
    }

    /// Returns true iff a module exporting this version (`self`, the "got" version) satisfies a
    /// dependent that required `required`.
    ///
    /// The rule:
    /// * `self.major == required.major`
    /// * if `required.major == 0`, additionally `self.minor == required.minor` (0.x releases are
    ///   not considered minor-compatible with each other, matching semver's treatment of 0.x)
    /// * `(required.major, required.minor, required.patch) <= (self.major, self.minor,
    ///   self.patch)` lexicographically
    ///
    /// `build` never participates in this predicate.
    pub fn is_compatible_with(&self, required: &Version) -> bool {
        if self.major != required.major {
            return false;
        }
        if required.major == 0 && self.minor != required.minor {
            return false;
        }
        (required.major, required.minor, required.patch) <= (self.major, self.minor, self.patch)
    }
}

impl fmt::Display for Version {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}.{}.{}+{}", self.major, self.minor, self.patch, self.build)
    }
}

/// Compares two versions for recency using the "long" comparison (i.e. [`Ord`]).
///
/// Exposed as a free function because call sites that pick "the newest of several compatible
/// exporters" read more clearly calling `version::cmp_long(a, b)` than reaching for the `Ord`
/// impl by name.
pub fn cmp_long(a: &Version, b: &Version) -> Ordering {
    a.cmp(b)
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn major_mismatch_is_incompatible() {
        let got = Version::new(2, 0, 0, 0);
        let required = Version::new(1, 0, 0, 0);
        assert!(!got.is_compatible_with(&required));
    }

    #[test]
    fn zero_major_requires_matching_minor() {
        let required = Version::new(0, 3, 0, 0);
        assert!(Version::new(0, 3, 5, 0).is_compatible_with(&required));
        assert!(!Version::new(0, 4, 0, 0).is_compatible_with(&required));
    }

    #[test]
    fn patch_must_be_at_least_required() {
        let required = Version::new(1, 2, 3, 0);
        assert!(Version::new(1, 2, 3, 0).is_compatible_with(&required));
        assert!(Version::new(1, 2, 4, 0).is_compatible_with(&required));
        assert!(!Version::new(1, 2, 2, 0).is_compatible_with(&required));
    }

    #[test]
    fn minor_greater_than_required_is_fine_outside_zero_major() {
        let required = Version::new(1, 2, 0, 0);
        assert!(Version::new(1, 5, 0, 0).is_compatible_with(&required));
    }

    #[test]
    fn build_never_affects_compatibility() {
        let required = Version::new(1, 0, 0, 99);
        assert!(Version::new(1, 0, 0, 0).is_compatible_with(&required));
    }

    #[test]
    fn long_comparison_orders_by_build_last() {
        assert!(cmp_long(&Version::new(1, 0, 0, 1), &Version::new(1, 0, 0, 2)) == Ordering::Less);
    }
}
