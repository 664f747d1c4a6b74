// Copyright (c) The Fimo Contributors
// SPDX-License-Identifier: MIT OR Apache-2.0

//! Contains the error type returned by every fallible `fimo_std` operation.

use crate::version::Version;
use std::error;
use std::fmt;
use std::io;

use Error::*;

/// Error type describing the sorts of errors `fimo_std` operations can return.
///
/// There is no library-wide `anyhow`/`eyre`-style boxed error here: every failure is one of a
/// closed set of codes (the boundary's error taxonomy), each carrying a human-readable message or
/// the specific data needed to explain it (e.g. the two `Version`s in [`Error::NotCompatible`]).
#[derive(Debug)]
#[non_exhaustive]
pub enum Error {
    /// An argument or the receiver's state was invalid for the requested operation.
    Invalid(String),
    /// The operation is forbidden for the caller, or a state-machine transition was illegal.
    Permission(String),
    /// The named entity does not exist.
    NotFound(String),
    /// An entity with the same identity already exists.
    AlreadyExists(String),
    /// A capacity or allocation limit was exceeded.
    OutOfMemory(String),
    /// An arithmetic operation (typically id allocation) overflowed its representable range.
    OutOfRange(String),
    /// A required [`Version`] was not compatible with the version actually present. See
    /// `Version::is_compatible_with` for the exact rule.
    NotCompatible {
        /// The version that was required.
        required: Version,
        /// The version that was found.
        got: Version,
    },
    /// Passthrough of a host OS error (file I/O while discovering modules, etc).
    System(io::Error),
}

impl fmt::Display for Error {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Invalid(msg) => write!(f, "invalid argument or state: {}", msg),
            Permission(msg) => write!(f, "operation not permitted: {}", msg),
            NotFound(msg) => write!(f, "not found: {}", msg),
            AlreadyExists(msg) => write!(f, "already exists: {}", msg),
            OutOfMemory(msg) => write!(f, "out of memory: {}", msg),
            OutOfRange(msg) => write!(f, "out of range: {}", msg),
            NotCompatible { required, got } => {
                write!(f, "version {} is not compatible with required {}", got, required)
            }
            System(err) => write!(f, "system error: {}", err),
        }
    }
}

impl error::Error for Error {
    fn source(&self) -> Option<&(dyn error::Error + 'static)> {
        match self {
            System(err) => Some(err),
            _ => None,
        }
    }
}

impl From<io::Error> for Error {
    fn from(err: io::Error) -> Self {
        Error::System(err)
    }
}

/// Convenience alias used throughout `fimo_std`.
pub type Result<T> = std::result::Result<T, Error>;
