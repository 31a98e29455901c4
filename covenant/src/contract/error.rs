// Copyright Judica, Inc 2021
//
// This Source Code Form is subject to the terms of the Mozilla Public
//  License, v. 2.0. If a copy of the MPL was not distributed with this
//  file, You can obtain one at https://mozilla.org/MPL/2.0/.

//! error types that can be returned from the compiler.
//! Library errors are flattened to text so an error can be cloned and handed
//! to every waiter on a shared cache entry.
use bitcoin::util::amount::Amount;
use bitcoin::Network;
use covenant_base::miniscript;
use covenant_base::timelocks::{AnyTimeLock, LockTimeError};
use std::error::Error;
use std::fmt;

/// The compiler's core error type.
#[derive(Debug, Clone, PartialEq)]
pub enum CompilationError {
    /// A path read a field that was never bound
    UnboundField(String),
    /// A field was provided that the contract does not declare
    UnknownField(String),
    /// A provided value does not have the declared shape
    TypeMismatch {
        /// field name
        field: String,
        /// the declared type
        expected: String,
    },
    /// `set_sequence` or `set_lock_time` called twice on one template
    DoubleLock(&'static str),
    /// A relative timelock mixes blocks and time
    IncompatibleSequence,
    /// An absolute timelock mixes blocks and time
    IncompatibleLockTime,
    /// A template's outputs exceed (or, when draining, do not equal) the funds
    /// available to its input
    AmountConservation {
        /// what the spending input holds
        available: Amount,
        /// what the outputs add up to
        required: Amount,
        /// if the template must consume all of `available`
        draining: bool,
    },
    /// Output at this index has zero value
    ZeroValueOutput(usize),
    /// Amount arithmetic left the valid range
    AmountOverflow,
    /// Nesting exceeded the configured depth, or a contract contains itself
    RecursionLimit {
        /// depth at which compilation stopped
        depth: usize,
    },
    /// A single path failed
    PathCompilation {
        /// the path's name
        path: String,
        /// why it failed
        cause: Box<CompilationError>,
    },
    /// A guard requires a timelock the template does not set
    LockMismatch {
        /// the lock the guard requires
        required: AnyTimeLock,
        /// the lock of the same axis the template sets, if any
        found: Option<AnyTimeLock>,
    },
    /// An unlock entry also carries a path-level guard
    ConflictingUnlock(String),
    /// Two paths share a name
    DuplicatePath(String),
    /// Error when a path returns no Templates.
    MissingTemplates,
    /// A generator yielded more templates than allowed
    TooManyTemplates(usize),
    /// Error if a Policy is empty
    EmptyPolicy,
    /// No contract kind registered under this name
    UnknownContract(String),
    /// An address is for a different network than the compiler's
    WrongNetwork {
        /// compiler network
        expected: Network,
        /// address network
        found: Network,
    },
    /// Error from the Policy Compiler or miniscript
    Miniscript(String),
    /// Error with a Timelock
    TimeLock(LockTimeError),
    /// Error while (de)serializing
    Serialization(String),
    /// Unspecified Error -- stop compiling, share message
    TerminateWith(String),
}

impl CompilationError {
    /// Errors that must fail the whole contract even when raised inside an
    /// optional path.
    pub fn is_fatal(&self) -> bool {
        match self {
            CompilationError::UnboundField(_)
            | CompilationError::UnknownField(_)
            | CompilationError::TypeMismatch { .. }
            | CompilationError::RecursionLimit { .. } => true,
            CompilationError::PathCompilation { cause, .. } => cause.is_fatal(),
            _ => false,
        }
    }

    /// Strip any path wrappers.
    pub fn root_cause(&self) -> &CompilationError {
        match self {
            CompilationError::PathCompilation { cause, .. } => cause.root_cause(),
            e => e,
        }
    }
}

impl From<LockTimeError> for CompilationError {
    fn from(b: LockTimeError) -> Self {
        CompilationError::TimeLock(b)
    }
}
impl From<miniscript::policy::compiler::CompilerError> for CompilationError {
    fn from(v: miniscript::policy::compiler::CompilerError) -> Self {
        CompilationError::Miniscript(v.to_string())
    }
}
impl From<miniscript::Error> for CompilationError {
    fn from(v: miniscript::Error) -> Self {
        CompilationError::Miniscript(v.to_string())
    }
}
impl From<serde_json::Error> for CompilationError {
    fn from(e: serde_json::Error) -> Self {
        CompilationError::Serialization(e.to_string())
    }
}

impl fmt::Display for CompilationError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{:?}", self)
    }
}

impl Error for CompilationError {}
