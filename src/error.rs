//! Typed errors returned by the core.
//!
//! Mirrors the teacher's `fail.rs`/`failx.rs` convention of small free
//! functions that both build an error value and leave a debug trace behind,
//! but replaces the `io::Error` + string-message idiom with a `thiserror`
//! enum carrying the error kinds from the specification.

use std::fmt;

use thiserror::Error;

/// Errors produced by the richacl core.
#[derive(Error, Debug, Clone, PartialEq, Eq)]
pub enum Error {
    /// Malformed text, bad binary payload, unknown flags/masks, or a
    /// non-representable identity.
    #[error("invalid input: {0}")]
    InvalidInput(String),

    /// A user or group name could not be resolved during text parsing.
    #[error("no such identity: {0}")]
    NoSuchIdentity(String),

    /// Entry count exceeds the binary codec's `MAX_COUNT`.
    #[error("capacity exceeded: {0}")]
    CapacityExceeded(String),

    /// Allocation failure (string duplication, growth).
    #[error("out of memory: {0}")]
    OutOfMemory(String),

    /// `equiv_mode` determined the ACL has no mode-shaped equivalent.
    #[error("not representable as a mode: {0}")]
    NotRepresentable(String),

    /// No xattr payload present (collaborator-level; the core never raises
    /// this itself, but `Error` carries it so callers of the external xattr
    /// collaborator can report it uniformly).
    #[error("not found: {0}")]
    NotFound(String),
}

pub type Result<T> = std::result::Result<T, Error>;

/// Build an [`Error::InvalidInput`], leaving a debug trace.
pub(crate) fn invalid_input(msg: impl fmt::Display) -> Error {
    let msg = msg.to_string();
    log::debug!("invalid input: {msg}");
    Error::InvalidInput(msg)
}

/// Build an [`Error::NoSuchIdentity`], leaving a debug trace.
pub(crate) fn no_such_identity(who: impl fmt::Display) -> Error {
    let msg = who.to_string();
    log::debug!("no such identity: {msg}");
    Error::NoSuchIdentity(msg)
}

/// Build an [`Error::CapacityExceeded`], leaving a debug trace.
pub(crate) fn capacity_exceeded(msg: impl fmt::Display) -> Error {
    let msg = msg.to_string();
    log::debug!("capacity exceeded: {msg}");
    Error::CapacityExceeded(msg)
}

/// Build an [`Error::NotRepresentable`], leaving a debug trace.
pub(crate) fn not_representable(msg: impl fmt::Display) -> Error {
    let msg = msg.to_string();
    log::debug!("not representable: {msg}");
    Error::NotRepresentable(msg)
}

/// A diagnostic reporter for the text parser: called once per malformed
/// token before `parse` returns `Error::InvalidInput`, so a caller can show
/// every problem instead of only the first.
pub trait DiagnosticReporter {
    fn report(&mut self, line: usize, column: usize, message: &str);
}

/// A reporter that discards every diagnostic.
#[derive(Default)]
pub struct NullReporter;

impl DiagnosticReporter for NullReporter {
    fn report(&mut self, _line: usize, _column: usize, _message: &str) {}
}

/// A reporter that collects diagnostics into a `Vec`, useful for tests.
#[derive(Default)]
pub struct VecReporter(pub Vec<String>);

impl DiagnosticReporter for VecReporter {
    fn report(&mut self, line: usize, column: usize, message: &str) {
        self.0.push(format!("{line}:{column}: {message}"));
    }
}
