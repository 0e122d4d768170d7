// Copyright (c) 2026, All rights reserved.
//
// This Source Code Form is subject to the terms of
// the Mozilla Public License version 2.0 and additional exceptions.
// For more details, see the LICENSE, LICENSE.additional, and CONTRIBUTING files.

//! Error kinds (spec.md §7): the catchable/hard/silent trichotomy that
//! drives TRY unwinding, plus the Rust-level [`EngineError`] for conditions
//! that aren't MUF-level aborts at all.

use std::fmt;

use muf_host::HostError;
use muf_types::ProgramId;

/// How an abort propagates (spec.md §7).
#[derive(Debug, Clone)]
pub enum AbortKind {
    /// Caught by the nearest TRY if one exists; otherwise reported to the
    /// user and the frame is cleaned.
    Recoverable(String),
    /// Never caught, even with an active try-frame: corrupted instruction,
    /// invalid address, instruction-count ceiling, internal invariant
    /// violation.
    Hard(String),
    /// Cancellation that must not be observable: no message, bypasses any
    /// enclosing TRY just like `Hard`.
    Silent,
}

impl AbortKind {
    /// Recoverable aborts divert to a try-frame; `Hard` and `Silent` do
    /// not (spec.md §4.3 step 7, §7).
    pub fn is_catchable(&self) -> bool {
        matches!(self, AbortKind::Recoverable(_))
    }

    pub fn message(&self) -> Option<&str> {
        match self {
            AbortKind::Recoverable(m) | AbortKind::Hard(m) => Some(m),
            AbortKind::Silent => None,
        }
    }
}

/// Errors surfaced by the dispatcher's public API that are not MUF-program
/// aborts: host trait failures, or conditions the caller must handle before
/// even entering the loop.
#[derive(Debug)]
pub enum EngineError {
    Host(HostError),
    /// `interp()`'s up-front permission check (spec.md §4.4) failed: the
    /// program (or its owner) has no permission level, or the source isn't
    /// a true wizard and can't link to the program.
    PermissionDenied,
    /// A hard, non-catchable abort reached the top of the dispatcher with
    /// no enclosing frame left to report it to.
    Aborted(String),
}

impl fmt::Display for EngineError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            EngineError::Host(e) => write!(f, "{}", e),
            EngineError::PermissionDenied => write!(f, "Program call: Permission denied."),
            EngineError::Aborted(msg) => write!(f, "aborted: {}", msg),
        }
    }
}

impl std::error::Error for EngineError {}

impl From<HostError> for EngineError {
    fn from(e: HostError) -> Self {
        EngineError::Host(e)
    }
}

/// The user-visible uncaught-error report (spec.md §7's two formats),
/// rendered by the caller via [`crate::report::format_uncaught`].
#[derive(Debug, Clone)]
pub struct UncaughtError {
    pub program: ProgramId,
    pub origin_program: ProgramId,
    pub line: i32,
    pub message1: String,
    pub message2: String,
}
