// This Source Code Form is subject to the terms of the Mozilla Public
// License, v. 2.0. If a copy of the MPL was not distributed with this
// file, You can obtain one at https://mozilla.org/MPL/2.0/.

//! ### Error taxonomy
//!
//! Every failure mode the engine can produce collapses into one of the
//! built-in error kinds below (spec §7). Lex and tokenize failures are
//! always [`SyntaxError`](ErrorKind::SyntaxError) and are raised before any
//! `Value` exists to carry them; once evaluation starts, all errors are
//! represented as a thrown [`Value`](crate::value::Value) wrapped in
//! [`Completion::Throw`](crate::eval::Completion::Throw), and `JsError`
//! below is only the host-facing view of an *uncaught* throw.

use core::fmt;

use crate::value::Value;

/// A source location attached to a diagnostic: 1-based line and column,
/// plus the file name the engine was given at `execute`/`evaluate` time.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct SourceLoc {
    pub file_name: std::string::String,
    pub line: u32,
    pub column: u32,
}

impl SourceLoc {
    pub fn unknown() -> Self {
        Self {
            file_name: std::string::String::new(),
            line: 0,
            column: 0,
        }
    }
}

impl fmt::Display for SourceLoc {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        if self.file_name.is_empty() {
            write!(f, "{}:{}", self.line, self.column)
        } else {
            write!(f, "{}:{}:{}", self.file_name, self.line, self.column)
        }
    }
}

/// The five built-in error kinds named in spec §6/§7. `Error` is the base
/// kind; the rest are its conventional ECMAScript subclasses. The engine
/// never needs more than this set because built-in library content
/// (which would throw its own error subclasses) is out of scope.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ErrorKind {
    Error,
    EvalError,
    RangeError,
    ReferenceError,
    SyntaxError,
    TypeError,
}

impl ErrorKind {
    pub fn name(self) -> &'static str {
        match self {
            ErrorKind::Error => "Error",
            ErrorKind::EvalError => "EvalError",
            ErrorKind::RangeError => "RangeError",
            ErrorKind::ReferenceError => "ReferenceError",
            ErrorKind::SyntaxError => "SyntaxError",
            ErrorKind::TypeError => "TypeError",
        }
    }
}

/// Failure while scanning bytes into tokens (spec §4.1), before a
/// `Tokenizer` or `Value` exists. Always surfaces as `SyntaxError`.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct LexError {
    pub message: std::string::String,
    pub at: SourceLoc,
}

impl fmt::Display for LexError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "SyntaxError: {} ({})", self.message, self.at)
    }
}

impl std::error::Error for LexError {}

/// Failure while building the structural token tree (spec §4.2):
/// unexpected token, duplicate label, `let`/`const` re-declaration,
/// assignment to a non-reference. Always surfaces as `SyntaxError` or
/// `ReferenceError` per spec §7's static-error row.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ParseError {
    pub kind: ErrorKind,
    pub message: std::string::String,
    pub at: SourceLoc,
}

impl fmt::Display for ParseError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}: {} ({})", self.kind.name(), self.message, self.at)
    }
}

impl std::error::Error for ParseError {}

impl From<LexError> for ParseError {
    fn from(e: LexError) -> Self {
        ParseError {
            kind: ErrorKind::SyntaxError,
            message: e.message,
            at: e.at,
        }
    }
}

/// The host-facing error surface: an uncaught throw at the top level,
/// or a static lex/parse failure. Carries the same fields a thrown
/// `Error`-typed `Value` exposes (spec §6: `name`, `message`, `fileName`,
/// `lineNumber`, `column`), plus the original thrown `Value` when one
/// exists, so embedders can inspect arbitrary thrown values, not just
/// `Error` instances.
#[derive(Debug, Clone)]
pub struct JsError {
    pub kind: ErrorKind,
    pub message: std::string::String,
    pub at: SourceLoc,
    pub thrown: Option<Value>,
}

impl fmt::Display for JsError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}: {} ({})", self.kind.name(), self.message, self.at)
    }
}

impl std::error::Error for JsError {}

impl From<ParseError> for JsError {
    fn from(e: ParseError) -> Self {
        JsError {
            kind: e.kind,
            message: e.message,
            at: e.at,
            thrown: None,
        }
    }
}

impl From<LexError> for JsError {
    fn from(e: LexError) -> Self {
        ParseError::from(e).into()
    }
}

pub type JsResult<T> = Result<T, JsError>;
