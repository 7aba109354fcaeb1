//! Error types and result definitions for Jasper.
//!
//! The language has no catch construct: every error here is unrecoverable
//! within a script run and aborts execution, surfacing the originating
//! source line and a human-readable message. Both execution tiers must
//! raise the same error kind for the same triggering condition — the
//! integration tests compare tiers on `kind()` and `line()`.

use thiserror::Error;

/// The unified result type used throughout Jasper.
pub type JasperResult<T> = Result<T, JasperError>;

/// Unrecoverable script failure.
///
/// Plain access to an unresolved name is *not* an error (it yields
/// `undefined`), so there is no name-error variant.
#[derive(Error, Debug, Clone, PartialEq, Eq)]
pub enum JasperError {
    /// A value was used in a role its kind forbids: a non-function was
    /// called, a non-object was field-accessed, unorderable values were
    /// compared.
    #[error("at line {line}, type error: {message}")]
    Type {
        /// Error description.
        message: String,
        /// Originating source line (1-based; 0 when raised inside an
        /// invoker that cannot see the call site).
        line: u32,
    },

    /// Argument count mismatch at a function invocation.
    #[error("at line {line}, arity error: expected {expected} arguments, got {got}")]
    Arity {
        /// Declared parameter count.
        expected: usize,
        /// Arguments actually supplied.
        got: usize,
        /// Originating source line.
        line: u32,
    },

    /// A name was declared twice in the same scope.
    #[error("at line {line}, {name} was already declared")]
    Redeclaration {
        /// The re-declared name.
        name: String,
        /// Line of the second declaration.
        line: u32,
    },

    /// Host arithmetic fault, i.e. division or modulo by zero.
    #[error("at line {line}, arithmetic error: {message}")]
    Arithmetic {
        /// Error description.
        message: String,
        /// Originating source line.
        line: u32,
    },
}

impl JasperError {
    /// Create a type error with location.
    #[must_use]
    pub fn type_error(message: impl Into<String>, line: u32) -> Self {
        Self::Type {
            message: message.into(),
            line,
        }
    }

    /// Create an arity error.
    #[must_use]
    pub fn arity(expected: usize, got: usize, line: u32) -> Self {
        Self::Arity {
            expected,
            got,
            line,
        }
    }

    /// Create a redeclaration error.
    #[must_use]
    pub fn redeclaration(name: impl Into<String>, line: u32) -> Self {
        Self::Redeclaration {
            name: name.into(),
            line,
        }
    }

    /// Create an arithmetic error.
    #[must_use]
    pub fn arithmetic(message: impl Into<String>, line: u32) -> Self {
        Self::Arithmetic {
            message: message.into(),
            line,
        }
    }

    /// Stable kind string, used by the tier-equivalence tests.
    #[must_use]
    pub const fn kind(&self) -> &'static str {
        match self {
            Self::Type { .. } => "TypeError",
            Self::Arity { .. } => "ArityError",
            Self::Redeclaration { .. } => "RedeclarationError",
            Self::Arithmetic { .. } => "ArithmeticError",
        }
    }

    /// The originating source line.
    #[must_use]
    pub const fn line(&self) -> u32 {
        match self {
            Self::Type { line, .. }
            | Self::Arity { line, .. }
            | Self::Redeclaration { line, .. }
            | Self::Arithmetic { line, .. } => *line,
        }
    }

    /// Patch in the call-site line if the error was raised without one.
    ///
    /// Invokers see only receiver and arguments; an error they raise
    /// carries line 0 until the call site that triggered the invocation
    /// fills in the real line.
    #[must_use]
    pub fn with_line(mut self, call_line: u32) -> Self {
        let slot = match &mut self {
            Self::Type { line, .. }
            | Self::Arity { line, .. }
            | Self::Redeclaration { line, .. }
            | Self::Arithmetic { line, .. } => line,
        };
        if *slot == 0 {
            *slot = call_line;
        }
        self
    }
}
