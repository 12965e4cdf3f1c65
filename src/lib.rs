//! conslisp - a small cons-cell Lisp interpreter
//!
//! This crate evaluates programs written in a minimal Lisp dialect whose every
//! compound expression is a binary cons pair `(address . data)`. The surface
//! syntax accepts ordinary list notation, explicit dot notation and any mix of
//! `()`, `[]` and `{}` brackets; all of them are reconciled into one canonical
//! tree before evaluation.
//!
//! ```text
//! (sum 5 6)                                  ; 11
//! (defun sq (x) (product x x))               ; sq
//! (sq 12)                                    ; 144
//! ((lambda (x y) (product x y)) 15 7)        ; 105
//! [cond [(eq 1 2) 0] {t (quote (a . b))}]    ; (a . b)
//! ```
//!
//! ## Pipeline
//!
//! Text passes through comment stripping ([`source`]), tokenization
//! ([`lexer`]), statement splitting ([`program`]), normalization into canonical
//! dot notation ([`normalize`]), tree construction ([`ast`]) and finally
//! evaluation ([`evaluator`]) against an [`environment::Environment`] and the
//! static primitive table in [`builtinops`].
//!
//! ## Modules
//!
//! - `classify`: token classes shared by the lexer, normalizer and node model
//! - `source`: comment removal ahead of tokenization
//! - `lexer`: text to tokens
//! - `normalize`: list / mixed-bracket notation to canonical dot notation
//! - `ast`: the `Node` data model
//! - `environment`: variable and function tables with scoped substitution
//! - `builtinops`: the primitive registry
//! - `evaluator`: recursive evaluation and special forms
//! - `program`: the statement driver and result rendering

use std::fmt;

/// Maximum bracket nesting accepted by the normalizer and the node parser.
/// Right-nested list spines are not counted, only genuine nesting.
pub const MAX_PARSE_DEPTH: usize = 128;

/// Maximum evaluation depth to prevent stack overflow in recursive evaluation.
/// Every nested evaluation and every user function application adds one level.
pub const MAX_EVAL_DEPTH: usize = 256;

/// Error types for the interpreter
///
/// Each variant is one failure kind. A failing statement reports its error and
/// evaluation continues with the next statement.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Error {
    /// Text could not be split into tokens (unterminated string, unknown
    /// character, unbalanced block comment).
    LexicalError(String),
    /// Tokens do not form a well-shaped tree, or a special form received a
    /// malformed argument list.
    StructuralError(String),
    /// A name resolved to nothing.
    BindingError(String),
    /// A function definition or call violated its contract.
    DefinitionError(String),
    /// Division by zero, overflow and friends.
    ArithmeticError(String),
    /// A value of the wrong kind reached an operation.
    TypeError(String),
}

impl Error {
    /// Create a DefinitionError describing an argument count mismatch
    pub fn arity_error(name: &str, expected: usize, got: usize) -> Self {
        let direction = if got < expected { "few" } else { "many" };
        Error::DefinitionError(format!(
            "too {direction} arguments for {name}: expected {expected}, got {got}"
        ))
    }

    /// The variant name, used by reports that show the kind without the message
    pub fn kind(&self) -> &'static str {
        match self {
            Error::LexicalError(_) => "LexicalError",
            Error::StructuralError(_) => "StructuralError",
            Error::BindingError(_) => "BindingError",
            Error::DefinitionError(_) => "DefinitionError",
            Error::ArithmeticError(_) => "ArithmeticError",
            Error::TypeError(_) => "TypeError",
        }
    }

    /// The message without the kind prefix
    pub fn message(&self) -> &str {
        match self {
            Error::LexicalError(msg)
            | Error::StructuralError(msg)
            | Error::BindingError(msg)
            | Error::DefinitionError(msg)
            | Error::ArithmeticError(msg)
            | Error::TypeError(msg) => msg,
        }
    }
}

impl fmt::Display for Error {
    fn fmt(&self, f: &mut fmt::Formatter) -> fmt::Result {
        write!(f, "{}: {}", self.kind(), self.message())
    }
}

impl std::error::Error for Error {}

pub mod ast;
pub mod builtinops;
pub mod classify;
pub mod environment;
pub mod evaluator;
pub(crate) mod intooperation;
pub mod lexer;
pub mod normalize;
pub mod program;
pub mod source;

#[cfg(feature = "cli")]
pub mod cli;

pub use ast::{Atom, Cons, Node};
pub use program::{Interpreter, RunConfig, StatementOutcome};

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_error_display_and_kind() {
        let cases = vec![
            (
                Error::LexicalError("unterminated string".into()),
                "LexicalError",
                "LexicalError: unterminated string",
            ),
            (
                Error::arity_error("f", 2, 1),
                "DefinitionError",
                "DefinitionError: too few arguments for f: expected 2, got 1",
            ),
            (
                Error::arity_error("f", 1, 3),
                "DefinitionError",
                "DefinitionError: too many arguments for f: expected 1, got 3",
            ),
            (
                Error::ArithmeticError("division by zero".into()),
                "ArithmeticError",
                "ArithmeticError: division by zero",
            ),
        ];

        for (i, (err, kind, shown)) in cases.iter().enumerate() {
            assert_eq!(err.kind(), *kind, "case #{}", i + 1);
            assert_eq!(err.to_string(), *shown, "case #{}", i + 1);
        }
    }
}
