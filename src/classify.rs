//! Token classes.
//!
//! The lexer, the normalizer and the node model all agree on what a token
//! is through the [`TokenClassifier`] trait. [`StandardClassifier`] is the
//! dialect's own vocabulary; the default methods implement it so a custom
//! classifier only overrides what it changes.

/// Single-character operator symbols that may appear as atoms.
pub(crate) const OPERATOR_CHARS: &str = "+-*/^'=<>";

/// Two-character relational operators, matched before single characters.
pub(crate) const RELATIONAL_OPERATORS: [&str; 2] = ["<=", ">="];

/// Character and token predicates used throughout the pipeline.
pub trait TokenClassifier {
    /// Letters start identifiers. Any alphabetic character qualifies, so `λ`
    /// is a letter.
    fn is_letter(&self, c: char) -> bool {
        c.is_alphabetic()
    }

    fn is_digit(&self, c: char) -> bool {
        c.is_ascii_digit()
    }

    fn is_sign(&self, c: char) -> bool {
        c == '+' || c == '-'
    }

    fn is_open_bracket(&self, c: char) -> bool {
        matches!(c, '(' | '[' | '{')
    }

    fn is_close_bracket(&self, c: char) -> bool {
        matches!(c, ')' | ']' | '}')
    }

    fn is_dot(&self, c: char) -> bool {
        c == '.'
    }

    fn is_string_delimiter(&self, c: char) -> bool {
        c == '"'
    }

    /// Characters that form a token on their own.
    fn is_symbol(&self, c: char) -> bool {
        self.is_open_bracket(c)
            || self.is_close_bracket(c)
            || self.is_dot(c)
            || OPERATOR_CHARS.contains(c)
    }

    fn is_relational_operator(&self, token: &str) -> bool {
        RELATIONAL_OPERATORS.contains(&token)
    }

    /// An optional sign followed by at least one digit.
    fn is_numeric_atom(&self, token: &str) -> bool {
        let digits = token.strip_prefix(['+', '-']).unwrap_or(token);
        !digits.is_empty() && digits.chars().all(|c| self.is_digit(c))
    }

    /// Letters and digits only, at least one character.
    fn is_literal(&self, token: &str) -> bool {
        !token.is_empty()
            && token
                .chars()
                .all(|c| self.is_letter(c) || self.is_digit(c))
    }

    /// A name usable for a function or a parameter: a letter followed by
    /// letters or digits.
    fn is_identifier(&self, token: &str) -> bool {
        let mut chars = token.chars();
        match chars.next() {
            Some(first) if self.is_letter(first) => {
                chars.all(|c| self.is_letter(c) || self.is_digit(c))
            }
            _ => false,
        }
    }

    /// A complete double-quoted string token.
    fn is_string_literal(&self, token: &str) -> bool {
        let mut chars = token.chars();
        match (chars.next(), chars.next_back()) {
            (Some(first), Some(last)) => {
                self.is_string_delimiter(first)
                    && self.is_string_delimiter(last)
                    && !chars.any(|c| self.is_string_delimiter(c))
            }
            _ => false,
        }
    }

    /// A single-character token that is a bracket, a dot or an operator.
    fn is_symbol_token(&self, token: &str) -> bool {
        let mut chars = token.chars();
        matches!((chars.next(), chars.next()), (Some(c), None) if self.is_symbol(c))
    }

    fn is_open_token(&self, token: &str) -> bool {
        let mut chars = token.chars();
        matches!((chars.next(), chars.next()), (Some(c), None) if self.is_open_bracket(c))
    }

    fn is_close_token(&self, token: &str) -> bool {
        let mut chars = token.chars();
        matches!((chars.next(), chars.next()), (Some(c), None) if self.is_close_bracket(c))
    }

    fn is_dot_token(&self, token: &str) -> bool {
        let mut chars = token.chars();
        matches!((chars.next(), chars.next()), (Some(c), None) if self.is_dot(c))
    }
}

/// The dialect's standard token vocabulary.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct StandardClassifier;

impl TokenClassifier for StandardClassifier {}
