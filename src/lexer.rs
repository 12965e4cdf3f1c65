//! Tokenizer: program text to an ordered token sequence.
//!
//! Tokens are matched with maximal munch in this order: two-character
//! relational operators, string literals, signed integers, letter/digit runs,
//! and finally single symbol characters. Whitespace separates tokens and is
//! discarded.

use nom::{
    IResult, Parser,
    branch::alt,
    bytes::complete::{tag, take_while, take_while1},
    character::complete::satisfy,
    combinator::recognize,
    sequence::pair,
};

use crate::Error;
use crate::classify::{StandardClassifier, TokenClassifier};

/// A single lexical token. Bracket, dot and operator tokens are one character
/// long; literals keep their full text, string quotes included.
pub type Token = String;

/// Splits text into tokens according to a [`TokenClassifier`].
#[derive(Debug, Clone, Default)]
pub struct Tokenizer<C: TokenClassifier = StandardClassifier> {
    classifier: C,
}

impl<C: TokenClassifier> Tokenizer<C> {
    pub fn new(classifier: C) -> Self {
        Tokenizer { classifier }
    }

    pub fn classifier(&self) -> &C {
        &self.classifier
    }

    /// Tokenize `text`. A one-character program is always a single token.
    pub fn tokenize(&self, text: &str) -> Result<Vec<Token>, Error> {
        if text.chars().count() == 1 {
            return Ok(vec![text.to_owned()]);
        }

        let mut tokens = Vec::new();
        let mut input = text.trim_start();
        while !input.is_empty() {
            match self.token(input) {
                Ok((rest, token)) => {
                    tokens.push(token.to_owned());
                    input = rest.trim_start();
                }
                Err(_) => return Err(self.lexical_error(text, input)),
            }
        }

        Ok(tokens)
    }

    fn token<'a>(&self, input: &'a str) -> IResult<&'a str, &'a str> {
        let c = &self.classifier;
        alt((
            alt((tag("<="), tag(">="))),
            recognize((
                satisfy(|ch| c.is_string_delimiter(ch)),
                take_while(|ch| !c.is_string_delimiter(ch)),
                satisfy(|ch| c.is_string_delimiter(ch)),
            )),
            recognize(pair(
                satisfy(|ch| c.is_sign(ch)),
                take_while1(|ch| c.is_digit(ch)),
            )),
            take_while1(|ch| c.is_letter(ch) || c.is_digit(ch)),
            recognize(satisfy(|ch| c.is_symbol(ch))),
        ))
        .parse(input)
    }

    fn lexical_error(&self, text: &str, remaining: &str) -> Error {
        let offset = text.len() - remaining.len();
        let position = text[..offset].chars().count();
        let context: String = remaining.chars().take(10).collect();
        match remaining.chars().next() {
            Some(ch) if self.classifier.is_string_delimiter(ch) => Error::LexicalError(format!(
                "unterminated string starting at position {position}: {context}"
            )),
            Some(ch) => Error::LexicalError(format!(
                "unexpected character '{ch}' at position {position}"
            )),
            None => Error::LexicalError("unexpected end of input".into()),
        }
    }
}

/// Tokenize with the standard vocabulary.
pub fn tokenize(text: &str) -> Result<Vec<Token>, Error> {
    Tokenizer::new(StandardClassifier).tokenize(text)
}

#[cfg(test)]
#[expect(clippy::unwrap_used)] // test code OK
mod tests {
    use super::*;

    #[test]
    fn test_tokenize_data_driven() {
        let cases: Vec<(&str, Vec<&str>)> = vec![
            ("(sum 5 6)", vec!["(", "sum", "5", "6", ")"]),
            (
                "(cons 6 (cons 8 (cons 20)))",
                vec![
                    "(", "cons", "6", "(", "cons", "8", "(", "cons", "20", ")", ")", ")",
                ],
            ),
            (
                "(cons (product 12 3) (cons (integerp 12) NIL))",
                vec![
                    "(", "cons", "(", "product", "12", "3", ")", "(", "cons", "(", "integerp",
                    "12", ")", "NIL", ")", ")",
                ],
            ),
            ("(<= n 1)", vec!["(", "<=", "n", "1", ")"]),
            ("(< n 1)", vec!["(", "<", "n", "1", ")"]),
            ("(- n 1)", vec!["(", "-", "n", "1", ")"]),
            ("(+ -5 +7)", vec!["(", "+", "-5", "+7", ")"]),
            ("(a . b)", vec!["(", "a", ".", "b", ")"]),
            ("{x [y]}", vec!["{", "x", "[", "y", "]", "}"]),
            ("(' (a b))", vec!["(", "'", "(", "a", "b", ")", ")"]),
            (
                "(list \"a b\" \"\")",
                vec!["(", "list", "\"a b\"", "\"\"", ")"],
            ),
            ("abc123 12abc", vec!["abc123", "12abc"]),
            ("(λ (x) x)", vec!["(", "λ", "(", "x", ")", "x", ")"]),
            ("   \n\t ", vec![]),
            ("x", vec!["x"]),
            (")", vec![")"]),
            (" ", vec![" "]),
        ];

        for (i, (input, expected)) in cases.iter().enumerate() {
            let tokens = tokenize(input).unwrap();
            assert_eq!(tokens, *expected, "case #{}: {input:?}", i + 1);
        }
    }

    #[test]
    fn test_tokenize_errors() {
        let cases = vec![
            ("(list \"abc)", "unterminated string starting at position 6"),
            ("(sum 1 @)", "unexpected character '@' at position 7"),
            ("(a ! b)", "unexpected character '!'"),
        ];

        for (i, (input, fragment)) in cases.iter().enumerate() {
            match tokenize(input) {
                Err(Error::LexicalError(msg)) => {
                    assert!(msg.contains(fragment), "case #{}: {msg}", i + 1);
                }
                other => panic!("case #{}: expected LexicalError, got {other:?}", i + 1),
            }
        }
    }
}
