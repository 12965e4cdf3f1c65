//! Tree normalization: list and mixed-bracket notation to canonical dot
//! notation.
//!
//! Every clause is rewritten to the token sequence `( address . data )`,
//! recursively, so the node parser only ever sees one shape:
//!
//! ```text
//! (a b c)        =>  ( a . ( b . ( c . NIL ) ) )
//! (a b . c)      =>  ( a . ( b . c ) )
//! {f [x y}       =>  ( f . ( ( x . ( y . NIL ) ) . NIL ) )
//! ()             =>  NIL
//! ```
//!
//! Brackets match by nesting depth only; `(`, `[` and `{` are interchangeable,
//! as are their closing counterparts. Output brackets are always `(` and `)`.

use crate::ast::NIL_LITERAL;
use crate::classify::{StandardClassifier, TokenClassifier};
use crate::lexer::Token;
use crate::{Error, MAX_PARSE_DEPTH};

/// Rewrites bracketed clauses into canonical dot notation.
#[derive(Debug, Clone, Default)]
pub struct TreeNormalizer<C: TokenClassifier = StandardClassifier> {
    classifier: C,
}

impl<C: TokenClassifier> TreeNormalizer<C> {
    pub fn new(classifier: C) -> Self {
        TreeNormalizer { classifier }
    }

    /// Index of the close bracket matching the open bracket at `start`.
    pub fn clause_end(&self, tokens: &[Token], start: usize) -> Result<usize, Error> {
        let mut depth = 0usize;
        for (i, token) in tokens.iter().enumerate().skip(start) {
            if self.classifier.is_open_token(token) {
                depth += 1;
            } else if self.classifier.is_close_token(token) {
                depth = depth.saturating_sub(1);
                if depth == 0 {
                    return Ok(i);
                }
            }
            if depth == 0 {
                break;
            }
        }
        Err(Error::StructuralError(format!(
            "missing close bracket for clause starting with '{}'",
            tokens.get(start).map_or("", String::as_str)
        )))
    }

    /// Normalize one statement: either a single atom token or one complete
    /// bracketed clause.
    pub fn normalize(&self, tokens: &[Token]) -> Result<Vec<Token>, Error> {
        match tokens {
            [] => Err(Error::StructuralError("empty statement".into())),
            [single] if !self.is_structural(single) => Ok(vec![single.clone()]),
            [first, ..] if self.classifier.is_open_token(first) => {
                let end = self.clause_end(tokens, 0)?;
                if end + 1 != tokens.len() {
                    return Err(Error::StructuralError(format!(
                        "unexpected '{}' after the end of the clause",
                        tokens[end + 1]
                    )));
                }
                let mut out = Vec::with_capacity(tokens.len() * 2);
                self.normalize_clause(tokens, &mut out, 0)?;
                Ok(out)
            }
            [first, ..] => Err(Error::StructuralError(format!(
                "statement cannot start with '{first}'"
            ))),
        }
    }

    fn is_structural(&self, token: &str) -> bool {
        self.classifier.is_open_token(token)
            || self.classifier.is_close_token(token)
            || self.classifier.is_dot_token(token)
    }

    /// `clause` spans one balanced clause, brackets included.
    fn normalize_clause(
        &self,
        clause: &[Token],
        out: &mut Vec<Token>,
        depth: usize,
    ) -> Result<(), Error> {
        if depth >= MAX_PARSE_DEPTH {
            return Err(Error::StructuralError(format!(
                "expression too deeply nested (max depth: {MAX_PARSE_DEPTH})"
            )));
        }

        let inner = &clause[1..clause.len() - 1];
        if inner.is_empty() {
            out.push(NIL_LITERAL.to_owned());
            return Ok(());
        }

        // The list spine is unrolled iteratively; only nested clauses recurse.
        let mut rest = inner;
        let mut opened = 0usize;
        loop {
            if self.classifier.is_dot_token(&rest[0]) {
                return Err(Error::StructuralError(
                    "missing address before '.'".into(),
                ));
            }
            let end = self.element_end(rest)?;
            out.push("(".to_owned());
            opened += 1;
            self.emit_element(&rest[..end], out, depth)?;
            out.push(".".to_owned());

            rest = &rest[end..];
            match rest.first() {
                None => {
                    out.push(NIL_LITERAL.to_owned());
                    break;
                }
                Some(token) if self.classifier.is_dot_token(token) => {
                    let data = &rest[1..];
                    if data.is_empty() {
                        return Err(Error::StructuralError("missing data after '.'".into()));
                    }
                    if self.classifier.is_dot_token(&data[0]) {
                        return Err(Error::StructuralError("unexpected '.' after '.'".into()));
                    }
                    if self.element_end(data)? != data.len() {
                        return Err(Error::StructuralError(
                            "data after '.' must be a single element".into(),
                        ));
                    }
                    self.emit_element(data, out, depth)?;
                    break;
                }
                Some(_) => {}
            }
        }

        out.extend(std::iter::repeat_n(")".to_owned(), opened));
        Ok(())
    }

    /// Length of the leading element of `seq`: one token, or a whole clause.
    fn element_end(&self, seq: &[Token]) -> Result<usize, Error> {
        let first = &seq[0];
        if self.classifier.is_open_token(first) {
            Ok(self.clause_end(seq, 0)? + 1)
        } else if self.classifier.is_close_token(first) {
            Err(Error::StructuralError(format!("unexpected '{first}'")))
        } else {
            Ok(1)
        }
    }

    fn emit_element(&self, element: &[Token], out: &mut Vec<Token>, depth: usize) -> Result<(), Error> {
        match element {
            [atom] => {
                out.push(atom.clone());
                Ok(())
            }
            _ => self.normalize_clause(element, out, depth + 1),
        }
    }
}

/// Normalize one statement with the standard vocabulary.
pub fn to_dot_notation(tokens: &[Token]) -> Result<Vec<Token>, Error> {
    TreeNormalizer::new(StandardClassifier).normalize(tokens)
}

/// Index of the close bracket matching the open bracket at `start`.
pub fn clause_end(tokens: &[Token], start: usize) -> Result<usize, Error> {
    TreeNormalizer::new(StandardClassifier).clause_end(tokens, start)
}
