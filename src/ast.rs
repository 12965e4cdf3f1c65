//! This module defines the node model every expression is built from. A
//! [`Node`] is either an [`Atom`] (an indivisible literal) or a [`Cons`] (a pair
//! `(address . data)` owning both children). Lists are right-nested conses ending
//! in the `NIL` atom. Equality and hashing are structural, and the canonical token
//! form produced by [`Node::to_tokens`] parses back into an equal node through
//! [`Node::from_tokens`].

use std::borrow::Cow;
use std::fmt;
use std::hash::{Hash, Hasher};

use crate::classify::{StandardClassifier, TokenClassifier};
use crate::lexer::Token;
use crate::{Error, MAX_PARSE_DEPTH};

/// Type alias for number values in interpreter
pub type NumberType = i64;

pub(crate) const T_LITERAL: &str = "T";
pub(crate) const NIL_LITERAL: &str = "NIL";

/// An indivisible literal: identifier, integer, string, operator or boolean.
///
/// The boolean constants borrow a `'static` literal, so every `T` and every
/// `NIL` produced by the interpreter shares the same storage.
#[derive(Debug, Clone, PartialEq, Eq, Hash)]
pub struct Atom(Cow<'static, str>);

impl Atom {
    pub const T: Atom = Atom(Cow::Borrowed(T_LITERAL));
    pub const NIL: Atom = Atom(Cow::Borrowed(NIL_LITERAL));

    /// Handle for the `id`-th closure of a statement. The `#<...>` form
    /// cannot be lexed, so no source identifier can shadow it.
    pub(crate) fn closure(id: usize) -> Atom {
        Atom(Cow::Owned(format!("#<lambda:{id}>")))
    }

    /// Create an atom from a token, validating it against the lexical classes.
    pub fn from_literal(literal: &str) -> Result<Atom, Error> {
        match literal {
            T_LITERAL => return Ok(Atom::T),
            NIL_LITERAL => return Ok(Atom::NIL),
            _ => {}
        }

        let c = StandardClassifier;
        if c.is_literal(literal)
            || c.is_numeric_atom(literal)
            || c.is_string_literal(literal)
            || c.is_relational_operator(literal)
            || c.is_symbol_token(literal)
        {
            Ok(Atom(Cow::Owned(literal.to_owned())))
        } else {
            Err(Error::StructuralError(format!(
                "'{literal}' is not a valid atom"
            )))
        }
    }

    pub fn from_bool(b: bool) -> Atom {
        if b { Atom::T } else { Atom::NIL }
    }

    pub fn from_int(n: NumberType) -> Atom {
        Atom(Cow::Owned(n.to_string()))
    }

    pub fn as_str(&self) -> &str {
        &self.0
    }

    pub fn is_nil(&self) -> bool {
        self.0 == NIL_LITERAL
    }

    pub fn is_true(&self) -> bool {
        self.0 == T_LITERAL
    }

    pub fn is_boolean(&self) -> bool {
        self.is_nil() || self.is_true()
    }

    pub fn is_numeric(&self) -> bool {
        StandardClassifier.is_numeric_atom(&self.0)
    }

    /// The integer value of a numeric atom. `None` for non-numeric atoms and
    /// for numerals outside the `i64` range.
    pub fn as_int(&self) -> Option<NumberType> {
        if self.is_numeric() {
            self.0.parse().ok()
        } else {
            None
        }
    }
}

impl fmt::Display for Atom {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        // A redundant leading '+' is dropped from numerals.
        match self.0.strip_prefix('+') {
            Some(digits) if self.is_numeric() => write!(f, "{digits}"),
            _ => write!(f, "{}", self.0),
        }
    }
}

/// A pair node. Owns its address and data exclusively.
///
/// Cloning, comparison, hashing and dropping walk the data spine with a loop,
/// so list length never turns into stack depth. Only address nesting
/// recurses.
pub struct Cons {
    address: Box<Node>,
    data: Box<Node>,
}

impl Cons {
    pub fn new(address: Node, data: Node) -> Self {
        Cons {
            address: Box::new(address),
            data: Box::new(data),
        }
    }

    pub fn address(&self) -> &Node {
        &self.address
    }

    pub fn data(&self) -> &Node {
        &self.data
    }

    pub fn into_parts(mut self) -> (Node, Node) {
        let address = std::mem::replace(&mut *self.address, Node::nil());
        let data = std::mem::replace(&mut *self.data, Node::nil());
        (address, data)
    }

    /// A cons is a list when its data is `NIL` or itself a list.
    pub fn is_list(&self) -> bool {
        let mut tail = self.data();
        loop {
            match tail {
                Node::Atom(atom) => return atom.is_nil(),
                Node::Cons(cons) => tail = cons.data(),
            }
        }
    }
}

impl Clone for Cons {
    fn clone(&self) -> Self {
        let mut addresses = Vec::new();
        let mut tail = self.data();
        while let Node::Cons(cell) = tail {
            addresses.push(cell.address().clone());
            tail = cell.data();
        }
        let data = addresses
            .into_iter()
            .rev()
            .fold(tail.clone(), |data, address| Node::cons(address, data));
        Cons::new(self.address().clone(), data)
    }
}

impl PartialEq for Cons {
    fn eq(&self, other: &Self) -> bool {
        let (mut left, mut right) = (self, other);
        loop {
            if left.address() != right.address() {
                return false;
            }
            match (left.data(), right.data()) {
                (Node::Cons(l), Node::Cons(r)) => {
                    left = l;
                    right = r;
                }
                (l, r) => return l == r,
            }
        }
    }
}

impl Eq for Cons {}

impl Hash for Cons {
    fn hash<H: Hasher>(&self, state: &mut H) {
        let mut cell = self;
        loop {
            cell.address().hash(state);
            match cell.data() {
                Node::Cons(next) => cell = next,
                tail => return tail.hash(state),
            }
        }
    }
}

impl Drop for Cons {
    fn drop(&mut self) {
        let mut tail = std::mem::replace(&mut *self.data, Node::nil());
        while let Node::Cons(mut cell) = tail {
            tail = std::mem::replace(&mut *cell.data, Node::nil());
        }
    }
}

impl fmt::Debug for Cons {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "Cons({self})")
    }
}

impl fmt::Display for Cons {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        if self.is_list() {
            write!(f, "(")?;
            let mut cell = self;
            loop {
                write!(f, "{}", cell.address())?;
                match cell.data() {
                    Node::Cons(next) => {
                        write!(f, " ")?;
                        cell = next;
                    }
                    Node::Atom(_) => break,
                }
            }
            write!(f, ")")
        } else {
            write!(f, "({} . {})", self.address(), self.data())
        }
    }
}

/// Core expression type
#[derive(Clone, PartialEq, Eq, Hash)]
pub enum Node {
    Atom(Atom),
    Cons(Cons),
}

impl fmt::Debug for Node {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Node::Atom(atom) => write!(f, "Atom({})", atom.as_str()),
            Node::Cons(cons) => write!(f, "{cons:?}"),
        }
    }
}

impl fmt::Display for Node {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Node::Atom(atom) => write!(f, "{atom}"),
            Node::Cons(cons) => write!(f, "{cons}"),
        }
    }
}

impl Node {
    pub fn nil() -> Node {
        Node::Atom(Atom::NIL)
    }

    pub fn t() -> Node {
        Node::Atom(Atom::T)
    }

    /// Create an atom node from a token, validating it.
    pub fn atom(literal: &str) -> Result<Node, Error> {
        Atom::from_literal(literal).map(Node::Atom)
    }

    pub fn cons(address: Node, data: Node) -> Node {
        Node::Cons(Cons::new(address, data))
    }

    /// Build a proper list. An empty iterator yields `NIL`.
    pub fn list<I>(items: I) -> Node
    where
        I: IntoIterator<Item = Node>,
        I::IntoIter: DoubleEndedIterator,
    {
        items
            .into_iter()
            .rev()
            .fold(Node::nil(), |tail, item| Node::cons(item, tail))
    }

    pub fn as_atom(&self) -> Option<&Atom> {
        match self {
            Node::Atom(atom) => Some(atom),
            Node::Cons(_) => None,
        }
    }

    pub fn as_cons(&self) -> Option<&Cons> {
        match self {
            Node::Cons(cons) => Some(cons),
            Node::Atom(_) => None,
        }
    }

    pub fn is_atom(&self) -> bool {
        matches!(self, Node::Atom(_))
    }

    pub fn is_nil(&self) -> bool {
        matches!(self, Node::Atom(atom) if atom.is_nil())
    }

    pub fn is_true(&self) -> bool {
        matches!(self, Node::Atom(atom) if atom.is_true())
    }

    pub fn is_numeric(&self) -> bool {
        matches!(self, Node::Atom(atom) if atom.is_numeric())
    }

    pub fn as_int(&self) -> Option<NumberType> {
        self.as_atom().and_then(Atom::as_int)
    }

    /// Atoms are never lists; see [`Cons::is_list`].
    pub fn is_list(&self) -> bool {
        match self {
            Node::Atom(_) => false,
            Node::Cons(cons) => cons.is_list(),
        }
    }

    /// Iterate over the addresses along the right spine.
    pub fn elements(&self) -> Elements<'_> {
        Elements { cursor: self }
    }

    /// The spine's elements when `self` is `NIL` or a proper list.
    pub fn proper_list(&self) -> Option<Vec<&Node>> {
        match self {
            Node::Atom(atom) if atom.is_nil() => Some(Vec::new()),
            Node::Cons(cons) if cons.is_list() => Some(self.elements().collect()),
            _ => None,
        }
    }

    /// Canonical dotted token rendering: `( <address> . <data> )`.
    pub fn to_tokens(&self) -> Vec<Token> {
        let mut out = Vec::new();
        self.write_tokens(&mut out);
        out
    }

    fn write_tokens(&self, out: &mut Vec<Token>) {
        let mut node = self;
        let mut opened = 0usize;
        while let Node::Cons(cons) = node {
            out.push("(".to_owned());
            cons.address().write_tokens(out);
            out.push(".".to_owned());
            opened += 1;
            node = cons.data();
        }
        if let Node::Atom(atom) = node {
            out.push(atom.as_str().to_owned());
        }
        out.extend(std::iter::repeat_n(")".to_owned(), opened));
    }

    /// Parse a canonical dotted token sequence into a freshly owned tree.
    ///
    /// The whole sequence must form exactly one node.
    pub fn from_tokens(tokens: Vec<Token>) -> Result<Node, Error> {
        let mut parser = NodeParser {
            tokens: tokens.into_iter().peekable(),
        };
        let node = parser.parse_node(0)?;
        match parser.tokens.next() {
            None => Ok(node),
            Some(extra) => Err(Error::StructuralError(format!(
                "unexpected '{extra}' after a complete expression"
            ))),
        }
    }
}

/// Iterator over the addresses along a node's right spine.
pub struct Elements<'a> {
    cursor: &'a Node,
}

impl<'a> Iterator for Elements<'a> {
    type Item = &'a Node;

    fn next(&mut self) -> Option<Self::Item> {
        match self.cursor {
            Node::Cons(cons) => {
                self.cursor = cons.data();
                Some(cons.address())
            }
            Node::Atom(_) => None,
        }
    }
}

struct NodeParser {
    tokens: std::iter::Peekable<std::vec::IntoIter<Token>>,
}

impl NodeParser {
    fn parse_node(&mut self, depth: usize) -> Result<Node, Error> {
        if depth >= MAX_PARSE_DEPTH {
            return Err(Error::StructuralError(format!(
                "expression too deeply nested (max depth: {MAX_PARSE_DEPTH})"
            )));
        }
        if self.peek_is_open() {
            self.parse_cons(depth)
        } else {
            self.parse_atom()
        }
    }

    /// Parses `( a . ( b . ( c . tail ) ) )` with a loop along the data spine
    /// so that only address nesting recurses.
    fn parse_cons(&mut self, depth: usize) -> Result<Node, Error> {
        let mut addresses = Vec::new();
        let tail = loop {
            self.expect('(')?;
            addresses.push(self.parse_node(depth + 1)?);
            self.expect('.')?;
            if !self.peek_is_open() {
                break self.parse_atom()?;
            }
        };
        for _ in &addresses {
            self.expect(')')?;
        }
        Ok(addresses
            .into_iter()
            .rev()
            .fold(tail, |data, address| Node::cons(address, data)))
    }

    fn parse_atom(&mut self) -> Result<Node, Error> {
        let c = StandardClassifier;
        match self.tokens.next() {
            Some(token)
                if c.is_open_token(&token) || c.is_close_token(&token) || c.is_dot_token(&token) =>
            {
                Err(Error::StructuralError(format!(
                    "expected an atom, found '{token}'"
                )))
            }
            Some(token) => Node::atom(&token),
            None => Err(Error::StructuralError("unexpected end of expression".into())),
        }
    }

    fn peek_is_open(&mut self) -> bool {
        self.tokens
            .peek()
            .is_some_and(|token| StandardClassifier.is_open_token(token))
    }

    fn expect(&mut self, expected: char) -> Result<(), Error> {
        let c = StandardClassifier;
        let matches = |token: &str| match expected {
            '(' => c.is_open_token(token),
            ')' => c.is_close_token(token),
            _ => c.is_dot_token(token),
        };
        match self.tokens.next() {
            Some(token) if matches(&token) => Ok(()),
            Some(token) => Err(Error::StructuralError(format!(
                "expected '{expected}', found '{token}'"
            ))),
            None => Err(Error::StructuralError(format!(
                "expected '{expected}', found end of expression"
            ))),
        }
    }
}

impl From<NumberType> for Node {
    fn from(n: NumberType) -> Self {
        Node::Atom(Atom::from_int(n))
    }
}

impl From<bool> for Node {
    fn from(b: bool) -> Self {
        Node::Atom(Atom::from_bool(b))
    }
}

impl From<Atom> for Node {
    fn from(atom: Atom) -> Self {
        Node::Atom(atom)
    }
}

// Fallible conversions from `Node` back into primitive Rust types.

impl TryFrom<Node> for NumberType {
    type Error = Error;

    fn try_from(node: Node) -> Result<NumberType, Error> {
        match &node {
            Node::Atom(atom) if atom.is_numeric() => atom.as_int().ok_or_else(|| {
                Error::ArithmeticError(format!("integer literal {atom} is out of range"))
            }),
            _ => Err(Error::TypeError(format!("expected number, got {node}"))),
        }
    }
}

impl TryFrom<Node> for bool {
    type Error = Error;

    fn try_from(node: Node) -> Result<bool, Error> {
        match &node {
            Node::Atom(atom) if atom.is_true() => Ok(true),
            Node::Atom(atom) if atom.is_nil() => Ok(false),
            _ => Err(Error::TypeError(format!(
                "expected boolean (T or NIL), got {node}"
            ))),
        }
    }
}

/// Unchecked atom constructor for tests.
#[cfg(test)]
pub(crate) fn sym(name: &str) -> Node {
    Node::Atom(Atom(Cow::Owned(name.to_owned())))
}
