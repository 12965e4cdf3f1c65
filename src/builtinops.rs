//! Primitive operations registry.
//!
//! Every primitive is declared once in a static table as a [`PrimitiveOp`]:
//! its aliases, whether it needs an argument list, its arity, whether its
//! name is a reserved keyword, and its implementation. The table is turned
//! into a [`PrimitiveRegistry`] on first use; two operations claiming the same
//! alias abort that construction.
//!
//! ## Functions vs Special Forms
//!
//! - **Functions** receive their arguments already evaluated, converted to
//!   Rust types by the adapters in `intooperation` (e.g. `sum`, `cons`, `car`).
//! - **Special forms** receive the raw argument nodes and the evaluation
//!   context, and decide themselves what to evaluate (e.g. `if`, `cond`,
//!   `defun`, `lambda`, `and`).
//!
//! ## Reserved keywords
//!
//! The special forms and the structural list accessors (`car`/`first`,
//! `cdr`/`rest`, `length`) are reserved: in head position they are never
//! looked up as variables.
//!
//! ## Numeric arguments
//!
//! Arithmetic and comparison primitives accept integers and proper lists of
//! integers; a list argument contributes its elements, so
//! `(sum (cons 4 (cons 4 NIL)))` is `8`. All arithmetic is checked.

use crate::Error;
use crate::ast::{Node, NumberType};
use crate::evaluator::{
    EvalContext, eval_and, eval_cond, eval_defun, eval_if, eval_lambda, eval_or, eval_quote,
};
use crate::intooperation::{IntoOperation, IntoVariadicOperation, NodeIter, NumIter, OperationFn};
use std::collections::HashMap;
use std::sync::{Arc, LazyLock};

/// Signature of a special form: raw argument nodes, the evaluation context
/// and the current evaluation depth.
pub type SpecialFormFn = fn(&[Node], &mut EvalContext<'_>, usize) -> Result<Node, Error>;

/// Represents the implementation of a primitive (function or special form)
#[derive(Clone)]
pub enum OpKind {
    /// Receives evaluated arguments through the erased adapter signature.
    Function(Arc<OperationFn>),
    /// Receives unevaluated arguments and controls evaluation itself.
    SpecialForm(SpecialFormFn),
}

impl std::fmt::Debug for OpKind {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            OpKind::Function(_) => write!(f, "Function(<fn>)"),
            OpKind::SpecialForm(_) => write!(f, "SpecialForm(<fn>)"),
        }
    }
}

/// Accepted argument counts
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Arity {
    Exact(usize),
    AtLeast(usize),
}

impl Arity {
    pub fn validate(self, name: &str, count: usize) -> Result<(), Error> {
        match self {
            Arity::Exact(n) if count != n => Err(Error::arity_error(name, n, count)),
            Arity::AtLeast(n) if count < n => Err(Error::arity_error(name, n, count)),
            _ => Ok(()),
        }
    }
}

/// Definition of a primitive operation
#[derive(Debug, Clone)]
pub struct PrimitiveOp {
    /// Every name the operation answers to; the first is canonical.
    pub aliases: &'static [&'static str],
    /// Whether the operation must be given an argument list. Operations that
    /// do not need one (`true`, `false`) are invoked with no arguments.
    pub needs_args: bool,
    pub arity: Arity,
    /// Reserved keywords take precedence over variables in head position.
    pub reserved: bool,
    pub kind: OpKind,
}

impl PrimitiveOp {
    pub fn name(&self) -> &'static str {
        self.aliases[0]
    }

    pub fn is_special_form(&self) -> bool {
        matches!(self.kind, OpKind::SpecialForm(_))
    }
}

/// Alias lookup over the primitive table.
#[derive(Debug)]
pub struct PrimitiveRegistry {
    ops: Vec<PrimitiveOp>,
    by_alias: HashMap<&'static str, usize>,
}

impl PrimitiveRegistry {
    /// Index `ops` by alias. Fails if two operations share an alias.
    pub fn build(ops: Vec<PrimitiveOp>) -> Result<Self, Error> {
        let mut by_alias = HashMap::new();
        for (index, op) in ops.iter().enumerate() {
            for &alias in op.aliases {
                if let Some(previous) = by_alias.insert(alias, index) {
                    return Err(Error::DefinitionError(format!(
                        "alias '{alias}' is claimed by both {} and {}",
                        ops[previous].name(),
                        op.name()
                    )));
                }
            }
        }
        Ok(PrimitiveRegistry { ops, by_alias })
    }

    pub fn find(&self, alias: &str) -> Option<&PrimitiveOp> {
        self.by_alias.get(alias).map(|&index| &self.ops[index])
    }

    pub fn is_primitive(&self, alias: &str) -> bool {
        self.by_alias.contains_key(alias)
    }

    pub fn is_reserved(&self, alias: &str) -> bool {
        self.find(alias).is_some_and(|op| op.reserved)
    }

    pub fn ops(&self) -> &[PrimitiveOp] {
        &self.ops
    }
}

//
// Primitive function implementations
//

fn overflow(op: &str) -> Error {
    Error::ArithmeticError(format!("integer overflow in {op}"))
}

fn division_by_zero(op: &str) -> Error {
    Error::ArithmeticError(format!("division by zero in {op}"))
}

// Macro to generate chained numeric comparisons
macro_rules! numeric_comparison {
    ($name:ident, $op:tt) => {
        fn $name(first: NumberType, rest: NumIter<'_>) -> bool {
            let mut prev = first;
            for current in rest {
                if !(prev $op current) {
                    return false;
                }
                prev = current;
            }
            true
        }
    };
}

numeric_comparison!(builtin_less, <);
numeric_comparison!(builtin_greater, >);
numeric_comparison!(builtin_leq, <=);
numeric_comparison!(builtin_geq, >=);

fn builtin_true() -> bool {
    true
}

fn builtin_false() -> bool {
    false
}

fn builtin_sum(args: NumIter<'_>) -> Result<NumberType, Error> {
    let mut sum: NumberType = 0;
    for n in args {
        sum = sum.checked_add(n).ok_or_else(|| overflow("sum"))?;
    }
    Ok(sum)
}

fn builtin_difference(mut args: NumIter<'_>) -> Result<NumberType, Error> {
    let Some(first) = args.next() else {
        return Err(Error::TypeError("difference of an empty list".into()));
    };

    let mut args = args.peekable();
    if args.peek().is_none() {
        return first.checked_neg().ok_or_else(|| overflow("negation"));
    }

    let mut result = first;
    for n in args {
        result = result.checked_sub(n).ok_or_else(|| overflow("difference"))?;
    }
    Ok(result)
}

fn builtin_product(args: NumIter<'_>) -> Result<NumberType, Error> {
    let mut product: NumberType = 1;
    for n in args {
        product = product.checked_mul(n).ok_or_else(|| overflow("product"))?;
    }
    Ok(product)
}

fn builtin_quotient(mut args: NumIter<'_>) -> Result<NumberType, Error> {
    let Some(first) = args.next() else {
        return Err(Error::TypeError("quotient of an empty list".into()));
    };

    let mut result = first;
    for n in args {
        if n == 0 {
            return Err(division_by_zero("quotient"));
        }
        result = result.checked_div(n).ok_or_else(|| overflow("quotient"))?;
    }
    Ok(result)
}

/// Truncated remainder: the sign follows the dividend.
fn builtin_rem(a: NumberType, b: NumberType) -> Result<NumberType, Error> {
    if b == 0 {
        return Err(division_by_zero("rem"));
    }
    a.checked_rem(b).ok_or_else(|| overflow("rem"))
}

/// Floored modulus: the sign follows the divisor.
fn builtin_mod(a: NumberType, b: NumberType) -> Result<NumberType, Error> {
    let r = builtin_rem(a, b)?;
    if r != 0 && ((r < 0) != (b < 0)) {
        Ok(r + b)
    } else {
        Ok(r)
    }
}

fn builtin_expt(base: NumberType, exponent: NumberType) -> Result<NumberType, Error> {
    let exponent = u32::try_from(exponent).map_err(|_| {
        if exponent < 0 {
            Error::TypeError(format!("negative exponent {exponent}"))
        } else {
            overflow("expt")
        }
    })?;
    base.checked_pow(exponent).ok_or_else(|| overflow("expt"))
}

/// Structural equality of the rendered forms, so `+5` equals `5`.
fn builtin_eq(a: Node, b: Node) -> bool {
    a.to_string() == b.to_string()
}

fn builtin_integerp(node: Node) -> bool {
    node.is_numeric()
}

fn builtin_atom(node: Node) -> bool {
    node.is_atom()
}

fn builtin_null(node: Node) -> bool {
    node.is_nil()
}

fn builtin_not(b: bool) -> bool {
    !b
}

fn builtin_cons(address: Node, data: Node) -> Node {
    Node::cons(address, data)
}

fn builtin_list(args: NodeIter<'_>) -> Node {
    Node::list(args.cloned().collect::<Vec<_>>())
}

fn builtin_car(node: Node) -> Result<Node, Error> {
    match node {
        Node::Cons(cons) => Ok(cons.into_parts().0),
        Node::Atom(atom) => Err(Error::TypeError(format!("car requires a cons, got {atom}"))),
    }
}

fn builtin_cdr(node: Node) -> Result<Node, Error> {
    match node {
        Node::Cons(cons) => Ok(cons.into_parts().1),
        Node::Atom(atom) => Err(Error::TypeError(format!("cdr requires a cons, got {atom}"))),
    }
}

fn builtin_length(node: Node) -> Result<NumberType, Error> {
    let items = node
        .proper_list()
        .ok_or_else(|| Error::TypeError(format!("length requires a list, got {node}")))?;
    NumberType::try_from(items.len()).map_err(|_| overflow("length"))
}

/// Table of all primitive operations.
///
/// Kept as one contiguous list for ease of auditing; functions are wired
/// through the typed adapter layer once, when the registry is first used.
fn primitive_ops() -> Vec<PrimitiveOp> {
    fn fixed<Args, F>(f: F) -> OpKind
    where
        F: IntoOperation<Args>,
    {
        OpKind::Function(<F as IntoOperation<Args>>::into_operation(f))
    }

    fn variadic<Args, F>(f: F) -> OpKind
    where
        F: IntoVariadicOperation<Args>,
    {
        OpKind::Function(<F as IntoVariadicOperation<Args>>::into_variadic_operation(f))
    }

    fn op(aliases: &'static [&'static str], arity: Arity, kind: OpKind) -> PrimitiveOp {
        PrimitiveOp {
            aliases,
            needs_args: true,
            arity,
            reserved: false,
            kind,
        }
    }

    fn reserved(aliases: &'static [&'static str], arity: Arity, kind: OpKind) -> PrimitiveOp {
        PrimitiveOp {
            reserved: true,
            ..op(aliases, arity, kind)
        }
    }

    fn constant(aliases: &'static [&'static str], kind: OpKind) -> PrimitiveOp {
        PrimitiveOp {
            needs_args: false,
            ..op(aliases, Arity::Exact(0), kind)
        }
    }

    vec![
        // Boolean constants
        constant(&["true"], fixed::<(), _>(builtin_true)),
        constant(&["false"], fixed::<(), _>(builtin_false)),
        // Arithmetic
        op(&["sum", "+"], Arity::AtLeast(1), variadic::<(NumIter<'static>,), _>(builtin_sum)),
        op(
            &["difference", "-"],
            Arity::AtLeast(1),
            variadic::<(NumIter<'static>,), _>(builtin_difference),
        ),
        op(
            &["product", "*"],
            Arity::AtLeast(1),
            variadic::<(NumIter<'static>,), _>(builtin_product),
        ),
        op(
            &["quotient", "/"],
            Arity::AtLeast(1),
            variadic::<(NumIter<'static>,), _>(builtin_quotient),
        ),
        op(&["rem"], Arity::Exact(2), fixed::<(NumberType, NumberType), _>(builtin_rem)),
        op(&["mod"], Arity::Exact(2), fixed::<(NumberType, NumberType), _>(builtin_mod)),
        op(
            &["expt", "^"],
            Arity::Exact(2),
            fixed::<(NumberType, NumberType), _>(builtin_expt),
        ),
        // Comparison
        op(
            &["less", "<"],
            Arity::AtLeast(2),
            variadic::<(NumberType, NumIter<'static>), _>(builtin_less),
        ),
        op(
            &["greater", ">"],
            Arity::AtLeast(2),
            variadic::<(NumberType, NumIter<'static>), _>(builtin_greater),
        ),
        op(
            &["leq", "<="],
            Arity::AtLeast(2),
            variadic::<(NumberType, NumIter<'static>), _>(builtin_leq),
        ),
        op(
            &["geq", ">="],
            Arity::AtLeast(2),
            variadic::<(NumberType, NumIter<'static>), _>(builtin_geq),
        ),
        op(&["eq", "="], Arity::Exact(2), fixed::<(Node, Node), _>(builtin_eq)),
        // Predicates
        op(&["integerp"], Arity::Exact(1), fixed::<(Node,), _>(builtin_integerp)),
        op(&["atom"], Arity::Exact(1), fixed::<(Node,), _>(builtin_atom)),
        op(&["null", "endp"], Arity::Exact(1), fixed::<(Node,), _>(builtin_null)),
        // Logic
        op(&["not"], Arity::Exact(1), fixed::<(bool,), _>(builtin_not)),
        reserved(&["and"], Arity::AtLeast(1), OpKind::SpecialForm(eval_and)),
        reserved(&["or"], Arity::AtLeast(1), OpKind::SpecialForm(eval_or)),
        // Lists
        op(&["cons"], Arity::Exact(2), fixed::<(Node, Node), _>(builtin_cons)),
        op(&["list"], Arity::AtLeast(1), variadic::<(NodeIter<'static>,), _>(builtin_list)),
        reserved(&["car", "first"], Arity::Exact(1), fixed::<(Node,), _>(builtin_car)),
        reserved(&["cdr", "rest"], Arity::Exact(1), fixed::<(Node,), _>(builtin_cdr)),
        reserved(&["length"], Arity::Exact(1), fixed::<(Node,), _>(builtin_length)),
        // Special forms
        reserved(&["quote", "'"], Arity::Exact(1), OpKind::SpecialForm(eval_quote)),
        reserved(&["if"], Arity::Exact(3), OpKind::SpecialForm(eval_if)),
        reserved(&["cond"], Arity::AtLeast(1), OpKind::SpecialForm(eval_cond)),
        reserved(&["defun"], Arity::Exact(3), OpKind::SpecialForm(eval_defun)),
        reserved(&["lambda", "λ"], Arity::Exact(2), OpKind::SpecialForm(eval_lambda)),
    ]
}

static REGISTRY: LazyLock<PrimitiveRegistry> = LazyLock::new(|| {
    PrimitiveRegistry::build(primitive_ops()).expect("primitive table has colliding aliases")
});

/// The shared primitive registry.
pub fn registry() -> &'static PrimitiveRegistry {
    &REGISTRY
}

#[cfg(test)]
#[expect(clippy::unwrap_used)] // test code OK
mod tests {
    use super::*;
    use crate::ast::sym;

    /// Call a primitive function with already-evaluated arguments.
    fn call_builtin(name: &str, args: Vec<Node>) -> Result<Node, Error> {
        let op = registry().find(name).unwrap();
        op.arity.validate(name, args.len())?;
        match &op.kind {
            OpKind::Function(f) => f(args),
            OpKind::SpecialForm(_) => panic!("{name} is a special form"),
        }
    }

    fn int(n: NumberType) -> Node {
        Node::from(n)
    }

    fn ints(ns: &[NumberType]) -> Node {
        Node::list(ns.iter().copied().map(Node::from).collect::<Vec<_>>())
    }

    macro_rules! test {
        ($name:expr, [$($arg:expr),*], ok $expected:expr) => {
            assert_eq!(
                call_builtin($name, vec![$($arg),*]).unwrap(),
                $expected,
                "{} {:?}", $name, stringify!($($arg),*)
            );
        };
        ($name:expr, [$($arg:expr),*], err $variant:path) => {
            let result = call_builtin($name, vec![$($arg),*]);
            assert!(
                matches!(result, Err($variant(_))),
                "{} {:?}: got {:?}", $name, stringify!($($arg),*), result
            );
        };
    }

    #[test]
    fn test_arithmetic() {
        test!("sum", [int(5), int(6), int(7)], ok int(18));
        test!("+", [int(5)], ok int(5));
        test!("sum", [ints(&[4, 4])], ok int(8));
        test!("sum", [ints(&[4, 34]), int(2)], ok int(40));
        test!("sum", [int(NumberType::MAX), int(1)], err Error::ArithmeticError);
        test!("sum", [sym("x")], err Error::TypeError);

        test!("difference", [int(10), int(3), int(2)], ok int(5));
        test!("-", [int(10)], ok int(-10));
        test!("-", [int(NumberType::MIN)], err Error::ArithmeticError);

        test!("product", [int(2), int(3), int(4)], ok int(24));
        test!("*", [int(NumberType::MAX), int(2)], err Error::ArithmeticError);

        test!("quotient", [int(20), int(3)], ok int(6));
        test!("/", [int(-20), int(3)], ok int(-6));
        test!("/", [int(1), int(0)], err Error::ArithmeticError);
        test!("/", [int(NumberType::MIN), int(-1)], err Error::ArithmeticError);

        test!("rem", [int(7), int(3)], ok int(1));
        test!("rem", [int(-7), int(3)], ok int(-1));
        test!("rem", [int(7), int(0)], err Error::ArithmeticError);
        test!("mod", [int(-7), int(3)], ok int(2));
        test!("mod", [int(7), int(-3)], ok int(-2));
        test!("mod", [int(6), int(3)], ok int(0));
        test!("mod", [int(1), int(0)], err Error::ArithmeticError);

        test!("expt", [int(2), int(10)], ok int(1024));
        test!("^", [int(5), int(0)], ok int(1));
        test!("^", [int(2), int(-1)], err Error::TypeError);
        test!("^", [int(2), int(64)], err Error::ArithmeticError);
    }

    #[test]
    fn test_comparisons() {
        test!("less", [int(5), int(6)], ok Node::t());
        test!("less", [int(6), int(5)], ok Node::nil());
        test!("<", [int(5), int(6), int(4)], ok Node::nil());
        test!("<", [int(1), int(2), int(3)], ok Node::t());
        test!(">", [int(3), int(2), int(1)], ok Node::t());
        test!("<=", [int(1), int(1)], ok Node::t());
        test!(">=", [int(0), int(1)], ok Node::nil());
        test!("less", [int(4)], err Error::DefinitionError);
        test!("<", [int(1), Node::t()], err Error::TypeError);

        test!("eq", [int(1), int(1)], ok Node::t());
        test!("eq", [int(1), int(0)], ok Node::nil());
        test!("=", [Node::atom("+5").unwrap(), int(5)], ok Node::t());
        test!("eq", [ints(&[1, 2]), ints(&[1, 2])], ok Node::t());
        test!("eq", [sym("a"), sym("b")], ok Node::nil());
    }

    #[test]
    fn test_predicates_and_logic() {
        test!("integerp", [int(5)], ok Node::t());
        test!("integerp", [int(0)], ok Node::t());
        test!("integerp", [Node::atom("\"a\"").unwrap()], ok Node::nil());
        test!("integerp", [Node::t()], ok Node::nil());
        test!("atom", [sym("x")], ok Node::t());
        test!("atom", [ints(&[1])], ok Node::nil());
        test!("null", [Node::nil()], ok Node::t());
        test!("null", [int(3)], ok Node::nil());
        test!("endp", [ints(&[1, 2])], ok Node::nil());
        test!("not", [Node::t()], ok Node::nil());
        test!("not", [Node::nil()], ok Node::t());
        test!("not", [int(1)], err Error::TypeError);
        test!("true", [], ok Node::t());
        test!("false", [], ok Node::nil());
    }

    #[test]
    fn test_list_operations() {
        test!("cons", [int(1), Node::nil()], ok ints(&[1]));
        test!("cons", [int(1), int(2)], ok Node::cons(int(1), int(2)));
        test!("list", [int(1), int(2), int(3)], ok ints(&[1, 2, 3]));
        test!("list", [Node::nil()], ok Node::list(vec![Node::nil()]));
        test!("car", [ints(&[1, 2, 3])], ok int(1));
        test!("first", [ints(&[1, 2, 3])], ok int(1));
        test!("cdr", [ints(&[1, 2, 3])], ok ints(&[2, 3]));
        test!("rest", [ints(&[1])], ok Node::nil());
        test!("car", [int(1)], err Error::TypeError);
        test!("cdr", [Node::nil()], err Error::TypeError);
        test!("length", [ints(&[1, 2, 3])], ok int(3));
        test!("length", [Node::nil()], ok int(0));
        test!("length", [Node::cons(int(1), int(2))], err Error::TypeError);
    }

    #[test]
    fn test_registry_lookup() {
        let reg = registry();
        for alias in ["sum", "+", "quote", "'", "lambda", "λ", "first", "endp"] {
            assert!(reg.is_primitive(alias), "{alias}");
        }
        assert!(!reg.is_primitive("fibonacci"));
        assert_eq!(reg.find("+").unwrap().name(), "sum");
        assert!(reg.find("if").unwrap().is_special_form());
        assert!(!reg.find("cons").unwrap().is_special_form());
        assert!(reg.is_reserved("car"));
        assert!(reg.is_reserved("defun"));
        assert!(!reg.is_reserved("sum"));
        assert!(!reg.find("true").unwrap().needs_args);
    }

    #[test]
    fn test_alias_collision_is_rejected() {
        let dup = vec![
            PrimitiveOp {
                aliases: &["plus", "+"],
                needs_args: true,
                arity: Arity::AtLeast(1),
                reserved: false,
                kind: OpKind::SpecialForm(eval_quote),
            },
            PrimitiveOp {
                aliases: &["add", "+"],
                needs_args: true,
                arity: Arity::AtLeast(1),
                reserved: false,
                kind: OpKind::SpecialForm(eval_quote),
            },
        ];
        match PrimitiveRegistry::build(dup) {
            Err(Error::DefinitionError(msg)) => assert!(msg.contains("'+'"), "{msg}"),
            other => panic!("expected DefinitionError, got {other:?}"),
        }
    }

    #[test]
    fn test_arity_validation() {
        assert!(Arity::Exact(2).validate("f", 2).is_ok());
        assert!(Arity::Exact(2).validate("f", 3).is_err());
        assert!(Arity::AtLeast(1).validate("f", 5).is_ok());
        assert!(matches!(
            Arity::AtLeast(1).validate("f", 0),
            Err(Error::DefinitionError(_))
        ));
    }
}
