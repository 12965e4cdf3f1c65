use std::collections::HashMap;
use std::ops::{Deref, DerefMut};
use std::rc::Rc;

use crate::ast::{Atom, Cons, NIL_LITERAL, Node, T_LITERAL};
use crate::builtinops::{OpKind, PrimitiveOp};
use crate::classify::{StandardClassifier, TokenClassifier};
use crate::environment::{Environment, UserFunction};
use crate::{Error, MAX_EVAL_DEPTH};

/// Per-statement closure table.
///
/// `lambda` validates its closure, files it here and evaluates to a handle
/// atom naming it. A compound whose evaluated head is such a handle applies
/// the closure; the entry stays until the statement ends, so a handle may be
/// passed around and called any number of times. A fresh session is created
/// for every top-level statement.
#[derive(Debug, Default)]
pub struct ClosureSession {
    closures: HashMap<Atom, Rc<UserFunction>>,
}

impl ClosureSession {
    fn capture(&mut self, closure: Rc<UserFunction>) -> Atom {
        let handle = Atom::closure(self.closures.len() + 1);
        self.closures.insert(handle.clone(), closure);
        handle
    }

    fn closure(&self, handle: &Atom) -> Option<Rc<UserFunction>> {
        self.closures.get(handle).cloned()
    }

    /// Number of closures captured so far in this statement.
    pub fn len(&self) -> usize {
        self.closures.len()
    }

    pub fn is_empty(&self) -> bool {
        self.closures.is_empty()
    }
}

/// Everything evaluation reads and writes: the session environment and the
/// closure state of the current statement.
pub struct EvalContext<'e> {
    env: &'e mut Environment,
    session: ClosureSession,
}

/// Evaluate one top-level statement. Top-level statements are evaluated
/// outside literal mode with a fresh closure session.
pub fn eval_statement(node: &Node, env: &mut Environment) -> Result<Node, Error> {
    EvalContext::new(env).eval(node, false, 0)
}

impl<'e> EvalContext<'e> {
    pub fn new(env: &'e mut Environment) -> Self {
        EvalContext {
            env,
            session: ClosureSession::default(),
        }
    }

    pub fn env(&self) -> &Environment {
        self.env
    }

    pub fn session(&self) -> &ClosureSession {
        &self.session
    }

    /// Evaluate `node` with depth tracking to prevent stack overflow.
    ///
    /// In literal mode (arguments, bodies, branches) a compound whose head
    /// evaluates to a number yields that number instead of failing.
    pub fn eval(&mut self, node: &Node, literal: bool, depth: usize) -> Result<Node, Error> {
        if depth >= MAX_EVAL_DEPTH {
            return Err(Error::StructuralError(format!(
                "evaluation depth limit exceeded (max: {MAX_EVAL_DEPTH})"
            )));
        }
        match node {
            Node::Atom(atom) => Ok(self.eval_atom(atom)),
            Node::Cons(cons) => self.eval_cons(cons, literal, depth),
        }
    }

    /// A bound variable yields its value; an unbound `t`/`nil` in any case
    /// yields the boolean constant; anything else evaluates to itself.
    fn eval_atom(&self, atom: &Atom) -> Node {
        if let Some(value) = self.env.variable(atom.as_str()) {
            return value.clone();
        }
        boolean_constant(atom).unwrap_or_else(|| Node::Atom(atom.clone()))
    }

    fn eval_cons(&mut self, cons: &Cons, literal: bool, depth: usize) -> Result<Node, Error> {
        let (head, evaluated) = self.head_symbol(cons.address(), literal, depth)?;
        let symbol = match head {
            Node::Atom(symbol) => symbol,
            Node::Cons(_) => {
                return Err(Error::TypeError(format!(
                    "cannot apply {head} as a function"
                )));
            }
        };
        if literal && symbol.is_numeric() {
            return Ok(Node::Atom(symbol));
        }

        let name = symbol.as_str();
        let data = cons.data();
        if let Some(constant) = boolean_constant(&symbol) {
            return Ok(constant);
        }
        // Only a head produced by evaluation can be a closure handle.
        if evaluated && let Some(closure) = self.session.closure(&symbol) {
            log::trace!("applying {symbol} of arity {}", closure.arity());
            return self.apply(&closure, data, depth);
        }

        let registry = self.env.registry();
        if let Some(op) = registry.find(name).filter(|op| op.reserved) {
            return self.invoke_primitive(op, data, depth);
        }
        if let Some(value) = self.env.variable(name) {
            return Ok(value.clone());
        }
        if self.env.is_defined_function(name) {
            let function = self.env.function(name)?;
            return self.apply(&function, data, depth);
        }
        if let Some(op) = registry.find(name) {
            return self.invoke_primitive(op, data, depth);
        }

        Err(Error::BindingError(format!("undefined function {name}")))
    }

    /// The operator of a compound. Reserved keyword atoms are taken verbatim;
    /// anything else is evaluated. The flag reports whether evaluation
    /// happened.
    fn head_symbol(
        &mut self,
        address: &Node,
        literal: bool,
        depth: usize,
    ) -> Result<(Node, bool), Error> {
        match address {
            Node::Atom(atom) if self.env.registry().is_reserved(atom.as_str()) => {
                Ok((address.clone(), false))
            }
            _ => Ok((self.eval(address, literal, depth + 1)?, true)),
        }
    }

    fn invoke_primitive(
        &mut self,
        op: &PrimitiveOp,
        data: &Node,
        depth: usize,
    ) -> Result<Node, Error> {
        let name = op.name();
        if op.needs_args && data.is_nil() {
            return Err(Error::StructuralError(format!("{name} requires arguments")));
        }
        let args = data.proper_list().ok_or_else(|| {
            Error::StructuralError(format!("arguments to {name} must form a list, got {data}"))
        })?;
        op.arity.validate(name, args.len())?;

        match &op.kind {
            OpKind::Function(f) => {
                let evaluated = args
                    .into_iter()
                    .map(|arg| self.eval(arg, true, depth + 1))
                    .collect::<Result<Vec<_>, _>>()?;
                f(evaluated)
            }
            OpKind::SpecialForm(form) => {
                let raw: Vec<Node> = args.into_iter().cloned().collect();
                form(&raw, self, depth)
            }
        }
    }

    /// Apply a user function or closure: evaluate the actuals left to right,
    /// bind them over the caller's variables and run the body.
    fn apply(&mut self, function: &UserFunction, data: &Node, depth: usize) -> Result<Node, Error> {
        let actuals = data.proper_list().ok_or_else(|| {
            Error::StructuralError(format!(
                "arguments to {} must form a list, got {data}",
                function.name()
            ))
        })?;
        if actuals.len() != function.arity() {
            return Err(Error::arity_error(
                function.name(),
                function.arity(),
                actuals.len(),
            ));
        }

        let mut bindings = Vec::with_capacity(actuals.len());
        for (param, actual) in function.params().iter().zip(actuals) {
            bindings.push((param.clone(), self.eval(actual, true, depth + 1)?));
        }
        log::trace!(
            "applying {} to {} argument(s)",
            function.name(),
            bindings.len()
        );

        let mut scope = Scope::enter(self, bindings);
        scope.eval(function.body(), true, depth + 1)
    }
}

/// Variable bindings for the extent of one function body. The caller's
/// variable table comes back when the scope drops, however the body exits.
struct Scope<'s, 'e> {
    ctx: &'s mut EvalContext<'e>,
    saved: HashMap<String, Node>,
}

impl<'s, 'e> Scope<'s, 'e> {
    fn enter(ctx: &'s mut EvalContext<'e>, bindings: Vec<(String, Node)>) -> Self {
        let saved = ctx.env.substitute(bindings);
        Scope { ctx, saved }
    }
}

impl<'e> Deref for Scope<'_, 'e> {
    type Target = EvalContext<'e>;

    fn deref(&self) -> &Self::Target {
        self.ctx
    }
}

impl DerefMut for Scope<'_, '_> {
    fn deref_mut(&mut self) -> &mut Self::Target {
        self.ctx
    }
}

impl Drop for Scope<'_, '_> {
    fn drop(&mut self) {
        self.ctx.env.restore(std::mem::take(&mut self.saved));
    }
}

fn boolean_constant(atom: &Atom) -> Option<Node> {
    let literal = atom.as_str();
    if literal.eq_ignore_ascii_case(T_LITERAL) {
        Some(Node::t())
    } else if literal.eq_ignore_ascii_case(NIL_LITERAL) {
        Some(Node::nil())
    } else {
        None
    }
}

//
// Special forms
//

/// Evaluate quote special form
pub(crate) fn eval_quote(
    args: &[Node],
    _ctx: &mut EvalContext<'_>,
    _depth: usize,
) -> Result<Node, Error> {
    match args {
        [expr] => Ok(expr.clone()),
        _ => Err(Error::arity_error("quote", 1, args.len())),
    }
}

/// Evaluate if special form
pub(crate) fn eval_if(args: &[Node], ctx: &mut EvalContext<'_>, depth: usize) -> Result<Node, Error> {
    match args {
        [guard, then_expr, else_expr] => {
            let guard = ctx.eval(guard, true, depth + 1)?;
            let truth = bool::try_from(guard)
                .map_err(|err| Error::TypeError(format!("if guard: {}", err.message())))?;
            if truth {
                ctx.eval(then_expr, true, depth + 1)
            } else {
                ctx.eval(else_expr, true, depth + 1)
            }
        }
        _ => Err(Error::arity_error("if", 3, args.len())),
    }
}

/// Evaluate cond special form: the first arm whose guard is `T` wins.
pub(crate) fn eval_cond(
    args: &[Node],
    ctx: &mut EvalContext<'_>,
    depth: usize,
) -> Result<Node, Error> {
    for arm in args {
        let (guard, consequent) = match arm.proper_list().as_deref() {
            Some(&[guard, consequent]) => (guard, consequent),
            _ => {
                return Err(Error::StructuralError(format!(
                    "cond arm must be (guard consequent), got {arm}"
                )));
            }
        };
        let guard = ctx.eval(guard, true, depth + 1)?;
        let truth = bool::try_from(guard)
            .map_err(|err| Error::TypeError(format!("cond guard: {}", err.message())))?;
        if truth {
            return ctx.eval(consequent, true, depth + 1);
        }
    }
    Err(Error::StructuralError("no cond arm matched".into()))
}

/// Evaluate defun special form: `(defun name (params...) body)`
pub(crate) fn eval_defun(
    args: &[Node],
    ctx: &mut EvalContext<'_>,
    _depth: usize,
) -> Result<Node, Error> {
    match args {
        [Node::Atom(name), formals, body] => {
            ctx.env.register_function(name.as_str(), formals, body)?;
            Ok(Node::Atom(name.clone()))
        }
        [name, _, _] => Err(Error::DefinitionError(format!(
            "function name must be an atom, got {name}"
        ))),
        _ => Err(Error::arity_error("defun", 3, args.len())),
    }
}

/// Evaluate lambda special form
pub(crate) fn eval_lambda(
    args: &[Node],
    ctx: &mut EvalContext<'_>,
    _depth: usize,
) -> Result<Node, Error> {
    match args {
        [formals, body] => {
            let closure = UserFunction::new("lambda", formals, body.clone())?;
            let handle = ctx.session.capture(Rc::new(closure));
            log::trace!("captured {handle}");
            Ok(Node::Atom(handle))
        }
        _ => Err(Error::arity_error("lambda", 2, args.len())),
    }
}

/// Literal numbers and strings can never evaluate to a boolean.
fn is_obviously_non_boolean(node: &Node) -> bool {
    match node {
        Node::Atom(atom) => {
            atom.is_numeric() || StandardClassifier.is_string_literal(atom.as_str())
        }
        Node::Cons(_) => false,
    }
}

macro_rules! boolean_logic_op {
    ($name:ident, $op_name:expr, $short_circuit:literal, $default:literal) => {
        pub(crate) fn $name(
            args: &[Node],
            ctx: &mut EvalContext<'_>,
            depth: usize,
        ) -> Result<Node, Error> {
            if args.is_empty() {
                return Err(Error::arity_error($op_name, 1, 0));
            }

            // Reject literal non-booleans up front so short-circuiting
            // cannot hide them.
            if args.iter().any(is_obviously_non_boolean) {
                return Err(Error::TypeError(
                    concat!("'", $op_name, "' requires boolean arguments").to_string(),
                ));
            }

            for arg in args {
                let value = ctx.eval(arg, true, depth + 1)?;
                match bool::try_from(value) {
                    Ok($short_circuit) => return Ok(Node::from($short_circuit)),
                    Ok(_) => continue,
                    Err(_) => {
                        return Err(Error::TypeError(
                            concat!("'", $op_name, "' requires boolean arguments").to_string(),
                        ));
                    }
                }
            }

            Ok(Node::from($default))
        }
    };
}

boolean_logic_op!(eval_and, "and", false, true);
boolean_logic_op!(eval_or, "or", true, false);
