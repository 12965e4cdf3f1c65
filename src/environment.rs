use std::collections::HashMap;
use std::rc::Rc;

use crate::Error;
use crate::ast::Node;
use crate::builtinops::{PrimitiveRegistry, registry};
use crate::classify::{StandardClassifier, TokenClassifier};

/// A user-defined function: ordered, distinct parameter names and a body.
///
/// Anonymous functions created by `lambda` use the same representation with
/// the name `lambda`.
#[derive(Debug, Clone, PartialEq)]
pub struct UserFunction {
    name: String,
    params: Vec<String>,
    body: Node,
}

impl UserFunction {
    /// Validate the formal parameter node and build the function.
    ///
    /// `formals` must be `NIL` or a proper list of identifiers with no
    /// repeated names.
    pub fn new(name: &str, formals: &Node, body: Node) -> Result<Self, Error> {
        let Some(items) = formals.proper_list() else {
            return Err(Error::DefinitionError(format!(
                "parameters of {name} must be a list, got {formals}"
            )));
        };

        let mut params: Vec<String> = Vec::with_capacity(items.len());
        for item in items {
            let param = match item.as_atom() {
                Some(atom) if StandardClassifier.is_identifier(atom.as_str()) => atom.as_str(),
                _ => {
                    return Err(Error::DefinitionError(format!(
                        "invalid parameter name {item} in {name}"
                    )));
                }
            };
            if params.iter().any(|existing| existing == param) {
                return Err(Error::DefinitionError(format!(
                    "duplicate parameter name {param} in {name}"
                )));
            }
            params.push(param.to_owned());
        }

        Ok(UserFunction {
            name: name.to_owned(),
            params,
            body,
        })
    }

    pub fn name(&self) -> &str {
        &self.name
    }

    pub fn params(&self) -> &[String] {
        &self.params
    }

    pub fn body(&self) -> &Node {
        &self.body
    }

    pub fn arity(&self) -> usize {
        self.params.len()
    }
}

/// Variable and function tables for one interpreter session.
///
/// Variables have dynamic extent: they exist only while a function body that
/// bound them is running. Functions persist across statements. The primitive
/// registry is shared and immutable.
#[derive(Debug, Clone)]
pub struct Environment {
    variables: HashMap<String, Node>,
    functions: HashMap<String, Rc<UserFunction>>,
    registry: &'static PrimitiveRegistry,
}

impl Default for Environment {
    fn default() -> Self {
        Self::new()
    }
}

impl Environment {
    pub fn new() -> Self {
        Environment {
            variables: HashMap::new(),
            functions: HashMap::new(),
            registry: registry(),
        }
    }

    pub fn registry(&self) -> &'static PrimitiveRegistry {
        self.registry
    }

    pub fn is_defined_variable(&self, name: &str) -> bool {
        self.variables.contains_key(name)
    }

    pub fn variable(&self, name: &str) -> Option<&Node> {
        self.variables.get(name)
    }

    pub fn get_variable(&self, name: &str) -> Result<&Node, Error> {
        self.variables
            .get(name)
            .ok_or_else(|| Error::BindingError(format!("unbound variable {name}")))
    }

    /// Bind `name`, returning the value it shadowed, if any.
    pub fn define_variable(&mut self, name: impl Into<String>, value: Node) -> Option<Node> {
        self.variables.insert(name.into(), value)
    }

    pub fn unbind(&mut self, name: &str) -> Result<Node, Error> {
        self.variables
            .remove(name)
            .ok_or_else(|| Error::BindingError(format!("cannot unbind {name}: not bound")))
    }

    pub fn is_defined_function(&self, name: &str) -> bool {
        self.functions.contains_key(name)
    }

    pub fn function(&self, name: &str) -> Result<Rc<UserFunction>, Error> {
        self.functions
            .get(name)
            .cloned()
            .ok_or_else(|| Error::BindingError(format!("undefined function {name}")))
    }

    /// Define (or redefine) a user function.
    ///
    /// The name must be an identifier that is not a primitive alias.
    pub fn register_function(
        &mut self,
        name: &str,
        formals: &Node,
        body: &Node,
    ) -> Result<Rc<UserFunction>, Error> {
        if !StandardClassifier.is_identifier(name) {
            return Err(Error::DefinitionError(format!(
                "invalid function name {name}"
            )));
        }
        if self.registry.is_primitive(name) {
            return Err(Error::DefinitionError(format!(
                "cannot redefine primitive {name}"
            )));
        }

        let function = Rc::new(UserFunction::new(name, formals, body.clone())?);
        if self
            .functions
            .insert(name.to_owned(), Rc::clone(&function))
            .is_some()
        {
            log::debug!("redefined function {name}");
        } else {
            log::debug!("defined function {name}/{}", function.arity());
        }
        Ok(function)
    }

    /// All user functions, sorted by name.
    pub fn functions(&self) -> Vec<&UserFunction> {
        let mut functions: Vec<&UserFunction> =
            self.functions.values().map(Rc::as_ref).collect();
        functions.sort_by(|a, b| a.name.cmp(&b.name));
        functions
    }

    /// Merge `bindings` into the variable table and return the table as it
    /// was before. Bindings shadow existing names until [`restore`] is called
    /// with the returned table.
    ///
    /// [`restore`]: Environment::restore
    pub(crate) fn substitute(&mut self, bindings: Vec<(String, Node)>) -> HashMap<String, Node> {
        let saved = self.variables.clone();
        self.variables.extend(bindings);
        saved
    }

    pub(crate) fn restore(&mut self, saved: HashMap<String, Node>) {
        self.variables = saved;
    }

    /// A snapshot of the variable table, used to check binding isolation.
    pub fn variables(&self) -> &HashMap<String, Node> {
        &self.variables
    }
}

#[cfg(test)]
#[expect(clippy::unwrap_used)] // test code OK
mod tests {
    use super::*;
    use crate::ast::sym;

    fn params(names: &[&str]) -> Node {
        Node::list(names.iter().map(|n| sym(n)).collect::<Vec<_>>())
    }

    #[test]
    fn test_variables() {
        let mut env = Environment::new();
        assert!(!env.is_defined_variable("x"));
        assert!(matches!(env.get_variable("x"), Err(Error::BindingError(_))));

        assert_eq!(env.define_variable("x", Node::from(1)), None);
        assert_eq!(env.get_variable("x").unwrap(), &Node::from(1));
        assert_eq!(env.define_variable("x", Node::from(2)), Some(Node::from(1)));

        assert_eq!(env.unbind("x").unwrap(), Node::from(2));
        assert!(matches!(env.unbind("x"), Err(Error::BindingError(_))));
    }

    #[test]
    fn test_register_function_validation() {
        let body = sym("x");
        // (name, params, ok)
        let cases = vec![
            ("f", params(&["x", "y"]), true),
            ("f2", Node::nil(), true),
            ("sum", params(&["x"]), false),
            ("car", params(&["x"]), false),
            ("2f", params(&["x"]), false),
            ("g", params(&["x", "x"]), false),
            ("g", params(&["1x"]), false),
            ("g", params(&["+"]), false),
            ("g", sym("x"), false),
            ("g", Node::cons(sym("x"), sym("y")), false),
        ];

        for (i, (name, formals, ok)) in cases.iter().enumerate() {
            let mut env = Environment::new();
            match env.register_function(name, formals, &body) {
                Ok(f) => {
                    assert!(ok, "case #{}: expected rejection", i + 1);
                    assert!(env.is_defined_function(name));
                    assert_eq!(f.arity(), formals.elements().count());
                }
                Err(Error::DefinitionError(_)) => {
                    assert!(!ok, "case #{}: expected success", i + 1);
                    assert!(!env.is_defined_function(name));
                }
                Err(other) => panic!("case #{}: unexpected error {other:?}", i + 1),
            }
        }
    }

    #[test]
    fn test_function_lookup_and_redefinition() {
        let mut env = Environment::new();
        assert!(matches!(env.function("f"), Err(Error::BindingError(_))));

        env.register_function("f", &params(&["x"]), &sym("x")).unwrap();
        env.register_function("f", &params(&["a", "b"]), &sym("b")).unwrap();
        let f = env.function("f").unwrap();
        assert_eq!(f.params(), ["a", "b"]);
        assert_eq!(f.body(), &sym("b"));
        assert_eq!(env.functions().len(), 1);
    }

    #[test]
    fn test_substitute_and_restore() {
        let mut env = Environment::new();
        env.define_variable("x", Node::from(1));
        let before = env.variables().clone();

        let saved = env.substitute(vec![
            ("x".into(), Node::from(10)),
            ("y".into(), Node::from(20)),
        ]);
        assert_eq!(env.get_variable("x").unwrap(), &Node::from(10));
        assert_eq!(env.get_variable("y").unwrap(), &Node::from(20));

        env.restore(saved);
        assert_eq!(env.variables(), &before);
    }
}
