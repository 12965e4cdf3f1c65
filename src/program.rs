//! Statement driver: runs whole programs and renders their results.
//!
//! A program is a sequence of top-level statements, each either one bracketed
//! clause or one atom. Every statement is normalized, built into a tree and
//! evaluated on its own; a failing statement reports its error and the driver
//! moves on to the next one. Function definitions persist across statements
//! of the same [`Interpreter`].

use crate::ast::Node;
use crate::classify::{StandardClassifier, TokenClassifier};
use crate::environment::Environment;
use crate::evaluator::eval_statement;
use crate::lexer::{Token, tokenize};
use crate::normalize::{clause_end, to_dot_notation};
use crate::source::strip_comments;
use crate::Error;

/// How results are rendered.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct RunConfig {
    /// Placed between rendered statement results.
    pub separator: String,
    /// Render full error messages instead of just the error kind.
    pub debug: bool,
}

impl Default for RunConfig {
    fn default() -> Self {
        RunConfig {
            separator: "\n".to_owned(),
            debug: false,
        }
    }
}

/// One evaluated top-level statement.
#[derive(Debug, Clone, PartialEq)]
pub struct StatementOutcome {
    /// The statement's tokens joined by single spaces.
    pub source: String,
    pub result: Result<Node, Error>,
}

impl StatementOutcome {
    /// The output line for this statement.
    pub fn render(&self, debug: bool) -> String {
        match &self.result {
            Ok(node) => node.to_string(),
            Err(err) if debug => format!("Error occurred! {err}"),
            Err(err) => format!("Error occurred! ({})", err.kind()),
        }
    }
}

/// An interpreter session.
#[derive(Debug, Clone, Default)]
pub struct Interpreter {
    env: Environment,
}

impl Interpreter {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn env(&self) -> &Environment {
        &self.env
    }

    /// Run every statement of `text` and collect one outcome per statement.
    ///
    /// Comment and tokenization failures affect the whole text, so they
    /// produce a single failing outcome.
    pub fn run(&mut self, text: &str) -> Vec<StatementOutcome> {
        let tokens = match strip_comments(text).and_then(|clean| tokenize(clean.trim())) {
            Ok(tokens) => tokens,
            Err(err) => {
                log::warn!("program rejected: {err}");
                return vec![StatementOutcome {
                    source: text.trim().to_owned(),
                    result: Err(err),
                }];
            }
        };

        split_statements(&tokens)
            .into_iter()
            .map(|(statement, split_error)| {
                let source = statement.join(" ");
                let result = match split_error {
                    Some(err) => Err(err),
                    None => self.eval_statement_tokens(statement),
                };
                match &result {
                    Ok(value) => log::debug!("{source} => {value}"),
                    Err(err) => log::warn!("{source} failed: {err}"),
                }
                StatementOutcome { source, result }
            })
            .collect()
    }

    fn eval_statement_tokens(&mut self, statement: &[Token]) -> Result<Node, Error> {
        let canonical = to_dot_notation(statement)?;
        let node = Node::from_tokens(canonical)?;
        eval_statement(&node, &mut self.env)
    }
}

/// Split a token stream into top-level statements.
///
/// A stray close bracket or dot is a failing statement of its own. A clause
/// that is never closed swallows the rest of the stream as one failing
/// statement.
fn split_statements(tokens: &[Token]) -> Vec<(&[Token], Option<Error>)> {
    let c = StandardClassifier;
    let mut statements = Vec::new();
    let mut i = 0;

    while i < tokens.len() {
        let token = &tokens[i];
        if c.is_open_token(token) {
            match clause_end(tokens, i) {
                Ok(end) => {
                    statements.push((&tokens[i..=end], None));
                    i = end + 1;
                }
                Err(err) => {
                    statements.push((&tokens[i..], Some(err)));
                    break;
                }
            }
        } else if c.is_close_token(token) || c.is_dot_token(token) {
            statements.push((
                &tokens[i..=i],
                Some(Error::StructuralError(format!(
                    "unexpected '{token}' at top level"
                ))),
            ));
            i += 1;
        } else {
            statements.push((&tokens[i..=i], None));
            i += 1;
        }
    }

    statements
}

/// Join the rendered outcomes with the configured separator.
pub fn render(outcomes: &[StatementOutcome], config: &RunConfig) -> String {
    outcomes
        .iter()
        .map(|outcome| outcome.render(config.debug))
        .collect::<Vec<_>>()
        .join(&config.separator)
}

/// Machine-readable report: one object per statement.
#[cfg(feature = "json")]
pub fn report_json(outcomes: &[StatementOutcome]) -> serde_json::Value {
    use serde_json::json;

    outcomes
        .iter()
        .map(|outcome| match &outcome.result {
            Ok(node) => json!({
                "statement": outcome.source,
                "result": node.to_string(),
            }),
            Err(err) => json!({
                "statement": outcome.source,
                "error": {
                    "kind": err.kind(),
                    "message": err.message(),
                },
            }),
        })
        .collect()
}

#[cfg(test)]
#[expect(clippy::unwrap_used)] // test code OK
mod tests {
    use super::*;

    fn run_lines(program: &str) -> Vec<String> {
        let mut interpreter = Interpreter::new();
        interpreter
            .run(program)
            .iter()
            .map(|outcome| outcome.render(false))
            .collect()
    }

    #[test]
    fn test_run_data_driven() {
        let cases: Vec<(&str, Vec<&str>)> = vec![
            ("(sum 5 6)", vec!["11"]),
            ("", vec![]),
            ("   \n  ", vec![]),
            ("(sum 5 6 7) (sum 5 6 (product 3 3) 12)", vec!["18", "32"]),
            ("42", vec!["42"]),
            ("x (sum 1 2) T", vec!["x", "3", "T"]),
            (
                "(quote (+ 1 2)) (' (* (+ 3 5) (- 2 2)))",
                vec!["(+ 1 2)", "(* (+ 3 5) (- 2 2))"],
            ),
            (
                "(car 5) (sum 1 2)",
                vec!["Error occurred! (TypeError)", "3"],
            ),
            (
                "(sum 1 2) ) (sum 3 4)",
                vec!["3", "Error occurred! (StructuralError)", "7"],
            ),
            (
                ". (sum 1 2)",
                vec!["Error occurred! (StructuralError)", "3"],
            ),
            (
                "(sum 1 2) (sum 3 (product 4 5)",
                vec!["3", "Error occurred! (StructuralError)"],
            ),
            ("(sum 1 @)", vec!["Error occurred! (LexicalError)"]),
            ("(undefined)", vec!["Error occurred! (BindingError)"]),
            ("(quotient 1 0)", vec!["Error occurred! (ArithmeticError)"]),
            (
                "(defun f (x) x) (f 1 2)",
                vec!["f", "Error occurred! (DefinitionError)"],
            ),
            (
                "; leading comment\n(sum 1 2) ; trailing\n#| block\n(sum 9 9)\n|# (sum 3 4)",
                vec!["3", "7"],
            ),
            ("(sum 1 2) |#", vec!["Error occurred! (LexicalError)"]),
        ];

        for (i, (program, expected)) in cases.iter().enumerate() {
            assert_eq!(run_lines(program), *expected, "case #{}: {program:?}", i + 1);
        }
    }

    #[test]
    fn test_functions_persist_across_runs() {
        let mut interpreter = Interpreter::new();
        let first = interpreter.run("(defun sq (x) (product x x))");
        assert_eq!(first[0].result.as_ref().unwrap().to_string(), "sq");

        let second = interpreter.run("(sq 12)");
        assert_eq!(second[0].result.as_ref().unwrap().to_string(), "144");
        assert_eq!(interpreter.env().functions().len(), 1);
        assert!(interpreter.env().variables().is_empty());
    }

    #[test]
    fn test_statement_sources() {
        let mut interpreter = Interpreter::new();
        let outcomes = interpreter.run("{sum 1\n 2]   x");
        let sources: Vec<&str> = outcomes.iter().map(|o| o.source.as_str()).collect();
        assert_eq!(sources, vec!["{ sum 1 2 ]", "x"]);
    }

    #[test]
    fn test_render_with_config() {
        let mut interpreter = Interpreter::new();
        let outcomes = interpreter.run("(sum 1 2) (car 5) (list 1 2)");

        let plain = render(&outcomes, &RunConfig::default());
        assert_eq!(plain, "3\nError occurred! (TypeError)\n(1 2)");

        let config = RunConfig {
            separator: " | ".to_owned(),
            debug: true,
        };
        let detailed = render(&outcomes, &config);
        assert_eq!(
            detailed,
            "3 | Error occurred! TypeError: car requires a cons, got 5 | (1 2)"
        );
    }

    #[cfg(feature = "json")]
    #[test]
    fn test_report_json() {
        let mut interpreter = Interpreter::new();
        let outcomes = interpreter.run("(sum 1 2) (undefined 1)");
        let report = report_json(&outcomes);

        assert_eq!(
            report,
            serde_json::json!([
                { "statement": "( sum 1 2 )", "result": "3" },
                {
                    "statement": "( undefined 1 )",
                    "error": {
                        "kind": "BindingError",
                        "message": "undefined function undefined",
                    },
                },
            ])
        );
    }
}
