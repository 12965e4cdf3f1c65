use conslisp::Interpreter;
use conslisp::classify::{StandardClassifier, TokenClassifier};
use conslisp::lexer::tokenize;
use conslisp::source::strip_comments;
use rustyline::DefaultEditor;
use rustyline::error::ReadlineError;

/// Read statements until `:quit` or end of input. Only the line editor can
/// fail; interpreter errors are printed per statement.
fn main() -> rustyline::Result<()> {
    println!("conslisp interactive interpreter");
    println!("Enter expressions like: (sum 5 6) or {{defun sq [x] (product x x)}}");
    println!("Type :help for more commands, or Ctrl+C to exit.");
    println!();

    let mut rl = DefaultEditor::new()?;
    let mut interpreter = Interpreter::new();
    let mut debug = false;
    let mut pending = String::new();

    loop {
        let prompt = if pending.is_empty() { "conslisp> " } else { "      ... " };
        match rl.readline(prompt) {
            Ok(line) => {
                if pending.is_empty() {
                    let command = line.trim();
                    if command.is_empty() {
                        continue;
                    }
                    let _ = rl.add_history_entry(command);

                    match command {
                        ":help" => {
                            print_help();
                            continue;
                        }
                        ":env" => {
                            print_environment(&interpreter);
                            continue;
                        }
                        ":debug" => {
                            debug = !debug;
                            println!("Full error messages {}", if debug { "on" } else { "off" });
                            continue;
                        }
                        ":quit" | ":exit" => {
                            println!("Goodbye!");
                            break;
                        }
                        _ => {}
                    }
                } else {
                    let _ = rl.add_history_entry(line.trim());
                }

                pending.push_str(&line);
                pending.push('\n');

                // Keep reading while a clause is still open.
                if open_brackets(&pending) > 0 {
                    continue;
                }

                for outcome in interpreter.run(&pending) {
                    println!("{}", outcome.render(debug));
                }
                pending.clear();
            }

            Err(ReadlineError::Interrupted) if !pending.is_empty() => {
                pending.clear();
            }
            Err(ReadlineError::Eof) | Err(ReadlineError::Interrupted) => {
                println!("Goodbye!");
                break;
            }
            Err(err) => return Err(err),
        }
    }
    Ok(())
}

/// Net count of unclosed brackets. Text that does not lex counts as closed
/// so the interpreter gets to report the error.
fn open_brackets(text: &str) -> isize {
    let Ok(tokens) = strip_comments(text).and_then(|clean| tokenize(clean.trim())) else {
        return 0;
    };
    let c = StandardClassifier;
    tokens.iter().fold(0, |depth, token| {
        if c.is_open_token(token) {
            depth + 1
        } else if c.is_close_token(token) {
            depth - 1
        } else {
            depth
        }
    })
}

fn print_help() {
    println!("conslisp commands:");
    println!("  :help      - Show this help message");
    println!("  :env       - Show primitives and user-defined functions");
    println!("  :debug     - Toggle full error messages");
    println!("  :quit      - Exit the interpreter");
    println!("  :exit      - Exit the interpreter");
    println!("  Ctrl+C     - Cancel the current input, or exit");
    println!();
    println!("Syntax:");
    println!("  Lists:        (sum 1 2 3)");
    println!("  Dot notation: (sum . (1 . (2 . NIL)))");
    println!("  Brackets:     (), [] and {{}} are interchangeable");
    println!("  Comments:     ; to end of line, #| block |#");
    println!();
    println!("Examples:");
    println!("  (defun fibonacci (n) (cond [(<= n 1) n] [t (+ (fibonacci (- n 1)) (fibonacci (- n 2)))]))");
    println!("  (fibonacci 7)");
    println!("  ((lambda (x y) (product x y)) 15 7)");
    println!("  (quote (a . b))");
    println!();
}

fn print_environment(interpreter: &Interpreter) {
    let env = interpreter.env();
    let primitives = env.registry().ops();

    println!("Primitives ({}):", primitives.len());
    let mut col = 0;
    for op in primitives {
        print!("  {:<22}", op.aliases.join(" "));
        col += 1;
        if col % 3 == 0 {
            println!();
        }
    }
    if col % 3 != 0 {
        println!();
    }
    println!();

    let functions = env.functions();
    if functions.is_empty() {
        println!("No user-defined functions.");
        return;
    }

    println!("User-defined functions ({}):", functions.len());
    for function in functions {
        println!(
            "  ({} {}) = {}",
            function.name(),
            function.params().join(" "),
            function.body()
        );
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_open_brackets() {
        let cases = vec![
            ("(sum 1 2)", 0),
            ("(defun sq (x)", 1),
            ("{defun sq [x}", 1),
            ("(list \"(\"", 1),
            ("(sum 1 ; (", 1),
            ("#| ((( |# (car", 1),
            (")", -1),
            ("\"open", 0),
        ];

        for (i, (text, expected)) in cases.into_iter().enumerate() {
            assert_eq!(open_brackets(text), expected, "case #{}: {text}", i + 1);
        }
    }
}
