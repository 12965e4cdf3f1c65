//! conslisp CLI entry point

use std::fs;
use std::io::{self, Read, Write};

use anyhow::{Context, Result};
use clap::Parser;
use conslisp::Interpreter;
use conslisp::cli::{Args, unique_output_path};
use conslisp::program::render;

fn main() -> Result<()> {
    let args = Args::parse();

    // RUST_LOG wins over the -d default.
    let default_filter = if args.debug { "debug" } else { "warn" };
    env_logger::Builder::from_env(env_logger::Env::default().default_filter_or(default_filter))
        .init();

    let program = match &args.input {
        Some(path) => fs::read_to_string(path)
            .with_context(|| format!("failed to read {}", path.display()))?,
        None => {
            let mut text = String::new();
            io::stdin()
                .read_to_string(&mut text)
                .context("failed to read standard input")?;
            text
        }
    };

    let mut interpreter = Interpreter::new();
    let outcomes = interpreter.run(&program);
    log::debug!("evaluated {} statement(s)", outcomes.len());

    #[cfg(feature = "json")]
    let report = if args.json {
        serde_json::to_string_pretty(&conslisp::program::report_json(&outcomes))
            .context("failed to serialize report")?
    } else {
        render(&outcomes, &args.run_config())
    };
    #[cfg(not(feature = "json"))]
    let report = render(&outcomes, &args.run_config());

    match &args.output {
        Some(path) => {
            let path = unique_output_path(path);
            fs::write(&path, report).with_context(|| format!("failed to write {}", path.display()))?;
            log::info!("wrote results to {}", path.display());
        }
        None => {
            let mut stdout = io::stdout().lock();
            writeln!(stdout, "{report}").context("failed to write standard output")?;
        }
    }

    Ok(())
}
