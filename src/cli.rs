//! Command-line surface of the `conslisp` binary.

use std::path::{Path, PathBuf};

use clap::Parser;

use crate::program::RunConfig;

/// Evaluate a conslisp program and print one line per top-level statement.
#[derive(Debug, Clone, Parser)]
#[command(name = "conslisp", version, about)]
pub struct Args {
    /// Print full error messages and raise the log level to debug
    #[arg(short = 'd', long)]
    pub debug: bool,

    /// Program file to run (default: standard input)
    #[arg(short = 'i', long = "input", visible_alias = "in", value_name = "FILE")]
    pub input: Option<PathBuf>,

    /// Output file (default: standard output). An existing file is never
    /// overwritten; a numbered sibling is written instead.
    #[arg(short = 'o', long = "output", visible_alias = "out", value_name = "FILE")]
    pub output: Option<PathBuf>,

    /// Text placed between statement results
    #[arg(long, default_value = "\n")]
    pub separator: String,

    /// Emit a JSON report instead of plain lines
    #[cfg(feature = "json")]
    #[arg(long)]
    pub json: bool,
}

impl Args {
    pub fn run_config(&self) -> RunConfig {
        RunConfig {
            separator: self.separator.clone(),
            debug: self.debug,
        }
    }
}

/// First path among `path`, `stem1.ext`, `stem2.ext`, … that does not exist.
pub fn unique_output_path(path: &Path) -> PathBuf {
    if !path.exists() {
        return path.to_path_buf();
    }

    let stem = path
        .file_stem()
        .map(|s| s.to_string_lossy().into_owned())
        .unwrap_or_default();
    let extension = path.extension().map(|e| e.to_string_lossy().into_owned());

    (1u64..)
        .map(|n| {
            let name = match &extension {
                Some(ext) => format!("{stem}{n}.{ext}"),
                None => format!("{stem}{n}"),
            };
            path.with_file_name(name)
        })
        .find(|candidate| !candidate.exists())
        .unwrap_or_else(|| path.to_path_buf())
}

#[cfg(test)]
#[expect(clippy::unwrap_used)] // test code OK
mod tests {
    use super::*;
    use std::fs;

    fn scratch_dir(name: &str) -> PathBuf {
        let dir = std::env::temp_dir().join(format!("conslisp-{name}-{}", std::process::id()));
        let _ = fs::remove_dir_all(&dir);
        fs::create_dir_all(&dir).unwrap();
        dir
    }

    #[test]
    fn test_unique_output_path() {
        let dir = scratch_dir("unique");

        let out = dir.join("out.txt");
        assert_eq!(unique_output_path(&out), out);

        fs::write(&out, "").unwrap();
        assert_eq!(unique_output_path(&out), dir.join("out1.txt"));

        fs::write(dir.join("out1.txt"), "").unwrap();
        assert_eq!(unique_output_path(&out), dir.join("out2.txt"));

        let bare = dir.join("results");
        fs::write(&bare, "").unwrap();
        assert_eq!(unique_output_path(&bare), dir.join("results1"));

        fs::remove_dir_all(&dir).unwrap();
    }

    #[test]
    fn test_parse_args() {
        let args = Args::try_parse_from(["conslisp", "-d", "--in", "prog.lisp", "-o", "out.txt"]).unwrap();
        assert!(args.debug);
        assert_eq!(args.input, Some(PathBuf::from("prog.lisp")));
        assert_eq!(args.output, Some(PathBuf::from("out.txt")));
        assert_eq!(args.run_config(), RunConfig { separator: "\n".into(), debug: true });

        let args = Args::try_parse_from(["conslisp", "--separator", ","]).unwrap();
        assert!(!args.debug);
        assert!(args.input.is_none());
        assert_eq!(args.run_config().separator, ",");
    }
}
