//! Comment removal ahead of tokenization.
//!
//! `;` starts a comment that runs to the end of the line. `#|` opens a block
//! comment closed by `|#`; block comments may span lines but do not nest.
//! Comment markers inside string literals are ordinary text.

use crate::Error;

#[derive(Debug, Clone, Copy, PartialEq)]
enum ScanState {
    Code,
    Str,
    LineComment,
    BlockComment { opened_on: usize },
}

/// Remove all comments from `text`.
///
/// Each comment is replaced by a single space, so the tokens on either side of
/// a block comment never fuse. Newlines are preserved.
pub fn strip_comments(text: &str) -> Result<String, Error> {
    let mut out = String::with_capacity(text.len());
    let mut state = ScanState::Code;
    let mut line = 1;
    let mut chars = text.chars().peekable();

    while let Some(c) = chars.next() {
        if c == '\n' {
            line += 1;
        }
        match state {
            ScanState::Code => match c {
                ';' => state = ScanState::LineComment,
                '#' if chars.peek() == Some(&'|') => {
                    chars.next();
                    out.push(' ');
                    state = ScanState::BlockComment { opened_on: line };
                }
                '|' if chars.peek() == Some(&'#') => {
                    return Err(Error::LexicalError(format!(
                        "'|#' without a matching '#|' on line {line}"
                    )));
                }
                '"' => {
                    out.push(c);
                    state = ScanState::Str;
                }
                _ => out.push(c),
            },
            ScanState::Str => {
                out.push(c);
                if c == '"' {
                    state = ScanState::Code;
                }
            }
            ScanState::LineComment => {
                if c == '\n' {
                    out.push(c);
                    state = ScanState::Code;
                }
            }
            ScanState::BlockComment { .. } => {
                if c == '\n' {
                    out.push(c);
                } else if c == '|' && chars.peek() == Some(&'#') {
                    chars.next();
                    state = ScanState::Code;
                }
            }
        }
    }

    if let ScanState::BlockComment { opened_on } = state {
        return Err(Error::LexicalError(format!(
            "block comment opened on line {opened_on} is never closed"
        )));
    }

    Ok(out)
}
