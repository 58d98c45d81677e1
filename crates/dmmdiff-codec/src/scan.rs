//! Nesting-aware scanning of atom text.
//!
//! Dictionary entries contain string literals, `{"..."}` long strings and
//! nested brackets, any of which may hold the separators (`,`, `;`, `)`) the
//! parser splits on. The scanner reports only characters at nesting depth 0
//! outside of strings.

use thiserror::Error;

#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub(crate) enum ScanError {
    #[error("unterminated string literal")]
    UnterminatedString,
    #[error("unclosed bracket")]
    Unclosed,
    #[error("unbalanced {0:?}")]
    Unbalanced(char),
}

enum Literal {
    Plain { escaped: bool },
    Long,
}

/// Walk `text`, calling `visit` for every top-level character (closing
/// brackets at depth 0 included). Scanning stops at the first character for
/// which `visit` returns `true`, and that byte offset is returned.
///
/// A top-level closing bracket that `visit` does not stop on is an error.
pub(crate) fn scan_top_level<F>(text: &str, mut visit: F) -> Result<Option<usize>, ScanError>
where
    F: FnMut(usize, char) -> bool,
{
    let mut depth = 0usize;
    let mut literal: Option<Literal> = None;
    let mut chars = text.char_indices().peekable();

    while let Some((i, ch)) = chars.next() {
        match &mut literal {
            Some(Literal::Plain { escaped }) => {
                if *escaped {
                    *escaped = false;
                } else if ch == '\\' {
                    *escaped = true;
                } else if ch == '"' {
                    literal = None;
                }
                continue;
            }
            Some(Literal::Long) => {
                if ch == '"' && chars.peek().map(|(_, c)| *c) == Some('}') {
                    chars.next();
                    literal = None;
                }
                continue;
            }
            None => {}
        }

        match ch {
            '"' => literal = Some(Literal::Plain { escaped: false }),
            '{' if depth > 0 && chars.peek().map(|(_, c)| *c) == Some('"') => {
                chars.next();
                literal = Some(Literal::Long);
            }
            '(' | '[' | '{' => depth += 1,
            ')' | ']' | '}' => {
                if depth == 0 {
                    if visit(i, ch) {
                        return Ok(Some(i));
                    }
                    return Err(ScanError::Unbalanced(ch));
                }
                depth -= 1;
            }
            _ if depth == 0 => {
                if visit(i, ch) {
                    return Ok(Some(i));
                }
            }
            _ => {}
        }
    }

    if literal.is_some() {
        return Err(ScanError::UnterminatedString);
    }
    if depth > 0 {
        return Err(ScanError::Unclosed);
    }
    Ok(None)
}

/// Split `text` on top-level occurrences of `sep`.
pub(crate) fn split_top_level(text: &str, sep: char) -> Result<Vec<&str>, ScanError> {
    let mut parts = Vec::new();
    let mut start = 0;
    scan_top_level(text, |i, ch| {
        if ch == sep {
            parts.push(&text[start..i]);
            start = i + ch.len_utf8();
        }
        false
    })?;
    parts.push(&text[start..]);
    Ok(parts)
}
