//! `?` to `$n` placeholder rewriting.
//!
//! Callers write fragments with positional `?` markers; Postgres wants `$1, $2, ...`.
//! The scanner leaves these regions untouched:
//!
//! - `'...'` string literals (`''` escapes, `E'...'` backslash escapes)
//! - `"..."` quoted identifiers
//! - `$$...$$` and `$tag$...$tag$` dollar-quoted strings
//! - `-- ...` line comments and `/* ... */` block comments (nesting allowed)
//!
//! Outside them, `??` produces a literal `?` (for the jsonb `?` operator) and
//! every other `?` becomes the next `$n`.

use std::fmt::Write;

/// Rewrite `?` markers to `$1, $2, ...` and return the new SQL plus the number
/// of placeholders written.
pub fn rewrite_placeholders(sql: &str) -> (String, usize) {
    let mut out = String::with_capacity(sql.len() + 8);
    let count = scan(sql, Some(&mut out));
    (out, count)
}

/// Count the `?` markers [`rewrite_placeholders`] would rewrite.
pub fn count_placeholders(sql: &str) -> usize {
    scan(sql, None)
}

fn scan(sql: &str, mut out: Option<&mut String>) -> usize {
    let bytes = sql.as_bytes();
    let mut count = 0;
    let mut i = 0;
    // Start of the pending verbatim run.
    let mut run = 0;

    macro_rules! flush {
        ($end:expr) => {
            if let Some(o) = out.as_deref_mut() {
                o.push_str(&sql[run..$end]);
            }
        };
    }

    while i < bytes.len() {
        match bytes[i] {
            b'\'' => {
                let escapes = i > 0 && matches!(bytes[i - 1], b'E' | b'e') && !is_word_byte_before(bytes, i - 1);
                i = skip_string(bytes, i + 1, escapes);
            }
            b'"' => i = skip_quoted_ident(bytes, i + 1),
            // `$1` and `col$x` are not dollar quotes.
            b'$' if !is_word_byte_before(bytes, i) => match dollar_tag_len(bytes, i) {
                Some(len) => i = skip_dollar_quoted(bytes, i, len),
                None => i += 1,
            },
            b'-' if bytes.get(i + 1) == Some(&b'-') => {
                i = bytes[i..]
                    .iter()
                    .position(|&b| b == b'\n')
                    .map_or(bytes.len(), |p| i + p + 1);
            }
            b'/' if bytes.get(i + 1) == Some(&b'*') => i = skip_block_comment(bytes, i + 2),
            b'?' if bytes.get(i + 1) == Some(&b'?') => {
                flush!(i + 1);
                i += 2;
                run = i;
            }
            b'?' => {
                flush!(i);
                count += 1;
                if let Some(o) = out.as_deref_mut() {
                    let _ = write!(o, "${}", count);
                }
                i += 1;
                run = i;
            }
            _ => i += 1,
        }
    }
    flush!(bytes.len());
    count
}

fn is_word_byte_before(bytes: &[u8], pos: usize) -> bool {
    pos > 0 && (bytes[pos - 1].is_ascii_alphanumeric() || bytes[pos - 1] == b'_')
}

fn skip_string(bytes: &[u8], mut i: usize, backslash_escapes: bool) -> usize {
    while i < bytes.len() {
        match bytes[i] {
            b'\\' if backslash_escapes => i += 2,
            b'\'' if bytes.get(i + 1) == Some(&b'\'') => i += 2,
            b'\'' => return i + 1,
            _ => i += 1,
        }
    }
    bytes.len()
}

fn skip_quoted_ident(bytes: &[u8], mut i: usize) -> usize {
    while i < bytes.len() {
        match bytes[i] {
            b'"' if bytes.get(i + 1) == Some(&b'"') => i += 2,
            b'"' => return i + 1,
            _ => i += 1,
        }
    }
    bytes.len()
}

/// Length of the opening `$tag$` starting at `start`, if there is one.
fn dollar_tag_len(bytes: &[u8], start: usize) -> Option<usize> {
    let is_tag_start = |b: u8| b == b'_' || b.is_ascii_alphabetic() || b >= 0x80;
    let mut j = start + 1;
    match bytes.get(j) {
        Some(b'$') => return Some(2),
        Some(&b) if is_tag_start(b) => j += 1,
        _ => return None,
    }
    while let Some(&b) = bytes.get(j) {
        match b {
            b'$' => return Some(j + 1 - start),
            b if is_tag_start(b) || b.is_ascii_digit() => j += 1,
            _ => return None,
        }
    }
    None
}

fn skip_dollar_quoted(bytes: &[u8], start: usize, tag_len: usize) -> usize {
    let tag = &bytes[start..start + tag_len];
    let body = start + tag_len;
    bytes[body..]
        .windows(tag_len)
        .position(|w| w == tag)
        .map_or(bytes.len(), |p| body + p + tag_len)
}

fn skip_block_comment(bytes: &[u8], mut i: usize) -> usize {
    let mut depth = 1;
    while i < bytes.len() {
        if bytes[i] == b'/' && bytes.get(i + 1) == Some(&b'*') {
            depth += 1;
            i += 2;
        } else if bytes[i] == b'*' && bytes.get(i + 1) == Some(&b'/') {
            depth -= 1;
            i += 2;
            if depth == 0 {
                return i;
            }
        } else {
            i += 1;
        }
    }
    bytes.len()
}
