//! Named-parameter expansion.
//!
//! Generated SQL uses `:name` placeholders; drivers bind positionally. The
//! expansion walks the SQL once, replacing each placeholder in textual order
//! with `?` and collecting the bound values, so the same named parameter can
//! appear more than once. Single-quoted literal regions are skipped, as are
//! `::` cast markers.

use crate::error::{Error, Result};
use crate::value::{Params, SqlValue};

/// Expands `:name` placeholders into positional `?` binds.
///
/// Parameter keys may carry the `:` prefix or not; keys with the prefix are
/// tried first. Unused parameters are ignored.
///
/// # Errors
///
/// [`Error::MissingParameter`] when a placeholder has no bound value.
pub fn expand_named(sql: &str, params: &Params) -> Result<(String, Vec<SqlValue>)> {
    let mut out = String::with_capacity(sql.len());
    let mut values = Vec::new();
    let mut chars = sql.chars().peekable();
    let mut in_string = false;

    while let Some(ch) = chars.next() {
        if in_string {
            out.push(ch);
            if ch == '\'' {
                in_string = false;
            }
            continue;
        }
        match ch {
            '\'' => {
                in_string = true;
                out.push(ch);
            }
            ':' => {
                if chars.peek() == Some(&':') {
                    // Cast marker, not a placeholder.
                    out.push(':');
                    out.push(chars.next().unwrap_or(':'));
                    continue;
                }
                let mut name = String::new();
                while let Some(&next) = chars.peek() {
                    if next.is_ascii_alphanumeric() || next == '_' {
                        name.push(next);
                        chars.next();
                    } else {
                        break;
                    }
                }
                if name.is_empty() {
                    out.push(':');
                    continue;
                }
                let value = params
                    .get(&format!(":{name}"))
                    .or_else(|| params.get(&name))
                    .ok_or_else(|| Error::MissingParameter(name.clone()))?;
                out.push('?');
                values.push(value.clone());
            }
            _ => out.push(ch),
        }
    }

    Ok((out, values))
}
