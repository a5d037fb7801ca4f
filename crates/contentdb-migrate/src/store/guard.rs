//! Duplicate detection for generated migrations.
//!
//! A candidate is a duplicate of the latest persisted unit when both
//! directions contain the same statements after normalization, regardless
//! of order.

use crate::emit::MigrationUnit;

/// Strip comments, collapse whitespace and drop a trailing `;`.
///
/// Comment markers inside quoted literals and identifiers are kept.
pub fn normalize(statement: &str) -> String {
    let mut out = String::with_capacity(statement.len());
    let mut chars = statement.chars().peekable();
    let mut quote: Option<char> = None;

    while let Some(c) = chars.next() {
        if let Some(q) = quote {
            out.push(c);
            if c == q {
                quote = None;
            }
            continue;
        }
        match c {
            '\'' | '"' => {
                quote = Some(c);
                out.push(c);
            }
            '-' if chars.peek() == Some(&'-') => {
                for next in chars.by_ref() {
                    if next == '\n' {
                        break;
                    }
                }
                out.push(' ');
            }
            '/' if chars.peek() == Some(&'*') => {
                chars.next();
                let mut prev = '\0';
                for next in chars.by_ref() {
                    if prev == '*' && next == '/' {
                        break;
                    }
                    prev = next;
                }
                out.push(' ');
            }
            _ => out.push(c),
        }
    }

    let collapsed = out.split_whitespace().collect::<Vec<_>>().join(" ");
    collapsed.trim_end_matches(';').trim_end().to_string()
}

fn canonical(statements: &[String]) -> Vec<String> {
    let mut normalized: Vec<String> = statements
        .iter()
        .map(|s| normalize(s))
        .filter(|s| !s.is_empty())
        .collect();
    normalized.sort();
    normalized
}

/// Whether `candidate` would only repeat `previous`.
pub fn is_duplicate(previous: &MigrationUnit, candidate: &MigrationUnit) -> bool {
    canonical(&previous.up) == canonical(&candidate.up)
        && canonical(&previous.down) == canonical(&candidate.down)
}
