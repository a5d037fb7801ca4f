//! Identifier validation and quoting.
//!
//! Table and column names come from the content model and end up spliced
//! into DDL, where they cannot be bound as parameters. Every name is
//! validated before it is accepted into a schema definition and quoted when
//! rendered.

use crate::error::{MigrateError, Result};

/// PostgreSQL truncates identifiers longer than this (NAMEDATALEN - 1).
pub const MAX_IDENTIFIER_LENGTH: usize = 63;

/// Validate an identifier.
///
/// Rejects:
/// - Empty identifiers
/// - Identifiers containing null bytes
/// - Identifiers exceeding [`MAX_IDENTIFIER_LENGTH`] bytes (they would be
///   silently truncated and never match on introspection)
pub fn validate_identifier(name: &str) -> Result<()> {
    if name.is_empty() {
        return Err(MigrateError::Config(
            "Identifier cannot be empty".to_string(),
        ));
    }

    if name.contains('\0') {
        return Err(MigrateError::Config(format!(
            "Identifier contains null byte: {:?}",
            name
        )));
    }

    if name.len() > MAX_IDENTIFIER_LENGTH {
        return Err(MigrateError::Config(format!(
            "Identifier exceeds maximum length of {} bytes (got {} bytes): {:?}",
            MAX_IDENTIFIER_LENGTH,
            name.len(),
            name
        )));
    }

    Ok(())
}

/// Quote a PostgreSQL identifier.
///
/// Escapes double quotes by doubling them and wraps in double quotes.
///
/// ```
/// use contentdb_migrate::core::identifier::quote_pg;
/// assert_eq!(quote_pg("users"), "\"users\"");
/// assert_eq!(quote_pg("table\"name"), "\"table\"\"name\"");
/// ```
pub fn quote_pg(name: &str) -> String {
    format!("\"{}\"", name.replace('"', "\"\""))
}

/// Undo [`quote_pg`]. Returns `None` if `quoted` is not a quoted identifier.
pub fn unquote_pg(quoted: &str) -> Option<String> {
    let inner = quoted.strip_prefix('"')?.strip_suffix('"')?;
    Some(inner.replace("\"\"", "\""))
}
