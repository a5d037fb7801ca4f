//! On-disk migration file format.
//!
//! ```text
//! -- Migration: 20240301120000_create_blogs
//!
//! -- +migrate up
//! CREATE TABLE "public"."blogs"(
//!     "id" integer GENERATED BY DEFAULT AS IDENTITY PRIMARY KEY
//! );
//!
//! -- +migrate down
//! DROP TABLE "public"."blogs";
//! ```
//!
//! Statements end with a `;` at the end of a line. File names are
//! `{14-digit timestamp}_{slug}.sql`.

use chrono::{DateTime, NaiveDateTime, Utc};
use std::path::Path;

use crate::emit::{MigrationUnit, TIMESTAMP_FORMAT};
use crate::error::{MigrateError, Result};

pub const UP_MARKER: &str = "-- +migrate up";
pub const DOWN_MARKER: &str = "-- +migrate down";

const TIMESTAMP_DIGITS: usize = 14;

/// Render a unit as file contents.
pub fn render(unit: &MigrationUnit) -> String {
    let mut out = format!("-- Migration: {}\n\n{}\n", unit.id(), UP_MARKER);
    push_statements(&mut out, &unit.up);
    out.push('\n');
    out.push_str(DOWN_MARKER);
    out.push('\n');
    push_statements(&mut out, &unit.down);
    out
}

fn push_statements(out: &mut String, statements: &[String]) {
    for (i, sql) in statements.iter().enumerate() {
        if i > 0 {
            out.push('\n');
        }
        out.push_str(sql.trim_end().trim_end_matches(';'));
        out.push_str(";\n");
    }
}

/// Split a file stem into its timestamp and slug.
///
/// Returns `None` unless the stem is 14 digits, `_`, and a non-empty slug.
pub fn parse_stem(stem: &str) -> Option<(DateTime<Utc>, &str)> {
    let digits = stem.get(..TIMESTAMP_DIGITS)?;
    if !digits.bytes().all(|b| b.is_ascii_digit()) {
        return None;
    }
    let name = stem.get(TIMESTAMP_DIGITS..)?.strip_prefix('_')?;
    if name.is_empty() {
        return None;
    }
    let naive = NaiveDateTime::parse_from_str(digits, TIMESTAMP_FORMAT).ok()?;
    Some((naive.and_utc(), name))
}

/// Whether a path looks like a migration file.
pub fn is_migration_file(path: &Path) -> bool {
    path.extension().is_some_and(|ext| ext == "sql")
        && path
            .file_stem()
            .and_then(|s| s.to_str())
            .and_then(parse_stem)
            .is_some()
}

#[derive(Clone, Copy, PartialEq)]
enum Section {
    Preamble,
    Up,
    Down,
}

/// Parse file contents back into a unit. `path` supplies the identifier.
pub fn parse(path: &Path, contents: &str) -> Result<MigrationUnit> {
    let stem = path
        .file_stem()
        .and_then(|s| s.to_str())
        .ok_or_else(|| MigrateError::format(path, "file name is not valid UTF-8"))?;
    let (timestamp, name) = parse_stem(stem).ok_or_else(|| {
        MigrateError::format(path, "file name must be {14-digit timestamp}_{name}.sql")
    })?;

    let mut section = Section::Preamble;
    let mut seen_up = false;
    let mut up = Vec::new();
    let mut down = Vec::new();
    let mut buffer = String::new();

    for (line_no, line) in contents.lines().enumerate() {
        let trimmed = line.trim();

        if trimmed.eq_ignore_ascii_case(UP_MARKER) || trimmed.eq_ignore_ascii_case(DOWN_MARKER) {
            if !buffer.trim().is_empty() {
                return Err(MigrateError::format(
                    path,
                    format!("unterminated statement before line {}", line_no + 1),
                ));
            }
            buffer.clear();
            if trimmed.eq_ignore_ascii_case(UP_MARKER) {
                section = Section::Up;
                seen_up = true;
            } else {
                section = Section::Down;
            }
            continue;
        }

        if buffer.is_empty() && (trimmed.is_empty() || trimmed.starts_with("--")) {
            continue;
        }

        if section == Section::Preamble {
            return Err(MigrateError::format(
                path,
                format!("statement outside a section at line {}", line_no + 1),
            ));
        }

        if !buffer.is_empty() {
            buffer.push('\n');
        }
        buffer.push_str(line);

        if trimmed.ends_with(';') {
            let statement = buffer.trim().trim_end_matches(';').trim_end().to_string();
            buffer.clear();
            if statement.is_empty() {
                continue;
            }
            match section {
                Section::Up => up.push(statement),
                Section::Down => down.push(statement),
                Section::Preamble => {}
            }
        }
    }

    if !buffer.trim().is_empty() {
        return Err(MigrateError::format(path, "last statement is missing its ';'"));
    }
    if !seen_up {
        return Err(MigrateError::format(path, format!("missing '{}' section", UP_MARKER)));
    }

    Ok(MigrationUnit {
        timestamp,
        name: name.to_string(),
        up,
        down,
    })
}
