//! In-memory stand-ins for a PostgreSQL connection, used by unit tests.
//!
//! [`SchemaSimulator`] interprets the DDL produced by `PostgresDialect` and
//! answers catalog reads from its current state, so the full
//! generate/migrate/rollback cycle can run without a server.

use async_trait::async_trait;
use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::Mutex;

use crate::core::identifier::unquote_pg;
use crate::core::{
    CanonicalType, CatalogColumn, CatalogReader, ColumnDefault, ColumnDefinition, DatabaseAdapter,
    Dialect, Direction, Executor, SchemaDefinition, TableDefinition, ID_COLUMN,
};
use crate::drivers::postgres::PostgresDialect;
use crate::emit::{MigrationContext, MigrationUnit};
use crate::error::{MigrateError, Result};

const IDENTITY_CLAUSE: &str = "GENERATED BY DEFAULT AS IDENTITY";

fn rejected(sql: &str, reason: impl std::fmt::Display) -> MigrateError {
    MigrateError::Connection(format!("simulated server rejected `{}`: {}", sql, reason))
}

/// Split a leading quoted identifier off `input`.
fn take_ident(input: &str) -> Option<(String, &str)> {
    let bytes = input.as_bytes();
    if bytes.first() != Some(&b'"') {
        return None;
    }
    let mut i = 1;
    while i < bytes.len() {
        if bytes[i] == b'"' {
            if bytes.get(i + 1) == Some(&b'"') {
                i += 2;
                continue;
            }
            let name = unquote_pg(&input[..=i])?;
            return Some((name, &input[i + 1..]));
        }
        i += 1;
    }
    None
}

fn parse_native_type(native: &str) -> Option<(CanonicalType, Option<u32>)> {
    let parsed = match native {
        "integer" => (CanonicalType::Integer, None),
        "text" => (CanonicalType::Text, None),
        "varchar" => (CanonicalType::Varchar, None),
        "boolean" => (CanonicalType::Boolean, None),
        "numeric" => (CanonicalType::Numeric, None),
        "timestamp" => (CanonicalType::Timestamp, None),
        "jsonb" => (CanonicalType::Jsonb, None),
        "text[]" => (CanonicalType::TextArray, None),
        other => {
            let len = other.strip_prefix("varchar(")?.strip_suffix(')')?.parse().ok()?;
            (CanonicalType::Varchar, Some(len))
        }
    };
    Some(parsed)
}

fn catalog_type(column_type: CanonicalType) -> (&'static str, &'static str) {
    match column_type {
        CanonicalType::Integer | CanonicalType::Relation => ("integer", "int4"),
        CanonicalType::Text => ("text", "text"),
        CanonicalType::Varchar => ("character varying", "varchar"),
        CanonicalType::Boolean => ("boolean", "bool"),
        CanonicalType::Numeric => ("numeric", "numeric"),
        CanonicalType::Timestamp => ("timestamp without time zone", "timestamp"),
        CanonicalType::Jsonb => ("jsonb", "jsonb"),
        CanonicalType::TextArray => ("ARRAY", "_text"),
    }
}

/// Parse a column clause: `"name" type [identity | DEFAULT expr] [PRIMARY KEY | NOT NULL]`.
fn parse_column_clause(sql: &str, clause: &str) -> Result<(String, ColumnDefinition)> {
    let (name, rest) = take_ident(clause.trim()).ok_or_else(|| rejected(sql, "expected column name"))?;
    let mut rest = rest.trim();

    let mut nullable = true;
    for suffix in [" PRIMARY KEY", " NOT NULL"] {
        if let Some(stripped) = rest.strip_suffix(suffix) {
            rest = stripped;
            nullable = false;
            break;
        }
    }

    let (native, modifiers) = match rest.split_once(' ') {
        Some((native, modifiers)) => (native, modifiers.trim()),
        None => (rest, ""),
    };
    let (column_type, max_length) =
        parse_native_type(native).ok_or_else(|| rejected(sql, format!("unknown type {}", native)))?;

    let default = if modifiers.is_empty() {
        None
    } else if modifiers == IDENTITY_CLAUSE {
        Some(ColumnDefault::Identity)
    } else if let Some(expr) = modifiers.strip_prefix("DEFAULT ") {
        Some(ColumnDefault::Expression(expr.trim().to_string()))
    } else {
        return Err(rejected(sql, format!("unexpected modifiers {}", modifiers)));
    };

    let column = ColumnDefinition {
        column_type,
        nullable,
        default,
        max_length,
    };
    Ok((name, column))
}

/// Executes generated DDL against an in-memory schema.
pub struct SchemaSimulator {
    schema: String,
    state: Mutex<SchemaDefinition>,
}

impl SchemaSimulator {
    pub fn new(schema: &str, initial: SchemaDefinition) -> Self {
        Self {
            schema: schema.to_string(),
            state: Mutex::new(initial),
        }
    }

    pub fn snapshot(&self) -> SchemaDefinition {
        self.state.lock().unwrap().clone()
    }

    pub fn restore(&self, schema: SchemaDefinition) {
        *self.state.lock().unwrap() = schema;
    }

    pub fn apply_all(&self, statements: &[String]) -> Result<()> {
        statements.iter().try_for_each(|sql| self.apply(sql))
    }

    /// Parse `"schema"."table"` and check the namespace.
    fn table_name<'a>(&self, sql: &str, input: &'a str) -> Result<(String, &'a str)> {
        let (schema, rest) = take_ident(input.trim_start()).ok_or_else(|| rejected(sql, "expected schema"))?;
        if schema != self.schema {
            return Err(rejected(sql, format!("unexpected schema {}", schema)));
        }
        let rest = rest.strip_prefix('.').ok_or_else(|| rejected(sql, "expected qualified name"))?;
        take_ident(rest).ok_or_else(|| rejected(sql, "expected table name"))
    }

    pub fn apply(&self, sql: &str) -> Result<()> {
        let sql = sql.trim();
        let mut state = self.state.lock().unwrap();

        if let Some(rest) = sql.strip_prefix("CREATE TABLE ") {
            let (table, rest) = self.table_name(sql, rest)?;
            if state.contains(&table) {
                return Err(rejected(sql, format!("relation {} already exists", table)));
            }
            let body = rest
                .strip_prefix('(')
                .and_then(|b| b.strip_suffix(')'))
                .ok_or_else(|| rejected(sql, "expected column list"))?;
            let mut definition = TableDefinition::new();
            for clause in body.split(",\n") {
                let (name, column) = parse_column_clause(sql, clause)?;
                definition.insert(name, column);
            }
            state.insert(table, definition);
            return Ok(());
        }

        if let Some(rest) = sql.strip_prefix("DROP TABLE ") {
            let (if_exists, rest) = match rest.strip_prefix("IF EXISTS ") {
                Some(rest) => (true, rest),
                None => (false, rest),
            };
            let (table, tail) = self.table_name(sql, rest)?;
            if !matches!(tail.trim(), "" | "CASCADE") {
                return Err(rejected(sql, "trailing input"));
            }
            if state.remove(&table).is_none() && !if_exists {
                return Err(rejected(sql, format!("relation {} does not exist", table)));
            }
            return Ok(());
        }

        let rest = sql
            .strip_prefix("ALTER TABLE ")
            .ok_or_else(|| rejected(sql, "unsupported statement"))?;
        let (table_name, rest) = self.table_name(sql, rest)?;
        let table = state
            .get_mut(&table_name)
            .ok_or_else(|| rejected(sql, format!("relation {} does not exist", table_name)))?;
        let rest = rest.trim_start();

        if let Some(clause) = rest.strip_prefix("ADD COLUMN ") {
            let (name, column) = parse_column_clause(sql, clause)?;
            if table.contains(&name) {
                return Err(rejected(sql, format!("column {} already exists", name)));
            }
            table.insert(name, column);
            return Ok(());
        }

        if let Some(column) = rest.strip_prefix("DROP COLUMN ") {
            let (name, _) = take_ident(column).ok_or_else(|| rejected(sql, "expected column"))?;
            return match table.remove(&name) {
                Some(_) => Ok(()),
                None => Err(rejected(sql, format!("column {} does not exist", name))),
            };
        }

        let rest = rest
            .strip_prefix("ALTER COLUMN ")
            .ok_or_else(|| rejected(sql, "unsupported ALTER TABLE action"))?;
        let (name, action) = take_ident(rest).ok_or_else(|| rejected(sql, "expected column"))?;
        let column = table
            .get_mut(&name)
            .ok_or_else(|| rejected(sql, format!("column {} does not exist", name)))?;

        match action.trim() {
            "SET NOT NULL" => column.nullable = false,
            "DROP NOT NULL" => {
                if column.is_identity() {
                    return Err(rejected(sql, format!("column {} is an identity column", name)));
                }
                column.nullable = true;
            }
            "DROP DEFAULT" => {
                if column.is_identity() {
                    return Err(rejected(sql, format!("column {} is an identity column", name)));
                }
                column.default = None;
            }
            "DROP IDENTITY IF EXISTS" => {
                if column.is_identity() {
                    column.default = None;
                }
            }
            other if other == format!("ADD {}", IDENTITY_CLAUSE) => {
                if column.nullable {
                    return Err(rejected(sql, format!("column {} must be declared NOT NULL", name)));
                }
                if column.default.is_some() {
                    return Err(rejected(sql, format!("column {} already has a default", name)));
                }
                column.default = Some(ColumnDefault::Identity);
            }
            other => {
                if let Some(expr) = other.strip_prefix("SET DEFAULT ") {
                    if column.is_identity() {
                        return Err(rejected(sql, format!("column {} is an identity column", name)));
                    }
                    column.default = Some(ColumnDefault::Expression(expr.trim().to_string()));
                } else if let Some(change) = other.strip_prefix("TYPE ") {
                    let native = change.split(" USING ").next().unwrap_or(change).trim();
                    let (column_type, max_length) = parse_native_type(native)
                        .ok_or_else(|| rejected(sql, format!("unknown type {}", native)))?;
                    column.column_type = column_type;
                    column.max_length = max_length;
                } else {
                    return Err(rejected(sql, format!("unsupported action {}", other)));
                }
            }
        }
        Ok(())
    }

    fn catalog_rows(&self) -> Vec<CatalogColumn> {
        let state = self.state.lock().unwrap();
        let mut rows = Vec::new();
        for (table, definition) in state.tables() {
            for (name, column) in definition.columns() {
                let (data_type, udt_name) = catalog_type(column.column_type);
                rows.push(CatalogColumn {
                    table_name: table.to_string(),
                    column_name: name.to_string(),
                    data_type: data_type.to_string(),
                    udt_name: udt_name.to_string(),
                    is_nullable: column.nullable,
                    column_default: match &column.default {
                        Some(ColumnDefault::Expression(expr)) => Some(expr.clone()),
                        _ => None,
                    },
                    character_maximum_length: column.max_length.map(|l| l as i32),
                    is_identity: column.is_identity(),
                });
            }
        }
        rows
    }
}

#[async_trait]
impl Executor for SchemaSimulator {
    async fn execute_statement(&self, sql: &str) -> Result<()> {
        self.apply(sql)
    }
}

#[async_trait]
impl CatalogReader for SchemaSimulator {
    async fn read_columns(&self, _dialect: &dyn Dialect, schema: &str) -> Result<Vec<CatalogColumn>> {
        if schema != self.schema {
            return Ok(Vec::new());
        }
        Ok(self.catalog_rows())
    }
}

/// Records every statement and succeeds.
#[derive(Default)]
pub struct RecordingExecutor {
    statements: Mutex<Vec<String>>,
}

impl RecordingExecutor {
    pub fn statements(&self) -> Vec<String> {
        self.statements.lock().unwrap().clone()
    }
}

#[async_trait]
impl Executor for RecordingExecutor {
    async fn execute_statement(&self, sql: &str) -> Result<()> {
        self.statements.lock().unwrap().push(sql.to_string());
        Ok(())
    }
}

/// Records statements and fails on the `fail_at`-th one (1-based).
pub struct FailingExecutor {
    fail_at: usize,
    inner: RecordingExecutor,
}

impl FailingExecutor {
    pub fn new(fail_at: usize) -> Self {
        Self {
            fail_at,
            inner: RecordingExecutor::default(),
        }
    }

    pub fn statements(&self) -> Vec<String> {
        self.inner.statements()
    }
}

#[async_trait]
impl Executor for FailingExecutor {
    async fn execute_statement(&self, sql: &str) -> Result<()> {
        self.inner.execute_statement(sql).await?;
        if self.inner.statements.lock().unwrap().len() == self.fail_at {
            return Err(rejected(sql, "injected failure"));
        }
        Ok(())
    }
}

/// Adapter over a [`SchemaSimulator`] with transactional apply semantics.
pub struct SimulatedAdapter {
    schema: String,
    dialect: PostgresDialect,
    simulator: SchemaSimulator,
    applied: Mutex<Vec<String>>,
    reachable: bool,
    initialized: AtomicBool,
    closed: AtomicBool,
}

impl SimulatedAdapter {
    pub fn new(schema: &str, initial: SchemaDefinition) -> Self {
        Self {
            schema: schema.to_string(),
            dialect: PostgresDialect::new(),
            simulator: SchemaSimulator::new(schema, initial),
            applied: Mutex::new(Vec::new()),
            reachable: true,
            initialized: AtomicBool::new(false),
            closed: AtomicBool::new(false),
        }
    }

    pub fn empty(schema: &str) -> Self {
        Self::new(schema, SchemaDefinition::new())
    }

    /// Adapter whose `initialize` fails like an unreachable server.
    pub fn unreachable(schema: &str) -> Self {
        Self {
            reachable: false,
            ..Self::empty(schema)
        }
    }

    pub fn applied_ids(&self) -> Vec<String> {
        self.applied.lock().unwrap().clone()
    }

    pub fn was_initialized(&self) -> bool {
        self.initialized.load(Ordering::SeqCst)
    }

    pub fn was_closed(&self) -> bool {
        self.closed.load(Ordering::SeqCst)
    }
}

#[async_trait]
impl DatabaseAdapter for SimulatedAdapter {
    fn dialect(&self) -> &dyn Dialect {
        &self.dialect
    }

    fn schema(&self) -> &str {
        &self.schema
    }

    async fn initialize(&mut self) -> Result<()> {
        if !self.reachable {
            return Err(MigrateError::Connection("connection refused".into()));
        }
        self.initialized.store(true, Ordering::SeqCst);
        Ok(())
    }

    async fn test_connection(&self) -> bool {
        self.reachable
    }

    async fn introspect(&self) -> Result<SchemaDefinition> {
        crate::introspect::introspect(&self.simulator, &self.dialect, &self.schema).await
    }

    async fn prepare_bookkeeping(&self) -> Result<()> {
        Ok(())
    }

    async fn applied_migrations(&self) -> Result<Vec<String>> {
        Ok(self.applied_ids())
    }

    async fn apply(&self, unit: &MigrationUnit, direction: Direction) -> Result<()> {
        let before = self.simulator.snapshot();
        let ctx = MigrationContext {
            connection: &self.simulator,
            schema: &self.schema,
        };
        let result = match direction {
            Direction::Up => unit.up(&ctx).await,
            Direction::Down => unit.down(&ctx).await,
        };
        if let Err(e) = result {
            self.simulator.restore(before);
            return Err(e);
        }

        let mut applied = self.applied.lock().unwrap();
        match direction {
            Direction::Up => applied.push(unit.id()),
            Direction::Down => applied.retain(|id| *id != unit.id()),
        }
        Ok(())
    }

    async fn drop_tables(&self, tables: &[String]) -> Result<()> {
        for table in tables {
            let sql = format!(
                "DROP TABLE IF EXISTS {} CASCADE",
                self.dialect.qualify(&self.schema, table)
            );
            self.simulator.apply(&sql)?;
        }
        self.applied.lock().unwrap().clear();
        Ok(())
    }

    async fn close(&mut self) {
        self.closed.store(true, Ordering::SeqCst);
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_take_ident_handles_doubled_quotes() {
        let (name, rest) = take_ident("\"a\"\"b\".\"c\"").unwrap();
        assert_eq!(name, "a\"b");
        assert_eq!(rest, ".\"c\"");
        assert!(take_ident("plain").is_none());
    }

    #[test]
    fn test_column_clause_forms() {
        let (name, id) =
            parse_column_clause("", "\"id\" integer GENERATED BY DEFAULT AS IDENTITY PRIMARY KEY")
                .unwrap();
        assert_eq!(name, ID_COLUMN);
        assert_eq!(id, ColumnDefinition::identity());

        let (_, title) =
            parse_column_clause("", "\"title\" varchar(80) DEFAULT 'a b'::character varying NOT NULL")
                .unwrap();
        assert_eq!(title.max_length, Some(80));
        assert!(!title.nullable);
        assert_eq!(
            title.default,
            Some(ColumnDefault::Expression("'a b'::character varying".into()))
        );
    }

    #[test]
    fn test_rejects_wrong_namespace() {
        let simulator = SchemaSimulator::new("public", SchemaDefinition::new());
        assert!(simulator.apply("DROP TABLE \"other\".\"t\"").is_err());
        assert!(simulator.apply("DROP TABLE \"public\".\"t\"").is_err());
        assert!(simulator.apply("DROP TABLE IF EXISTS \"public\".\"t\" CASCADE").is_ok());
    }
}
