//! PostgreSQL SQL dialect (Strategy pattern).
//!
//! Provides PostgreSQL-specific DDL for the canonical schema types and the
//! catalog mapping used by introspection.

use crate::core::identifier::quote_pg;
use crate::core::{
    CanonicalType, ColumnDefault, ColumnDefinition, Dialect, TableDefinition, ID_COLUMN,
};

/// Column metadata for every base table in one schema.
///
/// Domain-typed catalog columns are cast so they decode as plain
/// text / int4.
const INTROSPECTION_QUERY: &str = r#"
SELECT
    c.table_name::text AS table_name,
    c.column_name::text AS column_name,
    c.data_type::text AS data_type,
    c.udt_name::text AS udt_name,
    c.is_nullable = 'YES' AS is_nullable,
    c.column_default::text AS column_default,
    c.character_maximum_length::int4 AS character_maximum_length,
    c.is_identity = 'YES' AS is_identity
FROM information_schema.columns c
JOIN information_schema.tables t
    ON t.table_schema = c.table_schema
   AND t.table_name = c.table_name
WHERE c.table_schema = $1
  AND t.table_type = 'BASE TABLE'
ORDER BY c.table_name, c.ordinal_position
"#;

const IDENTITY_CLAUSE: &str = "GENERATED BY DEFAULT AS IDENTITY";

/// PostgreSQL dialect implementation.
#[derive(Debug, Clone, Default)]
pub struct PostgresDialect;

impl PostgresDialect {
    /// Create a new PostgreSQL dialect instance.
    pub fn new() -> Self {
        Self
    }

    fn alter_column(&self, schema: &str, table: &str, column: &str, action: &str) -> String {
        format!(
            "ALTER TABLE {} ALTER COLUMN {} {}",
            self.qualify(schema, table),
            self.quote_ident(column),
            action
        )
    }
}

impl Dialect for PostgresDialect {
    fn name(&self) -> &str {
        "postgres"
    }

    fn quote_ident(&self, name: &str) -> String {
        quote_pg(name)
    }

    fn column_type(&self, column: &ColumnDefinition) -> String {
        match column.column_type {
            CanonicalType::Integer | CanonicalType::Relation => "integer".to_string(),
            CanonicalType::Text => "text".to_string(),
            CanonicalType::Varchar => match column.max_length {
                Some(len) => format!("varchar({})", len),
                None => "varchar".to_string(),
            },
            CanonicalType::Boolean => "boolean".to_string(),
            CanonicalType::Numeric => "numeric".to_string(),
            CanonicalType::Timestamp => "timestamp".to_string(),
            CanonicalType::Jsonb => "jsonb".to_string(),
            CanonicalType::TextArray => "text[]".to_string(),
        }
    }

    fn column_clause(&self, name: &str, column: &ColumnDefinition) -> String {
        let mut clause = format!("{} {}", self.quote_ident(name), self.column_type(column));

        match &column.default {
            Some(ColumnDefault::Identity) => {
                clause.push(' ');
                clause.push_str(IDENTITY_CLAUSE);
            }
            Some(ColumnDefault::Expression(expr)) => {
                clause.push_str(" DEFAULT ");
                clause.push_str(expr);
            }
            None => {}
        }

        // PRIMARY KEY implies NOT NULL
        if name == ID_COLUMN && !column.nullable {
            clause.push_str(" PRIMARY KEY");
        } else if !column.nullable {
            clause.push_str(" NOT NULL");
        }

        clause
    }

    fn create_table(&self, schema: &str, table: &str, definition: &TableDefinition) -> String {
        let columns: Vec<String> = definition
            .columns()
            .map(|(name, column)| self.column_clause(name, column))
            .collect();

        format!(
            "CREATE TABLE {}(\n    {}\n)",
            self.qualify(schema, table),
            columns.join(",\n    ")
        )
    }

    fn drop_table(&self, schema: &str, table: &str) -> String {
        format!("DROP TABLE {}", self.qualify(schema, table))
    }

    fn add_column(
        &self,
        schema: &str,
        table: &str,
        column: &str,
        definition: &ColumnDefinition,
    ) -> String {
        format!(
            "ALTER TABLE {} ADD COLUMN {}",
            self.qualify(schema, table),
            self.column_clause(column, definition)
        )
    }

    fn drop_column(&self, schema: &str, table: &str, column: &str) -> String {
        format!(
            "ALTER TABLE {} DROP COLUMN {}",
            self.qualify(schema, table),
            self.quote_ident(column)
        )
    }

    fn alter_column_type(
        &self,
        schema: &str,
        table: &str,
        column: &str,
        definition: &ColumnDefinition,
    ) -> String {
        let native = self.column_type(definition);
        let action = format!(
            "TYPE {} USING {}::{}",
            native,
            self.quote_ident(column),
            native
        );
        self.alter_column(schema, table, column, &action)
    }

    fn alter_nullability(&self, schema: &str, table: &str, column: &str, nullable: bool) -> String {
        let action = if nullable { "DROP NOT NULL" } else { "SET NOT NULL" };
        self.alter_column(schema, table, column, action)
    }

    fn alter_default(
        &self,
        schema: &str,
        table: &str,
        column: &str,
        from: Option<&ColumnDefault>,
        to: Option<&ColumnDefault>,
    ) -> Vec<String> {
        if from == to {
            return Vec::new();
        }

        let mut statements = Vec::new();
        match from {
            Some(ColumnDefault::Identity) => {
                statements.push(self.alter_column(schema, table, column, "DROP IDENTITY IF EXISTS"))
            }
            // SET DEFAULT replaces an expression in place
            Some(ColumnDefault::Expression(_)) if !matches!(to, Some(ColumnDefault::Expression(_))) => {
                statements.push(self.alter_column(schema, table, column, "DROP DEFAULT"))
            }
            _ => {}
        }

        match to {
            Some(ColumnDefault::Identity) => statements.push(self.alter_column(
                schema,
                table,
                column,
                &format!("ADD {}", IDENTITY_CLAUSE),
            )),
            Some(ColumnDefault::Expression(expr)) => statements.push(self.alter_column(
                schema,
                table,
                column,
                &format!("SET DEFAULT {}", expr),
            )),
            None => {}
        }

        statements
    }

    fn introspection_query(&self) -> &str {
        INTROSPECTION_QUERY
    }

    fn canonical_type(&self, data_type: &str, udt_name: &str) -> Option<CanonicalType> {
        let canonical = match udt_name {
            "int2" | "int4" | "int8" => CanonicalType::Integer,
            "text" => CanonicalType::Text,
            "varchar" => CanonicalType::Varchar,
            "bool" => CanonicalType::Boolean,
            "numeric" | "float4" | "float8" => CanonicalType::Numeric,
            "timestamp" | "timestamptz" | "date" => CanonicalType::Timestamp,
            "jsonb" | "json" => CanonicalType::Jsonb,
            "_text" | "_varchar" => CanonicalType::TextArray,
            _ => match data_type {
                "integer" | "smallint" | "bigint" => CanonicalType::Integer,
                "text" => CanonicalType::Text,
                "character varying" => CanonicalType::Varchar,
                "boolean" => CanonicalType::Boolean,
                _ => return None,
            },
        };
        Some(canonical)
    }

    fn parse_default(&self, raw: Option<&str>, is_identity: bool) -> Option<ColumnDefault> {
        if is_identity {
            return Some(ColumnDefault::Identity);
        }
        let raw = raw?.trim();
        if raw.is_empty() {
            return None;
        }
        // serial columns report their sequence as the default
        if raw.starts_with("nextval(") {
            return Some(ColumnDefault::Identity);
        }
        Some(ColumnDefault::Expression(raw.to_string()))
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_quote_ident() {
        let dialect = PostgresDialect::new();
        assert_eq!(dialect.quote_ident("name"), "\"name\"");
        assert_eq!(dialect.quote_ident("table\"name"), "\"table\"\"name\"");
        assert_eq!(dialect.quote_ident("Users"), "\"Users\"");
    }

    #[test]
    fn test_column_types() {
        let dialect = PostgresDialect::new();
        let render = |t| dialect.column_type(&ColumnDefinition::new(t));
        assert_eq!(render(CanonicalType::Integer), "integer");
        assert_eq!(render(CanonicalType::Relation), "integer");
        assert_eq!(render(CanonicalType::Varchar), "varchar");
        assert_eq!(render(CanonicalType::TextArray), "text[]");
        assert_eq!(
            dialect.column_type(&ColumnDefinition::new(CanonicalType::Varchar).with_max_length(50)),
            "varchar(50)"
        );
    }

    #[test]
    fn test_create_table() {
        let dialect = PostgresDialect::new();
        let mut table = TableDefinition::with_id();
        table.insert("title", ColumnDefinition::new(CanonicalType::Varchar).not_null());
        table.insert("body", ColumnDefinition::new(CanonicalType::Text));

        assert_eq!(
            dialect.create_table("public", "blogs", &table),
            "CREATE TABLE \"public\".\"blogs\"(\n    \
             \"id\" integer GENERATED BY DEFAULT AS IDENTITY PRIMARY KEY,\n    \
             \"title\" varchar NOT NULL,\n    \
             \"body\" text\n)"
        );
    }

    #[test]
    fn test_alter_column_type_uses_cast() {
        let dialect = PostgresDialect::new();
        let column = ColumnDefinition::new(CanonicalType::Numeric);
        assert_eq!(
            dialect.alter_column_type("public", "posts", "rating", &column),
            "ALTER TABLE \"public\".\"posts\" ALTER COLUMN \"rating\" TYPE numeric USING \"rating\"::numeric"
        );
    }

    #[test]
    fn test_alter_default_transitions() {
        let dialect = PostgresDialect::new();
        let expr = ColumnDefault::Expression("0".into());
        let identity = ColumnDefault::Identity;

        assert!(dialect
            .alter_default("s", "t", "c", Some(&expr), Some(&expr))
            .is_empty());
        assert_eq!(
            dialect.alter_default("s", "t", "c", None, Some(&expr)),
            vec!["ALTER TABLE \"s\".\"t\" ALTER COLUMN \"c\" SET DEFAULT 0"]
        );
        assert_eq!(
            dialect.alter_default("s", "t", "c", Some(&expr), None),
            vec!["ALTER TABLE \"s\".\"t\" ALTER COLUMN \"c\" DROP DEFAULT"]
        );
        assert_eq!(
            dialect.alter_default("s", "t", "c", Some(&expr), Some(&identity)),
            vec![
                "ALTER TABLE \"s\".\"t\" ALTER COLUMN \"c\" DROP DEFAULT",
                "ALTER TABLE \"s\".\"t\" ALTER COLUMN \"c\" ADD GENERATED BY DEFAULT AS IDENTITY",
            ]
        );
        assert_eq!(
            dialect.alter_default("s", "t", "c", Some(&identity), None),
            vec!["ALTER TABLE \"s\".\"t\" ALTER COLUMN \"c\" DROP IDENTITY IF EXISTS"]
        );
    }

    #[test]
    fn test_canonical_type_mapping() {
        let dialect = PostgresDialect::new();
        assert_eq!(
            dialect.canonical_type("character varying", "varchar"),
            Some(CanonicalType::Varchar)
        );
        assert_eq!(dialect.canonical_type("ARRAY", "_text"), Some(CanonicalType::TextArray));
        assert_eq!(
            dialect.canonical_type("timestamp without time zone", "timestamp"),
            Some(CanonicalType::Timestamp)
        );
        assert_eq!(dialect.canonical_type("USER-DEFINED", "geometry"), None);
    }

    #[test]
    fn test_parse_default() {
        let dialect = PostgresDialect::new();
        assert_eq!(dialect.parse_default(None, true), Some(ColumnDefault::Identity));
        assert_eq!(
            dialect.parse_default(Some("nextval('blogs_id_seq'::regclass)"), false),
            Some(ColumnDefault::Identity)
        );
        assert_eq!(
            dialect.parse_default(Some("now()"), false),
            Some(ColumnDefault::Expression("now()".into()))
        );
        assert_eq!(dialect.parse_default(None, false), None);
    }

    #[test]
    fn test_introspection_query_is_read_only() {
        let query = PostgresDialect::new().introspection_query().to_uppercase();
        assert!(query.trim_start().starts_with("SELECT"));
        assert!(query.contains("INFORMATION_SCHEMA.COLUMNS"));
        assert!(query.contains("$1"));
    }
}
