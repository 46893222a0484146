// ABOUTME: Read-only schema snapshot (Catalog) and SQL-type resolution (Dialect)
// ABOUTME: The core only ever reads through these traits; introspection lives here

use tokio_postgres::types::Type;
use tokio_postgres::Client;

use crate::error::SyncError;
use crate::utils::quote_ident;

/// Per-column properties the catalog exposes: name, nullability, and a
/// dialect-resolved SQL type code.
#[derive(Debug, Clone)]
pub struct ColumnProperties {
    pub name: String,
    pub sql_type: Type,
    pub nullable: bool,
}

/// A single table's schema-relevant properties: qualified name, ordered
/// columns, and the (non-empty, ordered) primary-key column list.
#[derive(Debug, Clone)]
pub struct TableProperties {
    pub schema: String,
    pub name: String,
    pub columns: Vec<ColumnProperties>,
    pub primary_key: Vec<String>,
}

impl TableProperties {
    pub fn qualified_name(&self) -> String {
        format!("{}.{}", quote_ident(&self.schema), quote_ident(&self.name))
    }

    pub fn display_name(&self) -> String {
        format!("{}.{}", self.schema, self.name)
    }

    pub fn column_properties(&self, name: &str) -> Option<&ColumnProperties> {
        self.columns.iter().find(|c| c.name == name)
    }
}

/// Read-only view over the source schema. The only shipped implementation,
/// [`PostgresCatalog`], snapshots `information_schema`/`pg_catalog` once up
/// front; the strategy driver never re-queries it mid-run.
pub trait Catalog: Send + Sync {
    fn tables(&self) -> &[TableProperties];
}

/// Resolves a column's SQL type code for the concrete wire protocol in use.
/// For this crate that's always `tokio_postgres::types::Type`, already
/// carried on `ColumnProperties`, but the trait keeps that resolution at an
/// explicit seam rather than baking "the type code IS the catalog's type
/// code" into the core.
pub trait Dialect: Send + Sync {
    fn column_type(&self, column: &ColumnProperties) -> Type;
    fn quote_ident(&self, ident: &str) -> String;
}

pub struct PostgresDialect;

impl Dialect for PostgresDialect {
    fn column_type(&self, column: &ColumnProperties) -> Type {
        column.sql_type.clone()
    }

    fn quote_ident(&self, ident: &str) -> String {
        quote_ident(ident)
    }
}

/// A `Catalog` built from a live connection's `information_schema` and
/// `pg_catalog` views, snapshotted once at strategy start.
pub struct PostgresCatalog {
    tables: Vec<TableProperties>,
}

impl Catalog for PostgresCatalog {
    fn tables(&self) -> &[TableProperties] {
        &self.tables
    }
}

impl PostgresCatalog {
    /// Loads the catalog from `client`, restricted to `schema` and, when
    /// `only_tables` is non-empty, to that subset (each entry `schema.table`
    /// or a bare table name assumed to be in `schema`).
    pub async fn load(
        client: &Client,
        schema: &str,
        only_tables: &[String],
    ) -> Result<Self, SyncError> {
        let table_rows = client
            .query(
                "SELECT table_name FROM information_schema.tables \
                 WHERE table_schema = $1 AND table_type = 'BASE TABLE' \
                 ORDER BY table_name",
                &[&schema],
            )
            .await?;

        let mut tables = Vec::new();
        for row in table_rows {
            let name: String = row.get(0);
            if !only_tables.is_empty() && !table_selected(only_tables, schema, &name) {
                continue;
            }
            let columns = load_columns(client, schema, &name).await?;
            let primary_key = load_primary_key(client, schema, &name).await?;
            tables.push(TableProperties {
                schema: schema.to_string(),
                name,
                columns,
                primary_key,
            });
        }

        Ok(Self { tables })
    }
}

fn table_selected(only_tables: &[String], schema: &str, table: &str) -> bool {
    only_tables.iter().any(|t| match t.split_once('.') {
        Some((s, n)) => s == schema && n == table,
        None => t == table,
    })
}

async fn load_columns(
    client: &Client,
    schema: &str,
    table: &str,
) -> Result<Vec<ColumnProperties>, SyncError> {
    let rows = client
        .query(
            "SELECT a.attname, a.atttypid, NOT a.attnotnull AS nullable \
             FROM pg_attribute a \
             JOIN pg_class c ON c.oid = a.attrelid \
             JOIN pg_namespace n ON n.oid = c.relnamespace \
             WHERE n.nspname = $1 AND c.relname = $2 AND a.attnum > 0 AND NOT a.attisdropped \
             ORDER BY a.attnum",
            &[&schema, &table],
        )
        .await?;

    let mut columns = Vec::with_capacity(rows.len());
    for row in rows {
        let name: String = row.get(0);
        let oid: u32 = row.get(1);
        let nullable: bool = row.get(2);
        let sql_type = Type::from_oid(oid).unwrap_or(Type::TEXT);
        columns.push(ColumnProperties {
            name,
            sql_type,
            nullable,
        });
    }
    Ok(columns)
}

async fn load_primary_key(
    client: &Client,
    schema: &str,
    table: &str,
) -> Result<Vec<String>, SyncError> {
    let rows = client
        .query(
            "SELECT a.attname \
             FROM pg_index i \
             JOIN pg_attribute a ON a.attrelid = i.indrelid AND a.attnum = ANY(i.indkey) \
             JOIN pg_class c ON c.oid = i.indrelid \
             JOIN pg_namespace n ON n.oid = c.relnamespace \
             WHERE n.nspname = $1 AND c.relname = $2 AND i.indisprimary \
             ORDER BY array_position(i.indkey, a.attnum)",
            &[&schema, &table],
        )
        .await?;

    Ok(rows.iter().map(|r| r.get(0)).collect())
}
