// ABOUTME: Statement Builder (C2) — produces SELECT/INSERT/UPDATE/DELETE SQL text
// ABOUTME: No literal values ever appear; every variable part is a $n placeholder

use crate::catalog::TableProperties;
use crate::projection::ColumnProjection;
use crate::utils::quote_ident;

/// The four SQL texts a table needs for one synchronization pass.
/// `update` is `None` exactly when the projection has no value columns
/// (a pure-PK table never needs an UPDATE statement).
#[derive(Debug, Clone)]
pub struct TableStatements {
    pub select: String,
    pub insert: String,
    pub update: Option<String>,
    pub delete: String,
}

pub fn build(table: &TableProperties, projection: &ColumnProjection) -> TableStatements {
    TableStatements {
        select: build_select(table, projection),
        insert: build_insert(table, projection),
        update: build_update(table, projection),
        delete: build_delete(table, projection),
    }
}

fn build_select(table: &TableProperties, projection: &ColumnProjection) -> String {
    let cols = projection
        .select_cols
        .iter()
        .map(|c| quote_ident(&c.name))
        .collect::<Vec<_>>()
        .join(", ");
    let order_by = projection
        .pk_cols
        .iter()
        .map(|c| quote_ident(&c.name))
        .collect::<Vec<_>>()
        .join(", ");
    format!(
        "SELECT {cols} FROM {} ORDER BY {order_by}",
        table.qualified_name()
    )
}

fn build_insert(table: &TableProperties, projection: &ColumnProjection) -> String {
    let cols = projection
        .select_cols
        .iter()
        .map(|c| quote_ident(&c.name))
        .collect::<Vec<_>>()
        .join(", ");
    let placeholders = (1..=projection.select_cols.len())
        .map(|i| format!("${i}"))
        .collect::<Vec<_>>()
        .join(", ");
    format!(
        "INSERT INTO {} ({cols}) VALUES ({placeholders})",
        table.qualified_name()
    )
}

fn build_delete(table: &TableProperties, projection: &ColumnProjection) -> String {
    let predicate = pk_predicate(projection, 1);
    format!("DELETE FROM {} WHERE {predicate}", table.qualified_name())
}

fn build_update(table: &TableProperties, projection: &ColumnProjection) -> Option<String> {
    let value_cols = projection.value_cols();
    if value_cols.is_empty() {
        return None;
    }
    let set_clause = value_cols
        .iter()
        .enumerate()
        .map(|(i, c)| format!("{} = ${}", quote_ident(&c.name), i + 1))
        .collect::<Vec<_>>()
        .join(", ");
    let predicate = pk_predicate(projection, value_cols.len() + 1);
    Some(format!(
        "UPDATE {} SET {set_clause} WHERE {predicate}",
        table.qualified_name()
    ))
}

/// `pk1 = $n AND pk2 = $(n+1) ...` starting at parameter ordinal `start`.
fn pk_predicate(projection: &ColumnProjection, start: usize) -> String {
    projection
        .pk_cols
        .iter()
        .enumerate()
        .map(|(i, c)| format!("{} = ${}", quote_ident(&c.name), start + i))
        .collect::<Vec<_>>()
        .join(" AND ")
}
