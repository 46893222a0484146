// ABOUTME: ConstraintOps collaborator (§6) — drops and restores target FKs/unique constraints
// ABOUTME: Snapshots each constraint's definition before dropping it so restoration is exact

use async_trait::async_trait;
use tokio_postgres::Client;

use crate::error::SyncError;
use crate::utils::quote_ident;

/// A dropped constraint, captured with enough information to recreate it
/// verbatim: the owning table, its name, and `pg_get_constraintdef`'s
/// rendering of its body (`FOREIGN KEY (...) REFERENCES ...`, `UNIQUE (...)`).
#[derive(Debug, Clone)]
struct ConstraintDef {
    schema: String,
    table: String,
    name: String,
    definition: String,
}

/// The constraint-envelope collaborator (§4.6 step 2 and step 5): drops
/// every foreign key and unique constraint on the target before the table
/// loop, and restores them afterward. Implementations carry the dropped
/// set between the drop and restore calls, so `&mut self` is required.
#[async_trait]
pub trait ConstraintOps: Send {
    async fn drop_foreign_keys(&mut self, target: &Client) -> Result<(), SyncError>;
    async fn drop_unique_constraints(&mut self, target: &Client) -> Result<(), SyncError>;
    async fn restore_unique_constraints(&mut self, target: &Client) -> Result<(), SyncError>;
    async fn restore_foreign_keys(&mut self, target: &Client) -> Result<(), SyncError>;
}

/// Operates against `pg_constraint`/`pg_namespace`/`pg_class` on the target
/// connection, scoped to one schema. Foreign keys (`contype = 'f'`) and
/// unique constraints (`contype = 'u'`) are handled independently; primary
/// keys (`contype = 'p'`) are never touched — the merge relies on them.
pub struct PostgresConstraintOps {
    schema: String,
    dropped_foreign_keys: Vec<ConstraintDef>,
    dropped_unique_constraints: Vec<ConstraintDef>,
}

impl PostgresConstraintOps {
    pub fn new(schema: impl Into<String>) -> Self {
        Self {
            schema: schema.into(),
            dropped_foreign_keys: Vec::new(),
            dropped_unique_constraints: Vec::new(),
        }
    }

    async fn snapshot(&self, target: &Client, contype: char) -> Result<Vec<ConstraintDef>, SyncError> {
        let rows = target
            .query(
                "SELECT n.nspname, c.relname, con.conname, pg_get_constraintdef(con.oid) \
                 FROM pg_constraint con \
                 JOIN pg_class c ON c.oid = con.conrelid \
                 JOIN pg_namespace n ON n.oid = c.relnamespace \
                 WHERE n.nspname = $1 AND con.contype = $2",
                &[&self.schema, &contype.to_string()],
            )
            .await?;

        Ok(rows
            .into_iter()
            .map(|row| ConstraintDef {
                schema: row.get(0),
                table: row.get(1),
                name: row.get(2),
                definition: row.get(3),
            })
            .collect())
    }

    async fn drop_all(&self, target: &Client, defs: &[ConstraintDef]) -> Result<(), SyncError> {
        for def in defs {
            let sql = format!(
                "ALTER TABLE {}.{} DROP CONSTRAINT {}",
                quote_ident(&def.schema),
                quote_ident(&def.table),
                quote_ident(&def.name)
            );
            tracing::debug!(sql = %sql, "dropping constraint");
            target.batch_execute(&sql).await?;
        }
        Ok(())
    }

    async fn restore_all(&self, target: &Client, defs: &[ConstraintDef]) -> Result<(), SyncError> {
        for def in defs {
            let sql = format!(
                "ALTER TABLE {}.{} ADD CONSTRAINT {} {}",
                quote_ident(&def.schema),
                quote_ident(&def.table),
                quote_ident(&def.name),
                def.definition
            );
            tracing::debug!(sql = %sql, "restoring constraint");
            target.batch_execute(&sql).await?;
        }
        Ok(())
    }
}

#[async_trait]
impl ConstraintOps for PostgresConstraintOps {
    async fn drop_foreign_keys(&mut self, target: &Client) -> Result<(), SyncError> {
        let defs = self.snapshot(target, 'f').await?;
        self.drop_all(target, &defs).await?;
        tracing::info!(count = defs.len(), "dropped foreign keys on target");
        self.dropped_foreign_keys = defs;
        Ok(())
    }

    async fn drop_unique_constraints(&mut self, target: &Client) -> Result<(), SyncError> {
        let defs = self.snapshot(target, 'u').await?;
        self.drop_all(target, &defs).await?;
        tracing::info!(count = defs.len(), "dropped unique constraints on target");
        self.dropped_unique_constraints = defs;
        Ok(())
    }

    async fn restore_unique_constraints(&mut self, target: &Client) -> Result<(), SyncError> {
        let defs = std::mem::take(&mut self.dropped_unique_constraints);
        self.restore_all(target, &defs).await?;
        tracing::info!(count = defs.len(), "restored unique constraints on target");
        Ok(())
    }

    async fn restore_foreign_keys(&mut self, target: &Client) -> Result<(), SyncError> {
        let defs = std::mem::take(&mut self.dropped_foreign_keys);
        self.restore_all(target, &defs).await?;
        tracing::info!(count = defs.len(), "restored foreign keys on target");
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn new_ops_start_with_empty_snapshots() {
        let ops = PostgresConstraintOps::new("public");
        assert!(ops.dropped_foreign_keys.is_empty());
        assert!(ops.dropped_unique_constraints.is_empty());
    }
}
