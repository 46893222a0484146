// ABOUTME: Table Synchronizer (C5) — orchestrates C2-C4 for a single table inside one target transaction
// ABOUTME: Rolls back and aborts on any failure; never leaves a partially-flushed batch visible

use tokio_postgres::types::Type;
use tokio_postgres::Client;

use crate::batch::{BatchExecutor, Counters};
use crate::catalog::TableProperties;
use crate::config::SyncConfig;
use crate::cursor::{PgCursor, Row, RowCursor, VecCursor};
use crate::error::SyncError;
use crate::merge;
use crate::projection::ColumnProjection;
use crate::statement;

/// Runs one table through the strategy: resolves its projection, builds SQL,
/// fills both cursors (the target SELECT on an auxiliary task, the source
/// SELECT in the foreground — §4.4 "parallel fill"), merges them, and
/// commits the target transaction with the accumulated counters.
///
/// `target_url` opens the auxiliary task's own connection to the target
/// database; see `DESIGN.md` for why the parallel target read can't borrow
/// the primary `target` connection across a `tokio::spawn` boundary.
pub async fn synchronize_table(
    source: &Client,
    target: &mut Client,
    target_url: &str,
    table: &TableProperties,
    config: &SyncConfig,
) -> Result<Counters, SyncError> {
    let projection = ColumnProjection::resolve(table, config.version_pattern.as_deref())?;
    let stmts = statement::build(table, &projection);

    tracing::debug!(
        table = %table.display_name(),
        select = %stmts.select,
        insert = %stmts.insert,
        update = ?stmts.update,
        delete = %stmts.delete,
        "built table statements"
    );

    let col_types: Vec<Type> = projection
        .select_cols
        .iter()
        .map(|c| c.sql_type.clone())
        .collect();

    let target_handle =
        spawn_target_select(target_url, stmts.select.clone(), col_types.clone(), config.fetch_size);

    let cursor_name = format!("diffsync_src_{}", sanitize_cursor_suffix(&table.display_name()));
    let mut source_cursor =
        PgCursor::open(source, &cursor_name, &stmts.select, col_types, config.fetch_size).await?;

    let target_rows = target_handle.await??;
    let mut target_cursor = VecCursor::new(target_rows);

    let mut txn = target.transaction().await?;
    let insert_stmt = txn.prepare(&stmts.insert).await?;
    let update_stmt = match &stmts.update {
        Some(sql) => Some(txn.prepare(sql).await?),
        None => None,
    };
    let delete_stmt = txn.prepare(&stmts.delete).await?;

    let mut executor = BatchExecutor::new(&txn, insert_stmt, update_stmt, delete_stmt, config.max_batch_size);

    let merge_result = merge::run(
        &mut source_cursor,
        &mut target_cursor,
        &projection,
        &table.display_name(),
        &mut executor,
    )
    .await;

    // The source cursor is foreground-owned regardless of outcome; close it
    // best-effort so a merge failure doesn't also leak the server-side cursor.
    let close_result = source_cursor.close().await;

    merge_result?;
    close_result?;

    executor.flush_all().await?;
    let counters = executor.counters();
    drop(executor);

    txn.commit().await?;

    tracing::info!(
        table = %table.display_name(),
        inserts = counters.inserts,
        updates = counters.updates,
        deletes = counters.deletes,
        "table synchronized"
    );

    Ok(counters)
}

/// Opens a second, dedicated connection to the target database and drains
/// its SELECT into an owned `Vec<Row>` — the "owned cursor handle" the
/// background task hands back per §9's design note. Returns the join handle
/// unawaited so the caller can run the foreground source SELECT while this
/// task is in flight (§4.4 "parallel fill") and await it only once both
/// reads have been submitted.
fn spawn_target_select(
    target_url: &str,
    select_sql: String,
    col_types: Vec<Type>,
    fetch_size: u32,
) -> tokio::task::JoinHandle<Result<Vec<Row>, SyncError>> {
    let target_url = target_url.to_string();
    tokio::task::spawn(async move {
        let aux = crate::postgres::connect(&target_url)
            .await
            .map_err(SyncError::Other)?;
        aux.batch_execute("BEGIN TRANSACTION READ ONLY").await?;

        let mut cursor =
            PgCursor::open(&aux, "diffsync_tgt", &select_sql, col_types, fetch_size).await?;

        let mut rows = Vec::new();
        cursor.advance().await?;
        while let Some(row) = cursor.current() {
            rows.push(row.clone());
            cursor.advance().await?;
        }
        cursor.close().await?;
        let _ = aux.batch_execute("ROLLBACK").await;

        Ok::<Vec<Row>, SyncError>(rows)
    })
}

fn sanitize_cursor_suffix(name: &str) -> String {
    name.chars()
        .map(|c| if c.is_ascii_alphanumeric() { c } else { '_' })
        .collect()
}

#[cfg(test)]
mod tests {
    use super::sanitize_cursor_suffix;

    #[test]
    fn sanitize_cursor_suffix_strips_punctuation() {
        assert_eq!(sanitize_cursor_suffix("public.widgets"), "public_widgets");
    }
}
