// ABOUTME: Batch Executor (C3) — accumulates bound DML and flushes at a configured threshold
// ABOUTME: tokio-postgres has no addBatch/executeBatch; a flush is realized as pipelined concurrent execute() calls

use async_trait::async_trait;
use futures::future::try_join_all;
use tokio_postgres::types::ToSql;
use tokio_postgres::{Statement, Transaction};

use crate::error::SyncError;
use crate::merge::DecisionSink;
use crate::value::Value;

/// Per-table INSERT/UPDATE/DELETE counters, reported by the Table
/// Synchronizer (C5) at INFO level once the table commits.
#[derive(Debug, Default, Clone, Copy)]
pub struct Counters {
    pub inserts: u64,
    pub updates: u64,
    pub deletes: u64,
}

/// Wraps the three prepared statements for one table and the parameter sets
/// accumulated against them. `update_stmt` is `None` exactly when the
/// projection has no value columns (see [`crate::projection::ColumnProjection`]).
pub struct BatchExecutor<'a, 'b> {
    txn: &'a Transaction<'b>,
    insert_stmt: Statement,
    update_stmt: Option<Statement>,
    delete_stmt: Statement,
    max_batch: usize,
    pending_insert: Vec<Vec<Value>>,
    pending_update: Vec<Vec<Value>>,
    pending_delete: Vec<Vec<Value>>,
    counters: Counters,
}

impl<'a, 'b> BatchExecutor<'a, 'b> {
    pub fn new(
        txn: &'a Transaction<'b>,
        insert_stmt: Statement,
        update_stmt: Option<Statement>,
        delete_stmt: Statement,
        max_batch: usize,
    ) -> Self {
        Self {
            txn,
            insert_stmt,
            update_stmt,
            delete_stmt,
            max_batch: max_batch.max(1),
            pending_insert: Vec::new(),
            pending_update: Vec::new(),
            pending_delete: Vec::new(),
            counters: Counters::default(),
        }
    }

    pub fn counters(&self) -> Counters {
        self.counters
    }

    pub async fn add_insert(&mut self, params: Vec<Value>) -> Result<(), SyncError> {
        self.pending_insert.push(params);
        self.counters.inserts += 1;
        if self.counters.inserts as usize % self.max_batch == 0 {
            self.flush_inserts().await?;
        }
        Ok(())
    }

    pub async fn add_update(&mut self, params: Vec<Value>) -> Result<(), SyncError> {
        if self.update_stmt.is_none() {
            return Err(SyncError::Other(anyhow::anyhow!(
                "UPDATE emitted for a table with no value columns"
            )));
        }
        self.pending_update.push(params);
        self.counters.updates += 1;
        if self.counters.updates as usize % self.max_batch == 0 {
            self.flush_updates().await?;
        }
        Ok(())
    }

    pub async fn add_delete(&mut self, params: Vec<Value>) -> Result<(), SyncError> {
        self.pending_delete.push(params);
        self.counters.deletes += 1;
        if self.counters.deletes as usize % self.max_batch == 0 {
            self.flush_deletes().await?;
        }
        Ok(())
    }

    /// Flush every statement's residual batch. Called once at table end,
    /// after the merge has consumed both cursors.
    pub async fn flush_all(&mut self) -> Result<(), SyncError> {
        self.flush_inserts().await?;
        self.flush_updates().await?;
        self.flush_deletes().await?;
        Ok(())
    }

    async fn flush_inserts(&mut self) -> Result<(), SyncError> {
        flush(self.txn, &self.insert_stmt, &mut self.pending_insert).await
    }

    async fn flush_updates(&mut self) -> Result<(), SyncError> {
        match &self.update_stmt {
            Some(stmt) => flush(self.txn, stmt, &mut self.pending_update).await,
            None => Ok(()),
        }
    }

    async fn flush_deletes(&mut self) -> Result<(), SyncError> {
        flush(self.txn, &self.delete_stmt, &mut self.pending_delete).await
    }
}

#[async_trait]
impl<'a, 'b> DecisionSink for BatchExecutor<'a, 'b> {
    async fn insert(&mut self, params: Vec<Value>) -> Result<(), SyncError> {
        self.add_insert(params).await
    }

    async fn update(&mut self, params: Vec<Value>) -> Result<(), SyncError> {
        self.add_update(params).await
    }

    async fn delete(&mut self, params: Vec<Value>) -> Result<(), SyncError> {
        self.add_delete(params).await
    }
}

async fn flush(
    txn: &Transaction<'_>,
    stmt: &Statement,
    pending: &mut Vec<Vec<Value>>,
) -> Result<(), SyncError> {
    if pending.is_empty() {
        return Ok(());
    }
    let batch = std::mem::take(pending);
    let param_sets: Vec<Vec<&(dyn ToSql + Sync)>> = batch
        .iter()
        .map(|row| row.iter().map(|v| v as &(dyn ToSql + Sync)).collect())
        .collect();
    let futures = param_sets.iter().map(|params| txn.execute(stmt, params.as_slice()));
    try_join_all(futures).await?;
    Ok(())
}
