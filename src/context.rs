// ABOUTME: Synchronization Context (§3) and the run's summary report
// ABOUTME: Owned by the caller; its lifetime exceeds one `synchronize` invocation

use tokio_postgres::Client;

use crate::batch::Counters;
use crate::catalog::{Catalog, Dialect, PostgresCatalog, PostgresDialect};
use crate::config::SyncConfig;

/// Everything [`crate::strategy::DifferentialSyncStrategy::synchronize`]
/// needs: both connections, the dialect, a catalog snapshot of the source
/// schema, and the run's configuration. `target_url` is kept alongside the
/// live `target` connection so the per-table auxiliary task (§4.4 "parallel
/// fill") can open its own second session to the same database — see
/// `DESIGN.md` for why a borrowed cursor can't cross the `tokio::spawn`
/// boundary and a dedicated connection is used instead.
pub struct SyncContext {
    pub source: Client,
    pub target: Client,
    pub target_url: String,
    pub dialect: PostgresDialect,
    pub catalog: PostgresCatalog,
    pub config: SyncConfig,
}

impl SyncContext {
    /// Connects to both databases and snapshots the source catalog, ready
    /// for one `synchronize` call. `source_url`/`target_url` are plain
    /// connection strings; TLS is negotiated by [`crate::postgres::connect`]
    /// based on the URL's `sslmode` query parameter.
    pub async fn connect(
        source_url: &str,
        target_url: &str,
        config: SyncConfig,
    ) -> anyhow::Result<Self> {
        let source = crate::postgres::connect(source_url).await?;
        let target = crate::postgres::connect(target_url).await?;
        let catalog =
            PostgresCatalog::load(&source, &config.schema, &config.only_tables).await?;

        Ok(Self {
            source,
            target,
            target_url: target_url.to_string(),
            dialect: PostgresDialect,
            catalog,
            config,
        })
    }
}

/// Per-table and aggregate counters for one `synchronize` run, returned on
/// success and logged at INFO level as the run progresses (§4.5 step 7).
#[derive(Debug, Default, Clone)]
pub struct SyncReport {
    pub tables: Vec<(String, Counters)>,
}

impl SyncReport {
    pub fn record(&mut self, table: impl Into<String>, counters: Counters) {
        self.tables.push((table.into(), counters));
    }

    pub fn total_inserts(&self) -> u64 {
        self.tables.iter().map(|(_, c)| c.inserts).sum()
    }

    pub fn total_updates(&self) -> u64 {
        self.tables.iter().map(|(_, c)| c.updates).sum()
    }

    pub fn total_deletes(&self) -> u64 {
        self.tables.iter().map(|(_, c)| c.deletes).sum()
    }
}
