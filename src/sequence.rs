// ABOUTME: SequenceOps collaborator (§6) — reseeds target identity columns and sequences from the source
// ABOUTME: Runs after constraint restoration (§4.6 step 6), once row contents already match

use async_trait::async_trait;
use tokio_postgres::Client;

use crate::error::SyncError;

/// The sequence/identity reseed collaborator, invoked once at the end of a
/// successful run (§4.6 step 6) — after the rows themselves match, the
/// target's sequences still point at whatever values its own inserts last
/// produced before the drift this run just corrected, so they're moved
/// forward to the source's current position.
#[async_trait]
pub trait SequenceOps: Send + Sync {
    async fn synchronize_identity_columns(
        &self,
        source: &Client,
        target: &Client,
    ) -> Result<(), SyncError>;
    async fn synchronize_sequences(&self, source: &Client, target: &Client)
        -> Result<(), SyncError>;
}

pub struct PostgresSequenceOps {
    schema: String,
}

impl PostgresSequenceOps {
    pub fn new(schema: impl Into<String>) -> Self {
        Self {
            schema: schema.into(),
        }
    }
}

struct SequencePosition {
    qualified_name: String,
    last_value: i64,
    is_called: bool,
}

#[async_trait]
impl SequenceOps for PostgresSequenceOps {
    /// For every `GENERATED ... AS IDENTITY` column in the schema, resolves
    /// its backing sequence via `pg_get_serial_sequence` on both sides and
    /// moves the target's sequence to the source's current position.
    async fn synchronize_identity_columns(
        &self,
        source: &Client,
        target: &Client,
    ) -> Result<(), SyncError> {
        let rows = source
            .query(
                "SELECT table_name, column_name FROM information_schema.columns \
                 WHERE table_schema = $1 AND is_identity = 'YES'",
                &[&self.schema],
            )
            .await?;

        for row in rows {
            let table: String = row.get(0);
            let column: String = row.get(1);
            let qualified_table = format!("{}.{}", self.schema, table);

            let seq_name: Option<String> = source
                .query_one(
                    "SELECT pg_get_serial_sequence($1, $2)",
                    &[&qualified_table, &column],
                )
                .await?
                .get(0);

            let Some(seq_name) = seq_name else {
                continue;
            };

            if let Some(pos) = read_position(source, &seq_name).await? {
                apply_position(target, &pos).await?;
                tracing::debug!(
                    table = %table, column = %column, sequence = %seq_name, last_value = pos.last_value,
                    "reseeded identity column"
                );
            }
        }

        Ok(())
    }

    /// For every plain (non-identity) sequence in the schema, moves the
    /// target's sequence to the source's current `last_value`/`is_called`.
    async fn synchronize_sequences(
        &self,
        source: &Client,
        target: &Client,
    ) -> Result<(), SyncError> {
        let rows = source
            .query(
                "SELECT schemaname, sequencename FROM pg_sequences WHERE schemaname = $1",
                &[&self.schema],
            )
            .await?;

        for row in rows {
            let schema: String = row.get(0);
            let name: String = row.get(1);
            let qualified_name = format!("{}.{}", schema, name);

            if let Some(pos) = read_position(source, &qualified_name).await? {
                apply_position(target, &pos).await?;
                tracing::debug!(sequence = %qualified_name, last_value = pos.last_value, "reseeded sequence");
            }
        }

        Ok(())
    }
}

async fn read_position(
    client: &Client,
    qualified_name: &str,
) -> Result<Option<SequencePosition>, SyncError> {
    let row = client
        .query_opt(
            "SELECT last_value, is_called FROM pg_sequences \
             WHERE schemaname || '.' || sequencename = $1",
            &[&qualified_name],
        )
        .await?;

    Ok(row.map(|r| SequencePosition {
        qualified_name: qualified_name.to_string(),
        last_value: r.get::<_, Option<i64>>(0).unwrap_or(1),
        is_called: r.get::<_, Option<bool>>(1).unwrap_or(false),
    }))
}

async fn apply_position(target: &Client, pos: &SequencePosition) -> Result<(), SyncError> {
    // $1 must stay text and be cast in SQL: the 3-arg setval() overload
    // resolves $1 as regclass, and Value/String don't accept binding
    // directly as that type.
    target
        .execute(
            "SELECT setval($1::regclass, $2, $3)",
            &[&pos.qualified_name, &pos.last_value, &pos.is_called],
        )
        .await?;
    Ok(())
}
