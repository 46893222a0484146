// ABOUTME: Dual-Cursor Merge (C4) — the merge-join over source/target cursors that decides INSERT/UPDATE/DELETE
// ABOUTME: Algorithmic heart of the strategy; pushes decisions through a DecisionSink (normally the Batch Executor)

use std::cmp::Ordering;

use async_trait::async_trait;

use crate::cursor::RowCursor;
use crate::error::SyncError;
use crate::projection::ColumnProjection;
use crate::value::{self, Value};

/// Where the merge's INSERT/UPDATE/DELETE decisions go. [`crate::batch::BatchExecutor`]
/// is the production sink; tests use an in-memory recorder to assert on the
/// exact decisions and parameter order without a live database.
#[async_trait]
pub trait DecisionSink: Send {
    async fn insert(&mut self, params: Vec<Value>) -> Result<(), SyncError>;
    async fn update(&mut self, params: Vec<Value>) -> Result<(), SyncError>;
    async fn delete(&mut self, params: Vec<Value>) -> Result<(), SyncError>;
}

/// Drives `source` and `target` — both freshly opened, not yet advanced — to
/// exhaustion, feeding every INSERT/UPDATE/DELETE decision to `sink`.
///
/// This is a single pass: both cursors are consumed exactly once, in lockstep,
/// by primary-key merge-join (§4.4). PK columns are compared with
/// [`value::order`]; a NULL anywhere in a primary-key tuple is rejected as
/// [`SyncError::NullPrimaryKey`] rather than given an arbitrary position.
pub async fn run<S: RowCursor, T: RowCursor>(
    source: &mut S,
    target: &mut T,
    projection: &ColumnProjection,
    table_name: &str,
    sink: &mut dyn DecisionSink,
) -> Result<(), SyncError> {
    source.advance().await?;
    target.advance().await?;

    let pk_len = projection.pk_cols.len();

    loop {
        let has_s = source.current().is_some();
        let has_t = target.current().is_some();
        if !has_s && !has_t {
            break;
        }

        let cmp = if !has_s {
            Ordering::Greater
        } else if !has_t {
            Ordering::Less
        } else {
            compare_pks(
                &source.current().unwrap().0,
                &target.current().unwrap().0,
                projection,
                table_name,
            )?
        };

        match cmp {
            Ordering::Greater => {
                let t_row = &target.current().unwrap().0;
                sink.delete(t_row[..pk_len].to_vec()).await?;
            }
            Ordering::Less => {
                let s_row = &source.current().unwrap().0;
                sink.insert(s_row.clone()).await?;
            }
            Ordering::Equal => {
                if projection.has_value_cols() {
                    let s_row = &source.current().unwrap().0;
                    let t_row = &target.current().unwrap().0;
                    let (params, updated) = build_update_params(s_row, t_row, pk_len)?;
                    if updated {
                        sink.update(params).await?;
                    }
                }
            }
        }

        if cmp != Ordering::Greater {
            source.advance().await?;
        }
        if cmp != Ordering::Less {
            target.advance().await?;
        }
    }

    Ok(())
}

fn compare_pks(
    s_row: &[Value],
    t_row: &[Value],
    projection: &ColumnProjection,
    table_name: &str,
) -> Result<Ordering, SyncError> {
    for (i, col) in projection.pk_cols.iter().enumerate() {
        let sv = &s_row[i];
        let tv = &t_row[i];
        if sv.is_null() || tv.is_null() {
            return Err(SyncError::NullPrimaryKey {
                table: table_name.to_string(),
                column: col.name.clone(),
            });
        }
        let ord = value::order(sv, tv)?;
        if ord != Ordering::Equal {
            return Ok(ord);
        }
    }
    Ok(Ordering::Equal)
}

/// Builds the UPDATE parameter list (value columns, then trailing PK columns,
/// matching the Statement Builder's `SET ... WHERE ...` ordinal layout) and
/// reports whether any value column actually changed.
fn build_update_params(
    s_row: &[Value],
    t_row: &[Value],
    pk_len: usize,
) -> Result<(Vec<Value>, bool), SyncError> {
    let mut updated = false;
    let mut params = Vec::with_capacity(s_row.len());
    for i in pk_len..s_row.len() {
        let sv = &s_row[i];
        let tv = &t_row[i];
        let changed = match (sv.is_null(), tv.is_null()) {
            (true, true) => false,
            (true, false) | (false, true) => true,
            (false, false) => !value::equal(sv, tv)?,
        };
        if changed {
            updated = true;
        }
        params.push(sv.clone());
    }
    params.extend_from_slice(&s_row[..pk_len]);
    Ok((params, updated))
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::catalog::ColumnProperties;
    use crate::cursor::{Row, VecCursor};
    use tokio_postgres::types::Type;

    fn col(name: &str) -> ColumnProperties {
        ColumnProperties {
            name: name.to_string(),
            sql_type: Type::TEXT,
            nullable: true,
        }
    }

    fn projection_id_value() -> ColumnProjection {
        ColumnProjection {
            pk_cols: vec![col("id")],
            non_pk_cols: vec![col("value")],
            version_col: None,
            select_cols: vec![col("id"), col("value")],
        }
    }

    fn row(id: i32, value: Option<&str>) -> Row {
        Row(vec![
            Value::Int32(id),
            match value {
                Some(v) => Value::Text(v.to_string()),
                None => Value::Null(Type::TEXT),
            },
        ])
    }

    #[derive(Default)]
    struct Recorder {
        inserts: Vec<Vec<Value>>,
        updates: Vec<Vec<Value>>,
        deletes: Vec<Vec<Value>>,
    }

    #[async_trait]
    impl DecisionSink for Recorder {
        async fn insert(&mut self, params: Vec<Value>) -> Result<(), SyncError> {
            self.inserts.push(params);
            Ok(())
        }
        async fn update(&mut self, params: Vec<Value>) -> Result<(), SyncError> {
            self.updates.push(params);
            Ok(())
        }
        async fn delete(&mut self, params: Vec<Value>) -> Result<(), SyncError> {
            self.deletes.push(params);
            Ok(())
        }
    }

    #[tokio::test]
    async fn s1_empty_target_three_row_source() {
        let proj = projection_id_value();
        let mut source = VecCursor::new(vec![
            row(1, Some("a")),
            row(2, Some("b")),
            row(3, Some("c")),
        ]);
        let mut target = VecCursor::new(vec![]);
        let mut sink = Recorder::default();
        run(&mut source, &mut target, &proj, "t", &mut sink).await.unwrap();
        assert_eq!(sink.inserts.len(), 3);
        assert_eq!(sink.updates.len(), 0);
        assert_eq!(sink.deletes.len(), 0);
    }

    #[tokio::test]
    async fn s2_identical_sides() {
        let proj = projection_id_value();
        let mut source = VecCursor::new(vec![row(1, Some("a")), row(2, Some("b"))]);
        let mut target = VecCursor::new(vec![row(1, Some("a")), row(2, Some("b"))]);
        let mut sink = Recorder::default();
        run(&mut source, &mut target, &proj, "t", &mut sink).await.unwrap();
        assert_eq!(sink.inserts.len(), 0);
        assert_eq!(sink.updates.len(), 0);
        assert_eq!(sink.deletes.len(), 0);
    }

    #[tokio::test]
    async fn s3_mixed_drift() {
        let proj = projection_id_value();
        let mut source = VecCursor::new(vec![
            row(1, Some("a")),
            row(2, Some("B")),
            row(4, Some("d")),
        ]);
        let mut target = VecCursor::new(vec![
            row(1, Some("a")),
            row(2, Some("b")),
            row(3, Some("c")),
        ]);
        let mut sink = Recorder::default();
        run(&mut source, &mut target, &proj, "t", &mut sink).await.unwrap();
        assert_eq!(sink.inserts.len(), 1);
        assert_eq!(sink.inserts[0][0], Value::Int32(4));
        assert_eq!(sink.updates.len(), 1);
        assert_eq!(sink.updates[0], vec![Value::Text("B".into()), Value::Int32(2)]);
        assert_eq!(sink.deletes.len(), 1);
        assert_eq!(sink.deletes[0], vec![Value::Int32(3)]);
    }

    #[tokio::test]
    async fn s4_null_transitions_both_directions() {
        let proj = projection_id_value();

        let mut source = VecCursor::new(vec![row(1, None)]);
        let mut target = VecCursor::new(vec![row(1, Some("x"))]);
        let mut sink = Recorder::default();
        run(&mut source, &mut target, &proj, "t", &mut sink).await.unwrap();
        assert_eq!(sink.updates.len(), 1);
        assert_eq!(sink.updates[0][0], Value::Null(Type::TEXT));

        let mut source = VecCursor::new(vec![row(1, Some("x"))]);
        let mut target = VecCursor::new(vec![row(1, None)]);
        let mut sink = Recorder::default();
        run(&mut source, &mut target, &proj, "t", &mut sink).await.unwrap();
        assert_eq!(sink.updates.len(), 1);
        assert_eq!(sink.updates[0][0], Value::Text("x".into()));
    }

    #[tokio::test]
    async fn s5_blob_equality() {
        let proj = ColumnProjection {
            pk_cols: vec![col("id")],
            non_pk_cols: vec![col("data")],
            version_col: None,
            select_cols: vec![col("id"), col("data")],
        };
        let blob_row = |id: i32, bytes: Vec<u8>| Row(vec![Value::Int32(id), Value::Bytes(bytes)]);

        let mut source = VecCursor::new(vec![blob_row(1, vec![0x00, 0x01])]);
        let mut target = VecCursor::new(vec![blob_row(1, vec![0x00, 0x01])]);
        let mut sink = Recorder::default();
        run(&mut source, &mut target, &proj, "t", &mut sink).await.unwrap();
        assert_eq!(sink.updates.len(), 0);

        let mut source = VecCursor::new(vec![blob_row(1, vec![0x00, 0x01])]);
        let mut target = VecCursor::new(vec![blob_row(1, vec![0x00, 0x02])]);
        let mut sink = Recorder::default();
        run(&mut source, &mut target, &proj, "t", &mut sink).await.unwrap();
        assert_eq!(sink.updates.len(), 1);
    }

    #[tokio::test]
    async fn s6_version_fast_path_ignores_other_columns() {
        let proj = ColumnProjection {
            pk_cols: vec![col("id")],
            non_pk_cols: vec![col("ver"), col("payload")],
            version_col: Some(col("ver")),
            select_cols: vec![col("id"), col("ver")],
        };
        let ver_row = |id: i32, v: i32| Row(vec![Value::Int32(id), Value::Int32(v)]);

        let mut source = VecCursor::new(vec![ver_row(1, 5)]);
        let mut target = VecCursor::new(vec![ver_row(1, 4)]);
        let mut sink = Recorder::default();
        run(&mut source, &mut target, &proj, "t", &mut sink).await.unwrap();
        assert_eq!(sink.updates.len(), 1);
        assert_eq!(sink.updates[0], vec![Value::Int32(5), Value::Int32(1)]);

        let mut source = VecCursor::new(vec![ver_row(1, 5)]);
        let mut target = VecCursor::new(vec![ver_row(1, 5)]);
        let mut sink = Recorder::default();
        run(&mut source, &mut target, &proj, "t", &mut sink).await.unwrap();
        assert_eq!(sink.updates.len(), 0);
    }

    #[tokio::test]
    async fn null_primary_key_is_rejected() {
        let proj = projection_id_value();
        let null_pk_row = Row(vec![Value::Null(Type::INT4), Value::Text("a".into())]);
        let mut source = VecCursor::new(vec![null_pk_row]);
        let mut target = VecCursor::new(vec![row(1, Some("a"))]);
        let mut sink = Recorder::default();
        let err = run(&mut source, &mut target, &proj, "t", &mut sink).await;
        assert!(matches!(err, Err(SyncError::NullPrimaryKey { .. })));
    }

    #[tokio::test]
    async fn pure_pk_table_never_emits_update() {
        let proj = ColumnProjection {
            pk_cols: vec![col("a"), col("b")],
            non_pk_cols: vec![],
            version_col: None,
            select_cols: vec![col("a"), col("b")],
        };
        let mut source = VecCursor::new(vec![Row(vec![Value::Int32(1), Value::Int32(2)])]);
        let mut target = VecCursor::new(vec![Row(vec![Value::Int32(1), Value::Int32(2)])]);
        let mut sink = Recorder::default();
        run(&mut source, &mut target, &proj, "t", &mut sink).await.unwrap();
        assert_eq!(sink.updates.len(), 0);
        assert_eq!(sink.inserts.len(), 0);
        assert_eq!(sink.deletes.len(), 0);
    }
}
