// ABOUTME: Integration tests exercising the full strategy against live Postgres source/target databases
// ABOUTME: Skipped (not failed) when DATABASE_URL_SOURCE/DATABASE_URL_TARGET aren't set, matching the teacher's env-gated tests

use diffsync::config::SyncConfig;
use diffsync::context::SyncContext;
use diffsync::strategy::DifferentialSyncStrategy;

fn get_test_urls() -> Option<(String, String)> {
    let source = std::env::var("DATABASE_URL_SOURCE").ok()?;
    let target = std::env::var("DATABASE_URL_TARGET").ok()?;
    Some((source, target))
}

async fn setup_table(
    source: &tokio_postgres::Client,
    target: &tokio_postgres::Client,
    name: &str,
    ddl_cols: &str,
) {
    let drop = format!(r#"DROP TABLE IF EXISTS "public"."{name}" CASCADE"#);
    source.batch_execute(&drop).await.unwrap();
    target.batch_execute(&drop).await.unwrap();

    let create = format!(r#"CREATE TABLE "public"."{name}" ({ddl_cols})"#);
    source.batch_execute(&create).await.unwrap();
    target.batch_execute(&create).await.unwrap();
}

async fn cleanup_table(source: &tokio_postgres::Client, target: &tokio_postgres::Client, name: &str) {
    let drop = format!(r#"DROP TABLE IF EXISTS "public"."{name}" CASCADE"#);
    let _ = source.batch_execute(&drop).await;
    let _ = target.batch_execute(&drop).await;
}

#[tokio::test]
async fn mixed_drift_converges_and_is_idempotent() {
    let Some((source_url, target_url)) = get_test_urls() else {
        eprintln!("skipping: DATABASE_URL_SOURCE/DATABASE_URL_TARGET not set");
        return;
    };

    let table = "diffsync_it_widgets";
    let source = diffsync::postgres::connect(&source_url).await.unwrap();
    let target = diffsync::postgres::connect(&target_url).await.unwrap();

    setup_table(&source, &target, table, "id INT PRIMARY KEY, name TEXT").await;

    source
        .batch_execute(&format!(
            r#"INSERT INTO "public"."{table}" VALUES (1,'a'),(2,'B'),(4,'d')"#
        ))
        .await
        .unwrap();
    target
        .batch_execute(&format!(
            r#"INSERT INTO "public"."{table}" VALUES (1,'a'),(2,'b'),(3,'c')"#
        ))
        .await
        .unwrap();

    let mut ctx = SyncContext::connect(&source_url, &target_url, SyncConfig::default())
        .await
        .unwrap();
    let report = DifferentialSyncStrategy::synchronize(&mut ctx).await.unwrap();

    assert_eq!(report.total_inserts(), 1);
    assert_eq!(report.total_updates(), 1);
    assert_eq!(report.total_deletes(), 1);

    let rows = target
        .query(
            &format!(r#"SELECT id, name FROM "public"."{table}" ORDER BY id"#),
            &[],
        )
        .await
        .unwrap();
    let got: Vec<(i32, String)> = rows.iter().map(|r| (r.get(0), r.get(1))).collect();
    assert_eq!(
        got,
        vec![(1, "a".to_string()), (2, "B".to_string()), (4, "d".to_string())]
    );

    // Idempotence (§8 invariant 2): a second run against the now-converged
    // target emits nothing.
    let mut ctx2 = SyncContext::connect(&source_url, &target_url, SyncConfig::default())
        .await
        .unwrap();
    let second = DifferentialSyncStrategy::synchronize(&mut ctx2).await.unwrap();
    assert_eq!(second.total_inserts(), 0);
    assert_eq!(second.total_updates(), 0);
    assert_eq!(second.total_deletes(), 0);

    cleanup_table(&source, &target, table).await;
}

#[tokio::test]
async fn empty_target_receives_every_source_row() {
    let Some((source_url, target_url)) = get_test_urls() else {
        eprintln!("skipping: DATABASE_URL_SOURCE/DATABASE_URL_TARGET not set");
        return;
    };

    let table = "diffsync_it_empty_target";
    let source = diffsync::postgres::connect(&source_url).await.unwrap();
    let target = diffsync::postgres::connect(&target_url).await.unwrap();

    setup_table(&source, &target, table, "id INT PRIMARY KEY, label TEXT").await;
    source
        .batch_execute(&format!(
            r#"INSERT INTO "public"."{table}" VALUES (1,'a'),(2,'b'),(3,'c')"#
        ))
        .await
        .unwrap();

    let mut ctx = SyncContext::connect(&source_url, &target_url, SyncConfig::default())
        .await
        .unwrap();
    let report = DifferentialSyncStrategy::synchronize(&mut ctx).await.unwrap();

    assert_eq!(report.total_inserts(), 3);
    assert_eq!(report.total_updates(), 0);
    assert_eq!(report.total_deletes(), 0);

    cleanup_table(&source, &target, table).await;
}

#[tokio::test]
async fn batch_bound_is_never_exceeded() {
    let Some((source_url, target_url)) = get_test_urls() else {
        eprintln!("skipping: DATABASE_URL_SOURCE/DATABASE_URL_TARGET not set");
        return;
    };

    let table = "diffsync_it_batching";
    let source = diffsync::postgres::connect(&source_url).await.unwrap();
    let target = diffsync::postgres::connect(&target_url).await.unwrap();

    setup_table(&source, &target, table, "id INT PRIMARY KEY, v INT").await;

    let values: Vec<String> = (1..=250).map(|i| format!("({i},{i})")).collect();
    source
        .batch_execute(&format!(
            r#"INSERT INTO "public"."{table}" VALUES {}"#,
            values.join(",")
        ))
        .await
        .unwrap();

    let mut cfg = SyncConfig::default();
    cfg.max_batch_size = 37;
    let mut ctx = SyncContext::connect(&source_url, &target_url, cfg).await.unwrap();
    let report = DifferentialSyncStrategy::synchronize(&mut ctx).await.unwrap();

    assert_eq!(report.total_inserts(), 250);

    let count: i64 = target
        .query_one(&format!(r#"SELECT count(*) FROM "public"."{table}""#), &[])
        .await
        .unwrap()
        .get(0);
    assert_eq!(count, 250);

    cleanup_table(&source, &target, table).await;
}
