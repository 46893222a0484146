// ABOUTME: CLI entry point for diffsync
// ABOUTME: Assembles a SyncContext from connection strings and flags, then calls the strategy driver

use anyhow::Context;
use clap::{Parser, Subcommand};

use diffsync::config::SyncConfig;
use diffsync::context::SyncContext;
use diffsync::strategy::DifferentialSyncStrategy;

#[derive(Parser)]
#[command(name = "diffsync")]
#[command(about = "Row-level differential synchronization between schema-identical PostgreSQL replicas", long_about = None)]
#[command(version)]
struct Cli {
    /// Allow self-signed TLS certificates (insecure - use only for testing)
    #[arg(long = "allow-self-signed-certs", global = true, default_value_t = false)]
    allow_self_signed_certs: bool,
    /// Set the log level (error, warn, info, debug, trace)
    #[arg(long, global = true, default_value = "info")]
    log: String,
    #[command(subcommand)]
    command: Commands,
}

#[derive(Subcommand)]
enum Commands {
    /// Run the differential synchronization strategy, bringing target rows into equality with source
    Sync {
        /// Source (authoritative) PostgreSQL connection string
        #[arg(long, env = "DIFFSYNC_SOURCE")]
        source: String,
        /// Target (to be matched) PostgreSQL connection string
        #[arg(long, env = "DIFFSYNC_TARGET")]
        target: String,
        /// Schema to synchronize
        #[arg(long, default_value = "public")]
        schema: String,
        /// Narrow synchronization to these tables (schema.table or bare table name, repeatable)
        #[arg(long = "table")]
        tables: Vec<String>,
        /// DML flush bound (must be >= 1)
        #[arg(long)]
        max_batch_size: Option<usize>,
        /// SELECT fetch-page size (0 = driver default, fetch everything in one page)
        #[arg(long)]
        fetch_size: Option<u32>,
        /// Case-insensitive regex selecting a version column, when exactly one non-PK column matches
        #[arg(long)]
        version_pattern: Option<String>,
        /// Path to a TOML file overriding the defaults above
        #[arg(long)]
        config: Option<String>,
    },
    /// Run pre-flight checks: connectivity, primary keys present, target ALTER privileges
    Validate {
        #[arg(long, env = "DIFFSYNC_SOURCE")]
        source: String,
        #[arg(long, env = "DIFFSYNC_TARGET")]
        target: String,
        #[arg(long, default_value = "public")]
        schema: String,
    },
}

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    let cli = Cli::parse();

    let env_filter = tracing_subscriber::EnvFilter::try_from_default_env()
        .unwrap_or_else(|_| tracing_subscriber::EnvFilter::new(cli.log.clone()));
    tracing_subscriber::fmt().with_env_filter(env_filter).init();

    diffsync::postgres::init_tls_policy(cli.allow_self_signed_certs);

    match cli.command {
        Commands::Sync {
            source,
            target,
            schema,
            tables,
            max_batch_size,
            fetch_size,
            version_pattern,
            config,
        } => {
            run_sync(
                source,
                target,
                schema,
                tables,
                max_batch_size,
                fetch_size,
                version_pattern,
                config,
            )
            .await
        }
        Commands::Validate {
            source,
            target,
            schema,
        } => run_validate(source, target, schema).await,
    }
}

#[allow(clippy::too_many_arguments)]
async fn run_sync(
    source: String,
    target: String,
    schema: String,
    tables: Vec<String>,
    max_batch_size: Option<usize>,
    fetch_size: Option<u32>,
    version_pattern: Option<String>,
    config_path: Option<String>,
) -> anyhow::Result<()> {
    diffsync::utils::validate_connection_string(&source).context("invalid --source")?;
    diffsync::utils::validate_connection_string(&target).context("invalid --target")?;
    diffsync::utils::validate_source_target_different(&source, &target)?;

    let mut cfg = SyncConfig {
        schema,
        only_tables: tables,
        ..SyncConfig::default()
    };
    if let Some(path) = &config_path {
        cfg.merge_file(path).context("failed to load --config")?;
    }
    if let Some(v) = max_batch_size {
        cfg.max_batch_size = v.max(1);
    }
    if let Some(v) = fetch_size {
        cfg.fetch_size = v;
    }
    if version_pattern.is_some() {
        cfg.version_pattern = version_pattern;
    }

    tracing::info!(
        source = %diffsync::utils::strip_password_from_url(&source).unwrap_or_default(),
        target = %diffsync::utils::strip_password_from_url(&target).unwrap_or_default(),
        max_batch_size = cfg.max_batch_size,
        fetch_size = cfg.fetch_size,
        "starting synchronization"
    );

    let mut ctx = SyncContext::connect(&source, &target, cfg).await?;

    let report = DifferentialSyncStrategy::synchronize(&mut ctx)
        .await
        .context("synchronization failed")?;

    println!();
    println!("Synchronization complete");
    println!("{}", "=".repeat(61));
    for (table, counters) in &report.tables {
        println!(
            "  {:<40} inserts={:<6} updates={:<6} deletes={:<6}",
            table, counters.inserts, counters.updates, counters.deletes
        );
    }
    println!("{}", "-".repeat(61));
    println!(
        "  {:<40} inserts={:<6} updates={:<6} deletes={:<6}",
        "TOTAL",
        report.total_inserts(),
        report.total_updates(),
        report.total_deletes()
    );

    Ok(())
}

async fn run_validate(source: String, target: String, schema: String) -> anyhow::Result<()> {
    diffsync::utils::validate_connection_string(&source).context("invalid --source")?;
    diffsync::utils::validate_connection_string(&target).context("invalid --target")?;

    let result = diffsync::preflight::run_preflight_checks(&source, &target, &schema).await?;
    result.print();

    if !result.all_passed() {
        anyhow::bail!("{} pre-flight issue(s) found", result.failed_count());
    }

    Ok(())
}
