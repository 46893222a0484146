// ABOUTME: PostgreSQL connection helper shared by the strategy, CLI, and preflight checks
// ABOUTME: Wraps tokio-postgres connection setup with optional native-tls

pub mod privileges;

use std::sync::OnceLock;

use anyhow::{Context, Result};
use native_tls::TlsConnector;
use postgres_native_tls::MakeTlsConnector;
use tokio_postgres::{Client, NoTls};

static ALLOW_SELF_SIGNED: OnceLock<bool> = OnceLock::new();

/// Records whether self-signed TLS certificates should be accepted for the
/// remainder of the process. Set once, from the CLI's global flag, before
/// any connection is opened.
pub fn init_tls_policy(allow_self_signed: bool) {
    let _ = ALLOW_SELF_SIGNED.set(allow_self_signed);
}

fn allow_self_signed() -> bool {
    *ALLOW_SELF_SIGNED.get().unwrap_or(&false)
}

/// Open a connection to `url`, spawning the driver's connection-management
/// future onto the Tokio runtime. Uses native-tls when the connection string
/// carries `sslmode=require`/`verify-ca`/`verify-full`; otherwise connects
/// without TLS.
pub async fn connect(url: &str) -> Result<Client> {
    let parts = crate::utils::parse_postgres_url(url)
        .with_context(|| format!("Failed to parse connection string: {}", crate::utils::strip_password_from_url(url).unwrap_or_default()))?;

    let wants_tls = parts
        .query_params
        .get("sslmode")
        .map(|m| m != "disable")
        .unwrap_or(false);

    if wants_tls {
        let mut builder = TlsConnector::builder();
        if allow_self_signed() {
            builder
                .danger_accept_invalid_certs(true)
                .danger_accept_invalid_hostnames(true);
        }
        let connector = builder
            .build()
            .context("Failed to build TLS connector")?;
        let connector = MakeTlsConnector::new(connector);
        let (client, connection) = tokio_postgres::connect(url, connector)
            .await
            .context("Failed to connect to PostgreSQL (TLS)")?;
        tokio::spawn(async move {
            if let Err(e) = connection.await {
                tracing::error!("PostgreSQL connection error: {}", e);
            }
        });
        Ok(client)
    } else {
        let (client, connection) = tokio_postgres::connect(url, NoTls)
            .await
            .context("Failed to connect to PostgreSQL")?;
        tokio::spawn(async move {
            if let Err(e) = connection.await {
                tracing::error!("PostgreSQL connection error: {}", e);
            }
        });
        Ok(client)
    }
}
