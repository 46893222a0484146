// ABOUTME: Pre-flight validation checks backing the `validate` subcommand
// ABOUTME: Connectivity, every table has a primary key, and target ALTER privileges for the constraint envelope

use anyhow::Result;

use crate::catalog::PostgresCatalog;
use crate::postgres::privileges::check_table_alter_permissions;

/// Individual check result.
#[derive(Debug, Clone)]
pub struct CheckResult {
    pub name: String,
    pub passed: bool,
    pub message: String,
    pub details: Option<String>,
}

impl CheckResult {
    pub fn pass(name: impl Into<String>, message: impl Into<String>) -> Self {
        Self {
            name: name.into(),
            passed: true,
            message: message.into(),
            details: None,
        }
    }

    pub fn fail(name: impl Into<String>, message: impl Into<String>) -> Self {
        Self {
            name: name.into(),
            passed: false,
            message: message.into(),
            details: None,
        }
    }

    pub fn with_details(mut self, details: impl Into<String>) -> Self {
        self.details = Some(details.into());
        self
    }
}

/// Complete pre-flight results for one `validate` invocation. Trimmed to
/// what this core actually needs, per §10.4: no `pg_dump`/`pg_restore`
/// tooling checks, since this strategy never dumps or restores anything.
#[derive(Debug, Default)]
pub struct PreflightResult {
    pub network: Vec<CheckResult>,
    pub primary_keys: Vec<CheckResult>,
    pub target_permissions: Vec<CheckResult>,
    pub issues: Vec<String>,
}

impl PreflightResult {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn all_passed(&self) -> bool {
        self.issues.is_empty()
    }

    pub fn failed_count(&self) -> usize {
        self.issues.len()
    }

    pub fn print(&self) {
        println!();
        println!("Pre-flight Checks");
        println!("{}", "=".repeat(61));
        println!();

        print_section("Connectivity", &self.network);
        print_section("Primary Keys", &self.primary_keys);
        print_section("Target Permissions", &self.target_permissions);

        println!("{}", "=".repeat(61));
        if self.all_passed() {
            println!("PASSED: All pre-flight checks successful");
        } else {
            println!("FAILED: {} issue(s) must be resolved", self.failed_count());
            for issue in &self.issues {
                println!("  - {}", issue);
            }
        }
    }
}

fn print_section(title: &str, checks: &[CheckResult]) {
    if checks.is_empty() {
        return;
    }
    println!("{}:", title);
    for check in checks {
        let icon = if check.passed { "+" } else { "x" };
        println!("  {} {}", icon, check.message);
        if let Some(ref details) = check.details {
            println!("      {}", details);
        }
    }
    println!();
}

/// Runs the checks a caller should pass before handing a pair of
/// connection strings to [`crate::strategy::DifferentialSyncStrategy::synchronize`]:
/// both databases reachable, every table in the schema has a primary key
/// (§7's precondition failure, caught here instead of mid-run), and the
/// target role can `ALTER TABLE` the tables it will need to touch during
/// the constraint envelope (§4.6).
pub async fn run_preflight_checks(
    source_url: &str,
    target_url: &str,
    schema: &str,
) -> Result<PreflightResult> {
    let mut result = PreflightResult::new();

    let source_client = match crate::postgres::connect(source_url).await {
        Ok(client) => {
            result
                .network
                .push(CheckResult::pass("source", "Source database reachable"));
            Some(client)
        }
        Err(e) => {
            result.network.push(CheckResult::fail(
                "source",
                format!("Cannot connect to source: {}", e),
            ));
            result.issues.push(format!("source unreachable: {}", e));
            None
        }
    };

    let target_client = match crate::postgres::connect(target_url).await {
        Ok(client) => {
            result
                .network
                .push(CheckResult::pass("target", "Target database reachable"));
            Some(client)
        }
        Err(e) => {
            result.network.push(CheckResult::fail(
                "target",
                format!("Cannot connect to target: {}", e),
            ));
            result.issues.push(format!("target unreachable: {}", e));
            None
        }
    };

    let Some(source_client) = source_client else {
        return Ok(result);
    };

    let catalog = PostgresCatalog::load(&source_client, schema, &[]).await?;

    let mut missing_pk = Vec::new();
    for table in catalog.tables() {
        if table.primary_key.is_empty() {
            missing_pk.push(table.display_name());
        }
    }
    if missing_pk.is_empty() {
        result.primary_keys.push(CheckResult::pass(
            "primary_key",
            format!("All {} tables have a primary key", catalog.tables().len()),
        ));
    } else {
        result.primary_keys.push(
            CheckResult::fail(
                "primary_key",
                format!("{} table(s) have no primary key", missing_pk.len()),
            )
            .with_details(missing_pk.join(", ")),
        );
        result
            .issues
            .push(format!("tables without a primary key: {}", missing_pk.join(", ")));
    }

    if let Some(target_client) = target_client {
        let table_names: Vec<String> = catalog.tables().iter().map(|t| t.name.clone()).collect();
        match check_table_alter_permissions(&target_client, schema, &table_names).await {
            Ok(perms) if perms.all_accessible() => {
                result.target_permissions.push(CheckResult::pass(
                    "alter",
                    format!("Can ALTER all {} target tables", table_names.len()),
                ));
            }
            Ok(perms) => {
                result.target_permissions.push(
                    CheckResult::fail(
                        "alter",
                        format!("Missing ALTER on {} target table(s)", perms.inaccessible_count()),
                    )
                    .with_details(perms.inaccessible_tables.join(", ")),
                );
                result.issues.push(format!(
                    "missing ALTER privilege on target tables: {}",
                    perms.inaccessible_tables.join(", ")
                ));
            }
            Err(e) => {
                result
                    .target_permissions
                    .push(CheckResult::fail("alter", format!("Failed to check: {}", e)));
                result.issues.push(format!("could not check target ALTER privileges: {}", e));
            }
        }
    }

    Ok(result)
}
