// ABOUTME: Privilege checking utilities used by the validate subcommand's pre-flight checks
// ABOUTME: Confirms the connected role can read the source and mutate/alter the target

use anyhow::{Context, Result};
use tokio_postgres::Client;

/// Role-level privileges relevant to running a synchronization pass.
pub struct PrivilegeCheck {
    /// User is a superuser, which bypasses every other table-level check below.
    pub is_superuser: bool,
}

/// Check whether the connected user is a superuser.
///
/// Superuser status is the simplest sufficient condition for every privilege
/// the strategy needs (SELECT on source tables, DML plus `ALTER TABLE` on
/// target tables); table-owner or grant-based checks only matter when it's
/// false.
pub async fn check_privileges(client: &Client) -> Result<PrivilegeCheck> {
    let row = client
        .query_one(
            "SELECT rolsuper FROM pg_roles WHERE rolname = current_user",
            &[],
        )
        .await
        .context("Failed to query user privileges")?;

    Ok(PrivilegeCheck {
        is_superuser: row.get(0),
    })
}

/// Result of a table-level permission check.
#[derive(Debug, Clone, Default)]
pub struct TablePermissionCheck {
    pub accessible_tables: Vec<String>,
    pub inaccessible_tables: Vec<String>,
}

impl TablePermissionCheck {
    pub fn all_accessible(&self) -> bool {
        self.inaccessible_tables.is_empty()
    }

    pub fn inaccessible_count(&self) -> usize {
        self.inaccessible_tables.len()
    }
}

/// Check that the connected user holds every privilege in the comma-joined
/// `privileges` string (e.g. `"SELECT"` on the source, `"SELECT,INSERT,UPDATE,DELETE"`
/// on the target) for each of `tables` (each `schema.table`).
pub async fn check_table_privileges(
    client: &Client,
    tables: &[String],
    privileges: &str,
) -> Result<TablePermissionCheck> {
    let mut result = TablePermissionCheck::default();

    for full_name in tables {
        let has_all = client
            .query_one(
                "SELECT has_table_privilege(current_user, $1, $2)",
                &[full_name, &privileges],
            )
            .await
            .map(|row| row.get::<_, bool>(0))
            .unwrap_or(false);

        if has_all {
            result.accessible_tables.push(full_name.clone());
        } else {
            result.inaccessible_tables.push(full_name.clone());
        }
    }

    Ok(result)
}

/// Check that the connected user owns every table in `tables` (or is a
/// superuser), which is what `ALTER TABLE ... DROP/ADD CONSTRAINT` requires
/// during the constraint envelope (§4.6).
pub async fn check_table_alter_permissions(
    client: &Client,
    schema: &str,
    tables: &[String],
) -> Result<TablePermissionCheck> {
    let privileges = check_privileges(client).await?;
    if privileges.is_superuser {
        return Ok(TablePermissionCheck {
            accessible_tables: tables.to_vec(),
            inaccessible_tables: Vec::new(),
        });
    }

    let rows = client
        .query(
            "SELECT tablename FROM pg_tables WHERE schemaname = $1 AND tableowner = current_user",
            &[&schema],
        )
        .await
        .context("Failed to query table ownership")?;
    let owned: std::collections::HashSet<String> = rows.into_iter().map(|r| r.get(0)).collect();

    let mut result = TablePermissionCheck::default();
    for table in tables {
        let bare = table.rsplit('.').next().unwrap_or(table);
        if owned.contains(bare) {
            result.accessible_tables.push(table.clone());
        } else {
            result.inaccessible_tables.push(table.clone());
        }
    }
    Ok(result)
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_table_permission_check_struct() {
        let check = TablePermissionCheck {
            accessible_tables: vec!["public.users".to_string()],
            inaccessible_tables: vec![],
        };
        assert!(check.all_accessible());
        assert_eq!(check.inaccessible_count(), 0);

        let check_with_issues = TablePermissionCheck {
            accessible_tables: vec!["public.users".to_string()],
            inaccessible_tables: vec!["public.secrets".to_string()],
        };
        assert!(!check_with_issues.all_accessible());
        assert_eq!(check_with_issues.inaccessible_count(), 1);
    }

    #[tokio::test]
    #[ignore]
    async fn test_check_privileges() {
        let url = std::env::var("TEST_SOURCE_URL").unwrap();
        let client = crate::postgres::connect(&url).await.unwrap();
        let privileges = check_privileges(&client).await.unwrap();
        let _ = privileges.is_superuser;
    }
}
