// ABOUTME: Column Projection — resolves pk/non-pk/version columns for one table
// ABOUTME: Invariant: primary-key columns always precede value columns in select_cols

use regex::RegexBuilder;

use crate::catalog::{ColumnProperties, TableProperties};
use crate::error::SyncError;

/// The ordered column layout a table is synchronized with.
///
/// `select_cols = pk_cols ++ (version_col ? [version_col] : non_pk_cols)` —
/// when a version column is configured, it stands in for every other
/// non-key column for the purposes of reading, comparing, and writing back.
#[derive(Debug, Clone)]
pub struct ColumnProjection {
    pub pk_cols: Vec<ColumnProperties>,
    pub non_pk_cols: Vec<ColumnProperties>,
    pub version_col: Option<ColumnProperties>,
    pub select_cols: Vec<ColumnProperties>,
}

impl ColumnProjection {
    /// Resolves the projection for `table`. Fails with
    /// [`SyncError::MissingPrimaryKey`] when the table has no primary key, and
    /// with [`SyncError::AmbiguousVersionColumn`] when `version_pattern`
    /// matches more than one non-PK column.
    pub fn resolve(
        table: &TableProperties,
        version_pattern: Option<&str>,
    ) -> Result<Self, SyncError> {
        if table.primary_key.is_empty() {
            return Err(SyncError::MissingPrimaryKey(table.display_name()));
        }

        let pk_cols: Vec<ColumnProperties> = table
            .primary_key
            .iter()
            .map(|name| {
                table
                    .column_properties(name)
                    .cloned()
                    .unwrap_or_else(|| panic!("primary key column {name} missing from catalog"))
            })
            .collect();

        let non_pk_cols: Vec<ColumnProperties> = table
            .columns
            .iter()
            .filter(|c| !table.primary_key.contains(&c.name))
            .cloned()
            .collect();

        let version_col = match version_pattern {
            Some(pattern) => {
                let re = RegexBuilder::new(pattern)
                    .case_insensitive(true)
                    .build()
                    .map_err(|e| {
                        SyncError::Other(anyhow::anyhow!("invalid version_pattern: {e}"))
                    })?;
                let matches: Vec<&ColumnProperties> =
                    non_pk_cols.iter().filter(|c| re.is_match(&c.name)).collect();
                match matches.len() {
                    0 => None,
                    1 => Some(matches[0].clone()),
                    _ => {
                        return Err(SyncError::AmbiguousVersionColumn(
                            table.display_name(),
                            matches.iter().map(|c| c.name.clone()).collect(),
                        ))
                    }
                }
            }
            None => None,
        };

        let select_cols = {
            let mut cols = pk_cols.clone();
            match &version_col {
                Some(v) => cols.push(v.clone()),
                None => cols.extend(non_pk_cols.iter().cloned()),
            }
            cols
        };

        Ok(Self {
            pk_cols,
            non_pk_cols,
            version_col,
            select_cols,
        })
    }

    /// The value columns actually carried in `select_cols`: just the version
    /// column when one is configured, otherwise every non-PK column.
    pub fn value_cols(&self) -> &[ColumnProperties] {
        if self.version_col.is_some() {
            &self.select_cols[self.pk_cols.len()..]
        } else {
            &self.non_pk_cols
        }
    }

    pub fn has_value_cols(&self) -> bool {
        !self.value_cols().is_empty()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use tokio_postgres::types::Type;

    fn col(name: &str) -> ColumnProperties {
        ColumnProperties {
            name: name.to_string(),
            sql_type: Type::TEXT,
            nullable: true,
        }
    }

    fn table(pk: &[&str], cols: &[&str]) -> TableProperties {
        TableProperties {
            schema: "public".into(),
            name: "t".into(),
            columns: cols.iter().map(|c| col(c)).collect(),
            primary_key: pk.iter().map(|s| s.to_string()).collect(),
        }
    }

    #[test]
    fn select_cols_puts_pk_first() {
        let t = table(&["id"], &["id", "name", "age"]);
        let proj = ColumnProjection::resolve(&t, None).unwrap();
        let names: Vec<_> = proj.select_cols.iter().map(|c| c.name.as_str()).collect();
        assert_eq!(names, vec!["id", "name", "age"]);
        assert_eq!(proj.value_cols().len(), 2);
    }

    #[test]
    fn missing_primary_key_is_an_error() {
        let t = table(&[], &["id", "name"]);
        assert!(matches!(
            ColumnProjection::resolve(&t, None),
            Err(SyncError::MissingPrimaryKey(_))
        ));
    }

    #[test]
    fn version_column_replaces_non_pk_columns_in_projection() {
        let t = table(&["id"], &["id", "ver", "payload"]);
        let proj = ColumnProjection::resolve(&t, Some("^ver$")).unwrap();
        let names: Vec<_> = proj.select_cols.iter().map(|c| c.name.as_str()).collect();
        assert_eq!(names, vec!["id", "ver"]);
        assert_eq!(proj.value_cols().len(), 1);
    }

    #[test]
    fn ambiguous_version_pattern_is_an_error() {
        let t = table(&["id"], &["id", "version_a", "version_b"]);
        assert!(matches!(
            ColumnProjection::resolve(&t, Some("version")),
            Err(SyncError::AmbiguousVersionColumn(_, _))
        ));
    }
}
