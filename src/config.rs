// ABOUTME: Synchronization configuration — defaults, TOML file, and CLI flag precedence
// ABOUTME: Mirrors the teacher's replication-config.toml pattern, scoped to this strategy's knobs

use anyhow::{Context, Result};
use serde::Deserialize;

/// Configuration recognized by the core (§5): the batch flush bound, the
/// SELECT fetch-page size, and the optional version-column pattern. Also
/// carries the ambient CLI conveniences (`schema`, `only_tables`) that scope
/// which tables the catalog reports without being part of the core contract.
#[derive(Debug, Clone)]
pub struct SyncConfig {
    /// Applied to both SELECT cursors via `FETCH n FROM ...`. `0` means
    /// "fetch everything in one page" (driver default).
    pub fetch_size: u32,
    /// DML flush bound; must be >= 1. Values < 1 from a config file or CLI
    /// flag are clamped up rather than rejected, matching `BatchExecutor::new`.
    pub max_batch_size: usize,
    /// Case-insensitive regex over non-PK column names; at most one match
    /// per table is expected (ambiguity is a hard error at projection time).
    pub version_pattern: Option<String>,
    /// Schema the catalog snapshots tables from.
    pub schema: String,
    /// Non-empty narrows synchronization to these `schema.table`/`table` entries.
    pub only_tables: Vec<String>,
}

impl Default for SyncConfig {
    fn default() -> Self {
        Self {
            fetch_size: 0,
            max_batch_size: 100,
            version_pattern: None,
            schema: "public".to_string(),
            only_tables: Vec::new(),
        }
    }
}

/// The subset of `SyncConfig` a TOML file may override. Every field is
/// optional so a config file only needs to mention what it changes.
#[derive(Debug, Deserialize, Default)]
struct FileConfig {
    fetch_size: Option<u32>,
    max_batch_size: Option<usize>,
    version_pattern: Option<String>,
    schema: Option<String>,
    tables: Option<Vec<String>>,
}

impl SyncConfig {
    /// Loads a `replication-config.toml`-style file and layers it over
    /// `self` in place, following the same ascending-precedence rule as the
    /// teacher's own `--config` handling: file values override defaults,
    /// and are in turn overridden by any CLI flags applied after this call.
    pub fn merge_file(&mut self, path: &str) -> Result<()> {
        let text = std::fs::read_to_string(path)
            .with_context(|| format!("Failed to read config file: {}", path))?;
        let file: FileConfig = toml::from_str(&text)
            .with_context(|| format!("Failed to parse config file as TOML: {}", path))?;

        if let Some(v) = file.fetch_size {
            self.fetch_size = v;
        }
        if let Some(v) = file.max_batch_size {
            self.max_batch_size = v.max(1);
        }
        if let Some(v) = file.version_pattern {
            self.version_pattern = Some(v);
        }
        if let Some(v) = file.schema {
            self.schema = v;
        }
        if let Some(v) = file.tables {
            self.only_tables = v;
        }
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn defaults_match_spec() {
        let cfg = SyncConfig::default();
        assert_eq!(cfg.fetch_size, 0);
        assert_eq!(cfg.max_batch_size, 100);
        assert!(cfg.version_pattern.is_none());
    }

    #[test]
    fn file_config_overrides_only_mentioned_fields() {
        let dir = std::env::temp_dir();
        let path = dir.join(format!("diffsync-test-config-{}.toml", std::process::id()));
        std::fs::write(&path, "max_batch_size = 50\nversion_pattern = \"^ver$\"\n").unwrap();

        let mut cfg = SyncConfig::default();
        cfg.merge_file(path.to_str().unwrap()).unwrap();

        assert_eq!(cfg.max_batch_size, 50);
        assert_eq!(cfg.version_pattern.as_deref(), Some("^ver$"));
        assert_eq!(cfg.fetch_size, 0);
        assert_eq!(cfg.schema, "public");

        std::fs::remove_file(&path).ok();
    }

    #[test]
    fn zero_max_batch_size_is_clamped_to_one() {
        let dir = std::env::temp_dir();
        let path = dir.join(format!("diffsync-test-config-clamp-{}.toml", std::process::id()));
        std::fs::write(&path, "max_batch_size = 0\n").unwrap();

        let mut cfg = SyncConfig::default();
        cfg.merge_file(path.to_str().unwrap()).unwrap();
        assert_eq!(cfg.max_batch_size, 1);

        std::fs::remove_file(&path).ok();
    }
}
