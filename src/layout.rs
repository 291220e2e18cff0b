//! Directory layout of the source data tree.

use std::fs;
use std::path::PathBuf;
use tracing::warn;

/// File-name prefix of split table files ("Раздел <table>.csv").
pub const TABLE_FILE_PREFIX: &str = "Раздел";

/// Root of the per-year data tree.
///
/// Federal tables live at `<root>/<year>/Раздел <table>.csv`; regional
/// tables at `<root>/<year>/<year>/<region>/Раздел <table>.csv`.
#[derive(Debug, Clone)]
pub struct DataRoot {
    base: PathBuf,
}

impl DataRoot {
    pub fn new(base: impl Into<PathBuf>) -> Self {
        Self { base: base.into() }
    }

    pub fn federal_table(&self, year: &str, table: &str) -> PathBuf {
        self.base
            .join(year)
            .join(format!("{TABLE_FILE_PREFIX} {table}.csv"))
    }

    pub fn regional_table(&self, year: &str, region: &str, table: &str) -> PathBuf {
        self.base
            .join(year)
            .join(year)
            .join(region)
            .join(format!("{TABLE_FILE_PREFIX} {table}.csv"))
    }

    /// Region directory names for a year, dot-prefixed entries excluded.
    ///
    /// The listing is the authoritative region set for a collection run; a
    /// missing directory yields an empty list, not an error. Sorted so that
    /// repeated runs enumerate regions in a stable order.
    pub fn region_dirs(&self, year: &str) -> Vec<String> {
        let dir = self.base.join(year).join(year);
        let entries = match fs::read_dir(&dir) {
            Ok(entries) => entries,
            Err(_) => {
                warn!("Region directory not found: {}", dir.display());
                return Vec::new();
            }
        };

        let mut regions: Vec<String> = entries
            .filter_map(|entry| entry.ok())
            .filter(|entry| entry.path().is_dir())
            .filter_map(|entry| entry.file_name().into_string().ok())
            .filter(|name| !name.starts_with('.'))
            .collect();
        regions.sort();
        regions
    }
}
