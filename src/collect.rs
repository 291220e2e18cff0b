//! Federal and regional data collection across the year range.

use crate::config::CoordinatePlan;
use crate::layout::DataRoot;
use crate::model::Collected;
use crate::regions::RegionMatcher;
use crate::table;
use std::collections::BTreeMap;
use tracing::{debug, info};

/// Sweeps the data tree for one indicator's time series.
///
/// Every pass produces one value slot per configured year; absent files,
/// absent cells and unparseable numbers all land as `None` so that a
/// partial archive never aborts a batch.
pub struct Collector<'a> {
    root: &'a DataRoot,
    years: &'a [String],
    matcher: Option<&'a RegionMatcher>,
}

impl<'a> Collector<'a> {
    pub fn new(root: &'a DataRoot, years: &'a [String]) -> Self {
        Self {
            root,
            years,
            matcher: None,
        }
    }

    /// Reconcile region directory names against canonical map names.
    pub fn with_matcher(mut self, matcher: &'a RegionMatcher) -> Self {
        self.matcher = Some(matcher);
        self
    }

    /// Year whose directory listing defines the region set.
    fn listing_year(&self) -> &str {
        self.years.last().map(String::as_str).unwrap_or("2024")
    }

    pub fn collect(&self, plan: &CoordinatePlan) -> Collected {
        let federal = self.collect_federal(plan);
        let (regions, regional) = self.collect_regional(plan);
        Collected {
            federal,
            regions,
            regional,
        }
    }

    /// Federal value per configured year.
    pub fn collect_federal(&self, plan: &CoordinatePlan) -> Vec<Option<f64>> {
        self.years
            .iter()
            .map(|year| {
                let coords = match plan.for_year(year) {
                    Some(coords) => coords,
                    None => {
                        debug!("No coordinates configured for year {}", year);
                        return None;
                    }
                };
                let path = self.root.federal_table(year, &coords.table);
                if !path.exists() {
                    debug!("Federal table missing: {}", path.display());
                    return None;
                }
                table::extract(&path, coords.column, coords.row).and_then(|raw| table::parse_numeric(&raw))
            })
            .collect()
    }

    /// Region list plus one value row per region, aligned to the year list.
    ///
    /// With a matcher attached the returned names are canonical; source
    /// directories that match no canonical name are dropped. Without one
    /// the raw directory names pass through.
    pub fn collect_regional(&self, plan: &CoordinatePlan) -> (Vec<String>, Vec<Vec<Option<f64>>>) {
        let dirs = self.root.region_dirs(self.listing_year());
        let pairs: Vec<(String, String)> = match self.matcher {
            Some(matcher) => matcher
                .reconcile(&dirs)
                .into_iter()
                .map(|m| (m.directory, m.canonical))
                .collect(),
            None => dirs.iter().map(|d| (d.clone(), d.clone())).collect(),
        };
        info!(
            "Collecting regional data for {} of {} region directories",
            pairs.len(),
            dirs.len()
        );

        let mut regions = Vec::with_capacity(pairs.len());
        let mut matrix = Vec::with_capacity(pairs.len());
        for (directory, display_name) in pairs {
            let row: Vec<Option<f64>> = self
                .years
                .iter()
                .map(|year| {
                    let coords = plan.for_year(year)?;
                    let path = self.root.regional_table(year, &directory, &coords.table);
                    if !path.exists() {
                        return None;
                    }
                    table::extract(&path, coords.column, coords.row)
                        .and_then(|raw| table::parse_numeric(&raw))
                })
                .collect();
            regions.push(display_name);
            matrix.push(row);
        }
        (regions, matrix)
    }
}

/// Raw (unparsed) per-year values for one cell.
///
/// Used by the query resolver, which surfaces the literal table text to the
/// user instead of a parsed number.
pub fn collect_raw_values(
    root: &DataRoot,
    table_number: &str,
    column: usize,
    row: usize,
    years: &[String],
) -> BTreeMap<String, Option<String>> {
    years
        .iter()
        .map(|year| {
            let path = root.federal_table(year, table_number);
            let value = if path.exists() {
                table::extract(&path, column, row)
            } else {
                None
            };
            (year.clone(), value)
        })
        .collect()
}
