//! Reconciliation of source directory names with canonical region names.

use crate::error::{Result, StatGraphError};
use std::fs;
use std::path::Path;
use strsim::jaro_winkler;
use tracing::warn;

/// Similarity floor below which a region directory is dropped.
pub const SIMILARITY_FLOOR: f64 = 0.70;

/// A directory name resolved to its canonical region name.
#[derive(Debug, Clone)]
pub struct MatchedRegion {
    pub directory: String,
    pub canonical: String,
    pub score: f64,
}

/// Matches region directory names against the canonical map names.
///
/// Directory spellings drift from the reference dataset ("Кемеровская
/// область" vs "Кемеровская область – Кузбасс"). Matching is fuzzy with a
/// hard floor; a directory that clears the floor for no canonical name is
/// dropped rather than guessed. Omitting a region beats mis-attributing
/// its data.
pub struct RegionMatcher {
    canonical: Vec<String>,
    floor: f64,
}

impl RegionMatcher {
    pub fn new(canonical: Vec<String>) -> Self {
        Self {
            canonical,
            floor: SIMILARITY_FLOOR,
        }
    }

    pub fn with_floor(canonical: Vec<String>, floor: f64) -> Self {
        Self { canonical, floor }
    }

    /// Load the canonical name list from a JSON array of strings.
    pub fn load(path: &Path) -> Result<Self> {
        let text = fs::read_to_string(path).map_err(|e| {
            StatGraphError::Config(format!(
                "Failed to read canonical region list {}: {}",
                path.display(),
                e
            ))
        })?;
        let canonical: Vec<String> = serde_json::from_str(&text)
            .map_err(|e| StatGraphError::Config(format!("Invalid canonical region list: {}", e)))?;
        Ok(Self::new(canonical))
    }

    fn normalize(s: &str) -> String {
        let lowered = s.to_lowercase();
        let stripped: String = lowered
            .chars()
            .filter(|c| c.is_alphanumeric() || c.is_whitespace())
            .collect();
        stripped.split_whitespace().collect::<Vec<_>>().join(" ")
    }

    /// Similarity between two region spellings, 0.0-1.0.
    pub fn similarity(a: &str, b: &str) -> f64 {
        let norm_a = Self::normalize(a);
        let norm_b = Self::normalize(b);
        if norm_a.is_empty() || norm_b.is_empty() {
            return 0.0;
        }

        let score = jaro_winkler(&norm_a, &norm_b);

        // Renamed regions keep the old spelling as a prefix of the new one;
        // containment earns a small bonus scaled by the length gap.
        if norm_a.contains(&norm_b) || norm_b.contains(&norm_a) {
            let len_diff = (norm_a.len() as f64 - norm_b.len() as f64).abs();
            let max_len = norm_a.len().max(norm_b.len()) as f64;
            let bonus = (1.0 - len_diff / max_len) * 0.1;
            (score + bonus).min(1.0)
        } else {
            score
        }
    }

    /// Best canonical name for a directory, if any clears the floor.
    pub fn match_directory(&self, dir_name: &str) -> Option<MatchedRegion> {
        let best = self
            .canonical
            .iter()
            .map(|name| (name, Self::similarity(dir_name, name)))
            .max_by(|a, b| a.1.partial_cmp(&b.1).unwrap_or(std::cmp::Ordering::Equal))?;

        if best.1 >= self.floor {
            Some(MatchedRegion {
                directory: dir_name.to_string(),
                canonical: best.0.clone(),
                score: best.1,
            })
        } else {
            warn!(
                "Region directory '{}' matches no canonical name (best score {:.2}), dropping",
                dir_name, best.1
            );
            None
        }
    }

    /// Reconcile a full directory listing; unmatched entries are dropped.
    pub fn reconcile(&self, dirs: &[String]) -> Vec<MatchedRegion> {
        dirs.iter()
            .filter_map(|dir| self.match_directory(dir))
            .collect()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn canonical() -> Vec<String> {
        vec![
            "Кемеровская область – Кузбасс".to_string(),
            "Московская область".to_string(),
            "Республика Татарстан".to_string(),
        ]
    }

    #[test]
    fn test_renamed_region_clears_floor() {
        let matcher = RegionMatcher::new(canonical());
        let matched = matcher.match_directory("Кемеровская область").unwrap();
        assert_eq!(matched.canonical, "Кемеровская область – Кузбасс");
        assert!(matched.score >= SIMILARITY_FLOOR);
    }

    #[test]
    fn test_unrelated_name_is_dropped() {
        let matcher = RegionMatcher::new(canonical());
        assert!(matcher.match_directory("XYZ123").is_none());
    }

    #[test]
    fn test_exact_match_scores_highest() {
        let matcher = RegionMatcher::new(canonical());
        let matched = matcher.match_directory("Московская область").unwrap();
        assert_eq!(matched.canonical, "Московская область");
        assert!(matched.score > 0.99);
    }

    #[test]
    fn test_reconcile_drops_unmatched() {
        let matcher = RegionMatcher::new(canonical());
        let dirs = vec![
            "Кемеровская область".to_string(),
            "XYZ123".to_string(),
            "Республика Татарстан".to_string(),
        ];
        let matched = matcher.reconcile(&dirs);
        assert_eq!(matched.len(), 2);
    }

    #[test]
    fn test_similarity_is_symmetric_enough() {
        let a = RegionMatcher::similarity("Московская область", "Московская  Область");
        assert!(a > 0.95);
    }
}
