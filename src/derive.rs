//! Derived-indicator computation from stored input series.
//!
//! Inputs bind to formula variables positionally: the first configured id
//! becomes `node_id1`, the second `node_id2`, and so on. The per-cell
//! missing policy favors availability: a cell is missing only when every
//! input is missing; a partially-missing cell evaluates with zeros standing
//! in for the gaps, which understates sums and skews ratios but keeps the
//! series computable. Division by zero makes a cell missing.

use crate::expr::Expr;
use crate::model::{IndicatorData, NodeId};
use tracing::warn;

/// Evaluate one cell from the positional input values.
pub fn evaluate_cell(expr: &Expr, inputs: &[Option<f64>]) -> Option<f64> {
    if inputs.iter().all(|v| v.is_none()) {
        return None;
    }
    let substituted: Vec<f64> = inputs.iter().map(|v| v.unwrap_or(0.0)).collect();
    expr.eval(&substituted)
}

/// Compute the federal series of a derived indicator.
pub fn federal_series(expr: &Expr, inputs: &[IndicatorData], years: &[String]) -> Vec<Option<f64>> {
    (0..years.len())
        .map(|year_idx| {
            let cell: Vec<Option<f64>> = inputs
                .iter()
                .map(|data| data.federal_values.get(year_idx).copied().flatten())
                .collect();
            evaluate_cell(expr, &cell)
        })
        .collect()
}

/// Compute the per-region matrix of a derived indicator.
///
/// The region list comes from the first input that has one; regions are
/// aligned across inputs by name, and an input without a row for a region
/// contributes missing values there.
pub fn regional_series(
    expr: &Expr,
    inputs: &[IndicatorData],
    years: &[String],
) -> (Vec<String>, Vec<Vec<Option<f64>>>) {
    let regions = match inputs.iter().find(|data| !data.regions.is_empty()) {
        Some(data) => data.regions.clone(),
        None => {
            warn!("No regional data in any input; derived node gets no regional edges");
            return (Vec::new(), Vec::new());
        }
    };

    let matrix = regions
        .iter()
        .map(|region| {
            (0..years.len())
                .map(|year_idx| {
                    let cell: Vec<Option<f64>> = inputs
                        .iter()
                        .map(|data| {
                            data.regions
                                .iter()
                                .position(|r| r == region)
                                .and_then(|region_idx| data.regional_values.get(region_idx))
                                .and_then(|row| row.get(year_idx).copied().flatten())
                        })
                        .collect();
                    evaluate_cell(expr, &cell)
                })
                .collect()
        })
        .collect();

    (regions, matrix)
}

/// Zero-filled stand-in for an input id missing from the store.
///
/// One missing dependency must not block computing the other years and
/// regions, so the gap is filled with zeros and flagged in the log.
pub fn synthesize_missing(id: &NodeId, years: &[String]) -> IndicatorData {
    warn!("Input node {} not found in the store; using zero-filled series", id);
    IndicatorData {
        node_id: id.clone(),
        name: format!("missing_{}", id),
        years: years.to_vec(),
        federal_values: vec![Some(0.0); years.len()],
        regions: Vec::new(),
        regional_values: Vec::new(),
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn input(id: &str, federal: Vec<Option<f64>>) -> IndicatorData {
        IndicatorData {
            node_id: NodeId::new(id),
            name: id.to_string(),
            years: vec!["2021".to_string(), "2022".to_string()],
            federal_values: federal,
            regions: Vec::new(),
            regional_values: Vec::new(),
        }
    }

    fn regional_input(
        id: &str,
        regions: Vec<&str>,
        matrix: Vec<Vec<Option<f64>>>,
    ) -> IndicatorData {
        IndicatorData {
            node_id: NodeId::new(id),
            name: id.to_string(),
            years: vec!["2021".to_string(), "2022".to_string()],
            federal_values: vec![None, None],
            regions: regions.into_iter().map(String::from).collect(),
            regional_values: matrix,
        }
    }

    #[test]
    fn test_partial_missing_substitutes_zero() {
        let expr = Expr::parse("node_id1 + node_id2").unwrap();
        assert_eq!(evaluate_cell(&expr, &[Some(10.0), None]), Some(10.0));
    }

    #[test]
    fn test_all_missing_short_circuits() {
        let expr = Expr::parse("node_id1 + node_id2").unwrap();
        assert_eq!(evaluate_cell(&expr, &[None, None]), None);
    }

    #[test]
    fn test_division_by_zero_cell_is_missing() {
        let expr = Expr::parse("node_id1 / node_id2").unwrap();
        assert_eq!(evaluate_cell(&expr, &[Some(10.0), Some(0.0)]), None);
        // A missing divisor substitutes to zero and hits the same guard.
        assert_eq!(evaluate_cell(&expr, &[Some(10.0), None]), None);
    }

    #[test]
    fn test_federal_series_year_by_year() {
        let expr = Expr::parse("node_id1 + node_id2").unwrap();
        let years = vec!["2021".to_string(), "2022".to_string()];
        let inputs = vec![
            input("a", vec![Some(1.0), None]),
            input("b", vec![Some(2.0), None]),
        ];
        assert_eq!(
            federal_series(&expr, &inputs, &years),
            vec![Some(3.0), None]
        );
    }

    #[test]
    fn test_regional_series_aligns_by_name() {
        let expr = Expr::parse("node_id1 + node_id2").unwrap();
        let years = vec!["2021".to_string(), "2022".to_string()];
        let inputs = vec![
            regional_input(
                "a",
                vec!["Московская область", "Республика Татарстан"],
                vec![vec![Some(1.0), Some(2.0)], vec![Some(3.0), None]],
            ),
            // Second input lists the same regions in a different order.
            regional_input(
                "b",
                vec!["Республика Татарстан", "Московская область"],
                vec![vec![Some(30.0), None], vec![Some(10.0), Some(20.0)]],
            ),
        ];
        let (regions, matrix) = regional_series(&expr, &inputs, &years);
        assert_eq!(regions[0], "Московская область");
        assert_eq!(matrix[0], vec![Some(11.0), Some(22.0)]);
        // Татарстан 2022 is missing in both inputs, so the cell stays missing.
        assert_eq!(matrix[1], vec![Some(33.0), None]);
    }

    #[test]
    fn test_input_without_region_contributes_missing() {
        let expr = Expr::parse("node_id1 + node_id2").unwrap();
        let years = vec!["2021".to_string(), "2022".to_string()];
        let inputs = vec![
            regional_input(
                "a",
                vec!["Московская область"],
                vec![vec![Some(5.0), Some(6.0)]],
            ),
            input("b", vec![Some(1.0), Some(1.0)]),
        ];
        let (regions, matrix) = regional_series(&expr, &inputs, &years);
        assert_eq!(regions.len(), 1);
        // Input "b" has no regional rows, so it contributes zero after
        // substitution rather than blocking the cell.
        assert_eq!(matrix[0], vec![Some(5.0), Some(6.0)]);
    }

    #[test]
    fn test_synthesized_input_is_zero_filled() {
        let years = vec!["2021".to_string(), "2022".to_string()];
        let data = synthesize_missing(&NodeId::new("4:dead:1"), &years);
        assert_eq!(data.federal_values, vec![Some(0.0), Some(0.0)]);
        assert!(data.regions.is_empty());
    }
}
