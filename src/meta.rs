// ==============================================================================
// meta.rs - Fixed-Effect Meta-Analysis and Heterogeneity Test
// ==============================================================================
// Description: Inverse-variance weighted meta-analysis with Cochran's Q
// Created: 2026-10-16
// Modified: 2026-10-16
// Version: 1.0.0
// ==============================================================================
// Algorithm:
//   w_i       = 1 / se_i²
//   beta      = Σ(beta_i · w_i) / Σ(w_i)
//   se        = sqrt(1 / Σ(w_i))
//   z         = |Σ(beta_i · w_i)| / sqrt(Σ(w_i))     p = 2 · (1 - Φ(z))
//   Q         = Σ(w_i · (beta_i - beta)²)           p_het = 1 - F_χ²(1)(Q)
// ==============================================================================

use statrs::distribution::{ChiSquared, ContinuousCDF, Normal};
use std::collections::HashSet;
use thiserror::Error;

use crate::config::HeterogeneityTestConfig;
use crate::models::{DatasetStats, MetaStats};
use crate::parsers::sumstats::{parse_float_na, ValueError};

/// A beta or standard error that is neither numeric nor `NA`
#[derive(Error, Debug, Clone, PartialEq)]
#[error("Failed to parse {column} of dataset `{tag}`: {source}")]
pub struct MetaInputError {
    pub tag: String,
    pub column: &'static str,
    #[source]
    pub source: ValueError,
}

/// Fixed-effect meta-analysis over matched betas and standard errors
///
/// Inputs must be the same length, non-empty and finite; callers decide
/// whether enough datasets contributed (see [`meta_for_variant`]).
/// With a single datapoint the result is degenerate (`het_pval` = 1).
pub fn heterogeneity_test(betas: &[f64], sebetas: &[f64]) -> MetaStats {
    debug_assert_eq!(betas.len(), sebetas.len());

    let weights: Vec<f64> = sebetas.iter().map(|se| 1.0 / (se * se)).collect();
    let sum_weights: f64 = weights.iter().sum();
    let sum_weighted_betas: f64 = betas.iter().zip(&weights).map(|(b, w)| b * w).sum();

    let beta = sum_weighted_betas / sum_weights;
    let sebeta = (1.0 / sum_weights).sqrt();

    let z = sum_weighted_betas.abs() / sum_weights.sqrt();
    let pval = 2.0 * standard_normal().sf(z);

    let q: f64 = betas
        .iter()
        .zip(&weights)
        .map(|(b, w)| w * (b - beta).powi(2))
        .sum();
    let het_pval = 1.0 - chi_squared_1df().cdf(q);

    MetaStats {
        beta,
        sebeta,
        pval,
        het_pval,
    }
}

/// Run one heterogeneity test on one variant's per-dataset rows
///
/// Every compared dataset that has a row is parsed first, so a malformed
/// value is an error whatever the order of `compare`. Repeated tags in
/// `compare` are counted once.
///
/// # Returns
/// * `Ok(Some(stats))` - Every compared dataset has finite beta and SE
/// * `Ok(None)` - Not computed: a compared dataset has no row for this
///   variant, has `NA`, has a non-finite value, or fewer than two distinct
///   datasets contributed
/// * `Err(MetaInputError)` - A beta or SE is not a number
pub fn meta_for_variant(
    stats: &[DatasetStats],
    test: &HeterogeneityTestConfig,
) -> Result<Option<MetaStats>, MetaInputError> {
    let mut betas = Vec::with_capacity(test.compare.len());
    let mut sebetas = Vec::with_capacity(test.compare.len());
    let mut seen = HashSet::new();
    let mut complete = true;

    for tag in &test.compare {
        if !seen.insert(tag.as_str()) {
            continue;
        }
        let Some(row) = stats.iter().find(|s| &s.tag == tag) else {
            complete = false;
            continue;
        };

        let beta = parse_field(tag, "beta", &row.beta)?;
        let sebeta = parse_field(tag, "sebeta", &row.sebeta)?;

        if !beta.is_finite() || !sebeta.is_finite() || sebeta == 0.0 {
            complete = false;
            continue;
        }

        betas.push(beta);
        sebetas.push(sebeta);
    }

    if !complete || betas.len() < 2 {
        return Ok(None);
    }

    Ok(Some(heterogeneity_test(&betas, &sebetas)))
}

fn parse_field(tag: &str, column: &'static str, value: &str) -> Result<f64, MetaInputError> {
    parse_float_na(value).map_err(|source| MetaInputError {
        tag: tag.to_string(),
        column,
        source,
    })
}

fn standard_normal() -> Normal {
    Normal::standard()
}

fn chi_squared_1df() -> ChiSquared {
    ChiSquared::new(1.0).expect("chi-squared with 1 degree of freedom is well defined")
}

#[cfg(test)]
mod tests {
    use super::*;

    const EPS: f64 = 1e-10;

    fn row(tag: &str, beta: &str, sebeta: &str) -> DatasetStats {
        DatasetStats {
            tag: tag.to_string(),
            pval: "0.01".to_string(),
            beta: beta.to_string(),
            sebeta: sebeta.to_string(),
            af: "0.2".to_string(),
            pip: "NA".to_string(),
            cs: "NA".to_string(),
        }
    }

    fn test_group(tags: &[&str]) -> HeterogeneityTestConfig {
        HeterogeneityTestConfig {
            tag: "T".to_string(),
            compare: tags.iter().map(|t| t.to_string()).collect(),
        }
    }

    #[test]
    fn test_known_values() {
        // w = [1, 1] -> beta = 2, se = sqrt(0.5), Q = 1 + 1 = 2
        let meta = heterogeneity_test(&[1.0, 3.0], &[1.0, 1.0]);

        assert!((meta.beta - 2.0).abs() < EPS);
        assert!((meta.sebeta - 0.5f64.sqrt()).abs() < EPS);

        // z = 4 / sqrt(2) ≈ 2.8284 -> p ≈ 0.004678
        assert!((meta.pval - 0.004677734981047).abs() < 1e-9, "pval = {}", meta.pval);

        // 1 - F_χ²(1)(2) ≈ 0.157299
        assert!((meta.het_pval - 0.157299207050285).abs() < 1e-9, "het_pval = {}", meta.het_pval);
    }

    #[test]
    fn test_identical_inputs_have_no_heterogeneity() {
        let meta = heterogeneity_test(&[0.25, 0.25], &[0.05, 0.05]);

        assert_eq!(meta.beta, 0.25);
        assert_eq!(meta.het_pval, 1.0);
    }

    #[test]
    fn test_unequal_weights() {
        // w = [4, 1] -> beta = (4·1 + 1·2) / 5 = 1.2, se = sqrt(1/5)
        let meta = heterogeneity_test(&[1.0, 2.0], &[0.5, 1.0]);

        assert!((meta.beta - 1.2).abs() < EPS);
        assert!((meta.sebeta - 0.2f64.sqrt()).abs() < EPS);
        assert!(meta.pval > 0.0 && meta.pval < 1.0);
    }

    #[test]
    fn test_zero_effect_has_pvalue_one() {
        let meta = heterogeneity_test(&[0.5, -0.5], &[1.0, 1.0]);
        assert!(meta.beta.abs() < EPS);
        assert!((meta.pval - 1.0).abs() < EPS);
    }

    #[test]
    fn test_meta_for_variant_uses_compared_datasets_only() {
        let stats = vec![
            row("A", "1.0", "1.0"),
            row("B", "3.0", "1.0"),
            row("C", "100.0", "0.001"),
        ];

        let meta = meta_for_variant(&stats, &test_group(&["B", "A"])).unwrap().unwrap();
        assert!((meta.beta - 2.0).abs() < EPS);
    }

    #[test]
    fn test_missing_dataset_is_not_computed() {
        let stats = vec![row("A", "1.0", "1.0")];
        assert_eq!(meta_for_variant(&stats, &test_group(&["A", "B"])).unwrap(), None);
    }

    #[test]
    fn test_na_values_are_not_computed() {
        let stats = vec![row("A", "1.0", "1.0"), row("B", "NA", "0.1")];
        assert_eq!(meta_for_variant(&stats, &test_group(&["A", "B"])).unwrap(), None);

        let stats = vec![row("A", "1.0", "NA"), row("B", "0.5", "0.1")];
        assert_eq!(meta_for_variant(&stats, &test_group(&["A", "B"])).unwrap(), None);

        let stats = vec![row("A", "1.0", "0"), row("B", "0.5", "0.1")];
        assert_eq!(meta_for_variant(&stats, &test_group(&["A", "B"])).unwrap(), None);
    }

    #[test]
    fn test_repeated_compare_tag_counts_once() {
        let stats = vec![row("A", "0.5", "0.1")];
        assert_eq!(meta_for_variant(&stats, &test_group(&["A", "A"])).unwrap(), None);

        let stats = vec![row("A", "1.0", "1.0"), row("B", "3.0", "1.0")];
        let meta = meta_for_variant(&stats, &test_group(&["A", "B", "A"])).unwrap().unwrap();
        assert!((meta.sebeta - 0.5f64.sqrt()).abs() < EPS);
    }

    #[test]
    fn test_unparseable_value_fails_regardless_of_compare_order() {
        let stats = vec![row("A", "oops", "1.0")];

        for order in [["A", "B"], ["B", "A"]] {
            let err = meta_for_variant(&stats, &test_group(&order)).unwrap_err();
            assert_eq!(err.tag, "A");
            assert_eq!(err.column, "beta");
        }

        let stats = vec![row("A", "1.0", "NA"), row("B", "0.5", "wide")];
        let err = meta_for_variant(&stats, &test_group(&["A", "B"])).unwrap_err();
        assert_eq!(err.tag, "B");
        assert_eq!(err.column, "sebeta");
    }

    #[test]
    fn test_unparseable_beta_is_an_error() {
        let stats = vec![row("A", "1.0", "1.0"), row("B", "big", "0.1")];

        let err = meta_for_variant(&stats, &test_group(&["A", "B"])).unwrap_err();
        assert_eq!(err.tag, "B");
        assert_eq!(err.column, "beta");
        assert_eq!(err.source, ValueError::InvalidFloat("big".to_string()));
    }
}
