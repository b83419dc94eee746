// ==============================================================================
// models.rs - Variant and Statistics Data Models
// ==============================================================================
// Description: Data structures shared by the selection, collection and merge passes
// Created: 2026-10-16
// Modified: 2026-10-16
// Version: 1.0.0
// ==============================================================================

use serde::{Deserialize, Serialize};
use std::collections::{HashMap, HashSet};
use std::fmt;

/// Placeholder written wherever a dataset has no value for a variant
pub const MISSING_VALUE: &str = "NA";

/// Composite variant identity (chromosome, position, ref, alt)
///
/// All four fields are compared as exact strings: "1" and "chr1" are
/// different chromosomes, "a" and "A" are different alleles.
#[derive(Debug, Clone, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
pub struct VariantKey {
    pub chromosome: String,
    pub position: String,
    pub reference: String,
    pub alternate: String,
}

impl VariantKey {
    pub fn new(
        chromosome: impl Into<String>,
        position: impl Into<String>,
        reference: impl Into<String>,
        alternate: impl Into<String>,
    ) -> Self {
        Self {
            chromosome: chromosome.into(),
            position: position.into(),
            reference: reference.into(),
            alternate: alternate.into(),
        }
    }
}

impl fmt::Display for VariantKey {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(
            f,
            "{}:{}:{}:{}",
            self.chromosome, self.position, self.reference, self.alternate
        )
    }
}

/// One summary statistics line, numeric fields kept as the original text
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct SummaryRow {
    /// Tag of the dataset this row was read from
    pub tag: String,
    pub key: VariantKey,
    pub pval: String,
    pub beta: String,
    pub sebeta: String,
    pub af: String,
}

/// One fine-mapping line after key translation
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct FineMapRow {
    pub tag: String,
    pub key: VariantKey,
    /// Posterior inclusion probability
    pub pip: String,
    /// Credible set identifier
    pub cs: String,
}

/// Per-dataset statistics attached to a variant (summary stats + fine-mapping)
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct DatasetStats {
    pub tag: String,
    pub pval: String,
    pub beta: String,
    pub sebeta: String,
    pub af: String,
    pub pip: String,
    pub cs: String,
}

impl From<SummaryRow> for DatasetStats {
    fn from(row: SummaryRow) -> Self {
        Self {
            tag: row.tag,
            pval: row.pval,
            beta: row.beta,
            sebeta: row.sebeta,
            af: row.af,
            pip: MISSING_VALUE.to_string(),
            cs: MISSING_VALUE.to_string(),
        }
    }
}

/// Join target: every selected variant mapped to its per-dataset rows
///
/// A variant appears only once a dataset produced a row for it, and each
/// dataset tag appears at most once per variant.
#[derive(Debug, Clone, Default, PartialEq)]
pub struct VariantTable {
    variants: HashMap<VariantKey, Vec<DatasetStats>>,
    /// (dataset tag, variant) pairs that already took a fine-mapping row
    finemapped: HashSet<(String, VariantKey)>,
}

/// Outcome of joining one fine-mapping row onto the table
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum FinemapMatch {
    /// PIP/CS set on the matching entry
    Applied,
    /// The entry already has fine-mapping values; they are kept
    AlreadyApplied,
    /// No (dataset, variant) entry was collected for this row
    NoEntry,
}

impl VariantTable {
    pub fn new() -> Self {
        Self::default()
    }

    /// Append a summary row to its variant, creating the variant if needed.
    ///
    /// Returns `false` (and leaves the table untouched) when the dataset
    /// already has a row for this variant.
    pub fn insert_summary(&mut self, row: SummaryRow) -> bool {
        let entries = self.variants.entry(row.key.clone()).or_default();
        if entries.iter().any(|s| s.tag == row.tag) {
            return false;
        }
        entries.push(DatasetStats::from(row));
        true
    }

    /// Set PIP/CS on an existing (dataset, variant) entry.
    ///
    /// Fine-mapping rows never create entries, and only the first row for
    /// a pair is applied (same policy as `insert_summary`).
    pub fn apply_finemap(&mut self, row: FineMapRow) -> FinemapMatch {
        let Some(entries) = self.variants.get_mut(&row.key) else {
            return FinemapMatch::NoEntry;
        };
        let Some(stats) = entries.iter_mut().find(|s| s.tag == row.tag) else {
            return FinemapMatch::NoEntry;
        };
        if !self.finemapped.insert((row.tag, row.key)) {
            return FinemapMatch::AlreadyApplied;
        }
        stats.pip = row.pip;
        stats.cs = row.cs;
        FinemapMatch::Applied
    }

    pub fn get(&self, key: &VariantKey) -> Option<&[DatasetStats]> {
        self.variants.get(key).map(Vec::as_slice)
    }

    pub fn contains(&self, key: &VariantKey) -> bool {
        self.variants.contains_key(key)
    }

    pub fn len(&self) -> usize {
        self.variants.len()
    }

    pub fn is_empty(&self) -> bool {
        self.variants.is_empty()
    }

    pub fn iter(&self) -> impl Iterator<Item = (&VariantKey, &[DatasetStats])> {
        self.variants.iter().map(|(k, v)| (k, v.as_slice()))
    }

    /// Variants in key order, for deterministic output
    pub fn sorted(&self) -> Vec<(&VariantKey, &[DatasetStats])> {
        let mut rows: Vec<_> = self.iter().collect();
        rows.sort_by(|a, b| a.0.cmp(b.0));
        rows
    }
}

/// Fixed-effect meta-analysis result for one variant and one test group
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct MetaStats {
    pub beta: f64,
    pub sebeta: f64,
    pub pval: f64,
    /// Cochran's Q heterogeneity p-value
    pub het_pval: f64,
}
