// ==============================================================================
// output.rs - Merged Table Output
// ==============================================================================
// Description: Lay out the merged variant table (one column group per dataset
//              and per heterogeneity test) and write it as TSV
// Created: 2026-10-16
// Modified: 2026-10-16
// Version: 1.0.0
// ==============================================================================
// Layout:
//   chrom pos ref alt
//   <tag>_pval <tag>_beta <tag>_sebeta <tag>_af <tag>_pip <tag>_cs   (per dataset)
//   <tag>_meta_beta <tag>_meta_sebeta <tag>_meta_pval <tag>_meta_hetpval (per test)
// ==============================================================================

use anyhow::{Context, Result};
use std::fs::File;
use std::io::{BufWriter, Write};
use std::path::Path;
use tracing::{debug, info};

use crate::config::ValidatedConfig;
use crate::meta::meta_for_variant;
use crate::models::{DatasetStats, MetaStats, VariantKey, VariantTable, MISSING_VALUE};

/// Written in place of all four meta columns when a test was not computed
pub const NOT_COMPUTED: &str = MISSING_VALUE;

const DATASET_FIELDS: [&str; 6] = ["pval", "beta", "sebeta", "af", "pip", "cs"];
const META_FIELDS: [&str; 4] = ["meta_beta", "meta_sebeta", "meta_pval", "meta_hetpval"];

/// Build the output header for the configured datasets and tests
pub fn header(config: &ValidatedConfig) -> Vec<String> {
    let mut columns: Vec<String> = ["chrom", "pos", "ref", "alt"]
        .iter()
        .map(|c| c.to_string())
        .collect();

    for input in &config.inputs {
        columns.extend(DATASET_FIELDS.iter().map(|f| format!("{}_{}", input.tag, f)));
    }
    for test in &config.heterogeneity_tests {
        columns.extend(META_FIELDS.iter().map(|f| format!("{}_{}", test.tag, f)));
    }

    columns
}

/// Build one output row
///
/// Datasets without a row for this variant get `NA` in all six of their
/// columns. Fails when a compared beta or standard error is not a number.
pub fn build_row(
    config: &ValidatedConfig,
    key: &VariantKey,
    stats: &[DatasetStats],
) -> Result<Vec<String>> {
    let mut row = Vec::with_capacity(4 + 6 * config.inputs.len() + 4 * config.heterogeneity_tests.len());
    row.extend([
        key.chromosome.clone(),
        key.position.clone(),
        key.reference.clone(),
        key.alternate.clone(),
    ]);

    for input in &config.inputs {
        match stats.iter().find(|s| s.tag == input.tag) {
            Some(s) => row.extend([
                s.pval.clone(),
                s.beta.clone(),
                s.sebeta.clone(),
                s.af.clone(),
                s.pip.clone(),
                s.cs.clone(),
            ]),
            None => row.extend(DATASET_FIELDS.iter().map(|_| MISSING_VALUE.to_string())),
        }
    }

    for test in &config.heterogeneity_tests {
        let meta = meta_for_variant(stats, test)
            .with_context(|| format!("Heterogeneity test `{}` failed for variant {}", test.tag, key))?;
        row.extend(format_meta(meta));
    }

    Ok(row)
}

fn format_meta(meta: Option<MetaStats>) -> [String; 4] {
    match meta {
        Some(m) => [
            format!("{:e}", m.beta),
            format!("{:e}", m.sebeta),
            format!("{:e}", m.pval),
            format!("{:e}", m.het_pval),
        ],
        None => std::array::from_fn(|_| NOT_COMPUTED.to_string()),
    }
}

/// Compute every row, then write header and rows sorted by variant
///
/// Rows are built before the file is created so a failing test leaves no
/// partial output behind. Returns the number of variants written.
pub fn write_table(path: &Path, config: &ValidatedConfig, table: &VariantTable) -> Result<usize> {
    let rows = table
        .sorted()
        .into_iter()
        .map(|(key, stats)| build_row(config, key, stats))
        .collect::<Result<Vec<_>>>()?;

    debug!("Built {} output rows", rows.len());

    let file = File::create(path)
        .with_context(|| format!("Failed to create output file {}", path.display()))?;
    let mut writer = csv::WriterBuilder::new()
        .delimiter(b'\t')
        .from_writer(BufWriter::new(file));

    writer
        .write_record(header(config))
        .context("Failed to write output header")?;
    for row in &rows {
        writer.write_record(row).context("Failed to write output row")?;
    }

    let mut inner = writer
        .into_inner()
        .map_err(|e| anyhow::anyhow!("Failed to flush output: {}", e.error()))?;
    inner.flush().context("Failed to flush output")?;

    info!("Output complete: {} variants", rows.len());
    Ok(rows.len())
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::config::{DatasetConfig, HeterogeneityTestConfig};
    use crate::models::SummaryRow;
    use crate::parsers::tsv::Compression;
    use std::path::PathBuf;

    fn input(tag: &str) -> DatasetConfig {
        DatasetConfig {
            tag: tag.to_string(),
            filepath: PathBuf::from(format!("{}.tsv.gz", tag)),
            col_chrom: "chrom".to_string(),
            col_pos: "pos".to_string(),
            col_ref: "ref".to_string(),
            col_alt: "alt".to_string(),
            col_pval: "pval".to_string(),
            col_beta: "beta".to_string(),
            col_sebeta: "sebeta".to_string(),
            col_af: "af".to_string(),
            pval_threshold: 5e-8,
            finemap_filepath: None,
            compression: Compression::Gzip,
        }
    }

    fn config() -> ValidatedConfig {
        ValidatedConfig {
            inputs: vec![input("fg"), input("ukbb")],
            heterogeneity_tests: vec![HeterogeneityTestConfig {
                tag: "fg_ukbb".to_string(),
                compare: vec!["fg".to_string(), "ukbb".to_string()],
            }],
        }
    }

    fn summary(tag: &str, key: &VariantKey, beta: &str, sebeta: &str) -> SummaryRow {
        SummaryRow {
            tag: tag.to_string(),
            key: key.clone(),
            pval: "1e-9".to_string(),
            beta: beta.to_string(),
            sebeta: sebeta.to_string(),
            af: "0.1".to_string(),
        }
    }

    #[test]
    fn test_header_layout() {
        let header = header(&config());
        assert_eq!(
            header,
            vec![
                "chrom", "pos", "ref", "alt",
                "fg_pval", "fg_beta", "fg_sebeta", "fg_af", "fg_pip", "fg_cs",
                "ukbb_pval", "ukbb_beta", "ukbb_sebeta", "ukbb_af", "ukbb_pip", "ukbb_cs",
                "fg_ukbb_meta_beta", "fg_ukbb_meta_sebeta", "fg_ukbb_meta_pval", "fg_ukbb_meta_hetpval",
            ]
        );
    }

    #[test]
    fn test_absent_dataset_is_na() {
        let key = VariantKey::new("1", "100", "A", "T");
        let stats = vec![DatasetStats::from(summary("fg", &key, "0.5", "0.1"))];

        let row = build_row(&config(), &key, &stats).unwrap();
        assert_eq!(row.len(), 20);
        assert_eq!(&row[4..10], &["1e-9", "0.5", "0.1", "0.1", "NA", "NA"]);
        assert!(row[10..].iter().all(|v| v == MISSING_VALUE));
    }

    #[test]
    fn test_meta_columns_use_scientific_notation() {
        let key = VariantKey::new("1", "100", "A", "T");
        let stats = vec![
            DatasetStats::from(summary("fg", &key, "1", "1")),
            DatasetStats::from(summary("ukbb", &key, "3", "1")),
        ];

        let row = build_row(&config(), &key, &stats).unwrap();
        assert_eq!(row[16], "2e0");
        assert_eq!(row[17].parse::<f64>().unwrap(), 0.5f64.sqrt());
    }

    #[test]
    fn test_bad_beta_fails_row() {
        let key = VariantKey::new("1", "100", "A", "T");
        let stats = vec![
            DatasetStats::from(summary("fg", &key, "1", "1")),
            DatasetStats::from(summary("ukbb", &key, "oops", "1")),
        ];

        let err = build_row(&config(), &key, &stats).unwrap_err();
        assert!(format!("{:#}", err).contains("fg_ukbb"), "{:#}", err);
    }

    #[test]
    fn test_write_table_sorted() {
        let mut table = VariantTable::new();
        let late = VariantKey::new("2", "50", "C", "G");
        let early = VariantKey::new("1", "100", "A", "T");
        table.insert_summary(summary("fg", &late, "0.2", "0.1"));
        table.insert_summary(summary("ukbb", &early, "0.3", "0.1"));

        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("out.tsv");
        let written = write_table(&path, &config(), &table).unwrap();
        assert_eq!(written, 2);

        let contents = std::fs::read_to_string(&path).unwrap();
        let lines: Vec<&str> = contents.lines().collect();
        assert_eq!(lines.len(), 3);
        assert!(lines[0].starts_with("chrom\tpos\tref\talt\tfg_pval"));
        assert!(lines[1].starts_with("1\t100\tA\tT\tNA"));
        assert!(lines[2].starts_with("2\t50\tC\tG\t1e-9"));
    }

    #[test]
    fn test_failed_row_leaves_no_file() {
        let mut table = VariantTable::new();
        let key = VariantKey::new("1", "100", "A", "T");
        table.insert_summary(summary("fg", &key, "1", "1"));
        table.insert_summary(summary("ukbb", &key, "1", "oops"));

        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("out.tsv");
        assert!(write_table(&path, &config(), &table).is_err());
        assert!(!path.exists());
    }
}
