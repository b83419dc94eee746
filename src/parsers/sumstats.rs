// ==============================================================================
// sumstats.rs - GWAS Summary Statistics Parser
// ==============================================================================
// Description: Streams summary statistics rows using the per-dataset column
//              mapping from the configuration
// Created: 2026-10-16
// Modified: 2026-10-16
// Version: 1.0.0
// ==============================================================================
// Format: tab-delimited, gzip-compressed by default, arbitrary column names
// Example (FinnGen layout):
//   #chrom  pos     ref  alt  rsids       nearest_genes  pval     beta     sebeta   af_alt
//   1       13668   G    A    rs2691328   OR4F5          0.2853   -0.0537  0.0503   0.0058
// ==============================================================================

use std::path::Path;
use thiserror::Error;

use crate::config::DatasetConfig;
use crate::models::{SummaryRow, VariantKey, MISSING_VALUE};
use crate::parsers::tsv::{TsvError, TsvReader};

/// Error converting a text field to a number
#[derive(Error, Debug, Clone, PartialEq)]
pub enum ValueError {
    #[error("Invalid numeric value `{0}`")]
    InvalidFloat(String),
}

/// Parse a float where the literal `NA` stands for a missing value
///
/// `NA` becomes `NaN`, so any comparison against it is false: a missing
/// p-value never passes a threshold.
///
/// # Examples
/// ```
/// use sumstat_merger::parsers::sumstats::parse_float_na;
///
/// assert_eq!(parse_float_na("1e-8").unwrap(), 1e-8);
/// assert!(parse_float_na("NA").unwrap().is_nan());
/// assert!(parse_float_na("abc").is_err());
/// ```
pub fn parse_float_na(value: &str) -> Result<f64, ValueError> {
    if value == MISSING_VALUE {
        return Ok(f64::NAN);
    }
    value
        .parse::<f64>()
        .map_err(|_| ValueError::InvalidFloat(value.to_string()))
}

/// Summary statistics reader for one configured dataset
#[derive(Debug)]
pub struct SummaryStatsReader {
    tag: String,
    rows: TsvReader,
}

impl SummaryStatsReader {
    /// Open the dataset's file and resolve its eight configured columns
    ///
    /// Fails with `TsvError::MissingColumn` before reading any row when one
    /// of the configured column names is not in the header.
    pub fn open(conf: &DatasetConfig) -> Result<Self, TsvError> {
        let rows = TsvReader::open(&conf.filepath, conf.compression, &conf.columns())?;
        Ok(Self {
            tag: conf.tag.clone(),
            rows,
        })
    }

    pub fn tag(&self) -> &str {
        &self.tag
    }

    pub fn path(&self) -> &Path {
        self.rows.path()
    }
}

impl Iterator for SummaryStatsReader {
    type Item = Result<SummaryRow, TsvError>;

    fn next(&mut self) -> Option<Self::Item> {
        let fields = match self.rows.next()? {
            Ok(fields) => fields,
            Err(e) => return Some(Err(e)),
        };

        // Order matches DatasetConfig::columns()
        let mut fields = fields.into_iter();
        let mut next_field = || fields.next().unwrap_or_default();

        Some(Ok(SummaryRow {
            tag: self.tag.clone(),
            key: VariantKey {
                chromosome: next_field(),
                position: next_field(),
                reference: next_field(),
                alternate: next_field(),
            },
            pval: next_field(),
            beta: next_field(),
            sebeta: next_field(),
            af: next_field(),
        }))
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::parsers::tsv::tests::{create_gz_test_file, create_test_file};
    use crate::parsers::tsv::Compression;
    use std::path::PathBuf;

    fn dataset(tag: &str, path: PathBuf, compression: Compression) -> DatasetConfig {
        DatasetConfig {
            tag: tag.to_string(),
            filepath: path,
            col_chrom: "#chrom".to_string(),
            col_pos: "pos".to_string(),
            col_ref: "ref".to_string(),
            col_alt: "alt".to_string(),
            col_pval: "pval".to_string(),
            col_beta: "beta".to_string(),
            col_sebeta: "sebeta".to_string(),
            col_af: "af_alt".to_string(),
            pval_threshold: 1e-6,
            finemap_filepath: None,
            compression,
        }
    }

    #[test]
    fn test_parse_float_na() {
        assert!(parse_float_na("NA").unwrap().is_nan());
        assert_eq!(parse_float_na("0.05").unwrap(), 0.05);
        assert_eq!(parse_float_na("-1.5e-3").unwrap(), -1.5e-3);
        assert_eq!(
            parse_float_na("n/a").unwrap_err(),
            ValueError::InvalidFloat("n/a".to_string())
        );
        assert!(parse_float_na("").is_err());
    }

    #[test]
    fn test_na_never_below_threshold() {
        let pval = parse_float_na("NA").unwrap();
        assert!(!(pval < 1.0));
    }

    #[test]
    fn test_reads_rows_in_any_column_order() {
        let contents = "\
af_alt\tpval\t#chrom\tref\talt\tpos\tbeta\tsebeta\trsids
0.3\t1e-8\t1\tA\tT\t100\t0.5\t0.1\trs1
0.1\tNA\tX\tG\tC\t200\tNA\tNA\trs2
";
        let file = create_gz_test_file(contents);
        let conf = dataset("A", file.path().to_path_buf(), Compression::Gzip);

        let rows: Vec<SummaryRow> = SummaryStatsReader::open(&conf)
            .unwrap()
            .collect::<Result<_, _>>()
            .unwrap();

        assert_eq!(rows.len(), 2);
        assert_eq!(rows[0].tag, "A");
        assert_eq!(rows[0].key, VariantKey::new("1", "100", "A", "T"));
        assert_eq!(rows[0].pval, "1e-8");
        assert_eq!(rows[0].beta, "0.5");
        assert_eq!(rows[0].sebeta, "0.1");
        assert_eq!(rows[0].af, "0.3");
        assert_eq!(rows[1].key, VariantKey::new("X", "200", "G", "C"));
        assert_eq!(rows[1].beta, "NA");
    }

    #[test]
    fn test_preserves_original_number_formatting() {
        let contents = "#chrom\tpos\tref\talt\tpval\tbeta\tsebeta\taf_alt\n1\t100\tA\tT\t1.00E-08\t0.500\t.10\t3e-1\n";
        let file = create_test_file(contents);
        let conf = dataset("A", file.path().to_path_buf(), Compression::None);

        let row = SummaryStatsReader::open(&conf).unwrap().next().unwrap().unwrap();
        assert_eq!(row.pval, "1.00E-08");
        assert_eq!(row.beta, "0.500");
        assert_eq!(row.sebeta, ".10");
        assert_eq!(row.af, "3e-1");
    }

    #[test]
    fn test_missing_configured_column() {
        let file = create_test_file("#chrom\tpos\tref\talt\tpval\tbeta\tsebeta\n");
        let conf = dataset("A", file.path().to_path_buf(), Compression::None);

        match SummaryStatsReader::open(&conf).unwrap_err() {
            TsvError::MissingColumn { column, .. } => assert_eq!(column, "af_alt"),
            other => panic!("Expected MissingColumn error, got {:?}", other),
        }
    }
}
