// ==============================================================================
// config.rs - Run Configuration
// ==============================================================================
// Description: Loads and validates the JSON configuration (input datasets and
//              heterogeneity test groups) before any input file is touched
// Created: 2026-10-16
// Modified: 2026-10-16
// Version: 1.0.0
// ==============================================================================
// Example:
//   {
//     "inputs": [
//       { "tag": "finngen", "filepath": "finngen.tsv.gz",
//         "col_chrom": "#chrom", "col_pos": "pos", "col_ref": "ref", "col_alt": "alt",
//         "col_pval": "pval", "col_beta": "beta", "col_sebeta": "sebeta",
//         "col_af": "af_alt", "pval_threshold": 5e-8,
//         "finemap_filepath": "finngen.SUSIE.snp" }
//     ],
//     "heterogeneity_tests": [ { "tag": "fg_ukbb", "compare": ["finngen", "ukbb"] } ]
//   }
// ==============================================================================

use serde::{Deserialize, Serialize};
use std::collections::HashSet;
use std::path::{Path, PathBuf};
use thiserror::Error;
use tracing::debug;

use crate::parsers::tsv::Compression;

/// One GWAS summary statistics input
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct DatasetConfig {
    /// Unique dataset identifier, used as output column prefix
    pub tag: String,
    pub filepath: PathBuf,
    pub col_chrom: String,
    pub col_pos: String,
    pub col_ref: String,
    pub col_alt: String,
    pub col_pval: String,
    pub col_beta: String,
    pub col_sebeta: String,
    pub col_af: String,
    /// A variant is selected when its p-value is strictly below this
    pub pval_threshold: f64,
    /// Fine-mapping results for this dataset (optional)
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub finemap_filepath: Option<PathBuf>,
    #[serde(default)]
    pub compression: Compression,
}

impl DatasetConfig {
    /// Column names in the order the summary statistics reader expects them
    pub fn columns(&self) -> [&str; 8] {
        [
            self.col_chrom.as_str(),
            self.col_pos.as_str(),
            self.col_ref.as_str(),
            self.col_alt.as_str(),
            self.col_pval.as_str(),
            self.col_beta.as_str(),
            self.col_sebeta.as_str(),
            self.col_af.as_str(),
        ]
    }
}

/// A group of datasets to meta-analyse together
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct HeterogeneityTestConfig {
    pub tag: String,
    /// Dataset tags to compare (at least 2)
    pub compare: Vec<String>,
}

/// Top-level configuration file
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Config {
    pub inputs: Option<Vec<DatasetConfig>>,
    pub heterogeneity_tests: Option<Vec<HeterogeneityTestConfig>>,
}

/// Configuration errors, all reported before any input file is read
#[derive(Error, Debug)]
pub enum ConfigError {
    #[error("Failed to read configuration file {path}: {source}")]
    Read {
        path: PathBuf,
        #[source]
        source: std::io::Error,
    },

    #[error("Failed to parse JSON configuration: {0}")]
    Json(#[from] serde_json::Error),

    #[error("Missing `{0}` field in the configuration file")]
    MissingSection(&'static str),

    #[error("No summary stat provided in the configuration file. Need at least 1")]
    NoInputs,

    #[error("Missing `{field}` key of element #{index} in the `{section}` section of the configuration file")]
    MissingKey {
        field: &'static str,
        index: usize,
        section: &'static str,
    },

    #[error("Invalid `pval_threshold` of element #{index} in the `inputs` section: {value} (must be a positive number)")]
    InvalidThreshold { index: usize, value: f64 },

    #[error("Duplicate tag `{tag}` in the `{section}` section of the configuration file")]
    DuplicateTag { tag: String, section: &'static str },

    #[error("Need at least 2 GWAS to run heterogeneity test `{tag}`. Instead got: {compare:?}")]
    TooFewDatasets { tag: String, compare: Vec<String> },

    #[error("Heterogeneity test `{test}` references unknown input tag `{tag}`")]
    UnknownTag { test: String, tag: String },
}

/// Validated configuration consumed by the pipeline
#[derive(Debug, Clone, PartialEq)]
pub struct ValidatedConfig {
    pub inputs: Vec<DatasetConfig>,
    pub heterogeneity_tests: Vec<HeterogeneityTestConfig>,
}

impl Config {
    /// Read and validate a configuration file
    pub fn load(path: impl AsRef<Path>) -> Result<ValidatedConfig, ConfigError> {
        let path = path.as_ref();
        let data = std::fs::read_to_string(path).map_err(|source| ConfigError::Read {
            path: path.to_path_buf(),
            source,
        })?;
        Self::from_json(&data)
    }

    pub fn from_json(data: &str) -> Result<ValidatedConfig, ConfigError> {
        let conf: Config = serde_json::from_str(data)?;
        conf.validate()
    }

    /// Check every required field and cross-reference
    ///
    /// serde already rejects missing or mistyped keys; this catches values
    /// that are present but unusable (empty strings, zero thresholds,
    /// dangling test tags).
    pub fn validate(self) -> Result<ValidatedConfig, ConfigError> {
        let inputs = self.inputs.ok_or(ConfigError::MissingSection("inputs"))?;
        if inputs.is_empty() {
            return Err(ConfigError::NoInputs);
        }

        let mut input_tags = HashSet::new();
        for (index, input) in inputs.iter().enumerate() {
            let required = [
                ("tag", input.tag.as_str()),
                ("col_chrom", input.col_chrom.as_str()),
                ("col_pos", input.col_pos.as_str()),
                ("col_ref", input.col_ref.as_str()),
                ("col_alt", input.col_alt.as_str()),
                ("col_pval", input.col_pval.as_str()),
                ("col_beta", input.col_beta.as_str()),
                ("col_sebeta", input.col_sebeta.as_str()),
                ("col_af", input.col_af.as_str()),
            ];
            if input.filepath.as_os_str().is_empty() {
                return Err(ConfigError::MissingKey {
                    field: "filepath",
                    index,
                    section: "inputs",
                });
            }
            for (field, value) in required {
                if value.is_empty() {
                    return Err(ConfigError::MissingKey {
                        field,
                        index,
                        section: "inputs",
                    });
                }
            }

            if !(input.pval_threshold.is_finite() && input.pval_threshold > 0.0) {
                return Err(ConfigError::InvalidThreshold {
                    index,
                    value: input.pval_threshold,
                });
            }

            if !input_tags.insert(input.tag.as_str()) {
                return Err(ConfigError::DuplicateTag {
                    tag: input.tag.clone(),
                    section: "inputs",
                });
            }
        }

        let tests = self
            .heterogeneity_tests
            .ok_or(ConfigError::MissingSection("heterogeneity_tests"))?;

        let mut test_tags = HashSet::new();
        for (index, test) in tests.iter().enumerate() {
            if test.tag.is_empty() {
                return Err(ConfigError::MissingKey {
                    field: "tag",
                    index,
                    section: "heterogeneity_tests",
                });
            }
            if !test_tags.insert(test.tag.as_str()) {
                return Err(ConfigError::DuplicateTag {
                    tag: test.tag.clone(),
                    section: "heterogeneity_tests",
                });
            }
            if test.compare.len() < 2 {
                return Err(ConfigError::TooFewDatasets {
                    tag: test.tag.clone(),
                    compare: test.compare.clone(),
                });
            }
            let mut compared = HashSet::new();
            if let Some(repeated) = test.compare.iter().find(|t| !compared.insert(t.as_str())) {
                return Err(ConfigError::DuplicateTag {
                    tag: repeated.clone(),
                    section: "heterogeneity_tests.compare",
                });
            }
            if let Some(unknown) = test.compare.iter().find(|t| !input_tags.contains(t.as_str())) {
                return Err(ConfigError::UnknownTag {
                    test: test.tag.clone(),
                    tag: unknown.clone(),
                });
            }
        }

        debug!(
            "Configuration valid: {} inputs, {} heterogeneity tests",
            inputs.len(),
            tests.len()
        );

        Ok(ValidatedConfig {
            inputs,
            heterogeneity_tests: tests,
        })
    }
}
