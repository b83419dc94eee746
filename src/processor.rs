// ==============================================================================
// processor.rs - Multi-Dataset Merge Pipeline
// ==============================================================================
// Description: Selects variants below per-dataset p-value thresholds, collects
//              their statistics from every dataset, merges fine-mapping results
//              and writes the combined table with meta-analysis columns
// Created: 2026-10-16
// Modified: 2026-10-16
// Version: 1.0.0
// ==============================================================================
// Phases (each one is a barrier, the next starts once the previous map is built):
//   1. Selection    one worker per dataset -> keys with p < threshold -> HashSet
//   2. Statistics   one worker per dataset -> rows with selected keys  -> VariantTable
//   3. Fine-mapping one worker per dataset with a fine-mapping file     -> Vec<FineMapRow>
//   4. Combine      fine-mapping rows applied to existing entries only
//   5. Output       heterogeneity tests per variant + TSV
// ==============================================================================

use anyhow::{anyhow, Context, Result};
use std::collections::HashSet;
use std::path::{Path, PathBuf};
use std::sync::Arc;
use tokio::sync::mpsc;
use tokio::task::JoinSet;
use tracing::{debug, info, warn};

use crate::config::{DatasetConfig, ValidatedConfig};
use crate::models::{FineMapRow, FinemapMatch, SummaryRow, VariantKey, VariantTable};
use crate::output;
use crate::parsers::{parse_float_na, FinemapReader, SummaryStatsReader};

/// Rows buffered between dataset workers and the coordinator
const CHANNEL_CAPACITY: usize = 1024;

pub struct MergeProcessor {
    config: ValidatedConfig,
    output_path: PathBuf,
}

impl MergeProcessor {
    pub fn new(config: ValidatedConfig, output_path: PathBuf) -> Self {
        Self {
            config,
            output_path,
        }
    }

    /// Main processing pipeline
    pub async fn process(&self) -> Result<PathBuf> {
        let inputs = &self.config.inputs;
        info!(
            "Merging {} summary statistics files ({} heterogeneity tests)",
            inputs.len(),
            self.config.heterogeneity_tests.len()
        );

        info!("[1/5] Checking variant selection...");
        let selected = Arc::new(select_variants(inputs).await?);
        info!("Selected {} variants", selected.len());

        info!("[2/5] Getting variant statistics...");
        let mut table = collect_stats(inputs, Arc::clone(&selected)).await?;
        info!("Collected statistics for {} variants", table.len());

        info!("[3/5] Getting variant fine-mapping statistics...");
        let finemap_rows = collect_finemapping(inputs, Arc::clone(&selected)).await?;

        info!("[4/5] Combining variant GWAS statistics and fine-mapping statistics...");
        let applied = combine_finemapping(&mut table, finemap_rows);
        debug!("Attached fine-mapping results to {} dataset entries", applied);

        info!(
            "[5/5] Computing heterogeneity tests & writing output to {} ...",
            self.output_path.display()
        );
        let written = output::write_table(&self.output_path, &self.config, &table)
            .with_context(|| format!("Failed to write output {}", self.output_path.display()))?;

        info!("Wrote {} variants to {}", written, self.output_path.display());
        Ok(self.output_path.clone())
    }
}

/// Phase 1: every variant with p-value strictly below its dataset's threshold
///
/// A variant is selected if any one dataset passes it; `NA` p-values never do.
pub async fn select_variants(inputs: &[DatasetConfig]) -> Result<HashSet<VariantKey>> {
    let mut selected = HashSet::new();

    fan_in(inputs.to_vec(), stream_variants_below_threshold, |key| {
        selected.insert(key);
    })
    .await?;

    Ok(selected)
}

/// Phase 2: full rows for selected variants, grouped by variant
///
/// Reads each input again from the start. Only the coordinating task
/// writes to the table.
pub async fn collect_stats(
    inputs: &[DatasetConfig],
    selected: Arc<HashSet<VariantKey>>,
) -> Result<VariantTable> {
    let mut table = VariantTable::new();
    let mut duplicates = 0usize;

    fan_in(
        inputs.to_vec(),
        move |conf, tx| stream_rows_from_selection(&conf, &selected, tx),
        |row| {
            if !table.insert_summary(row) {
                duplicates += 1;
            }
        },
    )
    .await?;

    if duplicates > 0 {
        warn!(
            "Ignored {} duplicate rows (same dataset and variant seen twice)",
            duplicates
        );
    }

    Ok(table)
}

/// Phase 3: fine-mapping rows for selected variants
///
/// Only datasets with a configured fine-mapping file take part.
pub async fn collect_finemapping(
    inputs: &[DatasetConfig],
    selected: Arc<HashSet<VariantKey>>,
) -> Result<Vec<FineMapRow>> {
    let with_finemap: Vec<(String, PathBuf)> = inputs
        .iter()
        .filter_map(|conf| {
            conf.finemap_filepath
                .as_ref()
                .map(|path| (conf.tag.clone(), path.clone()))
        })
        .collect();

    if with_finemap.is_empty() {
        debug!("No fine-mapping files configured");
        return Ok(Vec::new());
    }

    let mut rows = Vec::new();
    fan_in(
        with_finemap,
        move |(tag, path), tx| stream_finemap_rows(&tag, &path, &selected, tx),
        |row| rows.push(row),
    )
    .await?;

    Ok(rows)
}

/// Phase 4: attach fine-mapping values to existing (dataset, variant) entries
///
/// Rows without a matching entry are dropped. When a file lists the same
/// variant twice the first row wins. Returns how many entries were updated.
pub fn combine_finemapping(table: &mut VariantTable, rows: Vec<FineMapRow>) -> usize {
    let mut applied = 0usize;
    let mut unmatched = 0usize;
    let mut repeated = 0usize;

    for row in rows {
        match table.apply_finemap(row) {
            FinemapMatch::Applied => applied += 1,
            FinemapMatch::NoEntry => unmatched += 1,
            FinemapMatch::AlreadyApplied => repeated += 1,
        }
    }

    if unmatched > 0 {
        debug!(
            "Dropped {} fine-mapping rows with no matching dataset entry",
            unmatched
        );
    }
    if repeated > 0 {
        debug!(
            "Ignored {} repeated fine-mapping rows (first row per variant kept)",
            repeated
        );
    }
    applied
}

/// Run one blocking worker per item and feed everything they send to `accumulate`
///
/// Returns once every worker has finished and the channel is drained. The
/// first worker error is returned immediately; dropping the receiver makes
/// the remaining workers stop at their next send.
async fn fan_in<I, T, W, A>(items: Vec<I>, worker: W, mut accumulate: A) -> Result<()>
where
    I: Send + 'static,
    T: Send + 'static,
    W: Fn(I, &mpsc::Sender<T>) -> Result<()> + Send + Sync + 'static,
    A: FnMut(T),
{
    let (tx, mut rx) = mpsc::channel::<T>(CHANNEL_CAPACITY);
    let worker = Arc::new(worker);

    let mut workers = JoinSet::new();
    for item in items {
        let tx = tx.clone();
        let worker = Arc::clone(&worker);
        workers.spawn_blocking(move || worker(item, &tx));
    }
    drop(tx);

    let mut channel_open = true;
    let mut workers_running = true;
    while channel_open || workers_running {
        tokio::select! {
            received = rx.recv(), if channel_open => match received {
                Some(value) => accumulate(value),
                None => channel_open = false,
            },
            joined = workers.join_next(), if workers_running => match joined {
                Some(result) => result.context("Dataset worker panicked")??,
                None => workers_running = false,
            },
        }
    }

    Ok(())
}

fn send<T>(tx: &mpsc::Sender<T>, value: T) -> Result<()> {
    tx.blocking_send(value)
        .map_err(|_| anyhow!("Result channel closed, pipeline aborted"))
}

fn open_summary_stats(conf: &DatasetConfig) -> Result<SummaryStatsReader> {
    SummaryStatsReader::open(conf).with_context(|| {
        format!(
            "Failed to open summary statistics for `{}` ({})",
            conf.tag,
            conf.filepath.display()
        )
    })
}

/// Dataset tag and file, for worker error contexts
fn describe(reader: &SummaryStatsReader) -> String {
    format!("`{}` ({})", reader.tag(), reader.path().display())
}

/// Selection worker: send the key of every row below the dataset's threshold
fn stream_variants_below_threshold(
    conf: DatasetConfig,
    tx: &mpsc::Sender<VariantKey>,
) -> Result<()> {
    info!("- processing {}", conf.tag);

    let reader = open_summary_stats(&conf)?;
    let source = describe(&reader);

    let mut scanned = 0usize;
    let mut passed = 0usize;
    for row in reader {
        let row = row.with_context(|| format!("Failed to read summary statistics for {}", source))?;
        scanned += 1;

        let pval = parse_float_na(&row.pval).with_context(|| {
            format!(
                "Failed to parse p-value as float for {} at variant {}",
                source, row.key
            )
        })?;

        if pval < conf.pval_threshold {
            passed += 1;
            send(tx, row.key)?;
        }
    }

    info!(
        "* done {} ({} of {} variants with p < {:e})",
        conf.tag, passed, scanned, conf.pval_threshold
    );
    Ok(())
}

/// Statistics worker: send every row whose key was selected
fn stream_rows_from_selection(
    conf: &DatasetConfig,
    selected: &HashSet<VariantKey>,
    tx: &mpsc::Sender<SummaryRow>,
) -> Result<()> {
    info!("- processing {}", conf.tag);

    let reader = open_summary_stats(conf)?;
    let source = describe(&reader);

    let mut kept = 0usize;
    for row in reader {
        let row = row.with_context(|| format!("Failed to read summary statistics for {}", source))?;
        if selected.contains(&row.key) {
            kept += 1;
            send(tx, row)?;
        }
    }

    info!("* done {} ({} selected variants present)", conf.tag, kept);
    Ok(())
}

/// Fine-mapping worker: send rows whose key was selected
fn stream_finemap_rows(
    tag: &str,
    path: &Path,
    selected: &HashSet<VariantKey>,
    tx: &mpsc::Sender<FineMapRow>,
) -> Result<()> {
    info!("- processing {} fine-mapping", tag);

    let reader = FinemapReader::open(tag, path).with_context(|| {
        format!("Failed to open fine-mapping file for `{}` ({})", tag, path.display())
    })?;

    let source = format!("`{}` ({})", tag, reader.path().display());

    let mut kept = 0usize;
    for row in reader {
        let row = row.with_context(|| format!("Failed to read fine-mapping file for {}", source))?;
        if selected.contains(&row.key) {
            kept += 1;
            send(tx, row)?;
        }
    }

    info!("* done {} fine-mapping ({} selected variants present)", tag, kept);
    Ok(())
}
