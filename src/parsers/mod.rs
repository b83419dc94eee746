// ==============================================================================
// parsers/mod.rs - File parser modules
// ==============================================================================
// Description: Parsers for summary statistics and fine-mapping files
// Created: 2026-10-16
// Modified: 2026-10-16
// Version: 1.0.0
// ==============================================================================

pub mod tsv;
pub mod sumstats;
pub mod finemap;

pub use tsv::{Compression, TsvError, TsvReader};
pub use sumstats::{parse_float_na, SummaryStatsReader, ValueError};
pub use finemap::{parse_variant_key, FinemapParseError, FinemapReader};
