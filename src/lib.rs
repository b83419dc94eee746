// ==============================================================================
// lib.rs - Summary Statistics Merger Library
// ==============================================================================
// Description: Library interface for merging GWAS summary statistics with
//              fine-mapping results and meta-analysis
// Created: 2026-10-16
// Modified: 2026-10-16
// Version: 1.0.0
// ==============================================================================

pub mod config;
pub mod parsers;
pub mod models;
pub mod meta;
pub mod processor;
pub mod output;
