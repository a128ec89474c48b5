//! Core types for the paperdex retrieval service
//!
//! This crate provides the foundational types used across all other crates:
//! - Ranked result types shared by every retrieval mode
//! - The structured benchmark record produced by extraction

pub mod result;

pub use result::{BenchmarkResult, ScoredDoc};
