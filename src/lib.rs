//! # SF Toplists
//!
//! Offline batch pipeline that turns raw Shakes & Fidget player and guild
//! snapshots into precomputed toplist pages.
//!
//! ## Architecture
//!
//! - **models**: Core data structures (scopes, derived records, compact indexes, pages)
//! - **normalize**: Numeric coercion, server parsing, field aliases, class table
//! - **storage**: Document store abstraction (filesystem and in-memory backends)
//! - **pipeline**: Player derivation, guild averages, compact indexer, page builder
//! - **config**: Configuration loading and validation

pub mod config;
pub mod models;
pub mod normalize;
pub mod pipeline;
pub mod storage;

pub use models::*;
