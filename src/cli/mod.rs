#![forbid(unsafe_code)]

//! Command-line support: loading edge-event streams from CSV.

/// Edge-stream import into a [`crate::storage::BipartiteGraph`].
pub mod import;

pub use import::{load_edges, load_edges_from_reader, CliError, EdgeImportConfig, ImportSummary};
