use std::io::Read;
use std::path::PathBuf;

use csv::{ReaderBuilder, StringRecord};
use serde::Serialize;
use thiserror::Error;
use tracing::{debug, info};

use crate::error::GraphError;
use crate::storage::BipartiteGraph;

/// Column layout of an edge-event CSV file.
#[derive(Debug, Clone)]
pub struct EdgeImportConfig {
    /// Path to the CSV file.
    pub path: PathBuf,
    /// Left node id column.
    pub left_column: String,
    /// Right node id column.
    pub right_column: String,
    /// Edge type column; rows use `default_type` when absent or empty.
    pub type_column: Option<String>,
    /// Timestamp column; rows use their 0-based row number when absent or empty.
    pub timestamp_column: Option<String>,
    /// Edge type for rows without one.
    pub default_type: u8,
    /// Count capacity and encoding rejections instead of stopping at the first one.
    pub skip_rejected: bool,
}

impl EdgeImportConfig {
    /// Layout `left,right,type,timestamp` read from `path`.
    pub fn new(path: impl Into<PathBuf>) -> Self {
        Self {
            path: path.into(),
            left_column: "left".into(),
            right_column: "right".into(),
            type_column: Some("type".into()),
            timestamp_column: Some("timestamp".into()),
            default_type: 0,
            skip_rejected: false,
        }
    }
}

/// Counts from one import.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize)]
pub struct ImportSummary {
    /// Data rows read.
    pub rows: u64,
    /// Edges accepted by the graph.
    pub edges_imported: u64,
    /// Edges the graph rejected (only with `skip_rejected`).
    pub edges_rejected: u64,
}

/// Error type for CLI operations.
#[derive(Error, Debug)]
pub enum CliError {
    /// Generic error message.
    #[error("{0}")]
    Message(String),
    /// IO error from file operations.
    #[error(transparent)]
    Io(#[from] std::io::Error),
    /// CSV parsing error.
    #[error(transparent)]
    Csv(#[from] csv::Error),
    /// JSON output error.
    #[error(transparent)]
    Json(#[from] serde_json::Error),
    /// Graph or query error.
    #[error(transparent)]
    Graph(#[from] GraphError),
}

impl From<String> for CliError {
    fn from(value: String) -> Self {
        CliError::Message(value)
    }
}

struct Columns {
    left: usize,
    right: usize,
    edge_type: Option<usize>,
    timestamp: Option<usize>,
}

fn find_column(headers: &StringRecord, name: &str) -> Result<usize, CliError> {
    headers
        .iter()
        .position(|h| h.trim() == name)
        .ok_or_else(|| CliError::Message(format!("column '{name}' not found in CSV header")))
}

fn optional_column(headers: &StringRecord, name: &Option<String>) -> Option<usize> {
    name.as_deref()
        .and_then(|name| headers.iter().position(|h| h.trim() == name))
}

fn field<'r>(record: &'r StringRecord, index: Option<usize>) -> Option<&'r str> {
    index
        .and_then(|i| record.get(i))
        .map(str::trim)
        .filter(|s| !s.is_empty())
}

fn parse<T: std::str::FromStr>(raw: &str, what: &str, row: u64) -> Result<T, CliError> {
    raw.parse()
        .map_err(|_| CliError::Message(format!("row {row}: invalid {what} '{raw}'")))
}

/// Streams the CSV file at `cfg.path` into `graph`, one edge per row.
pub fn load_edges(graph: &BipartiteGraph, cfg: &EdgeImportConfig) -> Result<ImportSummary, CliError> {
    let file = std::fs::File::open(&cfg.path)?;
    let summary = load_edges_from_reader(graph, file, cfg)?;
    info!(
        path = %cfg.path.display(),
        rows = summary.rows,
        imported = summary.edges_imported,
        rejected = summary.edges_rejected,
        "cli.import.done"
    );
    Ok(summary)
}

/// Like [`load_edges`] but reads CSV from any reader; `cfg.path` is ignored.
pub fn load_edges_from_reader<R: Read>(
    graph: &BipartiteGraph,
    reader: R,
    cfg: &EdgeImportConfig,
) -> Result<ImportSummary, CliError> {
    let mut reader = ReaderBuilder::new().flexible(true).from_reader(reader);
    let headers = reader.headers()?.clone();
    let columns = Columns {
        left: find_column(&headers, &cfg.left_column)?,
        right: find_column(&headers, &cfg.right_column)?,
        edge_type: optional_column(&headers, &cfg.type_column),
        timestamp: optional_column(&headers, &cfg.timestamp_column),
    };

    let mut summary = ImportSummary::default();
    for result in reader.records() {
        let record = result?;
        let row = summary.rows;
        summary.rows += 1;
        let left: u64 = match field(&record, Some(columns.left)) {
            Some(raw) => parse(raw, "left id", row)?,
            None => return Err(format!("row {row}: missing left id").into()),
        };
        let right: u64 = match field(&record, Some(columns.right)) {
            Some(raw) => parse(raw, "right id", row)?,
            None => return Err(format!("row {row}: missing right id").into()),
        };
        let edge_type: u8 = match field(&record, columns.edge_type) {
            Some(raw) => parse(raw, "edge type", row)?,
            None => cfg.default_type,
        };
        let timestamp: i64 = match field(&record, columns.timestamp) {
            Some(raw) => parse(raw, "timestamp", row)?,
            None => row as i64,
        };
        match graph.add_edge(left, right, edge_type, timestamp) {
            Ok(()) => summary.edges_imported += 1,
            Err(err) if cfg.skip_rejected && !matches!(err, GraphError::Configuration(_)) => {
                debug!(row, error = %err, "cli.import.rejected");
                summary.edges_rejected += 1;
            }
            Err(err) => return Err(CliError::Message(format!("row {row}: {err}"))),
        }
    }
    Ok(summary)
}
