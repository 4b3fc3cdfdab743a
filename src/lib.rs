//! Real-time bipartite graph store with personalized SALSA recommendations.
//!
//! [`storage`] holds the concurrent, segmented edge store; [`salsa`] runs
//! random-walk queries over immutable snapshots of it.
//!
//! ```
//! use walkrank::salsa::{SalsaEngine, SalsaRequest};
//! use walkrank::storage::{BipartiteGraph, GraphOptions};
//!
//! let graph = BipartiteGraph::new(GraphOptions::new().max_nodes_per_segment(1024))?;
//! graph.add_edge(1, 100, 0, 10)?;
//! graph.add_edge(1, 101, 0, 11)?;
//!
//! let request = SalsaRequest::builder(1).max_random_walk_length(3).build()?;
//! let results = SalsaEngine::for_graph(&graph).recommend(&graph.snapshot(), &request)?;
//! assert_eq!(results.len(), 2);
//! # Ok::<(), walkrank::GraphError>(())
//! ```

#![warn(missing_docs)]

pub mod cli;
pub mod error;
pub mod salsa;
pub mod storage;

pub use error::{GraphError, Result};
