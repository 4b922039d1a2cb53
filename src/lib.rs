//! # Conflux
//!
//! A declarative dataflow pipeline assembly engine: describe *processes*
//! (computation nodes) and *connections* (typed port-to-port links), then
//! validate, resolve, and materialize the description into a runnable graph
//! of edges.
//!
//! ## Architecture
//!
//! The core flow is: **Declare → Setup → Run**.
//!
//! - **Declare**: register processes and clusters, connect their ports.
//! - **Setup**: [`pipeline::Pipeline::setup_pipeline`] flattens clusters,
//!   resolves under-specified port types to a fixed point, checks the
//!   structure, materializes one edge per resolved connection, and assigns
//!   consistent core frequencies.
//! - **Run**: `start`/`stop` gate the external execution phase; the core
//!   never moves data itself.
//!
//! ## Invariants
//!
//! - Process and cluster names are unique across the whole registry.
//! - After setup, no resolved connection touches a cluster and every
//!   deferred list is empty.
//! - The dependency graph (excluding opted-out edges) is a DAG.
//! - Connected port frequencies are mutually consistent.
//!
//! ## Example
//!
//! ```rust
//! use conflux::config::ConfigBlock;
//! use conflux::pipeline::Pipeline;
//! use conflux::port::{PortFlags, PortInfo, PortType};
//! use conflux::process::Node;
//! use conflux::rational::Rational;
//! use conflux::testing::StubProcess;
//!
//! let source = StubProcess::new("source")
//!     .output("out", PortInfo::new(PortType::concrete("int")))
//!     .handle();
//! let sink = StubProcess::new("sink")
//!     .input(
//!         "in",
//!         PortInfo::new(PortType::concrete("int")).with_flags(PortFlags::REQUIRED),
//!     )
//!     .handle();
//!
//! let mut pipeline = Pipeline::new(ConfigBlock::new());
//! pipeline.add_process(Node::process(source.clone())).unwrap();
//! pipeline.add_process(Node::process(sink.clone())).unwrap();
//! pipeline.connect("source", "out", "sink", "in").unwrap();
//!
//! pipeline.setup_pipeline().unwrap();
//!
//! assert!(pipeline.setup_successful());
//! assert_eq!(source.borrow().core_frequency(), Some(Rational::ONE));
//! ```

pub mod check;
pub mod config;
pub mod contract;
pub mod edge;
pub mod error;
pub mod flatten;
pub mod frequency;
pub mod materialize;
pub mod pipeline;
pub mod port;
pub mod process;
pub mod propagate;
pub mod rational;
pub mod testing;
