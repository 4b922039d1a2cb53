//! The edge resource created per resolved connection.

#![forbid(unsafe_code)]

use crate::config::ConfigBlock;
use crate::process::{Process, ProcessHandle};
use std::cell::RefCell;
use std::rc::{Rc, Weak};

/// Shared handle to an edge. Edges are created by the builder and shared
/// with their two endpoint processes.
pub type EdgeHandle = Rc<RefCell<Edge>>;

/// Configuration key deciding whether the edge imposes dependency order.
pub const CONFIG_DEPENDENCY: &str = "dependency";

/// The runtime channel between two connected ports.
///
/// The core only constructs and binds edges; it never moves data through
/// them. Endpoint references are weak so the process -> edge -> process
/// loop cannot leak.
pub struct Edge {
    config: ConfigBlock,
    dependency: bool,
    upstream: Option<Weak<RefCell<dyn Process>>>,
    downstream: Option<Weak<RefCell<dyn Process>>>,
}

impl Edge {
    /// Build an edge from its merged configuration sub-block.
    pub fn new(config: ConfigBlock) -> Edge {
        let dependency = config.get(CONFIG_DEPENDENCY) != Some("false");
        Edge {
            config,
            dependency,
            upstream: None,
            downstream: None,
        }
    }

    /// Whether this edge participates in the dependency order.
    pub fn makes_dependency(&self) -> bool {
        self.dependency
    }

    /// The configuration the edge was built from.
    pub fn config(&self) -> &ConfigBlock {
        &self.config
    }

    /// Record the process feeding this edge.
    pub fn set_upstream_process(&mut self, process: &ProcessHandle) {
        self.upstream = Some(Rc::downgrade(process));
    }

    /// Record the process consuming from this edge.
    pub fn set_downstream_process(&mut self, process: &ProcessHandle) {
        self.downstream = Some(Rc::downgrade(process));
    }

    /// The process feeding this edge, if still alive.
    pub fn upstream_process(&self) -> Option<ProcessHandle> {
        self.upstream.as_ref().and_then(Weak::upgrade)
    }

    /// The process consuming from this edge, if still alive.
    pub fn downstream_process(&self) -> Option<ProcessHandle> {
        self.downstream.as_ref().and_then(Weak::upgrade)
    }
}

impl std::fmt::Debug for Edge {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("Edge")
            .field("dependency", &self.dependency)
            .field("config", &self.config)
            .finish()
    }
}
