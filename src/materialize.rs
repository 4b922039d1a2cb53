//! Edge materialization: one edge resource per resolved connection.

#![forbid(unsafe_code)]

use crate::contract::{assert_invariant, EDGES_MATCH_CONNECTIONS};
use crate::edge::{Edge, CONFIG_DEPENDENCY};
use crate::error::Result;
use crate::pipeline::Pipeline;
use std::cell::RefCell;
use std::rc::Rc;
use tracing::trace;

/// Base edge configuration block.
pub(crate) const CONFIG_EDGE: &str = "_edge";
/// Edge overrides keyed by downstream port type.
pub(crate) const CONFIG_EDGE_TYPE: &str = "_edge_by_type";
/// Edge overrides keyed by endpoint address.
pub(crate) const CONFIG_EDGE_CONN: &str = "_edge_by_conn";

impl Pipeline {
    /// Build an edge for every resolved connection and bind it to its two
    /// endpoint processes.
    ///
    /// Each edge's configuration is layered: the base `_edge` block, then
    /// `_edge_by_type` by downstream port type, then `_edge_by_conn` by
    /// upstream address and by downstream address. The `dependency` key is
    /// derived from the downstream port's flags and locked.
    pub(crate) fn materialize_edges(&mut self) -> Result<()> {
        let count = self.book.resolved.len();

        for i in 0..count {
            let connection = self.book.resolved[i].clone();

            let up_proc = self.process_by_name(&connection.upstream.name)?;
            let down_proc = self.process_by_name(&connection.downstream.name)?;

            let down_info = down_proc
                .borrow()
                .input_port_info(&connection.downstream.port)?;

            let mut edge_config = self.config.subblock(CONFIG_EDGE);

            edge_config.merge(
                self.config
                    .subblock(CONFIG_EDGE_TYPE)
                    .subblock(&down_info.port_type.to_string()),
            );

            let conn_config = self.config.subblock(CONFIG_EDGE_CONN);
            edge_config.merge(conn_config.subblock(&connection.upstream.to_string()));
            edge_config.merge(conn_config.subblock(&connection.downstream.to_string()));

            edge_config.set_value(
                CONFIG_DEPENDENCY,
                if down_info.flags.input_nodep {
                    "false"
                } else {
                    "true"
                },
            );
            edge_config.mark_read_only(CONFIG_DEPENDENCY);

            trace!(%connection, index = i, "materializing edge");

            let edge = Rc::new(RefCell::new(Edge::new(edge_config)));
            self.edges.insert(i, edge.clone());

            up_proc
                .borrow_mut()
                .connect_output_port(&connection.upstream.port, edge.clone())?;
            down_proc
                .borrow_mut()
                .connect_input_port(&connection.downstream.port, edge.clone())?;

            edge.borrow_mut().set_upstream_process(&up_proc);
            edge.borrow_mut().set_downstream_process(&down_proc);
        }

        assert_invariant(
            EDGES_MATCH_CONNECTIONS,
            self.edges.len() == self.book.resolved.len(),
            "One edge per resolved connection",
            Some("materialize_edges"),
        );

        Ok(())
    }
}
