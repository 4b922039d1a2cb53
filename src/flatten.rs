//! Cluster flattening: rewrite cluster-port connections onto real processes.

#![forbid(unsafe_code)]

use crate::contract::{assert_invariant, CLUSTERS_FULLY_FLATTENED};
use crate::error::{PipelineError, Result};
use crate::pipeline::{ClusterSide, Pipeline};
use crate::port::Connection;
use std::mem;
use tracing::trace;

impl Pipeline {
    /// Rewrite every connection that terminates on a cluster port into
    /// connections against the underlying process ports.
    ///
    /// Mapped internals may themselves be cluster ports, so the pass loops
    /// over an explicit worklist until nothing cluster-pending remains.
    pub(crate) fn flatten_clusters(&mut self) -> Result<()> {
        while !self.book.cluster_pending.is_empty() {
            let pending = mem::take(&mut self.book.cluster_pending);

            for (connection, side) in pending {
                trace!(%connection, ?side, "flattening cluster connection");
                match side {
                    ClusterSide::Upstream => self.flatten_upstream(connection)?,
                    ClusterSide::Downstream => self.flatten_downstream(connection)?,
                }
            }
        }

        assert_invariant(
            CLUSTERS_FULLY_FLATTENED,
            self.book.cluster_pending.is_empty(),
            "No cluster connection left pending",
            Some("flatten_clusters"),
        );

        Ok(())
    }

    /// `cluster.port -> process.port`: exactly one output mapping may name
    /// the external port; replace the connection with its internal source.
    fn flatten_upstream(&mut self, connection: Connection) -> Result<()> {
        let cluster_addr = &connection.upstream;
        let cluster = self.cluster_by_name(&cluster_addr.name)?;

        let mut mappings: Vec<Connection> = cluster
            .borrow()
            .output_mappings()
            .into_iter()
            .filter(|mapping| mapping.downstream == *cluster_addr)
            .collect();

        if mappings.is_empty() {
            return Err(PipelineError::NoSuchPort {
                name: cluster_addr.name.clone(),
                port: cluster_addr.port.clone(),
            });
        }
        if mappings.len() != 1 {
            return Err(PipelineError::internal(
                "failed to ensure that only one output mapping is allowed on a cluster port",
            ));
        }

        let mapping = mappings.remove(0);
        self.connect_inner(Connection {
            upstream: mapping.upstream,
            downstream: connection.downstream,
        })
    }

    /// `process.port -> cluster.port`: every matching input mapping is
    /// expanded, so fan-out is permitted on the input side.
    fn flatten_downstream(&mut self, connection: Connection) -> Result<()> {
        let cluster_addr = &connection.downstream;
        let cluster = self.cluster_by_name(&cluster_addr.name)?;

        let mappings: Vec<Connection> = cluster
            .borrow()
            .input_mappings()
            .into_iter()
            .filter(|mapping| mapping.upstream == *cluster_addr)
            .collect();

        if mappings.is_empty() {
            return Err(PipelineError::NoSuchPort {
                name: cluster_addr.name.clone(),
                port: cluster_addr.port.clone(),
            });
        }

        for mapping in mappings {
            self.connect_inner(Connection {
                upstream: connection.upstream.clone(),
                downstream: mapping.downstream,
            })?;
        }

        Ok(())
    }
}
