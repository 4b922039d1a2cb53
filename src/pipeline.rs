//! The pipeline builder: registry, connection book, and lifecycle.

#![forbid(unsafe_code)]

use crate::config::ConfigBlock;
use crate::contract::{assert_invariant, BOOK_REJECTS_INVALID, REGISTRY_UNIQUE_NAMES};
use crate::edge::EdgeHandle;
use crate::error::{PipelineError, Result};
use crate::port::{Connection, Name, PortAddr, PortFlags, PortType};
use crate::process::{ClusterHandle, Node, ProcessHandle};
use std::collections::{BTreeMap, BTreeSet};
use tracing::debug;

/// Which side of a pending connection names a cluster.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub(crate) enum ClusterSide {
    Upstream,
    Downstream,
}

/// Which endpoint a deferred concrete type will be pushed into.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub(crate) enum PinDirection {
    PushUpstream,
    PushDownstream,
}

/// Verdict of the type-check kernel for one candidate connection.
#[derive(Debug, Clone, PartialEq, Eq)]
pub(crate) enum TypeDecision {
    /// Upstream type is decided during the upstream process's configure.
    DataDependent,
    /// Both endpoints are flow-dependent; wait for a concrete neighbor.
    UntypedFlow,
    /// One endpoint is flow-dependent; pin the far type onto it later.
    Pin(PinDirection),
    /// Concrete types differ.
    Mismatch,
    /// The connection can be resolved now.
    Compatible,
}

/// Classify a candidate connection by its two port types.
pub(crate) fn decide_types(up_type: &PortType, down_type: &PortType) -> TypeDecision {
    if *up_type == PortType::DataDependent {
        return TypeDecision::DataDependent;
    }

    match (up_type.is_flow_dependent(), down_type.is_flow_dependent()) {
        (true, true) => return TypeDecision::UntypedFlow,
        (true, false) => return TypeDecision::Pin(PinDirection::PushUpstream),
        (false, true) => return TypeDecision::Pin(PinDirection::PushDownstream),
        (false, false) => {}
    }

    if *up_type != PortType::Any && *down_type != PortType::Any && up_type != down_type {
        return TypeDecision::Mismatch;
    }

    TypeDecision::Compatible
}

/// A connection is rejected iff the upstream data is immutable and the
/// downstream consumer requires mutable data.
pub(crate) fn flags_compatible(up_flags: &PortFlags, down_flags: &PortFlags) -> bool {
    !(up_flags.output_const && down_flags.input_mutable)
}

/// Every connection the builder knows about, split by resolution state.
///
/// *planned* records user intent and survives reset; *resolved* is what the
/// setup passes have fully typed; the remaining lists are deferred work the
/// passes drain.
#[derive(Debug, Default)]
pub(crate) struct ConnectionBook {
    pub(crate) planned: Vec<Connection>,
    pub(crate) resolved: Vec<Connection>,
    pub(crate) data_dep: Vec<Connection>,
    pub(crate) untyped: Vec<Connection>,
    pub(crate) pinnings: Vec<(Connection, PinDirection)>,
    pub(crate) cluster_pending: Vec<(Connection, ClusterSide)>,
}

impl ConnectionBook {
    /// Drop every connection touching `name` from every list.
    fn purge_name(&mut self, name: &str) {
        self.planned.retain(|c| !c.touches(name));
        self.resolved.retain(|c| !c.touches(name));
        self.data_dep.retain(|c| !c.touches(name));
        self.untyped.retain(|c| !c.touches(name));
        self.pinnings.retain(|(c, _)| !c.touches(name));
        self.cluster_pending.retain(|(c, _)| !c.touches(name));
    }

    /// Drop the exact connection from every list.
    fn forget(&mut self, connection: &Connection) {
        self.planned.retain(|c| c != connection);
        self.resolved.retain(|c| c != connection);
        self.data_dep.retain(|c| c != connection);
        self.untyped.retain(|c| c != connection);
        self.pinnings.retain(|(c, _)| c != connection);
        self.cluster_pending.retain(|(c, _)| c != connection);
    }

    /// Clear everything derived from *planned* (setup output and deferred
    /// work), keeping *planned* itself.
    fn clear_derived(&mut self) {
        self.resolved.clear();
        self.data_dep.clear();
        self.untyped.clear();
        self.pinnings.clear();
        self.cluster_pending.clear();
    }
}

/// Builder lifecycle states.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub(crate) enum State {
    Unconfigured,
    SetupInProgress,
    Ready,
    Failed,
    Running,
}

/// The pipeline builder.
///
/// Owns the registry of processes and clusters, the connection book, and
/// the edge map. Single-threaded and cooperative: callers serialize access
/// externally, and `setup_pipeline` runs to completion or failure
/// synchronously.
pub struct Pipeline {
    pub(crate) config: ConfigBlock,
    pub(crate) nodes: BTreeMap<Name, Node>,
    pub(crate) parents: BTreeMap<Name, Option<Name>>,
    pub(crate) parent_stack: Vec<Name>,
    pub(crate) book: ConnectionBook,
    pub(crate) edges: BTreeMap<usize, EdgeHandle>,
    pub(crate) state: State,
}

impl Pipeline {
    /// Create a builder over a pipeline configuration.
    pub fn new(config: ConfigBlock) -> Pipeline {
        Pipeline {
            config,
            nodes: BTreeMap::new(),
            parents: BTreeMap::new(),
            parent_stack: Vec::new(),
            book: ConnectionBook::default(),
            edges: BTreeMap::new(),
            state: State::Unconfigured,
        }
    }

    /// Register a process or a cluster.
    ///
    /// A cluster addition cascades: the cluster itself, all its children
    /// (recursively; children record the cluster as their parent), and its
    /// internal connections. The cascade is best-effort: a failure partway
    /// leaves the already-added children registered.
    pub fn add_process(&mut self, node: Node) -> Result<()> {
        let name = node.name();

        if self.state != State::Unconfigured {
            return Err(PipelineError::AddAfterSetup { name });
        }

        if self.nodes.contains_key(&name) {
            assert_invariant(
                REGISTRY_UNIQUE_NAMES,
                self.nodes.contains_key(&name),
                "Duplicate name rejected",
                Some("add_process"),
            );
            return Err(PipelineError::DuplicateName { name });
        }

        let parent = self.parent_stack.last().cloned();

        let cluster_handle: Option<ClusterHandle> = match &node {
            Node::Cluster(cluster) => Some(cluster.clone()),
            Node::Process(_) => None,
        };

        self.nodes.insert(name.clone(), node);
        self.parents.insert(name.clone(), parent);

        match cluster_handle {
            Some(cluster) => {
                self.parent_stack.push(name);
                let outcome = self.add_cluster_members(&cluster);
                self.parent_stack.pop();
                outcome
            }
            None => Ok(()),
        }
    }

    fn add_cluster_members(&mut self, cluster: &ClusterHandle) -> Result<()> {
        let (children, internal) = {
            let cluster = cluster.borrow();
            (cluster.processes(), cluster.internal_connections())
        };

        for child in children {
            self.add_process(child)?;
        }

        for connection in internal {
            self.connect(
                &connection.upstream.name,
                &connection.upstream.port,
                &connection.downstream.name,
                &connection.downstream.port,
            )?;
        }

        Ok(())
    }

    /// Remove a process or cluster by name, purging every connection that
    /// references it. Cluster removal cascades over its children first.
    pub fn remove_process(&mut self, name: &str) -> Result<()> {
        if self.state != State::Unconfigured {
            return Err(PipelineError::RemoveAfterSetup {
                name: name.to_string(),
            });
        }

        match self.nodes.get(name).cloned() {
            Some(Node::Cluster(cluster)) => {
                let children = cluster.borrow().processes();
                for child in children {
                    self.remove_process(&child.name())?;
                }
            }
            Some(Node::Process(_)) => {}
            None => {
                return Err(PipelineError::NoSuchProcess {
                    name: name.to_string(),
                })
            }
        }

        self.nodes.remove(name);
        self.parents.remove(name);
        self.book.purge_name(name);
        Ok(())
    }

    /// Declare a connection from an output port to an input port.
    ///
    /// The connection is recorded as *planned* before validation, so a
    /// rejected connection still replays (and fails again) on reset.
    pub fn connect(
        &mut self,
        upstream_name: &str,
        upstream_port: &str,
        downstream_name: &str,
        downstream_port: &str,
    ) -> Result<()> {
        let connection = Connection::new(
            upstream_name,
            upstream_port,
            downstream_name,
            downstream_port,
        );

        match self.state {
            State::Unconfigured => {
                self.book.planned.push(connection.clone());
                self.connect_inner(connection)
            }
            State::SetupInProgress => self.connect_inner(connection),
            State::Ready | State::Failed | State::Running => {
                Err(PipelineError::ConnectionAfterSetup { connection })
            }
        }
    }

    /// The internal connect path: used by the setup passes and the reset
    /// replay, which must not re-append to *planned*.
    pub(crate) fn connect_inner(&mut self, connection: Connection) -> Result<()> {
        let up_is_cluster = matches!(
            self.nodes.get(&connection.upstream.name),
            Some(Node::Cluster(_))
        );
        let down_is_cluster = matches!(
            self.nodes.get(&connection.downstream.name),
            Some(Node::Cluster(_))
        );

        if up_is_cluster {
            self.book
                .cluster_pending
                .push((connection, ClusterSide::Upstream));
            return Ok(());
        }
        if down_is_cluster {
            self.book
                .cluster_pending
                .push((connection, ClusterSide::Downstream));
            return Ok(());
        }

        let up_proc = self.process_by_name(&connection.upstream.name)?;
        let down_proc = self.process_by_name(&connection.downstream.name)?;

        let up_info = up_proc.borrow().output_port_info(&connection.upstream.port)?;
        let down_info = down_proc
            .borrow()
            .input_port_info(&connection.downstream.port)?;

        if !flags_compatible(&up_info.flags, &down_info.flags) {
            assert_invariant(
                BOOK_REJECTS_INVALID,
                true,
                "Flag mismatch rejected",
                Some("connect"),
            );
            return Err(PipelineError::FlagMismatch { connection });
        }

        match decide_types(&up_info.port_type, &down_info.port_type) {
            TypeDecision::DataDependent => {
                self.book.data_dep.push(connection);
                Ok(())
            }
            TypeDecision::UntypedFlow => {
                self.book.untyped.push(connection);
                Ok(())
            }
            TypeDecision::Pin(direction) => {
                self.book.pinnings.push((connection, direction));
                Ok(())
            }
            TypeDecision::Mismatch => {
                assert_invariant(
                    BOOK_REJECTS_INVALID,
                    true,
                    "Type mismatch rejected",
                    Some("connect"),
                );
                Err(PipelineError::TypeMismatch {
                    connection,
                    up_type: up_info.port_type,
                    down_type: down_info.port_type,
                })
            }
            TypeDecision::Compatible => {
                self.book.resolved.push(connection);
                Ok(())
            }
        }
    }

    /// Remove the exact connection from every list. Only valid before
    /// setup begins.
    pub fn disconnect(
        &mut self,
        upstream_name: &str,
        upstream_port: &str,
        downstream_name: &str,
        downstream_port: &str,
    ) -> Result<()> {
        let connection = Connection::new(
            upstream_name,
            upstream_port,
            downstream_name,
            downstream_port,
        );

        if self.state != State::Unconfigured {
            return Err(PipelineError::DisconnectionAfterSetup { connection });
        }

        self.book.forget(&connection);
        Ok(())
    }

    /// Run the full setup sequence, materializing the runnable graph.
    ///
    /// Pass order is fixed: flatten clusters, configure processes, drain
    /// data-dependent connections, propagate pinned flow types, reject
    /// leftover untyped connections, materialize edges, check required
    /// ports and connectivity, check the DAG, initialize processes, and
    /// solve frequencies. Any failure leaves the builder in the failed
    /// state; process mutations made before the failure are not rolled
    /// back.
    pub fn setup_pipeline(&mut self) -> Result<()> {
        match self.state {
            State::Unconfigured => {}
            _ => return Err(PipelineError::DuplicateSetup),
        }

        if self.process_count() == 0 {
            return Err(PipelineError::NoProcesses);
        }

        // There is no turning back after this: processes are mutated, so
        // adds and removals would compromise the checks below.
        self.state = State::SetupInProgress;

        match self.run_setup_passes() {
            Ok(()) => {
                self.state = State::Ready;
                Ok(())
            }
            Err(err) => {
                self.state = State::Failed;
                Err(err)
            }
        }
    }

    fn run_setup_passes(&mut self) -> Result<()> {
        debug!("flattening cluster connections");
        self.flatten_clusters()?;
        debug!("configuring processes");
        self.configure_processes()?;
        self.check_data_dep_drained()?;
        debug!("propagating pinned flow types");
        self.propagate_pinned_types()?;
        self.check_untyped_drained()?;
        debug!(connections = self.book.resolved.len(), "materializing edges");
        self.materialize_edges()?;
        debug!("checking required ports and connectivity");
        self.check_required_ports()?;
        debug!("checking dependency order");
        self.check_dag()?;
        debug!("initializing processes");
        self.initialize_processes()?;
        debug!("solving core frequencies");
        self.solve_frequencies()?;
        Ok(())
    }

    fn initialize_processes(&mut self) -> Result<()> {
        for name in self.process_names() {
            let proc = self.process_by_name(&name)?;
            proc.borrow_mut().init()?;
        }
        Ok(())
    }

    /// Whether `setup_pipeline` has been entered since the last reset.
    pub fn is_setup(&self) -> bool {
        self.state != State::Unconfigured
    }

    /// Whether the last setup ran to completion.
    pub fn setup_successful(&self) -> bool {
        matches!(self.state, State::Ready | State::Running)
    }

    /// Return every process and the builder to the pre-setup state, then
    /// replay all planned connections.
    pub fn reset(&mut self) -> Result<()> {
        if self.state == State::Running {
            return Err(PipelineError::ResetWhileRunning);
        }

        for name in self.process_names() {
            let proc = self.process_by_name(&name)?;
            proc.borrow_mut().reset();
        }

        self.book.clear_derived();
        self.edges.clear();
        self.state = State::Unconfigured;

        let planned = self.book.planned.clone();
        for connection in planned {
            self.connect_inner(connection)?;
        }

        assert_invariant(
            crate::contract::RESET_REPLAYS_PLANNED,
            true,
            "Planned connections replayed",
            Some("reset"),
        );

        Ok(())
    }

    /// Mark the pipeline running. Requires a successful setup.
    pub fn start(&mut self) -> Result<()> {
        self.ensure_setup()?;
        self.state = State::Running;
        Ok(())
    }

    /// Mark the pipeline stopped again.
    pub fn stop(&mut self) -> Result<()> {
        if self.state != State::Running {
            return Err(PipelineError::internal(
                "start/stop pipeline state tracking failed",
            ));
        }
        self.state = State::Ready;
        Ok(())
    }

    pub(crate) fn ensure_setup(&self) -> Result<()> {
        match self.state {
            State::Unconfigured => Err(PipelineError::PipelineNotSetup),
            State::Failed => Err(PipelineError::PipelineNotReady),
            State::SetupInProgress | State::Ready | State::Running => Ok(()),
        }
    }

    // ---- registry queries -------------------------------------------------

    /// Names of all registered processes, sorted.
    pub fn process_names(&self) -> Vec<Name> {
        self.nodes
            .iter()
            .filter(|(_, node)| matches!(node, Node::Process(_)))
            .map(|(name, _)| name.clone())
            .collect()
    }

    /// Names of all registered clusters, sorted.
    pub fn cluster_names(&self) -> Vec<Name> {
        self.nodes
            .iter()
            .filter(|(_, node)| matches!(node, Node::Cluster(_)))
            .map(|(name, _)| name.clone())
            .collect()
    }

    pub(crate) fn process_count(&self) -> usize {
        self.nodes
            .values()
            .filter(|node| matches!(node, Node::Process(_)))
            .count()
    }

    /// Look up a registered process by name.
    pub fn process_by_name(&self, name: &str) -> Result<ProcessHandle> {
        match self.nodes.get(name) {
            Some(Node::Process(process)) => Ok(process.clone()),
            _ => Err(PipelineError::NoSuchProcess {
                name: name.to_string(),
            }),
        }
    }

    /// Look up a registered cluster by name.
    pub fn cluster_by_name(&self, name: &str) -> Result<ClusterHandle> {
        match self.nodes.get(name) {
            Some(Node::Cluster(cluster)) => Ok(cluster.clone()),
            _ => Err(PipelineError::NoSuchProcess {
                name: name.to_string(),
            }),
        }
    }

    /// The parent cluster of a process or cluster, if it has one.
    pub fn parent_cluster(&self, name: &str) -> Result<Option<Name>> {
        match self.parents.get(name) {
            Some(parent) => Ok(parent.clone()),
            None => Err(PipelineError::NoSuchProcess {
                name: name.to_string(),
            }),
        }
    }

    // ---- planned-connection queries ---------------------------------------

    /// Downstream addresses planned from the given output port.
    pub fn connections_from_addr(&self, name: &str, port: &str) -> Vec<PortAddr> {
        self.book
            .planned
            .iter()
            .filter(|c| c.upstream.name == name && c.upstream.port == port)
            .map(|c| c.downstream.clone())
            .collect()
    }

    /// The upstream address planned into the given input port, if any.
    pub fn connection_to_addr(&self, name: &str, port: &str) -> Option<PortAddr> {
        self.book
            .planned
            .iter()
            .find(|c| c.downstream.name == name && c.downstream.port == port)
            .map(|c| c.upstream.clone())
    }

    // ---- resolved-connection queries --------------------------------------

    /// The resolved connections. Valid inside setup passes, where the list
    /// is still growing.
    pub fn resolved_connections(&self) -> Result<Vec<Connection>> {
        self.ensure_setup()?;
        Ok(self.book.resolved.clone())
    }

    /// All processes feeding the named process.
    pub fn upstream_for_process(&self, name: &str) -> Result<Vec<ProcessHandle>> {
        self.ensure_setup()?;
        let names: BTreeSet<&Name> = self
            .book
            .resolved
            .iter()
            .filter(|c| c.downstream.name == name)
            .map(|c| &c.upstream.name)
            .collect();
        names.into_iter().map(|n| self.process_by_name(n)).collect()
    }

    /// The process feeding the named input port, if connected.
    pub fn upstream_for_port(&self, name: &str, port: &str) -> Result<Option<ProcessHandle>> {
        self.ensure_setup()?;
        match self
            .book
            .resolved
            .iter()
            .find(|c| c.downstream.name == name && c.downstream.port == port)
        {
            Some(connection) => Ok(Some(self.process_by_name(&connection.upstream.name)?)),
            None => Ok(None),
        }
    }

    /// All processes fed by the named process.
    pub fn downstream_for_process(&self, name: &str) -> Result<Vec<ProcessHandle>> {
        self.ensure_setup()?;
        let names: BTreeSet<&Name> = self
            .book
            .resolved
            .iter()
            .filter(|c| c.upstream.name == name)
            .map(|c| &c.downstream.name)
            .collect();
        names.into_iter().map(|n| self.process_by_name(n)).collect()
    }

    /// All processes fed by the named output port.
    pub fn downstream_for_port(&self, name: &str, port: &str) -> Result<Vec<ProcessHandle>> {
        self.ensure_setup()?;
        let names: BTreeSet<&Name> = self
            .book
            .resolved
            .iter()
            .filter(|c| c.upstream.name == name && c.upstream.port == port)
            .map(|c| &c.downstream.name)
            .collect();
        names.into_iter().map(|n| self.process_by_name(n)).collect()
    }

    /// The output-port address feeding the named input port, if connected.
    pub fn sender_for_port(&self, name: &str, port: &str) -> Result<Option<PortAddr>> {
        self.ensure_setup()?;
        Ok(self
            .book
            .resolved
            .iter()
            .find(|c| c.downstream.name == name && c.downstream.port == port)
            .map(|c| c.upstream.clone()))
    }

    /// All input-port addresses fed by the named output port.
    pub fn receivers_for_port(&self, name: &str, port: &str) -> Result<Vec<PortAddr>> {
        self.ensure_setup()?;
        Ok(self
            .book
            .resolved
            .iter()
            .filter(|c| c.upstream.name == name && c.upstream.port == port)
            .map(|c| c.downstream.clone())
            .collect())
    }

    // ---- edge queries -----------------------------------------------------

    /// The edge materialized for the exact connection, if any.
    pub fn edge_for_connection(
        &self,
        upstream_name: &str,
        upstream_port: &str,
        downstream_name: &str,
        downstream_port: &str,
    ) -> Result<Option<EdgeHandle>> {
        self.ensure_setup()?;
        let wanted = Connection::new(
            upstream_name,
            upstream_port,
            downstream_name,
            downstream_port,
        );
        for (i, connection) in self.book.resolved.iter().enumerate() {
            if *connection == wanted {
                return Ok(self.edges.get(&i).cloned());
            }
        }
        Ok(None)
    }

    /// All edges delivering into the named process.
    pub fn input_edges_for_process(&self, name: &str) -> Result<Vec<EdgeHandle>> {
        self.ensure_setup()?;
        Ok(self
            .edges
            .iter()
            .filter(|(i, _)| self.book.resolved[**i].downstream.name == name)
            .map(|(_, edge)| edge.clone())
            .collect())
    }

    /// The edge delivering into the named input port, if any.
    pub fn input_edge_for_port(&self, name: &str, port: &str) -> Result<Option<EdgeHandle>> {
        self.ensure_setup()?;
        Ok(self
            .edges
            .iter()
            .find(|(i, _)| {
                let down = &self.book.resolved[**i].downstream;
                down.name == name && down.port == port
            })
            .map(|(_, edge)| edge.clone()))
    }

    /// All edges carrying data away from the named process.
    pub fn output_edges_for_process(&self, name: &str) -> Result<Vec<EdgeHandle>> {
        self.ensure_setup()?;
        Ok(self
            .edges
            .iter()
            .filter(|(i, _)| self.book.resolved[**i].upstream.name == name)
            .map(|(_, edge)| edge.clone())
            .collect())
    }

    /// All edges carrying data away from the named output port.
    pub fn output_edges_for_port(&self, name: &str, port: &str) -> Result<Vec<EdgeHandle>> {
        self.ensure_setup()?;
        Ok(self
            .edges
            .iter()
            .filter(|(i, _)| {
                let up = &self.book.resolved[**i].upstream;
                up.name == name && up.port == port
            })
            .map(|(_, edge)| edge.clone())
            .collect())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn decide_types_table() {
        let any = PortType::Any;
        let int = PortType::concrete("int");
        let float = PortType::concrete("float");
        let flow = PortType::FlowDependent("T".to_string());
        let data = PortType::DataDependent;

        assert_eq!(decide_types(&data, &int), TypeDecision::DataDependent);
        assert_eq!(decide_types(&flow, &flow), TypeDecision::UntypedFlow);
        assert_eq!(
            decide_types(&flow, &int),
            TypeDecision::Pin(PinDirection::PushUpstream)
        );
        assert_eq!(
            decide_types(&int, &flow),
            TypeDecision::Pin(PinDirection::PushDownstream)
        );
        assert_eq!(decide_types(&int, &float), TypeDecision::Mismatch);
        assert_eq!(decide_types(&int, &int), TypeDecision::Compatible);
        assert_eq!(decide_types(&any, &int), TypeDecision::Compatible);
        assert_eq!(decide_types(&int, &any), TypeDecision::Compatible);
    }

    #[test]
    fn flags_reject_const_into_mutable() {
        let out_const = PortFlags {
            output_const: true,
            ..PortFlags::NONE
        };
        let in_mutable = PortFlags {
            input_mutable: true,
            ..PortFlags::NONE
        };
        assert!(!flags_compatible(&out_const, &in_mutable));
        assert!(flags_compatible(&out_const, &PortFlags::NONE));
        assert!(flags_compatible(&PortFlags::NONE, &in_mutable));
    }

    #[test]
    fn book_forget_removes_everywhere() {
        let mut book = ConnectionBook::default();
        let conn = Connection::new("a", "out", "b", "in");
        book.planned.push(conn.clone());
        book.resolved.push(conn.clone());
        book.untyped.push(conn.clone());
        book.pinnings
            .push((conn.clone(), PinDirection::PushUpstream));
        book.cluster_pending
            .push((conn.clone(), ClusterSide::Upstream));

        book.forget(&conn);
        assert!(book.planned.is_empty());
        assert!(book.resolved.is_empty());
        assert!(book.untyped.is_empty());
        assert!(book.pinnings.is_empty());
        assert!(book.cluster_pending.is_empty());
    }
}
