//! Contracts external processes and clusters must satisfy.

#![forbid(unsafe_code)]

use crate::edge::EdgeHandle;
use crate::error::Result;
use crate::port::{Connection, Name, PortInfo, PortName, PortType};
use crate::rational::Rational;
use std::cell::RefCell;
use std::rc::Rc;

/// Shared handle to a process. Processes are externally owned; the builder
/// only holds handles and mutates them inside the setup passes.
pub type ProcessHandle = Rc<RefCell<dyn Process>>;

/// Shared handle to a cluster.
pub type ClusterHandle = Rc<RefCell<dyn Cluster>>;

/// A named compute node with typed ports.
///
/// The builder drives the full lifecycle: `configure` once during setup,
/// `init` later during setup, `reset` when the pipeline is reset. Edge
/// binding happens between `configure` and `init`.
pub trait Process {
    /// The unique name of this process.
    fn name(&self) -> &str;

    /// Names of all input ports.
    fn input_ports(&self) -> Vec<PortName>;

    /// Names of all output ports.
    fn output_ports(&self) -> Vec<PortName>;

    /// Port information for an input port.
    fn input_port_info(&self, port: &str) -> Result<PortInfo>;

    /// Port information for an output port.
    fn output_port_info(&self, port: &str) -> Result<PortInfo>;

    /// Assign a concrete type to an input port. Returns false if the port
    /// does not exist or refuses the type.
    ///
    /// When the port is flow-dependent, the assignment covers its whole
    /// family: every port of this process sharing the tag adopts the type.
    fn set_input_port_type(&mut self, port: &str, new_type: PortType) -> bool;

    /// Assign a concrete type to an output port. Returns false if the port
    /// does not exist or refuses the type.
    ///
    /// When the port is flow-dependent, the assignment covers its whole
    /// family: every port of this process sharing the tag adopts the type.
    fn set_output_port_type(&mut self, port: &str, new_type: PortType) -> bool;

    /// Configuration hook, invoked once per setup before edges exist.
    /// Data-dependent output types must be decided here.
    fn configure(&mut self) -> Result<()>;

    /// Initialization hook, invoked once per setup after edges are bound.
    fn init(&mut self) -> Result<()>;

    /// Return to the pre-setup state, dropping bound edges and restoring
    /// declared port types.
    fn reset(&mut self);

    /// Bind an edge delivering data into an input port.
    fn connect_input_port(&mut self, port: &str, edge: EdgeHandle) -> Result<()>;

    /// Bind an edge carrying data away from an output port.
    fn connect_output_port(&mut self, port: &str, edge: EdgeHandle) -> Result<()>;

    /// Receive the integer-relative execution rate computed at setup.
    fn set_core_frequency(&mut self, frequency: Rational);
}

/// A composite that acts as a process to the outside, forwarding its own
/// ports to ports of its internal children via mappings.
///
/// Mappings are connections between external cluster-port addresses and
/// internal child-port addresses: an input mapping runs from the cluster
/// port to a child input, an output mapping from a child output to the
/// cluster port.
pub trait Cluster: Process {
    /// The child nodes of this cluster. Children may themselves be clusters.
    fn processes(&self) -> Vec<Node>;

    /// Connections between the cluster's own children.
    fn internal_connections(&self) -> Vec<Connection>;

    /// Mappings from external input ports to child input ports. Fan-out
    /// is permitted: one external port may map to several children.
    fn input_mappings(&self) -> Vec<Connection>;

    /// Mappings from child output ports to external output ports. Exactly
    /// one mapping per external port.
    fn output_mappings(&self) -> Vec<Connection>;
}

/// Registry entry: either a plain process or a cluster.
#[derive(Clone)]
pub enum Node {
    /// A leaf compute node.
    Process(ProcessHandle),
    /// A composite of further nodes.
    Cluster(ClusterHandle),
}

impl Node {
    /// Wrap a concrete process into a registry entry.
    pub fn process<P: Process + 'static>(process: Rc<RefCell<P>>) -> Node {
        Node::Process(process)
    }

    /// Wrap a concrete cluster into a registry entry.
    pub fn cluster<C: Cluster + 'static>(cluster: Rc<RefCell<C>>) -> Node {
        Node::Cluster(cluster)
    }

    /// The unique name of the underlying entity.
    pub fn name(&self) -> Name {
        match self {
            Node::Process(p) => p.borrow().name().to_string(),
            Node::Cluster(c) => c.borrow().name().to_string(),
        }
    }
}

impl std::fmt::Debug for dyn Process {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "Process({})", self.name())
    }
}

impl std::fmt::Debug for Node {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            Node::Process(p) => write!(f, "Process({})", p.borrow().name()),
            Node::Cluster(c) => write!(f, "Cluster({})", c.borrow().name()),
        }
    }
}
