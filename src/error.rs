//! Error taxonomy for pipeline assembly.

#![forbid(unsafe_code)]

use crate::port::{Connection, Name, PortName, PortType};
use crate::rational::Rational;
use thiserror::Error;

/// Convenience alias used throughout the crate.
pub type Result<T> = std::result::Result<T, PipelineError>;

/// Everything that can go wrong while declaring or setting up a pipeline.
///
/// Every variant carries the offending name, port, or type so failures can
/// be reported without further lookups. The deferred outcomes of the
/// type-check kernel are ordinary control flow and never surface here.
#[derive(Debug, Clone, PartialEq, Error)]
pub enum PipelineError {
    /// A process or cluster with this name is already registered.
    #[error("duplicate process name: {name}")]
    DuplicateName {
        /// The colliding name.
        name: Name,
    },

    /// No process with this name is registered.
    #[error("no such process: {name}")]
    NoSuchProcess {
        /// The unknown name.
        name: Name,
    },

    /// The process has no such port.
    #[error("process {name} has no port {port}")]
    NoSuchPort {
        /// The process queried.
        name: Name,
        /// The unknown port.
        port: PortName,
    },

    /// Processes may not be added once setup has begun.
    #[error("cannot add process {name} after setup")]
    AddAfterSetup {
        /// The process that was being added.
        name: Name,
    },

    /// Processes may not be removed once setup has begun.
    #[error("cannot remove process {name} after setup")]
    RemoveAfterSetup {
        /// The process that was being removed.
        name: Name,
    },

    /// Connections may not be made once setup has begun.
    #[error("cannot connect {connection} after setup")]
    ConnectionAfterSetup {
        /// The rejected connection.
        connection: Connection,
    },

    /// Connections may not be removed once setup has begun.
    #[error("cannot disconnect {connection} after setup")]
    DisconnectionAfterSetup {
        /// The rejected disconnection.
        connection: Connection,
    },

    /// `setup_pipeline` was called on an already set-up pipeline.
    #[error("the pipeline has already been set up")]
    DuplicateSetup,

    /// The query requires `setup_pipeline` to have been called.
    #[error("the pipeline has not been set up")]
    PipelineNotSetup,

    /// The query requires the last setup to have succeeded.
    #[error("the pipeline failed to set up")]
    PipelineNotReady,

    /// `reset` was called while the pipeline is running.
    #[error("cannot reset a running pipeline")]
    ResetWhileRunning,

    /// `setup_pipeline` was called on an empty registry.
    #[error("the pipeline contains no processes")]
    NoProcesses,

    /// Upstream produces immutable data but downstream requires mutable.
    #[error("incompatible port flags on {connection}")]
    FlagMismatch {
        /// The rejected connection.
        connection: Connection,
    },

    /// The two concrete port types differ.
    #[error("type mismatch on {connection}: {up_type} does not match {down_type}")]
    TypeMismatch {
        /// The rejected connection.
        connection: Connection,
        /// The upstream port type.
        up_type: PortType,
        /// The downstream port type.
        down_type: PortType,
    },

    /// A data-dependent output was still untyped after its process configured.
    #[error("port {name}.{port} is data-dependent and was not typed during configuration")]
    UntypedDataDependent {
        /// The offending process.
        name: Name,
        /// The still-untyped output port.
        port: PortName,
    },

    /// Flow-dependent connections remained unresolved after propagation.
    #[error("{} connection(s) remain untyped after propagation", connections.len())]
    UntypedConnection {
        /// The connections that never resolved.
        connections: Vec<Connection>,
    },

    /// A port refused the concrete type pushed onto it.
    #[error("could not push type {port_type} {} across {connection}",
            if *push_upstream { "upstream" } else { "downstream" })]
    DependentTypeError {
        /// The connection that carried the pin.
        connection: Connection,
        /// The type that was refused.
        port_type: PortType,
        /// Whether the push went into the upstream port.
        push_upstream: bool,
    },

    /// A cascade started by pinning `name.port` failed further away.
    #[error("cascade from pinning {name}.{port} to {port_type} failed")]
    DependentTypeCascade {
        /// The process whose port was pinned first.
        name: Name,
        /// The pinned port.
        port: PortName,
        /// The type that was pinned.
        port_type: PortType,
        /// The propagation failure that followed.
        #[source]
        source: Box<PipelineError>,
    },

    /// A required port was left unconnected.
    #[error("required port {name}.{port} is not connected: {reason}")]
    MissingConnection {
        /// The process owning the port.
        name: Name,
        /// The unconnected port.
        port: PortName,
        /// Which side of the process the requirement is on.
        reason: String,
    },

    /// Some processes are unreachable from the rest of the pipeline.
    #[error("the pipeline contains orphaned processes")]
    OrphanedProcesses,

    /// The dependency graph contains a cycle.
    #[error("the pipeline dependency graph is not a DAG")]
    NotADAG,

    /// Two connected processes were assigned inconsistent frequencies.
    #[error("frequency mismatch on {up_name}.{up_port} ({up_frequency}) -> {down_name}.{down_port} ({down_frequency})")]
    FrequencyMismatch {
        /// The upstream process.
        up_name: Name,
        /// The upstream port.
        up_port: PortName,
        /// The frequency assigned upstream.
        up_frequency: Rational,
        /// The downstream process.
        down_name: Name,
        /// The downstream port.
        down_port: PortName,
        /// The frequency assigned downstream.
        down_frequency: Rational,
    },

    /// A broken internal invariant, not a user error.
    #[error("internal pipeline fault: {reason}")]
    Internal {
        /// What tracking failed.
        reason: String,
    },
}

impl PipelineError {
    /// Shorthand for an internal logic fault.
    pub(crate) fn internal(reason: impl Into<String>) -> Self {
        PipelineError::Internal {
            reason: reason.into(),
        }
    }
}
