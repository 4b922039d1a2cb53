//! Port addressing, the port-type algebra, and connection records.

#![forbid(unsafe_code)]

use crate::rational::Rational;
use std::fmt;

/// Unique name of a process or cluster.
pub type Name = String;

/// Name of a port on a process.
pub type PortName = String;

/// Address of a port: which process, which port.
#[derive(Debug, Clone, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub struct PortAddr {
    /// The process or cluster the port lives on.
    pub name: Name,
    /// The port on that process.
    pub port: PortName,
}

impl PortAddr {
    /// Build an address from a process name and port name.
    pub fn new(name: impl Into<Name>, port: impl Into<PortName>) -> Self {
        PortAddr {
            name: name.into(),
            port: port.into(),
        }
    }
}

impl fmt::Display for PortAddr {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}.{}", self.name, self.port)
    }
}

/// A directed link from an output-port address to an input-port address.
#[derive(Debug, Clone, PartialEq, Eq, Hash)]
pub struct Connection {
    /// The producing side.
    pub upstream: PortAddr,
    /// The consuming side.
    pub downstream: PortAddr,
}

impl Connection {
    /// Build a connection from the four address components.
    pub fn new(
        upstream_name: impl Into<Name>,
        upstream_port: impl Into<PortName>,
        downstream_name: impl Into<Name>,
        downstream_port: impl Into<PortName>,
    ) -> Self {
        Connection {
            upstream: PortAddr::new(upstream_name, upstream_port),
            downstream: PortAddr::new(downstream_name, downstream_port),
        }
    }

    /// Whether either endpoint lives on the named process.
    pub fn touches(&self, name: &str) -> bool {
        self.upstream.name == name || self.downstream.name == name
    }
}

impl fmt::Display for Connection {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{} -> {}", self.upstream, self.downstream)
    }
}

/// String form of [`PortType::Any`].
pub const TYPE_ANY: &str = "any";
/// String form of [`PortType::DataDependent`].
pub const TYPE_DATA_DEPENDENT: &str = "data-dependent";
/// Prefix of the string form of [`PortType::FlowDependent`].
pub const TYPE_FLOW_DEPENDENT: &str = "flow-dependent";

/// The type carried by a port.
///
/// Concrete types are opaque strings compared byte-exact; the three special
/// forms are first-class in the connection algebra.
#[derive(Debug, Clone, PartialEq, Eq, Hash)]
pub enum PortType {
    /// Accepts or produces any concrete type.
    Any,
    /// Output type decided by the process during its own configuration.
    DataDependent,
    /// One of a family of ports sharing a tag; the whole family must
    /// resolve to a single concrete type at setup time.
    FlowDependent(String),
    /// A concrete type string.
    Concrete(String),
}

impl PortType {
    /// Shorthand for a concrete type.
    pub fn concrete(name: impl Into<String>) -> Self {
        PortType::Concrete(name.into())
    }

    /// Parse the string form. Anything that is not one of the recognized
    /// special forms is a concrete type.
    pub fn parse(s: &str) -> Self {
        if s == TYPE_ANY {
            return PortType::Any;
        }
        if s == TYPE_DATA_DEPENDENT {
            return PortType::DataDependent;
        }
        if let Some(rest) = s.strip_prefix(TYPE_FLOW_DEPENDENT) {
            if let Some(tag) = rest.strip_prefix('[').and_then(|t| t.strip_suffix(']')) {
                return PortType::FlowDependent(tag.to_string());
            }
        }
        PortType::Concrete(s.to_string())
    }

    /// Whether this is a flow-dependent family member.
    pub fn is_flow_dependent(&self) -> bool {
        matches!(self, PortType::FlowDependent(_))
    }

    /// Whether this type is settled enough to back an edge: concrete or any.
    pub fn is_resolved(&self) -> bool {
        matches!(self, PortType::Any | PortType::Concrete(_))
    }
}

impl fmt::Display for PortType {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            PortType::Any => write!(f, "{}", TYPE_ANY),
            PortType::DataDependent => write!(f, "{}", TYPE_DATA_DEPENDENT),
            PortType::FlowDependent(tag) => write!(f, "{}[{}]", TYPE_FLOW_DEPENDENT, tag),
            PortType::Concrete(name) => write!(f, "{}", name),
        }
    }
}

/// Flags on a port. Only these four carry semantics in the core.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct PortFlags {
    /// Output: the produced data is immutable.
    pub output_const: bool,
    /// Input: the consumer requires mutable data.
    pub input_mutable: bool,
    /// The port must be connected at setup time.
    pub required: bool,
    /// Input: the edge does not contribute to the dependency order.
    pub input_nodep: bool,
}

impl PortFlags {
    /// No flags set.
    pub const NONE: PortFlags = PortFlags {
        output_const: false,
        input_mutable: false,
        required: false,
        input_nodep: false,
    };

    /// Only `required` set.
    pub const REQUIRED: PortFlags = PortFlags {
        required: true,
        ..PortFlags::NONE
    };
}

/// Everything the builder needs to know about one port.
#[derive(Debug, Clone, PartialEq)]
pub struct PortInfo {
    /// The port's type.
    pub port_type: PortType,
    /// The port's flags.
    pub flags: PortFlags,
    /// Relative rate at which the port produces or consumes, if declared.
    pub frequency: Option<Rational>,
}

impl PortInfo {
    /// A port of the given type with no flags and unit frequency.
    pub fn new(port_type: PortType) -> Self {
        PortInfo {
            port_type,
            flags: PortFlags::NONE,
            frequency: Some(Rational::ONE),
        }
    }

    /// Replace the flags.
    pub fn with_flags(mut self, flags: PortFlags) -> Self {
        self.flags = flags;
        self
    }

    /// Replace the declared frequency.
    pub fn with_frequency(mut self, frequency: Option<Rational>) -> Self {
        self.frequency = frequency;
        self
    }
}
