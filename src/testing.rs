//! Reusable stub processes and clusters for tests and demos.

#![forbid(unsafe_code)]

use crate::edge::EdgeHandle;
use crate::error::{PipelineError, Result};
use crate::port::{Connection, Name, PortInfo, PortName, PortType};
use crate::process::{Cluster, Node, Process};
use crate::rational::Rational;
use std::cell::RefCell;
use std::collections::BTreeMap;
use std::rc::Rc;

/// A scriptable process: declares its ports up front, optionally resolves
/// data-dependent outputs during `configure`, and records everything the
/// builder does to it.
pub struct StubProcess {
    name: Name,
    inputs: BTreeMap<PortName, PortInfo>,
    outputs: BTreeMap<PortName, PortInfo>,
    declared_inputs: BTreeMap<PortName, PortInfo>,
    declared_outputs: BTreeMap<PortName, PortInfo>,
    configure_types: Vec<(PortName, PortType)>,
    frozen_types: bool,
    input_edges: BTreeMap<PortName, Vec<EdgeHandle>>,
    output_edges: BTreeMap<PortName, Vec<EdgeHandle>>,
    core_frequency: Option<Rational>,
    configure_calls: usize,
    init_calls: usize,
    reset_calls: usize,
}

impl StubProcess {
    /// A process with the given name and no ports.
    pub fn new(name: impl Into<Name>) -> Self {
        StubProcess {
            name: name.into(),
            inputs: BTreeMap::new(),
            outputs: BTreeMap::new(),
            declared_inputs: BTreeMap::new(),
            declared_outputs: BTreeMap::new(),
            configure_types: Vec::new(),
            frozen_types: false,
            input_edges: BTreeMap::new(),
            output_edges: BTreeMap::new(),
            core_frequency: None,
            configure_calls: 0,
            init_calls: 0,
            reset_calls: 0,
        }
    }

    /// Declare an input port.
    pub fn input(mut self, port: impl Into<PortName>, info: PortInfo) -> Self {
        let port = port.into();
        self.inputs.insert(port.clone(), info.clone());
        self.declared_inputs.insert(port, info);
        self
    }

    /// Declare an output port.
    pub fn output(mut self, port: impl Into<PortName>, info: PortInfo) -> Self {
        let port = port.into();
        self.outputs.insert(port.clone(), info.clone());
        self.declared_outputs.insert(port, info);
        self
    }

    /// During `configure`, assign this concrete type to the named output.
    pub fn resolves_during_configure(
        mut self,
        port: impl Into<PortName>,
        port_type: PortType,
    ) -> Self {
        self.configure_types.push((port.into(), port_type));
        self
    }

    /// Refuse every later `set_*_port_type` call.
    pub fn frozen_types(mut self) -> Self {
        self.frozen_types = true;
        self
    }

    /// Wrap into a shareable handle.
    pub fn handle(self) -> Rc<RefCell<StubProcess>> {
        Rc::new(RefCell::new(self))
    }

    /// The core frequency the builder assigned, if any.
    pub fn core_frequency(&self) -> Option<Rational> {
        self.core_frequency
    }

    /// Edges bound to the named input port.
    pub fn input_edge_count(&self, port: &str) -> usize {
        self.input_edges.get(port).map_or(0, Vec::len)
    }

    /// Edges bound to the named output port.
    pub fn output_edge_count(&self, port: &str) -> usize {
        self.output_edges.get(port).map_or(0, Vec::len)
    }

    /// How many times `configure` ran.
    pub fn configure_calls(&self) -> usize {
        self.configure_calls
    }

    /// How many times `init` ran.
    pub fn init_calls(&self) -> usize {
        self.init_calls
    }

    /// How many times `reset` ran.
    pub fn reset_calls(&self) -> usize {
        self.reset_calls
    }

    /// The current type of an input port, for assertions.
    pub fn input_type(&self, port: &str) -> Option<PortType> {
        self.inputs.get(port).map(|info| info.port_type.clone())
    }

    /// The current type of an output port, for assertions.
    pub fn output_type(&self, port: &str) -> Option<PortType> {
        self.outputs.get(port).map(|info| info.port_type.clone())
    }

    /// Retype every port whose flow-dependent tag matches.
    fn retype_family(&mut self, tag: &str, new_type: PortType) {
        let member = |info: &PortInfo| {
            matches!(&info.port_type, PortType::FlowDependent(t) if t == tag)
        };
        for info in self.inputs.values_mut() {
            if member(info) {
                info.port_type = new_type.clone();
            }
        }
        for info in self.outputs.values_mut() {
            if member(info) {
                info.port_type = new_type.clone();
            }
        }
    }
}

impl Process for StubProcess {
    fn name(&self) -> &str {
        &self.name
    }

    fn input_ports(&self) -> Vec<PortName> {
        self.inputs.keys().cloned().collect()
    }

    fn output_ports(&self) -> Vec<PortName> {
        self.outputs.keys().cloned().collect()
    }

    fn input_port_info(&self, port: &str) -> Result<PortInfo> {
        self.inputs
            .get(port)
            .cloned()
            .ok_or_else(|| PipelineError::NoSuchPort {
                name: self.name.clone(),
                port: port.to_string(),
            })
    }

    fn output_port_info(&self, port: &str) -> Result<PortInfo> {
        self.outputs
            .get(port)
            .cloned()
            .ok_or_else(|| PipelineError::NoSuchPort {
                name: self.name.clone(),
                port: port.to_string(),
            })
    }

    fn set_input_port_type(&mut self, port: &str, new_type: PortType) -> bool {
        if self.frozen_types {
            return false;
        }
        let current = match self.inputs.get(port) {
            Some(info) => info.port_type.clone(),
            None => return false,
        };
        match current {
            PortType::FlowDependent(tag) => self.retype_family(&tag, new_type),
            _ => {
                self.inputs.get_mut(port).expect("port present").port_type = new_type;
            }
        }
        true
    }

    fn set_output_port_type(&mut self, port: &str, new_type: PortType) -> bool {
        if self.frozen_types {
            return false;
        }
        let current = match self.outputs.get(port) {
            Some(info) => info.port_type.clone(),
            None => return false,
        };
        match current {
            PortType::FlowDependent(tag) => self.retype_family(&tag, new_type),
            _ => {
                self.outputs.get_mut(port).expect("port present").port_type = new_type;
            }
        }
        true
    }

    fn configure(&mut self) -> Result<()> {
        self.configure_calls += 1;
        for (port, port_type) in self.configure_types.clone() {
            if let Some(info) = self.outputs.get_mut(&port) {
                info.port_type = port_type;
            }
        }
        Ok(())
    }

    fn init(&mut self) -> Result<()> {
        self.init_calls += 1;
        Ok(())
    }

    fn reset(&mut self) {
        self.reset_calls += 1;
        self.inputs = self.declared_inputs.clone();
        self.outputs = self.declared_outputs.clone();
        self.input_edges.clear();
        self.output_edges.clear();
        self.core_frequency = None;
    }

    fn connect_input_port(&mut self, port: &str, edge: EdgeHandle) -> Result<()> {
        if !self.inputs.contains_key(port) {
            return Err(PipelineError::NoSuchPort {
                name: self.name.clone(),
                port: port.to_string(),
            });
        }
        self.input_edges.entry(port.to_string()).or_default().push(edge);
        Ok(())
    }

    fn connect_output_port(&mut self, port: &str, edge: EdgeHandle) -> Result<()> {
        if !self.outputs.contains_key(port) {
            return Err(PipelineError::NoSuchPort {
                name: self.name.clone(),
                port: port.to_string(),
            });
        }
        self.output_edges.entry(port.to_string()).or_default().push(edge);
        Ok(())
    }

    fn set_core_frequency(&mut self, frequency: Rational) {
        self.core_frequency = Some(frequency);
    }
}

/// A scriptable cluster: children plus internal connections and port
/// mappings, declared up front.
pub struct StubCluster {
    name: Name,
    children: Vec<Node>,
    internal: Vec<Connection>,
    input_maps: Vec<Connection>,
    output_maps: Vec<Connection>,
}

impl StubCluster {
    /// A cluster with the given name and no members.
    pub fn new(name: impl Into<Name>) -> Self {
        StubCluster {
            name: name.into(),
            children: Vec::new(),
            internal: Vec::new(),
            input_maps: Vec::new(),
            output_maps: Vec::new(),
        }
    }

    /// Add a child node.
    pub fn child(mut self, node: Node) -> Self {
        self.children.push(node);
        self
    }

    /// Connect two of this cluster's children.
    pub fn connect_internal(
        mut self,
        up_name: &str,
        up_port: &str,
        down_name: &str,
        down_port: &str,
    ) -> Self {
        self.internal
            .push(Connection::new(up_name, up_port, down_name, down_port));
        self
    }

    /// Map an external input port onto a child input port. May be repeated
    /// for the same external port to fan out.
    pub fn map_input(mut self, port: &str, child_name: &str, child_port: &str) -> Self {
        let name = self.name.clone();
        self.input_maps
            .push(Connection::new(name, port, child_name, child_port));
        self
    }

    /// Map a child output port onto an external output port.
    pub fn map_output(mut self, child_name: &str, child_port: &str, port: &str) -> Self {
        let name = self.name.clone();
        self.output_maps
            .push(Connection::new(child_name, child_port, name, port));
        self
    }

    /// Wrap into a shareable handle.
    pub fn handle(self) -> Rc<RefCell<StubCluster>> {
        Rc::new(RefCell::new(self))
    }
}

impl Process for StubCluster {
    fn name(&self) -> &str {
        &self.name
    }

    fn input_ports(&self) -> Vec<PortName> {
        self.input_maps
            .iter()
            .map(|mapping| mapping.upstream.port.clone())
            .collect()
    }

    fn output_ports(&self) -> Vec<PortName> {
        self.output_maps
            .iter()
            .map(|mapping| mapping.downstream.port.clone())
            .collect()
    }

    fn input_port_info(&self, port: &str) -> Result<PortInfo> {
        // Cluster ports are rewritten away before any type check reads
        // them; expose a permissive placeholder.
        if self.input_maps.iter().any(|m| m.upstream.port == port) {
            Ok(PortInfo::new(PortType::Any))
        } else {
            Err(PipelineError::NoSuchPort {
                name: self.name.clone(),
                port: port.to_string(),
            })
        }
    }

    fn output_port_info(&self, port: &str) -> Result<PortInfo> {
        if self.output_maps.iter().any(|m| m.downstream.port == port) {
            Ok(PortInfo::new(PortType::Any))
        } else {
            Err(PipelineError::NoSuchPort {
                name: self.name.clone(),
                port: port.to_string(),
            })
        }
    }

    fn set_input_port_type(&mut self, _port: &str, _new_type: PortType) -> bool {
        false
    }

    fn set_output_port_type(&mut self, _port: &str, _new_type: PortType) -> bool {
        false
    }

    fn configure(&mut self) -> Result<()> {
        Ok(())
    }

    fn init(&mut self) -> Result<()> {
        Ok(())
    }

    fn reset(&mut self) {}

    fn connect_input_port(&mut self, port: &str, _edge: EdgeHandle) -> Result<()> {
        Err(PipelineError::NoSuchPort {
            name: self.name.clone(),
            port: port.to_string(),
        })
    }

    fn connect_output_port(&mut self, port: &str, _edge: EdgeHandle) -> Result<()> {
        Err(PipelineError::NoSuchPort {
            name: self.name.clone(),
            port: port.to_string(),
        })
    }

    fn set_core_frequency(&mut self, _frequency: Rational) {}
}

impl Cluster for StubCluster {
    fn processes(&self) -> Vec<Node> {
        self.children.clone()
    }

    fn internal_connections(&self) -> Vec<Connection> {
        self.internal.clone()
    }

    fn input_mappings(&self) -> Vec<Connection> {
        self.input_maps.clone()
    }

    fn output_mappings(&self) -> Vec<Connection> {
        self.output_maps.clone()
    }
}
