//! Structural checks: required ports, connectivity, and acyclicity.

#![forbid(unsafe_code)]

use crate::contract::{
    assert_invariant, GRAPH_ACYCLIC, GRAPH_CONNECTED, REQUIRED_PORTS_COVERED,
};
use crate::error::{PipelineError, Result};
use crate::pipeline::Pipeline;
use std::collections::{BTreeMap, BTreeSet, VecDeque};

impl Pipeline {
    /// Walk the undirected resolved-connection graph, checking required
    /// ports on every visited process. Any process the walk never reaches
    /// is orphaned.
    pub(crate) fn check_required_ports(&self) -> Result<()> {
        let names = self.process_names();
        let mut visited: BTreeSet<String> = BTreeSet::new();
        let mut to_visit: VecDeque<String> = VecDeque::new();

        if let Some(first) = names.first() {
            to_visit.push_back(first.clone());
        }

        while let Some(current) = to_visit.pop_front() {
            if !visited.insert(current.clone()) {
                continue;
            }

            let proc = self.process_by_name(&current)?;

            for port in proc.borrow().input_ports() {
                let flags = proc.borrow().input_port_info(&port)?.flags;
                if flags.required && self.input_edge_for_port(&current, &port)?.is_none() {
                    return Err(PipelineError::MissingConnection {
                        name: current,
                        port,
                        reason: "the input port has the required flag".to_string(),
                    });
                }
            }

            for port in proc.borrow().output_ports() {
                let flags = proc.borrow().output_port_info(&port)?.flags;
                if flags.required && self.output_edges_for_port(&current, &port)?.is_empty() {
                    return Err(PipelineError::MissingConnection {
                        name: current,
                        port,
                        reason: "the output port has the required flag".to_string(),
                    });
                }
            }

            for neighbor in self.upstream_for_process(&current)? {
                to_visit.push_back(neighbor.borrow().name().to_string());
            }
            for neighbor in self.downstream_for_process(&current)? {
                to_visit.push_back(neighbor.borrow().name().to_string());
            }
        }

        assert_invariant(
            REQUIRED_PORTS_COVERED,
            true,
            "Required ports checked on every reachable process",
            Some("check_required_ports"),
        );

        if visited.len() != names.len() {
            return Err(PipelineError::OrphanedProcesses);
        }

        assert_invariant(
            GRAPH_CONNECTED,
            visited.len() == names.len(),
            "Every process reachable",
            Some("check_required_ports"),
        );

        Ok(())
    }

    /// Topologically sort the directed process graph, excluding edges whose
    /// downstream port opts out of dependency order.
    pub(crate) fn check_dag(&self) -> Result<()> {
        let names = self.process_names();
        let index: BTreeMap<&String, usize> = names
            .iter()
            .enumerate()
            .map(|(i, name)| (name, i))
            .collect();

        let mut adjacency: Vec<Vec<usize>> = vec![Vec::new(); names.len()];
        let mut in_degree: Vec<usize> = vec![0; names.len()];

        for (t, name) in names.iter().enumerate() {
            let proc = self.process_by_name(name)?;

            for port in proc.borrow().input_ports() {
                let sender = match self.sender_for_port(name, &port)? {
                    Some(sender) => sender,
                    None => continue,
                };

                let flags = proc.borrow().input_port_info(&port)?.flags;
                if flags.input_nodep {
                    continue;
                }

                let s = index[&sender.name];
                adjacency[s].push(t);
                in_degree[t] += 1;
            }
        }

        let mut queue: VecDeque<usize> = VecDeque::new();
        for (i, &degree) in in_degree.iter().enumerate() {
            if degree == 0 {
                queue.push_back(i);
            }
        }

        let mut ordered = 0;
        while let Some(node) = queue.pop_front() {
            ordered += 1;
            for &next in &adjacency[node] {
                in_degree[next] -= 1;
                if in_degree[next] == 0 {
                    queue.push_back(next);
                }
            }
        }

        if ordered != names.len() {
            return Err(PipelineError::NotADAG);
        }

        assert_invariant(
            GRAPH_ACYCLIC,
            ordered == names.len(),
            "Dependency graph sorts topologically",
            Some("check_dag"),
        );

        Ok(())
    }
}
