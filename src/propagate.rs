//! Type resolution: data-dependent replay and flow-dependent propagation.

#![forbid(unsafe_code)]

use crate::contract::{assert_invariant, DATA_DEP_DRAINED, FLOW_TYPES_RESOLVED};
use crate::error::{PipelineError, Result};
use crate::pipeline::{PinDirection, Pipeline};
use crate::port::{Name, PortType};
use std::collections::VecDeque;
use std::mem;
use tracing::trace;

impl Pipeline {
    /// Invoke each process's `configure` hook, replaying data-dependent
    /// connections whose upstream process has just configured.
    ///
    /// By the time a process has configured, its data-dependent outputs
    /// must carry a concrete type; the replayed connect then re-enters the
    /// type check with that type.
    pub(crate) fn configure_processes(&mut self) -> Result<()> {
        for name in self.process_names() {
            let proc = self.process_by_name(&name)?;
            proc.borrow_mut().configure()?;

            let pending = mem::take(&mut self.book.data_dep);
            let mut to_replay = Vec::new();

            for connection in pending {
                if connection.upstream.name == name {
                    let info = proc.borrow().output_port_info(&connection.upstream.port)?;
                    if info.port_type == PortType::DataDependent {
                        return Err(PipelineError::UntypedDataDependent {
                            name: connection.upstream.name,
                            port: connection.upstream.port,
                        });
                    }
                    to_replay.push(connection);
                } else {
                    self.book.data_dep.push(connection);
                }
            }

            for connection in to_replay {
                trace!(%connection, "replaying data-dependent connection");
                self.connect_inner(connection)?;
            }
        }

        Ok(())
    }

    /// Every data-dependent connection must have been replayed during the
    /// configure pass; a leftover is a broken invariant, not a user error.
    pub(crate) fn check_data_dep_drained(&self) -> Result<()> {
        if !self.book.data_dep.is_empty() {
            return Err(PipelineError::internal(
                "data dependency port tracking failed",
            ));
        }

        assert_invariant(
            DATA_DEP_DRAINED,
            self.book.data_dep.is_empty(),
            "No data-dependent connection left",
            Some("configure_processes"),
        );

        Ok(())
    }

    /// Pin concrete types onto flow-dependent ports and cascade each pin
    /// through the graph, iterating until no pinning remains.
    pub(crate) fn propagate_pinned_types(&mut self) -> Result<()> {
        loop {
            let pinnings = mem::take(&mut self.book.pinnings);
            if pinnings.is_empty() {
                break;
            }

            for (connection, direction) in pinnings {
                let up_proc = self.process_by_name(&connection.upstream.name)?;
                let down_proc = self.process_by_name(&connection.downstream.name)?;

                let up_type = up_proc
                    .borrow()
                    .output_port_info(&connection.upstream.port)?
                    .port_type;
                let down_type = down_proc
                    .borrow()
                    .input_port_info(&connection.downstream.port)?
                    .port_type;

                let (pinned_name, pinned_port, pinned_type) = match direction {
                    PinDirection::PushUpstream => {
                        if !up_proc
                            .borrow_mut()
                            .set_output_port_type(&connection.upstream.port, down_type.clone())
                        {
                            return Err(PipelineError::DependentTypeError {
                                connection,
                                port_type: down_type,
                                push_upstream: true,
                            });
                        }
                        (
                            connection.upstream.name.clone(),
                            connection.upstream.port.clone(),
                            down_type,
                        )
                    }
                    PinDirection::PushDownstream => {
                        if !down_proc
                            .borrow_mut()
                            .set_input_port_type(&connection.downstream.port, up_type.clone())
                        {
                            return Err(PipelineError::DependentTypeError {
                                connection,
                                port_type: up_type,
                                push_upstream: false,
                            });
                        }
                        (
                            connection.downstream.name.clone(),
                            connection.downstream.port.clone(),
                            up_type,
                        )
                    }
                };

                trace!(name = %pinned_name, port = %pinned_port, port_type = %pinned_type,
                       "pinned flow-dependent port");

                self.cascade_from(pinned_name.clone()).map_err(|err| match err {
                    inner @ PipelineError::DependentTypeError { .. } => {
                        PipelineError::DependentTypeCascade {
                            name: pinned_name,
                            port: pinned_port,
                            port_type: pinned_type,
                            source: Box::new(inner),
                        }
                    }
                    other => other,
                })?;

                // Retry the connection with the pinned type in place.
                self.connect_inner(connection)?;
            }
        }

        Ok(())
    }

    /// BFS a freshly concrete type across its flow-dependent family.
    ///
    /// For each visited process, any untyped connection with a now-concrete
    /// endpoint on that process pushes the type into the far endpoint; the
    /// far process is then enqueued. Connections that cannot resolve yet go
    /// back on the untyped list.
    fn cascade_from(&mut self, root: Name) -> Result<()> {
        let mut queue: VecDeque<Name> = VecDeque::new();
        queue.push_back(root);

        while let Some(name) = queue.pop_front() {
            let proc = self.process_by_name(&name)?;

            let candidates = mem::take(&mut self.book.untyped);

            for connection in candidates {
                let mut resolved = false;

                if connection.downstream.name == name {
                    // Push up.
                    let down_type = proc
                        .borrow()
                        .input_port_info(&connection.downstream.port)?
                        .port_type;

                    if !down_type.is_flow_dependent() {
                        let up_proc = self.process_by_name(&connection.upstream.name)?;
                        if !up_proc
                            .borrow_mut()
                            .set_output_port_type(&connection.upstream.port, down_type.clone())
                        {
                            return Err(PipelineError::DependentTypeError {
                                connection,
                                port_type: down_type,
                                push_upstream: true,
                            });
                        }

                        resolved = true;
                        let far = connection.upstream.name.clone();
                        self.connect_inner(connection.clone())?;
                        queue.push_back(far);
                    }
                } else if connection.upstream.name == name {
                    // Push down.
                    let up_type = proc
                        .borrow()
                        .output_port_info(&connection.upstream.port)?
                        .port_type;

                    if !up_type.is_flow_dependent() {
                        let down_proc = self.process_by_name(&connection.downstream.name)?;
                        if !down_proc
                            .borrow_mut()
                            .set_input_port_type(&connection.downstream.port, up_type.clone())
                        {
                            return Err(PipelineError::DependentTypeError {
                                connection,
                                port_type: up_type,
                                push_upstream: false,
                            });
                        }

                        resolved = true;
                        let far = connection.downstream.name.clone();
                        self.connect_inner(connection.clone())?;
                        queue.push_back(far);
                    }
                }

                if !resolved {
                    self.book.untyped.push(connection);
                }
            }
        }

        Ok(())
    }

    /// Any connection still untyped after propagation is a user error: the
    /// flow-dependent family never touched a concrete type.
    pub(crate) fn check_untyped_drained(&self) -> Result<()> {
        if !self.book.untyped.is_empty() {
            return Err(PipelineError::UntypedConnection {
                connections: self.book.untyped.clone(),
            });
        }

        assert_invariant(
            FLOW_TYPES_RESOLVED,
            self.book.untyped.is_empty() && self.book.pinnings.is_empty(),
            "All flow-dependent ports resolved",
            Some("propagate_pinned_types"),
        );

        Ok(())
    }
}
