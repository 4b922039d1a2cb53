//! The builder state machine and its observable laws.

use conflux::config::ConfigBlock;
use conflux::error::PipelineError;
use conflux::pipeline::Pipeline;
use conflux::port::{PortFlags, PortInfo, PortType};
use conflux::process::Node;
use conflux::rational::Rational;
use conflux::testing::StubProcess;
use std::cell::RefCell;
use std::rc::Rc;

fn pair() -> (
    Pipeline,
    Rc<RefCell<StubProcess>>,
    Rc<RefCell<StubProcess>>,
) {
    let a = StubProcess::new("a")
        .output("out", PortInfo::new(PortType::concrete("int")))
        .handle();
    let b = StubProcess::new("b")
        .input(
            "in",
            PortInfo::new(PortType::concrete("int")).with_flags(PortFlags::REQUIRED),
        )
        .handle();

    let mut pipeline = Pipeline::new(ConfigBlock::new());
    pipeline.add_process(Node::process(a.clone())).unwrap();
    pipeline.add_process(Node::process(b.clone())).unwrap();
    pipeline.connect("a", "out", "b", "in").unwrap();
    (pipeline, a, b)
}

#[test]
fn mutation_is_locked_after_setup() {
    let (mut pipeline, _a, _b) = pair();
    pipeline.setup_pipeline().unwrap();

    let extra = StubProcess::new("extra")
        .output("out", PortInfo::new(PortType::concrete("int")))
        .handle();
    assert!(matches!(
        pipeline.add_process(Node::process(extra)).unwrap_err(),
        PipelineError::AddAfterSetup { .. }
    ));
    assert!(matches!(
        pipeline.remove_process("a").unwrap_err(),
        PipelineError::RemoveAfterSetup { .. }
    ));
    assert!(matches!(
        pipeline.connect("a", "out", "b", "in").unwrap_err(),
        PipelineError::ConnectionAfterSetup { .. }
    ));
    assert!(matches!(
        pipeline.disconnect("a", "out", "b", "in").unwrap_err(),
        PipelineError::DisconnectionAfterSetup { .. }
    ));
}

#[test]
fn duplicate_setup_is_rejected_even_after_failure() {
    let (mut pipeline, _a, _b) = pair();
    pipeline.setup_pipeline().unwrap();
    assert_eq!(
        pipeline.setup_pipeline().unwrap_err(),
        PipelineError::DuplicateSetup
    );

    // A failed setup also counts as having been set up.
    let lonely = StubProcess::new("lonely")
        .input(
            "in",
            PortInfo::new(PortType::concrete("int")).with_flags(PortFlags::REQUIRED),
        )
        .handle();
    let mut failing = Pipeline::new(ConfigBlock::new());
    failing.add_process(Node::process(lonely)).unwrap();
    assert!(matches!(
        failing.setup_pipeline().unwrap_err(),
        PipelineError::MissingConnection { .. }
    ));
    assert_eq!(
        failing.setup_pipeline().unwrap_err(),
        PipelineError::DuplicateSetup
    );
}

#[test]
fn queries_are_guarded_by_lifecycle() {
    let (mut pipeline, _a, _b) = pair();

    assert_eq!(
        pipeline.upstream_for_process("b").unwrap_err(),
        PipelineError::PipelineNotSetup
    );
    assert_eq!(
        pipeline.edge_for_connection("a", "out", "b", "in").unwrap_err(),
        PipelineError::PipelineNotSetup
    );

    pipeline.setup_pipeline().unwrap();
    assert_eq!(pipeline.upstream_for_process("b").unwrap().len(), 1);
}

#[test]
fn failed_setup_makes_queries_not_ready() {
    let lonely = StubProcess::new("lonely")
        .input(
            "in",
            PortInfo::new(PortType::concrete("int")).with_flags(PortFlags::REQUIRED),
        )
        .handle();
    let mut pipeline = Pipeline::new(ConfigBlock::new());
    pipeline.add_process(Node::process(lonely)).unwrap();

    assert!(pipeline.setup_pipeline().is_err());
    assert!(pipeline.is_setup());
    assert!(!pipeline.setup_successful());
    assert_eq!(
        pipeline.upstream_for_process("lonely").unwrap_err(),
        PipelineError::PipelineNotReady
    );
}

#[test]
fn start_stop_transitions() {
    let (mut pipeline, _a, _b) = pair();

    // Start before setup is refused.
    assert_eq!(pipeline.start().unwrap_err(), PipelineError::PipelineNotSetup);

    pipeline.setup_pipeline().unwrap();
    pipeline.start().unwrap();

    // Reset while running is refused.
    assert_eq!(pipeline.reset().unwrap_err(), PipelineError::ResetWhileRunning);

    pipeline.stop().unwrap();
    pipeline.reset().unwrap();
    assert!(!pipeline.is_setup());
}

#[test]
fn stop_without_start_is_an_internal_fault() {
    let (mut pipeline, _a, _b) = pair();
    pipeline.setup_pipeline().unwrap();
    assert!(matches!(
        pipeline.stop().unwrap_err(),
        PipelineError::Internal { .. }
    ));
}

#[test]
fn reset_replays_planned_connections() {
    let (mut pipeline, a, b) = pair();
    pipeline.setup_pipeline().unwrap();

    assert_eq!(b.borrow().input_edge_count("in"), 1);

    pipeline.reset().unwrap();
    assert!(!pipeline.is_setup());
    assert_eq!(a.borrow().reset_calls(), 1);
    assert_eq!(b.borrow().input_edge_count("in"), 0);

    // Setup after reset behaves exactly like the first setup.
    pipeline.setup_pipeline().unwrap();
    assert!(pipeline.setup_successful());
    assert_eq!(a.borrow().core_frequency(), Some(Rational::ONE));
    assert_eq!(b.borrow().input_edge_count("in"), 1);
    assert_eq!(a.borrow().configure_calls(), 2);
    assert_eq!(a.borrow().init_calls(), 2);
}

#[test]
fn add_then_remove_restores_observable_state() {
    let (mut pipeline, _a, _b) = pair();
    let names_before = pipeline.process_names();

    let extra = StubProcess::new("extra")
        .output("out", PortInfo::new(PortType::concrete("int")))
        .handle();
    pipeline.add_process(Node::process(extra)).unwrap();
    pipeline.remove_process("extra").unwrap();

    assert_eq!(pipeline.process_names(), names_before);
    assert!(pipeline.parent_cluster("extra").is_err());
}

#[test]
fn connect_then_disconnect_restores_planned() {
    let a = StubProcess::new("a")
        .output("out", PortInfo::new(PortType::concrete("int")))
        .handle();
    let b = StubProcess::new("b")
        .input("in", PortInfo::new(PortType::concrete("int")))
        .handle();

    let mut pipeline = Pipeline::new(ConfigBlock::new());
    pipeline.add_process(Node::process(a)).unwrap();
    pipeline.add_process(Node::process(b)).unwrap();

    pipeline.connect("a", "out", "b", "in").unwrap();
    assert_eq!(pipeline.connections_from_addr("a", "out").len(), 1);

    pipeline.disconnect("a", "out", "b", "in").unwrap();
    assert!(pipeline.connections_from_addr("a", "out").is_empty());
    assert!(pipeline.connection_to_addr("b", "in").is_none());
}

#[test]
fn removing_a_process_purges_its_connections() {
    let (mut pipeline, _a, _b) = pair();
    pipeline.remove_process("b").unwrap();

    assert!(pipeline.connections_from_addr("a", "out").is_empty());
    assert!(matches!(
        pipeline.remove_process("b").unwrap_err(),
        PipelineError::NoSuchProcess { .. }
    ));
}

#[test]
fn rejected_connection_still_lands_in_planned() {
    let a = StubProcess::new("a")
        .output("o", PortInfo::new(PortType::concrete("int")))
        .handle();
    let b = StubProcess::new("b")
        .input("i", PortInfo::new(PortType::concrete("float")))
        .handle();

    let mut pipeline = Pipeline::new(ConfigBlock::new());
    pipeline.add_process(Node::process(a)).unwrap();
    pipeline.add_process(Node::process(b)).unwrap();

    assert!(pipeline.connect("a", "o", "b", "i").is_err());
    // Intent is recorded before validation.
    assert_eq!(pipeline.connections_from_addr("a", "o").len(), 1);
}
