//! Flow-dependent pinning, cascades, and their failure modes.

use conflux::config::ConfigBlock;
use conflux::error::PipelineError;
use conflux::pipeline::Pipeline;
use conflux::port::{PortInfo, PortType};
use conflux::process::Node;
use conflux::testing::StubProcess;
use std::cell::RefCell;
use std::rc::Rc;

fn flow(tag: &str) -> PortInfo {
    PortInfo::new(PortType::FlowDependent(tag.to_string()))
}

/// A relay with a flow-dependent input and output sharing one tag.
fn relay(name: &str) -> Rc<RefCell<StubProcess>> {
    StubProcess::new(name)
        .input("i", flow("T"))
        .output("o", flow("T"))
        .handle()
}

#[test]
fn chain_resolves_from_one_typed_endpoint() {
    // source(flow) -> r1 -> r2 -> r3 -> sink(int); the single concrete
    // endpoint types the whole chain.
    let source = StubProcess::new("source").output("o", flow("T")).handle();
    let relays = [relay("r1"), relay("r2"), relay("r3")];
    let sink = StubProcess::new("sink")
        .input("i", PortInfo::new(PortType::concrete("int")))
        .handle();

    let mut pipeline = Pipeline::new(ConfigBlock::new());
    pipeline.add_process(Node::process(source.clone())).unwrap();
    for r in &relays {
        pipeline.add_process(Node::process(r.clone())).unwrap();
    }
    pipeline.add_process(Node::process(sink)).unwrap();

    pipeline.connect("source", "o", "r1", "i").unwrap();
    pipeline.connect("r1", "o", "r2", "i").unwrap();
    pipeline.connect("r2", "o", "r3", "i").unwrap();
    pipeline.connect("r3", "o", "sink", "i").unwrap();

    pipeline.setup_pipeline().unwrap();

    let int = PortType::concrete("int");
    assert_eq!(source.borrow().output_type("o"), Some(int.clone()));
    for r in &relays {
        assert_eq!(r.borrow().input_type("i"), Some(int.clone()));
        assert_eq!(r.borrow().output_type("o"), Some(int.clone()));
    }
    assert_eq!(pipeline.resolved_connections().unwrap().len(), 4);
}

#[test]
fn unanchored_flow_family_fails_as_untyped() {
    // Two flow-dependent processes with no concrete endpoint anywhere.
    let a = StubProcess::new("a").output("o", flow("T")).handle();
    let b = StubProcess::new("b").input("i", flow("T")).handle();

    let mut pipeline = Pipeline::new(ConfigBlock::new());
    pipeline.add_process(Node::process(a)).unwrap();
    pipeline.add_process(Node::process(b)).unwrap();
    pipeline.connect("a", "o", "b", "i").unwrap();

    assert!(matches!(
        pipeline.setup_pipeline().unwrap_err(),
        PipelineError::UntypedConnection { connections } if connections.len() == 1
    ));
}

#[test]
fn refused_pin_is_a_dependent_type_error() {
    let a = StubProcess::new("a")
        .output("o", flow("T"))
        .frozen_types()
        .handle();
    let b = StubProcess::new("b")
        .input("i", PortInfo::new(PortType::concrete("int")))
        .handle();

    let mut pipeline = Pipeline::new(ConfigBlock::new());
    pipeline.add_process(Node::process(a)).unwrap();
    pipeline.add_process(Node::process(b)).unwrap();
    pipeline.connect("a", "o", "b", "i").unwrap();

    assert!(matches!(
        pipeline.setup_pipeline().unwrap_err(),
        PipelineError::DependentTypeError {
            push_upstream: true,
            ..
        }
    ));
}

#[test]
fn refused_cascade_reports_the_original_pin() {
    // sink types b's family; the cascade then tries to type a, which
    // refuses. The failure must cite the pin that started the cascade.
    let a = StubProcess::new("a")
        .output("o", flow("T"))
        .frozen_types()
        .handle();
    let b = relay("b");
    let sink = StubProcess::new("sink")
        .input("i", PortInfo::new(PortType::concrete("int")))
        .handle();

    let mut pipeline = Pipeline::new(ConfigBlock::new());
    pipeline.add_process(Node::process(a)).unwrap();
    pipeline.add_process(Node::process(b)).unwrap();
    pipeline.add_process(Node::process(sink)).unwrap();
    pipeline.connect("a", "o", "b", "i").unwrap();
    pipeline.connect("b", "o", "sink", "i").unwrap();

    let err = pipeline.setup_pipeline().unwrap_err();
    match err {
        PipelineError::DependentTypeCascade {
            name,
            port_type,
            source,
            ..
        } => {
            assert_eq!(name, "b");
            assert_eq!(port_type, PortType::concrete("int"));
            assert!(matches!(
                *source,
                PipelineError::DependentTypeError {
                    push_upstream: true,
                    ..
                }
            ));
        }
        other => panic!("expected a cascade error, got {other:?}"),
    }
}

#[test]
fn any_matches_every_concrete_type() {
    let a = StubProcess::new("a")
        .output("o", PortInfo::new(PortType::Any))
        .handle();
    let b = StubProcess::new("b")
        .input("i", PortInfo::new(PortType::concrete("image")))
        .handle();

    let mut pipeline = Pipeline::new(ConfigBlock::new());
    pipeline.add_process(Node::process(a)).unwrap();
    pipeline.add_process(Node::process(b)).unwrap();
    pipeline.connect("a", "o", "b", "i").unwrap();

    pipeline.setup_pipeline().unwrap();
    assert_eq!(pipeline.resolved_connections().unwrap().len(), 1);
}

#[test]
fn concrete_mismatch_is_rejected_at_connect() {
    let a = StubProcess::new("a")
        .output("o", PortInfo::new(PortType::concrete("int")))
        .handle();
    let b = StubProcess::new("b")
        .input("i", PortInfo::new(PortType::concrete("float")))
        .handle();

    let mut pipeline = Pipeline::new(ConfigBlock::new());
    pipeline.add_process(Node::process(a)).unwrap();
    pipeline.add_process(Node::process(b)).unwrap();

    assert!(matches!(
        pipeline.connect("a", "o", "b", "i").unwrap_err(),
        PipelineError::TypeMismatch { up_type, down_type, .. }
            if up_type == PortType::concrete("int")
                && down_type == PortType::concrete("float")
    ));
}

#[test]
fn const_output_into_mutable_input_is_rejected() {
    use conflux::port::PortFlags;

    let a = StubProcess::new("a")
        .output(
            "o",
            PortInfo::new(PortType::concrete("int")).with_flags(PortFlags {
                output_const: true,
                ..PortFlags::NONE
            }),
        )
        .handle();
    let b = StubProcess::new("b")
        .input(
            "i",
            PortInfo::new(PortType::concrete("int")).with_flags(PortFlags {
                input_mutable: true,
                ..PortFlags::NONE
            }),
        )
        .handle();

    let mut pipeline = Pipeline::new(ConfigBlock::new());
    pipeline.add_process(Node::process(a)).unwrap();
    pipeline.add_process(Node::process(b)).unwrap();

    assert!(matches!(
        pipeline.connect("a", "o", "b", "i").unwrap_err(),
        PipelineError::FlagMismatch { .. }
    ));
}

#[test]
fn data_dependent_feeding_flow_dependent_resolves_both() {
    // a's output type arrives during configure; the replayed connection
    // then pins b's flow-dependent family.
    let a = StubProcess::new("a")
        .output("o", PortInfo::new(PortType::DataDependent))
        .resolves_during_configure("o", PortType::concrete("bytes"))
        .handle();
    let b = StubProcess::new("b").input("i", flow("T")).handle();

    let mut pipeline = Pipeline::new(ConfigBlock::new());
    pipeline.add_process(Node::process(a)).unwrap();
    pipeline.add_process(Node::process(b.clone())).unwrap();
    pipeline.connect("a", "o", "b", "i").unwrap();

    pipeline.setup_pipeline().unwrap();
    assert_eq!(b.borrow().input_type("i"), Some(PortType::concrete("bytes")));
}
