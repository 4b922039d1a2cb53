//! Property tests over randomly shaped pipelines.

use conflux::config::ConfigBlock;
use conflux::pipeline::Pipeline;
use conflux::port::{PortInfo, PortType};
use conflux::process::Node;
use conflux::rational::Rational;
use conflux::testing::StubProcess;
use proptest::prelude::*;
use std::cell::RefCell;
use std::rc::Rc;

/// Build a linear chain where stage k consumes at `1/downs[k]` of its
/// input rate.
fn chain(downs: &[u64]) -> (Pipeline, Vec<Rc<RefCell<StubProcess>>>) {
    let mut pipeline = Pipeline::new(ConfigBlock::new());
    let mut handles = Vec::new();

    let head = StubProcess::new("p0")
        .output(
            "o",
            PortInfo::new(PortType::concrete("int")).with_frequency(Some(Rational::ONE)),
        )
        .handle();
    pipeline.add_process(Node::process(head.clone())).unwrap();
    handles.push(head);

    for (k, &down) in downs.iter().enumerate() {
        let name = format!("p{}", k + 1);
        let stage = StubProcess::new(&name)
            .input(
                "i",
                PortInfo::new(PortType::concrete("int"))
                    .with_frequency(Some(Rational::new(1, down))),
            )
            .output(
                "o",
                PortInfo::new(PortType::concrete("int")).with_frequency(Some(Rational::ONE)),
            )
            .handle();
        pipeline.add_process(Node::process(stage.clone())).unwrap();
        pipeline
            .connect(&format!("p{}", k), "o", &name, "i")
            .unwrap();
        handles.push(stage);
    }

    (pipeline, handles)
}

proptest! {
    #[test]
    fn chains_always_assemble(downs in prop::collection::vec(1u64..=4, 1..6)) {
        let (mut pipeline, handles) = chain(&downs);
        pipeline.setup_pipeline().unwrap();
        prop_assert!(pipeline.setup_successful());

        // Every process got exactly one core frequency, and each edge is
        // rate-consistent: freq(up) * upPortFreq == freq(down) * downPortFreq.
        let mut expect = Rational::ONE;
        let mut time_base = 1u64;
        for &down in &downs {
            expect = expect / Rational::new(1, down);
            time_base = conflux::rational::lcm(time_base, expect.denominator());
        }

        let mut freq = Rational::ONE;
        for (k, handle) in handles.iter().enumerate() {
            let core = handle.borrow().core_frequency().expect("assigned");
            prop_assert_eq!(core, time_base * freq);
            prop_assert!(core.is_integer());
            if k < downs.len() {
                freq = freq / Rational::new(1, downs[k]);
            }
        }
    }

    #[test]
    fn setup_is_deterministic_across_reset(downs in prop::collection::vec(1u64..=4, 1..5)) {
        let (mut pipeline, handles) = chain(&downs);
        pipeline.setup_pipeline().unwrap();
        let first: Vec<_> = handles
            .iter()
            .map(|h| h.borrow().core_frequency())
            .collect();

        pipeline.reset().unwrap();
        pipeline.setup_pipeline().unwrap();
        let second: Vec<_> = handles
            .iter()
            .map(|h| h.borrow().core_frequency())
            .collect();

        prop_assert_eq!(first, second);
    }

    #[test]
    fn connect_disconnect_roundtrip(count in 1usize..8) {
        let mut pipeline = Pipeline::new(ConfigBlock::new());
        let a = StubProcess::new("a")
            .output("o", PortInfo::new(PortType::Any))
            .handle();
        pipeline.add_process(Node::process(a)).unwrap();

        for k in 0..count {
            let name = format!("sink{}", k);
            let sink = StubProcess::new(&name)
                .input("i", PortInfo::new(PortType::Any))
                .handle();
            pipeline.add_process(Node::process(sink)).unwrap();
            pipeline.connect("a", "o", &name, "i").unwrap();
        }
        prop_assert_eq!(pipeline.connections_from_addr("a", "o").len(), count);

        for k in 0..count {
            pipeline.disconnect("a", "o", &format!("sink{}", k), "i").unwrap();
        }
        prop_assert!(pipeline.connections_from_addr("a", "o").is_empty());
    }
}
