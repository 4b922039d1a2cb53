use conflux::config::ConfigBlock;
use conflux::pipeline::Pipeline;
use conflux::port::{PortFlags, PortInfo, PortType};
use conflux::process::Node;
use conflux::rational::Rational;
use conflux::testing::StubProcess;

fn main() {
    // A reader feeding a detector feeding a writer, with the detector
    // consuming every other frame.
    let reader = StubProcess::new("reader")
        .output(
            "frame",
            PortInfo::new(PortType::concrete("image")).with_frequency(Some(Rational::ONE)),
        )
        .handle();
    let detector = StubProcess::new("detector")
        .input(
            "frame",
            PortInfo::new(PortType::concrete("image"))
                .with_flags(PortFlags::REQUIRED)
                .with_frequency(Some(Rational::new(2, 1))),
        )
        .output(
            "detections",
            PortInfo::new(PortType::concrete("detections")).with_frequency(Some(Rational::ONE)),
        )
        .handle();
    let writer = StubProcess::new("writer")
        .input(
            "detections",
            PortInfo::new(PortType::concrete("detections")).with_flags(PortFlags::REQUIRED),
        )
        .handle();

    // Edge configuration layered by type and by endpoint.
    let mut config = ConfigBlock::new();
    config.set_value("_edge:capacity", "10");
    config.set_value("_edge_by_type:image:capacity", "2");
    config.set_value("_edge_by_conn:writer.detections:capacity", "50");

    let mut pipeline = Pipeline::new(config);
    pipeline.add_process(Node::process(reader.clone())).unwrap();
    pipeline.add_process(Node::process(detector.clone())).unwrap();
    pipeline.add_process(Node::process(writer.clone())).unwrap();
    pipeline.connect("reader", "frame", "detector", "frame").unwrap();
    pipeline
        .connect("detector", "detections", "writer", "detections")
        .unwrap();

    // Validate, resolve, and materialize.
    pipeline.setup_pipeline().unwrap();

    for (proc, label) in [(&reader, "reader"), (&detector, "detector"), (&writer, "writer")] {
        println!(
            "{} runs at {}",
            label,
            proc.borrow().core_frequency().unwrap()
        );
    }

    let edge = pipeline
        .edge_for_connection("reader", "frame", "detector", "frame")
        .unwrap()
        .unwrap();
    println!(
        "reader -> detector edge capacity: {:?}",
        edge.borrow().config().get("capacity")
    );
}
