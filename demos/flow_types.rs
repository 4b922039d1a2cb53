use conflux::config::ConfigBlock;
use conflux::pipeline::Pipeline;
use conflux::port::{PortInfo, PortType};
use conflux::process::Node;
use conflux::testing::StubProcess;

fn main() {
    // A generic pass-through chain: nothing in the middle declares a
    // concrete type, so the sink's "int" must propagate all the way back.
    let source = StubProcess::new("source")
        .output("o", PortInfo::new(PortType::FlowDependent("T".to_string())))
        .handle();
    let filter = StubProcess::new("filter")
        .input("i", PortInfo::new(PortType::FlowDependent("T".to_string())))
        .output("o", PortInfo::new(PortType::FlowDependent("T".to_string())))
        .handle();
    let sink = StubProcess::new("sink")
        .input("i", PortInfo::new(PortType::concrete("int")))
        .handle();

    let mut pipeline = Pipeline::new(ConfigBlock::new());
    pipeline.add_process(Node::process(source.clone())).unwrap();
    pipeline.add_process(Node::process(filter.clone())).unwrap();
    pipeline.add_process(Node::process(sink)).unwrap();
    pipeline.connect("source", "o", "filter", "i").unwrap();
    pipeline.connect("filter", "o", "sink", "i").unwrap();

    println!("before setup: source.o is {}", source.borrow().output_type("o").unwrap());

    pipeline.setup_pipeline().unwrap();

    println!("after setup:  source.o is {}", source.borrow().output_type("o").unwrap());
    println!("after setup:  filter.i is {}", filter.borrow().input_type("i").unwrap());
    println!("after setup:  filter.o is {}", filter.borrow().output_type("o").unwrap());
}
