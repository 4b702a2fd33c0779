use anyhow::Result;

use memplan::memory::{plan_memory, render_allocations, Strategy};
use memplan::{apply_plan, AliasSummary, DataType, Graph, OperatorRegistry, TensorTypeInfo};

// Build a small MLP-shaped graph: two matmul+relu blocks feeding an add
fn build_graph() -> Graph {
    let mut graph = Graph::new("mlp");
    graph.inputs.push("input".to_string());
    graph.weights.extend(["w1".to_string(), "w2".to_string()]);

    graph.add_node("matmul", &["input", "w1"], &["h1"]);
    graph.add_node("relu", &["h1"], &["a1"]);
    graph.add_node("matmul", &["a1", "w2"], &["h2"]);
    graph.add_node("relu", &["h2"], &["a2"]);
    graph.add_node("add", &["a1", "a2"], &["output"]);
    graph.outputs.push("output".to_string());

    graph.set_value_type("input", TensorTypeInfo::new(DataType::Float, vec![1, 256]));
    graph.set_value_type("w1", TensorTypeInfo::new(DataType::Float, vec![256, 512]));
    graph.set_value_type("w2", TensorTypeInfo::new(DataType::Float, vec![512, 256]));
    graph.set_value_type("h1", TensorTypeInfo::new(DataType::Float, vec![1, 512]));
    graph.set_value_type("a1", TensorTypeInfo::new(DataType::Float, vec![1, 512]));
    graph.set_value_type("h2", TensorTypeInfo::new(DataType::Float, vec![1, 256]));
    graph.set_value_type("a2", TensorTypeInfo::new(DataType::Float, vec![1, 256]));
    graph.set_value_type("output", TensorTypeInfo::new(DataType::Float, vec![1, 256]));
    graph
}

fn main() -> Result<()> {
    let registry = OperatorRegistry::with_standard_ops();
    let alias = AliasSummary::new();

    println!("Arena sizes per strategy:");
    for strategy in Strategy::ALL {
        let graph = build_graph();
        let outcome = plan_memory(&graph, &registry, &alias, strategy)?;
        println!("  {:<32} {:>6} bytes", strategy.to_string(), outcome.total_size);
    }

    let mut graph = build_graph();
    let outcome = plan_memory(&graph, &registry, &alias, Strategy::GreedyBySize)?;
    println!("\nGREEDY_BY_SIZE layout:");
    print!("{}", render_allocations(&outcome));

    apply_plan(&mut graph, &outcome)?;
    println!("\nSchedule after rewriting:");
    for node in &graph.nodes {
        println!("  {}", node.header());
    }
    Ok(())
}
