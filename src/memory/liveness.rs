use std::collections::{HashMap, HashSet};

use tracing::{debug, warn};

use crate::error::{Error, Result};
use crate::memory::geometry::LiveRange;
use crate::model::{always_alive_values, AliasSummary, Graph, Node, NodeId};
use crate::ops::registry::OperatorRegistry;

/// Managed values, their byte sizes and live ranges, plus the out-variant
/// nodes that produce them.
#[derive(Debug, Clone)]
pub struct ManagedLiveInfo {
    /// Nodes whose outputs can be redirected into arena storage,
    /// in schedule order
    pub out_nodes: Vec<NodeId>,
    /// Raw (unaligned) storage size per managed value
    pub sizes: HashMap<String, i64>,
    /// Live range per managed value
    pub ranges: HashMap<String, LiveRange>,
    /// Values that fall back to the default allocator
    pub leaked: HashSet<String>,
}

/// Byte size of the value's storage, if its tensor type is fully concrete.
///
/// Values this returns `None` for are leaked, never managed.
pub fn compute_storage_size(graph: &Graph, value: &str) -> Option<i64> {
    let Some(info) = graph.value_types.get(value) else {
        warn!(value, "value has no tensor type");
        return None;
    };
    let Some(dtype) = info.dtype else {
        warn!(value, "value was profiled but has no scalar type");
        return None;
    };
    let Some(numel) = info.numel() else {
        warn!(value, "value was profiled but has no concrete sizes");
        return None;
    };
    match numel.checked_mul(dtype.size_in_bytes()) {
        Some(size) => Some(size),
        None => {
            warn!(value, "storage size overflows");
            None
        }
    }
}

/// A list or tuple constructor whose operands all come from out-variant
/// nodes. The container itself leaks, but its members are managed
/// independently, so it may flow through the plan.
fn is_optimizable_container(
    node: &Node,
    producers: &HashMap<&str, NodeId>,
    node_has_out_variant: &HashMap<NodeId, bool>,
) -> bool {
    if node.op_type != "prim::ListConstruct" && node.op_type != "prim::TupleConstruct" {
        return false;
    }
    node.inputs.iter().all(|input| {
        producers
            .get(input.as_str())
            .map(|id| node_has_out_variant.get(id).copied().unwrap_or(false))
            .unwrap_or(false)
    })
}

/// Pick the values whose storage the planner will manage.
///
/// Only outputs of nodes with an out variant are candidates; of those,
/// always-alive values are skipped and values without a concrete positive
/// size are leaked.
pub fn managed_values(
    graph: &Graph,
    registry: &OperatorRegistry,
    always_alive: &HashSet<String>,
) -> (Vec<NodeId>, HashMap<String, i64>, HashSet<String>) {
    let node_has_out_variant: HashMap<NodeId, bool> = graph
        .nodes
        .iter()
        .map(|node| (node.id, registry.has_out_variant(&node.op_type)))
        .collect();
    let producers: HashMap<&str, NodeId> = graph
        .nodes
        .iter()
        .flat_map(|node| node.outputs.iter().map(move |out| (out.as_str(), node.id)))
        .collect();

    let mut out_nodes = Vec::new();
    let mut managed = HashMap::new();
    let mut leaked = HashSet::new();

    for node in &graph.nodes {
        if !node_has_out_variant[&node.id] {
            continue;
        }
        out_nodes.push(node.id);
        for out_v in &node.outputs {
            if always_alive.contains(out_v) {
                continue;
            }
            match compute_storage_size(graph, out_v) {
                Some(size) if size > 0 => {
                    managed.insert(out_v.clone(), size);
                }
                _ => {
                    if !is_optimizable_container(node, &producers, &node_has_out_variant) {
                        warn!(value = %out_v, op = %node.op_type, "not handling unsupported value");
                    }
                    leaked.insert(out_v.clone());
                }
            }
        }
    }
    if !leaked.is_empty() {
        let mut names: Vec<&str> = leaked.iter().map(|s| s.as_str()).collect();
        names.sort_unstable();
        debug!(leaked = %names.join(","), "memory planning leaked values");
    }
    (out_nodes, managed, leaked)
}

/// Live range of every confined value: definition index through last use
/// index in the schedule. Always-alive values are excluded.
pub fn live_ranges(graph: &Graph, always_alive: &HashSet<String>) -> HashMap<String, LiveRange> {
    let mut first_use: HashMap<&str, usize> = HashMap::new();
    let mut last_use: HashMap<&str, usize> = HashMap::new();

    for (idx, node) in graph.nodes.iter().enumerate() {
        for out_v in &node.outputs {
            first_use.entry(out_v.as_str()).or_insert(idx);
            last_use.entry(out_v.as_str()).or_insert(idx);
        }
        for in_v in &node.inputs {
            if in_v.is_empty() {
                continue;
            }
            // schedule order makes this the running maximum
            if first_use.contains_key(in_v.as_str()) {
                last_use.insert(in_v.as_str(), idx);
            }
        }
    }

    first_use
        .into_iter()
        .filter(|(name, _)| !always_alive.contains(*name))
        .map(|(name, begin)| {
            let end = last_use.get(name).copied().unwrap_or(begin);
            (name.to_string(), LiveRange::new(begin as i64, end as i64))
        })
        .collect()
}

/// Run the liveness analysis and intersect it with the managed value set.
///
/// A managed value without a live range means the liveness pass and the
/// value selection disagree, which is fatal.
pub fn managed_live_info(
    graph: &Graph,
    registry: &OperatorRegistry,
    alias: &AliasSummary,
) -> Result<ManagedLiveInfo> {
    let always_alive = always_alive_values(graph, alias);
    let (out_nodes, sizes, leaked) = managed_values(graph, registry, &always_alive);
    let all_ranges = live_ranges(graph, &always_alive);

    let mut ranges = HashMap::with_capacity(sizes.len());
    for name in sizes.keys() {
        match all_ranges.get(name) {
            Some(&lvr) => {
                ranges.insert(name.clone(), lvr);
            }
            None => {
                return Err(Error::LivenessContract(format!(
                    "managed value {} has no live range",
                    name
                )));
            }
        }
    }
    Ok(ManagedLiveInfo {
        out_nodes,
        sizes,
        ranges,
        leaked,
    })
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::model::{DataType, TensorTypeInfo};

    fn graph_with_chain() -> Graph {
        let mut graph = Graph::new("chain");
        graph.inputs.push("x".to_string());
        graph.add_node("relu", &["x"], &["a"]);
        graph.add_node("relu", &["a"], &["b"]);
        graph.add_node("add", &["a", "b"], &["y"]);
        graph.outputs.push("y".to_string());
        for v in ["x", "a", "b", "y"] {
            graph.set_value_type(v, TensorTypeInfo::new(DataType::Float, vec![4, 4]));
        }
        graph
    }

    #[test]
    fn test_live_ranges_def_to_last_use() {
        let graph = graph_with_chain();
        let always_alive = always_alive_values(&graph, &AliasSummary::new());
        let ranges = live_ranges(&graph, &always_alive);

        assert_eq!(ranges["a"], LiveRange::new(0, 2));
        assert_eq!(ranges["b"], LiveRange::new(1, 2));
        // graph input and output are not confined
        assert!(!ranges.contains_key("x"));
        assert!(!ranges.contains_key("y"));
    }

    #[test]
    fn test_managed_values_sized_from_type() {
        let graph = graph_with_chain();
        let registry = OperatorRegistry::with_standard_ops();
        let info = managed_live_info(&graph, &registry, &AliasSummary::new()).unwrap();

        assert_eq!(info.sizes["a"], 64);
        assert_eq!(info.sizes["b"], 64);
        assert!(!info.sizes.contains_key("y"));
        assert_eq!(info.out_nodes.len(), 3);
        assert!(info.leaked.is_empty());
    }

    #[test]
    fn test_value_without_type_is_leaked() {
        let mut graph = graph_with_chain();
        graph.value_types.remove("b");
        let registry = OperatorRegistry::with_standard_ops();
        let info = managed_live_info(&graph, &registry, &AliasSummary::new()).unwrap();

        assert!(!info.sizes.contains_key("b"));
        assert!(info.leaked.contains("b"));
        // the rest of the graph still plans
        assert!(info.sizes.contains_key("a"));
    }

    #[test]
    fn test_non_out_variant_outputs_are_not_candidates() {
        let mut graph = Graph::new("views");
        graph.inputs.push("x".to_string());
        graph.add_node("reshape", &["x"], &["v"]);
        graph.add_node("relu", &["v"], &["y"]);
        graph.outputs.push("y".to_string());
        for v in ["x", "v", "y"] {
            graph.set_value_type(v, TensorTypeInfo::new(DataType::Float, vec![8]));
        }
        let registry = OperatorRegistry::with_standard_ops();
        let info = managed_live_info(&graph, &registry, &AliasSummary::new()).unwrap();
        assert!(!info.sizes.contains_key("v"));
        assert_eq!(info.out_nodes.len(), 1);
    }

    #[test]
    fn test_container_of_managed_members_leaks_silently() {
        let mut graph = Graph::new("container");
        graph.inputs.push("x".to_string());
        graph.add_node("relu", &["x"], &["a"]);
        graph.add_node("relu", &["x"], &["b"]);
        graph.add_node("prim::ListConstruct", &["a", "b"], &["lst"]);
        graph.add_node("cat", &["lst"], &["y"]);
        graph.outputs.push("y".to_string());
        for v in ["x", "a", "b", "y"] {
            graph.set_value_type(v, TensorTypeInfo::new(DataType::Float, vec![2]));
        }
        let registry = OperatorRegistry::with_standard_ops();
        let info = managed_live_info(&graph, &registry, &AliasSummary::new()).unwrap();
        assert!(info.leaked.contains("lst"));
        assert!(info.sizes.contains_key("a"));
        assert!(info.sizes.contains_key("b"));
    }
}
