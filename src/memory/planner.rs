use std::collections::HashMap;
use std::fmt::Write as _;

use serde::Serialize;
use tracing::{debug, warn};

use crate::error::{Error, Result};
use crate::memory::geometry::{
    compute_aligned_tensor_size, total_allocation_size, LiveRange, MemAllocation, MemRegion,
};
use crate::memory::liveness::{managed_live_info, ManagedLiveInfo};
use crate::memory::strategies::{
    greedy_by_longest_and_size, greedy_by_operator_breadth, greedy_by_size,
    greedy_by_size_with_first_gap, linear_scan, naive, Strategy,
};
use crate::memory::trace::{
    collect_live_ranges_per_node, managed_ranges_from_events, FrameNodeId, MemEvent,
};
use crate::memory::validation::validate_allocations;
use crate::model::{AliasSummary, Graph};
use crate::ops::registry::OperatorRegistry;

/// The planner's result: a packed arena and the values bound into it.
///
/// Handing this to the rewriter is the only thing left to do with it; the
/// planner itself never mutates the graph.
#[derive(Debug, Clone, Serialize)]
pub struct PlanOutcome {
    pub strategy: Strategy,
    /// Arena size: the highest byte any allocation touches
    pub total_size: i64,
    pub allocations: Vec<MemAllocation>,
    /// Managed values and their ranges, ordered by range start. When two
    /// distinct values share a range, the later one in schedule order
    /// keeps the record.
    pub managed_values: Vec<(String, LiveRange)>,
}

impl PlanOutcome {
    /// Region seated at each live range. With duplicate ranges the last
    /// placed allocation wins, matching the managed-value record.
    pub fn allocations_map(&self) -> HashMap<LiveRange, MemRegion> {
        self.allocations
            .iter()
            .map(|alloc| (alloc.lvr, alloc.reg))
            .collect()
    }

    pub fn to_json(&self) -> Result<String> {
        Ok(serde_json::to_string_pretty(self)?)
    }
}

/// A plan derived from a recorded trace, plus the per-node ranges the
/// trace rewriter needs to reproduce the recorded allocations.
#[derive(Debug, Clone)]
pub struct TracePlan {
    pub outcome: PlanOutcome,
    pub node_ranges: Vec<(FrameNodeId, Vec<LiveRange>)>,
}

/// Walk the schedule and collect one packing item per managed value, sizes
/// aligned, plus the range-to-value record used for printing and rewriting.
fn managed_schedule_items(
    graph: &Graph,
    info: &ManagedLiveInfo,
) -> (Vec<(LiveRange, i64)>, Vec<(String, LiveRange)>) {
    let mut items = Vec::with_capacity(info.sizes.len());
    let mut record: HashMap<LiveRange, String> = HashMap::with_capacity(info.sizes.len());
    for node in &graph.nodes {
        for out_v in &node.outputs {
            if let (Some(&size), Some(&lvr)) = (info.sizes.get(out_v), info.ranges.get(out_v)) {
                items.push((lvr, compute_aligned_tensor_size(size)));
                if let Some(earlier) = record.insert(lvr, out_v.clone()) {
                    warn!(range = %lvr, earlier = %earlier, later = %out_v, "overlapping live ranges");
                }
            }
        }
    }
    let mut managed_values: Vec<(String, LiveRange)> =
        record.into_iter().map(|(lvr, name)| (name, lvr)).collect();
    managed_values.sort_by(|(n1, l1), (n2, l2)| l1.cmp(l2).then(n1.cmp(n2)));
    (items, managed_values)
}

/// Plan the arena for a graph: extract managed values and their live
/// ranges, pack them with the chosen strategy, and prove the packing
/// conflict-free.
pub fn plan_memory(
    graph: &Graph,
    registry: &OperatorRegistry,
    alias: &AliasSummary,
    strategy: Strategy,
) -> Result<PlanOutcome> {
    graph.validate_schedule()?;
    let info = managed_live_info(graph, registry, alias)?;
    let (items, managed_values) = managed_schedule_items(graph, &info);

    let allocations = match strategy {
        Strategy::Naive => naive(&items),
        Strategy::LinearScan => linear_scan(&items),
        Strategy::GreedyBySize => greedy_by_size(&items),
        Strategy::GreedyBySizeWithFirstGap => greedy_by_size_with_first_gap(&items),
        Strategy::GreedyByLongestAndSize => greedy_by_longest_and_size(&items),
        Strategy::GreedyByBreadth => {
            let aligned_sizes: HashMap<String, i64> = info
                .sizes
                .iter()
                .map(|(name, &size)| (name.clone(), compute_aligned_tensor_size(size)))
                .collect();
            greedy_by_operator_breadth(&aligned_sizes, &info.ranges, &info.out_nodes, graph)
        }
    };

    validate_allocations(&allocations)?;
    let total_size = total_allocation_size(&allocations);
    debug!(%strategy, total_size, count = allocations.len(), "planned arena");
    Ok(PlanOutcome {
        strategy,
        total_size,
        allocations,
        managed_values,
    })
}

/// Plan the arena from a recorded allocate/free trace instead of static
/// liveness.
///
/// Only NAIVE, LINEAR_SCAN and GREEDY_BY_SIZE are supported here: the
/// breadth-family strategies need per-node liveness a trace cannot supply
/// unambiguously, so asking for one is reported rather than silently
/// remapped.
pub fn plan_memory_with_tracing(
    graph: &Graph,
    strategy: Strategy,
    events: &[MemEvent],
) -> Result<TracePlan> {
    if events.is_empty() {
        return Err(Error::InvalidTrace("empty event trace".to_string()));
    }
    graph.validate_schedule()?;
    let (ranges, pairs) = managed_ranges_from_events(events, graph)?;
    let items: Vec<(LiveRange, i64)> = ranges
        .into_iter()
        .map(|(lvr, size)| (lvr, compute_aligned_tensor_size(size)))
        .collect();

    let allocations = match strategy {
        Strategy::Naive => naive(&items),
        Strategy::LinearScan => linear_scan(&items),
        Strategy::GreedyBySize => greedy_by_size(&items),
        other => return Err(Error::StrategyNeedsGraph(other.to_string())),
    };

    validate_allocations(&allocations)?;
    let total_size = total_allocation_size(&allocations);
    debug!(%strategy, total_size, count = allocations.len(), "planned arena from trace");
    Ok(TracePlan {
        outcome: PlanOutcome {
            strategy,
            total_size,
            allocations,
            managed_values: Vec::new(),
        },
        node_ranges: collect_live_ranges_per_node(pairs),
    })
}

/// Stable line-oriented dump of a plan, one managed value per line in
/// range-start order. Regression tests diff this text.
pub fn render_allocations(outcome: &PlanOutcome) -> String {
    let allocations_map = outcome.allocations_map();
    let mut rendered = String::new();
    for (name, lvr) in &outcome.managed_values {
        if let Some(reg) = allocations_map.get(lvr) {
            let _ = writeln!(rendered, "{}: {} {}", name, lvr, reg);
        }
    }
    rendered
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::model::{DataType, TensorTypeInfo};

    fn diamond_graph() -> Graph {
        let mut graph = Graph::new("diamond");
        graph.inputs.push("x".to_string());
        graph.add_node("relu", &["x"], &["a"]);
        graph.add_node("sigmoid", &["a"], &["b"]);
        graph.add_node("tanh", &["a"], &["c"]);
        graph.add_node("add", &["b", "c"], &["y"]);
        graph.outputs.push("y".to_string());
        for v in ["x", "a", "b", "c", "y"] {
            graph.set_value_type(v, TensorTypeInfo::new(DataType::Float, vec![16]));
        }
        graph
    }

    #[test]
    fn test_every_strategy_plans_the_diamond() {
        let graph = diamond_graph();
        let registry = OperatorRegistry::with_standard_ops();
        let alias = AliasSummary::new();
        for strategy in Strategy::ALL {
            let outcome = plan_memory(&graph, &registry, &alias, strategy).unwrap();
            assert_eq!(outcome.allocations.len(), 3);
            assert_eq!(outcome.managed_values.len(), 3);
            assert!(outcome.total_size >= 128);
        }
    }

    #[test]
    fn test_naive_total_is_sum_of_aligned_sizes() {
        let graph = diamond_graph();
        let registry = OperatorRegistry::with_standard_ops();
        let outcome =
            plan_memory(&graph, &registry, &AliasSummary::new(), Strategy::Naive).unwrap();
        assert_eq!(outcome.total_size, 3 * 64);
    }

    #[test]
    fn test_render_is_ordered_by_range_start() {
        let graph = diamond_graph();
        let registry = OperatorRegistry::with_standard_ops();
        let outcome =
            plan_memory(&graph, &registry, &AliasSummary::new(), Strategy::Naive).unwrap();
        let rendered = render_allocations(&outcome);
        let lines: Vec<&str> = rendered.lines().collect();
        assert_eq!(lines.len(), 3);
        assert!(lines[0].starts_with("a: [0, 2]"));
        assert!(lines[1].starts_with("b: [1, 3]"));
        assert!(lines[2].starts_with("c: [2, 3]"));
        for line in lines {
            assert!(line.contains("{offset: "));
        }
    }

    #[test]
    fn test_trace_plan_rejects_breadth_family() {
        let graph = diamond_graph();
        let events = vec![crate::memory::trace::MemEvent::allocate(0, "w", 64, None)];
        for strategy in [
            Strategy::GreedyBySizeWithFirstGap,
            Strategy::GreedyByLongestAndSize,
            Strategy::GreedyByBreadth,
        ] {
            assert!(matches!(
                plan_memory_with_tracing(&graph, strategy, &events),
                Err(Error::StrategyNeedsGraph(_))
            ));
        }
    }

    #[test]
    fn test_empty_trace_is_fatal() {
        let graph = diamond_graph();
        assert!(matches!(
            plan_memory_with_tracing(&graph, Strategy::Naive, &[]),
            Err(Error::InvalidTrace(_))
        ));
    }

    #[test]
    fn test_json_export_round_trips_the_totals() {
        let graph = diamond_graph();
        let registry = OperatorRegistry::with_standard_ops();
        let outcome =
            plan_memory(&graph, &registry, &AliasSummary::new(), Strategy::GreedyBySize)
                .unwrap();
        let json = outcome.to_json().unwrap();
        assert!(json.contains("\"GreedyBySize\""));
        assert!(json.contains("\"total_size\""));
    }
}
