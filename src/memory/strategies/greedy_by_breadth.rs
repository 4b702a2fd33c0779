use std::cmp::Reverse;
use std::collections::{HashMap, HashSet};

use crate::memory::geometry::{LiveRange, MemAllocation};
use crate::memory::strategies::greedy_by_size::{make_allocation, GapFinding};
use crate::model::{Graph, NodeId};

/// Sum of the sizes of every managed value live while the node executes
fn operator_breadth(
    timestamp: i64,
    managed_values: &HashMap<String, i64>,
    managed_ranges: &HashMap<String, LiveRange>,
) -> i64 {
    managed_ranges
        .iter()
        .filter(|(_, lvr)| lvr.begin <= timestamp && timestamp <= lvr.end)
        .filter_map(|(name, _)| managed_values.get(name))
        .sum()
}

/// Seat the outputs of the most congested operators first.
///
/// The congested moments of the schedule dictate the packing; ordering
/// nodes by breadth lets their participants claim the bottom of the arena
/// before narrow moments fill the holes. A value already placed on behalf
/// of a wider node is skipped when its own node comes up.
pub fn greedy_by_operator_breadth(
    managed_values: &HashMap<String, i64>,
    managed_ranges: &HashMap<String, LiveRange>,
    out_nodes: &[NodeId],
    graph: &Graph,
) -> Vec<MemAllocation> {
    let mut nodes_by_breadth: Vec<usize> = out_nodes
        .iter()
        .filter_map(|&id| graph.node_index(id))
        .collect();
    nodes_by_breadth.sort_by_key(|&idx| {
        (
            Reverse(operator_breadth(idx as i64, managed_values, managed_ranges)),
            idx,
        )
    });

    let mut allocations = Vec::with_capacity(managed_values.len());
    let mut placed: HashSet<&str> = HashSet::with_capacity(managed_values.len());
    for idx in nodes_by_breadth {
        let node = &graph.nodes[idx];
        let mut outputs: Vec<(&str, i64, LiveRange)> = node
            .outputs
            .iter()
            .filter_map(|out_v| {
                let size = managed_values.get(out_v)?;
                let lvr = managed_ranges.get(out_v)?;
                Some((out_v.as_str(), *size, *lvr))
            })
            .collect();
        outputs.sort_by_key(|&(_, size, lvr)| (Reverse(size), lvr));

        for (name, size, lvr) in outputs {
            if !placed.insert(name) {
                continue;
            }
            make_allocation(lvr, size, &mut allocations, GapFinding::FirstGap);
        }
    }
    allocations
}
