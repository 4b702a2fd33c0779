use std::collections::HashMap;

use tracing::debug;

use crate::error::{Error, Result};
use crate::memory::geometry::{LiveRange, MemRegion};
use crate::memory::planner::{PlanOutcome, TracePlan};
use crate::model::{Attribute, Device, Graph, NodeId};

pub const ALLOCATE_STORAGE_OP: &str = "prim::AllocateStorage";
pub const ALLOCATE_TENSOR_OP: &str = "prim::AllocateTensor";
pub const PRE_ALLOCATE_TENSOR_OP: &str = "prim::PreAllocateTensor";
pub const COLLECT_ALLOCATED_TENSORS_OP: &str = "prim::CollectAllocatedTensors";

/// Insert the single arena allocation at graph entry. Its output value is
/// the handle every per-tensor allocation node takes as its first input.
pub fn insert_alloc_storage_node(
    graph: &mut Graph,
    total_size: i64,
    device: Option<Device>,
) -> NodeId {
    let device = device.unwrap_or_else(|| graph.pick_device());
    let mut storage = graph.create_node(ALLOCATE_STORAGE_OP, &[], &[]);
    storage.outputs.push(format!("storage.{}", storage.id));
    storage
        .attributes
        .insert("total_size".to_string(), Attribute::Int(total_size));
    storage
        .attributes
        .insert("device".to_string(), Attribute::Int(device.code()));
    let id = storage.id;
    graph.nodes.insert(0, storage);
    id
}

fn storage_handle(graph: &Graph, storage: NodeId) -> Result<(String, i64, i64)> {
    let node = graph
        .node(storage)
        .ok_or_else(|| Error::Rewrite(format!("storage node {} is not in the graph", storage)))?;
    let output = node
        .outputs
        .first()
        .cloned()
        .ok_or_else(|| Error::Rewrite("storage node has no output".to_string()))?;
    let attr_int = |key: &str| match node.attributes.get(key) {
        Some(Attribute::Int(v)) => Ok(*v),
        _ => Err(Error::Rewrite(format!("storage node lacks {} attribute", key))),
    };
    Ok((output, attr_int("total_size")?, attr_int("device")?))
}

fn checked_region(
    allocations_map: &HashMap<LiveRange, MemRegion>,
    lvr: &LiveRange,
    total_size: i64,
) -> Result<MemRegion> {
    let reg = allocations_map
        .get(lvr)
        .copied()
        .ok_or_else(|| Error::Rewrite(format!("no allocation planned for range {}", lvr)))?;
    if reg.end() > total_size {
        return Err(Error::Rewrite(format!(
            "allocation {} exceeds previously planned memory of {} bytes",
            reg, total_size
        )));
    }
    Ok(reg)
}

/// Bind every managed value to its arena sub-region.
///
/// One allocation node goes in front of each value's producer, and the
/// producer gains the allocation handle as an extra input; schema
/// resolution then picks the producer's out variant at runtime.
pub fn insert_alloc_tensor_nodes(
    graph: &mut Graph,
    storage: NodeId,
    outcome: &PlanOutcome,
) -> Result<()> {
    let (storage_out, total_size, device_code) = storage_handle(graph, storage)?;
    let allocations_map = outcome.allocations_map();

    for (value, lvr) in &outcome.managed_values {
        let reg = checked_region(&allocations_map, lvr, total_size)?;
        let producer = graph
            .producer(value)
            .ok_or_else(|| Error::Rewrite(format!("managed value {} has no producer", value)))?;
        let producer_id = producer.id;
        debug!(node = %producer.header(), value = %value, "inserting allocation op");

        let type_info = graph
            .value_types
            .get(value)
            .ok_or_else(|| Error::Rewrite(format!("managed value {} has no tensor type", value)))?;
        let dtype = type_info
            .dtype
            .ok_or_else(|| Error::Rewrite(format!("managed value {} has no scalar type", value)))?;
        let (sizes, strides) = type_info.sizes_strides();

        let mut alloc = graph.create_node(ALLOCATE_TENSOR_OP, &[], &[]);
        alloc.inputs.push(storage_out.clone());
        let alloc_out = format!("alloc.{}", value);
        alloc.outputs.push(alloc_out.clone());
        alloc
            .attributes
            .insert("size".to_string(), Attribute::Int(reg.size));
        alloc
            .attributes
            .insert("offset".to_string(), Attribute::Int(reg.offset));
        alloc
            .attributes
            .insert("sizes".to_string(), Attribute::Ints(sizes));
        alloc
            .attributes
            .insert("stride".to_string(), Attribute::Ints(strides));
        alloc
            .attributes
            .insert("device".to_string(), Attribute::Int(device_code));
        alloc
            .attributes
            .insert("dtype".to_string(), Attribute::Int(dtype.code()));

        graph.insert_node_before(producer_id, alloc);
        graph
            .node_mut(producer_id)
            .ok_or_else(|| Error::Rewrite(format!("producer of {} vanished", value)))?
            .inputs
            .push(alloc_out);
    }
    Ok(())
}

/// Reproduce recorded allocations: one node per recorded live range,
/// carrying only a region, inserted in front of the node observed making
/// the allocation.
pub fn insert_prealloc_tensor_nodes(
    graph: &mut Graph,
    storage: NodeId,
    plan: &TracePlan,
) -> Result<Vec<NodeId>> {
    let (storage_out, total_size, device_code) = storage_handle(graph, storage)?;
    let allocations_map = plan.outcome.allocations_map();

    let mut inserted = Vec::new();
    for (frame, lvrs) in &plan.node_ranges {
        if graph.node(frame.node_id).is_none() {
            return Err(Error::Rewrite(format!(
                "trace frame points at unknown node {}",
                frame.node_id
            )));
        }
        for lvr in lvrs {
            let reg = checked_region(&allocations_map, lvr, total_size)?;
            debug!(node = %frame.node_header, size = reg.size, "inserting preallocation op");

            let mut alloc = graph.create_node(PRE_ALLOCATE_TENSOR_OP, &[], &[]);
            alloc.inputs.push(storage_out.clone());
            alloc.outputs.push(format!("prealloc.{}", alloc.id));
            alloc
                .attributes
                .insert("size".to_string(), Attribute::Int(reg.size));
            alloc
                .attributes
                .insert("offset".to_string(), Attribute::Int(reg.offset));
            alloc
                .attributes
                .insert("device".to_string(), Attribute::Int(device_code));
            let alloc_id = alloc.id;
            graph.insert_node_before(frame.node_id, alloc);
            inserted.push(alloc_id);
        }
    }
    Ok(inserted)
}

/// Anchor node at graph exit keeping every pre-allocated tensor alive for
/// the whole execution; without it the recorded regions could be reused
/// out from under later instructions.
pub fn insert_collect_allocated_tensors_node(graph: &mut Graph, alloc_nodes: &[NodeId]) {
    let inputs: Vec<String> = alloc_nodes
        .iter()
        .filter_map(|&id| graph.node(id).and_then(|n| n.outputs.first().cloned()))
        .collect();
    let mut collect = graph.create_node(COLLECT_ALLOCATED_TENSORS_OP, &[], &[]);
    collect.inputs = inputs;
    graph.nodes.push(collect);
}

/// Apply a statically planned outcome to the graph it was planned for
pub fn apply_plan(graph: &mut Graph, outcome: &PlanOutcome) -> Result<NodeId> {
    let storage = insert_alloc_storage_node(graph, outcome.total_size, None);
    insert_alloc_tensor_nodes(graph, storage, outcome)?;
    Ok(storage)
}

/// Apply a trace-derived plan to the graph it was recorded from
pub fn apply_trace_plan(graph: &mut Graph, plan: &TracePlan) -> Result<NodeId> {
    let storage = insert_alloc_storage_node(graph, plan.outcome.total_size, None);
    let inserted = insert_prealloc_tensor_nodes(graph, storage, plan)?;
    insert_collect_allocated_tensors_node(graph, &inserted);
    Ok(storage)
}
