pub mod geometry;
pub mod liveness;
pub mod planner;
pub mod rewriter;
pub mod strategies;
pub mod trace;
pub mod validation;

pub use geometry::{
    compute_aligned_tensor_size, intersect_allocs, intersect_area, intersect_live_range,
    intersect_mem_region, total_allocation_size, Intersect, LiveRange, MemAllocation, MemRegion,
    DEFAULT_ALIGNMENT,
};

pub use liveness::{
    compute_storage_size, live_ranges, managed_live_info, managed_values, ManagedLiveInfo,
};

pub use planner::{
    plan_memory, plan_memory_with_tracing, render_allocations, PlanOutcome, TracePlan,
};

pub use rewriter::{
    apply_plan, apply_trace_plan, insert_alloc_storage_node, insert_alloc_tensor_nodes,
    insert_collect_allocated_tensors_node, insert_prealloc_tensor_nodes, ALLOCATE_STORAGE_OP,
    ALLOCATE_TENSOR_OP, COLLECT_ALLOCATED_TENSORS_OP, PRE_ALLOCATE_TENSOR_OP,
};

pub use strategies::{
    greedy_by_longest_and_size, greedy_by_operator_breadth, greedy_by_size,
    greedy_by_size_with_first_gap, linear_scan, naive, Strategy,
};

pub use trace::{
    collect_live_ranges_per_node, managed_ranges_from_events, FrameNodeId, MemEvent, MemEventKind,
};

pub use validation::validate_allocations;
