pub mod error;
pub mod memory;
pub mod model;
pub mod ops;

// Re-export commonly used types
pub use error::{Error, Result};
pub use memory::{
    apply_plan, apply_trace_plan, plan_memory, plan_memory_with_tracing, render_allocations,
    validate_allocations, FrameNodeId, LiveRange, MemAllocation, MemEvent, MemEventKind,
    MemRegion, PlanOutcome, Strategy, TracePlan, DEFAULT_ALIGNMENT,
};
pub use model::{
    always_alive_values, AliasSummary, Attribute, DataType, Device, Graph, Node, NodeId,
    TensorTypeInfo,
};
pub use ops::registry::{OpSchema, OperatorRegistry};
