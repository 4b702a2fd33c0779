use crate::error::{Error, Result};
use crate::memory::geometry::{intersect_allocs, MemAllocation};

/// Prove that no two allocations conflict in both time and space.
///
/// A failure is a planner bug, never a property of the input graph; the
/// offending pair is carried in the error. The quadratic sweep is fine for
/// an offline pass over graphs with thousands of values.
pub fn validate_allocations(allocations: &[MemAllocation]) -> Result<()> {
    for (i, alloc1) in allocations.iter().enumerate() {
        for alloc2 in &allocations[i + 1..] {
            if intersect_allocs(alloc1, alloc2) {
                return Err(Error::PlanConflict(
                    alloc1.to_string(),
                    alloc2.to_string(),
                ));
            }
        }
    }
    Ok(())
}
