use crate::memory::geometry::{LiveRange, MemAllocation, MemRegion};
use crate::memory::strategies::sorted_by_start;

/// Stack every item on top of the previous one, in range-start order.
///
/// No storage is ever reused, so the arena size is the sum of all sizes.
/// This is the upper-bound witness the validator tests are checked against.
pub fn naive(managed_live_ranges: &[(LiveRange, i64)]) -> Vec<MemAllocation> {
    let items = sorted_by_start(managed_live_ranges);
    let mut allocations = Vec::with_capacity(items.len());
    let mut offset = 0i64;
    for (lvr, size) in items {
        allocations.push(MemAllocation {
            lvr,
            reg: MemRegion { offset, size },
        });
        offset += size;
    }
    allocations
}
