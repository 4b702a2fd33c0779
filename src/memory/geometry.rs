use serde::{Deserialize, Serialize};

/// Alignment the default allocator hands out; every size entering the
/// packing heuristics is rounded up to a multiple of this.
pub const DEFAULT_ALIGNMENT: i64 = 64;

/// Closed interval of instruction timestamps a value is live for
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
pub struct LiveRange {
    pub begin: i64,
    pub end: i64,
}

impl LiveRange {
    pub fn new(begin: i64, end: i64) -> Self {
        debug_assert!(begin <= end);
        Self { begin, end }
    }

    pub fn length(&self) -> i64 {
        self.end - self.begin
    }
}

impl std::fmt::Display for LiveRange {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "[{}, {}]", self.begin, self.end)
    }
}

/// Byte region inside the arena
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
pub struct MemRegion {
    pub offset: i64,
    pub size: i64,
}

impl MemRegion {
    pub fn new(offset: i64, size: i64) -> Self {
        debug_assert!(offset >= 0);
        debug_assert!(size > 0);
        Self { offset, size }
    }

    /// One past the last byte of the region
    pub fn end(&self) -> i64 {
        self.offset + self.size
    }
}

impl std::fmt::Display for MemRegion {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "{{offset: {}, size: {}}}", self.offset, self.size)
    }
}

/// A live range seated at a region of the arena
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub struct MemAllocation {
    pub lvr: LiveRange,
    pub reg: MemRegion,
}

impl std::fmt::Display for MemAllocation {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "{}, {}", self.lvr, self.reg)
    }
}

/// Outcome of intersecting two closed intervals
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Intersect {
    Disjoint,
    /// The intervals share exactly one point
    SinglePoint,
    Overlap,
}

/// Three-valued intersection of `[a, b]` and `[c, d]`.
///
/// All arithmetic is checked; any overflow is reported as `Overlap`, which
/// is the conservative answer for packing.
pub fn intersect_area(a: i64, b: i64, c: i64, d: i64) -> Intersect {
    debug_assert!(a <= b);
    debug_assert!(c <= d);
    let lengths = b
        .checked_sub(a)
        .zip(d.checked_sub(c))
        .and_then(|(l1, l2)| l1.checked_add(l2));
    let outer = b.max(d).checked_sub(a.min(c));
    match outer.zip(lengths).and_then(|(o, l)| o.checked_sub(l)) {
        // sum of lengths exceeds what the outer hull can hold
        Some(slack) if slack > 0 => Intersect::Disjoint,
        Some(0) => Intersect::SinglePoint,
        Some(_) => Intersect::Overlap,
        None => Intersect::Overlap,
    }
}

/// True iff the two live ranges conflict in time.
///
/// A single shared endpoint is not a conflict: the consumer scheduled at the
/// instant a value dies may reuse the storage it just freed.
pub fn intersect_live_range(lvr1: LiveRange, lvr2: LiveRange) -> bool {
    intersect_area(lvr1.begin, lvr1.end, lvr2.begin, lvr2.end) == Intersect::Overlap
}

/// True iff the two regions conflict in space. Regions that merely abut
/// (`[0, n)` next to `[n, m)`) do not conflict.
pub fn intersect_mem_region(reg1: MemRegion, reg2: MemRegion) -> bool {
    let ends = reg1
        .offset
        .checked_add(reg1.size)
        .zip(reg2.offset.checked_add(reg2.size));
    match ends {
        Some((end1, end2)) => {
            intersect_area(reg1.offset, end1, reg2.offset, end2) == Intersect::Overlap
        }
        None => true,
    }
}

/// True iff two allocations conflict in both time and space
pub fn intersect_allocs(m1: &MemAllocation, m2: &MemAllocation) -> bool {
    intersect_live_range(m1.lvr, m2.lvr) && intersect_mem_region(m1.reg, m2.reg)
}

/// Round a byte size up to the platform allocation alignment
pub fn compute_aligned_tensor_size(size: i64) -> i64 {
    debug_assert!(size >= 0);
    match size.checked_add(DEFAULT_ALIGNMENT - 1) {
        Some(padded) => padded / DEFAULT_ALIGNMENT * DEFAULT_ALIGNMENT,
        None => i64::MAX / DEFAULT_ALIGNMENT * DEFAULT_ALIGNMENT,
    }
}

/// Highest byte any allocation touches, i.e. the arena size the plan needs
pub fn total_allocation_size(allocations: &[MemAllocation]) -> i64 {
    allocations
        .iter()
        .map(|alloc| alloc.reg.end())
        .max()
        .unwrap_or(0)
}
