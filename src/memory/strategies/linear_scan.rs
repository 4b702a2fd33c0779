use crate::memory::geometry::{LiveRange, MemAllocation, MemRegion};
use crate::memory::strategies::sorted_by_start;

struct ActiveItem {
    lvr: LiveRange,
    reg: MemRegion,
}

/// Return a freed region to the free list, coalescing with any gap it abuts.
fn release(free_list: &mut Vec<MemRegion>, reg: MemRegion) {
    let idx = free_list.partition_point(|gap| gap.offset < reg.offset);
    free_list.insert(idx, reg);
    if idx + 1 < free_list.len() && free_list[idx].end() == free_list[idx + 1].offset {
        free_list[idx].size += free_list[idx + 1].size;
        free_list.remove(idx + 1);
    }
    if idx > 0 && free_list[idx - 1].end() == free_list[idx].offset {
        free_list[idx - 1].size += free_list[idx].size;
        free_list.remove(idx);
    }
}

/// Classical register-allocation-style scan over range starts.
///
/// Items whose ranges have expired are evicted from the active set and
/// their regions returned to a free list of gaps; a new item takes the
/// lowest-offset gap that fits, or fresh space above the current ceiling.
pub fn linear_scan(managed_live_ranges: &[(LiveRange, i64)]) -> Vec<MemAllocation> {
    let items = sorted_by_start(managed_live_ranges);
    let mut allocations = Vec::with_capacity(items.len());
    let mut active: Vec<ActiveItem> = Vec::new();
    let mut free_list: Vec<MemRegion> = Vec::new();
    let mut ceiling = 0i64;

    for (lvr, size) in items {
        let mut still_active = Vec::with_capacity(active.len());
        for item in active {
            if item.lvr.end < lvr.begin {
                release(&mut free_list, item.reg);
            } else {
                still_active.push(item);
            }
        }
        active = still_active;

        let reg = match free_list.iter().position(|gap| gap.size >= size) {
            Some(idx) => {
                let gap = free_list[idx];
                if gap.size == size {
                    free_list.remove(idx);
                } else {
                    free_list[idx] = MemRegion {
                        offset: gap.offset + size,
                        size: gap.size - size,
                    };
                }
                MemRegion {
                    offset: gap.offset,
                    size,
                }
            }
            None => {
                let reg = MemRegion {
                    offset: ceiling,
                    size,
                };
                ceiling += size;
                reg
            }
        };
        active.push(ActiveItem { lvr, reg });
        allocations.push(MemAllocation { lvr, reg });
    }
    allocations
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::memory::validation::validate_allocations;

    #[test]
    fn test_expired_region_is_reused() {
        let managed = vec![
            (LiveRange::new(1, 3), 32),
            (LiveRange::new(2, 5), 32),
            (LiveRange::new(4, 6), 32),
        ];
        let allocations = linear_scan(&managed);
        let offset_of = |b, e| {
            allocations
                .iter()
                .find(|a| a.lvr == LiveRange::new(b, e))
                .unwrap()
                .reg
                .offset
        };
        assert_eq!(offset_of(1, 3), 0);
        assert_eq!(offset_of(2, 5), 32);
        assert_eq!(offset_of(4, 6), 0);
        validate_allocations(&allocations).unwrap();
    }

    #[test]
    fn test_free_list_coalesces_neighbours() {
        // three regions expire back-to-back; the follower needs their
        // combined space
        let managed = vec![
            (LiveRange::new(0, 1), 32),
            (LiveRange::new(0, 2), 32),
            (LiveRange::new(1, 2), 16),
            (LiveRange::new(3, 4), 64),
        ];
        let allocations = linear_scan(&managed);
        validate_allocations(&allocations).unwrap();
        let last = allocations
            .iter()
            .find(|a| a.lvr == LiveRange::new(3, 4))
            .unwrap();
        // the freed regions coalesce into a single gap at offset 0
        assert_eq!(last.reg.offset, 0);
    }

    #[test]
    fn test_still_active_items_keep_their_regions() {
        let managed = vec![
            (LiveRange::new(0, 10), 64),
            (LiveRange::new(1, 2), 16),
            (LiveRange::new(3, 4), 16),
        ];
        let allocations = linear_scan(&managed);
        validate_allocations(&allocations).unwrap();
        // the long-lived item at offset 0 pins the small ones above it
        // until it expires; the second small item reuses the first's gap
        assert_eq!(allocations[0].reg.offset, 0);
        assert_eq!(allocations[1].reg.offset, 64);
        assert_eq!(allocations[2].reg.offset, 64);
    }
}
