use std::cmp::Reverse;

use crate::memory::geometry::{intersect_live_range, LiveRange, MemAllocation, MemRegion};

/// How to choose among the holes left between already placed items
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub(crate) enum GapFinding {
    /// Best fit: the tightest hole that is large enough, ties at the
    /// lowest offset
    SmallestGap,
    /// First fit: the lowest-offset hole that is large enough
    FirstGap,
}

/// Seat one item among the already placed allocations.
///
/// The regions of every placed item whose live range conflicts with `lvr`
/// in time form forbidden intervals on the offset axis; the item goes into
/// a hole between them chosen by `gap_finding`, or on top of them if no
/// hole is large enough. Forbidden intervals may overlap each other (their
/// owners need not conflict pairwise), so the sweep tracks a running end.
pub(crate) fn make_allocation(
    lvr: LiveRange,
    size: i64,
    allocations: &mut Vec<MemAllocation>,
    gap_finding: GapFinding,
) {
    let mut forbidden: Vec<MemRegion> = allocations
        .iter()
        .filter(|alloc| intersect_live_range(alloc.lvr, lvr))
        .map(|alloc| alloc.reg)
        .collect();
    forbidden.sort_unstable();

    let mut prev_end = 0i64;
    let mut best: Option<(i64, i64)> = None;
    for reg in &forbidden {
        if reg.offset > prev_end {
            let gap = reg.offset - prev_end;
            let fits = gap >= size;
            let improves = best.map_or(true, |(_, best_gap)| gap < best_gap);
            if fits && improves {
                best = Some((prev_end, gap));
                if gap_finding == GapFinding::FirstGap {
                    break;
                }
            }
        }
        prev_end = prev_end.max(reg.end());
    }

    let offset = match best {
        Some((offset, _)) => offset,
        None => prev_end,
    };
    allocations.push(MemAllocation {
        lvr,
        reg: MemRegion { offset, size },
    });
}

/// Largest first; size ties break towards the earlier range start, then
/// insertion order (the sort is stable).
fn sorted_by_size(managed: &[(LiveRange, i64)]) -> Vec<(LiveRange, i64)> {
    let mut items = managed.to_vec();
    items.sort_by_key(|&(lvr, size)| (Reverse(size), lvr));
    items
}

fn place_all(items: Vec<(LiveRange, i64)>, gap_finding: GapFinding) -> Vec<MemAllocation> {
    let mut allocations = Vec::with_capacity(items.len());
    for (lvr, size) in items {
        make_allocation(lvr, size, &mut allocations, gap_finding);
    }
    allocations
}

/// Seat the largest items first, each at the tightest hole that fits
pub fn greedy_by_size(managed_live_ranges: &[(LiveRange, i64)]) -> Vec<MemAllocation> {
    place_all(sorted_by_size(managed_live_ranges), GapFinding::SmallestGap)
}

/// Like [`greedy_by_size`], but each item takes the first hole that fits
/// instead of the tightest one. Interior holes get filled sooner at the
/// cost of worse locality near the top of the arena.
pub fn greedy_by_size_with_first_gap(
    managed_live_ranges: &[(LiveRange, i64)],
) -> Vec<MemAllocation> {
    place_all(sorted_by_size(managed_live_ranges), GapFinding::FirstGap)
}

/// Seat the longest-lived items first; they fragment the arena the most.
/// Size breaks ties, then range start.
pub fn greedy_by_longest_and_size(
    managed_live_ranges: &[(LiveRange, i64)],
) -> Vec<MemAllocation> {
    let mut items = managed_live_ranges.to_vec();
    items.sort_by_key(|&(lvr, size)| (Reverse(lvr.length()), Reverse(size), lvr));
    place_all(items, GapFinding::FirstGap)
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::memory::geometry::total_allocation_size;
    use crate::memory::validation::validate_allocations;

    fn region_of(allocations: &[MemAllocation], begin: i64, end: i64) -> MemRegion {
        allocations
            .iter()
            .find(|a| a.lvr == LiveRange::new(begin, end))
            .unwrap()
            .reg
    }

    #[test]
    fn test_disjoint_lifetimes_coalesce() {
        let managed = vec![
            (LiveRange::new(0, 1), 64),
            (LiveRange::new(2, 3), 64),
            (LiveRange::new(4, 5), 64),
        ];
        let allocations = greedy_by_size(&managed);
        for alloc in &allocations {
            assert_eq!(alloc.reg.offset, 0);
        }
        assert_eq!(total_allocation_size(&allocations), 64);
        validate_allocations(&allocations).unwrap();
    }

    #[test]
    fn test_fully_overlapping_ranges_stack() {
        let managed = vec![
            (LiveRange::new(0, 10), 32),
            (LiveRange::new(0, 10), 64),
            (LiveRange::new(0, 10), 16),
        ];
        for strategy in [
            greedy_by_size,
            greedy_by_size_with_first_gap,
            greedy_by_longest_and_size,
        ] {
            let allocations = strategy(&managed);
            assert_eq!(allocations.len(), 3);
            assert_eq!(total_allocation_size(&allocations), 112);
            validate_allocations(&allocations).unwrap();
        }
    }

    #[test]
    fn test_single_point_touch_shares_storage() {
        let managed = vec![(LiveRange::new(0, 5), 128), (LiveRange::new(5, 10), 128)];
        for strategy in [
            greedy_by_size,
            greedy_by_size_with_first_gap,
            greedy_by_longest_and_size,
        ] {
            let allocations = strategy(&managed);
            assert_eq!(region_of(&allocations, 0, 5).offset, 0);
            assert_eq!(region_of(&allocations, 5, 10).offset, 0);
            assert_eq!(total_allocation_size(&allocations), 128);
            validate_allocations(&allocations).unwrap();
        }
    }

    #[test]
    fn test_size_order_beats_start_order() {
        let managed = vec![
            (LiveRange::new(0, 2), 10),
            (LiveRange::new(1, 3), 100),
            (LiveRange::new(2, 4), 10),
        ];
        let allocations = greedy_by_size(&managed);
        // the two 10-byte items touch at a single point and share an offset
        assert_eq!(
            region_of(&allocations, 0, 2).offset,
            region_of(&allocations, 2, 4).offset
        );
        assert_eq!(total_allocation_size(&allocations), 110);
        validate_allocations(&allocations).unwrap();
    }

    #[test]
    fn test_smallest_gap_prefers_tighter_hole() {
        // two holes below the ceiling: 48 wide at 16 and 32 wide at 96;
        // a 32-byte item best-fits into the second
        let seeded = vec![
            MemAllocation {
                lvr: LiveRange::new(0, 4),
                reg: MemRegion::new(0, 16),
            },
            MemAllocation {
                lvr: LiveRange::new(0, 4),
                reg: MemRegion::new(64, 32),
            },
            MemAllocation {
                lvr: LiveRange::new(0, 4),
                reg: MemRegion::new(128, 16),
            },
        ];
        let mut best_fit = seeded.clone();
        make_allocation(
            LiveRange::new(1, 3),
            32,
            &mut best_fit,
            GapFinding::SmallestGap,
        );
        assert_eq!(best_fit.last().unwrap().reg.offset, 96);

        let mut first_fit = seeded;
        make_allocation(
            LiveRange::new(1, 3),
            32,
            &mut first_fit,
            GapFinding::FirstGap,
        );
        assert_eq!(first_fit.last().unwrap().reg.offset, 16);
    }

    #[test]
    fn test_no_hole_places_on_top() {
        let mut allocations = vec![MemAllocation {
            lvr: LiveRange::new(0, 4),
            reg: MemRegion::new(0, 64),
        }];
        make_allocation(
            LiveRange::new(1, 3),
            128,
            &mut allocations,
            GapFinding::SmallestGap,
        );
        assert_eq!(allocations.last().unwrap().reg.offset, 64);
    }

    #[test]
    fn test_longest_range_seated_first() {
        let managed = vec![
            (LiveRange::new(0, 1), 64),
            (LiveRange::new(0, 9), 8),
        ];
        let allocations = greedy_by_longest_and_size(&managed);
        // the long skinny item lands at the bottom despite its size
        assert_eq!(region_of(&allocations, 0, 9).offset, 0);
        assert_eq!(region_of(&allocations, 0, 1).offset, 8);
        validate_allocations(&allocations).unwrap();
    }
}
