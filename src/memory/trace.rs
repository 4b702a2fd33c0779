use std::collections::{HashMap, HashSet};

use serde::{Deserialize, Serialize};
use tracing::debug;

use crate::error::{Error, Result};
use crate::memory::geometry::LiveRange;
use crate::model::{Graph, NodeId};

/// Identity of the graph node a recorded allocation belongs to
#[derive(Debug, Clone, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub struct FrameNodeId {
    /// Program counter of the interpreter frame
    pub pc: usize,
    pub node_schema: String,
    pub node_header: String,
    pub node_id: NodeId,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub enum MemEventKind {
    Allocate,
    Free,
}

/// One allocator event recorded during a profiling run
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct MemEvent {
    pub time: i64,
    /// Opaque key identifying the storage; typically the pointer address
    pub ptr_key: String,
    pub size: i64,
    pub kind: MemEventKind,
    /// Absent only for allocations made before the interpreter started
    pub frame_node_id: Option<FrameNodeId>,
}

impl MemEvent {
    pub fn allocate(time: i64, ptr_key: &str, size: i64, frame: Option<FrameNodeId>) -> Self {
        Self {
            time,
            ptr_key: ptr_key.to_string(),
            size,
            kind: MemEventKind::Allocate,
            frame_node_id: frame,
        }
    }

    pub fn free(time: i64, ptr_key: &str, size: i64) -> Self {
        Self {
            time,
            ptr_key: ptr_key.to_string(),
            size,
            kind: MemEventKind::Free,
            frame_node_id: None,
        }
    }
}

/// Derive live ranges from a chronological allocate/free trace.
///
/// Every `Free` must pair with an earlier `Allocate` of the same size at the
/// same key. Allocations without a frame id are tolerated only at time zero
/// (weights and inputs created before the interpreter ran). Allocations
/// still open at the end of the sweep are tolerated only when everything
/// their node produces is a graph output; those stay outside the plan.
pub fn managed_ranges_from_events(
    events: &[MemEvent],
    graph: &Graph,
) -> Result<(Vec<(LiveRange, i64)>, Vec<(LiveRange, FrameNodeId)>)> {
    let mut managed_live_ranges = Vec::new();
    let mut live_range_node_header = Vec::with_capacity(events.len());
    let mut open: HashMap<&str, &MemEvent> = HashMap::new();

    for event in events {
        match event.kind {
            MemEventKind::Allocate => {
                if event.frame_node_id.is_some() {
                    if open.insert(event.ptr_key.as_str(), event).is_some() {
                        return Err(Error::InvalidTrace(format!(
                            "allocation at {} while {} is still open",
                            event.time, event.ptr_key
                        )));
                    }
                } else if event.time != 0 {
                    return Err(Error::InvalidTrace(format!(
                        "allocation at {} for {} carries no frame node id",
                        event.time, event.ptr_key
                    )));
                }
            }
            MemEventKind::Free => {
                let alloc = open.remove(event.ptr_key.as_str()).ok_or_else(|| {
                    Error::InvalidTrace(format!(
                        "free at {} for {} without a matching allocation",
                        event.time, event.ptr_key
                    ))
                })?;
                if alloc.size != event.size {
                    return Err(Error::InvalidTrace(format!(
                        "free at {} for {} of size {} does not match allocated size {}",
                        event.time, event.ptr_key, event.size, alloc.size
                    )));
                }
                if alloc.time >= event.time {
                    return Err(Error::InvalidTrace(format!(
                        "free at {} for {} does not follow its allocation at {}",
                        event.time, event.ptr_key, alloc.time
                    )));
                }
                let lvr = LiveRange::new(alloc.time, event.time);
                managed_live_ranges.push((lvr, alloc.size));
                live_range_node_header.push((lvr, alloc.frame_node_id.clone().unwrap()));
            }
        }
    }

    if !open.is_empty() {
        let graph_outputs: HashSet<&str> = graph.outputs.iter().map(|s| s.as_str()).collect();
        for (key, alloc) in &open {
            debug!(ptr_key = *key, time = alloc.time, size = alloc.size, "leaked alloc");
            let frame = alloc.frame_node_id.as_ref().unwrap();
            let node = graph.node(frame.node_id).ok_or_else(|| {
                Error::InvalidTrace(format!(
                    "open allocation at {} refers to unknown node {}",
                    key, frame.node_id
                ))
            })?;
            for out_v in &node.outputs {
                if !graph_outputs.contains(out_v.as_str()) {
                    return Err(Error::InvalidTrace(format!(
                        "allocation at {} never freed and {} is not a graph output",
                        key, out_v
                    )));
                }
            }
        }
    }
    Ok((managed_live_ranges, live_range_node_header))
}

/// Group recorded live ranges by the node that made them, each group sorted
/// by range start and the groups ordered by frame. The trace rewriter
/// consumes this to reproduce recorded allocations in schedule order.
pub fn collect_live_ranges_per_node(
    live_range_node_header: Vec<(LiveRange, FrameNodeId)>,
) -> Vec<(FrameNodeId, Vec<LiveRange>)> {
    let mut node_live_ranges: HashMap<FrameNodeId, Vec<LiveRange>> = HashMap::new();
    for (lvr, frame_node_id) in live_range_node_header {
        node_live_ranges.entry(frame_node_id).or_default().push(lvr);
    }

    let mut collected: Vec<(FrameNodeId, Vec<LiveRange>)> = node_live_ranges
        .into_iter()
        .map(|(frame, mut lvrs)| {
            lvrs.sort_unstable();
            (frame, lvrs)
        })
        .collect();
    collected.sort_by(|(a, _), (b, _)| a.pc.cmp(&b.pc).then(a.node_id.cmp(&b.node_id)));
    collected
}
