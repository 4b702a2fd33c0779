use std::collections::{HashMap, HashSet};

use serde::{Deserialize, Serialize};

/// Unique identifier for a node in the graph
pub type NodeId = usize;

/// Scalar element types the planner can size
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub enum DataType {
    Float,
    Double,
    Float16,
    BFloat16,
    Int8,
    Int16,
    Int32,
    Int64,
    Uint8,
    Uint16,
    Uint32,
    Uint64,
    Bool,
    Complex64,
    Complex128,
}

impl DataType {
    /// Size of a single element in bytes
    pub fn size_in_bytes(&self) -> i64 {
        match self {
            DataType::Int8 | DataType::Uint8 | DataType::Bool => 1,
            DataType::Float16 | DataType::BFloat16 | DataType::Int16 | DataType::Uint16 => 2,
            DataType::Float | DataType::Int32 | DataType::Uint32 => 4,
            DataType::Double
            | DataType::Int64
            | DataType::Uint64
            | DataType::Complex64 => 8,
            DataType::Complex128 => 16,
        }
    }

    /// Stable numeric code used for node attributes
    pub fn code(&self) -> i64 {
        match self {
            DataType::Float => 1,
            DataType::Double => 2,
            DataType::Float16 => 3,
            DataType::BFloat16 => 4,
            DataType::Int8 => 5,
            DataType::Int16 => 6,
            DataType::Int32 => 7,
            DataType::Int64 => 8,
            DataType::Uint8 => 9,
            DataType::Uint16 => 10,
            DataType::Uint32 => 11,
            DataType::Uint64 => 12,
            DataType::Bool => 13,
            DataType::Complex64 => 14,
            DataType::Complex128 => 15,
        }
    }
}

/// Device the arena will be allocated on
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
pub enum Device {
    #[default]
    Cpu,
    Cuda(u8),
}

impl Device {
    /// Stable numeric code used for node attributes
    pub fn code(&self) -> i64 {
        match self {
            Device::Cpu => 0,
            Device::Cuda(_) => 1,
        }
    }
}

impl std::fmt::Display for Device {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            Device::Cpu => write!(f, "cpu"),
            Device::Cuda(idx) => write!(f, "cuda:{}", idx),
        }
    }
}

/// Row-major strides for the given sizes
pub fn default_strides(sizes: &[i64]) -> Vec<i64> {
    let mut strides = vec![1i64; sizes.len()];
    for d in (0..sizes.len().saturating_sub(1)).rev() {
        strides[d] = strides[d + 1] * sizes[d + 1].max(1);
    }
    strides
}

/// Static tensor type attached to a graph value.
///
/// Any of the three parts may be unknown; the planner only manages values
/// whose scalar type and sizes are both concrete.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct TensorTypeInfo {
    pub dtype: Option<DataType>,
    pub sizes: Option<Vec<i64>>,
    pub strides: Option<Vec<i64>>,
}

impl TensorTypeInfo {
    pub fn new(dtype: DataType, sizes: Vec<i64>) -> Self {
        Self {
            dtype: Some(dtype),
            sizes: Some(sizes),
            strides: None,
        }
    }

    /// Number of elements, if the sizes are concrete. Overflow yields None.
    pub fn numel(&self) -> Option<i64> {
        let sizes = self.sizes.as_ref()?;
        let mut numel = 1i64;
        for &dim in sizes {
            if dim < 0 {
                return None;
            }
            numel = numel.checked_mul(dim)?;
        }
        Some(numel)
    }

    /// Concrete sizes and strides for the rewriter.
    ///
    /// A missing or degenerate shape (innermost size of zero) collapses to
    /// `[0]`; missing or degenerate strides are derived row-major.
    pub fn sizes_strides(&self) -> (Vec<i64>, Vec<i64>) {
        let sizes = match &self.sizes {
            Some(s) if !s.is_empty() && *s.last().unwrap() != 0 => s.clone(),
            _ => vec![0],
        };
        let strides = match &self.strides {
            Some(st) if st.len() == sizes.len() && *st.last().unwrap() != 0 => st.clone(),
            _ => default_strides(&sizes),
        };
        (sizes, strides)
    }
}

/// Node attribute
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub enum Attribute {
    Int(i64),
    Ints(Vec<i64>),
    String(String),
}

/// Node in the computation graph
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Node {
    pub id: NodeId,
    pub name: String,
    pub op_type: String,
    pub inputs: Vec<String>,
    pub outputs: Vec<String>,
    pub attributes: HashMap<String, Attribute>,
}

impl Node {
    /// One-line header used in diagnostics
    pub fn header(&self) -> String {
        format!("%{} : {}({})", self.outputs.join(", %"), self.op_type, self.inputs.join(", "))
    }
}

/// Computation graph with a deterministic linear schedule.
///
/// The order of `nodes` is the schedule: a node's index is its instruction
/// timestamp. Values are identified by name; `value_types` carries the static
/// tensor type the planner sizes storage from.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Graph {
    pub name: String,
    pub nodes: Vec<Node>,
    pub inputs: Vec<String>,
    pub outputs: Vec<String>,
    pub weights: Vec<String>,
    pub value_types: HashMap<String, TensorTypeInfo>,
    pub device: Option<Device>,
    next_node_id: NodeId,
}

impl Graph {
    pub fn new(name: &str) -> Self {
        Self {
            name: name.to_string(),
            nodes: Vec::new(),
            inputs: Vec::new(),
            outputs: Vec::new(),
            weights: Vec::new(),
            value_types: HashMap::new(),
            device: None,
            next_node_id: 0,
        }
    }

    /// Append a node at the end of the schedule
    pub fn add_node(&mut self, op_type: &str, inputs: &[&str], outputs: &[&str]) -> NodeId {
        let node = self.create_node(op_type, inputs, outputs);
        let id = node.id;
        self.nodes.push(node);
        id
    }

    /// Create a node without scheduling it
    pub fn create_node(&mut self, op_type: &str, inputs: &[&str], outputs: &[&str]) -> Node {
        let id = self.next_node_id;
        self.next_node_id += 1;
        Node {
            id,
            name: format!("{}_{}", op_type.replace("::", "_"), id),
            op_type: op_type.to_string(),
            inputs: inputs.iter().map(|s| s.to_string()).collect(),
            outputs: outputs.iter().map(|s| s.to_string()).collect(),
            attributes: HashMap::new(),
        }
    }

    /// Insert a node into the schedule before the node with the given id
    pub fn insert_node_before(&mut self, anchor: NodeId, node: Node) -> bool {
        match self.node_index(anchor) {
            Some(idx) => {
                self.nodes.insert(idx, node);
                true
            }
            None => false,
        }
    }

    pub fn set_value_type(&mut self, value: &str, info: TensorTypeInfo) {
        self.value_types.insert(value.to_string(), info);
    }

    /// Schedule index of a node, i.e. its instruction timestamp
    pub fn node_index(&self, id: NodeId) -> Option<usize> {
        self.nodes.iter().position(|n| n.id == id)
    }

    pub fn node(&self, id: NodeId) -> Option<&Node> {
        self.nodes.iter().find(|n| n.id == id)
    }

    pub fn node_mut(&mut self, id: NodeId) -> Option<&mut Node> {
        self.nodes.iter_mut().find(|n| n.id == id)
    }

    /// Node producing the given value, if any (graph inputs and weights have none)
    pub fn producer(&self, value: &str) -> Option<&Node> {
        self.nodes
            .iter()
            .find(|n| n.outputs.iter().any(|o| o == value))
    }

    pub fn pick_device(&self) -> Device {
        self.device.unwrap_or_default()
    }

    /// Check that the node order is an executable schedule: every node
    /// input is a graph input, a weight, or the output of an earlier node.
    pub fn validate_schedule(&self) -> crate::error::Result<()> {
        let mut defined: HashSet<&str> = HashSet::new();
        defined.extend(self.inputs.iter().map(|s| s.as_str()));
        defined.extend(self.weights.iter().map(|s| s.as_str()));
        for node in &self.nodes {
            for in_v in &node.inputs {
                if !in_v.is_empty() && !defined.contains(in_v.as_str()) {
                    return Err(crate::error::Error::InvalidGraph(format!(
                        "node {} consumes {} before it is defined",
                        node.name, in_v
                    )));
                }
            }
            defined.extend(node.outputs.iter().map(|s| s.as_str()));
        }
        Ok(())
    }
}

/// Summary of the external alias analysis.
///
/// The planner treats this as an oracle; it never walks uses and defs to
/// discover aliasing on its own.
#[derive(Debug, Clone, Default)]
pub struct AliasSummary {
    /// Values whose storage escapes the execution (in-place views, borrowed
    /// buffers); they must never be re-used.
    pub externally_aliased: HashSet<String>,
}

impl AliasSummary {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn mark_aliased(&mut self, value: &str) {
        self.externally_aliased.insert(value.to_string());
    }
}

/// Values whose storage must not be reused: graph inputs, outputs, weights
/// and anything the alias analysis reports as externally aliased.
pub fn always_alive_values(graph: &Graph, alias: &AliasSummary) -> HashSet<String> {
    let mut always_alive: HashSet<String> = HashSet::new();
    always_alive.extend(graph.inputs.iter().cloned());
    always_alive.extend(graph.outputs.iter().cloned());
    always_alive.extend(graph.weights.iter().cloned());
    always_alive.extend(alias.externally_aliased.iter().cloned());
    always_alive
}
