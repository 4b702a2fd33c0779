use std::collections::HashMap;

/// Schema of one operator variant.
///
/// Schemas are matched at runtime by the interpreter's op resolution; the
/// planner only inspects argument names to decide whether a variant can
/// write into externally supplied storage.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct OpSchema {
    pub name: String,
    pub overload: String,
    pub arguments: Vec<String>,
}

impl OpSchema {
    pub fn new(name: &str, overload: &str, arguments: &[&str]) -> Self {
        Self {
            name: name.to_string(),
            overload: overload.to_string(),
            arguments: arguments.iter().map(|a| a.to_string()).collect(),
        }
    }

    /// True iff this variant takes an `out` tensor parameter
    pub fn has_out_argument(&self) -> bool {
        self.arguments.iter().any(|arg| arg == "out")
    }
}

/// Registry of operator schemas keyed by op kind
#[derive(Debug, Default)]
pub struct OperatorRegistry {
    schemas: HashMap<String, Vec<OpSchema>>,
}

impl OperatorRegistry {
    pub fn new() -> Self {
        Self {
            schemas: HashMap::new(),
        }
    }

    /// Register a schema variant for an op kind
    pub fn register_schema(&mut self, op_type: &str, schema: OpSchema) {
        self.schemas
            .entry(op_type.to_string())
            .or_default()
            .push(schema);
    }

    /// All variants registered for an op kind
    pub fn schemas_for(&self, op_type: &str) -> &[OpSchema] {
        self.schemas
            .get(op_type)
            .map(|v| v.as_slice())
            .unwrap_or(&[])
    }

    /// True iff any registered variant of this op kind accepts an `out`
    /// tensor parameter, i.e. the node's outputs can be redirected into
    /// planner-supplied storage.
    pub fn has_out_variant(&self, op_type: &str) -> bool {
        self.schemas_for(op_type)
            .iter()
            .any(|schema| schema.has_out_argument())
    }

    /// Registry seeded with the standard operator schemas
    pub fn with_standard_ops() -> Self {
        let mut registry = Self::new();

        // Binary math
        for op in ["add", "sub", "mul", "div", "pow", "matmul"] {
            registry.register_schema(op, OpSchema::new(op, "", &["self", "other"]));
            registry.register_schema(op, OpSchema::new(op, "out", &["self", "other", "out"]));
        }

        // Unary activations
        for op in ["relu", "sigmoid", "tanh", "softmax", "exp", "log"] {
            registry.register_schema(op, OpSchema::new(op, "", &["self"]));
            registry.register_schema(op, OpSchema::new(op, "out", &["self", "out"]));
        }

        // Structured ops
        registry.register_schema(
            "conv2d",
            OpSchema::new("conv2d", "", &["input", "weight", "bias", "stride", "padding"]),
        );
        registry.register_schema(
            "conv2d",
            OpSchema::new("conv2d", "out", &["input", "weight", "bias", "stride", "padding", "out"]),
        );
        registry.register_schema("cat", OpSchema::new("cat", "", &["tensors", "dim"]));
        registry.register_schema("cat", OpSchema::new("cat", "out", &["tensors", "dim", "out"]));

        // Shape manipulation has no out variant; outputs alias their inputs
        for op in ["reshape", "transpose", "slice", "view"] {
            registry.register_schema(op, OpSchema::new(op, "", &["self"]));
        }

        // Container constructors the interpreter can redirect
        registry.register_schema(
            "prim::ListConstruct",
            OpSchema::new("prim::ListConstruct", "", &["inputs", "out"]),
        );
        registry.register_schema(
            "prim::TupleConstruct",
            OpSchema::new("prim::TupleConstruct", "", &["inputs", "out"]),
        );

        registry
    }
}
