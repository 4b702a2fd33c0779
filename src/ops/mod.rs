pub mod registry;

pub use registry::{OpSchema, OperatorRegistry};
