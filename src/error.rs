use thiserror::Error;

pub type Result<T> = std::result::Result<T, Error>;

impl From<serde_json::Error> for Error {
    fn from(err: serde_json::Error) -> Self {
        Error::Serialization(err.to_string())
    }
}

#[derive(Error, Debug, Clone)]
pub enum Error {
    #[error("Invalid graph structure: {0}")]
    InvalidGraph(String),

    #[error("Unknown strategy: {0}")]
    UnknownStrategy(String),

    #[error("Strategy {0} requires graph liveness; trace replay supports only NAIVE, LINEAR_SCAN and GREEDY_BY_SIZE")]
    StrategyNeedsGraph(String),

    #[error("Liveness contract violation: {0}")]
    LivenessContract(String),

    #[error("Invalid memory event trace: {0}")]
    InvalidTrace(String),

    #[error("Conflicting allocations: {0} and {1}")]
    PlanConflict(String, String),

    #[error("Plan rewrite error: {0}")]
    Rewrite(String),

    #[error("Serialization error: {0}")]
    Serialization(String),
}
