use docql_operators::OpError;
use thiserror::Error;

pub type Result<T> = std::result::Result<T, PlanError>;

#[derive(Debug, Error)]
pub enum PlanError {
    #[error("ArgumentError: {0}")]
    Argument(String),

    #[error("InvalidOperatorError: Unknown operator '{0}'")]
    InvalidOperator(String),

    #[error("cannot combine queries on different tables: '{left}' and '{right}'")]
    TableMismatch { left: String, right: String },

    #[error("unsupported constraint layout: {0}")]
    Unsupported(String),

    #[error("query DSL error: {0}")]
    Dsl(String),

    #[error(transparent)]
    Core(#[from] docql_core::error::Error),
}

impl PlanError {
    /// True for malformed-input errors (arity, types, missing options).
    pub fn is_argument(&self) -> bool {
        matches!(self, PlanError::Argument(_))
    }
}

impl From<OpError> for PlanError {
    fn from(e: OpError) -> Self {
        match e {
            OpError::Argument(msg) => PlanError::Argument(msg),
            OpError::InvalidOperator(tag) => PlanError::InvalidOperator(tag),
            OpError::Unsupported(msg) => PlanError::Unsupported(msg),
        }
    }
}

impl From<serde_yaml::Error> for PlanError {
    fn from(e: serde_yaml::Error) -> Self {
        PlanError::Dsl(e.to_string())
    }
}
