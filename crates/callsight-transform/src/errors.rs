use callsight_core::IrError;
use thiserror::Error;

#[derive(Error, Debug)]
pub enum TransformError {
    #[error(transparent)]
    Ir(#[from] IrError),

    #[error("Parse error: {0}")]
    Parsing(String),

    #[error("Missing required field: {field} in {node_type}")]
    MissingField { field: String, node_type: String },

    #[error("Variable not found: {0}")]
    VariableNotFound(String),

    #[error("Unsupported AST: {0}")]
    UnsupportedAst(String),

    #[error("Sequencing error: {0}")]
    Sequencing(String),

    #[error("Compiler error: {0}")]
    Compiler(String),

    #[error("I/O error: {0}")]
    Io(#[from] std::io::Error),

    #[error("JSON error: {0}")]
    Json(#[from] serde_json::Error),
}

impl TransformError {
    pub fn missing(field: impl Into<String>, node_type: impl Into<String>) -> Self {
        TransformError::MissingField {
            field: field.into(),
            node_type: node_type.into(),
        }
    }

    /// Fatal errors abort the pipeline whatever the failure policy.
    pub fn is_fatal(&self) -> bool {
        match self {
            TransformError::Ir(err) => {
                err.is_contract_violation() || matches!(err, IrError::Sequencing(_))
            }
            TransformError::Sequencing(_) => true,
            _ => false,
        }
    }
}

pub type Result<T> = std::result::Result<T, TransformError>;
