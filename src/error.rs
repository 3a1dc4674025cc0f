use thiserror::Error;

/// Failures raised by the classroom core. Gateway and transport failures are
/// carried separately as `anyhow::Error`.
#[derive(Debug, Error, PartialEq)]
pub enum CoreError {
    #[error("class {0} is archived")]
    NoActiveClass(String),

    #[error("{entity} not found: {id}")]
    NotFound { entity: &'static str, id: String },

    #[error("{0}")]
    InvalidTransition(String),

    #[error("{0}")]
    BadInput(String),

    #[error("import rejected: {0}")]
    BadImport(String),

    #[error("version conflict: expected {expected}, found {found}")]
    Conflict { expected: u64, found: u64 },
}

impl CoreError {
    pub fn not_found(entity: &'static str, id: impl Into<String>) -> Self {
        Self::NotFound {
            entity,
            id: id.into(),
        }
    }

    /// Stable IPC error code.
    pub fn code(&self) -> &'static str {
        match self {
            Self::NoActiveClass(_) => "no_active_class",
            Self::NotFound { .. } => "not_found",
            Self::InvalidTransition(_) => "invalid_transition",
            Self::BadInput(_) => "bad_params",
            Self::BadImport(_) => "bad_import",
            Self::Conflict { .. } => "conflict",
        }
    }
}
