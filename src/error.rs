use thiserror::Error;

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ErrorCode {
    NotInitialized,
    TaskNotFound,
    ProjectNotFound,
    AmbiguousRef,
    ValidationError,
    MissingParameter,
    InvalidRequest,
    TransientNetwork,
    CorruptedResponse,
    PermanentServer,
    DatabaseError,
    StorageError,
    ConfigError,
}

impl ErrorCode {
    pub fn as_str(&self) -> &'static str {
        match self {
            Self::NotInitialized => "NOT_INITIALIZED",
            Self::TaskNotFound => "TASK_NOT_FOUND",
            Self::ProjectNotFound => "PROJECT_NOT_FOUND",
            Self::AmbiguousRef => "AMBIGUOUS_REF",
            Self::ValidationError => "VALIDATION_ERROR",
            Self::MissingParameter => "MISSING_PARAMETER",
            Self::InvalidRequest => "INVALID_REQUEST",
            Self::TransientNetwork => "TRANSIENT_NETWORK",
            Self::CorruptedResponse => "CORRUPTED_RESPONSE",
            Self::PermanentServer => "PERMANENT_SERVER",
            Self::DatabaseError => "DATABASE_ERROR",
            Self::StorageError => "STORAGE_ERROR",
            Self::ConfigError => "CONFIG_ERROR",
        }
    }

    pub fn from_str(s: &str) -> Option<Self> {
        match s {
            "NOT_INITIALIZED" => Some(Self::NotInitialized),
            "TASK_NOT_FOUND" => Some(Self::TaskNotFound),
            "PROJECT_NOT_FOUND" => Some(Self::ProjectNotFound),
            "AMBIGUOUS_REF" => Some(Self::AmbiguousRef),
            "VALIDATION_ERROR" => Some(Self::ValidationError),
            "MISSING_PARAMETER" => Some(Self::MissingParameter),
            "INVALID_REQUEST" => Some(Self::InvalidRequest),
            "TRANSIENT_NETWORK" => Some(Self::TransientNetwork),
            "CORRUPTED_RESPONSE" => Some(Self::CorruptedResponse),
            "PERMANENT_SERVER" => Some(Self::PermanentServer),
            "DATABASE_ERROR" => Some(Self::DatabaseError),
            "STORAGE_ERROR" => Some(Self::StorageError),
            "CONFIG_ERROR" => Some(Self::ConfigError),
            _ => None,
        }
    }

    /// Failures the delivery driver retries instead of dropping.
    pub fn is_retryable(&self) -> bool {
        matches!(self, Self::TransientNetwork | Self::CorruptedResponse)
    }
}

#[derive(Debug, Clone, PartialEq, Error)]
#[error("{message}")]
pub struct TrackerError {
    pub code: ErrorCode,
    pub message: String,
}

impl TrackerError {
    pub fn new(code: ErrorCode, message: impl Into<String>) -> Self {
        Self {
            code,
            message: message.into(),
        }
    }

    pub fn not_initialized() -> Self {
        Self::new(
            ErrorCode::NotInitialized,
            "tasktrack is not initialized. Run `tasktrack init` first.",
        )
    }

    pub fn task_not_found(id: &str) -> Self {
        Self::new(ErrorCode::TaskNotFound, format!("Task not found: {id}"))
    }

    pub fn project_not_found(id: &str) -> Self {
        Self::new(ErrorCode::ProjectNotFound, format!("Project not found: {id}"))
    }

    pub fn ambiguous_ref(reference: &str, candidates: &[String]) -> Self {
        Self::new(
            ErrorCode::AmbiguousRef,
            format!(
                "Ambiguous reference '{}'. Candidates: {}",
                reference,
                candidates.join(", ")
            ),
        )
    }

    pub fn validation(message: impl Into<String>) -> Self {
        Self::new(ErrorCode::ValidationError, message)
    }

    pub fn missing_parameter(name: &str) -> Self {
        Self::new(
            ErrorCode::MissingParameter,
            format!("Missing parameter: {name}"),
        )
    }

    pub fn invalid_request(message: impl Into<String>) -> Self {
        Self::new(ErrorCode::InvalidRequest, message)
    }

    pub fn transient_network(message: impl Into<String>) -> Self {
        Self::new(ErrorCode::TransientNetwork, message)
    }

    pub fn corrupted_response(message: impl Into<String>) -> Self {
        Self::new(ErrorCode::CorruptedResponse, message)
    }

    pub fn permanent_server(status: u16, message: impl Into<String>) -> Self {
        Self::new(
            ErrorCode::PermanentServer,
            format!("Server rejected request ({status}): {}", message.into()),
        )
    }

    pub fn database(message: impl Into<String>) -> Self {
        Self::new(ErrorCode::DatabaseError, message)
    }

    pub fn storage(message: impl Into<String>) -> Self {
        Self::new(ErrorCode::StorageError, message)
    }

    pub fn config(message: impl Into<String>) -> Self {
        Self::new(ErrorCode::ConfigError, message)
    }

    pub fn is_not_found(&self) -> bool {
        matches!(
            self.code,
            ErrorCode::TaskNotFound | ErrorCode::ProjectNotFound
        )
    }
}

impl From<rusqlite::Error> for TrackerError {
    fn from(e: rusqlite::Error) -> Self {
        Self::database(e.to_string())
    }
}

impl From<serde_json::Error> for TrackerError {
    fn from(e: serde_json::Error) -> Self {
        Self::storage(e.to_string())
    }
}
