//! Error types.
//!
//! Two layers:
//! - `AppError`: process-level failures (bad input file, missing columns, corrupt
//!   artifact). These abort the current command and map to an exit code.
//! - `PredictError`: request-scoped failures while serving. These are turned into
//!   an error payload and never escape the request handler.
//!
//! Exit codes:
//! - 2: input, schema or I/O problem
//! - 3: not enough data to train
//! - 4: internal fitting failure
//! - 5: model artifact missing or corrupt

#[derive(Clone)]
pub struct AppError {
    exit_code: u8,
    message: String,
}

impl AppError {
    pub fn new(exit_code: u8, message: impl Into<String>) -> Self {
        Self {
            exit_code,
            message: message.into(),
        }
    }

    /// Input table is missing expected columns.
    pub fn schema(message: impl Into<String>) -> Self {
        Self::new(2, message)
    }

    /// Model artifact could not be read or decoded.
    pub fn artifact(message: impl Into<String>) -> Self {
        Self::new(5, message)
    }

    pub fn exit_code(&self) -> u8 {
        self.exit_code
    }
}

impl std::fmt::Display for AppError {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "{}", self.message)
    }
}

impl std::fmt::Debug for AppError {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("AppError")
            .field("exit_code", &self.exit_code)
            .field("message", &self.message)
            .finish()
    }
}

impl std::error::Error for AppError {}

/// Failure of a single prediction request.
#[derive(Debug, Clone, PartialEq, thiserror::Error)]
pub enum PredictError {
    /// A query parameter is missing or not a number.
    #[error("{0}")]
    Validation(String),

    /// The postal code was never observed when the encoder was fitted.
    #[error("Found unknown categories [{value}] in column {column} during transform")]
    UnseenCategory { column: &'static str, value: i64 },

    /// The model produced something unusable (e.g. a non-finite value).
    #[error("{0}")]
    Model(String),
}
