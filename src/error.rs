use crate::request::ChartKind;

/// Main library error type
#[derive(thiserror::Error, Debug)]
pub enum ChartError {
    #[error("Invalid JSON data: {0}")]
    MalformedRequest(String),

    #[error("Invalid configuration for {kind} chart: {reason}")]
    InvalidConfig { kind: ChartKind, reason: String },

    #[error("Unsupported chart type: {0}")]
    UnsupportedChartType(String),

    #[error("Failed to generate chart: {0}")]
    RenderingFailure(String),

    #[error("Internal error: {0}")]
    Internal(String),
}

impl ChartError {
    pub fn invalid_config(kind: ChartKind, reason: impl Into<String>) -> Self {
        ChartError::InvalidConfig {
            kind,
            reason: reason.into(),
        }
    }

    /// Whether the failure was caused by the client's input.
    pub fn is_client_error(&self) -> bool {
        matches!(
            self,
            ChartError::MalformedRequest(_)
                | ChartError::InvalidConfig { .. }
                | ChartError::UnsupportedChartType(_)
        )
    }
}

pub type Result<T> = std::result::Result<T, ChartError>;
