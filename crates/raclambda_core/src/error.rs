use thiserror::Error;

/// Fatal outcomes of a reconciliation cycle.
///
/// None of these are retried in-process; the trigger layer redelivers the
/// message when the invocation fails.
#[derive(Debug, Error)]
pub enum CycleError {
    #[error("'{name}' not found in env")]
    ConfigurationMissing { name: String },

    #[error("invalid configuration for '{name}': {message}")]
    InvalidConfiguration { name: String, message: String },

    #[error("malformed event: {message}")]
    MalformedEvent { message: String },

    #[error("storage transfer failed: {message}")]
    StorageTransferFailure { message: String },

    #[error("conversion tool failed ({}): {message}", exit_code_label(.code))]
    ConversionToolFailure { code: Option<i32>, message: String },

    #[error("staging area error while {context}: {source}")]
    Staging {
        context: String,
        #[source]
        source: std::io::Error,
    },
}

impl CycleError {
    pub fn malformed(message: impl Into<String>) -> Self {
        Self::MalformedEvent {
            message: message.into(),
        }
    }

    pub fn storage(message: impl Into<String>) -> Self {
        Self::StorageTransferFailure {
            message: message.into(),
        }
    }

    pub fn staging(context: impl Into<String>, source: std::io::Error) -> Self {
        Self::Staging {
            context: context.into(),
            source,
        }
    }

    /// Stable tag used in structured logs.
    pub fn kind(&self) -> &'static str {
        match self {
            Self::ConfigurationMissing { .. } => "configuration_missing",
            Self::InvalidConfiguration { .. } => "invalid_configuration",
            Self::MalformedEvent { .. } => "malformed_event",
            Self::StorageTransferFailure { .. } => "storage_transfer_failure",
            Self::ConversionToolFailure { .. } => "conversion_tool_failure",
            Self::Staging { .. } => "staging",
        }
    }
}

fn exit_code_label(code: &Option<i32>) -> String {
    match code {
        Some(code) => format!("exit code {code}"),
        None => "terminated by signal".to_string(),
    }
}
