//! Error types for the status ledger

/// Errors raised when addressing the fails table
#[derive(Debug, Clone, PartialEq, Eq, thiserror::Error)]
pub enum StatusError {
    /// Command index outside the table
    #[error("command index {index} out of range (have {len})")]
    UnknownCommand {
        /// Requested index
        index: usize,
        /// Number of commands in the table
        len: usize,
    },

    /// WebHook key not present in the table
    #[error("webhook {0:?} not found")]
    UnknownWebHook(String),
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn status_error_display() {
        let err = StatusError::UnknownCommand { index: 4, len: 2 };
        assert_eq!(err.to_string(), "command index 4 out of range (have 2)");

        let err = StatusError::UnknownWebHook("deploy".to_string());
        assert!(err.to_string().contains("\"deploy\""));
    }
}
