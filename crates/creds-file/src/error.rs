//! Error types for the shared credentials store

/// Errors from credentials-file operations.
#[derive(Debug, thiserror::Error)]
pub enum StoreError {
    #[error("timed out waiting for the credentials file lock")]
    LockTimeout,

    #[error("credentials file is corrupt: {0}")]
    Corrupt(String),

    #[error("I/O error: {0}")]
    Io(String),
}

/// Result alias for store operations.
pub type Result<T> = std::result::Result<T, StoreError>;

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn display_messages_are_descriptive() {
        assert_eq!(
            StoreError::LockTimeout.to_string(),
            "timed out waiting for the credentials file lock"
        );
        assert!(
            StoreError::Corrupt("line 3: expected `=`".into())
                .to_string()
                .contains("line 3")
        );
    }
}
