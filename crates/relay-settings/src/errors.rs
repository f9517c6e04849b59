use thiserror::Error;

/// Why the relay could not build its settings.
#[derive(Debug, Error)]
pub enum SettingsError {
    /// The settings file exists but could not be read.
    #[error("cannot read relay settings: {0}")]
    Io(#[from] std::io::Error),
    /// The file, or the merged document, is not valid settings JSON.
    #[error("malformed relay settings: {0}")]
    Json(#[from] serde_json::Error),
}

pub type Result<T> = std::result::Result<T, SettingsError>;

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn malformed_json_message() {
        let cause = serde_json::from_str::<serde_json::Value>("{port:").unwrap_err();
        let err = SettingsError::from(cause);
        assert!(err.to_string().starts_with("malformed relay settings"));
    }

    #[test]
    fn unreadable_file_converts() {
        let cause = std::io::Error::new(std::io::ErrorKind::PermissionDenied, "denied");
        let err: SettingsError = cause.into();
        assert!(matches!(err, SettingsError::Io(_)));
        assert!(err.to_string().contains("denied"));
    }
}
