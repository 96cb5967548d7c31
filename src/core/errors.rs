//! Error types for the LearningHub tooling library.
//!
//! Every fallible operation in the crate returns [`Result`], whose error side
//! keeps enough context (file, field, transform name) for the CLI to print a
//! useful one-line diagnostic.

use std::io;
use std::num::ParseIntError;
use std::path::Path;

use thiserror::Error;

/// Main result type for LearningHub operations.
pub type Result<T> = std::result::Result<T, LearningHubError>;

/// Error type for all LearningHub operations.
#[derive(Error, Debug)]
pub enum LearningHubError {
    /// I/O related errors (reading pages, writing reports, state files)
    #[error("I/O error: {message}")]
    Io {
        /// Human-readable error message
        message: String,
        /// Underlying I/O error
        #[source]
        source: io::Error,
    },

    /// Configuration errors
    #[error("Configuration error: {message}")]
    Config {
        /// Error description
        message: String,
        /// Configuration field that caused the error
        field: Option<String>,
    },

    /// Errors while reading structured content out of a page or data file
    #[error("Parse error in {format}: {message}")]
    Parse {
        /// Format being read (html, json, worksheet, ...)
        format: String,
        /// Error description
        message: String,
        /// File path where the error occurred
        file_path: Option<String>,
    },

    /// Serialization/deserialization errors
    #[error("Serialization error: {message}")]
    Serialization {
        /// Error description
        message: String,
        /// Data type being serialized
        data_type: Option<String>,
        /// Underlying serialization error
        #[source]
        source: Option<Box<dyn std::error::Error + Send + Sync>>,
    },

    /// Validation errors for input data
    #[error("Validation error: {message}")]
    Validation {
        /// Error description
        message: String,
        /// Field or input that failed validation
        field: Option<String>,
        /// Expected value or format
        expected: Option<String>,
        /// Actual value received
        actual: Option<String>,
    },

    /// A page transform could not be applied
    #[error("Transform '{transform}' failed: {message}")]
    Transform {
        /// Transform name
        transform: String,
        /// Error description
        message: String,
        /// Page being transformed
        file_path: Option<String>,
    },

    /// Requested file or record does not exist
    #[error("Not found: {message}")]
    NotFound {
        /// Error description
        message: String,
        /// Path that was looked up
        path: Option<String>,
    },

    /// Generic internal errors
    #[error("Internal error: {message}")]
    Internal {
        /// Error description
        message: String,
        /// Additional context
        context: Option<String>,
    },
}

impl LearningHubError {
    /// Create a new I/O error with context
    pub fn io(message: impl Into<String>, source: io::Error) -> Self {
        Self::Io {
            message: message.into(),
            source,
        }
    }

    /// Create a new configuration error
    pub fn config(message: impl Into<String>) -> Self {
        Self::Config {
            message: message.into(),
            field: None,
        }
    }

    /// Create a new configuration error with field context
    pub fn config_field(message: impl Into<String>, field: impl Into<String>) -> Self {
        Self::Config {
            message: message.into(),
            field: Some(field.into()),
        }
    }

    /// Create a new parse error
    pub fn parse(format: impl Into<String>, message: impl Into<String>) -> Self {
        Self::Parse {
            format: format.into(),
            message: message.into(),
            file_path: None,
        }
    }

    /// Create a new parse error tied to a file
    pub fn parse_in_file(
        format: impl Into<String>,
        message: impl Into<String>,
        file_path: &Path,
    ) -> Self {
        Self::Parse {
            format: format.into(),
            message: message.into(),
            file_path: Some(file_path.display().to_string()),
        }
    }

    /// Create a new validation error
    pub fn validation(message: impl Into<String>) -> Self {
        Self::Validation {
            message: message.into(),
            field: None,
            expected: None,
            actual: None,
        }
    }

    /// Create a validation error describing an expected/actual mismatch
    pub fn mismatch(
        message: impl Into<String>,
        expected: impl Into<String>,
        actual: impl Into<String>,
    ) -> Self {
        Self::Validation {
            message: message.into(),
            field: None,
            expected: Some(expected.into()),
            actual: Some(actual.into()),
        }
    }

    /// Create a new transform error
    pub fn transform(transform: impl Into<String>, message: impl Into<String>) -> Self {
        Self::Transform {
            transform: transform.into(),
            message: message.into(),
            file_path: None,
        }
    }

    /// Create a not-found error for a path
    pub fn not_found(message: impl Into<String>, path: &Path) -> Self {
        Self::NotFound {
            message: message.into(),
            path: Some(path.display().to_string()),
        }
    }

    /// Create a new internal error
    pub fn internal(message: impl Into<String>) -> Self {
        Self::Internal {
            message: message.into(),
            context: None,
        }
    }

    /// Add context to an existing error
    pub fn with_context(mut self, context: impl Into<String>) -> Self {
        match &mut self {
            Self::Internal { context: ctx, .. } => {
                *ctx = Some(context.into());
            }
            Self::Io { message, .. } => {
                *message = format!("{}: {}", context.into(), message);
            }
            Self::Transform { file_path, .. } | Self::Parse { file_path, .. } => {
                if file_path.is_none() {
                    *file_path = Some(context.into());
                }
            }
            _ => {}
        }
        self
    }
}

impl From<io::Error> for LearningHubError {
    fn from(err: io::Error) -> Self {
        Self::io("I/O operation failed", err)
    }
}

impl From<serde_json::Error> for LearningHubError {
    fn from(err: serde_json::Error) -> Self {
        Self::Serialization {
            message: format!("JSON serialization failed: {err}"),
            data_type: Some("JSON".to_string()),
            source: Some(Box::new(err)),
        }
    }
}

impl From<serde_yaml::Error> for LearningHubError {
    fn from(err: serde_yaml::Error) -> Self {
        Self::Serialization {
            message: format!("YAML serialization failed: {err}"),
            data_type: Some("YAML".to_string()),
            source: Some(Box::new(err)),
        }
    }
}

impl From<glob::PatternError> for LearningHubError {
    fn from(err: glob::PatternError) -> Self {
        Self::config(format!("Invalid glob pattern: {err}"))
    }
}

impl From<walkdir::Error> for LearningHubError {
    fn from(err: walkdir::Error) -> Self {
        let message = format!("Directory walk failed: {err}");
        match err.into_io_error() {
            Some(source) => Self::io(message, source),
            None => Self::internal(message),
        }
    }
}

impl From<ParseIntError> for LearningHubError {
    fn from(err: ParseIntError) -> Self {
        Self::validation(format!("Invalid integer: {err}"))
    }
}

/// Result extension trait for adding context to errors
pub trait ResultExt<T> {
    /// Add context to an error result
    fn with_context<F>(self, f: F) -> Result<T>
    where
        F: FnOnce() -> String;

    /// Add static context to an error result
    fn context(self, msg: &'static str) -> Result<T>;
}

impl<T, E> ResultExt<T> for std::result::Result<T, E>
where
    E: Into<LearningHubError>,
{
    fn with_context<F>(self, f: F) -> Result<T>
    where
        F: FnOnce() -> String,
    {
        self.map_err(|e| e.into().with_context(f()))
    }

    fn context(self, msg: &'static str) -> Result<T> {
        self.map_err(|e| e.into().with_context(msg))
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::path::PathBuf;

    #[test]
    fn test_error_creation() {
        let err = LearningHubError::config("Invalid configuration");
        assert!(matches!(err, LearningHubError::Config { .. }));

        let err = LearningHubError::parse("html", "Missing </head>");
        assert!(matches!(err, LearningHubError::Parse { .. }));
    }

    #[test]
    fn test_internal_with_context() {
        let err = LearningHubError::internal("Something went wrong")
            .with_context("During breadcrumb insertion");

        if let LearningHubError::Internal { context, .. } = err {
            assert_eq!(context, Some("During breadcrumb insertion".to_string()));
        } else {
            panic!("Expected Internal error");
        }
    }

    #[test]
    fn test_io_context_prefixes_message() {
        let io_err = std::io::Error::new(std::io::ErrorKind::NotFound, "gone");
        let err = LearningHubError::io("read failed", io_err).with_context("lectia1.html");

        if let LearningHubError::Io { message, source } = &err {
            assert_eq!(message, "lectia1.html: read failed");
            assert_eq!(source.kind(), std::io::ErrorKind::NotFound);
        } else {
            panic!("Expected Io error");
        }
    }

    #[test]
    fn test_transform_context_sets_path_once() {
        let err = LearningHubError::transform("mobile-css", "no </head> tag")
            .with_context("a.html")
            .with_context("b.html");

        if let LearningHubError::Transform {
            transform,
            file_path,
            ..
        } = err
        {
            assert_eq!(transform, "mobile-css");
            assert_eq!(file_path, Some("a.html".to_string()));
        } else {
            panic!("Expected Transform error");
        }
        let rendered = LearningHubError::transform("quiz", "boom").to_string();
        assert_eq!(rendered, "Transform 'quiz' failed: boom");
    }

    #[test]
    fn test_config_field_error() {
        let err = LearningHubError::config_field("must be positive", "sync.interval_secs");

        if let LearningHubError::Config { message, field } = err {
            assert_eq!(message, "must be positive");
            assert_eq!(field, Some("sync.interval_secs".to_string()));
        } else {
            panic!("Expected Config error");
        }
    }

    #[test]
    fn test_parse_in_file_and_not_found() {
        let path = PathBuf::from("data/worksheets/cls5.json");
        let err = LearningHubError::parse_in_file("worksheet", "bad level", &path);
        if let LearningHubError::Parse { file_path, .. } = err {
            assert_eq!(file_path, Some("data/worksheets/cls5.json".to_string()));
        } else {
            panic!("Expected Parse error");
        }

        let err = LearningHubError::not_found("worksheet missing", &path);
        assert!(err.to_string().contains("worksheet missing"));
    }

    #[test]
    fn test_mismatch_fields() {
        let err = LearningHubError::mismatch("checksum differs", "abc", "def");
        if let LearningHubError::Validation {
            expected, actual, ..
        } = err
        {
            assert_eq!(expected.as_deref(), Some("abc"));
            assert_eq!(actual.as_deref(), Some("def"));
        } else {
            panic!("Expected Validation error");
        }
    }

    #[test]
    fn test_from_conversions() {
        let json_err = serde_json::from_str::<i32>("invalid json").unwrap_err();
        let err: LearningHubError = json_err.into();
        if let LearningHubError::Serialization { data_type, .. } = err {
            assert_eq!(data_type, Some("JSON".to_string()));
        } else {
            panic!("Expected Serialization error");
        }

        let yaml_err = serde_yaml::from_str::<i32>("invalid: yaml: content").unwrap_err();
        let err: LearningHubError = yaml_err.into();
        assert!(matches!(err, LearningHubError::Serialization { .. }));

        let parse_err = "x".parse::<i32>().unwrap_err();
        let err: LearningHubError = parse_err.into();
        assert!(matches!(err, LearningHubError::Validation { .. }));

        let glob_err = glob::Pattern::new("[").unwrap_err();
        let err: LearningHubError = glob_err.into();
        assert!(matches!(err, LearningHubError::Config { .. }));
    }

    #[test]
    fn test_result_ext() {
        let result: std::result::Result<i32, std::io::Error> = Err(std::io::Error::new(
            std::io::ErrorKind::InvalidInput,
            "Bad input",
        ));

        let err = result.context("Loading state").unwrap_err();
        assert!(err.to_string().contains("Loading state"));
    }
}
