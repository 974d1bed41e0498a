use std::path::PathBuf;
use thiserror::Error;

#[derive(Error, Debug)]
pub enum TourError {
    #[error("Unsupported file tree: {message}")]
    UnsupportedFileTree {
        message: String,
        #[source]
        source: std::io::Error,
    },

    #[error("Failed to parse scene config {}: {source}", path.display())]
    SceneConfig {
        path: PathBuf,
        #[source]
        source: serde_json::Error,
    },

    #[error("Command failed: {command}")]
    ExternalCommand { command: String, stderr: String },

    #[error("Command failed: {command}: {source}")]
    CommandIo {
        command: String,
        #[source]
        source: std::io::Error,
    },

    #[error("Failed to move existing output {} aside: {source}", path.display())]
    BackupFailed {
        path: PathBuf,
        #[source]
        source: std::io::Error,
    },

    #[error("Failed to restore the original output {} ({restore_error})", path.display())]
    RestoreFailed {
        path: PathBuf,
        /// Prior output left in place when the restore could not move it back.
        backup: Option<PathBuf>,
        restore_error: String,
        #[source]
        source: std::io::Error,
    },

    #[error("{0} already exists in the tour collection.")]
    TourAlreadyExists(String),

    #[error("Could not find tour {0}")]
    TourNotFound(String),

    #[error("IO error: {0}")]
    IoError(#[from] std::io::Error),

    #[error("Serialization error: {0}")]
    SerializationError(#[from] serde_json::Error),

    #[error("Image error: {0}")]
    ImageError(#[from] image::ImageError),

    #[error("Configuration error: {message}")]
    ConfigError { message: String },

    #[error("Configuration error in {field}: {message}")]
    ConfigValidationError { field: String, message: String },

    #[error("Invalid value '{value}' for {field}: {reason}")]
    InvalidConfigValueError {
        field: String,
        value: String,
        reason: String,
    },

    #[error("Missing required configuration: {field}")]
    MissingConfigError { field: String },

    #[error("Validation error: {message}")]
    ValidationError { message: String },
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ErrorCategory {
    FileTree,
    Command,
    Aggregate,
    Configuration,
    System,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord)]
pub enum ErrorSeverity {
    Low,
    Medium,
    High,
    Critical,
}

impl TourError {
    pub fn category(&self) -> ErrorCategory {
        match self {
            TourError::UnsupportedFileTree { .. } | TourError::SceneConfig { .. } => {
                ErrorCategory::FileTree
            }
            TourError::ExternalCommand { .. }
            | TourError::CommandIo { .. }
            | TourError::BackupFailed { .. }
            | TourError::RestoreFailed { .. } => ErrorCategory::Command,
            TourError::TourAlreadyExists(_) | TourError::TourNotFound(_) => {
                ErrorCategory::Aggregate
            }
            TourError::ConfigError { .. }
            | TourError::ConfigValidationError { .. }
            | TourError::InvalidConfigValueError { .. }
            | TourError::MissingConfigError { .. }
            | TourError::ValidationError { .. } => ErrorCategory::Configuration,
            TourError::IoError(_) | TourError::SerializationError(_) | TourError::ImageError(_) => {
                ErrorCategory::System
            }
        }
    }

    pub fn severity(&self) -> ErrorSeverity {
        match self {
            TourError::TourAlreadyExists(_) | TourError::TourNotFound(_) => ErrorSeverity::Medium,
            // output state is indeterminate after a failed restore
            TourError::RestoreFailed { .. } => ErrorSeverity::Critical,
            TourError::IoError(_) => ErrorSeverity::Critical,
            _ => ErrorSeverity::High,
        }
    }

    /// True for every failure raised around the external tiling program.
    pub fn is_command_failure(&self) -> bool {
        self.category() == ErrorCategory::Command
    }

    pub fn recovery_suggestion(&self) -> &'static str {
        match self {
            TourError::UnsupportedFileTree { .. } => {
                "Check that the tour directory has the expected multires/equirectangular layout"
            }
            TourError::SceneConfig { .. } => {
                "Re-run the tile conversion for this scene so config.json is regenerated"
            }
            TourError::ExternalCommand { .. } | TourError::CommandIo { .. } => {
                "Check the tiling script, interpreter and nona paths, then re-run the conversion"
            }
            TourError::BackupFailed { .. } => {
                "Check permissions and free space in the backup location"
            }
            TourError::RestoreFailed { .. } => {
                "Inspect the scene output directory by hand before re-running the conversion"
            }
            TourError::TourAlreadyExists(_) => "Use 'add' to extend an existing tour",
            TourError::TourNotFound(_) => "Create the tour first with 'create'",
            TourError::ConfigError { .. }
            | TourError::ConfigValidationError { .. }
            | TourError::InvalidConfigValueError { .. }
            | TourError::MissingConfigError { .. } => "Fix the configuration file and try again",
            TourError::ValidationError { .. } => "Check the arguments passed to the command",
            TourError::IoError(_) | TourError::ImageError(_) => {
                "Check file permissions and available disk space"
            }
            TourError::SerializationError(_) => "The stored tour data may be corrupted",
        }
    }

    pub fn user_friendly_message(&self) -> String {
        match self {
            TourError::ExternalCommand { command, stderr } if !stderr.is_empty() => {
                format!("Tile generation failed: {}\n{}", command, stderr)
            }
            TourError::RestoreFailed {
                path,
                backup: Some(backup),
                ..
            } => format!(
                "Tile generation failed and {} could not be restored; the previous output is kept at {}",
                path.display(),
                backup.display()
            ),
            TourError::RestoreFailed { path, .. } => format!(
                "Tile generation failed and {} could not be restored",
                path.display()
            ),
            other => other.to_string(),
        }
    }
}

pub type Result<T> = std::result::Result<T, TourError>;

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_error_categories() {
        let err = TourError::TourNotFound("demo".to_string());
        assert_eq!(err.category(), ErrorCategory::Aggregate);
        assert_eq!(err.to_string(), "Could not find tour demo");

        let err = TourError::ExternalCommand {
            command: "python generate.py".to_string(),
            stderr: "boom".to_string(),
        };
        assert!(err.is_command_failure());
        assert!(err.user_friendly_message().contains("boom"));
    }

    #[test]
    fn test_restore_failure_is_critical() {
        let err = TourError::RestoreFailed {
            path: PathBuf::from("/data/tours/demo/multires/hall"),
            backup: Some(PathBuf::from("/tmp/pano-tour-1")),
            restore_error: "permission denied".to_string(),
            source: std::io::Error::other("launch failed"),
        };
        assert!(err.is_command_failure());
        assert_eq!(err.severity(), ErrorSeverity::Critical);
        assert!(std::error::Error::source(&err).is_some());
        assert!(err.user_friendly_message().contains("/tmp/pano-tour-1"));
    }
}
