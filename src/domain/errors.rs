//! Error taxonomy for configuration loading.

use std::fmt;
use std::path::PathBuf;

use thiserror::Error;

/// Placeholder field path used when the offending value is the document itself.
pub const ROOT_FIELD: &str = "<root>";

/// Errors produced while turning a document into a [`TrainingConfig`].
///
/// Every variant except [`ConfigError::Io`] and [`ConfigError::Parse`] names the
/// dotted path of the offending field, e.g. `dataloaders.train_batch_size`.
///
/// [`TrainingConfig`]: crate::domain::models::TrainingConfig
#[derive(Debug, Error)]
pub enum ConfigError {
    #[error("Failed to read config file {}: {source}", .path.display())]
    Io {
        path: PathBuf,
        #[source]
        source: std::io::Error,
    },

    #[error("Failed to parse YAML config: {message}")]
    Parse { message: String },

    #[error("Missing required field: {field}")]
    Schema { field: String },

    #[error("Invalid value for {field}: {message}")]
    Type { field: String, message: String },

    /// An alias or `${path}` reference that cannot be resolved, or a
    /// `T_max` that disagrees with the epoch count. For an undefined YAML
    /// anchor the dotted path is not known yet, so `field` holds the parser
    /// location instead, e.g. `line 12 column 11`.
    #[error("Unresolved reference at {field}: {message}")]
    Reference { field: String, message: String },
}

/// Coarse classification of a [`ConfigError`].
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum ErrorKind {
    Io,
    Parse,
    Schema,
    Type,
    Reference,
}

impl fmt::Display for ErrorKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let name = match self {
            Self::Io => "IoError",
            Self::Parse => "ParseError",
            Self::Schema => "SchemaError",
            Self::Type => "TypeError",
            Self::Reference => "ReferenceError",
        };
        f.write_str(name)
    }
}

impl ConfigError {
    pub fn schema(field: impl Into<String>) -> Self {
        Self::Schema {
            field: field.into(),
        }
    }

    pub fn type_error(field: impl Into<String>, message: impl Into<String>) -> Self {
        Self::Type {
            field: field.into(),
            message: message.into(),
        }
    }

    pub fn reference(field: impl Into<String>, message: impl Into<String>) -> Self {
        Self::Reference {
            field: field.into(),
            message: message.into(),
        }
    }

    pub const fn kind(&self) -> ErrorKind {
        match self {
            Self::Io { .. } => ErrorKind::Io,
            Self::Parse { .. } => ErrorKind::Parse,
            Self::Schema { .. } => ErrorKind::Schema,
            Self::Type { .. } => ErrorKind::Type,
            Self::Reference { .. } => ErrorKind::Reference,
        }
    }

    /// Dotted path of the offending field, if the error is tied to one.
    pub fn field(&self) -> Option<&str> {
        match self {
            Self::Schema { field } | Self::Type { field, .. } | Self::Reference { field, .. } => {
                Some(field)
            }
            Self::Io { .. } | Self::Parse { .. } => None,
        }
    }
}

pub type ConfigResult<T> = Result<T, ConfigError>;

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_kind_and_field() {
        let err = ConfigError::schema("train.n_epochs");
        assert_eq!(err.kind(), ErrorKind::Schema);
        assert_eq!(err.field(), Some("train.n_epochs"));

        let err = ConfigError::type_error("dataloaders.train_batch_size", "must be positive");
        assert_eq!(err.kind(), ErrorKind::Type);
        assert_eq!(err.field(), Some("dataloaders.train_batch_size"));

        let err = ConfigError::Parse {
            message: "bad indent".to_string(),
        };
        assert_eq!(err.kind(), ErrorKind::Parse);
        assert_eq!(err.field(), None);
    }

    #[test]
    fn test_display_names_field() {
        let err = ConfigError::reference("scheduler.params.T_max", "no such value");
        assert_eq!(
            err.to_string(),
            "Unresolved reference at scheduler.params.T_max: no such value"
        );
        assert_eq!(ErrorKind::Reference.to_string(), "ReferenceError");
    }

    #[test]
    fn test_io_error_mentions_path() {
        let err = ConfigError::Io {
            path: PathBuf::from("/missing/train.yml"),
            source: std::io::Error::new(std::io::ErrorKind::NotFound, "not found"),
        };
        assert!(err.to_string().contains("/missing/train.yml"));
        assert_eq!(err.kind(), ErrorKind::Io);
    }
}
