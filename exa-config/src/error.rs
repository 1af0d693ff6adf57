use std::path::PathBuf;

use exa_tools::ParseError;

/// Errors of the document model and the mutation operations.
#[derive(thiserror::Error, Debug)]
pub enum ConfigError {
    /// Malformed input, either from the caller or from the file.
    #[error("{0}")]
    Parse(String),
    /// Referenced entity (or the document itself) does not exist.
    #[error("{0} does not exist")]
    NotFound(String),
    /// The mutation would break the consistency of the document.
    #[error("integrity violation - {0}")]
    Integrity(String),
    /// Removal blocked by live references (overridable with `force`).
    #[error("{entity} is in use by {users}")]
    InUse { entity: String, users: String },
    #[error("EXAConf {0:?} is not initialized")]
    NotInitialized(PathBuf),
    #[error("{0}")]
    Permission(String),
    #[error("{0}")]
    Io(#[from] std::io::Error),
    #[error("{0}")]
    Other(#[from] anyhow::Error),
}

impl From<ParseError> for ConfigError {
    fn from(err: ParseError) -> Self {
        Self::Parse(err.to_string())
    }
}

impl ConfigError {
    pub fn in_use<E: ToString>(entity: E, users: &[String]) -> Self {
        Self::InUse {
            entity: entity.to_string(),
            users: users.join(", "),
        }
    }
}

#[macro_export]
macro_rules! integrity_err {
    ($($arg:tt)*) => {
        $crate::ConfigError::Integrity(format!($($arg)*))
    };
}

#[macro_export]
macro_rules! not_found {
    ($($arg:tt)*) => {
        $crate::ConfigError::NotFound(format!($($arg)*))
    };
}

#[macro_export]
macro_rules! config_parse_err {
    ($($arg:tt)*) => {
        $crate::ConfigError::Parse(format!($($arg)*))
    };
}
