// Error handling framework for the file-variants crate
use std::path::PathBuf;
use thiserror::Error;

pub type Result<T> = std::result::Result<T, FileVariantsError>;

/// Main error type with one variant per failure category
#[derive(Debug, Error)]
pub enum FileVariantsError {
    #[error("Configuration error: {0}")]
    Config(#[from] Box<ConfigError>),

    #[error("Record store operation failed: {0}")]
    Store(#[from] Box<StoreError>),

    #[error("File resource operation failed: {0}")]
    Resource(#[from] Box<ResourceError>),

    #[error("Command processing failed: {0}")]
    Command(#[from] Box<CommandError>),

    #[error("IO operation failed: {0}")]
    Io(#[from] std::io::Error),
}

/// Configuration-related errors with detailed context
#[derive(Debug, Error)]
pub enum ConfigError {
    #[error("Invalid YAML syntax: {message}")]
    InvalidYaml {
        message: String,
        line: Option<u32>,
        column: Option<u32>,
        file_path: Option<PathBuf>,
    },

    #[error("Configuration file not found: {path}")]
    NotFound {
        path: PathBuf,
        suggestion: Option<String>,
    },

    #[error("Missing extension configuration section: {section}")]
    MissingSection {
        section: String,
        file_path: Option<PathBuf>,
        suggestion: Option<String>,
    },

    #[error("Missing required field: {field}")]
    MissingField { field: String, section: String },

    #[error("Invalid configuration value: {message}")]
    InvalidValue {
        message: String,
        field: String,
        value: String,
        expected: String,
    },
}

/// Record store and database operation errors
#[derive(Debug, Error)]
pub enum StoreError {
    #[error("Database connection failed: {message}")]
    ConnectionFailed {
        message: String,
        database_path: Option<PathBuf>,
    },

    #[error("Database query failed: {query}")]
    QueryFailed {
        query: String,
        error: String,
        database_path: Option<PathBuf>,
    },

    #[error("Database transaction failed: {operation}")]
    TransactionFailed { operation: String, error: String },
}

/// File storage and physical file operation errors
#[derive(Debug, Error)]
pub enum ResourceError {
    #[error("File storage {storage_uid} is not available")]
    StorageUnavailable {
        storage_uid: i64,
        suggestion: Option<String>,
    },

    #[error("Folder creation failed in storage {storage_uid}: {path}")]
    FolderCreationFailed {
        storage_uid: i64,
        path: String,
        error: String,
    },

    #[error("File record not found: {file_uid}")]
    FileNotFound { file_uid: i64 },

    #[error("File content missing for file {file_uid}: {path}")]
    ContentMissing { file_uid: i64, path: PathBuf },

    // Field names avoid thiserror's source inference; the paths are plain context
    #[error("File copy failed: {source_path} to {target_path}")]
    CopyFailed {
        source_path: String,
        target_path: String,
        error: String,
    },
}

/// Structural command processing errors
#[derive(Debug, Error)]
pub enum CommandError {
    #[error("Record id could not be resolved: {id}")]
    UnresolvedRecordId { id: String },

    #[error("No localized metadata found for record {record_uid} in language {language}")]
    MissingLocalizedMetadata { record_uid: i64, language: i64 },

    #[error("Unknown record status: {status}")]
    UnknownStatus { status: String },

    #[error("Unknown structural command: {command}")]
    UnknownCommand { command: String },
}

// Conversion from serde_yaml::Error to ConfigError
impl From<serde_yaml::Error> for Box<ConfigError> {
    fn from(error: serde_yaml::Error) -> Self {
        let location = error.location();
        Box::new(ConfigError::InvalidYaml {
            message: error.to_string(),
            line: location.as_ref().map(|l| l.line() as u32),
            column: location.as_ref().map(|l| l.column() as u32),
            file_path: None,
        })
    }
}

// Conversion from rusqlite::Error to StoreError
impl From<rusqlite::Error> for Box<StoreError> {
    fn from(error: rusqlite::Error) -> Self {
        match error {
            rusqlite::Error::SqliteFailure(sqlite_error, message) => {
                Box::new(StoreError::QueryFailed {
                    query: "SQLite operation".to_string(),
                    error: message.unwrap_or_else(|| format!("SQLite error: {sqlite_error:?}")),
                    database_path: None,
                })
            }
            rusqlite::Error::InvalidPath(path) => Box::new(StoreError::ConnectionFailed {
                message: format!("Invalid database path: {}", path.display()),
                database_path: Some(path),
            }),
            _ => Box::new(StoreError::QueryFailed {
                query: "Database operation".to_string(),
                error: error.to_string(),
                database_path: None,
            }),
        }
    }
}

// Direct conversion from rusqlite::Error to FileVariantsError
impl From<rusqlite::Error> for FileVariantsError {
    fn from(error: rusqlite::Error) -> Self {
        FileVariantsError::Store(Box::<StoreError>::from(error))
    }
}
