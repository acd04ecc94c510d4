// file-variants - Library module
// Keeps language variant files correctly linked when content records are
// translated or copied across languages by a host record pipeline

pub mod config;
pub mod error;
pub mod hooks;
pub mod logging;
pub mod resolver;
pub mod resources;
pub mod store;

// Re-export main types for easier access
pub use config::{HostConfig, LoggingSettings, VariantsConfig, EXTENSION_KEY};
pub use error::{
    CommandError, ConfigError, FileVariantsError, ResourceError, Result, StoreError,
};
pub use hooks::{
    CommandOutcome, DataHandlerHook, FieldMap, RecordId, RecordStatus, StructuralCommand,
    EXCLUDED_REFERENCE_TABLES,
};
pub use logging::{init_logging, LogConfig, LogFormat};
pub use resolver::resolve_variant;
pub use resources::{Folder, ResourceService};
pub use store::{
    FileLanguageFields, FileMetadataRecord, FileRecord, FileReferenceRecord, RecordStore,
    StorageRecord, FILE_METADATA_TABLE, FILE_REFERENCE_TABLE, FILE_TABLE,
};

// Version information
pub const VERSION: &str = env!("CARGO_PKG_VERSION");
pub const NAME: &str = env!("CARGO_PKG_NAME");
pub const DESCRIPTION: &str = env!("CARGO_PKG_DESCRIPTION");

/// Get formatted version string
pub fn version_info() -> String {
    format!("{NAME} {VERSION}")
}
