// Record store for file-variants - SQLite-backed file, reference, metadata and
// storage tables the resolver queries and the hooks rewrite

use rusqlite::{params, Connection, OptionalExtension, Row};
use std::path::{Path, PathBuf};
use std::sync::{Arc, Mutex};
use tracing::debug;

use crate::error::{FileVariantsError, Result, StoreError};

/// Current database schema version for migrations
const SCHEMA_VERSION: u32 = 1;

/// Table holding file records
pub const FILE_TABLE: &str = "sys_file";
/// Table holding references from content records to files
pub const FILE_REFERENCE_TABLE: &str = "sys_file_reference";
/// Table holding per-language file metadata
pub const FILE_METADATA_TABLE: &str = "sys_file_metadata";

/// SQLite-based store for the file, reference, metadata and storage records
/// the variant resolution machinery operates on
#[derive(Clone)]
pub struct RecordStore {
    connection: Arc<Mutex<Connection>>,
}

/// File record as stored in sys_file
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct FileRecord {
    pub uid: i64,
    pub storage: i64,
    pub identifier: String,
    pub name: String,
    pub sys_language_uid: i64,
    pub l10n_parent: i64,
}

/// The two fields of a file record the resolver needs
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct FileLanguageFields {
    pub sys_language_uid: i64,
    pub l10n_parent: i64,
}

/// Reference record as stored in sys_file_reference
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct FileReferenceRecord {
    pub uid: i64,
    pub uid_local: i64,
    pub uid_foreign: i64,
    pub tablenames: String,
    pub sys_language_uid: i64,
}

/// Metadata record as stored in sys_file_metadata
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct FileMetadataRecord {
    pub uid: i64,
    pub file: i64,
    pub sys_language_uid: i64,
    pub l10n_parent: i64,
}

/// Storage record as stored in sys_file_storage
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct StorageRecord {
    pub uid: i64,
    pub name: String,
    pub base_path: PathBuf,
}

impl RecordStore {
    /// Open a store backed by a database file, creating the schema if needed
    pub fn open(db_path: &Path) -> Result<Self> {
        let connection = Self::initialize_database(db_path)?;
        let connection = Arc::new(Mutex::new(connection));

        Ok(RecordStore { connection })
    }

    /// Create a store with an in-memory database (for tests)
    pub fn in_memory() -> Result<Self> {
        let connection = Self::initialize_memory_database()?;
        let connection = Arc::new(Mutex::new(connection));

        Ok(RecordStore { connection })
    }

    /// Initialize the SQLite database with proper schema
    fn initialize_database(db_path: &Path) -> Result<Connection> {
        let connection = Connection::open(db_path).map_err(|e| {
            FileVariantsError::Store(Box::new(StoreError::ConnectionFailed {
                message: e.to_string(),
                database_path: Some(db_path.to_path_buf()),
            }))
        })?;

        connection.execute("PRAGMA foreign_keys = ON", [])?;
        connection.pragma_update(None, "journal_mode", "WAL")?;
        connection.pragma_update(None, "synchronous", "NORMAL")?;
        connection.busy_timeout(std::time::Duration::from_millis(30000))?;

        Self::create_schema(&connection)?;

        Ok(connection)
    }

    /// Initialize an in-memory SQLite database for tests
    fn initialize_memory_database() -> Result<Connection> {
        let connection = Connection::open(":memory:").map_err(|e| {
            FileVariantsError::Store(Box::new(StoreError::ConnectionFailed {
                message: e.to_string(),
                database_path: None,
            }))
        })?;

        connection.execute("PRAGMA foreign_keys = ON", [])?;
        connection.pragma_update(None, "synchronous", "OFF")?;

        Self::create_schema(&connection)?;

        Ok(connection)
    }

    /// Create the database schema
    fn create_schema(connection: &Connection) -> Result<()> {
        connection.execute(
            "CREATE TABLE IF NOT EXISTS sys_file (
                uid INTEGER PRIMARY KEY AUTOINCREMENT,
                storage INTEGER NOT NULL DEFAULT 0,
                identifier TEXT NOT NULL DEFAULT '',
                name TEXT NOT NULL DEFAULT '',
                sys_language_uid INTEGER NOT NULL DEFAULT 0,
                l10n_parent INTEGER NOT NULL DEFAULT 0,
                deleted INTEGER NOT NULL DEFAULT 0
            )",
            [],
        )?;

        connection.execute(
            "CREATE TABLE IF NOT EXISTS sys_file_reference (
                uid INTEGER PRIMARY KEY AUTOINCREMENT,
                uid_local INTEGER NOT NULL DEFAULT 0,
                uid_foreign INTEGER NOT NULL DEFAULT 0,
                tablenames TEXT NOT NULL DEFAULT '',
                sys_language_uid INTEGER NOT NULL DEFAULT 0,
                deleted INTEGER NOT NULL DEFAULT 0
            )",
            [],
        )?;

        connection.execute(
            "CREATE TABLE IF NOT EXISTS sys_file_metadata (
                uid INTEGER PRIMARY KEY AUTOINCREMENT,
                file INTEGER NOT NULL DEFAULT 0,
                sys_language_uid INTEGER NOT NULL DEFAULT 0,
                l10n_parent INTEGER NOT NULL DEFAULT 0,
                deleted INTEGER NOT NULL DEFAULT 0
            )",
            [],
        )?;

        connection.execute(
            "CREATE TABLE IF NOT EXISTS sys_file_storage (
                uid INTEGER PRIMARY KEY AUTOINCREMENT,
                name TEXT NOT NULL DEFAULT '',
                base_path TEXT NOT NULL DEFAULT '',
                deleted INTEGER NOT NULL DEFAULT 0
            )",
            [],
        )?;

        connection.execute(
            "CREATE TABLE IF NOT EXISTS schema_version (
                version INTEGER NOT NULL,
                applied_at INTEGER NOT NULL DEFAULT (cast(strftime('%s', 'now') as integer))
            )",
            [],
        )?;

        connection.execute(
            "INSERT OR REPLACE INTO schema_version (version) VALUES (?1)",
            params![SCHEMA_VERSION],
        )?;

        // Variant lookups and reference fix-ups are the hot queries
        connection.execute(
            "CREATE INDEX IF NOT EXISTS idx_sys_file_variant
             ON sys_file(l10n_parent, sys_language_uid)",
            [],
        )?;

        connection.execute(
            "CREATE INDEX IF NOT EXISTS idx_sys_file_reference_local
             ON sys_file_reference(uid_local, sys_language_uid)",
            [],
        )?;

        connection.execute(
            "CREATE INDEX IF NOT EXISTS idx_sys_file_metadata_parent
             ON sys_file_metadata(l10n_parent, sys_language_uid)",
            [],
        )?;

        Ok(())
    }

    /// Get current database schema version
    pub fn schema_version(&self) -> Result<u32> {
        let connection = self.connection.lock().unwrap();
        let version: u32 = connection
            .query_row(
                "SELECT version FROM schema_version ORDER BY applied_at DESC LIMIT 1",
                [],
                |row| row.get(0),
            )
            .optional()?
            .unwrap_or(0);
        Ok(version)
    }

    /// Convert database row to FileRecord
    fn row_to_file_record(row: &Row) -> rusqlite::Result<FileRecord> {
        Ok(FileRecord {
            uid: row.get("uid")?,
            storage: row.get("storage")?,
            identifier: row.get("identifier")?,
            name: row.get("name")?,
            sys_language_uid: row.get("sys_language_uid")?,
            l10n_parent: row.get("l10n_parent")?,
        })
    }

    /// Convert database row to FileReferenceRecord
    fn row_to_reference_record(row: &Row) -> rusqlite::Result<FileReferenceRecord> {
        Ok(FileReferenceRecord {
            uid: row.get("uid")?,
            uid_local: row.get("uid_local")?,
            uid_foreign: row.get("uid_foreign")?,
            tablenames: row.get("tablenames")?,
            sys_language_uid: row.get("sys_language_uid")?,
        })
    }

    /// Convert database row to FileMetadataRecord
    fn row_to_metadata_record(row: &Row) -> rusqlite::Result<FileMetadataRecord> {
        Ok(FileMetadataRecord {
            uid: row.get("uid")?,
            file: row.get("file")?,
            sys_language_uid: row.get("sys_language_uid")?,
            l10n_parent: row.get("l10n_parent")?,
        })
    }

    /// Convert database row to StorageRecord
    fn row_to_storage_record(row: &Row) -> rusqlite::Result<StorageRecord> {
        Ok(StorageRecord {
            uid: row.get("uid")?,
            name: row.get("name")?,
            base_path: PathBuf::from(row.get::<_, String>("base_path")?),
        })
    }
}

impl RecordStore {
    // =============================================================================
    // File Record Methods
    // =============================================================================

    /// Insert a file record, honoring an explicit uid when one is set
    pub fn insert_file(&self, file: &FileRecord) -> Result<i64> {
        let connection = self.connection.lock().unwrap();

        if file.uid > 0 {
            connection.execute(
                "INSERT INTO sys_file (uid, storage, identifier, name, sys_language_uid, l10n_parent)
                 VALUES (?, ?, ?, ?, ?, ?)",
                params![
                    file.uid,
                    file.storage,
                    file.identifier,
                    file.name,
                    file.sys_language_uid,
                    file.l10n_parent
                ],
            )?;
            Ok(file.uid)
        } else {
            connection.execute(
                "INSERT INTO sys_file (storage, identifier, name, sys_language_uid, l10n_parent)
                 VALUES (?, ?, ?, ?, ?)",
                params![
                    file.storage,
                    file.identifier,
                    file.name,
                    file.sys_language_uid,
                    file.l10n_parent
                ],
            )?;
            Ok(connection.last_insert_rowid())
        }
    }

    /// Read a full file record
    pub fn get_file(&self, uid: i64) -> Result<Option<FileRecord>> {
        let connection = self.connection.lock().unwrap();
        let record = connection
            .query_row(
                "SELECT uid, storage, identifier, name, sys_language_uid, l10n_parent
                 FROM sys_file WHERE uid = ? AND deleted = 0",
                params![uid],
                Self::row_to_file_record,
            )
            .optional()?;
        Ok(record)
    }

    /// Read the language fields of a file record
    pub fn file_language_fields(&self, uid: i64) -> Result<Option<FileLanguageFields>> {
        let connection = self.connection.lock().unwrap();
        Self::file_language_fields_with_conn(&connection, uid).map_err(FileVariantsError::from)
    }

    fn file_language_fields_with_conn(
        connection: &Connection,
        uid: i64,
    ) -> rusqlite::Result<Option<FileLanguageFields>> {
        connection
            .query_row(
                "SELECT sys_language_uid, l10n_parent FROM sys_file
                 WHERE uid = ? AND deleted = 0",
                params![uid],
                |row| {
                    Ok(FileLanguageFields {
                        sys_language_uid: row.get("sys_language_uid")?,
                        l10n_parent: row.get("l10n_parent")?,
                    })
                },
            )
            .optional()
    }

    /// Find the variant of a root file in the given language.
    ///
    /// With more than one candidate the lowest uid wins, keeping resolution
    /// deterministic.
    pub fn find_file_variant(&self, root_file: i64, language: i64) -> Result<Option<i64>> {
        let connection = self.connection.lock().unwrap();
        Self::find_file_variant_with_conn(&connection, root_file, language)
            .map_err(FileVariantsError::from)
    }

    fn find_file_variant_with_conn(
        connection: &Connection,
        root_file: i64,
        language: i64,
    ) -> rusqlite::Result<Option<i64>> {
        connection
            .query_row(
                "SELECT uid FROM sys_file
                 WHERE l10n_parent = ? AND sys_language_uid = ? AND deleted = 0
                 ORDER BY uid LIMIT 1",
                params![root_file, language],
                |row| row.get(0),
            )
            .optional()
    }

    /// Soft-delete a file record
    pub fn soft_delete_file(&self, uid: i64) -> Result<()> {
        let connection = self.connection.lock().unwrap();
        connection.execute("UPDATE sys_file SET deleted = 1 WHERE uid = ?", params![uid])?;
        Ok(())
    }

    /// Remove a file record entirely.
    ///
    /// Used to take back a freshly inserted copy row when the localization it
    /// belongs to could not be completed.
    pub fn delete_file_record(&self, uid: i64) -> Result<()> {
        let connection = self.connection.lock().unwrap();
        connection.execute("DELETE FROM sys_file WHERE uid = ?", params![uid])?;
        Ok(())
    }

    // =============================================================================
    // File Reference Methods
    // =============================================================================

    /// Insert a reference record, honoring an explicit uid when one is set
    pub fn insert_reference(&self, reference: &FileReferenceRecord) -> Result<i64> {
        let connection = self.connection.lock().unwrap();

        if reference.uid > 0 {
            connection.execute(
                "INSERT INTO sys_file_reference (uid, uid_local, uid_foreign, tablenames, sys_language_uid)
                 VALUES (?, ?, ?, ?, ?)",
                params![
                    reference.uid,
                    reference.uid_local,
                    reference.uid_foreign,
                    reference.tablenames,
                    reference.sys_language_uid
                ],
            )?;
            Ok(reference.uid)
        } else {
            connection.execute(
                "INSERT INTO sys_file_reference (uid_local, uid_foreign, tablenames, sys_language_uid)
                 VALUES (?, ?, ?, ?)",
                params![
                    reference.uid_local,
                    reference.uid_foreign,
                    reference.tablenames,
                    reference.sys_language_uid
                ],
            )?;
            Ok(connection.last_insert_rowid())
        }
    }

    /// Read a full reference record
    pub fn get_reference(&self, uid: i64) -> Result<Option<FileReferenceRecord>> {
        let connection = self.connection.lock().unwrap();
        let record = connection
            .query_row(
                "SELECT uid, uid_local, uid_foreign, tablenames, sys_language_uid
                 FROM sys_file_reference WHERE uid = ? AND deleted = 0",
                params![uid],
                Self::row_to_reference_record,
            )
            .optional()?;
        Ok(record)
    }

    /// Read the file uid a reference currently points at
    pub fn reference_target(&self, uid: i64) -> Result<Option<i64>> {
        let connection = self.connection.lock().unwrap();
        let target = connection
            .query_row(
                "SELECT uid_local FROM sys_file_reference WHERE uid = ? AND deleted = 0",
                params![uid],
                |row| row.get(0),
            )
            .optional()?;
        Ok(target)
    }

    /// List references pointing at a file from content in the given language
    pub fn references_to_file_in_language(
        &self,
        file_uid: i64,
        language: i64,
    ) -> Result<Vec<FileReferenceRecord>> {
        let connection = self.connection.lock().unwrap();
        let mut stmt = connection.prepare(
            "SELECT uid, uid_local, uid_foreign, tablenames, sys_language_uid
             FROM sys_file_reference
             WHERE sys_language_uid = ? AND uid_local = ? AND deleted = 0
             ORDER BY uid",
        )?;

        let rows = stmt.query_map(params![language, file_uid], Self::row_to_reference_record)?;

        let mut references = Vec::new();
        for row in rows {
            references.push(row?);
        }

        Ok(references)
    }

    /// Point a reference at another file
    pub fn set_reference_target(&self, reference_uid: i64, file_uid: i64) -> Result<()> {
        let connection = self.connection.lock().unwrap();
        Self::set_reference_target_with_conn(&connection, reference_uid, file_uid)?;
        debug!(
            reference_uid = reference_uid,
            file_uid = file_uid,
            "Reference retargeted"
        );
        Ok(())
    }

    fn set_reference_target_with_conn(
        connection: &Connection,
        reference_uid: i64,
        file_uid: i64,
    ) -> rusqlite::Result<usize> {
        connection.execute(
            "UPDATE sys_file_reference SET uid_local = ? WHERE uid = ?",
            params![file_uid, reference_uid],
        )
    }

    /// Soft-delete a reference record
    pub fn soft_delete_reference(&self, uid: i64) -> Result<()> {
        let connection = self.connection.lock().unwrap();
        connection.execute(
            "UPDATE sys_file_reference SET deleted = 1 WHERE uid = ?",
            params![uid],
        )?;
        Ok(())
    }

    // =============================================================================
    // File Metadata Methods
    // =============================================================================

    /// Insert a metadata record, honoring an explicit uid when one is set
    pub fn insert_metadata(&self, metadata: &FileMetadataRecord) -> Result<i64> {
        let connection = self.connection.lock().unwrap();

        if metadata.uid > 0 {
            connection.execute(
                "INSERT INTO sys_file_metadata (uid, file, sys_language_uid, l10n_parent)
                 VALUES (?, ?, ?, ?)",
                params![
                    metadata.uid,
                    metadata.file,
                    metadata.sys_language_uid,
                    metadata.l10n_parent
                ],
            )?;
            Ok(metadata.uid)
        } else {
            connection.execute(
                "INSERT INTO sys_file_metadata (file, sys_language_uid, l10n_parent)
                 VALUES (?, ?, ?)",
                params![metadata.file, metadata.sys_language_uid, metadata.l10n_parent],
            )?;
            Ok(connection.last_insert_rowid())
        }
    }

    /// Read a full metadata record
    pub fn get_metadata(&self, uid: i64) -> Result<Option<FileMetadataRecord>> {
        let connection = self.connection.lock().unwrap();
        let record = connection
            .query_row(
                "SELECT uid, file, sys_language_uid, l10n_parent
                 FROM sys_file_metadata WHERE uid = ? AND deleted = 0",
                params![uid],
                Self::row_to_metadata_record,
            )
            .optional()?;
        Ok(record)
    }

    /// Find the localized child of a metadata record in the given language
    pub fn find_localized_metadata(
        &self,
        parent_uid: i64,
        language: i64,
    ) -> Result<Option<FileMetadataRecord>> {
        let connection = self.connection.lock().unwrap();
        let record = connection
            .query_row(
                "SELECT uid, file, sys_language_uid, l10n_parent
                 FROM sys_file_metadata
                 WHERE l10n_parent = ? AND sys_language_uid = ? AND deleted = 0
                 ORDER BY uid LIMIT 1",
                params![parent_uid, language],
                Self::row_to_metadata_record,
            )
            .optional()?;
        Ok(record)
    }

    // =============================================================================
    // Storage Methods
    // =============================================================================

    /// Insert a storage record, honoring an explicit uid when one is set
    pub fn insert_storage(&self, storage: &StorageRecord) -> Result<i64> {
        let connection = self.connection.lock().unwrap();
        let base_path = storage.base_path.to_string_lossy();

        if storage.uid > 0 {
            connection.execute(
                "INSERT INTO sys_file_storage (uid, name, base_path) VALUES (?, ?, ?)",
                params![storage.uid, storage.name, base_path.as_ref()],
            )?;
            Ok(storage.uid)
        } else {
            connection.execute(
                "INSERT INTO sys_file_storage (name, base_path) VALUES (?, ?)",
                params![storage.name, base_path.as_ref()],
            )?;
            Ok(connection.last_insert_rowid())
        }
    }

    /// Read a full storage record
    pub fn get_storage(&self, uid: i64) -> Result<Option<StorageRecord>> {
        let connection = self.connection.lock().unwrap();
        let record = connection
            .query_row(
                "SELECT uid, name, base_path FROM sys_file_storage
                 WHERE uid = ? AND deleted = 0",
                params![uid],
                Self::row_to_storage_record,
            )
            .optional()?;
        Ok(record)
    }

    // =============================================================================
    // Localization Write Methods
    // =============================================================================

    /// Apply the record mutations of a metadata localization in one
    /// transaction. The copied file gets its language and parent, the
    /// localized metadata row is repointed at it and the collected references
    /// are retargeted.
    pub fn finalize_metadata_localization(
        &self,
        copy_uid: i64,
        language: i64,
        root_file: i64,
        metadata_uid: i64,
        reference_uids: &[i64],
    ) -> Result<()> {
        let connection = self.connection.lock().unwrap();
        let tx = connection.unchecked_transaction().map_err(|e| {
            FileVariantsError::Store(Box::new(StoreError::TransactionFailed {
                operation: "finalize_metadata_localization".to_string(),
                error: e.to_string(),
            }))
        })?;

        tx.execute(
            "UPDATE sys_file SET sys_language_uid = ?, l10n_parent = ? WHERE uid = ?",
            params![language, root_file, copy_uid],
        )?;

        tx.execute(
            "UPDATE sys_file_metadata SET file = ? WHERE uid = ?",
            params![copy_uid, metadata_uid],
        )?;

        for &reference_uid in reference_uids {
            Self::set_reference_target_with_conn(&tx, reference_uid, copy_uid)?;
        }

        tx.commit().map_err(|e| {
            FileVariantsError::Store(Box::new(StoreError::TransactionFailed {
                operation: "finalize_metadata_localization".to_string(),
                error: e.to_string(),
            }))
        })?;

        debug!(
            copy_uid = copy_uid,
            language = language,
            root_file = root_file,
            metadata_uid = metadata_uid,
            reference_count = reference_uids.len(),
            "Metadata localization finalized"
        );

        Ok(())
    }
}
