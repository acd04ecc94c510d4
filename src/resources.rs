// Physical file resources for file-variants - storages, folders and variant copies

use std::fs;
use std::path::{Path, PathBuf};
use std::time::{SystemTime, UNIX_EPOCH};
use tracing::{debug, warn};

use crate::error::{FileVariantsError, ResourceError, Result};
use crate::store::{FileRecord, RecordStore, StorageRecord};

/// Handle to a folder inside a storage
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Folder {
    pub storage: i64,
    pub path: String,
}

impl Folder {
    pub fn new(storage: i64, path: &str) -> Self {
        Folder {
            storage,
            path: path.trim_matches('/').to_string(),
        }
    }
}

/// Filesystem-side collaborator of the hooks. Locates storages and folders
/// and creates physical variant copies together with their file records.
#[derive(Clone)]
pub struct ResourceService {
    store: RecordStore,
}

impl ResourceService {
    pub fn new(store: RecordStore) -> Self {
        ResourceService { store }
    }

    /// Look up a storage record. A missing storage is fatal: nothing else in
    /// the localization flow can proceed without a place for variant copies.
    pub fn retrieve_storage(&self, storage_uid: i64) -> Result<StorageRecord> {
        match self.store.get_storage(storage_uid)? {
            Some(record) => Ok(record),
            None => Err(FileVariantsError::Resource(Box::new(
                ResourceError::StorageUnavailable {
                    storage_uid,
                    suggestion: Some(
                        "Make sure the storage record exists and is not deleted".to_string(),
                    ),
                },
            ))),
        }
    }

    /// Check whether a folder exists inside a storage
    pub fn has_folder(&self, storage: &StorageRecord, path: &str) -> bool {
        Self::folder_directory(storage, path).is_dir()
    }

    /// Create a folder inside a storage
    pub fn create_folder(&self, storage: &StorageRecord, path: &str) -> Result<Folder> {
        let directory = Self::folder_directory(storage, path);
        fs::create_dir_all(&directory).map_err(|e| {
            FileVariantsError::Resource(Box::new(ResourceError::FolderCreationFailed {
                storage_uid: storage.uid,
                path: path.to_string(),
                error: e.to_string(),
            }))
        })?;

        debug!(
            storage_uid = storage.uid,
            path = %path,
            "Folder created"
        );

        Ok(Folder::new(storage.uid, path))
    }

    /// Copy a file's content into a folder and insert the matching file record.
    ///
    /// The new record starts out in the default language with no parent; the
    /// caller marks it as a variant afterwards. Returns the new file uid.
    pub fn copy_file_to_folder(&self, file_uid: i64, folder: &Folder) -> Result<i64> {
        let file = match self.store.get_file(file_uid)? {
            Some(record) => record,
            None => {
                return Err(FileVariantsError::Resource(Box::new(
                    ResourceError::FileNotFound { file_uid },
                )))
            }
        };

        let source_storage = self.retrieve_storage(file.storage)?;
        let source_path = Self::absolute_path(&source_storage, &file.identifier);
        if !source_path.is_file() {
            return Err(FileVariantsError::Resource(Box::new(
                ResourceError::ContentMissing {
                    file_uid,
                    path: source_path,
                },
            )));
        }

        let target_storage = self.retrieve_storage(folder.storage)?;
        let target_directory = Self::folder_directory(&target_storage, &folder.path);
        fs::create_dir_all(&target_directory).map_err(|e| {
            FileVariantsError::Resource(Box::new(ResourceError::FolderCreationFailed {
                storage_uid: folder.storage,
                path: folder.path.clone(),
                error: e.to_string(),
            }))
        })?;

        let name = Self::free_file_name(&target_directory, &file.name);
        let target_path = target_directory.join(&name);

        fs::copy(&source_path, &target_path).map_err(|e| {
            FileVariantsError::Resource(Box::new(ResourceError::CopyFailed {
                source_path: source_path.display().to_string(),
                target_path: target_path.display().to_string(),
                error: e.to_string(),
            }))
        })?;

        let identifier = format!("/{}/{}", folder.path, name);
        let copy_uid = match self.store.insert_file(&FileRecord {
            uid: 0,
            storage: folder.storage,
            identifier,
            name: name.clone(),
            sys_language_uid: 0,
            l10n_parent: 0,
        }) {
            Ok(uid) => uid,
            Err(e) => {
                // Do not leave content behind without a record pointing at it
                if let Err(remove_error) = fs::remove_file(&target_path) {
                    warn!(
                        path = %target_path.display(),
                        error = %remove_error,
                        "Failed to remove copied content after record insert failure"
                    );
                }
                return Err(e);
            }
        };

        debug!(
            source_uid = file_uid,
            copy_uid = copy_uid,
            name = %name,
            "File copied into variant folder"
        );

        Ok(copy_uid)
    }

    /// Remove a file's content and record, best effort.
    ///
    /// Takes back a copy whose localization could not be completed; failures
    /// are logged, not propagated.
    pub fn remove_file(&self, file_uid: i64) {
        let file = match self.store.get_file(file_uid) {
            Ok(Some(record)) => record,
            Ok(None) => return,
            Err(e) => {
                warn!(file_uid = file_uid, error = %e, "Could not read file record for removal");
                return;
            }
        };

        match self.retrieve_storage(file.storage) {
            Ok(storage) => {
                let path = Self::absolute_path(&storage, &file.identifier);
                if let Err(e) = fs::remove_file(&path) {
                    warn!(
                        file_uid = file_uid,
                        path = %path.display(),
                        error = %e,
                        "Could not remove file content"
                    );
                }
            }
            Err(e) => {
                warn!(file_uid = file_uid, error = %e, "Could not locate storage for removal");
            }
        }

        if let Err(e) = self.store.delete_file_record(file_uid) {
            warn!(file_uid = file_uid, error = %e, "Could not remove file record");
        }
    }

    /// Absolute filesystem path of an identifier inside a storage
    pub fn absolute_path(storage: &StorageRecord, identifier: &str) -> PathBuf {
        storage.base_path.join(identifier.trim_start_matches('/'))
    }

    fn folder_directory(storage: &StorageRecord, path: &str) -> PathBuf {
        storage.base_path.join(path.trim_matches('/'))
    }

    /// Pick a file name that is free inside the directory: the original name
    /// when possible, otherwise with a numeric suffix before the extension.
    fn free_file_name(directory: &Path, name: &str) -> String {
        if !directory.join(name).exists() {
            return name.to_string();
        }

        let (stem, extension) = match name.rsplit_once('.') {
            Some((stem, extension)) if !stem.is_empty() => (stem, Some(extension)),
            _ => (name, None),
        };

        for index in 1..100 {
            let candidate = match extension {
                Some(extension) => format!("{stem}_{index:02}.{extension}"),
                None => format!("{stem}_{index:02}"),
            };
            if !directory.join(&candidate).exists() {
                return candidate;
            }
        }

        // Crowded directory, fall back to a timestamp suffix
        let nanos = SystemTime::now()
            .duration_since(UNIX_EPOCH)
            .map(|d| d.subsec_nanos())
            .unwrap_or(0);
        match extension {
            Some(extension) => format!("{stem}_{nanos:x}.{extension}"),
            None => format!("{stem}_{nanos:x}"),
        }
    }
}
