// Data handler hooks for file-variants - pre-persist field adjustment and
// post-command reference fix-up around the host's record pipeline

use serde_json::Value;
use std::collections::{BTreeMap, HashMap};
use std::fmt;
use tracing::{debug, warn};

use crate::config::{HostConfig, VariantsConfig};
use crate::error::{CommandError, FileVariantsError, Result};
use crate::logging::utils::{command_span, datamap_span};
use crate::resolver::resolve_variant;
use crate::resources::{Folder, ResourceService};
use crate::store::{
    FileReferenceRecord, RecordStore, FILE_METADATA_TABLE, FILE_REFERENCE_TABLE, FILE_TABLE,
};

/// Tables whose file references are never rewritten by variant resolution
pub const EXCLUDED_REFERENCE_TABLES: [&str; 4] = [
    "pages",
    "pages_language_overlay",
    FILE_METADATA_TABLE,
    FILE_TABLE,
];

/// Persistence status of a record passing through the datamap
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum RecordStatus {
    New,
    Update,
}

impl RecordStatus {
    /// Convert from the host's string representation
    #[allow(clippy::should_implement_trait)]
    pub fn from_str(s: &str) -> Result<Self> {
        match s {
            "new" => Ok(RecordStatus::New),
            "update" => Ok(RecordStatus::Update),
            _ => Err(FileVariantsError::Command(Box::new(
                CommandError::UnknownStatus {
                    status: s.to_string(),
                },
            ))),
        }
    }

    /// Convert to string representation
    pub fn as_str(&self) -> &'static str {
        match self {
            RecordStatus::New => "new",
            RecordStatus::Update => "update",
        }
    }
}

/// Structural commands the host's pipeline processes
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum StructuralCommand {
    Copy,
    Move,
    Delete,
    Localize,
    CopyToLanguage,
}

impl StructuralCommand {
    /// Convert from the host's string representation
    #[allow(clippy::should_implement_trait)]
    pub fn from_str(s: &str) -> Result<Self> {
        match s {
            "copy" => Ok(StructuralCommand::Copy),
            "move" => Ok(StructuralCommand::Move),
            "delete" => Ok(StructuralCommand::Delete),
            "localize" => Ok(StructuralCommand::Localize),
            "copyToLanguage" => Ok(StructuralCommand::CopyToLanguage),
            _ => Err(FileVariantsError::Command(Box::new(
                CommandError::UnknownCommand {
                    command: s.to_string(),
                },
            ))),
        }
    }

    /// Convert to string representation
    pub fn as_str(&self) -> &'static str {
        match self {
            StructuralCommand::Copy => "copy",
            StructuralCommand::Move => "move",
            StructuralCommand::Delete => "delete",
            StructuralCommand::Localize => "localize",
            StructuralCommand::CopyToLanguage => "copyToLanguage",
        }
    }

    /// Get all supported commands
    pub fn all() -> Vec<StructuralCommand> {
        vec![
            StructuralCommand::Copy,
            StructuralCommand::Move,
            StructuralCommand::Delete,
            StructuralCommand::Localize,
            StructuralCommand::CopyToLanguage,
        ]
    }

    /// Commands that carry records into another language
    pub fn targets_language(&self) -> bool {
        matches!(
            self,
            StructuralCommand::Localize | StructuralCommand::CopyToLanguage
        )
    }
}

/// Identifier of a record in a command: a persisted uid or a placeholder
/// the pipeline assigned before persisting
#[derive(Debug, Clone, PartialEq, Eq, Hash)]
pub enum RecordId {
    Uid(i64),
    Placeholder(String),
}

impl RecordId {
    pub fn uid(value: i64) -> Self {
        RecordId::Uid(value)
    }

    pub fn placeholder(value: impl Into<String>) -> Self {
        RecordId::Placeholder(value.into())
    }
}

impl fmt::Display for RecordId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            RecordId::Uid(uid) => write!(f, "{uid}"),
            RecordId::Placeholder(placeholder) => write!(f, "{placeholder}"),
        }
    }
}

/// Loosely typed field set of a record passing through the datamap.
/// Hosts deliver values as numbers or numeric strings.
pub type FieldMap = HashMap<String, Value>;

/// What the pipeline reports after a structural command ran: placeholder
/// substitutions and the per-table mapping from source to copied records
#[derive(Debug, Clone, Default)]
pub struct CommandOutcome {
    new_ids: HashMap<String, i64>,
    copy_mapping: HashMap<String, BTreeMap<i64, i64>>,
}

impl CommandOutcome {
    pub fn new() -> Self {
        Self::default()
    }

    /// Record a placeholder substitution
    pub fn with_new_id(mut self, placeholder: impl Into<String>, uid: i64) -> Self {
        self.new_ids.insert(placeholder.into(), uid);
        self
    }

    /// Record a copied record in a table's copy mapping
    pub fn with_copied_record(
        mut self,
        table: impl Into<String>,
        source_uid: i64,
        copy_uid: i64,
    ) -> Self {
        self.copy_mapping
            .entry(table.into())
            .or_default()
            .insert(source_uid, copy_uid);
        self
    }

    /// Uid a placeholder was substituted with
    pub fn new_id(&self, placeholder: &str) -> Option<i64> {
        self.new_ids.get(placeholder).copied()
    }

    /// Copied record uids of a table, in source uid order
    pub fn copied_records(&self, table: &str) -> Vec<i64> {
        self.copy_mapping
            .get(table)
            .map(|mapping| mapping.values().copied().collect())
            .unwrap_or_default()
    }
}

/// The two lifecycle callbacks the host invokes around its record pipeline
pub struct DataHandlerHook {
    store: RecordStore,
    resources: ResourceService,
    config: VariantsConfig,
}

impl DataHandlerHook {
    /// Construct from the host configuration.
    ///
    /// Fails when the file_variants section is absent or invalid: without a
    /// variant storage and folder the metadata localization branch cannot run.
    pub fn new(store: RecordStore, host: &HostConfig) -> Result<Self> {
        let config = VariantsConfig::from_host(host)?;
        Ok(Self::with_config(store, config))
    }

    /// Construct with an already validated configuration
    pub fn with_config(store: RecordStore, config: VariantsConfig) -> Self {
        let resources = ResourceService::new(store.clone());
        DataHandlerHook {
            store,
            resources,
            config,
        }
    }

    /// Pre-persist adjustment of an incoming field set.
    ///
    /// A localized file reference arrives still pointing at the file its
    /// default-language original pointed at. When a variant exists for the
    /// reference's language, swap it into uid_local before the record is
    /// written. Anything else passes through untouched.
    pub fn post_process_field_array(
        &self,
        status: RecordStatus,
        table: &str,
        fields: &mut FieldMap,
    ) -> Result<()> {
        if table != FILE_REFERENCE_TABLE {
            return Ok(());
        }
        let _span = datamap_span(table).entered();

        let language = field_as_int(fields, "sys_language_uid").unwrap_or(0);
        if language <= 0 {
            return Ok(());
        }

        let current_file = field_as_int(fields, "uid_local").unwrap_or(0);
        if current_file <= 0 {
            return Ok(());
        }

        if let Some(variant) = resolve_variant(&self.store, language, current_file)? {
            debug!(
                status = status.as_str(),
                language = language,
                current_file = current_file,
                variant = variant,
                "Incoming reference adjusted to language variant"
            );
            fields.insert("uid_local".to_string(), Value::from(variant));
        }

        Ok(())
    }

    /// Post-command fix-up after the pipeline processed a structural command.
    ///
    /// Only localize and copyToLanguage are of interest: both produce copied
    /// references whose uid_local must be retargeted, and localizing metadata
    /// additionally spawns the physical variant copy.
    pub fn post_process_command(
        &self,
        command: StructuralCommand,
        table: &str,
        id: &RecordId,
        value: i64,
        outcome: &CommandOutcome,
    ) -> Result<()> {
        if !command.targets_language() {
            return Ok(());
        }
        let _span = command_span(command.as_str(), table).entered();

        let record_uid = Self::resolve_record_id(id, outcome)?;

        self.fix_up_copied_references(value, outcome)?;

        if table == FILE_METADATA_TABLE && command == StructuralCommand::Localize {
            self.localize_metadata(record_uid, value)?;
        }

        Ok(())
    }

    /// Retarget the references the command copied to the target language
    fn fix_up_copied_references(&self, language: i64, outcome: &CommandOutcome) -> Result<()> {
        for reference_uid in outcome.copied_records(FILE_REFERENCE_TABLE) {
            let reference = match self.store.get_reference(reference_uid)? {
                Some(record) => record,
                // Deleted or vanished since the command ran
                None => continue,
            };

            if !Self::is_relevant_reference(&reference) {
                debug!(
                    reference_uid = reference.uid,
                    table = %reference.tablenames,
                    "Reference attached to excluded table, left untouched"
                );
                continue;
            }

            if reference.uid_local <= 0 {
                continue;
            }

            if let Some(variant) = resolve_variant(&self.store, language, reference.uid_local)? {
                self.store.set_reference_target(reference.uid, variant)?;
            }
        }

        Ok(())
    }

    /// Localizing a metadata record is the moment a file gets its own language
    /// copy. The variant folder is provisioned and the content copied into it,
    /// then the copy is handed to the localized metadata row and to the
    /// references that already point at the root file in the target language.
    fn localize_metadata(&self, metadata_uid: i64, language: i64) -> Result<()> {
        let folder = self.prepare_storage_environment()?;

        let localized = match self.store.find_localized_metadata(metadata_uid, language)? {
            Some(record) => record,
            None => {
                return Err(FileVariantsError::Command(Box::new(
                    CommandError::MissingLocalizedMetadata {
                        record_uid: metadata_uid,
                        language,
                    },
                )))
            }
        };
        let root_file = localized.file;

        // Collect rewrite targets before any mutation happens
        let reference_uids: Vec<i64> = self
            .store
            .references_to_file_in_language(root_file, language)?
            .iter()
            .filter(|reference| Self::is_relevant_reference(reference))
            .map(|reference| reference.uid)
            .collect();

        let copy_uid = self.resources.copy_file_to_folder(root_file, &folder)?;

        if let Err(e) = self.store.finalize_metadata_localization(
            copy_uid,
            language,
            root_file,
            localized.uid,
            &reference_uids,
        ) {
            warn!(
                copy_uid = copy_uid,
                error = %e,
                "Taking back variant copy after failed finalization"
            );
            self.resources.remove_file(copy_uid);
            return Err(e);
        }

        debug!(
            metadata_uid = metadata_uid,
            language = language,
            root_file = root_file,
            copy_uid = copy_uid,
            reference_count = reference_uids.len(),
            "Metadata localization completed"
        );

        Ok(())
    }

    /// Locate the configured variant storage and make sure its folder exists
    fn prepare_storage_environment(&self) -> Result<Folder> {
        let storage = self
            .resources
            .retrieve_storage(self.config.variants_storage)?;
        let path = &self.config.variants_folder;

        if self.resources.has_folder(&storage, path) {
            Ok(Folder::new(storage.uid, path))
        } else {
            self.resources.create_folder(&storage, path)
        }
    }

    /// References attached to the excluded tables are never rewritten
    fn is_relevant_reference(reference: &FileReferenceRecord) -> bool {
        !EXCLUDED_REFERENCE_TABLES.contains(&reference.tablenames.as_str())
    }

    /// Resolve a command's record id to a persisted uid, fatal when impossible
    fn resolve_record_id(id: &RecordId, outcome: &CommandOutcome) -> Result<i64> {
        let uid = match id {
            RecordId::Uid(uid) => *uid,
            RecordId::Placeholder(placeholder) => outcome.new_id(placeholder).unwrap_or(-1),
        };

        if uid < 1 {
            return Err(FileVariantsError::Command(Box::new(
                CommandError::UnresolvedRecordId { id: id.to_string() },
            )));
        }

        Ok(uid)
    }
}

/// Read a field as an integer, accepting numbers and numeric strings
fn field_as_int(fields: &FieldMap, key: &str) -> Option<i64> {
    match fields.get(key)? {
        Value::Number(number) => number.as_i64(),
        Value::String(text) => text.trim().parse::<i64>().ok(),
        _ => None,
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_record_status_round_trip() {
        for status in [RecordStatus::New, RecordStatus::Update] {
            assert_eq!(RecordStatus::from_str(status.as_str()).unwrap(), status);
        }
        assert!(RecordStatus::from_str("moved").is_err());
    }

    #[test]
    fn test_structural_command_round_trip() {
        for command in StructuralCommand::all() {
            assert_eq!(
                StructuralCommand::from_str(command.as_str()).unwrap(),
                command
            );
        }
        assert!(StructuralCommand::from_str("translate").is_err());
    }

    #[test]
    fn test_language_targeting_commands() {
        assert!(StructuralCommand::Localize.targets_language());
        assert!(StructuralCommand::CopyToLanguage.targets_language());
        assert!(!StructuralCommand::Copy.targets_language());
        assert!(!StructuralCommand::Move.targets_language());
        assert!(!StructuralCommand::Delete.targets_language());
    }

    #[test]
    fn test_record_id_display() {
        assert_eq!(RecordId::uid(42).to_string(), "42");
        assert_eq!(RecordId::placeholder("NEW5912a1").to_string(), "NEW5912a1");
    }

    #[test]
    fn test_resolve_record_id() {
        let outcome = CommandOutcome::new().with_new_id("NEW5912a1", 42);

        assert_eq!(
            DataHandlerHook::resolve_record_id(&RecordId::uid(7), &outcome).unwrap(),
            7
        );
        assert_eq!(
            DataHandlerHook::resolve_record_id(&RecordId::placeholder("NEW5912a1"), &outcome)
                .unwrap(),
            42
        );
    }

    #[test]
    fn test_resolve_record_id_failures() {
        let outcome = CommandOutcome::new();

        let error = DataHandlerHook::resolve_record_id(&RecordId::placeholder("NEWgone"), &outcome)
            .expect_err("unknown placeholder is fatal");
        match error {
            FileVariantsError::Command(command_err) => match command_err.as_ref() {
                CommandError::UnresolvedRecordId { id } => assert_eq!(id, "NEWgone"),
                other => panic!("unexpected command error: {other:?}"),
            },
            other => panic!("unexpected error: {other:?}"),
        }

        assert!(DataHandlerHook::resolve_record_id(&RecordId::uid(0), &outcome).is_err());
        assert!(DataHandlerHook::resolve_record_id(&RecordId::uid(-3), &outcome).is_err());
    }

    #[test]
    fn test_field_as_int_coercion() {
        let mut fields = FieldMap::new();
        fields.insert("a".to_string(), Value::from(5));
        fields.insert("b".to_string(), Value::from("11"));
        fields.insert("c".to_string(), Value::from(" 7 "));
        fields.insert("d".to_string(), Value::from("many"));
        fields.insert("e".to_string(), Value::Bool(true));

        assert_eq!(field_as_int(&fields, "a"), Some(5));
        assert_eq!(field_as_int(&fields, "b"), Some(11));
        assert_eq!(field_as_int(&fields, "c"), Some(7));
        assert_eq!(field_as_int(&fields, "d"), None);
        assert_eq!(field_as_int(&fields, "e"), None);
        assert_eq!(field_as_int(&fields, "missing"), None);
    }

    #[test]
    fn test_command_outcome_copied_records_order() {
        let outcome = CommandOutcome::new()
            .with_copied_record(FILE_REFERENCE_TABLE, 9, 105)
            .with_copied_record(FILE_REFERENCE_TABLE, 3, 101)
            .with_copied_record("tt_content", 1, 50);

        assert_eq!(outcome.copied_records(FILE_REFERENCE_TABLE), vec![101, 105]);
        assert_eq!(outcome.copied_records("tt_content"), vec![50]);
        assert!(outcome.copied_records("pages").is_empty());
    }

    #[test]
    fn test_excluded_tables() {
        let make = |table: &str| FileReferenceRecord {
            uid: 1,
            uid_local: 10,
            uid_foreign: 1,
            tablenames: table.to_string(),
            sys_language_uid: 1,
        };

        assert!(DataHandlerHook::is_relevant_reference(&make("tt_content")));
        assert!(DataHandlerHook::is_relevant_reference(&make("tx_news_domain_model_news")));
        for table in EXCLUDED_REFERENCE_TABLES {
            assert!(!DataHandlerHook::is_relevant_reference(&make(table)));
        }
    }
}
