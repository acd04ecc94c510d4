// Variant resolution - the host-independent core of the crate

use tracing::debug;

use crate::error::Result;
use crate::store::RecordStore;

/// Resolve the language variant of a file.
///
/// Normalizes `current_file` to its root first: a file in the default language
/// is its own root, a translated file points at its root through `l10n_parent`.
/// The variant is then the file whose `l10n_parent` is that root and whose
/// `sys_language_uid` is `target_language`. `Ok(None)` means no variant exists
/// and the caller leaves its reference untouched.
///
/// An unknown `current_file` is not an error: the search simply runs against
/// the given uid and comes back empty.
pub fn resolve_variant(
    store: &RecordStore,
    target_language: i64,
    current_file: i64,
) -> Result<Option<i64>> {
    let root_file = match store.file_language_fields(current_file)? {
        Some(fields) if fields.sys_language_uid > 0 => fields.l10n_parent,
        _ => current_file,
    };

    let variant = store.find_file_variant(root_file, target_language)?;

    debug!(
        target_language = target_language,
        current_file = current_file,
        root_file = root_file,
        variant = ?variant,
        "Variant resolution"
    );

    Ok(variant)
}
