// Variant resolution tests against an in-memory record store

use file_variants::{resolve_variant, FileRecord, RecordStore};

// Helper function to create a store for testing
fn create_test_store() -> RecordStore {
    RecordStore::in_memory().expect("Failed to create in-memory store")
}

// Helper function to seed a file record
fn seed_file(store: &RecordStore, uid: i64, language: i64, parent: i64) -> i64 {
    store
        .insert_file(&FileRecord {
            uid,
            storage: 1,
            identifier: format!("/user_upload/file_{uid}.txt"),
            name: format!("file_{uid}.txt"),
            sys_language_uid: language,
            l10n_parent: parent,
        })
        .expect("Failed to insert file fixture")
}

// =============================================================================
// Root File Resolution
// =============================================================================

#[test]
fn test_variant_found_from_root_file() {
    let store = create_test_store();
    seed_file(&store, 10, 0, 0);
    seed_file(&store, 11, 1, 10);

    let variant = resolve_variant(&store, 1, 10).expect("resolution should succeed");
    assert_eq!(variant, Some(11));
}

#[test]
fn test_no_variant_in_requested_language() {
    let store = create_test_store();
    seed_file(&store, 10, 0, 0);
    seed_file(&store, 11, 1, 10);

    let variant = resolve_variant(&store, 2, 10).expect("resolution should succeed");
    assert_eq!(variant, None);
}

#[test]
fn test_root_without_any_variants() {
    let store = create_test_store();
    seed_file(&store, 10, 0, 0);

    assert_eq!(resolve_variant(&store, 1, 10).unwrap(), None);
}

// =============================================================================
// Normalization Through the Root
// =============================================================================

#[test]
fn test_resolution_from_variant_matches_resolution_from_root() {
    let store = create_test_store();
    seed_file(&store, 10, 0, 0);
    seed_file(&store, 11, 1, 10);
    seed_file(&store, 12, 2, 10);

    for language in [1, 2, 3] {
        let from_root = resolve_variant(&store, language, 10).unwrap();
        let from_first = resolve_variant(&store, language, 11).unwrap();
        let from_second = resolve_variant(&store, language, 12).unwrap();
        assert_eq!(from_root, from_first);
        assert_eq!(from_root, from_second);
    }
}

#[test]
fn test_variant_resolves_to_itself_via_root() {
    let store = create_test_store();
    seed_file(&store, 10, 0, 0);
    seed_file(&store, 11, 1, 10);

    // Asking for language 1 starting from the language 1 variant lands on it
    assert_eq!(resolve_variant(&store, 1, 11).unwrap(), Some(11));
}

// =============================================================================
// Degenerate Inputs
// =============================================================================

#[test]
fn test_unknown_file_id_resolves_to_none() {
    let store = create_test_store();
    seed_file(&store, 10, 0, 0);

    assert_eq!(resolve_variant(&store, 1, 999).unwrap(), None);
}

#[test]
fn test_deleted_file_is_treated_as_unknown() {
    let store = create_test_store();
    seed_file(&store, 10, 0, 0);
    seed_file(&store, 11, 1, 10);
    store.soft_delete_file(10).expect("soft delete should succeed");

    // The root row is gone, but its variants are still found through the uid
    assert_eq!(resolve_variant(&store, 1, 10).unwrap(), Some(11));
}

#[test]
fn test_deleted_variant_is_not_returned() {
    let store = create_test_store();
    seed_file(&store, 10, 0, 0);
    seed_file(&store, 11, 1, 10);
    store.soft_delete_file(11).expect("soft delete should succeed");

    assert_eq!(resolve_variant(&store, 1, 10).unwrap(), None);
}

#[test]
fn test_duplicate_variants_resolve_to_lowest_uid() {
    let store = create_test_store();
    seed_file(&store, 10, 0, 0);
    seed_file(&store, 11, 1, 10);
    seed_file(&store, 15, 1, 10);

    assert_eq!(resolve_variant(&store, 1, 10).unwrap(), Some(11));
}

// =============================================================================
// Independent Chains
// =============================================================================

#[test]
fn test_chains_do_not_leak_into_each_other() {
    let store = create_test_store();
    seed_file(&store, 10, 0, 0);
    seed_file(&store, 11, 1, 10);
    seed_file(&store, 20, 0, 0);
    seed_file(&store, 21, 1, 20);

    assert_eq!(resolve_variant(&store, 1, 10).unwrap(), Some(11));
    assert_eq!(resolve_variant(&store, 1, 20).unwrap(), Some(21));
    assert_eq!(resolve_variant(&store, 1, 21).unwrap(), Some(21));
}
