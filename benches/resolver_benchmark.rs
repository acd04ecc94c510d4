use criterion::{black_box, criterion_group, criterion_main, BenchmarkId, Criterion};
use file_variants::{
    resolve_variant, CommandOutcome, DataHandlerHook, FieldMap, FileRecord, RecordId, RecordStatus,
    RecordStore, StructuralCommand, VariantsConfig,
};

// Seeds `root_count` root files, each with one language 1 variant
fn seeded_store(root_count: i64) -> RecordStore {
    let store = RecordStore::in_memory().expect("Failed to create in-memory store");
    for index in 0..root_count {
        let root_uid = 10 + index * 2;
        let variant_uid = root_uid + 1;
        store
            .insert_file(&FileRecord {
                uid: root_uid,
                storage: 1,
                identifier: format!("/user_upload/file_{index}.txt"),
                name: format!("file_{index}.txt"),
                sys_language_uid: 0,
                l10n_parent: 0,
            })
            .expect("Failed to insert root file");
        store
            .insert_file(&FileRecord {
                uid: variant_uid,
                storage: 1,
                identifier: format!("/languageVariants/file_{index}.txt"),
                name: format!("file_{index}.txt"),
                sys_language_uid: 1,
                l10n_parent: root_uid,
            })
            .expect("Failed to insert variant file");
    }
    store
}

fn benchmark_variant_resolution(c: &mut Criterion) {
    let sizes = [10_i64, 100, 1000];

    // Benchmark resolution against stores of different sizes
    let mut group = c.benchmark_group("variant_resolution");
    for size in sizes.iter() {
        let store = seeded_store(*size);
        let middle_root = 10 + (*size / 2) * 2;
        group.bench_with_input(BenchmarkId::new("resolve_hit", size), &store, |b, store| {
            b.iter(|| {
                let result = resolve_variant(black_box(store), black_box(1), middle_root);
                black_box(result)
            })
        });
    }
    group.finish();

    let store = seeded_store(1000);
    let middle_root = 10 + 500 * 2;

    // No variant exists for language 2
    c.bench_function("resolve_miss", |b| {
        b.iter(|| {
            let result = resolve_variant(black_box(&store), black_box(2), middle_root);
            black_box(result)
        })
    });

    // Asking from the variant adds the normalization lookup
    c.bench_function("resolve_from_variant", |b| {
        b.iter(|| {
            let result = resolve_variant(black_box(&store), black_box(1), middle_root + 1);
            black_box(result)
        })
    });

    // Unknown uids fall through to a plain lookup against the root
    c.bench_function("resolve_unknown_file", |b| {
        b.iter(|| {
            let result = resolve_variant(black_box(&store), black_box(1), black_box(999_999));
            black_box(result)
        })
    });
}

fn benchmark_hook_paths(c: &mut Criterion) {
    let store = seeded_store(1000);
    let hook = DataHandlerHook::with_config(
        store,
        VariantsConfig {
            variants_storage: 2,
            variants_folder: "languageVariants".to_string(),
        },
    );
    let middle_root = 10 + 500 * 2;

    c.bench_function("field_array_rewrite", |b| {
        b.iter(|| {
            let mut fields = FieldMap::new();
            fields.insert("sys_language_uid".to_string(), 1.into());
            fields.insert("uid_local".to_string(), middle_root.into());
            let result = hook.post_process_field_array(
                RecordStatus::New,
                black_box("sys_file_reference"),
                &mut fields,
            );
            black_box(result)
        })
    });

    // Commands without copied references resolve the id and return early
    let outcome = CommandOutcome::new();
    c.bench_function("command_without_copies", |b| {
        b.iter(|| {
            let result = hook.post_process_command(
                StructuralCommand::Localize,
                black_box("tt_content"),
                &RecordId::uid(42),
                black_box(1),
                &outcome,
            );
            black_box(result)
        })
    });
}

criterion_group!(benches, benchmark_variant_resolution, benchmark_hook_paths);
criterion_main!(benches);
