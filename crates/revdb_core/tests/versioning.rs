//! Versioning, conflict and operation log behaviour of versioned tables.

use proptest::prelude::*;
use revdb_core::{
    CoreError, Document, FindOptions, OperationKind, Patch, PatchOp, Pointer, ValidationErrors,
    WriteOutcome,
};
use revdb_store::StoreError;
use revdb_testkit::prelude::*;
use serde_json::{json, Value};

fn set(field: &str, value: Value) -> Patch {
    vec![PatchOp::replace(Pointer::from_tokens([field]), value)].into()
}

fn applied(outcome: WriteOutcome) -> Document {
    match outcome {
        WriteOutcome::Applied { document } => document,
        WriteOutcome::Conflict(conflict) => panic!("unexpected conflict: {conflict:?}"),
    }
}

#[tokio::test]
async fn create_sets_engine_fields() {
    init_tracing();
    let db = TestDatabase::memory();
    let monsters = db.monsters().await;

    let doc = monsters
        .create(monster("werewolf", 1.2, 7.3256).with("version", 40), Some("alice"))
        .await
        .unwrap();

    assert_eq!(doc.id().map(str::len), Some(36));
    assert_eq!(doc.version(), Some(1));
    assert_eq!(doc.created(), doc.modified());
    assert_eq!(doc.get("height"), Some(&json!(1.2)));

    let log = monsters.log().for_document(doc.id().unwrap()).await.unwrap();
    assert_eq!(log.len(), 1);
    assert!(log[0].is_created());
    assert_eq!(log[0].user_id.as_deref(), Some("alice"));
}

#[tokio::test]
async fn update_then_get() {
    let db = TestDatabase::memory();
    let monsters = db.monsters().await;
    let orig = monsters.create(monster("werewolf", 1.2, 7.3256), None).await.unwrap();

    let mut changed = orig.clone();
    changed.insert("height", 1.7);
    let updated = applied(monsters.update(changed, None).await.unwrap());

    assert_eq!(updated.id(), orig.id());
    assert_eq!(updated.version(), Some(2));
    assert_eq!(updated.created(), orig.created());
    assert_eq!(updated.get("height"), Some(&json!(1.7)));

    let fetched = monsters.get(orig.id().unwrap()).await.unwrap().unwrap();
    assert_eq!(fetched, updated);

    let ops = monsters.log().since(orig.id().unwrap(), 1).await.unwrap();
    assert_eq!(ops.len(), 1);
    assert_eq!(ops[0].patch(), Some(&set("height", json!(1.7))));
}

#[tokio::test]
async fn delete_returns_snapshot() {
    let db = TestDatabase::memory();
    let monsters = db.monsters().await;
    let orig = monsters.create(monster("werewolf", 1.2, 7.3256), None).await.unwrap();
    let id = orig.id().unwrap();

    let deleted = applied(monsters.delete(id, 1, None).await.unwrap());
    assert_eq!(deleted, orig);
    assert_eq!(monsters.get(id).await.unwrap(), None);

    let log = monsters.log().for_document(id).await.unwrap();
    assert!(log.last().unwrap().is_deleted());
    assert_eq!(log.last().unwrap().version, 1);
}

#[tokio::test]
async fn stale_delete_is_a_conflict() {
    let db = TestDatabase::memory();
    let monsters = db.monsters().await;
    let orig = monsters.create(monster("werewolf", 1.2, 7.3256), None).await.unwrap();
    let id = orig.id().unwrap();
    applied(monsters.patch(id, 1, set("height", json!(1.5)), None, None).await.unwrap());

    let outcome = monsters.delete(id, 1, None).await.unwrap();
    let conflict = outcome.conflict().unwrap();
    assert_eq!(conflict.ops.len(), 1);
    assert_eq!(conflict.current_version(), Some(2));
    assert!(monsters.get(id).await.unwrap().is_some());
}

#[tokio::test]
async fn stale_patch_returns_missed_operations() {
    let db = TestDatabase::memory();
    let monsters = db.monsters().await;
    let orig = monsters.create(monster("werewolf", 1.2, 7.3256), None).await.unwrap();
    let id = orig.id().unwrap();

    for (version, height) in [(1, 1.3), (2, 1.4), (3, 1.5)] {
        applied(
            monsters
                .patch(id, version, set("height", json!(height)), None, None)
                .await
                .unwrap(),
        );
    }

    let outcome = monsters
        .patch(id, 2, set("name", json!("wolfman")), None, None)
        .await
        .unwrap();
    let conflict = outcome.conflict().unwrap();
    let versions: Vec<u64> = conflict.ops.iter().map(|op| op.version).collect();
    assert_eq!(versions, [2, 3]);
    assert_eq!(conflict.ops, monsters.log().since(id, 2).await.unwrap());

    let current = monsters.get(id).await.unwrap().unwrap();
    assert_eq!(current.version(), Some(4));
    assert_eq!(current.get("name"), Some(&json!("werewolf")));
}

#[tokio::test]
async fn future_version_is_invalid() {
    let db = TestDatabase::memory();
    let monsters = db.monsters().await;
    let orig = monsters.create(monster("werewolf", 1.2, 7.3256), None).await.unwrap();

    let err = monsters
        .patch(orig.id().unwrap(), 5, set("height", json!(2)), None, None)
        .await
        .unwrap_err();
    assert!(matches!(
        err,
        CoreError::InvalidVersion { expected: 5, current: 1, .. }
    ));
    assert!(err.is_client_error());
}

#[tokio::test]
async fn missing_document() {
    let db = TestDatabase::memory();
    let monsters = db.monsters().await;
    let err = monsters
        .patch("nope", 1, Patch::new(), None, None)
        .await
        .unwrap_err();
    assert!(matches!(err, CoreError::NotFound { .. }));

    let err = monsters.update(monster("x", 1.0, 1.0), None).await.unwrap_err();
    assert!(matches!(err, CoreError::MissingId));
}

#[tokio::test]
async fn auto_fields_survive_patches() {
    let db = TestDatabase::memory();
    let monsters = db.monsters().await;
    let orig = monsters.create(monster("werewolf", 1.2, 7.3256), None).await.unwrap();
    let id = orig.id().unwrap();

    let sneaky: Patch = vec![
        PatchOp::replace(Pointer::from_tokens(["id"]), "other"),
        PatchOp::replace(Pointer::from_tokens(["version"]), 99),
        PatchOp::remove(Pointer::from_tokens(["created"])),
        PatchOp::replace(Pointer::from_tokens(["height"]), 1.4),
    ]
    .into();
    let doc = applied(monsters.patch(id, 1, sneaky, None, None).await.unwrap());
    assert_eq!(doc.id(), Some(id));
    assert_eq!(doc.version(), Some(2));
    assert_eq!(doc.created(), orig.created());

    // Only the business edit is logged, so replaying the log matches the store.
    let ops = monsters.log().since(id, 1).await.unwrap();
    assert_eq!(ops[0].patch(), Some(&set("height", json!(1.4))));
}

#[tokio::test]
async fn deleted_id_can_be_created_again() {
    let db = TestDatabase::memory();
    let monsters = db.monsters().await;
    let first = monsters
        .create(monster("werewolf", 1.2, 7.3256).with("id", "w1"), None)
        .await
        .unwrap();
    applied(monsters.patch("w1", 1, set("height", json!(1.9)), None, None).await.unwrap());
    applied(monsters.delete("w1", 2, None).await.unwrap());

    let second = monsters
        .create(monster("werewolf", 0.8, 2.0).with("id", "w1"), None)
        .await
        .unwrap();
    assert_eq!(second.version(), Some(1));
    assert_ne!(second.created(), first.created());

    let log = monsters.log().for_document("w1").await.unwrap();
    assert_eq!(log.len(), 1);
    assert!(log[0].is_created());

    let patched = applied(
        monsters
            .patch("w1", 1, set("height", json!(0.9)), None, None)
            .await
            .unwrap(),
    );
    assert_eq!(patched.version(), Some(2));

    // A stale writer only sees the history of the current document.
    let conflict = monsters
        .patch("w1", 1, set("scariness", json!(3)), None, None)
        .await
        .unwrap();
    let ops = &conflict.conflict().unwrap().ops;
    assert_eq!(ops.len(), 1);
    assert_eq!(ops[0].patch(), Some(&set("height", json!(0.9))));

    applied(monsters.delete("w1", 2, None).await.unwrap());
    assert!(monsters.get("w1").await.unwrap().is_none());
}

#[tokio::test]
async fn validator_rejects_before_writing() {
    let db = TestDatabase::memory();
    let monsters = db.monsters().await;
    let orig = monsters.create(monster("werewolf", 1.2, 7.3256), None).await.unwrap();
    let id = orig.id().unwrap();

    let positive = |doc: &Document| match doc.get("height").and_then(Value::as_f64) {
        Some(h) if h > 0.0 => Ok(()),
        _ => Err(ValidationErrors::new().with("height", "must be positive")),
    };

    let err = monsters
        .patch(id, 1, set("height", json!(-3)), None, Some(&positive))
        .await
        .unwrap_err();
    match err {
        CoreError::Validation(errors) => assert_eq!(errors.get("height"), Some("must be positive")),
        other => panic!("unexpected error: {other}"),
    }
    assert_eq!(monsters.get(id).await.unwrap().unwrap(), orig);
    assert_eq!(monsters.log().for_document(id).await.unwrap().len(), 1);

    applied(
        monsters
            .patch(id, 1, set("height", json!(3)), None, Some(&positive))
            .await
            .unwrap(),
    );
}

#[tokio::test]
async fn concurrent_writers_one_wins() {
    let (_db, monsters, docs) = scenarios::populated().await;
    let werewolf = find_named(&docs, "werewolf");
    let id = werewolf.id().unwrap();

    let (a, b) = tokio::join!(
        monsters.patch(id, 1, set("height", json!(1.9)), Some("a"), None),
        monsters.patch(id, 1, set("scariness", json!(9)), Some("b"), None),
    );
    let outcomes = [a.unwrap(), b.unwrap()];
    assert_eq!(outcomes.iter().filter(|o| o.is_conflict()).count(), 1);

    let current = monsters.get(id).await.unwrap().unwrap();
    assert_eq!(current.version(), Some(2));
    let ops = monsters.log().since(id, 1).await.unwrap();
    assert_eq!(ops.len(), 1);
}

#[tokio::test]
async fn concurrent_writers_across_tasks() {
    let (_db, monsters, docs) = scenarios::populated().await;
    let id = find_named(&docs, "kraken").id().unwrap().to_string();

    let handles: Vec<_> = (0..8)
        .map(|i| {
            let monsters = monsters.clone();
            let id = id.clone();
            tokio::spawn(async move {
                monsters
                    .patch(&id, 1, set("scariness", json!(i)), None, None)
                    .await
                    .unwrap()
            })
        })
        .collect();

    let mut wins = 0;
    for handle in handles {
        if !handle.await.unwrap().is_conflict() {
            wins += 1;
        }
    }
    assert_eq!(wins, 1);
    assert_eq!(monsters.log().for_document(&id).await.unwrap().len(), 2);
}

#[tokio::test]
async fn log_failure_reports_partial_write() {
    let db = TestDatabase::memory();
    let monsters = db.monsters().await;
    let orig = monsters.create(monster("werewolf", 1.2, 7.3256), None).await.unwrap();
    let id = orig.id().unwrap();

    db.store.fail_next_write("monsters_ops", "log offline").unwrap();
    let err = monsters
        .patch(id, 1, set("height", json!(2.0)), None, None)
        .await
        .unwrap_err();
    match err {
        CoreError::PartialWrite { document, source } => {
            assert_eq!(document.version(), Some(2));
            assert!(matches!(
                *source,
                CoreError::Store(StoreError::Unavailable(_))
            ));
        }
        other => panic!("unexpected error: {other}"),
    }

    // The document moved on; its history did not.
    assert_eq!(monsters.get(id).await.unwrap().unwrap().version(), Some(2));
    assert!(monsters.log().since(id, 1).await.unwrap().is_empty());
}

#[tokio::test]
async fn find_by_value_and_range() {
    let (_db, monsters, _docs) = scenarios::populated().await;

    let tall = monsters.find(&FindOptions::value("height", 14)).await.unwrap();
    assert_eq!(names(&tall), ["kraken", "werekraken"]);

    let scary = monsters
        .find(&FindOptions::range("scariness", Some(json!(4)), Some(json!(20))))
        .await
        .unwrap();
    assert_eq!(names(&scary), ["kishi", "minotaur", "werewolf"]);

    let limited = monsters
        .find(&FindOptions::new().order_by("height").limit(2))
        .await
        .unwrap();
    assert_eq!(names(&limited), ["not a monster", "tiny bat"]);

    assert_eq!(monsters.indexes().await.unwrap(), ["height", "scariness"]);
}

#[test]
fn replaying_the_log_rebuilds_the_document() {
    let runtime = tokio::runtime::Builder::new_current_thread()
        .enable_all()
        .build()
        .unwrap();

    proptest!(ProptestConfig::with_cases(32), |(
        initial in document_strategy(),
        edits in prop::collection::vec(document_strategy(), 1..8),
    )| {
        runtime.block_on(async {
            let db = TestDatabase::memory();
            let table = db.register(revdb_core::TableSpec::new("things")).await.unwrap();
            let created = table.create(initial, None).await.unwrap();
            let id = created.id().unwrap().to_string();

            let mut last = created.clone();
            for edit in &edits {
                let mut next = edit.clone();
                next.insert("id", id.as_str());
                last = applied(table.update(next, None).await.unwrap());
            }
            assert_eq!(last.version(), Some(edits.len() as u64 + 1));

            let ops = table.log().for_document(&id).await.unwrap();
            assert_eq!(ops.len(), edits.len() + 1);
            let mut replayed = created.into_value();
            for (expected, op) in (1u64..).zip(&ops[1..]) {
                assert_eq!(op.version, expected);
                let OperationKind::Patched(patch) = &op.kind else {
                    panic!("expected a patch record");
                };
                replayed = revdb_patch::apply(patch, &replayed).unwrap();
            }
            assert_eq!(
                Document::from_value(replayed).unwrap().fields(),
                last.fields()
            );
        });
    });
}
