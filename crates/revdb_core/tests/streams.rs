//! Document and query change streams.

use std::time::Duration;

use revdb_core::{Document, FindOptions, OperationKind, Patch, PatchOp, Pointer, WriteOutcome};
use revdb_testkit::prelude::*;
use serde_json::{json, Value};

fn set(field: &str, value: Value) -> Patch {
    vec![PatchOp::replace(Pointer::from_tokens([field]), value)].into()
}

fn applied(outcome: WriteOutcome) -> Document {
    outcome.into_document().expect("write conflicted")
}

#[tokio::test]
async fn watch_single_document() {
    init_tracing();
    let db = TestDatabase::memory();
    let monsters = db.monsters().await;
    let orig = monsters.create(monster("werewolf", 1.2, 7.3256), None).await.unwrap();
    let id = orig.id().unwrap();
    let other = monsters.create(monster("kishi", 1.6, 7.0), None).await.unwrap();

    let mut sub = monsters.watch_document(id).await.unwrap();

    applied(monsters.patch(id, 1, set("height", json!(1.7)), Some("alice"), None).await.unwrap());
    applied(
        monsters
            .patch(other.id().unwrap(), 1, set("height", json!(2)), None, None)
            .await
            .unwrap(),
    );
    applied(monsters.delete(id, 2, None).await.unwrap());

    let events = next_events(&mut sub, 2).await;
    assert_eq!(events[0].operation.docid, id);
    assert_eq!(events[0].operation.version, 1);
    assert_eq!(events[0].operation.user_id.as_deref(), Some("alice"));
    assert_eq!(events[0].operation.kind, OperationKind::Patched(set("height", json!(1.7))));
    assert!(events[0].snapshot.is_none());
    assert_eq!(events[1].operation.version, 2);
    assert!(events[1].operation.is_deleted());

    assert_quiet(&mut sub, Duration::from_millis(50)).await;
    assert!(sub.close());
    assert!(!sub.close());
    assert!(sub.next().await.is_none());
}

#[tokio::test]
async fn watch_height_range() {
    let db = TestDatabase::memory();
    let monsters = db.monsters().await;
    let mut stored = Vec::new();
    for doc in monster_documents().into_iter().take(6) {
        stored.push(monsters.create(doc, None).await.unwrap());
    }

    let range = FindOptions::range("height", Some(json!(14)), Some(json!(20)));
    let initial = monsters.find(&range).await.unwrap();
    assert_eq!(names(&initial), ["kraken", "werekraken"]);
    let mut sub = monsters.watch(&range).await.unwrap();

    let kraken = find_named(&stored, "kraken").id().unwrap();
    let werekraken = find_named(&stored, "werekraken").id().unwrap();

    monsters.create(monster("not a monster", 0.0023, 0.0), None).await.unwrap();
    let bot = monsters.create(monster("impalerbot", 17.0, 77.0), None).await.unwrap();
    applied(monsters.patch(kraken, 1, set("scariness", json!(666)), None, None).await.unwrap());
    applied(monsters.patch(werekraken, 1, set("height", json!(1)), None, None).await.unwrap());
    applied(monsters.delete(kraken, 2, None).await.unwrap());

    let events = next_events(&mut sub, 4).await;

    assert!(events[0].operation.is_created());
    assert_eq!(events[0].operation.docid, bot.id().unwrap());
    assert_eq!(events[0].snapshot.as_ref(), Some(&bot));

    assert_eq!(events[1].operation.docid, kraken);
    assert_eq!(events[1].operation.version, 1);
    assert_eq!(events[1].operation.patch(), Some(&set("scariness", json!(666))));
    let snapshot = events[1].snapshot.as_ref().unwrap();
    assert_eq!(snapshot.version(), Some(2));
    assert_eq!(snapshot.get("scariness"), Some(&json!(666)));

    // Leaving the range reads as a deletion.
    assert_eq!(events[2].operation.docid, werekraken);
    assert!(events[2].operation.is_deleted());
    assert_eq!(events[2].operation.version, 1);

    assert_eq!(events[3].operation.docid, kraken);
    assert!(events[3].operation.is_deleted());
    assert_eq!(events[3].operation.version, 2);

    assert_quiet(&mut sub, Duration::from_millis(50)).await;
}

#[tokio::test]
async fn watch_by_value() {
    let (_db, monsters, docs) = scenarios::populated().await;
    let mut sub = monsters.watch(&FindOptions::value("height", 1.6)).await.unwrap();

    let werewolf = find_named(&docs, "werewolf").id().unwrap();
    applied(monsters.patch(werewolf, 1, set("height", json!(1.6)), None, None).await.unwrap());

    let event = next_event(&mut sub).await;
    assert!(event.operation.is_created());
    assert_eq!(event.operation.docid, werewolf);
    assert_eq!(event.snapshot.unwrap().version(), Some(2));
}

#[tokio::test]
async fn dropped_subscription_stops_delivery() {
    let (db, monsters, docs) = scenarios::populated().await;
    let kraken = find_named(&docs, "kraken").id().unwrap();

    let sub = monsters.watch(&FindOptions::new()).await.unwrap();
    drop(sub);

    // Writes still succeed with nobody listening.
    applied(monsters.patch(kraken, 1, set("height", json!(15)), None, None).await.unwrap());
    assert_eq!(db.store.row_count("monsters").unwrap(), MONSTER_ROWS.len());
}

#[tokio::test]
async fn unknown_index_fails_to_subscribe() {
    let (_db, monsters, _docs) = scenarios::populated().await;
    let err = monsters
        .watch(&FindOptions::value("colour", "red"))
        .await
        .unwrap_err();
    assert!(matches!(err, revdb_core::CoreError::Store(_)));
}
