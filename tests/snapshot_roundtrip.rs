mod common;

use common::*;
use mwsync::transport::TransportEvent;
use serde_json::json;

#[tokio::test]
async fn export_then_import_reproduces_progress() {
    let mut first = ready_session().await;
    first.enter_level("E1L1");
    for item in [1, 3, 5, 5, 8] {
        first.enqueue_item(id(item), true);
    }
    first.tick();
    first.capture_player();
    // Received after the last tick: still queued when the snapshot is taken.
    first
        .transport_mut()
        .push(TransportEvent::ItemReceived { item: id(4), notify: true });
    first.enqueue_item(id(7), false);
    first.pump();
    assert_eq!(first.queue_len(), 2);

    let snapshot = first.export_snapshot();
    assert_eq!(snapshot["player"]["health"], json!(100));

    let mut second = session(ScriptedTransport::answering(Some(snapshot.clone())));
    second.connect().await.expect("connect");
    second.enter_level("E1L1");

    for item in [1, 3, 5, 8] {
        assert_eq!(second.owned_count(id(item)), first.owned_count(id(item)));
    }
    assert_eq!(second.owned_count(id(5)), 2);
    assert_eq!(second.queue_len(), 2);
    assert_eq!(second.export_snapshot(), snapshot);
    assert_eq!(second.pools(), first.pools());
}

#[tokio::test]
async fn pending_traps_survive_a_restart() {
    let mut first = ready_session().await;
    first.enqueue_item(id(7), true);
    first.enqueue_item(id(7), true);
    first.tick();
    // one trigger consumed on this tick, one still pending
    let snapshot = first.export_snapshot();
    assert_eq!(snapshot["traps"][id(7).0.to_string()], json!(1));

    let mut second = session(ScriptedTransport::answering(Some(snapshot)));
    second.connect().await.expect("connect");
    let report = second.tick();
    assert_eq!(report.traps.len(), 1);
    assert!(report.traps[0].triggered);
}

#[tokio::test]
async fn import_adds_to_live_counts_and_keeps_saved_queue_first() {
    let mut s = session(ScriptedTransport::answering(None));
    s.enqueue_item(id(1), true);
    s.enqueue_item(id(8), true);

    let mut items = serde_json::Map::new();
    items.insert(id(1).0.to_string(), json!(2));
    items.insert(id(8).0.to_string(), json!(1));
    // not persistent: never restored from a save
    items.insert(id(4).0.to_string(), json!(3));
    s.import_snapshot(&json!({
        "items": items,
        "queue": [id(9).0, 987654321],
    }));
    assert_eq!(s.owned_count(id(1)), 2);
    assert_eq!(s.owned_count(id(4)), 0);
    assert_eq!(s.queue_len(), 3, "unknown queued ids are dropped");

    let exported = s.export_snapshot();
    assert_eq!(exported["queue"][0]["item_id"], json!(id(9).0));
    assert_eq!(exported["queue"][1]["item_id"], json!(id(1).0));
}

#[tokio::test]
async fn replaying_a_save_never_double_counts_chain_members() {
    let mut items = serde_json::Map::new();
    items.insert(id(5).0.to_string(), json!(3));
    let mut s = session(ScriptedTransport::answering(Some(json!({ "items": items }))));
    s.connect().await.expect("connect");
    s.enter_level("E1L1");
    s.enter_level("E1L2");

    assert_eq!(s.owned_count(id(5)), 3);
    // chain members are applied, never owned
    assert_eq!(s.owned_count(id(1)), 0);
    assert_eq!(s.owned_count(id(6)), 0);
    assert!(s.pools().weapons.contains("shotgun"));
    assert!(s.pools().weapons.contains("chaingun"));
}

#[tokio::test]
async fn malformed_saves_start_fresh() {
    let mut s = session(ScriptedTransport::answering(Some(json!("garbage"))));
    s.connect().await.expect("connect");
    assert_eq!(s.queue_len(), 0);
    assert_eq!(s.owned_count(id(1)), 0);
}

#[tokio::test]
async fn saved_triggers_for_non_trap_items_are_dropped() {
    let mut traps = serde_json::Map::new();
    traps.insert(id(1).0.to_string(), json!(2));
    traps.insert("12345".to_string(), json!(3));
    traps.insert(id(7).0.to_string(), json!(3));
    let mut s = session(ScriptedTransport::answering(Some(json!({ "traps": traps }))));
    s.connect().await.expect("connect");

    let mut kept = serde_json::Map::new();
    kept.insert(id(7).0.to_string(), json!(3));
    assert_eq!(s.export_snapshot()["traps"], serde_json::Value::Object(kept));

    for _ in 0..50 {
        s.tick();
    }
    let exported = s.export_snapshot();
    let saved = exported["traps"].as_object().unwrap();
    assert!(!saved.contains_key(&id(1).0.to_string()));
    assert!(!saved.contains_key("12345"));
    assert!(s.effects().traps.iter().all(|(name, _)| name == "freeze"));
}

#[tokio::test]
async fn engine_fields_of_the_player_blob_survive_a_capture() {
    let mut s = session(ScriptedTransport::answering(Some(json!({
        "player": {"selected": 3, "custom": "kept", "armor": "broken"}
    }))));
    s.connect().await.expect("connect");
    s.capture_player();
    let player = &s.export_snapshot()["player"];
    assert_eq!(player["selected"], json!(3));
    assert_eq!(player["custom"], json!("kept"));
    assert_eq!(player["health"], json!(100));
    assert_eq!(player["armor"], json!(0));
}
