//! Integration tests for the typed api over the in-memory store.

#![allow(
    clippy::unwrap_used,
    clippy::expect_used,
    clippy::indexing_slicing,
    clippy::panic
)]

use std::sync::Arc;

use linebot_core::{
    Bot, BotSpec, Event, EventBinding, EventSpec, LabelSelector, ObjectMeta, Resource,
};
use linebot_store::{
    Api, InMemoryStore, ListParams, ObjectStore, Operation, StoreError, TracingStore, WatchEvent,
};

fn traced_store() -> Arc<dyn ObjectStore> {
    Arc::new(TracingStore::new(InMemoryStore::new()))
}

#[tokio::test]
async fn test_round_trip_through_tracing_store() {
    let store = traced_store();
    let bots: Api<Bot> = Api::namespaced(Arc::clone(&store), "default");

    let bot = Bot::new(ObjectMeta::new("b1", "default"), BotSpec::default());
    let created = bots.create(&bot).await.unwrap();
    assert!(created.metadata.uid.is_some());

    let fetched = bots.get("b1").await.unwrap();
    assert_eq!(fetched, created);

    let deleted = bots.delete("b1").await.unwrap();
    assert_eq!(deleted.metadata.name, "b1");
    assert!(bots.get("b1").await.unwrap_err().is_not_found());
}

#[tokio::test]
async fn test_list_by_spec_selector() {
    let store = traced_store();
    let bindings: Api<EventBinding> = Api::namespaced(Arc::clone(&store), "default");

    for (name, app) in [("b1", "chat"), ("b2", "chat"), ("b3", "shop")] {
        let meta = ObjectMeta::new(name, "default").with_label("app", app);
        bindings.create(&EventBinding::new(meta)).await.unwrap();
    }

    let selector = LabelSelector::from_pairs([("app", "chat")]);
    let names: Vec<_> = bindings
        .list(&ListParams::matching(&selector))
        .await
        .unwrap()
        .into_iter()
        .map(|b| b.metadata.name)
        .collect();
    assert_eq!(names, vec!["b1", "b2"]);
}

#[tokio::test]
async fn test_stale_typed_update_is_conflict() {
    let store = traced_store();
    let bindings: Api<EventBinding> = Api::namespaced(Arc::clone(&store), "default");

    let first = bindings
        .create(&EventBinding::new(ObjectMeta::new("b1", "default")))
        .await
        .unwrap();
    let second = first.clone();

    bindings.update(&first).await.unwrap();
    let err = bindings.update(&second).await.unwrap_err();
    assert!(err.is_conflict());
}

#[tokio::test]
async fn test_watch_is_scoped_to_its_kind() {
    let store = traced_store();
    let events: Api<Event> = Api::all(Arc::clone(&store));
    let bindings: Api<EventBinding> = Api::namespaced(Arc::clone(&store), "default");

    let mut stream = events.watch().await.unwrap();

    bindings
        .create(&EventBinding::new(ObjectMeta::new("noise", "default")))
        .await
        .unwrap();
    let event = Event::new(ObjectMeta::new("greet", "default"), EventSpec::default());
    events.create(&event).await.unwrap();

    match stream.next().await.unwrap() {
        WatchEvent::Added(e) => assert_eq!(e.metadata.name, "greet"),
        other => panic!("unexpected notification: {other:?}"),
    }
}

#[tokio::test]
async fn test_watch_reports_modifications() {
    let backend = InMemoryStore::new_arc();
    let store: Arc<dyn ObjectStore> = backend.clone();
    let bindings: Api<EventBinding> = Api::namespaced(store, "default");

    let created = bindings
        .create(&EventBinding::new(ObjectMeta::new("b1", "default")))
        .await
        .unwrap();
    let mut stream = bindings.watch().await.unwrap();
    assert!(matches!(stream.next().await, Some(WatchEvent::Added(_))));

    let mut edited = created;
    edited.metadata.labels.insert("app".to_string(), "chat".to_string());
    bindings.update(&edited).await.unwrap();

    match stream.next().await.unwrap() {
        WatchEvent::Modified(b) => {
            assert_eq!(b.metadata.labels.get("app").map(String::as_str), Some("chat"));
        }
        other => panic!("unexpected notification: {other:?}"),
    }
}

#[tokio::test]
async fn test_injected_failure_surfaces_through_api() {
    let backend = InMemoryStore::new_arc();
    backend
        .inject_failure(
            Operation::List,
            linebot_core::Kind::EventBinding,
            StoreError::unavailable("store offline"),
        )
        .await;
    let store: Arc<dyn ObjectStore> = backend.clone();
    let bindings: Api<EventBinding> = Api::all(store);

    let err = bindings.list(&ListParams::default()).await.unwrap_err();
    assert!(matches!(err, StoreError::Unavailable { .. }));
    assert!(bindings.list(&ListParams::default()).await.unwrap().is_empty());
}

async fn drain_names<R: Resource>(
    stream: &mut linebot_store::WatchStream<R>,
) -> std::collections::BTreeSet<String> {
    let mut seen = std::collections::BTreeSet::new();
    while let Ok(Some(event)) =
        tokio::time::timeout(std::time::Duration::from_millis(100), stream.next()).await
    {
        seen.insert(event.object().name().to_string());
    }
    seen
}

#[tokio::test]
async fn test_lagging_watch_relists_current_objects() {
    let store: Arc<dyn ObjectStore> =
        Arc::new(InMemoryStore::builder().with_channel_capacity(2).build());
    let bots: Api<Bot> = Api::namespaced(Arc::clone(&store), "default");
    let mut stream = bots.watch().await.unwrap();

    for i in 0..5 {
        let bot = Bot::new(ObjectMeta::new(format!("b{i}"), "default"), BotSpec::default());
        bots.create(&bot).await.unwrap();
    }

    let seen = drain_names(&mut stream).await;
    assert_eq!(
        seen.into_iter().collect::<Vec<_>>(),
        vec!["b0", "b1", "b2", "b3", "b4"]
    );
}

#[tokio::test]
async fn test_burst_of_other_kinds_does_not_hide_an_event() {
    let store: Arc<dyn ObjectStore> =
        Arc::new(InMemoryStore::builder().with_channel_capacity(2).build());
    let events: Api<Event> = Api::namespaced(Arc::clone(&store), "default");
    let bindings: Api<EventBinding> = Api::namespaced(Arc::clone(&store), "default");
    let mut stream = events.watch().await.unwrap();

    events
        .create(&Event::new(ObjectMeta::new("greet", "default"), EventSpec::default()))
        .await
        .unwrap();
    for i in 0..4 {
        bindings
            .create(&EventBinding::new(ObjectMeta::new(format!("b{i}"), "default")))
            .await
            .unwrap();
    }

    match stream.next().await.unwrap() {
        WatchEvent::Modified(event) => assert_eq!(event.metadata.name, "greet"),
        other => panic!("expected a replayed event, got {other:?}"),
    }
}
