//! Operator runs end to end: manifests in, provisioned objects out.

#![allow(clippy::unwrap_used, clippy::expect_used, clippy::indexing_slicing)]

use std::io::Write;
use std::sync::Arc;
use std::time::Duration;

use linebot_core::{Bot, BotPhase, EventBinding, OperatorConfig};
use linebot_operator::{Error, Supervisor, manifest};
use linebot_reconciler::ShutdownSignal;
use linebot_store::{Api, InMemoryStore, ObjectStore};

const MANIFEST: &str = r"
apiVersion: line.you/v1alpha1
kind: Bot
metadata:
  name: echo
spec:
  selector:
    matchLabels:
      app: echo
  channelSecretName: line-secret
  expose:
    type: Ngrok
    ngrokToken: tok-1
  version: v0.2.0
---
apiVersion: line.you/v1alpha1
kind: Event
metadata:
  name: greet
spec:
  selector:
    matchLabels:
      app: echo
  type: message
  messages:
    - keywords: [hello]
      reply: hi there
";

fn fast_config() -> OperatorConfig {
    OperatorConfig {
        init_retry_delay_secs: 1,
        establish_interval_ms: 10,
        establish_timeout_secs: 1,
        ..OperatorConfig::default()
    }
}

async fn wait_for<F, Fut>(mut check: F)
where
    F: FnMut() -> Fut,
    Fut: std::future::Future<Output = bool>,
{
    for _ in 0..400 {
        if check().await {
            return;
        }
        tokio::time::sleep(Duration::from_millis(5)).await;
    }
    assert!(check().await, "condition not reached in time");
}

#[tokio::test]
async fn test_seeded_bot_is_provisioned_and_bound() {
    let mut file = tempfile::NamedTempFile::new().unwrap();
    file.write_all(MANIFEST.as_bytes()).unwrap();

    let backend = InMemoryStore::builder().establish_after_polls(2).build();
    let backend = Arc::new(backend);
    let store: Arc<dyn ObjectStore> = backend.clone();
    let objects = manifest::load(file.path()).unwrap();
    manifest::apply(&store, objects, "default").await.unwrap();

    let supervisor = Supervisor::new(Arc::clone(&store), backend, fast_config());
    let shutdown = supervisor.shutdown();
    let running = tokio::spawn(supervisor.run());

    let bots: Api<Bot> = Api::namespaced(Arc::clone(&store), "default");
    let bindings: Api<EventBinding> = Api::namespaced(Arc::clone(&store), "default");
    wait_for(|| async {
        bots.get("echo")
            .await
            .is_ok_and(|b| b.phase() == BotPhase::Active)
    })
    .await;

    // The event was stored before the binding existed, so touch it once the
    // bot is active to route it into the new binding.
    let events: Api<linebot_core::Event> = Api::namespaced(Arc::clone(&store), "default");
    let greet = events.get("greet").await.unwrap();
    events.update(&greet).await.unwrap();
    wait_for(|| async {
        bindings
            .get("echo")
            .await
            .is_ok_and(|b| b.subsets.iter().any(|s| s.source() == "greet"))
    })
    .await;

    shutdown.initiate_shutdown(ShutdownSignal::Sigint);
    let report = running.await.unwrap().unwrap();
    assert_eq!(report.signal, ShutdownSignal::Sigint);
    assert_eq!(report.loops.len(), 3);

    let dump = manifest::dump(&store).await.unwrap();
    for kind in [
        "kind: Bot",
        "kind: Event",
        "kind: EventBinding",
        "kind: ConfigMap",
        "kind: Service",
        "kind: Deployment",
    ] {
        assert!(dump.contains(kind), "{kind} missing from dump");
    }
    assert!(dump.contains("reply: hi there"));
}

#[tokio::test]
async fn test_namespace_scoped_operator_ignores_other_namespaces() {
    let backend = Arc::new(InMemoryStore::new());
    let store: Arc<dyn ObjectStore> = backend.clone();
    let mut objects = manifest::parse(MANIFEST).unwrap();
    objects.truncate(1);
    manifest::apply(&store, objects.clone(), "elsewhere").await.unwrap();
    manifest::apply(&store, objects, "bots").await.unwrap();

    let config = OperatorConfig {
        namespace: Some("bots".to_string()),
        ..fast_config()
    };
    let supervisor = Supervisor::new(Arc::clone(&store), backend, config);
    let shutdown = supervisor.shutdown();
    let running = tokio::spawn(supervisor.run());

    let scoped: Api<Bot> = Api::namespaced(Arc::clone(&store), "bots");
    wait_for(|| async {
        scoped
            .get("echo")
            .await
            .is_ok_and(|b| b.phase() == BotPhase::Active)
    })
    .await;

    let other: Api<Bot> = Api::namespaced(Arc::clone(&store), "elsewhere");
    assert_eq!(other.get("echo").await.unwrap().phase(), BotPhase::Pending);

    shutdown.initiate_shutdown(ShutdownSignal::Programmatic);
    running.await.unwrap().unwrap();
}

#[tokio::test]
async fn test_shutdown_during_schema_setup_interrupts_startup() {
    let backend = Arc::new(
        InMemoryStore::builder()
            .with_registration_failures(u32::MAX)
            .build(),
    );
    let supervisor = Supervisor::new(backend.clone(), backend, fast_config());
    let shutdown = supervisor.shutdown();
    let running = tokio::spawn(supervisor.run());

    tokio::time::sleep(Duration::from_millis(20)).await;
    shutdown.initiate_shutdown(ShutdownSignal::Sigterm);

    let err = running.await.unwrap().unwrap_err();
    assert!(matches!(err, Error::Interrupted));
}
