//! Integration tests for the channel routing core
//!
//! These tests verify:
//! - Condition-based routing across severities, applications, and modules
//! - Install collision policies
//! - Timed and process-bound sink lifetimes
//! - Composite sinks with a hot-swappable active writer
//! - Administrative error semantics

use async_trait::async_trait;
use log_router_system::prelude::*;
use parking_lot::Mutex;
use std::sync::Arc;
use std::time::Duration;
use tokio_util::sync::CancellationToken;

fn sink(id: &str, condition: Condition, writer: MemoryWriter) -> SinkHandle {
    SinkHandle::with_writer(id, condition, writer)
}

async fn hub() -> Arc<ChannelHub> {
    let hub = Arc::new(ChannelHub::new());
    hub.create("c1").unwrap();
    hub
}

async fn install(hub: &ChannelHub, sink: SinkHandle) {
    hub.install_sink("c1", sink, InstallOptions::new())
        .await
        .unwrap();
}

/// Poll until the sink disappears from the registry, bounded.
async fn wait_until_absent(hub: &ChannelHub, sink_id: &str) {
    for _ in 0..200 {
        let present = hub
            .list_sinks("c1")
            .await
            .unwrap()
            .iter()
            .any(|s| s.id() == sink_id);
        if !present {
            return;
        }
        tokio::time::sleep(Duration::from_millis(5)).await;
    }
    panic!("sink '{}' still present after bounded delay", sink_id);
}

#[tokio::test]
async fn test_basic_routing() {
    let hub = hub().await;
    install(
        &hub,
        sink("s1", Condition::Severity(Severity::Debug), MemoryWriter::new()),
    )
    .await;
    install(
        &hub,
        sink(
            "s2",
            Condition::Range(Severity::Info, Severity::Alert),
            MemoryWriter::new(),
        ),
    )
    .await;
    install(
        &hub,
        sink(
            "s3",
            Condition::Severities(vec![Severity::Info]),
            MemoryWriter::new(),
        ),
    )
    .await;
    install(
        &hub,
        sink(
            "s4",
            Condition::Scoped {
                severity: SeverityFilter::AtLeast(Severity::Info),
                application: Some("stdlib".into()),
                module: None,
            },
            MemoryWriter::new(),
        ),
    )
    .await;
    install(
        &hub,
        sink(
            "s5",
            Condition::Scoped {
                severity: SeverityFilter::AtLeast(Severity::Info),
                application: None,
                module: Some("lists".into()),
            },
            MemoryWriter::new(),
        ),
    )
    .await;

    assert_eq!(
        hub.matching_sink_ids("c1", Severity::Debug, "stdlib", "lists"),
        vec!["s1"]
    );
    assert_eq!(
        hub.matching_sink_ids("c1", Severity::Info, "stdlib", "lists"),
        vec!["s1", "s2", "s3", "s4", "s5"]
    );
    assert_eq!(
        hub.matching_sink_ids("c1", Severity::Notice, "stdlib", "dict"),
        vec!["s1", "s2", "s4"]
    );
}

#[tokio::test]
async fn test_install_collision_error_keeps_state() {
    let hub = hub().await;
    let first = MemoryWriter::new();
    install(
        &hub,
        sink("s1", Condition::Severity(Severity::Info), first.clone()),
    )
    .await;

    let err = hub
        .install_sink(
            "c1",
            sink(
                "s1",
                Condition::Severity(Severity::Debug),
                MemoryWriter::new(),
            ),
            InstallOptions::new(),
        )
        .await
        .unwrap_err();
    match err {
        RouterError::AlreadyInstalled { previous } => assert_eq!(previous.id(), "s1"),
        other => panic!("expected AlreadyInstalled, got {other}"),
    }

    // Table unchanged: debug still does not match.
    assert!(hub
        .matching_sink_ids("c1", Severity::Debug, "a", "m")
        .is_empty());
}

#[tokio::test]
async fn test_install_collision_ignore_returns_previous() {
    let hub = hub().await;
    install(
        &hub,
        sink("s1", Condition::Severity(Severity::Info), MemoryWriter::new()),
    )
    .await;

    let previous = hub
        .install_sink(
            "c1",
            sink(
                "s1",
                Condition::Severity(Severity::Debug),
                MemoryWriter::new(),
            ),
            InstallOptions::new().if_exists(IfExists::Ignore),
        )
        .await
        .unwrap()
        .expect("previous sink");
    assert_eq!(previous.id(), "s1");
    assert!(hub
        .matching_sink_ids("c1", Severity::Debug, "a", "m")
        .is_empty());
}

#[tokio::test]
async fn test_install_collision_supersede_reindexes() {
    let hub = hub().await;
    let old_writer = MemoryWriter::new();
    let new_writer = MemoryWriter::new();
    install(
        &hub,
        sink(
            "s1",
            Condition::Severities(vec![Severity::Info]),
            old_writer.clone(),
        ),
    )
    .await;

    hub.install_sink(
        "c1",
        sink(
            "s1",
            Condition::Severities(vec![Severity::Error]),
            new_writer.clone(),
        ),
        InstallOptions::new().if_exists(IfExists::Supersede),
    )
    .await
    .unwrap();

    assert!(hub
        .matching_sink_ids("c1", Severity::Info, "a", "m")
        .is_empty());
    assert_eq!(
        hub.matching_sink_ids("c1", Severity::Error, "a", "m"),
        vec!["s1"]
    );

    // The new registration resolves to the new writer.
    let dispatcher = Dispatcher::new(Arc::clone(&hub));
    dispatcher.dispatch("c1", &LogRecord::new(Severity::Error, "a", "m", "after"));
    assert!(old_writer.lines().is_empty());
    assert_eq!(new_writer.lines().len(), 1);
}

#[tokio::test]
async fn test_process_bound_lifetime() {
    let hub = hub().await;
    let process = CancellationToken::new();
    hub.install_sink(
        "c1",
        sink("s1", Condition::Severity(Severity::Debug), MemoryWriter::new()),
        InstallOptions::new().lifetime(Lifetime::Bound(process.clone())),
    )
    .await
    .unwrap();

    assert_eq!(hub.list_sinks("c1").await.unwrap().len(), 1);

    // Terminate the external task.
    process.cancel();
    wait_until_absent(&hub, "s1").await;
    assert!(hub
        .matching_sink_ids("c1", Severity::Info, "a", "m")
        .is_empty());
}

#[tokio::test]
async fn test_duration_lifetime_expires() {
    let hub = hub().await;
    hub.install_sink(
        "c1",
        sink("s1", Condition::Severity(Severity::Debug), MemoryWriter::new()),
        InstallOptions::new().lifetime(Lifetime::Duration(Duration::from_millis(50))),
    )
    .await
    .unwrap();

    wait_until_absent(&hub, "s1").await;
    assert!(hub
        .matching_sink_ids("c1", Severity::Error, "a", "m")
        .is_empty());
}

#[tokio::test]
async fn test_uninstall_cancels_lifetime_timer() {
    let hub = hub().await;
    hub.install_sink(
        "c1",
        sink("s1", Condition::Severity(Severity::Debug), MemoryWriter::new()),
        InstallOptions::new().lifetime(Lifetime::Duration(Duration::from_millis(50))),
    )
    .await
    .unwrap();

    hub.uninstall_sink("c1", "s1").await.unwrap();

    // Re-install the same id without a lifetime; the stale timer must not
    // remove it.
    install(
        &hub,
        sink("s1", Condition::Severity(Severity::Debug), MemoryWriter::new()),
    )
    .await;
    tokio::time::sleep(Duration::from_millis(150)).await;
    assert_eq!(hub.list_sinks("c1").await.unwrap().len(), 1);
}

/// Child task that parks its publisher where the test can drive it.
#[derive(Default)]
struct RelayChild {
    publisher: Mutex<Option<WriterPublisher>>,
}

#[async_trait]
impl SinkTask for RelayChild {
    async fn run(self: Arc<Self>, publisher: WriterPublisher, shutdown: CancellationToken) {
        *self.publisher.lock() = Some(publisher);
        shutdown.cancelled().await;
    }
}

#[tokio::test]
async fn test_composite_active_writer() {
    let hub = hub().await;
    let relay = Arc::new(RelayChild::default());
    let b = MemoryWriter::new();
    let c = MemoryWriter::new();

    let (composite, handle) = CompositeSink::new(
        "combo",
        vec![
            SinkHandle::with_task("a", Condition::Severity(Severity::Debug), relay.clone()),
            SinkHandle::with_writer("b", Condition::Severity(Severity::Debug), b.clone()),
            SinkHandle::with_writer("c", Condition::Severity(Severity::Debug), c.clone()),
        ],
    )
    .unwrap();

    hub.install_sink(
        "c1",
        SinkHandle::with_task("combo", Condition::Severity(Severity::Debug), composite),
        InstallOptions::new(),
    )
    .await
    .unwrap();

    let dispatcher = Dispatcher::new(Arc::clone(&hub));

    // Default active child is the last one.
    let mut delivered = 0;
    for _ in 0..100 {
        delivered =
            dispatcher.dispatch("c1", &LogRecord::new(Severity::Info, "app", "m", "to c"));
        if delivered == 1 {
            break;
        }
        tokio::time::sleep(Duration::from_millis(5)).await;
    }
    assert_eq!(delivered, 1);
    assert_eq!(c.lines().len(), 1);
    assert!(b.lines().is_empty());

    // Switch to the first child; it has not published yet, so the composite
    // is writer-less and selection drops it.
    handle.set_active(1).await.unwrap();
    assert_eq!(
        dispatcher.dispatch("c1", &LogRecord::new(Severity::Info, "app", "m", "dropped")),
        0
    );

    // The child publishes; emissions use the new writer with no
    // re-registration.
    let a = MemoryWriter::new();
    relay
        .publisher
        .lock()
        .as_ref()
        .expect("child started")
        .publish(Some(Arc::new(a.clone())));

    let mut delivered = 0;
    for _ in 0..100 {
        delivered = dispatcher.dispatch("c1", &LogRecord::new(Severity::Info, "app", "m", "to a"));
        if delivered == 1 {
            break;
        }
        tokio::time::sleep(Duration::from_millis(5)).await;
    }
    assert_eq!(delivered, 1);
    assert!(!a.lines().is_empty());
    assert_eq!(c.lines().len(), 1);

    let children = handle.get_children().await.unwrap();
    assert_eq!(children.len(), 3);
}

#[tokio::test]
async fn test_set_condition_returns_previous_and_reroutes() {
    let hub = hub().await;
    install(
        &hub,
        sink(
            "s1",
            Condition::Severities(vec![Severity::Info]),
            MemoryWriter::new(),
        ),
    )
    .await;

    let previous = hub
        .set_condition("c1", "s1", Condition::Severities(vec![Severity::Alert]))
        .await
        .unwrap();
    assert_eq!(previous, Condition::Severities(vec![Severity::Info]));

    assert!(hub
        .matching_sink_ids("c1", Severity::Info, "a", "m")
        .is_empty());
    assert_eq!(
        hub.matching_sink_ids("c1", Severity::Alert, "a", "m"),
        vec!["s1"]
    );

    let err = hub
        .set_condition("c1", "ghost", Condition::Severity(Severity::Info))
        .await
        .unwrap_err();
    assert!(matches!(err, RouterError::SinkNotFound { .. }));
}

#[tokio::test]
async fn test_uninstall_closes_lifecycle() {
    let hub = hub().await;
    install(
        &hub,
        sink("s1", Condition::Severity(Severity::Debug), MemoryWriter::new()),
    )
    .await;

    let removed = hub.uninstall_sink("c1", "s1").await.unwrap();
    assert_eq!(removed.id(), "s1");

    for severity in Severity::ALL {
        assert!(hub.matching_sink_ids("c1", severity, "a", "m").is_empty());
    }

    let err = hub.uninstall_sink("c1", "s1").await.unwrap_err();
    assert!(matches!(err, RouterError::SinkNotFound { .. }));
}

#[tokio::test]
async fn test_install_uninstall_round_trip() {
    let hub = hub().await;
    install(
        &hub,
        sink(
            "base",
            Condition::Severity(Severity::Warning),
            MemoryWriter::new(),
        ),
    )
    .await;

    let before: Vec<Vec<String>> = Severity::ALL
        .iter()
        .map(|s| hub.matching_sink_ids("c1", *s, "net", "tcp"))
        .collect();

    install(
        &hub,
        sink(
            "probe",
            Condition::Scoped {
                severity: SeverityFilter::Range(Severity::Info, Severity::Error),
                application: Some("net".into()),
                module: Some("tcp".into()),
            },
            MemoryWriter::new(),
        ),
    )
    .await;
    hub.uninstall_sink("c1", "probe").await.unwrap();

    let after: Vec<Vec<String>> = Severity::ALL
        .iter()
        .map(|s| hub.matching_sink_ids("c1", *s, "net", "tcp"))
        .collect();
    assert_eq!(before, after);
}

#[tokio::test]
async fn test_find_and_list() {
    let hub = hub().await;
    install(
        &hub,
        sink("beta", Condition::Severity(Severity::Info), MemoryWriter::new()),
    )
    .await;
    install(
        &hub,
        sink("alpha", Condition::Severity(Severity::Info), MemoryWriter::new()),
    )
    .await;

    let found = hub.find_sink("c1", "alpha").await.unwrap();
    assert_eq!(found.id(), "alpha");
    assert!(hub.find_sink("c1", "ghost").await.is_err());

    let ids: Vec<String> = hub
        .list_sinks("c1")
        .await
        .unwrap()
        .iter()
        .map(|s| s.id().to_string())
        .collect();
    assert_eq!(ids, vec!["alpha", "beta"]);
}

#[tokio::test]
async fn test_invalid_arguments_fail_synchronously() {
    let hub = hub().await;

    let err = hub
        .install_sink(
            "c1",
            sink("has space", Condition::Severity(Severity::Info), MemoryWriter::new()),
            InstallOptions::new(),
        )
        .await
        .unwrap_err();
    assert!(matches!(err, RouterError::InvalidArgument { .. }));

    let err = hub
        .install_sink(
            "c1",
            sink("s1", Condition::Severities(vec![]), MemoryWriter::new()),
            InstallOptions::new(),
        )
        .await
        .unwrap_err();
    assert!(matches!(err, RouterError::InvalidArgument { .. }));

    let err = hub
        .install_sink(
            "c1",
            sink("s1", Condition::Severity(Severity::Info), MemoryWriter::new()),
            InstallOptions::new()
                .lifetime(Lifetime::Duration(Duration::from_secs(u64::MAX / 1000))),
        )
        .await
        .unwrap_err();
    assert!(matches!(err, RouterError::InvalidArgument { .. }));

    // Nothing was installed along the way.
    assert!(hub.list_sinks("c1").await.unwrap().is_empty());
}

#[tokio::test]
async fn test_file_and_json_writers_end_to_end() {
    let dir = tempfile::tempdir().unwrap();
    let text_path = dir.path().join("routed.log");
    let json_path = dir.path().join("routed.jsonl");

    let hub = hub().await;
    install(
        &hub,
        SinkHandle::with_writer(
            "text",
            Condition::Severity(Severity::Info),
            FileWriter::new(&text_path).unwrap(),
        ),
    )
    .await;
    install(
        &hub,
        SinkHandle::with_writer(
            "json",
            Condition::Severity(Severity::Info),
            JsonWriter::new(&json_path).unwrap(),
        ),
    )
    .await;

    let dispatcher = Dispatcher::new(Arc::clone(&hub));
    let record = LogRecord::new(Severity::Warning, "web", "auth", "login failed for {}")
        .with_data(vec!["alice".into()])
        .with_context(LogContext::new().with_field("attempt", 3));
    assert_eq!(dispatcher.dispatch("c1", &record), 2);

    let text = std::fs::read_to_string(&text_path).unwrap();
    assert!(text.contains("login failed for alice"));
    assert!(text.contains("WARNING"));

    let json: serde_json::Value =
        serde_json::from_str(std::fs::read_to_string(&json_path).unwrap().trim()).unwrap();
    assert_eq!(json["application"], "web");
    assert_eq!(json["attempt"], 3);
}

#[tokio::test]
async fn test_injected_newlines_stay_on_one_line() {
    let dir = tempfile::tempdir().unwrap();
    let path = dir.path().join("injection.log");

    let hub = hub().await;
    install(
        &hub,
        SinkHandle::with_writer(
            "file",
            Condition::Severity(Severity::Info),
            FileWriter::new(&path).unwrap(),
        ),
    )
    .await;

    let dispatcher = Dispatcher::new(Arc::clone(&hub));
    let malicious = "User login\nERROR [2024-10-17] Fake error injected";
    dispatcher.dispatch("c1", &LogRecord::new(Severity::Info, "web", "auth", malicious));

    let content = std::fs::read_to_string(&path).unwrap();
    assert_eq!(content.lines().count(), 1);
    assert!(content.contains("\\n"));
}
