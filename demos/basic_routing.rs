//! Basic routing walk-through: channels, conditions, lifetimes, and a
//! composite sink.
//!
//! Run with: cargo run --example basic_routing

use log_router_system::prelude::*;
use log_router_system::{info, warning};
use std::sync::Arc;
use std::time::Duration;

#[tokio::main]
async fn main() -> Result<()> {
    let hub = Arc::new(ChannelHub::new());
    hub.create("app")?;

    // Everything warning and above goes to the console.
    hub.install_sink(
        "app",
        SinkHandle::with_writer(
            "console",
            Condition::Severity(Severity::Warning),
            ConsoleWriter::new(),
        ),
        InstallOptions::new(),
    )
    .await?;

    // Auth events are captured in memory, but only for five seconds.
    let audit = MemoryWriter::new();
    hub.install_sink(
        "app",
        SinkHandle::with_writer(
            "audit",
            Condition::Scoped {
                severity: SeverityFilter::AtLeast(Severity::Info),
                application: Some("web".into()),
                module: Some("auth".into()),
            },
            audit.clone(),
        ),
        InstallOptions::new().lifetime(Lifetime::Duration(Duration::from_secs(5))),
    )
    .await?;

    let dispatcher = Dispatcher::new(Arc::clone(&hub));

    info!(dispatcher, "app", "web", "auth", "user {} logged in", "alice");
    warning!(dispatcher, "app", "web", "billing", "invoice {} is overdue", 1042);

    println!("audit captured: {:?}", audit.lines());
    println!(
        "sinks matching (warning, web, billing): {:?}",
        hub.matching_sink_ids("app", Severity::Warning, "web", "billing")
    );

    // A composite sink: memory writers as children, last one active.
    let primary = MemoryWriter::new();
    let fallback = MemoryWriter::new();
    let (composite, control) = CompositeSink::new(
        "tee",
        vec![
            SinkHandle::with_writer("fallback", Condition::Severity(Severity::Debug), fallback),
            SinkHandle::with_writer(
                "primary",
                Condition::Severity(Severity::Debug),
                primary.clone(),
            ),
        ],
    )?;
    hub.install_sink(
        "app",
        SinkHandle::with_task("tee", Condition::Severity(Severity::Debug), composite),
        InstallOptions::new(),
    )
    .await?;

    // Give the coordinator a moment to publish its initial writer.
    tokio::time::sleep(Duration::from_millis(150)).await;

    info!(dispatcher, "app", "web", "auth", "routed through the composite");
    println!("primary captured: {:?}", primary.lines());

    // Flip the active child at runtime; no re-registration involved.
    control.set_active(1).await?;

    hub.delete("app").await?;
    Ok(())
}
