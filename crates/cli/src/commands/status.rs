//! Engine status command.
//!
//! Runs the full startup sequence against the configured backend, prints
//! a component-by-component health report, then shuts the engine down.

use sugbo_core::EntityKind;
use sugbo_sync::ListQuery;

/// Initialize and report.
pub async fn run() -> Result<(), Box<dyn std::error::Error>> {
    let core = super::build_core().await?;

    let state = core.initialize().await?;
    let report = core.health_check().await;

    #[allow(clippy::print_stdout)]
    {
        println!("engine state: {state:?}");
        for component in &report.components {
            let mark = if component.healthy { "ok " } else { "!! " };
            match &component.detail {
                Some(detail) => println!("  {mark}{:<24} {detail}", component.name),
                None => println!("  {mark}{}", component.name),
            }
        }

        for kind in EntityKind::ALL {
            match core.content(kind, &ListQuery::default()).await {
                Ok(items) => println!("  {kind}: {} active item(s)", items.len()),
                Err(err) => println!("  {kind}: unavailable ({err})"),
            }
        }
    }

    core.shutdown().await;
    Ok(())
}
