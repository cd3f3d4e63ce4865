//! Legacy key migration command.
//!
//! Moves the pre-scoping unscoped keys (`@tourist_app_favorites`, ...)
//! under the given identity scope and removes them. Safe to run again; a
//! second pass reports a no-op.

use tracing::info;

/// Run the migration for one identity scope.
pub async fn run(scope: &str) -> Result<(), Box<dyn std::error::Error>> {
    let core = super::build_core().await?;

    info!(scope, "running legacy key migration");
    let report = core.migrate_scope(scope).await?;

    #[allow(clippy::print_stdout)]
    {
        if report.is_noop() {
            println!("No legacy keys found; nothing to migrate.");
        } else {
            for key in &report.moved {
                println!("moved      {key}");
            }
            for key in &report.superseded {
                println!("superseded {key} (scoped value already present)");
            }
            println!(
                "Migrated {} key(s), {} superseded.",
                report.moved.len(),
                report.superseded.len()
            );
        }
    }
    Ok(())
}
