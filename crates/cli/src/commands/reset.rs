//! Category reset command.

use sugbo_sync::ResetCategory;
use tracing::info;

/// Apply one category reset and print the audit entry.
pub async fn run(category: ResetCategory) -> Result<(), Box<dyn std::error::Error>> {
    let core = super::build_core().await?;

    info!(category = %category, "applying reset");
    let entry = core.reset(category).await?;

    #[allow(clippy::print_stdout)]
    {
        println!(
            "Reset '{}' applied at {}.",
            entry.category,
            entry.at.to_rfc3339()
        );
    }
    Ok(())
}
