use anyhow::{Context, Result};
use clap::Subcommand;

use spotex::search::ensure_index;

use crate::context::AppContext;
use crate::examples::ExampleGroup;
use crate::output::OutputManager;

pub const EXAMPLES: &[ExampleGroup] = &[ExampleGroup {
    title: "Search Index",
    commands: &[
        "spotex index ensure                          # Create the opportunity index if missing",
        "spotex --config prod.toml index ensure       # Use another configuration",
    ],
}];

#[derive(Subcommand)]
pub enum IndexCommands {
    /// Create the opportunity search index unless it already exists
    #[command(name = "ensure")]
    Ensure,
}

pub async fn handle_index_commands(command: IndexCommands, ctx: &AppContext, output: &OutputManager) -> Result<()> {
    match command {
        IndexCommands::Ensure => {
            let definition = ctx.index();
            let mut conn = ctx.connect(output).await?;
            ensure_index(&mut conn, &definition)
                .await
                .with_context(|| format!("Failed to ensure index {}", definition.name))?;
            output.success(&format!("Index {} is ready", definition.name));
            for prefix in &definition.prefixes {
                output.bullet(&format!("prefix {prefix}"));
            }
            output.bullet(&format!("{} indexed attribute(s)", definition.schema.len()));
            Ok(())
        }
    }
}
