use anyhow::{Context, Result};
use clap::Subcommand;
use comfy_table::{Cell, Table};
use serde::Serialize;

use spotex::monitor::{RateLimiter, RedisRateLimitStore};
use spotex::saved_search::{NewSavedSearch, SavedSearch};
use spotex::search::{Opportunity, OpportunityQuery, PaginatedResponse, search_opportunities};

use crate::context::{AppContext, read_json};
use crate::examples::ExampleGroup;
use crate::output::{OutputManager, TableDisplay};
use crate::theme::{ICONS, status_color};

pub const EXAMPLES: &[ExampleGroup] = &[
    ExampleGroup {
        title: "Manage Saved Searches",
        commands: &[
            "spotex saved list --user <uuid>",
            "spotex saved create --user <uuid> --tenant <uuid> --name \"Chicago flatbeds\" --filters lanes.json",
            "spotex saved delete --user <uuid> <search-id>",
        ],
    },
    ExampleGroup {
        title: "Defaults & Usage",
        commands: &[
            "spotex saved default --user <uuid> <search-id>   # Make a search the default",
            "spotex saved default --user <uuid> --clear       # Remove the default",
            "spotex saved use --user <uuid> <search-id> --run # Count a use and run the search",
        ],
    },
];

#[derive(Subcommand)]
pub enum SavedCommands {
    /// List a user's saved searches, default first
    #[command(name = "list")]
    List {
        #[arg(long)]
        user: String,
    },

    /// Save a new search
    #[command(name = "create")]
    Create {
        #[arg(long)]
        user: String,

        #[arg(long)]
        tenant: String,

        #[arg(long)]
        name: String,

        /// JSON file with the filters, or '-' for stdin
        #[arg(long)]
        filters: Option<String>,

        /// Make the new search the user's default
        #[arg(long)]
        default: bool,
    },

    /// Delete a saved search
    #[command(name = "delete")]
    Delete {
        #[arg(long)]
        user: String,

        id: String,
    },

    /// Show, set or clear the user's default saved search
    #[command(name = "default")]
    Default {
        #[arg(long)]
        user: String,

        id: Option<String>,

        #[arg(long, conflicts_with = "id")]
        clear: bool,
    },

    /// Record a use of a saved search, optionally running it
    #[command(name = "use")]
    Use {
        #[arg(long)]
        user: String,

        id: String,

        /// Execute the search against the opportunity index
        #[arg(long)]
        run: bool,
    },
}

pub async fn handle_saved_commands(command: SavedCommands, ctx: &AppContext, output: &OutputManager) -> Result<()> {
    let conn = ctx.connect(output).await?;
    let service = ctx.saved_searches(conn.clone());

    match command {
        SavedCommands::List { user } => {
            let searches = service.list(&user).await.context("Failed to list saved searches")?;
            if searches.is_empty() && !output.is_json() {
                output.info("No saved searches");
                return Ok(());
            }
            output.display(&SavedSearchList(searches))
        }
        SavedCommands::Create {
            user,
            tenant,
            name,
            filters,
            default,
        } => {
            let filters = match filters {
                Some(source) => read_json(&source).await?,
                None => serde_json::Value::Object(Default::default()),
            };
            let created = service
                .create(NewSavedSearch {
                    user_id: user,
                    tenant_id: tenant,
                    name,
                    filters,
                    is_default: default,
                })
                .await
                .context("Failed to create saved search")?;
            output.success(&format!("Saved search {} created", created.id));
            output.display(&SavedSearchList(vec![created]))
        }
        SavedCommands::Delete { user, id } => {
            service.delete(&user, &id).await.context("Failed to delete saved search")?;
            output.success(&format!("Saved search {id} deleted"));
            Ok(())
        }
        SavedCommands::Default { user, id, clear } => {
            if clear {
                service.clear_default(&user).await?;
                output.success("Default saved search cleared");
                return Ok(());
            }
            match id {
                Some(id) => {
                    let search = service.set_default(&user, &id).await.context("Failed to set default")?;
                    output.success(&format!("{} is now the default", search.name));
                    output.display(&SavedSearchList(vec![search]))
                }
                None => match service.default_search(&user).await? {
                    Some(search) => output.display(&SavedSearchList(vec![search])),
                    None => {
                        output.info("No default saved search");
                        Ok(())
                    }
                },
            }
        }
        SavedCommands::Use { user, id, run } => {
            if run {
                let limiter = RateLimiter::new(
                    RedisRateLimitStore::new(conn.clone(), ctx.config.redis.key_prefix.clone()),
                    ctx.config.rate_limit.max_requests,
                    ctx.config.rate_limit_window(),
                );
                limiter.enforce(&format!("search:{}", user.trim())).await?;
            }

            let search = service.record_use(&user, &id).await.context("Failed to record use")?;
            output.verbose(&format!("{} used {} time(s)", search.name, search.use_count));
            if !run {
                return output.display(&SavedSearchList(vec![search]));
            }

            let query = OpportunityQuery::for_tenant(&search.tenant_id, ctx.config.search_settings())?;
            let mut conn = conn;
            let result = search_opportunities::<_, Opportunity>(&mut conn, &ctx.index(), &query, &search.filters.to_value())
                .await
                .context("Search failed")?;
            output.display(&OpportunityPage(result.into()))
        }
    }
}

#[derive(Serialize)]
#[serde(transparent)]
struct SavedSearchList(Vec<SavedSearch>);

impl TableDisplay for SavedSearchList {
    fn to_table(&self, output: &OutputManager) -> Table {
        let mut table = output.create_table();
        output.add_table_header(&mut table, &["", "ID", "Name", "Uses", "Last Used", "Updated"]);
        for search in &self.0 {
            let marker = if search.is_default { ICONS.default_search } else { "" };
            let last_used = search
                .last_used_at
                .map(|at| at.format("%Y-%m-%d %H:%M").to_string())
                .unwrap_or_else(|| "never".to_string());
            table.add_row(vec![
                Cell::new(marker),
                Cell::new(&search.id),
                Cell::new(&search.name),
                Cell::new(search.use_count),
                Cell::new(last_used),
                Cell::new(search.updated_at.format("%Y-%m-%d %H:%M").to_string()),
            ]);
        }
        table
    }

    fn to_compact(&self) -> String {
        self.0
            .iter()
            .map(|search| format!("{}:{}", search.id, search.name))
            .collect::<Vec<_>>()
            .join(" ")
    }
}

#[derive(Serialize)]
#[serde(transparent)]
struct OpportunityPage(PaginatedResponse<Opportunity>);

impl TableDisplay for OpportunityPage {
    fn to_table(&self, output: &OutputManager) -> Table {
        let mut table = output.create_table();
        output.add_table_header(&mut table, &["ID", "Title", "Lane", "Rate", "Equipment", "Status"]);
        for opportunity in &self.0.items {
            let title = if opportunity.hazmat == "true" {
                format!("{} {}", ICONS.hazmat, opportunity.title)
            } else {
                opportunity.title.clone()
            };
            table.add_row(vec![
                Cell::new(&opportunity.id),
                Cell::new(title),
                Cell::new(format!(
                    "{}, {} {} {}, {}",
                    opportunity.origin_city,
                    opportunity.origin_state,
                    ICONS.lane,
                    opportunity.destination_city,
                    opportunity.destination_state
                )),
                Cell::new(format!("{:.2}", opportunity.rate)),
                Cell::new(&opportunity.equipment_type),
                output.tinted_cell(&opportunity.status, status_color(&opportunity.status)),
            ]);
        }
        table
    }

    fn to_compact(&self) -> String {
        format!(
            "{} of {} (page {}, more: {})",
            self.0.items.len(),
            self.0.total,
            self.0.page,
            self.0.has_more
        )
    }
}
