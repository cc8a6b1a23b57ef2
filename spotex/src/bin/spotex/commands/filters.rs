use anyhow::{Result, bail};
use clap::Subcommand;
use comfy_table::{Cell, Table};
use serde::Serialize;

use spotex::errors::ValidationIssue;
use spotex::filters::{SearchFilters, normalize_value, validate_value};
use spotex::monitor::{SecurityFinding, SecurityMonitor};
use spotex::search::OpportunityQuery;

use crate::context::{AppContext, read_json};
use crate::examples::ExampleGroup;
use crate::output::{OutputManager, TableDisplay};
use crate::theme::severity_color;

pub const EXAMPLES: &[ExampleGroup] = &[
    ExampleGroup {
        title: "Check Filters",
        commands: &[
            "spotex filters validate request.json        # List every issue in a filter payload",
            "cat request.json | spotex filters scan -    # Look for hostile input",
        ],
    },
    ExampleGroup {
        title: "Inspect Queries",
        commands: &[
            "spotex filters normalize request.json       # Print the canonical form",
            "spotex filters query request.json --tenant 0b6f6f3e-3f43-4d2c-9d7e-1c7d2b8f4a10",
        ],
    },
];

#[derive(Subcommand)]
pub enum FilterCommands {
    /// Validate a filter payload and report every issue
    #[command(name = "validate")]
    Validate {
        /// JSON file, or '-' for stdin
        input: String,
    },

    /// Print the normalized form of a filter payload
    #[command(name = "normalize")]
    Normalize {
        /// JSON file, or '-' for stdin
        input: String,
    },

    /// Show the RediSearch query a payload produces for a tenant
    #[command(name = "query")]
    Query {
        /// JSON file, or '-' for stdin
        input: String,

        /// Tenant the search is scoped to
        #[arg(long)]
        tenant: String,
    },

    /// Run the security heuristics over a payload
    #[command(name = "scan")]
    Scan {
        /// JSON file, or '-' for stdin
        input: String,
    },
}

pub async fn handle_filter_commands(command: FilterCommands, ctx: &AppContext, output: &OutputManager) -> Result<()> {
    match command {
        FilterCommands::Validate { input } => handle_validate(&input, output).await,
        FilterCommands::Normalize { input } => handle_normalize(&input, output).await,
        FilterCommands::Query { input, tenant } => handle_query(&input, &tenant, ctx, output).await,
        FilterCommands::Scan { input } => handle_scan(&input, output).await,
    }
}

#[derive(Serialize)]
struct ValidationReport {
    valid: bool,
    issues: Vec<ValidationIssue>,
}

impl TableDisplay for ValidationReport {
    fn to_table(&self, output: &OutputManager) -> Table {
        let mut table = output.create_table();
        output.add_table_header(&mut table, &["Field", "Code", "Message"]);
        for issue in &self.issues {
            table.add_row(vec![
                Cell::new(&issue.field),
                Cell::new(&issue.code),
                Cell::new(&issue.message),
            ]);
        }
        table
    }

    fn to_compact(&self) -> String {
        if self.valid {
            "valid".to_string()
        } else {
            format!("invalid: {} issue(s)", self.issues.len())
        }
    }
}

async fn handle_validate(input: &str, output: &OutputManager) -> Result<()> {
    let raw = read_json(input).await?;
    let issues = validate_value(&raw);
    let report = ValidationReport {
        valid: issues.is_empty(),
        issues,
    };

    if report.valid {
        if output.is_json() {
            output.display(&report)?;
        }
        output.success("Filters are valid");
        return Ok(());
    }

    output.heading("Validation Issues");
    output.display(&report)?;
    bail!("{} validation issue(s)", report.issues.len());
}

#[derive(Serialize)]
#[serde(transparent)]
struct NormalizedFilters(SearchFilters);

impl TableDisplay for NormalizedFilters {
    fn to_table(&self, output: &OutputManager) -> Table {
        let mut table = output.create_table();
        output.add_table_header(&mut table, &["Filter", "Value"]);
        if let serde_json::Value::Object(map) = self.0.to_value() {
            for (key, value) in map {
                table.add_row(vec![Cell::new(key), Cell::new(value.to_string())]);
            }
        }
        table
    }

    fn to_compact(&self) -> String {
        self.0.to_value().to_string()
    }
}

async fn handle_normalize(input: &str, output: &OutputManager) -> Result<()> {
    let raw = read_json(input).await?;
    let issues = validate_value(&raw);
    if !issues.is_empty() {
        output.warning(&format!(
            "{} validation issue(s); normalizing anyway",
            issues.len()
        ));
    }
    output.display(&NormalizedFilters(normalize_value(&raw)))
}

#[derive(Serialize)]
struct QueryPlan {
    tenant_id: String,
    query: String,
    sort_by: Option<String>,
    sort_order: Option<String>,
    page: u64,
    page_size: u64,
    offset: u64,
}

impl TableDisplay for QueryPlan {
    fn to_table(&self, output: &OutputManager) -> Table {
        let mut table = output.create_table();
        let sort = match (&self.sort_by, &self.sort_order) {
            (Some(field), Some(order)) => format!("{field} {order}"),
            _ => "relevance".to_string(),
        };
        table.add_row(vec![Cell::new("Tenant"), Cell::new(&self.tenant_id)]);
        table.add_row(vec![Cell::new("Query"), Cell::new(&self.query)]);
        table.add_row(vec![Cell::new("Sort"), Cell::new(sort)]);
        table.add_row(vec![
            Cell::new("Page"),
            Cell::new(format!("{} ({} per page, offset {})", self.page, self.page_size, self.offset)),
        ]);
        table
    }

    fn to_compact(&self) -> String {
        self.query.clone()
    }
}

async fn handle_query(input: &str, tenant: &str, ctx: &AppContext, output: &OutputManager) -> Result<()> {
    let raw = read_json(input).await?;
    let issues = validate_value(&raw);
    if !issues.is_empty() {
        let report = ValidationReport { valid: false, issues };
        output.display(&report)?;
        bail!("{} validation issue(s)", report.issues.len());
    }

    let query = OpportunityQuery::for_tenant(tenant, ctx.config.search_settings())?;
    let params = query.build(&normalize_value(&raw));
    let plan = QueryPlan {
        tenant_id: query.tenant_id().to_string(),
        query: params.build_query(),
        sort_by: params.sort.as_ref().map(|sort| sort.field.clone()),
        sort_order: params.sort.as_ref().map(|sort| sort.order.as_str().to_string()),
        page: params.page,
        page_size: params.page_size,
        offset: params.offset(),
    };
    output.display(&plan)
}

#[derive(Serialize)]
struct ScanReport {
    findings: Vec<SecurityFinding>,
}

impl TableDisplay for ScanReport {
    fn to_table(&self, output: &OutputManager) -> Table {
        let mut table = output.create_table();
        output.add_table_header(&mut table, &["Field", "Finding", "Severity"]);
        for finding in &self.findings {
            table.add_row(vec![
                Cell::new(&finding.field),
                Cell::new(finding.kind.to_string()),
                output.tinted_cell(
                    format!("{:?}", finding.severity).to_lowercase(),
                    severity_color(finding.severity),
                ),
            ]);
        }
        table
    }

    fn to_compact(&self) -> String {
        format!("{} finding(s)", self.findings.len())
    }
}

async fn handle_scan(input: &str, output: &OutputManager) -> Result<()> {
    let raw = read_json(input).await?;
    let report = ScanReport {
        findings: SecurityMonitor::default().inspect(&raw),
    };
    if report.findings.is_empty() {
        if output.is_json() {
            output.display(&report)?;
        }
        output.success("No suspicious input found");
        return Ok(());
    }
    output.heading("Security Findings");
    output.display(&report)
}
