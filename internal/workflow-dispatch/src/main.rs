use std::path::PathBuf;

use anyhow::{Context, Result};
use chrono::{DateTime, Utc};
use clap::{Args, Parser, Subcommand};
use serde_json::Value;
use tracing_subscriber::EnvFilter;

use workflow_dispatch::{
    AdditionalMetadata, AdminClient, ClientConfig, ExecutionContext, RateLimitDuration, Schedule,
    ScheduleTriggerWorkflowOptions, TriggerWorkflowOptions,
};

#[derive(Parser, Debug)]
#[command(version, about = "Trigger and schedule workflows")]
struct Cli {
    /// Path to a TOML client configuration. Environment variables override its values.
    #[arg(long, env = "WORKFLOW_DISPATCH_CONFIG")]
    config: Option<PathBuf>,

    #[command(subcommand)]
    command: Command,
}

#[derive(Subcommand, Debug)]
enum Command {
    /// Trigger a single workflow run.
    Trigger(TriggerArgs),
    /// Schedule workflow runs at fixed times.
    Schedule(ScheduleArgs),
    /// Create or update a rate limit.
    RateLimit(RateLimitArgs),
}

#[derive(Args, Debug)]
struct TriggerArgs {
    workflow: String,

    /// JSON input of the run.
    #[arg(long, default_value = "{}")]
    input: String,

    /// Deduplication key.
    #[arg(long)]
    key: Option<String>,

    /// JSON object of additional metadata.
    #[arg(long)]
    metadata: Option<String>,

    /// Run to link the new run to as its parent.
    ///
    /// Each invocation is a fresh process with no spawn history, so the
    /// child's position under the parent must be given with `--child-index`.
    #[arg(long, requires_all = ["parent_step_run_id", "child_index"])]
    parent_run_id: Option<String>,

    #[arg(long, requires = "parent_run_id")]
    parent_step_run_id: Option<String>,

    /// Spawn index of the new run under `--parent-run-id`.
    #[arg(long, requires = "parent_run_id")]
    child_index: Option<u32>,

    #[arg(long)]
    priority: Option<i32>,
}

#[derive(Args, Debug)]
struct ScheduleArgs {
    workflow: String,

    /// RFC 3339 start time. May be repeated.
    #[arg(long = "at", required = true)]
    at: Vec<DateTime<Utc>>,

    #[arg(long, default_value = "{}")]
    input: String,

    #[arg(long)]
    metadata: Option<String>,
}

#[derive(Args, Debug)]
struct RateLimitArgs {
    key: String,

    #[arg(long)]
    limit: i32,

    /// One of second, minute, hour, day, week, month, year.
    #[arg(long, default_value_t = RateLimitDuration::Second)]
    duration: RateLimitDuration,
}

fn parse_metadata(metadata: Option<&str>) -> Result<AdditionalMetadata> {
    match metadata {
        Some(raw) => serde_json::from_str(raw).context("`--metadata` must be a JSON object"),
        None => Ok(AdditionalMetadata::new()),
    }
}

fn load_config(path: Option<&PathBuf>) -> Result<ClientConfig> {
    let config = match path {
        Some(path) => ClientConfig::from_toml_file(path)?,
        None => ClientConfig::from_env()?,
    };
    Ok(config)
}

#[expect(clippy::print_stdout)]
fn print_json(value: &Value) -> Result<()> {
    println!("{}", serde_json::to_string_pretty(value)?);
    Ok(())
}

fn trigger_options(args: &TriggerArgs) -> Result<TriggerWorkflowOptions> {
    Ok(TriggerWorkflowOptions {
        parent_id: args.parent_run_id.clone(),
        parent_step_run_id: args.parent_step_run_id.clone(),
        child_index: args.child_index,
        key: args.key.clone(),
        additional_metadata: parse_metadata(args.metadata.as_deref())?,
        priority: args.priority,
        ..Default::default()
    })
}

async fn trigger(client: &AdminClient, args: TriggerArgs) -> Result<()> {
    let input: Value = serde_json::from_str(&args.input).context("`--input` must be valid JSON")?;
    let options = trigger_options(&args)?;

    // The CLI never runs inside a step; linkage comes only from the options.
    let run = client
        .run_workflow(&ExecutionContext::root(), &args.workflow, &input, &options)
        .await
        .with_context(|| format!("Failed to trigger `{}`", args.workflow))?;
    tracing::info!(workflow_run_id = run.workflow_run_id(), "Triggered workflow");
    print_json(&serde_json::json!({ "workflow_run_id": run.workflow_run_id() }))
}

async fn schedule(client: &AdminClient, args: ScheduleArgs) -> Result<()> {
    let input: Value = serde_json::from_str(&args.input).context("`--input` must be valid JSON")?;
    let schedules: Vec<Schedule> = args.at.into_iter().map(Schedule::from).collect();
    let options = ScheduleTriggerWorkflowOptions {
        additional_metadata: parse_metadata(args.metadata.as_deref())?,
        ..Default::default()
    };

    let version = client
        .schedule_workflow(&args.workflow, &schedules, &input, &options)
        .await
        .with_context(|| format!("Failed to schedule `{}`", args.workflow))?;
    print_json(&serde_json::json!({
        "workflow_version_id": version.id,
        "scheduled": schedules.len(),
    }))
}

#[tokio::main]
async fn main() -> Result<()> {
    tracing_subscriber::fmt()
        .with_env_filter(
            EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new("warn")),
        )
        .with_writer(std::io::stderr)
        .init();

    let cli = Cli::parse();
    let config = load_config(cli.config.as_ref())?;
    let client = AdminClient::builder().config(config).build()?;

    match cli.command {
        Command::Trigger(args) => trigger(&client, args).await,
        Command::Schedule(args) => schedule(&client, args).await,
        Command::RateLimit(args) => {
            client
                .put_rate_limit(&args.key, args.limit, args.duration)
                .await
                .with_context(|| format!("Failed to put rate limit `{}`", args.key))?;
            tracing::info!(key = %args.key, limit = args.limit, duration = %args.duration, "Rate limit updated");
            Ok(())
        }
    }
}
