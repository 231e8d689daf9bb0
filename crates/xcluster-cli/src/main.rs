// xcluster CLI - operator tooling for the log-processing core.

use clap::{Parser, Subcommand};
use colored::Colorize;
use comfy_table::{presets::UTF8_FULL, Table};
use serde::{Deserialize, Serialize};
use std::fs;
use std::path::PathBuf;

const DEFAULT_API_URL: &str = "http://localhost:3000";

#[derive(Parser)]
#[command(name = "xcluster")]
#[command(author = "xcluster")]
#[command(version = "0.1.0")]
#[command(about = "Operator CLI for the xcluster ingest and clustering core", long_about = None)]
struct Cli {
    /// API server URL
    #[arg(short, long, default_value = DEFAULT_API_URL)]
    api_url: String,

    /// Bearer token for the ingest surface (or set XC_INGEST_TOKEN env var)
    #[arg(short = 'k', long, env = "XC_INGEST_TOKEN")]
    token: Option<String>,

    #[command(subcommand)]
    command: Commands,
}

#[derive(Subcommand)]
enum Commands {
    /// Push a batch of log records read from a file into the ingest endpoint
    Ingest {
        /// Path to a JSON file containing an array of log records, or one
        /// JSON object per line
        file: PathBuf,
    },

    /// List exception clusters
    Clusters {
        /// Filter by service id
        #[arg(short, long)]
        service: Option<String>,

        /// Filter by status (active, skipped, resolved)
        #[arg(short = 'S', long)]
        status: Option<String>,

        /// Maximum clusters to return
        #[arg(short, long, default_value = "50")]
        limit: i64,

        /// Offset into the result set
        #[arg(short, long, default_value = "0")]
        offset: i64,
    },

    /// Show full detail for one cluster
    Cluster {
        /// Cluster id
        id: String,
    },

    /// Transition a cluster's status (active, skipped, resolved)
    SetStatus {
        /// Cluster id
        id: String,

        /// New status
        status: String,

        /// Who is making the change
        #[arg(short, long, default_value = "cli")]
        actor: String,
    },

    /// Check the ingest endpoint's health
    Health,

    /// Show ingest pipeline counters
    Metrics,
}

#[derive(Debug, Serialize)]
struct IngestBatchRequest {
    logs: Vec<serde_json::Value>,
}

#[derive(Debug, Deserialize)]
struct RejectedCounts {
    validation: u64,
    unknown_service: u64,
    rate_limited: u64,
    duplicate: u64,
}

#[derive(Debug, Deserialize)]
struct IngestResponse {
    received_count: usize,
    accepted_count: usize,
    rejected_count: RejectedCounts,
    task_id: String,
}

#[derive(Debug, Deserialize)]
struct ClusterSummary {
    id: String,
    service_id: String,
    fingerprint_static: String,
    exception_type: String,
    logger: Option<String>,
    size: i64,
    frequency_24h: i64,
    last_seen: String,
    status: String,
    has_rca: bool,
}

#[derive(Debug, Deserialize)]
struct MetricsResponse {
    processed: u64,
    duplicates: u64,
    not_an_exception: u64,
    clusters_created: u64,
    clusters_hit: u64,
    deadline_exceeded: u64,
    store_errors: u64,
    queue_capacity_remaining: usize,
}

#[tokio::main]
async fn main() -> Result<(), Box<dyn std::error::Error>> {
    let cli = Cli::parse();
    let client = reqwest::Client::new();

    match &cli.command {
        Commands::Ingest { file } => ingest_file(&client, &cli, file).await?,
        Commands::Clusters { service, status, limit, offset } => {
            list_clusters(&client, &cli, service.as_deref(), status.as_deref(), *limit, *offset).await?
        }
        Commands::Cluster { id } => show_cluster(&client, &cli, id).await?,
        Commands::SetStatus { id, status, actor } => set_status(&client, &cli, id, status, actor).await?,
        Commands::Health => check_health(&client, &cli).await?,
        Commands::Metrics => show_metrics(&client, &cli).await?,
    }

    Ok(())
}

fn auth(request: reqwest::RequestBuilder, cli: &Cli) -> reqwest::RequestBuilder {
    match &cli.token {
        Some(token) => request.bearer_auth(token),
        None => request,
    }
}

async fn ingest_file(client: &reqwest::Client, cli: &Cli, file: &PathBuf) -> Result<(), Box<dyn std::error::Error>> {
    let contents = fs::read_to_string(file)?;
    let trimmed = contents.trim_start();

    let logs: Vec<serde_json::Value> = if trimmed.starts_with('[') {
        serde_json::from_str(&contents)?
    } else {
        contents.lines().filter(|l| !l.trim().is_empty()).map(serde_json::from_str).collect::<Result<_, _>>()?
    };

    println!("\n{} {} records from {}", "Ingesting".cyan().bold(), logs.len(), file.display());

    let url = format!("{}/ingest/logs", cli.api_url);
    let response = auth(client.post(&url), cli).json(&IngestBatchRequest { logs }).send().await?;

    if !response.status().is_success() {
        let error = response.text().await?;
        println!("{} {}", "Error:".red().bold(), error);
        return Ok(());
    }

    let result: IngestResponse = response.json().await?;
    println!("{}", "─".repeat(50).dimmed());
    println!(
        "{} {} | {} {} | {} {}",
        "Received:".dimmed(),
        result.received_count.to_string().yellow(),
        "Accepted:".dimmed(),
        result.accepted_count.to_string().green(),
        "Task:".dimmed(),
        result.task_id
    );
    println!(
        "{} validation={} unknown_service={} rate_limited={} duplicate={}",
        "Rejected:".dimmed(),
        result.rejected_count.validation,
        result.rejected_count.unknown_service,
        result.rejected_count.rate_limited,
        result.rejected_count.duplicate,
    );

    Ok(())
}

async fn list_clusters(
    client: &reqwest::Client,
    cli: &Cli,
    service: Option<&str>,
    status: Option<&str>,
    limit: i64,
    offset: i64,
) -> Result<(), Box<dyn std::error::Error>> {
    let mut url = format!("{}/clusters?limit={}&offset={}", cli.api_url, limit, offset);
    if let Some(service) = service {
        url.push_str(&format!("&service_id={}", urlencoding::encode(service)));
    }
    if let Some(status) = status {
        url.push_str(&format!("&status={}", urlencoding::encode(status)));
    }

    let response = auth(client.get(&url), cli).send().await?;
    if !response.status().is_success() {
        let error = response.text().await?;
        println!("{} {}", "Error:".red().bold(), error);
        return Ok(());
    }

    let clusters: Vec<ClusterSummary> = response.json().await?;
    if clusters.is_empty() {
        println!("{}", "No clusters match.".dimmed());
        return Ok(());
    }

    let mut table = Table::new();
    table.load_preset(UTF8_FULL);
    table.set_header(vec!["ID", "Service", "Exception", "Logger", "Size", "24h", "Status", "RCA", "Last Seen"]);

    for c in clusters {
        table.add_row(vec![
            short_id(&c.id),
            c.service_id,
            c.exception_type,
            c.logger.unwrap_or_default(),
            c.size.to_string(),
            c.frequency_24h.to_string(),
            c.status,
            if c.has_rca { "yes".to_string() } else { "no".to_string() },
            c.last_seen,
        ]);
    }

    println!("{}", table);
    Ok(())
}

async fn show_cluster(client: &reqwest::Client, cli: &Cli, id: &str) -> Result<(), Box<dyn std::error::Error>> {
    let url = format!("{}/clusters/{}", cli.api_url, id);
    let response = auth(client.get(&url), cli).send().await?;

    if !response.status().is_success() {
        let error = response.text().await?;
        println!("{} {}", "Error:".red().bold(), error);
        return Ok(());
    }

    let cluster: serde_json::Value = response.json().await?;
    println!("{}", serde_json::to_string_pretty(&cluster)?);
    Ok(())
}

async fn set_status(client: &reqwest::Client, cli: &Cli, id: &str, status: &str, actor: &str) -> Result<(), Box<dyn std::error::Error>> {
    let url = format!("{}/clusters/{}/status", cli.api_url, id);
    let body = serde_json::json!({ "status": status, "actor": actor });
    let response = auth(client.post(&url), cli).json(&body).send().await?;

    if !response.status().is_success() {
        let error = response.text().await?;
        println!("{} {}", "Error:".red().bold(), error);
        return Ok(());
    }

    println!("{} cluster {} -> {}", "Updated:".green().bold(), id, status);
    Ok(())
}

async fn check_health(client: &reqwest::Client, cli: &Cli) -> Result<(), Box<dyn std::error::Error>> {
    let url = format!("{}/ingest/health", cli.api_url);
    match client.get(&url).send().await {
        Ok(response) if response.status().is_success() => println!("{}", "healthy".green().bold()),
        Ok(response) => println!("{} status {}", "unhealthy:".red().bold(), response.status()),
        Err(err) => println!("{} {}", "unreachable:".red().bold(), err),
    }
    Ok(())
}

async fn show_metrics(client: &reqwest::Client, cli: &Cli) -> Result<(), Box<dyn std::error::Error>> {
    let url = format!("{}/ingest/metrics", cli.api_url);
    let response = auth(client.get(&url), cli).send().await?;

    if !response.status().is_success() {
        let error = response.text().await?;
        println!("{} {}", "Error:".red().bold(), error);
        return Ok(());
    }

    let m: MetricsResponse = response.json().await?;
    println!("{}", "Pipeline counters".cyan().bold());
    println!("{}", "─".repeat(40).dimmed());
    println!("processed           {}", m.processed);
    println!("duplicates          {}", m.duplicates);
    println!("not_an_exception    {}", m.not_an_exception);
    println!("clusters_created    {}", m.clusters_created.to_string().green());
    println!("clusters_hit        {}", m.clusters_hit);
    println!("deadline_exceeded   {}", m.deadline_exceeded.to_string().yellow());
    println!("store_errors        {}", m.store_errors.to_string().red());
    println!("queue_capacity_left {}", m.queue_capacity_remaining);
    Ok(())
}

fn short_id(id: &str) -> String {
    id.chars().take(8).collect()
}
