//! Admin CLI for the search facade — migrations and schema versions.
//!
//! Talks to a running server's `/admin/migration/*` endpoints over HTTP;
//! migration state lives in that process, so unlike a purely local tool
//! this one is always a thin network client.

use std::process::ExitCode;

use clap::{Parser, Subcommand};
use serde::Deserialize;

#[derive(Parser)]
#[command(name = "search-admin", version, about)]
struct Cli {
    #[command(subcommand)]
    command: Commands,

    /// Base URL of the running server's admin API
    #[arg(long, global = true, env = "SEARCH_ADMIN_URL", default_value = "http://localhost:8080")]
    server: String,

    /// Admin API key, sent as `X-Admin-Key`
    #[arg(long, global = true, env = "SEARCH_ADMIN_KEY")]
    admin_key: Option<String>,

    /// Output as JSON instead of human-readable text
    #[arg(long, global = true)]
    json: bool,
}

#[derive(Subcommand)]
enum Commands {
    /// Start a migration to a named schema version
    MigrateStart {
        /// Collection to migrate (defaults to the server's default collection)
        #[arg(long)]
        collection: Option<String>,

        /// Target schema version, must already be registered
        #[arg(long)]
        schema_version: String,

        /// Validate preconditions and report counts without touching the index
        #[arg(long)]
        dry_run: bool,
    },
    /// Show the current or last known migration status
    MigrateStatus {
        /// Collection to report on (defaults to the server's default collection)
        #[arg(long)]
        collection: Option<String>,
    },
    /// Roll a collection back to its pre-migration backup
    MigrateRollback {
        #[arg(long)]
        collection: Option<String>,

        /// Migration to roll back; defaults to the latest completed one
        #[arg(long)]
        migration_id: Option<String>,

        /// Reason recorded alongside the rollback
        #[arg(long)]
        reason: Option<String>,
    },
    /// List all migration control records
    MigrateHistory {
        #[arg(long, default_value_t = 1)]
        page: u32,

        #[arg(long, default_value_t = 20)]
        per_page: u32,
    },
    /// Show the current schema version and all registered versions
    Schemas,
}

#[derive(Deserialize)]
struct ErrorBody {
    error: String,
}

fn authed(builder: reqwest::RequestBuilder, admin_key: &Option<String>) -> reqwest::RequestBuilder {
    match admin_key {
        Some(key) => builder.header("X-Admin-Key", key),
        None => builder,
    }
}

async fn run(req: reqwest::RequestBuilder, server: &str, json: bool) -> ExitCode {
    match req.send().await {
        Ok(resp) => print_or_fail(resp, json).await,
        Err(e) => {
            eprintln!("could not reach {server}: {e}");
            ExitCode::FAILURE
        }
    }
}

async fn print_or_fail(resp: reqwest::Response, json: bool) -> ExitCode {
    let status = resp.status();
    let body: serde_json::Value = match resp.json().await {
        Ok(body) => body,
        Err(e) => {
            eprintln!("malformed response from server: {e}");
            return ExitCode::FAILURE;
        }
    };
    if !status.is_success() {
        let message = serde_json::from_value::<ErrorBody>(body.clone())
            .map(|e| e.error)
            .unwrap_or_else(|_| status.to_string());
        eprintln!("error: {message}");
        return ExitCode::FAILURE;
    }
    if json {
        println!("{}", serde_json::to_string_pretty(&body).unwrap());
    } else {
        print_human(&body);
    }
    ExitCode::SUCCESS
}

fn print_human(body: &serde_json::Value) {
    if let Some(records) = body.as_array() {
        for record in records {
            print_record_line(record);
        }
        eprintln!("\n{} record(s)", records.len());
        return;
    }
    if body.get("status").is_some() && body.get("collection").is_some() {
        print_record_line(body);
        return;
    }
    println!("{}", serde_json::to_string_pretty(body).unwrap());
}

fn print_record_line(record: &serde_json::Value) {
    let id = record.get("id").and_then(|v| v.as_str()).unwrap_or("?");
    let collection = record.get("collection").and_then(|v| v.as_str()).unwrap_or("?");
    let status = record.get("status").and_then(|v| v.as_str()).unwrap_or("?");
    let migrated = record.get("migrated_documents").and_then(|v| v.as_u64()).unwrap_or(0);
    let total = record.get("total_documents").and_then(|v| v.as_u64()).unwrap_or(0);
    println!("{id:<38} {collection:<24} {status:<12} {migrated}/{total}");
}

#[tokio::main]
async fn main() -> ExitCode {
    tracing_subscriber::fmt()
        .with_env_filter(
            tracing_subscriber::EnvFilter::from_default_env()
                .add_directive("search_admin_cli=warn".parse().unwrap()),
        )
        .with_target(false)
        .init();

    let cli = Cli::parse();
    let client = reqwest::Client::new();

    match cli.command {
        Commands::MigrateStart { collection, schema_version, dry_run } => {
            let url = format!("{}/admin/migration/start", cli.server);
            let body = serde_json::json!({
                "collection": collection,
                "schema_version": schema_version,
                "dry_run": dry_run,
            });
            let req = authed(client.post(&url).json(&body), &cli.admin_key);
            run(req, &cli.server, cli.json).await
        }
        Commands::MigrateStatus { collection } => {
            let url = format!("{}/admin/migration/status", cli.server);
            let req = authed(client.get(&url).query(&[("collection", collection)]), &cli.admin_key);
            run(req, &cli.server, cli.json).await
        }
        Commands::MigrateRollback { collection, migration_id, reason } => {
            let url = format!("{}/admin/migration/rollback", cli.server);
            let body = serde_json::json!({
                "collection": collection,
                "migration_id": migration_id,
                "reason": reason,
            });
            let req = authed(client.post(&url).json(&body), &cli.admin_key);
            run(req, &cli.server, cli.json).await
        }
        Commands::MigrateHistory { page, per_page } => {
            let url = format!("{}/admin/migration/history", cli.server);
            let req = authed(
                client.get(&url).query(&[("page", page), ("per_page", per_page)]),
                &cli.admin_key,
            );
            run(req, &cli.server, cli.json).await
        }
        Commands::Schemas => {
            let url = format!("{}/admin/migration/schemas", cli.server);
            let req = authed(client.get(&url), &cli.admin_key);
            run(req, &cli.server, cli.json).await
        }
    }
}
