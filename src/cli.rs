//! GraphSQL Console - CLI Tool
//!
//! Terminal console for a GraphSQL backend: one-shot REST/GraphQL calls
//! plus a live tail of the change feed.

use anyhow::{Context, Result};
use clap::{Parser, Subcommand};
use graphsql_console::{ApiClient, Config, ConnectionManager, ConnectionState, Page};
use std::path::PathBuf;
use tracing_subscriber::{layer::SubscriberExt, util::SubscriberInitExt};

#[derive(Parser)]
#[command(name = "gsql")]
#[command(about = "Admin console for GraphSQL backends")]
struct Cli {
    /// Backend base URL (overrides config file)
    #[arg(long, env = "GRAPHSQL_URL")]
    server: Option<String>,

    /// Bearer token for authenticated backends (overrides config file)
    #[arg(long, env = "GRAPHSQL_TOKEN")]
    token: Option<String>,

    /// Path to a YAML config file (default: ./config.yaml)
    #[arg(long)]
    config: Option<PathBuf>,

    #[command(subcommand)]
    command: Commands,
}

#[derive(Subcommand)]
enum Commands {
    /// List all tables
    Tables,

    /// Show a table's schema
    Info {
        /// Table name
        table: String,
    },

    /// Page through a table's records
    Records {
        /// Table name
        table: String,

        /// Records per page (must be positive)
        #[arg(short, long, default_value = "20")]
        limit: u32,

        /// Records to skip
        #[arg(short, long, default_value = "0")]
        offset: u32,
    },

    /// Execute a GraphQL query
    Query {
        /// The query text
        query: String,

        /// Query variables as a JSON object
        #[arg(long)]
        variables: Option<String>,
    },

    /// Show backend counters
    Stats,

    /// Check backend health
    Health,

    /// Log in and print the issued token
    Login {
        /// Account name
        username: String,

        /// Account password
        #[arg(env = "GRAPHSQL_PASSWORD")]
        password: String,
    },

    /// Tail the live change feed (ctrl-c to quit)
    Watch {
        /// Only show events for this table
        #[arg(long)]
        table: Option<String>,

        /// Events retained in the rolling log
        #[arg(long)]
        capacity: Option<usize>,
    },
}

#[tokio::main]
async fn main() -> Result<()> {
    // Load .env file
    dotenvy::dotenv().ok();

    // Initialize tracing
    tracing_subscriber::registry()
        .with(
            tracing_subscriber::EnvFilter::try_from_default_env()
                .unwrap_or_else(|_| "info,graphsql_console=debug".into()),
        )
        .with(tracing_subscriber::fmt::layer())
        .init();

    let cli = Cli::parse();

    // Flag / env > config file > defaults
    let mut config = Config::from_yaml_and_env(cli.config.as_deref())?;
    if let Some(server) = cli.server {
        config.base_url = server;
    }
    if let Some(token) = cli.token {
        config.token = Some(token);
    }

    let client = ApiClient::from_config(&config)?;

    match cli.command {
        Commands::Tables => handle_tables(&client).await,
        Commands::Info { table } => handle_info(&client, &table).await,
        Commands::Records {
            table,
            limit,
            offset,
        } => handle_records(&client, &table, limit, offset).await,
        Commands::Query { query, variables } => handle_query(&client, &query, variables).await,
        Commands::Stats => handle_stats(&client).await,
        Commands::Health => handle_health(&client).await,
        Commands::Login { username, password } => {
            handle_login(&client, &username, &password).await
        }
        Commands::Watch { table, capacity } => handle_watch(&config, table, capacity).await,
    }
}

async fn handle_tables(client: &ApiClient) -> Result<()> {
    let tables = client.list_tables().await?;
    if tables.is_empty() {
        println!("No tables");
        return Ok(());
    }
    for table in tables {
        println!("{table}");
    }
    Ok(())
}

async fn handle_info(client: &ApiClient, table: &str) -> Result<()> {
    let info = client.table_info(table).await?;

    println!(
        "{:<24} {:<16} {:<9} {:<4} {}",
        "COLUMN", "TYPE", "NULLABLE", "PK", "DEFAULT"
    );
    println!("{}", "-".repeat(72));
    for column in info.columns {
        println!(
            "{:<24} {:<16} {:<9} {:<4} {}",
            column.name,
            column.data_type,
            if column.nullable { "yes" } else { "no" },
            if column.primary_key { "yes" } else { "" },
            column
                .default
                .map(|v| v.to_string())
                .unwrap_or_else(|| "-".into()),
        );
    }
    Ok(())
}

async fn handle_records(client: &ApiClient, table: &str, limit: u32, offset: u32) -> Result<()> {
    let page = client.records(table, Page::new(limit, offset)).await?;
    println!("{}", serde_json::to_string_pretty(&page.data)?);
    if let Some(total) = page.total {
        eprintln!(
            "{} of {} records (offset {})",
            page.data.len(),
            total,
            offset
        );
    }
    Ok(())
}

async fn handle_query(client: &ApiClient, query: &str, variables: Option<String>) -> Result<()> {
    let variables = variables
        .map(|v| serde_json::from_str(&v))
        .transpose()
        .context("--variables must be valid JSON")?;

    let envelope = client.graphql(query, variables).await?;
    println!("{}", serde_json::to_string_pretty(&envelope)?);
    Ok(())
}

async fn handle_stats(client: &ApiClient) -> Result<()> {
    let stats = client.stats().await?;
    println!("{}", serde_json::to_string_pretty(&stats)?);
    Ok(())
}

async fn handle_health(client: &ApiClient) -> Result<()> {
    let health = client.health().await?;
    println!("{}", serde_json::to_string_pretty(&health)?);
    Ok(())
}

async fn handle_login(client: &ApiClient, username: &str, password: &str) -> Result<()> {
    let session = client.login(username, password).await?;
    // Token on stdout so it can be piped; user details go to stderr
    println!("{}", session.token);
    if !session.user.is_null() {
        eprintln!("user: {}", session.user);
    }
    Ok(())
}

async fn handle_watch(
    config: &Config,
    table: Option<String>,
    capacity: Option<usize>,
) -> Result<()> {
    let capacity = capacity.unwrap_or(config.feed_capacity);
    let mut manager = ConnectionManager::new(config.feed_url(), capacity)?;
    if let Some(table) = table.or_else(|| config.feed_table.clone()) {
        manager = manager.with_table(table);
    }

    // Each append publishes one snapshot whose last element is the new event
    let _events_sub = manager.events().subscribe(|events| {
        if let Some(event) = events.last() {
            let payload = if event.payload.is_empty() {
                String::new()
            } else {
                serde_json::to_string(&event.payload).unwrap_or_default()
            };
            println!(
                "[{}] {:<7} {:<24} {}",
                event.local_time(),
                event.kind,
                event.table,
                payload
            );
        }
    });

    let (closed_tx, mut closed_rx) = tokio::sync::mpsc::channel::<()>(1);
    let _state_sub = manager.state().subscribe(move |state| {
        eprintln!("feed: {state}");
        if *state == ConnectionState::Disconnected {
            let _ = closed_tx.try_send(());
        }
    });

    manager.connect(config.token.as_deref()).await;
    if !manager.is_connected() {
        anyhow::bail!("could not connect to {}", manager.endpoint());
    }

    // No auto-reconnect: exit on ctrl-c or when the server drops us
    tokio::select! {
        _ = tokio::signal::ctrl_c() => {
            eprintln!("shutting down");
        }
        _ = closed_rx.recv() => {
            eprintln!("feed closed by server");
        }
    }

    manager.disconnect().await;
    if manager.dropped_frames() > 0 {
        eprintln!("{} non-event frames dropped", manager.dropped_frames());
    }
    Ok(())
}
