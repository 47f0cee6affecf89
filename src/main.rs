use graphscope::db::{migrate, Db};
use graphscope::investigate::{InvestigationSettings, Investigator};
use graphscope::mcp::McpServer;
use graphscope::store::SqliteStore;
use graphscope::Config;
use std::path::Path;
use std::sync::Arc;
use anyhow::Result;

#[tokio::main]
async fn main() -> Result<()> {
    let config = Config::load()?;

    // Logs go to stderr; in serve mode stdout carries JSON-RPC frames only
    env_logger::Builder::from_env(
        env_logger::Env::default().filter_or("RUST_LOG", &config.graphscope.log_level),
    )
    .init();

    let args: Vec<String> = std::env::args().collect();
    let command = args.get(1).map(|s| s.as_str()).unwrap_or("verify");

    match command {
        "serve" => run_mcp_server(config).await?,
        "verify" => run_schema_verification(config).await?,
        other => anyhow::bail!("Unknown command: {} (expected serve or verify)", other),
    }

    Ok(())
}

async fn open_database(config: &Config) -> Result<Db> {
    let db = Db::new(config.db_path());
    let migrations_dir = Path::new("migrations");
    db.with_connection(|conn| migrate::run_migrations(conn, migrations_dir))
        .await?;
    log::info!("Database initialized: {}", config.db_path().display());
    Ok(db)
}

/// Run MCP server (stdio transport)
async fn run_mcp_server(config: Config) -> Result<()> {
    let db = open_database(&config).await?;
    let store = Arc::new(SqliteStore::new(db));
    let investigator = Investigator::new(store, InvestigationSettings::from_config(&config))?;

    let server = McpServer::new(investigator);
    server.run().await?;
    Ok(())
}

/// Run database schema verification
async fn run_schema_verification(config: Config) -> Result<()> {
    log::info!("Starting Graphscope v{}", env!("CARGO_PKG_VERSION"));
    log::info!(
        "Investigation defaults: depth={}, warning_threshold={}, timeout={}ms, strategy={:?}",
        config.investigation.default_depth,
        config.investigation.warning_threshold,
        config.investigation.timeout_ms,
        config.investigation.strategy
    );

    let db = open_database(&config).await?;
    db.with_connection(|conn| migrate::verify_schema(conn)).await?;

    log::info!("✓ Database schema verification complete");
    Ok(())
}
