use clap::Parser;
use graphscope::cli::{self, InvestigateArgs};
use graphscope::db::{migrate, Db};
use graphscope::investigate::{InvestigationSettings, Investigator};
use graphscope::store::SqliteStore;
use graphscope::{Config, GraphscopeError};
use std::path::Path;
use std::process::ExitCode;
use std::sync::Arc;

#[tokio::main]
async fn main() -> ExitCode {
    let args = InvestigateArgs::parse();

    match run(&args).await {
        Ok(code) => code,
        Err(e) => {
            eprintln!("Error: {:#}", e);
            ExitCode::from(1)
        }
    }
}

async fn run(args: &InvestigateArgs) -> anyhow::Result<ExitCode> {
    let config = Config::load()?;

    // stdout is reserved for the JSON result
    env_logger::Builder::from_env(
        env_logger::Env::default().filter_or("RUST_LOG", &config.graphscope.log_level),
    )
    .init();
    log::debug!("Database path: {}", config.db_path().display());

    let db = Db::new(config.db_path());
    let migrations_dir = Path::new("migrations");
    if let Err(e) = db
        .with_connection(|conn| migrate::run_migrations(conn, migrations_dir))
        .await
    {
        return Ok(fail(e));
    }

    let store = Arc::new(SqliteStore::new(db));
    let investigator = Investigator::new(store, InvestigationSettings::from_config(&config))?;

    match cli::run(&investigator, args).await {
        Ok(output) => {
            println!("{}", output);
            Ok(ExitCode::SUCCESS)
        }
        Err(e) => Ok(fail(e)),
    }
}

fn fail(e: GraphscopeError) -> ExitCode {
    log::error!("{}", e);
    eprintln!("Error: {}", e);
    ExitCode::from(u8::try_from(e.exit_code()).unwrap_or(1))
}
