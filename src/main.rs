// crud-demo - inserts, queries, updates and deletes a few rows, logging each step
//
// This is the main entry point. Parses CLI args, loads config, connects and
// runs the scenarios. Any error ends the process with a non-zero status.

use anyhow::Context;
use clap::Parser;
use crud_demo_lib::{
    config::AppConfig,
    demo::{self, Scenario},
    logging::{init_tracing, TracingConfig},
    Database,
};
use std::path::PathBuf;
use std::process::ExitCode;

#[derive(Parser, Debug)]
#[command(name = "crud-demo", version, about = "Run CRUD demo scenarios against SQLite")]
struct Cli {
    /// Config file (default: <config dir>/crud-demo/config.toml)
    #[arg(long, env = "CRUD_DEMO_CONFIG")]
    config: Option<PathBuf>,

    /// Which scenario to run
    #[arg(long, value_enum, default_value_t = Scenario::All)]
    scenario: Scenario,

    /// Enable debug logging
    #[arg(long)]
    debug: bool,
}

#[tokio::main]
async fn main() -> ExitCode {
    let cli = Cli::parse();

    match run(cli).await {
        Ok(()) => ExitCode::SUCCESS,
        Err(err) => {
            eprintln!("Error: {:?}", err);
            ExitCode::FAILURE
        }
    }
}

async fn run(cli: Cli) -> anyhow::Result<()> {
    let mut config =
        AppConfig::load_or_default(cli.config.as_deref()).context("loading configuration")?;
    config
        .apply_env()
        .context("applying environment overrides")?;

    init_tracing(&TracingConfig {
        debug: cli.debug,
        level: config.logging.level.clone(),
    })?;

    tracing::info!(
        url = %config.database.url,
        naming = ?config.mapping.naming,
        scenario = ?cli.scenario,
        "crud-demo starting"
    );

    let db = Database::connect(&config.database, config.mapping.naming)
        .await
        .context("connecting to database")?;

    // close the pool whether or not the scenario failed
    let outcome = demo::run(&db, cli.scenario)
        .await
        .with_context(|| format!("running {:?} scenario", cli.scenario));
    db.close().await;
    outcome?;

    tracing::info!("done");
    Ok(())
}
