use std::io::Write;
use std::path::PathBuf;
use std::sync::Arc;

use anyhow::Context;
use clap::Parser;
use tokio_util::sync::CancellationToken;
use tracing::{info, warn};
use tracing_subscriber::{fmt, prelude::*, EnvFilter};

use property_crew::config::{CrewDefinition, Settings};

/// Research the investment potential of properties around an address
#[derive(Debug, Parser)]
#[command(name = "property-crew", version)]
struct Cli {
    /// Address to research; blank uses the configured default
    #[arg(short, long)]
    address: Option<String>,

    /// Settings file (TOML)
    #[arg(short, long, value_name = "FILE")]
    settings: Option<PathBuf>,

    /// Crew definition (TOML); defaults to the bundled real-estate crew
    #[arg(short, long, value_name = "FILE")]
    crew: Option<PathBuf>,

    /// Print the run record as JSON instead of the text report
    #[arg(long)]
    json: bool,
}

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    dotenv::dotenv().ok();
    let cli = Cli::parse();
    init_logging();

    let settings = Settings::load(cli.settings.as_deref()).context("loading settings")?;
    let address = settings.address_or_default(cli.address.as_deref());

    let definition = match &cli.crew {
        Some(path) => CrewDefinition::from_path(path)?,
        None => CrewDefinition::real_estate()?,
    };
    let tools = settings.tool_registry().context("setting up tools")?;
    let llm = settings.llm.build_service().context("setting up the completion service")?;

    let crew = definition
        .into_builder()
        .input("address", address.clone())
        .tools(Arc::new(tools))
        .llm(llm)
        .llm_config(settings.llm.clone())
        .limiter(settings.rate_limiter())
        .build()
        .context("invalid crew")?;

    info!(address = %address, model = %settings.llm.model, "starting analysis");
    for agent in crew.agents().iter() {
        info!(agent = %agent.role.get_description(), "crew member");
    }

    let cancel = CancellationToken::new();
    let on_ctrl_c = cancel.clone();
    tokio::spawn(async move {
        if tokio::signal::ctrl_c().await.is_ok() {
            warn!("cancellation requested, stopping agents");
            on_ctrl_c.cancel();
        }
    });

    let output = crew.run(cancel.clone()).await;

    if cli.json {
        println!("{}", serde_json::to_string_pretty(&output)?);
    } else {
        println!("{}", output.report());
    }

    // A `human` prompt may still be blocked on stdin, and dropping the
    // runtime would wait for it.
    if cancel.is_cancelled() {
        std::io::stdout().flush()?;
        std::process::exit(130);
    }

    output.result()?;
    Ok(())
}

fn init_logging() {
    let filter = EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new("property_crew=info"));

    tracing_subscriber::registry()
        .with(fmt::layer().with_target(false))
        .with(filter)
        .init();
}
