use clap::Parser;
use fish::settings::{CommandLineOptions, Settings};
use fish::{build, logging};

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    let cli = CommandLineOptions::parse();
    let settings = Settings::new(&cli)?;
    logging::init(cli.log_json);

    tracing::info!(node = %settings.node.name, "starting aquarium-fish node");
    let node = build(&settings)?;

    tokio::signal::ctrl_c().await?;
    tracing::info!("shutdown signal received, draining workers");
    let _ = node.shutdown.send(true);
    node.cluster_importer.abort();
    node.engine.join_workers().await;
    Ok(())
}
