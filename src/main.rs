use clap::{Parser, Subcommand};
use iot_agent::config::AgentConfig;
use iot_agent::{logging, metrics, server};
use tracing::{error, info, warn};

#[derive(Parser)]
#[command(name = "iot_agent")]
#[command(about = "Decrypts field-node telemetry and forwards it to Orion")]
#[command(version)]
struct Cli {
    #[command(subcommand)]
    command: Commands,
}

#[derive(Subcommand)]
enum Commands {
    /// Run the HTTP ingest server
    Serve {
        /// Port to listen on (overrides AGENT_PORT)
        #[arg(long)]
        port: Option<u16>,
    },
    /// Print the effective configuration and exit
    CheckConfig,
}

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    let cli = Cli::parse();
    let mut config = AgentConfig::load()?;

    let _guard = logging::init_logging(&config.log_level);

    match cli.command {
        Commands::Serve { port } => {
            if let Some(port) = port {
                config.port = port;
            }
            if config.agent_token.as_ref().map_or(true, |t| t.is_empty()) {
                warn!("AGENT_TOKEN is not set; every ingest will be rejected until it is");
            }
            metrics::init_metrics();
            info!(
                gps = %config.gps_entity_id,
                temp = %config.temp_entity_id,
                hum = %config.hum_entity_id,
                "starting IoT agent"
            );
            if let Err(e) = server::start_server(&config).await {
                error!("Server failed: {}", e);
                return Err(e.into());
            }
        }
        Commands::CheckConfig => {
            println!("{config:#?}");
        }
    }
    Ok(())
}
