use clap::Parser;
use recall::cli::{Cli, Commands, ConfigAction};
use recall::config::Config;
use recall::gateway::{AppState, GatewayServer};
use recall::logging;
use tracing::info;

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    dotenvy::dotenv().ok();
    logging::init();

    let cli = Cli::parse();

    match cli.command {
        Commands::Serve(opts) => {
            info!("Starting Recall gateway");
            let config = Config::load(opts.config.as_deref())?;
            let server = GatewayServer::start(config, opts).await?;
            server.run_until_shutdown().await?;
        }
        Commands::Chat(opts) => {
            let config = Config::load(opts.config.as_deref())?;
            let state = AppState::from_config(config)?;
            let agent = state
                .agents
                .get(&opts.agent)
                .ok_or_else(|| anyhow::anyhow!("agent {} not found", opts.agent))?;
            let reply = agent
                .respond(&opts.message, opts.context.as_deref())
                .await?;
            println!("{}", reply.response);
        }
        Commands::Config(opts) => {
            match opts.action {
                ConfigAction::Show => {
                    let config = Config::load(opts.config.as_deref())?;
                    println!("{}", serde_json::to_string_pretty(&config)?);
                }
                ConfigAction::Validate => {
                    Config::load(opts.config.as_deref())?;
                    info!("Configuration is valid");
                }
                ConfigAction::Init => {
                    Config::write_default(opts.config.as_deref().unwrap_or("recall.json"))?;
                    info!("Configuration file created");
                }
            }
        }
        Commands::Doctor(opts) => {
            info!("Running diagnostics...");
            let config = Config::load(opts.config.as_deref())?;
            recall::infra::doctor::run_diagnostics(&config).await?;
        }
        Commands::Version => {
            println!("recall {}", env!("CARGO_PKG_VERSION"));
        }
    }

    Ok(())
}
