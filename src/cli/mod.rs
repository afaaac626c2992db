use clap::{Parser, Subcommand};

#[derive(Parser)]
#[command(name = "recall", version, about = "Semantic memory service for AI assistants")]
pub struct Cli {
    #[command(subcommand)]
    pub command: Commands,
}

#[derive(Subcommand)]
pub enum Commands {
    Serve(ServeOpts),
    Chat(ChatOpts),
    Config(ConfigOpts),
    Doctor(DoctorOpts),
    Version,
}

#[derive(clap::Args)]
pub struct ServeOpts {
    #[arg(short, long)]
    pub config: Option<String>,
    #[arg(short, long)]
    pub port: Option<u16>,
    #[arg(short, long)]
    pub bind: Option<String>,
}

#[derive(clap::Args)]
pub struct ChatOpts {
    #[arg(short, long)]
    pub config: Option<String>,
    /// Agent to talk to (e.g. `cara`).
    pub agent: String,
    pub message: String,
    #[arg(long)]
    pub context: Option<String>,
}

#[derive(clap::Args)]
pub struct ConfigOpts {
    #[arg(short, long)]
    pub config: Option<String>,
    #[command(subcommand)]
    pub action: ConfigAction,
}

#[derive(Subcommand)]
pub enum ConfigAction {
    Show,
    Validate,
    Init,
}

#[derive(clap::Args)]
pub struct DoctorOpts {
    #[arg(short, long)]
    pub config: Option<String>,
}
