use std::path::PathBuf;

use anyhow::{Context, Result};
use clap::{Args, Parser, Subcommand};

use soapd::{
    config::{ConfigUpdate, load_or_default},
    logging, server,
};

#[derive(Parser)]
#[command(author, version, about = "soapd SOAP/MTOM gateway CLI")]
struct Cli {
    /// Path to the configuration file. Defaults to ./.soapd/config.toml
    #[arg(long)]
    config: Option<PathBuf>,

    #[command(subcommand)]
    command: Commands,
}

#[derive(Subcommand)]
enum Commands {
    /// Start the soapd server in the foreground
    Serve(ServeArgs),
    /// Print the resolved configuration
    Config,
}

#[derive(Args)]
struct ServeArgs {
    /// Override the configured server port
    #[arg(long)]
    port: Option<u16>,

    /// Override the configured upload directory
    #[arg(long)]
    upload_dir: Option<PathBuf>,

    /// Override the configured WSDL document path
    #[arg(long)]
    wsdl_path: Option<PathBuf>,

    /// Override the configured request body size limit in bytes
    #[arg(long)]
    max_body_bytes: Option<usize>,

    /// Override the log directory (default: SOAPD_LOG_DIR or ~/.soapd/logs)
    #[arg(long)]
    log_dir: Option<PathBuf>,
}

#[tokio::main]
async fn main() -> Result<()> {
    let Cli { config, command } = Cli::parse();

    match command {
        Commands::Serve(args) => serve(config, args).await,
        Commands::Config => show_config(config),
    }
}

async fn serve(config_path: Option<PathBuf>, args: ServeArgs) -> Result<()> {
    let (mut config, _path) = load_or_default(config_path)?;
    config.apply_update(ConfigUpdate {
        port: args.port,
        upload_dir: args.upload_dir,
        wsdl_path: args.wsdl_path,
        max_body_bytes: args.max_body_bytes,
        log_dir: args.log_dir,
    });

    logging::init(config.log_dir.as_deref())?;
    config.ensure_upload_dir().context("upload directory")?;

    server::run(config).await.context("server failed")?;
    Ok(())
}

fn show_config(config_path: Option<PathBuf>) -> Result<()> {
    let (config, path) = load_or_default(config_path)?;
    println!("# {}", path.display());
    print!("{}", toml::to_string_pretty(&config)?);
    Ok(())
}
