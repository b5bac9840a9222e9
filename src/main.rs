use clap::{Args, Parser, Subcommand};
use std::path::PathBuf;
use std::sync::Arc;
use tracing::info;
use wxgate::config::Config;
use wxgate::envelope::EnvelopeCodec;
use wxgate::responder::Responder;
use wxgate::{handlers, logging, web};

const VERSION: &str = env!("CARGO_PKG_VERSION");

#[derive(Debug, Parser)]
#[command(
    name = "wxgate",
    version = VERSION,
    about = "Encrypted callback gateway for enterprise chat webhooks"
)]
struct Cli {
    #[command(subcommand)]
    command: Option<MainCommand>,
}

#[derive(Debug, Subcommand)]
enum MainCommand {
    /// Serve the callback endpoint
    Start(ConfigArgs),
    /// Validate configuration and key material, then exit
    Check(ConfigArgs),
    /// Show version
    Version,
}

#[derive(Debug, Args)]
struct ConfigArgs {
    /// Path to wxgate.config.yaml (defaults to $WXGATE_CONFIG or ./wxgate.config.yaml)
    #[arg(long)]
    config: Option<PathBuf>,
}

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    let cli = Cli::parse();
    match cli.command {
        Some(MainCommand::Start(args)) => start(args).await,
        Some(MainCommand::Check(args)) => check(args),
        Some(MainCommand::Version) => {
            println!("wxgate {VERSION}");
            Ok(())
        }
        None => {
            println!("wxgate {VERSION}\nRun `wxgate start` to serve the callback endpoint.");
            Ok(())
        }
    }
}

async fn start(args: ConfigArgs) -> anyhow::Result<()> {
    let config = Config::load(args.config.as_deref())?;
    match &config.log_dir {
        Some(dir) => logging::init_logging(std::path::Path::new(dir), config.log_retention_days)?,
        None => logging::init_console_logging(),
    }

    let secrets = Arc::new(config.shared_secrets()?);
    let router = Arc::new(handlers::sample_router());
    info!(
        corp_id = %config.corp_id,
        agent_id = ?config.agent_id,
        encrypt_mode = config.encrypt_mode(),
        rules = router.len(),
        "Starting wxgate"
    );

    let responder = Arc::new(Responder::new(EnvelopeCodec::new(secrets), router));
    web::start_server(&config, responder).await
}

fn check(args: ConfigArgs) -> anyhow::Result<()> {
    let config = Config::load(args.config.as_deref())?;
    println!("corp_id:        {}", config.corp_id);
    println!(
        "agent_id:       {}",
        config
            .agent_id
            .map(|id| id.to_string())
            .unwrap_or_else(|| "-".into())
    );
    println!(
        "mode:           {}",
        if config.encrypt_mode() {
            "encrypted"
        } else {
            "plaintext"
        }
    );
    println!("callback:       http://{}{}", config.listen_addr(), config.callback_path);
    if let Some(path) = &config.access_token_file {
        println!("access token:   {path}");
    }
    println!("OK");
    Ok(())
}
