use clap::{Parser, Subcommand};
use market_sso::database::{DatabaseManager, DatabaseManagerImpl};
use market_sso::{Config, Server};
use tracing::{error, info};

#[derive(Parser)]
#[command(name = "market-sso")]
#[command(about = "Federated login service for the marketplace")]
struct Cli {
    #[arg(short, long, help = "Path to configuration file")]
    config: Option<String>,

    #[command(subcommand)]
    command: Option<Commands>,
}

#[derive(Subcommand)]
enum Commands {
    /// Run database migrations and exit
    Migrate,
}

#[tokio::main]
async fn main() {
    let cli = Cli::parse();

    let config = match &cli.config {
        Some(path) => Config::load_from_file(path),
        None => Config::load(),
    };
    let config = match config {
        Ok(config) => config,
        Err(e) => {
            eprintln!("Failed to load configuration: {}", e);
            std::process::exit(1);
        }
    };

    tracing_subscriber::fmt()
        .with_env_filter(tracing_subscriber::EnvFilter::new(&config.logging.level))
        .init();

    if let Some(Commands::Migrate) = cli.command {
        if let Err(e) = run_migrations(&config).await {
            error!("Migration failed: {}", e);
            std::process::exit(1);
        }
        return;
    }

    info!("Starting marketplace login service");

    let server = match Server::new(config).await {
        Ok(server) => server,
        Err(e) => {
            error!("Failed to initialize server: {}", e);
            std::process::exit(1);
        }
    };

    if let Err(e) = server.run().await {
        error!("Server error: {}", e);
        std::process::exit(1);
    }
}

async fn run_migrations(config: &Config) -> Result<(), market_sso::error::AppError> {
    let database = DatabaseManagerImpl::new_from_config(config).await?;
    database.migrate().await?;
    info!("Migrations applied");
    Ok(())
}
