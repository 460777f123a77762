use bento_ops::catalog::operation_catalog;
use bento_ops::errors::ApiError;
use bento_ops::host::{run_stdio, PluginInstance};
use bento_ops::services::concurrency::ConcurrencyLedger;
use bento_ops::services::credentials::Credentials;
use bento_ops::services::logger::Logger;
use bento_ops::services::settings::Settings;
use clap::{Parser, Subcommand};
use std::path::PathBuf;

#[derive(Parser)]
#[command(name = "bento-ops", version, about, long_about = None)]
struct Cli {
    #[command(subcommand)]
    command: Commands,
}

#[derive(Subcommand)]
enum Commands {
    /// Run one operation over JSON items read line by line from stdin
    Run {
        #[arg(long)]
        operation: String,
        /// JSON file with publishableKey, secretKey and siteUuid
        #[arg(long)]
        credentials: Option<PathBuf>,
        #[arg(long)]
        instance_key: Option<String>,
        #[arg(long)]
        continue_on_fail: bool,
        #[arg(long)]
        base_url: Option<String>,
    },
    /// List the available operations
    Operations,
}

async fn run(cli: Cli) -> Result<(), ApiError> {
    match cli.command {
        Commands::Operations => {
            for op in operation_catalog() {
                println!("{:<20} {:<14} {}", op.name, op.resource, op.description);
            }
            Ok(())
        }
        Commands::Run {
            operation,
            credentials,
            instance_key,
            continue_on_fail,
            base_url,
        } => {
            let logger = Logger::new("bento-ops");
            let mut settings = Settings::from_env();
            if let Some(base_url) = base_url {
                settings = settings.with_base_url(base_url);
            }
            let credentials = match credentials {
                Some(path) => Credentials::from_file(&path)?,
                None => Credentials::from_env(),
            };
            let ledger = ConcurrencyLedger::new(settings.max_in_flight);
            let instance = PluginInstance::new(
                logger,
                &settings,
                credentials,
                &ledger,
                instance_key.as_deref(),
            )?;
            run_stdio(&instance, &operation, continue_on_fail).await?;
            Ok(())
        }
    }
}

#[tokio::main]
async fn main() {
    if let Err(err) = run(Cli::parse()).await {
        eprintln!("bento-ops: {}", err);
        std::process::exit(1);
    }
}
