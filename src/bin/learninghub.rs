//! LearningHub CLI - maintenance tools for the LearningHub lesson site
//!
//! Batch page transforms, lesson audits, atomic lesson conversion, JSON
//! exports, submission grading and sync helpers behind one binary.

use clap::Parser;
use tracing_subscriber::EnvFilter;

mod cli;

use cli::{Cli, Commands};

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    let cli = Cli::parse();

    // LEARNINGHUB_LOG (e.g. "learninghub=trace") overrides --verbose
    let log_level = if cli.verbose { "debug" } else { "info" };
    let filter = EnvFilter::try_from_env("LEARNINGHUB_LOG").unwrap_or_else(|_| EnvFilter::new(log_level));

    tracing_subscriber::fmt()
        .with_env_filter(filter)
        .with_target(false)
        .with_writer(std::io::stderr)
        .init();

    let config_path = cli.config.as_deref();
    let root = cli.root.as_deref();

    match cli.command {
        Commands::PrintDefaultConfig => {
            cli::print_default_config().await?;
        }
        Commands::InitConfig(args) => {
            cli::init_config(args).await?;
        }
        Commands::ValidateConfig(args) => {
            cli::validate_config(args, config_path).await?;
        }
        Commands::Transform(args) => {
            let config = cli::load_configuration(config_path, root).await?;
            cli::transform_command(args, &config).await?;
        }
        Commands::Audit(args) => {
            let config = cli::load_configuration(config_path, root).await?;
            cli::audit_command(args, &config).await?;
        }
        Commands::Atomic(command) => {
            let config = cli::load_configuration(config_path, root).await?;
            cli::atomic_command(command, &config).await?;
        }
        Commands::Extract(command) => {
            let config = cli::load_configuration(config_path, root).await?;
            cli::extract_command(command, &config).await?;
        }
        Commands::Submissions(command) => {
            let config = cli::load_configuration(config_path, root).await?;
            cli::submissions_command(command, &config).await?;
        }
        Commands::Sync(command) => {
            let config = cli::load_configuration(config_path, root).await?;
            cli::sync_command(command, &config).await?;
        }
        Commands::Onecompiler(command) => {
            let config = cli::load_configuration(config_path, root).await?;
            cli::onecompiler_command(command, &config).await?;
        }
    }

    Ok(())
}
