//! gemix - Entry Point
//!
//! Deploys and operates openGemini clusters over SSH.

use std::process::ExitCode;
use std::sync::Arc;

use anyhow::Context;
use clap::{Parser, Subcommand};
use tracing::{error, info};

use gemix::app::options::GemixOptions;
use gemix::executor::ssh::SshConnector;
use gemix::filesys::file::File;
use gemix::logs::{init_logging, LogLevel, LogOptions};
use gemix::operation::{resolve_auth, ClusterManager, InstallRequest};
use gemix::storage::layout::StorageLayout;
use gemix::storage::settings::Settings;
use gemix::task::display::TerminalRenderer;
use gemix::utils::version_info;

#[derive(Debug, Parser)]
#[command(name = "gemix", about = "Deploy and operate openGemini clusters")]
struct Cli {
    /// Overrides the log level from settings.json
    #[arg(long, global = true)]
    log_level: Option<LogLevel>,

    #[command(subcommand)]
    command: Command,
}

#[derive(Debug, Subcommand)]
enum Command {
    /// Download, configure and upload a new cluster
    Install {
        #[arg(short, long)]
        name: String,
        #[arg(short, long)]
        version: String,
        /// Topology file
        #[arg(short = 'y', long)]
        yaml: String,
        /// SSH login user
        #[arg(short, long, default_value = "root")]
        user: String,
        /// SSH private key file
        #[arg(short, long)]
        key: Option<String>,
        /// SSH password
        #[arg(short, long)]
        password: Option<String>,
    },
    /// Start every instance, meta first
    Start {
        #[arg(short, long)]
        name: String,
    },
    /// Stop every managed process
    Stop {
        #[arg(short, long)]
        name: String,
    },
    /// Show processes, ports and disk usage per host
    Status {
        #[arg(short, long)]
        name: String,
    },
    /// Remove the installed files and the local records
    Uninstall {
        #[arg(short, long)]
        name: String,
    },
    /// Replace the installed version
    Upgrade {
        #[arg(short, long)]
        name: String,
        #[arg(short, long)]
        version: String,
    },
    /// Print build information
    Version,
}

#[tokio::main]
async fn main() -> ExitCode {
    let cli = Cli::parse();

    if let Command::Version = cli.command {
        let version = version_info();
        println!(
            "gemix {} ({}, built {}, {})",
            version.version, version.git_hash, version.build_time, version.target
        );
        return ExitCode::SUCCESS;
    }

    match run(cli).await {
        Ok(()) => ExitCode::SUCCESS,
        Err(e) => {
            error!("{:#}", e);
            eprintln!("Error: {:#}", e);
            ExitCode::FAILURE
        }
    }
}

async fn run(cli: Cli) -> anyhow::Result<()> {
    let layout = StorageLayout::default();
    layout
        .setup()
        .await
        .with_context(|| format!("unable to prepare {}", layout.base_dir.display()))?;
    let settings = Settings::load(&layout.settings_file())
        .await
        .context("unable to read settings")?;

    let log_options = LogOptions {
        log_level: cli.log_level.clone().unwrap_or(settings.log_level.clone()),
        log_dir: Some(layout.logs_dir().path().to_path_buf()),
        ..Default::default()
    };
    // Held until exit so buffered file logs are flushed
    let _guard = match init_logging(log_options) {
        Ok(guard) => guard,
        Err(e) => {
            eprintln!("Failed to initialize logging: {e}");
            None
        }
    };

    let options = GemixOptions::from_settings(layout, &settings);
    info!("Running gemix with options: {:?}", options);
    let connector = Arc::new(SshConnector::new(options.ssh.clone()));
    let manager = ClusterManager::new(options, connector, Arc::new(TerminalRenderer));

    match cli.command {
        Command::Install {
            name,
            version,
            yaml,
            user,
            key,
            password,
        } => {
            let auth = resolve_auth(key, password, |k| std::env::var(k).ok())?;
            let topology_yaml = File::new(&yaml)
                .read_string()
                .await
                .with_context(|| format!("unable to read topology {}", yaml))?;
            manager
                .install(InstallRequest {
                    name,
                    version,
                    user,
                    auth,
                    topology_yaml,
                })
                .await?;
        }
        Command::Start { name } => manager.start(&name).await?,
        Command::Stop { name } => manager.stop(&name).await?,
        Command::Status { name } => {
            manager.status(&name).await?;
        }
        Command::Uninstall { name } => manager.uninstall(&name).await?,
        Command::Upgrade { name, version } => {
            manager.upgrade(&name, &version).await?;
        }
        Command::Version => {}
    }
    Ok(())
}
