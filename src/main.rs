use clap::{Parser, Subcommand};
use db_backup::backup::backup_config::BackupConfig;
use db_backup::backup::compress::CompressorConfig;
use db_backup::backup::pipeline::RunOutcome;
use db_backup::backup::restore::restore_file;
use db_backup::backup::result_error::error::Error;
use db_backup::backup::result_error::result::Result;
use db_backup::backup::result_error::stage::Stage;
use db_backup::backup::result_error::InStage;
use std::path::{Path, PathBuf};
use std::process::exit;
use tracing::{error, info};

/// Take an encrypted backup of the database if this node serves it
#[derive(Parser, Debug)]
#[command(version, about, long_about = None)]
struct Args {
    /// Location of config file
    #[arg(short, long, env = "DB_BACKUP_CONFIG", global = true)]
    config: Option<PathBuf>,

    #[command(subcommand)]
    command: Option<Command>,
}

#[derive(Subcommand, Debug)]
enum Command {
    /// Run the daily backup (default)
    Run,
    /// Decrypt and decompress an archived backup
    Restore {
        /// age identity file, repeat for several
        #[arg(long, required = true)]
        identity: Vec<PathBuf>,
        /// Archived `.bak.encrypted` artifact
        #[arg(long)]
        input: PathBuf,
        /// Where to write the restored dump, must not exist
        #[arg(long)]
        output: PathBuf,
    },
}

fn load_config(path: Option<&Path>) -> Result<BackupConfig> {
    let path = path.ok_or_else(|| {
        Error::from(std::io::Error::other(
            "no config file given, use --config or DB_BACKUP_CONFIG",
        ))
    });
    path.and_then(BackupConfig::load).in_stage(Stage::Config)
}

fn run_backup(config: Option<&Path>) -> Result<()> {
    let config = load_config(config)?;
    let today = chrono::Local::now().date_naive();
    info!("Starting backup of {} for {}", config.database_name, today);

    match config.run(today)? {
        RunOutcome::Completed { archived, .. } => info!("Backup archived at {:?}", archived),
        RunOutcome::Skipped(outcome) => info!("Backup skipped: {:?}", outcome),
    }
    Ok(())
}

fn restore(
    config: Option<&Path>,
    identity: &[PathBuf],
    input: &Path,
    output: &Path,
) -> Result<()> {
    let compressor = match config {
        Some(_) => load_config(config)?.compressor,
        None => CompressorConfig::default(),
    };
    let written = restore_file(input, identity, &compressor, output)?;
    info!("Restored {} bytes to {:?}", written, output);
    Ok(())
}

fn main() {
    tracing_subscriber::fmt::init();
    let args = Args::parse();
    let config = args.config.as_deref();

    let res = match args.command.unwrap_or(Command::Run) {
        Command::Run => run_backup(config),
        Command::Restore {
            identity,
            input,
            output,
        } => restore(config, &identity, &input, &output),
    };

    match res {
        Ok(_) => exit(0),
        Err(e) => {
            error!("{e}");
            exit(e.exit_code());
        }
    }
}
