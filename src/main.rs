use std::fs::File;
use std::path::PathBuf;
use std::process::ExitCode;
use std::sync::Arc;

use clap::Parser;
use simplelog::{ConfigBuilder, LevelFilter, WriteLogger};

use susu::cli;
use susu::core::auth::{AuthGate, StoredIdentity};
use susu::core::config::{self, CliOverrides};
use susu::core::state::App;
use susu::core::storage::{FileStorage, Storage, record_visit};

#[derive(Parser)]
#[command(name = "susu", about = "Multi-model chat client")]
struct Args {
    /// Model id to start with (e.g. deepseek/deepseek-chat)
    #[arg(short, long)]
    model: Option<String>,

    /// Record a verified identity before starting
    #[arg(long)]
    identity: Option<String>,

    /// Directory for saved chats and settings (default ~/.susu)
    #[arg(long)]
    data_dir: Option<PathBuf>,
}

#[tokio::main]
async fn main() -> ExitCode {
    let args = Args::parse();
    dotenv::dotenv().ok();

    // Initialize file logger - writes to susu.log in current directory
    let log_config = ConfigBuilder::new().set_time_format_rfc3339().build();

    if let Ok(log_file) = File::create("susu.log") {
        let _ = WriteLogger::init(LevelFilter::Debug, log_config, log_file);
    }

    log::info!("Susu starting up");

    match start(args).await {
        Ok(()) => ExitCode::SUCCESS,
        Err(message) => {
            log::error!("{}", message);
            eprintln!("susu: {message}");
            ExitCode::FAILURE
        }
    }
}

async fn start(args: Args) -> Result<(), String> {
    let file_config = config::load_config().map_err(|e| e.to_string())?;
    let resolved = config::resolve(
        &file_config,
        &CliOverrides {
            model: args.model,
            data_dir: args.data_dir,
        },
    );
    let api_key = resolved.require_api_key().map_err(|e| e.to_string())?;

    let data_dir = match resolved.data_dir.clone() {
        Some(dir) => dir,
        None => FileStorage::default_dir().map_err(|e| e.to_string())?,
    };
    let storage: Arc<dyn Storage> =
        Arc::new(FileStorage::open(&data_dir).map_err(|e| e.to_string())?);
    log::info!("Data directory: {}", data_dir.display());

    let gate = Arc::new(StoredIdentity::new(storage.clone()));
    if let Some(identity) = args.identity.as_deref() {
        gate.record_verified(identity).map_err(|e| e.to_string())?;
    }
    if !gate.is_verified() {
        return Err("not signed in; run once with --identity <email> after verifying".to_string());
    }

    let visits = record_visit(storage.as_ref());
    log::info!("Visit #{}", visits);
    println!("Susu, visit #{visits}");

    let provider = cli::build_provider(&resolved, api_key);
    let app = App::from_config(provider, storage, &resolved);
    cli::run(app, gate).await.map_err(|e| e.to_string())
}
