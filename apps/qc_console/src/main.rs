mod config;
mod console;

use std::path::PathBuf;

use anyhow::{Context, Result};
use clap::Parser;
use command_core::{CommandError, CommandManager, HistoryEvent};
use shared::error::CommandFailure;
use storage::Storage;
use tokio::{
    io::{AsyncBufReadExt, BufReader},
    sync::broadcast::error::RecvError,
};
use tracing::{debug, info, warn};
use tracing_subscriber::EnvFilter;

use config::{load_settings, prepare_database_url, CONFIG_FILE};
use console::{seed_demo_data, Console, ConsoleCommand, HELP};

#[derive(Parser, Debug)]
#[command(about = "Quality-control inspection console with undo/redo")]
struct Args {
    #[arg(long, default_value = CONFIG_FILE)]
    config: PathBuf,
    #[arg(long)]
    database_url: Option<String>,
    #[arg(long)]
    max_history_size: Option<usize>,
    #[arg(long)]
    log_filter: Option<String>,
    /// Create the demo inspector (badge 0001) and order QC-0001 if missing.
    #[arg(long)]
    seed: bool,
}

#[tokio::main]
async fn main() -> Result<()> {
    let args = Args::parse();
    let mut settings = load_settings(&args.config)?;
    if let Some(v) = args.database_url {
        settings.database_url = v;
    }
    if let Some(v) = args.max_history_size {
        settings.max_history_size = v;
    }
    if let Some(v) = args.log_filter {
        settings.log_filter = v;
    }

    let filter = match EnvFilter::try_from_default_env() {
        Ok(filter) => filter,
        Err(_) => EnvFilter::try_new(&settings.log_filter)
            .with_context(|| format!("invalid log filter '{}'", settings.log_filter))?,
    };
    tracing_subscriber::fmt()
        .with_env_filter(filter)
        .with_writer(std::io::stderr)
        .init();

    let database_url = prepare_database_url(&settings.database_url);
    let storage = Storage::new(&database_url)
        .await
        .with_context(|| format!("failed to open database '{database_url}'"))?;
    storage.health_check().await?;
    info!(%database_url, max_history_size = settings.max_history_size, "store ready");

    if args.seed {
        let order = seed_demo_data(&storage).await?;
        println!("demo order {order} ready, sign in with 'login 0001'");
    }

    let manager = CommandManager::with_max_history_size(settings.max_history_size)?
        .with_event_buffer(settings.event_buffer);
    tokio::spawn(log_history_events(manager.clone()));

    let console = Console::new(storage, manager);
    println!("{HELP}");

    let mut lines = BufReader::new(tokio::io::stdin()).lines();
    while let Some(line) = lines.next_line().await? {
        let command = match line.parse::<ConsoleCommand>() {
            Ok(ConsoleCommand::Quit) => break,
            Ok(command) => command,
            Err(console::ParseError::Empty) => continue,
            Err(err) => {
                println!("{err}");
                continue;
            }
        };

        match console.run(command).await {
            Ok(reply) => println!("{reply}"),
            Err(err) => report_error(&err),
        }
    }

    info!(
        undo_len = console.manager().undo_len(),
        "console closed"
    );
    Ok(())
}

fn report_error(err: &anyhow::Error) {
    let Some(command_err) = err.downcast_ref::<CommandError>() else {
        println!("error: {err:#}");
        return;
    };
    let failure = CommandFailure::from(command_err);
    if failure.requires_reauth() {
        println!("error: {}; sign in with 'login <badge>'", failure.message);
    } else {
        println!("error: {}", failure.message);
    }
}

async fn log_history_events(manager: CommandManager) {
    let mut events = manager.subscribe();
    drop(manager);
    loop {
        match events.recv().await {
            Ok(HistoryEvent::Failed {
                operation,
                description,
                failure,
            }) => debug!(%operation, command = %description, code = ?failure.code, "history failure"),
            Ok(event) => debug!(?event, "history event"),
            Err(RecvError::Lagged(skipped)) => warn!(skipped, "history event listener lagged"),
            Err(RecvError::Closed) => break,
        }
    }
}
