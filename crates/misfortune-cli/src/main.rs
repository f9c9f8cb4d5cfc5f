use std::net::SocketAddr;
use std::path::PathBuf;
use std::process::ExitCode;

use clap::{Parser, Subcommand};
use contracts::{
    ConnectedUser, RollTestEvent, RollTestKind, TrackerControl, TriggerConfigPatch, UserRole,
};
use misfortune_api::{default_sqlite_path, open_table, serve};
use misfortune_core::{ControlOutcome, MisfortuneModule, Outbox, RollOutcome};
use serde_json::json;
use tracing::error;
use tracing_subscriber::EnvFilter;

const CLI_USER_ID: &str = "cli-gm";
const CLI_PLAYER_ID: &str = "cli-player";

#[derive(Debug, Parser)]
#[command(name = "misfortune", about = "Misfortune pool for WFRP tables", version)]
struct Cli {
    /// World settings database.
    #[arg(long, global = true, env = "MISFORTUNE_SQLITE_PATH")]
    sqlite_path: Option<PathBuf>,

    #[command(subcommand)]
    command: Command,
}

#[derive(Debug, Subcommand)]
enum Command {
    /// Serve the HTTP API and WebSocket relay.
    Serve {
        #[arg(default_value = "127.0.0.1:8080")]
        addr: SocketAddr,
    },
    /// Show the pool as the GM sees it.
    Status,
    /// Feed a finished roll through trigger detection.
    Roll {
        value: i64,
        #[arg(long, default_value = "Player")]
        player: String,
        #[arg(long, default_value = "test")]
        kind: String,
    },
    /// Add one point by hand.
    Add,
    /// Spend one point.
    Spend,
    /// Reset the pool to 0.
    Reset {
        /// Answer the confirmation prompt.
        #[arg(long)]
        yes: bool,
    },
    /// Print the log, newest first.
    Log,
    /// Show or change the trigger settings.
    Config {
        #[arg(long)]
        trigger_value: Option<i64>,
        #[arg(long)]
        show_players: Option<bool>,
        #[arg(long)]
        chat_flavor: Option<bool>,
    },
}

fn init_tracing() {
    let filter = EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new("info"));
    tracing_subscriber::fmt()
        .with_env_filter(filter)
        .with_writer(std::io::stderr)
        .init();
}

fn sqlite_path(cli: &Cli) -> PathBuf {
    cli.sqlite_path
        .clone()
        .unwrap_or_else(|| default_sqlite_path().into())
}

fn cli_gamemaster() -> ConnectedUser {
    ConnectedUser {
        user_id: CLI_USER_ID.to_string(),
        name: "GM".to_string(),
        role: UserRole::Gamemaster,
        owned_actors: Vec::new(),
    }
}

fn print_effects(module: &mut MisfortuneModule<Outbox>) {
    let effects = module.host_mut().take();
    for card in effects.chat {
        let title = card.title.unwrap_or_else(|| card.speaker_alias.clone());
        println!("[{}] {}", card.speaker_alias, title);
        for line in card.lines {
            println!("  {line}");
        }
    }
    for notice in effects.notices {
        println!("{:?}: {}", notice.level, notice.message);
    }
}

fn run_offline(cli: &Cli) -> Result<(), String> {
    let path = sqlite_path(cli);
    let mut module =
        open_table(&path).map_err(|err| format!("failed to open {}: {err}", path.display()))?;
    module.connect(cli_gamemaster());

    match &cli.command {
        Command::Serve { .. } => {
            return Err("serve does not run as an offline command".to_string());
        }
        Command::Status => {}
        Command::Roll {
            value,
            player,
            kind,
        } => {
            let kind = RollTestKind::from_hook_name(kind)
                .or_else(|| serde_json::from_value(json!(kind)).ok())
                .ok_or_else(|| format!("unknown roll kind: {kind}"))?;
            module.connect(ConnectedUser {
                user_id: CLI_PLAYER_ID.to_string(),
                name: player.clone(),
                role: UserRole::Player,
                owned_actors: Vec::new(),
            });
            let event = RollTestEvent::new(
                kind,
                json!({ "result": { "roll": value } }),
                Some(CLI_PLAYER_ID.to_string()),
            );
            match module.handle_roll(&event) {
                RollOutcome::Triggered { user_name, pool, .. } => {
                    println!("triggered by {user_name}, pool={pool}");
                }
                RollOutcome::Discarded(discard) => println!("no trigger: {discard:?}"),
            }
        }
        Command::Add => {
            module
                .press_control(CLI_USER_ID, TrackerControl::Add)
                .map_err(|err| err.to_string())?;
        }
        Command::Spend => {
            module
                .press_control(CLI_USER_ID, TrackerControl::Spend)
                .map_err(|err| err.to_string())?;
        }
        Command::Reset { yes } => {
            let outcome = module
                .press_control(CLI_USER_ID, TrackerControl::Reset)
                .map_err(|err| err.to_string())?;
            if let ControlOutcome::ConfirmationRequired(prompt) = outcome {
                println!("{}: {}", prompt.title, prompt.content);
                let confirmed = module
                    .confirm_reset(CLI_USER_ID, *yes)
                    .map_err(|err| err.to_string())?;
                if confirmed == ControlOutcome::Cancelled {
                    println!("cancelled, pass --yes to reset");
                }
            }
        }
        Command::Log => {
            let entries = module
                .log_view(CLI_USER_ID)
                .map_err(|err| err.to_string())?;
            if entries.is_empty() {
                println!("No Misfortune history yet.");
            }
            for view in entries {
                let detail = match (&view.entry.player, view.entry.roll) {
                    (Some(player), Some(roll)) => format!(" {player} rolled {roll}"),
                    (Some(player), None) => format!(" {player}"),
                    _ => String::new(),
                };
                println!(
                    "{} {:?}{detail} -> {}",
                    view.formatted_time, view.entry.kind, view.entry.pool
                );
            }
        }
        Command::Config {
            trigger_value,
            show_players,
            chat_flavor,
        } => {
            let patch = TriggerConfigPatch {
                trigger_value: *trigger_value,
                show_players: *show_players,
                chat_flavor: *chat_flavor,
            };
            if patch != TriggerConfigPatch::default() {
                module
                    .update_config(CLI_USER_ID, &patch)
                    .map_err(|err| err.to_string())?;
            }
            println!("{}", module.config());
        }
    }

    print_effects(&mut module);
    if let Some(tracker) = module.render_tracker() {
        println!("{tracker}");
    }
    if let Some(error) = module.last_persistence_error() {
        return Err(format!("persistence error: {error}"));
    }

    module
        .teardown()
        .map_err(|err| format!("failed to flush {}: {err}", path.display()))?;
    Ok(())
}

#[tokio::main]
async fn main() -> ExitCode {
    init_tracing();
    let cli = Cli::parse();

    let result = match &cli.command {
        Command::Serve { addr } => serve(*addr, cli.sqlite_path.as_deref())
            .await
            .map_err(|err| err.to_string()),
        _ => run_offline(&cli),
    };

    match result {
        Ok(()) => ExitCode::SUCCESS,
        Err(err) => {
            error!(error = %err, "command failed");
            eprintln!("{err}");
            ExitCode::FAILURE
        }
    }
}
