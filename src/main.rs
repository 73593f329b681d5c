//! Binary entrypoint for the mwsync CLI.
//!
//! Commands:
//! - `init` - write a starter `config.toml`
//! - `play` - run a local world session driven by stdin commands
//! - `inspect` - print the stored save snapshot of the configured slot
//!
//! See the library crate docs for module-level details: `mwsync::`.
use std::io::Write as _;

use anyhow::{Context, Result};
use clap::{Parser, Subcommand};
use log::{info, warn};
use tokio::io::{AsyncBufReadExt, BufReader};

use mwsync::config::Config;
use mwsync::effects::LogEffects;
use mwsync::game::GameConfig;
use mwsync::ids::{LocationId, NetId};
use mwsync::local::{slot_key_prefix, LocalTransport, LocalWorld};
use mwsync::metrics;
use mwsync::session::Session;
use mwsync::storage::SaveStore;
use mwsync::sync::SAVE_KEY_SUFFIX;

#[derive(Parser)]
#[command(name = "mwsync")]
#[command(about = "Client-side state for multiworld randomizers")]
#[command(version)]
struct Cli {
    #[command(subcommand)]
    command: Commands,

    /// Configuration file path (can be used before or after subcommand)
    #[arg(short, long, default_value = "config.toml", global = true)]
    config: String,

    /// Verbose logging (-v, -vv for more; may appear before or after subcommand)
    #[arg(short, long, action = clap::ArgAction::Count, global = true)]
    verbose: u8,
}

#[derive(Subcommand)]
enum Commands {
    /// Write a default configuration file
    Init,
    /// Play a local world from the terminal
    Play {
        /// Override the configured slot name
        #[arg(short, long)]
        slot: Option<String>,
    },
    /// Print the stored save snapshot
    Inspect {
        /// Override the configured slot name
        #[arg(short, long)]
        slot: Option<String>,
    },
}

type LocalSession = Session<LocalTransport, LogEffects>;

#[tokio::main]
async fn main() -> Result<()> {
    let cli = Cli::parse();

    let pre_config = match cli.command {
        Commands::Init => None,
        _ => Config::load(&cli.config).await.ok(),
    };
    if !matches!(cli.command, Commands::Init) {
        init_logging(&pre_config, cli.verbose);
    }

    match cli.command {
        Commands::Init => {
            if std::path::Path::new(&cli.config).exists() {
                println!("{} already exists, leaving it untouched", cli.config);
                return Ok(());
            }
            Config::create_default(&cli.config).await?;
            println!("Wrote default configuration to {}", cli.config);
        }
        Commands::Play { slot } => {
            let config = match pre_config {
                Some(c) => c,
                None => Config::load(&cli.config).await?,
            };
            play(config, slot).await?;
        }
        Commands::Inspect { slot } => {
            let config = match pre_config {
                Some(c) => c,
                None => Config::load(&cli.config).await?,
            };
            let slot = slot.unwrap_or_else(|| config.client.slot.clone());
            let store = SaveStore::open(&config.sync.data_dir)
                .with_context(|| format!("opening save store {}", config.sync.data_dir))?;
            let key = format!("{}{}", slot_key_prefix(&slot), SAVE_KEY_SUFFIX);
            match store.get(&key)? {
                Some(save) => {
                    if let Some(at) = store.modified_at(&key)? {
                        println!("# {} (written {})", key, at.format("%Y-%m-%dT%H:%M:%SZ"));
                    }
                    println!("{}", serde_json::to_string_pretty(&save)?);
                }
                None => println!("No save for slot {} in {}", slot, store.path().display()),
            }
        }
    }

    Ok(())
}

async fn play(config: Config, slot: Option<String>) -> Result<()> {
    let slot = slot.unwrap_or_else(|| config.client.slot.clone());
    let game = GameConfig::load(&config.client.game_config)
        .await
        .with_context(|| format!("loading game config {}", config.client.game_config))?;
    let world = LocalWorld::load(&config.client.world)
        .await
        .with_context(|| format!("loading world {}", config.client.world))?;
    let store = SaveStore::open(&config.sync.data_dir)
        .with_context(|| format!("opening save store {}", config.sync.data_dir))?;
    let transport = LocalTransport::new(world, store, game.game_id, slot.clone());

    let mut session = Session::new(&game, transport, LogEffects::default(), config.sync.options());
    session.connect().await?;
    info!("Playing slot {} (game id {})", slot, game.game_id);

    let mut ticker = tokio::time::interval(config.tick.period());
    let mut lines = BufReader::new(tokio::io::stdin()).lines();
    prompt();
    loop {
        tokio::select! {
            _ = ticker.tick() => {
                session.tick();
            }
            line = lines.next_line() => {
                let Some(line) = line? else { break };
                if !handle_command(&mut session, &game, line.trim()) {
                    break;
                }
                prompt();
            }
        }
    }

    session.capture_player();
    session.shutdown();
    let m = metrics::snapshot();
    info!(
        "Session summary: {} checks sent, {} items applied, {} traps triggered, {} flushes",
        m.checks_sent, m.items_applied, m.traps_triggered, m.flushes
    );
    Ok(())
}

fn prompt() {
    print!("> ");
    let _ = std::io::stdout().flush();
}

/// Returns false when the session should end.
fn handle_command(session: &mut LocalSession, game: &GameConfig, line: &str) -> bool {
    let mut parts = line.split_whitespace();
    let Some(cmd) = parts.next() else {
        return true;
    };
    match cmd.to_ascii_lowercase().as_str() {
        "check" => match parts.next().and_then(|s| s.parse::<i64>().ok()) {
            Some(raw) => {
                let loc = LocationId::from_raw(raw);
                if session.check_location(loc) {
                    println!("Checked {}", loc);
                } else if !session.is_location_used(loc) {
                    println!("Location {} is not in play", raw);
                } else {
                    println!("Location {} already checked", loc);
                }
            }
            None => println!("usage: check <location id>"),
        },
        "level" => match parts.next() {
            Some(name) => {
                session.capture_player();
                session.enter_level(name);
                println!("Entered {}", name);
            }
            None => println!("usage: level <name>"),
        },
        "tick" => {
            let n = parts.next().and_then(|s| s.parse::<u32>().ok()).unwrap_or(1);
            for _ in 0..n {
                session.tick();
            }
        }
        "status" => print_status(session, game),
        "quit" | "exit" => return false,
        other => warn!("unknown command '{}'", other),
    }
    true
}

fn print_status(session: &LocalSession, game: &GameConfig) {
    let locations = session.locations();
    let pools = session.pools();
    println!(
        "Level: {}",
        session.current_level().unwrap_or("(none)")
    );
    println!(
        "Locations: {}/{} checked",
        locations.checked_count(),
        locations.used_count()
    );
    println!(
        "Health {}/{}  Armor {}/{}",
        pools.health.current, pools.health.max, pools.armor.current, pools.armor.max
    );
    if !pools.weapons.is_empty() {
        let weapons: Vec<&str> = pools.weapons.iter().map(String::as_str).collect();
        println!("Weapons: {}", weapons.join(", "));
    }
    if !pools.keys.is_empty() {
        let keys: Vec<&str> = pools.keys.iter().map(String::as_str).collect();
        println!("Keys: {}", keys.join(", "));
    }
    let mut owned: Vec<(NetId, String)> = game
        .items
        .iter()
        .filter(|(id, _)| session.has_item(**id))
        .map(|(id, def)| (*id, def.name.clone()))
        .collect();
    owned.sort();
    for (id, name) in owned {
        println!("  {} x{} {}", id, session.owned_count(id), name);
    }
    println!("Queued: {}  Goal reached: {}", session.queue_len(), session.goal_reached());
}

fn init_logging(config: &Option<Config>, verbosity: u8) {
    use std::io::Write;
    let mut builder = env_logger::Builder::new();
    // CLI verbosity overrides the configured level
    let base_level = match verbosity {
        0 => config
            .as_ref()
            .and_then(|c| c.logging.level.parse().ok())
            .unwrap_or(log::LevelFilter::Info),
        1 => log::LevelFilter::Debug,
        _ => log::LevelFilter::Trace,
    };
    builder.filter_level(base_level);
    let file = config
        .as_ref()
        .and_then(|c| c.logging.file.clone())
        .and_then(|path| {
            std::fs::OpenOptions::new()
                .create(true)
                .append(true)
                .open(path)
                .ok()
        });
    if let Some(f) = file {
        let write_mutex = std::sync::Arc::new(std::sync::Mutex::new(f));
        // Only echo to the console when a terminal is attached
        let is_tty = atty::is(atty::Stream::Stdout);
        builder.format(move |fmt, record| {
            let ts = chrono::Utc::now().format("%Y-%m-%dT%H:%M:%SZ");
            let line = format!("{} [{}] {}", ts, record.level(), record.args());
            if let Ok(mut guard) = write_mutex.lock() {
                let _ = writeln!(guard, "{}", line);
            }
            if is_tty {
                writeln!(fmt, "{}", line)
            } else {
                Ok(())
            }
        });
    } else {
        builder.format(|fmt, record| {
            let ts = chrono::Utc::now().format("%Y-%m-%dT%H:%M:%SZ");
            writeln!(fmt, "{} [{}] {}", ts, record.level(), record.args())
        });
    }
    let _ = builder.try_init();
}
