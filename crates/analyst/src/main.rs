//! Analyst - judges chess moves with a UCI engine.
//!
//! Reads commands from stdin:
//!
//! ```text
//! new                  start a game
//! move <id> <uci>      play a move (e2e4, e7e8q) and analyse it
//! load <id> <pgn>      replace a game with a PGN and analyse its last move
//! show                 print every game
//! sync                 publish every game to peers
//! quit
//! ```

use analyst::{Analyst, AnalystConfig, MoveReport, PlaySettings, ProcessTransport};
use anyhow::Context;
use chess_analysis::Correlator;
use chess_game::HalfMove;
use clap::Parser;
use game_sync::{GameId, GameRegistry, Room};
use std::path::PathBuf;
use std::sync::Arc;
use tokio::io::{AsyncBufReadExt, BufReader};
use tracing_subscriber::EnvFilter;

/// Analyst - judges chess moves with a UCI engine.
#[derive(Parser)]
#[command(name = "analyst")]
#[command(about = "Judges chess moves with a UCI engine")]
struct Args {
    /// Path to the configuration file (default: analyst.toml, searched upwards)
    #[arg(long)]
    config: Option<PathBuf>,

    /// Engine command, overriding the configuration
    #[arg(long)]
    engine: Option<String>,

    /// Keep an engine-less peer in sync and include it in `show`
    #[arg(long)]
    mirror: bool,
}

#[derive(Debug, PartialEq)]
enum Command {
    New,
    Move(GameId, HalfMove),
    Load(GameId, String),
    Show,
    Sync,
    Quit,
}

fn parse_command(line: &str) -> Result<Command, String> {
    let line = line.trim();
    let (word, rest) = line.split_once(char::is_whitespace).unwrap_or((line, ""));
    let rest = rest.trim();

    let game_id = |text: &str| -> Result<GameId, String> {
        text.parse()
            .map_err(|_| format!("'{}' is not a game id", text))
    };

    match word {
        "new" => Ok(Command::New),
        "show" => Ok(Command::Show),
        "sync" => Ok(Command::Sync),
        "quit" | "exit" => Ok(Command::Quit),
        "move" => {
            let mut parts = rest.split_whitespace();
            match (parts.next(), parts.next(), parts.next()) {
                (Some(id), Some(mv), None) => Ok(Command::Move(
                    game_id(id)?,
                    mv.parse::<HalfMove>().map_err(|e| e.to_string())?,
                )),
                _ => Err("usage: move <id> <uci>".to_string()),
            }
        }
        "load" => match rest.split_once(char::is_whitespace) {
            Some((id, pgn)) => Ok(Command::Load(game_id(id)?, pgn.trim().to_string())),
            None => Err("usage: load <id> <pgn>".to_string()),
        },
        other => Err(format!("unknown command '{}'", other)),
    }
}

fn print_report(report: &MoveReport) {
    println!("game {}: {}", report.game_id, report.played.san);
    if report.interrupted {
        println!("  (previous analysis interrupted)");
    }
    match (&report.best.best_move, report.best.score) {
        (Some(mv), Some(score)) => println!("  engine prefers {} ({})", mv, score),
        (Some(mv), None) => println!("  engine prefers {}", mv),
        (None, _) => println!("  no legal moves"),
    }
    match &report.verdict {
        Some(verdict) => println!("  {}", verdict),
        None if report.best.interrupted || report.actual.interrupted => {
            println!("  (analysis cut short, no verdict)")
        }
        None => {}
    }
    if let Some(branch) = report.branch {
        println!("  retry the position in game {}", branch);
    }
}

fn print_games(label: &str, registry: &GameRegistry) {
    for game in registry.snapshot() {
        let pgn = if game.pgn.is_empty() {
            "(no moves)"
        } else {
            game.pgn.as_str()
        };
        println!("{}[{}] {}", label, game.id, pgn);
    }
}

/// Runs one command. Returns false on `quit`.
async fn run_command(
    analyst: &Analyst,
    mirror: Option<&GameRegistry>,
    command: Command,
) -> anyhow::Result<bool> {
    match command {
        Command::New => println!("game {} ready", analyst.new_game()),
        Command::Move(game_id, mv) => {
            let mut next = Some(mv);
            while let Some(mv) = next {
                let report = analyst.submit_move(game_id, mv).await?;
                print_report(&report);
                next = report.forced_reply;
                if let Some(reply) = next {
                    println!("  forced reply {}", reply);
                }
            }
        }
        Command::Load(game_id, pgn) => match analyst.load_pgn(game_id, &pgn).await? {
            Some(report) => print_report(&report),
            None => println!("game {} loaded without moves", game_id),
        },
        Command::Show => {
            print_games("", analyst.registry());
            if let Some(mirror) = mirror {
                print_games("mirror ", mirror);
            }
        }
        Command::Sync => analyst.announce(),
        Command::Quit => return Ok(false),
    }
    Ok(true)
}

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    tracing_subscriber::fmt()
        .with_env_filter(
            EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new("info")),
        )
        .with_writer(std::io::stderr)
        .init();
    let args = Args::parse();

    let mut config = AnalystConfig::load(args.config.as_deref()).await?;
    if let Some(engine) = args.engine {
        config.engine.command = engine;
    }

    let engine = ProcessTransport::spawn(&config.engine.command)?;
    engine
        .session()
        .initialize(config.engine.handshake_timeout())
        .await
        .context("engine handshake failed")?;

    let correlator = Arc::new(Correlator::new(
        engine.session().clone(),
        config.engine.limits(),
    ));
    let settings = PlaySettings {
        branch_on_blunder: config.play.branch_on_blunder,
        follow_mate_lines: config.play.follow_mate_lines,
        promotion: config.play.promotion()?,
    };

    let room = Room::new(config.sync.room_capacity);
    let member = room.join();
    let analyst = Arc::new(
        Analyst::new(Arc::new(GameRegistry::new()), correlator, settings)
            .with_peers(member.publisher()),
    );
    tokio::spawn(analyst.clone().listen(member));

    let mirror = if args.mirror {
        let registry = Arc::new(GameRegistry::new());
        let mut peer = room.join();
        let mirror_registry = registry.clone();
        tokio::spawn(async move {
            while let Some(event) = peer.recv().await {
                if let Err(e) = mirror_registry.apply_event(&event) {
                    tracing::warn!("Mirror ignored {} event: {}", event.name(), e);
                }
            }
        });
        tracing::info!("Mirroring games into a second peer");
        Some(registry)
    } else {
        None
    };

    println!("game {} ready", analyst.new_game());

    let mut lines = BufReader::new(tokio::io::stdin()).lines();
    while let Some(line) = lines.next_line().await? {
        if line.trim().is_empty() {
            continue;
        }
        let command = match parse_command(&line) {
            Ok(command) => command,
            Err(e) => {
                println!("{}", e);
                continue;
            }
        };
        match run_command(&analyst, mirror.as_deref(), command).await {
            Ok(true) => {}
            Ok(false) => break,
            Err(e) => println!("error: {:#}", e),
        }
    }

    engine.stop().await;
    Ok(())
}
