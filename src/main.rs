use std::path::PathBuf;
use std::time::Instant;

use clap::{ArgAction, Parser, Subcommand};
use color_eyre::eyre::eyre;
use itertools::Itertools;
use tracing_subscriber::EnvFilter;

use magic_chess::board::{Board, STARTING_POSITION_FEN};
use magic_chess::config::EngineConfig;
use magic_chess::engine::Engine;
use magic_chess::game::Game;
use magic_chess::movegen::generate_moves;
use magic_chess::perft::{divide, perft};

#[derive(Parser, Debug)]
#[command(name = "magic_chess")]
#[command(about = "Bitboard chess engine: perft, move listing, best move search and self-play")]
struct Cli {
    /// Engine settings as JSON; missing keys keep their defaults
    #[arg(long, global = true)]
    config: Option<PathBuf>,

    /// More logging (-v info, -vv debug); RUST_LOG overrides
    #[arg(short, long, action = ArgAction::Count, global = true)]
    verbose: u8,

    #[command(subcommand)]
    command: Command,
}

#[derive(Subcommand, Debug)]
enum Command {
    /// Count leaf nodes of the legal move tree
    Perft {
        depth: u8,
        #[arg(long, default_value = STARTING_POSITION_FEN)]
        fen: String,
    },
    /// Perft split by root move
    Divide {
        depth: u8,
        #[arg(long, default_value = STARTING_POSITION_FEN)]
        fen: String,
    },
    /// List the legal moves
    Moves {
        #[arg(long, default_value = STARTING_POSITION_FEN)]
        fen: String,
    },
    /// Pick a move for the side to move
    Bestmove {
        #[arg(long, default_value = STARTING_POSITION_FEN)]
        fen: String,
        /// Time budget in milliseconds
        #[arg(long)]
        time_ms: Option<u64>,
        /// Search exactly this deep, ignoring the clock
        #[arg(long)]
        depth: Option<u8>,
        /// Skip the opening book
        #[arg(long)]
        no_book: bool,
    },
    /// Let the engine play itself and print the game as PGN
    Play {
        /// Full moves to play at most
        #[arg(long, default_value_t = 40)]
        moves: u32,
        #[arg(long)]
        time_ms: Option<u64>,
        #[arg(long, default_value = STARTING_POSITION_FEN)]
        fen: String,
    },
}

fn init_logging(verbose: u8) {
    let default_level = match verbose {
        0 => "warn",
        1 => "info",
        _ => "debug",
    };
    let filter =
        EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new(default_level));
    tracing_subscriber::fmt()
        .with_env_filter(filter)
        .with_writer(std::io::stderr)
        .init();
}

fn main() -> color_eyre::Result<()> {
    color_eyre::install()?;
    let cli = Cli::parse();
    init_logging(cli.verbose);

    let mut config = match &cli.config {
        Some(path) => EngineConfig::from_json_file(path)?,
        None => EngineConfig::default(),
    };

    match cli.command {
        Command::Perft { depth, fen } => {
            let board = Board::from_fen(&fen)?;
            let now = Instant::now();
            let nodes = perft(&board, depth);
            let elapsed = now.elapsed().as_secs_f64();
            println!("{nodes}");
            tracing::info!(
                nodes,
                seconds = elapsed,
                nps = (nodes as f64 / elapsed.max(1e-9)) as u64,
                "perft done"
            );
        }
        Command::Divide { depth, fen } => {
            let board = Board::from_fen(&fen)?;
            let split = divide(&board, depth);
            for (mv, nodes) in &split {
                println!("{mv}: {nodes}");
            }
            println!();
            println!("Nodes searched: {}", split.iter().map(|(_, n)| n).sum::<u64>());
        }
        Command::Moves { fen } => {
            let board = Board::from_fen(&fen)?;
            let moves = generate_moves(&board);
            println!("{}", moves.iter().map(|m| m.to_uci()).sorted().join(" "));
        }
        Command::Bestmove {
            fen,
            time_ms,
            depth,
            no_book,
        } => {
            let board = Board::from_fen(&fen)?;
            if let Some(ms) = time_ms {
                config.time_ms = ms;
            }
            if no_book {
                config.use_book = false;
            }
            let mut engine = Engine::new(config);
            let result = match depth {
                Some(depth) => engine.search_depth(&board, depth),
                None => engine.pick_move(&board),
            };
            match result {
                Some(result) => {
                    println!("{}", result.info_line());
                    println!("bestmove {}", result.best_move);
                }
                None => println!("bestmove (none)"),
            }
        }
        Command::Play { moves, time_ms, fen } => {
            if let Some(ms) = time_ms {
                config.time_ms = ms;
            }
            if moves == 0 {
                return Err(eyre!("--moves must be at least 1"));
            }
            let mut engine = Engine::new(config);
            let mut game = Game::from_fen(&fen)?;
            let status = game.play(&mut engine, moves);
            game.board().draw_to_terminal();
            println!("{status}");
            println!();
            print!("{}", game.to_pgn());
        }
    }
    Ok(())
}
