//! Igo-Rust command line.
//!
//! ## Usage
//!
//! - `igo-rust demo` - Play a random game and print it in every format
//! - `igo-rust to-base64 game.sgf` - Convert an SGF file to the compact form
//! - `igo-rust to-sgf <code> --width 19 --height 19` - Convert back to SGF
//! - `igo-rust show game.sgf` - Print the board at the end of the main line

use std::fs;
use std::path::{Path, PathBuf};

use anyhow::{Context, Result};
use clap::{Parser, Subcommand};
use tracing::{debug, info};
use tracing_subscriber::EnvFilter;

use igo_rust::board::Color;
use igo_rust::constants::DEFAULT_BOARD_SIZE;
use igo_rust::format::ExportOptions;
use igo_rust::game::Game;

/// Igo-Rust: Go rules, game trees and record formats
#[derive(Parser)]
#[command(name = "igo-rust")]
#[command(author, version, about, long_about = None)]
struct Cli {
    /// More log output (-v debug, -vv trace). RUST_LOG overrides this.
    #[arg(short, long, global = true, action = clap::ArgAction::Count)]
    verbose: u8,

    #[command(subcommand)]
    command: Option<Commands>,
}

#[derive(Subcommand)]
enum Commands {
    /// Play a random game and print the board, SGF and compact code
    Demo {
        /// Board side
        #[arg(long, default_value_t = 9)]
        size: usize,
        /// Seed for reproducible games
        #[arg(long)]
        seed: Option<u64>,
        /// Maximum number of moves
        #[arg(long, default_value_t = 60)]
        moves: usize,
    },
    /// Convert an SGF file to the URL-safe compact code
    ToBase64 {
        file: PathBuf,
        /// Encode only the current position and the line leading to it
        #[arg(long)]
        current: bool,
    },
    /// Convert a compact code to SGF
    ToSgf {
        code: String,
        #[arg(long, default_value_t = DEFAULT_BOARD_SIZE)]
        width: usize,
        #[arg(long, default_value_t = DEFAULT_BOARD_SIZE)]
        height: usize,
    },
    /// Print the board of an SGF file
    Show {
        file: PathBuf,
        /// Navigation tokens, e.g. "30" or "_ B 2" (default: end of the first line)
        #[arg(long)]
        query: Option<String>,
    },
}

fn main() -> Result<()> {
    let cli = Cli::parse();
    init_logging(cli.verbose);

    match cli.command {
        Some(Commands::ToBase64 { file, current }) => {
            let game = load_sgf(&file)?;
            let opts = ExportOptions {
                to_current_node: current,
                ..Default::default()
            };
            println!("{}", game.to_base64(&opts));
        }
        Some(Commands::ToSgf { code, width, height }) => {
            let game = Game::from_base64(code.trim(), width, height)
                .with_context(|| format!("failed to decode {width}x{height} game code"))?;
            println!("{}", game.to_sgf(&ExportOptions::default()));
        }
        Some(Commands::Show { file, query }) => {
            let mut game = load_sgf(&file)?;
            match query {
                Some(query) => {
                    game.redo_by_query_text(&query);
                }
                None => {
                    while let Some(&next) = game.next_nodes().first() {
                        if !game.redo_to(next) {
                            break;
                        }
                    }
                }
            }
            print_position(&game);
        }
        Some(Commands::Demo { size, seed, moves }) => run_demo(size, seed, moves)?,
        None => run_demo(9, None, 60)?,
    }
    Ok(())
}

fn init_logging(verbose: u8) {
    let level = match verbose {
        0 => "warn",
        1 => "debug",
        _ => "trace",
    };
    let filter = EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new(level));
    tracing_subscriber::fmt()
        .with_env_filter(filter)
        .with_writer(std::io::stderr)
        .init();
}

fn load_sgf(path: &Path) -> Result<Game> {
    let text = fs::read_to_string(path).with_context(|| format!("failed to read {}", path.display()))?;
    let game = Game::from_sgf(&text).with_context(|| format!("failed to import {}", path.display()))?;
    debug!(path = %path.display(), "loaded SGF");
    Ok(game)
}

fn print_position(game: &Game) {
    println!("{}", game.board());
    println!(
        "Move {}  {:?} to play  captured: black {} white {}",
        game.move_number(),
        game.turn(),
        game.prisoners(Color::Black),
        game.prisoners(Color::White)
    );
    if let Some(comment) = game.comment() {
        println!("{comment}");
    }
    if game.is_finished() {
        match game.winner() {
            Some(color) => println!("{color:?} wins"),
            None => println!("Game over"),
        }
    }
}

/// Random legal moves until both sides pass or the move limit is reached.
fn run_demo(size: usize, seed: Option<u64>, moves: usize) -> Result<()> {
    anyhow::ensure!(
        (1..=igo_rust::constants::MAX_BOARD_SIZE).contains(&size),
        "board size must be between 1 and {}",
        igo_rust::constants::MAX_BOARD_SIZE
    );
    let mut rng = match seed {
        Some(seed) => fastrand::Rng::with_seed(seed),
        None => fastrand::Rng::new(),
    };
    info!(size, ?seed, moves, "playing random game");

    let mut game = Game::new(size, size);
    while !game.is_finished() && game.move_number() < moves {
        let turn = game.turn();
        let board = game.board();
        let candidates: Vec<usize> = (0..board.len())
            .filter(|&pos| board.is_move_legal(pos, turn))
            .collect();
        if candidates.is_empty() {
            game.pass();
        } else {
            let pos = candidates[rng.usize(..candidates.len())];
            game.put_stone(pos);
        }
    }

    println!("Igo-Rust: random game on {size}x{size}\n");
    print_position(&game);

    let opts = ExportOptions::default();
    let sgf = game.to_sgf(&opts);
    let code = game.to_base64(&opts);
    println!("\nSGF:\n{sgf}");
    println!("\nCode:\n{code}");

    let decoded = Game::from_base64(&code, size, size).context("demo code did not decode")?;
    anyhow::ensure!(decoded.to_sgf(&opts) == sgf, "demo code did not round-trip");
    Ok(())
}
