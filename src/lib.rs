//! Igo-Rust: rules, history and record formats for the game of Go.
//!
//! The crate keeps a board with full capture, suicide and ko rules, a
//! branching move history with undo/redo, and two ways to save a game tree:
//! SGF text and a compact bit-packed form that fits in a URL.
//!
//! ## Modules
//!
//! - [`constants`] - Board size limits and compact-format command numbers
//! - [`packed`] - 2-bit intersection storage
//! - [`board`] - Board state and the rule engine
//! - [`diff`] - Board change sets (setup properties, free edits)
//! - [`history`] - The move tree with undo/redo and queries
//! - [`game`] - Board and history driven together
//! - [`format`] - Tree walker shared by the writers
//! - [`sgf`] - SGF parser, importer and writer
//! - [`compact`] - URL-safe base64 tree encoding and its readable form
//! - [`error`] - Error types
//!
//! ## Example
//!
//! ```
//! use igo_rust::format::ExportOptions;
//! use igo_rust::game::Game;
//!
//! let mut game = Game::new(9, 9);
//! assert!(game.put_stone(40));
//! assert!(game.pass());
//!
//! let sgf = game.to_sgf(&ExportOptions::default());
//! assert_eq!(sgf, "(;GM[1]SZ[9];B[ee];W[])");
//!
//! let code = game.to_base64(&ExportOptions::default());
//! let copy = igo_rust::game::Game::from_base64(&code, 9, 9).unwrap();
//! assert_eq!(copy.to_sgf(&ExportOptions::default()), sgf);
//! ```

pub mod board;
pub mod compact;
pub mod constants;
pub mod diff;
pub mod error;
pub mod format;
pub mod game;
pub mod history;
pub mod packed;
pub mod sgf;
