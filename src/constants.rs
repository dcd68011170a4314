//! Constants for board limits and the compact tree encoding.
//!
//! Board dimensions are chosen at runtime; this module only fixes the range
//! the codecs can represent and the command numbers of the bit-packed format.

// =============================================================================
// Board Geometry
// =============================================================================

/// Board side used when a record does not say otherwise.
pub const DEFAULT_BOARD_SIZE: usize = 19;

/// Largest board side. SGF coordinates use a 52-letter alphabet.
pub const MAX_BOARD_SIZE: usize = 52;

/// Largest board side on which the SGF point `tt` still means pass.
pub const TT_PASS_MAX_SIZE: usize = 19;

// =============================================================================
// Compact Encoding Commands
// =============================================================================
//
// Tokens below the board size are placements. The commands follow directly
// after the last intersection index.

/// Pass move.
pub const CMD_PASS: usize = 0;

/// Start of a variation.
pub const CMD_BEGIN_BRANCH: usize = 1;

/// End of a variation (or of the whole tree when no variation is open).
pub const CMD_END_BRANCH: usize = 2;

/// Escape to a subcommand.
pub const CMD_SPECIAL: usize = 3;

/// Number of commands; the token width must cover `size + CMD_COUNT - 1`.
pub const CMD_COUNT: usize = 4;

/// Subcommand: resignation.
pub const SUBCMD_RESIGN: u32 = 1;

/// Subcommand: setup properties follow.
pub const SUBCMD_SETUP: u32 = 2;

/// Width of a subcommand in bits.
pub const SUBCMD_BITS: u32 = 6;
