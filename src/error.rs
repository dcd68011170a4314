//! Error types for move legality and the two codecs.

use crate::board::Pos;

/// Why a move was rejected.
#[derive(Debug, Clone, PartialEq, Eq, thiserror::Error)]
pub enum MoveError {
    #[error("Illegal move: point is off the board")]
    OffBoard,

    #[error("Illegal move: not this color's turn")]
    NotYourTurn,

    #[error("Illegal move: point not EMPTY")]
    Occupied,

    #[error("Illegal move: suicide")]
    Suicide,

    #[error("Illegal move: retakes ko")]
    Ko,

    #[error("Illegal move: game is finished")]
    GameFinished,
}

/// Errors raised while reading SGF text.
#[derive(Debug, Clone, PartialEq, Eq, thiserror::Error)]
pub enum SgfError {
    #[error("SGF syntax error at {offset}: {message}")]
    Syntax { offset: usize, message: String },

    #[error("unsupported SGF: not GM[1] (got GM[{0}])")]
    UnsupportedGame(String),

    #[error("invalid board size {0:?}")]
    InvalidBoardSize(String),

    #[error("invalid point {0:?}")]
    InvalidPoint(String),

    #[error("point {value:?} is outside the {width}x{height} board")]
    OutOfBoard {
        value: String,
        width: usize,
        height: usize,
    },

    #[error("too many colons in composed value {0:?}")]
    TooManyColons(String),

    #[error("invalid color {0:?}")]
    InvalidColor(String),

    #[error("SGF includes an illegal move at {value:?}: {source}")]
    IllegalMove {
        value: String,
        #[source]
        source: MoveError,
    },

    #[error("unexpected player change {0}")]
    UnexpectedPlayer(String),

    #[error("moved twice in a node")]
    MovedTwice,

    #[error("cannot mix move properties and setup properties in a node")]
    MixedMoveAndSetup,
}

/// Errors raised while decoding the compact or readable tree encodings.
#[derive(Debug, Clone, PartialEq, Eq, thiserror::Error)]
pub enum DecodeError {
    #[error("invalid base64: {0}")]
    Base64(#[from] base64::DecodeError),

    #[error("board size {width}x{height} is out of range")]
    BoardSize { width: usize, height: usize },

    #[error("stream ended unexpectedly")]
    UnexpectedEnd,

    #[error("illegal move at {pos}: {source}")]
    IllegalMove {
        pos: Pos,
        #[source]
        source: MoveError,
    },

    #[error("{0} after the game has finished")]
    GameFinished(&'static str),

    #[error("unknown command {0}")]
    UnknownCommand(usize),

    #[error("unknown subcommand {0}")]
    UnknownSubcommand(u32),

    #[error("setup point {0} is outside the board")]
    SetupOutOfBoard(usize),

    #[error("unexpected character {ch:?} at {offset}")]
    UnexpectedChar { ch: char, offset: usize },

    #[error("invalid point: {0}")]
    Point(#[from] SgfError),
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_move_error_display() {
        assert_eq!(MoveError::Ko.to_string(), "Illegal move: retakes ko");
        assert_eq!(MoveError::Suicide.to_string(), "Illegal move: suicide");
    }

    #[test]
    fn test_sgf_error_display() {
        let err = SgfError::Syntax {
            offset: 12,
            message: "expected )".to_string(),
        };
        assert_eq!(err.to_string(), "SGF syntax error at 12: expected )");

        let err = SgfError::IllegalMove {
            value: "dd".to_string(),
            source: MoveError::Occupied,
        };
        assert_eq!(
            err.to_string(),
            "SGF includes an illegal move at \"dd\": Illegal move: point not EMPTY"
        );
    }

    #[test]
    fn test_decode_error_display() {
        assert_eq!(
            DecodeError::BoardSize {
                width: 0,
                height: 9
            }
            .to_string(),
            "board size 0x9 is out of range"
        );
        assert_eq!(
            DecodeError::GameFinished("pass").to_string(),
            "pass after the game has finished"
        );

        let err = DecodeError::IllegalMove {
            pos: 40,
            source: MoveError::Suicide,
        };
        assert_eq!(err.to_string(), "illegal move at 40: Illegal move: suicide");
        assert_eq!(
            std::error::Error::source(&err).map(ToString::to_string),
            Some("Illegal move: suicide".to_string())
        );
    }
}
