//! Integration tests for igo-rust: SGF, compact and readable encodings.

use igo_rust::board::{Color, Intersection, Pos};
use igo_rust::error::{DecodeError, SgfError};
use igo_rust::format::ExportOptions;
use igo_rust::game::Game;

// =============================================================================
// Helper functions
// =============================================================================

/// Play up to `moves` random legal stones. Passes only when nothing is legal.
fn play_stones(game: &mut Game, rng: &mut fastrand::Rng, moves: usize) {
    for _ in 0..moves {
        if game.is_finished() {
            break;
        }
        let turn = game.turn();
        let board = game.board();
        let candidates: Vec<Pos> = (0..board.len()).filter(|&p| board.is_move_legal(p, turn)).collect();
        if candidates.is_empty() {
            game.pass();
        } else {
            game.put_stone(candidates[rng.usize(..candidates.len())]);
        }
    }
}

/// A game with a side line, a free edit and a few comments, rewound to the
/// start.
fn branched_game(size: usize, seed: u64) -> Game {
    let mut rng = fastrand::Rng::with_seed(seed);
    let mut game = Game::new(size, size);
    play_stones(&mut game, &mut rng, 30);
    game.set_comment("main line");
    for _ in 0..10 {
        game.undo();
    }
    play_stones(&mut game, &mut rng, 6);
    game.set_comment("side [line]\\");

    // Lift a stone off the board as a recorded edit.
    let board = game.board();
    if let Some(pos) = (0..board.len()).find(|&p| board.get(p) != Intersection::Empty) {
        game.edit_intersection(pos, Intersection::Empty);
    }
    play_stones(&mut game, &mut rng, 4);
    game.undo_all();
    game
}

fn assert_same_stones(a: &Game, b: &Game) {
    assert_eq!(a.board().len(), b.board().len());
    for pos in 0..a.board().len() {
        assert_eq!(a.board().get(pos), b.board().get(pos), "intersection {pos}");
    }
    assert_eq!(a.turn(), b.turn());
}

// =============================================================================
// SGF
// =============================================================================

#[test]
fn test_sgf_round_trip_with_branches() {
    let game = branched_game(9, 5);
    let opts = ExportOptions::default();
    let sgf = game.to_sgf(&opts);
    assert!(sgf.contains("C[side [line\\]\\\\]"), "{sgf}");

    let mut imported = Game::from_sgf(&sgf).unwrap();
    assert_eq!(imported.to_sgf(&opts), sgf);

    let mut original = game.clone();
    original.redo_all();
    imported.redo_all();
    assert_same_stones(&original, &imported);
    assert_eq!(imported.comment(), original.comment());
}

#[test]
fn test_sgf_import_redoes_last_variation() {
    let mut game = Game::from_sgf("(;GM[1]SZ[9]GN[demo];B[ee](;W[dd];B[cc])(;W[ff]C[second]))").unwrap();
    assert_eq!(game.move_number(), 0);

    // The variation read last is the default redo target.
    game.redo_all();
    assert_eq!(game.move_number(), 2);
    assert_eq!(game.comment(), Some("second"));
    assert_eq!(game.board().get(5 + 5 * 9), Intersection::White);

    game.undo();
    let branches = game.next_nodes().to_vec();
    assert_eq!(branches.len(), 2);
    assert!(game.redo_to(branches[0]));
    assert!(game.redo());
    assert_eq!(game.move_number(), 3);
    assert_eq!(game.board().get(2 + 2 * 9), Intersection::Black);
    assert_eq!(game.board().get(5 + 5 * 9), Intersection::Empty);
}

/// Export, import the text, export again and require the same text.
fn assert_sgf_stable(game: &Game) -> String {
    let opts = ExportOptions::default();
    let sgf = game.to_sgf(&opts);
    let imported = Game::from_sgf(&sgf).unwrap_or_else(|err| panic!("{sgf}: {err}"));
    assert_eq!(imported.to_sgf(&opts), sgf);
    sgf
}

#[test]
fn test_sgf_resign_comment_survives_re_import() {
    // Resignation in a side branch.
    let mut game = Game::new(9, 9);
    game.put_stone(0);
    game.undo();
    game.resign();
    game.set_comment("gg");
    game.undo();
    assert_eq!(assert_sgf_stable(&game), "(;GM[1]SZ[9](;B[aa])(;C[gg]))");

    // Resignation at the end of the main line keeps its comment off the
    // last move.
    let mut game = Game::new(9, 9);
    game.put_stone(0);
    game.set_comment("opening");
    game.resign();
    game.set_comment("gg");
    assert_eq!(assert_sgf_stable(&game), "(;GM[1]SZ[9];B[aa]C[opening];C[gg])");

    let mut imported = Game::from_sgf(&game.to_sgf(&ExportOptions::default())).unwrap();
    assert!(imported.redo());
    assert_eq!(imported.comment(), Some("opening"));
    assert!(imported.redo());
    assert_eq!(imported.comment(), Some("gg"));
}

#[test]
fn test_sgf_variations_with_different_first_colors() {
    let mut imported = Game::from_sgf("(;GM[1]SZ[9](;B[aa])(;W[bb]))").unwrap();
    assert_eq!(assert_sgf_stable(&imported), "(;GM[1]SZ[9](;B[aa])(;PL[W];W[bb]))");

    let branches = imported.next_nodes().to_vec();
    assert!(imported.redo_to(branches[0]));
    assert_eq!(imported.board().get(0), Intersection::Black);
    imported.undo();
    assert!(imported.redo_to(branches[1]));
    imported.redo_all();
    assert_eq!(imported.board().get(10), Intersection::White);
    assert_eq!(imported.board().get(0), Intersection::Empty);

    // The same tree built through edits exports identically.
    let mut game = Game::new(9, 9);
    game.put_stone(0);
    game.undo();
    game.edit_turn(Color::White);
    game.put_stone(10);
    game.undo_all();
    assert_eq!(assert_sgf_stable(&game), "(;GM[1]SZ[9](;B[aa])(;PL[W];W[bb]))");
}

#[test]
fn test_sgf_errors() {
    assert!(matches!(Game::from_sgf("(;GM[1]"), Err(SgfError::Syntax { .. })));
    assert!(matches!(Game::from_sgf(""), Err(SgfError::Syntax { .. })));
    assert!(matches!(Game::from_sgf("(;GM[4])"), Err(SgfError::UnsupportedGame(_))));
    assert!(matches!(
        Game::from_sgf("(;SZ[5];B[cc];W[cc])"),
        Err(SgfError::IllegalMove { .. })
    ));
}

// =============================================================================
// Compact Code
// =============================================================================

#[test]
fn test_base64_round_trip_on_standard_sizes() {
    let opts = ExportOptions::default();
    for (size, seed) in [(9, 1), (13, 2), (19, 3)] {
        let game = branched_game(size, seed);
        let code = game.to_base64(&opts);
        assert!(
            code.chars().all(|c| c.is_ascii_alphanumeric() || "-_.".contains(c)),
            "{code}"
        );

        let decoded = Game::from_base64(&code, size, size).unwrap();
        assert_eq!(decoded.to_base64(&opts), code, "{size}x{size}");

        // Comments are not part of the code, everything else survives.
        let strip = |sgf: String| {
            sgf.replace("C[main line]", "")
                .replace("C[side [line\\]\\\\]", "")
        };
        assert_eq!(strip(decoded.to_sgf(&opts)), strip(game.to_sgf(&opts)));
    }
}

#[test]
fn test_base64_from_current_node() {
    let mut game = branched_game(13, 9);
    for _ in 0..12 {
        game.redo();
    }
    let opts = ExportOptions {
        from_current_node: true,
        to_current_node: true,
    };
    let code = game.to_base64(&opts);
    let decoded = Game::from_base64(&code, 13, 13).unwrap();
    assert_eq!(decoded.move_number(), 0);
    assert!(decoded.next_nodes().is_empty());
    assert_same_stones(&game, &decoded);

    let sgf = game.to_sgf(&opts);
    assert_same_stones(&game, &Game::from_sgf(&sgf).unwrap());
}

#[test]
fn test_base64_to_current_node_keeps_one_line() {
    let mut game = branched_game(9, 4);
    game.redo_all();
    let opts = ExportOptions {
        to_current_node: true,
        ..Default::default()
    };
    let mut decoded = Game::from_base64(&game.to_base64(&opts), 9, 9).unwrap();
    decoded.redo_all();
    assert_eq!(decoded.move_number(), game.move_number());
    assert_same_stones(&game, &decoded);
    while decoded.undo() {
        assert!(decoded.next_nodes().len() <= 1);
    }
}

#[test]
fn test_white_to_play_survives() {
    let mut game = Game::new(9, 9);
    game.edit_intersection(40, Intersection::Black);
    game.edit_turn(Color::White);
    game.put_stone(41);
    game.undo_all();

    let code = game.to_base64(&ExportOptions::default());
    let mut decoded = Game::from_base64(&code, 9, 9).unwrap();
    assert_eq!(decoded.turn(), Color::White);
    decoded.redo();
    assert_eq!(decoded.board().get(41), Intersection::White);
}

#[test]
fn test_base64_errors() {
    let mut game = Game::new(9, 9);
    for pos in [10, 20, 30, 40, 50, 60] {
        game.put_stone(pos);
    }
    let code = game.to_base64(&ExportOptions::default());
    assert!(code.len() > 4);
    assert_eq!(
        Game::from_base64(&code[..4], 9, 9).err(),
        Some(DecodeError::UnexpectedEnd)
    );
    assert!(matches!(
        Game::from_base64("a!b?", 9, 9),
        Err(DecodeError::Base64(_))
    ));
    assert_eq!(
        Game::from_base64(&code, 53, 9).err(),
        Some(DecodeError::BoardSize { width: 53, height: 9 })
    );
}

// =============================================================================
// Readable Form
// =============================================================================

#[test]
fn test_readable_round_trip() {
    let game = branched_game(9, 8);
    let opts = ExportOptions::default();
    let text = game.to_readable(&opts);
    let decoded = Game::from_readable(&text, 9, 9).unwrap();
    assert_eq!(decoded.to_readable(&opts), text);
    assert_eq!(decoded.to_base64(&opts), game.to_base64(&opts));
}

#[test]
fn test_readable_resign() {
    let mut game = Game::from_readable("_ee-R.", 9, 9).unwrap();
    game.redo_all();
    assert!(game.is_finished());
    assert_eq!(game.winner(), Some(Color::Black));
}
