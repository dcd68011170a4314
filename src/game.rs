//! A board and its history, driven together.
//!
//! [`Game`] is the entry point for callers: every move goes through the
//! history tree so it can be undone, and free edits are recorded as setup
//! diffs. It also keeps the finished/winner state that passes and
//! resignations produce.

use crate::board::{Board, BoardUndo, Color, Intersection, Pos};
use crate::compact;
use crate::diff::BoardDiff;
use crate::error::{DecodeError, MoveError, SgfError};
use crate::format::ExportOptions;
use crate::history::{HistoryNode, HistoryTree, Move, NodeId, Query};
use crate::sgf;

/// Whether the game has ended, and who won.
#[derive(Copy, Clone, Debug, Default, PartialEq, Eq)]
pub struct Outcome {
    finished: bool,
    winner: Option<Color>,
}

impl Outcome {
    pub fn is_finished(&self) -> bool {
        self.finished
    }

    /// `None` while the game is running, and for a game ended by passes.
    pub fn winner(&self) -> Option<Color> {
        self.winner
    }

    pub fn set_finished(&mut self, winner: Option<Color>) {
        self.finished = true;
        self.winner = winner;
    }

    pub fn cancel_finish(&mut self) {
        self.finished = false;
        self.winner = None;
    }
}

#[derive(Clone, Debug)]
pub struct Game {
    board: Board,
    history: HistoryTree,
    outcome: Outcome,
}

impl Game {
    pub fn new(w: usize, h: usize) -> Self {
        Self {
            board: Board::new(w, h),
            history: HistoryTree::new(),
            outcome: Outcome::default(),
        }
    }

    pub fn board(&self) -> &Board {
        &self.board
    }

    /// Mutable board access, for registering observers.
    ///
    /// Writes made through this reference bypass the history; use
    /// [`Game::edit_intersection`] for recorded edits.
    pub fn board_mut(&mut self) -> &mut Board {
        &mut self.board
    }

    pub fn history(&self) -> &HistoryTree {
        &self.history
    }

    pub fn outcome(&self) -> Outcome {
        self.outcome
    }

    pub fn is_finished(&self) -> bool {
        self.outcome.is_finished()
    }

    pub fn winner(&self) -> Option<Color> {
        self.outcome.winner()
    }

    pub fn turn(&self) -> Color {
        self.board.turn()
    }

    pub fn prisoners(&self, color: Color) -> u32 {
        self.board.prisoners(color)
    }

    pub fn move_number(&self) -> usize {
        self.history.move_number()
    }

    pub fn current_node_id(&self) -> NodeId {
        self.history.current()
    }

    pub fn current_node(&self) -> &HistoryNode {
        self.history.current_node()
    }

    pub fn current_node_mut(&mut self) -> &mut HistoryNode {
        self.history.current_node_mut()
    }

    pub fn root_node_mut(&mut self) -> &mut HistoryNode {
        let root = self.history.root();
        self.history.node_mut(root)
    }

    pub fn next_nodes(&self) -> &[NodeId] {
        self.history.next_nodes()
    }

    // =========================================================================
    // Moves
    // =========================================================================

    /// Play a stone for the side to move.
    pub fn try_put_stone(&mut self, pos: Pos) -> Result<NodeId, MoveError> {
        if self.outcome.is_finished() {
            return Err(MoveError::GameFinished);
        }
        let undo = self.board.put_stone(pos, self.board.turn())?;
        Ok(self.history.push(Move::Place(pos), Some(undo)))
    }

    pub fn put_stone(&mut self, pos: Pos) -> bool {
        self.try_put_stone(pos).is_ok()
    }

    /// Pass. A second consecutive pass ends the game without a winner.
    pub fn pass(&mut self) -> bool {
        if self.outcome.is_finished() {
            return false;
        }
        let undo = self.board.pass();
        let id = self.history.push(Move::Pass, Some(undo));
        if self.history.is_second_consecutive_pass(id) {
            self.outcome.set_finished(None);
        }
        true
    }

    /// The side to move resigns. Ko and turn are left as they are.
    pub fn resign(&mut self) -> bool {
        if self.outcome.is_finished() {
            return false;
        }
        let turn = self.board.turn();
        self.outcome.set_finished(Some(turn.opposite()));
        let undo = BoardUndo::turn_only(self.board.ko(), turn);
        self.history.push(Move::Resign, Some(undo));
        true
    }

    // =========================================================================
    // Free Edits
    // =========================================================================

    /// Set an intersection regardless of the rules, recording the change.
    ///
    /// The change is added to the current node when it is a setup leaf,
    /// otherwise a new setup node is created for it.
    pub fn edit_intersection(&mut self, pos: Pos, state: Intersection) -> bool {
        if !self.board.is_valid(pos) {
            return false;
        }
        if self.board.get(pos) == state {
            return true;
        }
        self.acquire_edit_node();
        self.record_setup_intersection(pos, state);
        true
    }

    /// Change the side to move, recording the change.
    pub fn edit_turn(&mut self, color: Color) {
        if self.board.turn() == color {
            return;
        }
        self.acquire_edit_node();
        self.record_setup_turn(color);
    }

    fn acquire_edit_node(&mut self) {
        let node = self.history.current_node();
        if !(node.mv().is_setup() && node.nexts().is_empty()) {
            self.history.push_setup_node();
        }
    }

    /// Set an intersection on the current node's setup diff and the board.
    pub(crate) fn record_setup_intersection(&mut self, pos: Pos, state: Intersection) {
        let old = self.board.get(pos);
        self.history
            .current_node_mut()
            .acquire_setup()
            .add_intersection_change(pos, old, state);
        self.board.set_at(pos, state);
    }

    /// Set the turn on the current node's setup diff and the board.
    pub(crate) fn record_setup_turn(&mut self, color: Color) {
        let old = self.board.turn();
        self.history
            .current_node_mut()
            .acquire_setup()
            .add_turn_change(old, color);
        self.board.set_turn(color);
    }

    /// Drop the current node's setup diff if nothing is left in it.
    pub(crate) fn prune_empty_setup(&mut self) {
        let node = self.history.current_node_mut();
        if node.setup().is_some_and(BoardDiff::is_empty) {
            node.remove_setup();
        }
    }

    pub(crate) fn push_setup_node(&mut self) -> NodeId {
        self.history.push_setup_node()
    }

    pub fn set_comment(&mut self, text: impl Into<String>) {
        self.history.current_node_mut().set_comment(text);
    }

    pub fn comment(&self) -> Option<&str> {
        self.history.current_node().comment()
    }

    // =========================================================================
    // History
    // =========================================================================

    pub fn undo(&mut self) -> bool {
        self.history.undo(&mut self.board, &mut self.outcome)
    }

    pub fn redo(&mut self) -> bool {
        self.history.redo(&mut self.board, &mut self.outcome)
    }

    pub fn undo_all(&mut self) {
        self.history.undo_all(&mut self.board, &mut self.outcome);
    }

    pub fn redo_all(&mut self) {
        self.history.redo_all(&mut self.board, &mut self.outcome);
    }

    pub fn redo_to(&mut self, descendant: NodeId) -> bool {
        self.history.redo_to(descendant, &mut self.board, &mut self.outcome)
    }

    pub fn undo_to(&mut self, ancestor: NodeId) {
        self.history.undo_to(ancestor, &mut self.board, &mut self.outcome);
    }

    pub fn back_to_move(&mut self, mv: Move) {
        self.history.back_to_move(mv, &mut self.board, &mut self.outcome);
    }

    /// Move the cursor to the node the queries resolve to, undoing when it
    /// is an ancestor and redoing when it is a descendant.
    pub fn redo_by_query(&mut self, queries: &[Query]) -> bool {
        let target = self.history.find_by_query(queries);
        if self.history.is_descendant_of(self.history.current(), target) {
            self.undo_to(target);
            true
        } else {
            self.redo_to(target)
        }
    }

    /// Same as [`Game::redo_by_query`] with whitespace-separated tokens.
    /// Tokens that do not parse are skipped.
    pub fn redo_by_query_text(&mut self, text: &str) -> bool {
        let (w, h) = (self.board.width(), self.board.height());
        let queries: Vec<Query> = text
            .split_whitespace()
            .filter_map(|token| Query::parse(token, w, h))
            .collect();
        self.redo_by_query(&queries)
    }

    pub fn delete_branch(&mut self, id: NodeId) -> bool {
        self.history.delete_branch(id)
    }

    pub fn change_branch_order(&mut self, id: NodeId, delta: isize) -> bool {
        self.history.change_branch_order(id, delta)
    }

    // =========================================================================
    // Codecs
    // =========================================================================

    pub fn to_sgf(&self, opts: &ExportOptions) -> String {
        sgf::to_sgf(self, opts)
    }

    pub fn from_sgf(text: &str) -> Result<Game, SgfError> {
        sgf::from_sgf(text)
    }

    pub fn to_base64(&self, opts: &ExportOptions) -> String {
        compact::to_base64(self, opts)
    }

    pub fn from_base64(text: &str, w: usize, h: usize) -> Result<Game, DecodeError> {
        compact::from_base64(text, w, h)
    }

    pub fn to_readable(&self, opts: &ExportOptions) -> String {
        compact::to_readable(self, opts)
    }

    pub fn from_readable(text: &str, w: usize, h: usize) -> Result<Game, DecodeError> {
        compact::from_readable(text, w, h)
    }
}
