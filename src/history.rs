//! Branching move history with undo/redo.
//!
//! The tree is an arena of [`HistoryNode`]s addressed by [`NodeId`]. Every
//! node except the root has exactly one parent (`prev`); children are kept in
//! a user-ordered list (`nexts`). Each node remembers which child was visited
//! last, which is where [`HistoryTree::redo`] goes by default.
//!
//! The tree never owns the board. Undo and redo take the board (and the
//! game's finished/winner state) as arguments and replay moves through the
//! real rule engine, so a redo can notice that a recorded move has become
//! illegal after a free edit.
//!
//! Deleted branches stay in the arena but are unreachable from the root.

use std::collections::{BTreeMap, VecDeque};

use tracing::warn;

use crate::board::{Board, BoardUndo, Pos};
use crate::diff::BoardDiff;
use crate::game::Outcome;
use crate::sgf;

/// Handle of a node in a [`HistoryTree`].
#[derive(Copy, Clone, Debug, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub struct NodeId(usize);

/// What reaching a node does to the game.
#[derive(Copy, Clone, Debug, PartialEq, Eq, Hash)]
pub enum Move {
    /// No move: the root, a free edit or imported setup properties.
    Setup,
    Place(Pos),
    Pass,
    Resign,
}

impl Move {
    pub fn is_place(self) -> bool {
        matches!(self, Move::Place(_))
    }

    pub fn is_pass(self) -> bool {
        self == Move::Pass
    }

    pub fn is_resign(self) -> bool {
        self == Move::Resign
    }

    pub fn is_setup(self) -> bool {
        self == Move::Setup
    }

    /// Placements and passes count towards the move number.
    pub fn is_move(self) -> bool {
        matches!(self, Move::Place(_) | Move::Pass)
    }

    pub fn pos(self) -> Option<Pos> {
        match self {
            Move::Place(pos) => Some(pos),
            _ => None,
        }
    }
}

// =============================================================================
// Properties
// =============================================================================

#[derive(Clone, Debug, PartialEq, Eq)]
pub enum MarkKind {
    Cross,
    Circle,
    Square,
    Triangle,
    Label(String),
}

/// A markup annotation on one intersection.
#[derive(Clone, Debug, PartialEq, Eq)]
pub struct Mark {
    pub pos: Pos,
    pub kind: MarkKind,
}

#[derive(Clone, Debug, PartialEq, Eq)]
pub enum PropertyValue {
    Text(String),
    Points(Vec<Pos>),
    Marks(Vec<Mark>),
}

/// A named annotation. Inheritable properties apply to all descendants
/// that do not override them.
#[derive(Clone, Debug, PartialEq, Eq)]
pub struct Property {
    pub value: PropertyValue,
    pub inherit: bool,
}

/// Key under which markup is stored.
pub const MARKS_PROPERTY: &str = "marks";

// =============================================================================
// Nodes
// =============================================================================

#[derive(Clone, Debug)]
pub struct HistoryNode {
    pub(crate) prev: Option<NodeId>,
    pub(crate) nexts: Vec<NodeId>,
    pub(crate) last_visited: Option<NodeId>,
    pub(crate) mv: Move,
    pub(crate) board_undo: Option<BoardUndo>,
    pub(crate) comment: Option<String>,
    pub(crate) props: BTreeMap<String, Property>,
    pub(crate) setup: Option<BoardDiff>,
}

impl HistoryNode {
    fn new(prev: Option<NodeId>, mv: Move, board_undo: Option<BoardUndo>) -> Self {
        Self {
            prev,
            nexts: Vec::new(),
            last_visited: None,
            mv,
            board_undo,
            comment: None,
            props: BTreeMap::new(),
            setup: None,
        }
    }

    pub fn prev(&self) -> Option<NodeId> {
        self.prev
    }

    pub fn nexts(&self) -> &[NodeId] {
        &self.nexts
    }

    pub fn last_visited(&self) -> Option<NodeId> {
        self.last_visited
    }

    pub fn mv(&self) -> Move {
        self.mv
    }

    pub fn is_root(&self) -> bool {
        self.prev.is_none()
    }

    pub fn board_undo(&self) -> Option<&BoardUndo> {
        self.board_undo.as_ref()
    }

    /// A recorded placement that could not be replayed on the current board.
    pub fn is_placeholder(&self) -> bool {
        self.mv.is_place() && self.board_undo.as_ref().is_some_and(|u| u.placed.is_none())
    }

    pub fn comment(&self) -> Option<&str> {
        self.comment.as_deref()
    }

    pub fn set_comment(&mut self, text: impl Into<String>) {
        self.comment = Some(text.into());
    }

    pub fn remove_comment(&mut self) {
        self.comment = None;
    }

    pub fn setup(&self) -> Option<&BoardDiff> {
        self.setup.as_ref()
    }

    pub fn set_setup(&mut self, diff: BoardDiff) {
        self.setup = Some(diff);
    }

    pub fn remove_setup(&mut self) {
        self.setup = None;
    }

    pub fn acquire_setup(&mut self) -> &mut BoardDiff {
        self.setup.get_or_insert_with(BoardDiff::new)
    }

    pub fn properties(&self) -> &BTreeMap<String, Property> {
        &self.props
    }

    /// Property set on this node itself.
    pub fn own_property(&self, id: &str) -> Option<&Property> {
        self.props.get(id)
    }

    pub fn add_property(&mut self, id: impl Into<String>, value: PropertyValue, inherit: bool) {
        self.props.insert(id.into(), Property { value, inherit });
    }

    pub fn remove_property(&mut self, id: &str) -> Option<Property> {
        self.props.remove(id)
    }

    /// Existing property, or a new non-inheritable one holding `default`.
    pub fn acquire_property(&mut self, id: &str, default: PropertyValue) -> &mut Property {
        self.props.entry(id.to_string()).or_insert(Property {
            value: default,
            inherit: false,
        })
    }

    pub fn marks(&self) -> &[Mark] {
        match self.props.get(MARKS_PROPERTY) {
            Some(Property {
                value: PropertyValue::Marks(marks),
                ..
            }) => marks,
            _ => &[],
        }
    }

    pub fn add_mark(&mut self, mark: Mark) {
        let prop = self.acquire_property(MARKS_PROPERTY, PropertyValue::Marks(Vec::new()));
        if let PropertyValue::Marks(marks) = &mut prop.value {
            marks.push(mark);
        } else {
            prop.value = PropertyValue::Marks(vec![mark]);
        }
    }
}

// =============================================================================
// Queries
// =============================================================================

/// One step of [`HistoryTree::find_by_query`].
#[derive(Clone, Debug, PartialEq, Eq)]
pub enum Query {
    /// Advance (or go back, if negative) along first children.
    Moves(isize),
    /// Breadth-first search for the node with this move.
    Find(Move),
    /// Child `n` of the next branch point.
    Branch(usize),
    /// The next branch point, or the end of the line if there is none.
    FirstForkOrLast,
}

impl Query {
    /// Parse a text token: `12`, `-3`, `dd` (SGF point), `B` (branch), `_`.
    pub fn parse(token: &str, w: usize, h: usize) -> Option<Query> {
        if let Ok(n) = token.parse::<isize>() {
            return Some(Query::Moves(n));
        }
        let bytes = token.as_bytes();
        match bytes {
            [b'_'] => Some(Query::FirstForkOrLast),
            [c] if c.is_ascii_uppercase() => Some(Query::Branch((c - b'A') as usize)),
            [a, b] if a.is_ascii_alphabetic() && b.is_ascii_alphabetic() => {
                let mv = sgf::parse_move(token, w, h).ok()?;
                Some(Query::Find(mv))
            }
            _ => None,
        }
    }
}

// =============================================================================
// Tree
// =============================================================================

#[derive(Clone, Debug)]
pub struct HistoryTree {
    nodes: Vec<HistoryNode>,
    first: NodeId,
    pointer: NodeId,
    move_number: usize,
}

impl Default for HistoryTree {
    fn default() -> Self {
        Self::new()
    }
}

impl HistoryTree {
    pub fn new() -> Self {
        Self {
            nodes: vec![HistoryNode::new(None, Move::Setup, None)],
            first: NodeId(0),
            pointer: NodeId(0),
            move_number: 0,
        }
    }

    pub fn node(&self, id: NodeId) -> &HistoryNode {
        &self.nodes[id.0]
    }

    pub fn node_mut(&mut self, id: NodeId) -> &mut HistoryNode {
        &mut self.nodes[id.0]
    }

    pub fn root(&self) -> NodeId {
        self.first
    }

    /// The cursor.
    pub fn current(&self) -> NodeId {
        self.pointer
    }

    pub fn current_node(&self) -> &HistoryNode {
        self.node(self.pointer)
    }

    pub fn current_node_mut(&mut self) -> &mut HistoryNode {
        let id = self.pointer;
        self.node_mut(id)
    }

    pub fn next_nodes(&self) -> &[NodeId] {
        &self.node(self.pointer).nexts
    }

    pub fn previous(&self) -> Option<NodeId> {
        self.node(self.pointer).prev
    }

    pub fn find_next_by_move(&self, id: NodeId, mv: Move) -> Option<NodeId> {
        self.node(id).nexts.iter().copied().find(|&n| self.node(n).mv == mv)
    }

    // =========================================================================
    // Move Numbers and Ancestry
    // =========================================================================

    /// Number of placements and passes from the root to the cursor.
    pub fn move_number(&self) -> usize {
        self.move_number
    }

    /// Move number of the most recent move at `pos` on the current line.
    pub fn move_number_at(&self, pos: Pos) -> Option<usize> {
        let mut num = self.move_number;
        let mut node = Some(self.pointer);
        while let Some(id) = node {
            let n = self.node(id);
            if n.mv == Move::Place(pos) {
                return Some(num);
            }
            if n.mv.is_move() {
                num -= 1;
            }
            node = n.prev;
        }
        None
    }

    /// Number of placements and passes from the root to `id`.
    pub fn node_move_number(&self, id: NodeId) -> usize {
        self.ancestors(id).filter(|&n| self.node(n).mv.is_move()).count()
    }

    pub fn depth(&self, id: NodeId) -> usize {
        self.ancestors(id).count() - 1
    }

    /// `id` followed by its ancestors up to the root.
    pub fn ancestors(&self, id: NodeId) -> impl Iterator<Item = NodeId> + '_ {
        std::iter::successors(Some(id), move |&n| self.node(n).prev)
    }

    pub fn is_descendant_of(&self, id: NodeId, ancestor: NodeId) -> bool {
        self.ancestors(id).any(|n| n == ancestor)
    }

    /// Nearest placement or pass above `id`, skipping setup and resignation.
    pub fn previous_move(&self, id: NodeId) -> Option<NodeId> {
        self.ancestors(id).skip(1).find(|&n| self.node(n).mv.is_move())
    }

    /// A pass directly answering a pass ends the game.
    pub fn is_second_consecutive_pass(&self, id: NodeId) -> bool {
        self.node(id).mv.is_pass() && self.previous_move(id).is_some_and(|p| self.node(p).mv.is_pass())
    }

    pub fn sibling_count(&self, id: NodeId) -> usize {
        self.node(id).prev.map_or(0, |p| self.node(p).nexts.len())
    }

    fn index_in_parent(&self, id: NodeId) -> Option<(NodeId, usize)> {
        let parent = self.node(id).prev?;
        let index = self.node(parent).nexts.iter().position(|&n| n == id)?;
        Some((parent, index))
    }

    /// Child indices from the root down to `id`. With `fork_only`, only
    /// steps taken at branch points are listed.
    pub fn path_from_root(&self, id: NodeId, fork_only: bool) -> Vec<usize> {
        let mut dirs: Vec<usize> = self
            .ancestors(id)
            .filter_map(|n| self.index_in_parent(n))
            .filter(|&(parent, _)| !fork_only || self.node(parent).nexts.len() >= 2)
            .map(|(_, index)| index)
            .collect();
        dirs.reverse();
        dirs
    }

    /// Inverse of [`HistoryTree::path_from_root`], starting at `from`.
    pub fn find_by_path(&self, from: NodeId, dirs: &[usize], fork_only: bool) -> Option<NodeId> {
        let mut node = from;
        let mut di = 0;
        while di < dirs.len() {
            let nexts = &self.node(node).nexts;
            let dir = if !fork_only || nexts.len() >= 2 {
                di += 1;
                dirs[di - 1]
            } else {
                0
            };
            node = *nexts.get(dir)?;
        }
        Some(node)
    }

    /// Walk `n` steps: forwards along first children, or backwards when
    /// negative. Stops early at either end.
    pub fn nth(&self, from: NodeId, n: isize) -> NodeId {
        let mut node = from;
        if n >= 0 {
            for _ in 0..n {
                match self.node(node).nexts.first() {
                    Some(&next) => node = next,
                    None => break,
                }
            }
        } else {
            for _ in 0..n.unsigned_abs() {
                match self.node(node).prev {
                    Some(prev) => node = prev,
                    None => break,
                }
            }
        }
        node
    }

    /// First node along first children (starting at `from`) with more than
    /// one child.
    pub fn next_fork(&self, from: NodeId) -> Option<NodeId> {
        let mut node = from;
        loop {
            let nexts = &self.node(node).nexts;
            match nexts.len() {
                0 => return None,
                1 => node = nexts[0],
                _ => return Some(node),
            }
        }
    }

    pub fn first_fork_or_last(&self, from: NodeId) -> NodeId {
        let mut node = from;
        while let [only] = self.node(node).nexts.as_slice() {
            node = *only;
        }
        node
    }

    pub fn find_breadth_first(&self, from: NodeId, pred: impl Fn(&HistoryNode) -> bool) -> Option<NodeId> {
        let mut queue = VecDeque::from([from]);
        while let Some(id) = queue.pop_front() {
            let node = self.node(id);
            if pred(node) {
                return Some(id);
            }
            queue.extend(node.nexts.iter().copied());
        }
        None
    }

    /// Resolve a list of query tokens from the cursor. Tokens that match
    /// nothing leave the result where it was.
    pub fn find_by_query(&self, queries: &[Query]) -> NodeId {
        let mut curr = self.pointer;
        for query in queries {
            match query {
                Query::Moves(n) => curr = self.nth(curr, *n),
                Query::Find(mv) => {
                    if let Some(found) = self.find_breadth_first(curr, |node| node.mv == *mv) {
                        curr = found;
                    }
                }
                Query::Branch(index) => {
                    if let Some(fork) = self.next_fork(curr) {
                        if let Some(&next) = self.node(fork).nexts.get(*index) {
                            curr = next;
                        }
                    }
                }
                Query::FirstForkOrLast => curr = self.first_fork_or_last(curr),
            }
        }
        curr
    }

    // =========================================================================
    // Properties
    // =========================================================================

    /// Property on `id`, or with `inherit`, the nearest inheritable one on an
    /// ancestor.
    pub fn property(&self, id: NodeId, key: &str, inherit: bool) -> Option<&Property> {
        if let Some(prop) = self.node(id).props.get(key) {
            return Some(prop);
        }
        if !inherit {
            return None;
        }
        self.ancestors(id)
            .skip(1)
            .find_map(|n| self.node(n).props.get(key).filter(|p| p.inherit))
    }

    pub fn has_property(&self, id: NodeId, key: &str, inherit: bool) -> bool {
        self.property(id, key, inherit).is_some()
    }

    // =========================================================================
    // Push
    // =========================================================================

    /// Record a placement, pass or resignation at the cursor.
    ///
    /// An existing child with the same move is reused (its undo data is
    /// refreshed) so replaying a game twice does not duplicate nodes.
    pub fn push(&mut self, mv: Move, board_undo: Option<BoardUndo>) -> NodeId {
        debug_assert!(!mv.is_setup(), "setup nodes go through push_setup_node");
        let id = match self.find_next_by_move(self.pointer, mv) {
            Some(existing) => {
                self.nodes[existing.0].board_undo = board_undo;
                self.nodes[self.pointer.0].last_visited = Some(existing);
                self.pointer = existing;
                existing
            }
            None => self.push_new_node(mv, board_undo),
        };
        if mv.is_move() {
            self.move_number += 1;
        }
        id
    }

    /// Append a new, empty setup node. Setup nodes are never merged.
    pub fn push_setup_node(&mut self) -> NodeId {
        self.push_new_node(Move::Setup, None)
    }

    fn push_new_node(&mut self, mv: Move, board_undo: Option<BoardUndo>) -> NodeId {
        let id = NodeId(self.nodes.len());
        self.nodes.push(HistoryNode::new(Some(self.pointer), mv, board_undo));
        let parent = &mut self.nodes[self.pointer.0];
        parent.nexts.push(id);
        parent.last_visited = Some(id);
        self.pointer = id;
        id
    }

    // =========================================================================
    // Undo / Redo
    // =========================================================================

    /// Step the cursor back to its parent, reverting the board. Returns false
    /// at the root.
    pub fn undo(&mut self, board: &mut Board, outcome: &mut Outcome) -> bool {
        let id = self.pointer;
        let Some(prev) = self.node(id).prev else {
            return false;
        };
        if self.node(id).mv.is_resign() || self.is_second_consecutive_pass(id) {
            outcome.cancel_finish();
        }

        let node = &self.nodes[id.0];
        if let Some(setup) = &node.setup {
            setup.apply_inverse_to(board);
        }
        if let Some(undo) = &node.board_undo {
            undo.apply_to(board);
        }
        if node.mv.is_move() {
            self.move_number -= 1;
        }
        self.pointer = prev;
        true
    }

    /// Step the cursor to the last visited child, replaying its move with
    /// the rule engine. Returns false if there is no child to go to.
    ///
    /// A placement that is no longer legal (the board was edited since it
    /// was recorded) becomes a placeholder: ko and turn advance, no stone is
    /// placed, and the node's undo data reflects that.
    pub fn redo(&mut self, board: &mut Board, outcome: &mut Outcome) -> bool {
        let Some(target) = self.node(self.pointer).last_visited else {
            return false;
        };
        let mv = self.node(target).mv;

        match mv {
            Move::Place(pos) => {
                let turn = board.turn();
                match board.put_stone(pos, turn) {
                    Ok(undo) => {
                        self.push(mv, Some(undo));
                    }
                    Err(err) => {
                        warn!(pos, %err, "recorded move can no longer be played, keeping it as a placeholder");
                        let undo = BoardUndo::turn_only(board.ko(), turn);
                        board.set_ko(None);
                        board.rotate_turn();
                        self.push(mv, Some(undo));
                    }
                }
            }
            Move::Pass => {
                let undo = board.pass();
                self.push(mv, Some(undo));
            }
            Move::Resign | Move::Setup => self.pointer = target,
        }

        if let Some(setup) = self.nodes[target.0].setup.as_mut() {
            setup.apply_to(board);
        }

        if mv.is_resign() {
            outcome.set_finished(Some(board.turn().opposite()));
        } else if self.is_second_consecutive_pass(self.pointer) {
            outcome.set_finished(None);
        }
        true
    }

    /// Redo along the path to `descendant`, making it the last visited child
    /// at every step. Fails without moving if `descendant` is not below the
    /// cursor.
    pub fn redo_to(&mut self, descendant: NodeId, board: &mut Board, outcome: &mut Outcome) -> bool {
        let from = self.pointer;
        if !self.is_descendant_of(descendant, from) {
            return false;
        }
        let mut node = descendant;
        while node != from {
            let Some(prev) = self.node(node).prev else {
                break;
            };
            self.nodes[prev.0].last_visited = Some(node);
            node = prev;
        }
        while self.pointer != descendant {
            if !self.redo(board, outcome) {
                self.undo_to(from, board, outcome);
                return false;
            }
        }
        true
    }

    /// Undo until the cursor is `ancestor` (or the root).
    pub fn undo_to(&mut self, ancestor: NodeId, board: &mut Board, outcome: &mut Outcome) {
        while self.pointer != ancestor && self.undo(board, outcome) {}
    }

    /// Undo until the cursor sits on a node with move `mv` (or the root).
    pub fn back_to_move(&mut self, mv: Move, board: &mut Board, outcome: &mut Outcome) {
        while self.node(self.pointer).mv != mv && self.undo(board, outcome) {}
    }

    pub fn undo_all(&mut self, board: &mut Board, outcome: &mut Outcome) {
        while self.undo(board, outcome) {}
    }

    pub fn redo_all(&mut self, board: &mut Board, outcome: &mut Outcome) {
        while self.redo(board, outcome) {}
    }

    // =========================================================================
    // Branch Editing
    // =========================================================================

    /// Detach `id` and its subtree from its parent.
    ///
    /// Refuses the root and any branch that contains the cursor.
    pub fn delete_branch(&mut self, id: NodeId) -> bool {
        if self.is_descendant_of(self.pointer, id) {
            return false;
        }
        let Some((parent, index)) = self.index_in_parent(id) else {
            return false;
        };
        let parent = &mut self.nodes[parent.0];
        parent.nexts.remove(index);
        if parent.last_visited == Some(id) {
            parent.last_visited = parent.nexts.first().copied();
        }
        self.nodes[id.0].prev = None;
        true
    }

    /// Move `id` by `delta` places among its siblings, clamped to the ends.
    pub fn change_branch_order(&mut self, id: NodeId, delta: isize) -> bool {
        let Some((parent, index)) = self.index_in_parent(id) else {
            return false;
        };
        let nexts = &mut self.nodes[parent.0].nexts;
        nexts.remove(index);
        let new_index = index.saturating_add_signed(delta).min(nexts.len());
        nexts.insert(new_index, id);
        true
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::board::Color;

    fn play(tree: &mut HistoryTree, board: &mut Board, x: usize, y: usize) -> NodeId {
        let pos = board.to_pos(x, y);
        let undo = board.put_stone(pos, board.turn()).unwrap();
        tree.push(Move::Place(pos), Some(undo))
    }

    #[test]
    fn test_push_reuses_same_move() {
        let mut tree = HistoryTree::new();
        let mut board = Board::new(9, 9);
        let mut outcome = Outcome::default();
        let a = play(&mut tree, &mut board, 2, 2);
        assert!(tree.undo(&mut board, &mut outcome));
        let b = play(&mut tree, &mut board, 2, 2);
        assert_eq!(a, b);
        assert_eq!(tree.node(tree.root()).nexts().len(), 1);
        assert_eq!(tree.move_number(), 1);
    }

    #[test]
    fn test_setup_nodes_are_never_merged() {
        let mut tree = HistoryTree::new();
        let a = tree.push_setup_node();
        tree.undo(&mut Board::new(9, 9), &mut Outcome::default());
        let b = tree.push_setup_node();
        assert_ne!(a, b);
        assert_eq!(tree.node(tree.root()).nexts(), &[a, b]);
        assert_eq!(tree.move_number(), 0);
    }

    #[test]
    fn test_undo_at_root_is_noop() {
        let mut tree = HistoryTree::new();
        assert!(!tree.undo(&mut Board::new(9, 9), &mut Outcome::default()));
        assert!(!tree.redo(&mut Board::new(9, 9), &mut Outcome::default()));
    }

    #[test]
    fn test_undo_redo_restores_board_and_pointer() {
        let mut tree = HistoryTree::new();
        let mut board = Board::new(9, 9);
        let mut outcome = Outcome::default();
        play(&mut tree, &mut board, 3, 3);
        let node = play(&mut tree, &mut board, 4, 4);
        let snapshot = board.clone();

        assert!(tree.undo(&mut board, &mut outcome));
        assert_ne!(board, snapshot);
        assert!(tree.redo(&mut board, &mut outcome));
        assert_eq!(board, snapshot);
        assert_eq!(tree.current(), node);
        assert_eq!(tree.move_number(), 2);
    }

    #[test]
    fn test_redo_illegal_becomes_placeholder() {
        let mut tree = HistoryTree::new();
        let mut board = Board::new(9, 9);
        let mut outcome = Outcome::default();
        let node = play(&mut tree, &mut board, 0, 0);
        tree.undo(&mut board, &mut outcome);

        // Someone occupies the point out of band.
        board.set_at(0, crate::board::Intersection::White);
        assert!(tree.redo(&mut board, &mut outcome));
        assert_eq!(tree.current(), node);
        assert!(tree.node(node).is_placeholder());
        assert_eq!(board.turn(), Color::White);

        assert!(tree.undo(&mut board, &mut outcome));
        assert_eq!(board.get(0), crate::board::Intersection::White);
        assert_eq!(board.turn(), Color::Black);
    }

    #[test]
    fn test_redo_to_and_path() {
        let mut tree = HistoryTree::new();
        let mut board = Board::new(9, 9);
        let mut outcome = Outcome::default();
        play(&mut tree, &mut board, 0, 0);
        let b1 = play(&mut tree, &mut board, 1, 0);
        tree.undo(&mut board, &mut outcome);
        let b2 = play(&mut tree, &mut board, 2, 0);
        let leaf = play(&mut tree, &mut board, 3, 0);
        tree.undo_all(&mut board, &mut outcome);

        assert_eq!(tree.path_from_root(leaf, false), vec![0, 1, 0]);
        assert_eq!(tree.path_from_root(leaf, true), vec![1]);
        assert_eq!(tree.find_by_path(tree.root(), &[0, 1, 0], false), Some(leaf));
        assert_eq!(tree.find_by_path(tree.root(), &[1], true), Some(b2));

        assert!(tree.redo_to(b1, &mut board, &mut outcome));
        assert_eq!(tree.current(), b1);
        assert!(!tree.redo_to(b2, &mut board, &mut outcome), "sibling is not a descendant");
        assert_eq!(tree.current(), b1);
    }

    #[test]
    fn test_delete_branch_repoints_last_visited() {
        let mut tree = HistoryTree::new();
        let mut board = Board::new(9, 9);
        let mut outcome = Outcome::default();
        let a = play(&mut tree, &mut board, 0, 0);
        tree.undo(&mut board, &mut outcome);
        let b = play(&mut tree, &mut board, 1, 0);
        tree.undo(&mut board, &mut outcome);

        assert_eq!(tree.current_node().last_visited(), Some(b));
        assert!(tree.delete_branch(b));
        assert_eq!(tree.next_nodes(), &[a]);
        assert_eq!(tree.current_node().last_visited(), Some(a));
        assert!(!tree.delete_branch(tree.root()));
    }

    #[test]
    fn test_delete_branch_refuses_cursor_branch() {
        let mut tree = HistoryTree::new();
        let mut board = Board::new(9, 9);
        let a = play(&mut tree, &mut board, 0, 0);
        play(&mut tree, &mut board, 1, 0);
        assert!(!tree.delete_branch(a));
    }

    #[test]
    fn test_change_branch_order_clamps() {
        let mut tree = HistoryTree::new();
        let mut board = Board::new(9, 9);
        let mut outcome = Outcome::default();
        let mut ids = Vec::new();
        for x in 0..3 {
            ids.push(play(&mut tree, &mut board, x, 0));
            tree.undo(&mut board, &mut outcome);
        }
        assert!(tree.change_branch_order(ids[0], 10));
        assert_eq!(tree.next_nodes(), &[ids[1], ids[2], ids[0]]);
        assert!(tree.change_branch_order(ids[0], -10));
        assert_eq!(tree.next_nodes(), &[ids[0], ids[1], ids[2]]);
        assert!(tree.change_branch_order(ids[1], 1));
        assert_eq!(tree.next_nodes(), &[ids[0], ids[2], ids[1]]);
    }

    #[test]
    fn test_find_by_query() {
        let mut tree = HistoryTree::new();
        let mut board = Board::new(9, 9);
        let mut outcome = Outcome::default();
        play(&mut tree, &mut board, 0, 0);
        let fork = play(&mut tree, &mut board, 1, 0);
        let main = play(&mut tree, &mut board, 2, 0);
        tree.undo(&mut board, &mut outcome);
        let side = play(&mut tree, &mut board, 3, 0);
        tree.undo_all(&mut board, &mut outcome);

        assert_eq!(tree.find_by_query(&[Query::Moves(2)]), fork);
        assert_eq!(tree.find_by_query(&[Query::Branch(1)]), side);
        assert_eq!(tree.find_by_query(&[Query::Branch(0)]), main);
        assert_eq!(tree.find_by_query(&[Query::Branch(5)]), tree.root());
        assert_eq!(tree.find_by_query(&[Query::FirstForkOrLast]), fork);
        let d = Query::parse("da", 9, 9).unwrap();
        assert_eq!(tree.find_by_query(&[d]), side);
        assert_eq!(tree.find_by_query(&[Query::Moves(1), Query::Moves(-5)]), tree.root());
    }

    #[test]
    fn test_query_parse() {
        assert_eq!(Query::parse("12", 19, 19), Some(Query::Moves(12)));
        assert_eq!(Query::parse("-1", 19, 19), Some(Query::Moves(-1)));
        assert_eq!(Query::parse("C", 19, 19), Some(Query::Branch(2)));
        assert_eq!(Query::parse("_", 19, 19), Some(Query::FirstForkOrLast));
        assert_eq!(Query::parse("cb", 19, 19), Some(Query::Find(Move::Place(21))));
        assert_eq!(Query::parse("tt", 19, 19), Some(Query::Find(Move::Pass)));
        assert_eq!(Query::parse("zz", 19, 19), None);
        assert_eq!(Query::parse("what", 19, 19), None);
    }

    #[test]
    fn test_property_inheritance() {
        let mut tree = HistoryTree::new();
        let root = tree.root();
        tree.node_mut(root)
            .add_property("VW", PropertyValue::Points(vec![1, 2]), true);
        tree.node_mut(root)
            .add_property("GN", PropertyValue::Text("x".into()), false);
        let child = tree.push_setup_node();
        assert!(tree.has_property(child, "VW", true));
        assert!(!tree.has_property(child, "VW", false));
        assert!(!tree.has_property(child, "GN", true));
    }

    #[test]
    fn test_move_number_at() {
        let mut tree = HistoryTree::new();
        let mut board = Board::new(9, 9);
        play(&mut tree, &mut board, 0, 0);
        play(&mut tree, &mut board, 1, 0);
        play(&mut tree, &mut board, 2, 0);
        assert_eq!(tree.move_number_at(1), Some(2));
        assert_eq!(tree.move_number_at(40), None);
    }
}
