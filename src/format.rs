//! Walking a history tree for export.
//!
//! [`write_tree`] visits the nodes in the order a serialized game tree needs
//! them and calls a [`TreeFormatter`] for each piece. The SGF writer and the
//! compact encoders are formatters.

use crate::board::{Board, Color, Pos};
use crate::diff::BoardDiff;
use crate::game::Game;
use crate::history::{HistoryNode, HistoryTree, Mark, Move, NodeId, PropertyValue};
use crate::sgf;

/// Which part of the tree to export.
#[derive(Copy, Clone, Debug, Default, PartialEq, Eq)]
pub struct ExportOptions {
    /// Start from the current position instead of the root. The current
    /// stones become the setup of a new root.
    pub from_current_node: bool,
    /// Export only the line from the start node to the cursor.
    pub to_current_node: bool,
}

/// Where a node sits in the exported stream.
#[derive(Copy, Clone, Debug, Default, PartialEq, Eq)]
pub struct NodeContext {
    pub is_root: bool,
    /// The next node written after this one is a setup node.
    pub leads_to_setup: bool,
}

pub trait TreeFormatter {
    fn begin_tree(&mut self) {}
    fn end_tree(&mut self) {}
    fn begin_branch(&mut self, _node: &HistoryNode) {}
    fn end_branch(&mut self, _node: &HistoryNode) {}

    fn put_place(&mut self, pos: Pos, turn: Color);
    fn put_pass(&mut self, turn: Color);
    /// `node` is the resignation node, for writers that need its annotations.
    fn put_resign(&mut self, node: &HistoryNode, turn: Color);

    /// Start of a node without a move.
    fn put_setup_node(&mut self, _node: &HistoryNode, _ctx: NodeContext) {}

    /// Called for every setup node, and for move nodes that carry a setup
    /// diff. `turn` is the side to move before the diff applies.
    fn put_setup(&mut self, setup: Option<&BoardDiff>, turn: Color, ctx: NodeContext);

    fn put_marks(&mut self, _marks: &[Mark]) {}
    fn put_view(&mut self, _points: &[Pos]) {}
    fn put_comment(&mut self, _comment: &str) {}
}

/// Emit `game`'s tree through `formatter`.
pub fn write_tree<F: TreeFormatter>(game: &Game, opts: &ExportOptions, formatter: &mut F) {
    let tree = game.history();
    let synthetic;
    let start = if opts.from_current_node {
        synthetic = start_from_current(game);
        &synthetic
    } else {
        tree.node(tree.root())
    };

    formatter.begin_tree();
    let mut turn = Color::Black;
    if opts.to_current_node {
        let path: Vec<NodeId> = if opts.from_current_node {
            Vec::new()
        } else {
            let mut ids: Vec<NodeId> = tree.ancestors(tree.current()).collect();
            ids.reverse();
            ids.remove(0);
            ids
        };
        let ctx = NodeContext {
            is_root: true,
            leads_to_setup: path.first().is_some_and(|&id| tree.node(id).mv().is_setup()),
        };
        turn = put_node(formatter, start, turn, ctx);
        for id in path {
            turn = put_node(formatter, tree.node(id), turn, NodeContext::default());
        }
    } else {
        let ctx = NodeContext {
            is_root: true,
            leads_to_setup: matches!(start.nexts(), [only] if tree.node(*only).mv().is_setup()),
        };
        turn = put_node(formatter, start, turn, ctx);
        write_children(formatter, tree, start.nexts(), turn);
    }
    formatter.end_tree();
}

enum Step {
    Enter { id: NodeId, turn: Color, in_branch: bool },
    Leave { id: NodeId, in_branch: bool },
}

/// Depth-first walk below the start node. Every child of a branch point is
/// wrapped in begin/end branch calls.
fn write_children<F: TreeFormatter>(formatter: &mut F, tree: &HistoryTree, children: &[NodeId], turn: Color) {
    let mut stack = Vec::new();
    push_children(&mut stack, children, turn);

    while let Some(step) = stack.pop() {
        match step {
            Step::Enter { id, turn, in_branch } => {
                let node = tree.node(id);
                if in_branch {
                    formatter.begin_branch(node);
                }
                let turn = put_node(formatter, node, turn, NodeContext::default());
                stack.push(Step::Leave { id, in_branch });
                push_children(&mut stack, node.nexts(), turn);
            }
            Step::Leave { id, in_branch } => {
                if in_branch {
                    formatter.end_branch(tree.node(id));
                }
            }
        }
    }
}

fn push_children(stack: &mut Vec<Step>, children: &[NodeId], turn: Color) {
    let in_branch = children.len() > 1;
    stack.extend(children.iter().rev().map(|&id| Step::Enter { id, turn, in_branch }));
}

/// Write one node and return the side to move after it.
fn put_node<F: TreeFormatter>(formatter: &mut F, node: &HistoryNode, mut turn: Color, ctx: NodeContext) -> Color {
    match node.mv() {
        Move::Resign => formatter.put_resign(node, turn),
        Move::Pass => {
            formatter.put_pass(turn);
            turn = turn.opposite();
        }
        Move::Place(pos) => {
            formatter.put_place(pos, turn);
            turn = turn.opposite();
        }
        Move::Setup => formatter.put_setup_node(node, ctx),
    }

    if node.mv().is_setup() || node.setup().is_some() {
        formatter.put_setup(node.setup(), turn, ctx);
        if let Some(change) = node.setup().and_then(BoardDiff::turn) {
            turn = change.new;
        }
    }

    let marks = node.marks();
    if !marks.is_empty() {
        formatter.put_marks(marks);
    }
    if let Some(PropertyValue::Points(points)) = node.own_property(sgf::VIEW_PROPERTY).map(|p| &p.value) {
        formatter.put_view(points);
    }
    if let Some(comment) = node.comment() {
        formatter.put_comment(comment);
    }
    turn
}

/// A detached root node holding the current position as its setup.
fn start_from_current(game: &Game) -> HistoryNode {
    let tree = game.history();
    let board = game.board();
    let mut node = tree.current_node().clone();
    node.prev = None;
    node.mv = Move::Setup;
    node.board_undo = None;
    node.setup = Some(BoardDiff::diff(&Board::new(board.width(), board.height()), board));

    for (id, prop) in tree.node(tree.root()).properties() {
        if sgf::game_info_property(id).is_some() && node.own_property(id).is_none() {
            node.add_property(id.clone(), prop.value.clone(), prop.inherit);
        }
    }
    node
}
