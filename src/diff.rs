//! Sparse before/after change sets over a board.
//!
//! A [`BoardDiff`] is the payload of setup nodes (free edits and SGF
//! `AB`/`AW`/`AE`/`PL`) and the bridge for exporting "from the current
//! position". Entries stay sorted by position with at most one entry per
//! position; an entry whose net change becomes zero is dropped.

use crate::board::{Board, Color, Intersection, Pos};

#[derive(Copy, Clone, Debug, PartialEq, Eq)]
pub struct IntersectionChange {
    pub pos: Pos,
    pub old: Intersection,
    pub new: Intersection,
}

#[derive(Copy, Clone, Debug, PartialEq, Eq)]
pub struct TurnChange {
    pub old: Color,
    pub new: Color,
}

/// An axis-aligned block of intersections that all change to `state`.
#[derive(Copy, Clone, Debug, PartialEq, Eq)]
pub struct Rect {
    pub state: Intersection,
    pub left: usize,
    pub top: usize,
    pub right: usize,
    pub bottom: usize,
}

impl Rect {
    pub fn is_point(&self) -> bool {
        self.left == self.right && self.top == self.bottom
    }
}

#[derive(Clone, Debug, Default, PartialEq, Eq)]
pub struct BoardDiff {
    turn: Option<TurnChange>,
    intersections: Vec<IntersectionChange>,
}

impl BoardDiff {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn turn(&self) -> Option<TurnChange> {
        self.turn
    }

    pub fn intersections(&self) -> &[IntersectionChange] {
        &self.intersections
    }

    pub fn has_intersections(&self) -> bool {
        !self.intersections.is_empty()
    }

    pub fn is_empty(&self) -> bool {
        self.turn.is_none() && self.intersections.is_empty()
    }

    /// Record `pos` going from `old` to `new`, merging with an earlier change
    /// at the same position.
    pub fn add_intersection_change(&mut self, pos: Pos, old: Intersection, new: Intersection) {
        match self.intersections.binary_search_by_key(&pos, |c| c.pos) {
            Ok(i) => {
                if self.intersections[i].old == new {
                    self.intersections.remove(i);
                } else {
                    self.intersections[i].new = new;
                }
            }
            Err(i) => {
                if old != new {
                    self.intersections.insert(i, IntersectionChange { pos, old, new });
                }
            }
        }
    }

    /// Replace the turn change.
    pub fn set_turn_change(&mut self, old: Color, new: Color) {
        self.turn = (old != new).then_some(TurnChange { old, new });
    }

    /// Record a turn change, merging with an earlier one.
    pub fn add_turn_change(&mut self, old: Color, new: Color) {
        let old = self.turn.map_or(old, |t| t.old);
        self.set_turn_change(old, new);
    }

    // =========================================================================
    // Diff and Merge
    // =========================================================================

    /// Changes that turn `old_board` into `new_board`.
    ///
    /// The boards may differ in size; cells outside `old_board` read as empty.
    pub fn diff(old_board: &Board, new_board: &Board) -> BoardDiff {
        let turn = (old_board.turn() != new_board.turn()).then_some(TurnChange {
            old: old_board.turn(),
            new: new_board.turn(),
        });
        let mut intersections = Vec::new();
        for y in 0..new_board.height() {
            for x in 0..new_board.width() {
                let pos = new_board.to_pos(x, y);
                let old = if x < old_board.width() && y < old_board.height() {
                    old_board.get(old_board.to_pos(x, y))
                } else {
                    Intersection::Empty
                };
                let new = new_board.get(pos);
                if old != new {
                    intersections.push(IntersectionChange { pos, old, new });
                }
            }
        }
        BoardDiff { turn, intersections }
    }

    /// Combine two consecutive diffs into one.
    pub fn merge(older: &BoardDiff, newer: &BoardDiff) -> BoardDiff {
        let turn = match (older.turn, newer.turn) {
            (None, t) | (t, None) => t,
            (Some(a), Some(b)) => (a.old != b.new).then_some(TurnChange { old: a.old, new: b.new }),
        };

        let (a, b) = (&older.intersections, &newer.intersections);
        let mut merged = Vec::with_capacity(a.len() + b.len());
        let (mut i, mut j) = (0, 0);
        while i < a.len() && j < b.len() {
            if a[i].pos < b[j].pos {
                merged.push(a[i]);
                i += 1;
            } else if b[j].pos < a[i].pos {
                merged.push(b[j]);
                j += 1;
            } else {
                if a[i].old != b[j].new {
                    merged.push(IntersectionChange {
                        pos: a[i].pos,
                        old: a[i].old,
                        new: b[j].new,
                    });
                }
                i += 1;
                j += 1;
            }
        }
        merged.extend_from_slice(&a[i..]);
        merged.extend_from_slice(&b[j..]);

        BoardDiff {
            turn,
            intersections: merged,
        }
    }

    // =========================================================================
    // Apply
    // =========================================================================

    /// Replay the new states onto `board`.
    ///
    /// If the board no longer holds what this diff recorded as the old state
    /// (it was edited elsewhere), the recorded old state is corrected to the
    /// board's actual value so a later inverse restores the real position.
    pub fn apply_to(&mut self, board: &mut Board) {
        if let Some(turn) = self.turn.as_mut() {
            turn.old = board.turn();
            board.set_turn(turn.new);
        }
        for change in &mut self.intersections {
            change.old = board.get(change.pos);
            board.set_at(change.pos, change.new);
        }
    }

    /// Replay the old states onto `board`.
    pub fn apply_inverse_to(&self, board: &mut Board) {
        if let Some(turn) = self.turn {
            board.set_turn(turn.old);
        }
        for change in &self.intersections {
            board.set_at(change.pos, change.old);
        }
    }

    // =========================================================================
    // Compression
    // =========================================================================

    /// Group the changes into maximal rectangles of equal new state.
    ///
    /// Horizontally adjacent cells merge into row runs first; runs in
    /// consecutive rows merge when they share state and left/right bounds.
    /// Rectangles come out ordered by their top-left corner.
    pub fn compress(&self, width: usize, height: usize) -> Vec<Rect> {
        let mut rects: Vec<Rect> = Vec::new();
        let mut slots: Vec<Option<usize>> = vec![None; width * height];

        for c in &self.intersections {
            if c.pos >= slots.len() {
                continue;
            }
            let (x, y) = (c.pos % width, c.pos / width);
            let left = (x > 0).then(|| slots[c.pos - 1]).flatten();
            match left {
                Some(r) if rects[r].state == c.new => {
                    rects[r].right = x;
                    slots[c.pos] = Some(r);
                }
                _ => {
                    slots[c.pos] = Some(rects.len());
                    rects.push(Rect {
                        state: c.new,
                        left: x,
                        top: y,
                        right: x,
                        bottom: y,
                    });
                }
            }
        }

        for y in 1..height {
            let mut x = 0;
            while x < width {
                let pos = x + y * width;
                let (Some(cur), Some(up)) = (slots[pos], slots[pos - width]) else {
                    x += 1;
                    continue;
                };
                let (a, b) = (rects[up], rects[cur]);
                if up != cur && a.state == b.state && a.left == b.left && a.right == b.right {
                    rects[up].bottom = y;
                    for run_x in b.left..=b.right {
                        slots[run_x + y * width] = Some(up);
                    }
                    x = b.right + 1;
                } else {
                    x += 1;
                }
            }
        }

        let mut seen = vec![false; rects.len()];
        let mut out = Vec::new();
        for r in slots.into_iter().flatten() {
            if !seen[r] {
                seen[r] = true;
                out.push(rects[r]);
            }
        }
        out
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    const E: Intersection = Intersection::Empty;
    const B: Intersection = Intersection::Black;
    const W: Intersection = Intersection::White;

    #[test]
    fn test_add_keeps_sorted_and_merges() {
        let mut diff = BoardDiff::new();
        diff.add_intersection_change(5, E, B);
        diff.add_intersection_change(2, E, W);
        diff.add_intersection_change(5, B, W);
        assert_eq!(
            diff.intersections(),
            &[
                IntersectionChange { pos: 2, old: E, new: W },
                IntersectionChange { pos: 5, old: E, new: W },
            ]
        );
    }

    #[test]
    fn test_add_drops_net_zero_change() {
        let mut diff = BoardDiff::new();
        diff.add_intersection_change(3, E, B);
        diff.add_intersection_change(3, B, E);
        assert!(diff.is_empty());
        diff.add_intersection_change(4, W, W);
        assert!(diff.is_empty());
    }

    #[test]
    fn test_turn_change() {
        let mut diff = BoardDiff::new();
        diff.set_turn_change(Color::Black, Color::Black);
        assert_eq!(diff.turn(), None);
        diff.add_turn_change(Color::Black, Color::White);
        diff.add_turn_change(Color::White, Color::Black);
        assert_eq!(diff.turn(), None);
    }

    #[test]
    fn test_diff_boards_of_different_size() {
        let mut small = Board::new(2, 2);
        small.set_at(0, B);
        let mut big = Board::new(3, 3);
        big.set_at(0, B);
        big.set_at(8, W);
        big.set_turn(Color::White);
        let diff = BoardDiff::diff(&small, &big);
        assert_eq!(diff.intersections(), &[IntersectionChange { pos: 8, old: E, new: W }]);
        assert_eq!(diff.turn(), Some(TurnChange { old: Color::Black, new: Color::White }));
    }

    #[test]
    fn test_merge() {
        let mut older = BoardDiff::new();
        older.add_intersection_change(1, E, B);
        older.add_intersection_change(4, E, W);
        let mut newer = BoardDiff::new();
        newer.add_intersection_change(1, B, E);
        newer.add_intersection_change(3, E, B);
        newer.add_intersection_change(4, W, B);
        let merged = BoardDiff::merge(&older, &newer);
        assert_eq!(
            merged.intersections(),
            &[
                IntersectionChange { pos: 3, old: E, new: B },
                IntersectionChange { pos: 4, old: E, new: B },
            ]
        );
    }

    #[test]
    fn test_apply_and_inverse() {
        let mut board = Board::new(3, 3);
        let before = board.clone();
        let mut diff = BoardDiff::new();
        diff.add_intersection_change(0, E, B);
        diff.add_intersection_change(4, E, W);
        diff.set_turn_change(Color::Black, Color::White);
        diff.apply_to(&mut board);
        assert_eq!(board.get(0), B);
        assert_eq!(board.get(4), W);
        assert_eq!(board.turn(), Color::White);
        diff.apply_inverse_to(&mut board);
        assert_eq!(board, before);
    }

    #[test]
    fn test_apply_corrects_drifted_old_state() {
        let mut board = Board::new(3, 3);
        let mut diff = BoardDiff::new();
        diff.add_intersection_change(0, E, B);
        board.set_at(0, W);
        diff.apply_to(&mut board);
        assert_eq!(diff.intersections()[0].old, W);
        diff.apply_inverse_to(&mut board);
        assert_eq!(board.get(0), W);
    }

    #[test]
    fn test_compress_rectangles() {
        // 4x4 board: a 2x2 black block at the top-left and a white stone.
        let mut diff = BoardDiff::new();
        for pos in [0, 1, 4, 5] {
            diff.add_intersection_change(pos, E, B);
        }
        diff.add_intersection_change(15, E, W);
        let rects = diff.compress(4, 4);
        assert_eq!(
            rects,
            vec![
                Rect { state: B, left: 0, top: 0, right: 1, bottom: 1 },
                Rect { state: W, left: 3, top: 3, right: 3, bottom: 3 },
            ]
        );
        assert!(!rects[0].is_point());
        assert!(rects[1].is_point());
    }

    #[test]
    fn test_compress_keeps_mismatched_rows_apart() {
        // Row 0: x 0..=2 black; row 1: x 0..=1 black, x 2 white.
        let mut diff = BoardDiff::new();
        for pos in [0, 1, 2, 3, 4] {
            diff.add_intersection_change(pos, E, B);
        }
        diff.add_intersection_change(5, E, W);
        let rects = diff.compress(3, 2);
        assert_eq!(
            rects,
            vec![
                Rect { state: B, left: 0, top: 0, right: 2, bottom: 0 },
                Rect { state: B, left: 0, top: 1, right: 1, bottom: 1 },
                Rect { state: W, left: 2, top: 1, right: 2, bottom: 1 },
            ]
        );
    }

    #[test]
    fn test_compress_merges_run_after_a_merged_run() {
        // 3 wide: rows 0 and 1 both "B B W"; both runs should merge vertically.
        let mut diff = BoardDiff::new();
        for pos in [0, 1, 3, 4] {
            diff.add_intersection_change(pos, E, B);
        }
        diff.add_intersection_change(2, E, W);
        diff.add_intersection_change(5, E, W);
        let rects = diff.compress(3, 2);
        assert_eq!(
            rects,
            vec![
                Rect { state: B, left: 0, top: 0, right: 1, bottom: 1 },
                Rect { state: W, left: 2, top: 0, right: 2, bottom: 1 },
            ]
        );
    }
}
