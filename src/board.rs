//! Board state and the rules of play.
//!
//! A [`Board`] owns the intersections of a `w`x`h` grid, the prisoner tallies,
//! the ko point and the color to move. [`Board::put_stone`] and
//! [`Board::pass`] are the only move primitives; both hand back a
//! [`BoardUndo`] that reverts them exactly.
//!
//! Rules implemented: capture (of any number of adjacent strings at once),
//! suicide prohibition and simple positional ko. There is no superko check.

use std::fmt;
use std::rc::Rc;

use tracing::warn;

use crate::constants::MAX_BOARD_SIZE;
use crate::error::MoveError;
use crate::packed::PackedCells;

/// Index of an intersection: `x + y * width`.
pub type Pos = usize;

#[derive(Copy, Clone, Debug, PartialEq, Eq, Hash)]
pub enum Color {
    Black,
    White,
}

impl Color {
    pub fn opposite(self) -> Color {
        match self {
            Color::Black => Color::White,
            Color::White => Color::Black,
        }
    }

    /// 0 for Black, 1 for White.
    pub fn index(self) -> usize {
        match self {
            Color::Black => 0,
            Color::White => 1,
        }
    }
}

/// State of one intersection.
#[derive(Copy, Clone, Debug, Default, PartialEq, Eq, Hash)]
#[repr(u8)]
pub enum Intersection {
    #[default]
    Empty = 0,
    Black = 1,
    White = 2,
}

impl Intersection {
    /// All states in encoding order.
    pub const ALL: [Intersection; 3] = [Intersection::Empty, Intersection::Black, Intersection::White];

    fn from_bits(bits: u8) -> Self {
        match bits {
            1 => Intersection::Black,
            2 => Intersection::White,
            _ => Intersection::Empty,
        }
    }

    pub fn color(self) -> Option<Color> {
        match self {
            Intersection::Empty => None,
            Intersection::Black => Some(Color::Black),
            Intersection::White => Some(Color::White),
        }
    }

    /// 0 for Empty, 1 for Black, 2 for White.
    pub fn index(self) -> usize {
        self as usize
    }
}

impl From<Color> for Intersection {
    fn from(color: Color) -> Self {
        match color {
            Color::Black => Intersection::Black,
            Color::White => Intersection::White,
        }
    }
}

/// Receives every committed intersection write.
///
/// Views use this to keep a dirty set of cells. Observers are called
/// synchronously from inside the board's mutators.
pub trait IntersectionObserver {
    fn intersection_changed(&self, pos: Pos, state: Intersection);
}

impl<F: Fn(Pos, Intersection)> IntersectionObserver for F {
    fn intersection_changed(&self, pos: Pos, state: Intersection) {
        self(pos, state)
    }
}

/// Data needed to revert one move.
#[derive(Clone, Debug, PartialEq, Eq)]
pub struct BoardUndo {
    /// Stone to lift again. `None` for passes and illegal placeholders.
    pub placed: Option<Pos>,
    /// Stones captured by the move. They belong to the opponent of `turn`.
    pub removed: Vec<Pos>,
    /// Ko point before the move.
    pub ko: Option<Pos>,
    /// Color that made the move.
    pub turn: Color,
}

impl BoardUndo {
    /// Undo data for a move that changed only ko and turn.
    pub fn turn_only(ko: Option<Pos>, turn: Color) -> Self {
        BoardUndo {
            placed: None,
            removed: Vec::new(),
            ko,
            turn,
        }
    }

    pub fn apply_to(&self, board: &mut Board) {
        let captured = self.turn.opposite();
        for &pos in &self.removed {
            board.set_at(pos, captured.into());
        }
        if let Some(pos) = self.placed {
            board.set_at(pos, Intersection::Empty);
        }
        board.remove_prisoners(captured, self.removed.len() as u32);
        board.set_ko(self.ko);
        board.set_turn(self.turn);
    }
}

/// A Go board with rule state.
#[derive(Clone)]
pub struct Board {
    w: usize,
    h: usize,
    cells: PackedCells,
    /// Captured stones, indexed by the color of the captured stones.
    prisoners: [u32; 2],
    ko: Option<Pos>,
    turn: Color,
    observers: Vec<Rc<dyn IntersectionObserver>>,
}

impl Board {
    /// Create an empty board with Black to move.
    ///
    /// Each side is clamped to `1..=MAX_BOARD_SIZE`.
    pub fn new(w: usize, h: usize) -> Self {
        let (cw, ch) = (w.clamp(1, MAX_BOARD_SIZE), h.clamp(1, MAX_BOARD_SIZE));
        if (cw, ch) != (w, h) {
            warn!(w, h, clamped_w = cw, clamped_h = ch, "board size out of range");
        }
        let (w, h) = (cw, ch);
        Self {
            w,
            h,
            cells: PackedCells::new(w * h),
            prisoners: [0, 0],
            ko: None,
            turn: Color::Black,
            observers: Vec::new(),
        }
    }

    // =========================================================================
    // Geometry
    // =========================================================================

    pub fn width(&self) -> usize {
        self.w
    }

    pub fn height(&self) -> usize {
        self.h
    }

    /// Number of intersections.
    pub fn len(&self) -> usize {
        self.w * self.h
    }

    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }

    pub fn to_pos(&self, x: usize, y: usize) -> Pos {
        x + y * self.w
    }

    pub fn x_of(&self, pos: Pos) -> usize {
        pos % self.w
    }

    pub fn y_of(&self, pos: Pos) -> usize {
        pos / self.w
    }

    pub fn is_valid(&self, pos: Pos) -> bool {
        pos < self.len()
    }

    pub fn left_of(&self, pos: Pos) -> Option<Pos> {
        (pos % self.w != 0).then(|| pos - 1)
    }

    pub fn right_of(&self, pos: Pos) -> Option<Pos> {
        (pos % self.w != self.w - 1).then(|| pos + 1)
    }

    pub fn above(&self, pos: Pos) -> Option<Pos> {
        (pos >= self.w).then(|| pos - self.w)
    }

    pub fn below(&self, pos: Pos) -> Option<Pos> {
        (pos + self.w < self.len()).then(|| pos + self.w)
    }

    /// The 4 orthogonal neighbors (left, above, right, below); `None` off-board.
    #[inline]
    pub fn neighbors(&self, pos: Pos) -> [Option<Pos>; 4] {
        [
            self.left_of(pos),
            self.above(pos),
            self.right_of(pos),
            self.below(pos),
        ]
    }

    // =========================================================================
    // Intersections
    // =========================================================================

    pub fn get(&self, pos: Pos) -> Intersection {
        Intersection::from_bits(self.cells.get(pos))
    }

    pub fn intersections(&self) -> impl Iterator<Item = Intersection> + '_ {
        self.cells.iter().map(Intersection::from_bits)
    }

    fn is_empty_at(&self, pos: Option<Pos>) -> bool {
        pos.is_some_and(|p| self.get(p) == Intersection::Empty)
    }

    /// Write an intersection and notify observers.
    pub fn set_at(&mut self, pos: Pos, state: Intersection) {
        for observer in &self.observers {
            observer.intersection_changed(pos, state);
        }
        self.cells.set(pos, state as u8);
    }

    /// Overwrite the leading intersections from a slice.
    pub fn set_all(&mut self, states: &[Intersection]) {
        let n = states.len().min(self.len());
        for (pos, &state) in states.iter().enumerate().take(n) {
            self.set_at(pos, state);
        }
    }

    pub fn add_observer(&mut self, observer: Rc<dyn IntersectionObserver>) {
        self.observers.push(observer);
    }

    pub fn clear_observers(&mut self) {
        self.observers.clear();
    }

    // =========================================================================
    // Turn, Ko and Prisoners
    // =========================================================================

    pub fn turn(&self) -> Color {
        self.turn
    }

    pub fn set_turn(&mut self, color: Color) {
        self.turn = color;
    }

    pub fn rotate_turn(&mut self) {
        self.turn = self.turn.opposite();
    }

    pub fn ko(&self) -> Option<Pos> {
        self.ko
    }

    pub fn set_ko(&mut self, ko: Option<Pos>) {
        self.ko = ko;
    }

    /// Number of stones of `color` that have been captured.
    pub fn prisoners(&self, color: Color) -> u32 {
        self.prisoners[color.index()]
    }

    pub fn add_prisoners(&mut self, color: Color, count: u32) {
        self.prisoners[color.index()] += count;
    }

    pub fn remove_prisoners(&mut self, color: Color, count: u32) {
        let tally = &mut self.prisoners[color.index()];
        *tally = tally.saturating_sub(count);
    }

    // =========================================================================
    // Moves
    // =========================================================================

    /// Pass: clears the ko point and hands the turn over.
    pub fn pass(&mut self) -> BoardUndo {
        let undo = BoardUndo::turn_only(self.ko, self.turn);
        self.ko = None;
        self.rotate_turn();
        undo
    }

    /// Place a stone of `color` at `pos`, capturing surrounded strings.
    ///
    /// Nothing changes when the move is illegal.
    pub fn put_stone(&mut self, pos: Pos, color: Color) -> Result<BoardUndo, MoveError> {
        self.check_move(pos, color)?;
        self.set_at(pos, color.into());

        let mut removed = Vec::new();
        for n in self.neighbors(pos) {
            self.remove_string_if_surrounded(n, color, &mut removed);
        }
        self.add_prisoners(color.opposite(), removed.len() as u32);

        let ko_old = self.ko;
        self.ko = self.new_ko_position(pos, color, removed.len());

        let turn_old = self.turn;
        self.rotate_turn();

        Ok(BoardUndo {
            placed: Some(pos),
            removed,
            ko: ko_old,
            turn: turn_old,
        })
    }

    pub fn is_move_legal(&self, pos: Pos, color: Color) -> bool {
        self.check_move(pos, color).is_ok()
    }

    /// Check a move against the rules without playing it.
    pub fn check_move(&self, pos: Pos, color: Color) -> Result<(), MoveError> {
        if !self.is_valid(pos) {
            return Err(MoveError::OffBoard);
        }
        if self.turn != color {
            return Err(MoveError::NotYourTurn);
        }
        if self.get(pos) != Intersection::Empty {
            return Err(MoveError::Occupied);
        }
        if self.is_move_suicide(pos, color) {
            return Err(MoveError::Suicide);
        }
        if self.is_move_ko(pos) {
            return Err(MoveError::Ko);
        }
        Ok(())
    }

    /// Would a stone of `color` at the empty point `pos` have no liberties
    /// after captures?
    pub fn is_move_suicide(&self, pos: Pos, color: Color) -> bool {
        if !self.is_valid(pos) {
            return false;
        }
        // A direct empty neighbor is always a liberty.
        if self.neighbors(pos).into_iter().any(|n| self.is_empty_at(n)) {
            return false;
        }

        // Tentative placement goes to a scratch copy, so observers never see
        // it and the board itself stays byte-identical.
        let mut scratch = Board::new(self.w, self.h);
        scratch.cells = self.cells.clone();
        scratch.cells.set(pos, Intersection::from(color) as u8);

        if scratch.find_liberty(pos) {
            return false;
        }
        let captures = scratch
            .neighbors(pos)
            .into_iter()
            .any(|n| scratch.is_string_surrounded_and_diff_color(n, color));
        !captures
    }

    pub fn is_move_ko(&self, pos: Pos) -> bool {
        self.ko == Some(pos)
    }

    // =========================================================================
    // Strings and Liberties
    // =========================================================================

    /// Does the string containing `pos` have at least one liberty?
    ///
    /// An empty `pos` counts as a liberty of itself.
    pub fn find_liberty(&self, pos: Pos) -> bool {
        let color = self.get(pos);
        if color == Intersection::Empty {
            return true;
        }
        let mut visited = vec![false; self.len()];
        let mut stack = vec![pos];

        while let Some(pt) = stack.pop() {
            if visited[pt] {
                continue;
            }
            visited[pt] = true;

            match self.get(pt) {
                Intersection::Empty => return true,
                c if c != color => continue,
                _ => {}
            }
            for n in self.neighbors(pt).into_iter().flatten() {
                if !visited[n] {
                    stack.push(n);
                }
            }
        }
        false
    }

    pub fn is_string_surrounded(&self, pos: Pos) -> bool {
        !self.find_liberty(pos)
    }

    /// True if `pos` holds a stone not of `color` whose string has no liberty.
    fn is_string_surrounded_and_diff_color(&self, pos: Option<Pos>, color: Color) -> bool {
        let Some(pos) = pos else {
            return false;
        };
        match self.get(pos).color() {
            None => false,
            Some(c) if c == color => false,
            Some(_) => self.is_string_surrounded(pos),
        }
    }

    /// Remove the string at `pos` if it is an opponent of `mover` and has no
    /// liberties. Returns the number of stones removed.
    fn remove_string_if_surrounded(&mut self, pos: Option<Pos>, mover: Color, out: &mut Vec<Pos>) -> usize {
        if !self.is_string_surrounded_and_diff_color(pos, mover) {
            return 0;
        }
        let Some(pos) = pos else {
            return 0;
        };
        let color = self.get(pos);
        self.remove_string(pos, color, out)
    }

    /// Clear every stone of `color` connected to `start`, appending the
    /// removed points to `out`. Returns the number of stones removed.
    pub fn remove_string(&mut self, start: Pos, color: Intersection, out: &mut Vec<Pos>) -> usize {
        let before = out.len();
        let mut stack = vec![start];

        while let Some(pt) = stack.pop() {
            if self.get(pt) != color {
                continue;
            }
            self.set_at(pt, Intersection::Empty);
            out.push(pt);
            for n in self.neighbors(pt).into_iter().flatten() {
                if self.get(n) == color {
                    stack.push(n);
                }
            }
        }
        out.len() - before
    }

    /// Ko point created by a move at `pos` that captured `removed` stones.
    ///
    /// Only a single-stone capture can create a ko. If exactly one neighbor
    /// of the new stone is empty or friendly, it is the point just captured
    /// and retaking there would repeat the position.
    fn new_ko_position(&self, pos: Pos, color: Color, removed: usize) -> Option<Pos> {
        let own = Intersection::from(color);
        if removed != 1 || self.get(pos) != own {
            return None;
        }
        let mut open = self
            .neighbors(pos)
            .into_iter()
            .flatten()
            .filter(|&n| matches!(self.get(n), Intersection::Empty) || self.get(n) == own);
        match (open.next(), open.next()) {
            (Some(p), None) => Some(p),
            _ => None,
        }
    }
}

impl PartialEq for Board {
    fn eq(&self, other: &Self) -> bool {
        self.w == other.w
            && self.h == other.h
            && self.cells == other.cells
            && self.prisoners == other.prisoners
            && self.ko == other.ko
            && self.turn == other.turn
    }
}

impl Eq for Board {}

impl fmt::Debug for Board {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("Board")
            .field("w", &self.w)
            .field("h", &self.h)
            .field("prisoners", &self.prisoners)
            .field("ko", &self.ko)
            .field("turn", &self.turn)
            .field("observers", &self.observers.len())
            .finish_non_exhaustive()
    }
}

impl fmt::Display for Board {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        for y in 0..self.h {
            for x in 0..self.w {
                let ch = match self.get(self.to_pos(x, y)) {
                    Intersection::Black => 'X',
                    Intersection::White => 'O',
                    Intersection::Empty => '.',
                };
                write!(f, "{ch} ")?;
            }
            writeln!(f)?;
        }
        Ok(())
    }
}
