//! SGF (Smart Game Format) reading and writing.
//!
//! Only `GM[1]` (Go) is supported. The parser builds a plain property tree;
//! the importer then replays it on a live [`Game`] so every move is checked
//! by the rules. Values keep their escapes until a typed helper
//! ([`parse_text`], [`parse_point`], ...) interprets them.

use tracing::debug;

use crate::board::{Color, Intersection, Pos};
use crate::constants::{DEFAULT_BOARD_SIZE, MAX_BOARD_SIZE, TT_PASS_MAX_SIZE};
use crate::diff::BoardDiff;
use crate::error::{MoveError, SgfError};
use crate::format::{ExportOptions, NodeContext, TreeFormatter, write_tree};
use crate::game::Game;
use crate::history::{HistoryNode, Mark, MarkKind, Move, PropertyValue};

/// Key of the inheritable view-area property.
pub const VIEW_PROPERTY: &str = "VW";

// =============================================================================
// Parser
// =============================================================================

#[derive(Clone, Debug, PartialEq, Eq)]
pub struct SgfProperty {
    pub id: String,
    /// Raw values, escapes included.
    pub values: Vec<String>,
}

pub type SgfNode = Vec<SgfProperty>;

#[derive(Clone, Debug, PartialEq, Eq)]
pub struct SgfTree {
    pub nodes: Vec<SgfNode>,
    pub subtrees: Vec<SgfTree>,
}

/// Parse an SGF collection. At least one game tree is required.
pub fn parse(text: &str) -> Result<Vec<SgfTree>, SgfError> {
    let mut parser = Parser {
        src: text.as_bytes(),
        i: 0,
    };
    let trees = parser.game_tree_list()?;
    if trees.is_empty() {
        return Err(parser.error("collection must have a game tree"));
    }
    Ok(trees)
}

struct Parser<'a> {
    src: &'a [u8],
    i: usize,
}

impl Parser<'_> {
    fn error(&self, message: &str) -> SgfError {
        SgfError::Syntax {
            offset: self.i,
            message: message.to_string(),
        }
    }

    fn peek(&self) -> Option<u8> {
        self.src.get(self.i).copied()
    }

    fn next(&mut self) -> Option<u8> {
        let c = self.peek()?;
        self.i += 1;
        Some(c)
    }

    fn skip_ws(&mut self) {
        while matches!(self.peek(), Some(b' ' | b'\t' | b'\n' | b'\r')) {
            self.i += 1;
        }
    }

    fn expect(&mut self, ch: u8) -> Result<(), SgfError> {
        self.skip_ws();
        if self.peek() != Some(ch) {
            return Err(self.error(&format!("expected {}", ch as char)));
        }
        self.i += 1;
        Ok(())
    }

    fn game_tree_list(&mut self) -> Result<Vec<SgfTree>, SgfError> {
        let mut trees = Vec::new();
        loop {
            self.skip_ws();
            if self.peek() != Some(b'(') {
                return Ok(trees);
            }
            trees.push(self.game_tree()?);
        }
    }

    fn game_tree(&mut self) -> Result<SgfTree, SgfError> {
        self.expect(b'(')?;
        let mut nodes = Vec::new();
        loop {
            self.skip_ws();
            if self.peek() != Some(b';') {
                break;
            }
            nodes.push(self.node()?);
        }
        if nodes.is_empty() {
            return Err(self.error("game tree must have a node"));
        }
        let subtrees = self.game_tree_list()?;
        self.expect(b')')?;
        Ok(SgfTree { nodes, subtrees })
    }

    fn node(&mut self) -> Result<SgfNode, SgfError> {
        self.expect(b';')?;
        let mut props = Vec::new();
        while let Some(prop) = self.property()? {
            props.push(prop);
        }
        Ok(props)
    }

    fn property(&mut self) -> Result<Option<SgfProperty>, SgfError> {
        self.skip_ws();
        let begin = self.i;
        while self.peek().is_some_and(|c| c.is_ascii_uppercase()) {
            self.i += 1;
        }
        if begin == self.i {
            return Ok(None);
        }
        let id = String::from_utf8_lossy(&self.src[begin..self.i]).into_owned();

        let mut values = Vec::new();
        loop {
            values.push(self.value()?);
            self.skip_ws();
            if self.peek() != Some(b'[') {
                break;
            }
        }
        Ok(Some(SgfProperty { id, values }))
    }

    fn value(&mut self) -> Result<String, SgfError> {
        self.expect(b'[')?;
        let mut buf = Vec::new();
        loop {
            match self.next() {
                None => return Err(self.error("unexpected end in property value")),
                Some(b']') => break,
                Some(b'\\') => {
                    buf.push(b'\\');
                    match self.next() {
                        None => return Err(self.error("unexpected end in property value")),
                        // Escaped line breaks of any style become "\\\n".
                        Some(c @ (b'\n' | b'\r')) => {
                            let pair = if c == b'\n' { b'\r' } else { b'\n' };
                            if self.peek() == Some(pair) {
                                self.i += 1;
                            }
                            buf.push(b'\n');
                        }
                        Some(c) => buf.push(c),
                    }
                }
                Some(c) => buf.push(c),
            }
        }
        String::from_utf8(buf).map_err(|_| self.error("property value is not UTF-8"))
    }
}

// =============================================================================
// Value Helpers
// =============================================================================

const POINT_LETTERS: &[u8; 52] = b"abcdefghijklmnopqrstuvwxyzABCDEFGHIJKLMNOPQRSTUVWXYZ";

fn from_point_letter(c: u8) -> Option<usize> {
    match c {
        b'a'..=b'z' => Some((c - b'a') as usize),
        b'A'..=b'Z' => Some((c - b'A') as usize + 26),
        _ => None,
    }
}

/// Coordinate letter for 0..=51.
pub fn point_letter(n: usize) -> char {
    POINT_LETTERS[n] as char
}

pub fn to_point_xy(x: usize, y: usize) -> String {
    [point_letter(x), point_letter(y)].iter().collect()
}

pub fn to_point(pos: Pos, w: usize) -> String {
    to_point_xy(pos % w, pos / w)
}

pub fn parse_point_xy(value: &str, w: usize, h: usize) -> Result<(usize, usize), SgfError> {
    let invalid = || SgfError::InvalidPoint(value.to_string());
    let &[cx, cy] = value.as_bytes() else {
        return Err(invalid());
    };
    let x = from_point_letter(cx).ok_or_else(invalid)?;
    let y = from_point_letter(cy).ok_or_else(invalid)?;
    if x >= w || y >= h {
        return Err(SgfError::OutOfBoard {
            value: value.to_string(),
            width: w,
            height: h,
        });
    }
    Ok((x, y))
}

pub fn parse_point(value: &str, w: usize, h: usize) -> Result<Pos, SgfError> {
    let (x, y) = parse_point_xy(value, w, h)?;
    Ok(x + y * w)
}

/// A move value: a point, or a pass (`[]`, or `[tt]` on boards up to 19x19).
pub fn parse_move(value: &str, w: usize, h: usize) -> Result<Move, SgfError> {
    if value.is_empty() || (value == "tt" && w <= TT_PASS_MAX_SIZE && h <= TT_PASS_MAX_SIZE) {
        return Ok(Move::Pass);
    }
    parse_point(value, w, h).map(Move::Place)
}

/// Split a composed value at its unescaped colon.
pub fn split_compose(value: &str) -> Result<(&str, Option<&str>), SgfError> {
    let bytes = value.as_bytes();
    let mut colon = None;
    let mut i = 0;
    while i < bytes.len() {
        match bytes[i] {
            b'\\' => i += 1,
            b':' => {
                if colon.is_some() {
                    return Err(SgfError::TooManyColons(value.to_string()));
                }
                colon = Some(i);
            }
            _ => {}
        }
        i += 1;
    }
    Ok(match colon {
        Some(c) => (&value[..c], Some(&value[c + 1..])),
        None => (value, None),
    })
}

/// A point or a `lt:rb` rectangle, as a list of positions in row order.
pub fn parse_composed_point(value: &str, w: usize, h: usize) -> Result<Vec<Pos>, SgfError> {
    match split_compose(value)? {
        (single, None) => Ok(vec![parse_point(single, w, h)?]),
        (lt, Some(rb)) => {
            let (left, top) = parse_point_xy(lt, w, h)?;
            let (right, bottom) = parse_point_xy(rb, w, h)?;
            Ok((top..=bottom)
                .flat_map(|y| (left..=right).map(move |x| x + y * w))
                .collect())
        }
    }
}

/// Points of every value of a point-list property. `[]` yields nothing.
fn parse_point_list(values: &[String], w: usize, h: usize) -> Result<Vec<Pos>, SgfError> {
    let mut points = Vec::new();
    for value in values.iter().filter(|v| !v.is_empty()) {
        points.extend(parse_composed_point(value, w, h)?);
    }
    Ok(points)
}

fn unescape(value: &str, simple: bool) -> String {
    let mut out = String::with_capacity(value.len());
    let mut chars = value.chars().peekable();
    while let Some(c) = chars.next() {
        let c = match c {
            '\\' => match chars.next() {
                // Soft line break.
                Some('\n') | None => continue,
                Some(escaped) => escaped,
            },
            c => c,
        };
        match c {
            '\t' | '\x0b' => out.push(' '),
            '\n' | '\r' if simple => {
                let pair = if c == '\n' { '\r' } else { '\n' };
                chars.next_if_eq(&pair);
                out.push(' ');
            }
            c => out.push(c),
        }
    }
    out
}

/// Decode a Text value.
pub fn parse_text(value: &str) -> String {
    unescape(value, false)
}

/// Decode a SimpleText value. Line breaks become spaces.
pub fn parse_simple_text(value: &str) -> String {
    unescape(value, true)
}

fn escape(text: &str, simple: bool) -> String {
    let mut out = String::with_capacity(text.len());
    for c in text.chars() {
        match c {
            ']' | '\\' | ':' => {
                out.push('\\');
                out.push(c);
            }
            '\t' | '\x0b' => out.push(' '),
            '\n' | '\r' if simple => out.push(' '),
            c => out.push(c),
        }
    }
    out
}

pub fn to_text(text: &str) -> String {
    escape(text, false)
}

pub fn to_simple_text(text: &str) -> String {
    escape(text, true)
}

fn to_color_letter(state: Intersection) -> char {
    match state {
        Intersection::Black => 'B',
        Intersection::White => 'W',
        Intersection::Empty => 'E',
    }
}

fn parse_color(value: &str) -> Result<Color, SgfError> {
    match value {
        "B" => Ok(Color::Black),
        "W" => Ok(Color::White),
        _ => Err(SgfError::InvalidColor(value.to_string())),
    }
}

// =============================================================================
// Game Info Properties
// =============================================================================

#[derive(Copy, Clone, Debug, PartialEq, Eq)]
pub enum ValueKind {
    SimpleText,
    Text,
    Number,
    Real,
}

#[derive(Copy, Clone, Debug, PartialEq, Eq)]
pub struct GameInfoProperty {
    pub id: &'static str,
    pub description: &'static str,
    pub kind: ValueKind,
}

const fn info(id: &'static str, description: &'static str, kind: ValueKind) -> GameInfoProperty {
    GameInfoProperty { id, description, kind }
}

/// Game-info properties, kept on the root node in this order.
pub const GAME_INFO_PROPERTIES: &[GameInfoProperty] = &[
    info("CP", "Copyright", ValueKind::SimpleText),
    info("US", "User", ValueKind::SimpleText),
    info("AN", "Annotator", ValueKind::SimpleText),
    info("SO", "Source", ValueKind::SimpleText),
    info("EV", "Event", ValueKind::SimpleText),
    info("GN", "Game name", ValueKind::SimpleText),
    info("RO", "Round", ValueKind::SimpleText),
    info("DT", "Date", ValueKind::SimpleText),
    info("PC", "Place", ValueKind::SimpleText),
    info("BT", "Black team", ValueKind::SimpleText),
    info("PB", "Black player", ValueKind::SimpleText),
    info("BR", "Black rank", ValueKind::SimpleText),
    info("WT", "White team", ValueKind::SimpleText),
    info("PW", "White player", ValueKind::SimpleText),
    info("WR", "White rank", ValueKind::SimpleText),
    info("RU", "Rules", ValueKind::SimpleText),
    info("OT", "Overtime", ValueKind::SimpleText),
    info("TM", "Time limit (seconds)", ValueKind::Real),
    info("HA", "Handicap", ValueKind::Number),
    info("KM", "Komi", ValueKind::Real),
    info("RE", "Result", ValueKind::SimpleText),
    info("ON", "Opening", ValueKind::SimpleText),
    info("GC", "Game comment", ValueKind::Text),
];

pub fn game_info_property(id: &str) -> Option<&'static GameInfoProperty> {
    GAME_INFO_PROPERTIES.iter().find(|p| p.id == id)
}

// =============================================================================
// Import
// =============================================================================

/// Build a game from the first game tree of an SGF collection.
pub fn from_sgf(text: &str) -> Result<Game, SgfError> {
    let collection = parse(text)?;
    let root_tree = &collection[0];
    let (w, h) = board_size(&root_tree.nodes[0])?;
    debug!(w, h, trees = collection.len(), "importing SGF");

    let mut importer = Importer {
        game: Game::new(w, h),
        w,
        h,
    };
    importer.process_tree(root_tree, true)?;
    let mut game = importer.game;
    game.undo_all();
    Ok(game)
}

fn board_size(root: &SgfNode) -> Result<(usize, usize), SgfError> {
    let mut size = (DEFAULT_BOARD_SIZE, DEFAULT_BOARD_SIZE);
    for prop in root {
        let value = prop.values[0].as_str();
        match prop.id.as_str() {
            "GM" if value.trim() != "1" => {
                return Err(SgfError::UnsupportedGame(value.to_string()));
            }
            "SZ" => {
                let parse_side = |s: &str| {
                    s.trim()
                        .parse::<usize>()
                        .ok()
                        .filter(|n| (1..=MAX_BOARD_SIZE).contains(n))
                        .ok_or_else(|| SgfError::InvalidBoardSize(value.to_string()))
                };
                size = match split_compose(value)? {
                    (w, None) => {
                        let w = parse_side(w)?;
                        (w, w)
                    }
                    (w, Some(h)) => (parse_side(w)?, parse_side(h)?),
                };
            }
            _ => {}
        }
    }
    Ok(size)
}

struct Importer {
    game: Game,
    w: usize,
    h: usize,
}

impl Importer {
    /// Replay a game tree, then undo everything it pushed so the caller's
    /// position is unchanged.
    fn process_tree(&mut self, tree: &SgfTree, is_root_tree: bool) -> Result<(), SgfError> {
        let mut pushed = 0;
        for (i, props) in tree.nodes.iter().enumerate() {
            pushed += self.process_node(props, is_root_tree && i == 0)?;
        }
        for subtree in &tree.subtrees {
            self.process_tree(subtree, false)?;
        }
        for _ in 0..pushed {
            self.game.undo();
        }
        Ok(())
    }

    /// Apply one SGF node. Returns how many history nodes were pushed.
    fn process_node(&mut self, props: &SgfNode, is_root: bool) -> Result<usize, SgfError> {
        let moves: Vec<&SgfProperty> = props.iter().filter(|p| p.id == "B" || p.id == "W").collect();
        let has_setup = props.iter().any(|p| matches!(p.id.as_str(), "AB" | "AW" | "AE" | "PL"));
        if moves.len() > 1 {
            return Err(SgfError::MovedTwice);
        }
        if !moves.is_empty() && has_setup {
            return Err(SgfError::MixedMoveAndSetup);
        }

        let pushed = match moves.first() {
            Some(prop) => self.play(prop)?,
            None if !is_root => {
                self.game.push_setup_node();
                1
            }
            None => 0,
        };

        for prop in props {
            self.apply_property(prop)?;
        }
        Ok(pushed)
    }

    /// Play a B or W property. Returns how many history nodes were pushed.
    fn play(&mut self, prop: &SgfProperty) -> Result<usize, SgfError> {
        let color = if prop.id == "B" { Color::Black } else { Color::White };
        let value = prop.values[0].as_str();
        let mut pushed = 1;
        if self.game.turn() != color {
            // Problem collections often start with White and no PL.
            if self.game.move_number() > 0 {
                return Err(SgfError::UnexpectedPlayer(format!("{}[{value}]", prop.id)));
            }
            // A turn change on a node with children would recolour the
            // earlier variations, so this one gets a setup node of its own.
            if !self.game.current_node().nexts().is_empty() {
                debug!(?color, "variation starts with the other player");
                self.game.push_setup_node();
                pushed += 1;
            }
            self.game.record_setup_turn(color);
        }
        let illegal = |source| SgfError::IllegalMove {
            value: value.to_string(),
            source,
        };
        match parse_move(value, self.w, self.h)? {
            Move::Place(pos) => {
                self.game.try_put_stone(pos).map_err(illegal)?;
            }
            _ => {
                if !self.game.pass() {
                    return Err(illegal(MoveError::GameFinished));
                }
            }
        }
        Ok(pushed)
    }

    fn apply_property(&mut self, prop: &SgfProperty) -> Result<(), SgfError> {
        let (w, h) = (self.w, self.h);
        let values = &prop.values;
        match prop.id.as_str() {
            "B" | "W" | "GM" | "SZ" => {}
            "AB" | "AW" | "AE" => {
                let state = match prop.id.as_str() {
                    "AB" => Intersection::Black,
                    "AW" => Intersection::White,
                    _ => Intersection::Empty,
                };
                for pos in parse_point_list(values, w, h)? {
                    self.game.record_setup_intersection(pos, state);
                }
                self.game.prune_empty_setup();
            }
            "PL" => {
                let color = parse_color(&values[0])?;
                self.game.record_setup_turn(color);
                self.game.prune_empty_setup();
            }
            "C" => self.game.set_comment(parse_text(&values[0])),
            "MA" | "CR" | "SQ" | "TR" => {
                let kind = match prop.id.as_str() {
                    "CR" => MarkKind::Circle,
                    "SQ" => MarkKind::Square,
                    "TR" => MarkKind::Triangle,
                    _ => MarkKind::Cross,
                };
                let node = self.game.current_node_mut();
                for pos in parse_point_list(values, w, h)? {
                    node.add_mark(Mark {
                        pos,
                        kind: kind.clone(),
                    });
                }
            }
            "LB" => {
                for value in values {
                    let (point, text) = split_compose(value)?;
                    let pos = parse_point(point, w, h)?;
                    let text = parse_simple_text(text.unwrap_or(""));
                    self.game.current_node_mut().add_mark(Mark {
                        pos,
                        kind: MarkKind::Label(text),
                    });
                }
            }
            VIEW_PROPERTY => {
                let points = parse_point_list(values, w, h)?;
                self.game
                    .current_node_mut()
                    .add_property(VIEW_PROPERTY, PropertyValue::Points(points), true);
            }
            id => match game_info_property(id) {
                Some(info) => {
                    let text = match info.kind {
                        ValueKind::Text => parse_text(&values[0]),
                        _ => parse_simple_text(&values[0]),
                    };
                    self.game
                        .root_node_mut()
                        .add_property(id, PropertyValue::Text(text), false);
                }
                None => debug!(id, "ignoring unsupported SGF property"),
            },
        }
        Ok(())
    }
}

// =============================================================================
// Export
// =============================================================================

/// Writes a history tree as SGF text.
pub struct SgfFormatter {
    w: usize,
    h: usize,
    out: String,
}

impl SgfFormatter {
    pub fn new(w: usize, h: usize) -> Self {
        Self {
            w,
            h,
            out: String::new(),
        }
    }

    pub fn finish(self) -> String {
        self.out
    }

    fn point(&self, pos: Pos) -> String {
        to_point(pos, self.w)
    }

    fn color_letter(turn: Color) -> char {
        to_color_letter(turn.into())
    }

    /// A resignation with nothing after it and nothing attached is not
    /// written at all. SGF has no resign move, so any other resignation
    /// becomes an empty node that keeps its annotations.
    fn is_bare_resign(node: &HistoryNode) -> bool {
        node.mv().is_resign()
            && node.nexts().is_empty()
            && node.setup().is_none()
            && node.comment().is_none()
            && node.marks().is_empty()
            && node.own_property(VIEW_PROPERTY).is_none()
    }

    fn put_root_properties(&mut self, node: &HistoryNode) {
        let size = if self.w == self.h {
            self.w.to_string()
        } else {
            format!("{}:{}", self.w, self.h)
        };
        self.out.push_str(&format!("GM[1]SZ[{size}]"));
        for info in GAME_INFO_PROPERTIES {
            if let Some(PropertyValue::Text(value)) = node.own_property(info.id).map(|p| &p.value) {
                let value = match info.kind {
                    ValueKind::Text => to_text(value),
                    _ => to_simple_text(value),
                };
                self.out.push_str(&format!("{}[{value}]", info.id));
            }
        }
    }
}

impl TreeFormatter for SgfFormatter {
    fn begin_tree(&mut self) {
        self.out.push('(');
    }

    fn end_tree(&mut self) {
        self.out.push(')');
    }

    fn begin_branch(&mut self, node: &HistoryNode) {
        if !Self::is_bare_resign(node) {
            self.out.push('(');
        }
    }

    fn end_branch(&mut self, node: &HistoryNode) {
        if !Self::is_bare_resign(node) {
            self.out.push(')');
        }
    }

    fn put_place(&mut self, pos: Pos, turn: Color) {
        let point = self.point(pos);
        self.out.push_str(&format!(";{}[{point}]", Self::color_letter(turn)));
    }

    fn put_pass(&mut self, turn: Color) {
        self.out.push_str(&format!(";{}[]", Self::color_letter(turn)));
    }

    fn put_resign(&mut self, node: &HistoryNode, _turn: Color) {
        if !Self::is_bare_resign(node) {
            self.out.push(';');
        }
    }

    fn put_setup_node(&mut self, node: &HistoryNode, ctx: NodeContext) {
        self.out.push(';');
        if ctx.is_root {
            self.put_root_properties(node);
        }
    }

    fn put_setup(&mut self, setup: Option<&BoardDiff>, turn: Color, _ctx: NodeContext) {
        let Some(setup) = setup else {
            return;
        };
        for rect in setup.compress(self.w, self.h) {
            let mut value = to_point_xy(rect.left, rect.top);
            if !rect.is_point() {
                value.push(':');
                value.push_str(&to_point_xy(rect.right, rect.bottom));
            }
            self.out.push_str(&format!("A{}[{value}]", to_color_letter(rect.state)));
        }
        if let Some(change) = setup.turn().filter(|c| c.new != turn) {
            self.out.push_str(&format!("PL[{}]", Self::color_letter(change.new)));
        }
    }

    fn put_marks(&mut self, marks: &[Mark]) {
        for (id, want) in [
            ("MA", MarkKind::Cross),
            ("CR", MarkKind::Circle),
            ("SQ", MarkKind::Square),
            ("TR", MarkKind::Triangle),
        ] {
            let values: String = marks
                .iter()
                .filter(|m| m.kind == want)
                .map(|m| format!("[{}]", self.point(m.pos)))
                .collect();
            if !values.is_empty() {
                self.out.push_str(id);
                self.out.push_str(&values);
            }
        }
        let labels: String = marks
            .iter()
            .filter_map(|m| match &m.kind {
                MarkKind::Label(text) => Some(format!("[{}:{}]", self.point(m.pos), to_simple_text(text))),
                _ => None,
            })
            .collect();
        if !labels.is_empty() {
            self.out.push_str("LB");
            self.out.push_str(&labels);
        }
    }

    fn put_view(&mut self, points: &[Pos]) {
        self.out.push_str(VIEW_PROPERTY);
        if points.is_empty() {
            self.out.push_str("[]");
        }
        for &pos in points {
            let point = self.point(pos);
            self.out.push_str(&format!("[{point}]"));
        }
    }

    fn put_comment(&mut self, comment: &str) {
        self.out.push_str(&format!("C[{}]", to_text(comment)));
    }
}

pub fn to_sgf(game: &Game, opts: &ExportOptions) -> String {
    let board = game.board();
    let mut formatter = SgfFormatter::new(board.width(), board.height());
    write_tree(game, opts, &mut formatter);
    formatter.finish()
}
