//! Compact tree encoding for URLs.
//!
//! A history tree is written as a stream of fixed-width tokens packed
//! LSB-first into bytes and then base64-encoded with URL-safe substitutions
//! (`+`→`-`, `/`→`_`, `=`→`.`). Board dimensions are not part of the stream.
//!
//! For a board of `S` intersections a token is either a position (`0..S`)
//! or `S + cmd` for one of the commands in [`crate::constants`]. The token
//! width is the smallest that fits `S + 3`.
//!
//! The same token sequence also has a readable text form (see
//! [`to_readable`]), which is handy for debugging and tests.

use base64::Engine as _;
use base64::engine::general_purpose::STANDARD;
use tracing::{debug, warn};

use crate::board::{Color, Intersection, Pos};
use crate::constants::{
    CMD_BEGIN_BRANCH, CMD_COUNT, CMD_END_BRANCH, CMD_PASS, CMD_SPECIAL, MAX_BOARD_SIZE, SUBCMD_BITS, SUBCMD_RESIGN,
    SUBCMD_SETUP,
};
use crate::diff::{BoardDiff, Rect};
use crate::error::DecodeError;
use crate::format::{ExportOptions, NodeContext, TreeFormatter, write_tree};
use crate::game::Game;
use crate::history::{HistoryNode, NodeId};
use crate::sgf;

// =============================================================================
// Bit Streams
// =============================================================================

/// Packs integers of arbitrary width, least significant bit first.
#[derive(Debug, Default)]
pub struct BitWriter {
    bytes: Vec<u8>,
    byte: u8,
    bit_index: u32,
}

impl BitWriter {
    pub fn new() -> Self {
        Self::default()
    }

    /// Write the low `width` bits of `value`.
    pub fn put(&mut self, value: u32, width: u32) {
        for i in 0..width {
            if (value >> i) & 1 != 0 {
                self.byte |= 1 << self.bit_index;
            }
            self.bit_index += 1;
            if self.bit_index == 8 {
                self.bytes.push(self.byte);
                self.byte = 0;
                self.bit_index = 0;
            }
        }
    }

    /// Flush the partial byte (zero padded) and return the bytes.
    pub fn finish(mut self) -> Vec<u8> {
        if self.bit_index > 0 {
            self.bytes.push(self.byte);
        }
        self.bytes
    }
}

/// Reads integers written by [`BitWriter`].
#[derive(Debug)]
pub struct BitReader<'a> {
    bytes: &'a [u8],
    bit: usize,
}

impl<'a> BitReader<'a> {
    pub fn new(bytes: &'a [u8]) -> Self {
        Self { bytes, bit: 0 }
    }

    pub fn get(&mut self, width: u32) -> Result<u32, DecodeError> {
        let mut value = 0;
        for i in 0..width {
            let byte = self.bytes.get(self.bit >> 3).ok_or(DecodeError::UnexpectedEnd)?;
            if (byte >> (self.bit & 7)) & 1 != 0 {
                value |= 1 << i;
            }
            self.bit += 1;
        }
        Ok(value)
    }
}

pub fn encode_url_safe(bytes: &[u8]) -> String {
    STANDARD
        .encode(bytes)
        .chars()
        .map(|c| match c {
            '+' => '-',
            '/' => '_',
            '=' => '.',
            c => c,
        })
        .collect()
}

pub fn decode_url_safe(text: &str) -> Result<Vec<u8>, DecodeError> {
    let standard: String = text
        .chars()
        .map(|c| match c {
            '-' => '+',
            '_' => '/',
            '.' => '=',
            c => c,
        })
        .collect();
    Ok(STANDARD.decode(standard)?)
}

/// Bits per token on a board of `size` intersections.
pub fn token_width(size: usize) -> u32 {
    usize::BITS - (size + CMD_COUNT - 1).leading_zeros()
}

fn check_size(w: usize, h: usize) -> Result<(), DecodeError> {
    let valid = 1..=MAX_BOARD_SIZE;
    if valid.contains(&w) && valid.contains(&h) {
        Ok(())
    } else {
        Err(DecodeError::BoardSize { width: w, height: h })
    }
}

/// Setup changes of each target state, split into single points and larger
/// rectangles. Indexed by `Intersection::index()`.
fn rects_by_state(setup: &BoardDiff, w: usize, h: usize) -> [(Vec<Rect>, Vec<Rect>); 3] {
    let mut groups: [(Vec<Rect>, Vec<Rect>); 3] = Default::default();
    for rect in setup.compress(w, h) {
        let (points, rects) = &mut groups[rect.state.index()];
        if rect.is_point() {
            points.push(rect);
        } else {
            rects.push(rect);
        }
    }
    groups
}

/// Whether a setup command needs to be written for this node.
///
/// A root without a setup writes nothing, unless its only child is a setup
/// node: the decoder merges a leading setup into the root, so an empty one
/// is written to keep the child separate.
fn needs_setup_command(setup: Option<&BoardDiff>, ctx: NodeContext) -> bool {
    setup.is_some() || !ctx.is_root || ctx.leads_to_setup
}

// =============================================================================
// Binary Encoder
// =============================================================================

pub struct CompactFormatter {
    w: usize,
    h: usize,
    size: usize,
    width: u32,
    writer: BitWriter,
}

impl CompactFormatter {
    pub fn new(w: usize, h: usize) -> Self {
        let size = w * h;
        Self {
            w,
            h,
            size,
            width: token_width(size),
            writer: BitWriter::new(),
        }
    }

    pub fn finish(self) -> String {
        encode_url_safe(&self.writer.finish())
    }

    fn put_pos(&mut self, pos: Pos) {
        self.writer.put(pos as u32, self.width);
    }

    fn put_cmd(&mut self, cmd: usize) {
        self.put_pos(self.size + cmd);
    }

    fn put_subcmd(&mut self, subcmd: u32) {
        self.put_cmd(CMD_SPECIAL);
        self.writer.put(subcmd, SUBCMD_BITS);
    }

    fn put_rect_corner(&mut self, x: usize, y: usize) {
        self.put_pos(x + y * self.w);
    }
}

impl TreeFormatter for CompactFormatter {
    fn end_tree(&mut self) {
        self.put_cmd(CMD_END_BRANCH);
    }

    fn begin_branch(&mut self, _node: &HistoryNode) {
        self.put_cmd(CMD_BEGIN_BRANCH);
    }

    fn end_branch(&mut self, _node: &HistoryNode) {
        self.put_cmd(CMD_END_BRANCH);
    }

    fn put_place(&mut self, pos: Pos, _turn: Color) {
        self.put_pos(pos);
    }

    fn put_pass(&mut self, _turn: Color) {
        self.put_cmd(CMD_PASS);
    }

    fn put_resign(&mut self, _node: &HistoryNode, _turn: Color) {
        self.put_subcmd(SUBCMD_RESIGN);
    }

    fn put_setup(&mut self, setup: Option<&BoardDiff>, turn: Color, ctx: NodeContext) {
        if !needs_setup_command(setup, ctx) {
            return;
        }
        self.put_subcmd(SUBCMD_SETUP);
        let empty = BoardDiff::new();
        let setup = setup.unwrap_or(&empty);

        if setup.has_intersections() {
            self.writer.put(1, 1);
            for (points, rects) in rects_by_state(setup, self.w, self.h) {
                for p in &points {
                    self.put_rect_corner(p.left, p.top);
                }
                self.put_pos(self.size);
                for r in &rects {
                    self.put_rect_corner(r.left, r.top);
                    self.put_rect_corner(r.right, r.bottom);
                }
                self.put_pos(self.size);
            }
        } else {
            self.writer.put(0, 1);
        }

        match setup.turn() {
            Some(change) if change.new != turn => {
                self.writer.put(1, 1);
                self.writer.put(u32::from(change.new == Color::White), 1);
            }
            _ => self.writer.put(0, 1),
        }
    }
}

pub fn to_base64(game: &Game, opts: &ExportOptions) -> String {
    let board = game.board();
    let mut formatter = CompactFormatter::new(board.width(), board.height());
    write_tree(game, opts, &mut formatter);
    formatter.finish()
}

// =============================================================================
// Replay
// =============================================================================

/// Rebuilds a game from a decoded command sequence. Shared by the binary and
/// readable decoders.
struct Replay {
    game: Game,
    stack: Vec<NodeId>,
    /// Nothing has been read yet, so a setup belongs to the root.
    at_start: bool,
}

impl Replay {
    fn new(w: usize, h: usize) -> Self {
        Self {
            game: Game::new(w, h),
            stack: Vec::new(),
            at_start: true,
        }
    }

    fn place(&mut self, pos: Pos) -> Result<(), DecodeError> {
        self.at_start = false;
        self.game
            .try_put_stone(pos)
            .map(|_| ())
            .map_err(|source| DecodeError::IllegalMove { pos, source })
    }

    fn pass(&mut self) -> Result<(), DecodeError> {
        self.at_start = false;
        self.game
            .pass()
            .then_some(())
            .ok_or(DecodeError::GameFinished("pass"))
    }

    fn resign(&mut self) -> Result<(), DecodeError> {
        self.at_start = false;
        self.game
            .resign()
            .then_some(())
            .ok_or(DecodeError::GameFinished("resign"))
    }

    fn begin_branch(&mut self) {
        self.at_start = false;
        self.stack.push(self.game.current_node_id());
    }

    /// Returns true at the end of the tree.
    fn end_branch(&mut self) -> bool {
        self.at_start = false;
        match self.stack.pop() {
            Some(id) => {
                self.game.undo_to(id);
                false
            }
            None => {
                self.game.undo_all();
                true
            }
        }
    }

    fn begin_setup(&mut self) {
        if !self.at_start {
            self.game.push_setup_node();
        }
        self.at_start = false;
    }

    fn setup_rect(&mut self, lt: Pos, rb: Pos, state: Intersection) {
        let w = self.game.board().width();
        let (left, top, right, bottom) = (lt % w, lt / w, rb % w, rb / w);
        for y in top..=bottom {
            for x in left..=right {
                self.game.record_setup_intersection(x + y * w, state);
            }
        }
    }

    fn setup_turn(&mut self, color: Color) {
        self.game.record_setup_turn(color);
    }

    fn end_setup(&mut self) {
        self.game.prune_empty_setup();
    }
}

// =============================================================================
// Binary Decoder
// =============================================================================

/// Rebuild a game from [`to_base64`] output.
pub fn from_base64(text: &str, w: usize, h: usize) -> Result<Game, DecodeError> {
    check_size(w, h)?;
    let bytes = decode_url_safe(text)?;
    let result = decode_tokens(&bytes, w, h);
    match &result {
        Ok(game) => debug!(w, h, root_children = game.next_nodes().len(), "decoded compact tree"),
        Err(err) => warn!(%err, "compact tree rejected"),
    }
    result
}

fn decode_tokens(bytes: &[u8], w: usize, h: usize) -> Result<Game, DecodeError> {
    let size = w * h;
    let width = token_width(size);
    let mut reader = BitReader::new(bytes);
    let mut replay = Replay::new(w, h);

    loop {
        let token = reader.get(width)? as usize;
        if token < size {
            replay.place(token)?;
            continue;
        }
        match token - size {
            CMD_PASS => replay.pass()?,
            CMD_BEGIN_BRANCH => replay.begin_branch(),
            CMD_END_BRANCH => {
                if replay.end_branch() {
                    return Ok(replay.game);
                }
            }
            CMD_SPECIAL => match reader.get(SUBCMD_BITS)? {
                SUBCMD_RESIGN => replay.resign()?,
                SUBCMD_SETUP => read_setup(&mut reader, &mut replay, size, width)?,
                other => return Err(DecodeError::UnknownSubcommand(other)),
            },
            other => return Err(DecodeError::UnknownCommand(other)),
        }
    }
}

/// A setup point, or `None` for the list terminator.
fn read_setup_pos(reader: &mut BitReader, size: usize, width: u32) -> Result<Option<Pos>, DecodeError> {
    match reader.get(width)? as usize {
        pos if pos < size => Ok(Some(pos)),
        pos if pos == size => Ok(None),
        pos => Err(DecodeError::SetupOutOfBoard(pos)),
    }
}

fn read_setup(reader: &mut BitReader, replay: &mut Replay, size: usize, width: u32) -> Result<(), DecodeError> {
    replay.begin_setup();
    if reader.get(1)? != 0 {
        for state in Intersection::ALL {
            while let Some(pos) = read_setup_pos(reader, size, width)? {
                replay.setup_rect(pos, pos, state);
            }
            while let Some(lt) = read_setup_pos(reader, size, width)? {
                let rb = read_setup_pos(reader, size, width)?.ok_or(DecodeError::SetupOutOfBoard(size))?;
                replay.setup_rect(lt, rb, state);
            }
        }
    }
    if reader.get(1)? != 0 {
        let color = if reader.get(1)? == 0 { Color::Black } else { Color::White };
        replay.setup_turn(color);
    }
    replay.end_setup();
    Ok(())
}

// =============================================================================
// Readable Form
// =============================================================================
//
// `_dd` place, `-P` pass, `-B` begin branch, `.` end branch, `-R` resign,
// `-S[I<points>.<rects>. x3][T<B|W>]--` setup. Points are SGF letters.

pub struct ReadableFormatter {
    w: usize,
    h: usize,
    out: String,
}

impl ReadableFormatter {
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

    fn put_xy(&mut self, x: usize, y: usize) {
        self.out.push_str(&sgf::to_point_xy(x, y));
    }
}

impl TreeFormatter for ReadableFormatter {
    fn end_tree(&mut self) {
        self.out.push('.');
    }

    fn begin_branch(&mut self, _node: &HistoryNode) {
        self.out.push_str("-B");
    }

    fn end_branch(&mut self, _node: &HistoryNode) {
        self.out.push('.');
    }

    fn put_place(&mut self, pos: Pos, _turn: Color) {
        self.out.push('_');
        self.out.push_str(&sgf::to_point(pos, self.w));
    }

    fn put_pass(&mut self, _turn: Color) {
        self.out.push_str("-P");
    }

    fn put_resign(&mut self, _node: &HistoryNode, _turn: Color) {
        self.out.push_str("-R");
    }

    fn put_setup(&mut self, setup: Option<&BoardDiff>, turn: Color, ctx: NodeContext) {
        if !needs_setup_command(setup, ctx) {
            return;
        }
        self.out.push_str("-S");
        if let Some(setup) = setup {
            if setup.has_intersections() {
                self.out.push('I');
                for (points, rects) in rects_by_state(setup, self.w, self.h) {
                    for p in &points {
                        self.put_xy(p.left, p.top);
                    }
                    self.out.push('.');
                    for r in &rects {
                        self.put_xy(r.left, r.top);
                        self.put_xy(r.right, r.bottom);
                    }
                    self.out.push('.');
                }
            }
            if let Some(change) = setup.turn().filter(|c| c.new != turn) {
                self.out.push('T');
                self.out.push(if change.new == Color::Black { 'B' } else { 'W' });
            }
        }
        self.out.push_str("--");
    }
}

pub fn to_readable(game: &Game, opts: &ExportOptions) -> String {
    let board = game.board();
    let mut formatter = ReadableFormatter::new(board.width(), board.height());
    write_tree(game, opts, &mut formatter);
    formatter.finish()
}

struct TextReader {
    chars: Vec<(usize, char)>,
    i: usize,
    w: usize,
    h: usize,
}

impl TextReader {
    fn new(text: &str, w: usize, h: usize) -> Self {
        Self {
            chars: text.char_indices().collect(),
            i: 0,
            w,
            h,
        }
    }

    fn peek(&self) -> Option<char> {
        self.chars.get(self.i).map(|&(_, c)| c)
    }

    fn next(&mut self) -> Result<(usize, char), DecodeError> {
        let item = *self.chars.get(self.i).ok_or(DecodeError::UnexpectedEnd)?;
        self.i += 1;
        Ok(item)
    }

    fn expect(&mut self, want: char) -> Result<(), DecodeError> {
        match self.next()? {
            (_, ch) if ch == want => Ok(()),
            (offset, ch) => Err(DecodeError::UnexpectedChar { ch, offset }),
        }
    }

    /// Consume `ch` if it is next.
    fn eat(&mut self, ch: char) -> bool {
        let found = self.peek() == Some(ch);
        if found {
            self.i += 1;
        }
        found
    }

    fn pos(&mut self) -> Result<Pos, DecodeError> {
        let (_, a) = self.next()?;
        let (_, b) = self.next()?;
        let value: String = [a, b].iter().collect();
        Ok(sgf::parse_point(&value, self.w, self.h)?)
    }
}

/// Rebuild a game from [`to_readable`] output.
pub fn from_readable(text: &str, w: usize, h: usize) -> Result<Game, DecodeError> {
    check_size(w, h)?;
    let mut reader = TextReader::new(text, w, h);
    let mut replay = Replay::new(w, h);

    loop {
        match reader.next()? {
            (_, '_') => {
                let pos = reader.pos()?;
                replay.place(pos)?;
            }
            (_, '.') => {
                if replay.end_branch() {
                    return Ok(replay.game);
                }
            }
            (_, '-') => match reader.next()? {
                (_, 'P') => replay.pass()?,
                (_, 'B') => replay.begin_branch(),
                (_, 'R') => replay.resign()?,
                (_, 'S') => read_readable_setup(&mut reader, &mut replay)?,
                (offset, ch) => return Err(DecodeError::UnexpectedChar { ch, offset }),
            },
            (offset, ch) => return Err(DecodeError::UnexpectedChar { ch, offset }),
        }
    }
}

fn read_readable_setup(reader: &mut TextReader, replay: &mut Replay) -> Result<(), DecodeError> {
    replay.begin_setup();
    if reader.eat('I') {
        for state in Intersection::ALL {
            while !reader.eat('.') {
                let pos = reader.pos()?;
                replay.setup_rect(pos, pos, state);
            }
            while !reader.eat('.') {
                let lt = reader.pos()?;
                let rb = reader.pos()?;
                replay.setup_rect(lt, rb, state);
            }
        }
    }
    if reader.eat('T') {
        let color = match reader.next()? {
            (_, 'B') => Color::Black,
            (_, 'W') => Color::White,
            (offset, ch) => return Err(DecodeError::UnexpectedChar { ch, offset }),
        };
        replay.setup_turn(color);
    }
    reader.expect('-')?;
    reader.expect('-')?;
    replay.end_setup();
    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::error::MoveError;

    #[test]
    fn test_bit_writer_lsb_first() {
        let mut writer = BitWriter::new();
        writer.put(0b101, 3);
        writer.put(0b11111, 5);
        writer.put(0x1ff, 9);
        let bytes = writer.finish();
        assert_eq!(bytes, vec![0b1111_1101, 0xff, 0x01]);

        let mut reader = BitReader::new(&bytes);
        assert_eq!(reader.get(3), Ok(0b101));
        assert_eq!(reader.get(5), Ok(0b11111));
        assert_eq!(reader.get(9), Ok(0x1ff));
        assert_eq!(reader.get(7), Ok(0));
        assert_eq!(reader.get(1), Err(DecodeError::UnexpectedEnd));
    }

    #[test]
    fn test_token_width() {
        assert_eq!(token_width(9 * 9), 7);
        assert_eq!(token_width(13 * 13), 8);
        assert_eq!(token_width(19 * 19), 9);
        assert_eq!(token_width(1), 3);
        // 124 + 3 = 127 still fits seven bits, 125 + 3 does not.
        assert_eq!(token_width(124), 7);
        assert_eq!(token_width(125), 8);
    }

    #[test]
    fn test_url_safe_alphabet() {
        assert_eq!(encode_url_safe(&[0xfb, 0xff]), "-_8.");
        assert_eq!(decode_url_safe("-_8."), Ok(vec![0xfb, 0xff]));
        assert!(matches!(decode_url_safe("!!"), Err(DecodeError::Base64(_))));
    }

    #[test]
    fn test_readable_output() {
        let mut game = Game::new(9, 9);
        game.put_stone(0);
        game.put_stone(1);
        game.undo();
        game.pass();
        game.undo_all();
        assert_eq!(to_readable(&game, &ExportOptions::default()), "_aa-B_ba.-B-P..");
    }

    #[test]
    fn test_readable_setup() {
        let mut game = Game::new(9, 9);
        game.edit_intersection(0, Intersection::Black);
        game.edit_intersection(1, Intersection::Black);
        game.edit_intersection(9, Intersection::Black);
        game.edit_intersection(10, Intersection::Black);
        game.edit_intersection(40, Intersection::White);
        game.edit_turn(Color::White);
        let text = to_readable(&game, &ExportOptions::default());
        assert_eq!(text, "-SI...aabb.ee..TW--.");

        let decoded = from_readable(&text, 9, 9).unwrap();
        assert_eq!(decoded.board(), game.board());
    }

    #[test]
    fn test_empty_root_setup_keeps_child_separate() {
        let mut game = Game::new(9, 9);
        game.push_setup_node();
        game.edit_turn(Color::White);
        game.undo();
        assert_eq!(game.next_nodes().len(), 1);

        let text = to_readable(&game, &ExportOptions::default());
        assert_eq!(text, "-S---STW--.");
        let decoded = from_readable(&text, 9, 9).unwrap();
        let root = decoded.history().root();
        assert!(decoded.history().node(root).setup().is_none());
        assert_eq!(decoded.next_nodes().len(), 1);

        let code = to_base64(&game, &ExportOptions::default());
        let decoded = from_base64(&code, 9, 9).unwrap();
        assert!(decoded.history().node(root).setup().is_none());
        assert_eq!(decoded.next_nodes().len(), 1);
    }

    #[test]
    fn test_decode_errors() {
        assert_eq!(
            from_base64("AA..", 0, 9).err(),
            Some(DecodeError::BoardSize { width: 0, height: 9 })
        );
        assert_eq!(from_base64("", 9, 9).err(), Some(DecodeError::UnexpectedEnd));

        // Token 81 + 5 on a 9x9 board is not a command.
        let mut writer = BitWriter::new();
        writer.put(86, 7);
        let code = encode_url_safe(&writer.finish());
        assert_eq!(from_base64(&code, 9, 9).err(), Some(DecodeError::UnknownCommand(5)));

        let mut writer = BitWriter::new();
        writer.put(84, 7);
        writer.put(9, SUBCMD_BITS);
        let code = encode_url_safe(&writer.finish());
        assert_eq!(from_base64(&code, 9, 9).err(), Some(DecodeError::UnknownSubcommand(9)));

        let mut writer = BitWriter::new();
        writer.put(0, 7);
        writer.put(0, 7);
        let code = encode_url_safe(&writer.finish());
        assert_eq!(
            from_base64(&code, 9, 9).err(),
            Some(DecodeError::IllegalMove {
                pos: 0,
                source: MoveError::Occupied
            })
        );

        assert_eq!(
            from_readable("_aa_", 9, 9).err(),
            Some(DecodeError::UnexpectedEnd)
        );
        assert_eq!(
            from_readable("-X", 9, 9).err(),
            Some(DecodeError::UnexpectedChar { ch: 'X', offset: 1 })
        );
        assert!(matches!(from_readable("_zz.", 9, 9), Err(DecodeError::Point(_))));
    }

    #[test]
    fn test_pass_after_finish_is_rejected() {
        assert_eq!(
            from_readable("-P-P-P.", 9, 9).err(),
            Some(DecodeError::GameFinished("pass"))
        );
    }
}
