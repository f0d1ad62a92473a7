// src/main.rs
use serde::{Deserialize, Serialize};
use std::collections::HashSet;
use std::error::Error;
use std::fmt;
use std::io::{self, Write};
use lazy_static::lazy_static; // For precomputed knight/king step tables

// --- Constants ---

// Ray directions shared by the sliding pieces: (d_row, d_col, is_diagonal)
const DIRECTIONS: &[(i8, i8, bool)] = &[
    ( 1,  0, false), (-1,  0, false), ( 0,  1, false), ( 0, -1, false), // Orthogonal
    ( 1,  1, true),  ( 1, -1, true),  (-1,  1, true),  (-1, -1, true),  // Diagonal
];

// The eight fixed L-shaped knight jumps
const KNIGHT_OFFSETS: &[(i8, i8)] = &[
    ( 2,  1), ( 2, -1), (-2,  1), (-2, -1),
    ( 1,  2), ( 1, -2), (-1,  2), (-1, -2),
];

// The eight unit king steps
const KING_OFFSETS: &[(i8, i8)] = &[
    ( 1,  0), (-1,  0), ( 0,  1), ( 0, -1),
    ( 1,  1), ( 1, -1), (-1,  1), (-1, -1),
];

// --- Enums and Basic Structs ---

#[derive(Debug, Serialize, Deserialize, Copy, Clone, PartialEq, Eq, Hash)]
enum Side { White, Black }

impl Side {
    fn opponent(&self) -> Side {
        match self { Side::White => Side::Black, Side::Black => Side::White }
    }
    /// Row this side's pawns start on (double-step eligibility).
    fn pawn_start_row(&self) -> u8 {
        match self { Side::White => 1, Side::Black => 6 }
    }
    /// Far rank; a pawn landing here becomes a queen.
    fn promotion_row(&self) -> u8 {
        match self { Side::White => 7, Side::Black => 0 }
    }
    /// Forward direction along the row axis.
    fn forward(&self) -> i8 {
        match self { Side::White => 1, Side::Black => -1 }
    }
}

#[derive(Debug, Serialize, Deserialize, Copy, Clone, PartialEq, Eq, Hash)]
enum PieceKind { Pawn, Rook, Knight, Bishop, Queen, King }

#[derive(Debug, Serialize, Deserialize, Copy, Clone, PartialEq, Eq, Hash)]
struct Piece {
    kind: PieceKind,
    side: Side,
}

impl Piece {
    fn new(kind: PieceKind, side: Side) -> Self { Piece { kind, side } }
}

impl fmt::Display for Piece {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let symbol = match self.kind {
            PieceKind::Pawn => 'p', PieceKind::Knight => 'n', PieceKind::Bishop => 'b',
            PieceKind::Rook => 'r', PieceKind::Queen => 'q', PieceKind::King => 'k',
        };
        let symbol = match self.side {
            Side::White => symbol.to_ascii_uppercase(),
            Side::Black => symbol,
        };
        write!(f, "{}", symbol)
    }
}

/// Board coordinate. Row 0 is White's home rank, row 7 is Black's.
#[derive(Debug, Serialize, Deserialize, Copy, Clone, PartialEq, Eq, Hash, PartialOrd, Ord)]
struct Square {
    row: u8,
    col: u8,
}

impl Square {
    fn new(row: u8, col: u8) -> Self { Square { row, col } }

    #[inline]
    fn in_bounds(&self) -> bool { self.row <= 7 && self.col <= 7 }

    /// Linear index 0-63 for the precomputed step tables.
    #[inline]
    fn index(&self) -> usize { (self.row as usize) * 8 + self.col as usize }

    /// Steps by a signed offset; None past the board edge.
    #[inline]
    fn offset(&self, d_row: i8, d_col: i8) -> Option<Square> {
        let row = self.row as i8 + d_row;
        let col = self.col as i8 + d_col;
        if (0..8).contains(&row) && (0..8).contains(&col) {
            Some(Square::new(row as u8, col as u8))
        } else {
            None
        }
    }

    /// Parses coordinates like "e2". Does not validate anything beyond format.
    fn from_algebraic(s: &str) -> Option<Square> {
        if s.len() != 2 { return None; }
        let mut chars = s.chars();
        let file_char = chars.next()?;
        let rank_char = chars.next()?;
        let col = match file_char { 'a'..='h' => file_char as u8 - b'a', _ => return None };
        let row = match rank_char { '1'..='8' => rank_char as u8 - b'1', _ => return None };
        Some(Square::new(row, col))
    }
}

impl fmt::Display for Square {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        if !self.in_bounds() { return write!(f, "??"); }
        let file_char = (b'a' + self.col) as char;
        let rank_char = (b'1' + self.row) as char;
        write!(f, "{}{}", file_char, rank_char)
    }
}

// --- Precomputed Step Tables ---

lazy_static! {
    static ref KNIGHT_TARGETS: [Vec<Square>; 64] = compute_step_targets(KNIGHT_OFFSETS);
    static ref KING_TARGETS: [Vec<Square>; 64] = compute_step_targets(KING_OFFSETS);
}

/// In-bounds destination list for a fixed-offset piece, per origin square.
fn compute_step_targets(offsets: &[(i8, i8)]) -> [Vec<Square>; 64] {
    std::array::from_fn(|idx| {
        let from = Square::new((idx / 8) as u8, (idx % 8) as u8);
        offsets.iter().filter_map(|&(d_row, d_col)| from.offset(d_row, d_col)).collect()
    })
}

// --- Board State ---

/// 8x8 mailbox grid. At most one piece per square; exactly one king per side
/// is a setup precondition, not something the engine enforces.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
struct Board {
    grid: [[Option<Piece>; 8]; 8],
}

impl Board {
    fn empty() -> Self {
        Board { grid: [[None; 8]; 8] }
    }

    /// Standard starting position: pawns on rows 1/6, back ranks on rows 0/7.
    fn initial() -> Self {
        let back_rank = [
            PieceKind::Rook, PieceKind::Knight, PieceKind::Bishop, PieceKind::Queen,
            PieceKind::King, PieceKind::Bishop, PieceKind::Knight, PieceKind::Rook,
        ];
        let mut board = Board::empty();
        for col in 0..8u8 {
            board.place(Piece::new(back_rank[col as usize], Side::White), Square::new(0, col));
            board.place(Piece::new(PieceKind::Pawn, Side::White), Square::new(1, col));
            board.place(Piece::new(PieceKind::Pawn, Side::Black), Square::new(6, col));
            board.place(Piece::new(back_rank[col as usize], Side::Black), Square::new(7, col));
        }
        board
    }

    #[inline]
    fn piece_at(&self, square: Square) -> Option<Piece> {
        self.grid[square.row as usize][square.col as usize]
    }

    fn place(&mut self, piece: Piece, square: Square) {
        self.grid[square.row as usize][square.col as usize] = Some(piece);
    }

    fn remove(&mut self, square: Square) -> Option<Piece> {
        self.grid[square.row as usize][square.col as usize].take()
    }

    /// Relocates from -> to, clearing any occupant at `to` first.
    /// Returns the captured piece, if any.
    fn move_piece(&mut self, from: Square, to: Square) -> Option<Piece> {
        let captured = self.remove(to);
        let moving = self.remove(from);
        self.grid[to.row as usize][to.col as usize] = moving;
        captured
    }

    /// Scans all 64 cells. None only when the one-king precondition is broken.
    fn find_king(&self, side: Side) -> Option<Square> {
        self.pieces()
            .find(|&(_, piece)| piece.kind == PieceKind::King && piece.side == side)
            .map(|(square, _)| square)
    }

    /// Iterates every occupied square in row-major order.
    fn pieces(&self) -> impl Iterator<Item = (Square, Piece)> + '_ {
        (0..8u8).flat_map(move |row| {
            (0..8u8).filter_map(move |col| {
                let square = Square::new(row, col);
                self.piece_at(square).map(|piece| (square, piece))
            })
        })
    }
}

impl fmt::Display for Board {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        writeln!(f, "  +-----------------+")?;
        for row in (0..8u8).rev() {
            write!(f, "{} | ", row + 1)?;
            for col in 0..8u8 {
                match self.piece_at(Square::new(row, col)) {
                    Some(piece) => write!(f, "{} ", piece)?,
                    None => write!(f, ". ")?,
                }
            }
            writeln!(f, "|")?;
        }
        writeln!(f, "  +-----------------+")?;
        writeln!(f, "    a b c d e f g h")
    }
}

// --- Move Generator (Pseudo-Legal) ---

/// Destinations obeying movement and occupancy rules only. A pseudo-legal
/// move may still leave the mover's own king attacked.
fn pseudo_legal_moves(board: &Board, from: Square) -> Result<HashSet<Square>, EngineError> {
    if !from.in_bounds() { return Err(EngineError::OutOfBounds(from)); }
    let piece = board.piece_at(from).ok_or(EngineError::EmptySquare(from))?;

    let mut moves = HashSet::new();
    match piece.kind {
        PieceKind::Pawn => pawn_moves(board, from, piece.side, &mut moves),
        PieceKind::Rook => sliding_moves(board, from, piece.side, false, true, &mut moves),
        PieceKind::Bishop => sliding_moves(board, from, piece.side, true, false, &mut moves),
        PieceKind::Queen => sliding_moves(board, from, piece.side, true, true, &mut moves),
        PieceKind::Knight => step_moves(board, piece.side, &KNIGHT_TARGETS[from.index()], &mut moves),
        PieceKind::King => step_moves(board, piece.side, &KING_TARGETS[from.index()], &mut moves),
    }
    Ok(moves)
}

/// Pawn pushes and diagonal captures. No en passant; promotion is handled at
/// move application, not generation.
#[inline]
fn pawn_moves(board: &Board, from: Square, side: Side, moves: &mut HashSet<Square>) {
    let forward = side.forward();

    // Single push, and the double push riding on it from the start row
    if let Some(one) = from.offset(forward, 0) {
        if board.piece_at(one).is_none() {
            moves.insert(one);
            if from.row == side.pawn_start_row() {
                if let Some(two) = from.offset(2 * forward, 0) {
                    if board.piece_at(two).is_none() {
                        moves.insert(two);
                    }
                }
            }
        }
    }

    // Diagonal captures, only onto opposing pieces
    for d_col in [-1i8, 1] {
        if let Some(target) = from.offset(forward, d_col) {
            if board.piece_at(target).map_or(false, |p| p.side != side) {
                moves.insert(target);
            }
        }
    }
}

/// Ray walks for rook/bishop/queen. A ray ends exclusively on a friendly
/// blocker and inclusively on an opposing one.
#[inline]
fn sliding_moves(
    board: &Board,
    from: Square,
    side: Side,
    diagonals: bool,
    orthogonals: bool,
    moves: &mut HashSet<Square>,
) {
    for &(d_row, d_col, is_diagonal) in DIRECTIONS {
        if (diagonals && is_diagonal) || (orthogonals && !is_diagonal) {
            let mut current = from;
            while let Some(next) = current.offset(d_row, d_col) {
                match board.piece_at(next) {
                    None => {
                        moves.insert(next);
                        current = next;
                    }
                    Some(blocker) => {
                        if blocker.side != side {
                            moves.insert(next);
                        }
                        break;
                    }
                }
            }
        }
    }
}

/// Fixed-offset pieces (knight, king): empty or opposing targets only.
#[inline]
fn step_moves(board: &Board, side: Side, targets: &[Square], moves: &mut HashSet<Square>) {
    for &to in targets {
        if board.piece_at(to).map_or(true, |p| p.side != side) {
            moves.insert(to);
        }
    }
}

// --- Legal Move Generation ---

/// Pseudo-legal moves filtered for king safety: each candidate is applied to
/// a deep scratch copy of the board, and kept only if the mover's own king is
/// not attacked afterwards. Simulated moves never touch the real board.
fn legal_moves(board: &Board, from: Square) -> Result<HashSet<Square>, EngineError> {
    if !from.in_bounds() { return Err(EngineError::OutOfBounds(from)); }
    let piece = board.piece_at(from).ok_or(EngineError::EmptySquare(from))?;

    let candidates = pseudo_legal_moves(board, from)?;
    let mut legal = HashSet::with_capacity(candidates.len());
    for to in candidates {
        let mut scratch = board.clone();
        scratch.move_piece(from, to);
        if !is_in_check(&scratch, piece.side)? {
            legal.insert(to);
        }
    }
    Ok(legal)
}

// --- Check Validator ---

/// Whether `side`'s king is attacked by any opposing piece's pseudo-legal
/// move. Only pseudo-legal generation is consulted here; routing through
/// `legal_moves` would recurse without bound. A missing king is a corrupted
/// position and is reported as an error, never as "not in check".
fn is_in_check(board: &Board, side: Side) -> Result<bool, EngineError> {
    let king_square = board.find_king(side).ok_or(EngineError::KingMissing(side))?;
    for (square, piece) in board.pieces() {
        if piece.side == side { continue; }
        if pseudo_legal_moves(board, square)?.contains(&king_square) {
            return Ok(true);
        }
    }
    Ok(false)
}

// --- Move Application ---

/// Outcome of a committed move, for the caller's display/animation layer.
#[derive(Debug, Serialize, Deserialize, Copy, Clone, PartialEq, Eq)]
struct MoveResult {
    /// Occupant of the destination square, removed before relocation.
    captured: Option<Piece>,
    /// Some(Queen) when a pawn reached the far rank.
    promotion: Option<PieceKind>,
    /// Check status of the side now to move, against the post-move board.
    opponent_in_check: bool,
}

// --- Game Session ---

/// Owns the board, the turn flag, and the transient selection. The turn flag
/// mutates only on successful move application; the selection clears after
/// every move attempt and on invalid reselection.
#[derive(Debug, Clone, Serialize, Deserialize)]
struct Session {
    board: Board,
    turn: Side,
    selection: Option<Square>,
}

impl Session {
    /// New game: standard setup, White to move.
    fn new() -> Self {
        Session { board: Board::initial(), turn: Side::White, selection: None }
    }

    /// Arbitrary position. Board creation and reset belong to the caller.
    #[allow(dead_code)] // Setup entry point for hosts and tests
    fn with_position(board: Board, turn: Side) -> Self {
        Session { board, turn, selection: None }
    }

    fn board(&self) -> &Board { &self.board }

    fn turn(&self) -> Side { self.turn }

    #[allow(dead_code)] // Read by hosts that render the selected square
    fn selection(&self) -> Option<Square> { self.selection }

    /// Selects the piece at `square` if it belongs to the side to move and
    /// returns its legal destinations. Selecting an empty square or an
    /// opposing piece clears the selection instead.
    fn select(&mut self, square: Square) -> Result<Option<HashSet<Square>>, EngineError> {
        if !square.in_bounds() { return Err(EngineError::OutOfBounds(square)); }
        match self.board.piece_at(square) {
            Some(piece) if piece.side == self.turn => {
                let moves = legal_moves(&self.board, square)?;
                self.selection = Some(square);
                Ok(Some(moves))
            }
            _ => {
                self.selection = None;
                Ok(None)
            }
        }
    }

    /// Commits a move the caller has already validated against `legal_moves`.
    /// Captures the destination occupant, relocates, auto-promotes a pawn on
    /// the far rank to a queen, toggles the turn, and computes the opponent's
    /// check status -- all before returning. There is no rollback.
    fn apply_move(&mut self, from: Square, to: Square) -> Result<MoveResult, EngineError> {
        if !from.in_bounds() { return Err(EngineError::OutOfBounds(from)); }
        if !to.in_bounds() { return Err(EngineError::OutOfBounds(to)); }
        let piece = self.board.piece_at(from).ok_or(EngineError::EmptySquare(from))?;
        self.selection = None;

        let captured = self.board.move_piece(from, to);

        let promotion = if piece.kind == PieceKind::Pawn && to.row == piece.side.promotion_row() {
            self.board.place(Piece::new(PieceKind::Queen, piece.side), to);
            Some(PieceKind::Queen)
        } else {
            None
        };

        let opponent = piece.side.opponent();
        self.turn = opponent;
        let opponent_in_check = is_in_check(&self.board, opponent)?;

        Ok(MoveResult { captured, promotion, opponent_in_check })
    }
}

impl fmt::Display for Session {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.board)?;
        writeln!(f, "Turn: {:?}", self.turn)?;
        match is_in_check(&self.board, self.turn) {
            Ok(true) => writeln!(f, "{:?} is in check!", self.turn)?,
            Ok(false) => {}
            Err(e) => writeln!(f, "(invalid position: {})", e)?,
        }
        Ok(())
    }
}

// --- Custom Error Types ---

/// Precondition violations. None of these are recoverable mid-game; they all
/// indicate a corrupted position or an unvalidated caller request.
#[derive(Debug, Copy, Clone, PartialEq, Eq)]
enum EngineError {
    KingMissing(Side),
    OutOfBounds(Square),
    EmptySquare(Square),
}

impl fmt::Display for EngineError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            EngineError::KingMissing(side) => write!(f, "No {:?} king on the board; position is corrupt.", side),
            EngineError::OutOfBounds(square) => write!(f, "Square ({}, {}) is outside the board.", square.row, square.col),
            EngineError::EmptySquare(square) => write!(f, "No piece at {}.", square),
        }
    }
}

impl Error for EngineError {}

#[derive(Debug)]
enum CommandError {
    InvalidSquare(String),
    InvalidFormat(String),
}

impl fmt::Display for CommandError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            CommandError::InvalidSquare(s) => write!(f, "Invalid square: '{}'. Use file a-h and rank 1-8, e.g. 'e2'.", s),
            CommandError::InvalidFormat(s) => write!(f, "Invalid input: '{}'. Use 'e2' to select, 'e2e4' to move, or 'help'.", s),
        }
    }
}

impl Error for CommandError {}

// --- Input Parsing ---

#[derive(Debug)]
enum UserInput {
    Select(Square),
    Move(Square, Square),
    Command(Command),
}

#[derive(Debug)]
enum Command { Help, Quit }

/// Parses user input into a selection ("e2"), a move ("e2e4"), or a command.
fn parse_user_input(input: &str) -> Result<UserInput, CommandError> {
    let trimmed = input.trim();

    match trimmed.to_lowercase().as_str() {
        "help" | "?" => return Ok(UserInput::Command(Command::Help)),
        "quit" | "exit" => return Ok(UserInput::Command(Command::Quit)),
        _ => {}
    }

    if !trimmed.is_ascii() {
        return Err(CommandError::InvalidFormat(trimmed.to_string()));
    }

    match trimmed.len() {
        2 => Square::from_algebraic(trimmed)
            .map(UserInput::Select)
            .ok_or_else(|| CommandError::InvalidSquare(trimmed.to_string())),
        4 => {
            let from = Square::from_algebraic(&trimmed[0..2])
                .ok_or_else(|| CommandError::InvalidSquare(trimmed[0..2].to_string()))?;
            let to = Square::from_algebraic(&trimmed[2..4])
                .ok_or_else(|| CommandError::InvalidSquare(trimmed[2..4].to_string()))?;
            Ok(UserInput::Move(from, to))
        }
        _ => Err(CommandError::InvalidFormat(trimmed.to_string())),
    }
}

// --- Main Game Loop ---

fn main() -> Result<(), Box<dyn Error>> {
    println!("==============================");
    println!("|         Grid Chess         |");
    println!("==============================");
    print_help();

    let mut session = Session::new();

    'game_loop: loop {
        println!("------------------------------------------");
        println!("{}", session);

        print!("{:?}'s turn. Enter square (e2), move (e2e4), or command: ", session.turn());
        io::stdout().flush()?;

        let mut input_line = String::new();
        match io::stdin().read_line(&mut input_line) {
            Ok(0) => { // EOF detected
                println!("\nEnd of input detected. Exiting game.");
                break 'game_loop;
            }
            Ok(_) => { /* Input received */ }
            Err(e) => {
                eprintln!("Error reading input: {}. Try again or use 'quit'.", e);
                continue 'game_loop;
            }
        }

        let input_trimmed = input_line.trim();
        if input_trimmed.is_empty() { continue 'game_loop; }

        match parse_user_input(input_trimmed) {
            // --- Selection: lists the legal destinations for highlighting ---
            Ok(UserInput::Select(square)) => {
                match session.select(square) {
                    Ok(Some(moves)) => {
                        let mut destinations: Vec<Square> = moves.into_iter().collect();
                        destinations.sort();
                        if destinations.is_empty() {
                            println!("{} has no legal moves.", square);
                        } else {
                            let listed: Vec<String> =
                                destinations.iter().map(|sq| sq.to_string()).collect();
                            println!("Legal moves from {}: {}", square, listed.join(" "));
                        }
                    }
                    Ok(None) => println!("No {:?} piece on {} to select.", session.turn(), square),
                    Err(e) => println!("Error: {}", e),
                }
            }

            // --- Move: validated against legal_moves before committing ---
            Ok(UserInput::Move(from, to)) => {
                let owns_piece = session
                    .board()
                    .piece_at(from)
                    .map_or(false, |p| p.side == session.turn());
                if !owns_piece {
                    println!("No {:?} piece on {} to move.", session.turn(), from);
                    continue 'game_loop;
                }
                let destinations = match legal_moves(session.board(), from) {
                    Ok(moves) => moves,
                    Err(e) => {
                        println!("Error: {}", e);
                        continue 'game_loop;
                    }
                };
                if !destinations.contains(&to) {
                    println!("Illegal move: {} -> {}.", from, to);
                    continue 'game_loop;
                }
                match session.apply_move(from, to) {
                    Ok(result) => {
                        if let Some(captured) = result.captured {
                            println!("Captured {:?} {:?} on {}.", captured.side, captured.kind, to);
                        }
                        if result.promotion.is_some() {
                            println!("Pawn promoted to Queen on {}.", to);
                        }
                        if result.opponent_in_check {
                            println!("{:?} is in check!", session.turn());
                        }
                    }
                    Err(e) => println!("Error applying move: {}", e),
                }
            }

            // --- Commands ---
            Ok(UserInput::Command(Command::Help)) => print_help(),
            Ok(UserInput::Command(Command::Quit)) => {
                println!("Exiting game.");
                break 'game_loop;
            }

            Err(e) => println!("Input Error: {}", e),
        }
    }

    println!("\nGame session finished.");
    Ok(())
}

/// Prints available input forms.
fn print_help() {
    println!("\nAvailable input:");
    println!("  <square>       Select one of your pieces and list its legal moves (e.g. e2).");
    println!("  <from><to>     Move a piece (e.g. e2e4). Captures happen automatically;");
    println!("                 a pawn reaching the far rank promotes to a queen.");
    println!("  help           Show this help message.");
    println!("  quit / exit    Exit the game.");
    println!();
}

// --- Tests ---

#[cfg(test)]
mod tests {
    use super::*;
    use rand::rngs::StdRng;
    use rand::{RngCore, SeedableRng};

    fn sq(row: u8, col: u8) -> Square {
        Square::new(row, col)
    }

    fn board_with(pieces: &[(PieceKind, Side, Square)]) -> Board {
        let mut board = Board::empty();
        for &(kind, side, square) in pieces {
            board.place(Piece::new(kind, side), square);
        }
        board
    }

    fn squares(list: &[Square]) -> HashSet<Square> {
        list.iter().copied().collect()
    }

    #[test]
    fn pseudo_moves_stay_on_board_and_off_friendly_squares() {
        let board = Board::initial();
        for (from, piece) in board.pieces() {
            for to in pseudo_legal_moves(&board, from).unwrap() {
                assert!(to.in_bounds(), "{} -> {} leaves the board", from, to);
                assert!(
                    board.piece_at(to).map_or(true, |p| p.side != piece.side),
                    "{} -> {} lands on a friendly piece",
                    from,
                    to
                );
            }
        }
    }

    #[test]
    fn sliding_rays_stop_at_blockers() {
        let board = board_with(&[
            (PieceKind::Rook, Side::White, sq(3, 3)),
            (PieceKind::Pawn, Side::White, sq(3, 5)),
            (PieceKind::Pawn, Side::Black, sq(5, 3)),
        ]);
        let moves = pseudo_legal_moves(&board, sq(3, 3)).unwrap();

        // Friendly blocker: ray ends before it
        assert!(moves.contains(&sq(3, 4)));
        assert!(!moves.contains(&sq(3, 5)));
        assert!(!moves.contains(&sq(3, 6)));

        // Opposing blocker: ray ends on it, never past it
        assert!(moves.contains(&sq(4, 3)));
        assert!(moves.contains(&sq(5, 3)));
        assert!(!moves.contains(&sq(6, 3)));
        assert!(!moves.contains(&sq(7, 3)));
    }

    #[test]
    fn initial_corner_rook_is_fully_blocked() {
        let board = Board::initial();
        assert!(pseudo_legal_moves(&board, sq(0, 0)).unwrap().is_empty());
    }

    #[test]
    fn legal_moves_are_a_subset_of_pseudo_legal_moves() {
        let board = Board::initial();
        for (from, _) in board.pieces() {
            let pseudo = pseudo_legal_moves(&board, from).unwrap();
            let legal = legal_moves(&board, from).unwrap();
            assert!(legal.is_subset(&pseudo), "legal exceeds pseudo from {}", from);
        }
    }

    #[test]
    fn reverse_move_restores_positions_but_not_captures() {
        let original = board_with(&[
            (PieceKind::Rook, Side::White, sq(0, 0)),
            (PieceKind::Pawn, Side::Black, sq(0, 5)),
            (PieceKind::King, Side::White, sq(4, 4)),
            (PieceKind::King, Side::Black, sq(7, 7)),
        ]);
        let mut session = Session::with_position(original.clone(), Side::White);

        let result = session.apply_move(sq(0, 0), sq(0, 5)).unwrap();
        assert_eq!(result.captured, Some(Piece::new(PieceKind::Pawn, Side::Black)));
        session.apply_move(sq(0, 5), sq(0, 0)).unwrap();

        // The rook is back, the captured pawn is not.
        assert_eq!(
            session.board().piece_at(sq(0, 0)),
            Some(Piece::new(PieceKind::Rook, Side::White))
        );
        assert_eq!(session.board().piece_at(sq(0, 5)), None);
        for (square, piece) in original.pieces() {
            if square == sq(0, 5) { continue; } // The one difference: capture is not reversible
            assert_eq!(session.board().piece_at(square), Some(piece));
        }
    }

    #[test]
    fn white_pawn_promotes_to_queen_on_far_rank() {
        let mut session = Session::with_position(
            board_with(&[
                (PieceKind::Pawn, Side::White, sq(6, 0)),
                (PieceKind::King, Side::White, sq(0, 4)),
                (PieceKind::King, Side::Black, sq(7, 7)),
            ]),
            Side::White,
        );
        let result = session.apply_move(sq(6, 0), sq(7, 0)).unwrap();
        assert_eq!(result.promotion, Some(PieceKind::Queen));
        assert_eq!(
            session.board().piece_at(sq(7, 0)),
            Some(Piece::new(PieceKind::Queen, Side::White))
        );
        // The new queen checks the black king along row 7, and it is Black's move.
        assert!(result.opponent_in_check);
        assert_eq!(session.turn(), Side::Black);
    }

    #[test]
    fn black_pawn_promotes_to_queen_on_row_zero() {
        let mut session = Session::with_position(
            board_with(&[
                (PieceKind::Pawn, Side::Black, sq(1, 2)),
                (PieceKind::King, Side::White, sq(5, 0)),
                (PieceKind::King, Side::Black, sq(7, 7)),
            ]),
            Side::Black,
        );
        let result = session.apply_move(sq(1, 2), sq(0, 2)).unwrap();
        assert_eq!(result.promotion, Some(PieceKind::Queen));
        assert_eq!(
            session.board().piece_at(sq(0, 2)),
            Some(Piece::new(PieceKind::Queen, Side::Black))
        );
        assert!(!result.opponent_in_check);
        assert_eq!(session.turn(), Side::White);
    }

    #[test]
    fn e2_pawn_has_exactly_the_two_forward_pushes() {
        let board = Board::initial();
        let moves = legal_moves(&board, sq(1, 4)).unwrap();
        assert_eq!(moves, squares(&[sq(2, 4), sq(3, 4)]));
    }

    #[test]
    fn double_push_blocked_by_intermediate_piece() {
        let mut board = Board::initial();
        board.place(Piece::new(PieceKind::Knight, Side::Black), sq(2, 4));
        assert!(pseudo_legal_moves(&board, sq(1, 4)).unwrap().is_empty());
    }

    #[test]
    fn back_rank_queen_gives_check_along_a_clear_rank() {
        let board = board_with(&[
            (PieceKind::King, Side::White, sq(0, 4)),
            (PieceKind::Queen, Side::Black, sq(0, 0)),
            (PieceKind::King, Side::Black, sq(7, 7)),
        ]);
        assert!(is_in_check(&board, Side::White).unwrap());
        assert!(!is_in_check(&board, Side::Black).unwrap());
    }

    #[test]
    fn boxed_in_king_has_no_moves_and_is_not_in_check() {
        let board = board_with(&[
            (PieceKind::King, Side::White, sq(0, 4)),
            (PieceKind::Pawn, Side::White, sq(0, 3)),
            (PieceKind::Pawn, Side::White, sq(0, 5)),
            (PieceKind::Pawn, Side::White, sq(1, 3)),
            (PieceKind::Pawn, Side::White, sq(1, 4)),
            (PieceKind::Pawn, Side::White, sq(1, 5)),
            (PieceKind::King, Side::Black, sq(7, 0)),
        ]);
        assert!(legal_moves(&board, sq(0, 4)).unwrap().is_empty());
        assert!(!is_in_check(&board, Side::White).unwrap());
    }

    #[test]
    fn pinned_rook_may_only_move_along_the_pin_ray() {
        let board = board_with(&[
            (PieceKind::King, Side::White, sq(0, 4)),
            (PieceKind::Rook, Side::White, sq(1, 4)),
            (PieceKind::Queen, Side::Black, sq(7, 4)),
            (PieceKind::King, Side::Black, sq(7, 0)),
        ]);
        let pseudo = pseudo_legal_moves(&board, sq(1, 4)).unwrap();
        let legal = legal_moves(&board, sq(1, 4)).unwrap();

        // Sideways moves exist pseudo-legally but would expose the king.
        assert!(pseudo.contains(&sq(1, 0)));
        assert!(!legal.contains(&sq(1, 0)));

        // Along the pin ray: advance, block, or capture the pinning queen.
        let expected: HashSet<Square> = (2..8).map(|row| sq(row, 4)).collect();
        assert_eq!(legal, expected);
    }

    #[test]
    fn missing_king_is_a_distinct_failure_not_a_no_check_answer() {
        let board = board_with(&[(PieceKind::Queen, Side::Black, sq(0, 0))]);
        assert_eq!(
            is_in_check(&board, Side::White),
            Err(EngineError::KingMissing(Side::White))
        );
    }

    #[test]
    fn queries_on_empty_or_out_of_range_squares_fail_loudly() {
        let board = Board::initial();
        assert_eq!(
            pseudo_legal_moves(&board, sq(4, 4)),
            Err(EngineError::EmptySquare(sq(4, 4)))
        );
        assert_eq!(
            legal_moves(&board, sq(8, 0)),
            Err(EngineError::OutOfBounds(sq(8, 0)))
        );

        let mut session = Session::new();
        assert_eq!(
            session.apply_move(sq(4, 4), sq(5, 4)),
            Err(EngineError::EmptySquare(sq(4, 4)))
        );
    }

    #[test]
    fn selection_gates_on_turn_and_clears_on_invalid_reselection() {
        let mut session = Session::new();

        let moves = session.select(sq(1, 4)).unwrap();
        assert_eq!(moves, Some(squares(&[sq(2, 4), sq(3, 4)])));
        assert_eq!(session.selection(), Some(sq(1, 4)));

        // Opposing piece: selection clears.
        assert!(session.select(sq(6, 0)).unwrap().is_none());
        assert_eq!(session.selection(), None);

        // Empty square: selection clears too.
        session.select(sq(1, 4)).unwrap();
        assert!(session.select(sq(4, 4)).unwrap().is_none());
        assert_eq!(session.selection(), None);
    }

    #[test]
    fn apply_move_toggles_turn_and_clears_selection() {
        let mut session = Session::new();
        session.select(sq(1, 4)).unwrap();
        let result = session.apply_move(sq(1, 4), sq(3, 4)).unwrap();

        assert_eq!(result.captured, None);
        assert_eq!(result.promotion, None);
        assert!(!result.opponent_in_check);
        assert_eq!(session.turn(), Side::Black);
        assert_eq!(session.selection(), None);
    }

    #[test]
    fn simulated_candidates_never_mutate_the_real_board() {
        let board = Board::initial();
        let snapshot = board.clone();
        legal_moves(&board, sq(0, 1)).unwrap();
        legal_moves(&board, sq(1, 4)).unwrap();
        assert_eq!(board, snapshot);
    }

    #[test]
    fn seeded_self_play_preserves_engine_invariants() {
        let mut rng = StdRng::seed_from_u64(0xDEADBEEFCAFEBABE);
        let mut session = Session::new();

        for _ply in 0..60 {
            let side = session.turn();
            let mut all_moves: Vec<(Square, Square)> = Vec::new();
            for (from, piece) in session.board().pieces() {
                if piece.side != side { continue; }
                let pseudo = pseudo_legal_moves(session.board(), from).unwrap();
                let legal = legal_moves(session.board(), from).unwrap();
                assert!(legal.is_subset(&pseudo));
                for to in legal {
                    all_moves.push((from, to));
                }
            }
            if all_moves.is_empty() {
                break; // Mate or stalemate; declaring either is out of scope
            }
            all_moves.sort();
            let (from, to) = all_moves[(rng.next_u64() % all_moves.len() as u64) as usize];
            session.apply_move(from, to).unwrap();

            // A legal move never leaves the mover's own king attacked,
            // and both kings survive the whole playout.
            assert!(!is_in_check(session.board(), side).unwrap());
            assert!(session.board().find_king(Side::White).is_some());
            assert!(session.board().find_king(Side::Black).is_some());
        }
    }
}
