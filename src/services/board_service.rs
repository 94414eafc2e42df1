use std::str::FromStr;

use chess::{BitBoard, Board, BoardStatus, ChessMove, Color as EngineColor, MoveGen, Piece, Square};

use crate::services::errors::board_service_errors::BoardServiceError;

/// Game-ending condition derived from a position (and, for repetition, the
/// preceding position history).
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum TerminalStatus {
    None,
    Checkmate,
    Stalemate,
    ThreefoldRepetition,
    InsufficientMaterial,
}

#[derive(Debug, Clone)]
pub struct MoveOutcome {
    /// Serialized position after the move.
    pub position: String,
    pub san: String,
    pub is_capture: bool,
    pub is_check: bool,
    pub terminal: TerminalStatus,
}

const LIGHT_SQUARES: BitBoard = BitBoard(0x55AA_55AA_55AA_55AA);

/// Wraps the rules engine. Every call constructs a fresh engine instance from
/// the supplied position, so no state can go stale between authoritative
/// mutations.
#[derive(Clone, Default)]
pub struct BoardService;

impl BoardService {
    pub fn new() -> Self {
        BoardService
    }

    /// Validate a move for the side to move in `position` and produce the
    /// resulting position, SAN notation and terminal status (repetition is
    /// checked separately via [`BoardService::terminal_status`]).
    pub fn apply_move(
        &self,
        position: &str,
        from: &str,
        to: &str,
        promotion: Option<char>,
    ) -> Result<MoveOutcome, BoardServiceError> {
        let board = Board::from_str(position)
            .map_err(|e| BoardServiceError::InvalidPosition(e.to_string()))?;

        if board.status() != BoardStatus::Ongoing {
            return Err(BoardServiceError::IllegalMove(
                "Game is already over".to_string(),
            ));
        }

        let from_sq = Square::from_str(from)
            .map_err(|_| BoardServiceError::InvalidSquare(from.to_string()))?;
        let to_sq =
            Square::from_str(to).map_err(|_| BoardServiceError::InvalidSquare(to.to_string()))?;

        let promotion_piece = match promotion {
            Some('q') => Some(Piece::Queen),
            Some('r') => Some(Piece::Rook),
            Some('b') => Some(Piece::Bishop),
            Some('n') => Some(Piece::Knight),
            Some(other) => {
                return Err(BoardServiceError::InvalidPromotion(other.to_string()));
            }
            None => None,
        };

        let chess_move = ChessMove::new(from_sq, to_sq, promotion_piece);
        if !MoveGen::new_legal(&board).any(|m| m == chess_move) {
            return Err(BoardServiceError::IllegalMove(format!(
                "{}{} is not legal in this position",
                from, to
            )));
        }

        let moving_piece = board.piece_on(from_sq);
        let is_capture = board.piece_on(to_sq).is_some()
            || (moving_piece == Some(Piece::Pawn) && from_sq.get_file() != to_sq.get_file());

        let mut after = board;
        board.make_move(chess_move, &mut after);

        let san = san_for_move(&board, chess_move, &after);
        let is_check = after.checkers().popcnt() > 0;
        let terminal = match after.status() {
            BoardStatus::Checkmate => TerminalStatus::Checkmate,
            BoardStatus::Stalemate => TerminalStatus::Stalemate,
            BoardStatus::Ongoing if insufficient_material(&after) => {
                TerminalStatus::InsufficientMaterial
            }
            BoardStatus::Ongoing => TerminalStatus::None,
        };

        Ok(MoveOutcome {
            position: format!("{}", after),
            san,
            is_capture,
            is_check,
            terminal,
        })
    }

    /// Full game-over check over a position, including threefold repetition
    /// against the prior positions of the game.
    pub fn terminal_status(
        &self,
        position: &str,
        prior_positions: &[String],
    ) -> Result<TerminalStatus, BoardServiceError> {
        let board = Board::from_str(position)
            .map_err(|e| BoardServiceError::InvalidPosition(e.to_string()))?;

        match board.status() {
            BoardStatus::Checkmate => return Ok(TerminalStatus::Checkmate),
            BoardStatus::Stalemate => return Ok(TerminalStatus::Stalemate),
            BoardStatus::Ongoing => {}
        }
        if insufficient_material(&board) {
            return Ok(TerminalStatus::InsufficientMaterial);
        }

        let key = repetition_key(position);
        let occurrences = 1 + prior_positions
            .iter()
            .filter(|p| repetition_key(p) == key)
            .count();
        if occurrences >= 3 {
            return Ok(TerminalStatus::ThreefoldRepetition);
        }

        Ok(TerminalStatus::None)
    }

    /// True when the serialized position parses as a legal board.
    pub fn is_valid_position(&self, position: &str) -> bool {
        Board::from_str(position).is_ok()
    }
}

/// Pieces, side to move, castling rights and en-passant square; the clock
/// fields do not count towards repetition.
fn repetition_key(position: &str) -> String {
    position
        .split_whitespace()
        .take(4)
        .collect::<Vec<_>>()
        .join(" ")
}

fn insufficient_material(board: &Board) -> bool {
    let pawns = board.pieces(Piece::Pawn).popcnt();
    let rooks = board.pieces(Piece::Rook).popcnt();
    let queens = board.pieces(Piece::Queen).popcnt();
    if pawns + rooks + queens > 0 {
        return false;
    }

    let knights = board.pieces(Piece::Knight).popcnt();
    let bishops = *board.pieces(Piece::Bishop);
    match knights + bishops.popcnt() {
        0 | 1 => true,
        2 if knights == 0 => {
            // One bishop each, on same-colored squares, cannot force mate.
            let one_each = (bishops & *board.color_combined(EngineColor::White)).popcnt() == 1;
            let light_count = (bishops & LIGHT_SQUARES).popcnt();
            one_each && (light_count == 0 || light_count == 2)
        }
        _ => false,
    }
}

fn san_for_move(board: &Board, chess_move: ChessMove, after: &Board) -> String {
    let source = chess_move.get_source();
    let dest = chess_move.get_dest();
    let piece = match board.piece_on(source) {
        Some(p) => p,
        None => return format!("{}", chess_move),
    };

    let suffix = match after.status() {
        BoardStatus::Checkmate => "#",
        _ if after.checkers().popcnt() > 0 => "+",
        _ => "",
    };

    // Castling is written from the king's perspective.
    if piece == Piece::King {
        let file_delta =
            source.get_file().to_index() as i32 - dest.get_file().to_index() as i32;
        if file_delta.abs() == 2 {
            let body = if dest.get_file().to_index() == 6 {
                "O-O"
            } else {
                "O-O-O"
            };
            return format!("{}{}", body, suffix);
        }
    }

    let is_capture = board.piece_on(dest).is_some()
        || (piece == Piece::Pawn && source.get_file() != dest.get_file());

    let mut san = String::new();
    if piece == Piece::Pawn {
        if is_capture {
            san.push(file_char(source));
            san.push('x');
        }
    } else {
        san.push(piece_letter(piece));
        san.push_str(&disambiguation(board, chess_move, piece));
        if is_capture {
            san.push('x');
        }
    }
    san.push_str(&format!("{}", dest));

    if let Some(promoted) = chess_move.get_promotion() {
        san.push('=');
        san.push(piece_letter(promoted));
    }

    san.push_str(suffix);
    san
}

/// Minimal SAN disambiguation: file if unique, else rank, else both.
fn disambiguation(board: &Board, chess_move: ChessMove, piece: Piece) -> String {
    let source = chess_move.get_source();
    let dest = chess_move.get_dest();

    let mut ambiguous = false;
    let mut shares_file = false;
    let mut shares_rank = false;
    for other in MoveGen::new_legal(board) {
        if other.get_dest() != dest || other.get_source() == source {
            continue;
        }
        if board.piece_on(other.get_source()) != Some(piece) {
            continue;
        }
        ambiguous = true;
        if other.get_source().get_file() == source.get_file() {
            shares_file = true;
        }
        if other.get_source().get_rank() == source.get_rank() {
            shares_rank = true;
        }
    }

    if !ambiguous {
        String::new()
    } else if !shares_file {
        file_char(source).to_string()
    } else if !shares_rank {
        rank_char(source).to_string()
    } else {
        format!("{}{}", file_char(source), rank_char(source))
    }
}

fn piece_letter(piece: Piece) -> char {
    match piece {
        Piece::Pawn => 'P',
        Piece::Knight => 'N',
        Piece::Bishop => 'B',
        Piece::Rook => 'R',
        Piece::Queen => 'Q',
        Piece::King => 'K',
    }
}

fn file_char(square: Square) -> char {
    (b'a' + square.get_file().to_index() as u8) as char
}

fn rank_char(square: Square) -> char {
    (b'1' + square.get_rank().to_index() as u8) as char
}
