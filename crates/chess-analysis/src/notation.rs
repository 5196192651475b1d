//! Game records: PGN/SAN parsing, replay and FEN helpers.
//!
//! Wraps `shakmaty` for move legality. A [`GameRecord`] holds every played
//! move together with the FEN before and after it, which is all the
//! analyzers need from a game.

use std::collections::BTreeMap;

use serde::{Deserialize, Serialize};
use shakmaty::fen::Fen;
use shakmaty::san::{San, SanPlus};
use shakmaty::uci::UciMove;
use shakmaty::{CastlingMode, Chess, Color, EnPassantMode, Move, Position, Role};
use thiserror::Error;

/// FEN of the standard starting position.
pub const STARTING_FEN: &str = "rnbqkbnr/pppppppp/8/8/8/8/PPPPPPPP/RNBQKBNR w KQkq - 0 1";

/// Errors produced while reading notation.
#[derive(Error, Debug, Clone, PartialEq, Eq)]
pub enum NotationError {
    #[error("Empty game record")]
    Empty,
    #[error("Invalid FEN '{fen}': {reason}")]
    InvalidFen { fen: String, reason: String },
    #[error("Unparseable move '{token}' at ply {ply}")]
    UnparseableMove { ply: usize, token: String },
    #[error("Illegal move '{token}' at ply {ply}")]
    IllegalMove { ply: usize, token: String },
    #[error("Malformed PGN: {0}")]
    Malformed(String),
}

/// Players and source information for a game.
///
/// This is the shape game-archive clients hand over alongside the PGN text.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct GameMetadata {
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub source: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub game_id: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub white: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub black: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub white_rating: Option<u32>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub black_rating: Option<u32>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub result: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub time_control: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub url: Option<String>,
}

impl GameMetadata {
    /// Fill fields from PGN tag pairs. Existing values win.
    pub fn merge_headers(&mut self, headers: &BTreeMap<String, String>) {
        let tag = |name: &str| {
            headers
                .get(name)
                .filter(|v| !v.is_empty() && v.as_str() != "?")
                .cloned()
        };
        self.white = self.white.take().or_else(|| tag("White"));
        self.black = self.black.take().or_else(|| tag("Black"));
        self.result = self.result.take().or_else(|| tag("Result"));
        self.time_control = self.time_control.take().or_else(|| tag("TimeControl"));
        self.url = self.url.take().or_else(|| tag("Site").filter(|s| s.starts_with("http")));
        self.white_rating = self
            .white_rating
            .or_else(|| tag("WhiteElo").and_then(|v| v.parse().ok()));
        self.black_rating = self
            .black_rating
            .or_else(|| tag("BlackElo").and_then(|v| v.parse().ok()));
    }
}

/// A raw game as delivered by a remote archive.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct ArchivedGame {
    pub pgn_text: String,
    #[serde(default)]
    pub metadata: GameMetadata,
}

/// One move of a game with the positions around it.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct PlayedMove {
    /// Zero-based half-move index.
    pub ply: usize,
    /// Standard algebraic notation, without check suffix.
    pub san: String,
    /// UCI notation, e.g. `e2e4`.
    pub uci: String,
    /// Origin square, e.g. `e2`.
    pub from: String,
    /// Destination square, e.g. `e4`.
    pub to: String,
    /// True if White played this move.
    pub white_to_move: bool,
    pub fen_before: String,
    pub fen_after: String,
}

/// How the replayed game ended on the board, if it did.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub enum TerminalState {
    /// The side to move is checkmated.
    Checkmate,
    /// The side to move has no legal move and is not in check.
    Stalemate,
    /// Neither side can mate.
    InsufficientMaterial,
}

/// A parsed and replayed game.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct GameRecord {
    pub headers: BTreeMap<String, String>,
    pub metadata: GameMetadata,
    pub start_fen: String,
    pub moves: Vec<PlayedMove>,
    pub final_fen: String,
    pub terminal: Option<TerminalState>,
}

impl GameRecord {
    /// Parse PGN text (tag pairs optional) and replay its main line.
    ///
    /// Comments, NAGs, annotation glyphs, move numbers, variations and the
    /// result token are skipped. A `FEN` tag sets the starting position.
    pub fn from_pgn(text: &str) -> Result<Self, NotationError> {
        if text.trim().is_empty() {
            return Err(NotationError::Empty);
        }
        let (headers, movetext) = split_pgn(text)?;
        let tokens = tokenize_movetext(&movetext)?;
        let start_fen = headers
            .get("FEN")
            .cloned()
            .unwrap_or_else(|| STARTING_FEN.to_string());

        let mut record = Self::replay(&start_fen, &tokens)?;
        record.metadata.merge_headers(&headers);
        record.headers = headers;
        Ok(record)
    }

    /// Parse an archived game, keeping the archive's metadata.
    pub fn from_archived(game: &ArchivedGame) -> Result<Self, NotationError> {
        let mut record = Self::from_pgn(&game.pgn_text)?;
        let mut metadata = game.metadata.clone();
        metadata.merge_headers(&record.headers);
        record.metadata = metadata;
        Ok(record)
    }

    /// Replay moves given in SAN or UCI notation from `start_fen`.
    pub fn replay<S: AsRef<str>>(start_fen: &str, moves: &[S]) -> Result<Self, NotationError> {
        let mut pos = parse_fen(start_fen)?;
        let mut played = Vec::with_capacity(moves.len());

        for (ply, token) in moves.iter().enumerate() {
            let token = token.as_ref();
            let m = resolve_move(&pos, ply, token)?;
            let fen_before = fen_of(&pos);
            let san = San::from_move(&pos, &m).to_string();
            let white_to_move = pos.turn() == Color::White;
            let uci = m.to_uci(CastlingMode::Standard).to_string();
            let from = m.from().map(|sq| sq.to_string()).unwrap_or_default();
            let to = m.to().to_string();

            pos = pos.play(&m).map_err(|_| NotationError::IllegalMove {
                ply,
                token: token.to_string(),
            })?;

            played.push(PlayedMove {
                ply,
                san,
                uci,
                from,
                to,
                white_to_move,
                fen_before,
                fen_after: fen_of(&pos),
            });
        }

        Ok(Self {
            headers: BTreeMap::new(),
            metadata: GameMetadata::default(),
            start_fen: start_fen.to_string(),
            moves: played,
            final_fen: fen_of(&pos),
            terminal: terminal_state(&pos),
        })
    }

    pub fn ply_count(&self) -> usize {
        self.moves.len()
    }
}

fn resolve_move(pos: &Chess, ply: usize, token: &str) -> Result<Move, NotationError> {
    let illegal = || NotationError::IllegalMove {
        ply,
        token: token.to_string(),
    };

    // Some UCI strings also read as SAN, so a SAN miss falls through.
    let san = token.parse::<SanPlus>().ok();
    if let Some(m) = san.as_ref().and_then(|san| san.san.to_move(pos).ok()) {
        return Ok(m);
    }
    if let Ok(uci) = token.parse::<UciMove>() {
        return uci.to_move(pos).map_err(|_| illegal());
    }
    if san.is_some() {
        return Err(illegal());
    }
    Err(NotationError::UnparseableMove {
        ply,
        token: token.to_string(),
    })
}

/// Split PGN text into tag pairs and movetext.
fn split_pgn(text: &str) -> Result<(BTreeMap<String, String>, String), NotationError> {
    let mut headers = BTreeMap::new();
    let mut movetext = String::new();

    for line in text.lines() {
        let trimmed = line.trim();
        if trimmed.starts_with('[') && trimmed.ends_with(']') && movetext.trim().is_empty() {
            let inner = &trimmed[1..trimmed.len() - 1];
            let (key, value) = inner
                .split_once(char::is_whitespace)
                .ok_or_else(|| NotationError::Malformed(format!("bad tag pair {}", trimmed)))?;
            let value = value.trim();
            if value.len() < 2 || !value.starts_with('"') || !value.ends_with('"') {
                return Err(NotationError::Malformed(format!("bad tag value {}", trimmed)));
            }
            headers.insert(key.to_string(), value[1..value.len() - 1].replace("\\\"", "\""));
        } else if trimmed.starts_with('%') {
            // Escape line
        } else {
            movetext.push_str(line);
            movetext.push('\n');
        }
    }

    Ok((headers, movetext))
}

/// Reduce movetext to its main-line move tokens.
fn tokenize_movetext(movetext: &str) -> Result<Vec<String>, NotationError> {
    let mut cleaned = String::with_capacity(movetext.len());
    let mut chars = movetext.chars();
    let mut variation_depth = 0usize;

    while let Some(c) = chars.next() {
        match c {
            '{' => {
                if !chars.by_ref().any(|c| c == '}') {
                    return Err(NotationError::Malformed("unterminated comment".to_string()));
                }
                cleaned.push(' ');
            }
            ';' => {
                // Comment to end of line
                for c in chars.by_ref() {
                    if c == '\n' {
                        break;
                    }
                }
                cleaned.push(' ');
            }
            '(' => {
                variation_depth += 1;
                cleaned.push(' ');
            }
            ')' => {
                variation_depth = variation_depth.checked_sub(1).ok_or_else(|| {
                    NotationError::Malformed("unbalanced variation".to_string())
                })?;
                cleaned.push(' ');
            }
            _ if variation_depth > 0 => {}
            _ => cleaned.push(c),
        }
    }
    if variation_depth > 0 {
        return Err(NotationError::Malformed(
            "unterminated variation".to_string(),
        ));
    }

    let mut tokens = Vec::new();
    for raw in cleaned.split_whitespace() {
        if matches!(raw, "1-0" | "0-1" | "1/2-1/2" | "*") || raw.starts_with('$') {
            continue;
        }
        // "12." / "12..." / "12.e4"
        let token = raw.trim_start_matches(|c: char| c.is_ascii_digit());
        let token = if token.len() < raw.len() && token.starts_with('.') {
            token.trim_start_matches('.')
        } else {
            raw
        };
        let token = token.trim_end_matches(['!', '?']);
        if !token.is_empty() {
            tokens.push(token.to_string());
        }
    }
    Ok(tokens)
}

/// Parse and validate a FEN.
pub fn parse_fen(fen: &str) -> Result<Chess, NotationError> {
    let invalid = |reason: String| NotationError::InvalidFen {
        fen: fen.to_string(),
        reason,
    };
    let parsed: Fen = fen.trim().parse().map_err(|e| invalid(format!("{}", e)))?;
    parsed
        .into_position(CastlingMode::Standard)
        .map_err(|e| invalid(format!("{}", e)))
}

/// Legal moves of `fen` in UCI notation, captures first.
///
/// Within each group moves keep the move generator's order.
pub fn candidate_moves(fen: &str) -> Result<Vec<String>, NotationError> {
    let pos = parse_fen(fen)?;
    let (captures, quiet): (Vec<Move>, Vec<Move>) =
        pos.legal_moves().into_iter().partition(|m| m.is_capture());
    Ok(captures
        .iter()
        .chain(quiet.iter())
        .map(|m| m.to_uci(CastlingMode::Standard).to_string())
        .collect())
}

/// True if `fen` describes a legal position.
pub fn validate_fen(fen: &str) -> bool {
    parse_fen(fen).is_ok()
}

/// FEN of a position.
pub fn fen_of(pos: &Chess) -> String {
    Fen::from_position(pos.clone(), EnPassantMode::Legal).to_string()
}

/// Whether the side to move in `fen` is White.
pub fn white_to_move(fen: &str) -> bool {
    fen.split_whitespace().nth(1) != Some("b")
}

/// Fullmove number field of a FEN, 1 if missing.
pub fn fullmove_number(fen: &str) -> u32 {
    fen.split_whitespace()
        .nth(5)
        .and_then(|n| n.parse().ok())
        .unwrap_or(1)
}

pub(crate) fn terminal_state(pos: &Chess) -> Option<TerminalState> {
    if pos.is_checkmate() {
        Some(TerminalState::Checkmate)
    } else if pos.is_stalemate() {
        Some(TerminalState::Stalemate)
    } else if pos.is_insufficient_material() {
        Some(TerminalState::InsufficientMaterial)
    } else {
        None
    }
}

/// Conventional piece value in pawns.
pub fn piece_value(role: Role) -> u32 {
    match role {
        Role::Pawn => 1,
        Role::Knight | Role::Bishop => 3,
        Role::Rook => 5,
        Role::Queen => 9,
        Role::King => 0,
    }
}

/// Material totals read from the piece-placement field of a FEN.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub struct Material {
    pub white: u32,
    pub black: u32,
    /// Knights, bishops, rooks and queens of both sides, in pawns.
    pub non_pawn: u32,
}

impl Material {
    pub fn from_fen(fen: &str) -> Self {
        let placement = fen.split_whitespace().next().unwrap_or("");
        let mut material = Material::default();
        for c in placement.chars() {
            let Some(role) = Role::from_char(c.to_ascii_lowercase()) else {
                continue;
            };
            let value = piece_value(role);
            if c.is_ascii_uppercase() {
                material.white += value;
            } else {
                material.black += value;
            }
            if role != Role::Pawn {
                material.non_pawn += value;
            }
        }
        material
    }

    /// White minus Black, in pawns.
    pub fn balance(&self) -> f64 {
        f64::from(self.white) - f64::from(self.black)
    }
}
