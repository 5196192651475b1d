//! UCI (Universal Chess Interface) protocol types for driving engines.
//!
//! This crate covers the GUI side of the protocol: formatting the commands an
//! analysis client sends and parsing the lines an engine prints back.
//!
//! # Commands sent to the engine
//!
//! - `uci` / `uciok` - Handshake, engine identifies itself
//! - `setoption name <id> value <x>` - Tune the engine (threads, hash, ponder)
//! - `ucinewgame` - New game boundary
//! - `isready` / `readyok` - Synchronization
//! - `position fen <fen> [moves <move>...]` - Set position
//! - `go depth <d>` - Start search
//! - `stop` - Stop search
//! - `quit` - Exit engine
//!
//! # Lines read from the engine
//!
//! - `info ...` - Search progress, see [`EngineInfo`]
//! - `bestmove <move> [ponder <move>]` - Search finished

mod command;
mod info;

pub use command::{GoOptions, GuiCommand};
pub use info::{EngineInfo, InfoBuilder, Score, ScoreBound};

use thiserror::Error;

#[derive(Error, Debug)]
pub enum UciError {
    #[error("Parse error: {0}")]
    ParseError(String),
}

/// Messages sent from engine to GUI.
#[derive(Debug, Clone, PartialEq)]
pub enum EngineMessage {
    /// Engine identification.
    Id { name: Option<String>, author: Option<String> },
    /// UCI initialization complete.
    UciOk,
    /// Engine is ready.
    ReadyOk,
    /// Search information.
    Info(EngineInfo),
    /// Best move found. `(none)` from the engine is mapped to `None`.
    BestMove { mv: Option<String>, ponder: Option<String> },
    /// `option name ...` declarations and anything else.
    Other(String),
}

impl EngineMessage {
    /// Parse one line of engine output.
    pub fn parse(line: &str) -> Self {
        let line = line.trim();
        let mut parts = line.split_whitespace();

        match parts.next() {
            Some("uciok") => EngineMessage::UciOk,
            Some("readyok") => EngineMessage::ReadyOk,
            Some("info") => match EngineInfo::parse(line) {
                Some(info) => EngineMessage::Info(info),
                None => EngineMessage::Other(line.to_string()),
            },
            Some("bestmove") => {
                let mv = parts
                    .next()
                    .filter(|m| *m != "(none)" && *m != "0000")
                    .map(str::to_string);
                let ponder = match parts.next() {
                    Some("ponder") => parts.next().map(str::to_string),
                    _ => None,
                };
                EngineMessage::BestMove { mv, ponder }
            }
            Some("id") => {
                let rest: Vec<&str> = parts.collect();
                match rest.split_first() {
                    Some((&"name", value)) => EngineMessage::Id {
                        name: Some(value.join(" ")),
                        author: None,
                    },
                    Some((&"author", value)) => EngineMessage::Id {
                        name: None,
                        author: Some(value.join(" ")),
                    },
                    _ => EngineMessage::Other(line.to_string()),
                }
            }
            _ => EngineMessage::Other(line.to_string()),
        }
    }

    /// Format message for output.
    pub fn to_uci(&self) -> String {
        match self {
            EngineMessage::Id { name, author } => {
                let mut parts = Vec::new();
                if let Some(n) = name {
                    parts.push(format!("id name {}", n));
                }
                if let Some(a) = author {
                    parts.push(format!("id author {}", a));
                }
                parts.join("\n")
            }
            EngineMessage::UciOk => "uciok".to_string(),
            EngineMessage::ReadyOk => "readyok".to_string(),
            EngineMessage::Info(info) => info.to_uci(),
            EngineMessage::BestMove { mv, ponder } => {
                let mv = mv.as_deref().unwrap_or("(none)");
                match ponder {
                    Some(p) => format!("bestmove {} ponder {}", mv, p),
                    None => format!("bestmove {}", mv),
                }
            }
            EngineMessage::Other(line) => line.clone(),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn parse_bestmove_with_ponder() {
        assert_eq!(
            EngineMessage::parse("bestmove e2e4 ponder e7e5"),
            EngineMessage::BestMove {
                mv: Some("e2e4".to_string()),
                ponder: Some("e7e5".to_string()),
            }
        );
    }

    #[test]
    fn parse_bestmove_none() {
        assert_eq!(
            EngineMessage::parse("bestmove (none)"),
            EngineMessage::BestMove {
                mv: None,
                ponder: None
            }
        );
    }

    #[test]
    fn parse_id_name_with_spaces() {
        assert_eq!(
            EngineMessage::parse("id name Stockfish 16.1"),
            EngineMessage::Id {
                name: Some("Stockfish 16.1".to_string()),
                author: None,
            }
        );
    }

    #[test]
    fn parse_handshake_replies() {
        assert_eq!(EngineMessage::parse("uciok\n"), EngineMessage::UciOk);
        assert_eq!(EngineMessage::parse("  readyok "), EngineMessage::ReadyOk);
    }

    #[test]
    fn parse_info_line() {
        match EngineMessage::parse("info depth 3 score cp -12 pv d7d5") {
            EngineMessage::Info(info) => {
                assert_eq!(info.depth, Some(3));
                assert_eq!(info.score, Some(Score::Cp(-12)));
            }
            other => panic!("Expected Info, got {:?}", other),
        }
    }

    #[test]
    fn parse_option_declaration_is_other() {
        let line = "option name Hash type spin default 16 min 1 max 33554432";
        assert_eq!(
            EngineMessage::parse(line),
            EngineMessage::Other(line.to_string())
        );
    }

    #[test]
    fn bestmove_to_uci_roundtrips_through_parse() {
        let msg = EngineMessage::BestMove {
            mv: Some("g1f3".to_string()),
            ponder: None,
        };
        assert_eq!(EngineMessage::parse(&msg.to_uci()), msg);
    }
}
