//! Natural-language explanations of analysis results.
//!
//! Everything here is pure formatting over already computed values.

use crate::evaluation::to_white_perspective;
use crate::patterns::{GamePhase, TacticalPattern};
use crate::quality::{GameAnalysis, MoveClassification, PlayerStats};

/// Qualitative effect of a move leading to `evaluation` (pawns, mover's view).
pub fn qualitative(evaluation: f64) -> &'static str {
    if evaluation > 2.0 {
        "gives a decisive advantage"
    } else if evaluation > 0.5 {
        "improves the position significantly"
    } else if evaluation > -0.5 {
        "maintains equal chances"
    } else {
        "leads to a disadvantage"
    }
}

fn side_name(white: bool) -> &'static str {
    if white {
        "White"
    } else {
        "Black"
    }
}

/// Explain an engine suggestion.
///
/// `evaluation` and `mate_in` are from the side to move's point of view.
/// An empty `best_move` means the side to move has no legal move.
pub fn explain_move(
    best_move: &str,
    evaluation: f64,
    mate_in: Option<i32>,
    patterns: &[TacticalPattern],
    phase: GamePhase,
    white_to_move: bool,
) -> String {
    let mover = side_name(white_to_move);
    if best_move.is_empty() {
        return format!("{} has no legal moves.", mover);
    }

    let mut parts = vec![format!(
        "Evaluation: {:+.2} pawns from White's perspective.",
        to_white_perspective(evaluation, white_to_move)
    )];
    match mate_in {
        Some(n) if n > 0 => parts.push(format!("{} has a forced mate in {}.", mover, n)),
        Some(n) => parts.push(format!(
            "{} is getting mated in {}.",
            mover,
            n.unsigned_abs()
        )),
        None => {}
    }
    if !patterns.is_empty() {
        let names: Vec<&str> = patterns.iter().map(|p| p.name()).collect();
        parts.push(format!("Tactical themes: {}.", names.join(", ")));
    }
    parts.push(format!(
        "In the {}, {} {}.",
        phase,
        best_move,
        qualitative(evaluation)
    ));
    parts.join(" ")
}

/// Explain a suggestion made without an engine.
pub fn explain_fallback(best_move: &str, material_white: f64, reason: &str) -> String {
    let mut text = format!(
        "Engine analysis unavailable ({}). Static material estimate: {:+.2} pawns from White's perspective.",
        reason, material_white
    );
    if best_move.is_empty() {
        text.push_str(" No legal moves.");
    } else {
        text.push_str(&format!(
            " {} is a legal move picked without search, not an engine recommendation.",
            best_move
        ));
    }
    text
}

fn accuracy_band(accuracy: f64) -> &'static str {
    if accuracy >= 90.0 {
        "excellent"
    } else if accuracy >= 75.0 {
        "good"
    } else if accuracy >= 50.0 {
        "uneven"
    } else {
        "poor"
    }
}

fn plural(count: u32, word: &str) -> String {
    if count == 1 {
        format!("1 {}", word)
    } else {
        format!("{} {}s", count, word)
    }
}

fn player_names(game: &GameAnalysis) -> (String, String) {
    let white = game
        .metadata
        .white
        .clone()
        .unwrap_or_else(|| "White".to_string());
    let black = game
        .metadata
        .black
        .clone()
        .unwrap_or_else(|| "Black".to_string());
    (white, black)
}

/// Observations about how each side played.
pub fn game_insights(game: &GameAnalysis) -> Vec<String> {
    if game.is_empty() {
        return Vec::new();
    }

    let (white, black) = player_names(game);
    let mut insights = Vec::new();
    for (name, stats) in [(&white, &game.white_stats), (&black, &game.black_stats)] {
        if stats.total_moves == 0 {
            continue;
        }
        insights.push(format!(
            "{} played with {:.1}% accuracy ({}).",
            name,
            stats.accuracy_percent,
            accuracy_band(stats.accuracy_percent)
        ));
        if stats.blunders + stats.mistakes > 0 {
            insights.push(format!(
                "{} made {} and {}.",
                name,
                plural(stats.blunders, "blunder"),
                plural(stats.mistakes, "mistake")
            ));
        }
    }

    for position in game.positions.iter().filter(|p| {
        p.classification == Some(MoveClassification::Brilliant)
    }) {
        let name = if position.white_to_move { &white } else { &black };
        insights.push(format!("Brilliant move by {}: {}.", name, position.label()));
    }

    if let Some(worst) = game
        .positions
        .iter()
        .filter(|p| p.classification.is_some_and(MoveClassification::is_error))
        .max_by(|a, b| a.swing.total_cmp(&b.swing))
    {
        let best = if worst.best_move().is_empty() {
            String::new()
        } else {
            format!(" ({} was stronger)", worst.best_move())
        };
        insights.push(format!(
            "Turning point: {} gave away {:.2} pawns{}.",
            worst.label(),
            worst.swing,
            best
        ));
    }

    insights
}

fn side_recommendations(name: &str, stats: &PlayerStats, early_inaccuracies: usize) -> Vec<String> {
    let mut recommendations = Vec::new();
    if stats.blunders > 0 {
        recommendations.push(format!(
            "{}: review tactics; check every capture and threat before moving.",
            name
        ));
    }
    if stats.mistakes >= 2 {
        recommendations.push(format!(
            "{}: compare more candidate moves in complicated positions.",
            name
        ));
    }
    if early_inaccuracies >= 2 {
        recommendations.push(format!(
            "{}: slow down in the opening and focus on development.",
            name
        ));
    }
    recommendations
}

/// Study suggestions derived from the errors in a game.
pub fn recommendations(game: &GameAnalysis) -> Vec<String> {
    if game.is_empty() {
        return Vec::new();
    }

    let (white, black) = player_names(game);
    let early = |white_moves: bool| {
        game.positions
            .iter()
            .filter(|p| p.ply < 20 && p.white_to_move == white_moves)
            .filter(|p| p.classification == Some(MoveClassification::Inaccuracy))
            .count()
    };

    let mut recommendations = side_recommendations(&white, &game.white_stats, early(true));
    recommendations.extend(side_recommendations(&black, &game.black_stats, early(false)));
    if recommendations.is_empty() {
        recommendations.push("No significant errors found; keep playing this way.".to_string());
    }
    recommendations
}

/// Multi-line text report of a game analysis.
pub fn game_summary(game: &GameAnalysis) -> String {
    if game.is_empty() {
        return "No moves to analyze.".to_string();
    }

    let (white, black) = player_names(game);
    let mut lines = vec![
        format!("{} vs {}", white, black),
        format!(
            "Analyzed {} plies with {}.",
            game.positions.len(),
            game.engine
        ),
        format!(
            "Accuracy: {} {:.1}%, {} {:.1}%. Critical moments: {}.",
            white,
            game.white_stats.accuracy_percent,
            black,
            game.black_stats.accuracy_percent,
            game.critical_moments
        ),
    ];

    let flagged: Vec<String> = game
        .positions
        .iter()
        .filter_map(|p| match p.classification {
            Some(class) if class != MoveClassification::Best => {
                Some(format!("  {} ({}, {:+.2})", p.label(), class, p.eval_white))
            }
            _ => None,
        })
        .collect();
    if !flagged.is_empty() {
        lines.push("Notable moves:".to_string());
        lines.extend(flagged);
    }

    lines.extend(game.insights.iter().cloned());
    if !game.recommendations.is_empty() {
        lines.push("Recommendations:".to_string());
        lines.extend(game.recommendations.iter().map(|r| format!("  - {}", r)));
    }
    lines.join("\n")
}
