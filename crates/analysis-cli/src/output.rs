//! Text and JSON rendering of analysis results.

use std::collections::BTreeMap;

use chess_analysis::{EngineError, MoveSuggestion, SearchResult, SuggestionSource};
use serde::Serialize;

/// One row of a version comparison.
#[derive(Debug, Serialize)]
pub struct ComparisonEntry {
    pub version: String,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub result: Option<SearchResult>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub error: Option<String>,
}

pub fn comparison_entries(
    results: &BTreeMap<String, Result<SearchResult, EngineError>>,
) -> Vec<ComparisonEntry> {
    results
        .iter()
        .map(|(version, outcome)| match outcome {
            Ok(result) => ComparisonEntry {
                version: version.clone(),
                result: Some(result.clone()),
                error: None,
            },
            Err(e) => ComparisonEntry {
                version: version.clone(),
                result: None,
                error: Some(e.to_string()),
            },
        })
        .collect()
}

pub fn comparison_report(entries: &[ComparisonEntry]) -> String {
    entries
        .iter()
        .map(|entry| match (&entry.result, &entry.error) {
            (Some(r), _) => format!(
                "{:<16} {:<8} {:+7.2}  depth {:<3} nodes {:<10} {}ms",
                entry.version,
                if r.best_move.is_empty() { "-" } else { r.best_move.as_str() },
                r.evaluation,
                r.depth,
                r.nodes,
                r.elapsed_ms
            ),
            (None, Some(error)) => format!("{:<16} {}", entry.version, error),
            (None, None) => format!("{:<16} no result", entry.version),
        })
        .collect::<Vec<_>>()
        .join("\n")
}

pub fn position_report(suggestion: &MoveSuggestion) -> String {
    let mut lines = vec![
        format!(
            "Best move:  {}",
            if suggestion.best_move.is_empty() {
                "(none)"
            } else {
                suggestion.best_move.as_str()
            }
        ),
        format!("Evaluation: {:+.2} (White)", suggestion.eval_white),
        format!("Confidence: {:.2}", suggestion.confidence),
        format!("Phase:      {}", suggestion.phase),
    ];
    if !suggestion.alternatives.is_empty() {
        lines.push(format!(
            "Alternatives: {}",
            suggestion.alternatives.join(", ")
        ));
    }
    if suggestion.source == SuggestionSource::Fallback {
        lines.push("Source:     material estimate (no engine)".to_string());
    }
    lines.push(String::new());
    lines.push(suggestion.reasoning.clone());
    lines.join("\n")
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_comparison_entries_keep_errors() {
        let mut results = BTreeMap::new();
        results.insert(
            "sf16".to_string(),
            Ok(SearchResult {
                best_move: "e2e4".to_string(),
                evaluation: 0.3,
                depth: 12,
                ..SearchResult::default()
            }),
        );
        results.insert(
            "missing".to_string(),
            Err(EngineError::Unavailable("not installed".to_string())),
        );

        let entries = comparison_entries(&results);
        assert_eq!(entries[0].version, "missing");
        assert!(entries[0].error.as_deref().unwrap().contains("not installed"));
        assert_eq!(entries[1].result.as_ref().unwrap().best_move, "e2e4");

        let report = comparison_report(&entries);
        assert!(report.contains("e2e4"));
        assert!(report.contains("+0.30"));
        assert!(report.contains("depth 12"));

        let json = serde_json::to_value(&entries).unwrap();
        assert!(json[0].get("result").is_none());
        assert_eq!(json[1]["result"]["depth"], 12);
    }
}
