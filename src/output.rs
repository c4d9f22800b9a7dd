// SPDX-License-Identifier: MIT OR Apache-2.0

//! Output and color utilities for consistent terminal formatting
//!
//! Renders ranked results for human consumption (scores fixed to 3 decimal
//! places; full precision lives in [`crate::rank::RankedHit`]) or as JSON.
//! Color functions respect the NO_COLOR environment variable.

use colored::Colorize;

use crate::rank::RankedHit;

/// Check if colors should be used (respects NO_COLOR env var)
pub fn use_colors() -> bool {
    std::env::var("NO_COLOR").is_err()
}

/// Colorize a result identifier (cyan)
pub fn colorize_id(text: &str, use_color: bool) -> String {
    if use_color {
        text.cyan().to_string()
    } else {
        text.to_string()
    }
}

/// Colorize a similarity score (yellow)
pub fn colorize_score(text: &str, use_color: bool) -> String {
    if use_color {
        text.yellow().to_string()
    } else {
        text.to_string()
    }
}

/// Colorize a rank position (dimmed)
pub fn colorize_rank(num: usize, use_color: bool) -> String {
    if use_color {
        num.to_string().dimmed().to_string()
    } else {
        num.to_string()
    }
}

/// Render ranked hits as text, one per line: rank, id, 3-decimal score.
pub fn format_text(hits: &[RankedHit], use_color: bool) -> String {
    if hits.is_empty() {
        return "no results".to_string();
    }

    let mut out = String::new();
    for (position, hit) in hits.iter().enumerate() {
        let score = format!("{:.3}", hit.score);
        out.push_str(&format!(
            "{:>3}. {}  (score: {})\n",
            colorize_rank(position + 1, use_color),
            colorize_id(&hit.id, use_color),
            colorize_score(&score, use_color),
        ));
    }
    out
}

/// Render ranked hits as a JSON array with full-precision scores.
pub fn format_json(hits: &[RankedHit]) -> serde_json::Result<String> {
    serde_json::to_string_pretty(hits)
}

#[cfg(test)]
mod tests {
    use super::*;

    fn hits() -> Vec<RankedHit> {
        vec![
            RankedHit {
                id: "q1".to_string(),
                score: 0.912_345,
            },
            RankedHit {
                id: "q2".to_string(),
                score: 0.1,
            },
        ]
    }

    #[test]
    fn test_text_rounds_to_three_decimals() {
        let text = format_text(&hits(), false);
        assert!(text.contains("q1"));
        assert!(text.contains("0.912"));
        assert!(!text.contains("0.912345"));
        assert!(text.contains("0.100"));
    }

    #[test]
    fn test_text_empty() {
        assert_eq!(format_text(&[], false), "no results");
    }

    #[test]
    fn test_json_round_trips_full_precision() {
        let json = format_json(&hits()).unwrap();
        let parsed: Vec<RankedHit> = serde_json::from_str(&json).unwrap();
        assert_eq!(parsed, hits());
    }
}
