//! Config-driven custom format scoring.

use anyhow::{Context, Result};
use regex::Regex;
use tracing::debug;

/// A named pattern that adds `score` when it matches a title.
#[derive(Debug, Clone)]
pub struct CustomFormat {
    pub name: String,
    pub pattern: Regex,
    pub score: i32,
}

impl CustomFormat {
    pub fn new(name: &str, pattern: &str, score: i32) -> Result<Self> {
        let pattern = Regex::new(&format!("(?i){}", pattern))
            .with_context(|| format!("Invalid custom format pattern for {}", name))?;
        Ok(Self {
            name: name.to_string(),
            pattern,
            score,
        })
    }
}

#[derive(Debug, Clone, Default)]
pub struct CustomFormatScorer {
    formats: Vec<CustomFormat>,
}

impl CustomFormatScorer {
    pub fn new(formats: Vec<CustomFormat>) -> Self {
        Self { formats }
    }

    /// Names of every format matching `title`.
    pub fn matching(&self, title: &str) -> Vec<&str> {
        self.formats
            .iter()
            .filter(|f| f.pattern.is_match(title))
            .map(|f| f.name.as_str())
            .collect()
    }

    pub fn score(&self, title: &str) -> i32 {
        let score = self
            .formats
            .iter()
            .filter(|f| f.pattern.is_match(title))
            .map(|f| f.score)
            .sum();
        if score != 0 {
            debug!("Custom format score for '{}': {}", title, score);
        }
        score
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_scores_sum_over_matches() {
        let scorer = CustomFormatScorer::new(vec![
            CustomFormat::new("x265", r"\b(x265|hevc)\b", 50).unwrap(),
            CustomFormat::new("Atmos", r"\batmos\b", 25).unwrap(),
            CustomFormat::new("Bad group", r"-BADGRP$", -1000).unwrap(),
        ]);

        assert_eq!(scorer.score("Movie.2020.1080p.HEVC.Atmos-GRP"), 75);
        assert_eq!(scorer.score("Movie.2020.1080p-BADGRP"), -1000);
        assert_eq!(scorer.score("Movie.2020.720p"), 0);
        assert_eq!(scorer.matching("movie x265"), vec!["x265"]);
    }

    #[test]
    fn test_invalid_pattern_is_error() {
        assert!(CustomFormat::new("broken", "(unclosed", 1).is_err());
    }
}
