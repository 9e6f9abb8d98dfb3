//! Rule-based text classifier: intent, sentiment and capitalized-word entities.
//!
//! Everything here is keyword matching over the lowercased input. There is no
//! model; the classifier never fails.

use std::collections::BTreeSet;
use std::sync::LazyLock;

use regex::Regex;

use dynabot_core::types::{Classification, Intent, Sentiment};

// =============================================================================
// Keyword tables
// =============================================================================

const WEATHER_KEYWORDS: &[&str] = &["weather", "temperature"];
const JOKE_KEYWORDS: &[&str] = &["joke"];
const SUPPORT_KEYWORDS: &[&str] = &["help", "support"];

const POSITIVE_KEYWORDS: &[&str] = &["thank", "great", "awesome", "love"];
const NEGATIVE_KEYWORDS: &[&str] = &["bad", "hate", "angry", "frustrated"];

/// Intent rules in priority order; the first match wins.
const INTENT_RULES: &[(&[&str], Intent)] = &[
    (WEATHER_KEYWORDS, Intent::WeatherInfo),
    (JOKE_KEYWORDS, Intent::TellJoke),
    (SUPPORT_KEYWORDS, Intent::SupportRequest),
];

/// One uppercase ASCII letter followed by lowercase ASCII letters.
static ENTITY_RE: LazyLock<Regex> =
    LazyLock::new(|| Regex::new(r"[A-Z][a-z]+").expect("Invalid entity regex"));

/// Stateless keyword classifier.
#[derive(Debug, Clone, Copy, Default)]
pub struct TextClassifier;

impl TextClassifier {
    pub fn new() -> Self {
        Self
    }

    /// Tag `text` with intent, sentiment and entities.
    pub fn classify(&self, text: &str) -> Classification {
        let lower = text.to_lowercase();
        Classification {
            intent: recognize_intent(&lower),
            sentiment: detect_sentiment(&lower),
            entities: self.extract_entities(text),
        }
    }

    /// Distinct capitalized words, sorted.
    pub fn extract_entities(&self, text: &str) -> BTreeSet<String> {
        ENTITY_RE
            .find_iter(text)
            .map(|m| m.as_str().to_string())
            .collect()
    }
}

fn contains_any(lower: &str, keywords: &[&str]) -> bool {
    keywords.iter().any(|k| lower.contains(k))
}

fn recognize_intent(lower: &str) -> Intent {
    INTENT_RULES
        .iter()
        .find(|(keywords, _)| contains_any(lower, keywords))
        .map(|(_, intent)| *intent)
        .unwrap_or(Intent::GeneralQuery)
}

// Positive is checked first, so mixed text resolves positive.
fn detect_sentiment(lower: &str) -> Sentiment {
    if contains_any(lower, POSITIVE_KEYWORDS) {
        Sentiment::Positive
    } else if contains_any(lower, NEGATIVE_KEYWORDS) {
        Sentiment::Negative
    } else {
        Sentiment::Neutral
    }
}

// =============================================================================
// Tests
// =============================================================================
