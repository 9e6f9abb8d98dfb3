use std::collections::{BTreeMap, BTreeSet};
use std::fmt;

use chrono::{DateTime, Local, NaiveDateTime, TimeZone, Utc};
use serde::{de, Deserialize, Deserializer, Serialize};

// =============================================================================
// Enums
// =============================================================================

/// Coarse purpose of a user utterance.
#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum Intent {
    /// Mentions weather or temperature.
    WeatherInfo,
    /// Asks for a joke.
    TellJoke,
    /// Asks for help or support.
    SupportRequest,
    /// Anything else.
    GeneralQuery,
}

impl Intent {
    pub fn as_str(&self) -> &'static str {
        match self {
            Intent::WeatherInfo => "weather_info",
            Intent::TellJoke => "tell_joke",
            Intent::SupportRequest => "support_request",
            Intent::GeneralQuery => "general_query",
        }
    }
}

impl fmt::Display for Intent {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// Coarse emotional valence derived from surface keywords.
///
/// Ordered so it can key the sentiment histogram in a stable order.
#[derive(Clone, Copy, Debug, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum Sentiment {
    Positive,
    Negative,
    Neutral,
}

impl Sentiment {
    pub fn as_str(&self) -> &'static str {
        match self {
            Sentiment::Positive => "positive",
            Sentiment::Negative => "negative",
            Sentiment::Neutral => "neutral",
        }
    }
}

impl fmt::Display for Sentiment {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// Stage of the system an error record originates from.
#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "SCREAMING_SNAKE_CASE")]
pub enum ErrorStage {
    /// The generation provider session could not be started.
    Initialization,
    /// A generation call failed.
    Generation,
    /// Microphone capture or transcription failed.
    VoiceCapture,
}

impl ErrorStage {
    pub fn as_str(&self) -> &'static str {
        match self {
            ErrorStage::Initialization => "INITIALIZATION",
            ErrorStage::Generation => "GENERATION",
            ErrorStage::VoiceCapture => "VOICE_CAPTURE",
        }
    }
}

impl fmt::Display for ErrorStage {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

// =============================================================================
// Classification
// =============================================================================

/// Tags attached to a single user utterance.
#[derive(Clone, Debug, PartialEq, Eq, Serialize, Deserialize)]
pub struct Classification {
    pub intent: Intent,
    pub sentiment: Sentiment,
    /// Distinct capitalized words found in the text.
    pub entities: BTreeSet<String>,
}

// =============================================================================
// Persisted records
// =============================================================================

/// One (query, response) exchange in the conversation log.
///
/// Immutable once written; the log is append-only.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct InteractionRecord {
    #[serde(deserialize_with = "iso8601::deserialize")]
    pub timestamp: DateTime<Utc>,
    pub user_query: String,
    pub ai_response: String,
}

impl InteractionRecord {
    /// Create a record stamped with the current time.
    pub fn new(user_query: impl Into<String>, ai_response: impl Into<String>) -> Self {
        Self {
            timestamp: Utc::now(),
            user_query: user_query.into(),
            ai_response: ai_response.into(),
        }
    }
}

/// A complete serialization of the analytics aggregator at a point in time.
///
/// Every field defaults so that snapshots written by older builds, or
/// hand-edited ones missing a field, still load.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct AnalyticsSnapshot {
    /// Successfully generated responses.
    pub interaction_count: u64,
    /// Count of successful turns per input sentiment.
    pub sentiment_distribution: BTreeMap<Sentiment, u64>,
    /// Wall-clock seconds per successful generation call, in call order.
    pub response_timings: Vec<f64>,
    /// Failed generation attempts.
    pub error_count: u64,
    /// Set on every flush; `None` until the first one. Informational only,
    /// so an unreadable value loads as `None`.
    #[serde(deserialize_with = "iso8601::deserialize_lenient")]
    pub last_updated: Option<DateTime<Utc>>,
}

impl AnalyticsSnapshot {
    /// Sum of all sentiment counters.
    pub fn sentiment_total(&self) -> u64 {
        self.sentiment_distribution.values().sum()
    }

    /// Mean response time in seconds, if any timings were recorded.
    pub fn average_response_secs(&self) -> Option<f64> {
        if self.response_timings.is_empty() {
            return None;
        }
        Some(self.response_timings.iter().sum::<f64>() / self.response_timings.len() as f64)
    }
}

/// One line of the error log.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ErrorRecord {
    #[serde(deserialize_with = "iso8601::deserialize")]
    pub timestamp: DateTime<Utc>,
    pub context: ErrorStage,
    pub details: String,
}

impl ErrorRecord {
    pub fn new(context: ErrorStage, details: impl Into<String>) -> Self {
        Self {
            timestamp: Utc::now(),
            context,
            details: details.into(),
        }
    }
}

// =============================================================================
// Timestamps
// =============================================================================

/// Parse an ISO-8601 timestamp.
///
/// Accepts RFC 3339, or a date-time with a `T` or space separator and an
/// optional offset. Values without an offset are read as local time.
pub fn parse_timestamp(raw: &str) -> Option<DateTime<Utc>> {
    let raw = raw.trim();
    if let Ok(dt) = DateTime::parse_from_rfc3339(raw) {
        return Some(dt.with_timezone(&Utc));
    }
    if let Ok(dt) = DateTime::parse_from_str(raw, "%Y-%m-%d %H:%M:%S%.f%:z") {
        return Some(dt.with_timezone(&Utc));
    }
    let naive = ["%Y-%m-%dT%H:%M:%S%.f", "%Y-%m-%d %H:%M:%S%.f"]
        .iter()
        .find_map(|fmt| NaiveDateTime::parse_from_str(raw, fmt).ok())?;
    let utc = Local
        .from_local_datetime(&naive)
        .earliest()
        .map(|dt| dt.with_timezone(&Utc))
        .unwrap_or_else(|| naive.and_utc());
    Some(utc)
}

/// Serde readers for timestamp fields. Writing stays RFC 3339.
mod iso8601 {
    use super::*;

    pub fn deserialize<'de, D>(deserializer: D) -> Result<DateTime<Utc>, D::Error>
    where
        D: Deserializer<'de>,
    {
        let raw = String::deserialize(deserializer)?;
        parse_timestamp(&raw)
            .ok_or_else(|| de::Error::custom(format!("invalid timestamp: {:?}", raw)))
    }

    pub fn deserialize_lenient<'de, D>(deserializer: D) -> Result<Option<DateTime<Utc>>, D::Error>
    where
        D: Deserializer<'de>,
    {
        let value = serde_json::Value::deserialize(deserializer)?;
        Ok(value.as_str().and_then(parse_timestamp))
    }
}

// =============================================================================
// Newtype Wrappers
// =============================================================================

/// Data directory path with `~` expanded to the user's home.
#[derive(Clone, Debug, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub struct DataDir(pub String);

impl DataDir {
    pub fn new(path: String) -> Self {
        let expanded = if path.starts_with('~') {
            let home = std::env::var("USERPROFILE")
                .or_else(|_| std::env::var("HOME"))
                .unwrap_or_else(|_| ".".to_string());
            path.replacen('~', &home, 1)
        } else {
            path
        };
        Self(expanded)
    }

    pub fn path(&self) -> std::path::PathBuf {
        std::path::PathBuf::from(&self.0)
    }
}
