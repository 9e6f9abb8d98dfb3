//! Conversational engine for Dynabot.
//!
//! Classifies user text, builds the prompt, calls the generation provider,
//! and keeps the conversation log, error log and analytics up to date.

pub mod analytics;
pub mod classifier;
pub mod error;
pub mod orchestrator;
pub mod provider;
pub mod voice;

pub use analytics::AnalyticsAggregator;
pub use classifier::TextClassifier;
pub use error::{ChatError, ProviderError, VoiceCaptureError};
pub use orchestrator::{ChatOrchestrator, Reply, VoiceTurn};
pub use provider::{GeminiProvider, GenerationProvider, PromptLog, ScriptedProvider};
pub use voice::{MockRecognizer, SpeechRecognizer, VoiceInput, VoiceOutcome};
