//! Chat orchestrator: classifier, prompt, provider call, analytics and logs.
//!
//! One orchestrator owns the provider session and the analytics aggregator.
//! Both live behind a single async mutex, so turns from concurrent callers
//! run one after another instead of interleaving provider calls.

use std::time::Instant;

use tokio::sync::Mutex;
use tracing::{debug, info, warn};

use dynabot_core::config::DynabotConfig;
use dynabot_core::types::{AnalyticsSnapshot, Classification, ErrorStage};
use dynabot_storage::{ConversationLog, ErrorLog, SnapshotStore};

use crate::analytics::AnalyticsAggregator;
use crate::classifier::TextClassifier;
use crate::error::{ChatError, ProviderError, VoiceCaptureError};
use crate::provider::GenerationProvider;
use crate::voice::{SpeechRecognizer, VoiceInput, VoiceOutcome, COULD_NOT_PROCESS};

/// Answer to one user message.
#[derive(Debug, Clone, PartialEq)]
pub enum Reply {
    /// Text produced by the provider.
    Generated(String),
    /// Provider failed; `text` is the apology shown to the user instead.
    Fallback { text: String, error: ProviderError },
}

impl Reply {
    pub fn text(&self) -> &str {
        match self {
            Reply::Generated(text) => text,
            Reply::Fallback { text, .. } => text,
        }
    }

    pub fn into_text(self) -> String {
        match self {
            Reply::Generated(text) => text,
            Reply::Fallback { text, .. } => text,
        }
    }

    pub fn is_fallback(&self) -> bool {
        matches!(self, Reply::Fallback { .. })
    }
}

/// Result of a voice-initiated turn.
#[derive(Debug, Clone, PartialEq)]
pub enum VoiceTurn {
    Answered { transcript: String, reply: Reply },
    CouldNotProcess(VoiceCaptureError),
}

impl VoiceTurn {
    /// Text to show the user for this turn.
    pub fn text(&self) -> &str {
        match self {
            VoiceTurn::Answered { reply, .. } => reply.text(),
            VoiceTurn::CouldNotProcess(_) => COULD_NOT_PROCESS,
        }
    }
}

enum ProviderSession {
    Ready(Box<dyn GenerationProvider>),
    Unavailable(String),
}

struct TurnState {
    session: ProviderSession,
    analytics: AnalyticsAggregator,
}

/// Central coordinator for chat turns.
pub struct ChatOrchestrator {
    classifier: TextClassifier,
    state: Mutex<TurnState>,
    conversation_log: ConversationLog,
    error_log: ErrorLog,
    session_available: bool,
    max_message_length: usize,
    flush_every_turn: bool,
}

impl ChatOrchestrator {
    /// Build an orchestrator from configuration and a started (or failed)
    /// provider session.
    ///
    /// Analytics resume from the configured snapshot. A failed session is
    /// recorded as an `INITIALIZATION` error and every later turn falls back.
    pub fn new(
        config: &DynabotConfig,
        session: Result<Box<dyn GenerationProvider>, ProviderError>,
    ) -> Self {
        let paths = config.store_paths();
        let error_log = ErrorLog::new(paths.error_log);
        let analytics = AnalyticsAggregator::resume(SnapshotStore::new(paths.analytics));

        let session = match session {
            Ok(provider) => {
                info!(provider = provider.name(), "Chat session started");
                ProviderSession::Ready(provider)
            }
            Err(e) => {
                warn!(error = %e, "Chat session failed to start");
                if let Err(log_err) = error_log.log(ErrorStage::Initialization, e.to_string()) {
                    warn!(error = %log_err, "Failed to record initialization error");
                }
                ProviderSession::Unavailable(unavailable_reason(e))
            }
        };
        let session_available = matches!(session, ProviderSession::Ready(_));

        Self {
            classifier: TextClassifier::new(),
            state: Mutex::new(TurnState { session, analytics }),
            conversation_log: ConversationLog::new(paths.conversation_log),
            error_log,
            session_available,
            max_message_length: config.chat.max_message_length,
            flush_every_turn: config.storage.flush_every_turn,
        }
    }

    /// Whether the provider session started.
    pub fn session_available(&self) -> bool {
        self.session_available
    }

    pub fn conversation_log(&self) -> &ConversationLog {
        &self.conversation_log
    }

    pub fn error_log(&self) -> &ErrorLog {
        &self.error_log
    }

    /// Generate a reply without touching the conversation log.
    ///
    /// Provider failures become [`Reply::Fallback`]; only a failure to
    /// write the error log is returned as `Err`.
    pub async fn generate_response(&self, user_query: &str) -> Result<Reply, ChatError> {
        let mut state = self.state.lock().await;
        self.generate_locked(&mut state, user_query).await
    }

    /// Run a full turn: validate, generate, log the exchange and, when
    /// configured, flush analytics.
    pub async fn handle_message(&self, message: &str) -> Result<Reply, ChatError> {
        self.validate(message)?;

        let mut state = self.state.lock().await;
        let reply = self.generate_locked(&mut state, message).await?;

        self.conversation_log
            .append_interaction(message, reply.text())?;
        if self.flush_every_turn {
            state.analytics.flush()?;
        }
        Ok(reply)
    }

    /// Listen for one utterance and, if it transcribes, run it as a turn.
    pub async fn handle_voice_turn<R: SpeechRecognizer>(
        &self,
        voice: &VoiceInput<R>,
    ) -> Result<VoiceTurn, ChatError> {
        match voice.listen().await {
            VoiceOutcome::Transcribed(transcript) => {
                let reply = self.handle_message(&transcript).await?;
                Ok(VoiceTurn::Answered { transcript, reply })
            }
            VoiceOutcome::Failed(e) => Ok(VoiceTurn::CouldNotProcess(e)),
        }
    }

    /// Persist the current analytics snapshot.
    pub async fn flush(&self) -> Result<(), ChatError> {
        let mut state = self.state.lock().await;
        state.analytics.flush()?;
        Ok(())
    }

    /// Copy of the in-memory analytics.
    pub async fn analytics(&self) -> AnalyticsSnapshot {
        self.state.lock().await.analytics.snapshot().clone()
    }

    // -- Private helpers --

    fn validate(&self, message: &str) -> Result<(), ChatError> {
        if message.trim().is_empty() {
            return Err(ChatError::EmptyMessage);
        }
        if message.chars().count() > self.max_message_length {
            return Err(ChatError::MessageTooLong(self.max_message_length));
        }
        Ok(())
    }

    async fn generate_locked(
        &self,
        state: &mut TurnState,
        user_query: &str,
    ) -> Result<Reply, ChatError> {
        let classification = self.classifier.classify(user_query);
        let prompt = build_prompt(user_query, &classification);

        let started = Instant::now();
        let result = match &mut state.session {
            ProviderSession::Ready(provider) => provider.send_message(&prompt).await,
            ProviderSession::Unavailable(reason) => {
                Err(ProviderError::SessionUnavailable(reason.clone()))
            }
        };
        let elapsed = started.elapsed().as_secs_f64();

        match result {
            Ok(text) => {
                state.analytics.record_timing(elapsed);
                state.analytics.record_sentiment(classification.sentiment);
                state.analytics.record_interaction();
                debug!(
                    intent = %classification.intent,
                    sentiment = %classification.sentiment,
                    elapsed_secs = elapsed,
                    "Response generated"
                );
                Ok(Reply::Generated(text))
            }
            Err(e) => {
                state.analytics.record_error();
                warn!(
                    error = %e,
                    retryable = e.is_retryable(),
                    intent = %classification.intent,
                    "Generation failed"
                );
                self.error_log.log(ErrorStage::Generation, e.to_string())?;
                Ok(Reply::Fallback {
                    text: fallback_text(&e),
                    error: e,
                })
            }
        }
    }
}

/// The structured prompt sent to the provider for one user query.
pub fn build_prompt(user_query: &str, classification: &Classification) -> String {
    let entities: Vec<&str> = classification
        .entities
        .iter()
        .map(String::as_str)
        .collect();
    format!(
        "User Intent: {}\nSentiment: {}\nNamed Entities: {}\nQuery: {}",
        classification.intent,
        classification.sentiment,
        entities.join(", "),
        user_query
    )
}

/// Apology returned in place of a generated answer.
pub fn fallback_text(error: &ProviderError) -> String {
    format!("Sorry, an error occurred: {}", error)
}

fn unavailable_reason(error: ProviderError) -> String {
    match error {
        ProviderError::SessionUnavailable(reason) => reason,
        other => other.to_string(),
    }
}

// =============================================================================
// Tests
// =============================================================================

#[cfg(test)]
mod tests {
    use std::sync::Arc;
    use std::time::Duration;

    use dynabot_core::config::VoiceConfig;
    use dynabot_core::types::{ErrorRecord, Intent, Sentiment};

    use super::*;
    use crate::provider::ScriptedProvider;
    use crate::voice::MockRecognizer;

    fn test_config(dir: &tempfile::TempDir) -> DynabotConfig {
        let mut config = DynabotConfig::default();
        config.general.data_dir = dir.path().to_string_lossy().to_string();
        config
    }

    fn scripted(provider: ScriptedProvider) -> Result<Box<dyn GenerationProvider>, ProviderError> {
        Ok(Box::new(provider))
    }

    fn error_records(orch: &ChatOrchestrator) -> Vec<ErrorRecord> {
        orch.error_log()
            .tail(100)
            .unwrap()
            .iter()
            .map(|line| serde_json::from_str(line).unwrap())
            .collect()
    }

    // ---- Prompt ----

    #[test]
    fn test_build_prompt_embeds_tags() {
        let classification = TextClassifier::new().classify("I love your help, Bob");
        let prompt = build_prompt("I love your help, Bob", &classification);
        assert_eq!(
            prompt,
            "User Intent: support_request\nSentiment: positive\nNamed Entities: Bob\nQuery: I love your help, Bob"
        );
    }

    #[test]
    fn test_build_prompt_multiple_entities() {
        let classification = TextClassifier::new().classify("Hello World from Paris");
        let prompt = build_prompt("Hello World from Paris", &classification);
        assert!(prompt.contains("Named Entities: Hello, Paris, World\n"));
        assert!(prompt.contains("User Intent: general_query"));
    }

    #[test]
    fn test_fallback_text() {
        let err = ProviderError::Request("timed out".to_string());
        assert_eq!(
            fallback_text(&err),
            "Sorry, an error occurred: request failed: timed out"
        );
    }

    // ---- Successful turns ----

    #[tokio::test]
    async fn test_handle_message_success() {
        let dir = tempfile::tempdir().unwrap();
        let provider = ScriptedProvider::replying(["Sunny and 21°C."]);
        let prompts = provider.prompt_log();
        let orch = ChatOrchestrator::new(&test_config(&dir), scripted(provider));
        assert!(orch.session_available());

        let reply = orch
            .handle_message("What's the weather in Rome? Thanks!")
            .await
            .unwrap();
        assert_eq!(reply, Reply::Generated("Sunny and 21°C.".to_string()));

        let stats = orch.analytics().await;
        assert_eq!(stats.interaction_count, 1);
        assert_eq!(stats.error_count, 0);
        assert_eq!(stats.response_timings.len(), 1);
        assert_eq!(stats.sentiment_distribution[&Sentiment::Positive], 1);

        let prompt = &prompts.prompts()[0];
        assert!(prompt.contains(&format!("User Intent: {}", Intent::WeatherInfo)));
        assert!(prompt.ends_with("Query: What's the weather in Rome? Thanks!"));

        let records = orch.conversation_log().load_all().unwrap();
        assert_eq!(records.len(), 1);
        assert_eq!(records[0].ai_response, "Sunny and 21°C.");

        // Flushed after the turn.
        let stored = SnapshotStore::new(test_config(&dir).store_paths().analytics)
            .load()
            .unwrap()
            .unwrap();
        assert_eq!(stored.interaction_count, 1);
        assert!(stored.last_updated.is_some());
    }

    #[tokio::test]
    async fn test_generate_response_does_not_log_interaction() {
        let dir = tempfile::tempdir().unwrap();
        let orch = ChatOrchestrator::new(
            &test_config(&dir),
            scripted(ScriptedProvider::replying(["hi"])),
        );
        let reply = orch.generate_response("hello").await.unwrap();
        assert_eq!(reply.text(), "hi");
        assert!(orch.conversation_log().load_all().unwrap().is_empty());
        assert_eq!(orch.analytics().await.interaction_count, 1);
    }

    // ---- Failed turns ----

    #[tokio::test]
    async fn test_provider_failure_falls_back() {
        let dir = tempfile::tempdir().unwrap();
        let provider = ScriptedProvider::new(vec![
            Ok("first".to_string()),
            Err(ProviderError::Http {
                status: 429,
                message: "RESOURCE_EXHAUSTED: quota".to_string(),
            }),
        ]);
        let orch = ChatOrchestrator::new(&test_config(&dir), scripted(provider));

        orch.handle_message("hello").await.unwrap();
        let before = orch.analytics().await;

        let reply = orch.handle_message("I hate waiting").await.unwrap();
        assert!(reply.is_fallback());
        assert_eq!(
            reply.text(),
            "Sorry, an error occurred: HTTP 429: RESOURCE_EXHAUSTED: quota"
        );

        let after = orch.analytics().await;
        assert_eq!(after.error_count, before.error_count + 1);
        assert_eq!(after.interaction_count, before.interaction_count);
        assert_eq!(after.response_timings.len(), before.response_timings.len());
        assert!(!after
            .sentiment_distribution
            .contains_key(&Sentiment::Negative));

        let errors = error_records(&orch);
        assert_eq!(errors.len(), 1);
        assert_eq!(errors[0].context, ErrorStage::Generation);
        assert!(errors[0].details.contains("quota"));

        // The fallback is still logged as an exchange.
        let records = orch.conversation_log().load_all().unwrap();
        assert_eq!(records.len(), 2);
        assert_eq!(records[1].ai_response, reply.text());
    }

    #[tokio::test]
    async fn test_unavailable_session_routes_through_fallback() {
        let dir = tempfile::tempdir().unwrap();
        let orch = ChatOrchestrator::new(
            &test_config(&dir),
            Err(ProviderError::SessionUnavailable(
                "no Gemini API key configured".to_string(),
            )),
        );
        assert!(!orch.session_available());

        let errors = error_records(&orch);
        assert_eq!(errors.len(), 1);
        assert_eq!(errors[0].context, ErrorStage::Initialization);

        for _ in 0..3 {
            let reply = orch.handle_message("hello").await.unwrap();
            match reply {
                Reply::Fallback { text, error } => {
                    assert_eq!(
                        error,
                        ProviderError::SessionUnavailable(
                            "no Gemini API key configured".to_string()
                        )
                    );
                    assert!(text.contains("chat session unavailable"));
                }
                other => panic!("expected fallback, got {:?}", other),
            }
        }

        let stats = orch.analytics().await;
        assert_eq!(stats.error_count, 3);
        assert_eq!(stats.interaction_count, 0);
        assert_eq!(error_records(&orch).len(), 4);
    }

    // ---- Validation ----

    #[tokio::test]
    async fn test_empty_message_rejected() {
        let dir = tempfile::tempdir().unwrap();
        let orch = ChatOrchestrator::new(
            &test_config(&dir),
            scripted(ScriptedProvider::default()),
        );
        assert!(matches!(
            orch.handle_message("").await,
            Err(ChatError::EmptyMessage)
        ));
        assert!(matches!(
            orch.handle_message("  \n ").await,
            Err(ChatError::EmptyMessage)
        ));
        assert_eq!(orch.analytics().await, AnalyticsSnapshot::default());
    }

    #[tokio::test]
    async fn test_message_length_limit_counts_chars() {
        let dir = tempfile::tempdir().unwrap();
        let mut config = test_config(&dir);
        config.chat.max_message_length = 5;
        let orch = ChatOrchestrator::new(&config, scripted(ScriptedProvider::replying(["ok"])));

        assert!(matches!(
            orch.handle_message("abcdef").await,
            Err(ChatError::MessageTooLong(5))
        ));
        // Five multi-byte chars are within the limit.
        assert!(orch.handle_message("ééééé").await.is_ok());
    }

    // ---- Invariants ----

    #[tokio::test]
    async fn test_sentiment_total_tracks_interactions() {
        let dir = tempfile::tempdir().unwrap();
        let provider = ScriptedProvider::new(vec![
            Ok("a".to_string()),
            Err(ProviderError::Request("down".to_string())),
            Ok("b".to_string()),
            Ok("c".to_string()),
            Err(ProviderError::MalformedResponse("empty".to_string())),
        ]);
        let orch = ChatOrchestrator::new(&test_config(&dir), scripted(provider));
        for text in ["great", "bad", "meh", "I hate it", "thank you"] {
            orch.handle_message(text).await.unwrap();
        }

        let stats = orch.analytics().await;
        assert_eq!(stats.interaction_count, 3);
        assert_eq!(stats.error_count, 2);
        assert_eq!(stats.sentiment_total(), stats.interaction_count);
        assert_eq!(stats.response_timings.len() as u64, stats.interaction_count);
        assert_eq!(orch.conversation_log().load_all().unwrap().len(), 5);
    }

    #[tokio::test]
    async fn test_analytics_resume_across_restarts() {
        let dir = tempfile::tempdir().unwrap();
        let config = test_config(&dir);
        {
            let orch =
                ChatOrchestrator::new(&config, scripted(ScriptedProvider::replying(["one", "two"])));
            orch.handle_message("first").await.unwrap();
            orch.handle_message("second").await.unwrap();
        }

        let orch = ChatOrchestrator::new(&config, scripted(ScriptedProvider::replying(["three"])));
        assert_eq!(orch.analytics().await.interaction_count, 2);
        orch.handle_message("third").await.unwrap();
        assert_eq!(orch.analytics().await.interaction_count, 3);
        assert_eq!(orch.conversation_log().load_all().unwrap().len(), 3);
    }

    #[tokio::test]
    async fn test_no_flush_until_requested() {
        let dir = tempfile::tempdir().unwrap();
        let mut config = test_config(&dir);
        config.storage.flush_every_turn = false;
        let orch = ChatOrchestrator::new(&config, scripted(ScriptedProvider::replying(["x"])));

        orch.handle_message("hello").await.unwrap();
        let store = SnapshotStore::new(config.store_paths().analytics);
        assert!(!store.exists());

        orch.flush().await.unwrap();
        assert_eq!(store.load().unwrap().unwrap().interaction_count, 1);
    }

    #[tokio::test]
    async fn test_concurrent_turns_are_serialized() {
        let dir = tempfile::tempdir().unwrap();
        let replies: Vec<String> = (0..10).map(|i| format!("reply {}", i)).collect();
        let orch = Arc::new(ChatOrchestrator::new(
            &test_config(&dir),
            scripted(ScriptedProvider::replying(replies)),
        ));

        let mut handles = Vec::new();
        for i in 0..10 {
            let orch = Arc::clone(&orch);
            handles.push(tokio::spawn(async move {
                orch.handle_message(&format!("message {}", i)).await
            }));
        }
        for handle in handles {
            assert!(!handle.await.unwrap().unwrap().is_fallback());
        }

        assert_eq!(orch.conversation_log().load_all().unwrap().len(), 10);
        assert_eq!(orch.analytics().await.interaction_count, 10);
    }

    #[tokio::test]
    async fn test_storage_fault_is_returned() {
        let dir = tempfile::tempdir().unwrap();
        let config = test_config(&dir);
        // A directory where the conversation log should be.
        std::fs::create_dir_all(config.store_paths().conversation_log).unwrap();
        let orch = ChatOrchestrator::new(&config, scripted(ScriptedProvider::replying(["ok"])));

        let result = orch.handle_message("hello").await;
        assert!(matches!(result, Err(ChatError::StorageError(_))));
    }

    // ---- Voice ----

    #[tokio::test]
    async fn test_voice_turn_answers_transcript() {
        let dir = tempfile::tempdir().unwrap();
        let config = test_config(&dir);
        let orch = ChatOrchestrator::new(&config, scripted(ScriptedProvider::replying(["Ha!"])));
        let voice = VoiceInput::new(
            MockRecognizer::hearing("tell me a joke"),
            &VoiceConfig::default(),
            orch.error_log().clone(),
        );

        let turn = orch.handle_voice_turn(&voice).await.unwrap();
        assert_eq!(
            turn,
            VoiceTurn::Answered {
                transcript: "tell me a joke".to_string(),
                reply: Reply::Generated("Ha!".to_string()),
            }
        );
        assert_eq!(turn.text(), "Ha!");
        assert_eq!(orch.conversation_log().load_all().unwrap().len(), 1);
    }

    #[tokio::test]
    async fn test_voice_failure_forwards_nothing() {
        let dir = tempfile::tempdir().unwrap();
        let config = test_config(&dir);
        let provider = ScriptedProvider::replying(["unused"]);
        let prompts = provider.prompt_log();
        let orch = ChatOrchestrator::new(&config, scripted(provider));
        let voice = VoiceInput::new(
            MockRecognizer::hearing("late").with_capture_delay(Duration::from_secs(30)),
            &VoiceConfig::default(),
            orch.error_log().clone(),
        )
        .with_listen_timeout(Duration::from_millis(20));

        let turn = orch.handle_voice_turn(&voice).await.unwrap();
        assert!(matches!(
            turn,
            VoiceTurn::CouldNotProcess(VoiceCaptureError::Timeout(_))
        ));
        assert_eq!(turn.text(), COULD_NOT_PROCESS);
        assert!(prompts.is_empty());
        assert!(orch.conversation_log().load_all().unwrap().is_empty());
        assert_eq!(error_records(&orch)[0].context, ErrorStage::VoiceCapture);
    }
}
