//! Voice input: bounded microphone capture followed by speech-to-text.
//!
//! The actual device and speech service sit behind [`SpeechRecognizer`].
//! Every failure is folded into [`VoiceOutcome::Failed`] and written to the
//! error log as a `VOICE_CAPTURE` record; nothing is forwarded to the
//! orchestrator in that case.

use std::future::Future;
use std::time::Duration;

use tracing::{debug, info, warn};

use dynabot_core::config::VoiceConfig;
use dynabot_core::types::ErrorStage;
use dynabot_storage::ErrorLog;

use crate::error::VoiceCaptureError;

/// Message shown to the user when voice input yields no text.
pub const COULD_NOT_PROCESS: &str = "Could not process your voice input.";

/// Raw captured audio.
#[derive(Debug, Clone, PartialEq)]
pub struct AudioClip {
    /// Mono PCM samples in [-1.0, 1.0].
    pub samples: Vec<f32>,
    pub sample_rate: u32,
}

impl AudioClip {
    pub fn duration_secs(&self) -> f64 {
        if self.sample_rate == 0 {
            return 0.0;
        }
        self.samples.len() as f64 / self.sample_rate as f64
    }
}

/// Microphone plus speech-to-text service.
pub trait SpeechRecognizer: Send + Sync {
    /// Record one utterance from the microphone.
    fn capture(&self) -> impl Future<Output = Result<AudioClip, VoiceCaptureError>> + Send;

    /// Convert a captured utterance to text.
    fn transcribe(
        &self,
        clip: &AudioClip,
    ) -> impl Future<Output = Result<String, VoiceCaptureError>> + Send;
}

/// Result of one voice capture attempt.
#[derive(Debug, Clone, PartialEq)]
pub enum VoiceOutcome {
    Transcribed(String),
    Failed(VoiceCaptureError),
}

/// Voice front-end wrapping a recognizer with the listen timeout.
pub struct VoiceInput<R> {
    recognizer: R,
    enabled: bool,
    listen_timeout: Duration,
    error_log: ErrorLog,
}

impl<R: SpeechRecognizer> VoiceInput<R> {
    pub fn new(recognizer: R, config: &VoiceConfig, error_log: ErrorLog) -> Self {
        Self {
            recognizer,
            enabled: config.enabled,
            listen_timeout: Duration::from_secs(config.listen_timeout_secs),
            error_log,
        }
    }

    /// Override the listen timeout.
    pub fn with_listen_timeout(mut self, timeout: Duration) -> Self {
        self.listen_timeout = timeout;
        self
    }

    pub fn is_enabled(&self) -> bool {
        self.enabled
    }

    /// Capture and transcribe one utterance.
    ///
    /// Only the capture step is bounded by the listen timeout.
    pub async fn listen(&self) -> VoiceOutcome {
        if !self.enabled {
            return VoiceOutcome::Failed(VoiceCaptureError::Disabled);
        }

        match self.try_listen().await {
            Ok(text) => {
                info!(chars = text.chars().count(), "Voice input transcribed");
                VoiceOutcome::Transcribed(text)
            }
            Err(e) => {
                warn!(error = %e, "Voice input failed");
                if let Err(log_err) = self.error_log.log(ErrorStage::VoiceCapture, e.to_string()) {
                    warn!(error = %log_err, "Failed to record voice capture error");
                }
                VoiceOutcome::Failed(e)
            }
        }
    }

    async fn try_listen(&self) -> Result<String, VoiceCaptureError> {
        let clip = tokio::time::timeout(self.listen_timeout, self.recognizer.capture())
            .await
            .map_err(|_| VoiceCaptureError::Timeout(self.listen_timeout.as_secs()))??;
        debug!(secs = clip.duration_secs(), "Audio captured");

        let text = self.recognizer.transcribe(&clip).await?;
        let text = text.trim();
        if text.is_empty() {
            return Err(VoiceCaptureError::Transcription(
                "no words recognized".to_string(),
            ));
        }
        Ok(text.to_string())
    }
}

// =============================================================================
// Mock implementation
// =============================================================================

/// Recognizer returning preset results, for tests and headless runs.
#[derive(Debug, Clone)]
pub struct MockRecognizer {
    capture: Result<AudioClip, VoiceCaptureError>,
    transcript: Result<String, VoiceCaptureError>,
    capture_delay: Duration,
}

impl MockRecognizer {
    /// A recognizer that always hears `text`.
    pub fn hearing(text: impl Into<String>) -> Self {
        Self {
            capture: Ok(AudioClip {
                samples: vec![0.0; 16_000],
                sample_rate: 16_000,
            }),
            transcript: Ok(text.into()),
            capture_delay: Duration::ZERO,
        }
    }

    /// A recognizer whose microphone cannot be opened.
    pub fn without_microphone(reason: impl Into<String>) -> Self {
        Self {
            capture: Err(VoiceCaptureError::Microphone(reason.into())),
            ..Self::hearing("")
        }
    }

    /// Make the transcription step fail.
    pub fn with_transcript_error(mut self, error: VoiceCaptureError) -> Self {
        self.transcript = Err(error);
        self
    }

    /// Delay the capture step, e.g. to trip the listen timeout.
    pub fn with_capture_delay(mut self, delay: Duration) -> Self {
        self.capture_delay = delay;
        self
    }
}

impl SpeechRecognizer for MockRecognizer {
    async fn capture(&self) -> Result<AudioClip, VoiceCaptureError> {
        if !self.capture_delay.is_zero() {
            tokio::time::sleep(self.capture_delay).await;
        }
        self.capture.clone()
    }

    async fn transcribe(&self, _clip: &AudioClip) -> Result<String, VoiceCaptureError> {
        self.transcript.clone()
    }
}

// =============================================================================
// Tests
// =============================================================================
