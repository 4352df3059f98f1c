//! Pipeline orchestration
//!
//! Sequences STT, the streamed backend reply, accumulation, segmentation and
//! per-sentence synthesis for one request. Stages run strictly one after
//! another and sentences are synthesized one at a time, in order.

use std::future::Future;
use std::sync::Arc;
use std::time::Duration;

use tokio::sync::mpsc;

use super::events::StageEvent;
use super::run::{PipelineRun, RunStage};
use super::segmenter::{Sentence, segment};
use crate::audio::merge_wav;
use crate::config::Timeouts;
use crate::conversation::{ConversationBackend, accumulate, reassemble};
use crate::error::Service;
use crate::voice::{AudioUpload, CallOptions, Synthesizer, Transcriber};
use crate::{Error, Result};

/// Settings a pipeline runs with
#[derive(Debug, Clone)]
pub struct PipelineSettings {
    pub timeouts: Timeouts,
    /// Language/model used when a request does not override them
    pub defaults: CallOptions,
}

/// One request entering the pipeline
#[derive(Debug, Clone)]
pub struct PipelineRequest {
    pub request_id: String,
    pub audio: AudioUpload,
    pub options: CallOptions,
}

impl PipelineRequest {
    /// Build a request with a fresh request identifier
    #[must_use]
    pub fn new(audio: AudioUpload, options: CallOptions) -> Self {
        Self {
            request_id: uuid::Uuid::new_v4().to_string(),
            audio,
            options,
        }
    }
}

/// Synthesized audio for one sentence
#[derive(Debug, Clone)]
pub struct SentenceAudio {
    pub sentence: Sentence,
    /// WAV container as returned by synthesis
    pub audio: Vec<u8>,
}

/// Result of a run in aggregate mode
#[derive(Debug, Clone)]
pub struct PipelineOutcome {
    pub request_id: String,
    pub stt_text: String,
    pub accumulated_text: String,
    pub sentences: Vec<Sentence>,
    pub results: Vec<SentenceAudio>,
}

impl PipelineOutcome {
    /// Merge every sentence's audio into a single WAV container
    ///
    /// # Errors
    ///
    /// Returns error if the merged payload does not fit a WAV container
    pub fn merged_audio(&self) -> Result<Vec<u8>> {
        merge_wav(self.results.iter().map(|r| &r.audio))
    }
}

/// A failed run, tagged with its request identifier
#[derive(Debug)]
pub struct RunFailure {
    pub request_id: String,
    pub error: Error,
}

impl std::fmt::Display for RunFailure {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "run {} failed: {}", self.request_id, self.error)
    }
}

impl std::error::Error for RunFailure {
    fn source(&self) -> Option<&(dyn std::error::Error + 'static)> {
        Some(&self.error)
    }
}

/// Why a progressive run stopped early
enum Halt {
    /// The caller stopped listening
    Disconnected,
    Failed(Error),
}

impl From<Error> for Halt {
    fn from(error: Error) -> Self {
        Self::Failed(error)
    }
}

/// The voice relay pipeline
#[derive(Clone)]
pub struct Pipeline {
    stt: Arc<dyn Transcriber>,
    backend: Arc<dyn ConversationBackend>,
    tts: Arc<dyn Synthesizer>,
    settings: PipelineSettings,
}

impl Pipeline {
    #[must_use]
    pub fn new(
        stt: Arc<dyn Transcriber>,
        backend: Arc<dyn ConversationBackend>,
        tts: Arc<dyn Synthesizer>,
        settings: PipelineSettings,
    ) -> Self {
        Self {
            stt,
            backend,
            tts,
            settings,
        }
    }

    #[must_use]
    pub const fn settings(&self) -> &PipelineSettings {
        &self.settings
    }

    /// Run every stage to completion and return everything at once
    ///
    /// # Errors
    ///
    /// Any stage failure, including a single sentence's synthesis, fails the
    /// whole run; no partial results are returned.
    pub async fn run(&self, request: PipelineRequest) -> std::result::Result<PipelineOutcome, RunFailure> {
        let mut run = PipelineRun::new(request.request_id.clone());

        match self.run_aggregate(&mut run, &request).await {
            Ok(outcome) => {
                run.advance(RunStage::Complete);
                tracing::info!(
                    request_id = %outcome.request_id,
                    sentences = outcome.sentences.len(),
                    results = outcome.results.len(),
                    "run complete"
                );
                Ok(outcome)
            }
            Err(error) => {
                run.fail(&error);
                Err(RunFailure {
                    request_id: request.request_id,
                    error,
                })
            }
        }
    }

    async fn run_aggregate(&self, run: &mut PipelineRun, request: &PipelineRequest) -> Result<PipelineOutcome> {
        validate_upload(&request.audio)?;

        let stt_text = self.transcribe(run, request).await?;
        let accumulated_text = self.converse(run, &stt_text).await?;
        let sentences = segment_reply(run, &accumulated_text);

        let mut results = Vec::with_capacity(sentences.len());
        for sentence in sentences.iter().filter(|s| speakable(s)) {
            run.advance(RunStage::Synthesizing(sentence.index));
            let audio = self.synthesize(sentence, &request.options).await?;
            results.push(SentenceAudio {
                sentence: sentence.clone(),
                audio,
            });
        }

        Ok(PipelineOutcome {
            request_id: request.request_id.clone(),
            stt_text,
            accumulated_text,
            sentences,
            results,
        })
    }

    /// Run the pipeline, pushing each stage event to `events` as it happens
    ///
    /// Per-sentence synthesis failures are reported as `tts_error` and do not
    /// stop the run. If `events` is closed the run is abandoned before the
    /// next collaborator call. Returns the run's final stage.
    pub async fn run_progressive(&self, request: PipelineRequest, events: mpsc::Sender<StageEvent>) -> RunStage {
        let mut run = PipelineRun::new(request.request_id.clone());

        match self.progressive(&mut run, &request, &events).await {
            Ok(()) => {}
            Err(Halt::Disconnected) => {
                tracing::info!(request_id = %request.request_id, stage = run.stage().name(), "caller disconnected, abandoning run");
                if !run.stage().is_terminal() {
                    run.advance(RunStage::Failed);
                }
            }
            Err(Halt::Failed(error)) => {
                run.fail(&error);
                let event = StageEvent::Error {
                    request_id: request.request_id.clone(),
                    error: error.to_string(),
                    code: error.kind().code(),
                };
                // Nothing more to do if the caller is gone
                let _ = events.send(event).await;
            }
        }

        run.stage()
    }

    async fn progressive(
        &self,
        run: &mut PipelineRun,
        request: &PipelineRequest,
        events: &mpsc::Sender<StageEvent>,
    ) -> std::result::Result<(), Halt> {
        let request_id = request.request_id.clone();
        validate_upload(&request.audio)?;

        emit(events, StageEvent::Start { request_id: request_id.clone() }).await?;
        emit(events, StageEvent::SttStart { request_id: request_id.clone() }).await?;
        let stt_text = self.transcribe(run, request).await?;
        emit(
            events,
            StageEvent::SttComplete {
                request_id: request_id.clone(),
                stt_text: stt_text.clone(),
            },
        )
        .await?;

        emit(events, StageEvent::WebhookStart { request_id: request_id.clone() }).await?;
        let accumulated_text = self.converse(run, &stt_text).await?;
        emit(
            events,
            StageEvent::WebhookComplete {
                request_id: request_id.clone(),
                accumulated_text: accumulated_text.clone(),
            },
        )
        .await?;

        let sentences = segment_reply(run, &accumulated_text);
        emit(
            events,
            StageEvent::TtsStart {
                request_id: request_id.clone(),
                sentence_count: sentences.len(),
            },
        )
        .await?;

        let mut succeeded = 0;
        let mut failed = 0;
        for sentence in sentences.iter().filter(|s| speakable(s)) {
            run.advance(RunStage::Synthesizing(sentence.index));
            let event = match self.synthesize(sentence, &request.options).await {
                Ok(audio) => {
                    succeeded += 1;
                    StageEvent::TtsResult {
                        request_id: request_id.clone(),
                        sentence_index: sentence.index,
                        sentence: sentence.text.clone(),
                        audio,
                    }
                }
                Err(error) => {
                    failed += 1;
                    tracing::warn!(
                        request_id = %request_id,
                        sentence_index = sentence.index,
                        error = %error,
                        "sentence synthesis failed"
                    );
                    StageEvent::TtsError {
                        request_id: request_id.clone(),
                        sentence_index: sentence.index,
                        sentence: sentence.text.clone(),
                        error: error.to_string(),
                    }
                }
            };
            emit(events, event).await?;
        }

        run.advance(RunStage::Complete);
        tracing::info!(request_id = %request_id, succeeded, failed, "progressive run complete");
        emit(
            events,
            StageEvent::Complete {
                request_id,
                tts_response_count: succeeded,
                tts_error_count: failed,
            },
        )
        .await
    }

    /// Transcribe the upload; an empty transcript is an error
    async fn transcribe(&self, run: &mut PipelineRun, request: &PipelineRequest) -> Result<String> {
        let transcript = with_timeout(
            Service::Stt,
            self.settings.timeouts.stt,
            self.stt.transcribe(&request.audio, &request.options),
        )
        .await?;

        let transcript = transcript.trim();
        if transcript.is_empty() {
            return Err(Error::EmptyTranscription(
                "speech-to-text returned no text".to_string(),
            ));
        }

        run.advance(RunStage::SttDone);
        Ok(transcript.to_string())
    }

    /// Send the transcript to the backend and fold its streamed reply into text
    async fn converse(&self, run: &mut PipelineRun, transcript: &str) -> Result<String> {
        let request_id = run.request_id().to_string();
        let messages = with_timeout(Service::Backend, self.settings.timeouts.backend, async {
            let chunks = self.backend.open(transcript, &request_id).await?;
            reassemble(chunks).await
        })
        .await?;
        run.advance(RunStage::BackendDone);

        let text = accumulate(&messages);
        if text.trim().is_empty() {
            return Err(Error::EmptyTranscription("backend returned no text".to_string()));
        }

        run.advance(RunStage::Accumulated);
        Ok(text)
    }

    async fn synthesize(&self, sentence: &Sentence, options: &CallOptions) -> Result<Vec<u8>> {
        with_timeout(
            Service::Tts,
            self.settings.timeouts.tts,
            self.tts.synthesize(sentence.text.trim(), options),
        )
        .await
    }
}

fn segment_reply(run: &mut PipelineRun, text: &str) -> Vec<Sentence> {
    let sentences = segment(text);
    tracing::debug!(
        request_id = %run.request_id(),
        sentences = sentences.len(),
        speakable = sentences.iter().filter(|s| s.is_speakable()).count(),
        "reply segmented"
    );
    run.advance(RunStage::Segmented);
    sentences
}

fn validate_upload(audio: &AudioUpload) -> Result<()> {
    if audio.bytes.is_empty() {
        return Err(Error::Validation("uploaded audio is empty".to_string()));
    }
    Ok(())
}

fn speakable(sentence: &Sentence) -> bool {
    if sentence.is_speakable() {
        return true;
    }
    tracing::debug!(index = sentence.index, text = %sentence.text, "skipping short sentence");
    false
}

async fn emit(events: &mpsc::Sender<StageEvent>, event: StageEvent) -> std::result::Result<(), Halt> {
    tracing::trace!(event = event.name(), "emitting stage event");
    events.send(event).await.map_err(|_| Halt::Disconnected)
}

async fn with_timeout<T, F>(service: Service, after: Duration, call: F) -> Result<T>
where
    F: Future<Output = Result<T>>,
{
    tokio::time::timeout(after, call)
        .await
        .map_err(|_| Error::Timeout { service, after })?
}
