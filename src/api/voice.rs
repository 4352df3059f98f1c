//! Voice relay endpoints
//!
//! Thin upload layer over [`Pipeline`](crate::pipeline::Pipeline): parse the
//! multipart upload, run the pipeline in the requested mode and shape the
//! response.

use std::convert::Infallible;
use std::sync::Arc;

use axum::{
    Json, Router,
    extract::{DefaultBodyLimit, Multipart, Query, State, multipart::MultipartError},
    http::{StatusCode, header},
    response::{
        IntoResponse, Response,
        sse::{Event, KeepAlive, Sse},
    },
    routing::post,
};
use base64::Engine;
use base64::engine::general_purpose::STANDARD;
use futures::{Stream, StreamExt};
use serde::{Deserialize, Serialize};
use tokio::sync::mpsc;
use tokio_stream::wrappers::ReceiverStream;

use super::ApiState;
use crate::Error;
use crate::error::ErrorKind;
use crate::pipeline::{PipelineOutcome, PipelineRequest, RunFailure, StageEvent};
use crate::voice::AudioUpload;

/// Multipart framing allowance on top of the file size limit
const MULTIPART_OVERHEAD: usize = 64 * 1024;

/// Buffered progress events per streaming run
const EVENT_BUFFER: usize = 16;

/// Build voice router
pub fn router(state: Arc<ApiState>) -> Router {
    let body_limit = state.max_upload_bytes.saturating_add(MULTIPART_OVERHEAD);
    Router::new()
        .route("/process", post(process))
        .route("/process/stream", post(process_stream))
        .route("/audio", post(audio))
        .route("/audio/merged", post(audio_merged))
        .layer(DefaultBodyLimit::max(body_limit))
        .with_state(state)
}

/// Per-sentence result in the aggregate response
#[derive(Debug, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct SentenceResult {
    pub sentence_index: usize,
    pub sentence: String,
    pub tts_base64: String,
}

/// Aggregate response
#[derive(Debug, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct ProcessResponse {
    pub success: bool,
    pub request_id: String,
    pub stt_text: String,
    pub accumulated_text: String,
    pub tts_response_count: usize,
    pub results: Vec<SentenceResult>,
}

impl From<PipelineOutcome> for ProcessResponse {
    fn from(outcome: PipelineOutcome) -> Self {
        let results: Vec<SentenceResult> = outcome
            .results
            .into_iter()
            .map(|r| SentenceResult {
                sentence_index: r.sentence.index,
                sentence: r.sentence.text,
                tts_base64: STANDARD.encode(&r.audio),
            })
            .collect();

        Self {
            success: true,
            request_id: outcome.request_id,
            stt_text: outcome.stt_text,
            accumulated_text: outcome.accumulated_text,
            tts_response_count: results.len(),
            results,
        }
    }
}

/// Multiple-result audio response
#[derive(Debug, Serialize)]
pub struct AudioListResponse {
    pub count: usize,
    pub audios: Vec<String>,
}

/// Merged-container audio response
#[derive(Debug, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct MergedAudioResponse {
    pub success: bool,
    pub request_id: String,
    pub count: usize,
    pub tts_base64: String,
}

#[derive(Debug, Default, Deserialize)]
pub struct AudioQuery {
    /// Return every sentence's audio instead of a single payload
    #[serde(default)]
    pub multiple: bool,
}

/// Run the whole pipeline and return transcript, reply and per-sentence audio
async fn process(
    State(state): State<Arc<ApiState>>,
    multipart: Multipart,
) -> Result<Json<ProcessResponse>, ApiError> {
    let request = read_upload(&state, multipart).await?;
    let outcome = state.pipeline.run(request).await?;
    Ok(Json(outcome.into()))
}

/// Run the pipeline and stream stage events as Server-Sent Events
async fn process_stream(
    State(state): State<Arc<ApiState>>,
    multipart: Multipart,
) -> Result<Sse<impl Stream<Item = Result<Event, Infallible>>>, ApiError> {
    let request = read_upload(&state, multipart).await?;
    let (tx, rx) = mpsc::channel(EVENT_BUFFER);

    let pipeline = state.pipeline.clone();
    tokio::spawn(async move {
        let request_id = request.request_id.clone();
        let stage = pipeline.run_progressive(request, tx).await;
        tracing::debug!(request_id = %request_id, stage = stage.name(), "streaming run finished");
    });

    let events = ReceiverStream::new(rx).map(|event| Ok(to_sse(&event)));
    Ok(Sse::new(events).keep_alive(KeepAlive::default()))
}

/// Audio only: one base64 payload, or every sentence with `?multiple=true`
async fn audio(
    State(state): State<Arc<ApiState>>,
    Query(query): Query<AudioQuery>,
    multipart: Multipart,
) -> Result<Response, ApiError> {
    let request = read_upload(&state, multipart).await?;
    let outcome = state.pipeline.run(request).await?;

    let mut audios = outcome.results.iter().map(|r| STANDARD.encode(&r.audio));

    if query.multiple {
        let audios: Vec<String> = audios.collect();
        return Ok(Json(AudioListResponse {
            count: audios.len(),
            audios,
        })
        .into_response());
    }

    let first = audios.next().ok_or_else(|| ApiError {
        request_id: Some(outcome.request_id.clone()),
        error: Error::EmptyTranscription("no sentence produced audio".to_string()),
    })?;

    Ok((
        StatusCode::OK,
        [(header::CONTENT_TYPE, "text/plain; charset=utf-8")],
        first,
    )
        .into_response())
}

/// Audio only: every sentence merged into one WAV container
async fn audio_merged(
    State(state): State<Arc<ApiState>>,
    multipart: Multipart,
) -> Result<Json<MergedAudioResponse>, ApiError> {
    let request = read_upload(&state, multipart).await?;
    let outcome = state.pipeline.run(request).await?;

    let merged = outcome.merged_audio().map_err(|error| ApiError {
        request_id: Some(outcome.request_id.clone()),
        error,
    })?;

    Ok(Json(MergedAudioResponse {
        success: true,
        request_id: outcome.request_id,
        count: outcome.results.len(),
        tts_base64: STANDARD.encode(merged),
    }))
}

fn to_sse(event: &StageEvent) -> Event {
    Event::default()
        .event(event.name())
        .json_data(event)
        .unwrap_or_else(|e| {
            tracing::error!(error = %e, event = event.name(), "failed to encode stage event");
            Event::default().event("error").data(e.to_string())
        })
}

/// Parse the multipart upload into a pipeline request
///
/// The audio may arrive as `audio` or `file`; `language` and `model` are
/// optional per-call overrides.
async fn read_upload(state: &ApiState, mut multipart: Multipart) -> Result<PipelineRequest, ApiError> {
    let mut audio = None;
    let mut language = None;
    let mut model = None;

    let limit = state.max_upload_bytes;
    while let Some(field) = multipart
        .next_field()
        .await
        .map_err(|e| multipart_error(&e, limit))?
    {
        let name = field.name().unwrap_or_default().to_string();
        match name.as_str() {
            "audio" | "file" => {
                let file_name = field.file_name().unwrap_or("audio.wav").to_string();
                let content_type = field.content_type().unwrap_or("audio/wav").to_string();
                let bytes = field.bytes().await.map_err(|e| multipart_error(&e, limit))?;
                if bytes.len() > limit {
                    return Err(Error::UploadTooLarge { limit }.into());
                }

                audio = Some(AudioUpload {
                    bytes: bytes.to_vec(),
                    file_name,
                    content_type,
                });
            }
            "language" | "language_code" => {
                language = Some(field.text().await.map_err(|e| multipart_error(&e, limit))?);
            }
            "model" => model = Some(field.text().await.map_err(|e| multipart_error(&e, limit))?),
            other => tracing::debug!(field = other, "ignoring unknown upload field"),
        }
    }

    let audio = audio.ok_or_else(|| Error::Validation("no audio file uploaded".to_string()))?;
    if audio.bytes.is_empty() {
        return Err(Error::Validation("uploaded audio is empty".to_string()).into());
    }

    let options = state.pipeline.settings().defaults.with_overrides(language, model);
    let request = PipelineRequest::new(audio, options);
    tracing::info!(
        request_id = %request.request_id,
        audio_bytes = request.audio.bytes.len(),
        language = %request.options.language,
        "accepted upload"
    );
    Ok(request)
}

fn multipart_error(error: &MultipartError, limit: usize) -> ApiError {
    if error.status() == StatusCode::PAYLOAD_TOO_LARGE {
        return Error::UploadTooLarge { limit }.into();
    }
    Error::Validation(format!("invalid upload: {}", error.body_text())).into()
}

/// Voice API error
#[derive(Debug)]
pub struct ApiError {
    pub request_id: Option<String>,
    pub error: Error,
}

impl From<Error> for ApiError {
    fn from(error: Error) -> Self {
        Self {
            request_id: None,
            error,
        }
    }
}

impl From<RunFailure> for ApiError {
    fn from(failure: RunFailure) -> Self {
        Self {
            request_id: Some(failure.request_id),
            error: failure.error,
        }
    }
}

impl IntoResponse for ApiError {
    fn into_response(self) -> Response {
        #[derive(Serialize)]
        #[serde(rename_all = "camelCase")]
        struct ErrorResponse {
            success: bool,
            #[serde(skip_serializing_if = "Option::is_none")]
            request_id: Option<String>,
            error: String,
            code: &'static str,
        }

        let kind = self.error.kind();
        let status = match (&self.error, kind) {
            (Error::UploadTooLarge { .. }, _) => StatusCode::PAYLOAD_TOO_LARGE,
            (_, ErrorKind::Validation) => StatusCode::BAD_REQUEST,
            (_, ErrorKind::EmptyTranscription) => StatusCode::UNPROCESSABLE_ENTITY,
            (_, ErrorKind::UpstreamCall | ErrorKind::StreamTransport) => StatusCode::BAD_GATEWAY,
            (_, ErrorKind::Internal) => StatusCode::INTERNAL_SERVER_ERROR,
        };

        tracing::warn!(
            request_id = ?self.request_id,
            status = %status,
            error = %self.error,
            "request failed"
        );

        (
            status,
            Json(ErrorResponse {
                success: false,
                request_id: self.request_id,
                error: self.error.to_string(),
                code: kind.code(),
            }),
        )
            .into_response()
    }
}
