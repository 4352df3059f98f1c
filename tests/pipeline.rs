//! Pipeline integration tests against collaborator doubles

use std::time::Duration;

use tokio::sync::mpsc;
use voice_relay::config::Timeouts;
use voice_relay::pipeline::{PipelineSettings, RunStage};
use voice_relay::{AudioUpload, ErrorKind, Pipeline, PipelineRequest, StageEvent};

mod common;
use common::{
    FixedTranscriber, ScriptedBackend, ScriptedSynthesizer, default_options, pipeline, read_samples,
    request,
};

const REPLY: &[&str] = &["Hello there. ", "How are ", "you? Fine."];

async fn collect_events(pipeline: &Pipeline, request: PipelineRequest) -> (RunStage, Vec<StageEvent>) {
    let (tx, mut rx) = mpsc::channel(64);
    let stage = pipeline.run_progressive(request, tx).await;

    let mut events = Vec::new();
    while let Some(event) = rx.recv().await {
        events.push(event);
    }
    (stage, events)
}

fn names(events: &[StageEvent]) -> Vec<&'static str> {
    events.iter().map(StageEvent::name).collect()
}

#[tokio::test]
async fn test_progressive_reports_sentence_failures_and_continues() {
    let stt = FixedTranscriber::text("namaste");
    let backend = ScriptedBackend::items(REPLY, 7);
    let tts = ScriptedSynthesizer::failing_on(&["How are you?"]);
    let pipeline = pipeline(stt.clone(), backend.clone(), tts.clone());

    let (stage, events) = collect_events(&pipeline, request()).await;

    assert_eq!(stage, RunStage::Complete);
    assert_eq!(
        names(&events),
        vec![
            "start",
            "stt_start",
            "stt_complete",
            "webhook_start",
            "webhook_complete",
            "tts_start",
            "tts_result",
            "tts_error",
            "tts_result",
            "complete",
        ]
    );

    match &events[4] {
        StageEvent::WebhookComplete { accumulated_text, .. } => {
            assert_eq!(accumulated_text, "Hello there. How are you? Fine.");
        }
        other => panic!("unexpected event {other:?}"),
    }
    match &events[5] {
        StageEvent::TtsStart { sentence_count, .. } => assert_eq!(*sentence_count, 3),
        other => panic!("unexpected event {other:?}"),
    }
    match &events[7] {
        StageEvent::TtsError {
            sentence_index,
            sentence,
            error,
            ..
        } => {
            assert_eq!(*sentence_index, 2);
            assert_eq!(sentence, "How are you?");
            assert!(error.contains("synthesis failed"));
        }
        other => panic!("unexpected event {other:?}"),
    }
    match events.last() {
        Some(StageEvent::Complete {
            tts_response_count,
            tts_error_count,
            ..
        }) => {
            assert_eq!(*tts_response_count, 2);
            assert_eq!(*tts_error_count, 1);
        }
        other => panic!("unexpected event {other:?}"),
    }

    assert_eq!(stt.calls(), 1);
    assert_eq!(backend.calls(), 1);
    assert_eq!(tts.calls(), 3);
    assert_eq!(
        *tts.spoken.lock().unwrap(),
        vec!["Hello there.", "How are you?", "Fine."]
    );
}

#[tokio::test]
async fn test_progressive_events_share_request_id() {
    let pipeline = pipeline(
        FixedTranscriber::text("namaste"),
        ScriptedBackend::items(REPLY, 3),
        ScriptedSynthesizer::new(),
    );
    let request = request();
    let request_id = request.request_id.clone();

    let (_, events) = collect_events(&pipeline, request).await;

    for event in &events {
        let payload = serde_json::to_value(event).unwrap();
        assert_eq!(payload["requestId"], request_id.as_str(), "{}", event.name());
    }
}

#[tokio::test]
async fn test_stt_failure_stops_before_backend_and_tts() {
    let stt = FixedTranscriber::failing("HTTP 503: unavailable");
    let backend = ScriptedBackend::items(REPLY, 7);
    let tts = ScriptedSynthesizer::new();
    let pipeline = pipeline(stt.clone(), backend.clone(), tts.clone());

    let (stage, events) = collect_events(&pipeline, request()).await;

    assert_eq!(stage, RunStage::Failed);
    assert_eq!(names(&events), vec!["start", "stt_start", "error"]);
    match events.last() {
        Some(StageEvent::Error { code, error, .. }) => {
            assert_eq!(*code, "upstream_call_error");
            assert!(error.contains("HTTP 503"));
        }
        other => panic!("unexpected event {other:?}"),
    }
    assert_eq!(backend.calls(), 0);
    assert_eq!(tts.calls(), 0);
}

#[tokio::test]
async fn test_blank_transcript_is_empty_transcription() {
    let backend = ScriptedBackend::items(REPLY, 7);
    let tts = ScriptedSynthesizer::new();
    let pipeline = pipeline(FixedTranscriber::text("   "), backend.clone(), tts.clone());

    let failure = pipeline.run(request()).await.unwrap_err();

    assert_eq!(failure.error.kind(), ErrorKind::EmptyTranscription);
    assert_eq!(backend.calls(), 0);
    assert_eq!(tts.calls(), 0);
}

#[tokio::test]
async fn test_transcript_is_forwarded_trimmed() {
    let backend = ScriptedBackend::items(REPLY, 7);
    let pipeline = pipeline(
        FixedTranscriber::text("  kya haal hai  "),
        backend.clone(),
        ScriptedSynthesizer::new(),
    );

    let outcome = pipeline.run(request()).await.unwrap();

    assert_eq!(outcome.stt_text, "kya haal hai");
    assert_eq!(*backend.transcripts.lock().unwrap(), vec!["kya haal hai"]);
}

#[tokio::test]
async fn test_transport_error_fails_run_without_tts() {
    let body = b"{\"type\":\"item\",\"content\":\"Hello. \"}\n{\"type\":\"item\",\"content\":\"Bye.\"}\n".to_vec();
    let tts = ScriptedSynthesizer::new();
    let pipeline = pipeline(
        FixedTranscriber::text("namaste"),
        ScriptedBackend::broken(body, 10, 2),
        tts.clone(),
    );

    let (stage, events) = collect_events(&pipeline, request()).await;

    assert_eq!(stage, RunStage::Failed);
    assert_eq!(
        names(&events),
        vec!["start", "stt_start", "stt_complete", "webhook_start", "error"]
    );
    match events.last() {
        Some(StageEvent::Error { code, .. }) => assert_eq!(*code, "stream_transport_error"),
        other => panic!("unexpected event {other:?}"),
    }
    assert_eq!(tts.calls(), 0);
}

#[tokio::test]
async fn test_backend_without_content_is_empty_transcription() {
    let body = b"{\"type\":\"begin\"}\n{\"type\":\"end\"}\n".to_vec();
    let tts = ScriptedSynthesizer::new();
    let pipeline = pipeline(
        FixedTranscriber::text("namaste"),
        ScriptedBackend::raw(body, 4),
        tts.clone(),
    );

    let failure = pipeline.run(request()).await.unwrap_err();

    assert_eq!(failure.error.kind(), ErrorKind::EmptyTranscription);
    assert_eq!(tts.calls(), 0);
}

#[tokio::test]
async fn test_aggregate_returns_every_sentence_in_order() {
    let tts = ScriptedSynthesizer::new();
    let pipeline = pipeline(
        FixedTranscriber::text("namaste"),
        ScriptedBackend::items(REPLY, 5),
        tts.clone(),
    );

    let outcome = pipeline.run(request()).await.unwrap();

    assert_eq!(outcome.accumulated_text, "Hello there. How are you? Fine.");
    let indices: Vec<usize> = outcome.results.iter().map(|r| r.sentence.index).collect();
    assert_eq!(indices, vec![1, 2, 3]);

    let merged = outcome.merged_audio().unwrap();
    let (spec, samples) = read_samples(&merged);
    assert_eq!(spec.sample_rate, common::SAMPLE_RATE);
    assert_eq!(spec.channels, 1);
    let expected: usize = ["Hello there.", "How are you?", "Fine."]
        .iter()
        .map(|s| tts.samples_for(s))
        .sum();
    assert_eq!(samples.len(), expected);
}

#[tokio::test]
async fn test_aggregate_fails_on_any_synthesis_error() {
    let tts = ScriptedSynthesizer::failing_on(&["Fine."]);
    let pipeline = pipeline(
        FixedTranscriber::text("namaste"),
        ScriptedBackend::items(REPLY, 7),
        tts.clone(),
    );
    let request = request();
    let request_id = request.request_id.clone();

    let failure = pipeline.run(request).await.unwrap_err();

    assert_eq!(failure.request_id, request_id);
    assert_eq!(failure.error.kind(), ErrorKind::UpstreamCall);
    assert_eq!(tts.calls(), 3);
}

#[tokio::test]
async fn test_short_sentences_are_not_synthesized() {
    let tts = ScriptedSynthesizer::new();
    let pipeline = pipeline(
        FixedTranscriber::text("namaste"),
        ScriptedBackend::items(&["Yes! ? Done."], 4),
        tts.clone(),
    );

    let (_, events) = collect_events(&pipeline, request()).await;

    match events.iter().find(|e| e.name() == "tts_start") {
        Some(StageEvent::TtsStart { sentence_count, .. }) => assert_eq!(*sentence_count, 3),
        other => panic!("unexpected event {other:?}"),
    }
    let indices: Vec<usize> = events
        .iter()
        .filter_map(|e| match e {
            StageEvent::TtsResult { sentence_index, .. } => Some(*sentence_index),
            _ => None,
        })
        .collect();
    assert_eq!(indices, vec![1, 3]);
    assert_eq!(tts.calls(), 2);
}

#[tokio::test]
async fn test_empty_upload_is_rejected_before_stt() {
    let stt = FixedTranscriber::text("namaste");
    let pipeline = pipeline(
        stt.clone(),
        ScriptedBackend::items(REPLY, 7),
        ScriptedSynthesizer::new(),
    );
    let request = PipelineRequest::new(AudioUpload::wav(Vec::new()), default_options());

    let failure = pipeline.run(request).await.unwrap_err();

    assert_eq!(failure.error.kind(), ErrorKind::Validation);
    assert_eq!(stt.calls(), 0);
}

#[tokio::test]
async fn test_disconnected_caller_abandons_run() {
    let stt = FixedTranscriber::text("namaste");
    let tts = ScriptedSynthesizer::new();
    let pipeline = pipeline(stt.clone(), ScriptedBackend::items(REPLY, 7), tts.clone());

    let (tx, rx) = mpsc::channel(4);
    drop(rx);
    let stage = pipeline.run_progressive(request(), tx).await;

    assert_eq!(stage, RunStage::Failed);
    assert_eq!(stt.calls(), 0);
    assert_eq!(tts.calls(), 0);
}

#[tokio::test]
async fn test_slow_stt_times_out() {
    let stt = FixedTranscriber::slow("namaste", Duration::from_secs(5));
    let backend = ScriptedBackend::items(REPLY, 7);
    let settings = PipelineSettings {
        timeouts: Timeouts {
            stt: Duration::from_millis(50),
            ..Timeouts::default()
        },
        defaults: default_options(),
    };
    let pipeline = Pipeline::new(stt, backend.clone(), ScriptedSynthesizer::new(), settings);

    let failure = pipeline.run(request()).await.unwrap_err();

    assert_eq!(failure.error.kind(), ErrorKind::UpstreamCall);
    assert!(failure.error.to_string().contains("timed out"));
    assert_eq!(backend.calls(), 0);
}
