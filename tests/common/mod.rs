//! Shared test utilities
//!
//! Counting doubles for the three collaborators plus helpers to build a
//! pipeline around them.

#![allow(dead_code)]

use std::io::Cursor;
use std::sync::Arc;
use std::sync::atomic::{AtomicUsize, Ordering};
use std::time::Duration;

use async_trait::async_trait;
use futures::StreamExt;
use voice_relay::config::Timeouts;
use voice_relay::conversation::ChunkStream;
use voice_relay::error::Service;
use voice_relay::pipeline::PipelineSettings;
use voice_relay::{
    AudioUpload, CallOptions, ConversationBackend, Error, Pipeline, PipelineRequest, Result,
    Synthesizer, Transcriber,
};

pub const SAMPLE_RATE: u32 = 24_000;

/// Build a 16-bit mono WAV holding `samples` samples of a ramp
#[must_use]
pub fn wav_with_samples(samples: usize) -> Vec<u8> {
    let spec = hound::WavSpec {
        channels: 1,
        sample_rate: SAMPLE_RATE,
        bits_per_sample: 16,
        sample_format: hound::SampleFormat::Int,
    };
    let mut cursor = Cursor::new(Vec::new());
    {
        let mut writer = hound::WavWriter::new(&mut cursor, spec).expect("wav writer");
        for i in 0..samples {
            #[allow(clippy::cast_possible_truncation, clippy::cast_possible_wrap)]
            writer.write_sample((i % 1000) as i16).expect("write sample");
        }
        writer.finalize().expect("finalize wav");
    }
    cursor.into_inner()
}

/// Read back every sample of a WAV container
#[must_use]
pub fn read_samples(wav: &[u8]) -> (hound::WavSpec, Vec<i16>) {
    let reader = hound::WavReader::new(Cursor::new(wav)).expect("valid wav");
    let spec = reader.spec();
    let samples = reader
        .into_samples::<i16>()
        .collect::<std::result::Result<Vec<_>, _>>()
        .expect("readable samples");
    (spec, samples)
}

/// Transcriber returning a fixed result
pub struct FixedTranscriber {
    reply: std::result::Result<String, String>,
    delay: Option<Duration>,
    pub calls: AtomicUsize,
}

impl FixedTranscriber {
    pub fn text(text: &str) -> Arc<Self> {
        Arc::new(Self {
            reply: Ok(text.to_string()),
            delay: None,
            calls: AtomicUsize::new(0),
        })
    }

    pub fn failing(message: &str) -> Arc<Self> {
        Arc::new(Self {
            reply: Err(message.to_string()),
            delay: None,
            calls: AtomicUsize::new(0),
        })
    }

    pub fn slow(text: &str, delay: Duration) -> Arc<Self> {
        Arc::new(Self {
            reply: Ok(text.to_string()),
            delay: Some(delay),
            calls: AtomicUsize::new(0),
        })
    }

    pub fn calls(&self) -> usize {
        self.calls.load(Ordering::SeqCst)
    }
}

#[async_trait]
impl Transcriber for FixedTranscriber {
    async fn transcribe(&self, _audio: &AudioUpload, _options: &CallOptions) -> Result<String> {
        self.calls.fetch_add(1, Ordering::SeqCst);
        if let Some(delay) = self.delay {
            tokio::time::sleep(delay).await;
        }
        self.reply
            .clone()
            .map_err(|message| Error::upstream(Service::Stt, message))
    }
}

/// Backend replaying a scripted newline-delimited reply in fixed-size chunks
pub struct ScriptedBackend {
    body: Vec<u8>,
    chunk_size: usize,
    /// Fail the transport after this many chunks
    fail_after: Option<usize>,
    pub calls: AtomicUsize,
    pub transcripts: std::sync::Mutex<Vec<String>>,
}

impl ScriptedBackend {
    /// Reply with one content record per piece of text
    pub fn items(pieces: &[&str], chunk_size: usize) -> Arc<Self> {
        let mut body = String::from("{\"type\":\"begin\"}\n");
        for piece in pieces {
            let record = serde_json::json!({ "type": "item", "content": piece });
            body.push_str(&record.to_string());
            body.push('\n');
        }
        body.push_str("{\"type\":\"end\"}\n");
        Arc::new(Self::build(body.into_bytes(), chunk_size, None))
    }

    pub fn raw(body: Vec<u8>, chunk_size: usize) -> Arc<Self> {
        Arc::new(Self::build(body, chunk_size, None))
    }

    /// Reply that breaks off with a transport error after `fail_after` chunks
    pub fn broken(body: Vec<u8>, chunk_size: usize, fail_after: usize) -> Arc<Self> {
        Arc::new(Self::build(body, chunk_size, Some(fail_after)))
    }

    fn build(body: Vec<u8>, chunk_size: usize, fail_after: Option<usize>) -> Self {
        Self {
            body,
            chunk_size: chunk_size.max(1),
            fail_after,
            calls: AtomicUsize::new(0),
            transcripts: std::sync::Mutex::new(Vec::new()),
        }
    }

    pub fn calls(&self) -> usize {
        self.calls.load(Ordering::SeqCst)
    }
}

#[async_trait]
impl ConversationBackend for ScriptedBackend {
    async fn open(&self, transcript: &str, _request_id: &str) -> Result<ChunkStream> {
        self.calls.fetch_add(1, Ordering::SeqCst);
        self.transcripts
            .lock()
            .expect("transcripts lock")
            .push(transcript.to_string());

        let mut chunks: Vec<Result<Vec<u8>>> = self
            .body
            .chunks(self.chunk_size)
            .map(|c| Ok(c.to_vec()))
            .collect();
        if let Some(n) = self.fail_after {
            chunks.truncate(n);
            chunks.push(Err(Error::StreamTransport("connection reset".to_string())));
        }
        Ok(futures::stream::iter(chunks).boxed())
    }
}

/// Synthesizer producing one WAV per sentence, failing on chosen sentences
pub struct ScriptedSynthesizer {
    fail_on: Vec<String>,
    samples_per_char: usize,
    pub calls: AtomicUsize,
    pub spoken: std::sync::Mutex<Vec<String>>,
}

impl ScriptedSynthesizer {
    pub fn new() -> Arc<Self> {
        Self::failing_on(&[])
    }

    pub fn failing_on(sentences: &[&str]) -> Arc<Self> {
        Arc::new(Self {
            fail_on: sentences.iter().map(ToString::to_string).collect(),
            samples_per_char: 10,
            calls: AtomicUsize::new(0),
            spoken: std::sync::Mutex::new(Vec::new()),
        })
    }

    pub fn calls(&self) -> usize {
        self.calls.load(Ordering::SeqCst)
    }

    /// Samples produced for a given sentence
    pub fn samples_for(&self, sentence: &str) -> usize {
        sentence.chars().count() * self.samples_per_char
    }
}

#[async_trait]
impl Synthesizer for ScriptedSynthesizer {
    async fn synthesize(&self, text: &str, _options: &CallOptions) -> Result<Vec<u8>> {
        self.calls.fetch_add(1, Ordering::SeqCst);
        self.spoken.lock().expect("spoken lock").push(text.to_string());

        if self.fail_on.iter().any(|f| f == text) {
            return Err(Error::upstream(Service::Tts, "HTTP 500: synthesis failed"));
        }
        Ok(wav_with_samples(self.samples_for(text)))
    }
}

pub fn default_options() -> CallOptions {
    CallOptions {
        language: "hi-IN".to_string(),
        model: "saarika:v2".to_string(),
    }
}

pub fn settings() -> PipelineSettings {
    PipelineSettings {
        timeouts: Timeouts::default(),
        defaults: default_options(),
    }
}

pub fn pipeline(
    stt: Arc<FixedTranscriber>,
    backend: Arc<ScriptedBackend>,
    tts: Arc<ScriptedSynthesizer>,
) -> Pipeline {
    Pipeline::new(stt, backend, tts, settings())
}

/// A request carrying a small non-empty upload
pub fn request() -> PipelineRequest {
    PipelineRequest::new(AudioUpload::wav(wav_with_samples(160)), default_options())
}
