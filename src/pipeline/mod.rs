//! Voice relay pipeline
//!
//! Uploaded audio goes to STT, the transcript to the conversational backend,
//! the streamed reply is reassembled, accumulated and split into sentences,
//! and each sentence is synthesized in turn.

mod events;
mod orchestrator;
mod run;
pub mod segmenter;

pub use events::StageEvent;
pub use orchestrator::{
    Pipeline, PipelineOutcome, PipelineRequest, PipelineSettings, RunFailure, SentenceAudio,
};
pub use run::{PipelineRun, RunStage};
pub use segmenter::{MIN_SPEAKABLE_CHARS, Sentence, segment};
