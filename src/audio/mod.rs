//! Audio container handling

mod wav;

pub use wav::{HEADER_LEN, PcmFormat, WavRecombiner, extract_pcm_payload, merge_wav, write_header};
