// Extractor module - the boundary to the extraction library
//
// Everything URL-specific (resolution, transfer, transcoding) happens inside
// yt-dlp. This module defines the seam (`MediaExtractor`) and the binary
// implementation behind it; tests swap in scripted extractors.

mod cli;
mod progress;
mod traits;

pub use cli::YtDlpCli;
pub use progress::{parse_line, OutputLine};
pub use traits::{
    FetchEvent, FetchKind, FetchOutput, FetchRequest, MediaExtractor, AUDIO_CODEC, AUDIO_FORMAT,
    AUDIO_QUALITY_KBPS, MERGE_CONTAINER,
};
