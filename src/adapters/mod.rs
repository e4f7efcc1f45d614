//! Concrete implementations of the pipeline collaborators.

mod ffmpeg;
mod genre;
mod music_api;
mod spotify;
mod tagged_writer;
mod ytdlp;

pub use ffmpeg::{FfmpegTranscoder, TranscodeError};
pub use genre::GenreClient;
pub use music_api::MusicApiClient;
pub use spotify::{search_term, SpotifyCatalogClient};
pub use tagged_writer::{sanitize_filename, TaggedFileWriter};
pub use ytdlp::{staged_path, YtDlpRetriever};
