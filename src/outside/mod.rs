mod command;
mod ffmpeg;
mod ffprobe;
mod ytdl;

pub use command::CommandError;
pub use ffmpeg::{Ffmpeg, MediaTranscoder, TranscodeError};
pub use ffprobe::{Ffprobe, MediaInspector, ProbeError};
pub use ytdl::{DownloadError, MediaDownloader, Ytdl};
