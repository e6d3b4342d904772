use std::path::PathBuf;

/// Reasons a download is refused before any process is spawned
#[derive(Debug, thiserror::Error, PartialEq, Eq)]
pub enum DownloadError {
    #[error("Please enter a valid URL.")]
    EmptyUrl,

    #[error("A download is already running.")]
    AlreadyRunning,

    #[error("Manual format selection needs a format code (see 'List Available Formats').")]
    MissingFormatCode,

    #[error(transparent)]
    MissingBinary(#[from] DependencyError),
}

/// An external binary the app depends on could not be located
#[derive(Debug, thiserror::Error, PartialEq, Eq)]
#[error("{name} not found (looked for '{}'). Place it next to the application or on your PATH.", .path.display())]
pub struct DependencyError {
    pub name: &'static str,
    pub path: PathBuf,
}

/// Failures of the `--dump-single-json` query
#[derive(Debug, thiserror::Error)]
pub enum MetadataError {
    #[error("Please enter a video or playlist URL.")]
    EmptyUrl,

    #[error("failed to launch yt-dlp: {0}")]
    Launch(#[from] std::io::Error),

    #[error("metadata query timed out after {0}s")]
    Timeout(u64),

    #[error("yt-dlp exited with {code:?}: {stderr}")]
    Failed { code: Option<i32>, stderr: String },

    #[error("malformed metadata: {0}")]
    Malformed(#[from] serde_json::Error),
}
