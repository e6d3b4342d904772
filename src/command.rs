//! yt-dlp argument lists.
//!
//! Only the order and presence of flags is decided here. URLs, templates and
//! format codes are passed through untouched; yt-dlp rejects what it does not
//! understand.

use crate::error::DownloadError;
use crate::model::{DownloadRequest, FALLBACK_TEMPLATE, FormatChoice};

/// Subtitle languages in order of preference
pub const SUBTITLE_LANGUAGES: &str = "en,en-US,en-GB";

/// Selector for "Best Video + Audio"
pub const BEST_VIDEO_AUDIO: &str = "bv*+ba/b";

/// Format expression capping both video and fallback streams at `height`
pub fn height_capped_selector(height: u32) -> String {
    format!("bestvideo[height<={height}]+bestaudio/best[height<={height}]")
}

/// Build the download arguments (program name excluded).
pub fn build_download_args(request: &DownloadRequest) -> Result<Vec<String>, DownloadError> {
    let url = request.url.trim();
    if url.is_empty() {
        return Err(DownloadError::EmptyUrl);
    }

    let mut args: Vec<String> = vec!["--progress".into(), "--newline".into(), "--no-warnings".into()];

    args.push(if request.playlist { "--yes-playlist" } else { "--no-playlist" }.into());

    if request.audio_only {
        args.extend(["-x", "--audio-format", request.audio_format.as_arg()].map(String::from));
    } else if let Some(height) = request.max_height {
        args.extend(["-f".into(), height_capped_selector(height)]);
    } else {
        match &request.format {
            FormatChoice::Auto => {}
            FormatChoice::BestVideoAudio => args.extend(["-f", BEST_VIDEO_AUDIO].map(String::from)),
            FormatChoice::Code(code) => {
                let code = code.trim();
                if code.is_empty() {
                    return Err(DownloadError::MissingFormatCode);
                }
                args.extend(["-f", code].map(String::from));
            }
        }
    }

    if request.write_subtitles {
        args.extend(["--write-sub", "--sub-lang", SUBTITLE_LANGUAGES].map(String::from));
        if request.embed_subtitles {
            args.push("--embed-subs".into());
        }
    }

    let template = match request.template.trim() {
        "" => FALLBACK_TEMPLATE,
        t => t,
    };
    args.push("-o".into());
    args.push(request.output_dir.join(template).to_string_lossy().into_owned());

    args.push(url.into());
    Ok(args)
}

/// Single-item metadata query, one JSON document on stdout
pub fn build_metadata_args(url: &str) -> Vec<String> {
    vec!["--dump-single-json".into(), "--no-playlist".into(), url.trim().into()]
}

/// yt-dlp's own human-readable format table
pub fn build_list_formats_args(url: &str) -> Vec<String> {
    vec!["-F".into(), url.trim().into()]
}

/// Render a command line for the log area
pub fn display_command(program: &str, args: &[String]) -> String {
    std::iter::once(program)
        .chain(args.iter().map(String::as_str))
        .collect::<Vec<_>>()
        .join(" ")
}
