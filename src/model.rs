use std::path::PathBuf;

use serde::Deserialize;

/// Filename template used when the form leaves it blank
pub const FALLBACK_TEMPLATE: &str = "%(title)s.%(ext)s";

/// Container yt-dlp converts to when only audio is requested
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum AudioFormat {
    #[default]
    Mp3,
    Wav,
}

impl AudioFormat {
    /// Value passed to `--audio-format`
    pub fn as_arg(self) -> &'static str {
        match self {
            AudioFormat::Mp3 => "mp3",
            AudioFormat::Wav => "wav",
        }
    }
}

impl std::str::FromStr for AudioFormat {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.trim().to_ascii_lowercase().as_str() {
            "mp3" => Ok(AudioFormat::Mp3),
            "wav" => Ok(AudioFormat::Wav),
            other => Err(format!("unsupported audio format '{other}' (expected mp3 or wav)")),
        }
    }
}

/// Which `-f` selector (if any) the download should carry
#[derive(Debug, Clone, PartialEq, Eq, Default)]
pub enum FormatChoice {
    /// Let yt-dlp pick its own default
    #[default]
    Auto,
    /// Best video merged with best audio, falling back to best single file
    BestVideoAudio,
    /// A format id picked from the fetched list or typed in by hand
    Code(String),
}

/// Format presets of the quick download panel
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum QuickPreset {
    #[default]
    BestAuto,
    BestVideoAudio,
    AudioMp3,
    AudioWav,
    /// Format code typed by the user, see "List Available Formats"
    Manual,
}

impl QuickPreset {
    pub const ALL: [QuickPreset; 5] = [
        QuickPreset::BestAuto,
        QuickPreset::BestVideoAudio,
        QuickPreset::AudioMp3,
        QuickPreset::AudioWav,
        QuickPreset::Manual,
    ];

    pub fn label(self) -> &'static str {
        match self {
            QuickPreset::BestAuto => "Best (auto)",
            QuickPreset::BestVideoAudio => "Best Video + Audio",
            QuickPreset::AudioMp3 => "Audio Only (MP3)",
            QuickPreset::AudioWav => "Audio Only (WAV)",
            QuickPreset::Manual => "Manual format code",
        }
    }

    /// Set the format-related fields of `request` for this preset
    pub fn apply(self, request: &mut DownloadRequest, manual_code: &str) {
        request.audio_only = matches!(self, QuickPreset::AudioMp3 | QuickPreset::AudioWav);
        request.max_height = None;
        request.format = FormatChoice::Auto;
        match self {
            QuickPreset::BestAuto => {}
            QuickPreset::BestVideoAudio => request.format = FormatChoice::BestVideoAudio,
            QuickPreset::AudioMp3 => request.audio_format = AudioFormat::Mp3,
            QuickPreset::AudioWav => request.audio_format = AudioFormat::Wav,
            QuickPreset::Manual => request.format = FormatChoice::Code(manual_code.trim().to_string()),
        }
    }
}

/// Everything needed to build one download command. Built fresh from the form
/// each time the user presses Download.
#[derive(Debug, Clone, Default)]
pub struct DownloadRequest {
    /// Video or playlist URL
    pub url: String,
    /// Folder the downloaded media lands in
    pub output_dir: PathBuf,
    /// Output template, placeholders are left for yt-dlp to expand
    pub template: String,
    /// Expand playlists instead of fetching the single item
    pub playlist: bool,
    /// Extract audio only
    pub audio_only: bool,
    /// Container used when `audio_only` is set
    pub audio_format: AudioFormat,
    /// Download subtitles
    pub write_subtitles: bool,
    /// Mux subtitles into the output (only with `write_subtitles`)
    pub embed_subtitles: bool,
    /// Resolution ceiling in pixels of height
    pub max_height: Option<u32>,
    /// Explicit format selection
    pub format: FormatChoice,
}

/// One stream variant reported by `--dump-single-json`
#[derive(Debug, Clone, PartialEq, Deserialize)]
pub struct FormatDescriptor {
    pub format_id: String,
    #[serde(default)]
    pub ext: String,
    #[serde(default)]
    pub resolution: Option<String>,
    #[serde(default)]
    pub format_note: Option<String>,
    #[serde(default)]
    pub filesize: Option<f64>,
    #[serde(default)]
    pub filesize_approx: Option<f64>,
}

impl FormatDescriptor {
    /// Exact size if known, otherwise yt-dlp's estimate, otherwise zero
    pub fn approx_bytes(&self) -> f64 {
        self.filesize.or(self.filesize_approx).unwrap_or(0.0)
    }

    /// Single-line label shown in the format list
    pub fn label(&self) -> String {
        format!(
            "{} | {} | {} | {} | {:.2}MB",
            self.format_id,
            self.ext,
            self.resolution.as_deref().unwrap_or("audio"),
            self.format_note.as_deref().unwrap_or(""),
            self.approx_bytes() / (1024.0 * 1024.0)
        )
    }
}

/// The subset of yt-dlp's metadata the UI shows
#[derive(Debug, Clone, Default, PartialEq, Deserialize)]
pub struct VideoMetadata {
    #[serde(default)]
    pub title: Option<String>,
    #[serde(default)]
    pub uploader: Option<String>,
    #[serde(default)]
    pub duration: Option<f64>,
    #[serde(default)]
    pub thumbnail: Option<String>,
    #[serde(default)]
    pub formats: Vec<FormatDescriptor>,
}

/// Lifecycle of the download slot
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum RunState {
    #[default]
    Idle,
    Running,
    Succeeded,
    Failed,
}

/// Final word on a run, sent once the log file is closed
#[derive(Debug, Clone, PartialEq)]
pub struct RunReport {
    /// Succeeded or Failed
    pub state: RunState,
    /// Progress at the end of the run (100 on success)
    pub progress: f32,
    /// Exit code, absent when the process never started or was killed by a signal
    pub exit_code: Option<i32>,
    /// Where the captured output was written
    pub log_path: Option<PathBuf>,
}

/// Messages from a download worker back to whoever started it
#[derive(Debug, Clone, PartialEq)]
pub enum RunEvent {
    /// Process is about to be spawned
    Started {
        command: String,
        log_path: Option<PathBuf>,
    },
    /// One line of combined stdout/stderr
    Line(String),
    /// A progress line was recognised
    Progress { percent: f32, status: String },
    /// Run is over and the log file is written
    Finished(RunReport),
}

/// Parse a resolution ceiling such as "720p" or "720". "none" and blanks mean
/// no ceiling; zero and anything else that is not a height is rejected.
pub fn parse_max_resolution(value: &str) -> Result<Option<u32>, String> {
    let trimmed = value.trim();
    if trimmed.is_empty() || trimmed.eq_ignore_ascii_case("none") {
        return Ok(None);
    }
    let digits = trimmed.strip_suffix(['p', 'P']).unwrap_or(trimmed);
    match digits.parse::<u32>() {
        Ok(height) if height > 0 && digits.bytes().all(|b| b.is_ascii_digit()) => Ok(Some(height)),
        _ => Err(format!("invalid resolution '{trimmed}' (expected a height such as 720p, or none)")),
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn resolution_strings() {
        assert_eq!(parse_max_resolution("720p"), Ok(Some(720)));
        assert_eq!(parse_max_resolution("1080"), Ok(Some(1080)));
        assert_eq!(parse_max_resolution(" 480P "), Ok(Some(480)));
        assert_eq!(parse_max_resolution("none"), Ok(None));
        assert_eq!(parse_max_resolution(""), Ok(None));
        for bad in ["bogus", "72O", "0p", "0", "720pp", "+720", "-1"] {
            assert!(parse_max_resolution(bad).is_err(), "{bad} accepted");
        }
    }

    #[test]
    fn label_uses_approx_size_and_audio_fallback() {
        let f = FormatDescriptor {
            format_id: "140".into(),
            ext: "m4a".into(),
            resolution: None,
            format_note: Some("medium".into()),
            filesize: None,
            filesize_approx: Some(3.0 * 1024.0 * 1024.0),
        };
        assert_eq!(f.label(), "140 | m4a | audio | medium | 3.00MB");
    }

    #[test]
    fn quick_presets() {
        let mut r = DownloadRequest {
            max_height: Some(720),
            ..Default::default()
        };
        QuickPreset::AudioWav.apply(&mut r, "");
        assert!(r.audio_only);
        assert_eq!(r.audio_format, AudioFormat::Wav);
        assert_eq!(r.max_height, None);

        QuickPreset::Manual.apply(&mut r, " 137+140 ");
        assert!(!r.audio_only);
        assert_eq!(r.format, FormatChoice::Code("137+140".into()));

        QuickPreset::BestAuto.apply(&mut r, "ignored");
        assert_eq!(r.format, FormatChoice::Auto);
    }

    #[test]
    fn audio_format_from_str() {
        assert_eq!("MP3".parse::<AudioFormat>(), Ok(AudioFormat::Mp3));
        assert_eq!("wav".parse::<AudioFormat>(), Ok(AudioFormat::Wav));
        assert!("flac".parse::<AudioFormat>().is_err());
    }
}
