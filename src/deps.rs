use std::path::{Path, PathBuf};

use tracing::{info, warn};

use crate::config::Settings;
use crate::error::DependencyError;

/// Resolve a configured binary: explicit paths must exist, bare names are
/// searched on PATH.
pub fn locate(binary: &Path) -> Option<PathBuf> {
    if binary.components().count() > 1 {
        return binary.is_file().then(|| binary.to_path_buf());
    }
    which::which(binary).ok()
}

/// yt-dlp is required; every operation calls this first
pub fn require_ytdlp(settings: &Settings) -> Result<PathBuf, DependencyError> {
    locate(&settings.ytdlp_path).ok_or_else(|| DependencyError {
        name: "yt-dlp",
        path: settings.ytdlp_path.clone(),
    })
}

/// Startup check result
#[derive(Debug)]
pub struct DependencyReport {
    pub ytdlp: Result<PathBuf, DependencyError>,
    /// Missing ffmpeg only means merging/extraction may fail later
    pub ffmpeg: Option<PathBuf>,
}

impl DependencyReport {
    /// Human-readable lines for the log area
    pub fn messages(&self) -> Vec<String> {
        let mut out = Vec::new();
        if let Err(e) = &self.ytdlp {
            out.push(format!("⚠️ {e}"));
        }
        match (&self.ytdlp, &self.ffmpeg) {
            (_, None) => out.push("⚠️ ffmpeg not found. Merging video/audio may fail if required.".to_string()),
            (Ok(_), Some(_)) => out.push("✅ yt-dlp and ffmpeg detected.".to_string()),
            (Err(_), Some(_)) => {}
        }
        out
    }
}

pub fn check_dependencies(settings: &Settings) -> DependencyReport {
    let report = DependencyReport {
        ytdlp: require_ytdlp(settings),
        ffmpeg: locate(&settings.ffmpeg_path),
    };
    match &report.ytdlp {
        Ok(path) => info!(path = %path.display(), "found yt-dlp"),
        Err(e) => warn!("{e}"),
    }
    if report.ffmpeg.is_none() {
        warn!(path = %settings.ffmpeg_path.display(), "ffmpeg not found");
    }
    report
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn explicit_missing_path_is_not_found() {
        let dir = tempfile::tempdir().expect("tempdir");
        let missing = dir.path().join("yt-dlp");
        assert_eq!(locate(&missing), None);

        let settings = Settings {
            ytdlp_path: missing.clone(),
            ffmpeg_path: dir.path().join("ffmpeg"),
            ..Settings::default()
        };
        let report = check_dependencies(&settings);
        let err = report.ytdlp.as_ref().unwrap_err();
        assert_eq!(err.path, missing);
        assert_eq!(report.ffmpeg, None);
        assert_eq!(report.messages().len(), 2);
    }

    #[test]
    fn explicit_existing_path_is_found() {
        let dir = tempfile::tempdir().expect("tempdir");
        let present = dir.path().join("ffmpeg");
        std::fs::write(&present, b"").unwrap();
        assert_eq!(locate(&present), Some(present));
    }
}
