use std::path::{Path, PathBuf};

use anyhow::{Context, Result};
use directories::ProjectDirs;
use serde::{Deserialize, Serialize};
use tracing::{debug, warn};

const SETTINGS_FILE: &str = "settings.toml";

fn default_binary(name: &str) -> PathBuf {
    if cfg!(target_os = "windows") {
        PathBuf::from(format!("{name}.exe"))
    } else {
        PathBuf::from(name)
    }
}

/// User preferences. Every field has a default, so a missing or partial file
/// is fine.
#[derive(Serialize, Deserialize, Debug, Clone, PartialEq)]
#[serde(default)]
pub struct Settings {
    /// yt-dlp executable (bare names are looked up on PATH)
    pub ytdlp_path: PathBuf,
    /// ffmpeg executable, only checked for presence
    pub ffmpeg_path: PathBuf,
    /// Where run logs are written
    pub logs_dir: PathBuf,
    /// Last used output folder, current directory when unset
    pub output_dir: Option<PathBuf>,
    pub filename_template: String,
    pub metadata_timeout_secs: u64,
    /// Lines kept in the on-screen log
    pub log_view_lines: usize,
}

impl Default for Settings {
    fn default() -> Self {
        Self {
            ytdlp_path: default_binary("yt-dlp"),
            ffmpeg_path: default_binary("ffmpeg"),
            logs_dir: PathBuf::from("logs"),
            output_dir: None,
            filename_template: "%(title)s [%(id)s].%(ext)s".to_string(),
            metadata_timeout_secs: 20,
            log_view_lines: 2000,
        }
    }
}

impl Settings {
    fn default_path() -> Option<PathBuf> {
        ProjectDirs::from("", "", "tubegrab").map(|dirs| dirs.config_dir().join(SETTINGS_FILE))
    }

    /// Load from `path`, or from the platform config dir when `None`.
    /// Anything unreadable falls back to defaults; only a missing file is silent.
    pub fn load(path: Option<&Path>) -> Self {
        let Some(path) = path.map(Path::to_path_buf).or_else(Self::default_path) else {
            return Self::default();
        };
        match std::fs::read_to_string(&path) {
            Ok(content) => match toml::from_str(&content) {
                Ok(settings) => {
                    debug!(path = %path.display(), "loaded settings");
                    settings
                }
                Err(e) => {
                    warn!(path = %path.display(), error = %e, "ignoring malformed settings file");
                    Self::default()
                }
            },
            Err(e) if e.kind() == std::io::ErrorKind::NotFound => Self::default(),
            Err(e) => {
                warn!(path = %path.display(), error = %e, "could not read settings file");
                Self::default()
            }
        }
    }

    /// Persist to the platform config dir
    pub fn save(&self) -> Result<()> {
        let path = Self::default_path().context("No config directory on this platform")?;
        self.save_to(&path)
    }

    pub fn save_to(&self, path: &Path) -> Result<()> {
        if let Some(dir) = path.parent() {
            std::fs::create_dir_all(dir).with_context(|| format!("Failed to create {}", dir.display()))?;
        }
        let content = toml::to_string(self).context("Failed to serialize settings")?;
        std::fs::write(path, content).with_context(|| format!("Failed to write {}", path.display()))
    }

    /// Output folder to preselect in the form
    pub fn output_dir_or_cwd(&self) -> PathBuf {
        self.output_dir
            .clone()
            .or_else(|| std::env::current_dir().ok())
            .unwrap_or_else(|| PathBuf::from("."))
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn partial_file_keeps_defaults() {
        let dir = tempfile::tempdir().expect("tempdir");
        let path = dir.path().join(SETTINGS_FILE);
        std::fs::write(&path, "logs_dir = \"run-logs\"\nmetadata_timeout_secs = 5\n").unwrap();

        let s = Settings::load(Some(&path));
        assert_eq!(s.logs_dir, PathBuf::from("run-logs"));
        assert_eq!(s.metadata_timeout_secs, 5);
        assert_eq!(s.filename_template, Settings::default().filename_template);
    }

    #[test]
    fn malformed_or_missing_file_falls_back() {
        let dir = tempfile::tempdir().expect("tempdir");
        let path = dir.path().join(SETTINGS_FILE);
        assert_eq!(Settings::load(Some(&path)), Settings::default());

        std::fs::write(&path, "this is = = not toml").unwrap();
        assert_eq!(Settings::load(Some(&path)), Settings::default());
    }

    #[test]
    fn unreadable_path_falls_back() {
        let dir = tempfile::tempdir().expect("tempdir");
        // Reading a directory fails with something other than NotFound
        assert_eq!(Settings::load(Some(dir.path())), Settings::default());
    }

    #[test]
    fn save_then_load() {
        let dir = tempfile::tempdir().expect("tempdir");
        let path = dir.path().join("nested").join(SETTINGS_FILE);
        let settings = Settings {
            output_dir: Some(PathBuf::from("/tmp/videos")),
            ..Settings::default()
        };
        settings.save_to(&path).unwrap();
        assert_eq!(Settings::load(Some(&path)), settings);
    }
}
