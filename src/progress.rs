use once_cell::sync::Lazy;
use regex::Regex;

/// yt-dlp's download progress line, e.g. `[download]  42.5% of 10.00MiB at ...`
static DOWNLOAD_PERCENT: Lazy<Regex> =
    Lazy::new(|| Regex::new(r"\[download\]\s+([\d.]+)%").expect("progress pattern is valid"));

/// Extract the percentage from one output line. Returns `None` for lines
/// without the marker and for values that don't parse or fall outside 0..=100.
pub fn parse_progress_from_line(line: &str) -> Option<f32> {
    let caps = DOWNLOAD_PERCENT.captures(line)?;
    let value: f32 = caps[1].parse().ok()?;
    (0.0..=100.0).contains(&value).then_some(value)
}

/// Progress value and status text for the run in flight
#[derive(Debug, Clone, PartialEq)]
pub struct Progress {
    pub percent: f32,
    pub status: String,
}

impl Default for Progress {
    fn default() -> Self {
        Self {
            percent: 0.0,
            status: "Ready".to_string(),
        }
    }
}

impl Progress {
    /// Feed one line. Updates value and status and returns true on a progress
    /// line, leaves both untouched otherwise.
    pub fn scan(&mut self, line: &str) -> bool {
        match parse_progress_from_line(line) {
            Some(percent) => {
                self.percent = percent;
                self.status = format!("Downloading... {percent:.1}%");
                true
            }
            None => false,
        }
    }

    /// Back to zero for a new run
    pub fn reset(&mut self, status: impl Into<String>) {
        self.percent = 0.0;
        self.status = status.into();
    }

    pub fn complete(&mut self) {
        self.percent = 100.0;
        self.status = "Download finished.".to_string();
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn extracts_percentage() {
        assert_eq!(parse_progress_from_line("[download]  42.5% of 10MiB"), Some(42.5));
        assert_eq!(
            parse_progress_from_line("[download] 100.0% of ~  3.21MiB at  2.10MiB/s ETA 00:00"),
            Some(100.0)
        );
        assert_eq!(parse_progress_from_line("[download]   0.0% of 10MiB"), Some(0.0));
    }

    #[test]
    fn ignores_other_lines() {
        assert_eq!(parse_progress_from_line("[youtube] abc: Downloading webpage"), None);
        assert_eq!(parse_progress_from_line("[download] Destination: out/video.mp4"), None);
        assert_eq!(parse_progress_from_line(""), None);
    }

    #[test]
    fn ignores_unparseable_and_out_of_range() {
        assert_eq!(parse_progress_from_line("[download]  1.2.3% of 10MiB"), None);
        assert_eq!(parse_progress_from_line("[download]  140.0% of 10MiB"), None);
    }

    #[test]
    fn scan_keeps_previous_value_on_miss() {
        let mut p = Progress::default();
        assert!(p.scan("[download]  42.5% of 10MiB"));
        assert_eq!(p.percent, 42.5);
        assert_eq!(p.status, "Downloading... 42.5%");

        assert!(!p.scan("[Merger] Merging formats into \"x.mkv\""));
        assert!(!p.scan("[download]  999% of 10MiB"));
        assert_eq!(p.percent, 42.5);
        assert_eq!(p.status, "Downloading... 42.5%");
    }

    #[test]
    fn reset_and_complete() {
        let mut p = Progress::default();
        p.scan("[download]  12.0% of 1MiB");
        p.reset("Downloading...");
        assert_eq!(p.percent, 0.0);
        p.complete();
        assert_eq!(p.percent, 100.0);
    }
}
