use std::{
    fs::{self, File},
    io::{BufWriter, Write},
    path::{Path, PathBuf},
};

use anyhow::{Context, Result};
use chrono::{DateTime, Local};

/// File name for a run started at `at`. Second resolution, so two runs in
/// the same second share a name.
pub fn log_file_name(at: DateTime<Local>) -> String {
    format!("log-{}.txt", at.format("%Y%m%d-%H%M%S"))
}

/// Append-as-you-go log of one run's output
pub struct RunLog {
    path: PathBuf,
    writer: BufWriter<File>,
}

impl RunLog {
    /// Create `dir` if needed and open a fresh timestamped file in it
    pub fn create(dir: &Path) -> Result<Self> {
        Self::create_at(dir, Local::now())
    }

    pub fn create_at(dir: &Path, at: DateTime<Local>) -> Result<Self> {
        fs::create_dir_all(dir).with_context(|| format!("Failed to create logs directory {}", dir.display()))?;
        let path = dir.join(log_file_name(at));
        let file = File::create(&path).with_context(|| format!("Failed to create log file {}", path.display()))?;
        Ok(Self {
            path,
            writer: BufWriter::new(file),
        })
    }

    pub fn path(&self) -> &Path {
        &self.path
    }

    /// Append one captured line (a newline is added)
    pub fn append(&mut self, line: &str) -> Result<()> {
        writeln!(self.writer, "{line}").with_context(|| format!("Failed to write {}", self.path.display()))
    }

    /// Write the closing marker line, flush, and hand back the path
    pub fn finish(mut self, marker: &str) -> Result<PathBuf> {
        self.append(marker)?;
        self.writer
            .flush()
            .with_context(|| format!("Failed to flush {}", self.path.display()))?;
        Ok(self.path)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use chrono::TimeZone;

    #[test]
    fn file_name_has_second_resolution() {
        let at = Local.with_ymd_and_hms(2024, 3, 9, 7, 5, 2).unwrap();
        assert_eq!(log_file_name(at), "log-20240309-070502.txt");
    }

    #[test]
    fn lines_in_order_then_marker() {
        let dir = tempfile::tempdir().expect("tempdir");
        let logs = dir.path().join("logs");

        let mut log = RunLog::create(&logs).unwrap();
        log.append("[youtube] abc: Downloading webpage").unwrap();
        log.append("[download]  42.5% of 10MiB").unwrap();
        log.append("[download] 100% of 10MiB").unwrap();
        let path = log.finish("Download completed successfully.").unwrap();

        assert!(path.starts_with(&logs));
        let text = fs::read_to_string(&path).unwrap();
        assert_eq!(
            text,
            "[youtube] abc: Downloading webpage\n\
             [download]  42.5% of 10MiB\n\
             [download] 100% of 10MiB\n\
             Download completed successfully.\n"
        );
    }

    #[test]
    fn same_second_overwrites() {
        let dir = tempfile::tempdir().expect("tempdir");
        let at = Local.with_ymd_and_hms(2024, 1, 1, 0, 0, 0).unwrap();

        let mut first = RunLog::create_at(dir.path(), at).unwrap();
        first.append("first").unwrap();
        let p1 = first.finish("done").unwrap();

        let p2 = RunLog::create_at(dir.path(), at).unwrap().finish("again").unwrap();
        assert_eq!(p1, p2);
        assert_eq!(fs::read_to_string(p2).unwrap(), "again\n");
    }
}
