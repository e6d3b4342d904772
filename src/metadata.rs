use std::{path::Path, process::Stdio, time::Duration};

use anyhow::{Context, Result, anyhow};
use tokio::process::Command;
use tracing::{debug, info};

use crate::command::{build_list_formats_args, build_metadata_args};
use crate::error::MetadataError;
use crate::model::VideoMetadata;

/// Parse yt-dlp's `--dump-single-json` output
pub fn parse_metadata(json: &str) -> Result<VideoMetadata, MetadataError> {
    Ok(serde_json::from_str(json.trim())?)
}

/// "1h 02m 03s", "4m 05s", or "N/A" for missing/zero durations
pub fn format_duration(seconds: Option<f64>) -> String {
    let total = match seconds {
        Some(s) if s > 0.0 => s as u64,
        _ => return "N/A".to_string(),
    };
    let (h, rem) = (total / 3600, total % 3600);
    let (m, s) = (rem / 60, rem % 60);
    if h > 0 {
        format!("{h}h {m:02}m {s:02}s")
    } else {
        format!("{m}m {s:02}s")
    }
}

/// Query metadata for a single video, bounded by `timeout`
pub async fn fetch_metadata(program: &Path, url: &str, timeout: Duration) -> Result<VideoMetadata, MetadataError> {
    if url.trim().is_empty() {
        return Err(MetadataError::EmptyUrl);
    }
    info!(url = url.trim(), "fetching metadata");

    let output = tokio::time::timeout(
        timeout,
        Command::new(program)
            .args(build_metadata_args(url))
            .stdin(Stdio::null())
            .stdout(Stdio::piped())
            .stderr(Stdio::piped())
            .kill_on_drop(true)
            .output(),
    )
    .await
    .map_err(|_| MetadataError::Timeout(timeout.as_secs()))??;

    if !output.status.success() {
        return Err(MetadataError::Failed {
            code: output.status.code(),
            stderr: String::from_utf8_lossy(&output.stderr).trim().to_string(),
        });
    }

    let meta = parse_metadata(&String::from_utf8_lossy(&output.stdout))?;
    debug!(formats = meta.formats.len(), "metadata parsed");
    Ok(meta)
}

/// Run `yt-dlp -F` and return its table as text
pub async fn list_formats(program: &Path, url: &str) -> Result<String> {
    if url.trim().is_empty() {
        return Err(anyhow!("Please enter a URL first."));
    }
    let output = Command::new(program)
        .args(build_list_formats_args(url))
        .stdin(Stdio::null())
        .stdout(Stdio::piped())
        .stderr(Stdio::piped())
        .output()
        .await
        .context("Failed to execute yt-dlp format listing")?;

    let mut text = String::from_utf8_lossy(&output.stdout).into_owned();
    if !output.status.success() {
        text.push_str(&String::from_utf8_lossy(&output.stderr));
    }
    Ok(text)
}
