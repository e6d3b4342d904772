use std::{io, path::PathBuf, process::Stdio};

use anyhow::{Context, Result};
use tokio::{
    io::{AsyncBufReadExt, AsyncRead, BufReader},
    process::Command,
    sync::mpsc::{UnboundedSender, unbounded_channel},
    task::JoinHandle,
};
use tracing::{debug, error, info, warn};

use crate::command::display_command;
use crate::logfile::RunLog;
use crate::model::{RunEvent, RunReport, RunState};
use crate::progress::Progress;
use crate::run::BusyGuard;

pub const SUCCESS_MARKER: &str = "✅ Download completed successfully.";

pub fn failure_marker(code: Option<i32>) -> String {
    match code {
        Some(code) => format!("❌ Download failed with code {code}."),
        None => "❌ Download failed (terminated by signal).".to_string(),
    }
}

/// Everything a worker needs, moved into it at spawn time
#[derive(Debug, Clone)]
pub struct RunContext {
    pub program: PathBuf,
    pub args: Vec<String>,
    pub logs_dir: PathBuf,
}

impl RunContext {
    pub fn command_line(&self) -> String {
        display_command(&self.program.to_string_lossy(), &self.args)
    }
}

/// Forward every line of `reader` into `tx`. Invalid UTF-8 is replaced
/// rather than ending the stream.
fn forward_lines<R>(reader: R, tx: UnboundedSender<String>) -> JoinHandle<io::Result<()>>
where
    R: AsyncRead + Unpin + Send + 'static,
{
    tokio::spawn(async move {
        let mut reader = BufReader::new(reader);
        let mut buf = Vec::new();
        loop {
            buf.clear();
            if reader.read_until(b'\n', &mut buf).await? == 0 {
                return Ok(());
            }
            let line = String::from_utf8_lossy(&buf).trim_end_matches(['\r', '\n']).to_string();
            if tx.send(line).is_err() {
                return Ok(());
            }
        }
    })
}

/// Collects output into the run log, the event channel and the progress value
struct Sink<'a> {
    progress: Progress,
    log: Option<RunLog>,
    events: &'a UnboundedSender<RunEvent>,
}

impl Sink<'_> {
    fn line(&mut self, line: String) {
        if let Some(log) = self.log.as_mut() {
            if let Err(e) = log.append(&line) {
                warn!("{e:#}; further output is not logged to file");
                self.log = None;
            }
        }
        if self.progress.scan(&line) {
            let _ = self.events.send(RunEvent::Progress {
                percent: self.progress.percent,
                status: self.progress.status.clone(),
            });
        }
        let _ = self.events.send(RunEvent::Line(line));
    }
}

/// Spawn the process and pump its combined output until both pipes close
async fn stream_process(ctx: &RunContext, sink: &mut Sink<'_>) -> Result<std::process::ExitStatus> {
    let mut child = Command::new(&ctx.program)
        .args(&ctx.args)
        .stdin(Stdio::null())
        .stdout(Stdio::piped())
        .stderr(Stdio::piped())
        .kill_on_drop(true)
        .spawn()
        .with_context(|| format!("Failed to launch {}", ctx.program.display()))?;

    let (tx, mut rx) = unbounded_channel();
    let mut readers = Vec::new();
    if let Some(stdout) = child.stdout.take() {
        readers.push(forward_lines(stdout, tx.clone()));
    }
    if let Some(stderr) = child.stderr.take() {
        readers.push(forward_lines(stderr, tx.clone()));
    }
    drop(tx);

    while let Some(line) = rx.recv().await {
        debug!(target: "tubegrab::ytdlp", "{line}");
        sink.line(line);
    }
    if let Err(e) = join_readers(readers).await {
        // The slot is freed when the run ends, so yt-dlp must not outlive it
        if let Err(kill) = child.kill().await {
            warn!("failed to kill yt-dlp: {kill}");
        }
        return Err(e);
    }

    child.wait().await.context("Failed to wait for yt-dlp")
}

async fn join_readers(readers: Vec<JoinHandle<io::Result<()>>>) -> Result<()> {
    for reader in readers {
        reader
            .await
            .context("Output reader task panicked")?
            .context("Failed to read process output")?;
    }
    Ok(())
}

/// Run one download to completion. The guard is released once the log file
/// is closed, just before `Finished` goes out.
pub async fn run_download(ctx: RunContext, guard: BusyGuard, events: UnboundedSender<RunEvent>) -> RunReport {
    let log = match RunLog::create(&ctx.logs_dir) {
        Ok(log) => Some(log),
        Err(e) => {
            warn!("{e:#}");
            let _ = events.send(RunEvent::Line(format!("⚠️ {e:#}")));
            None
        }
    };

    let command = ctx.command_line();
    info!(%command, "starting download");
    let _ = events.send(RunEvent::Started {
        command,
        log_path: log.as_ref().map(|l| l.path().to_path_buf()),
    });

    let mut progress = Progress::default();
    progress.reset("Downloading...");
    let mut sink = Sink {
        progress,
        log,
        events: &events,
    };

    let result = stream_process(&ctx, &mut sink).await;
    let Sink { mut progress, log, .. } = sink;

    let (state, exit_code, marker) = match result {
        Ok(status) if status.success() => {
            progress.complete();
            info!("download finished");
            (RunState::Succeeded, status.code(), SUCCESS_MARKER.to_string())
        }
        Ok(status) => {
            warn!(code = ?status.code(), "download failed");
            (RunState::Failed, status.code(), failure_marker(status.code()))
        }
        Err(e) => {
            error!("{e:#}");
            (RunState::Failed, None, format!("Error during download: {e:#}"))
        }
    };
    let _ = events.send(RunEvent::Line(marker.clone()));

    let log_path = log.and_then(|log| match log.finish(&marker) {
        Ok(path) => Some(path),
        Err(e) => {
            warn!("{e:#}");
            None
        }
    });

    let report = RunReport {
        state,
        progress: progress.percent,
        exit_code,
        log_path,
    };
    drop(guard);
    let _ = events.send(RunEvent::Finished(report.clone()));
    report
}

#[cfg(test)]
mod tests {
    use super::*;

    #[tokio::test]
    async fn reader_failure_surfaces_as_error() {
        let ok = tokio::spawn(async { Ok(()) });
        let broken = tokio::spawn(async { Err(io::Error::new(io::ErrorKind::BrokenPipe, "pipe closed")) });
        let err = join_readers(vec![ok, broken]).await.unwrap_err();
        assert_eq!(format!("{err:#}"), "Failed to read process output: pipe closed");
    }
}
