//! Headless subcommands sharing the GUI's core.

use std::{path::PathBuf, process::ExitCode, str::FromStr, time::Duration};

use anyhow::{Context, Result};
use clap::Subcommand;
use indicatif::{ProgressBar, ProgressStyle};
use tokio::{runtime::Handle, sync::mpsc::unbounded_channel};

use crate::config::Settings;
use crate::deps::{check_dependencies, require_ytdlp};
use crate::metadata::{fetch_metadata, format_duration, list_formats};
use crate::model::{AudioFormat, DownloadRequest, FormatChoice, RunEvent, RunState, parse_max_resolution};
use crate::run::{DownloadSlot, start_download};

#[derive(Subcommand, Debug)]
pub enum Command {
    /// Download one video or playlist
    Download(DownloadArgs),
    /// Print yt-dlp's table of available formats
    Formats { url: String },
    /// Print title, uploader, duration and the format list
    Info { url: String },
}

/// `--max-res` value, checked before anything is spawned
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct MaxRes(Option<u32>);

impl FromStr for MaxRes {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        parse_max_resolution(s).map(MaxRes)
    }
}

#[derive(clap::Args, Debug)]
pub struct DownloadArgs {
    pub url: String,
    /// Output folder (defaults to the last one used, or the current directory)
    #[arg(short, long)]
    pub output: Option<PathBuf>,
    /// yt-dlp output template
    #[arg(short, long)]
    pub template: Option<String>,
    /// Download the whole playlist
    #[arg(long)]
    pub playlist: bool,
    /// Extract audio only, as mp3 or wav
    #[arg(long, value_name = "mp3|wav")]
    pub audio: Option<AudioFormat>,
    /// Resolution ceiling such as 720p, or none
    #[arg(long, value_name = "RES")]
    pub max_res: Option<MaxRes>,
    /// Explicit yt-dlp format code
    #[arg(short, long, conflicts_with = "best_video_audio")]
    pub format: Option<String>,
    /// Best video merged with best audio
    #[arg(long)]
    pub best_video_audio: bool,
    /// Download English subtitles
    #[arg(long)]
    pub subs: bool,
    /// Embed subtitles into the output (with --subs)
    #[arg(long)]
    pub embed_subs: bool,
}

impl DownloadArgs {
    pub fn to_request(&self, settings: &Settings) -> DownloadRequest {
        let format = match (&self.format, self.best_video_audio) {
            (Some(code), _) => FormatChoice::Code(code.clone()),
            (None, true) => FormatChoice::BestVideoAudio,
            (None, false) => FormatChoice::Auto,
        };
        DownloadRequest {
            url: self.url.clone(),
            output_dir: self.output.clone().unwrap_or_else(|| settings.output_dir_or_cwd()),
            template: self.template.clone().unwrap_or_else(|| settings.filename_template.clone()),
            playlist: self.playlist,
            audio_only: self.audio.is_some(),
            audio_format: self.audio.unwrap_or_default(),
            write_subtitles: self.subs,
            embed_subtitles: self.embed_subs,
            max_height: self.max_res.and_then(|MaxRes(height)| height),
            format,
        }
    }
}

pub async fn run(command: Command, settings: &Settings) -> Result<ExitCode> {
    match command {
        Command::Download(args) => download(&args, settings).await,
        Command::Formats { url } => {
            let program = require_ytdlp(settings)?;
            print!("{}", list_formats(&program, &url).await?);
            Ok(ExitCode::SUCCESS)
        }
        Command::Info { url } => {
            let program = require_ytdlp(settings)?;
            let meta = fetch_metadata(&program, &url, Duration::from_secs(settings.metadata_timeout_secs)).await?;
            println!("Title:    {}", meta.title.as_deref().unwrap_or("N/A"));
            println!("Channel:  {}", meta.uploader.as_deref().unwrap_or("N/A"));
            println!("Duration: {}", format_duration(meta.duration));
            for f in &meta.formats {
                println!("  {}", f.label());
            }
            Ok(ExitCode::SUCCESS)
        }
    }
}

async fn download(args: &DownloadArgs, settings: &Settings) -> Result<ExitCode> {
    for msg in check_dependencies(settings).messages() {
        eprintln!("{msg}");
    }

    let request = args.to_request(settings);
    let (tx, mut rx) = unbounded_channel();
    let handle = start_download(&Handle::current(), &DownloadSlot::default(), &request, settings, tx)?;

    let pb = ProgressBar::new(100);
    pb.set_style(
        ProgressStyle::with_template("{spinner:.green} [{elapsed_precise}] [{bar:40.cyan/blue}] {pos:>3}% {msg}")?
            .progress_chars("#>-"),
    );

    while let Some(event) = rx.recv().await {
        match event {
            RunEvent::Started { command, log_path } => {
                pb.println(format!("Running command:\n{command}\n"));
                if let Some(path) = log_path {
                    pb.println(format!("Logging to {}", path.display()));
                }
            }
            RunEvent::Progress { percent, status } => {
                pb.set_position(percent as u64);
                pb.set_message(status);
            }
            RunEvent::Line(line) => {
                if !line.starts_with("[download]") {
                    pb.println(line);
                }
            }
            RunEvent::Finished(report) => {
                pb.set_position(report.progress as u64);
                match report.state {
                    RunState::Succeeded => pb.finish_with_message("Download finished."),
                    _ => pb.abandon_with_message("Download failed."),
                }
                if let Some(path) = &report.log_path {
                    println!("Log saved to: {}", path.display());
                }
            }
        }
    }

    let report = handle.await.context("Download worker panicked")?;
    Ok(if report.state == RunState::Succeeded {
        ExitCode::SUCCESS
    } else {
        ExitCode::FAILURE
    })
}

#[cfg(test)]
mod tests {
    use super::*;
    use clap::Parser;

    #[derive(Parser)]
    struct TestCli {
        #[command(subcommand)]
        command: Command,
    }

    fn parse(args: &[&str]) -> DownloadArgs {
        let cli = TestCli::try_parse_from(std::iter::once("tubegrab").chain(args.iter().copied())).unwrap();
        match cli.command {
            Command::Download(args) => args,
            other => panic!("unexpected {other:?}"),
        }
    }

    #[test]
    fn download_flags_map_to_request() {
        let settings = Settings::default();
        let args = parse(&[
            "download", "https://x", "-o", "/tmp/out", "--max-res", "480p", "-f", "22", "--subs", "--embed-subs",
        ]);
        let r = args.to_request(&settings);
        assert_eq!(r.output_dir, PathBuf::from("/tmp/out"));
        assert_eq!(r.template, settings.filename_template);
        assert_eq!(r.max_height, Some(480));
        assert_eq!(r.format, FormatChoice::Code("22".into()));
        assert!(r.write_subtitles && r.embed_subtitles);
        assert!(!r.audio_only);
    }

    #[test]
    fn audio_flag() {
        let r = parse(&["download", "https://x", "--audio", "wav"]).to_request(&Settings::default());
        assert!(r.audio_only);
        assert_eq!(r.audio_format, AudioFormat::Wav);
    }

    #[test]
    fn bad_resolution_is_rejected_at_parse_time() {
        for bad in ["bogus", "72O", "0p"] {
            let res = TestCli::try_parse_from(["tubegrab", "download", "u", "--max-res", bad]);
            assert!(res.is_err(), "{bad} accepted");
        }
        let r = parse(&["download", "u", "--max-res", "none"]).to_request(&Settings::default());
        assert_eq!(r.max_height, None);
        let r = parse(&["download", "u", "--max-res", "720"]).to_request(&Settings::default());
        assert_eq!(r.max_height, Some(720));
    }

    #[test]
    fn format_conflicts_with_preset() {
        let res = TestCli::try_parse_from(["tubegrab", "download", "u", "-f", "22", "--best-video-audio"]);
        assert!(res.is_err());
    }
}
