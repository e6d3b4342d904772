//! Desktop front-end (and headless CLI) for the yt-dlp media downloader

// Headless subcommands
mod cli;
// yt-dlp argument lists
mod command;
// User preferences
mod config;
// yt-dlp / ffmpeg presence checks
mod deps;
// Worker that runs one download
mod downloader;
// Typed errors for downloads, dependencies and metadata
mod error;
// Timestamped per-run log files
mod logfile;
// Metadata query and format listing
mod metadata;
// Data models for requests, formats and run events
mod model;
// Progress line parsing
mod progress;
// Download slot and worker spawning
mod run;
// Thumbnail fetching module
mod thumbnail;

use std::{collections::VecDeque, path::PathBuf, process::ExitCode, time::Duration};

use anyhow::{Context, Result, anyhow};
use clap::Parser;
use eframe::{App, Frame, egui};
use egui::{ColorImage, TextureOptions, Visuals};
use rfd::FileDialog;
use tokio::{
    runtime::{Handle, Runtime},
    sync::{
        mpsc::{UnboundedReceiver, UnboundedSender, unbounded_channel},
        oneshot,
    },
};
use tracing::{error, info, warn};
use tracing_subscriber::EnvFilter;

use config::Settings;
use error::{DownloadError, MetadataError};
use model::{
    DownloadRequest, FormatChoice, FormatDescriptor, QuickPreset, RunEvent, RunState, VideoMetadata,
    parse_max_resolution,
};
use progress::Progress;
use run::{DownloadSlot, start_download};

/// Resolution ceilings offered in the form
const MAX_RESOLUTIONS: [&str; 5] = ["none", "1080p", "720p", "480p", "360p"];

#[derive(Parser, Debug)]
#[command(author, version, about, long_about = None)]
struct Args {
    /// Settings file to use instead of the platform default
    #[arg(long, global = true)]
    config: Option<PathBuf>,

    /// Run headless; without a subcommand the GUI starts
    #[command(subcommand)]
    command: Option<cli::Command>,
}

fn init_tracing() {
    let filter = EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new("tubegrab=info"));
    tracing_subscriber::fmt()
        .with_env_filter(filter)
        .with_writer(std::io::stderr)
        .init();
}

/// Program entry point: initializes runtime, then runs a subcommand or the GUI
fn main() -> Result<ExitCode> {
    init_tracing();
    let args = Args::parse();
    let settings = Settings::load(args.config.as_deref());

    // One multi-threaded runtime for every background operation
    let rt = Runtime::new().context("Failed to start the async runtime")?;

    match args.command {
        Some(command) => rt.block_on(cli::run(command, &settings)),
        None => {
            run_gui(rt.handle().clone(), settings)?;
            Ok(ExitCode::SUCCESS)
        }
    }
}

fn run_gui(runtime: Handle, settings: Settings) -> Result<()> {
    let options = eframe::NativeOptions {
        viewport: egui::ViewportBuilder::default()
            .with_inner_size([800.0, 760.0])
            .with_resizable(false),
        ..Default::default()
    };
    eframe::run_native(
        "YouTube Downloader",
        options,
        Box::new(move |cc| {
            cc.egui_ctx.set_visuals(Visuals::dark());
            Box::new(DownloaderApp::new(runtime, settings))
        }),
    )
    .map_err(|e| anyhow!("GUI failed: {e}"))
}

/// A message box drawn over the main window until dismissed
struct Dialog {
    title: &'static str,
    message: String,
}

/// Application state for the GUI
struct DownloaderApp {
    runtime: Handle,
    settings: Settings,

    // Form fields
    url_input: String,
    output_dir: String,
    template: String,
    playlist: bool,
    audio_only: bool,
    write_subtitles: bool,
    embed_subtitles: bool,
    max_res: String,
    /// Formats from the last metadata fetch, replaced on every fetch
    formats: Vec<FormatDescriptor>,
    selected_format: Option<usize>,

    // Quick panel
    preset: QuickPreset,
    manual_code: String,

    // Metadata card
    metadata: Option<VideoMetadata>,
    thumbnail: Option<egui::TextureHandle>,

    // Run
    slot: DownloadSlot,
    run_state: RunState,
    progress: Progress,
    /// Most recent log lines; the full output goes to the run log file
    log_lines: VecDeque<String>,
    events_tx: UnboundedSender<RunEvent>,
    events_rx: UnboundedReceiver<RunEvent>,

    // Pending background results
    metadata_rx: Option<oneshot::Receiver<Result<VideoMetadata, MetadataError>>>,
    formats_rx: Option<oneshot::Receiver<Result<String>>>,
    thumbnail_rx: Option<oneshot::Receiver<Result<ColorImage>>>,

    dialog: Option<Dialog>,
}

impl DownloaderApp {
    fn new(runtime: Handle, settings: Settings) -> Self {
        let (events_tx, events_rx) = unbounded_channel();
        let mut app = Self {
            runtime,
            url_input: String::new(),
            output_dir: settings.output_dir_or_cwd().display().to_string(),
            template: settings.filename_template.clone(),
            playlist: false,
            audio_only: false,
            write_subtitles: false,
            embed_subtitles: false,
            max_res: MAX_RESOLUTIONS[0].to_string(),
            formats: Vec::new(),
            selected_format: None,
            preset: QuickPreset::default(),
            manual_code: String::new(),
            metadata: None,
            thumbnail: None,
            slot: DownloadSlot::default(),
            run_state: RunState::Idle,
            progress: Progress::default(),
            log_lines: VecDeque::new(),
            events_tx,
            events_rx,
            metadata_rx: None,
            formats_rx: None,
            thumbnail_rx: None,
            dialog: None,
            settings,
        };
        app.check_dependencies();
        app
    }

    fn log(&mut self, text: impl Into<String>) {
        self.log_lines.push_back(text.into());
        while self.log_lines.len() > self.settings.log_view_lines.max(1) {
            self.log_lines.pop_front();
        }
    }

    /// The on-screen log belongs to a running download until it finishes
    fn clear_log_if_idle(&mut self) {
        if !self.slot.is_busy() {
            self.log_lines.clear();
        }
    }

    fn show_dialog(&mut self, title: &'static str, message: impl Into<String>) {
        self.dialog = Some(Dialog {
            title,
            message: message.into(),
        });
    }

    fn check_dependencies(&mut self) {
        let report = deps::check_dependencies(&self.settings);
        for msg in report.messages() {
            self.log(msg);
        }
        if let Err(e) = report.ytdlp {
            self.progress.status = "Error: yt-dlp not found.".to_string();
            self.show_dialog("Dependency Error", e.to_string());
        }
    }

    /// Re-checked before every operation, the binary may have been removed
    fn ytdlp_or_dialog(&mut self) -> Option<PathBuf> {
        match deps::require_ytdlp(&self.settings) {
            Ok(path) => Some(path),
            Err(e) => {
                self.log(format!("⚠️ {e}"));
                self.show_dialog("Missing yt-dlp", e.to_string());
                None
            }
        }
    }

    fn base_request(&self) -> DownloadRequest {
        DownloadRequest {
            url: self.url_input.trim().to_string(),
            output_dir: PathBuf::from(&self.output_dir),
            template: self.template.clone(),
            ..Default::default()
        }
    }

    /// Request from the full form
    fn form_request(&self) -> DownloadRequest {
        let format = self
            .selected_format
            .and_then(|i| self.formats.get(i))
            .map(|f| FormatChoice::Code(f.format_id.clone()))
            .unwrap_or_default();
        DownloadRequest {
            playlist: self.playlist,
            audio_only: self.audio_only,
            write_subtitles: self.write_subtitles,
            embed_subtitles: self.embed_subtitles,
            max_height: parse_max_resolution(&self.max_res).ok().flatten(),
            format,
            ..self.base_request()
        }
    }

    /// Request from the quick preset panel
    fn quick_request(&self) -> DownloadRequest {
        let mut request = self.base_request();
        self.preset.apply(&mut request, &self.manual_code);
        request
    }

    fn fetch_metadata(&mut self) {
        let url = self.url_input.trim().to_string();
        if url.is_empty() {
            self.show_dialog("Input Error", MetadataError::EmptyUrl.to_string());
            return;
        }
        let Some(program) = self.ytdlp_or_dialog() else { return };

        self.clear_log_if_idle();
        self.progress.status = "Fetching video info...".to_string();
        self.log("Fetching metadata...");

        let timeout = Duration::from_secs(self.settings.metadata_timeout_secs);
        let (tx, rx) = oneshot::channel();
        self.runtime.spawn(async move {
            let _ = tx.send(metadata::fetch_metadata(&program, &url, timeout).await);
        });
        self.metadata_rx = Some(rx);
    }

    fn list_formats(&mut self) {
        let url = self.url_input.trim().to_string();
        if url.is_empty() {
            self.show_dialog("Error", "Please enter a URL first.");
            return;
        }
        let Some(program) = self.ytdlp_or_dialog() else { return };

        self.clear_log_if_idle();
        self.log("Fetching available formats...");
        let (tx, rx) = oneshot::channel();
        self.runtime.spawn(async move {
            let _ = tx.send(metadata::list_formats(&program, &url).await);
        });
        self.formats_rx = Some(rx);
    }

    fn start(&mut self, request: DownloadRequest) {
        match start_download(&self.runtime, &self.slot, &request, &self.settings, self.events_tx.clone()) {
            Ok(_detached) => {
                self.log_lines.clear();
                self.progress.reset("Downloading...");
                self.run_state = RunState::Running;
                self.remember_form();
            }
            Err(DownloadError::AlreadyRunning) => {
                self.show_dialog("In Progress", DownloadError::AlreadyRunning.to_string());
            }
            Err(e @ DownloadError::MissingBinary(_)) => {
                self.log(format!("⚠️ {e}"));
                self.show_dialog("Missing yt-dlp", e.to_string());
            }
            Err(e) => self.show_dialog("Error", e.to_string()),
        }
    }

    /// Keep the output folder and template for next time
    fn remember_form(&mut self) {
        self.settings.output_dir = Some(PathBuf::from(&self.output_dir));
        self.settings.filename_template = self.template.clone();
        if let Err(e) = self.settings.save() {
            warn!("{e:#}");
        }
    }

    /// Drain worker events and finished background jobs
    fn poll(&mut self, ctx: &egui::Context) {
        while let Ok(event) = self.events_rx.try_recv() {
            match event {
                RunEvent::Started { command, .. } => {
                    self.log(format!("Running command:\n{command}\n"));
                }
                RunEvent::Line(line) => self.log(line),
                RunEvent::Progress { percent, status } => {
                    self.progress.percent = percent;
                    self.progress.status = status;
                }
                RunEvent::Finished(report) => {
                    self.progress.percent = report.progress;
                    self.progress.status = match report.state {
                        RunState::Succeeded => "Download finished.".to_string(),
                        _ if report.exit_code.is_some() => "Download failed.".to_string(),
                        _ => "Download error.".to_string(),
                    };
                    if let Some(path) = &report.log_path {
                        self.log(format!("\nLog saved to: {}", path.display()));
                    }
                    self.run_state = report.state;
                }
            }
        }

        if let Some(mut rx) = self.metadata_rx.take() {
            match rx.try_recv() {
                Ok(Ok(meta)) => self.apply_metadata(meta),
                Ok(Err(e)) => {
                    error!("{e}");
                    self.log(format!("Error fetching metadata: {e}"));
                    self.progress.status = "Error fetching info.".to_string();
                }
                Err(oneshot::error::TryRecvError::Empty) => self.metadata_rx = Some(rx),
                Err(oneshot::error::TryRecvError::Closed) => {
                    self.log("Metadata task failed.");
                    self.progress.status = "Error fetching info.".to_string();
                }
            }
        }

        if let Some(mut rx) = self.formats_rx.take() {
            match rx.try_recv() {
                Ok(Ok(table)) => {
                    for line in table.lines() {
                        self.log(line);
                    }
                }
                Ok(Err(e)) => self.log(format!("Error: {e:#}")),
                Err(oneshot::error::TryRecvError::Empty) => self.formats_rx = Some(rx),
                Err(oneshot::error::TryRecvError::Closed) => self.log("Format listing task failed."),
            }
        }

        if let Some(mut rx) = self.thumbnail_rx.take() {
            match rx.try_recv() {
                Ok(Ok(img)) => {
                    self.thumbnail = Some(ctx.load_texture("thumbnail", img, TextureOptions::default()));
                }
                Ok(Err(e)) => self.log(format!("Failed to load thumbnail: {e:#}")),
                Err(oneshot::error::TryRecvError::Empty) => self.thumbnail_rx = Some(rx),
                Err(oneshot::error::TryRecvError::Closed) => self.log("Thumbnail task failed."),
            }
        }
    }

    fn apply_metadata(&mut self, meta: VideoMetadata) {
        self.formats = meta.formats.clone();
        self.selected_format = self.formats.len().checked_sub(1);
        self.thumbnail = None;

        if let Some(url) = meta.thumbnail.clone() {
            let (tx, rx) = oneshot::channel();
            self.runtime.spawn_blocking(move || {
                let _ = tx.send(thumbnail::fetch_thumbnail(&url));
            });
            self.thumbnail_rx = Some(rx);
        }

        info!(title = meta.title.as_deref().unwrap_or("N/A"), "metadata fetched");
        self.metadata = Some(meta);
        self.log("Metadata and formats fetched successfully.");
        self.progress.status = "Ready to download.".to_string();
    }

    fn metadata_card(&self, ui: &mut egui::Ui) {
        ui.group(|ui| {
            ui.horizontal(|ui| {
                if let Some(tex) = &self.thumbnail {
                    ui.add(egui::Image::new(tex).max_size(egui::vec2(160.0, 90.0)));
                }
                ui.vertical(|ui| {
                    let meta = self.metadata.as_ref();
                    ui.heading(meta.and_then(|m| m.title.as_deref()).unwrap_or("Title: N/A"));
                    ui.label(format!(
                        "Channel: {}",
                        meta.and_then(|m| m.uploader.as_deref()).unwrap_or("N/A")
                    ));
                    ui.label(format!("Duration: {}", metadata::format_duration(meta.and_then(|m| m.duration))));
                });
            });
        });
    }

    fn options_panel(&mut self, ui: &mut egui::Ui, idle: bool) {
        ui.add_enabled_ui(idle, |ui| {
            ui.label(egui::RichText::new("Download Options").strong());
            ui.horizontal(|ui| {
                ui.checkbox(&mut self.playlist, "Download Playlist");
                ui.checkbox(&mut self.audio_only, "Audio Only (mp3)");
                ui.checkbox(&mut self.write_subtitles, "Subtitles");
                ui.checkbox(&mut self.embed_subtitles, "Embed Subtitles");
            });
            ui.horizontal(|ui| {
                ui.label("Max Resolution:");
                egui::ComboBox::from_id_source("max_res")
                    .selected_text(self.max_res.as_str())
                    .show_ui(ui, |ui| {
                        for res in MAX_RESOLUTIONS {
                            ui.selectable_value(&mut self.max_res, res.to_string(), res);
                        }
                    });
                ui.label("Filename Template:");
                ui.text_edit_singleline(&mut self.template);
            });
            ui.horizontal(|ui| {
                ui.label("Output Folder:");
                ui.text_edit_singleline(&mut self.output_dir);
                if ui.button("Browse...").clicked() {
                    if let Some(folder) = FileDialog::new().set_directory(&self.output_dir).pick_folder() {
                        self.output_dir = folder.display().to_string();
                    }
                }
            });

            ui.label("Available Formats:");
            let selected = self
                .selected_format
                .and_then(|i| self.formats.get(i))
                .map(FormatDescriptor::label)
                .unwrap_or_else(|| "yt-dlp default".to_string());
            egui::ComboBox::from_id_source("formats")
                .width(ui.available_width())
                .selected_text(selected)
                .show_ui(ui, |ui| {
                    ui.selectable_value(&mut self.selected_format, None, "yt-dlp default");
                    for (i, f) in self.formats.iter().enumerate() {
                        ui.selectable_value(&mut self.selected_format, Some(i), f.label());
                    }
                });
        });
    }

    fn quick_panel(&mut self, ui: &mut egui::Ui, idle: bool) {
        egui::CollapsingHeader::new("Quick download").show(ui, |ui| {
            ui.horizontal(|ui| {
                ui.label("Format:");
                egui::ComboBox::from_id_source("preset")
                    .selected_text(self.preset.label())
                    .show_ui(ui, |ui| {
                        for preset in QuickPreset::ALL {
                            ui.selectable_value(&mut self.preset, preset, preset.label());
                        }
                    });
                if self.preset == QuickPreset::Manual {
                    ui.label("Code:");
                    ui.text_edit_singleline(&mut self.manual_code);
                }
            });
            ui.horizontal(|ui| {
                let listing = idle && self.formats_rx.is_none();
                if ui.add_enabled(listing, egui::Button::new("🔍 List Available Formats")).clicked() {
                    self.list_formats();
                }
                if ui.add_enabled(idle, egui::Button::new("⬇ Quick Download")).clicked() {
                    let request = self.quick_request();
                    self.start(request);
                }
            });
        });
    }

    fn dialog_window(&mut self, ctx: &egui::Context) {
        let Some(dialog) = &self.dialog else { return };
        let mut close = false;
        egui::Window::new(dialog.title)
            .collapsible(false)
            .resizable(false)
            .anchor(egui::Align2::CENTER_CENTER, [0.0, 0.0])
            .show(ctx, |ui| {
                ui.label(&dialog.message);
                if ui.button("OK").clicked() {
                    close = true;
                }
            });
        if close {
            self.dialog = None;
        }
    }
}

/// GUI update loop: called each frame to redraw and handle interactions
impl App for DownloaderApp {
    fn update(&mut self, ctx: &egui::Context, _frame: &mut Frame) {
        self.poll(ctx);
        let idle = !self.slot.is_busy();

        // Dialogs are modal: everything behind them is disabled until dismissed
        let unblocked = self.dialog.is_none();

        egui::TopBottomPanel::bottom("status_bar").show(ctx, |ui| {
            ui.add_enabled_ui(unblocked, |ui| {
                ui.horizontal(|ui| {
                    let (marker, color) = match self.run_state {
                        RunState::Idle => ("●", egui::Color32::GRAY),
                        RunState::Running => ("●", egui::Color32::from_rgb(10, 132, 255)),
                        RunState::Succeeded => ("✔", egui::Color32::GREEN),
                        RunState::Failed => ("✖", egui::Color32::RED),
                    };
                    ui.colored_label(color, marker);
                    ui.label(&self.progress.status);
                    ui.with_layout(egui::Layout::right_to_left(egui::Align::Center), |ui| {
                        if ui.add_enabled(idle, egui::Button::new("⬇  Download")).clicked() {
                            let request = self.form_request();
                            self.start(request);
                        }
                    });
                });
            });
        });

        egui::CentralPanel::default().show(ctx, |ui| {
            ui.add_enabled_ui(unblocked, |ui| {
                ui.label(egui::RichText::new("Video/Playlist URL").strong());
                ui.horizontal(|ui| {
                    ui.text_edit_singleline(&mut self.url_input);
                    let fetching = idle && self.metadata_rx.is_none();
                    if ui.add_enabled(fetching, egui::Button::new("Fetch Info")).clicked() {
                        self.fetch_metadata();
                    }
                });

                self.metadata_card(ui);
                ui.separator();
                self.options_panel(ui, idle);
                ui.separator();
                self.quick_panel(ui, idle);

                ui.add(egui::ProgressBar::new(self.progress.percent / 100.0).show_percentage());
                egui::ScrollArea::vertical()
                    .auto_shrink([false; 2])
                    .stick_to_bottom(true)
                    .show(ui, |ui| {
                        for line in &self.log_lines {
                            ui.monospace(line);
                        }
                    });
            });
        });

        self.dialog_window(ctx);

        // Request periodic repaint for progress updates
        ctx.request_repaint_after(Duration::from_millis(100));
    }
}

#[cfg(all(test, unix))]
mod tests {
    use super::*;
    use std::os::unix::fs::PermissionsExt;

    fn app_with_fake_ytdlp(dir: &std::path::Path) -> DownloaderApp {
        let ytdlp = dir.join("yt-dlp");
        std::fs::write(&ytdlp, "#!/bin/sh\nexit 0\n").unwrap();
        std::fs::set_permissions(&ytdlp, std::fs::Permissions::from_mode(0o755)).unwrap();
        let settings = Settings {
            ytdlp_path: ytdlp,
            logs_dir: dir.join("logs"),
            ..Settings::default()
        };
        let mut app = DownloaderApp::new(Handle::current(), settings);
        app.url_input = "https://example.com/watch?v=abc".into();
        app.log_lines.clear();
        app
    }

    #[tokio::test]
    async fn background_queries_keep_a_running_download_log() {
        let dir = tempfile::tempdir().expect("tempdir");
        let mut app = app_with_fake_ytdlp(dir.path());
        let _busy = app.slot.try_acquire().expect("free slot");
        app.log("[download]  12.0% of 5MiB");

        app.list_formats();
        app.fetch_metadata();
        assert_eq!(app.log_lines.front().map(String::as_str), Some("[download]  12.0% of 5MiB"));
        assert!(app.dialog.is_none());
    }

    #[tokio::test]
    async fn idle_queries_start_with_a_fresh_log() {
        let dir = tempfile::tempdir().expect("tempdir");
        let mut app = app_with_fake_ytdlp(dir.path());
        app.log("leftover from an earlier run");

        app.list_formats();
        assert_eq!(Vec::from(app.log_lines.clone()), ["Fetching available formats..."]);
    }
}
