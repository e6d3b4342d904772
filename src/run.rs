use std::sync::{
    Arc,
    atomic::{AtomicBool, Ordering},
};

use tokio::{runtime::Handle, sync::mpsc::UnboundedSender, task::JoinHandle};
use tracing::{info, warn};

use crate::command::build_download_args;
use crate::config::Settings;
use crate::deps::require_ytdlp;
use crate::downloader::{RunContext, run_download};
use crate::error::DownloadError;
use crate::model::{DownloadRequest, RunEvent, RunReport};

/// At most one download at a time. Cloning shares the slot.
#[derive(Debug, Clone, Default)]
pub struct DownloadSlot {
    busy: Arc<AtomicBool>,
}

/// Holding one means the slot is taken; dropping it frees the slot
#[derive(Debug)]
pub struct BusyGuard {
    busy: Arc<AtomicBool>,
}

impl Drop for BusyGuard {
    fn drop(&mut self) {
        self.busy.store(false, Ordering::Release);
    }
}

impl DownloadSlot {
    pub fn try_acquire(&self) -> Option<BusyGuard> {
        self.busy
            .compare_exchange(false, true, Ordering::AcqRel, Ordering::Acquire)
            .ok()
            .map(|_| BusyGuard {
                busy: Arc::clone(&self.busy),
            })
    }

    pub fn is_busy(&self) -> bool {
        self.busy.load(Ordering::Acquire)
    }
}

/// Claim the slot, build the command and spawn the worker on `runtime`.
/// The returned handle may be dropped; the worker reports through `events`.
pub fn start_download(
    runtime: &Handle,
    slot: &DownloadSlot,
    request: &DownloadRequest,
    settings: &Settings,
    events: UnboundedSender<RunEvent>,
) -> Result<JoinHandle<RunReport>, DownloadError> {
    let Some(guard) = slot.try_acquire() else {
        warn!("download requested while another is running");
        return Err(DownloadError::AlreadyRunning);
    };
    let args = build_download_args(request)?;
    let program = require_ytdlp(settings)?;

    let ctx = RunContext {
        program,
        args,
        logs_dir: settings.logs_dir.clone(),
    };
    info!(url = request.url.trim(), "download slot acquired");
    Ok(runtime.spawn(run_download(ctx, guard, events)))
}
