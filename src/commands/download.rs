//! `vidfetch download`: run one job to completion and save the file.

use std::path::Path;
use std::sync::Arc;
use std::time::Duration;

use anyhow::{Context, Result, bail};
use indicatif::{ProgressBar, ProgressStyle};
use tokio::sync::{oneshot, watch};
use tokio::task::JoinHandle;
use tracing::{debug, info, warn};
use vidfetch_core::{JobOutcome, OrchestratorState, SelectOutcome, Stage};

use super::{build_orchestrator, user_facing};
use crate::config::Settings;

pub async fn run_download_command(
    settings: &Settings,
    url: &str,
    format_id: &str,
    output_dir: Option<&Path>,
    show_progress: bool,
) -> Result<()> {
    let orchestrator = build_orchestrator(settings)?;
    let video = orchestrator
        .analyze(url)
        .await
        .map_err(|error| user_facing(error, &orchestrator))?;

    let Some(format) = video.find_format(format_id).cloned() else {
        bail!(
            "Format `{format_id}` is not offered for this video.\nHint: run `vidfetch info {url}` to list formats."
        );
    };
    info!(title = %video.title, format = %format.label(), "Starting download");

    let interrupt = {
        let orchestrator = Arc::clone(&orchestrator);
        tokio::spawn(async move {
            if tokio::signal::ctrl_c().await.is_ok() {
                warn!("Interrupt received; cancelling download");
                orchestrator.cancel().await;
            }
        })
    };
    let progress = ProgressUi::spawn(show_progress, orchestrator.subscribe());

    let outcome = orchestrator.select_format(&format).await;

    interrupt.abort();
    progress.stop().await;

    match outcome {
        SelectOutcome::Finished(JobOutcome::Completed { artifact }) => {
            let dir = output_dir.map_or_else(|| settings.output_dir.clone(), Path::to_path_buf);
            let path = artifact
                .save_to_dir(&dir)
                .await
                .with_context(|| format!("Failed to write download into {}", dir.display()))?;
            info!(path = %path.display(), bytes = artifact.len(), "Download saved");
            println!("{}", path.display());
            Ok(())
        }
        SelectOutcome::Finished(outcome) => {
            let snapshot = orchestrator.snapshot();
            let message = snapshot
                .last_error
                .unwrap_or_else(|| format!("Download ended: {}", outcome.label()));
            match outcome.fault_class() {
                Some(class) => bail!("{message}\nHint: {}", class.suggestion()),
                None => bail!("{message}"),
            }
        }
        SelectOutcome::Busy => bail!("Another download is already running"),
        SelectOutcome::NoInfo | SelectOutcome::UnknownFormat => {
            bail!("Video info changed before the download started; retry")
        }
    }
}

/// Progress bar fed by orchestrator state updates.
struct ProgressUi {
    stop: Option<oneshot::Sender<()>>,
    handle: Option<JoinHandle<()>>,
}

impl ProgressUi {
    fn spawn(enabled: bool, rx: watch::Receiver<OrchestratorState>) -> Self {
        if !enabled {
            return Self {
                stop: None,
                handle: None,
            };
        }
        let (stop, stopped) = oneshot::channel();
        let handle = tokio::spawn(render_progress(rx, stopped));
        Self {
            stop: Some(stop),
            handle: Some(handle),
        }
    }

    async fn stop(mut self) {
        if let Some(stop) = self.stop.take() {
            let _ = stop.send(());
        }
        if let Some(handle) = self.handle.take()
            && let Err(error) = handle.await
        {
            debug!(error = %error, "progress renderer ended abnormally");
        }
    }
}

async fn render_progress(
    mut rx: watch::Receiver<OrchestratorState>,
    mut stopped: oneshot::Receiver<()>,
) {
    let bar = ProgressBar::new(100);
    bar.set_style(
        ProgressStyle::with_template("{spinner} {msg:<12} [{bar:40}] {pos:>3}%")
            .unwrap_or_else(|_| ProgressStyle::default_bar()),
    );
    bar.enable_steady_tick(Duration::from_millis(100));

    loop {
        let (stage, progress) = {
            let state = rx.borrow_and_update();
            (state.stage(), state.progress())
        };
        bar.set_message(stage_label(stage));
        bar.set_position(u64::from(progress));

        tokio::select! {
            changed = rx.changed() => {
                if changed.is_err() {
                    break;
                }
            }
            _ = &mut stopped => break,
        }
    }

    bar.finish_and_clear();
}

fn stage_label(stage: Stage) -> &'static str {
    match stage {
        Stage::Submitting => "Submitting",
        Stage::Polling => "Downloading",
        Stage::Idle | Stage::HasInfo => "Finishing",
    }
}
