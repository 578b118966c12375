//! Interactive recording widget.
//!
//! Runs the recorder TUI over a [`RecordingController`]: start and stop
//! capture, preview the finished take, save it, or submit the upload form.
//! SIGUSR1 toggles recording so a hotkey daemon can drive the widget.

use anyhow::anyhow;
use std::process::Child;
use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::Arc;

use crate::config::LexirecConfig;
use crate::recording::controller::ControllerState;
use crate::recording::{
    playback, CpalDevices, RecorderTui, RecordingController, RecordingLibrary, SystemClock,
    Widget, WidgetCommand,
};
use crate::ui::show_blocking_error;
use crate::upload;

/// Opens the recording widget and runs it until the user quits.
///
/// # Errors
/// - If the configuration cannot be loaded
/// - If the terminal cannot be initialized
/// - If the SIGUSR1 handler cannot be registered
pub async fn handle_record() -> anyhow::Result<()> {
    tracing::info!("=== lexirec Recorder Started ===");

    let config = match LexirecConfig::load() {
        Ok(config) => config,
        Err(err) => {
            tracing::error!("Failed to load configuration: {err}");
            show_blocking_error(&format!(
                "Configuration Error:\n\n{err}\n\nPlease check your ~/.config/lexirec/lexirec.toml file and try again."
            ))?;
            return Err(anyhow!("Configuration error: {err}"));
        }
    };

    tracing::info!(
        "Configuration loaded: device={}, sample_rate={}Hz, tick={}ms, reveal={:?}",
        config.audio.device,
        config.audio.sample_rate,
        config.recorder.tick_interval_ms,
        config.form.reveal
    );

    let library = RecordingLibrary::new(&config.output_dir()?)?;
    tracing::debug!("Saving recordings to {}", library.dir().display());
    let devices = Arc::new(CpalDevices::new(
        config.audio.device.clone(),
        config.audio.sample_rate,
    ));
    let mut controller = RecordingController::new(
        devices,
        Widget::new(),
        Arc::new(SystemClock),
        config.controller_options(),
    );

    let toggle = Arc::new(AtomicBool::new(false));
    signal_hook::flag::register(signal_hook::consts::SIGUSR1, toggle.clone())
        .map_err(|e| anyhow!("Failed to register signal handler: {e}"))?;

    let mut tui = RecorderTui::new().map_err(|e| anyhow!("Failed to initialize UI: {e}"))?;
    let result = run_widget(&mut tui, &mut controller, &library, &config, &toggle).await;

    if let Some(finalization) = controller.stop() {
        match finalization.wait().await {
            Ok(artifact) => tracing::info!(
                "Recording in progress at exit finalized as {} ({} fragments from {})",
                artifact.file.name(),
                controller.chunk_count(),
                controller.start_time()
            ),
            Err(e) => tracing::warn!("Recording discarded on exit: {e}"),
        }
    }
    tui.cleanup()
        .map_err(|e| anyhow!("Failed to restore terminal: {e}"))?;

    tracing::info!("=== lexirec Recorder Finished ===");
    result
}

async fn run_widget(
    tui: &mut RecorderTui,
    controller: &mut RecordingController,
    library: &RecordingLibrary,
    config: &LexirecConfig,
    toggle: &AtomicBool,
) -> anyhow::Result<()> {
    let widget = controller.widget().clone();
    let mut players: Vec<Child> = Vec::new();

    loop {
        playback::reap_finished(&mut players);

        if let Some(message) = widget.take_alert() {
            tui.show_alert(&message)
                .map_err(|e| anyhow!("Failed to show alert: {e}"))?;
        }

        tui.render(&widget.snapshot())
            .map_err(|e| anyhow!("Failed to render: {e}"))?;

        let mut command = tui
            .handle_input()
            .map_err(|e| anyhow!("Failed to read input: {e}"))?;

        if toggle.swap(false, Ordering::Relaxed) {
            tracing::info!("Received SIGUSR1: toggling recording");
            command = match controller.state() {
                ControllerState::Recording => WidgetCommand::Stop,
                _ => WidgetCommand::Start,
            };
        }

        match command {
            WidgetCommand::Continue => {}
            WidgetCommand::Start => {
                // Failures surface through the widget's alert queue.
                if let Err(e) = controller.start().await {
                    tracing::debug!("Start rejected: {e}");
                }
            }
            WidgetCommand::Stop => {
                // Finalization completes in the background and fills the form.
                let _ = controller.stop();
            }
            WidgetCommand::Preview => players.extend(preview(&widget)),
            WidgetCommand::Save => save(&widget, library),
            WidgetCommand::Submit => submit(&widget, config).await,
            WidgetCommand::Quit => {
                tracing::info!("Recorder closed by user");
                return Ok(());
            }
        }
    }
}

/// Starts the preview player; the caller reaps the returned process.
fn preview(widget: &Widget) -> Option<Child> {
    let Some(file) = widget.snapshot().playback else {
        widget.notify("Nothing to play yet");
        return None;
    };
    match playback::preview(&file) {
        Ok(player) => {
            widget.notify(format!("Playing {}", file.name()));
            Some(player)
        }
        Err(e) => {
            tracing::error!("Preview failed: {e}");
            widget.alert(format!("Playback Error:\n\n{e}"));
            None
        }
    }
}

fn save(widget: &Widget, library: &RecordingLibrary) {
    let form = widget.form();
    let Some(file) = form.file() else {
        widget.notify("Nothing to save yet");
        return;
    };
    match library.save(file) {
        Ok(path) => widget.notify(format!("Saved {}", path.display())),
        Err(e) => {
            tracing::error!("Save failed: {e}");
            widget.alert(format!("Save Error:\n\n{e}"));
        }
    }
}

async fn submit(widget: &Widget, config: &LexirecConfig) {
    let form = widget.form();
    if !form.visible {
        widget.notify("Record something before submitting");
        return;
    }
    if !form.is_populated() {
        widget.notify("Recording is still being finalized, try again");
        return;
    }
    widget.notify(format!("Uploading to {}...", config.upload.endpoint));
    match upload::submit(&config.upload, &form).await {
        Ok(receipt) => {
            let target = receipt
                .location
                .map(|location| format!(", redirected to {location}"))
                .unwrap_or_default();
            widget.notify(format!("Uploaded (status {}{target})", receipt.status));
        }
        Err(e) => {
            tracing::error!("Upload failed: {e}");
            widget.alert(format!("Upload Error:\n\n{e}"));
        }
    }
}
