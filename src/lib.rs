pub mod models;
pub mod platform;
pub mod process;
pub mod scroll;
pub mod settings;
pub mod sync_scroll;
pub mod trigger;
mod utils;
#[cfg(windows)]
pub mod windows_bridge;

use std::{sync::Arc, time::Duration};

use anyhow::{Context, Result};
use tokio::{
    runtime::Runtime,
    time::{self, MissedTickBehavior},
};

use settings::SettingsStore;
use trigger::FeedbackSender;

const SETTINGS_POLL_INTERVAL: Duration = Duration::from_secs(2);

pub fn run() -> Result<()> {
    // RUST_LOG overrides the default level.
    env_logger::Builder::from_env(env_logger::Env::default().default_filter_or("info")).init();

    log::info!("FlowWheel starting up...");

    let settings_path = settings::default_settings_path()?;
    let settings = Arc::new(SettingsStore::new(settings_path.clone())?);
    log::info!("Settings loaded from {}", settings_path.display());

    let runtime = tokio::runtime::Builder::new_multi_thread()
        .worker_threads(2)
        .thread_name("flowwheel-worker")
        .enable_all()
        .build()
        .context("Failed to start the async runtime")?;

    let (feedback, feedback_rx) = trigger::channel();
    runtime.spawn(trigger::log_feedback(feedback_rx));
    runtime.spawn(watch_settings(settings.clone()));

    run_input_source(&runtime, settings, feedback)
}

/// Picks up edits made to the settings file while running.
async fn watch_settings(settings: Arc<SettingsStore>) {
    let mut interval = time::interval(SETTINGS_POLL_INTERVAL);
    interval.set_missed_tick_behavior(MissedTickBehavior::Delay);
    loop {
        interval.tick().await;
        match settings.reload_if_changed() {
            Ok(true) => log::info!("Settings reloaded"),
            Ok(false) => {}
            Err(err) => log::warn!("Failed to reload settings: {err:#}"),
        }
    }
}

#[cfg(windows)]
fn run_input_source(runtime: &Runtime, settings: Arc<SettingsStore>, feedback: FeedbackSender) -> Result<()> {
    use process::{ProcessClassifier, SysinfoLookup};
    use scroll::ScrollEngine;
    use trigger::TriggerStateMachine;
    use windows_bridge::{double_click_time, run_input_hooks, stop_input_hooks, WindowsDesktop};

    let desktop = Arc::new(WindowsDesktop);
    let engine = Arc::new(ScrollEngine::new(
        settings.clone(),
        desktop.clone(),
        desktop.clone(),
        desktop.clone(),
        runtime.handle().clone(),
    ));
    let classifier = ProcessClassifier::new(desktop, Box::new(SysinfoLookup::new()), settings.clone());
    let machine = TriggerStateMachine::new(
        settings,
        engine.clone(),
        classifier,
        feedback,
        double_click_time(),
    );

    runtime.spawn(async {
        if tokio::signal::ctrl_c().await.is_ok() {
            log::info!("Shutting down");
            stop_input_hooks();
        }
    });

    // Blocks this thread in the hook message loop until shutdown.
    run_input_hooks(Box::new(machine))?;
    engine.stop();
    Ok(())
}

#[cfg(not(windows))]
fn run_input_source(_runtime: &Runtime, _settings: Arc<SettingsStore>, _feedback: FeedbackSender) -> Result<()> {
    anyhow::bail!("no native input source is available on this platform; FlowWheel requires Windows")
}
