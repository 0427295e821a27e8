use std::path::Path;

#[cfg(not(feature = "sdl"))]
use anyhow::bail;
use anyhow::{Context, Result};
use log::{info, warn};

use crate::backend::headless::{count_mappings, Framebuffer, RecordingAudio, ReplaySource};
use crate::backend::{EventSource, FileLoader};
use crate::cli::{BackendChoice, RunConfig};
use crate::dispatch::{DispatchLoop, DispatchStats};
use crate::event_log::EventLog;
use crate::lua_host::ScriptHost;
use crate::media::{LoadReport, MediaContext, MediaHandle};
use crate::slots::SlotKind;

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct RunSummary {
    pub stats: DispatchStats,
    pub samples: LoadReport,
    pub images: LoadReport,
}

/// A Lua state wired to a media context, ready to load a script and dispatch.
pub struct Session {
    host: ScriptHost,
    media: MediaHandle,
    log: Option<EventLog>,
}

impl Session {
    pub fn new(media: MediaContext, log: Option<EventLog>) -> Result<Self> {
        let media = match &log {
            Some(log) => media.with_log(log.clone()),
            None => media,
        }
        .into_handle();
        let host = ScriptHost::new()?;
        host.install_media_bindings(media.clone())?;
        Ok(Self { host, media, log })
    }

    pub fn host(&self) -> &ScriptHost {
        &self.host
    }

    pub fn media(&self) -> &MediaHandle {
        &self.media
    }

    pub fn load_script(&self, path: &Path) -> Result<()> {
        self.host.load_script(path)
    }

    pub fn load_source(&self, name: &str, source: &str) -> Result<()> {
        self.host.exec_source(name, source)
    }

    /// Loads everything the script declared in `sample_map` and `image_map`.
    pub fn load_resources(&self) -> Result<(LoadReport, LoadReport)> {
        let declarations = self.host.declared_resources()?;
        let mut media = self.media.borrow_mut();
        let samples = media.load_all(SlotKind::Audio, &declarations.samples);
        let images = media.load_all(SlotKind::Image, &declarations.images);
        info!(
            "loaded {} of {} sample(s) and {} of {} image(s)",
            samples.loaded,
            declarations.samples.len(),
            images.loaded,
            declarations.images.len()
        );
        Ok((samples, images))
    }

    /// Dispatches events until `onquit` has run, then releases all media.
    pub fn run<S: EventSource>(self, source: S) -> DispatchStats {
        let Session { host, media, log } = self;
        let mut dispatch = DispatchLoop::new(source, host);
        if let Some(log) = log {
            dispatch = dispatch.with_log(log);
        }
        let stats = dispatch.run();
        drop(dispatch);
        media.borrow_mut().release_all();
        stats
    }
}

pub fn execute(config: RunConfig) -> Result<RunSummary> {
    let log = config.dispatch_log_json.as_ref().map(|_| EventLog::new());

    let summary = match config.backend {
        BackendChoice::Replay => run_replay(&config, log.clone())?,
        BackendChoice::Native => run_native(&config, log.clone())?,
    };

    if let (Some(path), Some(log)) = (config.dispatch_log_json.as_ref(), log.as_ref()) {
        log.write_json(path)?;
        println!("Saved dispatch log to {}", path.display());
    }
    Ok(summary)
}

fn run_replay(config: &RunConfig, log: Option<EventLog>) -> Result<RunSummary> {
    let replay_path = config
        .replay
        .as_deref()
        .context("replay backend selected without an events file")?;
    let source = ReplaySource::from_path(replay_path)?;
    if let Some(path) = config.mapfile.as_deref() {
        match count_mappings(path) {
            Ok(count) => info!(
                "found {count} gamepad mapping(s) in {}; replayed events bypass them",
                path.display()
            ),
            Err(err) => warn!("could not read mapping file {}: {err:#}", path.display()),
        }
    }

    let display = Framebuffer::new(config.width, config.height);
    let media = MediaContext::new(
        Box::new(RecordingAudio::new()),
        Box::new(display.clone()),
        Box::new(FileLoader),
        config.verbose,
    );
    let summary = run_session(config, media, log, source)?;

    if let Some(path) = config.frame_png.as_deref() {
        joy_formats::write_png(path, &display.snapshot())?;
        println!("Saved final frame to {}", path.display());
    }
    Ok(summary)
}

#[cfg(feature = "sdl")]
fn run_native(config: &RunConfig, log: Option<EventLog>) -> Result<RunSummary> {
    use crate::backend::sdl::SdlBackend;

    let SdlBackend {
        guard,
        events,
        audio,
        display,
    } = SdlBackend::open(config.width, config.height, config.mapfile.as_deref())?;
    let media = MediaContext::new(
        Box::new(audio),
        Box::new(display),
        Box::new(FileLoader),
        config.verbose,
    );
    let summary = run_session(config, media, log, events);
    drop(guard);
    summary
}

#[cfg(not(feature = "sdl"))]
fn run_native(_config: &RunConfig, _log: Option<EventLog>) -> Result<RunSummary> {
    bail!("built without the `sdl` feature; rebuild with --features sdl or pass --replay <EVENTS_JSON>")
}

fn run_session<S: EventSource>(
    config: &RunConfig,
    media: MediaContext,
    log: Option<EventLog>,
    source: S,
) -> Result<RunSummary> {
    let session = Session::new(media, log)?;
    session.load_script(&config.script)?;
    let handled = session.host().defined_callbacks();
    if handled.is_empty() {
        warn!("{} defines no event callbacks", config.script.display());
    } else {
        let names: Vec<&str> = handled.iter().map(|callback| callback.name()).collect();
        info!("{} handles {}", config.script.display(), names.join(", "));
    }
    let (samples, images) = session.load_resources()?;
    let stats = session.run(source);
    Ok(RunSummary {
        stats,
        samples,
        images,
    })
}
