use std::path::PathBuf;

use anyhow::{ensure, Result};
use clap::Parser;

pub const DEFAULT_DISPLAY_SIZE: u32 = 150;

#[derive(Parser, Debug)]
#[command(
    about = "Runs a Lua script that plays samples and shows images in response to joystick and keyboard input",
    version
)]
pub struct Args {
    /// Lua script defining sample_map, image_map and the on* callbacks
    pub script: PathBuf,

    /// Gamepad mapping file (SDL_GameControllerDB format)
    #[arg(short = 'm', long = "mapfile", value_name = "MAPFILE")]
    pub mapfile: Option<PathBuf>,

    /// Report every load, rejected handle and skipped callback
    #[arg(short, long)]
    pub verbose: bool,

    /// Display width in pixels
    #[arg(long, default_value_t = DEFAULT_DISPLAY_SIZE)]
    pub width: u32,

    /// Display height in pixels
    #[arg(long, default_value_t = DEFAULT_DISPLAY_SIZE)]
    pub height: u32,

    /// Replay input events from a JSON file without opening a window or audio device
    #[arg(long, value_name = "EVENTS_JSON")]
    pub replay: Option<PathBuf>,

    /// Path to write the ordered callback/media log as JSON
    #[arg(long)]
    pub dispatch_log_json: Option<PathBuf>,

    /// Path to write the final display contents as PNG (requires --replay)
    #[arg(long)]
    pub frame_png: Option<PathBuf>,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum BackendChoice {
    Replay,
    Native,
}

#[derive(Debug, Clone)]
pub struct RunConfig {
    pub script: PathBuf,
    pub mapfile: Option<PathBuf>,
    pub verbose: bool,
    pub width: u32,
    pub height: u32,
    pub backend: BackendChoice,
    pub replay: Option<PathBuf>,
    pub dispatch_log_json: Option<PathBuf>,
    pub frame_png: Option<PathBuf>,
}

pub fn parse() -> Result<RunConfig> {
    Args::parse().into_config()
}

impl Args {
    pub fn into_config(self) -> Result<RunConfig> {
        ensure!(
            self.width > 0 && self.height > 0,
            "display size must be non-zero (got {}x{})",
            self.width,
            self.height
        );
        ensure!(
            self.frame_png.is_none() || self.replay.is_some(),
            "--frame-png requires --replay"
        );
        let backend = if self.replay.is_some() {
            BackendChoice::Replay
        } else {
            BackendChoice::Native
        };
        Ok(RunConfig {
            script: self.script,
            mapfile: self.mapfile,
            verbose: self.verbose,
            width: self.width,
            height: self.height,
            backend,
            replay: self.replay,
            dispatch_log_json: self.dispatch_log_json,
            frame_png: self.frame_png,
        })
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn config(args: &[&str]) -> Result<RunConfig> {
        Args::try_parse_from(std::iter::once("joy_engine").chain(args.iter().copied()))?
            .into_config()
    }

    #[test]
    fn defaults_match_the_small_window() {
        let config = config(&["demo.lua"]).unwrap();
        assert_eq!(config.script, PathBuf::from("demo.lua"));
        assert_eq!((config.width, config.height), (150, 150));
        assert_eq!(config.backend, BackendChoice::Native);
        assert!(!config.verbose);
    }

    #[test]
    fn short_flags_and_replay() {
        let config = config(&["-v", "-m", "pads.txt", "--replay", "ev.json", "demo.lua"]).unwrap();
        assert!(config.verbose);
        assert_eq!(config.mapfile, Some(PathBuf::from("pads.txt")));
        assert_eq!(config.backend, BackendChoice::Replay);
    }

    #[test]
    fn script_is_required() {
        assert!(config(&["-v"]).is_err());
    }

    #[test]
    fn rejects_zero_display_and_orphan_frame_png() {
        assert!(config(&["--width", "0", "demo.lua"]).is_err());
        assert!(config(&["--frame-png", "out.png", "demo.lua"]).is_err());
    }
}
