use std::{cell::{Cell, RefCell}, collections::VecDeque, fs, path::Path, rc::Rc, sync::Arc};

use anyhow::Result;
use joy_formats::{AudioClip, Bitmap};
use serde::Serialize;
use thiserror::Error;

use super::{AudioOutput, DisplaySurface, EventSource};
use crate::events::InputEvent;

#[derive(Debug, Error)]
pub enum ReplayError {
    #[error("reading replay file {path}")]
    Io {
        path: String,
        #[source]
        source: std::io::Error,
    },
    #[error("parsing replay file {path}")]
    Parse {
        path: String,
        #[source]
        source: serde_json::Error,
    },
}

/// Feeds a recorded event list to the dispatch loop.
///
/// Once the recording runs dry a single window-close event is delivered so the
/// session ends through the regular `onquit` path.
#[derive(Debug)]
pub struct ReplaySource {
    pending: VecDeque<InputEvent>,
    last_timestamp: u32,
    closed: bool,
}

impl ReplaySource {
    pub fn new<E>(events: E) -> Self
    where
        E: IntoIterator<Item = InputEvent>,
    {
        Self {
            pending: events.into_iter().collect(),
            last_timestamp: 0,
            closed: false,
        }
    }

    pub fn from_path(path: &Path) -> Result<Self, ReplayError> {
        let data = fs::read_to_string(path).map_err(|source| ReplayError::Io {
            path: path.display().to_string(),
            source,
        })?;
        let events: Vec<InputEvent> =
            serde_json::from_str(&data).map_err(|source| ReplayError::Parse {
                path: path.display().to_string(),
                source,
            })?;
        Ok(Self::new(events))
    }
}

impl EventSource for ReplaySource {
    fn poll_event(&mut self) -> Option<InputEvent> {
        if let Some(event) = self.pending.pop_front() {
            if let Some(timestamp) = event_timestamp(&event) {
                self.last_timestamp = timestamp;
            }
            return Some(event);
        }
        if self.closed {
            return None;
        }
        self.closed = true;
        Some(InputEvent::Quit {
            timestamp: self.last_timestamp,
        })
    }
}

fn event_timestamp(event: &InputEvent) -> Option<u32> {
    match event {
        InputEvent::ButtonDown { timestamp, .. }
        | InputEvent::ButtonUp { timestamp, .. }
        | InputEvent::AxisMotion { timestamp, .. }
        | InputEvent::KeyDown { timestamp, .. }
        | InputEvent::KeyUp { timestamp, .. }
        | InputEvent::Quit { timestamp } => Some(*timestamp),
        InputEvent::Other => None,
    }
}

#[derive(Debug, Clone, Serialize, PartialEq, Eq)]
#[serde(tag = "kind", rename_all = "snake_case")]
pub enum AudioRequest {
    Play {
        channel: usize,
        frames: Option<usize>,
        looping: bool,
    },
    Halt {
        channel: usize,
    },
}

/// Audio output that only remembers what it was asked to do.
#[derive(Debug, Clone, Default)]
pub struct RecordingAudio {
    requests: Rc<RefCell<Vec<AudioRequest>>>,
}

impl RecordingAudio {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn requests(&self) -> Vec<AudioRequest> {
        self.requests.borrow().clone()
    }
}

impl AudioOutput for RecordingAudio {
    fn play(&mut self, channel: usize, clip: Option<Arc<AudioClip>>, looping: bool) {
        self.requests.borrow_mut().push(AudioRequest::Play {
            channel,
            frames: clip.map(|clip| clip.len()),
            looping,
        });
    }

    fn halt(&mut self, channel: usize) {
        self.requests
            .borrow_mut()
            .push(AudioRequest::Halt { channel });
    }
}

/// In-memory RGBA display; clones observe the same pixels.
#[derive(Debug, Clone)]
pub struct Framebuffer {
    frame: Rc<RefCell<Bitmap>>,
    presents: Rc<Cell<u32>>,
}

impl Framebuffer {
    pub fn new(width: u32, height: u32) -> Self {
        Self {
            frame: Rc::new(RefCell::new(Bitmap::solid(width, height, [0, 0, 0, 0xFF]))),
            presents: Rc::new(Cell::new(0)),
        }
    }

    pub fn snapshot(&self) -> Bitmap {
        self.frame.borrow().clone()
    }

    pub fn present_count(&self) -> u32 {
        self.presents.get()
    }
}

impl DisplaySurface for Framebuffer {
    fn size(&self) -> (u32, u32) {
        let frame = self.frame.borrow();
        (frame.width, frame.height)
    }

    fn present(&mut self, frame: &Bitmap) -> Result<()> {
        let mut target = self.frame.borrow_mut();
        anyhow::ensure!(
            frame.width == target.width && frame.height == target.height,
            "frame is {}x{} but the display is {}x{}",
            frame.width,
            frame.height,
            target.width,
            target.height
        );
        target.rgba.copy_from_slice(&frame.rgba);
        self.presents.set(self.presents.get() + 1);
        Ok(())
    }
}

/// Counts the controller mappings in a gamepad mapping file without a
/// controller subsystem to hand them to.
pub fn count_mappings(path: &Path) -> Result<usize> {
    let data = fs::read_to_string(path)?;
    Ok(data
        .lines()
        .map(str::trim)
        .filter(|line| !line.is_empty() && !line.starts_with('#'))
        .count())
}
