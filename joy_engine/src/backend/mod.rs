//! Seams to the platform: input polling, audio output, the display surface
//! and media decoding.

pub mod headless;
#[cfg(feature = "sdl")]
pub mod sdl;

use std::path::Path;
use std::sync::Arc;

use anyhow::Result;
use joy_formats::{AudioClip, Bitmap};

use crate::events::InputEvent;

/// Non-blocking source of native input events.
pub trait EventSource {
    /// Returns the next pending event, or `None` when nothing is queued right now.
    fn poll_event(&mut self) -> Option<InputEvent>;
}

impl<S: EventSource + ?Sized> EventSource for Box<S> {
    fn poll_event(&mut self) -> Option<InputEvent> {
        (**self).poll_event()
    }
}

/// Channel-addressed playback; channel `n` belongs to audio slot `n`.
pub trait AudioOutput {
    /// Starts `clip` on `channel`, replacing whatever was playing there.
    /// `None` comes from an empty slot and must be ignored.
    fn play(&mut self, channel: usize, clip: Option<Arc<AudioClip>>, looping: bool);
    fn halt(&mut self, channel: usize);
}

pub trait DisplaySurface {
    fn size(&self) -> (u32, u32);
    /// Shows `frame`, which is already scaled to [`DisplaySurface::size`].
    fn present(&mut self, frame: &Bitmap) -> Result<()>;
}

pub trait MediaLoader {
    fn load_audio(&self, path: &Path) -> Result<AudioClip>;
    fn load_image(&self, path: &Path) -> Result<Bitmap>;
}

/// Decodes media from disk through `joy_formats`.
#[derive(Debug, Clone, Copy, Default)]
pub struct FileLoader;

impl MediaLoader for FileLoader {
    fn load_audio(&self, path: &Path) -> Result<AudioClip> {
        joy_formats::decode_audio(path)
    }

    fn load_image(&self, path: &Path) -> Result<Bitmap> {
        joy_formats::decode_image(path)
    }
}
