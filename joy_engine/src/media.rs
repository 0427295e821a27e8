//! Process-wide media state: the two slot tables and the backends they feed.

use std::cell::RefCell;
use std::path::Path;
use std::rc::Rc;
use std::sync::Arc;

use joy_formats::{AudioClip, Bitmap};
use log::{debug, info, warn};
use thiserror::Error;

use crate::backend::{AudioOutput, DisplaySurface, MediaLoader};
use crate::event_log::{EventLog, LogEntry};
use crate::slots::{Handle, SlotError, SlotKind, SlotTable, SLOT_CAPACITY};

pub type MediaHandle = Rc<RefCell<MediaContext>>;

#[derive(Debug, Error)]
pub enum LoadError {
    #[error(transparent)]
    Slot(#[from] SlotError),
    #[error("decoding {kind} {path}: {message}")]
    Decode {
        kind: SlotKind,
        path: String,
        message: String,
    },
}

#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct LoadReport {
    pub loaded: usize,
    pub rejected: usize,
    pub failed: usize,
}

pub struct MediaContext {
    samples: SlotTable<Arc<AudioClip>>,
    images: SlotTable<Bitmap>,
    audio: Box<dyn AudioOutput>,
    display: Box<dyn DisplaySurface>,
    loader: Box<dyn MediaLoader>,
    verbose: bool,
    log: Option<EventLog>,
}

impl MediaContext {
    pub fn new(
        audio: Box<dyn AudioOutput>,
        display: Box<dyn DisplaySurface>,
        loader: Box<dyn MediaLoader>,
        verbose: bool,
    ) -> Self {
        Self {
            samples: SlotTable::new(SlotKind::Audio),
            images: SlotTable::new(SlotKind::Image),
            audio,
            display,
            loader,
            verbose,
            log: None,
        }
    }

    pub fn with_log(mut self, log: EventLog) -> Self {
        self.log = Some(log);
        self
    }

    pub fn into_handle(self) -> MediaHandle {
        Rc::new(RefCell::new(self))
    }

    pub fn sample(&self, handle: Handle) -> Option<&Arc<AudioClip>> {
        self.samples.get(handle)
    }

    pub fn image(&self, handle: Handle) -> Option<&Bitmap> {
        self.images.get(handle)
    }

    pub fn loaded_counts(&self) -> (usize, usize) {
        (self.samples.len(), self.images.len())
    }

    /// Decodes `path` into slot `handle`, releasing any previous occupant.
    pub fn load(&mut self, kind: SlotKind, handle: Handle, path: &Path) -> Result<(), LoadError> {
        let check = match kind {
            SlotKind::Audio => self.samples.index(handle),
            SlotKind::Image => self.images.index(handle),
        };
        if let Err(err) = check {
            if self.verbose {
                warn!("refusing to load {kind} {} to slot {handle}", path.display());
            }
            return Err(err.into());
        }

        if self.verbose {
            info!("loading {kind} {} to slot {handle}", path.display());
        }
        let decode_error = |err: anyhow::Error| LoadError::Decode {
            kind,
            path: path.display().to_string(),
            message: format!("{err:#}"),
        };
        let replaced = match kind {
            SlotKind::Audio => {
                let clip = self.loader.load_audio(path).map_err(decode_error)?;
                self.samples.store(handle, Arc::new(clip))?.is_some()
            }
            SlotKind::Image => {
                let bitmap = self.loader.load_image(path).map_err(decode_error)?;
                self.images.store(handle, bitmap)?.is_some()
            }
        };
        if replaced {
            debug!("released previous {kind} in slot {handle}");
        }
        Ok(())
    }

    /// Loads every declared `(handle, path)` pair; failures are reported and skipped.
    pub fn load_all<'a, I>(&mut self, kind: SlotKind, entries: I) -> LoadReport
    where
        I: IntoIterator<Item = &'a (Handle, String)>,
    {
        let mut report = LoadReport::default();
        for (handle, path) in entries {
            match self.load(kind, *handle, Path::new(path)) {
                Ok(()) => report.loaded += 1,
                Err(LoadError::Slot(_)) => report.rejected += 1,
                Err(err) => {
                    warn!("{err}");
                    report.failed += 1;
                }
            }
        }
        report
    }

    /// Starts the clip in slot `handle` on the channel of the same number.
    pub fn play(&mut self, handle: Handle, looping: bool) -> Result<(), SlotError> {
        let channel = match self.samples.index(handle) {
            Ok(channel) => channel,
            Err(err) => {
                self.reject("play", err);
                self.record(LogEntry::Play {
                    handle,
                    looping,
                    accepted: false,
                    loaded: false,
                });
                return Err(err);
            }
        };
        let clip = self.samples.get(handle).cloned();
        if clip.is_none() {
            debug!("sample slot {handle} is empty; nothing will play");
        }
        self.record(LogEntry::Play {
            handle,
            looping,
            accepted: true,
            loaded: clip.is_some(),
        });
        self.audio.play(channel, clip, looping);
        Ok(())
    }

    pub fn stop(&mut self, handle: Handle) -> Result<(), SlotError> {
        let channel = match self.samples.index(handle) {
            Ok(channel) => channel,
            Err(err) => {
                self.reject("stop", err);
                self.record(LogEntry::Stop {
                    handle,
                    accepted: false,
                });
                return Err(err);
            }
        };
        self.record(LogEntry::Stop {
            handle,
            accepted: true,
        });
        self.audio.halt(channel);
        Ok(())
    }

    /// Scales the image in slot `handle` over the whole display.
    pub fn display(&mut self, handle: Handle) -> Result<(), SlotError> {
        if let Err(err) = self.images.index(handle) {
            self.reject("display", err);
            self.record(LogEntry::Display {
                handle,
                accepted: false,
                loaded: false,
            });
            return Err(err);
        }
        let loaded = self.images.is_occupied(handle);
        self.record(LogEntry::Display {
            handle,
            accepted: true,
            loaded,
        });
        let Some(image) = self.images.get(handle) else {
            debug!("image slot {handle} is empty; display unchanged");
            return Ok(());
        };
        let (width, height) = self.display.size();
        let frame = image.scaled_to(width, height);
        if let Err(err) = self.display.present(&frame) {
            warn!("presenting image slot {handle}: {err:#}");
        }
        Ok(())
    }

    /// Halts every channel and drops all loaded media.
    pub fn release_all(&mut self) {
        for channel in 0..SLOT_CAPACITY {
            self.audio.halt(channel);
        }
        let samples = self.samples.release_all();
        let images = self.images.release_all();
        debug!("released {samples} sample(s) and {images} image(s)");
    }

    fn reject(&self, operation: &str, err: SlotError) {
        if self.verbose {
            warn!("{operation}: {err}");
        } else {
            debug!("{operation}: {err}");
        }
    }

    fn record(&self, entry: LogEntry) {
        if let Some(log) = &self.log {
            log.push(entry);
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::backend::headless::{AudioRequest, Framebuffer, RecordingAudio};
    use anyhow::{bail, Result};
    use std::path::Path;

    struct StubLoader;

    impl MediaLoader for StubLoader {
        fn load_audio(&self, path: &Path) -> Result<AudioClip> {
            match path.to_str() {
                Some("missing.wav") => bail!("no such file"),
                Some(name) => Ok(AudioClip::new(vec![[0, 0]; name.len()])),
                None => bail!("non-utf8 path"),
            }
        }

        fn load_image(&self, path: &Path) -> Result<Bitmap> {
            let shade = path.to_str().map(str::len).unwrap_or(0) as u8;
            Ok(Bitmap::solid(2, 2, [shade, shade, shade, 0xFF]))
        }
    }

    fn context() -> (MediaContext, RecordingAudio, Framebuffer) {
        let audio = RecordingAudio::new();
        let display = Framebuffer::new(6, 4);
        let media = MediaContext::new(
            Box::new(audio.clone()),
            Box::new(display.clone()),
            Box::new(StubLoader),
            true,
        );
        (media, audio, display)
    }

    #[test]
    fn play_forwards_loaded_clip_on_its_channel() {
        let (mut media, audio, _) = context();
        media.load(SlotKind::Audio, 3, Path::new("click.wav")).unwrap();
        media.play(3, false).unwrap();
        media.play(3, true).unwrap();
        media.stop(3).unwrap();
        assert_eq!(
            audio.requests(),
            vec![
                AudioRequest::Play {
                    channel: 3,
                    frames: Some(9),
                    looping: false,
                },
                AudioRequest::Play {
                    channel: 3,
                    frames: Some(9),
                    looping: true,
                },
                AudioRequest::Halt { channel: 3 },
            ]
        );
    }

    #[test]
    fn out_of_range_handles_never_reach_the_backends() {
        let (mut media, audio, display) = context();
        for handle in [-1, 16, 99] {
            assert!(matches!(
                media.load(SlotKind::Audio, handle, Path::new("a.wav")),
                Err(LoadError::Slot(_))
            ));
            assert!(media.load(SlotKind::Image, handle, Path::new("a.png")).is_err());
            assert!(media.play(handle, false).is_err());
            assert!(media.stop(handle).is_err());
            assert!(media.display(handle).is_err());
        }
        assert!(audio.requests().is_empty());
        assert_eq!(display.present_count(), 0);
        assert_eq!(media.loaded_counts(), (0, 0));
    }

    #[test]
    fn empty_slot_play_forwards_empty_payload() {
        let (mut media, audio, _) = context();
        media.play(5, false).unwrap();
        assert_eq!(
            audio.requests(),
            vec![AudioRequest::Play {
                channel: 5,
                frames: None,
                looping: false,
            }]
        );
    }

    #[test]
    fn reload_keeps_only_the_last_resource() {
        let (mut media, _, _) = context();
        media.load(SlotKind::Audio, 0, Path::new("a.wav")).unwrap();
        media.load(SlotKind::Audio, 0, Path::new("longer.wav")).unwrap();
        assert_eq!(media.sample(0).map(|clip| clip.len()), Some(10));
        assert_eq!(media.loaded_counts(), (1, 0));
    }

    #[test]
    fn display_scales_to_the_whole_surface() {
        let (mut media, _, display) = context();
        media.load(SlotKind::Image, 1, Path::new("abc.png")).unwrap();
        media.display(1).unwrap();
        let frame = display.snapshot();
        assert_eq!((frame.width, frame.height), (6, 4));
        assert!(frame.rgba.chunks(4).all(|px| px == [7, 7, 7, 0xFF]));
        assert_eq!(display.present_count(), 1);
    }

    #[test]
    fn empty_image_slot_leaves_display_untouched() {
        let (mut media, _, display) = context();
        media.display(2).unwrap();
        assert_eq!(display.present_count(), 0);
    }

    #[test]
    fn load_all_tallies_outcomes() {
        let (mut media, _, _) = context();
        let entries = vec![
            (0, "a.wav".to_string()),
            (20, "b.wav".to_string()),
            (1, "missing.wav".to_string()),
        ];
        let report = media.load_all(SlotKind::Audio, &entries);
        assert_eq!(
            report,
            LoadReport {
                loaded: 1,
                rejected: 1,
                failed: 1,
            }
        );
        assert!(media.sample(1).is_none());
    }

    #[test]
    fn release_all_halts_channels_and_empties_slots() {
        let (mut media, audio, _) = context();
        media.load(SlotKind::Audio, 0, Path::new("a.wav")).unwrap();
        media.load(SlotKind::Image, 0, Path::new("a.png")).unwrap();
        media.release_all();
        assert_eq!(media.loaded_counts(), (0, 0));
        assert_eq!(audio.requests().len(), SLOT_CAPACITY);
    }
}
