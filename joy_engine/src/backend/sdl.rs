//! SDL2 window, joystick, keyboard and audio device.

use std::cell::RefCell;
use std::path::Path;
use std::rc::Rc;
use std::sync::{Arc, Mutex};

use anyhow::{anyhow, Context, Result};
use joy_formats::{AudioClip, Bitmap, OUTPUT_SAMPLE_RATE};
use log::{info, warn};
use sdl2::audio::{AudioCallback, AudioDevice, AudioSpecDesired};
use sdl2::event::Event;
use sdl2::joystick::Joystick;
use sdl2::pixels::PixelFormatEnum;
use sdl2::surface::Surface;
use sdl2::video::Window;
use sdl2::{EventPump, Sdl};

use super::{AudioOutput, DisplaySurface, EventSource};
use crate::events::InputEvent;
use crate::mixer::ChannelMixer;

/// Keeps the SDL context and the first joystick open while it is alive.
pub struct SdlGuard {
    _sdl: Sdl,
    _joystick: Option<Joystick>,
}

pub struct SdlBackend {
    pub guard: SdlGuard,
    pub events: SdlEvents,
    pub audio: SdlAudio,
    pub display: SdlDisplay,
}

impl SdlBackend {
    pub fn open(width: u32, height: u32, mapfile: Option<&Path>) -> Result<Self> {
        let sdl = sdl2::init().map_err(|err| anyhow!(err)).context("initialising SDL")?;
        let video = sdl.video().map_err(|err| anyhow!(err))?;
        let window = video
            .window(env!("CARGO_PKG_NAME"), width, height)
            .position_centered()
            .build()
            .context("creating SDL window")?;
        let pump = Rc::new(RefCell::new(
            sdl.event_pump().map_err(|err| anyhow!(err))?,
        ));

        if let Some(path) = mapfile {
            add_mapping_file(&sdl, path);
        }
        let joystick = open_first_joystick(&sdl);
        let audio = SdlAudio::open(&sdl);

        Ok(Self {
            guard: SdlGuard {
                _sdl: sdl,
                _joystick: joystick,
            },
            events: SdlEvents { pump: pump.clone() },
            audio,
            display: SdlDisplay { window, pump },
        })
    }
}

fn add_mapping_file(sdl: &Sdl, path: &Path) {
    let result = sdl
        .game_controller()
        .map_err(|err| anyhow!(err))
        .and_then(|controllers| {
            controllers
                .load_mappings(path)
                .map_err(|err| anyhow!(err.to_string()))
        });
    match result {
        Ok(count) => info!("added {count} gamepad mapping(s) from {}", path.display()),
        Err(err) => warn!("could not read mapping file {}: {err:#}", path.display()),
    }
}

fn open_first_joystick(sdl: &Sdl) -> Option<Joystick> {
    let subsystem = match sdl.joystick() {
        Ok(subsystem) => subsystem,
        Err(err) => {
            warn!("joystick subsystem unavailable: {err}");
            return None;
        }
    };
    match subsystem.num_joysticks() {
        Ok(count) if count >= 1 => match subsystem.open(0) {
            Ok(joystick) => {
                info!("using joystick 0: {}", joystick.name());
                Some(joystick)
            }
            Err(err) => {
                warn!("opening joystick 0: {err}");
                None
            }
        },
        Ok(_) => {
            warn!("can't find any joysticks; only keyboard events will arrive");
            None
        }
        Err(err) => {
            warn!("counting joysticks: {err}");
            None
        }
    }
}

pub struct SdlEvents {
    pump: Rc<RefCell<EventPump>>,
}

impl EventSource for SdlEvents {
    fn poll_event(&mut self) -> Option<InputEvent> {
        let event = self.pump.borrow_mut().poll_event()?;
        Some(convert_event(event))
    }
}

fn convert_event(event: Event) -> InputEvent {
    match event {
        Event::Quit { timestamp } => InputEvent::Quit { timestamp },
        Event::KeyDown {
            timestamp,
            keycode: Some(keycode),
            repeat: false,
            ..
        } => InputEvent::KeyDown {
            timestamp,
            key: keycode.name(),
        },
        Event::KeyUp {
            timestamp,
            keycode: Some(keycode),
            ..
        } => InputEvent::KeyUp {
            timestamp,
            key: keycode.name(),
        },
        Event::JoyButtonDown {
            timestamp,
            which,
            button_idx,
        } => InputEvent::ButtonDown {
            timestamp,
            device_id: which,
            button_id: button_idx,
        },
        Event::JoyButtonUp {
            timestamp,
            which,
            button_idx,
        } => InputEvent::ButtonUp {
            timestamp,
            device_id: which,
            button_id: button_idx,
        },
        Event::JoyAxisMotion {
            timestamp,
            which,
            axis_idx,
            value,
        } => InputEvent::AxisMotion {
            timestamp,
            device_id: which,
            axis_id: axis_idx,
            value,
        },
        _ => InputEvent::Other,
    }
}

struct MixerCallback {
    mixer: Arc<Mutex<ChannelMixer>>,
}

impl AudioCallback for MixerCallback {
    type Channel = i16;

    fn callback(&mut self, out: &mut [i16]) {
        match self.mixer.lock() {
            Ok(mut mixer) => mixer.mix_into(out),
            Err(_) => out.fill(0),
        }
    }
}

/// Playback through the default SDL audio device. Without a device the
/// requests still land in the mixer and stay silent.
pub struct SdlAudio {
    mixer: Arc<Mutex<ChannelMixer>>,
    _device: Option<AudioDevice<MixerCallback>>,
}

impl SdlAudio {
    fn open(sdl: &Sdl) -> Self {
        let mixer = Arc::new(Mutex::new(ChannelMixer::new()));
        let desired = AudioSpecDesired {
            freq: Some(OUTPUT_SAMPLE_RATE as i32),
            channels: Some(2),
            samples: Some(1024),
        };
        let device = sdl.audio().and_then(|audio| {
            let callback_mixer = mixer.clone();
            audio.open_playback(None, &desired, move |_spec| MixerCallback {
                mixer: callback_mixer,
            })
        });
        let device = match device {
            Ok(device) => {
                device.resume();
                Some(device)
            }
            Err(err) => {
                warn!("opening audio device: {err}; continuing without sound");
                None
            }
        };
        Self {
            mixer,
            _device: device,
        }
    }
}

impl AudioOutput for SdlAudio {
    fn play(&mut self, channel: usize, clip: Option<Arc<AudioClip>>, looping: bool) {
        if let Ok(mut mixer) = self.mixer.lock() {
            mixer.start(channel, clip, looping);
        }
    }

    fn halt(&mut self, channel: usize) {
        if let Ok(mut mixer) = self.mixer.lock() {
            mixer.halt(channel);
        }
    }
}

pub struct SdlDisplay {
    window: Window,
    pump: Rc<RefCell<EventPump>>,
}

impl DisplaySurface for SdlDisplay {
    fn size(&self) -> (u32, u32) {
        self.window.size()
    }

    fn present(&mut self, frame: &Bitmap) -> Result<()> {
        let pump = self.pump.borrow();
        let mut target = self.window.surface(&pump).map_err(|err| anyhow!(err))?;
        let mut pixels = frame.rgba.clone();
        // RGBA byte order is ABGR8888 on little-endian hosts.
        let source = Surface::from_data(
            &mut pixels,
            frame.width,
            frame.height,
            frame.width * 4,
            PixelFormatEnum::ABGR8888,
        )
        .map_err(|err| anyhow!(err))?;
        source
            .blit(None, &mut target, None)
            .map_err(|err| anyhow!(err))?;
        target.update_window().map_err(|err| anyhow!(err))?;
        Ok(())
    }
}
