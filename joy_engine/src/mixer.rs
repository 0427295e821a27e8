//! Sixteen-channel sample player used by the SDL audio device callback.

use std::sync::Arc;

use joy_formats::AudioClip;

use crate::slots::SLOT_CAPACITY;

pub const CHANNEL_COUNT: usize = SLOT_CAPACITY;

#[derive(Debug, Clone)]
struct Voice {
    clip: Arc<AudioClip>,
    cursor: usize,
    looping: bool,
}

#[derive(Debug, Default)]
pub struct ChannelMixer {
    channels: [Option<Voice>; CHANNEL_COUNT],
}

impl ChannelMixer {
    pub fn new() -> Self {
        Self::default()
    }

    /// Restarts `channel` with `clip`. Empty payloads and unknown channels are ignored.
    pub fn start(&mut self, channel: usize, clip: Option<Arc<AudioClip>>, looping: bool) {
        let Some(clip) = clip.filter(|clip| !clip.is_empty()) else {
            return;
        };
        if let Some(slot) = self.channels.get_mut(channel) {
            *slot = Some(Voice {
                clip,
                cursor: 0,
                looping,
            });
        }
    }

    pub fn halt(&mut self, channel: usize) {
        if let Some(slot) = self.channels.get_mut(channel) {
            *slot = None;
        }
    }

    pub fn is_playing(&self, channel: usize) -> bool {
        self.channels
            .get(channel)
            .is_some_and(Option::is_some)
    }

    pub fn active_channels(&self) -> usize {
        self.channels.iter().filter(|slot| slot.is_some()).count()
    }

    /// Fills interleaved stereo `out` with the sum of every active channel.
    pub fn mix_into(&mut self, out: &mut [i16]) {
        out.fill(0);
        for slot in self.channels.iter_mut() {
            let Some(voice) = slot else {
                continue;
            };
            let frames = &voice.clip.frames;
            let mut finished = false;
            for frame in out.chunks_exact_mut(2) {
                if voice.cursor >= frames.len() {
                    if voice.looping {
                        voice.cursor = 0;
                    } else {
                        finished = true;
                        break;
                    }
                }
                let [left, right] = frames[voice.cursor];
                frame[0] = frame[0].saturating_add(left);
                frame[1] = frame[1].saturating_add(right);
                voice.cursor += 1;
            }
            if finished || (!voice.looping && voice.cursor >= frames.len()) {
                *slot = None;
            }
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn clip(frames: &[[i16; 2]]) -> Option<Arc<AudioClip>> {
        Some(Arc::new(AudioClip::new(frames.to_vec())))
    }

    #[test]
    fn one_shot_plays_once_then_frees_channel() {
        let mut mixer = ChannelMixer::new();
        mixer.start(0, clip(&[[1, 2], [3, 4]]), false);
        let mut out = [9i16; 6];
        mixer.mix_into(&mut out);
        assert_eq!(out, [1, 2, 3, 4, 0, 0]);
        assert!(!mixer.is_playing(0));
    }

    #[test]
    fn looping_clip_wraps_until_halted() {
        let mut mixer = ChannelMixer::new();
        mixer.start(7, clip(&[[5, 5], [6, 6]]), true);
        let mut out = [0i16; 10];
        mixer.mix_into(&mut out);
        assert_eq!(out, [5, 5, 6, 6, 5, 5, 6, 6, 5, 5]);
        assert!(mixer.is_playing(7));
        mixer.halt(7);
        mixer.mix_into(&mut out);
        assert_eq!(out, [0; 10]);
    }

    #[test]
    fn channels_sum_with_saturation() {
        let mut mixer = ChannelMixer::new();
        mixer.start(0, clip(&[[i16::MAX, 1]]), false);
        mixer.start(1, clip(&[[i16::MAX, 2]]), false);
        let mut out = [0i16; 2];
        mixer.mix_into(&mut out);
        assert_eq!(out, [i16::MAX, 3]);
    }

    #[test]
    fn empty_payloads_and_bad_channels_are_ignored() {
        let mut mixer = ChannelMixer::new();
        mixer.start(0, None, false);
        mixer.start(1, clip(&[]), true);
        mixer.start(CHANNEL_COUNT, clip(&[[1, 1]]), false);
        assert_eq!(mixer.active_channels(), 0);
    }

    #[test]
    fn restarting_a_channel_rewinds_it() {
        let mut mixer = ChannelMixer::new();
        mixer.start(2, clip(&[[1, 1], [2, 2], [3, 3]]), false);
        let mut out = [0i16; 2];
        mixer.mix_into(&mut out);
        mixer.start(2, clip(&[[1, 1], [2, 2], [3, 3]]), false);
        mixer.mix_into(&mut out);
        assert_eq!(out, [1, 1]);
    }
}
