use std::fs::File;
use std::io::{Cursor, ErrorKind};
use std::path::Path;

use anyhow::{Context, Result, ensure};
use symphonia::core::audio::SampleBuffer;
use symphonia::core::codecs::{CODEC_TYPE_NULL, DecoderOptions};
use symphonia::core::errors::Error as SymphoniaError;
use symphonia::core::formats::FormatOptions;
use symphonia::core::io::{MediaSource, MediaSourceStream};
use symphonia::core::meta::MetadataOptions;
use symphonia::core::probe::Hint;

/// Rate every decoded clip is converted to; the output device runs at this rate.
pub const OUTPUT_SAMPLE_RATE: u32 = 44_100;

/// Decoded audio as interleaved stereo frames at [`OUTPUT_SAMPLE_RATE`].
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct AudioClip {
    pub frames: Vec<[i16; 2]>,
}

impl AudioClip {
    pub fn new(frames: Vec<[i16; 2]>) -> Self {
        Self { frames }
    }

    pub fn len(&self) -> usize {
        self.frames.len()
    }

    pub fn is_empty(&self) -> bool {
        self.frames.is_empty()
    }
}

/// Decodes a whole WAV, FLAC, Ogg Vorbis or MP3 file into memory.
///
/// The extension is only a probing hint; the container is detected from the
/// stream itself.
pub fn decode_audio(path: &Path) -> Result<AudioClip> {
    let file = File::open(path).with_context(|| format!("opening {}", path.display()))?;
    let mut hint = Hint::new();
    if let Some(extension) = path.extension().and_then(|ext| ext.to_str()) {
        hint.with_extension(extension);
    }
    decode_source(Box::new(file), &hint).with_context(|| format!("decoding {}", path.display()))
}

pub fn decode_audio_bytes(bytes: Vec<u8>) -> Result<AudioClip> {
    decode_source(Box::new(Cursor::new(bytes)), &Hint::new())
}

fn decode_source(source: Box<dyn MediaSource>, hint: &Hint) -> Result<AudioClip> {
    let stream = MediaSourceStream::new(source, Default::default());
    let probed = symphonia::default::get_probe()
        .format(
            hint,
            stream,
            &FormatOptions::default(),
            &MetadataOptions::default(),
        )
        .context("unrecognised audio container")?;
    let mut format = probed.format;

    let track = format
        .tracks()
        .iter()
        .find(|track| track.codec_params.codec != CODEC_TYPE_NULL)
        .context("no audio track found")?;
    let track_id = track.id;
    let mut source_rate = track.codec_params.sample_rate;
    let mut decoder = symphonia::default::get_codecs()
        .make(&track.codec_params, &DecoderOptions::default())
        .context("unsupported audio codec")?;

    let mut frames = Vec::new();
    loop {
        let packet = match format.next_packet() {
            Ok(packet) => packet,
            Err(SymphoniaError::IoError(err)) if err.kind() == ErrorKind::UnexpectedEof => break,
            Err(SymphoniaError::ResetRequired) => {
                decoder.reset();
                continue;
            }
            Err(err) => return Err(err).context("reading audio packet"),
        };
        if packet.track_id() != track_id {
            continue;
        }
        let decoded = match decoder.decode(&packet) {
            Ok(decoded) => decoded,
            // A corrupt packet loses its own samples only.
            Err(SymphoniaError::DecodeError(_)) => continue,
            Err(err) => return Err(err).context("decoding audio packet"),
        };

        let spec = *decoded.spec();
        let channels = spec.channels.count();
        ensure!(channels > 0, "audio stream declares zero channels");
        source_rate = source_rate.or(Some(spec.rate));

        let mut samples = SampleBuffer::<i16>::new(decoded.capacity() as u64, spec);
        samples.copy_interleaved_ref(decoded);
        frames.extend(to_stereo(samples.samples(), channels));
    }

    let source_rate = source_rate.context("audio stream has no sample rate")?;
    ensure!(source_rate > 0, "audio stream declares a zero sample rate");
    Ok(AudioClip::new(resample_nearest(
        &frames,
        source_rate,
        OUTPUT_SAMPLE_RATE,
    )))
}

fn to_stereo(samples: &[i16], channels: usize) -> impl Iterator<Item = [i16; 2]> + '_ {
    samples.chunks_exact(channels).map(|frame| match frame {
        [mono] => [*mono, *mono],
        [left, right, ..] => [*left, *right],
        [] => [0, 0],
    })
}

fn resample_nearest(frames: &[[i16; 2]], from_rate: u32, to_rate: u32) -> Vec<[i16; 2]> {
    if from_rate == to_rate || frames.is_empty() {
        return frames.to_vec();
    }
    let out_len = (frames.len() as u64 * u64::from(to_rate) / u64::from(from_rate)) as usize;
    (0..out_len)
        .map(|index| {
            let source = (index as u64 * u64::from(from_rate) / u64::from(to_rate)) as usize;
            frames[source.min(frames.len() - 1)]
        })
        .collect()
}
