pub mod audio;
pub mod bitmap;

pub use audio::{AudioClip, OUTPUT_SAMPLE_RATE, decode_audio, decode_audio_bytes};
pub use bitmap::{Bitmap, decode_image, write_png};
