use std::fs::File;
use std::io::BufWriter;
use std::path::Path;

use anyhow::{Context, Result, ensure};
use image::{ColorType, ImageEncoder, codecs::png::PngEncoder};

/// Decoded still image stored as tightly packed RGBA8 rows.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Bitmap {
    pub width: u32,
    pub height: u32,
    pub rgba: Vec<u8>,
}

impl Bitmap {
    pub fn new(width: u32, height: u32, rgba: Vec<u8>) -> Result<Self> {
        ensure!(
            rgba.len() == width as usize * height as usize * 4,
            "RGBA buffer of {} bytes does not match {width}x{height}",
            rgba.len()
        );
        Ok(Self {
            width,
            height,
            rgba,
        })
    }

    pub fn solid(width: u32, height: u32, pixel: [u8; 4]) -> Self {
        let rgba = pixel
            .iter()
            .copied()
            .cycle()
            .take(width as usize * height as usize * 4)
            .collect();
        Self {
            width,
            height,
            rgba,
        }
    }

    pub fn pixel(&self, x: u32, y: u32) -> Option<[u8; 4]> {
        if x >= self.width || y >= self.height {
            return None;
        }
        let offset = (y as usize * self.width as usize + x as usize) * 4;
        let mut out = [0u8; 4];
        out.copy_from_slice(&self.rgba[offset..offset + 4]);
        Some(out)
    }

    /// Nearest-neighbour resample covering the whole `width` x `height` target.
    pub fn scaled_to(&self, width: u32, height: u32) -> Bitmap {
        if width == self.width && height == self.height {
            return self.clone();
        }
        let mut rgba = Vec::with_capacity(width as usize * height as usize * 4);
        for y in 0..height {
            let src_y = if self.height == 0 {
                0
            } else {
                (u64::from(y) * u64::from(self.height) / u64::from(height.max(1))) as u32
            };
            for x in 0..width {
                let src_x = (u64::from(x) * u64::from(self.width) / u64::from(width.max(1))) as u32;
                rgba.extend_from_slice(&self.pixel(src_x, src_y).unwrap_or([0, 0, 0, 0xFF]));
            }
        }
        Bitmap {
            width,
            height,
            rgba,
        }
    }
}

pub fn decode_image(path: &Path) -> Result<Bitmap> {
    let decoded = image::open(path)
        .with_context(|| format!("decoding image {}", path.display()))?
        .to_rgba8();
    let (width, height) = decoded.dimensions();
    Bitmap::new(width, height, decoded.into_raw())
}

pub fn write_png(path: &Path, bitmap: &Bitmap) -> Result<()> {
    let file = File::create(path).with_context(|| format!("creating {}", path.display()))?;
    let encoder = PngEncoder::new(BufWriter::new(file));
    encoder
        .write_image(&bitmap.rgba, bitmap.width, bitmap.height, ColorType::Rgba8)
        .with_context(|| format!("writing PNG to {}", path.display()))?;
    Ok(())
}
