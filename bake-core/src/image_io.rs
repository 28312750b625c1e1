//! Output image registry types and file saving.
//!
//! Baked pixels live in named `BakedImage` buffers owned by the scene; the
//! `ImageSaver` collaborator writes them to disk as PNG (standard depth) or
//! EXR (float buffer), creating the target directory when absent.

use crate::{Error, Result};
use serde::{Deserialize, Serialize};
use std::path::Path;

/// Output file format
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum ImageFormat {
    Png,
    Exr,
}

impl ImageFormat {
    pub fn extension(self) -> &'static str {
        match self {
            ImageFormat::Png => "png",
            ImageFormat::Exr => "exr",
        }
    }
}

/// Buffer precision, selected at image creation time only
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum ColorDepth {
    Standard,
    Float,
}

/// A persistent named output image. One exists per
/// (base-name, texture-suffix) pair.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct BakedImage {
    pub name: String,
    pub width: u32,
    pub height: u32,
    /// Float buffer selected at creation; not retroactive
    pub float_buffer: bool,
    /// RGBA pixel data (4 bytes per pixel, row-major). Not serialized with
    /// scene documents.
    #[serde(skip)]
    pub pixels: Vec<u8>,
}

impl BakedImage {
    pub fn new(name: impl Into<String>, width: u32, height: u32, float_buffer: bool) -> Self {
        Self {
            name: name.into(),
            width,
            height,
            float_buffer,
            pixels: vec![0u8; width as usize * height as usize * 4],
        }
    }

    /// Get pixel at (x, y) as [R, G, B, A]
    pub fn pixel(&self, x: u32, y: u32) -> Option<[u8; 4]> {
        if x >= self.width || y >= self.height {
            return None;
        }
        let i = (y as usize * self.width as usize + x as usize) * 4;
        if i + 4 > self.pixels.len() {
            return None;
        }
        Some([
            self.pixels[i],
            self.pixels[i + 1],
            self.pixels[i + 2],
            self.pixels[i + 3],
        ])
    }

    /// Fill the whole buffer with one color, allocating if the buffer was
    /// dropped during serialization
    pub fn fill(&mut self, rgba: [u8; 4]) {
        let len = self.width as usize * self.height as usize * 4;
        if self.pixels.len() != len {
            self.pixels = vec![0u8; len];
        }
        for p in self.pixels.chunks_exact_mut(4) {
            p.copy_from_slice(&rgba);
        }
    }
}

/// External image-I/O collaborator
pub trait ImageSaver {
    fn save_image(
        &self,
        image: &BakedImage,
        path: &Path,
        format: ImageFormat,
        depth: ColorDepth,
    ) -> Result<()>;
}

/// Saves baked images to the local filesystem
pub struct FileImageSaver;

impl ImageSaver for FileImageSaver {
    fn save_image(
        &self,
        image: &BakedImage,
        path: &Path,
        format: ImageFormat,
        _depth: ColorDepth,
    ) -> Result<()> {
        if let Some(parent) = path.parent() {
            if !parent.as_os_str().is_empty() {
                std::fs::create_dir_all(parent)?;
            }
        }

        match format {
            ImageFormat::Png => {
                let buf = image::RgbaImage::from_raw(
                    image.width,
                    image.height,
                    image.pixels.clone(),
                )
                .ok_or_else(|| Error::Other("image buffer size mismatch".into()))?;
                buf.save_with_format(path, image::ImageFormat::Png)?;
            }
            ImageFormat::Exr => {
                let floats: Vec<f32> =
                    image.pixels.iter().map(|&v| v as f32 / 255.0).collect();
                let buf = image::Rgba32FImage::from_raw(image.width, image.height, floats)
                    .ok_or_else(|| Error::Other("image buffer size mismatch".into()))?;
                image::DynamicImage::ImageRgba32F(buf)
                    .save_with_format(path, image::ImageFormat::OpenExr)?;
            }
        }
        Ok(())
    }
}
