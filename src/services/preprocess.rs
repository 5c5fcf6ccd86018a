use std::io::Cursor;
use std::path::Path;

use image::codecs::jpeg::JpegEncoder;
use image::imageops::FilterType;
use image::{ImageFormat, ImageReader};

/// Shortest side the vision model is fed at.
pub const DEFAULT_TARGET_SIZE: u32 = 768;

const JPEG_QUALITY: u8 = 90;

/// Image bytes ready to embed in an inference request.
#[derive(Debug, Clone)]
pub struct PreparedImage {
    pub bytes: Vec<u8>,
    pub mime: &'static str,
    pub width: u32,
    pub height: u32,
    pub resized: bool,
}

/// Load an image and bound its shortest side to `target`.
pub fn prepare_image(path: &Path, target: u32) -> Result<PreparedImage, PreprocessError> {
    let bytes = std::fs::read(path).map_err(|e| PreprocessError::Read {
        path: path.display().to_string(),
        source: e,
    })?;
    prepare_bytes(bytes, target)
}

/// Same as [`prepare_image`] for bytes already in memory.
///
/// Images whose shortest side is already at or below `target` pass through
/// untouched; larger ones are downscaled with Catmull-Rom resampling and
/// re-encoded (PNG stays PNG, anything else becomes JPEG).
pub fn prepare_bytes(bytes: Vec<u8>, target: u32) -> Result<PreparedImage, PreprocessError> {
    let reader = ImageReader::new(Cursor::new(&bytes))
        .with_guessed_format()
        .map_err(PreprocessError::Io)?;
    let format = reader.format().ok_or(PreprocessError::UnknownFormat)?;
    let (width, height) = reader.into_dimensions()?;

    let Some((new_width, new_height)) = scaled_dimensions(width, height, target) else {
        tracing::debug!(width, height, "Image already small enough, skipping resize");
        return Ok(PreparedImage {
            bytes,
            mime: format.to_mime_type(),
            width,
            height,
            resized: false,
        });
    };

    tracing::debug!(width, height, new_width, new_height, "Resizing image");

    let decoded = ImageReader::with_format(Cursor::new(&bytes), format).decode()?;
    let resized = decoded.resize_exact(new_width, new_height, FilterType::CatmullRom);

    let mut out = Vec::new();
    let mime = if format == ImageFormat::Png {
        resized.write_to(&mut Cursor::new(&mut out), ImageFormat::Png)?;
        ImageFormat::Png.to_mime_type()
    } else {
        let rgb = resized.to_rgb8();
        JpegEncoder::new_with_quality(&mut out, JPEG_QUALITY).encode_image(&rgb)?;
        ImageFormat::Jpeg.to_mime_type()
    };

    Ok(PreparedImage {
        bytes: out,
        mime,
        width: new_width,
        height: new_height,
        resized: true,
    })
}

/// Dimensions with the shortest side scaled to `target`, or `None` when the
/// image would not shrink.
pub fn scaled_dimensions(width: u32, height: u32, target: u32) -> Option<(u32, u32)> {
    let short = width.min(height);
    if short <= target || short == 0 {
        return None;
    }
    let scale = |side: u32| ((u64::from(side) * u64::from(target)) / u64::from(short)).max(1) as u32;
    if width <= height {
        Some((target, scale(height)))
    } else {
        Some((scale(width), target))
    }
}

#[derive(Debug, thiserror::Error)]
pub enum PreprocessError {
    #[error("Failed to read image {path}: {source}")]
    Read {
        path: String,
        source: std::io::Error,
    },

    #[error("Image I/O error: {0}")]
    Io(std::io::Error),

    #[error("Unrecognized image format")]
    UnknownFormat,

    #[error("Image codec error: {0}")]
    Codec(#[from] image::ImageError),
}
