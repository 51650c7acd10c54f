//! Stitching the six captures onto the master canvas.

use crate::error::CompositionError;
use crate::transform::Geometry;
use image::{imageops, ImageFormat, ImageReader, RgbaImage};
use std::path::{Path, PathBuf};

/// The stitched master image, both in memory and as its encoded file.
///
/// Consumed by the pyramid generator, which deletes the file when done.
#[derive(Debug)]
pub struct MasterComposite {
    /// Encoded master on disk
    pub path: PathBuf,

    /// Decoded pixels
    pub image: RgbaImage,
}

/// Decode one capture. The format is sniffed from content since the
/// required names carry no extension.
fn decode_source(path: &Path) -> Result<RgbaImage, CompositionError> {
    let decode_err = |source| CompositionError::Decode {
        path: path.to_path_buf(),
        source,
    };

    let reader = ImageReader::open(path)
        .and_then(|r| r.with_guessed_format())
        .map_err(|e| decode_err(image::ImageError::IoError(e)))?;

    Ok(reader.decode().map_err(decode_err)?.to_rgba8())
}

/// Draw every source onto a blank canvas in the geometry's drawing order.
///
/// Later sources are blended over earlier ones where they overlap; anything
/// falling outside the canvas is clipped.
pub fn compose(item_dir: &Path, geometry: &Geometry) -> Result<RgbaImage, CompositionError> {
    let mut canvas = RgbaImage::new(geometry.canvas_size, geometry.canvas_size);

    for source in &geometry.sources {
        let path = item_dir.join(source.name);
        tracing::debug!("Placing {} at ({}, {})", path.display(), source.x, source.y);
        let tile = decode_source(&path)?;
        imageops::overlay(&mut canvas, &tile, source.x, source.y);
    }

    Ok(canvas)
}

/// Build the master for an item and write it into `dest_dir`.
///
/// All sources are decoded before anything is written, so a bad capture
/// leaves no destination directory behind.
pub fn build_master(
    item_dir: &Path,
    dest_dir: &Path,
    geometry: &Geometry,
) -> Result<MasterComposite, CompositionError> {
    let image = compose(item_dir, geometry)?;

    std::fs::create_dir_all(dest_dir).map_err(|source| CompositionError::Io {
        path: dest_dir.to_path_buf(),
        source,
    })?;

    let path = dest_dir.join(geometry.master_name());
    image
        .save_with_format(&path, ImageFormat::Png)
        .map_err(|source| CompositionError::Encode {
            path: path.clone(),
            source,
        })?;

    tracing::debug!("Wrote master {}", path.display());
    Ok(MasterComposite { path, image })
}
