//! Cutting the master composite into a zoom-level tile pyramid.
//!
//! Every level is resampled directly from the master, never from the level
//! above it, so blur does not accumulate toward the coarse end.

use crate::error::PyramidError;
use crate::transform::{tile_file_name, Geometry, MasterComposite, ZoomLevel};
use image::imageops::{self, FilterType};
use image::{ImageFormat, RgbaImage};
use rayon::prelude::*;
use std::path::{Path, PathBuf};

/// What one level produced.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct LevelSummary {
    pub zoom: u32,
    pub tiles: usize,
}

/// What a full pyramid produced.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct PyramidSummary {
    pub levels: Vec<LevelSummary>,
}

impl PyramidSummary {
    /// Tiles written across all levels.
    pub fn total_tiles(&self) -> usize {
        self.levels.iter().map(|l| l.tiles).sum()
    }
}

fn io_err(path: &Path) -> impl FnOnce(std::io::Error) -> PyramidError + '_ {
    move |source| PyramidError::Io {
        path: path.to_path_buf(),
        source,
    }
}

fn image_err(path: &Path) -> impl FnOnce(image::ImageError) -> PyramidError + '_ {
    move |source| PyramidError::Image {
        path: path.to_path_buf(),
        source,
    }
}

/// Write every tile of one level from its full rendition.
fn cut_tiles(rendition: &RgbaImage, level: &ZoomLevel, level_dir: &Path) -> Result<usize, PyramidError> {
    let coords: Vec<(u32, u32)> = level.tiles().collect();

    coords.par_iter().try_for_each(|&(col, row)| {
        let (x, y) = level.tile_origin(col, row);
        let tile = imageops::crop_imm(rendition, x, y, level.tile_size, level.tile_size).to_image();
        let path = level_dir.join(tile_file_name(col, row));
        tile.save_with_format(&path, ImageFormat::Png)
            .map_err(image_err(&path))
    })?;

    Ok(coords.len())
}

/// Produce one zoom level under `dest_dir/<zoom>/`.
fn generate_level(
    master: &RgbaImage,
    level: &ZoomLevel,
    dest_dir: &Path,
) -> Result<usize, PyramidError> {
    let level_dir = dest_dir.join(level.zoom.to_string());
    std::fs::create_dir(&level_dir).map_err(io_err(&level_dir))?;

    let rendition = imageops::resize(master, level.full_size, level.full_size, FilterType::Lanczos3);
    let rendition_path: PathBuf = level_dir.join(level.rendition_name());
    rendition
        .save_with_format(&rendition_path, ImageFormat::Png)
        .map_err(image_err(&rendition_path))?;

    let tiles = cut_tiles(&rendition, level, &level_dir)?;

    if let Err(e) = std::fs::remove_file(&rendition_path) {
        tracing::warn!("Could not remove rendition {}: {}", rendition_path.display(), e);
    }

    Ok(tiles)
}

/// Generate all levels from `max_zoom` down to 0, then delete the master file.
///
/// A failure stops generation for the item; whatever was already written
/// under `dest_dir` stays where it is.
pub fn generate_pyramid(
    master: MasterComposite,
    dest_dir: &Path,
    geometry: &Geometry,
) -> Result<PyramidSummary, PyramidError> {
    if geometry.tile_size == 0 {
        return Err(PyramidError::InvalidGeometry("tile size must be positive".to_string()));
    }

    let mut summary = PyramidSummary::default();

    for level in geometry.levels() {
        tracing::debug!(
            "Zoom {}: {} divisions, {}px rendition",
            level.zoom,
            level.divisions,
            level.full_size
        );
        let tiles = generate_level(&master.image, &level, dest_dir)?;
        summary.levels.push(LevelSummary {
            zoom: level.zoom,
            tiles,
        });
    }

    std::fs::remove_file(&master.path).map_err(io_err(&master.path))?;

    Ok(summary)
}
