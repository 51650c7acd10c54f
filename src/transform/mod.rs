//! Image transformation: stitching the master and cutting the pyramid.

mod composite;
mod layout;
mod pyramid;

pub use composite::{build_master, compose, MasterComposite};
pub use layout::{
    tile_file_name, Geometry, SourceTile, ZoomLevel, MASTER_SIZE, MAX_ZOOM, SOURCE_TILES, TILE_SIZE,
};
pub use pyramid::{generate_pyramid, LevelSummary, PyramidSummary};
