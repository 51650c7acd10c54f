//! Fixed geometry of the master canvas and the tile pyramid.

/// Edge length of the stitched master image in pixels.
pub const MASTER_SIZE: u32 = 9216;

/// Edge length of a pyramid tile in pixels.
pub const TILE_SIZE: u32 = 256;

/// Highest zoom level produced (level 0 is a single tile).
pub const MAX_ZOOM: u32 = 5;

/// One of the six required captures and where it lands on the master canvas.
///
/// Names are base64 of `minimap_sea_<row>_<col>.png`.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct SourceTile {
    /// Required filename inside the item directory
    pub name: &'static str,

    /// Left edge on the canvas
    pub x: i64,

    /// Top edge on the canvas
    pub y: i64,
}

/// The six captures in drawing order. The third row sits at y=6142, two pixels
/// above the 3072 grid; kept as uploaded material has always been stitched.
pub const SOURCE_TILES: [SourceTile; 6] = [
    SourceTile { name: "bWluaW1hcF9zZWFfMF8wLnBuZw==", x: 1536, y: 0 },
    SourceTile { name: "bWluaW1hcF9zZWFfMF8xLnBuZw==", x: 4608, y: 0 },
    SourceTile { name: "bWluaW1hcF9zZWFfMV8wLnBuZw==", x: 1536, y: 3072 },
    SourceTile { name: "bWluaW1hcF9zZWFfMV8xLnBuZw==", x: 4608, y: 3072 },
    SourceTile { name: "bWluaW1hcF9zZWFfMl8wLnBuZw==", x: 1536, y: 6142 },
    SourceTile { name: "bWluaW1hcF9zZWFfMl8xLnBuZw==", x: 4608, y: 6142 },
];

/// One resolution tier of the pyramid.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct ZoomLevel {
    /// Zoom index, 0 is coarsest
    pub zoom: u32,

    /// Tiles per axis (`2^zoom`)
    pub divisions: u32,

    /// Edge of the full rendition this level is cut from
    pub full_size: u32,

    /// Edge of each tile
    pub tile_size: u32,
}

impl ZoomLevel {
    /// Number of tiles at this level.
    pub fn num_tiles(&self) -> usize {
        (self.divisions as usize) * (self.divisions as usize)
    }

    /// Enumerate `(column, row)` for every tile, row-major.
    pub fn tiles(&self) -> impl Iterator<Item = (u32, u32)> + '_ {
        (0..self.divisions).flat_map(move |row| (0..self.divisions).map(move |col| (col, row)))
    }

    /// Pixel offset of a tile inside the full rendition.
    pub fn tile_origin(&self, col: u32, row: u32) -> (u32, u32) {
        (col * self.tile_size, row * self.tile_size)
    }

    /// File name of the transient full-resolution rendition.
    pub fn rendition_name(&self) -> String {
        format!("{0}x{0}.png", self.full_size)
    }
}

/// File name of the tile at `(col, row)`.
pub fn tile_file_name(col: u32, row: u32) -> String {
    format!("{col}_{row}.png")
}

/// Canvas and pyramid geometry used by one pipeline.
///
/// Production always uses [`Geometry::standard`]; the fields are open so the
/// same algorithm can be exercised at a smaller scale.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Geometry {
    /// Master canvas edge in pixels
    pub canvas_size: u32,

    /// Tile edge in pixels
    pub tile_size: u32,

    /// Highest zoom level
    pub max_zoom: u32,

    /// Source placements in drawing order
    pub sources: Vec<SourceTile>,
}

impl Default for Geometry {
    fn default() -> Self {
        Self::standard()
    }
}

impl Geometry {
    /// The 9216px canvas, 256px tiles and zoom 0..=5.
    pub fn standard() -> Self {
        Self {
            canvas_size: MASTER_SIZE,
            tile_size: TILE_SIZE,
            max_zoom: MAX_ZOOM,
            sources: SOURCE_TILES.to_vec(),
        }
    }

    /// Required filenames in drawing order.
    pub fn required_names(&self) -> impl Iterator<Item = &'static str> + '_ {
        self.sources.iter().map(|s| s.name)
    }

    /// File name of the stitched master image.
    pub fn master_name(&self) -> String {
        format!("{0}x{0}.png", self.canvas_size)
    }

    /// Describe zoom level `zoom`.
    pub fn level(&self, zoom: u32) -> ZoomLevel {
        let divisions = 1u32 << zoom;
        ZoomLevel {
            zoom,
            divisions,
            full_size: divisions * self.tile_size,
            tile_size: self.tile_size,
        }
    }

    /// Zoom levels in generation order, highest detail first.
    pub fn levels(&self) -> impl Iterator<Item = ZoomLevel> + '_ {
        (0..=self.max_zoom).rev().map(move |z| self.level(z))
    }

    /// Tiles produced per item across all levels.
    pub fn total_tiles(&self) -> usize {
        self.levels().map(|l| l.num_tiles()).sum()
    }
}
