use log::debug;

/// A rectangular window of the canonical grid, in grid cells.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct TileBounds {
    pub x_min: usize,
    pub y_min: usize,
    pub x_max: usize,
    pub y_max: usize,
}

impl TileBounds {
    /// A single tile spanning a whole `width` x `height` grid.
    pub fn full(width: usize, height: usize) -> Self {
        Self {
            x_min: 0,
            y_min: 0,
            x_max: width,
            y_max: height,
        }
    }

    pub fn width(&self) -> usize {
        self.x_max - self.x_min
    }

    pub fn height(&self) -> usize {
        self.y_max - self.y_min
    }

    pub fn shape(&self) -> (usize, usize) {
        (self.height(), self.width())
    }
}

pub struct TileGrid {
    grid_width: usize,
    grid_height: usize,
    tile_size: usize,
    pub num_tiles_x: usize,
    pub num_tiles_y: usize,
    pub total_tiles: usize,
}

impl TileGrid {
    pub fn new(grid_width: usize, grid_height: usize, tile_size: usize) -> Self {
        let tile_size = tile_size.max(1);
        let num_tiles_x = (grid_width + tile_size - 1) / tile_size;
        let num_tiles_y = (grid_height + tile_size - 1) / tile_size;
        let total_tiles = num_tiles_x * num_tiles_y;

        debug!(
            "TileGrid: {}x{} grid, tile_size={} → {}x{} tiles ({} total)",
            grid_width, grid_height, tile_size, num_tiles_x, num_tiles_y, total_tiles
        );

        Self {
            grid_width,
            grid_height,
            tile_size,
            num_tiles_x,
            num_tiles_y,
            total_tiles,
        }
    }

    pub fn iter(&self) -> TileIterator<'_> {
        TileIterator::new(self)
    }

    pub fn tile_bounds(&self, tile_idx: usize) -> TileBounds {
        // Row-major tile order
        let tile_y = tile_idx / self.num_tiles_x;
        let tile_x = tile_idx % self.num_tiles_x;

        TileBounds {
            x_min: tile_x * self.tile_size,
            y_min: tile_y * self.tile_size,
            x_max: ((tile_x + 1) * self.tile_size).min(self.grid_width),
            y_max: ((tile_y + 1) * self.tile_size).min(self.grid_height),
        }
    }
}

pub struct TileIterator<'a> {
    grid: &'a TileGrid,
    current_idx: usize,
}

impl<'a> TileIterator<'a> {
    fn new(grid: &'a TileGrid) -> Self {
        Self {
            grid,
            current_idx: 0,
        }
    }
}

impl<'a> Iterator for TileIterator<'a> {
    type Item = (usize, TileBounds);

    fn next(&mut self) -> Option<Self::Item> {
        if self.current_idx < self.grid.total_tiles {
            let bounds = self.grid.tile_bounds(self.current_idx);
            let idx = self.current_idx;
            self.current_idx += 1;
            Some((idx, bounds))
        } else {
            None
        }
    }
}
