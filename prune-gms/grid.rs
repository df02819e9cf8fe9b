use crate::error::{GmsError, GmsResult};
use crate::types::NormPoint;

/// Boundary-offset variant for the left/query grid. A true match can straddle
/// a cell boundary and be missed under exactly one offset, so all four are
/// evaluated and OR-combined.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum GridOffset {
    Canonical,
    ShiftX,
    ShiftY,
    ShiftXy,
}

impl GridOffset {
    pub const ALL: [GridOffset; 4] = [
        GridOffset::Canonical,
        GridOffset::ShiftX,
        GridOffset::ShiftY,
        GridOffset::ShiftXy,
    ];

    /// Half-cell shift applied to (x, y) before truncation
    fn shifts(self) -> (f64, f64) {
        match self {
            GridOffset::Canonical => (0.0, 0.0),
            GridOffset::ShiftX => (0.5, 0.0),
            GridOffset::ShiftY => (0.0, 0.5),
            GridOffset::ShiftXy => (0.5, 0.5),
        }
    }
}

/// Regular partition of normalized [0,1)x[0,1) space with a precomputed 3x3
/// neighborhood table
#[derive(Debug, Clone)]
pub struct Grid {
    width: usize,
    height: usize,
    neighbors: Vec<[Option<usize>; 9]>,
}

impl Grid {
    /// Builds the grid and its neighbor table, validating the resolution
    pub fn new(width: usize, height: usize) -> GmsResult<Self> {
        if width == 0 || height == 0 {
            return Err(GmsError::InvalidGridSize { width, height });
        }

        let neighbors = (0..width * height)
            .map(|idx| Self::neighborhood_of(idx, width, height))
            .collect();

        Ok(Self {
            width,
            height,
            neighbors,
        })
    }

    /// Derives the right-grid resolution for one scale hypothesis. Returns
    /// `None` when truncation collapses either dimension to zero.
    pub fn scaled(&self, ratio: f64) -> Option<Self> {
        let width = (self.width as f64 * ratio) as usize;
        let height = (self.height as f64 * ratio) as usize;
        Self::new(width, height).ok()
    }

    pub fn width(&self) -> usize {
        self.width
    }

    pub fn height(&self) -> usize {
        self.height
    }

    pub fn cell_count(&self) -> usize {
        self.width * self.height
    }

    /// 3x3 neighborhoods in row-major slot order, `None` for slots outside
    /// the grid
    pub fn neighbors(&self) -> &[[Option<usize>; 9]] {
        &self.neighbors
    }

    /// Maps a normalized point to its cell under the given offset. `None`
    /// when the (shifted) point falls past the last row or column; there is
    /// no wraparound and no clamping.
    pub(crate) fn cell_index(&self, pt: NormPoint, offset: GridOffset) -> Option<usize> {
        let (sx, sy) = offset.shifts();
        let x = (pt.x as f64 * self.width as f64 + sx).floor();
        let y = (pt.y as f64 * self.height as f64 + sy).floor();

        if x < 0.0 || y < 0.0 || x >= self.width as f64 || y >= self.height as f64 {
            return None;
        }

        Some(x as usize + y as usize * self.width)
    }

    fn neighborhood_of(idx: usize, width: usize, height: usize) -> [Option<usize>; 9] {
        let cx = (idx % width) as isize;
        let cy = (idx / width) as isize;

        let mut slots = [None; 9];
        for dy in -1..=1isize {
            for dx in -1..=1isize {
                let nx = cx + dx;
                let ny = cy + dy;
                if nx < 0 || nx >= width as isize || ny < 0 || ny >= height as isize {
                    continue;
                }
                let slot = ((dy + 1) * 3 + (dx + 1)) as usize;
                slots[slot] = Some(nx as usize + ny as usize * width);
            }
        }
        slots
    }
}
