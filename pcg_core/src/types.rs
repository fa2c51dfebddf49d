//! Plain data types shared across the codec: voxels, the bounded grid
//! geometry and the per-cell precision descriptor.

/// Number of bits used to encode one scalar component, in `[0, 16]`.
/// Zero means the component is omitted for the cell and reconstructs to the
/// midpoint of its range.
pub type BitCount = u8;

/// Highest supported per-component bit depth.
pub const MAX_BIT_DEPTH: BitCount = 16;

/// An uncompressed point: position in world coordinates plus an 8-bit RGB
/// color.
#[derive(Debug, Clone, Copy, PartialEq, Default)]
pub struct Voxel {
    pub position: [f32; 3],
    pub color: [u8; 3],
}

impl Voxel {
    pub fn new(position: [f32; 3], color: [u8; 3]) -> Self {
        Self { position, color }
    }
}

/// Axis-aligned bounding box; `min[i] <= max[i]` per axis.
#[derive(Debug, Clone, Copy, PartialEq, Default)]
pub struct BoundingBox {
    pub min: [f32; 3],
    pub max: [f32; 3],
}

impl BoundingBox {
    pub fn new(min: [f32; 3], max: [f32; 3]) -> Self {
        Self { min, max }
    }

    /// Edge length of one grid cell per axis.
    pub fn cell_extent(&self, dims: GridDimensions) -> [f32; 3] {
        [
            (self.max[0] - self.min[0]) / dims.x as f32,
            (self.max[1] - self.min[1]) / dims.y as f32,
            (self.max[2] - self.min[2]) / dims.z as f32,
        ]
    }
}

/// Cell counts along each axis, each at least 1 and at most 255.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct GridDimensions {
    pub x: u8,
    pub y: u8,
    pub z: u8,
}

impl Default for GridDimensions {
    /// A single-cell grid.
    fn default() -> Self {
        Self { x: 1, y: 1, z: 1 }
    }
}

impl GridDimensions {
    pub fn new(x: u8, y: u8, z: u8) -> Self {
        Self { x, y, z }
    }

    /// Total number of cells in the grid.
    pub fn cell_count(&self) -> usize {
        self.x as usize * self.y as usize * self.z as usize
    }

    /// Linear index of the cell at `(cx, cy, cz)`:
    /// `cx + dx * (cy + dy * cz)`.
    pub fn linear_index(&self, cx: u32, cy: u32, cz: u32) -> usize {
        cx as usize + self.x as usize * (cy as usize + self.y as usize * cz as usize)
    }

    /// Inverse of [`linear_index`](Self::linear_index).
    pub fn cell_vector(&self, index: usize) -> [u32; 3] {
        let dx = self.x as usize;
        let dy = self.y as usize;
        [
            (index % dx) as u32,
            ((index / dx) % dy) as u32,
            (index / (dx * dy)) as u32,
        ]
    }
}

/// Per-cell bit widths: three for the position components, three for the
/// color channels.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub struct CellPrecision {
    pub point_bits: [BitCount; 3],
    pub color_bits: [BitCount; 3],
}

impl CellPrecision {
    pub fn new(point_bits: [BitCount; 3], color_bits: [BitCount; 3]) -> Self {
        Self {
            point_bits,
            color_bits,
        }
    }
}

/// The full precision descriptor: bounding box, grid dimensions and one
/// [`CellPrecision`] record per cell in linear-index order.
#[derive(Debug, Clone)]
pub struct GridPrecision {
    pub bounding_box: BoundingBox,
    pub dimensions: GridDimensions,
    pub cells: Vec<CellPrecision>,
}

impl Default for GridPrecision {
    /// Single-cell descriptor with zero precision everywhere. Enough to
    /// construct a decode-only codec; useless for encoding real data.
    fn default() -> Self {
        Self::uniform(BoundingBox::default(), GridDimensions::default(), 0, 0)
    }
}

impl GridPrecision {
    /// Descriptor giving every cell the same position and color bit widths.
    pub fn uniform(
        bounding_box: BoundingBox,
        dimensions: GridDimensions,
        point_bits: BitCount,
        color_bits: BitCount,
    ) -> Self {
        let precision = CellPrecision::new([point_bits; 3], [color_bits; 3]);
        Self {
            bounding_box,
            dimensions,
            cells: vec![precision; dimensions.cell_count()],
        }
    }

    /// Reconstruction resolution of `cell_idx` per axis:
    /// `(cell extent) / 2^bits`. `None` for an out-of-range index.
    pub fn quantization_step(&self, cell_idx: usize) -> Option<[f32; 3]> {
        let Some(precision) = self.cells.get(cell_idx) else {
            log::warn!(
                "quantization_step: cell index {cell_idx} outside [0, {})",
                self.cells.len()
            );
            return None;
        };
        let extent = self.bounding_box.cell_extent(self.dimensions);
        let mut step = [0.0f32; 3];
        for axis in 0..3 {
            let bits = precision.point_bits[axis].min(MAX_BIT_DEPTH);
            step[axis] = extent[axis] / (1u32 << bits) as f32;
        }
        Some(step)
    }
}
