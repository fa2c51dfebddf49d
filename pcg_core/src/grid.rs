//! Partitioning of a point cloud into the regular cell grid and the inverse
//! extraction of reconstructed voxels.

use crate::quantize::{dequantize, dequantize_color, quantize, quantize_color};
use crate::types::{BitCount, BoundingBox, CellPrecision, GridDimensions, GridPrecision, Voxel};

/// One axis-aligned sub-box of the grid: quantized positions and colors as
/// parallel arrays, plus the bit widths they were quantized with.
///
/// On encode the widths come from the precision descriptor; on decode from
/// the cell header.
#[derive(Debug, Clone, Default)]
pub struct GridCell {
    pub point_bits: [BitCount; 3],
    pub color_bits: [BitCount; 3],
    pub positions: Vec<[u16; 3]>,
    pub colors: Vec<[u16; 3]>,
}

impl GridCell {
    pub fn with_precision(precision: CellPrecision) -> Self {
        Self {
            point_bits: precision.point_bits,
            color_bits: precision.color_bits,
            positions: Vec::new(),
            colors: Vec::new(),
        }
    }

    pub fn len(&self) -> usize {
        self.positions.len()
    }

    pub fn is_empty(&self) -> bool {
        self.positions.is_empty()
    }
}

/// The ordered vector of cells plus the geometry that produced them. Built
/// fresh on each encode, repopulated from the wire on each decode.
#[derive(Debug, Clone)]
pub struct PointCloudGrid {
    pub bounding_box: BoundingBox,
    pub dimensions: GridDimensions,
    pub cells: Vec<GridCell>,
}

impl PointCloudGrid {
    /// Grid of all-empty cells with zero precision everywhere; the decode
    /// path fills in widths and contents per cell header.
    pub fn empty(bounding_box: BoundingBox, dimensions: GridDimensions) -> Self {
        Self {
            bounding_box,
            dimensions,
            cells: vec![GridCell::default(); dimensions.cell_count()],
        }
    }

    /// Partition `voxels` into cells and quantize each point against its
    /// cell-local coordinate system. Points outside the bounding box are
    /// dropped. Within a cell, point order is insertion order.
    pub fn build(voxels: &[Voxel], precision: &GridPrecision) -> Self {
        let bounding_box = precision.bounding_box;
        let dimensions = precision.dimensions;
        let extent = bounding_box.cell_extent(dimensions);
        let dims = [
            dimensions.x as f32,
            dimensions.y as f32,
            dimensions.z as f32,
        ];

        let mut cells: Vec<GridCell> = precision
            .cells
            .iter()
            .map(|&p| GridCell::with_precision(p))
            .collect();

        for voxel in voxels {
            let mut cell_vec = [0u32; 3];
            let mut inside = true;
            for axis in 0..3 {
                let t = (voxel.position[axis] - bounding_box.min[axis]) / extent[axis];
                // NaN (degenerate extent) and out-of-box both fail this test.
                if !(t >= 0.0 && t < dims[axis]) {
                    inside = false;
                    break;
                }
                cell_vec[axis] = t as u32;
            }
            if !inside {
                continue;
            }

            let index = dimensions.linear_index(cell_vec[0], cell_vec[1], cell_vec[2]);
            let cell = &mut cells[index];

            let mut qpos = [0u16; 3];
            let mut qcol = [0u16; 3];
            for axis in 0..3 {
                let origin = bounding_box.min[axis] + cell_vec[axis] as f32 * extent[axis];
                let local = voxel.position[axis] - origin;
                qpos[axis] = quantize(local, 0.0, extent[axis], cell.point_bits[axis]);
                qcol[axis] = quantize_color(voxel.color[axis], cell.color_bits[axis]);
            }
            cell.positions.push(qpos);
            cell.colors.push(qcol);
        }

        Self {
            bounding_box,
            dimensions,
            cells,
        }
    }

    /// Inverse of [`build`](Self::build): reconstruct absolute positions by
    /// adding each cell's origin to the dequantized cell-local coordinates.
    /// Zero-width components reconstruct to the cell-box midpoint (128 for
    /// colors).
    pub fn extract(&self) -> Vec<Voxel> {
        let extent = self.bounding_box.cell_extent(self.dimensions);
        let mut voxels = Vec::with_capacity(self.num_points());

        for (index, cell) in self.cells.iter().enumerate() {
            if cell.is_empty() {
                continue;
            }
            let cell_vec = self.dimensions.cell_vector(index);
            let mut origin = [0.0f32; 3];
            for axis in 0..3 {
                origin[axis] = self.bounding_box.min[axis] + cell_vec[axis] as f32 * extent[axis];
            }
            for (qpos, qcol) in cell.positions.iter().zip(&cell.colors) {
                let mut position = [0.0f32; 3];
                let mut color = [0u8; 3];
                for axis in 0..3 {
                    position[axis] = origin[axis]
                        + dequantize(qpos[axis], 0.0, extent[axis], cell.point_bits[axis]);
                    color[axis] = dequantize_color(qcol[axis], cell.color_bits[axis]);
                }
                voxels.push(Voxel::new(position, color));
            }
        }
        voxels
    }

    /// Total points across all cells.
    pub fn num_points(&self) -> usize {
        self.cells.iter().map(GridCell::len).sum()
    }

    /// Linear indices of all empty cells, ascending.
    pub fn blacklist(&self) -> Vec<u32> {
        self.cells
            .iter()
            .enumerate()
            .filter(|(_, cell)| cell.is_empty())
            .map(|(index, _)| index as u32)
            .collect()
    }
}
