//! Message assembly and parsing: the compression entry points.

use std::sync::Arc;
use std::time::{Duration, Instant};

use rayon::prelude::*;

use crate::bitstream::{BitReader, BitWriter};
use crate::codec::EntropyCodec;
use crate::error::CodecError;
use crate::format::{
    CellHeader, GlobalHeader, GridHeader, BLACKLIST_ENTRY_SIZE, CELL_HEADER_SIZE,
    GLOBAL_HEADER_SIZE, GRID_HEADER_SIZE,
};
use crate::grid::{GridCell, PointCloudGrid};
use crate::types::{GridPrecision, Voxel, MAX_BIT_DEPTH};

/// Configurable settings for the encoding process. Only ever changed by the
/// caller; the codec reads them.
#[derive(Debug, Clone)]
pub struct EncodingSettings {
    /// Bounding box, grid dimensions and per-cell bit widths.
    pub grid_precision: GridPrecision,
    /// Emit headers and totals through `log` at info level.
    pub verbose: bool,
    /// Worker threads for the per-cell encode. 0 picks the rayon default,
    /// 1 forces the strictly serial path. Advisory; output is bit-identical
    /// either way.
    pub num_threads: usize,
    /// Advisory flag for an external irrelevance pre-filter. The codec
    /// itself drops nothing beyond the bounding-box test; empty cells land
    /// on the blacklist either way.
    pub irrelevance_coding: bool,
    /// Run the message body through the attached entropy codec.
    pub entropy_coding: bool,
    /// Bytes reserved for user payload at the message tail.
    pub appendix_size: u64,
}

impl Default for EncodingSettings {
    fn default() -> Self {
        Self::new(GridPrecision::default())
    }
}

impl EncodingSettings {
    pub fn new(grid_precision: GridPrecision) -> Self {
        Self {
            grid_precision,
            verbose: false,
            num_threads: 0,
            irrelevance_coding: true,
            entropy_coding: true,
            appendix_size: 0,
        }
    }
}

/// Encoding stats, populated as a side effect of [`GridEncoder::encode`].
#[derive(Debug, Clone, Copy, Default)]
pub struct EncodeLog {
    /// Wall time of the whole encode call.
    pub comp_time: Duration,
    /// Grid build and serialization, excluding the entropy stage.
    pub encode_time: Duration,
    /// Time spent in the entropy compressor.
    pub entropy_time: Duration,
    /// Bytes of uncompressed voxel data considered.
    pub raw_bytes: usize,
    /// Final message size.
    pub comp_bytes: usize,
}

/// Decoding stats, populated as a side effect of [`GridEncoder::decode`].
#[derive(Debug, Clone, Copy, Default)]
pub struct DecodeLog {
    /// Wall time of the whole decode call.
    pub decomp_time: Duration,
    /// Header, blacklist and cell parsing, excluding the entropy stage.
    pub decode_time: Duration,
    /// Time spent in the entropy decompressor.
    pub entropy_time: Duration,
    pub global_header_bytes: usize,
    pub cell_header_bytes: usize,
    pub blacklist_bytes: usize,
}

/// Point cloud compression based on grid segmentation and adaptive
/// quantization of grid cells.
///
/// One instance owns its grid and stats scratch state; `encode` and `decode`
/// are blocking and exclusive (`&mut self`).
pub struct GridEncoder {
    pub settings: EncodingSettings,
    entropy: Option<Arc<dyn EntropyCodec>>,
    grid: Option<PointCloudGrid>,
    encode_log: EncodeLog,
    decode_log: DecodeLog,
}

impl GridEncoder {
    /// Encoder without an entropy codec. Encoding with
    /// `settings.entropy_coding` set, or decoding an entropy-coded message,
    /// requires one to be attached.
    pub fn new(settings: EncodingSettings) -> Self {
        Self {
            settings,
            entropy: None,
            grid: None,
            encode_log: EncodeLog::default(),
            decode_log: DecodeLog::default(),
        }
    }

    pub fn with_entropy_codec(settings: EncodingSettings, codec: Arc<dyn EntropyCodec>) -> Self {
        let mut encoder = Self::new(settings);
        encoder.entropy = Some(codec);
        encoder
    }

    pub fn set_entropy_codec(&mut self, codec: Arc<dyn EntropyCodec>) {
        self.entropy = Some(codec);
    }

    /// Read-only view of the grid left behind by the last `encode` or
    /// `decode`. `None` before the first call.
    pub fn grid(&self) -> Option<&PointCloudGrid> {
        self.grid.as_ref()
    }

    /// Stats of the most recent `encode`.
    pub fn encode_log(&self) -> EncodeLog {
        self.encode_log
    }

    /// Stats of the most recent `decode`.
    pub fn decode_log(&self) -> DecodeLog {
        self.decode_log
    }

    /// Compress `voxels` into a message. `num_points` limits encoding to the
    /// first `num_points` voxels; `None` encodes all. Voxels outside the
    /// bounding box are dropped silently.
    pub fn encode(
        &mut self,
        voxels: &[Voxel],
        num_points: Option<usize>,
    ) -> Result<Vec<u8>, CodecError> {
        let t_total = Instant::now();
        self.encode_log = EncodeLog::default();

        let precision = &self.settings.grid_precision;
        let n_cells = precision.dimensions.cell_count();
        if precision.cells.len() != n_cells {
            return Err(CodecError::PrecisionMismatch {
                expected: n_cells,
                got: precision.cells.len(),
            });
        }
        for cell in &precision.cells {
            for &bits in cell.point_bits.iter().chain(cell.color_bits.iter()) {
                if bits > MAX_BIT_DEPTH {
                    return Err(CodecError::BitDepthTooLarge { got: bits });
                }
            }
        }

        let considered = match num_points {
            Some(n) => &voxels[..n.min(voxels.len())],
            None => voxels,
        };
        self.encode_log.raw_bytes = considered.len() * std::mem::size_of::<Voxel>();

        let grid = PointCloudGrid::build(considered, precision);

        // One deterministic sweep fixes the blacklist, every cell header and
        // the exact body size before any byte is written.
        let blacklist = grid.blacklist();
        let non_empty: Vec<&GridCell> = grid.cells.iter().filter(|c| !c.is_empty()).collect();
        let cells_size: usize = non_empty
            .iter()
            .map(|cell| CELL_HEADER_SIZE + cell_header(cell).payload_bytes())
            .sum();
        let body_size =
            GRID_HEADER_SIZE + blacklist.len() * BLACKLIST_ENTRY_SIZE + cells_size;

        let grid_header = GridHeader {
            dimensions: grid.dimensions,
            bounding_box: grid.bounding_box,
            num_blacklist: blacklist.len() as u32,
        };
        log::debug!("encode: {grid_header}");

        let mut body = vec![0u8; body_size];
        body[..GRID_HEADER_SIZE].copy_from_slice(&grid_header.to_bytes());
        let mut offset = GRID_HEADER_SIZE;
        for index in &blacklist {
            body[offset..offset + BLACKLIST_ENTRY_SIZE].copy_from_slice(&index.to_le_bytes());
            offset += BLACKLIST_ENTRY_SIZE;
        }

        // Cells are encoded into per-cell buffers (possibly in parallel) and
        // concatenated in ascending index, so the wire bytes never depend on
        // scheduling.
        let chunks = self.encode_cells(&non_empty)?;
        for chunk in &chunks {
            body[offset..offset + chunk.len()].copy_from_slice(chunk);
            offset += chunk.len();
        }
        debug_assert_eq!(offset, body.len());
        self.encode_log.encode_time = t_total.elapsed();

        let (payload, uncompressed_size) = if self.settings.entropy_coding {
            let codec = self.entropy.as_ref().ok_or(CodecError::MissingEntropyCodec)?;
            let t_entropy = Instant::now();
            let compressed = codec.compress(&body).map_err(CodecError::Entropy)?;
            self.encode_log.entropy_time = t_entropy.elapsed();
            let raw_len = body.len() as u64;
            (compressed, raw_len)
        } else {
            (body, 0)
        };

        let global_header = GlobalHeader {
            entropy_coding: self.settings.entropy_coding,
            uncompressed_size,
            appendix_size: self.settings.appendix_size,
        };
        log::debug!("encode: {global_header}");

        let appendix = self.settings.appendix_size as usize;
        let mut message = vec![0u8; GLOBAL_HEADER_SIZE + payload.len() + appendix];
        message[..GLOBAL_HEADER_SIZE].copy_from_slice(&global_header.to_bytes());
        message[GLOBAL_HEADER_SIZE..GLOBAL_HEADER_SIZE + payload.len()].copy_from_slice(&payload);
        // The appendix region stays zero-filled for the caller to write.

        self.encode_log.comp_time = t_total.elapsed();
        self.encode_log.comp_bytes = message.len();
        if self.settings.verbose {
            log::info!(
                "encoded {} points into {} bytes ({} raw, {} blacklisted cells)",
                grid.num_points(),
                message.len(),
                self.encode_log.raw_bytes,
                blacklist.len()
            );
        }
        self.grid = Some(grid);
        Ok(message)
    }

    /// Decode a message produced by [`encode`](Self::encode). Any parse
    /// error, size mismatch, entropy failure or blacklist inconsistency
    /// yields `Err` and no voxels.
    pub fn decode(&mut self, msg: &[u8]) -> Result<Vec<Voxel>, CodecError> {
        let t_total = Instant::now();
        let mut log = DecodeLog::default();

        let global_header = GlobalHeader::read_from_message(msg)?;
        log.global_header_bytes = GLOBAL_HEADER_SIZE;
        log::debug!("decode: {global_header}");

        let appendix = global_header.appendix_size as usize;
        let region = &msg[GLOBAL_HEADER_SIZE..msg.len() - appendix];

        let decompressed;
        let body: &[u8] = if global_header.entropy_coding {
            let codec = self.entropy.as_ref().ok_or(CodecError::MissingEntropyCodec)?;
            let expected = global_header.uncompressed_size as usize;
            let t_entropy = Instant::now();
            decompressed = codec
                .decompress(region, expected)
                .map_err(CodecError::Entropy)?;
            log.entropy_time = t_entropy.elapsed();
            if decompressed.len() != expected {
                return Err(CodecError::UncompressedSizeMismatch {
                    expected,
                    got: decompressed.len(),
                });
            }
            &decompressed
        } else {
            region
        };

        let voxels = self.decode_body(body, &mut log)?;

        log.decode_time = t_total.elapsed() - log.entropy_time;
        log.decomp_time = t_total.elapsed();
        self.decode_log = log;
        if self.settings.verbose {
            log::info!("decoded {} points from {} bytes", voxels.len(), msg.len());
        }
        Ok(voxels)
    }

    /// Parse the (already decompressed) body region and extract the voxels.
    fn decode_body(
        &mut self,
        body: &[u8],
        log: &mut DecodeLog,
    ) -> Result<Vec<Voxel>, CodecError> {
        if body.len() < GRID_HEADER_SIZE {
            return Err(CodecError::Truncated {
                need: GRID_HEADER_SIZE,
                have: body.len(),
            });
        }
        let grid_header = GridHeader::from_bytes(&body[..GRID_HEADER_SIZE].try_into().unwrap())?;
        log::debug!("decode: {grid_header}");

        let n_cells = grid_header.dimensions.cell_count();
        let num_blacklist = grid_header.num_blacklist as usize;
        if num_blacklist > n_cells {
            return Err(CodecError::BlacklistOutOfRange {
                index: grid_header.num_blacklist,
                cells: n_cells as u32,
            });
        }

        let mut offset = GRID_HEADER_SIZE;
        let blacklist_bytes = num_blacklist * BLACKLIST_ENTRY_SIZE;
        if body.len() < offset + blacklist_bytes {
            return Err(CodecError::Truncated {
                need: offset + blacklist_bytes,
                have: body.len(),
            });
        }
        let mut blacklist = Vec::with_capacity(num_blacklist);
        for _ in 0..num_blacklist {
            let index = u32::from_le_bytes(body[offset..offset + 4].try_into().unwrap());
            if index as usize >= n_cells {
                return Err(CodecError::BlacklistOutOfRange {
                    index,
                    cells: n_cells as u32,
                });
            }
            if let Some(&previous) = blacklist.last() {
                if index <= previous {
                    return Err(CodecError::BlacklistUnsorted);
                }
            }
            blacklist.push(index);
            offset += BLACKLIST_ENTRY_SIZE;
        }
        log.blacklist_bytes = blacklist_bytes;

        let mut grid = PointCloudGrid::empty(grid_header.bounding_box, grid_header.dimensions);
        let mut blacklisted = blacklist.iter().peekable();
        for index in 0..n_cells {
            if blacklisted.peek().map(|&&i| i as usize) == Some(index) {
                blacklisted.next();
                continue;
            }
            if body.len() < offset + CELL_HEADER_SIZE {
                return Err(CodecError::Truncated {
                    need: offset + CELL_HEADER_SIZE,
                    have: body.len(),
                });
            }
            let header =
                CellHeader::from_bytes(&body[offset..offset + CELL_HEADER_SIZE].try_into().unwrap())?;
            offset += CELL_HEADER_SIZE;
            log.cell_header_bytes += CELL_HEADER_SIZE;

            let payload_bytes = header.payload_bytes();
            if body.len() < offset + payload_bytes {
                return Err(CodecError::Truncated {
                    need: offset + payload_bytes,
                    have: body.len(),
                });
            }
            grid.cells[index] = decode_cell(&header, &body[offset..offset + payload_bytes])?;
            offset += payload_bytes;
        }

        if offset != body.len() {
            return Err(CodecError::PayloadSizeMismatch {
                consumed: offset,
                region: body.len(),
            });
        }

        let voxels = grid.extract();
        self.grid = Some(grid);
        Ok(voxels)
    }

    /// Encode every non-empty cell into its own buffer, honoring the
    /// advisory thread count.
    fn encode_cells(&self, cells: &[&GridCell]) -> Result<Vec<Vec<u8>>, CodecError> {
        match self.settings.num_threads {
            1 => cells.iter().map(|cell| encode_cell(cell)).collect(),
            0 => cells.par_iter().map(|cell| encode_cell(cell)).collect(),
            n => match rayon::ThreadPoolBuilder::new().num_threads(n).build() {
                Ok(pool) => {
                    pool.install(|| cells.par_iter().map(|cell| encode_cell(cell)).collect())
                }
                Err(err) => {
                    log::warn!("falling back to serial cell encode: {err}");
                    cells.iter().map(|cell| encode_cell(cell)).collect()
                }
            },
        }
    }
}

fn cell_header(cell: &GridCell) -> CellHeader {
    CellHeader {
        point_bits: cell.point_bits,
        color_bits: cell.color_bits,
        num_elements: cell.len() as u32,
    }
}

/// Serialize one cell as header bytes followed by the bit-packed payload,
/// padded to a whole byte.
fn encode_cell(cell: &GridCell) -> Result<Vec<u8>, CodecError> {
    let header = cell_header(cell);
    let mut buf = vec![0u8; CELL_HEADER_SIZE + header.payload_bytes()];
    buf[..CELL_HEADER_SIZE].copy_from_slice(&header.to_bytes());

    let mut writer = BitWriter::new(&mut buf[CELL_HEADER_SIZE..]);
    for (qpos, qcol) in cell.positions.iter().zip(&cell.colors) {
        for axis in 0..3 {
            writer.write_bits(qpos[axis] as u64, cell.point_bits[axis] as u32)?;
        }
        for axis in 0..3 {
            writer.write_bits(qcol[axis] as u64, cell.color_bits[axis] as u32)?;
        }
    }
    Ok(buf)
}

/// Strict inverse of [`encode_cell`]'s payload part.
fn decode_cell(header: &CellHeader, payload: &[u8]) -> Result<GridCell, CodecError> {
    // Capacity hint capped so a hostile header cannot force a huge
    // allocation up front.
    let capacity = (header.num_elements as usize).min(1 << 20);
    let mut cell = GridCell {
        point_bits: header.point_bits,
        color_bits: header.color_bits,
        positions: Vec::with_capacity(capacity),
        colors: Vec::with_capacity(capacity),
    };

    let mut reader = BitReader::new(payload);
    for _ in 0..header.num_elements {
        let mut qpos = [0u16; 3];
        let mut qcol = [0u16; 3];
        for axis in 0..3 {
            qpos[axis] = reader.read_bits(header.point_bits[axis] as u32)? as u16;
        }
        for axis in 0..3 {
            qcol[axis] = reader.read_bits(header.color_bits[axis] as u32)? as u16;
        }
        cell.positions.push(qpos);
        cell.colors.push(qcol);
    }
    Ok(cell)
}
