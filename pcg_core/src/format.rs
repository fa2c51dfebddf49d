//! Wire layout of an encoded message.
//!
//! ```text
//! [GLOBAL HEADER: 17 bytes, always plaintext]
//! [GRID HEADER: 31 bytes ─────────────────────┐
//! [BLACKLIST: 4 bytes × num_blacklist]        │ entropy-compressed as one
//! [CELL HEADER + PAYLOAD] × (N - blacklisted) ┘ region when the flag is set
//! [APPENDIX: appendix_size bytes, always plaintext]
//! ```
//!
//! All multi-byte integers and floats are little-endian.

use std::fmt;

use crate::error::CodecError;
use crate::types::{BitCount, BoundingBox, GridDimensions, MAX_BIT_DEPTH};

/// Fixed size of the global header in bytes:
///   entropy_coding:u8 + uncompressed_size:u64 + appendix_size:u64 = 17
pub const GLOBAL_HEADER_SIZE: usize = 17;

/// Fixed size of the grid header in bytes:
///   dims:u8×3 + bounding box:f32×6 + num_blacklist:u32 = 3 + 24 + 4 = 31
pub const GRID_HEADER_SIZE: usize = 31;

/// Fixed size of one cell header in bytes:
///   six bit widths:u8×6 + num_elements:u32 = 10
pub const CELL_HEADER_SIZE: usize = 10;

/// Size of one blacklist entry (a `u32` cell index) in bytes.
pub const BLACKLIST_ENTRY_SIZE: usize = 4;

// ── Global header ──────────────────────────────────────────────────────────

/// First chunk of every message. Never entropy-compressed, so the decoder
/// can always locate the appendix and size the decompression buffer.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct GlobalHeader {
    /// Whether the region between this header and the appendix went through
    /// the entropy stage.
    pub entropy_coding: bool,
    /// Byte length of that region before compression; 0 when
    /// `entropy_coding` is false.
    pub uncompressed_size: u64,
    /// Bytes reserved for user payload at the message tail.
    pub appendix_size: u64,
}

impl GlobalHeader {
    pub fn to_bytes(&self) -> [u8; GLOBAL_HEADER_SIZE] {
        let mut buf = [0u8; GLOBAL_HEADER_SIZE];
        buf[0] = self.entropy_coding as u8;
        buf[1..9].copy_from_slice(&self.uncompressed_size.to_le_bytes());
        buf[9..17].copy_from_slice(&self.appendix_size.to_le_bytes());
        buf
    }

    pub fn from_bytes(buf: &[u8; GLOBAL_HEADER_SIZE]) -> Self {
        Self {
            entropy_coding: buf[0] != 0,
            uncompressed_size: u64::from_le_bytes(buf[1..9].try_into().unwrap()),
            appendix_size: u64::from_le_bytes(buf[9..17].try_into().unwrap()),
        }
    }

    /// Parse from the front of a full message, checking there is room for
    /// the header itself and the appendix it declares.
    pub fn read_from_message(msg: &[u8]) -> Result<Self, CodecError> {
        if msg.len() < GLOBAL_HEADER_SIZE {
            return Err(CodecError::Truncated {
                need: GLOBAL_HEADER_SIZE,
                have: msg.len(),
            });
        }
        let header = Self::from_bytes(&msg[..GLOBAL_HEADER_SIZE].try_into().unwrap());
        let need = GLOBAL_HEADER_SIZE + header.appendix_size as usize;
        if msg.len() < need {
            return Err(CodecError::Truncated {
                need,
                have: msg.len(),
            });
        }
        Ok(header)
    }
}

impl fmt::Display for GlobalHeader {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(
            f,
            "GlobalHeader(entropy_coding={}, uncompressed_size={}, appendix_size={})",
            self.entropy_coding, self.uncompressed_size, self.appendix_size
        )
    }
}

// ── Grid header ────────────────────────────────────────────────────────────

/// Grid geometry and blacklist count; first field of the (optionally
/// compressed) body region.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct GridHeader {
    pub dimensions: GridDimensions,
    pub bounding_box: BoundingBox,
    pub num_blacklist: u32,
}

impl GridHeader {
    pub fn to_bytes(&self) -> [u8; GRID_HEADER_SIZE] {
        let mut buf = [0u8; GRID_HEADER_SIZE];
        buf[0] = self.dimensions.x;
        buf[1] = self.dimensions.y;
        buf[2] = self.dimensions.z;
        for axis in 0..3 {
            let at = 3 + axis * 4;
            buf[at..at + 4].copy_from_slice(&self.bounding_box.min[axis].to_le_bytes());
        }
        for axis in 0..3 {
            let at = 15 + axis * 4;
            buf[at..at + 4].copy_from_slice(&self.bounding_box.max[axis].to_le_bytes());
        }
        buf[27..31].copy_from_slice(&self.num_blacklist.to_le_bytes());
        buf
    }

    pub fn from_bytes(buf: &[u8; GRID_HEADER_SIZE]) -> Result<Self, CodecError> {
        let dimensions = GridDimensions::new(buf[0], buf[1], buf[2]);
        if dimensions.x == 0 || dimensions.y == 0 || dimensions.z == 0 {
            return Err(CodecError::ZeroDimensions);
        }
        let mut min = [0.0f32; 3];
        let mut max = [0.0f32; 3];
        for axis in 0..3 {
            let at = 3 + axis * 4;
            min[axis] = f32::from_le_bytes(buf[at..at + 4].try_into().unwrap());
            let at = 15 + axis * 4;
            max[axis] = f32::from_le_bytes(buf[at..at + 4].try_into().unwrap());
        }
        Ok(Self {
            dimensions,
            bounding_box: BoundingBox::new(min, max),
            num_blacklist: u32::from_le_bytes(buf[27..31].try_into().unwrap()),
        })
    }
}

impl fmt::Display for GridHeader {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(
            f,
            "GridHeader(dim=[{},{},{}], bb={{[{},{},{}];[{},{},{}]}}, num_blacklist={})",
            self.dimensions.x,
            self.dimensions.y,
            self.dimensions.z,
            self.bounding_box.min[0],
            self.bounding_box.min[1],
            self.bounding_box.min[2],
            self.bounding_box.max[0],
            self.bounding_box.max[1],
            self.bounding_box.max[2],
            self.num_blacklist
        )
    }
}

// ── Cell header ────────────────────────────────────────────────────────────

/// Per-cell bit widths and element count. The cell index is not on the wire;
/// it is implied by the blacklist-adjusted position of the header.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct CellHeader {
    pub point_bits: [BitCount; 3],
    pub color_bits: [BitCount; 3],
    pub num_elements: u32,
}

impl CellHeader {
    pub fn to_bytes(&self) -> [u8; CELL_HEADER_SIZE] {
        let mut buf = [0u8; CELL_HEADER_SIZE];
        buf[..3].copy_from_slice(&self.point_bits);
        buf[3..6].copy_from_slice(&self.color_bits);
        buf[6..10].copy_from_slice(&self.num_elements.to_le_bytes());
        buf
    }

    pub fn from_bytes(buf: &[u8; CELL_HEADER_SIZE]) -> Result<Self, CodecError> {
        for &bits in &buf[..6] {
            if bits > MAX_BIT_DEPTH {
                return Err(CodecError::BitDepthTooLarge { got: bits });
            }
        }
        Ok(Self {
            point_bits: buf[..3].try_into().unwrap(),
            color_bits: buf[3..6].try_into().unwrap(),
            num_elements: u32::from_le_bytes(buf[6..10].try_into().unwrap()),
        })
    }

    /// Packed bits per point: the sum of all six component widths.
    pub fn bits_per_point(&self) -> usize {
        self.point_bits.iter().map(|&b| b as usize).sum::<usize>()
            + self.color_bits.iter().map(|&b| b as usize).sum::<usize>()
    }

    /// Whole bytes occupied by this cell's bit-packed payload.
    pub fn payload_bytes(&self) -> usize {
        (self.num_elements as usize * self.bits_per_point() + 7) / 8
    }
}

impl fmt::Display for CellHeader {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(
            f,
            "CellHeader(p_enc=[{},{},{}], c_enc=[{},{},{}], num_elements={})",
            self.point_bits[0],
            self.point_bits[1],
            self.point_bits[2],
            self.color_bits[0],
            self.color_bits[1],
            self.color_bits[2],
            self.num_elements
        )
    }
}
