pub mod appendix;
pub mod bitstream;
pub mod codec;
pub mod encoder;
pub mod error;
pub mod format;
pub mod grid;
pub mod quantize;
pub mod types;

pub use appendix::{
    read_from_appendix, read_str_from_appendix, write_str_to_appendix, write_to_appendix,
};
pub use bitstream::{BitReader, BitWriter};
pub use codec::EntropyCodec;
pub use encoder::{DecodeLog, EncodeLog, EncodingSettings, GridEncoder};
pub use error::CodecError;
pub use format::{
    CellHeader, GlobalHeader, GridHeader, BLACKLIST_ENTRY_SIZE, CELL_HEADER_SIZE,
    GLOBAL_HEADER_SIZE, GRID_HEADER_SIZE,
};
pub use grid::{GridCell, PointCloudGrid};
pub use types::{
    BitCount, BoundingBox, CellPrecision, GridDimensions, GridPrecision, Voxel, MAX_BIT_DEPTH,
};
