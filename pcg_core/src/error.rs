use thiserror::Error;

/// Errors surfaced by the message codec and its bit layer.
///
/// `decode` maps every malformed input to one of these instead of panicking;
/// `encode` can only fail through the entropy stage or a bad precision
/// descriptor.
#[derive(Debug, Error)]
pub enum CodecError {
    /// A bit-level read or write would run past the end of the buffer.
    #[error("bit cursor out of bounds: {want_bits} bits at bit offset {at_bit} in a {len_bytes}-byte buffer")]
    OutOfBounds {
        at_bit: usize,
        want_bits: usize,
        len_bytes: usize,
    },

    /// The message ends before a region its headers promise.
    #[error("message truncated: need {need} bytes, have {have}")]
    Truncated { need: usize, have: usize },

    /// A grid dimension of zero cells.
    #[error("grid header declares a zero dimension")]
    ZeroDimensions,

    /// A blacklist entry names a cell outside the grid.
    #[error("blacklist entry {index} out of range (grid has {cells} cells)")]
    BlacklistOutOfRange { index: u32, cells: u32 },

    /// Blacklist entries must be strictly ascending.
    #[error("blacklist is not sorted ascending")]
    BlacklistUnsorted,

    /// A per-component bit depth above the supported maximum.
    #[error("bit depth {got} exceeds the 16-bit maximum")]
    BitDepthTooLarge { got: u8 },

    /// The cell payloads did not consume exactly the decompressed region.
    #[error("payload size mismatch: cells end at byte {consumed}, region is {region} bytes")]
    PayloadSizeMismatch { consumed: usize, region: usize },

    /// Entropy decompression produced a different size than the header records.
    #[error("entropy stage produced {got} bytes, header records {expected}")]
    UncompressedSizeMismatch { expected: usize, got: usize },

    /// The external entropy compressor or decompressor reported failure.
    #[error("entropy stage failed: {0}")]
    Entropy(anyhow::Error),

    /// Entropy coding requested but no codec was attached.
    #[error("entropy coding enabled but no entropy codec attached")]
    MissingEntropyCodec,

    /// The precision descriptor does not cover every cell of the grid.
    #[error("precision descriptor has {got} cell records, grid has {expected} cells")]
    PrecisionMismatch { expected: usize, got: usize },

    /// An appendix write larger than the reserved region.
    #[error("appendix write of {requested} bytes exceeds the reserved {reserved} bytes")]
    AppendixOverflow { requested: u64, reserved: u64 },
}
