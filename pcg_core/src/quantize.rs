//! Scalar quantization with midpoint reconstruction.
//!
//! A value `v` in `[lo, hi]` maps to `floor((v - lo) / (hi - lo) * 2^n)`
//! clamped to the `n`-bit range, and reconstructs to the center of its
//! quantization bucket. Color channels always quantize against the fixed
//! `[0, 255]` range, independent of the grid's bounding box.

use crate::types::BitCount;

/// Quantize `v` from `[lo, hi]` to an unsigned `bits`-wide integer.
/// A zero bit width or a degenerate range yields 0.
pub fn quantize(v: f32, lo: f32, hi: f32, bits: BitCount) -> u16 {
    debug_assert!(bits <= crate::types::MAX_BIT_DEPTH);
    if bits == 0 || hi <= lo {
        return 0;
    }
    let levels = 1u32 << bits;
    let t = (v - lo) / (hi - lo);
    let q = (t * levels as f32).floor();
    if q < 0.0 {
        0
    } else if q >= levels as f32 {
        (levels - 1) as u16
    } else {
        q as u16
    }
}

/// Midpoint reconstruction: `lo + (q + 0.5) / 2^bits * (hi - lo)`.
/// With `bits == 0` (where `q` is always 0) this is the range midpoint.
pub fn dequantize(q: u16, lo: f32, hi: f32, bits: BitCount) -> f32 {
    debug_assert!(bits <= crate::types::MAX_BIT_DEPTH);
    let levels = 1u32 << bits;
    lo + (q as f32 + 0.5) / levels as f32 * (hi - lo)
}

/// Quantize an 8-bit color channel against `[0, 255]`.
pub fn quantize_color(c: u8, bits: BitCount) -> u16 {
    quantize(c as f32, 0.0, 255.0, bits)
}

/// Reconstruct an 8-bit color channel, rounding to the nearest level.
/// With `bits == 0` this yields 128.
pub fn dequantize_color(q: u16, bits: BitCount) -> u8 {
    let v = dequantize(q, 0.0, 255.0, bits).round();
    v.clamp(0.0, 255.0) as u8
}
