mod deflate;
mod lz4_codec;
mod zstd_codec;

pub use deflate::DeflateCodec;
pub use lz4_codec::Lz4Codec;
pub use zstd_codec::ZstdCodec;

use std::sync::Arc;

use pcg_core::EntropyCodec;

/// Resolve an entropy codec from its CLI name.
///
/// The wire format records only whether entropy coding ran, not which codec
/// did it, so sender and receiver pass the same name on both ends.
pub fn codec_by_name(name: &str, level: i32) -> anyhow::Result<Arc<dyn EntropyCodec>> {
    match name {
        "deflate" | "zlib" | "d" => Ok(Arc::new(DeflateCodec::new(level.max(0) as u32))),
        "zstd" | "z" => Ok(Arc::new(ZstdCodec::new(level))),
        "lz4" | "l" => Ok(Arc::new(Lz4Codec)),
        other => anyhow::bail!(
            "unknown codec '{}'. Valid options: deflate, zstd, lz4",
            other
        ),
    }
}
