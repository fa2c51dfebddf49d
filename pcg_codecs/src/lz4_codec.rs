use lz4_flex::{compress_prepend_size, decompress_size_prepended};
use pcg_core::codec::EntropyCodec;

/// LZ4 entropy codec.
///
/// Fastest of the bundled codecs at a lower ratio. Best when the link is
/// fast and per-frame latency matters more than size.
pub struct Lz4Codec;

impl EntropyCodec for Lz4Codec {
    fn name(&self) -> &'static str {
        "lz4"
    }

    fn compress(&self, raw: &[u8]) -> anyhow::Result<Vec<u8>> {
        Ok(compress_prepend_size(raw))
    }

    fn decompress(&self, compressed: &[u8], _raw_len: usize) -> anyhow::Result<Vec<u8>> {
        decompress_size_prepended(compressed)
            .map_err(|e| anyhow::anyhow!("lz4 decompress error: {e}"))
    }
}
