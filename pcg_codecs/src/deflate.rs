use std::io::{Read, Write};

use flate2::read::ZlibDecoder;
use flate2::write::ZlibEncoder;
use flate2::Compression;
use pcg_core::codec::EntropyCodec;

/// zlib/deflate entropy codec — the default.
///
/// Works well on the encoded grid body: cell headers repeat and bit-packed
/// payloads of smooth clouds carry plenty of byte-level redundancy.
pub struct DeflateCodec {
    /// Compression level (0 = none, 1 = fast, 9 = best).
    pub level: u32,
}

impl Default for DeflateCodec {
    fn default() -> Self {
        Self { level: 6 }
    }
}

impl DeflateCodec {
    pub fn new(level: u32) -> Self {
        Self { level }
    }
}

impl EntropyCodec for DeflateCodec {
    fn name(&self) -> &'static str {
        "deflate"
    }

    fn compress(&self, raw: &[u8]) -> anyhow::Result<Vec<u8>> {
        let mut encoder = ZlibEncoder::new(Vec::new(), Compression::new(self.level));
        encoder.write_all(raw)?;
        Ok(encoder.finish()?)
    }

    fn decompress(&self, compressed: &[u8], raw_len: usize) -> anyhow::Result<Vec<u8>> {
        let mut decoder = ZlibDecoder::new(compressed);
        let mut raw = Vec::with_capacity(raw_len);
        decoder.read_to_end(&mut raw)?;
        Ok(raw)
    }
}
