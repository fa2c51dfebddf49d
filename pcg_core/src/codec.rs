/// General-purpose entropy compressor applied over the encoded grid region.
///
/// The message body (grid header, blacklist, cell headers and payloads) is
/// compressed as one contiguous region; the global header records only
/// whether the stage ran and the pre-compression size. The codec identity is
/// not on the wire, so encoder and decoder must agree on the implementation
/// out of band.
pub trait EntropyCodec: Send + Sync {
    /// Human-readable codec name for CLI display.
    fn name(&self) -> &'static str;

    /// Compress the whole region.
    fn compress(&self, raw: &[u8]) -> anyhow::Result<Vec<u8>>;

    /// Decompress back to exactly `raw_len` bytes. `raw_len` comes from the
    /// global header and may be used to pre-size the output; implementations
    /// are free to ignore it.
    fn decompress(&self, compressed: &[u8], raw_len: usize) -> anyhow::Result<Vec<u8>>;
}
