//! User payload region at the tail of every encoded message.
//!
//! The appendix sits at `message_len - appendix_size`, outside the
//! entropy-coded region, so its offset is stable whether or not the body is
//! compressed. It is zero-filled at encode time; callers write it afterwards
//! to ship arbitrary side data with the message.

use crate::error::CodecError;
use crate::format::GlobalHeader;

/// Copy `data` into the appendix region of `msg`. The message must have been
/// produced by the encoder; writes larger than the reserved region fail with
/// [`CodecError::AppendixOverflow`] and leave the message unchanged.
pub fn write_to_appendix(msg: &mut [u8], data: &[u8]) -> Result<(), CodecError> {
    let header = GlobalHeader::read_from_message(msg)?;
    if data.len() as u64 > header.appendix_size {
        return Err(CodecError::AppendixOverflow {
            requested: data.len() as u64,
            reserved: header.appendix_size,
        });
    }
    let start = msg.len() - header.appendix_size as usize;
    msg[start..start + data.len()].copy_from_slice(data);
    Ok(())
}

/// String form of [`write_to_appendix`].
pub fn write_str_to_appendix(msg: &mut [u8], text: &str) -> Result<(), CodecError> {
    write_to_appendix(msg, text.as_bytes())
}

/// Return a caller-owned copy of the full appendix region.
pub fn read_from_appendix(msg: &[u8]) -> Result<Vec<u8>, CodecError> {
    let header = GlobalHeader::read_from_message(msg)?;
    let start = msg.len() - header.appendix_size as usize;
    Ok(msg[start..].to_vec())
}

/// Appendix contents up to the first NUL, as text. The region is zero-filled
/// at encode time, so this recovers exactly what
/// [`write_str_to_appendix`] stored.
pub fn read_str_from_appendix(msg: &[u8]) -> Result<String, CodecError> {
    let bytes = read_from_appendix(msg)?;
    let end = bytes.iter().position(|&b| b == 0).unwrap_or(bytes.len());
    Ok(String::from_utf8_lossy(&bytes[..end]).into_owned())
}
