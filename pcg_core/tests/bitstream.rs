use pcg_core::{BitReader, BitWriter, CodecError};

#[test]
fn roundtrip_mixed_widths() {
    let fields: &[(u64, u32)] = &[
        (1, 1),
        (0b101, 3),
        (0xFF, 8),
        (0x1234, 16),
        (0, 5),
        (0x7F, 7),
        (0xDEADBEEF, 32),
        (u64::MAX, 64),
        (1, 2),
    ];
    let total_bits: u32 = fields.iter().map(|&(_, n)| n).sum();
    let mut buf = vec![0u8; (total_bits as usize + 7) / 8];

    let mut writer = BitWriter::new(&mut buf);
    for &(value, n) in fields {
        writer.write_bits(value, n).unwrap();
    }
    assert_eq!(writer.tell_bits(), total_bits as usize);

    let mut reader = BitReader::new(&buf);
    for &(value, n) in fields {
        assert_eq!(reader.read_bits(n).unwrap(), value, "field of {n} bits");
    }
}

#[test]
fn lsb_first_within_byte() {
    // bit 0 of the value goes to the lowest unwritten bit of the byte
    let mut buf = [0u8; 1];
    let mut writer = BitWriter::new(&mut buf);
    writer.write_bits(1, 1).unwrap();
    writer.write_bits(0x55, 7).unwrap();
    assert_eq!(buf[0], 0x55 << 1 | 1);
}

#[test]
fn values_cross_byte_boundaries() {
    let mut buf = [0u8; 3];
    let mut writer = BitWriter::new(&mut buf);
    writer.write_bits(0x3F, 6).unwrap();
    writer.write_bits(0x3FF, 10).unwrap(); // straddles bytes 0..2
    writer.write_bits(0xFF, 8).unwrap();
    assert_eq!(writer.tell_bits(), 24);
    assert_eq!(buf, [0xFF, 0xFF, 0xFF]);

    let mut reader = BitReader::new(&buf);
    assert_eq!(reader.read_bits(6).unwrap(), 0x3F);
    assert_eq!(reader.read_bits(10).unwrap(), 0x3FF);
    assert_eq!(reader.read_bits(8).unwrap(), 0xFF);
}

#[test]
fn zero_width_writes_are_noops() {
    let mut buf = [0u8; 1];
    let mut writer = BitWriter::new(&mut buf);
    writer.write_bits(0, 0).unwrap();
    assert_eq!(writer.tell_bits(), 0);

    let mut reader = BitReader::new(&buf);
    assert_eq!(reader.read_bits(0).unwrap(), 0);
    assert_eq!(reader.tell_bits(), 0);
}

#[test]
fn write_past_end_fails() {
    let mut buf = [0u8; 1];
    let mut writer = BitWriter::new(&mut buf);
    writer.write_bits(0x7F, 7).unwrap();
    let err = writer.write_bits(0b11, 2).unwrap_err();
    assert!(matches!(err, CodecError::OutOfBounds { .. }), "got {err}");
    // the failed write must not advance the cursor
    assert_eq!(writer.tell_bits(), 7);
    writer.write_bits(1, 1).unwrap();
}

#[test]
fn read_past_end_fails() {
    let buf = [0u8; 2];
    let mut reader = BitReader::new(&buf);
    reader.read_bits(15).unwrap();
    let err = reader.read_bits(2).unwrap_err();
    assert!(matches!(err, CodecError::OutOfBounds { .. }), "got {err}");
}

#[test]
fn seek_align_and_tell() {
    let mut buf = [0u8; 4];
    let mut writer = BitWriter::new(&mut buf);
    writer.write_bits(0b101, 3).unwrap();
    assert_eq!(writer.tell_bytes(), 1); // rounded up
    writer.align_to_byte();
    assert_eq!(writer.tell_bits(), 8);
    writer.seek_to_byte(2).unwrap();
    writer.write_bits(0xAB, 8).unwrap();
    assert_eq!(buf[2], 0xAB);

    let mut reader = BitReader::new(&buf);
    reader.seek_to_byte(2).unwrap();
    assert_eq!(reader.read_bits(8).unwrap(), 0xAB);
    assert!(reader.seek_to_byte(5).is_err());
}
