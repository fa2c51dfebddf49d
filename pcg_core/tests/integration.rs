//! End-to-end coverage of the message codec: wire layout, round-trip loss
//! bounds, blacklist behavior, entropy stages, appendix handling and
//! rejection of malformed messages.

use std::sync::Arc;

use pcg_codecs::{DeflateCodec, Lz4Codec, ZstdCodec};
use pcg_core::{
    read_from_appendix, read_str_from_appendix, write_str_to_appendix, write_to_appendix,
    BoundingBox, CodecError, EncodingSettings, EntropyCodec, GlobalHeader, GridDimensions,
    GridEncoder, GridPrecision, Voxel, CELL_HEADER_SIZE, GLOBAL_HEADER_SIZE, GRID_HEADER_SIZE,
};

// ── helpers ────────────────────────────────────────────────────────────────

fn unit_box() -> BoundingBox {
    BoundingBox::new([0.0; 3], [1.0; 3])
}

/// Settings with the entropy stage off and a deterministic single thread.
fn plain_settings(
    bbox: BoundingBox,
    dims: GridDimensions,
    pos_bits: u8,
    color_bits: u8,
) -> EncodingSettings {
    let mut settings =
        EncodingSettings::new(GridPrecision::uniform(bbox, dims, pos_bits, color_bits));
    settings.entropy_coding = false;
    settings.num_threads = 1;
    settings
}

/// Deterministic cloud in the unit box using a simple LCG.
fn pseudo_random_cloud(n: usize, seed: u64) -> Vec<Voxel> {
    let mut rng = seed;
    let mut next = || {
        rng = rng
            .wrapping_mul(6364136223846793005)
            .wrapping_add(1442695040888963407);
        (rng >> 40) as f32 / (1u64 << 24) as f32
    };
    (0..n)
        .map(|_| {
            let position = [next(), next(), next()];
            let color = [
                (next() * 255.0) as u8,
                (next() * 255.0) as u8,
                (next() * 255.0) as u8,
            ];
            Voxel::new(position, color)
        })
        .collect()
}

/// Mirror of the encoder's cell assignment, for pairing decoded points with
/// their originals (cross-cell input order is not preserved).
fn cell_index(v: &Voxel, bbox: BoundingBox, dims: GridDimensions) -> Option<usize> {
    let extent = bbox.cell_extent(dims);
    let d = [dims.x as f32, dims.y as f32, dims.z as f32];
    let mut cell = [0u32; 3];
    for axis in 0..3 {
        let t = (v.position[axis] - bbox.min[axis]) / extent[axis];
        if !(t >= 0.0 && t < d[axis]) {
            return None;
        }
        cell[axis] = t as u32;
    }
    Some(dims.linear_index(cell[0], cell[1], cell[2]))
}

/// Reorder `cloud` the way the codec emits it: ascending cell index,
/// insertion order within a cell. Out-of-box points are dropped.
fn in_wire_order(cloud: &[Voxel], bbox: BoundingBox, dims: GridDimensions) -> Vec<Voxel> {
    let mut per_cell: Vec<Vec<Voxel>> = vec![Vec::new(); dims.cell_count()];
    for v in cloud {
        if let Some(index) = cell_index(v, bbox, dims) {
            per_cell[index].push(*v);
        }
    }
    per_cell.concat()
}

// ── wire layout scenarios ──────────────────────────────────────────────────

#[test]
fn single_voxel_message_layout() {
    let cloud = vec![Voxel::new([0.5, 0.5, 0.5], [10, 99, 200])];
    let mut encoder =
        GridEncoder::new(plain_settings(unit_box(), GridDimensions::new(1, 1, 1), 8, 8));
    let message = encoder.encode(&cloud, None).unwrap();

    // global + grid header + no blacklist + one cell header + 48 bits packed
    assert_eq!(
        message.len(),
        GLOBAL_HEADER_SIZE + GRID_HEADER_SIZE + CELL_HEADER_SIZE + 6
    );

    let decoded = encoder.decode(&message).unwrap();
    assert_eq!(decoded.len(), 1);
    for axis in 0..3 {
        let err = (decoded[0].position[axis] - 0.5).abs();
        assert!(err <= 1.0 / 256.0, "axis {axis} error {err}");
    }
    for channel in 0..3 {
        let err = (decoded[0].color[channel] as i32 - cloud[0].color[channel] as i32).abs();
        assert!(err <= 1, "channel {channel} error {err}");
    }
}

#[test]
fn shared_cell_and_blacklist_layout() {
    let cloud = vec![
        Voxel::new([0.1, 0.1, 0.1], [1, 2, 3]),
        Voxel::new([0.2, 0.2, 0.2], [4, 5, 6]),
    ];
    let dims = GridDimensions::new(2, 2, 2);
    let mut encoder = GridEncoder::new(plain_settings(unit_box(), dims, 8, 8));
    let message = encoder.encode(&cloud, None).unwrap();

    // both points land in cell 0; the other 7 cells are blacklisted
    assert_eq!(
        message.len(),
        GLOBAL_HEADER_SIZE + GRID_HEADER_SIZE + 7 * 4 + CELL_HEADER_SIZE + 12
    );

    // num_blacklist in the grid header
    let at = GLOBAL_HEADER_SIZE + 27;
    assert_eq!(
        u32::from_le_bytes(message[at..at + 4].try_into().unwrap()),
        7
    );
    // num_elements in the single cell header
    let at = GLOBAL_HEADER_SIZE + GRID_HEADER_SIZE + 7 * 4 + 6;
    assert_eq!(
        u32::from_le_bytes(message[at..at + 4].try_into().unwrap()),
        2
    );

    let decoded = encoder.decode(&message).unwrap();
    assert_eq!(decoded.len(), 2);
}

#[test]
fn empty_input_blacklists_every_cell() {
    let dims = GridDimensions::new(4, 4, 4);
    let mut encoder = GridEncoder::new(plain_settings(unit_box(), dims, 8, 8));
    let message = encoder.encode(&[], None).unwrap();

    assert_eq!(message.len(), GLOBAL_HEADER_SIZE + GRID_HEADER_SIZE + 64 * 4);

    let decoded = encoder.decode(&message).unwrap();
    assert!(decoded.is_empty());
    let grid = encoder.grid().unwrap();
    assert_eq!(grid.blacklist(), (0u32..64).collect::<Vec<_>>());
}

#[test]
fn zero_position_bits_reconstruct_cell_midpoint() {
    let cloud = vec![Voxel::new([0.3, 0.7, 0.2], [50, 100, 150])];
    let mut settings = EncodingSettings::new(GridPrecision::uniform(
        unit_box(),
        GridDimensions::new(1, 1, 1),
        0,
        8,
    ));
    settings.entropy_coding = false;
    let mut encoder = GridEncoder::new(settings);
    let message = encoder.encode(&cloud, None).unwrap();

    // payload is colors only: 24 bits per point
    assert_eq!(
        message.len(),
        GLOBAL_HEADER_SIZE + GRID_HEADER_SIZE + CELL_HEADER_SIZE + 3
    );

    let decoded = encoder.decode(&message).unwrap();
    assert_eq!(decoded[0].position, [0.5, 0.5, 0.5]);
    for channel in 0..3 {
        let err = (decoded[0].color[channel] as i32 - cloud[0].color[channel] as i32).abs();
        assert!(err <= 1, "channel {channel} error {err}");
    }
}

#[test]
fn zero_color_bits_reconstruct_mid_gray() {
    let cloud = vec![Voxel::new([0.25, 0.25, 0.25], [7, 70, 250])];
    let mut settings = EncodingSettings::new(GridPrecision::uniform(
        unit_box(),
        GridDimensions::new(1, 1, 1),
        8,
        0,
    ));
    settings.entropy_coding = false;
    let mut encoder = GridEncoder::new(settings);
    let message = encoder.encode(&cloud, None).unwrap();
    let decoded = encoder.decode(&message).unwrap();
    assert_eq!(decoded[0].color, [128, 128, 128]);
}

// ── round-trip properties ──────────────────────────────────────────────────

#[test]
fn round_trip_respects_quantization_step() {
    let cloud = pseudo_random_cloud(2000, 0xDEAD_BEEF);
    let dims = GridDimensions::new(4, 4, 4);
    let precision = GridPrecision::uniform(unit_box(), dims, 10, 8);
    let step = precision.quantization_step(0).unwrap();

    let mut settings = EncodingSettings::new(precision);
    settings.entropy_coding = false;
    settings.num_threads = 1;
    let mut encoder = GridEncoder::new(settings);

    let message = encoder.encode(&cloud, None).unwrap();
    let decoded = encoder.decode(&message).unwrap();
    let expected = in_wire_order(&cloud, unit_box(), dims);
    assert_eq!(decoded.len(), expected.len());

    for (original, reconstructed) in expected.iter().zip(&decoded) {
        for axis in 0..3 {
            let err = (original.position[axis] - reconstructed.position[axis]).abs();
            assert!(
                err <= step[axis] + 1e-6,
                "axis {axis}: error {err} exceeds step {}",
                step[axis]
            );
        }
        for channel in 0..3 {
            let err =
                (original.color[channel] as i32 - reconstructed.color[channel] as i32).abs();
            assert!(err <= 1, "channel {channel} error {err}");
        }
    }
}

#[test]
fn out_of_box_points_are_dropped() {
    let mut cloud = pseudo_random_cloud(100, 42);
    cloud.push(Voxel::new([2.0, 0.5, 0.5], [0, 0, 0]));
    cloud.push(Voxel::new([-0.1, 0.5, 0.5], [0, 0, 0]));
    cloud.push(Voxel::new([0.5, 0.5, f32::NAN], [0, 0, 0]));

    let mut encoder =
        GridEncoder::new(plain_settings(unit_box(), GridDimensions::new(2, 2, 2), 8, 8));
    let message = encoder.encode(&cloud, None).unwrap();
    let decoded = encoder.decode(&message).unwrap();
    assert_eq!(decoded.len(), 100);
}

#[test]
fn num_points_limits_the_input() {
    let cloud = pseudo_random_cloud(50, 7);
    let mut encoder =
        GridEncoder::new(plain_settings(unit_box(), GridDimensions::new(2, 2, 2), 8, 8));
    let message = encoder.encode(&cloud, Some(10)).unwrap();
    let decoded = encoder.decode(&message).unwrap();
    assert_eq!(decoded.len(), 10);

    // a limit beyond the input length means "all"
    let message = encoder.encode(&cloud, Some(10_000)).unwrap();
    assert_eq!(encoder.decode(&message).unwrap().len(), 50);
}

#[test]
fn blacklist_marks_exactly_the_empty_cells() {
    let cloud = vec![
        Voxel::new([0.1, 0.1, 0.1], [1, 1, 1]),
        Voxel::new([0.9, 0.9, 0.9], [2, 2, 2]),
    ];
    let dims = GridDimensions::new(2, 2, 2);
    let mut encoder = GridEncoder::new(plain_settings(unit_box(), dims, 8, 8));
    let message = encoder.encode(&cloud, None).unwrap();
    encoder.decode(&message).unwrap();

    // cells 0 and 7 are occupied, everything between is blacklisted
    let grid = encoder.grid().unwrap();
    assert_eq!(grid.blacklist(), vec![1, 2, 3, 4, 5, 6]);
}

#[test]
fn reencoding_a_decoded_cloud_is_bit_stable() {
    let cloud = pseudo_random_cloud(500, 0xABCD);
    let settings = plain_settings(unit_box(), GridDimensions::new(3, 3, 3), 8, 8);

    let mut encoder = GridEncoder::new(settings);
    let first = encoder.encode(&cloud, None).unwrap();
    let decoded = encoder.decode(&first).unwrap();
    let second = encoder.encode(&decoded, None).unwrap();
    assert_eq!(first, second, "re-encode of a decoded cloud must not drift");
}

#[test]
fn parallel_encode_matches_serial_bit_for_bit() {
    let cloud = pseudo_random_cloud(5000, 0x5EED);
    let dims = GridDimensions::new(8, 8, 8);

    let mut serial = GridEncoder::new(plain_settings(unit_box(), dims, 8, 8));
    let mut settings = plain_settings(unit_box(), dims, 8, 8);
    settings.num_threads = 4;
    let mut parallel = GridEncoder::new(settings);

    let a = serial.encode(&cloud, None).unwrap();
    let b = parallel.encode(&cloud, None).unwrap();
    assert_eq!(a, b);
}

// ── entropy stage ──────────────────────────────────────────────────────────

#[test]
fn entropy_on_and_off_decode_identically() {
    let cloud = pseudo_random_cloud(1000, 99);
    let dims = GridDimensions::new(4, 4, 4);

    let mut plain = GridEncoder::new(plain_settings(unit_box(), dims, 8, 8));
    let mut settings = plain_settings(unit_box(), dims, 8, 8);
    settings.entropy_coding = true;
    let mut coded =
        GridEncoder::with_entropy_codec(settings, Arc::new(DeflateCodec::default()));

    let plain_msg = plain.encode(&cloud, None).unwrap();
    let coded_msg = coded.encode(&cloud, None).unwrap();
    assert_ne!(plain_msg.len(), coded_msg.len());

    let plain_header = GlobalHeader::read_from_message(&plain_msg).unwrap();
    let coded_header = GlobalHeader::read_from_message(&coded_msg).unwrap();
    assert!(!plain_header.entropy_coding);
    assert_eq!(plain_header.uncompressed_size, 0);
    assert!(coded_header.entropy_coding);
    assert_eq!(
        coded_header.uncompressed_size as usize,
        plain_msg.len() - GLOBAL_HEADER_SIZE
    );

    assert_eq!(
        plain.decode(&plain_msg).unwrap(),
        coded.decode(&coded_msg).unwrap()
    );
}

#[test]
fn every_bundled_codec_round_trips() {
    let cloud = pseudo_random_cloud(800, 0xF00D);
    let dims = GridDimensions::new(4, 4, 4);

    let mut plain = GridEncoder::new(plain_settings(unit_box(), dims, 8, 8));
    let reference = {
        let msg = plain.encode(&cloud, None).unwrap();
        plain.decode(&msg).unwrap()
    };

    let codecs: Vec<Arc<dyn EntropyCodec>> = vec![
        Arc::new(DeflateCodec::default()),
        Arc::new(ZstdCodec::default()),
        Arc::new(Lz4Codec),
    ];
    for codec in codecs {
        let name = codec.name();
        let mut settings = plain_settings(unit_box(), dims, 8, 8);
        settings.entropy_coding = true;
        let mut encoder = GridEncoder::with_entropy_codec(settings, codec);
        let message = encoder.encode(&cloud, None).unwrap();
        assert_eq!(encoder.decode(&message).unwrap(), reference, "codec {name}");
    }
}

#[test]
fn encoding_without_a_codec_fails_cleanly() {
    let mut settings = plain_settings(unit_box(), GridDimensions::new(1, 1, 1), 8, 8);
    settings.entropy_coding = true;
    let mut encoder = GridEncoder::new(settings);
    let err = encoder.encode(&[], None).unwrap_err();
    assert!(matches!(err, CodecError::MissingEntropyCodec), "got {err}");
}

// ── appendix ───────────────────────────────────────────────────────────────

#[test]
fn appendix_round_trip_and_isolation() {
    let cloud = pseudo_random_cloud(100, 3);
    let mut settings = plain_settings(unit_box(), GridDimensions::new(2, 2, 2), 8, 8);
    settings.appendix_size = 32;
    let mut encoder = GridEncoder::new(settings);

    let mut message = encoder.encode(&cloud, None).unwrap();
    let clean_decode = encoder.decode(&message).unwrap();

    write_to_appendix(&mut message, b"sensor frame 0001").unwrap();
    let appendix = read_from_appendix(&message).unwrap();
    assert_eq!(appendix.len(), 32);
    assert_eq!(&appendix[..17], b"sensor frame 0001");
    assert!(appendix[17..].iter().all(|&b| b == 0));

    // appendix contents never influence the decoded cloud
    assert_eq!(encoder.decode(&message).unwrap(), clean_decode);
}

#[test]
fn appendix_string_round_trip() {
    let mut settings = plain_settings(unit_box(), GridDimensions::new(1, 1, 1), 8, 8);
    settings.appendix_size = 64;
    let mut encoder = GridEncoder::new(settings);
    let mut message = encoder.encode(&[], None).unwrap();

    write_str_to_appendix(&mut message, "calibration v3").unwrap();
    assert_eq!(read_str_from_appendix(&message).unwrap(), "calibration v3");
}

#[test]
fn oversized_appendix_write_is_rejected() {
    let mut settings = plain_settings(unit_box(), GridDimensions::new(1, 1, 1), 8, 8);
    settings.appendix_size = 8;
    let mut encoder = GridEncoder::new(settings);
    let mut message = encoder.encode(&[], None).unwrap();
    let before = message.clone();

    let err = write_to_appendix(&mut message, &[0xAA; 9]).unwrap_err();
    assert!(matches!(err, CodecError::AppendixOverflow { .. }), "got {err}");
    assert_eq!(message, before, "failed write must leave the message intact");
}

#[test]
fn appendix_offset_is_stable_under_entropy_coding() {
    let cloud = pseudo_random_cloud(200, 11);
    let mut settings = plain_settings(unit_box(), GridDimensions::new(2, 2, 2), 8, 8);
    settings.entropy_coding = true;
    settings.appendix_size = 16;
    let mut encoder =
        GridEncoder::with_entropy_codec(settings, Arc::new(DeflateCodec::default()));

    let mut message = encoder.encode(&cloud, None).unwrap();
    write_str_to_appendix(&mut message, "tail").unwrap();
    assert_eq!(read_str_from_appendix(&message).unwrap(), "tail");
    assert_eq!(encoder.decode(&message).unwrap().len(), 200);
}

// ── malformed messages ─────────────────────────────────────────────────────

/// A small valid message with a populated blacklist, entropy off.
fn sample_message() -> (GridEncoder, Vec<u8>) {
    let cloud = vec![
        Voxel::new([0.1, 0.1, 0.1], [1, 2, 3]),
        Voxel::new([0.9, 0.9, 0.9], [4, 5, 6]),
    ];
    let mut encoder =
        GridEncoder::new(plain_settings(unit_box(), GridDimensions::new(2, 2, 2), 8, 8));
    let message = encoder.encode(&cloud, None).unwrap();
    (encoder, message)
}

#[test]
fn truncated_messages_are_rejected() {
    let (mut encoder, message) = sample_message();
    for cut in [0, 5, GLOBAL_HEADER_SIZE + 4, message.len() - 1] {
        let err = encoder.decode(&message[..cut]).unwrap_err();
        assert!(
            matches!(err, CodecError::Truncated { .. } | CodecError::OutOfBounds { .. }),
            "cut at {cut}: got {err}"
        );
    }
}

#[test]
fn zero_grid_dimension_is_rejected() {
    let (mut encoder, mut message) = sample_message();
    message[GLOBAL_HEADER_SIZE] = 0;
    let err = encoder.decode(&message).unwrap_err();
    assert!(matches!(err, CodecError::ZeroDimensions), "got {err}");
}

#[test]
fn unsorted_blacklist_is_rejected() {
    let (mut encoder, mut message) = sample_message();
    // swap the first two blacklist entries (cells 1 and 2)
    let at = GLOBAL_HEADER_SIZE + GRID_HEADER_SIZE;
    message.copy_within(at + 4..at + 8, at);
    message[at + 4..at + 8].copy_from_slice(&1u32.to_le_bytes());
    let err = encoder.decode(&message).unwrap_err();
    assert!(matches!(err, CodecError::BlacklistUnsorted), "got {err}");
}

#[test]
fn blacklist_entry_beyond_grid_is_rejected() {
    let (mut encoder, mut message) = sample_message();
    let at = GLOBAL_HEADER_SIZE + GRID_HEADER_SIZE;
    message[at..at + 4].copy_from_slice(&100u32.to_le_bytes());
    let err = encoder.decode(&message).unwrap_err();
    assert!(matches!(err, CodecError::BlacklistOutOfRange { .. }), "got {err}");
}

#[test]
fn oversized_bit_depth_is_rejected() {
    let (mut encoder, mut message) = sample_message();
    // first cell header sits right after the 6-entry blacklist
    let at = GLOBAL_HEADER_SIZE + GRID_HEADER_SIZE + 6 * 4;
    message[at] = 17;
    let err = encoder.decode(&message).unwrap_err();
    assert!(matches!(err, CodecError::BitDepthTooLarge { got: 17 }), "got {err}");
}

#[test]
fn trailing_bytes_are_rejected() {
    let (mut encoder, mut message) = sample_message();
    message.push(0);
    let err = encoder.decode(&message).unwrap_err();
    assert!(matches!(err, CodecError::PayloadSizeMismatch { .. }), "got {err}");
}

#[test]
fn wrong_uncompressed_size_is_rejected() {
    let cloud = pseudo_random_cloud(100, 23);
    let mut settings = plain_settings(unit_box(), GridDimensions::new(2, 2, 2), 8, 8);
    settings.entropy_coding = true;
    let mut encoder =
        GridEncoder::with_entropy_codec(settings, Arc::new(DeflateCodec::default()));
    let mut message = encoder.encode(&cloud, None).unwrap();

    // inflate the recorded pre-compression size
    let mut size = u64::from_le_bytes(message[1..9].try_into().unwrap());
    size += 1;
    message[1..9].copy_from_slice(&size.to_le_bytes());
    let err = encoder.decode(&message).unwrap_err();
    assert!(
        matches!(err, CodecError::UncompressedSizeMismatch { .. }),
        "got {err}"
    );
}

#[test]
fn garbage_entropy_payload_is_rejected() {
    let (_, plain) = sample_message();
    let mut settings = plain_settings(unit_box(), GridDimensions::new(2, 2, 2), 8, 8);
    settings.entropy_coding = true;
    let mut encoder =
        GridEncoder::with_entropy_codec(settings, Arc::new(DeflateCodec::default()));

    // claim entropy coding over a body that was never compressed
    let mut message = plain.clone();
    message[0] = 1;
    let body_len = (plain.len() - GLOBAL_HEADER_SIZE) as u64;
    message[1..9].copy_from_slice(&body_len.to_le_bytes());
    let err = encoder.decode(&message).unwrap_err();
    assert!(matches!(err, CodecError::Entropy(_)), "got {err}");
}
