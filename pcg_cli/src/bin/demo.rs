//! Walkthrough of the grid codec on a synthetic cloud: precision sweep,
//! entropy codec comparison and an appendix round-trip.

use std::sync::Arc;
use std::time::Instant;

use anyhow::Result;

use pcg_codecs::{DeflateCodec, Lz4Codec, ZstdCodec};
use pcg_core::{
    read_str_from_appendix, write_str_to_appendix, BoundingBox, EncodingSettings, EntropyCodec,
    GridDimensions, GridEncoder, GridPrecision, Voxel,
};

const NUM_POINTS: usize = 100_000;

/// Deterministic cloud in the unit box: LCG positions, color tied to height.
fn synthetic_cloud(n: usize, seed: u64) -> Vec<Voxel> {
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
            let shade = (position[1] * 255.0) as u8;
            Voxel::new(position, [shade, 255 - shade, 128])
        })
        .collect()
}

fn max_position_error(original: &[Voxel], decoded: &[Voxel]) -> f32 {
    // Cross-cell ordering is not preserved, so compare against the nearest
    // original point. Quadratic, but fine at demo sizes on a subsample.
    decoded
        .iter()
        .step_by(199)
        .map(|d| {
            original
                .iter()
                .map(|o| {
                    (0..3)
                        .map(|a| (o.position[a] - d.position[a]).abs())
                        .fold(0.0f32, f32::max)
                })
                .fold(f32::MAX, f32::min)
        })
        .fold(0.0f32, f32::max)
}

fn section(title: &str) {
    println!();
    println!("━━━ {title} {}", "━".repeat(64usize.saturating_sub(title.len() + 5)));
}

fn run() -> Result<()> {
    let cloud = synthetic_cloud(NUM_POINTS, 0xC0FFEE);
    let bbox = BoundingBox::new([0.0; 3], [1.0; 3]);
    let dims = GridDimensions::new(8, 8, 8);
    let raw_bytes = cloud.len() * std::mem::size_of::<Voxel>();

    println!("grid codec demo — {} points, 8x8x8 grid, unit box", NUM_POINTS);

    // ── precision sweep, entropy off ────────────────────────────────────────
    section("PRECISION SWEEP (entropy off)");
    println!(
        "  {:>8}  {:>12}  {:>8}  {:>12}",
        "bits", "message", "ratio", "max pos err"
    );
    for bits in [4u8, 6, 8, 10, 12] {
        let mut settings =
            EncodingSettings::new(GridPrecision::uniform(bbox, dims, bits, 8));
        settings.entropy_coding = false;
        let mut encoder = GridEncoder::new(settings);
        let message = encoder.encode(&cloud, None)?;
        let decoded = encoder.decode(&message)?;
        println!(
            "  {:>8}  {:>12}  {:>7.2}x  {:>12.6}",
            bits,
            message.len(),
            raw_bytes as f64 / message.len() as f64,
            max_position_error(&cloud, &decoded)
        );
    }

    // ── entropy codec comparison at 8 bits ──────────────────────────────────
    section("ENTROPY CODECS (8-bit positions and colors)");
    println!(
        "  {:>10}  {:>12}  {:>8}  {:>10}  {:>10}",
        "codec", "message", "ratio", "compress", "decompress"
    );
    let codecs: Vec<(&str, Option<Arc<dyn EntropyCodec>>)> = vec![
        ("none", None),
        ("deflate", Some(Arc::new(DeflateCodec::default()))),
        ("zstd", Some(Arc::new(ZstdCodec::default()))),
        ("lz4", Some(Arc::new(Lz4Codec))),
    ];
    for (name, codec) in codecs {
        let mut settings = EncodingSettings::new(GridPrecision::uniform(bbox, dims, 8, 8));
        settings.entropy_coding = codec.is_some();
        let mut encoder = GridEncoder::new(settings);
        if let Some(codec) = codec {
            encoder.set_entropy_codec(codec);
        }
        let t0 = Instant::now();
        let message = encoder.encode(&cloud, None)?;
        let t_enc = t0.elapsed();
        let t1 = Instant::now();
        let decoded = encoder.decode(&message)?;
        let t_dec = t1.elapsed();
        assert_eq!(decoded.len(), cloud.len());
        println!(
            "  {:>10}  {:>12}  {:>7.2}x  {:>8.1}ms  {:>8.1}ms",
            name,
            message.len(),
            raw_bytes as f64 / message.len() as f64,
            t_enc.as_secs_f64() * 1000.0,
            t_dec.as_secs_f64() * 1000.0
        );
    }

    // ── appendix round-trip ─────────────────────────────────────────────────
    section("APPENDIX");
    let mut settings = EncodingSettings::new(GridPrecision::uniform(bbox, dims, 8, 8));
    settings.entropy_coding = false;
    settings.appendix_size = 64;
    let mut encoder = GridEncoder::new(settings);
    let mut message = encoder.encode(&cloud, None)?;
    write_str_to_appendix(&mut message, "frame 42 · sensor A")?;
    println!("  reserved  : 64 bytes at message tail");
    println!("  stored    : \"frame 42 · sensor A\"");
    println!("  read back : \"{}\"", read_str_from_appendix(&message)?);
    let decoded = encoder.decode(&message)?;
    println!("  decode unaffected: {} points", decoded.len());

    Ok(())
}

fn main() {
    if let Err(e) = run() {
        eprintln!("error: {e:#}");
        std::process::exit(1);
    }
}
