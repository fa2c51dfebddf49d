use std::fs;
use std::path::PathBuf;
use std::time::Instant;

use anyhow::Context;
use clap::{Parser, Subcommand};

use pcg_codecs::codec_by_name;
use pcg_core::{
    read_str_from_appendix, write_str_to_appendix, BoundingBox, EncodingSettings, GridDimensions,
    GridEncoder, GridPrecision, Voxel,
};

// ── CLI definition ─────────────────────────────────────────────────────────

#[derive(Parser)]
#[command(
    name = "pcg",
    about = "Grid-segmented point cloud compressor — compress, decompress and inspect encoded clouds",
    version
)]
struct Cli {
    #[command(subcommand)]
    command: Commands,
}

#[derive(Subcommand)]
enum Commands {
    /// Compress an `x y z r g b` text cloud into an encoded message
    Compress {
        /// Source point file, one "x y z r g b" line per point
        input: PathBuf,
        /// Destination message file
        output: PathBuf,
        /// Grid dimensions as DXxDYxDZ (each 1–255)
        #[arg(short, long, default_value = "8x8x8")]
        dims: String,
        /// Position bits per axis per cell (0–16)
        #[arg(long, default_value_t = 8)]
        pos_bits: u8,
        /// Color bits per channel per cell (0–16)
        #[arg(long, default_value_t = 8)]
        color_bits: u8,
        /// Bounding box as "x0,y0,z0,x1,y1,z1" (default: fitted to input)
        #[arg(long)]
        bbox: Option<String>,
        /// Entropy codec: none | deflate | zstd | lz4
        #[arg(short, long, default_value = "deflate")]
        codec: String,
        /// Entropy compression level
        #[arg(long, default_value_t = 6)]
        level: i32,
        /// Bytes reserved for the appendix at the message tail
        #[arg(long, default_value_t = 0)]
        appendix: u64,
        /// Text to store in the appendix (grows the reservation to fit)
        #[arg(long)]
        appendix_text: Option<String>,
        /// Worker threads for the per-cell encode (0 = automatic)
        #[arg(short, long, default_value_t = 0)]
        threads: usize,
    },
    /// Decode a message back to an `x y z r g b` text cloud
    Decompress {
        /// Source message file
        input: PathBuf,
        /// Destination point file
        output: PathBuf,
        /// Entropy codec the message was encoded with
        #[arg(short, long, default_value = "deflate")]
        codec: String,
    },
    /// Print header fields, blacklist stats and optionally per-cell details
    Inspect {
        /// Message file to inspect
        file: PathBuf,
        /// Entropy codec the message was encoded with
        #[arg(short, long, default_value = "deflate")]
        codec: String,
        /// Print a per-cell table
        #[arg(long)]
        cells: bool,
    },
}

// ── Helpers ────────────────────────────────────────────────────────────────

fn human_bytes(n: u64) -> String {
    const UNITS: &[&str] = &["B", "KB", "MB", "GB", "TB"];
    let mut v = n as f64;
    let mut unit = 0;
    while v >= 1024.0 && unit < UNITS.len() - 1 {
        v /= 1024.0;
        unit += 1;
    }
    if unit == 0 {
        format!("{} B", n)
    } else {
        format!("{:.2} {}", v, UNITS[unit])
    }
}

fn parse_dims(s: &str) -> anyhow::Result<GridDimensions> {
    let parts: Vec<&str> = s.split(['x', 'X']).collect();
    anyhow::ensure!(parts.len() == 3, "dims must look like 4x4x4, got '{s}'");
    let d: Vec<u8> = parts
        .iter()
        .map(|p| p.trim().parse::<u8>())
        .collect::<Result<_, _>>()
        .with_context(|| format!("parsing dims '{s}'"))?;
    anyhow::ensure!(
        d.iter().all(|&v| v >= 1),
        "every grid dimension must be at least 1"
    );
    Ok(GridDimensions::new(d[0], d[1], d[2]))
}

fn parse_bbox(s: &str) -> anyhow::Result<BoundingBox> {
    let v: Vec<f32> = s
        .split(',')
        .map(|p| p.trim().parse::<f32>())
        .collect::<Result<_, _>>()
        .with_context(|| format!("parsing bbox '{s}'"))?;
    anyhow::ensure!(v.len() == 6, "bbox needs six comma-separated floats");
    let bb = BoundingBox::new([v[0], v[1], v[2]], [v[3], v[4], v[5]]);
    anyhow::ensure!(
        (0..3).all(|a| bb.min[a] <= bb.max[a]),
        "bbox min must not exceed max on any axis"
    );
    Ok(bb)
}

/// Fit a box around the cloud, padded so points on the upper faces still
/// fall inside a cell.
fn fit_bbox(voxels: &[Voxel]) -> BoundingBox {
    let mut min = [f32::MAX; 3];
    let mut max = [f32::MIN; 3];
    for v in voxels {
        for axis in 0..3 {
            min[axis] = min[axis].min(v.position[axis]);
            max[axis] = max[axis].max(v.position[axis]);
        }
    }
    for axis in 0..3 {
        let pad = (max[axis] - min[axis]).abs().max(1e-3) * 1e-3;
        max[axis] += pad;
    }
    BoundingBox::new(min, max)
}

fn read_xyz(path: &PathBuf) -> anyhow::Result<Vec<Voxel>> {
    let text = fs::read_to_string(path).with_context(|| format!("reading {path:?}"))?;
    let mut voxels = Vec::new();
    for (lineno, line) in text.lines().enumerate() {
        let line = line.trim();
        if line.is_empty() || line.starts_with('#') {
            continue;
        }
        let fields: Vec<&str> = line.split_whitespace().collect();
        anyhow::ensure!(
            fields.len() == 6,
            "{path:?}:{}: expected 6 fields, got {}",
            lineno + 1,
            fields.len()
        );
        let parse = |i: usize| -> anyhow::Result<f32> {
            fields[i]
                .parse::<f32>()
                .with_context(|| format!("{path:?}:{}: field {}", lineno + 1, i + 1))
        };
        let color = |i: usize| -> anyhow::Result<u8> {
            fields[i]
                .parse::<u8>()
                .with_context(|| format!("{path:?}:{}: field {}", lineno + 1, i + 1))
        };
        voxels.push(Voxel::new(
            [parse(0)?, parse(1)?, parse(2)?],
            [color(3)?, color(4)?, color(5)?],
        ));
    }
    Ok(voxels)
}

fn write_xyz(path: &PathBuf, voxels: &[Voxel]) -> anyhow::Result<()> {
    let mut out = String::with_capacity(voxels.len() * 32);
    for v in voxels {
        out.push_str(&format!(
            "{} {} {} {} {} {}\n",
            v.position[0], v.position[1], v.position[2], v.color[0], v.color[1], v.color[2]
        ));
    }
    fs::write(path, out).with_context(|| format!("writing {path:?}"))?;
    Ok(())
}

/// Codec by name, with "none" meaning the entropy stage is skipped.
fn resolve_codec(
    name: &str,
    level: i32,
) -> anyhow::Result<Option<std::sync::Arc<dyn pcg_core::EntropyCodec>>> {
    match name {
        "none" | "pass" => Ok(None),
        other => Ok(Some(codec_by_name(other, level)?)),
    }
}

// ── Subcommand implementations ─────────────────────────────────────────────

#[allow(clippy::too_many_arguments)]
fn run_compress(
    input: PathBuf,
    output: PathBuf,
    dims: &str,
    pos_bits: u8,
    color_bits: u8,
    bbox: Option<String>,
    codec_name: &str,
    level: i32,
    appendix: u64,
    appendix_text: Option<String>,
    threads: usize,
) -> anyhow::Result<()> {
    let dims = parse_dims(dims)?;
    let voxels = read_xyz(&input)?;
    anyhow::ensure!(!voxels.is_empty() || bbox.is_some(), "empty input needs an explicit --bbox");

    let bounding_box = match bbox {
        Some(s) => parse_bbox(&s)?,
        None => fit_bbox(&voxels),
    };

    let appendix_size = match &appendix_text {
        Some(text) => appendix.max(text.len() as u64),
        None => appendix,
    };

    let codec = resolve_codec(codec_name, level)?;
    let mut settings =
        EncodingSettings::new(GridPrecision::uniform(bounding_box, dims, pos_bits, color_bits));
    settings.entropy_coding = codec.is_some();
    settings.appendix_size = appendix_size;
    settings.num_threads = threads;

    let mut encoder = GridEncoder::new(settings);
    if let Some(codec) = codec {
        encoder.set_entropy_codec(codec);
    }

    let t0 = Instant::now();
    let mut message = encoder.encode(&voxels, None)?;
    let elapsed = t0.elapsed();

    if let Some(text) = appendix_text {
        write_str_to_appendix(&mut message, &text)?;
    }
    fs::write(&output, &message).with_context(|| format!("writing {output:?}"))?;

    let log = encoder.encode_log();
    let kept = encoder.grid().map(|g| g.num_points()).unwrap_or(0);
    eprintln!("  codec       : {}", codec_name);
    eprintln!("  grid        : {}x{}x{}", dims.x, dims.y, dims.z);
    eprintln!("  points      : {} in, {} kept", voxels.len(), kept);
    eprintln!("  raw size    : {}", human_bytes(log.raw_bytes as u64));
    eprintln!("  message     : {}", human_bytes(message.len() as u64));
    eprintln!(
        "  ratio       : {:.2}x",
        log.raw_bytes as f64 / message.len().max(1) as f64
    );
    eprintln!(
        "  entropy     : {:.1} ms of {:.1} ms total",
        log.entropy_time.as_secs_f64() * 1000.0,
        elapsed.as_secs_f64() * 1000.0
    );
    Ok(())
}

fn run_decompress(input: PathBuf, output: PathBuf, codec_name: &str) -> anyhow::Result<()> {
    let message = fs::read(&input).with_context(|| format!("reading {input:?}"))?;

    let mut encoder = GridEncoder::new(EncodingSettings::default());
    if let Some(codec) = resolve_codec(codec_name, 0)? {
        encoder.set_entropy_codec(codec);
    }

    let t0 = Instant::now();
    let voxels = encoder
        .decode(&message)
        .with_context(|| format!("decoding {input:?}"))?;
    let elapsed = t0.elapsed();

    write_xyz(&output, &voxels)?;

    let log = encoder.decode_log();
    eprintln!("  points      : {}", voxels.len());
    eprintln!("  message     : {}", human_bytes(message.len() as u64));
    eprintln!(
        "  entropy     : {:.1} ms of {:.1} ms total",
        log.entropy_time.as_secs_f64() * 1000.0,
        elapsed.as_secs_f64() * 1000.0
    );
    Ok(())
}

fn run_inspect(file: PathBuf, codec_name: &str, show_cells: bool) -> anyhow::Result<()> {
    let message = fs::read(&file).with_context(|| format!("reading {file:?}"))?;
    let global = pcg_core::GlobalHeader::read_from_message(&message)?;

    let mut encoder = GridEncoder::new(EncodingSettings::default());
    if let Some(codec) = resolve_codec(codec_name, 0)? {
        encoder.set_entropy_codec(codec);
    }
    let voxels = encoder
        .decode(&message)
        .with_context(|| format!("decoding {file:?}"))?;
    let log = encoder.decode_log();
    let grid = encoder
        .grid()
        .ok_or_else(|| anyhow::anyhow!("decode left no grid behind"))?;

    println!("=== pcg message: {:?} ===", file);
    println!();
    println!("  file size      : {}", human_bytes(message.len() as u64));
    println!("  entropy coding : {}", global.entropy_coding);
    println!(
        "  uncompressed   : {}",
        human_bytes(global.uncompressed_size)
    );
    println!("  appendix       : {}", human_bytes(global.appendix_size));
    println!(
        "  dimensions     : {}x{}x{} ({} cells)",
        grid.dimensions.x,
        grid.dimensions.y,
        grid.dimensions.z,
        grid.dimensions.cell_count()
    );
    println!(
        "  bounding box   : [{}, {}, {}] - [{}, {}, {}]",
        grid.bounding_box.min[0],
        grid.bounding_box.min[1],
        grid.bounding_box.min[2],
        grid.bounding_box.max[0],
        grid.bounding_box.max[1],
        grid.bounding_box.max[2]
    );
    println!(
        "  blacklisted    : {} cells ({})",
        grid.blacklist().len(),
        human_bytes(log.blacklist_bytes as u64)
    );
    println!("  points         : {}", voxels.len());
    println!(
        "  cell headers   : {}",
        human_bytes(log.cell_header_bytes as u64)
    );
    if global.appendix_size > 0 {
        let text = read_str_from_appendix(&message)?;
        if !text.is_empty() {
            println!("  appendix text  : {text}");
        }
    }

    if show_cells {
        println!();
        println!(
            "  {:>8}  {:>8}  {:>12}  {:>12}",
            "cell", "points", "pos bits", "color bits"
        );
        println!("  {}", "-".repeat(48));
        for (index, cell) in grid.cells.iter().enumerate() {
            if cell.is_empty() {
                continue;
            }
            println!(
                "  {:>8}  {:>8}  {:>12}  {:>12}",
                index,
                cell.len(),
                format!(
                    "{}/{}/{}",
                    cell.point_bits[0], cell.point_bits[1], cell.point_bits[2]
                ),
                format!(
                    "{}/{}/{}",
                    cell.color_bits[0], cell.color_bits[1], cell.color_bits[2]
                ),
            );
        }
    }

    Ok(())
}

// ── Entry point ────────────────────────────────────────────────────────────

fn main() -> anyhow::Result<()> {
    env_logger::init();
    let cli = Cli::parse();
    match cli.command {
        Commands::Compress {
            input,
            output,
            dims,
            pos_bits,
            color_bits,
            bbox,
            codec,
            level,
            appendix,
            appendix_text,
            threads,
        } => run_compress(
            input,
            output,
            &dims,
            pos_bits,
            color_bits,
            bbox,
            &codec,
            level,
            appendix,
            appendix_text,
            threads,
        ),
        Commands::Decompress {
            input,
            output,
            codec,
        } => run_decompress(input, output, &codec),
        Commands::Inspect { file, codec, cells } => run_inspect(file, &codec, cells),
    }
}
