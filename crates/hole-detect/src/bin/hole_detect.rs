//! Offline harness: run the hole detection pipeline on a single colour image
//! plus a constant or raw-f32 depth grid, print the query response as JSON
//! and optionally write the annotated frame.
//!
//! Runs in the camera frame (identity extrinsics); feed the output through
//! your own transform when a robot frame is needed.

use std::path::{Path, PathBuf};

use clap::Parser;
use log::{info, LevelFilter};
use nalgebra::Matrix4;

use hole_detect::{luma_from_rgb, render_overlays, NodeConfig, QueryResponse};
use hole_detect_core::{init_with_level, process_frame, DepthFrame, Intrinsics};

#[derive(Parser, Debug)]
#[command(name = "hole-detect", about = "Detect circular hole markers on a colour image")]
struct Cli {
    /// Input colour image (any format the `image` crate decodes).
    image: PathBuf,

    /// Raw little-endian f32 depth file on the same pixel grid as the image.
    #[arg(long)]
    depth: Option<PathBuf>,

    /// Constant depth used when no depth file is given.
    #[arg(long, default_value_t = 1000.0)]
    depth_value: f32,

    /// Focal length, x.
    #[arg(long, default_value_t = 500.0)]
    fx: f64,

    /// Focal length, y.
    #[arg(long, default_value_t = 500.0)]
    fy: f64,

    /// Principal point x; defaults to the image centre.
    #[arg(long)]
    cx: Option<f64>,

    /// Principal point y; defaults to the image centre.
    #[arg(long)]
    cy: Option<f64>,

    /// JSON node config (frame names, thresholds, Hough profiles).
    #[arg(long)]
    config: Option<PathBuf>,

    /// Write the annotated frame to this path.
    #[arg(long)]
    annotated: Option<PathBuf>,

    /// Increase log verbosity (-v debug, -vv trace).
    #[arg(short, long, action = clap::ArgAction::Count)]
    verbose: u8,
}

fn read_depth_raw(path: &Path, width: usize, height: usize) -> Result<DepthFrame, String> {
    let bytes =
        std::fs::read(path).map_err(|e| format!("failed to read {}: {e}", path.display()))?;
    let expected = width * height * 4;
    if bytes.len() != expected {
        return Err(format!(
            "depth file {} is {} bytes, expected {expected} for a {width}x{height} grid",
            path.display(),
            bytes.len()
        ));
    }
    let data = bytes
        .chunks_exact(4)
        .map(|c| f32::from_le_bytes([c[0], c[1], c[2], c[3]]))
        .collect();
    DepthFrame::from_vec(width, height, data).ok_or_else(|| "depth grid mismatch".to_owned())
}

fn main() -> Result<(), Box<dyn std::error::Error>> {
    let cli = Cli::parse();

    let level = match cli.verbose {
        0 => LevelFilter::Info,
        1 => LevelFilter::Debug,
        _ => LevelFilter::Trace,
    };
    let _ = init_with_level(level);

    let config = match &cli.config {
        Some(path) => NodeConfig::from_json_file(path)?,
        None => NodeConfig::default(),
    };

    let rgb = image::ImageReader::open(&cli.image)?.decode()?.to_rgb8();
    let (width, height) = rgb.dimensions();
    info!("loaded {}x{} image from {}", width, height, cli.image.display());

    let depth = match &cli.depth {
        Some(path) => read_depth_raw(path, width as usize, height as usize)?,
        None => DepthFrame::constant(width as usize, height as usize, cli.depth_value),
    };

    let intrinsics = Intrinsics {
        fx: cli.fx,
        fy: cli.fy,
        cx: cli.cx.unwrap_or(f64::from(width) / 2.0),
        cy: cli.cy.unwrap_or(f64::from(height) / 2.0),
    };

    let gray = luma_from_rgb(&rgb);
    let outcome = process_frame(
        &gray.view(),
        &depth,
        &intrinsics,
        &Matrix4::identity(),
        &config.pipeline,
    );
    info!("detected {} hole(s)", outcome.holes.len());

    if let Some(path) = &cli.annotated {
        let mut annotated = rgb.clone();
        render_overlays(&mut annotated, &outcome.overlays);
        annotated.save(path)?;
        info!("annotated frame written to {}", path.display());
    }

    let response = QueryResponse {
        success: !outcome.holes.is_empty(),
        coordinates: outcome.holes,
    };
    println!("{}", serde_json::to_string_pretty(&response)?);
    Ok(())
}
