// ============================================================================
// SmartMask CLI — headless compositing via command-line arguments
// ============================================================================
//
// Usage example:
//   smartmask --original photo.png --region patch.png --mask mask.png \
//             --bounds 120,80,256,192 --edge-blend 8 --expansion 4 \
//             --output out.png
//
// Pastes a regenerated region back into the original image with a feathered
// seam, exactly as the interactive pipeline does after a generate round-trip.
// All processing runs synchronously on the current thread.

use std::path::PathBuf;
use std::process::ExitCode;
use std::time::Instant;

use clap::Parser;

use crate::geometry::BoundingBox;
use crate::image_io::SourceImage;
use crate::mask::MaskBuffer;
use crate::ops::compositor::{self, CompositeOptions};

// ============================================================================
// CLI argument definition (clap Derive)
// ============================================================================

/// SmartMask headless compositor.
///
/// Merge a regenerated region back into an image without opening a GUI.
#[derive(Parser, Debug)]
#[command(
    name = "smartmask",
    about = "SmartMask headless region compositor",
    long_about = "Paste a regenerated sub-image back into the original at a given\n\
                  bounding box, blending the seam along the selection mask.\n\n\
                  Example:\n  \
                  smartmask --original photo.png --region patch.png --mask mask.png \\\n            \
                  --bounds 120,80,256,192 --edge-blend 8 --output out.png"
)]
pub struct CliArgs {
    /// The original image.
    #[arg(long, value_name = "FILE")]
    pub original: PathBuf,

    /// The regenerated region; must be exactly the size of --bounds.
    #[arg(long, value_name = "FILE")]
    pub region: PathBuf,

    /// Selection mask, same dimensions as the original.  Any decodable
    /// image; converted to grayscale and thresholded (>127 = selected).
    #[arg(long, value_name = "FILE")]
    pub mask: PathBuf,

    /// Box the region was generated from, as `x,y,w,h` in source pixels.
    #[arg(long, value_name = "X,Y,W,H")]
    pub bounds: String,

    /// Dilate the mask outward by this many pixels before blending.
    #[arg(long, default_value_t = 0, value_name = "PX")]
    pub expansion: u32,

    /// Feathered seam width in pixels (0 = hard edge).
    #[arg(long, default_value_t = 0, value_name = "PX")]
    pub edge_blend: u32,

    /// Output file path; format inferred from the extension.
    #[arg(short, long, value_name = "FILE")]
    pub output: PathBuf,

    /// Print per-step timing information.
    #[arg(short, long)]
    pub verbose: bool,
}

// ============================================================================
// Public entry point
// ============================================================================

/// Run the compositing job and return an OS exit code.
/// `0` = success, `1` = any failure.
pub fn run(args: CliArgs) -> ExitCode {
    let Some(bounds) = parse_bounds(&args.bounds) else {
        eprintln!(
            "error: --bounds must be four comma-separated numbers (x,y,w,h), got '{}'",
            args.bounds
        );
        return ExitCode::FAILURE;
    };

    let started = Instant::now();

    let original = match SourceImage::from_path(&args.original) {
        Ok(img) => img,
        Err(e) => {
            eprintln!("error: could not load '{}': {}", args.original.display(), e);
            return ExitCode::FAILURE;
        }
    };
    let region = match SourceImage::from_path(&args.region) {
        Ok(img) => img,
        Err(e) => {
            eprintln!("error: could not load '{}': {}", args.region.display(), e);
            return ExitCode::FAILURE;
        }
    };
    let mask = match image::open(&args.mask) {
        Ok(img) => MaskBuffer::from_gray(img.to_luma8()),
        Err(e) => {
            eprintln!("error: could not load '{}': {}", args.mask.display(), e);
            return ExitCode::FAILURE;
        }
    };
    if args.verbose {
        println!("loaded inputs in {:.0?}", started.elapsed());
    }

    let options = CompositeOptions {
        expansion: args.expansion,
        edge_blend: args.edge_blend,
    };
    let composite_start = Instant::now();
    let result = match compositor::composite(&original, &region, &bounds, &mask, &options) {
        Ok(img) => img,
        Err(e) => {
            eprintln!("error: {}", e);
            crate::log_err!("CLI composite failed: {}", e);
            return ExitCode::FAILURE;
        }
    };
    if args.verbose {
        println!("composited in {:.0?}", composite_start.elapsed());
    }

    if let Err(e) = result.save_to_path(&args.output) {
        eprintln!("error: could not write '{}': {}", args.output.display(), e);
        return ExitCode::FAILURE;
    }
    if args.verbose {
        println!(
            "wrote {} ({:.0?} total)",
            args.output.display(),
            started.elapsed()
        );
    }
    ExitCode::SUCCESS
}

/// Parse `x,y,w,h` into a box.  Returns `None` on any malformed component.
fn parse_bounds(raw: &str) -> Option<BoundingBox> {
    let parts: Vec<f32> = raw
        .split(',')
        .map(|s| s.trim().parse::<f32>())
        .collect::<Result<_, _>>()
        .ok()?;
    if parts.len() != 4 {
        return None;
    }
    Some(BoundingBox::new(parts[0], parts[1], parts[2], parts[3]))
}
