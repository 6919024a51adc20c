// ============================================================================
// Composite-back: merge a regenerated box region into the original image
// ============================================================================
//
// The regenerated region arrives the exact size of the bounding box it was
// cropped from.  Compositing pastes it at the box and uses the selection
// mask as an alpha guide: outside the (optionally expanded) mask the output
// is bit-identical to the original, deep inside the mask it is 100% new
// content, and within `edge_blend` px of the mask boundary the two are
// linearly interpolated so the seam disappears.

use image::Rgba;
use rayon::prelude::*;

use crate::geometry::BoundingBox;
use crate::image_io::SourceImage;
use crate::mask::MaskBuffer;

/// Error type for compositing calls.  Both variants are fatal for the call;
/// no partial output is ever produced.
#[derive(Debug)]
pub enum CompositeError {
    /// The regenerated region's dimensions don't match the box.
    DimensionMismatch {
        expected: (u32, u32),
        actual: (u32, u32),
    },
    /// The box does not fit inside the original image.
    OutOfBounds {
        bounds: BoundingBox,
        image: (u32, u32),
    },
    /// The mask raster is not the size of the original image.
    MaskMismatch {
        expected: (u32, u32),
        actual: (u32, u32),
    },
}

impl std::fmt::Display for CompositeError {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            CompositeError::DimensionMismatch { expected, actual } => write!(
                f,
                "Region is {}x{} but the box is {}x{}",
                actual.0, actual.1, expected.0, expected.1
            ),
            CompositeError::OutOfBounds { bounds, image } => write!(
                f,
                "Box ({:.0},{:.0} {:.0}x{:.0}) falls outside the {}x{} image",
                bounds.x, bounds.y, bounds.width, bounds.height, image.0, image.1
            ),
            CompositeError::MaskMismatch { expected, actual } => write!(
                f,
                "Mask is {}x{} but the image is {}x{}",
                actual.0, actual.1, expected.0, expected.1
            ),
        }
    }
}

/// Seam-control knobs for [`composite`].
#[derive(Clone, Copy, Debug, Default)]
pub struct CompositeOptions {
    /// Dilate the mask outward by this many pixels before blending, letting
    /// regenerated content bleed slightly past the drawn selection.
    pub expansion: u32,
    /// Width of the feathered seam: alpha ramps linearly from 0 at the mask
    /// boundary to 1 this many pixels inside it.  0 = hard edge.
    pub edge_blend: u32,
}

/// Crop the source and mask down to the box: the payload handed to the
/// external generator.  The mask crop is returned as a PNG-mimed image.
pub fn crop_region(
    original: &SourceImage,
    mask: &MaskBuffer,
    bounds: &BoundingBox,
) -> Result<(SourceImage, SourceImage), CompositeError> {
    let (bx, by, bw, bh) = validated_pixel_rect(original, bounds)?;
    check_mask(original, mask)?;
    let rect = BoundingBox::new(bx as f32, by as f32, bw as f32, bh as f32);
    Ok((original.crop(&rect), mask.crop(&rect).to_source_image()))
}

/// Replace the box region of `original` with `region`, feathering the seam
/// along the mask boundary.  Every pixel outside the box, and every pixel
/// outside the (expanded) mask, is copied from the original unchanged.
pub fn composite(
    original: &SourceImage,
    region: &SourceImage,
    bounds: &BoundingBox,
    mask: &MaskBuffer,
    options: &CompositeOptions,
) -> Result<SourceImage, CompositeError> {
    let (bx, by, bw, bh) = validated_pixel_rect(original, bounds)?;
    check_mask(original, mask)?;
    if region.width() != bw || region.height() != bh {
        return Err(CompositeError::DimensionMismatch {
            expected: (bw, bh),
            actual: (region.width(), region.height()),
        });
    }

    // Per-pixel blend weights over the box: 0 = original, 255 = region.
    let rect = BoundingBox::new(bx as f32, by as f32, bw as f32, bh as f32);
    let mut box_mask = mask.crop(&rect);
    if options.expansion > 0 {
        box_mask.dilate(options.expansion);
    }
    let weights = blend_weights(&box_mask, options.edge_blend);

    let mut out = original.pixels.clone();
    let stride = original.width() as usize * 4;
    let buf: &mut [u8] = &mut out;

    // Row-parallel blend; rows outside the box are left untouched.
    buf.par_chunks_mut(stride)
        .enumerate()
        .filter(|(y, _)| *y >= by as usize && *y < (by + bh) as usize)
        .for_each(|(y, row)| {
            let my = y as u32 - by;
            for mx in 0..bw {
                let weight = weights[(my * bw + mx) as usize];
                if weight == 0 {
                    continue;
                }
                let src: &Rgba<u8> = region.pixels.get_pixel(mx, my);
                let offset = ((bx + mx) * 4) as usize;
                if weight == 255 {
                    row[offset..offset + 4].copy_from_slice(&src.0);
                } else {
                    let t = weight as f32 / 255.0;
                    for c in 0..4 {
                        row[offset + c] = lerp_u8(row[offset + c], src.0[c], t);
                    }
                }
            }
        });

    Ok(SourceImage::new(out, original.mime_type.clone()))
}

/// Blend weights for one box-sized mask: 0 outside the selection, 255 deep
/// inside, and a linear distance ramp over `edge_blend` px at the boundary.
/// Distance-to-boundary is found with a circular window scan around each
/// selected pixel.
fn blend_weights(box_mask: &MaskBuffer, edge_blend: u32) -> Vec<u8> {
    let (w, h) = (box_mask.width() as usize, box_mask.height() as usize);
    let mut weights = vec![0u8; w * h];

    if edge_blend == 0 {
        for y in 0..h {
            for x in 0..w {
                if box_mask.is_selected(x as u32, y as u32) {
                    weights[y * w + x] = 255;
                }
            }
        }
        return weights;
    }

    let r = edge_blend as i32;
    for y in 0..h {
        for x in 0..w {
            if !box_mask.is_selected(x as u32, y as u32) {
                continue;
            }
            // Squared distance to the nearest unselected pixel within the
            // blend radius; pixels deeper than the radius saturate at 255.
            let mut min_d2 = i32::MAX;
            for dy in -r..=r {
                for dx in -r..=r {
                    let nx = x as i32 + dx;
                    let ny = y as i32 + dy;
                    let d2 = dx * dx + dy * dy;
                    if d2 >= min_d2 || d2 > r * r {
                        continue;
                    }
                    let outside = nx < 0
                        || ny < 0
                        || nx >= w as i32
                        || ny >= h as i32
                        || !box_mask.is_selected(nx as u32, ny as u32);
                    if outside {
                        min_d2 = d2;
                    }
                }
            }
            weights[y * w + x] = if min_d2 == i32::MAX {
                255
            } else {
                let dist = (min_d2 as f32).sqrt().min(edge_blend as f32);
                (dist / edge_blend as f32 * 255.0) as u8
            };
        }
    }
    weights
}

fn validated_pixel_rect(
    original: &SourceImage,
    bounds: &BoundingBox,
) -> Result<(u32, u32, u32, u32), CompositeError> {
    let (iw, ih) = (original.width(), original.height());
    let out_of_bounds = bounds.x < 0.0
        || bounds.y < 0.0
        || bounds.width <= 0.0
        || bounds.height <= 0.0
        || bounds.right() > iw as f32
        || bounds.bottom() > ih as f32;
    if out_of_bounds {
        return Err(CompositeError::OutOfBounds {
            bounds: *bounds,
            image: (iw, ih),
        });
    }
    Ok(bounds.to_pixel_rect(iw, ih))
}

fn check_mask(original: &SourceImage, mask: &MaskBuffer) -> Result<(), CompositeError> {
    if mask.width() != original.width() || mask.height() != original.height() {
        return Err(CompositeError::MaskMismatch {
            expected: (original.width(), original.height()),
            actual: (mask.width(), mask.height()),
        });
    }
    Ok(())
}

#[inline(always)]
fn lerp_u8(a: u8, b: u8, t: f32) -> u8 {
    (a as f32 + (b as f32 - a as f32) * t).clamp(0.0, 255.0) as u8
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::geometry::Point;
    use image::{Rgba, RgbaImage};

    fn solid(w: u32, h: u32, color: [u8; 4]) -> SourceImage {
        SourceImage::new(
            RgbaImage::from_pixel(w, h, Rgba(color)),
            "image/png",
        )
    }

    fn rect_mask(w: u32, h: u32, x: f32, y: f32, rw: f32, rh: f32) -> MaskBuffer {
        let mut mask = MaskBuffer::new(w, h);
        mask.fill_polygon(
            &[
                Point::new(x, y),
                Point::new(x + rw, y),
                Point::new(x + rw, y + rh),
                Point::new(x, y + rh),
            ],
            crate::mask::SelectionMode::Add,
        );
        mask
    }

    #[test]
    fn identity_outside_box_with_hard_edge() {
        let original = solid(64, 64, [0, 0, 255, 255]);
        let region = solid(16, 16, [255, 0, 0, 255]);
        let bounds = BoundingBox::new(8.0, 8.0, 16.0, 16.0);
        let mask = rect_mask(64, 64, 10.0, 10.0, 12.0, 12.0);

        let out = composite(
            &original,
            &region,
            &bounds,
            &mask,
            &CompositeOptions::default(),
        )
        .unwrap();

        assert_eq!((out.width(), out.height()), (64, 64));
        for y in 0..64 {
            for x in 0..64 {
                let inside_box = (8..24).contains(&x) && (8..24).contains(&y);
                if !inside_box {
                    assert_eq!(
                        out.pixels.get_pixel(x, y),
                        original.pixels.get_pixel(x, y),
                        "pixel ({},{}) outside the box changed",
                        x,
                        y
                    );
                }
            }
        }
        // Selected interior took the region color.
        assert_eq!(out.pixels.get_pixel(15, 15), &Rgba([255, 0, 0, 255]));
        // Inside the box but outside the mask: still original.
        assert_eq!(out.pixels.get_pixel(8, 8), &Rgba([0, 0, 255, 255]));
    }

    #[test]
    fn seam_ramp_is_monotonic() {
        let original = solid(32, 32, [0, 0, 0, 255]);
        let region = solid(32, 32, [255, 255, 255, 255]);
        let bounds = BoundingBox::new(0.0, 0.0, 32.0, 32.0);
        let mask = rect_mask(32, 32, 8.0, 8.0, 16.0, 16.0);

        let out = composite(
            &original,
            &region,
            &bounds,
            &mask,
            &CompositeOptions {
                expansion: 0,
                edge_blend: 4,
            },
        )
        .unwrap();

        // Walking inward along y=16, the blend must never decrease.
        let row: Vec<u8> = (6..16).map(|x| out.pixels.get_pixel(x, 16).0[0]).collect();
        for pair in row.windows(2) {
            assert!(pair[1] >= pair[0], "ramp not monotonic: {:?}", row);
        }
        // Outside the mask: untouched.  Deep inside: fully new.
        assert_eq!(out.pixels.get_pixel(6, 16).0[0], 0);
        assert_eq!(out.pixels.get_pixel(15, 16).0[0], 255);
    }

    #[test]
    fn expansion_bleeds_past_the_selection() {
        let original = solid(32, 32, [0, 0, 0, 255]);
        let region = solid(32, 32, [255, 255, 255, 255]);
        let bounds = BoundingBox::new(0.0, 0.0, 32.0, 32.0);
        let mask = rect_mask(32, 32, 12.0, 12.0, 8.0, 8.0);

        let plain = composite(
            &original,
            &region,
            &bounds,
            &mask,
            &CompositeOptions::default(),
        )
        .unwrap();
        let expanded = composite(
            &original,
            &region,
            &bounds,
            &mask,
            &CompositeOptions {
                expansion: 3,
                edge_blend: 0,
            },
        )
        .unwrap();

        // A pixel just outside the drawn selection is original without
        // expansion, regenerated with it.
        assert_eq!(plain.pixels.get_pixel(10, 16).0[0], 0);
        assert_eq!(expanded.pixels.get_pixel(10, 16).0[0], 255);
    }

    #[test]
    fn size_mismatch_is_rejected() {
        let original = solid(64, 64, [0, 0, 255, 255]);
        let region = solid(10, 16, [255, 0, 0, 255]);
        let bounds = BoundingBox::new(8.0, 8.0, 16.0, 16.0);
        let mask = rect_mask(64, 64, 8.0, 8.0, 16.0, 16.0);
        let err = composite(
            &original,
            &region,
            &bounds,
            &mask,
            &CompositeOptions::default(),
        );
        assert!(matches!(
            err,
            Err(CompositeError::DimensionMismatch { .. })
        ));
    }

    #[test]
    fn out_of_bounds_box_is_rejected() {
        let original = solid(64, 64, [0, 0, 255, 255]);
        let region = solid(16, 16, [255, 0, 0, 255]);
        let mask = rect_mask(64, 64, 8.0, 8.0, 16.0, 16.0);
        for bounds in [
            BoundingBox::new(-2.0, 8.0, 16.0, 16.0),
            BoundingBox::new(56.0, 8.0, 16.0, 16.0),
            BoundingBox::new(8.0, 60.0, 16.0, 16.0),
        ] {
            let err = composite(
                &original,
                &region,
                &bounds,
                &mask,
                &CompositeOptions::default(),
            );
            assert!(matches!(err, Err(CompositeError::OutOfBounds { .. })));
        }
    }

    #[test]
    fn wrong_size_mask_is_rejected() {
        let original = solid(64, 64, [0, 0, 255, 255]);
        let region = solid(16, 16, [255, 0, 0, 255]);
        let bounds = BoundingBox::new(8.0, 8.0, 16.0, 16.0);
        let mask = rect_mask(32, 32, 8.0, 8.0, 16.0, 16.0);
        let err = composite(
            &original,
            &region,
            &bounds,
            &mask,
            &CompositeOptions::default(),
        );
        assert!(matches!(err, Err(CompositeError::MaskMismatch { .. })));
    }

    #[test]
    fn crop_region_returns_matching_pair() {
        let original = solid(64, 48, [40, 80, 120, 255]);
        let mask = rect_mask(64, 48, 10.0, 10.0, 20.0, 20.0);
        let bounds = BoundingBox::new(8.0, 8.0, 24.0, 24.0);

        let (src_crop, mask_crop) = crop_region(&original, &mask, &bounds).unwrap();
        assert_eq!((src_crop.width(), src_crop.height()), (24, 24));
        assert_eq!((mask_crop.width(), mask_crop.height()), (24, 24));
        assert_eq!(mask_crop.mime_type, "image/png");
    }
}
