//! MaskBuffer, the single-channel selection raster.
//!
//! One mask per editor, sized exactly like the source image.  0 means
//! unselected, 255 selected.  The buffer is always rebuilt from scratch by
//! replaying committed shapes; it is never patched incrementally, so
//! undo/redo reproduces the raster exactly.

use image::{DynamicImage, GrayImage, ImageOutputFormat, Luma};
use serde::{Deserialize, Serialize};

use crate::geometry::{BoundingBox, Point};
use crate::image_io::{DecodeError, SourceImage};

/// How a committed shape combines with the pixels painted before it.
#[derive(Clone, Copy, Debug, Default, PartialEq, Eq, Serialize, Deserialize)]
pub enum SelectionMode {
    /// Paint selected (white).
    #[default]
    Add,
    /// Erase previously selected pixels (paint black).
    Subtract,
}

impl SelectionMode {
    fn value(&self) -> u8 {
        match self {
            SelectionMode::Add => 255,
            SelectionMode::Subtract => 0,
        }
    }
}

#[derive(Clone, Debug)]
pub struct MaskBuffer {
    mask: GrayImage,
    /// Active clip rect `(x0, y0, x1, y1)` exclusive; paint primitives never
    /// write outside it.
    clip: Option<(u32, u32, u32, u32)>,
}

impl MaskBuffer {
    pub fn new(width: u32, height: u32) -> Self {
        Self {
            mask: GrayImage::new(width, height),
            clip: None,
        }
    }

    /// Wrap an existing grayscale raster, thresholding to binary semantics
    /// (values above 127 become selected).
    pub fn from_gray(gray: GrayImage) -> Self {
        let (w, h) = gray.dimensions();
        let data: Vec<u8> = gray
            .into_raw()
            .into_iter()
            .map(|v| if v > 127 { 255 } else { 0 })
            .collect();
        Self {
            // Dimensions match the consumed raster, so this cannot fail.
            mask: GrayImage::from_raw(w, h, data).unwrap_or_else(|| GrayImage::new(w, h)),
            clip: None,
        }
    }

    pub fn width(&self) -> u32 {
        self.mask.width()
    }

    pub fn height(&self) -> u32 {
        self.mask.height()
    }

    pub fn as_gray(&self) -> &GrayImage {
        &self.mask
    }

    /// Reset every pixel to unselected.  The clip rect is kept.
    pub fn clear(&mut self) {
        for p in self.mask.pixels_mut() {
            *p = Luma([0u8]);
        }
    }

    /// Constrain all subsequent paint primitives to `bounds` (or lift the
    /// constraint with `None`).
    pub fn set_clip(&mut self, bounds: Option<&BoundingBox>) {
        self.clip = bounds.map(|b| {
            let (x, y, w, h) = b.to_pixel_rect(self.width(), self.height());
            (x, y, x + w, y + h)
        });
    }

    #[inline]
    fn write(&mut self, x: u32, y: u32, value: u8) {
        if let Some((x0, y0, x1, y1)) = self.clip
            && (x < x0 || x >= x1 || y < y0 || y >= y1)
        {
            return;
        }
        if x < self.mask.width() && y < self.mask.height() {
            self.mask.put_pixel(x, y, Luma([value]));
        }
    }

    pub fn value(&self, x: u32, y: u32) -> u8 {
        self.mask.get_pixel(x, y).0[0]
    }

    pub fn is_selected(&self, x: u32, y: u32) -> bool {
        self.value(x, y) > 0
    }

    pub fn selected_count(&self) -> usize {
        self.mask.pixels().filter(|p| p.0[0] > 0).count()
    }

    pub fn is_empty(&self) -> bool {
        self.mask.pixels().all(|p| p.0[0] == 0)
    }

    // ================================================================
    // Paint primitives
    // ================================================================

    /// Scanline-fill a closed polygon.  Even-odd rule: each row fills between
    /// pairs of edge intersections, so self-intersecting outlines alternate.
    pub fn fill_polygon(&mut self, points: &[Point], mode: SelectionMode) {
        let n = points.len();
        if n < 3 {
            return;
        }
        let value = mode.value();
        let (w, h) = (self.mask.width(), self.mask.height());

        for y in 0..h {
            let yf = y as f32 + 0.5; // centre of pixel row
            let mut nodes: Vec<f32> = Vec::new();
            // Walk polygon edges (including closing edge n-1 → 0)
            for i in 0..n {
                let j = (i + 1) % n;
                let yi = points[i].y;
                let yj = points[j].y;
                // Check if this edge crosses the scanline
                if (yi < yf && yj >= yf) || (yj < yf && yi >= yf) {
                    let t = (yf - yi) / (yj - yi);
                    let x = points[i].x + t * (points[j].x - points[i].x);
                    nodes.push(x);
                }
            }
            nodes.sort_by(|a, b| a.partial_cmp(b).unwrap_or(std::cmp::Ordering::Equal));
            // Fill between pairs of intersections
            let mut k = 0;
            while k + 1 < nodes.len() {
                let x_start = (nodes[k].max(0.0) as u32).min(w);
                let x_end = ((nodes[k + 1] + 1.0).max(0.0) as u32).min(w);
                for x in x_start..x_end {
                    self.write(x, y, value);
                }
                k += 2;
            }
        }
    }

    /// Rasterize a stroke as a round-capped, round-joined polyline of the
    /// given width: dense circle stamping along each segment.  A single
    /// point renders as one filled circle of radius `width / 2`.
    pub fn paint_stroke(&mut self, points: &[Point], width: f32, mode: SelectionMode) {
        if points.is_empty() {
            return;
        }
        let radius = (width / 2.0).max(0.5);
        let value = mode.value();

        if points.len() == 1 {
            self.stamp_circle(points[0].x, points[0].y, radius, value);
            return;
        }

        for pair in points.windows(2) {
            let (a, b) = (pair[0], pair[1]);
            let dx = b.x - a.x;
            let dy = b.y - a.y;
            let distance = (dx * dx + dy * dy).sqrt();
            if distance < 0.1 {
                self.stamp_circle(a.x, a.y, radius, value);
                continue;
            }
            // Dense per-pixel stepping for smooth coverage
            let steps = distance.ceil() as usize;
            for i in 0..=steps {
                let t = i as f32 / steps as f32;
                self.stamp_circle(a.x + dx * t, a.y + dy * t, radius, value);
            }
        }
    }

    fn stamp_circle(&mut self, cx: f32, cy: f32, radius: f32, value: u8) {
        let (w, h) = (self.mask.width(), self.mask.height());
        if w == 0 || h == 0 {
            return;
        }
        let min_x = (cx - radius).max(0.0) as u32;
        let max_x = ((cx + radius).ceil().max(0.0) as u32).min(w.saturating_sub(1));
        let min_y = (cy - radius).max(0.0) as u32;
        let max_y = ((cy + radius).ceil().max(0.0) as u32).min(h.saturating_sub(1));
        let r_sq = radius * radius;

        for y in min_y..=max_y {
            for x in min_x..=max_x {
                let dx = x as f32 - cx;
                let dy = y as f32 - cy;
                if dx * dx + dy * dy <= r_sq {
                    self.write(x, y, value);
                }
            }
        }
    }

    // ================================================================
    // Morphology
    // ================================================================

    /// Expands (dilates) the selection by `radius` pixels using a circular
    /// structuring element.
    pub fn dilate(&mut self, radius: u32) {
        if radius == 0 {
            return;
        }
        let (w, h) = (self.mask.width() as usize, self.mask.height() as usize);
        let data = self.mask.as_raw().clone();
        let r = radius as usize;
        let mut out = data.clone();

        for y in 0..h {
            for x in 0..w {
                if data[y * w + x] > 127 {
                    continue; // already selected
                }
                let x0 = x.saturating_sub(r);
                let x1 = (x + r).min(w - 1);
                let y0 = y.saturating_sub(r);
                let y1 = (y + r).min(h - 1);
                let mut found = false;
                'outer: for yy in y0..=y1 {
                    for xx in x0..=x1 {
                        let dx = xx as i32 - x as i32;
                        let dy = yy as i32 - y as i32;
                        if dx * dx + dy * dy <= (r as i32) * (r as i32)
                            && data[yy * w + xx] > 127
                        {
                            found = true;
                            break 'outer;
                        }
                    }
                }
                if found {
                    out[y * w + x] = 255;
                }
            }
        }

        if let Some(mask) = GrayImage::from_raw(w as u32, h as u32, out) {
            self.mask = mask;
        }
    }

    /// Soften the mask edges with a box-blur approximation of a Gaussian.
    /// Interior stays fully selected; the edge gains a gradual falloff.
    pub fn feather(&mut self, radius: f32) {
        if radius < 1.0 {
            return;
        }
        let (w, h) = (self.mask.width() as usize, self.mask.height() as usize);
        let passes = ((radius / 2.0) as u32).max(1);
        let r = (radius as usize).max(1);
        let mut data = self.mask.as_raw().clone();

        for _ in 0..passes {
            // Horizontal pass
            let mut tmp = data.clone();
            for y in 0..h {
                let row_start = y * w;
                for x in 0..w {
                    let x0 = x.saturating_sub(r);
                    let x1 = (x + r).min(w - 1);
                    let count = x1 - x0 + 1;
                    let mut sum = 0u32;
                    for xi in x0..=x1 {
                        sum += data[row_start + xi] as u32;
                    }
                    tmp[row_start + x] = (sum / count as u32) as u8;
                }
            }
            // Vertical pass
            let mut out = tmp.clone();
            for x in 0..w {
                for y in 0..h {
                    let y0 = y.saturating_sub(r);
                    let y1 = (y + r).min(h - 1);
                    let count = y1 - y0 + 1;
                    let mut sum = 0u32;
                    for yi in y0..=y1 {
                        sum += tmp[yi * w + x] as u32;
                    }
                    out[y * w + x] = (sum / count as u32) as u8;
                }
            }
            data = out;
        }

        if let Some(mask) = GrayImage::from_raw(w as u32, h as u32, data) {
            self.mask = mask;
        }
    }

    // ================================================================
    // Export
    // ================================================================

    /// Copy out the sub-mask covered by `bounds` (clipped to the raster).
    pub fn crop(&self, bounds: &BoundingBox) -> MaskBuffer {
        let (x, y, w, h) = bounds.to_pixel_rect(self.width(), self.height());
        MaskBuffer {
            mask: image::imageops::crop_imm(&self.mask, x, y, w, h).to_image(),
            clip: None,
        }
    }

    /// PNG-encode the raster for transport to the generator.
    pub fn to_png(&self) -> Result<Vec<u8>, DecodeError> {
        let mut buf = std::io::Cursor::new(Vec::new());
        DynamicImage::ImageLuma8(self.mask.clone()).write_to(&mut buf, ImageOutputFormat::Png)?;
        Ok(buf.into_inner())
    }

    /// The full-size black/white mask as a PNG-mimed image, the form the
    /// mask-ready event carries.
    pub fn to_source_image(&self) -> SourceImage {
        let rgba = DynamicImage::ImageLuma8(self.mask.clone()).to_rgba8();
        SourceImage::new(rgba, "image/png")
    }
}
