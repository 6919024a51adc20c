//! Injected tool configuration.
//!
//! The engine holds no storage of its own; the host loads/saves these
//! values wherever it keeps user presets and hands them to the session.

use serde::{Deserialize, Serialize};

#[derive(Clone, Copy, Debug, Serialize, Deserialize)]
pub struct EditorConfig {
    /// Brush stroke width in image pixels.
    pub brush_width: f32,
    /// Lasso closing distance, tuned for a 1:1 display; rescaled per pointer
    /// event by the display-to-image ratio.
    pub lasso_close_threshold: f32,
    /// Smallest allowed bounding-box edge, in image pixels.
    pub min_box_size: f32,
    /// Hit radius for box resize handles, in image pixels.
    pub handle_radius: f32,
    /// Smallest area-select drag that still counts, in image pixels.
    pub area_min_size: f32,
    /// Default mask expansion for compositing.
    pub expansion: u32,
    /// Default feathered-seam width for compositing.
    pub edge_blend: u32,
}

impl Default for EditorConfig {
    fn default() -> Self {
        Self {
            brush_width: 40.0,
            lasso_close_threshold: 20.0,
            min_box_size: 20.0,
            handle_radius: 12.0,
            area_min_size: 10.0,
            expansion: 4,
            edge_blend: 8,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn defaults_are_sane() {
        let config = EditorConfig::default();
        assert!(config.brush_width > 0.0);
        assert_eq!(config.min_box_size, 20.0);
        assert_eq!(config.area_min_size, 10.0);
    }
}
