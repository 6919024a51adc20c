//! Rectangular area-select gesture.
//!
//! A plain drag that crops the dragged rectangle out of the source image on
//! release.  Gestures smaller than the minimum size in either dimension are
//! discarded silently; no event fires.

use crate::components::EngineEvent;
use crate::geometry::{BoundingBox, Point};
use crate::image_io::SourceImage;

pub struct AreaSelect {
    drag_start: Option<Point>,
    drag_end: Option<Point>,
    dragging: bool,
    min_size: f32,
    events: Vec<EngineEvent>,
}

impl AreaSelect {
    pub const MIN_SIZE: f32 = 10.0;

    pub fn new() -> Self {
        Self {
            drag_start: None,
            drag_end: None,
            dragging: false,
            min_size: Self::MIN_SIZE,
            events: Vec::new(),
        }
    }

    pub fn set_min_size(&mut self, min_size: f32) {
        self.min_size = min_size.max(1.0);
    }

    pub fn is_dragging(&self) -> bool {
        self.dragging
    }

    /// The rectangle dragged so far, for overlay rendering.
    pub fn current_rect(&self) -> Option<BoundingBox> {
        match (self.drag_start, self.drag_end) {
            (Some(a), Some(b)) if self.dragging => Some(BoundingBox::from_corners(a, b)),
            _ => None,
        }
    }

    pub fn pointer_down(&mut self, p: Point) {
        self.drag_start = Some(p);
        self.drag_end = Some(p);
        self.dragging = true;
    }

    pub fn pointer_move(&mut self, p: Point) {
        if self.dragging {
            self.drag_end = Some(p);
        }
    }

    /// Finish the drag.  Crops and emits when the rectangle reaches the
    /// minimum size in both dimensions; otherwise the gesture is dropped.
    pub fn pointer_up(&mut self, source: &SourceImage) {
        if !self.dragging {
            return;
        }
        self.dragging = false;
        let (Some(a), Some(b)) = (self.drag_start.take(), self.drag_end.take()) else {
            return;
        };

        let mut bounds = BoundingBox::from_corners(a, b);
        // Clip to the image before the size check; off-image drag slack
        // should not count toward the selected area.
        let (x, y, w, h) = bounds.to_pixel_rect(source.width(), source.height());
        bounds = BoundingBox::new(x as f32, y as f32, w as f32, h as f32);
        if bounds.width < self.min_size || bounds.height < self.min_size {
            return;
        }

        let image = source.crop(&bounds);
        self.events.push(EngineEvent::AreaSelected { image, bounds });
    }

    pub fn cancel(&mut self) {
        self.dragging = false;
        self.drag_start = None;
        self.drag_end = None;
    }

    pub fn take_events(&mut self) -> Vec<EngineEvent> {
        std::mem::take(&mut self.events)
    }
}

impl Default for AreaSelect {
    fn default() -> Self {
        Self::new()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use image::RgbaImage;

    fn source() -> SourceImage {
        SourceImage::new(RgbaImage::new(128, 96), "image/png")
    }

    #[test]
    fn large_drag_emits_cropped_selection() {
        let src = source();
        let mut area = AreaSelect::new();
        area.pointer_down(Point::new(20.0, 30.0));
        area.pointer_move(Point::new(80.0, 70.0));
        area.pointer_up(&src);

        let events = area.take_events();
        assert_eq!(events.len(), 1);
        let EngineEvent::AreaSelected { image, bounds } = &events[0] else {
            panic!("expected AreaSelected");
        };
        assert_eq!(*bounds, BoundingBox::new(20.0, 30.0, 60.0, 40.0));
        assert_eq!((image.width(), image.height()), (60, 40));
    }

    #[test]
    fn reverse_drag_direction_normalizes() {
        let src = source();
        let mut area = AreaSelect::new();
        area.pointer_down(Point::new(80.0, 70.0));
        area.pointer_move(Point::new(20.0, 30.0));
        area.pointer_up(&src);

        let events = area.take_events();
        let EngineEvent::AreaSelected { bounds, .. } = &events[0] else {
            panic!("expected AreaSelected");
        };
        assert_eq!(*bounds, BoundingBox::new(20.0, 30.0, 60.0, 40.0));
    }

    #[test]
    fn tiny_drag_is_discarded_silently() {
        let src = source();
        let mut area = AreaSelect::new();
        area.pointer_down(Point::new(20.0, 30.0));
        area.pointer_move(Point::new(28.0, 60.0)); // 8 px wide, below minimum
        area.pointer_up(&src);
        assert!(area.take_events().is_empty());
    }

    #[test]
    fn cancel_drops_gesture_without_event() {
        let src = source();
        let mut area = AreaSelect::new();
        area.pointer_down(Point::new(20.0, 30.0));
        area.pointer_move(Point::new(80.0, 70.0));
        area.cancel();
        area.pointer_up(&src);
        assert!(area.take_events().is_empty());
        assert!(area.current_rect().is_none());
    }
}
