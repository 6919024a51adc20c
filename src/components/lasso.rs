//! Lasso (click-to-place polygon) selection editor.
//!
//! Each click appends a vertex.  Once three or more vertices exist, a click
//! landing within the close threshold of the first vertex closes the
//! polygon and commits it as one history item.  Open polygons never enter
//! history; the preview accessor exposes them for overlay rendering.

use serde::{Deserialize, Serialize};

use crate::components::history::EditHistory;
use crate::components::{EngineEvent, MaskEditor};
use crate::geometry::{BoundingBox, Point};
use crate::mask::{MaskBuffer, SelectionMode};

/// A committed closed polygon (at least 3 vertices by construction).
#[derive(Clone, Debug, Serialize, Deserialize)]
pub struct PolygonShape {
    pub points: Vec<Point>,
    pub mode: SelectionMode,
}

/// Overlay-rendering data for the current lasso state.  Committed polygons
/// are drawn filled; the open path as a polyline with a dashed rubber-band
/// segment to the cursor; the first vertex gets a distinct marker so the
/// user can see the closing target.
#[derive(Clone, Debug)]
pub struct LassoPreview<'a> {
    pub committed: &'a [PolygonShape],
    pub open_path: &'a [Point],
    pub rubber_band: Option<[Point; 2]>,
    pub closing_target: Option<Point>,
    /// True when the cursor is within closing range of the first vertex.
    pub will_close: bool,
}

pub struct LassoEditor {
    mask: MaskBuffer,
    history: EditHistory<PolygonShape>,
    /// In-progress open polygon.
    vertices: Vec<Point>,
    /// Closing distance in image pixels.  Display-tuned: the owner rescales
    /// it per pointer event from the current display-to-image ratio.
    close_threshold: f32,
    mode: SelectionMode,
    clip: Option<BoundingBox>,
    events: Vec<EngineEvent>,
}

impl LassoEditor {
    pub const DEFAULT_CLOSE_THRESHOLD: f32 = 20.0;

    pub fn new(image_w: u32, image_h: u32) -> Self {
        Self {
            mask: MaskBuffer::new(image_w, image_h),
            history: EditHistory::new(),
            vertices: Vec::new(),
            close_threshold: Self::DEFAULT_CLOSE_THRESHOLD,
            mode: SelectionMode::Add,
            clip: None,
            events: Vec::new(),
        }
    }

    pub fn set_close_threshold(&mut self, threshold: f32) {
        self.close_threshold = threshold.max(1.0);
    }

    pub fn mode(&self) -> SelectionMode {
        self.mode
    }

    pub fn set_mode(&mut self, mode: SelectionMode) {
        self.mode = mode;
    }

    pub fn vertex_count(&self) -> usize {
        self.vertices.len()
    }

    pub fn committed_shapes(&self) -> &[PolygonShape] {
        self.history.committed()
    }

    pub fn can_undo(&self) -> bool {
        self.history.can_undo()
    }

    pub fn can_redo(&self) -> bool {
        self.history.can_redo()
    }

    /// Append a vertex, or close the polygon when the click lands within
    /// the close threshold of the first vertex (needs ≥3 vertices).
    pub fn add_vertex(&mut self, p: Point) {
        if self.vertices.len() >= 3 && p.distance_to(&self.vertices[0]) < self.close_threshold {
            self.close_polygon();
        } else {
            self.vertices.push(p);
        }
    }

    /// Overlay data; `cursor` is the current pointer position, if hovering.
    pub fn preview(&self, cursor: Option<Point>) -> LassoPreview<'_> {
        let rubber_band = match (self.vertices.last(), cursor) {
            (Some(&last), Some(c)) => Some([last, c]),
            _ => None,
        };
        let will_close = match (self.vertices.first(), cursor) {
            (Some(first), Some(c)) => {
                self.vertices.len() >= 3 && c.distance_to(first) < self.close_threshold
            }
            _ => false,
        };
        LassoPreview {
            committed: self.history.committed(),
            open_path: &self.vertices,
            rubber_band,
            closing_target: self.vertices.first().copied(),
            will_close,
        }
    }

    fn close_polygon(&mut self) {
        let shape = PolygonShape {
            points: std::mem::take(&mut self.vertices),
            mode: self.mode,
        };
        self.history.commit(shape);
        self.rebuild();
    }

    /// Replay every committed polygon into a cleared mask and queue the
    /// mask-ready event.
    fn rebuild(&mut self) {
        self.mask.set_clip(self.clip.as_ref());
        self.mask.clear();
        for shape in self.history.committed() {
            self.mask.fill_polygon(&shape.points, shape.mode);
        }

        let payload = if self.history.is_empty() {
            None
        } else {
            Some(self.mask.to_source_image())
        };
        self.events.push(EngineEvent::MaskReady(payload));
    }
}

impl MaskEditor for LassoEditor {
    /// Explicit close of the open polygon, e.g. a double-click or an
    /// "apply" button.  No-op below 3 vertices: open shapes never commit.
    fn commit(&mut self) {
        if self.vertices.len() >= 3 {
            self.close_polygon();
        }
    }

    fn clear(&mut self) {
        self.cancel();
        self.history.clear();
        self.rebuild();
    }

    fn undo(&mut self) {
        if self.history.undo() {
            self.rebuild();
        }
    }

    fn redo(&mut self) {
        if self.history.redo() {
            self.rebuild();
        }
    }

    fn cancel(&mut self) {
        self.vertices.clear();
    }

    fn mask(&self) -> &MaskBuffer {
        &self.mask
    }

    fn set_clip(&mut self, bounds: Option<BoundingBox>) {
        self.clip = bounds;
        self.rebuild();
    }

    fn take_events(&mut self) -> Vec<EngineEvent> {
        std::mem::take(&mut self.events)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn place_square(editor: &mut LassoEditor, x: f32, y: f32, side: f32) {
        editor.add_vertex(Point::new(x, y));
        editor.add_vertex(Point::new(x + side, y));
        editor.add_vertex(Point::new(x + side, y + side));
        editor.add_vertex(Point::new(x, y + side));
        // Back near the start vertex: closes.
        editor.add_vertex(Point::new(x + 3.0, y + 4.0));
    }

    #[test]
    fn polygon_closes_near_start_and_matches_area() {
        let mut editor = LassoEditor::new(128, 128);
        place_square(&mut editor, 0.0, 0.0, 100.0);

        assert_eq!(editor.vertex_count(), 0);
        assert_eq!(editor.committed_shapes().len(), 1);
        // The closing click is not a 5th vertex.
        assert_eq!(editor.committed_shapes()[0].points.len(), 4);

        let count = editor.mask().selected_count();
        assert!(
            (9_800..=10_400).contains(&count),
            "unexpected area {}",
            count
        );

        let events = editor.take_events();
        assert!(matches!(&events[0], EngineEvent::MaskReady(Some(_))));
    }

    #[test]
    fn far_click_appends_instead_of_closing() {
        let mut editor = LassoEditor::new(128, 128);
        editor.add_vertex(Point::new(0.0, 0.0));
        editor.add_vertex(Point::new(100.0, 0.0));
        editor.add_vertex(Point::new(100.0, 100.0));
        // 50 px from the start, outside the threshold.
        editor.add_vertex(Point::new(50.0, 0.0));
        assert_eq!(editor.vertex_count(), 4);
        assert!(editor.committed_shapes().is_empty());
    }

    #[test]
    fn fewer_than_three_vertices_cannot_close() {
        let mut editor = LassoEditor::new(64, 64);
        editor.add_vertex(Point::new(10.0, 10.0));
        // Within threshold of the first vertex, but only 1 vertex exists:
        // appended, not closed.
        editor.add_vertex(Point::new(12.0, 12.0));
        assert_eq!(editor.vertex_count(), 2);
        editor.commit();
        assert!(editor.committed_shapes().is_empty());
        assert!(editor.take_events().is_empty());
    }

    #[test]
    fn undo_to_empty_signals_null() {
        let mut editor = LassoEditor::new(128, 128);
        place_square(&mut editor, 10.0, 10.0, 50.0);
        editor.take_events();

        editor.undo();
        let events = editor.take_events();
        assert!(matches!(&events[0], EngineEvent::MaskReady(None)));
        assert_eq!(editor.mask().selected_count(), 0);

        editor.redo();
        let events = editor.take_events();
        assert!(matches!(&events[0], EngineEvent::MaskReady(Some(_))));
        assert!(editor.mask().selected_count() > 0);
    }

    #[test]
    fn subtract_polygon_erases() {
        let mut editor = LassoEditor::new(128, 128);
        place_square(&mut editor, 0.0, 0.0, 100.0);
        let full = editor.mask().selected_count();

        editor.set_mode(SelectionMode::Subtract);
        place_square(&mut editor, 20.0, 20.0, 40.0);
        assert!(editor.mask().selected_count() < full);
        assert!(!editor.mask().is_selected(30, 30));
        assert!(editor.mask().is_selected(80, 80));
    }

    #[test]
    fn preview_exposes_rubber_band_and_closing_state() {
        let mut editor = LassoEditor::new(128, 128);
        editor.add_vertex(Point::new(0.0, 0.0));
        editor.add_vertex(Point::new(40.0, 0.0));
        editor.add_vertex(Point::new(40.0, 40.0));

        let preview = editor.preview(Some(Point::new(5.0, 5.0)));
        assert_eq!(preview.open_path.len(), 3);
        assert_eq!(
            preview.rubber_band,
            Some([Point::new(40.0, 40.0), Point::new(5.0, 5.0)])
        );
        assert_eq!(preview.closing_target, Some(Point::new(0.0, 0.0)));
        assert!(preview.will_close);

        let far = editor.preview(Some(Point::new(30.0, 30.0)));
        assert!(!far.will_close);
    }
}
