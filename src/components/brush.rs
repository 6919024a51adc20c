//! Freehand brush selection editor.
//!
//! Pointer-down starts a stroke, pointer-moves extend it, pointer-up commits
//! it as one history item.  While the stroke is in progress only a preview
//! raster is updated incrementally; the authoritative mask is rebuilt from
//! the full committed list at commit time, so undo/redo replay is exact.

use serde::{Deserialize, Serialize};

use crate::components::history::EditHistory;
use crate::components::{EngineEvent, MaskEditor};
use crate::geometry::{BoundingBox, Point};
use crate::mask::{MaskBuffer, SelectionMode};

/// A committed freehand stroke.  Immutable once committed; point order is
/// paint order and is preserved for exact replay.
#[derive(Clone, Debug, Serialize, Deserialize)]
pub struct Stroke {
    pub points: Vec<Point>,
    pub width: f32,
    pub mode: SelectionMode,
}

pub struct BrushEditor {
    mask: MaskBuffer,
    /// Live feedback raster: committed content plus the in-progress stroke.
    preview: MaskBuffer,
    history: EditHistory<Stroke>,
    in_progress: Option<Stroke>,
    brush_width: f32,
    mode: SelectionMode,
    clip: Option<BoundingBox>,
    events: Vec<EngineEvent>,
}

impl BrushEditor {
    pub const DEFAULT_WIDTH: f32 = 40.0;

    pub fn new(image_w: u32, image_h: u32) -> Self {
        Self {
            mask: MaskBuffer::new(image_w, image_h),
            preview: MaskBuffer::new(image_w, image_h),
            history: EditHistory::new(),
            in_progress: None,
            brush_width: Self::DEFAULT_WIDTH,
            mode: SelectionMode::Add,
            clip: None,
            events: Vec::new(),
        }
    }

    pub fn brush_width(&self) -> f32 {
        self.brush_width
    }

    /// Takes effect for the next stroke; the in-progress stroke keeps the
    /// width it started with.
    pub fn set_brush_width(&mut self, width: f32) {
        self.brush_width = width.max(1.0);
    }

    pub fn mode(&self) -> SelectionMode {
        self.mode
    }

    pub fn set_mode(&mut self, mode: SelectionMode) {
        self.mode = mode;
    }

    pub fn is_stroke_active(&self) -> bool {
        self.in_progress.is_some()
    }

    /// Live feedback raster for overlay rendering.
    pub fn preview(&self) -> &MaskBuffer {
        &self.preview
    }

    pub fn committed_strokes(&self) -> &[Stroke] {
        self.history.committed()
    }

    pub fn can_undo(&self) -> bool {
        self.history.can_undo()
    }

    pub fn can_redo(&self) -> bool {
        self.history.can_redo()
    }

    pub fn begin_stroke(&mut self, p: Point) {
        // One gesture at a time: a dangling stroke is abandoned, not committed.
        self.cancel();
        let stroke = Stroke {
            points: vec![p],
            width: self.brush_width,
            mode: self.mode,
        };
        self.preview
            .paint_stroke(&stroke.points, stroke.width, stroke.mode);
        self.in_progress = Some(stroke);
    }

    pub fn extend_stroke(&mut self, p: Point) {
        let Some(stroke) = self.in_progress.as_mut() else {
            return;
        };
        // Incrementally rasterize only the new segment into the preview;
        // the mask itself is rebuilt at commit.
        if let Some(&prev) = stroke.points.last() {
            self.preview
                .paint_stroke(&[prev, p], stroke.width, stroke.mode);
        }
        stroke.points.push(p);
    }

    pub fn commit_stroke(&mut self) {
        if let Some(stroke) = self.in_progress.take() {
            self.history.commit(stroke);
            self.rebuild();
        }
    }

    /// Replay every committed stroke into a cleared mask, resync the
    /// preview, and queue the mask-ready event.
    fn rebuild(&mut self) {
        self.mask.set_clip(self.clip.as_ref());
        self.mask.clear();
        for stroke in self.history.committed() {
            self.mask
                .paint_stroke(&stroke.points, stroke.width, stroke.mode);
        }
        self.preview = self.mask.clone();

        let payload = if self.history.is_empty() {
            None
        } else {
            Some(self.mask.to_source_image())
        };
        self.events.push(EngineEvent::MaskReady(payload));
    }
}

impl MaskEditor for BrushEditor {
    fn commit(&mut self) {
        self.commit_stroke();
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
        if self.in_progress.take().is_some() {
            self.preview = self.mask.clone();
        }
    }

    fn mask(&self) -> &MaskBuffer {
        &self.mask
    }

    fn set_clip(&mut self, bounds: Option<BoundingBox>) {
        self.clip = bounds;
        self.preview.set_clip(self.clip.as_ref());
        self.rebuild();
    }

    fn take_events(&mut self) -> Vec<EngineEvent> {
        std::mem::take(&mut self.events)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn drag(editor: &mut BrushEditor, from: (f32, f32), to: (f32, f32)) {
        editor.begin_stroke(Point::new(from.0, from.1));
        editor.extend_stroke(Point::new(to.0, to.1));
        editor.commit_stroke();
    }

    #[test]
    fn stroke_scenario_paints_capsule_and_undoes_to_null() {
        let mut editor = BrushEditor::new(512, 512);
        editor.set_brush_width(40.0);
        drag(&mut editor, (100.0, 100.0), (200.0, 100.0));

        let events = editor.take_events();
        assert_eq!(events.len(), 1);
        assert!(matches!(&events[0], EngineEvent::MaskReady(Some(_))));

        let count = editor.mask().selected_count();
        assert!((5_000..=5_600).contains(&count), "unexpected area {}", count);
        assert!(editor.mask().is_selected(150, 100));

        editor.undo();
        let events = editor.take_events();
        assert!(matches!(&events[0], EngineEvent::MaskReady(None)));
        assert_eq!(editor.mask().selected_count(), 0);
    }

    #[test]
    fn undo_redo_inverse_law_is_pixel_exact() {
        let mut editor = BrushEditor::new(128, 128);
        editor.set_brush_width(12.0);
        drag(&mut editor, (10.0, 10.0), (100.0, 40.0));
        editor.set_mode(SelectionMode::Subtract);
        drag(&mut editor, (50.0, 20.0), (60.0, 30.0));
        editor.set_mode(SelectionMode::Add);
        drag(&mut editor, (20.0, 90.0), (110.0, 90.0));

        let reference = editor.mask().as_gray().clone();
        for _ in 0..3 {
            editor.undo();
        }
        assert_eq!(editor.mask().selected_count(), 0);
        for _ in 0..3 {
            editor.redo();
        }
        assert_eq!(editor.mask().as_gray(), &reference);
    }

    #[test]
    fn redo_is_invalidated_by_fresh_commit() {
        let mut editor = BrushEditor::new(64, 64);
        drag(&mut editor, (10.0, 10.0), (20.0, 10.0));
        drag(&mut editor, (10.0, 30.0), (20.0, 30.0));
        editor.undo();
        assert!(editor.can_redo());

        drag(&mut editor, (10.0, 50.0), (20.0, 50.0));
        assert!(!editor.can_redo());
        let before = editor.mask().as_gray().clone();
        editor.redo(); // no-op
        assert_eq!(editor.mask().as_gray(), &before);
    }

    #[test]
    fn clear_signals_null_not_blank_mask() {
        let mut editor = BrushEditor::new(64, 64);
        drag(&mut editor, (10.0, 10.0), (30.0, 30.0));
        editor.take_events();

        editor.clear();
        let events = editor.take_events();
        assert_eq!(events.len(), 1);
        assert!(matches!(&events[0], EngineEvent::MaskReady(None)));
        assert!(!editor.can_undo() && !editor.can_redo());
    }

    #[test]
    fn cancel_discards_in_progress_stroke() {
        let mut editor = BrushEditor::new(64, 64);
        editor.begin_stroke(Point::new(10.0, 10.0));
        editor.extend_stroke(Point::new(40.0, 40.0));
        editor.cancel();
        editor.commit_stroke(); // nothing left to commit
        assert!(editor.take_events().is_empty());
        assert_eq!(editor.mask().selected_count(), 0);
        assert_eq!(editor.preview().selected_count(), 0);
    }

    #[test]
    fn clip_limits_committed_strokes() {
        let mut editor = BrushEditor::new(64, 64);
        editor.set_clip(Some(BoundingBox::new(20.0, 20.0, 20.0, 20.0)));
        editor.take_events();
        editor.set_brush_width(8.0);
        drag(&mut editor, (0.0, 30.0), (63.0, 30.0));
        assert!(editor.mask().is_selected(30, 30));
        assert!(!editor.mask().is_selected(5, 30));
        assert!(!editor.mask().is_selected(60, 30));
    }
}
