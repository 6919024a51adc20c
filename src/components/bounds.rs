//! Interactive bounding-box controller.
//!
//! One authoritative box per editing session, dragged by a move surface and
//! eight resize handles.  Every pointer-move recomputes the candidate box
//! from the drag-start snapshot, enforces the minimum size, then clamps the
//! result fully inside the image, so the box can never leave the image or
//! collapse below the minimum.  Box edits carry no undo history.

use crate::geometry::{BoundingBox, Point};

/// Which part of the box a drag grabs.
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub enum HandleKind {
    Move,
    TopLeft,
    TopRight,
    BottomLeft,
    BottomRight,
    Top,
    Bottom,
    Left,
    Right,
}

#[derive(Clone, Copy, Debug)]
enum DragState {
    Idle,
    Dragging {
        handle: HandleKind,
        start_pointer: Point,
        start_box: BoundingBox,
    },
}

pub struct BoxController {
    bounds: BoundingBox,
    image_w: f32,
    image_h: f32,
    min_size: f32,
    handle_radius: f32,
    drag: DragState,
}

impl BoxController {
    pub const MIN_SIZE: f32 = 20.0;
    pub const DEFAULT_HANDLE_RADIUS: f32 = 12.0;

    pub fn new(bounds: BoundingBox, image_w: u32, image_h: u32) -> Self {
        let mut bounds = bounds;
        bounds.clamp_to_image(image_w as f32, image_h as f32, Self::MIN_SIZE);
        Self {
            bounds,
            image_w: image_w as f32,
            image_h: image_h as f32,
            min_size: Self::MIN_SIZE,
            handle_radius: Self::DEFAULT_HANDLE_RADIUS,
            drag: DragState::Idle,
        }
    }

    pub fn set_handle_radius(&mut self, radius: f32) {
        self.handle_radius = radius.max(1.0);
    }

    /// The current authoritative box.
    pub fn bounds(&self) -> BoundingBox {
        self.bounds
    }

    pub fn is_dragging(&self) -> bool {
        matches!(self.drag, DragState::Dragging { .. })
    }

    /// Corner and edge-midpoint handle positions, for overlay rendering and
    /// hit-testing.
    pub fn handle_positions(&self) -> [(HandleKind, Point); 8] {
        let b = &self.bounds;
        let cx = b.x + b.width / 2.0;
        let cy = b.y + b.height / 2.0;
        [
            (HandleKind::TopLeft, Point::new(b.x, b.y)),
            (HandleKind::TopRight, Point::new(b.right(), b.y)),
            (HandleKind::BottomLeft, Point::new(b.x, b.bottom())),
            (HandleKind::BottomRight, Point::new(b.right(), b.bottom())),
            (HandleKind::Top, Point::new(cx, b.y)),
            (HandleKind::Bottom, Point::new(cx, b.bottom())),
            (HandleKind::Left, Point::new(b.x, cy)),
            (HandleKind::Right, Point::new(b.right(), cy)),
        ]
    }

    /// Which handle (if any) a pointer-down at `p` grabs.  Corners and edge
    /// midpoints win over the move surface; outside the box hits nothing.
    pub fn hit_test(&self, p: Point) -> Option<HandleKind> {
        for (kind, pos) in self.handle_positions() {
            if p.distance_to(&pos) <= self.handle_radius {
                return Some(kind);
            }
        }
        if self.bounds.contains(&p) {
            return Some(HandleKind::Move);
        }
        None
    }

    /// Returns true when the press grabbed a handle and a drag started.
    pub fn pointer_down(&mut self, p: Point) -> bool {
        match self.hit_test(p) {
            Some(handle) => {
                self.drag = DragState::Dragging {
                    handle,
                    start_pointer: p,
                    start_box: self.bounds,
                };
                true
            }
            None => false,
        }
    }

    pub fn pointer_move(&mut self, p: Point) {
        let DragState::Dragging {
            handle,
            start_pointer,
            start_box,
        } = self.drag
        else {
            return;
        };

        let dx = p.x - start_pointer.x;
        let dy = p.y - start_pointer.y;
        let mut b = start_box;

        match handle {
            HandleKind::Move => {
                b.x += dx;
                b.y += dy;
            }
            HandleKind::TopLeft => {
                b.x += dx;
                b.y += dy;
                b.width -= dx;
                b.height -= dy;
            }
            HandleKind::TopRight => {
                b.y += dy;
                b.width += dx;
                b.height -= dy;
            }
            HandleKind::BottomLeft => {
                b.x += dx;
                b.width -= dx;
                b.height += dy;
            }
            HandleKind::BottomRight => {
                b.width += dx;
                b.height += dy;
            }
            HandleKind::Top => {
                b.y += dy;
                b.height -= dy;
            }
            HandleKind::Bottom => {
                b.height += dy;
            }
            HandleKind::Left => {
                b.x += dx;
                b.width -= dx;
            }
            HandleKind::Right => {
                b.width += dx;
            }
        }

        // Minimum size first, anchoring the edge opposite the dragged one so
        // the box pins instead of sliding.
        if b.width < self.min_size {
            if matches!(
                handle,
                HandleKind::TopLeft | HandleKind::BottomLeft | HandleKind::Left
            ) {
                b.x = start_box.right() - self.min_size;
            } else {
                b.x = start_box.x;
            }
            b.width = self.min_size;
        }
        if b.height < self.min_size {
            if matches!(
                handle,
                HandleKind::TopLeft | HandleKind::TopRight | HandleKind::Top
            ) {
                b.y = start_box.bottom() - self.min_size;
            } else {
                b.y = start_box.y;
            }
            b.height = self.min_size;
        }

        b.clamp_to_image(self.image_w, self.image_h, self.min_size);
        self.bounds = b;
    }

    /// Commit the current box as the new authoritative state and end the
    /// interaction.
    pub fn pointer_up(&mut self) {
        self.drag = DragState::Idle;
    }

    /// Abandon the drag, restoring the box from the drag-start snapshot.
    pub fn cancel(&mut self) {
        if let DragState::Dragging { start_box, .. } = self.drag {
            self.bounds = start_box;
        }
        self.drag = DragState::Idle;
    }
}
