//! Per-image editing session.
//!
//! Owns the source image, the active selection tool, the optional smart-edit
//! bounding box, and the pending event queue.  Display-space pointer input
//! enters here and is mapped into image space with a mapper built fresh per
//! event.  While a generate round-trip is pending the selection tools are
//! inert; a failed round-trip leaves the mask and box untouched for retry.

use uuid::Uuid;

use crate::components::area::AreaSelect;
use crate::components::bounds::BoxController;
use crate::components::brush::BrushEditor;
use crate::components::lasso::LassoEditor;
use crate::components::{EngineEvent, MaskEditor};
use crate::config::EditorConfig;
use crate::geometry::{BoundingBox, CoordinateMapper};
use crate::image_io::SourceImage;
use crate::mask::{MaskBuffer, SelectionMode};
use crate::ops::compositor::{self, CompositeError, CompositeOptions};

/// Selection tools a session can host.
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub enum ToolKind {
    Brush,
    Lasso,
    AreaSelect,
}

enum ActiveTool {
    Brush(BrushEditor),
    Lasso(LassoEditor),
    Area(AreaSelect),
}

/// Error type for session-level operations.
#[derive(Debug)]
pub enum SessionError {
    /// Generation needs a bounding box and none is set.
    NoBoundingBox,
    /// The active tool has no committed mask to send.
    NoMask,
    /// A generate round-trip is already pending.
    GeneratePending,
    /// `complete_generate` without a matching `begin_generate`.
    NotPending,
    Composite(CompositeError),
}

impl std::fmt::Display for SessionError {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            SessionError::NoBoundingBox => write!(f, "No bounding box is set"),
            SessionError::NoMask => write!(f, "No mask has been committed"),
            SessionError::GeneratePending => write!(f, "A generate request is already pending"),
            SessionError::NotPending => write!(f, "No generate request is pending"),
            SessionError::Composite(e) => write!(f, "Compositing failed: {}", e),
        }
    }
}

impl From<CompositeError> for SessionError {
    fn from(e: CompositeError) -> Self {
        SessionError::Composite(e)
    }
}

/// The payload handed to the external generator: the box crop of the source
/// and of the mask, plus the box itself (kept for the composite-back step).
#[derive(Clone, Debug)]
pub struct GenerateRequest {
    pub source_region: SourceImage,
    pub mask_region: SourceImage,
    pub bounds: BoundingBox,
}

/// The external generative collaborator.  The engine only prepares its
/// input ([`GenerateRequest`]) and composites its output back; transport,
/// retries, and authentication are the implementer's business.
pub trait RegionGenerator {
    fn generate(
        &mut self,
        request: &GenerateRequest,
        prompt: &str,
    ) -> Result<Vec<SourceImage>, GenerateFailure>;
}

/// Opaque failure from the external generator.
#[derive(Debug)]
pub struct GenerateFailure(pub String);

impl std::fmt::Display for GenerateFailure {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "Generate failed: {}", self.0)
    }
}

pub struct EditSession {
    id: Uuid,
    config: EditorConfig,
    source: SourceImage,
    tool: ActiveTool,
    bounds: Option<BoxController>,
    generate_pending: bool,
    pending_bounds: Option<BoundingBox>,
    events: Vec<EngineEvent>,
}

impl EditSession {
    pub fn new(source: SourceImage) -> Self {
        Self::with_config(source, EditorConfig::default())
    }

    pub fn with_config(source: SourceImage, config: EditorConfig) -> Self {
        let id = Uuid::new_v4();
        crate::log_info!(
            "Session {} started ({}x{} {})",
            id,
            source.width(),
            source.height(),
            source.mime_type
        );
        let mut session = Self {
            id,
            config,
            source,
            tool: ActiveTool::Brush(BrushEditor::new(0, 0)),
            bounds: None,
            generate_pending: false,
            pending_bounds: None,
            events: Vec::new(),
        };
        session.tool = session.fresh_tool(ToolKind::Brush);
        session
    }

    pub fn id(&self) -> Uuid {
        self.id
    }

    pub fn source(&self) -> &SourceImage {
        &self.source
    }

    pub fn config(&self) -> &EditorConfig {
        &self.config
    }

    pub fn tool_kind(&self) -> ToolKind {
        match &self.tool {
            ActiveTool::Brush(_) => ToolKind::Brush,
            ActiveTool::Lasso(_) => ToolKind::Lasso,
            ActiveTool::Area(_) => ToolKind::AreaSelect,
        }
    }

    fn fresh_tool(&self, kind: ToolKind) -> ActiveTool {
        let (w, h) = (self.source.width(), self.source.height());
        match kind {
            ToolKind::Brush => {
                let mut editor = BrushEditor::new(w, h);
                editor.set_brush_width(self.config.brush_width);
                if let Some(controller) = &self.bounds {
                    editor.set_clip(Some(controller.bounds()));
                    let _ = editor.take_events();
                }
                ActiveTool::Brush(editor)
            }
            ToolKind::Lasso => {
                let mut editor = LassoEditor::new(w, h);
                editor.set_close_threshold(self.config.lasso_close_threshold);
                if let Some(controller) = &self.bounds {
                    editor.set_clip(Some(controller.bounds()));
                    let _ = editor.take_events();
                }
                ActiveTool::Lasso(editor)
            }
            ToolKind::AreaSelect => {
                let mut area = AreaSelect::new();
                area.set_min_size(self.config.area_min_size);
                ActiveTool::Area(area)
            }
        }
    }

    /// Switch tools.  Masks are never shared between editors, so the old
    /// tool's mask is discarded; owners holding one get a `MaskReady(None)`.
    /// Inert while a generate round-trip is pending.
    pub fn select_tool(&mut self, kind: ToolKind) {
        if self.generate_pending || self.tool_kind() == kind {
            return;
        }
        let had_mask = match &self.tool {
            ActiveTool::Brush(editor) => !editor.committed_strokes().is_empty(),
            ActiveTool::Lasso(editor) => !editor.committed_shapes().is_empty(),
            ActiveTool::Area(_) => false,
        };
        self.tool = self.fresh_tool(kind);
        if had_mask {
            self.events.push(EngineEvent::MaskReady(None));
        }
    }

    pub fn brush(&mut self) -> Option<&mut BrushEditor> {
        match &mut self.tool {
            ActiveTool::Brush(editor) => Some(editor),
            _ => None,
        }
    }

    pub fn lasso(&mut self) -> Option<&mut LassoEditor> {
        match &mut self.tool {
            ActiveTool::Lasso(editor) => Some(editor),
            _ => None,
        }
    }

    /// The active tool's committed mask (area select has none).
    pub fn mask(&self) -> Option<&MaskBuffer> {
        match &self.tool {
            ActiveTool::Brush(editor) => Some(editor.mask()),
            ActiveTool::Lasso(editor) => Some(editor.mask()),
            ActiveTool::Area(_) => None,
        }
    }

    pub fn set_selection_mode(&mut self, mode: SelectionMode) {
        match &mut self.tool {
            ActiveTool::Brush(editor) => editor.set_mode(mode),
            ActiveTool::Lasso(editor) => editor.set_mode(mode),
            ActiveTool::Area(_) => {}
        }
    }

    // ================================================================
    // Bounding box
    // ================================================================

    /// Place (or replace) the smart-edit box; the active editor's
    /// rasterization is clipped to it from now on.
    pub fn set_bounds(&mut self, bounds: BoundingBox) {
        if self.generate_pending {
            return;
        }
        let mut controller =
            BoxController::new(bounds, self.source.width(), self.source.height());
        controller.set_handle_radius(self.config.handle_radius);
        self.bounds = Some(controller);
        self.sync_clip();
    }

    pub fn clear_bounds(&mut self) {
        if self.generate_pending {
            return;
        }
        self.bounds = None;
        self.sync_clip();
    }

    pub fn bounds(&self) -> Option<BoundingBox> {
        self.bounds.as_ref().map(|c| c.bounds())
    }

    fn sync_clip(&mut self) {
        let clip = self.bounds.as_ref().map(|c| c.bounds());
        match &mut self.tool {
            ActiveTool::Brush(editor) => editor.set_clip(clip),
            ActiveTool::Lasso(editor) => editor.set_clip(clip),
            ActiveTool::Area(_) => {}
        }
    }

    // ================================================================
    // Pointer routing
    // ================================================================

    /// Route a pointer-down.  `display_w`/`display_h` is the display
    /// element's current rendered size, passed on every event because the
    /// element may resize between frames.
    pub fn pointer_down(&mut self, display_x: f32, display_y: f32, display_w: f32, display_h: f32) {
        if self.generate_pending {
            return;
        }
        let mapper = self.mapper(display_w, display_h);
        let p = mapper.to_image_space(display_x, display_y);

        // The box controller wins when the press lands on it.
        if let Some(controller) = &mut self.bounds
            && controller.pointer_down(p)
        {
            return;
        }

        match &mut self.tool {
            ActiveTool::Brush(editor) => editor.begin_stroke(p),
            ActiveTool::Lasso(editor) => {
                editor.set_close_threshold(self.config.lasso_close_threshold * mapper.scale_x());
                editor.add_vertex(p);
            }
            ActiveTool::Area(area) => area.pointer_down(p),
        }
    }

    pub fn pointer_move(&mut self, display_x: f32, display_y: f32, display_w: f32, display_h: f32) {
        if self.generate_pending {
            return;
        }
        let mapper = self.mapper(display_w, display_h);
        let p = mapper.to_image_space(display_x, display_y);

        if let Some(controller) = &mut self.bounds
            && controller.is_dragging()
        {
            // The editor clip resyncs once on pointer-up, not per move.
            controller.pointer_move(p);
            return;
        }

        match &mut self.tool {
            ActiveTool::Brush(editor) => editor.extend_stroke(p),
            ActiveTool::Lasso(_) => {} // hover preview is pulled, not pushed
            ActiveTool::Area(area) => area.pointer_move(p),
        }
    }

    pub fn pointer_up(&mut self, display_x: f32, display_y: f32, display_w: f32, display_h: f32) {
        if self.generate_pending {
            return;
        }
        let mapper = self.mapper(display_w, display_h);
        let p = mapper.to_image_space(display_x, display_y);

        if let Some(controller) = &mut self.bounds
            && controller.is_dragging()
        {
            controller.pointer_move(p);
            controller.pointer_up();
            self.sync_clip();
            return;
        }

        match &mut self.tool {
            ActiveTool::Brush(editor) => editor.commit_stroke(),
            ActiveTool::Lasso(_) => {} // lasso commits on closing click
            ActiveTool::Area(area) => {
                area.pointer_move(p);
                area.pointer_up(&self.source);
            }
        }
    }

    fn mapper(&self, display_w: f32, display_h: f32) -> CoordinateMapper {
        CoordinateMapper::new(
            display_w,
            display_h,
            self.source.width() as f32,
            self.source.height() as f32,
        )
    }

    // ================================================================
    // History forwarding
    // ================================================================

    pub fn undo(&mut self) {
        if self.generate_pending {
            return;
        }
        match &mut self.tool {
            ActiveTool::Brush(editor) => editor.undo(),
            ActiveTool::Lasso(editor) => editor.undo(),
            ActiveTool::Area(_) => {}
        }
    }

    pub fn redo(&mut self) {
        if self.generate_pending {
            return;
        }
        match &mut self.tool {
            ActiveTool::Brush(editor) => editor.redo(),
            ActiveTool::Lasso(editor) => editor.redo(),
            ActiveTool::Area(_) => {}
        }
    }

    pub fn clear_selection(&mut self) {
        if self.generate_pending {
            return;
        }
        match &mut self.tool {
            ActiveTool::Brush(editor) => editor.clear(),
            ActiveTool::Lasso(editor) => editor.clear(),
            ActiveTool::Area(area) => area.cancel(),
        }
    }

    // ================================================================
    // Generate round-trip
    // ================================================================

    pub fn is_generate_pending(&self) -> bool {
        self.generate_pending
    }

    /// Crop source + mask to the box and gate the editors until the host
    /// reports completion or failure.
    pub fn begin_generate(&mut self) -> Result<GenerateRequest, SessionError> {
        if self.generate_pending {
            return Err(SessionError::GeneratePending);
        }
        let bounds = self
            .bounds
            .as_ref()
            .map(|c| c.bounds())
            .ok_or(SessionError::NoBoundingBox)?;
        let mask = self.mask().ok_or(SessionError::NoMask)?;
        if mask.is_empty() {
            return Err(SessionError::NoMask);
        }

        let (source_region, mask_region) = compositor::crop_region(&self.source, mask, &bounds)?;
        self.generate_pending = true;
        self.pending_bounds = Some(bounds);
        crate::log_info!(
            "Session {}: generate started for box ({:.0},{:.0} {:.0}x{:.0})",
            self.id,
            bounds.x,
            bounds.y,
            bounds.width,
            bounds.height
        );
        Ok(GenerateRequest {
            source_region,
            mask_region,
            bounds,
        })
    }

    /// Composite the regenerated region back.  On success the gate lifts
    /// and the result is returned.  The session keeps its source unchanged;
    /// adopting the result as the new source is the host's call
    /// (via [`EditSession::load_image`]).
    pub fn complete_generate(
        &mut self,
        region: &SourceImage,
        options: &CompositeOptions,
    ) -> Result<SourceImage, SessionError> {
        if !self.generate_pending {
            return Err(SessionError::NotPending);
        }
        let bounds = self.pending_bounds.ok_or(SessionError::NotPending)?;
        let mask = self.mask().ok_or(SessionError::NoMask)?;

        let result = compositor::composite(&self.source, region, &bounds, mask, options);
        match result {
            Ok(image) => {
                self.generate_pending = false;
                self.pending_bounds = None;
                crate::log_info!("Session {}: generate composited", self.id);
                Ok(image)
            }
            Err(e) => {
                // Leave the gate and the selection intact so the host can
                // retry with a corrected region.
                crate::log_err!("Session {}: composite failed: {}", self.id, e);
                Err(e.into())
            }
        }
    }

    /// The host's generate call failed.  Lift the gate; mask and box stay
    /// exactly as they were so the user can retry.
    pub fn fail_generate(&mut self) {
        if self.generate_pending {
            crate::log_warn!("Session {}: generate failed, selection preserved", self.id);
        }
        self.generate_pending = false;
        self.pending_bounds = None;
    }

    // ================================================================
    // Image lifecycle
    // ================================================================

    /// Replace the source image.  In-progress gestures are cancelled without
    /// committing, and mask/history/box are discarded, since they were
    /// dimensioned for the old image.  Emits `MaskReady(None)`.
    pub fn load_image(&mut self, source: SourceImage) {
        crate::log_info!(
            "Session {}: new image {}x{} {}",
            self.id,
            source.width(),
            source.height(),
            source.mime_type
        );
        let kind = self.tool_kind();
        self.source = source;
        self.bounds = None;
        self.generate_pending = false;
        self.pending_bounds = None;
        self.tool = self.fresh_tool(kind);
        self.events.push(EngineEvent::MaskReady(None));
    }

    // ================================================================
    // Events
    // ================================================================

    /// Drain every pending event, session-level first, then the active
    /// tool's, in arrival order.
    pub fn take_events(&mut self) -> Vec<EngineEvent> {
        let mut events = std::mem::take(&mut self.events);
        match &mut self.tool {
            ActiveTool::Brush(editor) => events.extend(editor.take_events()),
            ActiveTool::Lasso(editor) => events.extend(editor.take_events()),
            ActiveTool::Area(area) => events.extend(area.take_events()),
        }
        events
    }
}
