//! SmartMask: the interactive region-selection & composite-back engine.
//!
//! The core of a "mark a region, regenerate it, merge it back" editing
//! workflow: pointer input in display space becomes a binary selection mask
//! in source-image pixel space (brush strokes, lasso polygons, or a plain
//! rectangle), with shape-level undo/redo and optional clipping to an
//! interactive bounding box.  After an external service regenerates the
//! boxed crop, the compositor pastes it back with a feathered seam so the
//! edit is invisible outside the selection.
//!
//! The generative call itself, networking, and persistence are the host's
//! business; see [`session::RegionGenerator`] for the seam.

pub mod cli;
pub mod components;
pub mod config;
pub mod geometry;
pub mod image_io;
pub mod logger;
pub mod mask;
pub mod ops;
pub mod session;

pub use components::{EngineEvent, MaskEditor};
pub use components::area::AreaSelect;
pub use components::bounds::{BoxController, HandleKind};
pub use components::brush::{BrushEditor, Stroke};
pub use components::history::EditHistory;
pub use components::lasso::{LassoEditor, LassoPreview, PolygonShape};
pub use config::EditorConfig;
pub use geometry::{BoundingBox, CoordinateMapper, Point};
pub use image_io::{DecodeError, SourceImage};
pub use mask::{MaskBuffer, SelectionMode};
pub use ops::compositor::{CompositeError, CompositeOptions, composite, crop_region};
pub use session::{
    EditSession, GenerateFailure, GenerateRequest, RegionGenerator, SessionError, ToolKind,
};
