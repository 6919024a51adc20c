//! Interactive selection editors.
//!
//! Each editor owns its own [`MaskBuffer`](crate::mask::MaskBuffer) and a
//! history of committed shapes; masks are never shared between editors.
//! Editors communicate with their owner through pending events drained with
//! `take_events()`; the owner polls after forwarding pointer input.

pub mod area;
pub mod bounds;
pub mod brush;
pub mod history;
pub mod lasso;

use crate::geometry::BoundingBox;
use crate::image_io::SourceImage;
use crate::mask::MaskBuffer;

/// Events surfaced by editors for the owning layer to consume.
#[derive(Clone, Debug)]
pub enum EngineEvent {
    /// A history mutation produced a new mask (`Some`, full-size PNG-mimed
    /// black/white image), or left the editor with no committed shapes at
    /// all (`None`).  `None` is distinct from an all-black mask: it means
    /// "nothing to send to the generator".
    MaskReady(Option<SourceImage>),
    /// An area-select drag exceeded the minimum size and was released.
    AreaSelected {
        image: SourceImage,
        bounds: BoundingBox,
    },
}

/// The method set every mask-producing editor exposes to its owner.
pub trait MaskEditor {
    /// Finalize the in-progress gesture into history (no-op when nothing is
    /// in progress or the gesture is not committable yet).
    fn commit(&mut self);
    /// Drop all committed shapes and the redo buffer; the mask-ready event
    /// fires with `None`.
    fn clear(&mut self);
    fn undo(&mut self);
    fn redo(&mut self);
    /// Abandon the in-progress gesture without committing it.
    fn cancel(&mut self);
    fn mask(&self) -> &MaskBuffer;
    /// Constrain rasterization to a box (or lift the constraint); committed
    /// shapes are replayed under the new clip.
    fn set_clip(&mut self, bounds: Option<BoundingBox>);
    fn take_events(&mut self) -> Vec<EngineEvent>;
}
