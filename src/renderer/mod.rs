//! Rendering abstraction layer.
//!
//! *The simulation never touches a pixel buffer directly.*
//! Each frame the caller packs what it wants drawn into a [`View`] and hands it
//! to a type that implements [`Renderer`].
//!
//! * Back-ends only ever borrow the map and the dynamic stores immutably.
//! * A helper blanket-impl [`RendererExt`] adds `draw_frame` so call-sites
//!   stay short.

use glam::DVec4;

use crate::sim::Dynamics;
use crate::world::{Camera, Map, SectorId};

/// Pixel format of the software frame-buffer (0x00RRGGBB).
pub type Rgba = u32;

/// Everything a back-end needs for one frame.
#[derive(Clone, Copy)]
pub struct View<'a> {
    pub map: &'a Map,
    pub dyns: &'a Dynamics,
    pub camera: Camera,
    /// Sector the walk starts from, normally the one holding the camera.
    pub sector: SectorId,
    /// Colour washed over the finished frame, alpha in `w`.
    pub tint: DVec4,
}

/// A renderer that owns an internal scratch buffer for the whole frame.
///
/// `end_frame` hands the finished buffer to a user-supplied closure.
/// Software callers typically forward it to their window-manager.
pub trait Renderer {
    /// (Re)allocate internal scratch for the requested resolution and clear it.
    fn begin_frame(&mut self, width: usize, height: usize);

    /// Rasterise the world as seen from `view.camera`.
    fn draw_view(&mut self, view: &View<'_>);

    /// Finish the frame and **loan** the finished buffer to `submit`.
    ///
    /// * `submit(&[Rgba], w, h)` is run exactly once per frame.
    /// * Software caller passes `|fb, w, h| window.update_with_buffer(fb, w, h)`.
    fn end_frame<F>(&mut self, submit: F)
    where
        F: FnOnce(&[Rgba], usize, usize);
}

/// Convenience blanket-impl with a one-liner `draw_frame` adaptor.
pub trait RendererExt: Renderer {
    fn draw_frame<F>(&mut self, width: usize, height: usize, view: &View<'_>, submit: F)
    where
        F: FnOnce(&[Rgba], usize, usize),
    {
        self.begin_frame(width, height);
        self.draw_view(view);
        self.end_frame(submit);
    }
}
impl<T: Renderer + ?Sized> RendererExt for T {}

pub mod software;

pub use software::Software;
