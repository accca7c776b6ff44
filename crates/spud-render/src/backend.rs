//! Renderer backend interface.

use spud_core::GlobalUniforms;
use spud_gpu::Result;

/// Graphics APIs the frontend can drive.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub enum BackendKind {
    #[default]
    Vulkan,
}

/// Frame-level contract a graphics backend offers to the frontend.
pub trait RenderBackend {
    /// Which API this backend drives.
    fn kind(&self) -> BackendKind;

    /// Prepare a frame. `Ok(false)` means skip this tick and try again.
    fn begin_frame(&mut self, delta_time: f32) -> Result<bool>;

    /// Hand the frame's global shader state to the backend.
    fn update_global_state(&mut self, uniforms: &GlobalUniforms);

    /// Submit and present the frame begun by the last successful `begin_frame`.
    fn end_frame(&mut self, delta_time: f32) -> Result<()>;

    /// The window's framebuffer changed size.
    fn resized(&mut self, width: u32, height: u32);

    /// Release GPU resources. Called once before the backend is dropped.
    fn shutdown(&mut self);
}
