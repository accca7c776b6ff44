//! `SpudApp` trait definition.

use spud_core::RenderPacket;
use winit::event::WindowEvent;

use crate::context::AppContext;

/// Trait for Spud applications.
///
/// The framework creates the window and renderer, forwards resize events to
/// the renderer, and draws one frame per redraw using the packet returned by
/// [`SpudApp::render_packet`].
pub trait SpudApp: Sized {
    /// Initialize the application.
    ///
    /// Called once after the window and renderer have been created.
    fn init(ctx: &mut AppContext) -> anyhow::Result<Self>;

    /// Update application state.
    ///
    /// Called every frame before rendering.
    ///
    /// # Arguments
    /// * `ctx` - Application context with renderer and window access
    /// * `dt` - Delta time in seconds since last frame
    fn update(&mut self, ctx: &AppContext, dt: f32);

    /// Build the render packet for this frame.
    ///
    /// Default implementation renders from the origin with an identity view.
    #[allow(unused_variables)]
    fn render_packet(&mut self, ctx: &AppContext, dt: f32) -> RenderPacket {
        RenderPacket::new(dt)
    }

    /// Handle window resize.
    ///
    /// The renderer has already been told about the new size; the swapchain
    /// is rebuilt on the next frame.
    #[allow(unused_variables)]
    fn on_resize(&mut self, ctx: &mut AppContext, width: u32, height: u32) -> anyhow::Result<()> {
        Ok(())
    }

    /// Handle window events.
    ///
    /// Return `true` if the event was handled and should not be processed further.
    #[allow(unused_variables)]
    fn on_event(&mut self, event: &WindowEvent) -> bool {
        false
    }

    /// Cleanup before shutdown. The renderer is still alive when this runs.
    #[allow(unused_variables)]
    fn cleanup(&mut self, ctx: &mut AppContext) {}
}
