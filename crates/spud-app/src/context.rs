//! Application context.

use std::sync::Arc;
use std::time::Instant;

use raw_window_handle::{HasDisplayHandle, HasWindowHandle};
use spud_gpu::RendererConfig;
use spud_render::{BackendKind, RendererFrontend};
use winit::window::Window;

/// Application context shared across all app methods.
pub struct AppContext {
    /// Renderer for the window. Declared before `window` so it is dropped first.
    pub renderer: RendererFrontend,
    /// The window handle.
    pub window: Arc<Window>,
    /// Time of last frame (for delta time calculation).
    pub(crate) last_frame_time: Instant,
}

impl AppContext {
    /// Create the renderer for `window`.
    pub(crate) fn new(window: Arc<Window>, config: &RendererConfig) -> anyhow::Result<Self> {
        let size = window.inner_size();
        let display = window.display_handle()?.as_raw();
        let handle = window.window_handle()?.as_raw();

        let renderer = RendererFrontend::new(
            BackendKind::Vulkan,
            config,
            display,
            handle,
            size.width,
            size.height,
        )?;

        Ok(Self {
            renderer,
            window,
            last_frame_time: Instant::now(),
        })
    }

    /// Frames completed so far.
    pub const fn frame_count(&self) -> u64 {
        self.renderer.frame_number()
    }
}
