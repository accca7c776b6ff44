//! The renderer frontend used by applications.

use glam::{Mat4, Vec4};
use raw_window_handle::{RawDisplayHandle, RawWindowHandle};
use spud_core::{GlobalUniforms, RenderPacket};
use spud_gpu::{RendererConfig, Result};

use crate::backend::{BackendKind, RenderBackend};
use crate::vulkan::VulkanBackend;

/// Vertical field of view of the frontend's projection.
pub const FIELD_OF_VIEW: f32 = std::f32::consts::FRAC_PI_4;
pub const NEAR_CLIP: f32 = 0.1;
pub const FAR_CLIP: f32 = 1000.0;

/// Ambient colour handed to shaders every frame.
pub const AMBIENT_COLOUR: Vec4 = Vec4::new(0.25, 0.25, 0.25, 1.0);

/// Owns the active backend and turns render packets into frames.
pub struct RendererFrontend {
    backend: Box<dyn RenderBackend>,
    width: u32,
    height: u32,
    frame_number: u64,
}

impl RendererFrontend {
    /// Create a frontend with a backend of `kind` for the given window.
    pub fn new(
        kind: BackendKind,
        config: &RendererConfig,
        display: RawDisplayHandle,
        window: RawWindowHandle,
        width: u32,
        height: u32,
    ) -> Result<Self> {
        let backend: Box<dyn RenderBackend> = match kind {
            BackendKind::Vulkan => {
                Box::new(VulkanBackend::new(config, display, window, width, height)?)
            }
        };
        Ok(Self::with_backend(backend, width, height))
    }

    /// Wrap an already created backend.
    pub fn with_backend(backend: Box<dyn RenderBackend>, width: u32, height: u32) -> Self {
        tracing::info!("Renderer frontend using {:?} backend.", backend.kind());
        Self {
            backend,
            width,
            height,
            frame_number: 0,
        }
    }

    pub fn backend_kind(&self) -> BackendKind {
        self.backend.kind()
    }

    /// Frames completed so far.
    pub const fn frame_number(&self) -> u64 {
        self.frame_number
    }

    pub const fn size(&self) -> (u32, u32) {
        (self.width, self.height)
    }

    /// Perspective projection for the current window size.
    pub fn projection(&self) -> Mat4 {
        // A minimized window has no meaningful aspect.
        #[allow(clippy::cast_precision_loss)]
        let aspect = if self.width == 0 || self.height == 0 {
            1.0
        } else {
            self.width as f32 / self.height as f32
        };
        Mat4::perspective_rh(FIELD_OF_VIEW, aspect, NEAR_CLIP, FAR_CLIP)
    }

    /// Begin a frame, hand it the packet's global state and end it.
    ///
    /// A frame the backend is not ready for is skipped silently.
    pub fn draw_frame(&mut self, packet: &RenderPacket) -> Result<()> {
        if !self.backend.begin_frame(packet.delta_time)? {
            return Ok(());
        }

        let uniforms = GlobalUniforms::new(
            self.projection(),
            packet.view,
            packet.view_position,
            AMBIENT_COLOUR,
            0,
        );
        self.backend.update_global_state(&uniforms);

        if let Err(e) = self.backend.end_frame(packet.delta_time) {
            tracing::error!("end_frame failed. Application shutting down...");
            return Err(e);
        }

        self.frame_number += 1;
        Ok(())
    }

    /// Forward a window resize to the backend.
    pub fn on_resized(&mut self, width: u32, height: u32) {
        self.width = width;
        self.height = height;
        self.backend.resized(width, height);
    }
}

impl Drop for RendererFrontend {
    fn drop(&mut self) {
        self.backend.shutdown();
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use approx::assert_relative_eq;
    use glam::Vec3;
    use spud_gpu::GpuError;
    use std::cell::RefCell;
    use std::rc::Rc;

    #[derive(Debug, Clone, PartialEq)]
    enum Call {
        Begin,
        Update(GlobalUniforms),
        End,
        Resized(u32, u32),
        Shutdown,
    }

    struct FakeBackend {
        calls: Rc<RefCell<Vec<Call>>>,
        ready: bool,
        fail_end: bool,
    }

    impl RenderBackend for FakeBackend {
        fn kind(&self) -> BackendKind {
            BackendKind::Vulkan
        }

        fn begin_frame(&mut self, _delta_time: f32) -> Result<bool> {
            self.calls.borrow_mut().push(Call::Begin);
            Ok(self.ready)
        }

        fn update_global_state(&mut self, uniforms: &GlobalUniforms) {
            self.calls.borrow_mut().push(Call::Update(*uniforms));
        }

        fn end_frame(&mut self, _delta_time: f32) -> Result<()> {
            self.calls.borrow_mut().push(Call::End);
            if self.fail_end {
                Err(GpuError::DeviceLost)
            } else {
                Ok(())
            }
        }

        fn resized(&mut self, width: u32, height: u32) {
            self.calls.borrow_mut().push(Call::Resized(width, height));
        }

        fn shutdown(&mut self) {
            self.calls.borrow_mut().push(Call::Shutdown);
        }
    }

    fn frontend(ready: bool, fail_end: bool) -> (RendererFrontend, Rc<RefCell<Vec<Call>>>) {
        let calls = Rc::new(RefCell::new(Vec::new()));
        let backend = FakeBackend {
            calls: Rc::clone(&calls),
            ready,
            fail_end,
        };
        (RendererFrontend::with_backend(Box::new(backend), 1280, 720), calls)
    }

    #[test]
    fn draw_frame_wraps_begin_update_end() {
        let (mut frontend, calls) = frontend(true, false);
        let view = Mat4::from_translation(Vec3::new(0.0, 0.0, -30.0));
        let packet = RenderPacket::new(0.016).with_view(view, Vec3::new(0.0, 0.0, 30.0));

        frontend.draw_frame(&packet).unwrap();

        let calls = calls.borrow();
        assert_eq!(calls.len(), 3);
        assert_eq!(calls[0], Call::Begin);
        let Call::Update(uniforms) = &calls[1] else {
            panic!("expected global state update, got {:?}", calls[1]);
        };
        assert_eq!(uniforms.view, view);
        assert_eq!(uniforms.projection, frontend.projection());
        assert_eq!(calls[2], Call::End);
        assert_eq!(frontend.frame_number(), 1);
    }

    #[test]
    fn not_ready_frame_is_skipped() {
        let (mut frontend, calls) = frontend(false, false);
        frontend.draw_frame(&RenderPacket::new(0.016)).unwrap();

        assert_eq!(*calls.borrow(), vec![Call::Begin]);
        assert_eq!(frontend.frame_number(), 0);
    }

    #[test]
    fn end_frame_failure_is_returned() {
        let (mut frontend, _calls) = frontend(true, true);
        let result = frontend.draw_frame(&RenderPacket::new(0.016));

        assert!(matches!(result, Err(GpuError::DeviceLost)));
        assert_eq!(frontend.frame_number(), 0);
    }

    #[test]
    fn resize_is_forwarded_and_changes_aspect() {
        let (mut frontend, calls) = frontend(true, false);
        frontend.on_resized(800, 800);

        assert_eq!(*calls.borrow(), vec![Call::Resized(800, 800)]);
        assert_eq!(frontend.size(), (800, 800));

        let expected = Mat4::perspective_rh(FIELD_OF_VIEW, 1.0, NEAR_CLIP, FAR_CLIP);
        let projection = frontend.projection();
        for (a, b) in projection.to_cols_array().iter().zip(expected.to_cols_array()) {
            assert_relative_eq!(*a, b);
        }
    }

    #[test]
    fn minimized_window_keeps_projection_finite() {
        let (mut frontend, _calls) = frontend(true, false);
        frontend.on_resized(0, 0);
        assert!(frontend.projection().is_finite());
    }

    #[test]
    fn backend_is_shut_down_on_drop() {
        let (frontend, calls) = frontend(true, false);
        drop(frontend);
        assert_eq!(*calls.borrow(), vec![Call::Shutdown]);
    }
}
