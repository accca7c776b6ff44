//! Data handed from the application to the renderer each frame.

use bytemuck::{Pod, Zeroable};
use glam::{Mat4, Vec3, Vec4};

/// Per-frame input to `draw_frame`.
#[derive(Debug, Clone, Copy)]
pub struct RenderPacket {
    /// Seconds since the previous frame.
    pub delta_time: f32,
    /// World-to-view transform.
    pub view: Mat4,
    /// Camera position in world space.
    pub view_position: Vec3,
}

impl RenderPacket {
    /// Packet with an identity view at the origin.
    pub fn new(delta_time: f32) -> Self {
        Self {
            delta_time,
            view: Mat4::IDENTITY,
            view_position: Vec3::ZERO,
        }
    }

    /// Set the view transform and camera position.
    #[must_use]
    pub const fn with_view(mut self, view: Mat4, view_position: Vec3) -> Self {
        self.view = view;
        self.view_position = view_position;
        self
    }
}

/// Global shader state, laid out for a std140 uniform block.
#[repr(C)]
#[derive(Debug, Clone, Copy, PartialEq, Pod, Zeroable)]
pub struct GlobalUniforms {
    pub projection: Mat4,
    pub view: Mat4,
    /// xyz = camera position, w unused.
    pub view_position: Vec4,
    pub ambient_colour: Vec4,
    pub mode: u32,
    pub _padding: [u32; 3],
}

impl GlobalUniforms {
    /// Build the global state for one frame.
    pub fn new(
        projection: Mat4,
        view: Mat4,
        view_position: Vec3,
        ambient_colour: Vec4,
        mode: u32,
    ) -> Self {
        Self {
            projection,
            view,
            view_position: view_position.extend(1.0),
            ambient_colour,
            mode,
            _padding: [0; 3],
        }
    }
}

impl Default for GlobalUniforms {
    fn default() -> Self {
        Self::new(Mat4::IDENTITY, Mat4::IDENTITY, Vec3::ZERO, Vec4::ONE, 0)
    }
}
