//! The main render pass and its frame buffers.

use crate::command::{CommandBuffer, CommandBufferState, CommandOp};
use crate::driver::Driver;
use crate::error::Result;
use ash::vk;

/// Clear values used when the render pass begins.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct ClearValues {
    pub color: [f32; 4],
    pub depth: f32,
    pub stencil: u32,
}

/// The single render pass: one color and one depth attachment, one subpass.
#[derive(Debug)]
pub struct RenderPass {
    handle: vk::RenderPass,
    render_area: vk::Rect2D,
    clear: ClearValues,
    /// Diagnostic only, never consulted to gate calls.
    state: CommandBufferState,
}

impl RenderPass {
    pub fn new(
        driver: &impl Driver,
        color_format: vk::Format,
        depth_format: vk::Format,
        render_area: vk::Rect2D,
        clear: ClearValues,
    ) -> Result<Self> {
        let handle = driver.create_render_pass(color_format, depth_format)?;
        tracing::info!("Main render pass created.");

        Ok(Self {
            handle,
            render_area,
            clear,
            state: CommandBufferState::Ready,
        })
    }

    pub const fn handle(&self) -> vk::RenderPass {
        self.handle
    }

    pub const fn render_area(&self) -> vk::Rect2D {
        self.render_area
    }

    pub const fn state(&self) -> CommandBufferState {
        self.state
    }

    pub const fn clear_values(&self) -> ClearValues {
        self.clear
    }

    /// Resize the render area after the swapchain changed size.
    pub fn set_extent(&mut self, extent: vk::Extent2D) {
        self.render_area.extent = extent;
    }

    /// Begin the pass on `command_buffer`, targeting `framebuffer`.
    pub fn begin(
        &mut self,
        driver: &impl Driver,
        command_buffer: &mut CommandBuffer,
        framebuffer: &FrameBuffer,
    ) {
        command_buffer.apply(CommandOp::BeginRenderPass);

        let clear_values = [
            vk::ClearValue {
                color: vk::ClearColorValue {
                    float32: self.clear.color,
                },
            },
            vk::ClearValue {
                depth_stencil: vk::ClearDepthStencilValue {
                    depth: self.clear.depth,
                    stencil: self.clear.stencil,
                },
            },
        ];

        driver.cmd_begin_render_pass(
            command_buffer.handle(),
            self.handle,
            framebuffer.handle(),
            self.render_area,
            &clear_values,
        );
        self.state = CommandBufferState::InRenderPass;
    }

    pub fn end(&mut self, driver: &impl Driver, command_buffer: &mut CommandBuffer) {
        command_buffer.apply(CommandOp::EndRenderPass);
        driver.cmd_end_render_pass(command_buffer.handle());
        self.state = CommandBufferState::Recording;
    }

    pub fn destroy(&mut self, driver: &impl Driver) {
        if self.handle != vk::RenderPass::null() {
            driver.destroy_render_pass(self.handle);
            self.handle = vk::RenderPass::null();
        }
        self.state = CommandBufferState::NotAllocated;
    }
}

/// A frame buffer for one swapchain image.
#[derive(Debug)]
pub struct FrameBuffer {
    handle: vk::Framebuffer,
    attachments: Vec<vk::ImageView>,
    extent: vk::Extent2D,
}

impl FrameBuffer {
    pub fn new(
        driver: &impl Driver,
        render_pass: &RenderPass,
        attachments: &[vk::ImageView],
        extent: vk::Extent2D,
    ) -> Result<Self> {
        let handle = driver.create_framebuffer(render_pass.handle(), attachments, extent)?;
        Ok(Self {
            handle,
            attachments: attachments.to_vec(),
            extent,
        })
    }

    pub const fn handle(&self) -> vk::Framebuffer {
        self.handle
    }

    /// Views this frame buffer was built from, color first.
    pub fn attachments(&self) -> &[vk::ImageView] {
        &self.attachments
    }

    pub const fn extent(&self) -> vk::Extent2D {
        self.extent
    }

    pub fn destroy(&mut self, driver: &impl Driver) {
        driver.destroy_framebuffer(self.handle);
        self.handle = vk::Framebuffer::null();
        self.attachments.clear();
    }
}
