//! The device/driver seam.
//!
//! Everything above this trait (swapchain lifecycle, command buffer state,
//! frame synchronization) is backend-neutral bookkeeping over Vulkan's own
//! primitives. [`GpuContext`](crate::GpuContext) implements it on top of ash;
//! tests implement it with a scripted fake.
//!
//! Handles are plain `ash::vk` handles so fences, semaphores and image views
//! stay first-class named primitives at every layer.

use ash::vk;

use crate::error::Result;
use crate::surface::SwapchainSupport;

/// Result of asking the presentation engine for the next image.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum AcquireOutcome {
    /// An image was acquired. `suboptimal` images are still usable this frame.
    Acquired { image_index: u32, suboptimal: bool },
    /// The surface changed and no image was acquired; the swapchain must be rebuilt.
    OutOfDate,
}

/// Result of handing an image back to the presentation engine.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum PresentOutcome {
    Presented,
    Suboptimal,
    OutOfDate,
}

impl PresentOutcome {
    /// Whether the swapchain should be rebuilt before the next frame.
    pub const fn needs_recreate(self) -> bool {
        matches!(self, Self::Suboptimal | Self::OutOfDate)
    }
}

/// Parameters for creating the swapchain object itself.
#[derive(Debug, Clone, Copy)]
pub struct SwapchainDesc {
    pub surface_format: vk::SurfaceFormatKHR,
    pub present_mode: vk::PresentModeKHR,
    pub extent: vk::Extent2D,
    pub min_image_count: u32,
    pub pre_transform: vk::SurfaceTransformFlagsKHR,
    /// Swapchain being replaced, or null.
    pub old_swapchain: vk::SwapchainKHR,
}

/// One queue submission of a frame's command buffer.
#[derive(Debug, Clone, Copy)]
pub struct FrameSubmission {
    pub command_buffer: vk::CommandBuffer,
    /// Waited on before `wait_stage` runs.
    pub wait_semaphore: vk::Semaphore,
    pub wait_stage: vk::PipelineStageFlags,
    /// Signaled when the command buffer completes.
    pub signal_semaphore: vk::Semaphore,
    /// Signaled when the command buffer completes, for the CPU side.
    pub fence: vk::Fence,
}

/// Operations the frame core needs from a graphics device.
///
/// Creation calls report driver failures as errors. Destruction calls are
/// infallible and must only be given handles this driver created.
pub trait Driver {
    /// Block until all queues are idle.
    fn wait_idle(&self) -> Result<()>;

    fn create_fence(&self, signaled: bool) -> Result<vk::Fence>;
    fn destroy_fence(&self, fence: vk::Fence);
    /// Wait for `fence` to be signaled, failing once `timeout_ns` elapses.
    fn wait_for_fence(&self, fence: vk::Fence, timeout_ns: u64) -> Result<()>;
    fn reset_fence(&self, fence: vk::Fence) -> Result<()>;
    fn create_semaphore(&self) -> Result<vk::Semaphore>;
    fn destroy_semaphore(&self, semaphore: vk::Semaphore);

    /// Current surface capabilities, formats and present modes.
    fn query_swapchain_support(&self) -> Result<SwapchainSupport>;
    /// First depth format usable as a depth-stencil attachment, if any.
    fn detect_depth_format(&self) -> Option<vk::Format>;
    fn create_swapchain(&self, desc: &SwapchainDesc) -> Result<(vk::SwapchainKHR, Vec<vk::Image>)>;
    fn destroy_swapchain(&self, swapchain: vk::SwapchainKHR);
    fn create_image_view(
        &self,
        image: vk::Image,
        format: vk::Format,
        aspect: vk::ImageAspectFlags,
    ) -> Result<vk::ImageView>;
    fn destroy_image_view(&self, view: vk::ImageView);
    /// Create a device-local depth image backed by its own allocation.
    fn create_depth_image(&self, format: vk::Format, extent: vk::Extent2D) -> Result<vk::Image>;
    fn destroy_depth_image(&self, image: vk::Image);
    fn acquire_next_image(
        &self,
        swapchain: vk::SwapchainKHR,
        signal_semaphore: vk::Semaphore,
        timeout_ns: u64,
    ) -> Result<AcquireOutcome>;
    fn present(
        &self,
        swapchain: vk::SwapchainKHR,
        wait_semaphore: vk::Semaphore,
        image_index: u32,
    ) -> Result<PresentOutcome>;

    fn create_render_pass(
        &self,
        color_format: vk::Format,
        depth_format: vk::Format,
    ) -> Result<vk::RenderPass>;
    fn destroy_render_pass(&self, render_pass: vk::RenderPass);
    fn create_framebuffer(
        &self,
        render_pass: vk::RenderPass,
        attachments: &[vk::ImageView],
        extent: vk::Extent2D,
    ) -> Result<vk::Framebuffer>;
    fn destroy_framebuffer(&self, framebuffer: vk::Framebuffer);

    /// Allocate from the single graphics command pool.
    fn allocate_command_buffer(&self, level: vk::CommandBufferLevel) -> Result<vk::CommandBuffer>;
    fn free_command_buffer(&self, command_buffer: vk::CommandBuffer);
    fn begin_command_buffer(
        &self,
        command_buffer: vk::CommandBuffer,
        flags: vk::CommandBufferUsageFlags,
    ) -> Result<()>;
    fn end_command_buffer(&self, command_buffer: vk::CommandBuffer) -> Result<()>;
    fn reset_command_buffer(&self, command_buffer: vk::CommandBuffer) -> Result<()>;
    fn cmd_begin_render_pass(
        &self,
        command_buffer: vk::CommandBuffer,
        render_pass: vk::RenderPass,
        framebuffer: vk::Framebuffer,
        render_area: vk::Rect2D,
        clear_values: &[vk::ClearValue],
    );
    fn cmd_end_render_pass(&self, command_buffer: vk::CommandBuffer);
    fn cmd_set_viewport_scissor(
        &self,
        command_buffer: vk::CommandBuffer,
        viewport: vk::Viewport,
        scissor: vk::Rect2D,
    );

    /// Submit to the graphics queue.
    fn submit(&self, submission: &FrameSubmission) -> Result<()>;

    fn create_shader_module(&self, code: &[u32]) -> Result<vk::ShaderModule>;
    fn destroy_shader_module(&self, module: vk::ShaderModule);
}
