//! A scripted fake GPU.
//!
//! [`MockDriver`] implements [`Driver`] without touching any graphics API.
//! Handles are unique counters, every call is recorded, submitted work
//! completes immediately, and acquire/present outcomes can be scripted.

use std::collections::{HashMap, HashSet, VecDeque};
use std::sync::Arc;

use ash::vk::{self, Handle};
use parking_lot::Mutex;
use spud_gpu::surface::SwapchainSupport;
use spud_gpu::{
    AcquireOutcome, Driver, FrameSubmission, GpuError, PresentOutcome, Result, SwapchainDesc,
};

/// One recorded driver call.
#[derive(Debug, Clone, Copy, PartialEq)]
pub enum Call {
    WaitIdle,
    CreateFence(vk::Fence),
    DestroyFence(vk::Fence),
    WaitForFence(vk::Fence),
    ResetFence(vk::Fence),
    CreateSemaphore(vk::Semaphore),
    DestroySemaphore(vk::Semaphore),
    CreateSwapchain {
        handle: vk::SwapchainKHR,
        old: vk::SwapchainKHR,
        width: u32,
        height: u32,
    },
    DestroySwapchain(vk::SwapchainKHR),
    CreateImageView(vk::ImageView),
    DestroyImageView(vk::ImageView),
    CreateDepthImage(vk::Image),
    DestroyDepthImage(vk::Image),
    Acquire(vk::Semaphore),
    Present { wait: vk::Semaphore, image_index: u32 },
    CreateRenderPass(vk::RenderPass),
    DestroyRenderPass(vk::RenderPass),
    CreateFramebuffer { handle: vk::Framebuffer, width: u32, height: u32 },
    DestroyFramebuffer(vk::Framebuffer),
    AllocateCommandBuffer(vk::CommandBuffer),
    FreeCommandBuffer(vk::CommandBuffer),
    BeginCommandBuffer(vk::CommandBuffer),
    EndCommandBuffer(vk::CommandBuffer),
    ResetCommandBuffer(vk::CommandBuffer),
    BeginRenderPass {
        command_buffer: vk::CommandBuffer,
        framebuffer: vk::Framebuffer,
        width: u32,
        height: u32,
        clear_value_count: usize,
    },
    EndRenderPass(vk::CommandBuffer),
    SetViewportScissor {
        command_buffer: vk::CommandBuffer,
        y: f32,
        width: f32,
        height: f32,
    },
    Submit {
        command_buffer: vk::CommandBuffer,
        wait: vk::Semaphore,
        signal: vk::Semaphore,
        fence: vk::Fence,
    },
    CreateShaderModule { handle: vk::ShaderModule, words: usize },
    DestroyShaderModule(vk::ShaderModule),
}

/// Driver calls that can be made to fail once.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum Failure {
    WaitIdle,
    CreateFence,
    WaitForFence,
    CreateSwapchain,
    CreateFramebuffer,
    AllocateCommandBuffer,
    Acquire,
    Submit,
    Present,
}

#[derive(Debug)]
struct State {
    next_handle: u64,
    calls: Vec<Call>,
    live: HashSet<u64>,
    /// Fence handle to signaled flag.
    fences: HashMap<vk::Fence, bool>,
    image_count: u32,
    current_extent: Option<vk::Extent2D>,
    formats: Vec<vk::SurfaceFormatKHR>,
    present_modes: Vec<vk::PresentModeKHR>,
    depth_format: Option<vk::Format>,
    /// Image count of the live swapchain, for round-robin acquire.
    swapchain_images: u32,
    next_image: u32,
    acquire_script: VecDeque<AcquireOutcome>,
    present_script: VecDeque<PresentOutcome>,
    failures: HashSet<Failure>,
}

impl State {
    fn handle<H: Handle>(&mut self) -> H {
        self.next_handle += 1;
        self.live.insert(self.next_handle);
        H::from_raw(self.next_handle)
    }

    fn release<H: Handle>(&mut self, handle: H) {
        let raw = handle.as_raw();
        assert!(
            self.live.remove(&raw),
            "destroyed unknown or already destroyed handle {raw:#x}"
        );
    }

    fn record(&mut self, call: Call) {
        tracing::trace!("mock driver: {call:?}");
        self.calls.push(call);
    }

    fn fail(&mut self, failure: Failure) -> bool {
        self.failures.remove(&failure)
    }
}

/// Fake driver shared between the code under test and the test body.
///
/// Clones share state, so a test keeps a clone to inspect the call log after
/// handing the driver to an orchestrator.
#[derive(Debug, Clone)]
pub struct MockDriver {
    state: Arc<Mutex<State>>,
}

impl Default for MockDriver {
    fn default() -> Self {
        Self::new()
    }
}

impl MockDriver {
    /// A driver offering three swapchain images, mailbox presentation and a
    /// D32 depth format. The surface follows the requested size.
    pub fn new() -> Self {
        Self {
            state: Arc::new(Mutex::new(State {
                next_handle: 0,
                calls: Vec::new(),
                live: HashSet::new(),
                fences: HashMap::new(),
                image_count: 3,
                current_extent: None,
                formats: vec![vk::SurfaceFormatKHR {
                    format: vk::Format::B8G8R8A8_UNORM,
                    color_space: vk::ColorSpaceKHR::SRGB_NONLINEAR,
                }],
                present_modes: vec![vk::PresentModeKHR::FIFO, vk::PresentModeKHR::MAILBOX],
                depth_format: Some(vk::Format::D32_SFLOAT),
                swapchain_images: 0,
                next_image: 0,
                acquire_script: VecDeque::new(),
                present_script: VecDeque::new(),
                failures: HashSet::new(),
            })),
        }
    }

    /// Number of images every new swapchain gets.
    #[must_use]
    pub fn with_image_count(self, count: u32) -> Self {
        self.set_image_count(count);
        self
    }

    pub fn set_image_count(&self, count: u32) {
        assert!(count > 0, "a swapchain needs at least one image");
        self.state.lock().image_count = count;
    }

    /// Pin the surface extent, as window systems that dictate it do.
    pub fn set_current_extent(&self, extent: Option<vk::Extent2D>) {
        self.state.lock().current_extent = extent;
    }

    pub fn set_formats(&self, formats: Vec<vk::SurfaceFormatKHR>) {
        self.state.lock().formats = formats;
    }

    pub fn set_present_modes(&self, modes: Vec<vk::PresentModeKHR>) {
        self.state.lock().present_modes = modes;
    }

    pub fn set_depth_format(&self, format: Option<vk::Format>) {
        self.state.lock().depth_format = format;
    }

    /// Queue acquire results. Once the script runs out, images are handed
    /// out round-robin.
    pub fn script_acquire(&self, outcomes: impl IntoIterator<Item = AcquireOutcome>) {
        self.state.lock().acquire_script.extend(outcomes);
    }

    /// Queue acquired image indices.
    pub fn script_images(&self, indices: impl IntoIterator<Item = u32>) {
        self.script_acquire(indices.into_iter().map(|image_index| AcquireOutcome::Acquired {
            image_index,
            suboptimal: false,
        }));
    }

    /// Queue present results. Once the script runs out, presents succeed.
    pub fn script_present(&self, outcomes: impl IntoIterator<Item = PresentOutcome>) {
        self.state.lock().present_script.extend(outcomes);
    }

    /// Make the next call of the given kind fail.
    pub fn fail_next(&self, failure: Failure) {
        self.state.lock().failures.insert(failure);
    }

    /// Every call made so far, in order.
    pub fn calls(&self) -> Vec<Call> {
        self.state.lock().calls.clone()
    }

    pub fn clear_calls(&self) {
        self.state.lock().calls.clear();
    }

    /// Number of recorded calls matching `predicate`.
    pub fn count(&self, predicate: impl Fn(&Call) -> bool) -> usize {
        self.state.lock().calls.iter().filter(|c| predicate(c)).count()
    }

    /// Position of the first recorded call matching `predicate`.
    pub fn position(&self, predicate: impl Fn(&Call) -> bool) -> Option<usize> {
        self.state.lock().calls.iter().position(predicate)
    }

    /// Objects created and not yet destroyed. Swapchain images are owned by
    /// their swapchain and not counted.
    pub fn live_objects(&self) -> usize {
        self.state.lock().live.len()
    }

    /// Whether `fence` is currently signaled.
    pub fn is_signaled(&self, fence: vk::Fence) -> bool {
        self.state.lock().fences.get(&fence).copied().unwrap_or(false)
    }

}

fn injected() -> GpuError {
    GpuError::Vulkan(vk::Result::ERROR_UNKNOWN)
}

impl Driver for MockDriver {
    fn wait_idle(&self) -> Result<()> {
        let mut state = self.state.lock();
        state.record(Call::WaitIdle);
        if state.fail(Failure::WaitIdle) {
            return Err(GpuError::DeviceLost);
        }
        Ok(())
    }

    fn create_fence(&self, signaled: bool) -> Result<vk::Fence> {
        let mut state = self.state.lock();
        if state.fail(Failure::CreateFence) {
            return Err(GpuError::Vulkan(vk::Result::ERROR_OUT_OF_DEVICE_MEMORY));
        }
        let fence = state.handle();
        state.fences.insert(fence, signaled);
        state.record(Call::CreateFence(fence));
        Ok(fence)
    }

    fn destroy_fence(&self, fence: vk::Fence) {
        let mut state = self.state.lock();
        state.release(fence);
        state.fences.remove(&fence);
        state.record(Call::DestroyFence(fence));
    }

    fn wait_for_fence(&self, fence: vk::Fence, timeout_ns: u64) -> Result<()> {
        let mut state = self.state.lock();
        state.record(Call::WaitForFence(fence));
        let signaled = state.fences.get(&fence).copied().unwrap_or(false);
        // Nothing else can signal a fence here, so an unsignaled wait would never end.
        if state.fail(Failure::WaitForFence) || !signaled {
            return Err(GpuError::FenceTimeout {
                timeout_ms: timeout_ns / 1_000_000,
            });
        }
        Ok(())
    }

    fn reset_fence(&self, fence: vk::Fence) -> Result<()> {
        let mut state = self.state.lock();
        state.record(Call::ResetFence(fence));
        state.fences.insert(fence, false);
        Ok(())
    }

    fn create_semaphore(&self) -> Result<vk::Semaphore> {
        let mut state = self.state.lock();
        let semaphore = state.handle();
        state.record(Call::CreateSemaphore(semaphore));
        Ok(semaphore)
    }

    fn destroy_semaphore(&self, semaphore: vk::Semaphore) {
        let mut state = self.state.lock();
        state.release(semaphore);
        state.record(Call::DestroySemaphore(semaphore));
    }

    fn query_swapchain_support(&self) -> Result<SwapchainSupport> {
        let state = self.state.lock();
        let current_extent = state.current_extent.unwrap_or(vk::Extent2D {
            width: u32::MAX,
            height: u32::MAX,
        });
        Ok(SwapchainSupport {
            capabilities: vk::SurfaceCapabilitiesKHR {
                min_image_count: state.image_count.saturating_sub(1).max(1),
                max_image_count: state.image_count,
                current_extent,
                min_image_extent: vk::Extent2D { width: 1, height: 1 },
                max_image_extent: vk::Extent2D {
                    width: 16_384,
                    height: 16_384,
                },
                current_transform: vk::SurfaceTransformFlagsKHR::IDENTITY,
                ..Default::default()
            },
            formats: state.formats.clone(),
            present_modes: state.present_modes.clone(),
        })
    }

    fn detect_depth_format(&self) -> Option<vk::Format> {
        self.state.lock().depth_format
    }

    fn create_swapchain(&self, desc: &SwapchainDesc) -> Result<(vk::SwapchainKHR, Vec<vk::Image>)> {
        let mut state = self.state.lock();
        if state.fail(Failure::CreateSwapchain) {
            return Err(GpuError::Vulkan(vk::Result::ERROR_NATIVE_WINDOW_IN_USE_KHR));
        }

        let handle: vk::SwapchainKHR = state.handle();
        let count = state.image_count;
        // Presentable images belong to the swapchain; they are never destroyed individually.
        let images = (0..count)
            .map(|_| {
                let image: vk::Image = state.handle();
                state.live.remove(&image.as_raw());
                image
            })
            .collect();
        state.swapchain_images = count;
        state.next_image = 0;

        state.record(
            Call::CreateSwapchain {
                handle,
                old: desc.old_swapchain,
                width: desc.extent.width,
                height: desc.extent.height,
            },
        );
        Ok((handle, images))
    }

    fn destroy_swapchain(&self, swapchain: vk::SwapchainKHR) {
        let mut state = self.state.lock();
        state.release(swapchain);
        state.record(Call::DestroySwapchain(swapchain));
    }

    fn create_image_view(
        &self,
        _image: vk::Image,
        _format: vk::Format,
        _aspect: vk::ImageAspectFlags,
    ) -> Result<vk::ImageView> {
        let mut state = self.state.lock();
        let view = state.handle();
        state.record(Call::CreateImageView(view));
        Ok(view)
    }

    fn destroy_image_view(&self, view: vk::ImageView) {
        let mut state = self.state.lock();
        state.release(view);
        state.record(Call::DestroyImageView(view));
    }

    fn create_depth_image(&self, _format: vk::Format, _extent: vk::Extent2D) -> Result<vk::Image> {
        let mut state = self.state.lock();
        let image = state.handle();
        state.record(Call::CreateDepthImage(image));
        Ok(image)
    }

    fn destroy_depth_image(&self, image: vk::Image) {
        let mut state = self.state.lock();
        state.release(image);
        state.record(Call::DestroyDepthImage(image));
    }

    fn acquire_next_image(
        &self,
        _swapchain: vk::SwapchainKHR,
        signal_semaphore: vk::Semaphore,
        _timeout_ns: u64,
    ) -> Result<AcquireOutcome> {
        let mut state = self.state.lock();
        state.record(Call::Acquire(signal_semaphore));
        if state.fail(Failure::Acquire) {
            return Err(GpuError::DeviceLost);
        }

        if let Some(outcome) = state.acquire_script.pop_front() {
            return Ok(outcome);
        }

        let image_index = state.next_image;
        state.next_image = (state.next_image + 1) % state.swapchain_images.max(1);
        Ok(AcquireOutcome::Acquired {
            image_index,
            suboptimal: false,
        })
    }

    fn present(
        &self,
        _swapchain: vk::SwapchainKHR,
        wait_semaphore: vk::Semaphore,
        image_index: u32,
    ) -> Result<PresentOutcome> {
        let mut state = self.state.lock();
        state.record(
            Call::Present {
                wait: wait_semaphore,
                image_index,
            },
        );
        if state.fail(Failure::Present) {
            return Err(injected());
        }
        Ok(state.present_script.pop_front().unwrap_or(PresentOutcome::Presented))
    }

    fn create_render_pass(
        &self,
        _color_format: vk::Format,
        _depth_format: vk::Format,
    ) -> Result<vk::RenderPass> {
        let mut state = self.state.lock();
        let render_pass = state.handle();
        state.record(Call::CreateRenderPass(render_pass));
        Ok(render_pass)
    }

    fn destroy_render_pass(&self, render_pass: vk::RenderPass) {
        let mut state = self.state.lock();
        state.release(render_pass);
        state.record(Call::DestroyRenderPass(render_pass));
    }

    fn create_framebuffer(
        &self,
        _render_pass: vk::RenderPass,
        _attachments: &[vk::ImageView],
        extent: vk::Extent2D,
    ) -> Result<vk::Framebuffer> {
        let mut state = self.state.lock();
        if state.fail(Failure::CreateFramebuffer) {
            return Err(injected());
        }
        let handle = state.handle();
        state.record(
            Call::CreateFramebuffer {
                handle,
                width: extent.width,
                height: extent.height,
            },
        );
        Ok(handle)
    }

    fn destroy_framebuffer(&self, framebuffer: vk::Framebuffer) {
        let mut state = self.state.lock();
        state.release(framebuffer);
        state.record(Call::DestroyFramebuffer(framebuffer));
    }

    fn allocate_command_buffer(&self, _level: vk::CommandBufferLevel) -> Result<vk::CommandBuffer> {
        let mut state = self.state.lock();
        if state.fail(Failure::AllocateCommandBuffer) {
            return Err(GpuError::Vulkan(vk::Result::ERROR_OUT_OF_HOST_MEMORY));
        }
        let command_buffer = state.handle();
        state.record(Call::AllocateCommandBuffer(command_buffer));
        Ok(command_buffer)
    }

    fn free_command_buffer(&self, command_buffer: vk::CommandBuffer) {
        let mut state = self.state.lock();
        state.release(command_buffer);
        state.record(Call::FreeCommandBuffer(command_buffer));
    }

    fn begin_command_buffer(
        &self,
        command_buffer: vk::CommandBuffer,
        _flags: vk::CommandBufferUsageFlags,
    ) -> Result<()> {
        let mut state = self.state.lock();
        state.record(Call::BeginCommandBuffer(command_buffer));
        Ok(())
    }

    fn end_command_buffer(&self, command_buffer: vk::CommandBuffer) -> Result<()> {
        let mut state = self.state.lock();
        state.record(Call::EndCommandBuffer(command_buffer));
        Ok(())
    }

    fn reset_command_buffer(&self, command_buffer: vk::CommandBuffer) -> Result<()> {
        let mut state = self.state.lock();
        state.record(Call::ResetCommandBuffer(command_buffer));
        Ok(())
    }

    fn cmd_begin_render_pass(
        &self,
        command_buffer: vk::CommandBuffer,
        _render_pass: vk::RenderPass,
        framebuffer: vk::Framebuffer,
        render_area: vk::Rect2D,
        clear_values: &[vk::ClearValue],
    ) {
        let mut state = self.state.lock();
        state.record(
            Call::BeginRenderPass {
                command_buffer,
                framebuffer,
                width: render_area.extent.width,
                height: render_area.extent.height,
                clear_value_count: clear_values.len(),
            },
        );
    }

    fn cmd_end_render_pass(&self, command_buffer: vk::CommandBuffer) {
        let mut state = self.state.lock();
        state.record(Call::EndRenderPass(command_buffer));
    }

    fn cmd_set_viewport_scissor(
        &self,
        command_buffer: vk::CommandBuffer,
        viewport: vk::Viewport,
        _scissor: vk::Rect2D,
    ) {
        let mut state = self.state.lock();
        state.record(
            Call::SetViewportScissor {
                command_buffer,
                y: viewport.y,
                width: viewport.width,
                height: viewport.height,
            },
        );
    }

    fn submit(&self, submission: &FrameSubmission) -> Result<()> {
        let mut state = self.state.lock();
        state.record(
            Call::Submit {
                command_buffer: submission.command_buffer,
                wait: submission.wait_semaphore,
                signal: submission.signal_semaphore,
                fence: submission.fence,
            },
        );
        if state.fail(Failure::Submit) {
            return Err(injected());
        }
        assert!(
            !state.fences.get(&submission.fence).copied().unwrap_or(true),
            "submitted with a fence that is still signaled"
        );
        // The fake GPU finishes work the moment it is submitted.
        state.fences.insert(submission.fence, true);
        Ok(())
    }

    fn create_shader_module(&self, code: &[u32]) -> Result<vk::ShaderModule> {
        let mut state = self.state.lock();
        let handle = state.handle();
        state.record(
            Call::CreateShaderModule {
                handle,
                words: code.len(),
            },
        );
        Ok(handle)
    }

    fn destroy_shader_module(&self, module: vk::ShaderModule) {
        let mut state = self.state.lock();
        state.release(module);
        state.record(Call::DestroyShaderModule(module));
    }
}
