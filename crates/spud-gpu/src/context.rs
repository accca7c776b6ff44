//! GPU context management.
//!
//! [`GpuContext`] is the logical device: it owns the instance, surface,
//! device, queues, the graphics command pool and the allocator, and implements
//! [`Driver`] for the frame core on top of ash.

use crate::capabilities::PhysicalDeviceCandidate;
use crate::config::RendererConfig;
use crate::driver::{AcquireOutcome, Driver, FrameSubmission, PresentOutcome, SwapchainDesc};
use crate::error::{GpuError, Result};
use crate::instance::{create_instance, DebugMessenger};
use crate::memory::GpuAllocator;
use crate::selector::{select_device, QueueFamilyIndices};
use crate::surface::{SurfaceContext, SwapchainSupport};
use crate::sync;
use ash::vk;
use gpu_allocator::MemoryLocation;
use parking_lot::Mutex;
use raw_window_handle::{RawDisplayHandle, RawWindowHandle};
use std::ffi::c_char;
use std::sync::Arc;

/// Depth formats tried in order of preference.
pub const DEPTH_FORMAT_CANDIDATES: [vk::Format; 3] = [
    vk::Format::D32_SFLOAT,
    vk::Format::D32_SFLOAT_S8_UINT,
    vk::Format::D24_UNORM_S8_UINT,
];

/// Main GPU context holding Vulkan resources.
pub struct GpuContext {
    // Entry must be kept alive for the lifetime of the context
    #[allow(dead_code)]
    entry: ash::Entry,
    instance: ash::Instance,
    debug_messenger: Option<DebugMessenger>,
    surface: SurfaceContext,
    physical_device: PhysicalDeviceCandidate,
    device: Arc<ash::Device>,
    swapchain_loader: ash::khr::swapchain::Device,
    allocator: Mutex<GpuAllocator>,

    queue_families: QueueFamilyIndices,
    graphics_queue: vk::Queue,
    present_queue: vk::Queue,
    transfer_queue: vk::Queue,
    command_pool: vk::CommandPool,
    depth_format: vk::Format,
}

impl GpuContext {
    /// Get the Vulkan device handle.
    pub fn device(&self) -> &ash::Device {
        &self.device
    }

    /// Get the Vulkan instance handle.
    pub const fn instance(&self) -> &ash::Instance {
        &self.instance
    }

    /// The selected physical device as seen during selection.
    pub const fn physical_device(&self) -> &PhysicalDeviceCandidate {
        &self.physical_device
    }

    pub const fn queue_families(&self) -> QueueFamilyIndices {
        self.queue_families
    }

    pub const fn graphics_queue(&self) -> vk::Queue {
        self.graphics_queue
    }

    /// May alias the graphics queue.
    pub const fn present_queue(&self) -> vk::Queue {
        self.present_queue
    }

    /// May alias the graphics queue.
    pub const fn transfer_queue(&self) -> vk::Queue {
        self.transfer_queue
    }

    /// The command pool bound to the graphics family.
    pub const fn command_pool(&self) -> vk::CommandPool {
        self.command_pool
    }

    /// Depth format detected at startup.
    pub const fn depth_format(&self) -> vk::Format {
        self.depth_format
    }

    /// Get access to the GPU allocator.
    pub const fn allocator(&self) -> &Mutex<GpuAllocator> {
        &self.allocator
    }

    fn map_device_error(result: vk::Result) -> GpuError {
        match result {
            vk::Result::ERROR_DEVICE_LOST => GpuError::DeviceLost,
            other => GpuError::Vulkan(other),
        }
    }

    const fn timeout_error(timeout_ns: u64) -> GpuError {
        GpuError::FenceTimeout {
            timeout_ms: timeout_ns / 1_000_000,
        }
    }
}

impl Driver for GpuContext {
    #[cfg_attr(feature = "profiling-tracy", tracing::instrument(level = "trace", skip_all))]
    fn wait_idle(&self) -> Result<()> {
        // SAFETY: The device is valid for the context's lifetime
        unsafe { self.device.device_wait_idle() }.map_err(Self::map_device_error)
    }

    fn create_fence(&self, signaled: bool) -> Result<vk::Fence> {
        // SAFETY: The device is valid
        unsafe { sync::create_fence(&self.device, signaled) }
    }

    fn destroy_fence(&self, fence: vk::Fence) {
        // SAFETY: Caller guarantees the fence is not in use
        unsafe { self.device.destroy_fence(fence, None) };
    }

    fn wait_for_fence(&self, fence: vk::Fence, timeout_ns: u64) -> Result<()> {
        // SAFETY: The fence was created on this device
        match unsafe { sync::wait_for_fence(&self.device, fence, timeout_ns) } {
            Err(GpuError::Vulkan(vk::Result::TIMEOUT)) => Err(Self::timeout_error(timeout_ns)),
            Err(GpuError::Vulkan(e)) => Err(Self::map_device_error(e)),
            other => other,
        }
    }

    fn reset_fence(&self, fence: vk::Fence) -> Result<()> {
        // SAFETY: The fence was created on this device
        unsafe { sync::reset_fence(&self.device, fence) }
    }

    fn create_semaphore(&self) -> Result<vk::Semaphore> {
        // SAFETY: The device is valid
        unsafe { sync::create_semaphore(&self.device) }
    }

    fn destroy_semaphore(&self, semaphore: vk::Semaphore) {
        // SAFETY: Caller guarantees the semaphore is not in use
        unsafe { self.device.destroy_semaphore(semaphore, None) };
    }

    fn query_swapchain_support(&self) -> Result<SwapchainSupport> {
        // SAFETY: The physical device belongs to the surface's instance
        unsafe { self.surface.swapchain_support(self.physical_device.handle) }
    }

    fn detect_depth_format(&self) -> Option<vk::Format> {
        let required = vk::FormatFeatureFlags::DEPTH_STENCIL_ATTACHMENT;
        DEPTH_FORMAT_CANDIDATES.into_iter().find(|&format| {
            // SAFETY: The physical device is valid
            let properties = unsafe {
                self.instance
                    .get_physical_device_format_properties(self.physical_device.handle, format)
            };
            properties.linear_tiling_features.contains(required)
                || properties.optimal_tiling_features.contains(required)
        })
    }

    fn create_swapchain(&self, desc: &SwapchainDesc) -> Result<(vk::SwapchainKHR, Vec<vk::Image>)> {
        let families = [self.queue_families.graphics, self.queue_families.present];
        let (sharing_mode, family_indices): (_, &[u32]) = if families[0] == families[1] {
            (vk::SharingMode::EXCLUSIVE, &[])
        } else {
            (vk::SharingMode::CONCURRENT, &families)
        };

        let create_info = vk::SwapchainCreateInfoKHR::default()
            .surface(self.surface.surface)
            .min_image_count(desc.min_image_count)
            .image_format(desc.surface_format.format)
            .image_color_space(desc.surface_format.color_space)
            .image_extent(desc.extent)
            .image_array_layers(1)
            .image_usage(vk::ImageUsageFlags::COLOR_ATTACHMENT)
            .image_sharing_mode(sharing_mode)
            .queue_family_indices(family_indices)
            .pre_transform(desc.pre_transform)
            .composite_alpha(vk::CompositeAlphaFlagsKHR::OPAQUE)
            .present_mode(desc.present_mode)
            .clipped(true)
            .old_swapchain(desc.old_swapchain);

        // SAFETY: The surface and device are valid
        let swapchain = unsafe { self.swapchain_loader.create_swapchain(&create_info, None) }
            .map_err(|e| GpuError::SwapchainCreation(e.to_string()))?;

        // SAFETY: swapchain was just created
        let images = unsafe { self.swapchain_loader.get_swapchain_images(swapchain)? };
        Ok((swapchain, images))
    }

    fn destroy_swapchain(&self, swapchain: vk::SwapchainKHR) {
        // SAFETY: Caller guarantees the swapchain is not in use
        unsafe { self.swapchain_loader.destroy_swapchain(swapchain, None) };
    }

    fn create_image_view(
        &self,
        image: vk::Image,
        format: vk::Format,
        aspect: vk::ImageAspectFlags,
    ) -> Result<vk::ImageView> {
        let view_info = vk::ImageViewCreateInfo::default()
            .image(image)
            .view_type(vk::ImageViewType::TYPE_2D)
            .format(format)
            .components(vk::ComponentMapping::default())
            .subresource_range(
                vk::ImageSubresourceRange::default()
                    .aspect_mask(aspect)
                    .base_mip_level(0)
                    .level_count(1)
                    .base_array_layer(0)
                    .layer_count(1),
            );

        // SAFETY: image belongs to this device
        let view = unsafe { self.device.create_image_view(&view_info, None)? };
        Ok(view)
    }

    fn destroy_image_view(&self, view: vk::ImageView) {
        // SAFETY: Caller guarantees the view is not in use
        unsafe { self.device.destroy_image_view(view, None) };
    }

    fn create_depth_image(&self, format: vk::Format, extent: vk::Extent2D) -> Result<vk::Image> {
        let create_info = vk::ImageCreateInfo::default()
            .image_type(vk::ImageType::TYPE_2D)
            .extent(vk::Extent3D {
                width: extent.width,
                height: extent.height,
                depth: 1,
            })
            .mip_levels(1)
            .array_layers(1)
            .format(format)
            .tiling(vk::ImageTiling::OPTIMAL)
            .initial_layout(vk::ImageLayout::UNDEFINED)
            .usage(vk::ImageUsageFlags::DEPTH_STENCIL_ATTACHMENT)
            .samples(vk::SampleCountFlags::TYPE_1)
            .sharing_mode(vk::SharingMode::EXCLUSIVE);

        self.allocator
            .lock()
            .create_image(&create_info, MemoryLocation::GpuOnly, "depth attachment")
    }

    fn destroy_depth_image(&self, image: vk::Image) {
        self.allocator.lock().free_image(image);
    }

    #[cfg_attr(feature = "profiling-tracy", tracing::instrument(level = "trace", skip_all))]
    fn acquire_next_image(
        &self,
        swapchain: vk::SwapchainKHR,
        signal_semaphore: vk::Semaphore,
        timeout_ns: u64,
    ) -> Result<AcquireOutcome> {
        // SAFETY: swapchain and semaphore were created on this device
        let result = unsafe {
            self.swapchain_loader
                .acquire_next_image(swapchain, timeout_ns, signal_semaphore, vk::Fence::null())
        };

        match result {
            Ok((image_index, suboptimal)) => Ok(AcquireOutcome::Acquired {
                image_index,
                suboptimal,
            }),
            // No image was acquired; the caller must recreate the swapchain.
            Err(vk::Result::ERROR_OUT_OF_DATE_KHR) => Ok(AcquireOutcome::OutOfDate),
            Err(vk::Result::TIMEOUT | vk::Result::NOT_READY) => {
                Err(Self::timeout_error(timeout_ns))
            }
            Err(e) => Err(Self::map_device_error(e)),
        }
    }

    #[cfg_attr(feature = "profiling-tracy", tracing::instrument(level = "trace", skip_all))]
    fn present(
        &self,
        swapchain: vk::SwapchainKHR,
        wait_semaphore: vk::Semaphore,
        image_index: u32,
    ) -> Result<PresentOutcome> {
        let wait_semaphores = [wait_semaphore];
        let swapchains = [swapchain];
        let image_indices = [image_index];

        let present_info = vk::PresentInfoKHR::default()
            .wait_semaphores(&wait_semaphores)
            .swapchains(&swapchains)
            .image_indices(&image_indices);

        // SAFETY: All handles were created on this device
        match unsafe { self.swapchain_loader.queue_present(self.present_queue, &present_info) } {
            Ok(false) => Ok(PresentOutcome::Presented),
            Ok(true) => Ok(PresentOutcome::Suboptimal),
            Err(vk::Result::ERROR_OUT_OF_DATE_KHR) => Ok(PresentOutcome::OutOfDate),
            Err(e) => Err(Self::map_device_error(e)),
        }
    }

    fn create_render_pass(
        &self,
        color_format: vk::Format,
        depth_format: vk::Format,
    ) -> Result<vk::RenderPass> {
        let attachments = [
            vk::AttachmentDescription::default()
                .format(color_format)
                .samples(vk::SampleCountFlags::TYPE_1)
                .load_op(vk::AttachmentLoadOp::CLEAR)
                .store_op(vk::AttachmentStoreOp::STORE)
                .stencil_load_op(vk::AttachmentLoadOp::DONT_CARE)
                .stencil_store_op(vk::AttachmentStoreOp::DONT_CARE)
                .initial_layout(vk::ImageLayout::UNDEFINED)
                .final_layout(vk::ImageLayout::PRESENT_SRC_KHR),
            vk::AttachmentDescription::default()
                .format(depth_format)
                .samples(vk::SampleCountFlags::TYPE_1)
                .load_op(vk::AttachmentLoadOp::CLEAR)
                .store_op(vk::AttachmentStoreOp::DONT_CARE)
                .stencil_load_op(vk::AttachmentLoadOp::DONT_CARE)
                .stencil_store_op(vk::AttachmentStoreOp::DONT_CARE)
                .initial_layout(vk::ImageLayout::UNDEFINED)
                .final_layout(vk::ImageLayout::DEPTH_STENCIL_ATTACHMENT_OPTIMAL),
        ];

        let color_refs = [vk::AttachmentReference {
            attachment: 0,
            layout: vk::ImageLayout::COLOR_ATTACHMENT_OPTIMAL,
        }];
        let depth_ref = vk::AttachmentReference {
            attachment: 1,
            layout: vk::ImageLayout::DEPTH_STENCIL_ATTACHMENT_OPTIMAL,
        };

        let subpasses = [vk::SubpassDescription::default()
            .pipeline_bind_point(vk::PipelineBindPoint::GRAPHICS)
            .color_attachments(&color_refs)
            .depth_stencil_attachment(&depth_ref)];

        let dependencies = [vk::SubpassDependency::default()
            .src_subpass(vk::SUBPASS_EXTERNAL)
            .dst_subpass(0)
            .src_stage_mask(vk::PipelineStageFlags::COLOR_ATTACHMENT_OUTPUT)
            .src_access_mask(vk::AccessFlags::empty())
            .dst_stage_mask(vk::PipelineStageFlags::COLOR_ATTACHMENT_OUTPUT)
            .dst_access_mask(
                vk::AccessFlags::COLOR_ATTACHMENT_READ | vk::AccessFlags::COLOR_ATTACHMENT_WRITE,
            )];

        let create_info = vk::RenderPassCreateInfo::default()
            .attachments(&attachments)
            .subpasses(&subpasses)
            .dependencies(&dependencies);

        // SAFETY: All arrays referenced by create_info outlive the call
        let render_pass = unsafe { self.device.create_render_pass(&create_info, None)? };
        Ok(render_pass)
    }

    fn destroy_render_pass(&self, render_pass: vk::RenderPass) {
        // SAFETY: Caller guarantees the render pass is not in use
        unsafe { self.device.destroy_render_pass(render_pass, None) };
    }

    fn create_framebuffer(
        &self,
        render_pass: vk::RenderPass,
        attachments: &[vk::ImageView],
        extent: vk::Extent2D,
    ) -> Result<vk::Framebuffer> {
        let create_info = vk::FramebufferCreateInfo::default()
            .render_pass(render_pass)
            .attachments(attachments)
            .width(extent.width)
            .height(extent.height)
            .layers(1);

        // SAFETY: render pass and views belong to this device
        let framebuffer = unsafe { self.device.create_framebuffer(&create_info, None)? };
        Ok(framebuffer)
    }

    fn destroy_framebuffer(&self, framebuffer: vk::Framebuffer) {
        // SAFETY: Caller guarantees the frame buffer is not in use
        unsafe { self.device.destroy_framebuffer(framebuffer, None) };
    }

    fn allocate_command_buffer(&self, level: vk::CommandBufferLevel) -> Result<vk::CommandBuffer> {
        let alloc_info = vk::CommandBufferAllocateInfo::default()
            .command_pool(self.command_pool)
            .level(level)
            .command_buffer_count(1);

        // SAFETY: The pool belongs to this device
        let buffers = unsafe { self.device.allocate_command_buffers(&alloc_info)? };
        buffers
            .into_iter()
            .next()
            .ok_or(GpuError::Vulkan(vk::Result::ERROR_OUT_OF_POOL_MEMORY))
    }

    fn free_command_buffer(&self, command_buffer: vk::CommandBuffer) {
        // SAFETY: Caller guarantees the buffer came from this pool and is not pending
        unsafe { self.device.free_command_buffers(self.command_pool, &[command_buffer]) };
    }

    fn begin_command_buffer(
        &self,
        command_buffer: vk::CommandBuffer,
        flags: vk::CommandBufferUsageFlags,
    ) -> Result<()> {
        let begin_info = vk::CommandBufferBeginInfo::default().flags(flags);
        // SAFETY: The buffer is allocated and not pending
        unsafe { self.device.begin_command_buffer(command_buffer, &begin_info)? };
        Ok(())
    }

    fn end_command_buffer(&self, command_buffer: vk::CommandBuffer) -> Result<()> {
        // SAFETY: The buffer is recording
        unsafe { self.device.end_command_buffer(command_buffer)? };
        Ok(())
    }

    fn reset_command_buffer(&self, command_buffer: vk::CommandBuffer) -> Result<()> {
        // SAFETY: The pool was created with RESET_COMMAND_BUFFER
        unsafe {
            self.device
                .reset_command_buffer(command_buffer, vk::CommandBufferResetFlags::empty())?;
        }
        Ok(())
    }

    fn cmd_begin_render_pass(
        &self,
        command_buffer: vk::CommandBuffer,
        render_pass: vk::RenderPass,
        framebuffer: vk::Framebuffer,
        render_area: vk::Rect2D,
        clear_values: &[vk::ClearValue],
    ) {
        let begin_info = vk::RenderPassBeginInfo::default()
            .render_pass(render_pass)
            .framebuffer(framebuffer)
            .render_area(render_area)
            .clear_values(clear_values);

        // SAFETY: The buffer is recording outside a render pass
        unsafe {
            self.device
                .cmd_begin_render_pass(command_buffer, &begin_info, vk::SubpassContents::INLINE);
        }
    }

    fn cmd_end_render_pass(&self, command_buffer: vk::CommandBuffer) {
        // SAFETY: The buffer is inside a render pass
        unsafe { self.device.cmd_end_render_pass(command_buffer) };
    }

    fn cmd_set_viewport_scissor(
        &self,
        command_buffer: vk::CommandBuffer,
        viewport: vk::Viewport,
        scissor: vk::Rect2D,
    ) {
        // SAFETY: The buffer is recording
        unsafe {
            self.device.cmd_set_viewport(command_buffer, 0, &[viewport]);
            self.device.cmd_set_scissor(command_buffer, 0, &[scissor]);
        }
    }

    #[cfg_attr(feature = "profiling-tracy", tracing::instrument(level = "trace", skip_all))]
    fn submit(&self, submission: &FrameSubmission) -> Result<()> {
        let command_buffers = [submission.command_buffer];
        let wait_semaphores = [submission.wait_semaphore];
        let wait_stages = [submission.wait_stage];
        let signal_semaphores = [submission.signal_semaphore];

        let submit_info = vk::SubmitInfo::default()
            .command_buffers(&command_buffers)
            .wait_semaphores(&wait_semaphores)
            .wait_dst_stage_mask(&wait_stages)
            .signal_semaphores(&signal_semaphores);

        // SAFETY: All handles were created on this device
        unsafe {
            self.device
                .queue_submit(self.graphics_queue, &[submit_info], submission.fence)
        }
        .map_err(Self::map_device_error)
    }

    fn create_shader_module(&self, code: &[u32]) -> Result<vk::ShaderModule> {
        let create_info = vk::ShaderModuleCreateInfo::default().code(code);
        // SAFETY: code is SPIR-V words read by ash::util::read_spv
        unsafe { self.device.create_shader_module(&create_info, None) }
            .map_err(|e| GpuError::ShaderModule(e.to_string()))
    }

    fn destroy_shader_module(&self, module: vk::ShaderModule) {
        // SAFETY: Caller guarantees no pipeline creation is using the module
        unsafe { self.device.destroy_shader_module(module, None) };
    }
}

impl Drop for GpuContext {
    fn drop(&mut self) {
        // SAFETY: Every object is destroyed after the objects that depend on it
        unsafe {
            let _ = self.device.device_wait_idle();

            self.device.destroy_command_pool(self.command_pool, None);

            // Shutdown allocator BEFORE destroying device
            self.allocator.lock().shutdown();

            self.device.destroy_device(None);
            self.surface.destroy();
            if let Some(messenger) = self.debug_messenger.take() {
                messenger.destroy();
            }
            self.instance.destroy_instance(None);
        }
        tracing::info!("Vulkan context destroyed.");
    }
}

/// Builder for creating a GPU context.
#[derive(Debug, Clone, Default)]
pub struct GpuContextBuilder {
    config: RendererConfig,
}

impl GpuContextBuilder {
    /// Create a new builder.
    pub fn new() -> Self {
        Self::default()
    }

    /// Use `config` for instance creation and device selection.
    #[must_use]
    pub fn config(mut self, config: &RendererConfig) -> Self {
        self.config = config.clone();
        self
    }

    /// Set the application name.
    #[must_use]
    pub fn app_name(mut self, name: impl Into<String>) -> Self {
        self.config.app_name = name.into();
        self
    }

    /// Enable or disable validation layers.
    #[must_use]
    pub const fn validation(mut self, enable: bool) -> Self {
        self.config.validation = enable;
        self
    }

    /// Build the GPU context for the window behind `display` and `window`.
    pub fn build(self, display: RawDisplayHandle, window: RawWindowHandle) -> Result<GpuContext> {
        // Load Vulkan entry point
        // SAFETY: Loading the system Vulkan library has no preconditions
        let entry = unsafe { ash::Entry::load() }.map_err(|e| GpuError::Loading(e.to_string()))?;

        // SAFETY: entry was just loaded
        let instance = unsafe {
            create_instance(&entry, display, &self.config.app_name, self.config.validation)?
        };

        let debug_messenger = if self.config.validation {
            // SAFETY: debug utils was enabled with validation
            Some(unsafe { DebugMessenger::new(&entry, &instance)? })
        } else {
            None
        };

        // SAFETY: The window handles come from a live window
        let surface = unsafe { SurfaceContext::new(&entry, &instance, display, window)? };
        tracing::info!("Vulkan surface created.");

        // SAFETY: The instance is valid
        let handles = unsafe { instance.enumerate_physical_devices()? };
        let mut candidates = Vec::with_capacity(handles.len());
        for handle in handles {
            // SAFETY: handle was enumerated from this instance
            let candidate = unsafe { PhysicalDeviceCandidate::query(&instance, &surface, handle)? };
            candidates.push(candidate);
        }

        let selection = select_device(&candidates, &self.config.requirements)?;
        let physical_device = candidates.swap_remove(selection.index);
        physical_device.log_report();
        let queue_families = selection.queue_families;

        // SAFETY: The physical device belongs to the instance
        let device = unsafe { create_device(&instance, &physical_device, &queue_families)? };
        tracing::info!("Logical device created.");

        // SAFETY: The families were requested at device creation
        let (graphics_queue, present_queue, transfer_queue) = unsafe {
            (
                device.get_device_queue(queue_families.graphics, 0),
                device.get_device_queue(queue_families.present, 0),
                device.get_device_queue(queue_families.transfer, 0),
            )
        };
        tracing::info!("Queues obtained.");

        let pool_info = vk::CommandPoolCreateInfo::default()
            .queue_family_index(queue_families.graphics)
            .flags(vk::CommandPoolCreateFlags::RESET_COMMAND_BUFFER);
        // SAFETY: The device is valid
        let command_pool = unsafe { device.create_command_pool(&pool_info, None)? };
        tracing::info!("Graphics command pool created.");

        let device = Arc::new(device);
        let swapchain_loader = ash::khr::swapchain::Device::new(&instance, &device);

        // SAFETY: instance, device and physical device are valid
        let allocator =
            unsafe { GpuAllocator::new(&instance, device.clone(), physical_device.handle)? };

        let mut context = GpuContext {
            entry,
            instance,
            debug_messenger,
            surface,
            physical_device,
            device,
            swapchain_loader,
            allocator: Mutex::new(allocator),
            queue_families,
            graphics_queue,
            present_queue,
            transfer_queue,
            command_pool,
            depth_format: vk::Format::UNDEFINED,
        };

        context.depth_format = context.detect_depth_format().ok_or_else(|| {
            tracing::error!("Failed to find a supported depth format.");
            GpuError::NoDepthFormat
        })?;

        tracing::info!("Vulkan device created.");
        Ok(context)
    }
}

/// Create the logical device with one queue per unique family.
///
/// # Safety
/// The instance and physical device must be valid.
unsafe fn create_device(
    instance: &ash::Instance,
    physical_device: &PhysicalDeviceCandidate,
    queue_families: &QueueFamilyIndices,
) -> Result<ash::Device> {
    let queue_priority = 1.0_f32;
    let queue_create_infos: Vec<vk::DeviceQueueCreateInfo> = queue_families
        .unique()
        .into_iter()
        .map(|family| {
            vk::DeviceQueueCreateInfo::default()
                .queue_family_index(family)
                .queue_priorities(std::slice::from_ref(&queue_priority))
        })
        .collect();

    let extension_names: Vec<*const c_char> = vec![ash::khr::swapchain::NAME.as_ptr()];

    let features = vk::PhysicalDeviceFeatures::default()
        .sampler_anisotropy(physical_device.sampler_anisotropy);

    let device_create_info = vk::DeviceCreateInfo::default()
        .queue_create_infos(&queue_create_infos)
        .enabled_extension_names(&extension_names)
        .enabled_features(&features);

    // SAFETY: Caller guarantees instance and physical device are valid
    let device =
        unsafe { instance.create_device(physical_device.handle, &device_create_info, None)? };
    Ok(device)
}
