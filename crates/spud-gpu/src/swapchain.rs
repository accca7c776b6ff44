//! Swapchain management.
//!
//! The [`Swapchain`] owns the presentable images, their views, the shared
//! depth attachment and one frame buffer per image. [`SwapchainManager`]
//! tracks its lifecycle and refuses overlapping recreations.

use crate::driver::{Driver, SwapchainDesc};
use crate::error::{GpuError, Result};
use crate::render_pass::{FrameBuffer, RenderPass};
use ash::vk;

/// Surface format used when the surface offers it.
pub const PREFERRED_SURFACE_FORMAT: vk::SurfaceFormatKHR = vk::SurfaceFormatKHR {
    format: vk::Format::B8G8R8A8_UNORM,
    color_space: vk::ColorSpaceKHR::SRGB_NONLINEAR,
};

/// Select the surface format: the preferred one if offered, else the first available.
pub fn select_surface_format(available: &[vk::SurfaceFormatKHR]) -> vk::SurfaceFormatKHR {
    available
        .iter()
        .copied()
        .find(|f| {
            f.format == PREFERRED_SURFACE_FORMAT.format
                && f.color_space == PREFERRED_SURFACE_FORMAT.color_space
        })
        .or_else(|| available.first().copied())
        .unwrap_or(PREFERRED_SURFACE_FORMAT)
}

/// Select the present mode: mailbox when available, else FIFO (always supported).
pub fn select_present_mode(available: &[vk::PresentModeKHR]) -> vk::PresentModeKHR {
    if available.contains(&vk::PresentModeKHR::MAILBOX) {
        vk::PresentModeKHR::MAILBOX
    } else {
        vk::PresentModeKHR::FIFO
    }
}

/// Calculate swapchain extent.
pub fn calculate_extent(
    capabilities: &vk::SurfaceCapabilitiesKHR,
    desired_width: u32,
    desired_height: u32,
) -> vk::Extent2D {
    if capabilities.current_extent.width != u32::MAX {
        capabilities.current_extent
    } else {
        let min = capabilities.min_image_extent;
        let max = capabilities.max_image_extent;
        vk::Extent2D {
            width: desired_width.clamp(min.width, max.width),
            height: desired_height.clamp(min.height, max.height),
        }
    }
}

/// Number of images to request: one more than the minimum, capped by the
/// maximum when the surface declares one.
pub const fn image_count(capabilities: &vk::SurfaceCapabilitiesKHR) -> u32 {
    let count = capabilities.min_image_count + 1;
    if capabilities.max_image_count > 0 && count > capabilities.max_image_count {
        capabilities.max_image_count
    } else {
        count
    }
}

/// The presentable image chain and everything sized to it.
#[derive(Debug)]
pub struct Swapchain {
    handle: vk::SwapchainKHR,
    images: Vec<vk::Image>,
    image_views: Vec<vk::ImageView>,
    surface_format: vk::SurfaceFormatKHR,
    present_mode: vk::PresentModeKHR,
    extent: vk::Extent2D,
    depth_format: vk::Format,
    depth_image: vk::Image,
    depth_view: vk::ImageView,
    framebuffers: Vec<FrameBuffer>,
}

impl Swapchain {
    /// Create the swapchain, its image views and the depth attachment.
    ///
    /// Frame buffers are built separately once a render pass exists.
    pub fn new(
        driver: &impl Driver,
        width: u32,
        height: u32,
        old: vk::SwapchainKHR,
    ) -> Result<Self> {
        let support = driver.query_swapchain_support()?;
        if !support.is_adequate() {
            return Err(GpuError::SwapchainCreation(
                "surface reports no formats or present modes".to_string(),
            ));
        }
        let depth_format = driver.detect_depth_format().ok_or(GpuError::NoDepthFormat)?;

        let surface_format = select_surface_format(&support.formats);
        let present_mode = select_present_mode(&support.present_modes);
        let extent = calculate_extent(&support.capabilities, width, height);

        let desc = SwapchainDesc {
            surface_format,
            present_mode,
            extent,
            min_image_count: image_count(&support.capabilities),
            pre_transform: support.capabilities.current_transform,
            old_swapchain: old,
        };
        let (handle, images) = driver.create_swapchain(&desc)?;

        let mut swapchain = Self {
            handle,
            images,
            image_views: Vec::new(),
            surface_format,
            present_mode,
            extent,
            depth_format,
            depth_image: vk::Image::null(),
            depth_view: vk::ImageView::null(),
            framebuffers: Vec::new(),
        };

        if let Err(e) = swapchain.create_attachments(driver) {
            swapchain.destroy(driver);
            return Err(e);
        }

        tracing::info!(
            "Swapchain created: {}x{}, {} images, {:?}, {:?}",
            extent.width,
            extent.height,
            swapchain.images.len(),
            surface_format.format,
            present_mode
        );
        Ok(swapchain)
    }

    fn create_attachments(&mut self, driver: &impl Driver) -> Result<()> {
        for &image in &self.images {
            let view = driver.create_image_view(
                image,
                self.surface_format.format,
                vk::ImageAspectFlags::COLOR,
            )?;
            self.image_views.push(view);
        }

        self.depth_image = driver.create_depth_image(self.depth_format, self.extent)?;
        self.depth_view = driver.create_image_view(
            self.depth_image,
            self.depth_format,
            vk::ImageAspectFlags::DEPTH,
        )?;
        Ok(())
    }

    /// Build one frame buffer per image: the image's color view plus the shared depth view.
    pub fn build_framebuffers(
        &mut self,
        driver: &impl Driver,
        render_pass: &RenderPass,
    ) -> Result<()> {
        self.destroy_framebuffers(driver);

        for &view in &self.image_views {
            let attachments = [view, self.depth_view];
            let framebuffer = FrameBuffer::new(driver, render_pass, &attachments, self.extent)?;
            self.framebuffers.push(framebuffer);
        }
        Ok(())
    }

    pub fn destroy_framebuffers(&mut self, driver: &impl Driver) {
        for mut framebuffer in self.framebuffers.drain(..) {
            framebuffer.destroy(driver);
        }
    }

    pub const fn handle(&self) -> vk::SwapchainKHR {
        self.handle
    }

    /// Number of presentable images.
    pub fn image_count(&self) -> usize {
        self.images.len()
    }

    pub fn image_views(&self) -> &[vk::ImageView] {
        &self.image_views
    }

    pub const fn surface_format(&self) -> vk::SurfaceFormatKHR {
        self.surface_format
    }

    pub const fn present_mode(&self) -> vk::PresentModeKHR {
        self.present_mode
    }

    pub const fn extent(&self) -> vk::Extent2D {
        self.extent
    }

    pub const fn depth_format(&self) -> vk::Format {
        self.depth_format
    }

    pub const fn depth_view(&self) -> vk::ImageView {
        self.depth_view
    }

    pub fn framebuffers(&self) -> &[FrameBuffer] {
        &self.framebuffers
    }

    pub fn framebuffer(&self, image_index: u32) -> &FrameBuffer {
        let index = image_index as usize;
        assert!(
            index < self.framebuffers.len(),
            "image index {index} out of range for {} frame buffers",
            self.framebuffers.len()
        );
        &self.framebuffers[index]
    }

    /// Destroy frame buffers, views, the depth attachment and the swapchain.
    ///
    /// The device must be idle.
    pub fn destroy(&mut self, driver: &impl Driver) {
        self.destroy_framebuffers(driver);

        if self.depth_view != vk::ImageView::null() {
            driver.destroy_image_view(self.depth_view);
            self.depth_view = vk::ImageView::null();
        }
        if self.depth_image != vk::Image::null() {
            driver.destroy_depth_image(self.depth_image);
            self.depth_image = vk::Image::null();
        }

        for view in self.image_views.drain(..) {
            driver.destroy_image_view(view);
        }
        self.images.clear();

        if self.handle != vk::SwapchainKHR::null() {
            driver.destroy_swapchain(self.handle);
            self.handle = vk::SwapchainKHR::null();
        }
    }
}

/// Lifecycle state of the swapchain.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum SwapchainState {
    Created,
    Recreating,
    Destroyed,
}

/// Owns the swapchain and guards its recreation.
#[derive(Debug)]
pub struct SwapchainManager {
    swapchain: Swapchain,
    state: SwapchainState,
}

impl SwapchainManager {
    pub fn new(driver: &impl Driver, width: u32, height: u32) -> Result<Self> {
        Ok(Self {
            swapchain: Swapchain::new(driver, width, height, vk::SwapchainKHR::null())?,
            state: SwapchainState::Created,
        })
    }

    pub const fn swapchain(&self) -> &Swapchain {
        &self.swapchain
    }

    pub fn swapchain_mut(&mut self) -> &mut Swapchain {
        &mut self.swapchain
    }

    pub const fn state(&self) -> SwapchainState {
        self.state
    }

    pub fn is_recreating(&self) -> bool {
        self.state == SwapchainState::Recreating
    }

    /// Enter the recreating state.
    ///
    /// Fails without side effects when a recreation is already running.
    pub fn begin_recreate(&mut self) -> Result<()> {
        match self.state {
            SwapchainState::Recreating => Err(GpuError::RecreationInProgress),
            SwapchainState::Destroyed => Err(GpuError::SwapchainCreation(
                "swapchain was destroyed".to_string(),
            )),
            SwapchainState::Created => {
                self.state = SwapchainState::Recreating;
                Ok(())
            }
        }
    }

    /// Replace the swapchain with one of the given size.
    ///
    /// Must run between [`begin_recreate`](Self::begin_recreate) and
    /// [`finish_recreate`](Self::finish_recreate) with the device idle.
    pub fn rebuild(&mut self, driver: &impl Driver, width: u32, height: u32) -> Result<()> {
        debug_assert!(self.is_recreating(), "rebuild outside of recreation");

        self.swapchain.destroy_framebuffers(driver);
        let fresh = Swapchain::new(driver, width, height, self.swapchain.handle())?;
        let mut old = std::mem::replace(&mut self.swapchain, fresh);
        old.destroy(driver);
        Ok(())
    }

    /// Leave the recreating state. Also used on error paths.
    pub fn finish_recreate(&mut self) {
        if self.state == SwapchainState::Recreating {
            self.state = SwapchainState::Created;
        }
    }

    /// Destroy the swapchain. The device must be idle.
    pub fn destroy(&mut self, driver: &impl Driver) {
        if self.state != SwapchainState::Destroyed {
            self.swapchain.destroy(driver);
            self.state = SwapchainState::Destroyed;
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn capabilities(min: u32, max: u32) -> vk::SurfaceCapabilitiesKHR {
        vk::SurfaceCapabilitiesKHR {
            min_image_count: min,
            max_image_count: max,
            current_extent: vk::Extent2D {
                width: u32::MAX,
                height: u32::MAX,
            },
            min_image_extent: vk::Extent2D { width: 16, height: 16 },
            max_image_extent: vk::Extent2D {
                width: 4096,
                height: 2048,
            },
            ..Default::default()
        }
    }

    fn same(a: vk::SurfaceFormatKHR, b: vk::SurfaceFormatKHR) -> bool {
        a.format == b.format && a.color_space == b.color_space
    }

    #[test]
    fn preferred_format_is_chosen_when_offered() {
        let formats = [
            vk::SurfaceFormatKHR {
                format: vk::Format::R8G8B8A8_SRGB,
                color_space: vk::ColorSpaceKHR::SRGB_NONLINEAR,
            },
            PREFERRED_SURFACE_FORMAT,
        ];
        assert!(same(select_surface_format(&formats), PREFERRED_SURFACE_FORMAT));
    }

    #[test]
    fn first_format_is_fallback() {
        let first = vk::SurfaceFormatKHR {
            format: vk::Format::R8G8B8A8_UNORM,
            color_space: vk::ColorSpaceKHR::SRGB_NONLINEAR,
        };
        let wrong_space = vk::SurfaceFormatKHR {
            format: vk::Format::B8G8R8A8_UNORM,
            color_space: vk::ColorSpaceKHR::EXTENDED_SRGB_LINEAR_EXT,
        };
        assert!(same(select_surface_format(&[first, wrong_space]), first));
    }

    #[test]
    fn mailbox_preferred_then_fifo() {
        let modes = [vk::PresentModeKHR::IMMEDIATE, vk::PresentModeKHR::MAILBOX];
        assert_eq!(select_present_mode(&modes), vk::PresentModeKHR::MAILBOX);
        assert_eq!(
            select_present_mode(&[vk::PresentModeKHR::IMMEDIATE]),
            vk::PresentModeKHR::FIFO
        );
    }

    #[test]
    fn defined_current_extent_wins() {
        let mut caps = capabilities(2, 0);
        caps.current_extent = vk::Extent2D {
            width: 800,
            height: 600,
        };
        let extent = calculate_extent(&caps, 1920, 1080);
        assert_eq!((extent.width, extent.height), (800, 600));
    }

    #[test]
    fn undefined_extent_is_clamped() {
        let caps = capabilities(2, 0);
        let extent = calculate_extent(&caps, 8000, 4);
        assert_eq!((extent.width, extent.height), (4096, 16));
    }

    #[test]
    fn image_count_respects_max() {
        assert_eq!(image_count(&capabilities(2, 0)), 3);
        assert_eq!(image_count(&capabilities(2, 8)), 3);
        assert_eq!(image_count(&capabilities(3, 3)), 3);
    }
}
