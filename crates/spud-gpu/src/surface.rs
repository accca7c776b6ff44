//! Surface management for windowed rendering.
//!
//! Wraps the Vulkan surface created from a window and the queries made
//! against it during device selection and swapchain (re)creation.

use crate::error::{GpuError, Result};
use ash::vk;
use raw_window_handle::{RawDisplayHandle, RawWindowHandle};

/// The Vulkan surface for one window.
pub struct SurfaceContext {
    /// The Vulkan surface handle.
    pub surface: vk::SurfaceKHR,
    /// Surface extension loader.
    pub surface_loader: ash::khr::surface::Instance,
}

impl SurfaceContext {
    /// Create a surface from raw window handles.
    ///
    /// # Safety
    /// The instance must be valid and outlive the surface; the handles must
    /// refer to a live window.
    pub unsafe fn new(
        entry: &ash::Entry,
        instance: &ash::Instance,
        display: RawDisplayHandle,
        window: RawWindowHandle,
    ) -> Result<Self> {
        // SAFETY: Caller guarantees the instance and window handles are valid
        let surface = unsafe { ash_window::create_surface(entry, instance, display, window, None) }
            .map_err(|e| GpuError::SurfaceCreation(e.to_string()))?;
        let surface_loader = ash::khr::surface::Instance::new(entry, instance);

        Ok(Self {
            surface,
            surface_loader,
        })
    }

    /// Whether queue family `family` of `physical_device` can present to this surface.
    ///
    /// # Safety
    /// The physical device must belong to the instance the surface was created with.
    pub unsafe fn supports_present(
        &self,
        physical_device: vk::PhysicalDevice,
        family: u32,
    ) -> Result<bool> {
        // SAFETY: Caller guarantees the physical device is valid
        let supported = unsafe {
            self.surface_loader
                .get_physical_device_surface_support(physical_device, family, self.surface)?
        };
        Ok(supported)
    }

    /// Query capabilities, formats and present modes for `physical_device`.
    ///
    /// # Safety
    /// The physical device must belong to the instance the surface was created with.
    pub unsafe fn swapchain_support(
        &self,
        physical_device: vk::PhysicalDevice,
    ) -> Result<SwapchainSupport> {
        // SAFETY: Caller guarantees the physical device is valid
        unsafe {
            let capabilities = self
                .surface_loader
                .get_physical_device_surface_capabilities(physical_device, self.surface)?;

            let formats = self
                .surface_loader
                .get_physical_device_surface_formats(physical_device, self.surface)?;

            let present_modes = self
                .surface_loader
                .get_physical_device_surface_present_modes(physical_device, self.surface)?;

            Ok(SwapchainSupport {
                capabilities,
                formats,
                present_modes,
            })
        }
    }

    /// Destroy the surface.
    ///
    /// # Safety
    /// No swapchain may still reference the surface.
    pub unsafe fn destroy(&self) {
        // SAFETY: Caller guarantees the surface is no longer in use
        unsafe { self.surface_loader.destroy_surface(self.surface, None) };
    }
}

/// What a surface supports on a given physical device.
#[derive(Debug, Clone, Default)]
pub struct SwapchainSupport {
    /// Raw surface capabilities.
    pub capabilities: vk::SurfaceCapabilitiesKHR,
    /// Supported surface formats.
    pub formats: Vec<vk::SurfaceFormatKHR>,
    /// Supported present modes.
    pub present_modes: Vec<vk::PresentModeKHR>,
}

impl SwapchainSupport {
    /// At least one surface format and one present mode are available.
    pub fn is_adequate(&self) -> bool {
        !self.formats.is_empty() && !self.present_modes.is_empty()
    }
}
