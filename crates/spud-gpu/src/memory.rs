//! GPU memory management for device-local attachments.

use crate::error::{GpuError, Result};
use ash::vk;
use gpu_allocator::vulkan::{
    Allocation, AllocationCreateDesc, AllocationScheme, Allocator, AllocatorCreateDesc,
};
use gpu_allocator::MemoryLocation;
use std::collections::HashMap;
use std::sync::Arc;

/// GPU memory allocator wrapper.
///
/// Images created here own a dedicated allocation that is released again by
/// [`GpuAllocator::free_image`].
pub struct GpuAllocator {
    allocator: Option<Allocator>,
    device: Arc<ash::Device>,
    images: HashMap<vk::Image, Allocation>,
}

impl GpuAllocator {
    /// Create a new allocator.
    ///
    /// # Safety
    /// The instance, device, and physical device must be valid.
    pub unsafe fn new(
        instance: &ash::Instance,
        device: Arc<ash::Device>,
        physical_device: vk::PhysicalDevice,
    ) -> Result<Self> {
        let allocator = Allocator::new(&AllocatorCreateDesc {
            instance: instance.clone(),
            device: (*device).clone(),
            physical_device,
            debug_settings: gpu_allocator::AllocatorDebugSettings {
                log_memory_information: cfg!(debug_assertions),
                log_leaks_on_shutdown: true,
                store_stack_traces: false,
                log_allocations: false,
                log_frees: false,
                log_stack_traces: false,
            },
            buffer_device_address: false,
            allocation_sizes: gpu_allocator::AllocationSizes::default(),
        })
        .map_err(|e| GpuError::AllocationFailed(e.to_string()))?;

        Ok(Self {
            allocator: Some(allocator),
            device,
            images: HashMap::new(),
        })
    }

    /// Create an image and bind freshly allocated memory to it.
    pub fn create_image(
        &mut self,
        create_info: &vk::ImageCreateInfo,
        location: MemoryLocation,
        name: &str,
    ) -> Result<vk::Image> {
        let allocator = self
            .allocator
            .as_mut()
            .ok_or_else(|| GpuError::AllocationFailed("allocator already shut down".to_string()))?;

        // SAFETY: The device is valid for the allocator's lifetime
        let image = unsafe { self.device.create_image(create_info, None)? };
        // SAFETY: image was just created on this device
        let requirements = unsafe { self.device.get_image_memory_requirements(image) };

        let allocation = match allocator.allocate(&AllocationCreateDesc {
            name,
            requirements,
            location,
            linear: false,
            allocation_scheme: AllocationScheme::GpuAllocatorManaged,
        }) {
            Ok(allocation) => allocation,
            Err(e) => {
                // SAFETY: image has no memory bound and is unused
                unsafe { self.device.destroy_image(image, None) };
                return Err(GpuError::AllocationFailed(e.to_string()));
            }
        };

        // SAFETY: allocation satisfies the image's memory requirements
        if let Err(e) = unsafe {
            self.device
                .bind_image_memory(image, allocation.memory(), allocation.offset())
        } {
            let _ = allocator.free(allocation);
            // SAFETY: image is unused
            unsafe { self.device.destroy_image(image, None) };
            return Err(e.into());
        }

        self.images.insert(image, allocation);
        Ok(image)
    }

    /// Destroy an image created by [`GpuAllocator::create_image`] and free its memory.
    pub fn free_image(&mut self, image: vk::Image) {
        // SAFETY: Caller no longer uses the image
        unsafe { self.device.destroy_image(image, None) };

        if let (Some(allocation), Some(allocator)) =
            (self.images.remove(&image), self.allocator.as_mut())
        {
            if let Err(e) = allocator.free(allocation) {
                tracing::warn!("Failed to free image memory: {e}");
            }
        }
    }

    /// Number of images whose memory is still allocated.
    pub fn live_images(&self) -> usize {
        self.images.len()
    }

    /// Shutdown the allocator, freeing all GPU memory.
    ///
    /// This must be called before the Vulkan device is destroyed.
    /// Any remaining allocations will be freed (and logged as leaks).
    pub fn shutdown(&mut self) {
        for (image, allocation) in self.images.drain() {
            tracing::warn!("Image {image:?} still alive at allocator shutdown");
            if let Some(allocator) = self.allocator.as_mut() {
                let _ = allocator.free(allocation);
            }
        }
        self.allocator = None;
    }
}

impl Drop for GpuAllocator {
    fn drop(&mut self) {
        self.shutdown();
    }
}
