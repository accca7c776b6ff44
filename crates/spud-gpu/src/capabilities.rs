//! Physical device description used during selection.
//!
//! A [`PhysicalDeviceCandidate`] is plain data gathered from the driver once per
//! device, so the selection rules in [`crate::selector`] can run without a GPU.

use std::collections::HashSet;
use std::ffi::CStr;

use ash::vk;

use crate::error::Result;
use crate::surface::{SurfaceContext, SwapchainSupport};

/// GPU vendor identification.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum GpuVendor {
    Nvidia,
    Amd,
    Intel,
    Apple,
    Other(u32),
}

impl GpuVendor {
    /// Identify vendor from PCI vendor ID.
    pub const fn from_vendor_id(id: u32) -> Self {
        match id {
            0x10DE => Self::Nvidia,
            0x1002 => Self::Amd,
            0x8086 => Self::Intel,
            0x106B => Self::Apple,
            other => Self::Other(other),
        }
    }
}

/// One queue family as seen by device selection.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct QueueFamilyInfo {
    pub flags: vk::QueueFlags,
    /// Whether this family can present to the target surface.
    pub supports_present: bool,
}

impl QueueFamilyInfo {
    pub const fn new(flags: vk::QueueFlags, supports_present: bool) -> Self {
        Self {
            flags,
            supports_present,
        }
    }
}

/// A memory heap of the device.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct MemoryHeap {
    pub size: u64,
    pub device_local: bool,
}

/// Everything selection needs to know about one physical device.
#[derive(Debug, Clone)]
pub struct PhysicalDeviceCandidate {
    pub handle: vk::PhysicalDevice,
    pub name: String,
    pub vendor: GpuVendor,
    pub device_type: vk::PhysicalDeviceType,
    pub api_version: u32,
    pub driver_version: u32,
    pub queue_families: Vec<QueueFamilyInfo>,
    pub extensions: HashSet<String>,
    pub sampler_anisotropy: bool,
    pub swapchain_support: SwapchainSupport,
    pub memory_heaps: Vec<MemoryHeap>,
}

impl PhysicalDeviceCandidate {
    /// Query a candidate description from the driver.
    ///
    /// # Safety
    /// The instance and physical device must be valid, and the surface must
    /// have been created from the same instance.
    pub unsafe fn query(
        instance: &ash::Instance,
        surface: &SurfaceContext,
        physical_device: vk::PhysicalDevice,
    ) -> Result<Self> {
        // SAFETY: Caller guarantees instance, device and surface are valid
        unsafe {
            let properties = instance.get_physical_device_properties(physical_device);
            let features = instance.get_physical_device_features(physical_device);
            let memory = instance.get_physical_device_memory_properties(physical_device);

            let families = instance.get_physical_device_queue_family_properties(physical_device);
            let mut queue_families = Vec::with_capacity(families.len());
            for (i, family) in (0u32..).zip(families.iter()) {
                queue_families.push(QueueFamilyInfo::new(
                    family.queue_flags,
                    surface.supports_present(physical_device, i)?,
                ));
            }

            let extensions = instance
                .enumerate_device_extension_properties(physical_device)?
                .iter()
                .filter_map(|ext| ext.extension_name_as_c_str().ok())
                .filter_map(|name| name.to_str().ok().map(String::from))
                .collect();

            let memory_heaps = memory
                .memory_heaps_as_slice()
                .iter()
                .map(|heap| MemoryHeap {
                    size: heap.size,
                    device_local: heap.flags.contains(vk::MemoryHeapFlags::DEVICE_LOCAL),
                })
                .collect();

            let name = CStr::from_ptr(properties.device_name.as_ptr())
                .to_string_lossy()
                .into_owned();

            Ok(Self {
                handle: physical_device,
                name,
                vendor: GpuVendor::from_vendor_id(properties.vendor_id),
                device_type: properties.device_type,
                api_version: properties.api_version,
                driver_version: properties.driver_version,
                queue_families,
                extensions,
                sampler_anisotropy: features.sampler_anisotropy == vk::TRUE,
                swapchain_support: surface.swapchain_support(physical_device)?,
                memory_heaps,
            })
        }
    }

    /// Human-readable device class.
    pub fn device_type_name(&self) -> &'static str {
        match self.device_type {
            vk::PhysicalDeviceType::DISCRETE_GPU => "Discrete",
            vk::PhysicalDeviceType::INTEGRATED_GPU => "Integrated",
            vk::PhysicalDeviceType::VIRTUAL_GPU => "Virtual",
            vk::PhysicalDeviceType::CPU => "CPU",
            _ => "Unknown",
        }
    }

    /// Log the selected device the way the engine reports it at startup.
    pub fn log_report(&self) {
        tracing::info!("Selected device: '{}' ({:?})", self.name, self.vendor);
        tracing::info!("GPU type is {}", self.device_type_name());
        tracing::info!(
            "GPU driver version: {}.{}.{}",
            vk::api_version_major(self.driver_version),
            vk::api_version_minor(self.driver_version),
            vk::api_version_patch(self.driver_version)
        );
        tracing::info!(
            "Vulkan API version: {}.{}.{}",
            vk::api_version_major(self.api_version),
            vk::api_version_minor(self.api_version),
            vk::api_version_patch(self.api_version)
        );
        for heap in &self.memory_heaps {
            #[allow(clippy::cast_precision_loss)]
            let gib = heap.size as f64 / 1024.0 / 1024.0 / 1024.0;
            if heap.device_local {
                tracing::info!("Local GPU memory: {gib:.2} GiB");
            } else {
                tracing::info!("Shared system memory: {gib:.2} GiB");
            }
        }
    }
}
