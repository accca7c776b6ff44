//! Physical device selection.
//!
//! Devices are tested in enumeration order and the first one meeting every
//! requirement wins.

use ash::vk;
use serde::Deserialize;

use crate::capabilities::{PhysicalDeviceCandidate, QueueFamilyInfo};
use crate::error::{GpuError, Result};

/// What a physical device must provide.
#[derive(Debug, Clone, PartialEq, Eq, Deserialize)]
#[serde(default)]
pub struct DeviceRequirements {
    pub graphics: bool,
    pub present: bool,
    pub compute: bool,
    pub transfer: bool,
    pub sampler_anisotropy: bool,
    /// Only accept discrete GPUs.
    pub discrete_gpu: bool,
    /// Device extensions that must all be available.
    pub device_extensions: Vec<String>,
}

impl Default for DeviceRequirements {
    fn default() -> Self {
        Self {
            graphics: true,
            present: true,
            compute: false,
            transfer: true,
            sampler_anisotropy: true,
            discrete_gpu: false,
            device_extensions: vec![swapchain_extension_name()],
        }
    }
}

fn swapchain_extension_name() -> String {
    ash::khr::swapchain::NAME.to_string_lossy().into_owned()
}

/// Queue family indices chosen for the selected device.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct QueueFamilyIndices {
    pub graphics: u32,
    pub present: u32,
    pub transfer: u32,
    pub compute: Option<u32>,
}

impl QueueFamilyIndices {
    /// Distinct families that need a queue, graphics first.
    pub fn unique(&self) -> Vec<u32> {
        let mut families = vec![self.graphics];
        for family in [self.present, self.transfer] {
            if !families.contains(&family) {
                families.push(family);
            }
        }
        families
    }
}

/// Families found on one device, before requirements are applied.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct QueueFamilySearch {
    pub graphics: Option<u32>,
    pub present: Option<u32>,
    pub compute: Option<u32>,
    pub transfer: Option<u32>,
}

/// Pick a family for each queue role.
///
/// Graphics and compute take the first family advertising them. Present
/// prefers the graphics family when it can present. Transfer takes the
/// transfer-capable family with the fewest graphics/compute capabilities, so
/// a transfer-only family beats one shared with rendering. On a tie the later
/// family wins.
pub fn find_queue_families(families: &[QueueFamilyInfo]) -> QueueFamilySearch {
    let mut search = QueueFamilySearch::default();
    let mut min_transfer_score = u8::MAX;

    for (i, family) in (0u32..).zip(families) {
        let mut transfer_score = 0u8;

        if family.flags.contains(vk::QueueFlags::GRAPHICS) {
            search.graphics.get_or_insert(i);
            transfer_score += 1;
        }

        if family.flags.contains(vk::QueueFlags::COMPUTE) {
            search.compute.get_or_insert(i);
            transfer_score += 1;
        }

        if family.flags.contains(vk::QueueFlags::TRANSFER) && transfer_score <= min_transfer_score {
            min_transfer_score = transfer_score;
            search.transfer = Some(i);
        }

        if family.supports_present {
            search.present.get_or_insert(i);
        }
    }

    if let Some(graphics) = search.graphics {
        if families[graphics as usize].supports_present {
            search.present = Some(graphics);
        }
    }

    search
}

/// Check one candidate, returning its queue families if it qualifies.
pub fn meets_requirements(
    candidate: &PhysicalDeviceCandidate,
    requirements: &DeviceRequirements,
) -> Option<QueueFamilyIndices> {
    if requirements.discrete_gpu && candidate.device_type != vk::PhysicalDeviceType::DISCRETE_GPU {
        tracing::info!(
            "'{}' is not a discrete GPU, and one is required, skipping device.",
            candidate.name
        );
        return None;
    }

    let search = find_queue_families(&candidate.queue_families);
    tracing::info!("Graphics | Present | Compute | Transfer | Name");
    tracing::info!(
        "       {} |       {} |       {} |        {} | {}",
        u8::from(search.graphics.is_some()),
        u8::from(search.present.is_some()),
        u8::from(search.compute.is_some()),
        u8::from(search.transfer.is_some()),
        candidate.name
    );

    let queues_ok = (!requirements.graphics || search.graphics.is_some())
        && (!requirements.present || search.present.is_some())
        && (!requirements.compute || search.compute.is_some())
        && (!requirements.transfer || search.transfer.is_some());
    if !queues_ok {
        tracing::info!("'{}' lacks a required queue family, skipping device.", candidate.name);
        return None;
    }

    if !candidate.swapchain_support.is_adequate() {
        tracing::info!("Required swapchain support not present, skipping device.");
        return None;
    }

    if let Some(missing) = requirements
        .device_extensions
        .iter()
        .find(|ext| !candidate.extensions.contains(ext.as_str()))
    {
        tracing::info!("Required extension not found: {missing}, skipping device.");
        return None;
    }

    if requirements.sampler_anisotropy && !candidate.sampler_anisotropy {
        tracing::info!("Device does not support samplerAnisotropy, skipping device.");
        return None;
    }

    // A graphics queue is needed to own the command pool even when not demanded.
    let graphics = search.graphics?;
    let indices = QueueFamilyIndices {
        graphics,
        present: search.present.unwrap_or(graphics),
        transfer: search.transfer.unwrap_or(graphics),
        compute: search.compute,
    };
    tracing::trace!("Queue families: {indices:?}");
    Some(indices)
}

/// Result of device selection.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct DeviceSelection {
    /// Index into the candidate list.
    pub index: usize,
    pub queue_families: QueueFamilyIndices,
}

/// Select the first candidate that meets `requirements`.
pub fn select_device(
    candidates: &[PhysicalDeviceCandidate],
    requirements: &DeviceRequirements,
) -> Result<DeviceSelection> {
    if candidates.is_empty() {
        tracing::error!("No devices which support Vulkan were found.");
        return Err(GpuError::NoSuitableDevice);
    }

    candidates
        .iter()
        .enumerate()
        .find_map(|(index, candidate)| {
            meets_requirements(candidate, requirements).map(|queue_families| DeviceSelection {
                index,
                queue_families,
            })
        })
        .ok_or_else(|| {
            tracing::error!("No physical devices were found which meet the requirements.");
            GpuError::NoSuitableDevice
        })
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::capabilities::GpuVendor;
    use crate::surface::SwapchainSupport;
    use std::collections::HashSet;

    const ALL: vk::QueueFlags = vk::QueueFlags::from_raw(
        vk::QueueFlags::GRAPHICS.as_raw()
            | vk::QueueFlags::COMPUTE.as_raw()
            | vk::QueueFlags::TRANSFER.as_raw(),
    );

    fn candidate(name: &str) -> PhysicalDeviceCandidate {
        PhysicalDeviceCandidate {
            handle: vk::PhysicalDevice::null(),
            name: name.to_string(),
            vendor: GpuVendor::Other(0),
            device_type: vk::PhysicalDeviceType::DISCRETE_GPU,
            api_version: vk::API_VERSION_1_3,
            driver_version: 0,
            queue_families: vec![QueueFamilyInfo::new(ALL, true)],
            extensions: HashSet::from([swapchain_extension_name()]),
            sampler_anisotropy: true,
            swapchain_support: SwapchainSupport {
                capabilities: vk::SurfaceCapabilitiesKHR::default(),
                formats: vec![vk::SurfaceFormatKHR::default()],
                present_modes: vec![vk::PresentModeKHR::FIFO],
            },
            memory_heaps: Vec::new(),
        }
    }

    #[test]
    fn qualifying_device_listed_second_is_selected() {
        let mut first = candidate("no-swapchain-no-aniso");
        first.extensions.clear();
        first.sampler_anisotropy = false;
        let second = candidate("capable");

        let selection = select_device(&[first, second], &DeviceRequirements::default()).unwrap();
        assert_eq!(selection.index, 1);
    }

    #[test]
    fn first_qualifying_device_wins() {
        let candidates = [candidate("a"), candidate("b")];
        let selection = select_device(&candidates, &DeviceRequirements::default()).unwrap();
        assert_eq!(selection.index, 0);
    }

    #[test]
    fn no_devices_is_an_error() {
        let result = select_device(&[], &DeviceRequirements::default());
        assert!(matches!(result, Err(GpuError::NoSuitableDevice)));
    }

    #[test]
    fn no_qualifying_device_is_an_error() {
        let mut only = candidate("no-aniso");
        only.sampler_anisotropy = false;
        let result = select_device(&[only], &DeviceRequirements::default());
        assert!(matches!(result, Err(GpuError::NoSuitableDevice)));
    }

    #[test]
    fn anisotropy_only_checked_when_required() {
        let mut device = candidate("no-aniso");
        device.sampler_anisotropy = false;
        let requirements = DeviceRequirements {
            sampler_anisotropy: false,
            ..Default::default()
        };
        assert!(meets_requirements(&device, &requirements).is_some());
    }

    #[test]
    fn discrete_only_rejects_integrated() {
        let mut device = candidate("igpu");
        device.device_type = vk::PhysicalDeviceType::INTEGRATED_GPU;
        let requirements = DeviceRequirements {
            discrete_gpu: true,
            ..Default::default()
        };
        assert!(meets_requirements(&device, &requirements).is_none());
        assert!(meets_requirements(&device, &DeviceRequirements::default()).is_some());
    }

    #[test]
    fn empty_swapchain_support_rejects_device() {
        let mut no_modes = candidate("no-modes");
        no_modes.swapchain_support.present_modes.clear();
        assert!(meets_requirements(&no_modes, &DeviceRequirements::default()).is_none());

        let mut no_formats = candidate("no-formats");
        no_formats.swapchain_support.formats.clear();
        assert!(meets_requirements(&no_formats, &DeviceRequirements::default()).is_none());
    }

    #[test]
    fn missing_present_family_rejects_device() {
        let mut device = candidate("headless");
        device.queue_families = vec![QueueFamilyInfo::new(ALL, false)];
        assert!(meets_requirements(&device, &DeviceRequirements::default()).is_none());
    }

    #[test]
    fn compute_required_but_absent() {
        let mut device = candidate("graphics-only");
        device.queue_families = vec![QueueFamilyInfo::new(
            vk::QueueFlags::GRAPHICS | vk::QueueFlags::TRANSFER,
            true,
        )];
        let requirements = DeviceRequirements {
            compute: true,
            ..Default::default()
        };
        assert!(meets_requirements(&device, &requirements).is_none());
    }

    #[test]
    fn dedicated_transfer_family_is_preferred() {
        let families = [
            QueueFamilyInfo::new(ALL, true),
            QueueFamilyInfo::new(vk::QueueFlags::COMPUTE | vk::QueueFlags::TRANSFER, false),
            QueueFamilyInfo::new(vk::QueueFlags::TRANSFER, false),
        ];
        let search = find_queue_families(&families);
        assert_eq!(search.graphics, Some(0));
        assert_eq!(search.compute, Some(0));
        assert_eq!(search.transfer, Some(2));
        assert_eq!(search.present, Some(0));
    }

    #[test]
    fn transfer_score_ties_keep_last_family() {
        let families = [
            QueueFamilyInfo::new(ALL, true),
            QueueFamilyInfo::new(vk::QueueFlags::TRANSFER, false),
            QueueFamilyInfo::new(vk::QueueFlags::TRANSFER, false),
        ];
        assert_eq!(find_queue_families(&families).transfer, Some(2));

        let sparse = [
            QueueFamilyInfo::new(ALL, true),
            QueueFamilyInfo::new(vk::QueueFlags::TRANSFER, false),
            QueueFamilyInfo::new(vk::QueueFlags::TRANSFER | vk::QueueFlags::SPARSE_BINDING, false),
        ];
        assert_eq!(find_queue_families(&sparse).transfer, Some(2));
    }

    #[test]
    fn shared_family_does_not_displace_dedicated_transfer() {
        let families = [
            QueueFamilyInfo::new(vk::QueueFlags::TRANSFER, false),
            QueueFamilyInfo::new(ALL, true),
        ];
        assert_eq!(find_queue_families(&families).transfer, Some(0));
    }

    #[test]
    fn present_prefers_graphics_family() {
        let families = [
            QueueFamilyInfo::new(vk::QueueFlags::TRANSFER, true),
            QueueFamilyInfo::new(ALL, true),
        ];
        let search = find_queue_families(&families);
        assert_eq!(search.graphics, Some(1));
        assert_eq!(search.present, Some(1));
    }

    #[test]
    fn separate_present_family_is_used_when_graphics_cannot_present() {
        let mut device = candidate("split");
        device.queue_families = vec![
            QueueFamilyInfo::new(ALL, false),
            QueueFamilyInfo::new(vk::QueueFlags::TRANSFER, true),
        ];
        let indices = meets_requirements(&device, &DeviceRequirements::default()).unwrap();
        assert_eq!(indices.graphics, 0);
        assert_eq!(indices.present, 1);
        assert_eq!(indices.transfer, 1);
        assert_eq!(indices.unique(), vec![0, 1]);
    }

    #[test]
    fn unique_families_collapse_aliases() {
        let indices = QueueFamilyIndices {
            graphics: 0,
            present: 0,
            transfer: 0,
            compute: None,
        };
        assert_eq!(indices.unique(), vec![0]);
    }
}
