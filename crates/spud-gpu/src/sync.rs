//! Synchronization primitives.
//!
//! Frame slots are cycled round-robin independently of the swapchain image
//! count. `images_in_flight` records which slot last submitted work touching
//! each swapchain image, as a slot index rather than a borrowed fence.
//!
//! Slots are allocated once. When a rebuilt swapchain has fewer images than
//! there are slots, only the first `image_count` slots are cycled and the
//! rest sit idle until the image count grows again.

use crate::driver::Driver;
use crate::error::Result;
use ash::vk;

/// Create a semaphore.
///
/// # Safety
/// The device must be valid.
pub unsafe fn create_semaphore(device: &ash::Device) -> Result<vk::Semaphore> {
    let create_info = vk::SemaphoreCreateInfo::default();
    // SAFETY: Caller guarantees the device is valid
    let semaphore = unsafe { device.create_semaphore(&create_info, None)? };
    Ok(semaphore)
}

/// Create a fence.
///
/// # Safety
/// The device must be valid.
pub unsafe fn create_fence(device: &ash::Device, signaled: bool) -> Result<vk::Fence> {
    let flags = if signaled {
        vk::FenceCreateFlags::SIGNALED
    } else {
        vk::FenceCreateFlags::empty()
    };

    let create_info = vk::FenceCreateInfo::default().flags(flags);
    // SAFETY: Caller guarantees the device is valid
    let fence = unsafe { device.create_fence(&create_info, None)? };
    Ok(fence)
}

/// Wait for a fence to be signaled.
///
/// # Safety
/// The device and fence must be valid.
#[cfg_attr(feature = "profiling-tracy", tracing::instrument(level = "trace", skip_all))]
pub unsafe fn wait_for_fence(
    device: &ash::Device,
    fence: vk::Fence,
    timeout_ns: u64,
) -> Result<()> {
    // SAFETY: Caller guarantees the device and fence are valid
    unsafe { device.wait_for_fences(&[fence], true, timeout_ns)? };
    Ok(())
}

/// Reset a fence to unsignaled state.
///
/// # Safety
/// The device and fence must be valid.
#[cfg_attr(feature = "profiling-tracy", tracing::instrument(level = "trace", skip_all))]
pub unsafe fn reset_fence(device: &ash::Device, fence: vk::Fence) -> Result<()> {
    // SAFETY: Caller guarantees the device and fence are valid
    unsafe { device.reset_fences(&[fence])? };
    Ok(())
}

/// Synchronization objects for one frame slot.
#[derive(Debug, Clone, Copy)]
pub struct FrameSlot {
    /// Signaled by acquire when the swapchain image can be written.
    pub image_available: vk::Semaphore,
    /// Signaled by the queue when the frame's commands complete; waited on by present.
    pub queue_complete: vk::Semaphore,
    /// Signaled when the slot's submission completes.
    pub in_flight: vk::Fence,
}

impl FrameSlot {
    /// Create the slot's objects. The fence starts signaled so the first use
    /// of the slot does not wait on a frame that never ran.
    pub fn new(driver: &impl Driver) -> Result<Self> {
        let image_available = driver.create_semaphore()?;
        let queue_complete = match driver.create_semaphore() {
            Ok(semaphore) => semaphore,
            Err(e) => {
                driver.destroy_semaphore(image_available);
                return Err(e);
            }
        };
        let in_flight = match driver.create_fence(true) {
            Ok(fence) => fence,
            Err(e) => {
                driver.destroy_semaphore(image_available);
                driver.destroy_semaphore(queue_complete);
                return Err(e);
            }
        };

        Ok(Self {
            image_available,
            queue_complete,
            in_flight,
        })
    }

    /// Destroy synchronization resources.
    pub fn destroy(&self, driver: &impl Driver) {
        driver.destroy_semaphore(self.image_available);
        driver.destroy_semaphore(self.queue_complete);
        driver.destroy_fence(self.in_flight);
    }
}

/// Manages synchronization for multiple frames in flight.
pub struct FrameSynchronizer {
    slots: Vec<FrameSlot>,
    /// Slots cycled by `advance`, never more than the swapchain image count.
    active: usize,
    images_in_flight: Vec<Option<usize>>,
    current_frame: usize,
}

impl FrameSynchronizer {
    /// Create `frames_in_flight` slots tracking `image_count` swapchain images.
    pub fn new(driver: &impl Driver, frames_in_flight: usize, image_count: usize) -> Result<Self> {
        assert!(frames_in_flight > 0, "at least one frame slot is required");

        let mut slots = Vec::with_capacity(frames_in_flight);
        for _ in 0..frames_in_flight {
            match FrameSlot::new(driver) {
                Ok(slot) => slots.push(slot),
                Err(e) => {
                    for slot in &slots {
                        slot.destroy(driver);
                    }
                    return Err(e);
                }
            }
        }
        tracing::info!("Sync objects created for {frames_in_flight} frames in flight.");

        Ok(Self {
            active: frames_in_flight.min(image_count.max(1)),
            slots,
            images_in_flight: vec![None; image_count],
            current_frame: 0,
        })
    }

    /// Get the current frame's sync resources.
    pub fn current(&self) -> &FrameSlot {
        &self.slots[self.current_frame]
    }

    /// Sync resources of slot `index`.
    pub fn slot(&self, index: usize) -> &FrameSlot {
        &self.slots[index]
    }

    /// Get the current frame index.
    pub const fn current_frame(&self) -> usize {
        self.current_frame
    }

    /// Number of frame slots currently cycled.
    pub const fn frames_in_flight(&self) -> usize {
        self.active
    }

    /// Number of frame slots allocated, idle ones included.
    pub fn allocated_slots(&self) -> usize {
        self.slots.len()
    }

    /// Advance to the next frame.
    pub fn advance(&mut self) {
        self.current_frame = (self.current_frame + 1) % self.active;
    }

    /// Slot whose submission last used swapchain image `image_index`.
    pub fn image_owner(&self, image_index: u32) -> Option<usize> {
        let index = image_index as usize;
        assert!(
            index < self.images_in_flight.len(),
            "image index {index} out of range for {} swapchain images",
            self.images_in_flight.len()
        );
        self.images_in_flight[index]
    }

    /// Record that the current slot now owns swapchain image `image_index`.
    pub fn assign_image(&mut self, image_index: u32) {
        let index = image_index as usize;
        assert!(
            index < self.images_in_flight.len(),
            "image index {index} out of range for {} swapchain images",
            self.images_in_flight.len()
        );
        self.images_in_flight[index] = Some(self.current_frame);
    }

    /// Forget every image owner, resizing the map to `image_count` images.
    ///
    /// The number of cycled slots is capped to `image_count`. A current slot
    /// past the new cap wraps back to slot 0.
    pub fn reset_images(&mut self, image_count: usize) {
        self.images_in_flight.clear();
        self.images_in_flight.resize(image_count, None);

        if image_count > 0 {
            self.active = self.slots.len().min(image_count);
            if self.current_frame >= self.active {
                self.current_frame = 0;
            }
        }
    }

    /// The whole image-to-slot map.
    pub fn images_in_flight(&self) -> &[Option<usize>] {
        &self.images_in_flight
    }

    /// Destroy all resources.
    ///
    /// The device must be idle.
    pub fn destroy(&mut self, driver: &impl Driver) {
        for slot in self.slots.drain(..) {
            slot.destroy(driver);
        }
        self.images_in_flight.clear();
    }
}
