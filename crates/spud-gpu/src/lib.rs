//! Vulkan device, swapchain and frame synchronization core for the Spud engine.
//!
//! This crate provides:
//! - Physical device selection and logical device creation
//! - Swapchain lifecycle with resize-driven recreation
//! - The main render pass and per-image frame buffers
//! - Command buffers with an explicit recording state machine
//! - Frame slots (fences and semaphores) and the begin/end frame protocol
//!
//! Everything above [`Driver`] is plain bookkeeping over Vulkan handles and
//! can run against a fake driver in tests.

pub mod capabilities;
pub mod command;
pub mod config;
pub mod context;
pub mod driver;
pub mod error;
pub mod frame;
pub mod instance;
pub mod memory;
pub mod render_pass;
pub mod selector;
pub mod shader;
pub mod surface;
pub mod swapchain;
pub mod sync;

pub use capabilities::{GpuVendor, MemoryHeap, PhysicalDeviceCandidate, QueueFamilyInfo};
pub use command::{CommandBuffer, CommandBufferPool, CommandBufferState, CommandOp};
pub use config::RendererConfig;
pub use context::{GpuContext, GpuContextBuilder};
pub use driver::{AcquireOutcome, Driver, FrameSubmission, PresentOutcome, SwapchainDesc};
pub use error::{GpuError, Result};
pub use frame::{FrameContext, FrameOrchestrator};
pub use memory::GpuAllocator;
pub use render_pass::{ClearValues, FrameBuffer, RenderPass};
pub use selector::{select_device, DeviceRequirements, DeviceSelection, QueueFamilyIndices};
pub use shader::{ShaderModule, ShaderStage};
pub use surface::{SurfaceContext, SwapchainSupport};
pub use swapchain::{Swapchain, SwapchainManager, SwapchainState};
pub use sync::{FrameSlot, FrameSynchronizer};

pub use ash::vk;
