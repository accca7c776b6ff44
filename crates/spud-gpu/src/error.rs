//! GPU error types.

use ash::vk;
use thiserror::Error;

/// GPU-related errors.
#[derive(Error, Debug)]
pub enum GpuError {
    /// Vulkan error.
    #[error("Vulkan error: {0}")]
    Vulkan(#[from] vk::Result),

    /// The Vulkan loader could not be found or opened.
    #[error("Failed to load Vulkan: {0}")]
    Loading(String),

    /// No physical device meets the requirements.
    #[error("No suitable GPU found")]
    NoSuitableDevice,

    /// None of the depth format candidates supports depth-stencil attachment usage.
    #[error("No supported depth format")]
    NoDepthFormat,

    /// Surface creation failed.
    #[error("Surface creation failed: {0}")]
    SurfaceCreation(String),

    /// Swapchain creation failed.
    #[error("Swapchain creation failed: {0}")]
    SwapchainCreation(String),

    /// Shader module creation failed.
    #[error("Shader module creation failed: {0}")]
    ShaderModule(String),

    /// Memory allocation failed.
    #[error("Memory allocation failed: {0}")]
    AllocationFailed(String),

    /// A bounded fence wait expired.
    #[error("Fence wait timed out after {timeout_ms} ms")]
    FenceTimeout { timeout_ms: u64 },

    /// The device stopped making progress.
    #[error("Device lost")]
    DeviceLost,

    /// A swapchain recreation was requested while one is already running.
    #[error("Swapchain recreation already in progress")]
    RecreationInProgress,

    /// Error from a core collaborator (filesystem).
    #[error(transparent)]
    Core(#[from] spud_core::Error),
}

/// Result type alias.
pub type Result<T> = std::result::Result<T, GpuError>;
