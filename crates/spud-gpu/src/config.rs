//! Renderer configuration.

use std::path::PathBuf;
use std::time::Duration;

use ash::vk;
use serde::Deserialize;

use crate::selector::DeviceRequirements;

/// Configuration for device selection and the frame loop.
#[derive(Debug, Clone, Deserialize)]
#[serde(default)]
pub struct RendererConfig {
    /// Application name reported to the driver.
    pub app_name: String,
    /// Enable Vulkan validation layers and the debug messenger.
    pub validation: bool,
    /// What a physical device must provide to be selected.
    pub requirements: DeviceRequirements,
    /// Number of frame slots. Clamped to `[1, image_count]`.
    pub max_frames_in_flight: u32,
    /// Upper bound for any CPU wait on a frame fence.
    pub fence_timeout_ms: u64,
    /// RGBA clear color of the main render pass.
    pub clear_color: [f32; 4],
    pub clear_depth: f32,
    pub clear_stencil: u32,
    /// Directory holding `<name>.<stage>.spv` shader binaries.
    pub shader_dir: PathBuf,
}

impl Default for RendererConfig {
    fn default() -> Self {
        Self {
            app_name: "Spud".to_string(),
            validation: cfg!(debug_assertions),
            requirements: DeviceRequirements::default(),
            max_frames_in_flight: 2,
            fence_timeout_ms: 5_000,
            clear_color: [0.0, 0.0, 0.2, 1.0],
            clear_depth: 1.0,
            clear_stencil: 0,
            shader_dir: PathBuf::from("assets/shaders"),
        }
    }
}

impl RendererConfig {
    /// Fence timeout in nanoseconds, as the driver expects it.
    pub fn fence_timeout_ns(&self) -> u64 {
        u64::try_from(Duration::from_millis(self.fence_timeout_ms).as_nanos()).unwrap_or(u64::MAX)
    }

    /// Clear color as a Vulkan clear value.
    pub const fn clear_color_value(&self) -> vk::ClearColorValue {
        vk::ClearColorValue {
            float32: self.clear_color,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn timeout_converts_to_nanoseconds() {
        let config = RendererConfig {
            fence_timeout_ms: 3,
            ..Default::default()
        };
        assert_eq!(config.fence_timeout_ns(), 3_000_000);
    }

    #[test]
    fn defaults_match_engine_clear_color() {
        let config = RendererConfig::default();
        assert_eq!(config.clear_color, [0.0, 0.0, 0.2, 1.0]);
        assert_eq!(config.max_frames_in_flight, 2);
    }
}
