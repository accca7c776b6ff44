//! Headless test harness for the Spud engine.
//!
//! Provides a scripted fake GPU and an in-memory filesystem so the frame
//! protocol can be exercised without a device or a window.

pub mod fs;
pub mod mock;

#[cfg(test)]
mod scenarios;

pub use fs::MemoryFileSystem;
pub use mock::{Call, Failure, MockDriver};

use spud_gpu::RendererConfig;

/// Renderer configuration for tests: no validation, short fence timeout.
pub fn test_config(max_frames_in_flight: u32) -> RendererConfig {
    RendererConfig {
        app_name: "spud-test".to_string(),
        validation: false,
        max_frames_in_flight,
        fence_timeout_ms: 100,
        ..RendererConfig::default()
    }
}
