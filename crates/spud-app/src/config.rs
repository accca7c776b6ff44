//! Application configuration.

use std::path::Path;

use anyhow::Context;
use serde::Deserialize;
use spud_gpu::RendererConfig;

/// Application configuration.
#[derive(Debug, Clone, Deserialize)]
#[serde(default)]
pub struct AppConfig {
    /// Window title.
    pub title: String,
    /// Initial window width.
    pub width: u32,
    /// Initial window height.
    pub height: u32,
    /// Target frames per second (None for unlimited).
    pub target_fps: Option<u32>,
    /// Device selection and frame loop settings.
    pub renderer: RendererConfig,
}

impl Default for AppConfig {
    fn default() -> Self {
        Self {
            title: "Spud Engine".to_string(),
            width: 1280,
            height: 720,
            target_fps: None,
            renderer: RendererConfig::default(),
        }
    }
}

impl AppConfig {
    /// Create a new config with the given title.
    pub fn new(title: impl Into<String>) -> Self {
        let title = title.into();
        Self {
            renderer: RendererConfig {
                app_name: title.clone(),
                ..RendererConfig::default()
            },
            title,
            ..Default::default()
        }
    }

    /// Parse a TOML document. Missing keys keep their defaults.
    pub fn from_toml_str(source: &str) -> anyhow::Result<Self> {
        toml::from_str(source).context("invalid app config")
    }

    /// Load `path` if it exists, otherwise fall back to defaults.
    pub fn load_or_default(path: &Path) -> anyhow::Result<Self> {
        if !path.exists() {
            tracing::info!("{} not found, using default config", path.display());
            return Ok(Self::default());
        }

        let source = std::fs::read_to_string(path)
            .with_context(|| format!("reading {}", path.display()))?;
        let config = Self::from_toml_str(&source)
            .with_context(|| format!("parsing {}", path.display()))?;
        tracing::info!("Loaded config from {}", path.display());
        Ok(config)
    }

    /// Set the window dimensions.
    #[must_use]
    pub const fn with_size(mut self, width: u32, height: u32) -> Self {
        self.width = width;
        self.height = height;
        self
    }

    /// Set the target FPS.
    #[must_use]
    pub const fn with_target_fps(mut self, fps: u32) -> Self {
        self.target_fps = Some(fps);
        self
    }

    /// Enable or disable validation layers.
    #[must_use]
    pub const fn with_validation(mut self, validation: bool) -> Self {
        self.renderer.validation = validation;
        self
    }

    /// Set the number of frames the CPU may record ahead of the GPU.
    #[must_use]
    pub const fn with_frames_in_flight(mut self, frames: u32) -> Self {
        self.renderer.max_frames_in_flight = frames;
        self
    }
}
