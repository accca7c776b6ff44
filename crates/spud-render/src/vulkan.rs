//! Vulkan backend.

use std::path::{Path, PathBuf};

use raw_window_handle::{RawDisplayHandle, RawWindowHandle};
use spud_core::{FileSystem, GlobalUniforms};
use spud_gpu::{
    Driver, FrameOrchestrator, GpuContext, GpuContextBuilder, RendererConfig, Result, ShaderModule,
    ShaderStage,
};

use crate::backend::{BackendKind, RenderBackend};

/// Backend driving a [`FrameOrchestrator`].
pub struct VulkanBackend<D: Driver = GpuContext> {
    frames: FrameOrchestrator<D>,
    global_uniforms: GlobalUniforms,
    shader_dir: PathBuf,
}

impl VulkanBackend<GpuContext> {
    /// Create the Vulkan context for a window and build the frame core on it.
    pub fn new(
        config: &RendererConfig,
        display: RawDisplayHandle,
        window: RawWindowHandle,
        width: u32,
        height: u32,
    ) -> Result<Self> {
        let context = GpuContextBuilder::new().config(config).build(display, window)?;
        let backend = Self::with_driver(context, config, width, height)?;
        tracing::info!("Vulkan renderer initialized successfully.");
        Ok(backend)
    }
}

impl<D: Driver> VulkanBackend<D> {
    /// Build the frame core on an existing driver.
    pub fn with_driver(
        driver: D,
        config: &RendererConfig,
        width: u32,
        height: u32,
    ) -> Result<Self> {
        Ok(Self {
            frames: FrameOrchestrator::new(driver, config, width, height)?,
            global_uniforms: GlobalUniforms::default(),
            shader_dir: config.shader_dir.clone(),
        })
    }

    /// Load `<shader_dir>/<name>.<stage>.spv` and create its module.
    pub fn create_shader_module(
        &self,
        fs: &impl FileSystem,
        name: &str,
        stage: ShaderStage,
    ) -> Result<ShaderModule> {
        ShaderModule::load(self.frames.driver(), fs, &self.shader_dir, name, stage)
    }

    /// Destroy a module made by [`Self::create_shader_module`].
    pub fn destroy_shader_module(&self, module: &mut ShaderModule) {
        module.destroy(self.frames.driver());
    }

    pub fn shader_dir(&self) -> &Path {
        &self.shader_dir
    }

    pub const fn frames(&self) -> &FrameOrchestrator<D> {
        &self.frames
    }

    pub fn frames_mut(&mut self) -> &mut FrameOrchestrator<D> {
        &mut self.frames
    }

    /// Global state passed by the last `update_global_state`.
    pub const fn global_uniforms(&self) -> &GlobalUniforms {
        &self.global_uniforms
    }
}

impl<D: Driver> RenderBackend for VulkanBackend<D> {
    fn kind(&self) -> BackendKind {
        BackendKind::Vulkan
    }

    fn begin_frame(&mut self, delta_time: f32) -> Result<bool> {
        self.frames.begin_frame(delta_time)
    }

    fn update_global_state(&mut self, uniforms: &GlobalUniforms) {
        self.global_uniforms = *uniforms;
        tracing::trace!(
            "Global state updated ({} bytes)",
            bytemuck::bytes_of(&self.global_uniforms).len()
        );
    }

    fn end_frame(&mut self, delta_time: f32) -> Result<()> {
        self.frames.end_frame(delta_time)
    }

    fn resized(&mut self, width: u32, height: u32) {
        self.frames.on_resized(width, height);
    }

    fn shutdown(&mut self) {
        self.frames.shutdown();
    }
}
