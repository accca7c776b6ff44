//! Shader module loading.
//!
//! Precompiled SPIR-V lives at `<shader_dir>/<name>.<stage>.spv`.

use crate::driver::Driver;
use crate::error::{GpuError, Result};
use ash::vk;
use spud_core::FileSystem;
use std::ffi::CStr;
use std::io::Cursor;
use std::path::{Path, PathBuf};

/// Entry point every shader module is expected to export.
pub const SHADER_ENTRY_POINT: &CStr = c"main";

/// Pipeline stage a shader module is built for.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum ShaderStage {
    Vertex,
    Fragment,
    Compute,
}

impl ShaderStage {
    /// File name component for this stage.
    pub const fn extension(self) -> &'static str {
        match self {
            Self::Vertex => "vert",
            Self::Fragment => "frag",
            Self::Compute => "comp",
        }
    }

    pub const fn flags(self) -> vk::ShaderStageFlags {
        match self {
            Self::Vertex => vk::ShaderStageFlags::VERTEX,
            Self::Fragment => vk::ShaderStageFlags::FRAGMENT,
            Self::Compute => vk::ShaderStageFlags::COMPUTE,
        }
    }
}

/// Path of the SPIR-V binary for shader `name` at `stage`.
pub fn shader_path(dir: &Path, name: &str, stage: ShaderStage) -> PathBuf {
    dir.join(format!("{name}.{}.spv", stage.extension()))
}

/// A shader module and the stage it belongs to.
#[derive(Debug)]
pub struct ShaderModule {
    handle: vk::ShaderModule,
    stage: ShaderStage,
}

impl ShaderModule {
    /// Load `<dir>/<name>.<stage>.spv` through `fs` and create the module.
    pub fn load(
        driver: &impl Driver,
        fs: &impl FileSystem,
        dir: &Path,
        name: &str,
        stage: ShaderStage,
    ) -> Result<Self> {
        let path = shader_path(dir, name, stage);
        let bytes = fs.read_all_bytes(&path)?;

        let code = ash::util::read_spv(&mut Cursor::new(&bytes))
            .map_err(|e| GpuError::ShaderModule(format!("{}: {e}", path.display())))?;

        let handle = driver.create_shader_module(&code)?;
        tracing::debug!("Shader module created: {} ({} bytes)", path.display(), bytes.len());

        Ok(Self { handle, stage })
    }

    pub const fn handle(&self) -> vk::ShaderModule {
        self.handle
    }

    pub const fn stage(&self) -> ShaderStage {
        self.stage
    }

    /// Stage description for pipeline creation.
    pub fn stage_create_info(&self) -> vk::PipelineShaderStageCreateInfo<'static> {
        vk::PipelineShaderStageCreateInfo::default()
            .stage(self.stage.flags())
            .module(self.handle)
            .name(SHADER_ENTRY_POINT)
    }

    pub fn destroy(&mut self, driver: &impl Driver) {
        if self.handle != vk::ShaderModule::null() {
            driver.destroy_shader_module(self.handle);
            self.handle = vk::ShaderModule::null();
        }
    }
}
