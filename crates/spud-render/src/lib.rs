//! Renderer frontend for the Spud engine.
//!
//! This crate provides:
//! - [`RendererFrontend`], the per-frame entry point used by applications
//! - The [`RenderBackend`] interface and the closed set of backends ([`BackendKind`])
//! - The Vulkan backend built on `spud-gpu`'s frame orchestrator

pub mod backend;
pub mod frontend;
pub mod vulkan;

pub use backend::{BackendKind, RenderBackend};
pub use frontend::RendererFrontend;
pub use vulkan::VulkanBackend;
