//! Application framework for the Spud engine.
//!
//! Handles window creation, renderer setup, resize forwarding and the event
//! loop so an application only supplies per-frame state.
//!
//! # Example
//!
//! ```no_run
//! use spud_app::{run_app, AppConfig, AppContext, SpudApp};
//!
//! struct MyApp;
//!
//! impl SpudApp for MyApp {
//!     fn init(_ctx: &mut AppContext) -> anyhow::Result<Self> {
//!         Ok(MyApp)
//!     }
//!
//!     fn update(&mut self, _ctx: &AppContext, _dt: f32) {}
//! }
//!
//! fn main() -> anyhow::Result<()> {
//!     run_app::<MyApp>(AppConfig::default())
//! }
//! ```

mod app;
mod config;
mod context;
mod runner;

pub use app::SpudApp;
pub use config::AppConfig;
pub use context::AppContext;
pub use runner::run_app;

// Re-export commonly used types for convenience
pub use spud_core::RenderPacket;
pub use spud_render::RendererFrontend;
pub use winit::event::WindowEvent;
