//! Spud Engine sandbox.
//!
//! Opens a window, clears it every frame and orbits a camera around the
//! origin. Resize or minimize the window to exercise swapchain recreation.
//!
//! ## Usage
//!
//! ```bash
//! cargo run -p spud-sandbox
//! ```
//!
//! Settings are read from `sandbox.toml` in the working directory when it
//! exists, for example:
//!
//! ```toml
//! title = "Sandbox"
//! target_fps = 144
//!
//! [renderer]
//! max_frames_in_flight = 3
//! clear_color = [0.1, 0.1, 0.1, 1.0]
//! ```
//!
//! ## Environment Variables
//!
//! - `RUST_LOG`: Set log level (e.g., info, debug, trace)

use std::path::Path;

use glam::{Mat4, Vec3};
use spud_app::{run_app, AppConfig, AppContext, RenderPacket, SpudApp};
use tracing::info;

const CONFIG_PATH: &str = "sandbox.toml";
const ORBIT_RADIUS: f32 = 6.0;
const ORBIT_SPEED: f32 = 0.5;

struct Sandbox {
    time: f32,
    fps_timer: f32,
    fps_frames: u32,
}

impl SpudApp for Sandbox {
    fn init(ctx: &mut AppContext) -> anyhow::Result<Self> {
        let size = ctx.window.inner_size();
        info!("Sandbox initialized at {}x{}", size.width, size.height);
        Ok(Self {
            time: 0.0,
            fps_timer: 0.0,
            fps_frames: 0,
        })
    }

    fn update(&mut self, ctx: &AppContext, dt: f32) {
        self.time += dt;
        self.fps_timer += dt;
        self.fps_frames += 1;

        if self.fps_timer >= 1.0 {
            #[allow(clippy::cast_precision_loss)]
            let fps = self.fps_frames as f32 / self.fps_timer;
            info!("FPS: {fps:.1} (frame {})", ctx.frame_count());
            self.fps_timer = 0.0;
            self.fps_frames = 0;
        }
    }

    fn render_packet(&mut self, _ctx: &AppContext, dt: f32) -> RenderPacket {
        let angle = self.time * ORBIT_SPEED;
        let eye = Vec3::new(angle.cos() * ORBIT_RADIUS, 2.0, angle.sin() * ORBIT_RADIUS);
        RenderPacket::new(dt).with_view(Mat4::look_at_rh(eye, Vec3::ZERO, Vec3::Y), eye)
    }

    fn on_resize(&mut self, _ctx: &mut AppContext, width: u32, height: u32) -> anyhow::Result<()> {
        if width == 0 || height == 0 {
            info!("Window minimized, rendering paused");
        }
        Ok(())
    }

    fn cleanup(&mut self, _ctx: &mut AppContext) {
        info!("Sandbox ran for {:.1}s", self.time);
    }
}

fn main() -> anyhow::Result<()> {
    let config = AppConfig::load_or_default(Path::new(CONFIG_PATH))?;
    run_app::<Sandbox>(config)
}
