//! Application runner and event loop.

use std::sync::Arc;
use std::thread;
use std::time::{Duration, Instant};

use tracing::{error, info};
use tracing_subscriber::EnvFilter;
use winit::application::ApplicationHandler;
use winit::dpi::PhysicalSize;
use winit::event::WindowEvent;
use winit::event_loop::{ActiveEventLoop, ControlFlow, EventLoop};
use winit::window::{Window, WindowId};

use crate::app::SpudApp;
use crate::config::AppConfig;
use crate::context::AppContext;

/// Run a `SpudApp` with the given configuration.
///
/// This function initializes logging, creates the window and renderer,
/// and runs the event loop until the application exits.
pub fn run_app<A: SpudApp + 'static>(config: AppConfig) -> anyhow::Result<()> {
    tracing_subscriber::fmt()
        .with_env_filter(
            EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new("info")),
        )
        .init();

    info!("{} starting...", config.title);

    let event_loop = EventLoop::new()?;
    event_loop.set_control_flow(ControlFlow::Poll);

    let mut runner = AppRunner::<A> {
        config,
        state: None,
        fatal: None,
    };

    event_loop.run_app(&mut runner)?;

    match runner.fatal {
        Some(e) => Err(e),
        None => Ok(()),
    }
}

/// Internal application runner that implements winit's `ApplicationHandler`.
struct AppRunner<A: SpudApp> {
    config: AppConfig,
    state: Option<AppState<A>>,
    fatal: Option<anyhow::Error>,
}

/// Internal application state.
struct AppState<A: SpudApp> {
    ctx: AppContext,
    app: A,
    target_frame_time: Option<Duration>,
}

impl<A: SpudApp + 'static> ApplicationHandler for AppRunner<A> {
    fn resumed(&mut self, event_loop: &ActiveEventLoop) {
        if self.state.is_some() {
            return;
        }

        info!("Creating application state...");

        match self.create_state(event_loop) {
            Ok(state) => {
                self.state = Some(state);
                info!("Application ready!");
            }
            Err(e) => {
                error!("Failed to initialize application: {e:#}");
                self.fatal = Some(e);
                event_loop.exit();
            }
        }
    }

    fn window_event(&mut self, event_loop: &ActiveEventLoop, _id: WindowId, event: WindowEvent) {
        // Let the app handle the event first
        if let Some(state) = &mut self.state {
            if state.app.on_event(&event) {
                return;
            }
        }

        match event {
            WindowEvent::CloseRequested => {
                info!("Close requested");
                if let Some(mut state) = self.state.take() {
                    state.cleanup();
                }
                event_loop.exit();
            }
            WindowEvent::RedrawRequested => {
                if let Some(state) = &mut self.state {
                    if let Err(e) = state.render_frame() {
                        error!("Render error: {e:#}");
                        if let Some(mut state) = self.state.take() {
                            state.cleanup();
                        }
                        self.fatal = Some(e);
                        event_loop.exit();
                        return;
                    }
                    state.ctx.window.request_redraw();
                }
            }
            WindowEvent::Resized(size) => {
                if let Some(state) = &mut self.state {
                    if let Err(e) = state.handle_resize(size.width, size.height) {
                        error!("Resize error: {e:#}");
                    }
                }
            }
            _ => {}
        }
    }

    fn about_to_wait(&mut self, _event_loop: &ActiveEventLoop) {
        if let Some(state) = &self.state {
            state.ctx.window.request_redraw();
        }
    }
}

impl<A: SpudApp + 'static> AppRunner<A> {
    fn create_state(&self, event_loop: &ActiveEventLoop) -> anyhow::Result<AppState<A>> {
        let window_attrs = Window::default_attributes()
            .with_title(&self.config.title)
            .with_inner_size(PhysicalSize::new(self.config.width, self.config.height));

        let window = Arc::new(event_loop.create_window(window_attrs)?);

        let mut ctx = AppContext::new(window, &self.config.renderer)?;
        let app = A::init(&mut ctx)?;

        let target_frame_time = self
            .config
            .target_fps
            .filter(|&fps| fps > 0)
            .map(|fps| Duration::from_nanos(1_000_000_000 / u64::from(fps)));

        Ok(AppState {
            ctx,
            app,
            target_frame_time,
        })
    }
}

impl<A: SpudApp> AppState<A> {
    fn render_frame(&mut self) -> anyhow::Result<()> {
        let frame_start = Instant::now();

        let dt = frame_start.duration_since(self.ctx.last_frame_time).as_secs_f32();
        self.ctx.last_frame_time = frame_start;

        self.app.update(&self.ctx, dt);

        let packet = self.app.render_packet(&self.ctx, dt);
        self.ctx.renderer.draw_frame(&packet)?;

        // Frame pacing
        if let Some(target) = self.target_frame_time {
            let elapsed = frame_start.elapsed();
            if elapsed < target {
                thread::sleep(target - elapsed);
            }
        }

        Ok(())
    }

    fn handle_resize(&mut self, width: u32, height: u32) -> anyhow::Result<()> {
        self.ctx.renderer.on_resized(width, height);
        self.app.on_resize(&mut self.ctx, width, height)?;
        tracing::debug!("Window resized to {width}x{height}");
        Ok(())
    }

    fn cleanup(&mut self) {
        info!("Starting cleanup...");
        info!("Total frames: {}", self.ctx.frame_count());
        self.app.cleanup(&mut self.ctx);
        info!("Cleanup complete");
    }
}
